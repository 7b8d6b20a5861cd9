use chrono::{DateTime, Utc};

use super::{ClaimsBundle, Session};

/// Per-request facts the route authorizer hands to downstream handlers. Read-only.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub claims: Option<ClaimsBundle>,
    pub expires_at: Option<DateTime<Utc>>,
    pub request_id: String,
}

fn new_request_id() -> String { uuid::Uuid::new_v4().to_string() }

impl RequestContext {
    pub fn anonymous() -> Self {
        Self { claims: None, expires_at: None, request_id: new_request_id() }
    }

    pub fn from_session(session: &Session) -> Self {
        Self { claims: Some(session.claims.clone()), expires_at: Some(session.expires_at), request_id: new_request_id() }
    }

    pub fn is_authenticated(&self) -> bool { self.claims.is_some() }
}
