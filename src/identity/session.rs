//! Stateless signed sessions.
//!
//! A session token is `v1.<payload>.<sig>` where `payload` is the URL-safe base64 of the JSON
//! claims plus `iat`/`exp` (unix seconds) and `sig` is HMAC-SHA256 over `v1.<payload>`.
//! Nothing is kept server side: a token is valid iff its signature checks out and it has not
//! expired. Logout is the browser dropping the cookie.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::principal::ClaimsBundle;
use crate::tprintln;

type HmacSha256 = Hmac<Sha256>;

pub type SessionToken = String;

const TOKEN_VERSION_V1: &str = "v1";
const MAX_TOKEN_LEN: usize = 4096;
pub const MIN_KEY_LEN: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session token is malformed")]
    Malformed,
    #[error("session token exceeds the maximum length")]
    Oversized,
    #[error("session token version unsupported")]
    UnsupportedVersion,
    #[error("session signature mismatch")]
    BadSignature,
    #[error("session expired")]
    Expired,
    #[error("session payload could not be encoded: {0}")]
    Encoding(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionPayload {
    #[serde(flatten)]
    claims: ClaimsBundle,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub claims: ClaimsBundle,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionManager {
    key: Arc<[u8]>,
    pub ttl: Duration,
    /// Age after which a still-valid session gets a fresh token.
    pub renew_after: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("key", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("renew_after", &self.renew_after)
            .finish()
    }
}

fn ts(secs: i64) -> DateTime<Utc> { DateTime::from_timestamp(secs, 0).unwrap_or_default() }

impl SessionManager {
    pub fn new(key: &[u8], ttl: Duration) -> Self {
        Self { key: Arc::from(key), ttl, renew_after: ttl / 2 }
    }

    pub fn issue(&self, claims: ClaimsBundle) -> Result<Session, SessionError> {
        self.issue_at(claims, Utc::now())
    }

    pub fn issue_at(&self, claims: ClaimsBundle, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let iat = now.timestamp();
        let exp = iat + self.ttl.num_seconds();
        let payload = SessionPayload { claims, iat, exp };
        let payload_bytes = serde_json::to_vec(&payload).map_err(|e| SessionError::Encoding(e.to_string()))?;
        let signed_part = format!("{}.{}", TOKEN_VERSION_V1, URL_SAFE_NO_PAD.encode(payload_bytes));
        let sig = URL_SAFE_NO_PAD.encode(self.mac(&signed_part)?.finalize().into_bytes());
        let token = format!("{}.{}", signed_part, sig);
        tprintln!("session.issue user={} exp={}", payload.claims.id, exp);
        Ok(Session { token, claims: payload.claims, issued_at: ts(iat), expires_at: ts(exp) })
    }

    /// Claims of a valid token; any tampering or expiry is an error.
    pub fn verify(&self, token: &str) -> Result<ClaimsBundle, SessionError> {
        self.decode(token).map(|s| s.claims)
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimsBundle, SessionError> {
        self.decode_at(token, now).map(|s| s.claims)
    }

    pub fn decode(&self, token: &str) -> Result<Session, SessionError> {
        self.decode_at(token, Utc::now())
    }

    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<Session, SessionError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(SessionError::Oversized);
        }
        let (signed_part, sig_part) = token.rsplit_once('.').ok_or(SessionError::Malformed)?;
        let (version, payload_part) = signed_part.split_once('.').ok_or(SessionError::Malformed)?;

        let sig = URL_SAFE_NO_PAD.decode(sig_part).map_err(|_| SessionError::Malformed)?;
        self.mac(signed_part)?
            .verify_slice(&sig)
            .map_err(|_| SessionError::BadSignature)?;
        // Only reachable with a valid signature, i.e. a token minted under another version.
        if version != TOKEN_VERSION_V1 {
            return Err(SessionError::UnsupportedVersion);
        }

        let payload_bytes = URL_SAFE_NO_PAD.decode(payload_part).map_err(|_| SessionError::Malformed)?;
        let payload: SessionPayload = serde_json::from_slice(&payload_bytes).map_err(|_| SessionError::Malformed)?;
        if now.timestamp() >= payload.exp {
            return Err(SessionError::Expired);
        }
        Ok(Session {
            token: token.to_string(),
            claims: payload.claims,
            issued_at: ts(payload.iat),
            expires_at: ts(payload.exp),
        })
    }

    pub fn needs_renewal(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.issued_at >= self.renew_after
    }

    fn mac(&self, signed_part: &str) -> Result<HmacSha256, SessionError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|e| SessionError::Encoding(e.to_string()))?;
        mac.update(signed_part.as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    fn sm() -> SessionManager { SessionManager::new(&[7u8; 32], Duration::hours(24)) }

    fn claims() -> ClaimsBundle {
        ClaimsBundle {
            id: "admin-id".into(),
            name: "Administrador Global Safety".into(),
            email: "admin@globalsafety.ao".into(),
            role: Role::Admin,
            company_id: "gs-company-id".into(),
        }
    }

    #[test]
    fn issue_verify_roundtrip() {
        let m = sm();
        let s = m.issue(claims()).unwrap();
        assert!(s.token.starts_with("v1."));
        assert_eq!(m.verify(&s.token).unwrap(), claims());
        // immediate re-issue of the recovered claims verifies to the same bundle
        let again = m.issue(m.verify(&s.token).unwrap()).unwrap();
        assert_eq!(m.verify(&again.token).unwrap(), claims());
    }

    #[test]
    fn every_flipped_byte_is_rejected() {
        let m = sm();
        let token = m.issue(claims()).unwrap().token;
        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] ^= 0x01;
            let Ok(tampered) = String::from_utf8(bytes) else { continue };
            assert!(m.verify(&tampered).is_err(), "flip at {} accepted", i);
        }
    }

    #[test]
    fn other_key_is_rejected() {
        let token = sm().issue(claims()).unwrap().token;
        let other = SessionManager::new(&[8u8; 32], Duration::hours(24));
        assert_eq!(other.verify(&token), Err(SessionError::BadSignature));
    }

    #[test]
    fn expiry_is_enforced() {
        let m = sm();
        let t0 = Utc::now();
        let s = m.issue_at(claims(), t0).unwrap();
        assert!(m.verify_at(&s.token, s.expires_at - Duration::seconds(1)).is_ok());
        assert_eq!(m.verify_at(&s.token, s.expires_at + Duration::seconds(1)), Err(SessionError::Expired));
        assert_eq!(m.verify_at(&s.token, t0 + Duration::days(30)), Err(SessionError::Expired));
    }

    #[test]
    fn garbage_tokens() {
        let m = sm();
        assert_eq!(m.verify(""), Err(SessionError::Malformed));
        assert_eq!(m.verify("v1"), Err(SessionError::Malformed));
        assert_eq!(m.verify("v1.abc"), Err(SessionError::Malformed));
        assert_eq!(m.verify("v1.abc.!!!"), Err(SessionError::Malformed));
        assert_eq!(m.verify(&"a".repeat(MAX_TOKEN_LEN + 1)), Err(SessionError::Oversized));
    }

    #[test]
    fn forged_payload_with_valid_looking_signature_fails() {
        let m = sm();
        let s = m.issue(claims()).unwrap();
        let (_, sig) = s.token.rsplit_once('.').unwrap();
        let mut forged = claims();
        forged.role = Role::Admin;
        forged.id = "someone-else".into();
        let body = serde_json::json!({
            "id": forged.id, "name": forged.name, "email": forged.email,
            "role": "ADMIN", "companyId": forged.company_id,
            "iat": 0, "exp": i64::MAX,
        });
        let token = format!("v1.{}.{}", URL_SAFE_NO_PAD.encode(body.to_string()), sig);
        assert_eq!(m.verify(&token), Err(SessionError::BadSignature));
    }

    #[test]
    fn renewal_threshold() {
        let m = sm();
        let t0 = Utc::now();
        let s = m.issue_at(claims(), t0).unwrap();
        assert!(!m.needs_renewal(&s, t0 + Duration::hours(1)));
        assert!(m.needs_renewal(&s, t0 + Duration::hours(13)));
    }
}
