use std::sync::Arc;

use tracing::{debug, info};

use super::directory::UserDirectory;
use super::principal::ClaimsBundle;
use super::session::{Session, SessionManager};
use crate::error::{AppError, AppResult};
use crate::security;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
}

pub trait AuthProvider: Send + Sync {
    /// `Ok(None)` is a credentials mismatch; `Err` is reserved for internal failures.
    fn verify(&self, req: &LoginRequest) -> AppResult<Option<ClaimsBundle>>;

    /// Verify and mint a session in one step.
    fn login(&self, req: &LoginRequest) -> AppResult<Option<LoginResponse>>;
}

pub struct LocalAuthProvider {
    pub directory: Arc<dyn UserDirectory>,
    pub sm: SessionManager,
}

impl LocalAuthProvider {
    pub fn new(directory: Arc<dyn UserDirectory>, sm: SessionManager) -> Self { Self { directory, sm } }
}

impl AuthProvider for LocalAuthProvider {
    fn verify(&self, req: &LoginRequest) -> AppResult<Option<ClaimsBundle>> {
        if req.email.trim().is_empty() || req.password.is_empty() {
            return Ok(None);
        }
        let Some(user) = self.directory.find_by_email(&req.email) else {
            security::verify_decoy(&req.password);
            debug!(target: "auth", "login rejected: no match");
            return Ok(None);
        };
        if !security::verify_password(&user.password_hash, &req.password) {
            debug!(target: "auth", "login rejected: no match");
            return Ok(None);
        }
        Ok(Some(user.claims()))
    }

    fn login(&self, req: &LoginRequest) -> AppResult<Option<LoginResponse>> {
        let Some(claims) = self.verify(req)? else { return Ok(None); };
        let session = self.sm.issue(claims).map_err(|e| AppError::internal("session_issue_failed".to_string(), e.to_string()))?;
        info!(target: "auth", "auth.login user={} role={} company={}", session.claims.id, session.claims.role, session.claims.company_id);
        Ok(Some(LoginResponse { session }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Role, StaticUserDirectory};
    use chrono::Duration;
    use once_cell::sync::Lazy;

    static PROVIDER: Lazy<LocalAuthProvider> = Lazy::new(|| {
        let dir = StaticUserDirectory::demo().unwrap();
        LocalAuthProvider::new(Arc::new(dir), SessionManager::new(&[1u8; 32], Duration::hours(24)))
    });

    fn req(email: &str, password: &str) -> LoginRequest {
        LoginRequest { email: email.into(), password: password.into() }
    }

    #[test]
    fn seeded_users_verify_with_their_role_and_company() {
        let cases = [
            ("admin@globalsafety.ao", Role::Admin, "gs-company-id", "admin-id"),
            ("tecnico@empresa.ao", Role::ShstTechnician, "client-company-id", "tech-id"),
            ("empresa@cliente.ao", Role::ClientCompany, "client-company-id", "company-id"),
        ];
        for (email, role, company, id) in cases {
            let c = PROVIDER.verify(&req(email, "password")).unwrap().expect(email);
            assert_eq!(c.role, role);
            assert_eq!(c.company_id, company);
            assert_eq!(c.id, id);
            assert_eq!(c.email, email);
        }
    }

    #[test]
    fn wrong_secret_and_unknown_email_are_plain_no_match() {
        assert!(PROVIDER.verify(&req("admin@globalsafety.ao", "wrong")).unwrap().is_none());
        assert!(PROVIDER.verify(&req("nobody@globalsafety.ao", "password")).unwrap().is_none());
        assert!(PROVIDER.verify(&req("", "password")).unwrap().is_none());
        assert!(PROVIDER.verify(&req("admin@globalsafety.ao", "")).unwrap().is_none());
    }

    #[test]
    fn email_match_is_case_insensitive() {
        let c = PROVIDER.verify(&req("Admin@GlobalSafety.AO", "password")).unwrap();
        assert_eq!(c.map(|c| c.role), Some(Role::Admin));
    }

    #[test]
    fn login_issues_verifiable_session() {
        let resp = PROVIDER.login(&req("tecnico@empresa.ao", "password")).unwrap().unwrap();
        let claims = PROVIDER.sm.verify(&resp.session.token).unwrap();
        assert_eq!(claims.role, Role::ShstTechnician);
        assert!(PROVIDER.login(&req("tecnico@empresa.ao", "nope")).unwrap().is_none());
    }
}
