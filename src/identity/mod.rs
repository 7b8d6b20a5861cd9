//! Central identity and session management for the platform login.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod directory;
mod session;
mod provider;
mod request_context;
mod authorizer;

pub use principal::{ClaimsBundle, Role};
pub use directory::{StaticUserDirectory, UserDirectory, UserRecord};
pub use session::{Session, SessionError, SessionManager, SessionToken, MIN_KEY_LEN};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse};
pub use request_context::RequestContext;
pub use authorizer::{Decision, RouteRule, RouteTable, DEFAULT_LANDING_PATH, LOGIN_PATH};
