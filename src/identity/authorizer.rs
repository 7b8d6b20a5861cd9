//! Route-level authorization: which roles may reach which path prefixes.

use super::principal::{ClaimsBundle, Role};

pub const LOGIN_PATH: &str = "/login";
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";

const ALL_ROLES: &[Role] = &[Role::ShstTechnician, Role::ClientCompany, Role::Admin];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub prefix: &'static str,
    pub roles: &'static [Role],
}

impl RouteRule {
    pub const fn new(prefix: &'static str, roles: &'static [Role]) -> Self { Self { prefix, roles } }

    /// Segment-aware prefix test: `/admin` covers `/admin` and `/admin/x`, not `/administrator`.
    pub fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.ends_with('/'),
            None => false,
        }
    }

    pub fn permits(&self, role: Role) -> bool { self.roles.contains(&role) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectToLogin,
    RedirectToDefault,
}

impl Decision {
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            Decision::Allow => None,
            Decision::RedirectToLogin => Some(LOGIN_PATH),
            Decision::RedirectToDefault => Some(DEFAULT_LANDING_PATH),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            RouteRule::new("/dashboard", ALL_ROLES),
            RouteRule::new("/conformidade", ALL_ROLES),
            RouteRule::new("/pss", ALL_ROLES),
            RouteRule::new("/contratadas", ALL_ROLES),
            RouteRule::new("/biblioteca", ALL_ROLES),
            RouteRule::new("/perfil", ALL_ROLES),
            RouteRule::new("/admin", ADMIN_ONLY),
        ])
    }
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self { Self { rules } }

    pub fn rules(&self) -> &[RouteRule] { &self.rules }

    /// The longest matching prefix wins; `None` means the path is public.
    pub fn match_path(&self, path: &str) -> Option<&RouteRule> {
        self.rules
            .iter()
            .filter(|r| r.matches(path))
            .max_by_key(|r| r.prefix.len())
    }

    pub fn is_protected(&self, path: &str) -> bool { self.match_path(path).is_some() }

    pub fn decide(&self, path: &str, claims: Option<&ClaimsBundle>) -> Decision {
        let Some(rule) = self.match_path(path) else { return Decision::Allow; };
        match claims {
            None => Decision::RedirectToLogin,
            Some(c) if rule.permits(c.role) => Decision::Allow,
            Some(_) => Decision::RedirectToDefault,
        }
    }
}
