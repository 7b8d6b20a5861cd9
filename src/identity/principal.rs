use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three access tiers of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    ShstTechnician,
    ClientCompany,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::ShstTechnician, Role::ClientCompany];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::ShstTechnician => "SHST_TECHNICIAN",
            Role::ClientCompany => "CLIENT_COMPANY",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// Identity and authorization facts carried by a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsBundle {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub company_id: String,
}
