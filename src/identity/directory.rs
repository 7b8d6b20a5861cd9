//! Read-only user registry behind a trait so a real store can replace the seeded one.

use anyhow::{Context, Result};
use std::collections::HashMap;

use super::principal::{ClaimsBundle, Role};
use crate::security;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub company_id: String,
}

impl UserRecord {
    pub fn claims(&self) -> ClaimsBundle {
        ClaimsBundle {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            company_id: self.company_id.clone(),
        }
    }
}

pub trait UserDirectory: Send + Sync {
    /// Case-insensitive lookup by email.
    fn find_by_email(&self, email: &str) -> Option<&UserRecord>;
}

fn email_key(email: &str) -> String { email.trim().to_lowercase() }

/// Registry fixed at construction; shared across requests without locking.
#[derive(Debug, Default)]
pub struct StaticUserDirectory {
    users: HashMap<String, UserRecord>,
}

impl StaticUserDirectory {
    pub fn new(records: Vec<UserRecord>) -> Self {
        let users = records.into_iter().map(|u| (email_key(&u.email), u)).collect();
        Self { users }
    }

    /// The demo accounts of the platform; every secret is `password`.
    pub fn demo() -> Result<Self> {
        let seeds = [
            ("admin-id", "admin@globalsafety.ao", "Administrador Global Safety", Role::Admin, "gs-company-id"),
            ("tech-id", "tecnico@empresa.ao", "Técnico SHST Exemplo", Role::ShstTechnician, "client-company-id"),
            ("company-id", "empresa@cliente.ao", "Gestor de Empresa", Role::ClientCompany, "client-company-id"),
        ];
        let mut records = Vec::with_capacity(seeds.len());
        for (id, email, name, role, company_id) in seeds {
            let password_hash = security::hash_password("password")
                .with_context(|| format!("While hashing seed secret for {}", email))?;
            records.push(UserRecord {
                id: id.into(),
                email: email.into(),
                password_hash,
                name: name.into(),
                role,
                company_id: company_id.into(),
            });
        }
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize { self.users.len() }

    pub fn is_empty(&self) -> bool { self.users.is_empty() }
}

impl UserDirectory for StaticUserDirectory {
    fn find_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.users.get(&email_key(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_directory_seeds_three_roles() {
        let dir = StaticUserDirectory::demo().unwrap();
        assert_eq!(dir.len(), 3);
        assert_eq!(dir.find_by_email("admin@globalsafety.ao").unwrap().role, Role::Admin);
        assert_eq!(dir.find_by_email("tecnico@empresa.ao").unwrap().role, Role::ShstTechnician);
        assert_eq!(dir.find_by_email("empresa@cliente.ao").unwrap().role, Role::ClientCompany);
        let rec = dir.find_by_email("admin@globalsafety.ao").unwrap();
        assert_ne!(rec.password_hash, "password");
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let dir = StaticUserDirectory::new(vec![UserRecord {
            id: "u1".into(),
            email: "Someone@Example.ao".into(),
            password_hash: String::new(),
            name: "Someone".into(),
            role: Role::ClientCompany,
            company_id: "c1".into(),
        }]);
        assert!(dir.find_by_email("someone@example.ao").is_some());
        assert!(dir.find_by_email("  SOMEONE@EXAMPLE.AO ").is_some());
        assert!(dir.find_by_email("other@example.ao").is_none());
    }
}
