//! Password hashing primitives. Secrets are only ever stored as Argon2 PHC strings.

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use password_hash::{SaltString, PasswordHash};

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

// Hash checked against when the email is unknown, so both failure paths cost one Argon2 run.
static DECOY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("decoy-password-not-in-use").ok());

/// Burn one password verification without a real record.
pub fn verify_decoy(password: &str) {
    if let Some(h) = DECOY_HASH.as_deref() {
        let _ = verify_password(h, password);
    }
}

/// Generate `n` random bytes from the OS source.
pub fn random_bytes(n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!(e.to_string()))?;
    Ok(buf)
}
