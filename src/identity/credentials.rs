use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use crate::error::{AppError, AppResult};

/// Checks a submitted username/password pair.
pub trait CredentialStore: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// The single shared account guarding the dashboard; the password is held as an
/// Argon2 PHC string, never in clear.
#[derive(Clone)]
pub struct SingleCredential {
    username: String,
    password_hash: String,
}

impl std::fmt::Debug for SingleCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleCredential")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

impl SingleCredential {
    pub fn from_plaintext(username: impl Into<String>, password: &str) -> AppResult<Self> {
        Ok(Self { username: username.into(), password_hash: hash_password(password)? })
    }

    pub fn from_phc(username: impl Into<String>, phc: &str) -> AppResult<Self> {
        PasswordHash::new(phc).map_err(|e| AppError::user("invalid_password_hash", e.to_string()))?;
        Ok(Self { username: username.into(), password_hash: phc.to_string() })
    }

    pub fn username(&self) -> &str { &self.username }
}

impl CredentialStore for SingleCredential {
    fn verify(&self, username: &str, password: &str) -> bool {
        // always pay for the hash so a wrong username is not cheaper to detect
        let password_ok = verify_password(&self.password_hash, password);
        password_ok && username == self.username
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::internal("entropy_unavailable", e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::internal("salt_encoding", e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::internal("hash_failed", e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}
