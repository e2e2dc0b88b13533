/*
 * User accounts and salted password hashing
 */

use crate::models::{FxError, Result};
use crate::utils::utc_now_iso;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const MIN_PASSWORD_LEN: usize = 4;
const SALT_BYTES: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: u64,
    pub username: String,
    pub hashed_password: String,
    pub salt: String,
    pub registration_date: String,
}

/// The logged-in user of the command prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: u64,
    pub username: String,
}

#[must_use]
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

fn new_salt() -> String {
    let bytes: [u8; SALT_BYTES] = rand::random();
    hex::encode(bytes)
}

pub fn validate_username(username: &str) -> Result<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(FxError::Validation("Username must not be empty".to_string()));
    }
    Ok(username)
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FxError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

impl User {
    pub fn create(user_id: u64, username: &str, password: &str) -> Result<Self> {
        let username = validate_username(username)?;
        validate_password(password)?;
        let salt = new_salt();

        Ok(Self {
            user_id,
            username: username.to_string(),
            hashed_password: hash_password(password, &salt),
            salt,
            registration_date: utc_now_iso(),
        })
    }

    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(password, &self.salt) == self.hashed_password
    }

    #[must_use]
    pub fn session(&self) -> Session {
        Session {
            user_id: self.user_id,
            username: self.username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_sha256_of_password_then_salt() {
        assert_eq!(
            hash_password("pass", "salt"),
            hex::encode(Sha256::digest(b"passsalt"))
        );
    }

    #[test]
    fn created_user_verifies_its_password() {
        let user = User::create(1, "  alice ", "secret").unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(user.salt.len(), SALT_BYTES * 2);
        assert!(user.verify_password("secret"));
        assert!(!user.verify_password("Secret"));
    }

    #[test]
    fn salts_differ_between_users() {
        let a = User::create(1, "a", "same-password").unwrap();
        let b = User::create(2, "b", "same-password").unwrap();

        assert_ne!(a.hashed_password, b.hashed_password);
    }

    #[test]
    fn rejects_blank_username_and_short_password() {
        assert!(matches!(User::create(1, "   ", "secret"), Err(FxError::Validation(_))));
        assert!(matches!(User::create(1, "bob", "abc"), Err(FxError::Validation(_))));
    }
}
