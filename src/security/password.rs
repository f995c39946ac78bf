use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordIssue {
    TooShort { min: usize, actual: usize },
    TooLong { max: usize, actual: usize },
    MissingLetter,
    MissingDigit,
}

impl PasswordIssue {
    pub fn message(&self) -> String {
        match self {
            Self::TooShort { min, actual } => {
                format!("Password must be at least {min} characters (currently {actual})")
            }
            Self::TooLong { max, actual } => {
                format!("Password must be at most {max} characters (currently {actual})")
            }
            Self::MissingLetter => "Password must contain at least one letter".into(),
            Self::MissingDigit => "Password must contain at least one digit".into(),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {e}")),
    }
}

/// Empty when the password is acceptable.
pub fn validate_password_strength(password: &str) -> Vec<PasswordIssue> {
    let mut issues = Vec::new();

    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        issues.push(PasswordIssue::TooShort {
            min: MIN_PASSWORD_LENGTH,
            actual: length,
        });
    }
    if length > MAX_PASSWORD_LENGTH {
        issues.push(PasswordIssue::TooLong {
            max: MAX_PASSWORD_LENGTH,
            actual: length,
        });
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        issues.push(PasswordIssue::MissingLetter);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        issues.push(PasswordIssue::MissingDigit);
    }

    issues
}
