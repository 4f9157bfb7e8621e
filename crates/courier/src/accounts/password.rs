//! Salted SHA-256 password hashes
//!
//! Stored as `base64(salt)$base64(sha256(salt || password))`.

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Characters used for generated passwords
const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";

/// Length of passwords handed out by a reset
pub const GENERATED_PASSWORD_LEN: usize = 12;

fn digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    getrandom::fill(&mut salt)
        .map_err(|e| anyhow!("Failed to generate password salt: {}", e))?;

    Ok(format!(
        "{}${}",
        STANDARD.encode(salt),
        STANDARD.encode(digest(&salt, password))
    ))
}

/// Check a password against a stored hash; malformed hashes never match
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt), STANDARD.decode(expected)) else {
        return false;
    };

    let actual = digest(&salt, password);
    // compare every byte regardless of where the first mismatch is
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(&expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Random password for the reset flow
pub fn generate_password() -> Result<String> {
    let mut bytes = [0u8; GENERATED_PASSWORD_LEN];
    getrandom::fill(&mut bytes)
        .map_err(|e| anyhow!("Failed to generate password: {}", e))?;

    Ok(bytes
        .iter()
        .map(|b| PASSWORD_CHARSET[usize::from(*b) % PASSWORD_CHARSET.len()] as char)
        .collect())
}
