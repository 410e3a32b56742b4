/// Password hashing and generation
use crate::error::{BotError, BotResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::seq::SliceRandom;
use rand::Rng;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*";

/// Lengths below this fall back to the default
pub const MIN_GENERATED_LENGTH: usize = 8;
pub const DEFAULT_GENERATED_LENGTH: usize = 12;

/// Hash a password with Argon2id and a random salt (PHC string format)
pub fn hash_password(password: &str) -> BotResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BotError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored PHC hash
pub fn verify_password(password: &str, hash: &str) -> BotResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| BotError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Generate a random password with at least one letter, digit and symbol
pub fn generate_password(length: usize) -> String {
    let length = if length < MIN_GENERATED_LENGTH {
        DEFAULT_GENERATED_LENGTH
    } else {
        length
    };

    let mut rng = rand::thread_rng();
    let all: Vec<u8> = [LETTERS, DIGITS, SYMBOLS].concat();

    let mut chars = Vec::with_capacity(length);
    chars.push(LETTERS[rng.gen_range(0..LETTERS.len())]);
    chars.push(DIGITS[rng.gen_range(0..DIGITS.len())]);
    chars.push(SYMBOLS[rng.gen_range(0..SYMBOLS.len())]);
    while chars.len() < length {
        chars.push(all[rng.gen_range(0..all.len())]);
    }

    chars.shuffle(&mut rng);
    chars.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_password_classes() {
        for _ in 0..50 {
            let password = generate_password(12);
            assert_eq!(password.len(), 12);
            assert!(password.chars().any(|c| c.is_ascii_alphabetic()));
            assert!(password.chars().any(|c| c.is_ascii_digit()));
            assert!(password.bytes().any(|b| SYMBOLS.contains(&b)));
        }
    }

    #[test]
    fn test_short_length_falls_back_to_default() {
        assert_eq!(generate_password(4).len(), DEFAULT_GENERATED_LENGTH);
        assert_eq!(generate_password(20).len(), 20);
    }
}
