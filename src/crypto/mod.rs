/// Cryptography module for account credentials
///
/// Handles Argon2id password hashing and random password generation

pub mod password;

pub use password::{generate_password, hash_password, verify_password};
