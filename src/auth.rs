//! Password digest used as authentication material.
//!
//! LOGIN and REGISTER never carry the plaintext password; they carry
//! `Base64(SHA-256(password ‖ SHA-256(lowercase(email))))`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Compute the salted password digest for `(password, email)`.
///
/// The salt is the SHA-256 of the lowercased email, so the digest is
/// case-insensitive in the email and deterministic for a given pair.
pub fn hash_password(password: &str, email: &str) -> String {
    let salt = Sha256::digest(email.to_lowercase().as_bytes());

    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);

    BASE64.encode(hasher.finalize())
}
