//! # Identity primitives
//!
//! Client identifiers, bearer secrets and the one-way digest used to store them.
//! All functions are stateless; a failing random source is reported, never retried.

use anyhow::anyhow;
use sha2::{Digest, Sha512};
use uuid::Builder;

/// Length of a generated client secret key.
pub const SECRET_KEY_LEN: usize = 32;

const KEY_ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

fn fill_random(buf: &mut [u8]) -> anyhow::Result<()> {
    getrandom::getrandom(buf).map_err(|e| anyhow!("random source failed: {e}"))
}

/// Generates a random UUID v4 in its lower-case, hyphenated 8-4-4-4-12 form.
pub fn generate_client_uuid() -> anyhow::Result<String> {
    let mut bytes = [0u8; 16];
    fill_random(&mut bytes)?;
    // Forces the version nibble to 4 and the variant bits to RFC 4122.
    let uuid = Builder::from_random_bytes(bytes).into_uuid();
    Ok(uuid.hyphenated().to_string())
}

/// Generates a 32 character alphanumeric secret.
///
/// One random byte per character, reduced modulo the alphabet size. The
/// resulting bias is small and accepted: this is a bearer secret, not key
/// material.
pub fn generate_secret_key() -> anyhow::Result<String> {
    let mut bytes = [0u8; SECRET_KEY_LEN];
    fill_random(&mut bytes)?;
    Ok(bytes
        .iter()
        .map(|b| KEY_ALPHABET[(*b as usize) % KEY_ALPHABET.len()] as char)
        .collect())
}

/// SHA-512 of `secret`, lower-case hex.
///
/// Unsalted. Only ever applied to system-generated, high-entropy keys.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha512::digest(secret.as_bytes()))
}

/// Checks a plaintext secret against a stored digest.
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    // Both sides are fixed-length hex digests.
    hash_secret(secret) == stored_hash
}
