use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Length of every raw nonce handed to an authorization attempt.
pub const NONCE_LENGTH: usize = 32;
const NONCE_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-._";

/// Produces the single-use nonce that binds a provider ID token to one attempt.
///
/// The raw value stays on this side and is handed to the credential exchange;
/// only the digest is sent to the provider.
pub trait NonceProvider: Send + Sync {
    /// Returns a fresh random string of [`NONCE_LENGTH`] characters.
    fn make_raw_nonce(&self) -> String;

    /// Lowercase hex SHA-256 of the UTF-8 bytes of `raw`.
    fn digest(&self, raw: &str) -> String {
        sha256_hex(raw)
    }
}

/// Nonce provider backed by the thread-local CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNonceProvider;

impl NonceProvider for DefaultNonceProvider {
    fn make_raw_nonce(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..NONCE_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..NONCE_CHARSET.len());
                NONCE_CHARSET[idx] as char
            })
            .collect()
    }
}

pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest
        .iter()
        .fold(String::with_capacity(digest.len() * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}
