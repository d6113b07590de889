use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::Engine as _;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeBase64Error;

impl fmt::Display for DecodeBase64Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode base64 string")
    }
}

impl std::error::Error for DecodeBase64Error {}

/// Encode bytes with the URL-safe alphabet and no padding (JWT segment encoding).
pub fn base64_url_encode_trimmed(input: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(input.as_ref())
}

/// Decode a URL-safe base64 segment, tolerating present or absent `=` padding.
pub fn base64_url_decode(input: &str) -> Result<Vec<u8>, DecodeBase64Error> {
    URL_SAFE_NO_PAD
        .decode(input.trim_end_matches('=').as_bytes())
        .map_err(|_err| DecodeBase64Error)
}
