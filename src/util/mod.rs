pub mod backoff;
pub mod base64;
pub mod jwt;
pub(crate) mod logger;

pub use backoff::{run_with_backoff, RetryError, RetryPolicy};
pub use base64::{base64_url_decode, base64_url_encode_trimmed, DecodeBase64Error};
pub use jwt::{decode_claims, IdTokenClaims};
