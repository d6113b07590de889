//! Unverified inspection of provider identity tokens.
//!
//! Signature verification is the backend's job during the credential exchange.
//! The client only peeks at the claims to cross-check the nonce binding before
//! a token leaves the device.

use serde::Deserialize;

use crate::util::base64::base64_url_decode;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    #[serde(default)]
    pub email: Option<String>,
    /// Digest of the raw nonce the client supplied when requesting the token.
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Returns the claims of a compact JWS, or `None` when `token` is not a JWT.
pub fn decode_claims(token: &str) -> Option<IdTokenClaims> {
    let mut parts = token.split('.');
    let (_header, claims, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = base64_url_decode(claims).ok()?;
    serde_json::from_slice(&bytes).ok()
}
