//! Test utilities shared across the crate's unit tests.

pub mod fakes;
pub mod http;

pub use fakes::{
    FakeCredentialSource, FixedNonceProvider, PresenterAction, ScriptedPresenter, SourceCall,
};
pub use http::{identity_toolkit_endpoint, start_mock_server};

use serde_json::{json, Value};

use crate::util::base64::base64_url_encode_trimmed;

/// Builds a compact JWT with the given claims and a dummy signature.
pub fn unsigned_id_token(claims: Value) -> String {
    let header = json!({ "alg": "RS256", "kid": "test" });
    format!(
        "{}.{}.signature",
        base64_url_encode_trimmed(header.to_string()),
        base64_url_encode_trimmed(claims.to_string())
    )
}
