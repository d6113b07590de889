use std::fmt;

use url::form_urlencoded::Serializer;

use crate::auth::error::ExchangeError;
use crate::auth::model::{IdentityProvider, ProviderMaterial};

/// Federated credential ready for `signInWithIdp`.
///
/// Built from the [`ProviderMaterial`] of one authorization attempt; the raw
/// nonce goes to the backend, which checks it against the token's hashed claim.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredential {
    provider_id: String,
    id_token: Option<String>,
    access_token: Option<String>,
    raw_nonce: Option<String>,
}

impl OAuthCredential {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            id_token: None,
            access_token: None,
            raw_nonce: None,
        }
    }

    pub fn from_material(material: &ProviderMaterial) -> Self {
        Self::new(material.provider.provider_id())
            .with_id_token(material.id_token.clone())
            .with_access_token(material.access_token.clone())
            .with_raw_nonce(Some(material.raw_nonce.clone()))
    }

    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(token.into());
        self
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    pub fn with_raw_nonce(mut self, nonce: Option<String>) -> Self {
        self.raw_nonce = nonce;
        self
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn raw_nonce(&self) -> Option<&str> {
        self.raw_nonce.as_deref()
    }

    /// Builds the `postBody` query string expected by `signInWithIdp`.
    pub fn build_post_body(&self) -> Result<String, ExchangeError> {
        if self.id_token.is_none() && self.access_token.is_none() {
            return Err(ExchangeError::invalid_credential(
                "OAuth credential carries neither id_token nor access_token",
            ));
        }

        let mut serializer = Serializer::new(String::new());
        if let Some(id_token) = &self.id_token {
            serializer.append_pair("id_token", id_token);
        }
        if let Some(access_token) = &self.access_token {
            serializer.append_pair("access_token", access_token);
        }
        if let Some(nonce) = &self.raw_nonce {
            serializer.append_pair("nonce", nonce);
        }
        serializer.append_pair("providerId", &self.provider_id);
        Ok(serializer.finish())
    }
}

impl fmt::Debug for OAuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredential")
            .field("provider_id", &self.provider_id)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("raw_nonce", &self.raw_nonce.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Artifact the credential source exchanges with the identity backend.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthCredential {
    OAuth(OAuthCredential),
    EmailPassword { email: String, password: String },
}

impl AuthCredential {
    pub fn email_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        AuthCredential::EmailPassword {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn provider_id(&self) -> &str {
        match self {
            AuthCredential::OAuth(credential) => credential.provider_id(),
            AuthCredential::EmailPassword { .. } => IdentityProvider::Email.provider_id(),
        }
    }
}

impl From<OAuthCredential> for AuthCredential {
    fn from(value: OAuthCredential) -> Self {
        AuthCredential::OAuth(value)
    }
}

impl fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthCredential::OAuth(credential) => f.debug_tuple("OAuth").field(credential).finish(),
            AuthCredential::EmailPassword { email, .. } => f
                .debug_struct("EmailPassword")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::ExchangeErrorCode;

    #[test]
    fn post_body_carries_tokens_nonce_and_provider() {
        let credential = OAuthCredential::new("google.com")
            .with_id_token("id.token")
            .with_access_token(Some("access token".into()))
            .with_raw_nonce(Some("raw-nonce".into()));

        let body = credential.build_post_body().unwrap();

        assert_eq!(
            body,
            "id_token=id.token&access_token=access+token&nonce=raw-nonce&providerId=google.com"
        );
    }

    #[test]
    fn post_body_requires_a_token() {
        let err = OAuthCredential::new("apple.com")
            .with_raw_nonce(Some("raw".into()))
            .build_post_body()
            .unwrap_err();
        assert_eq!(err.code, ExchangeErrorCode::InvalidCredential);
    }

    #[test]
    fn email_credential_hides_password() {
        let credential = AuthCredential::email_password("ada@example.com", "hunter2");
        assert_eq!(credential.provider_id(), "password");
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("ada@example.com"));
        assert!(!rendered.contains("hunter2"));
    }
}
