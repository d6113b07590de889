//! Federated authorization: the presenter seam, the single-flight bridge that
//! drives it and the OAuth credential handed to the identity backend.

mod bridge;
mod credential;

pub use bridge::{AuthorizationBridge, AuthorizationCompletion, StaleCompletion};
pub use credential::{AuthCredential, OAuthCredential};

use std::fmt;
use std::sync::Arc;

use crate::auth::error::ProviderError;
use crate::auth::model::{IdentityProvider, PersonName};

/// Profile data requested from the provider alongside the identity token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthorizationScope {
    Email,
    FullName,
}

/// What the presenter is asked to show for one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub provider: IdentityProvider,
    /// Digest of the attempt's raw nonce; the provider embeds it in the ID token.
    pub hashed_nonce: String,
    pub scopes: Vec<AuthorizationScope>,
}

/// Raw result reported by the authorization UI.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthorizationResponse {
    /// Identity token bytes as delivered by the platform UI.
    pub identity_token: Option<Vec<u8>>,
    pub access_token: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<PersonName>,
    pub provider_user_id: String,
}

impl AuthorizationResponse {
    pub fn new(provider_user_id: impl Into<String>) -> Self {
        Self {
            provider_user_id: provider_user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_identity_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.identity_token = Some(token.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_full_name(mut self, name: PersonName) -> Self {
        self.full_name = Some(name);
        self
    }
}

impl fmt::Debug for AuthorizationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationResponse")
            .field(
                "identity_token",
                &self.identity_token.as_ref().map(|_| "<redacted>"),
            )
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("provider_user_id", &self.provider_user_id)
            .finish()
    }
}

/// Failure reported by the authorization UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresentationError {
    Cancelled,
    Failed(ProviderError),
}

/// Platform UI capable of running one provider authorization.
///
/// `present` must return promptly; the outcome is reported later, from any
/// thread, through the [`AuthorizationCompletion`].
pub trait AuthorizationPresenter: Send + Sync {
    fn present(&self, request: AuthorizationRequest, completion: AuthorizationCompletion);
}

/// Looks up the presenter to use when an attempt starts.
pub type PresenterResolver =
    Arc<dyn Fn() -> Option<Arc<dyn AuthorizationPresenter>> + Send + Sync + 'static>;
