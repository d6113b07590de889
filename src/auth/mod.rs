//! Anonymous-to-durable identity upgrades.
//!
//! [`AuthKit`] is the application entry point. Underneath it,
//! [`IdentityUpgrader`] drives the link-or-sign-in state machine over a
//! [`CredentialSource`] and an [`AuthorizationBridge`] that turns the
//! platform's authorization UI into a single awaitable result.

pub mod credential_source;
pub mod error;
pub mod kit;
mod logger;
pub mod model;
pub mod nonce;
pub mod oauth;
pub mod orchestrator;
pub mod profile_cache;

pub use credential_source::{
    classify_exchange_error, ConflictKind, CredentialExchange, CredentialSource, ExchangeFailure,
    RestCredentialSource, RestCredentialSourceBuilder,
};
pub use error::{AuthKitError, AuthKitResult, ExchangeError, ExchangeErrorCode, ProviderError};
pub use kit::{AuthKit, AuthKitBuilder};
pub use model::{IdentityProvider, PersonName, ProviderMaterial, SessionIdentity, UpgradeOutcome};
pub use nonce::{DefaultNonceProvider, NonceProvider, NONCE_LENGTH};
pub use oauth::{
    AuthCredential, AuthorizationBridge, AuthorizationCompletion, AuthorizationPresenter,
    AuthorizationRequest, AuthorizationResponse, AuthorizationScope, OAuthCredential,
    PresentationError, PresenterResolver, StaleCompletion,
};
pub use orchestrator::IdentityUpgrader;
pub use profile_cache::{FileProfileCache, InMemoryProfileCache, ProfileCache, ProfileSnapshot};
