//! Boundary to the identity backend that turns credentials into sessions.

mod rest;

pub use rest::{RestCredentialSource, RestCredentialSourceBuilder};

use async_trait::async_trait;

use crate::auth::error::{ExchangeError, ExchangeErrorCode};
use crate::auth::model::SessionIdentity;
use crate::auth::oauth::AuthCredential;

/// Result of attaching a credential to the current session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialExchange {
    pub identity: SessionIdentity,
    /// Backend's own view of whether an account was created. Informational.
    pub is_new_account: bool,
}

/// Backend capable of exchanging credentials for sessions.
///
/// Implementations hold the current session. `exchange_and_link` requires one;
/// `exchange_and_sign_in` replaces it.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn exchange_and_link(
        &self,
        credential: &AuthCredential,
    ) -> Result<CredentialExchange, ExchangeError>;

    async fn exchange_and_sign_in(
        &self,
        credential: &AuthCredential,
    ) -> Result<SessionIdentity, ExchangeError>;

    async fn create_anonymous_session(&self) -> Result<SessionIdentity, ExchangeError>;

    async fn end_session(&self) -> Result<(), ExchangeError>;

    fn current_identity(&self) -> Option<SessionIdentity>;

    async fn send_password_reset(&self, email: &str) -> Result<(), ExchangeError>;
}

/// Why a link was refused in favor of signing in to an existing account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    EmailAlreadyInUse,
    CredentialAlreadyInUse,
    AccountExistsWithDifferentCredential,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeFailure {
    Conflict(ConflictKind),
    Fatal(ExchangeError),
}

/// Separates link conflicts, which are recoverable by signing in, from every
/// other failure.
pub fn classify_exchange_error(error: ExchangeError) -> ExchangeFailure {
    match error.code {
        ExchangeErrorCode::EmailAlreadyInUse => {
            ExchangeFailure::Conflict(ConflictKind::EmailAlreadyInUse)
        }
        ExchangeErrorCode::CredentialAlreadyInUse => {
            ExchangeFailure::Conflict(ConflictKind::CredentialAlreadyInUse)
        }
        ExchangeErrorCode::AccountExistsWithDifferentCredential => {
            ExchangeFailure::Conflict(ConflictKind::AccountExistsWithDifferentCredential)
        }
        _ => ExchangeFailure::Fatal(error),
    }
}
