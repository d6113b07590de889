use std::fmt;

pub type AuthKitResult<T> = Result<T, AuthKitError>;

/// Failure surfaced by the public auth operations.
///
/// Cancellation and presenter misconfiguration have dedicated variants so UI
/// code can stay silent for them while still reporting backend failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthKitError {
    /// No presenter resolver is configured, or it yielded no presenter.
    PresenterUnavailable(String),
    UserCancelled,
    /// The provider finished without usable token material.
    TokenMissing(String),
    /// Nonce or attempt bookkeeping is inconsistent.
    InvalidState(String),
    /// Another authorization is still pending on the same bridge.
    AuthorizationInProgress,
    /// Failure reported by the authorization UI or identity provider, unchanged.
    Provider(ProviderError),
    /// Failure reported by the credential exchange backend.
    Exchange(ExchangeError),
    ProfileCache(String),
    Configuration(String),
}

impl AuthKitError {
    /// True when the person dismissed the flow; callers usually show nothing.
    pub fn is_user_cancellation(&self) -> bool {
        matches!(self, AuthKitError::UserCancelled)
    }
}

impl fmt::Display for AuthKitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthKitError::PresenterUnavailable(message) => {
                write!(f, "Authorization presenter unavailable: {message}")
            }
            AuthKitError::UserCancelled => write!(f, "User cancelled sign-in"),
            AuthKitError::TokenMissing(message) => write!(f, "Token missing: {message}"),
            AuthKitError::InvalidState(message) => write!(f, "Invalid state: {message}"),
            AuthKitError::AuthorizationInProgress => {
                write!(f, "An authorization request is already in progress")
            }
            AuthKitError::Provider(err) => write!(f, "{err}"),
            AuthKitError::Exchange(err) => write!(f, "{err}"),
            AuthKitError::ProfileCache(message) => write!(f, "Profile cache error: {message}"),
            AuthKitError::Configuration(message) => write!(f, "Configuration error: {message}"),
        }
    }
}

impl std::error::Error for AuthKitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthKitError::Provider(err) => Some(err),
            AuthKitError::Exchange(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ExchangeError> for AuthKitError {
    fn from(error: ExchangeError) -> Self {
        AuthKitError::Exchange(error)
    }
}

impl From<ProviderError> for AuthKitError {
    fn from(error: ProviderError) -> Self {
        AuthKitError::Provider(error)
    }
}

/// Error reported by an identity provider or its authorization UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "Provider error ({code}): {}", self.message),
            None => write!(f, "Provider error: {}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Closed set of failure kinds the credential exchange can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeErrorCode {
    EmailAlreadyInUse,
    CredentialAlreadyInUse,
    AccountExistsWithDifferentCredential,
    InvalidCredential,
    NoCurrentSession,
    TooManyRequests,
    Network,
    Backend,
}

impl ExchangeErrorCode {
    /// Maps an Identity Toolkit error message (`"EMAIL_EXISTS"`,
    /// `"INVALID_PASSWORD : detail"`, ...) to a code.
    pub fn from_backend_message(message: &str) -> Self {
        let code = message.split(':').next().unwrap_or_default().trim();
        match code {
            "EMAIL_EXISTS" => ExchangeErrorCode::EmailAlreadyInUse,
            "FEDERATED_USER_ID_ALREADY_LINKED" | "CREDENTIAL_ALREADY_IN_USE" => {
                ExchangeErrorCode::CredentialAlreadyInUse
            }
            "NEED_CONFIRMATION" => ExchangeErrorCode::AccountExistsWithDifferentCredential,
            "INVALID_PASSWORD"
            | "EMAIL_NOT_FOUND"
            | "INVALID_LOGIN_CREDENTIALS"
            | "INVALID_IDP_RESPONSE"
            | "INVALID_EMAIL"
            | "MISSING_OR_INVALID_NONCE"
            | "USER_DISABLED" => ExchangeErrorCode::InvalidCredential,
            "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" => {
                ExchangeErrorCode::NoCurrentSession
            }
            "TOO_MANY_ATTEMPTS_TRY_LATER" | "QUOTA_EXCEEDED" => ExchangeErrorCode::TooManyRequests,
            _ => ExchangeErrorCode::Backend,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeErrorCode::EmailAlreadyInUse => "email-already-in-use",
            ExchangeErrorCode::CredentialAlreadyInUse => "credential-already-in-use",
            ExchangeErrorCode::AccountExistsWithDifferentCredential => {
                "account-exists-with-different-credential"
            }
            ExchangeErrorCode::InvalidCredential => "invalid-credential",
            ExchangeErrorCode::NoCurrentSession => "no-current-session",
            ExchangeErrorCode::TooManyRequests => "too-many-requests",
            ExchangeErrorCode::Network => "network-request-failed",
            ExchangeErrorCode::Backend => "internal-error",
        }
    }
}

impl fmt::Display for ExchangeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeError {
    pub code: ExchangeErrorCode,
    pub message: String,
}

impl ExchangeError {
    pub fn new(code: ExchangeErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ExchangeErrorCode::Network, message)
    }

    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::new(ExchangeErrorCode::InvalidCredential, message)
    }

    pub fn no_current_session() -> Self {
        Self::new(
            ExchangeErrorCode::NoCurrentSession,
            "No session is active to link the credential to",
        )
    }

    /// Builds an error from a backend error message, keeping the raw text.
    pub fn from_backend_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ExchangeErrorCode::from_backend_message(&message), message)
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential exchange failed ({}): {}", self.code, self.message)
    }
}

impl std::error::Error for ExchangeError {}
