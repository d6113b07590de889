use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use futures::channel::oneshot;

use crate::auth::error::{AuthKitError, AuthKitResult, ProviderError};
use crate::auth::logger::LOGGER;
use crate::auth::model::{IdentityProvider, ProviderMaterial};
use crate::auth::nonce::{DefaultNonceProvider, NonceProvider};
use crate::auth::oauth::{
    AuthorizationPresenter, AuthorizationRequest, AuthorizationResponse, AuthorizationScope,
    PresentationError, PresenterResolver,
};
use crate::util::jwt::decode_claims;

type AttemptOutcome = (Result<AuthorizationResponse, PresentationError>, String);

struct PendingAttempt {
    id: u64,
    raw_nonce: String,
    sender: oneshot::Sender<AttemptOutcome>,
}

#[derive(Default)]
struct BridgeState {
    next_attempt: u64,
    pending: Option<PendingAttempt>,
}

impl BridgeState {
    fn take_pending(&mut self, attempt_id: u64) -> Option<PendingAttempt> {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.id == attempt_id)
        {
            self.pending.take()
        } else {
            None
        }
    }
}

/// Turns a callback-driven authorization UI into a single awaitable result.
///
/// At most one attempt is pending per bridge. Each attempt gets a fresh raw
/// nonce; the presenter only sees its digest, and the raw value travels with
/// the resulting [`ProviderMaterial`] to the credential exchange.
pub struct AuthorizationBridge {
    nonce_provider: Arc<dyn NonceProvider>,
    presenter_resolver: Mutex<Option<PresenterResolver>>,
    state: Arc<Mutex<BridgeState>>,
}

impl Default for AuthorizationBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuthorizationBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationBridge")
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl AuthorizationBridge {
    pub fn new() -> Self {
        Self::with_nonce_provider(Arc::new(DefaultNonceProvider))
    }

    pub fn with_nonce_provider(nonce_provider: Arc<dyn NonceProvider>) -> Self {
        Self {
            nonce_provider,
            presenter_resolver: Mutex::new(None),
            state: Arc::new(Mutex::new(BridgeState::default())),
        }
    }

    /// Registers the callback consulted at the start of every attempt.
    pub fn configure_presenter<F>(&self, resolver: F)
    where
        F: Fn() -> Option<Arc<dyn AuthorizationPresenter>> + Send + Sync + 'static,
    {
        *self.presenter_resolver.lock().unwrap() = Some(Arc::new(resolver));
    }

    pub fn clear_presenter(&self) {
        *self.presenter_resolver.lock().unwrap() = None;
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().unwrap().pending.is_some()
    }

    /// Runs one authorization round for `provider`.
    ///
    /// Fails fast with [`AuthKitError::AuthorizationInProgress`] while another
    /// attempt is pending. Dropping the returned future releases the slot.
    pub async fn authorize(&self, provider: IdentityProvider) -> AuthKitResult<ProviderMaterial> {
        self.ensure_idle(provider)?;
        // The resolver runs outside the state lock, so the slot is checked again when claimed.
        let presenter = self.resolve_presenter()?;

        let (sender, receiver) = oneshot::channel();
        let (attempt_id, raw_nonce) = {
            let mut state = self.state.lock().unwrap();
            if state.pending.is_some() {
                return Err(Self::in_progress(provider));
            }
            state.next_attempt += 1;
            let attempt_id = state.next_attempt;
            let raw_nonce = self.nonce_provider.make_raw_nonce();
            state.pending = Some(PendingAttempt {
                id: attempt_id,
                raw_nonce: raw_nonce.clone(),
                sender,
            });
            (attempt_id, raw_nonce)
        };
        let _guard = PendingGuard {
            state: Arc::clone(&self.state),
            attempt_id,
        };

        let hashed_nonce = self.nonce_provider.digest(&raw_nonce);
        let request = AuthorizationRequest {
            provider,
            hashed_nonce: hashed_nonce.clone(),
            scopes: vec![AuthorizationScope::Email, AuthorizationScope::FullName],
        };
        let completion = AuthorizationCompletion {
            attempt_id,
            state: Arc::downgrade(&self.state),
            resolved: false,
        };

        LOGGER.debug(format!(
            "Presenting {provider} authorization (attempt {attempt_id})"
        ));
        presenter.present(request, completion);

        let (result, pending_nonce) = receiver.await.map_err(|_| {
            AuthKitError::InvalidState(
                "Authorization completion was dropped without a result.".into(),
            )
        })?;

        let response = match result {
            Ok(response) => response,
            Err(PresentationError::Cancelled) => {
                LOGGER.debug(format!("Attempt {attempt_id} cancelled by the user"));
                return Err(AuthKitError::UserCancelled);
            }
            Err(PresentationError::Failed(error)) => return Err(AuthKitError::Provider(error)),
        };

        if pending_nonce != raw_nonce {
            return Err(AuthKitError::InvalidState(
                "Missing pending nonce state.".into(),
            ));
        }

        let id_token = decode_identity_token(response.identity_token, provider)?;
        ensure_nonce_claim(&id_token, &hashed_nonce)?;

        Ok(ProviderMaterial {
            provider,
            id_token,
            raw_nonce,
            access_token: response.access_token,
            email: response.email,
            full_name: response.full_name,
            provider_user_id: response.provider_user_id,
        })
    }

    fn ensure_idle(&self, provider: IdentityProvider) -> AuthKitResult<()> {
        if self.state.lock().unwrap().pending.is_some() {
            return Err(Self::in_progress(provider));
        }
        Ok(())
    }

    fn in_progress(provider: IdentityProvider) -> AuthKitError {
        LOGGER.debug(format!(
            "Rejecting {provider} authorization: another attempt is pending"
        ));
        AuthKitError::AuthorizationInProgress
    }

    fn resolve_presenter(&self) -> AuthKitResult<Arc<dyn AuthorizationPresenter>> {
        let resolver = self.presenter_resolver.lock().unwrap().clone();
        let resolver = resolver.ok_or_else(|| {
            AuthKitError::PresenterUnavailable("No presenter resolver is configured.".into())
        })?;
        resolver().ok_or_else(|| {
            AuthKitError::PresenterUnavailable("The presenter resolver returned nothing.".into())
        })
    }
}

fn decode_identity_token(
    token: Option<Vec<u8>>,
    provider: IdentityProvider,
) -> AuthKitResult<String> {
    let bytes = token
        .ok_or_else(|| AuthKitError::TokenMissing(format!("{provider} identityToken is missing.")))?;
    let token = String::from_utf8(bytes).map_err(|_| {
        AuthKitError::TokenMissing(format!("Unable to decode {provider} identityToken."))
    })?;
    if token.trim().is_empty() {
        return Err(AuthKitError::TokenMissing(format!(
            "{provider} identityToken is empty."
        )));
    }
    Ok(token)
}

/// Opaque tokens pass; a JWT whose `nonce` claim differs from the digest does not.
fn ensure_nonce_claim(id_token: &str, hashed_nonce: &str) -> AuthKitResult<()> {
    let claim = decode_claims(id_token).and_then(|claims| claims.nonce);
    match claim {
        Some(nonce) if nonce != hashed_nonce => Err(AuthKitError::InvalidState(
            "Identity token nonce does not match the pending request.".into(),
        )),
        _ => Ok(()),
    }
}

struct PendingGuard {
    state: Arc<Mutex<BridgeState>>,
    attempt_id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if state.take_pending(self.attempt_id).is_some() {
                LOGGER.debug(format!(
                    "Authorization attempt {} abandoned before completion",
                    self.attempt_id
                ));
            }
        }
    }
}

/// One-shot handle the presenter uses to report the outcome of its attempt.
///
/// Every resolving method consumes the handle. Dropping it unresolved fails
/// the attempt with [`AuthKitError::InvalidState`].
pub struct AuthorizationCompletion {
    attempt_id: u64,
    state: Weak<Mutex<BridgeState>>,
    resolved: bool,
}

impl fmt::Debug for AuthorizationCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationCompletion")
            .field("attempt_id", &self.attempt_id)
            .finish()
    }
}

impl AuthorizationCompletion {
    pub fn attempt_id(&self) -> u64 {
        self.attempt_id
    }

    pub fn complete(self, response: AuthorizationResponse) -> Result<(), StaleCompletion> {
        self.resolve(Ok(response))
    }

    pub fn fail(self, error: ProviderError) -> Result<(), StaleCompletion> {
        self.resolve(Err(PresentationError::Failed(error)))
    }

    pub fn cancel(self) -> Result<(), StaleCompletion> {
        self.resolve(Err(PresentationError::Cancelled))
    }

    fn resolve(
        mut self,
        result: Result<AuthorizationResponse, PresentationError>,
    ) -> Result<(), StaleCompletion> {
        self.resolved = true;
        let stale = StaleCompletion {
            attempt_id: self.attempt_id,
        };
        let Some(pending) = self.take_pending() else {
            LOGGER.warn(format!(
                "Ignoring stale completion for attempt {}",
                self.attempt_id
            ));
            return Err(stale);
        };
        pending
            .sender
            .send((result, pending.raw_nonce))
            .map_err(|_| stale)
    }

    fn take_pending(&self) -> Option<PendingAttempt> {
        let state = self.state.upgrade()?;
        let mut state = state.lock().ok()?;
        state.take_pending(self.attempt_id)
    }
}

impl Drop for AuthorizationCompletion {
    fn drop(&mut self) {
        if !self.resolved && self.take_pending().is_some() {
            LOGGER.warn(format!(
                "Completion for attempt {} dropped without a result",
                self.attempt_id
            ));
        }
    }
}

/// The attempt a completion belonged to is no longer pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleCompletion {
    pub attempt_id: u64,
}

impl fmt::Display for StaleCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Authorization attempt {} is no longer pending",
            self.attempt_id
        )
    }
}

impl std::error::Error for StaleCompletion {}
