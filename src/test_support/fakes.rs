//! Scripted stand-ins for the kit's collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::auth::credential_source::{CredentialExchange, CredentialSource};
use crate::auth::error::{ExchangeError, ExchangeErrorCode, ProviderError};
use crate::auth::model::SessionIdentity;
use crate::auth::nonce::NonceProvider;
use crate::auth::oauth::{
    AuthCredential, AuthorizationCompletion, AuthorizationPresenter, AuthorizationRequest,
    AuthorizationResponse,
};
use crate::test_support::unsigned_id_token;

pub const FAKE_ANONYMOUS_UID: &str = "anon-uid";

/// Nonce provider returning the same raw nonce every time.
#[derive(Debug, Clone)]
pub struct FixedNonceProvider {
    raw: String,
}

impl FixedNonceProvider {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

impl NonceProvider for FixedNonceProvider {
    fn make_raw_nonce(&self) -> String {
        self.raw.clone()
    }
}

/// What a [`ScriptedPresenter`] does with the next attempt it is shown.
#[derive(Debug, Clone)]
pub enum PresenterAction {
    /// Completes with the response unchanged.
    Approve(AuthorizationResponse),
    /// Completes with the response plus an ID token whose `nonce` claim is
    /// the request's hashed nonce.
    ApproveSigned(AuthorizationResponse),
    Fail(ProviderError),
    Cancel,
    /// Keeps the completion for the test to resolve via `take_held`.
    Hold,
    DropCompletion,
}

#[derive(Debug, Default)]
pub struct ScriptedPresenter {
    actions: Mutex<VecDeque<PresenterAction>>,
    requests: Mutex<Vec<AuthorizationRequest>>,
    held: Mutex<Option<AuthorizationCompletion>>,
}

impl ScriptedPresenter {
    pub fn new(actions: Vec<PresenterAction>) -> Arc<Self> {
        Arc::new(Self {
            actions: Mutex::new(actions.into()),
            ..Default::default()
        })
    }

    pub fn requests(&self) -> Vec<AuthorizationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn take_held(&self) -> Option<AuthorizationCompletion> {
        self.held.lock().unwrap().take()
    }
}

impl AuthorizationPresenter for ScriptedPresenter {
    fn present(&self, request: AuthorizationRequest, completion: AuthorizationCompletion) {
        self.requests.lock().unwrap().push(request.clone());
        let action = self
            .actions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PresenterAction::Cancel);

        match action {
            PresenterAction::Approve(response) => {
                let _ = completion.complete(response);
            }
            PresenterAction::ApproveSigned(response) => {
                let token = unsigned_id_token(json!({
                    "iss": "https://appleid.apple.com",
                    "sub": response.provider_user_id,
                    "nonce": request.hashed_nonce,
                }));
                let _ = completion.complete(response.with_identity_token(token));
            }
            PresenterAction::Fail(error) => {
                let _ = completion.fail(error);
            }
            PresenterAction::Cancel => {
                let _ = completion.cancel();
            }
            PresenterAction::Hold => {
                *self.held.lock().unwrap() = Some(completion);
            }
            PresenterAction::DropCompletion => drop(completion),
        }
    }
}

/// Calls observed by a [`FakeCredentialSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Link(AuthCredential),
    SignIn(AuthCredential),
    CreateAnonymous,
    EndSession,
    PasswordReset(String),
}

impl SourceCall {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceCall::Link(_) => "link",
            SourceCall::SignIn(_) => "sign_in",
            SourceCall::CreateAnonymous => "create_anonymous",
            SourceCall::EndSession => "end_session",
            SourceCall::PasswordReset(_) => "password_reset",
        }
    }
}

/// Credential source answering link and sign-in calls from queued results.
///
/// Unscripted link or sign-in calls fail with a backend error.
#[derive(Debug, Default)]
pub struct FakeCredentialSource {
    link_results: Mutex<VecDeque<Result<CredentialExchange, ExchangeError>>>,
    sign_in_results: Mutex<VecDeque<Result<SessionIdentity, ExchangeError>>>,
    current: Mutex<Option<SessionIdentity>>,
    anonymous_sessions: Mutex<u32>,
    calls: Mutex<Vec<SourceCall>>,
}

impl FakeCredentialSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_session(identity: SessionIdentity) -> Arc<Self> {
        let source = Self::default();
        *source.current.lock().unwrap() = Some(identity);
        Arc::new(source)
    }

    pub fn push_link(&self, result: Result<CredentialExchange, ExchangeError>) {
        self.link_results.lock().unwrap().push_back(result);
    }

    pub fn push_sign_in(&self, result: Result<SessionIdentity, ExchangeError>) {
        self.sign_in_results.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_kinds(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(SourceCall::kind).collect()
    }

    fn record(&self, call: SourceCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn unscripted(operation: &str) -> ExchangeError {
        ExchangeError::new(
            ExchangeErrorCode::Backend,
            format!("no scripted result for {operation}"),
        )
    }
}

#[async_trait]
impl CredentialSource for FakeCredentialSource {
    async fn exchange_and_link(
        &self,
        credential: &AuthCredential,
    ) -> Result<CredentialExchange, ExchangeError> {
        self.record(SourceCall::Link(credential.clone()));
        if self.current.lock().unwrap().is_none() {
            return Err(ExchangeError::no_current_session());
        }
        let result = self
            .link_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("link")));
        if let Ok(exchange) = &result {
            *self.current.lock().unwrap() = Some(exchange.identity.clone());
        }
        result
    }

    async fn exchange_and_sign_in(
        &self,
        credential: &AuthCredential,
    ) -> Result<SessionIdentity, ExchangeError> {
        self.record(SourceCall::SignIn(credential.clone()));
        let result = self
            .sign_in_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("sign-in")));
        if let Ok(identity) = &result {
            *self.current.lock().unwrap() = Some(identity.clone());
        }
        result
    }

    async fn create_anonymous_session(&self) -> Result<SessionIdentity, ExchangeError> {
        self.record(SourceCall::CreateAnonymous);
        let mut created = self.anonymous_sessions.lock().unwrap();
        *created += 1;
        // First session keeps the well-known uid, later ones get a suffix.
        let uid = match *created {
            1 => FAKE_ANONYMOUS_UID.to_string(),
            n => format!("{FAKE_ANONYMOUS_UID}-{n}"),
        };
        let identity = SessionIdentity::anonymous(uid);
        *self.current.lock().unwrap() = Some(identity.clone());
        Ok(identity)
    }

    async fn end_session(&self) -> Result<(), ExchangeError> {
        self.record(SourceCall::EndSession);
        self.current.lock().unwrap().take();
        Ok(())
    }

    fn current_identity(&self) -> Option<SessionIdentity> {
        self.current.lock().unwrap().clone()
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ExchangeError> {
        self.record(SourceCall::PasswordReset(email.to_string()));
        Ok(())
    }
}
