use std::sync::Arc;

use crate::auth::credential_source::{classify_exchange_error, CredentialSource, ExchangeFailure};
use crate::auth::error::{AuthKitError, AuthKitResult};
use crate::auth::logger::LOGGER;
use crate::auth::model::{IdentityProvider, ProviderMaterial, SessionIdentity, UpgradeOutcome};
use crate::auth::oauth::{AuthCredential, AuthorizationBridge, OAuthCredential};

/// Upgrades the current session to a durable identity.
///
/// Linking is tried first so the anonymous `uid` and everything keyed on it
/// survive. When the backend refuses the link because the credential already
/// belongs to another account, the upgrader signs in to that account instead
/// and reports `is_new_account = false`. No other failure is retried.
pub struct IdentityUpgrader {
    source: Arc<dyn CredentialSource>,
    bridge: Arc<AuthorizationBridge>,
}

impl std::fmt::Debug for IdentityUpgrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityUpgrader")
            .field("bridge", &self.bridge)
            .finish()
    }
}

impl IdentityUpgrader {
    pub fn new(source: Arc<dyn CredentialSource>, bridge: Arc<AuthorizationBridge>) -> Self {
        Self { source, bridge }
    }

    pub fn bridge(&self) -> &Arc<AuthorizationBridge> {
        &self.bridge
    }

    pub fn credential_source(&self) -> &Arc<dyn CredentialSource> {
        &self.source
    }

    /// Runs the provider UI and attaches the result to the current session.
    pub async fn upgrade_current_session(
        &self,
        provider: IdentityProvider,
    ) -> AuthKitResult<UpgradeOutcome> {
        let material = self.authorize(provider).await?;
        self.upgrade_with_material(material).await
    }

    /// Runs the provider UI and signs in without linking.
    pub async fn sign_in(&self, provider: IdentityProvider) -> AuthKitResult<UpgradeOutcome> {
        let material = self.authorize(provider).await?;
        self.sign_in_with_material(material).await
    }

    pub async fn upgrade_with_material(
        &self,
        material: ProviderMaterial,
    ) -> AuthKitResult<UpgradeOutcome> {
        let credential = AuthCredential::from(OAuthCredential::from_material(&material));
        let outcome = self.link_or_fall_back(&credential, material.provider).await?;
        Ok(UpgradeOutcome {
            identity: outcome.identity.with_provider_profile(&material),
            ..outcome
        })
    }

    pub async fn sign_in_with_material(
        &self,
        material: ProviderMaterial,
    ) -> AuthKitResult<UpgradeOutcome> {
        let credential = AuthCredential::from(OAuthCredential::from_material(&material));
        let identity = self.source.exchange_and_sign_in(&credential).await?;
        Ok(UpgradeOutcome {
            identity: identity.with_provider_profile(&material),
            is_new_account: false,
            provider: material.provider,
        })
    }

    /// Attaches an email/password pair to the current session, signing in to
    /// the owning account when the email is already registered.
    pub async fn upgrade_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthKitResult<UpgradeOutcome> {
        let credential = AuthCredential::email_password(email, password);
        self.link_or_fall_back(&credential, IdentityProvider::Email)
            .await
    }

    pub async fn sign_in_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthKitResult<UpgradeOutcome> {
        let credential = AuthCredential::email_password(email, password);
        let identity = self.source.exchange_and_sign_in(&credential).await?;
        Ok(UpgradeOutcome {
            identity,
            is_new_account: false,
            provider: IdentityProvider::Email,
        })
    }

    pub async fn sign_in_anonymously(&self) -> AuthKitResult<SessionIdentity> {
        let identity = self.source.create_anonymous_session().await?;
        LOGGER.debug(format!("Anonymous session {} ready", identity.uid));
        Ok(identity)
    }

    pub async fn sign_out(&self) -> AuthKitResult<()> {
        self.source.end_session().await?;
        Ok(())
    }

    pub async fn send_password_reset_email(&self, email: &str) -> AuthKitResult<()> {
        self.source.send_password_reset(email).await?;
        Ok(())
    }

    pub fn current_session(&self) -> Option<SessionIdentity> {
        self.source.current_identity()
    }

    /// Runs only the authorization UI for a federated provider.
    pub async fn authorize(&self, provider: IdentityProvider) -> AuthKitResult<ProviderMaterial> {
        if !provider.is_federated() {
            return Err(AuthKitError::InvalidState(format!(
                "{provider} has no authorization UI"
            )));
        }
        self.bridge.authorize(provider).await
    }

    async fn link_or_fall_back(
        &self,
        credential: &AuthCredential,
        provider: IdentityProvider,
    ) -> AuthKitResult<UpgradeOutcome> {
        match self.source.exchange_and_link(credential).await {
            Ok(exchange) => {
                LOGGER.debug(format!(
                    "Linked {provider} to {} (backend new-account flag: {})",
                    exchange.identity.uid, exchange.is_new_account
                ));
                Ok(UpgradeOutcome {
                    identity: exchange.identity,
                    is_new_account: true,
                    provider,
                })
            }
            Err(error) => match classify_exchange_error(error) {
                ExchangeFailure::Conflict(kind) => {
                    LOGGER.info(format!(
                        "Linking {provider} refused ({kind:?}); signing in to the existing account"
                    ));
                    let identity = self.source.exchange_and_sign_in(credential).await?;
                    Ok(UpgradeOutcome {
                        identity,
                        is_new_account: false,
                        provider,
                    })
                }
                ExchangeFailure::Fatal(error) => Err(error.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credential_source::CredentialExchange;
    use crate::auth::error::{ExchangeError, ExchangeErrorCode};
    use crate::auth::oauth::{AuthorizationPresenter, AuthorizationResponse};
    use crate::test_support::{
        FakeCredentialSource, FixedNonceProvider, PresenterAction, ScriptedPresenter, SourceCall,
    };

    const ANON_UID: &str = "anon-uid";
    const EXISTING_UID: &str = "existing-uid";

    fn upgrader(
        source: &Arc<FakeCredentialSource>,
        actions: Vec<PresenterAction>,
    ) -> IdentityUpgrader {
        let bridge = Arc::new(AuthorizationBridge::with_nonce_provider(Arc::new(
            FixedNonceProvider::new("raw-nonce"),
        )));
        let presenter = ScriptedPresenter::new(actions);
        bridge.configure_presenter(move || {
            Some(Arc::clone(&presenter) as Arc<dyn AuthorizationPresenter>)
        });
        IdentityUpgrader::new(Arc::clone(source) as Arc<dyn CredentialSource>, bridge)
    }

    fn approve(email: Option<&str>) -> PresenterAction {
        let response = AuthorizationResponse::new("001234.apple");
        PresenterAction::ApproveSigned(match email {
            Some(email) => response.with_email(email),
            None => response,
        })
    }

    fn linked(uid: &str) -> Result<CredentialExchange, ExchangeError> {
        Ok(CredentialExchange {
            identity: SessionIdentity {
                uid: uid.into(),
                provider_id: Some("apple.com".into()),
                ..Default::default()
            },
            is_new_account: false,
        })
    }

    fn existing_account() -> Result<SessionIdentity, ExchangeError> {
        Ok(SessionIdentity {
            uid: EXISTING_UID.into(),
            email: Some("existing@example.com".into()),
            ..Default::default()
        })
    }

    #[tokio::test(flavor = "current_thread")]
    async fn link_success_keeps_uid_and_reports_new_account() {
        let source = FakeCredentialSource::with_session(SessionIdentity::anonymous(ANON_UID));
        source.push_link(linked(ANON_UID));
        let upgrader = upgrader(&source, vec![approve(Some("ada@example.com"))]);

        let outcome = upgrader
            .upgrade_current_session(IdentityProvider::Apple)
            .await
            .unwrap();

        assert!(outcome.is_new_account);
        assert_eq!(outcome.provider, IdentityProvider::Apple);
        assert_eq!(outcome.identity.uid, ANON_UID);
        assert_eq!(outcome.identity.email.as_deref(), Some("ada@example.com"));
        assert_eq!(source.call_kinds(), ["link"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn repeat_consent_without_email_still_upgrades() {
        let source = FakeCredentialSource::with_session(SessionIdentity::anonymous(ANON_UID));
        source.push_link(linked(ANON_UID));
        let upgrader = upgrader(&source, vec![approve(None)]);

        let outcome = upgrader
            .upgrade_current_session(IdentityProvider::Apple)
            .await
            .unwrap();

        assert!(outcome.is_new_account);
        assert_eq!(outcome.identity.uid, ANON_UID);
        assert_eq!(outcome.identity.email, None);
        assert_eq!(
            outcome.identity.provider_user_id.as_deref(),
            Some("001234.apple")
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn every_conflict_falls_back_to_sign_in_with_same_credential() {
        for code in [
            ExchangeErrorCode::EmailAlreadyInUse,
            ExchangeErrorCode::CredentialAlreadyInUse,
            ExchangeErrorCode::AccountExistsWithDifferentCredential,
        ] {
            let source =
                FakeCredentialSource::with_session(SessionIdentity::anonymous(ANON_UID));
            source.push_link(Err(ExchangeError::new(code, "conflict")));
            source.push_sign_in(existing_account());
            let upgrader = upgrader(&source, vec![approve(None)]);

            let outcome = upgrader
                .upgrade_current_session(IdentityProvider::Apple)
                .await
                .unwrap();

            assert!(!outcome.is_new_account, "{code:?}");
            assert_eq!(outcome.identity.uid, EXISTING_UID);
            let calls = source.calls();
            assert_eq!(calls.len(), 2);
            match (&calls[0], &calls[1]) {
                (SourceCall::Link(linked), SourceCall::SignIn(signed_in)) => {
                    assert_eq!(linked, signed_in)
                }
                other => panic!("unexpected calls {other:?}"),
            }
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn non_conflict_failure_propagates_without_fallback() {
        let source = FakeCredentialSource::with_session(SessionIdentity::anonymous(ANON_UID));
        let failure = ExchangeError::network("offline");
        source.push_link(Err(failure.clone()));
        let upgrader = upgrader(&source, vec![approve(None)]);

        let err = upgrader
            .upgrade_current_session(IdentityProvider::Google)
            .await
            .unwrap_err();

        assert_eq!(err, AuthKitError::Exchange(failure));
        assert_eq!(source.call_kinds(), ["link"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_fallback_sign_in_propagates() {
        let source = FakeCredentialSource::with_session(SessionIdentity::anonymous(ANON_UID));
        source.push_link(Err(ExchangeError::new(
            ExchangeErrorCode::CredentialAlreadyInUse,
            "FEDERATED_USER_ID_ALREADY_LINKED",
        )));
        let failure = ExchangeError::new(ExchangeErrorCode::TooManyRequests, "slow down");
        source.push_sign_in(Err(failure.clone()));
        let upgrader = upgrader(&source, vec![approve(None)]);

        let err = upgrader
            .upgrade_current_session(IdentityProvider::Apple)
            .await
            .unwrap_err();

        assert_eq!(err, AuthKitError::Exchange(failure));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancellation_reaches_caller_without_backend_calls() {
        let source = FakeCredentialSource::with_session(SessionIdentity::anonymous(ANON_UID));
        let upgrader = upgrader(&source, vec![PresenterAction::Cancel]);

        let err = upgrader
            .upgrade_current_session(IdentityProvider::Apple)
            .await
            .unwrap_err();

        assert!(err.is_user_cancellation());
        assert!(source.calls().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sign_in_never_reports_new_account() {
        let source = FakeCredentialSource::new();
        source.push_sign_in(existing_account());
        let upgrader = upgrader(&source, vec![approve(Some("ada@example.com"))]);

        let outcome = upgrader.sign_in(IdentityProvider::Apple).await.unwrap();

        assert!(!outcome.is_new_account);
        assert_eq!(outcome.identity.uid, EXISTING_UID);
        assert_eq!(
            outcome.identity.email.as_deref(),
            Some("existing@example.com")
        );
        assert_eq!(source.call_kinds(), ["sign_in"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn email_password_conflict_signs_in_with_same_pair() {
        let source = FakeCredentialSource::with_session(SessionIdentity::anonymous(ANON_UID));
        source.push_link(Err(ExchangeError::from_backend_message("EMAIL_EXISTS")));
        source.push_sign_in(existing_account());
        let upgrader = upgrader(&source, Vec::new());

        let outcome = upgrader
            .upgrade_with_email_password("existing@example.com", "secret")
            .await
            .unwrap();

        assert!(!outcome.is_new_account);
        assert_eq!(outcome.provider, IdentityProvider::Email);
        let expected = AuthCredential::email_password("existing@example.com", "secret");
        assert_eq!(
            source.calls(),
            [
                SourceCall::Link(expected.clone()),
                SourceCall::SignIn(expected)
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn anonymous_session_lifecycle() {
        let source = FakeCredentialSource::new();
        let upgrader = upgrader(&source, Vec::new());

        let identity = upgrader.sign_in_anonymously().await.unwrap();
        assert!(identity.is_anonymous);
        assert_eq!(upgrader.current_session(), Some(identity));

        upgrader.sign_out().await.unwrap();
        assert_eq!(upgrader.current_session(), None);
        assert_eq!(source.call_kinds(), ["create_anonymous", "end_session"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn each_anonymous_sign_in_yields_a_distinct_identity() {
        let source = FakeCredentialSource::new();
        let upgrader = upgrader(&source, Vec::new());

        let first = upgrader.sign_in_anonymously().await.unwrap();
        let second = upgrader.sign_in_anonymously().await.unwrap();

        assert_ne!(first.uid, second.uid);
        assert!(second.is_anonymous);
        assert_eq!(upgrader.current_session(), Some(second));
        assert_eq!(source.call_kinds(), ["create_anonymous", "create_anonymous"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_sign_in_propagates_without_linking() {
        let source = FakeCredentialSource::with_session(SessionIdentity::anonymous(ANON_UID));
        let failure =
            ExchangeError::new(ExchangeErrorCode::InvalidCredential, "INVALID_IDP_RESPONSE");
        source.push_sign_in(Err(failure.clone()));
        let upgrader = upgrader(&source, vec![approve(None)]);

        let err = upgrader.sign_in(IdentityProvider::Apple).await.unwrap_err();

        assert_eq!(err, AuthKitError::Exchange(failure));
        assert_eq!(source.call_kinds(), ["sign_in"]);
        assert_eq!(
            upgrader.current_session(),
            Some(SessionIdentity::anonymous(ANON_UID))
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_email_sign_in_propagates() {
        let source = FakeCredentialSource::new();
        let failure =
            ExchangeError::new(ExchangeErrorCode::InvalidCredential, "INVALID_PASSWORD");
        source.push_sign_in(Err(failure.clone()));
        let upgrader = upgrader(&source, Vec::new());

        let err = upgrader
            .sign_in_with_email_password("ada@example.com", "wrong")
            .await
            .unwrap_err();

        assert_eq!(err, AuthKitError::Exchange(failure));
        assert_eq!(
            source.calls(),
            [SourceCall::SignIn(AuthCredential::email_password(
                "ada@example.com",
                "wrong"
            ))]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn password_reset_is_delegated() {
        let source = FakeCredentialSource::new();
        let upgrader = upgrader(&source, Vec::new());

        upgrader
            .send_password_reset_email("ada@example.com")
            .await
            .unwrap();

        assert_eq!(
            source.calls(),
            [SourceCall::PasswordReset("ada@example.com".into())]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn providers_without_ui_are_rejected() {
        let source = FakeCredentialSource::new();
        let upgrader = upgrader(&source, Vec::new());

        let err = upgrader
            .upgrade_current_session(IdentityProvider::Email)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthKitError::InvalidState(_)));
        assert!(source.calls().is_empty());
    }
}
