use std::sync::{Arc, OnceLock};

use crate::auth::credential_source::{CredentialSource, RestCredentialSource};
use crate::auth::error::{AuthKitError, AuthKitResult};
use crate::auth::logger::LOGGER;
use crate::auth::model::{IdentityProvider, ProviderMaterial, SessionIdentity, UpgradeOutcome};
use crate::auth::nonce::NonceProvider;
use crate::auth::oauth::{AuthorizationBridge, AuthorizationPresenter};
use crate::auth::orchestrator::IdentityUpgrader;
use crate::auth::profile_cache::{InMemoryProfileCache, ProfileCache, ProfileSnapshot};

static SHARED: OnceLock<Arc<AuthKit>> = OnceLock::new();

/// Application-facing entry point.
///
/// Federated operations authorize through the bridge, record first-seen
/// profile fields in the [`ProfileCache`] and then hand the material to the
/// [`IdentityUpgrader`].
pub struct AuthKit {
    upgrader: IdentityUpgrader,
    profile_cache: Arc<dyn ProfileCache>,
}

impl std::fmt::Debug for AuthKit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKit")
            .field("upgrader", &self.upgrader)
            .finish()
    }
}

impl AuthKit {
    pub fn builder() -> AuthKitBuilder {
        AuthKitBuilder::default()
    }

    /// Installs the process-wide instance. Only the first call succeeds.
    pub fn install_shared(kit: Arc<AuthKit>) -> AuthKitResult<Arc<AuthKit>> {
        SHARED.set(Arc::clone(&kit)).map_err(|_| {
            AuthKitError::InvalidState("A shared AuthKit is already installed.".into())
        })?;
        Ok(kit)
    }

    pub fn shared() -> Option<Arc<AuthKit>> {
        SHARED.get().cloned()
    }

    pub fn configure_presenter<F>(&self, resolver: F)
    where
        F: Fn() -> Option<Arc<dyn AuthorizationPresenter>> + Send + Sync + 'static,
    {
        self.upgrader.bridge().configure_presenter(resolver);
    }

    pub fn upgrader(&self) -> &IdentityUpgrader {
        &self.upgrader
    }

    pub fn cached_profile(&self) -> AuthKitResult<Option<ProfileSnapshot>> {
        self.profile_cache.load()
    }

    /// Upgrades the current (usually anonymous) session with `provider`.
    pub async fn upgrade(&self, provider: IdentityProvider) -> AuthKitResult<UpgradeOutcome> {
        let material = self.upgrader.authorize(provider).await?;
        self.remember_profile(&material);
        self.upgrader.upgrade_with_material(material).await
    }

    pub async fn upgrade_to_apple(&self) -> AuthKitResult<UpgradeOutcome> {
        self.upgrade(IdentityProvider::Apple).await
    }

    pub async fn upgrade_to_google(&self) -> AuthKitResult<UpgradeOutcome> {
        self.upgrade(IdentityProvider::Google).await
    }

    pub async fn sign_in(&self, provider: IdentityProvider) -> AuthKitResult<UpgradeOutcome> {
        let material = self.upgrader.authorize(provider).await?;
        self.remember_profile(&material);
        self.upgrader.sign_in_with_material(material).await
    }

    pub async fn sign_in_anonymously(&self) -> AuthKitResult<SessionIdentity> {
        self.upgrader.sign_in_anonymously().await
    }

    /// Attaches an email/password login to the current session.
    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> AuthKitResult<UpgradeOutcome> {
        self.upgrader
            .upgrade_with_email_password(email, password)
            .await
    }

    pub async fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> AuthKitResult<UpgradeOutcome> {
        self.upgrader
            .sign_in_with_email_password(email, password)
            .await
    }

    pub async fn send_password_reset(&self, email: &str) -> AuthKitResult<()> {
        self.upgrader.send_password_reset_email(email).await
    }

    pub async fn sign_out(&self) -> AuthKitResult<()> {
        self.upgrader.sign_out().await
    }

    pub fn current_session(&self) -> Option<SessionIdentity> {
        self.upgrader.current_session()
    }

    fn remember_profile(&self, material: &ProviderMaterial) {
        let snapshot = ProfileSnapshot::from_material(material);
        if let Err(err) = self.profile_cache.save(&snapshot) {
            LOGGER.warn(format!("Could not cache {} profile: {err}", material.provider));
        }
    }
}

#[derive(Default)]
pub struct AuthKitBuilder {
    api_key: Option<String>,
    credential_source: Option<Arc<dyn CredentialSource>>,
    bridge: Option<Arc<AuthorizationBridge>>,
    nonce_provider: Option<Arc<dyn NonceProvider>>,
    profile_cache: Option<Arc<dyn ProfileCache>>,
}

impl AuthKitBuilder {
    /// Uses a [`RestCredentialSource`] with default endpoints for `api_key`.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credential_source = Some(source);
        self
    }

    pub fn with_bridge(mut self, bridge: Arc<AuthorizationBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Ignored when a bridge is supplied with [`Self::with_bridge`].
    pub fn with_nonce_provider(mut self, provider: Arc<dyn NonceProvider>) -> Self {
        self.nonce_provider = Some(provider);
        self
    }

    pub fn with_profile_cache(mut self, cache: Arc<dyn ProfileCache>) -> Self {
        self.profile_cache = Some(cache);
        self
    }

    pub fn build(self) -> AuthKitResult<AuthKit> {
        let source = match (self.credential_source, self.api_key) {
            (Some(source), _) => source,
            (None, Some(api_key)) => {
                Arc::new(RestCredentialSource::builder(api_key).build()?) as Arc<dyn CredentialSource>
            }
            (None, None) => {
                return Err(AuthKitError::Configuration(
                    "A credential source or API key is required".into(),
                ))
            }
        };
        let bridge = match (self.bridge, self.nonce_provider) {
            (Some(bridge), _) => bridge,
            (None, Some(nonce_provider)) => {
                Arc::new(AuthorizationBridge::with_nonce_provider(nonce_provider))
            }
            (None, None) => Arc::new(AuthorizationBridge::new()),
        };
        let profile_cache = self
            .profile_cache
            .unwrap_or_else(|| Arc::new(InMemoryProfileCache::default()));

        Ok(AuthKit {
            upgrader: IdentityUpgrader::new(source, bridge),
            profile_cache,
        })
    }
}
