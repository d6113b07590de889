use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity providers a session can be backed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    Anonymous,
    Apple,
    Google,
    Email,
}

impl IdentityProvider {
    /// Provider id understood by the identity backend.
    pub fn provider_id(self) -> &'static str {
        match self {
            IdentityProvider::Anonymous => "anonymous",
            IdentityProvider::Apple => "apple.com",
            IdentityProvider::Google => "google.com",
            IdentityProvider::Email => "password",
        }
    }

    /// True for providers that go through an external authorization UI.
    pub fn is_federated(self) -> bool {
        matches!(self, IdentityProvider::Apple | IdentityProvider::Google)
    }

    pub fn from_provider_id(provider_id: &str) -> Option<Self> {
        match provider_id {
            "anonymous" => Some(IdentityProvider::Anonymous),
            "apple.com" => Some(IdentityProvider::Apple),
            "google.com" => Some(IdentityProvider::Google),
            "password" => Some(IdentityProvider::Email),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_id())
    }
}

/// The authenticated subject as the application sees it.
///
/// Snapshots are produced fresh by every successful operation and never
/// mutated in place; the `with_*` helpers return new values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    /// Provider-stable user identifier (e.g. the Apple `sub`).
    pub provider_user_id: Option<String>,
    pub provider_id: Option<String>,
    pub is_anonymous: bool,
}

impl SessionIdentity {
    pub fn anonymous(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            provider_id: Some(IdentityProvider::Anonymous.provider_id().to_string()),
            is_anonymous: true,
            ..Default::default()
        }
    }

    /// Fills fields the backend left empty from the provider material of the
    /// same attempt. Values reported by the backend always win.
    pub fn with_provider_profile(self, material: &ProviderMaterial) -> Self {
        Self {
            email: self.email.or_else(|| material.email.clone()),
            display_name: self
                .display_name
                .or_else(|| material.full_name.as_ref().and_then(PersonName::formatted)),
            provider_user_id: self
                .provider_user_id
                .or_else(|| Some(material.provider_user_id.clone())),
            provider_id: self
                .provider_id
                .or_else(|| Some(material.provider.provider_id().to_string())),
            ..self
        }
    }
}

/// Normalized result of every upgrade or sign-in operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeOutcome {
    pub identity: SessionIdentity,
    /// True only when the credential was attached to the current session.
    pub is_new_account: bool,
    pub provider: IdentityProvider,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub nickname: Option<String>,
}

impl PersonName {
    /// `"Given Family"`, falling back to the nickname. `None` when all parts are empty.
    pub fn formatted(&self) -> Option<String> {
        let parts: Vec<&str> = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            return self
                .nickname
                .as_deref()
                .map(str::trim)
                .filter(|nick| !nick.is_empty())
                .map(str::to_string);
        }
        Some(parts.join(" "))
    }
}

/// Output of one authorization UI round.
///
/// Created per attempt and consumed by the credential exchange right away.
/// Providers commonly send `email` and `full_name` on first consent only.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderMaterial {
    pub provider: IdentityProvider,
    pub id_token: String,
    pub raw_nonce: String,
    pub access_token: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<PersonName>,
    pub provider_user_id: String,
}

impl fmt::Debug for ProviderMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderMaterial")
            .field("provider", &self.provider)
            .field("id_token", &"<redacted>")
            .field("raw_nonce", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("provider_user_id", &self.provider_user_id)
            .finish()
    }
}
