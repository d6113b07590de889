//! Cache for profile fields identity providers only reveal on first consent.
//!
//! Apple, for one, returns the email and name only the first time a person
//! authorizes an app. The kit stores what it sees so later sessions can still
//! show them. Saving merges: an absent field never erases a stored one.

mod file;

pub use file::FileProfileCache;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::auth::error::AuthKitResult;
use crate::auth::model::ProviderMaterial;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub provider_user_id: Option<String>,
}

impl ProfileSnapshot {
    /// Profile fields carried by one authorization attempt.
    pub fn from_material(material: &ProviderMaterial) -> Self {
        Self {
            email: non_empty(material.email.as_deref()),
            given_name: non_empty(
                material
                    .full_name
                    .as_ref()
                    .and_then(|name| name.given_name.as_deref()),
            ),
            provider_user_id: non_empty(Some(material.provider_user_id.as_str())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.given_name.is_none() && self.provider_user_id.is_none()
    }

    /// Overlays the present fields of `update` on top of `self`.
    pub fn merged_with(self, update: &ProfileSnapshot) -> Self {
        Self {
            email: update.email.clone().or(self.email),
            given_name: update.given_name.clone().or(self.given_name),
            provider_user_id: update.provider_user_id.clone().or(self.provider_user_id),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Storage for the last known [`ProfileSnapshot`].
///
/// Implementors provide raw `load`/`store`/`clear`; [`ProfileCache::save`]
/// applies the merge rule on top.
pub trait ProfileCache: Send + Sync {
    fn load(&self) -> AuthKitResult<Option<ProfileSnapshot>>;

    fn store(&self, snapshot: &ProfileSnapshot) -> AuthKitResult<()>;

    fn clear(&self) -> AuthKitResult<()>;

    /// Merges `update` into the stored snapshot and returns the result.
    fn save(&self, update: &ProfileSnapshot) -> AuthKitResult<ProfileSnapshot> {
        let merged = self.load()?.unwrap_or_default().merged_with(update);
        self.store(&merged)?;
        Ok(merged)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProfileCache {
    snapshot: Mutex<Option<ProfileSnapshot>>,
}

impl ProfileCache for InMemoryProfileCache {
    fn load(&self) -> AuthKitResult<Option<ProfileSnapshot>> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    fn store(&self, snapshot: &ProfileSnapshot) -> AuthKitResult<()> {
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> AuthKitResult<()> {
        self.snapshot.lock().unwrap().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::model::{IdentityProvider, PersonName};

    fn material(email: Option<&str>, given_name: Option<&str>) -> ProviderMaterial {
        ProviderMaterial {
            provider: IdentityProvider::Apple,
            id_token: "token".into(),
            raw_nonce: "nonce".into(),
            access_token: None,
            email: email.map(str::to_string),
            full_name: given_name.map(|given| PersonName {
                given_name: Some(given.to_string()),
                ..Default::default()
            }),
            provider_user_id: "001234.apple".into(),
        }
    }

    #[test]
    fn repeat_consent_without_profile_keeps_first_values() {
        let cache = InMemoryProfileCache::default();

        cache
            .save(&ProfileSnapshot::from_material(&material(
                Some("ada@example.com"),
                Some("Ada"),
            )))
            .unwrap();
        let merged = cache
            .save(&ProfileSnapshot::from_material(&material(None, None)))
            .unwrap();

        assert_eq!(merged.email.as_deref(), Some("ada@example.com"));
        assert_eq!(merged.given_name.as_deref(), Some("Ada"));
        assert_eq!(merged.provider_user_id.as_deref(), Some("001234.apple"));
        assert_eq!(cache.load().unwrap(), Some(merged));
    }

    #[test]
    fn present_fields_overwrite() {
        let stored = ProfileSnapshot {
            email: Some("old@example.com".into()),
            given_name: Some("Ada".into()),
            provider_user_id: None,
        };
        let update = ProfileSnapshot {
            email: Some("new@example.com".into()),
            ..Default::default()
        };

        let merged = stored.merged_with(&update);

        assert_eq!(merged.email.as_deref(), Some("new@example.com"));
        assert_eq!(merged.given_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn blank_material_fields_are_treated_as_absent() {
        let snapshot = ProfileSnapshot::from_material(&material(Some("  "), Some("")));
        assert_eq!(snapshot.email, None);
        assert_eq!(snapshot.given_name, None);
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn clear_removes_snapshot() {
        let cache = InMemoryProfileCache::default();
        cache
            .save(&ProfileSnapshot {
                email: Some("ada@example.com".into()),
                ..Default::default()
            })
            .unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.load().unwrap(), None);
    }
}
