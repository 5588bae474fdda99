//! Profile store for the local user's profile.
//!
//! The durable local cache is this client's source of truth. Precedence when
//! deciding what to show is `local (non-null name) > remote > "User<id>"`.
//! The remote profile only ever *seeds* an empty cache; it never overwrites a
//! name the user already has locally.

use std::sync::Arc;

use gupshup_shared::{non_blank, UserId};
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::storage::{self, LocalStore};

pub const PROFILE_KEY: &str = "profile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    #[default]
    Local,
    Remote,
    /// Generated from the user id; never persisted.
    Default,
}

/// What the durable store holds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CachedProfile {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub source: ProfileSource,
}

/// Response of `GET /api/user?user_id=`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// The profile the UI shows and the engine stamps on outgoing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveProfile {
    pub display_name: String,
    pub photo_url: Option<String>,
    pub source: ProfileSource,
}

/// Merge a cached and a remote profile.
///
/// A cached name makes the cached profile win outright, photo included. With
/// no cached name the remote one is used, and with neither the generated
/// default. A cached photo survives even when the name comes from elsewhere.
pub fn merge(
    local: Option<&CachedProfile>,
    remote: Option<&RemoteProfile>,
    user_id: &UserId,
) -> EffectiveProfile {
    let local_name = local.and_then(|l| non_blank(l.display_name.clone()));
    let local_photo = local.and_then(|l| non_blank(l.photo_url.clone()));

    if let Some(name) = local_name {
        return EffectiveProfile {
            display_name: name,
            photo_url: local_photo,
            source: ProfileSource::Local,
        };
    }

    let remote_name = remote.and_then(|r| non_blank(r.display_name.clone()));
    let remote_photo = remote.and_then(|r| non_blank(r.photo_url.clone()));
    match remote_name {
        Some(name) => EffectiveProfile {
            display_name: name,
            photo_url: local_photo.or(remote_photo),
            source: ProfileSource::Remote,
        },
        None => EffectiveProfile {
            display_name: user_id.default_display_name(),
            photo_url: local_photo.or(remote_photo),
            source: ProfileSource::Default,
        },
    }
}

/// The local user's profile, backed by the durable store.
pub struct ProfileCache {
    store: Arc<dyn LocalStore>,
    user_id: UserId,
    cached: Option<CachedProfile>,
    current: EffectiveProfile,
}

impl ProfileCache {
    /// Read the cached profile. Shows it immediately if it has a name,
    /// otherwise the generated default until a remote profile arrives.
    pub fn load(store: Arc<dyn LocalStore>, user_id: UserId) -> Self {
        let cached = storage::load::<CachedProfile>(store.as_ref(), PROFILE_KEY);
        let current = merge(cached.as_ref(), None, &user_id);
        Self {
            store,
            user_id,
            cached,
            current,
        }
    }

    pub fn current(&self) -> &EffectiveProfile {
        &self.current
    }

    /// Whether a remote fetch could still change anything: only while the
    /// cache holds no name.
    pub fn needs_remote_seed(&self) -> bool {
        self.cached
            .as_ref()
            .and_then(|c| non_blank(c.display_name.clone()))
            .is_none()
    }

    /// Seed from the remote profile. Returns the new effective profile if it
    /// changed; a cache that already has a name is left alone.
    pub fn apply_remote(&mut self, remote: &RemoteProfile) -> Option<&EffectiveProfile> {
        if !self.needs_remote_seed() {
            crate::log_debug!("Local profile is authoritative, ignoring remote profile");
            return None;
        }
        let merged = merge(self.cached.as_ref(), Some(remote), &self.user_id);
        if merged == self.current {
            return None;
        }
        if merged.source == ProfileSource::Remote {
            let seeded = CachedProfile {
                display_name: Some(merged.display_name.clone()),
                photo_url: merged.photo_url.clone(),
                source: ProfileSource::Remote,
            };
            if let Err(e) = self.persist(seeded) {
                crate::log_warn!("Failed to persist seeded profile: {}", e);
            }
        }
        self.current = merged;
        Some(&self.current)
    }

    /// Explicit profile update by the user.
    ///
    /// The in-memory profile always changes; the returned error only reports
    /// that the durable write failed.
    pub fn update(&mut self, display_name: &str, photo_url: Option<String>) -> EngineResult<()> {
        let photo_url = non_blank(photo_url);
        self.current = EffectiveProfile {
            display_name: display_name.to_string(),
            photo_url: photo_url.clone(),
            source: ProfileSource::Local,
        };
        self.persist(CachedProfile {
            display_name: Some(display_name.to_string()),
            photo_url,
            source: ProfileSource::Local,
        })
    }

    fn persist(&mut self, profile: CachedProfile) -> EngineResult<()> {
        let result = storage::save(self.store.as_ref(), PROFILE_KEY, &profile);
        self.cached = Some(profile);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn cached(name: Option<&str>, photo: Option<&str>) -> CachedProfile {
        CachedProfile {
            display_name: name.map(str::to_string),
            photo_url: photo.map(str::to_string),
            source: ProfileSource::Local,
        }
    }

    fn remote(name: Option<&str>, photo: Option<&str>) -> RemoteProfile {
        RemoteProfile {
            display_name: name.map(str::to_string),
            photo_url: photo.map(str::to_string),
        }
    }

    fn store_with(profile: Option<CachedProfile>) -> Arc<dyn LocalStore> {
        let store = MemoryStore::new();
        if let Some(profile) = profile {
            storage::save(&store, PROFILE_KEY, &profile).unwrap();
        }
        Arc::new(store)
    }

    #[test]
    fn local_name_beats_remote() {
        let user = UserId::Number(1);
        let merged = merge(
            Some(&cached(Some("Ann"), Some("photoA"))),
            Some(&remote(Some("Bob"), Some("photoB"))),
            &user,
        );
        assert_eq!(merged.display_name, "Ann");
        assert_eq!(merged.photo_url.as_deref(), Some("photoA"));
        assert_eq!(merged.source, ProfileSource::Local);
    }

    #[test]
    fn default_only_when_both_sides_are_empty() {
        let user = UserId::Number(42);
        let merged = merge(Some(&cached(Some(""), None)), Some(&remote(None, Some(""))), &user);
        assert_eq!(merged.display_name, "User42");
        assert_eq!(merged.photo_url, None);
        assert_eq!(merged.source, ProfileSource::Default);

        let merged = merge(None, Some(&remote(Some("Bob"), None)), &user);
        assert_eq!(merged.display_name, "Bob");
    }

    #[test]
    fn remote_seeds_an_empty_cache_and_is_persisted() {
        let store = store_with(Some(cached(None, None)));
        let mut profile = ProfileCache::load(store.clone(), UserId::Number(1));
        assert!(profile.needs_remote_seed());
        assert_eq!(profile.current().display_name, "User1");

        let seeded = profile.apply_remote(&remote(Some("Bob"), Some("photoB"))).unwrap();
        assert_eq!(seeded.display_name, "Bob");
        assert_eq!(seeded.photo_url.as_deref(), Some("photoB"));

        let persisted: CachedProfile = storage::load(store.as_ref(), PROFILE_KEY).unwrap();
        assert_eq!(persisted.display_name.as_deref(), Some("Bob"));
        assert_eq!(persisted.photo_url.as_deref(), Some("photoB"));
        assert_eq!(persisted.source, ProfileSource::Remote);

        // Next launch: the seeded cache is now authoritative.
        let reloaded = ProfileCache::load(store, UserId::Number(1));
        assert!(!reloaded.needs_remote_seed());
        assert_eq!(reloaded.current().display_name, "Bob");
    }

    #[test]
    fn remote_never_overwrites_local_name() {
        let store = store_with(Some(cached(Some("Ann"), Some("photoA"))));
        let mut profile = ProfileCache::load(store, UserId::Number(1));
        assert!(profile.apply_remote(&remote(Some("Bob"), Some("photoB"))).is_none());
        assert_eq!(profile.current().display_name, "Ann");
        assert_eq!(profile.current().photo_url.as_deref(), Some("photoA"));
    }

    #[test]
    fn update_writes_through_to_the_store() {
        let store = store_with(None);
        let mut profile = ProfileCache::load(store.clone(), UserId::Number(5));
        profile.update("Zed", Some("/static/uploads/z.png".into())).unwrap();

        let persisted: CachedProfile = storage::load(store.as_ref(), PROFILE_KEY).unwrap();
        assert_eq!(persisted.display_name.as_deref(), Some("Zed"));
        assert_eq!(profile.current().source, ProfileSource::Local);
        assert!(!profile.needs_remote_seed());
    }
}
