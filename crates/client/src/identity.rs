//! Identity bootstrap.
//!
//! The engine only needs an opaque, stable user id. Hosts that embed the
//! client in a platform with its own accounts implement [`IdentityProvider`];
//! standalone clients use [`StoredIdentity`], which persists a generated id.

use gupshup_shared::UserId;
use rand::Rng;

use crate::error::EngineResult;
use crate::storage::{self, LocalStore};

pub const IDENTITY_KEY: &str = "identity";

pub trait IdentityProvider {
    fn user_id(&self) -> EngineResult<UserId>;
}

/// An id handed in by the host.
#[derive(Debug, Clone)]
pub struct FixedIdentity(pub UserId);

impl IdentityProvider for FixedIdentity {
    fn user_id(&self) -> EngineResult<UserId> {
        Ok(self.0.clone())
    }
}

/// Loads the id persisted by a previous run, or generates and persists a
/// random numeric one.
pub struct StoredIdentity<'a> {
    store: &'a dyn LocalStore,
}

impl<'a> StoredIdentity<'a> {
    pub fn new(store: &'a dyn LocalStore) -> Self {
        Self { store }
    }
}

impl IdentityProvider for StoredIdentity<'_> {
    fn user_id(&self) -> EngineResult<UserId> {
        if let Some(id) = storage::load::<UserId>(self.store, IDENTITY_KEY) {
            return Ok(id);
        }
        let id = UserId::Number(rand::thread_rng().gen_range(0..1_000_000));
        storage::save(self.store, IDENTITY_KEY, &id)?;
        crate::log_info!("Generated new identity {}", id);
        Ok(id)
    }
}
