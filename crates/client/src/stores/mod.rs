//! Client-side state stores.

pub mod messages;
pub mod presence;
pub mod profile;

pub use messages::{Delivery, ImageRef, MessageBody, MessageStore, RoomMessages, StoredMessage};
pub use presence::{PresenceSnapshot, PresenceTracker, TypingSignal};
pub use profile::{
    merge, CachedProfile, EffectiveProfile, ProfileCache, ProfileSource, RemoteProfile,
};
