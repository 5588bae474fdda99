//! Gupshup Client - realtime session engine for the gupshup group chat
//!
//! This crate keeps one WebSocket connection to the chat server alive,
//! tracks which room the user is in, and keeps the per-room message list,
//! presence, and the local profile consistent with what the server says.
//! Drawing is left to a [`RenderSink`].

pub mod logging;

pub mod api_client;
pub mod config;
pub mod error;
pub mod identity;
pub mod render;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod stores;
pub mod ws;

#[cfg(test)]
mod test_support;

pub use api_client::{ApiClient, MediaBlob, MediaUploader, ProfileStore};
pub use config::ClientConfig;
pub use error::{EngineError, EngineResult};
pub use identity::{FixedIdentity, IdentityProvider, StoredIdentity};
pub use render::RenderSink;
pub use runtime::{run, Collaborators, SessionCommand};
pub use session::{Membership, Session};
pub use storage::{FileStore, LocalStore, MemoryStore};
pub use ws::{ConnectionState, ReconnectConfig, TransportEvent, WsConnection, WsHandle};
