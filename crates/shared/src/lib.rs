//! Shared wire types for the gupshup chat protocol.
//!
//! Everything that crosses the socket lives here: the outbound
//! [`ClientIntent`]s, the inbound [`ServerEvent`]s, and the codec that
//! turns one into frames and frames into the other.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
