//! Transport for the single persistent connection to the chat server.
//!
//! ```text
//!   Session ──FrameSink──▶ WsHandle ──▶ ┌──────────────┐ ──▶ server
//!                                       │ WsConnection │
//!   dispatch loop ◀──TransportEvent──── └──────────────┘ ◀── server
//! ```
//!
//! The connection never interprets frames. It reports state transitions and
//! raw text frames on one ordered channel, and refuses outbound frames while
//! it is not open.

mod connection;

pub use connection::{
    ConnectionState, FrameSink, ReconnectConfig, TransportEvent, WsConnection, WsHandle,
};
