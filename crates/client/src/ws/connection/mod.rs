//! WebSocket connection with state management and auto-reconnect.
//!
//! This module holds the shared types; the socket loop itself lives in
//! `connection_native`.

use std::time::Duration;

use futures_channel::mpsc::UnboundedSender;
use tokio::sync::watch;

use crate::config::DEFAULT_RECONNECT_DELAY_MS;
use crate::error::{EngineError, EngineResult};

/// Connection state for the socket. Exactly one value exists per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Reconnect policy: a fixed delay, no growth, no attempt limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
        }
    }
}

impl ReconnectConfig {
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

/// What the connection reports to its consumer, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    StateChanged(ConnectionState),
    Frame(String),
}

/// Anything that can take an encoded outbound frame.
pub trait FrameSink: Send {
    /// Enqueue `frame` for sending. Fails with [`EngineError::NotConnected`]
    /// when there is no open connection; the frame is not kept.
    fn send_frame(&self, frame: String) -> EngineResult<()>;
}

/// Handle for sending frames through a [`WsConnection`](super::WsConnection).
#[derive(Clone)]
pub struct WsHandle {
    sender: UnboundedSender<String>,
    state: watch::Receiver<ConnectionState>,
    pub url: String,
}

impl WsHandle {
    pub(crate) fn new(
        sender: UnboundedSender<String>,
        state: watch::Receiver<ConnectionState>,
        url: String,
    ) -> Self {
        Self { sender, state, url }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

impl FrameSink for WsHandle {
    fn send_frame(&self, frame: String) -> EngineResult<()> {
        if !self.state().is_open() {
            return Err(EngineError::NotConnected);
        }
        crate::log_debug!("WsHandle::send to '{}': {}", self.url, frame);
        self.sender
            .unbounded_send(frame)
            .map_err(|_| EngineError::NotConnected)
    }
}

mod connection_native;
pub use connection_native::WsConnection;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_defaults_to_three_seconds() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay, Duration::from_secs(3));
        assert_eq!(
            ReconnectConfig::with_delay(Duration::from_millis(50)).delay,
            Duration::from_millis(50)
        );
    }

    #[test]
    fn handle_refuses_frames_unless_open() {
        let (tx, mut rx) = futures_channel::mpsc::unbounded();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let handle = WsHandle::new(tx, state_rx, "ws://test/ws".into());

        assert_eq!(handle.send_frame("a".into()), Err(EngineError::NotConnected));

        state_tx.send(ConnectionState::Open).unwrap();
        handle.send_frame("b".into()).unwrap();
        assert_eq!(rx.try_next().unwrap(), Some("b".to_string()));

        state_tx.send(ConnectionState::Closed).unwrap();
        assert_eq!(handle.send_frame("c".into()), Err(EngineError::NotConnected));
    }
}
