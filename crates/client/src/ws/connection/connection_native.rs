//! Socket loop on top of tokio-tungstenite.
//!
//! One background task owns the physical connection. It connects, pumps
//! frames in both directions until the socket goes away, then sleeps the
//! fixed reconnect delay and starts over. Because the loop is the only place
//! that ever dials, at most one attempt is in flight at any time.

use std::sync::Arc;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{ConnectionState, ReconnectConfig, TransportEvent, WsHandle};

/// The managed connection to the chat server.
pub struct WsConnection {
    pub url: String,
    state: watch::Receiver<ConnectionState>,
    /// Channel for outbound frames
    sender: UnboundedSender<String>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl WsConnection {
    /// Start connecting to `url` in a background task.
    ///
    /// Returns the connection and the stream of [`TransportEvent`]s it
    /// produces. Must be called from within a tokio runtime.
    pub fn open(
        url: impl Into<String>,
        reconnect: ReconnectConfig,
    ) -> (Self, UnboundedReceiver<TransportEvent>) {
        let url = url.into();
        let (sender, outbound) = unbounded();
        let (events_tx, events_rx) = unbounded();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Closed);
        let shutdown = Arc::new(Notify::new());

        let emitter = Emitter {
            state: state_tx,
            events: events_tx,
        };
        let task = tokio::spawn(connection_loop(
            url.clone(),
            reconnect,
            outbound,
            emitter,
            shutdown.clone(),
        ));

        let connection = Self {
            url,
            state: state_rx,
            sender,
            shutdown,
            task,
        };
        (connection, events_rx)
    }

    /// Get a handle for sending frames
    pub fn handle(&self) -> WsHandle {
        WsHandle::new(self.sender.clone(), self.state.clone(), self.url.clone())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Caller-initiated close. The loop exits and does not reconnect.
    pub fn close(&self) {
        self.shutdown.notify_one();
    }

    /// Wait for the background loop to finish after [`close`](Self::close).
    pub async fn join(&mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

/// Publishes state to both the watch (for handles) and the event stream
/// (for the dispatch loop), in the same step.
struct Emitter {
    state: watch::Sender<ConnectionState>,
    events: UnboundedSender<TransportEvent>,
}

impl Emitter {
    fn set(&self, state: ConnectionState) {
        self.state.send_replace(state);
        let _ = self.events.unbounded_send(TransportEvent::StateChanged(state));
    }

    fn frame(&self, text: String) {
        let _ = self.events.unbounded_send(TransportEvent::Frame(text));
    }
}

enum Closure {
    Requested,
    Lost(String),
}

async fn connection_loop(
    url: String,
    reconnect: ReconnectConfig,
    mut outbound: UnboundedReceiver<String>,
    emitter: Emitter,
    shutdown: Arc<Notify>,
) {
    let mut attempt = 0u32;

    loop {
        emitter.set(ConnectionState::Connecting);

        let connected = tokio::select! {
            _ = shutdown.notified() => {
                emitter.set(ConnectionState::Closed);
                return;
            }
            result = connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((ws_stream, _response)) => {
                attempt = 0;
                emitter.set(ConnectionState::Open);
                crate::log_info!("WebSocket connected to {}", url);

                let (mut write, mut read) = ws_stream.split();

                let closure = loop {
                    tokio::select! {
                        _ = shutdown.notified() => {
                            let _ = write.send(Message::Close(None)).await;
                            break Closure::Requested;
                        }
                        frame = outbound.next() => match frame {
                            Some(text) => {
                                if let Err(e) = write.send(Message::Text(text.into())).await {
                                    break Closure::Lost(format!("send failed: {}", e));
                                }
                            }
                            // Every sender is gone, nobody can use this connection anymore
                            None => break Closure::Requested,
                        },
                        msg = read.next() => match msg {
                            Some(Ok(Message::Text(text))) => emitter.frame(text.as_str().to_owned()),
                            Some(Ok(Message::Close(_))) => {
                                break Closure::Lost("server sent close frame".into());
                            }
                            // Pong is handled by tungstenite; binary frames are not part of the protocol
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break Closure::Lost(format!("read error: {}", e)),
                            None => break Closure::Lost("stream ended".into()),
                        },
                    }
                };

                emitter.set(ConnectionState::Closed);
                discard_queued(&mut outbound);

                match closure {
                    Closure::Requested => {
                        crate::log_info!("WebSocket to {} closed by client", url);
                        return;
                    }
                    Closure::Lost(reason) => {
                        crate::log_warn!("WebSocket to {} lost: {}", url, reason);
                    }
                }
            }
            Err(e) => {
                crate::log_warn!("WebSocket connect to {} failed: {}", url, e);
                emitter.set(ConnectionState::Closed);
            }
        }

        attempt += 1;
        let delay = reconnect.delay;
        crate::log_info!(
            "Reconnecting to {} in {}ms (attempt {})",
            url,
            delay.as_millis(),
            attempt
        );
        tokio::select! {
            _ = shutdown.notified() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Frames queued against a connection that has since closed are dropped, not
/// carried over to the next one.
fn discard_queued(outbound: &mut UnboundedReceiver<String>) {
    let mut dropped = 0usize;
    while let Ok(Some(_)) = outbound.try_next() {
        dropped += 1;
    }
    if dropped > 0 {
        crate::log_warn!("Dropped {} frame(s) queued on a closed connection", dropped);
    }
}
