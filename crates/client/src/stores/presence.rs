//! Presence store: online counts and typing indicators, per room.
//!
//! Both are ephemeral. Online counts are replaced wholesale whenever the
//! server reports one. Each room shows at most one typing signal; a new
//! pulse overwrites the old one and pushes its expiry out again, so the
//! indicator disappears `timeout` after the *last* pulse.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::DEFAULT_TYPING_TIMEOUT_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub online_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingSignal {
    pub user_name: String,
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct PresenceTracker {
    online: HashMap<String, PresenceSnapshot>,
    typing: HashMap<String, TypingSignal>,
    timeout: Duration,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TYPING_TIMEOUT_MS))
    }
}

impl PresenceTracker {
    pub fn new(typing_timeout: Duration) -> Self {
        Self {
            online: HashMap::new(),
            typing: HashMap::new(),
            timeout: typing_timeout,
        }
    }

    pub fn set_online_count(&mut self, room: &str, online_count: u32) -> PresenceSnapshot {
        let snapshot = PresenceSnapshot { online_count };
        self.online.insert(room.to_string(), snapshot);
        snapshot
    }

    pub fn online(&self, room: &str) -> Option<PresenceSnapshot> {
        self.online.get(room).copied()
    }

    /// Record a typing pulse, replacing any signal already shown for the room.
    pub fn pulse_typing(&mut self, room: &str, user_name: &str, now: Instant) -> &TypingSignal {
        let signal = TypingSignal {
            user_name: user_name.to_string(),
            expires_at: now + self.timeout,
        };
        self.typing.insert(room.to_string(), signal);
        &self.typing[room]
    }

    pub fn typing(&self, room: &str) -> Option<&TypingSignal> {
        self.typing.get(room)
    }

    /// Remove every signal whose expiry has passed; returns the rooms affected.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let expired: Vec<String> = self
            .typing
            .iter()
            .filter(|(_, signal)| signal.expires_at <= now)
            .map(|(room, _)| room.clone())
            .collect();
        for room in &expired {
            self.typing.remove(room);
        }
        expired
    }

    /// Earliest pending expiry, for the dispatch loop's timer.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.typing.values().map(|s| s.expires_at).min()
    }

    /// Forget everything about a room (used when leaving it).
    pub fn clear_room(&mut self, room: &str) {
        self.online.remove(room);
        self.typing.remove(room);
    }
}
