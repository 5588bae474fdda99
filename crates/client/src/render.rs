//! Render callbacks.
//!
//! The engine never draws anything. It tells a [`RenderSink`] what changed
//! and leaves layout, markup, and theming to whoever implements it.

use crate::stores::{EffectiveProfile, StoredMessage};
use crate::ws::ConnectionState;

pub trait RenderSink: Send {
    fn connection_state(&mut self, _state: ConnectionState) {}

    /// A room was entered and is waiting for its history.
    fn room_entered(&mut self, _room: &str) {}

    /// Everything shown for `room` should be cleared.
    fn room_cleared(&mut self, room: &str);

    /// Full history for the room, oldest first. Empty means "no messages yet".
    fn history(&mut self, room: &str, messages: &[StoredMessage]);

    fn message_appended(&mut self, room: &str, message: &StoredMessage);

    /// A pending message changed in place (image preview resolved).
    fn message_updated(&mut self, _room: &str, _message: &StoredMessage) {}

    fn online_count(&mut self, room: &str, label: &str);

    /// `Some(text)` shows the typing indicator, `None` hides it.
    fn typing(&mut self, room: &str, indicator: Option<&str>);

    fn notification(&mut self, _text: &str) {}

    fn profile(&mut self, profile: &EffectiveProfile);

    fn upload_failed(&mut self, _room: &str, _local_id: &str) {}
}

/// "1 member online" / "N members online".
pub fn online_label(count: u32) -> String {
    format!(
        "{} member{} online",
        count,
        if count == 1 { "" } else { "s" }
    )
}

pub fn typing_label(user_name: &str) -> String {
    format!("{} is typing...", user_name)
}

pub fn joined_label(user_name: &str) -> String {
    format!("{} joined the chat", user_name)
}

pub fn left_label(user_name: &str) -> String {
    format!("{} left the chat", user_name)
}
