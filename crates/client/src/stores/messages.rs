//! Per-room message store.
//!
//! Each room holds an append-only sequence in arrival order. Locally sent
//! messages enter as `Pending` so the sender sees them immediately; server
//! messages enter as `Confirmed`. The two are never matched against each
//! other: the server gives no id that would make such a match reliable.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gupshup_shared::{non_blank, UserId, WireMessage};

/// Where an image message's picture lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Process-local preview shown while the upload is in flight.
    Preview(String),
    /// Persistent URL issued by the media uploader.
    Remote(String),
}

impl ImageRef {
    pub fn as_str(&self) -> &str {
        match self {
            ImageRef::Preview(r) | ImageRef::Remote(r) => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Image(ImageRef),
    Gif(String),
}

impl MessageBody {
    /// Pick the payload out of a wire message. Text wins over image, image
    /// over gif; a message with none of them has no body.
    pub fn from_wire(message: &WireMessage) -> Option<Self> {
        if let Some(text) = non_blank(message.text.clone()) {
            return Some(MessageBody::Text(text));
        }
        if let Some(url) = non_blank(message.image_url.clone()) {
            return Some(MessageBody::Image(ImageRef::Remote(url)));
        }
        non_blank(message.gif_url.clone()).map(MessageBody::Gif)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent by this client, not (yet) seen from the server.
    Pending,
    Confirmed,
}

/// A message as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    /// Client-generated id, only for pending entries.
    pub local_id: Option<String>,
    pub server_id: Option<String>,
    pub author_id: Option<UserId>,
    pub author_name: String,
    pub author_photo: Option<String>,
    pub timestamp: DateTime<Utc>,
    body: MessageBody,
    delivery: Delivery,
}

impl StoredMessage {
    pub fn pending(
        local_id: impl Into<String>,
        author_id: UserId,
        author_name: impl Into<String>,
        author_photo: Option<String>,
        body: MessageBody,
    ) -> Self {
        Self {
            local_id: Some(local_id.into()),
            server_id: None,
            author_id: Some(author_id),
            author_name: author_name.into(),
            author_photo,
            timestamp: Utc::now(),
            body,
            delivery: Delivery::Pending,
        }
    }

    /// Build a confirmed entry from a server message. `None` if the message
    /// carries no body at all.
    pub fn confirmed(message: &WireMessage, received_at: DateTime<Utc>) -> Option<Self> {
        let body = MessageBody::from_wire(message)?;
        Some(Self {
            local_id: None,
            server_id: message.id.clone(),
            author_id: message.user_id.clone(),
            author_name: non_blank(message.user_name.clone())
                .unwrap_or_else(|| "Anonymous".to_string()),
            author_photo: non_blank(message.user_photo.clone()),
            timestamp: message.timestamp_or(received_at),
            body,
            delivery: Delivery::Confirmed,
        })
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn is_pending(&self) -> bool {
        self.delivery == Delivery::Pending
    }
}

/// Messages for a single room.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RoomMessages {
    /// All messages in this room, oldest first, in arrival order.
    pub messages: Vec<StoredMessage>,
    /// Whether history for the room has been received.
    pub is_loaded: bool,
}

impl RoomMessages {
    /// History arrived and held nothing; the room renders its empty state.
    pub fn is_empty(&self) -> bool {
        self.is_loaded && self.messages.is_empty()
    }
}

/// Message store keyed by room name.
#[derive(Debug, Default)]
pub struct MessageStore {
    rooms: HashMap<String, RoomMessages>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room(&self, room: &str) -> Option<&RoomMessages> {
        self.rooms.get(room)
    }

    /// Replace the room's sequence wholesale and mark it loaded.
    pub fn apply_history(&mut self, room: &str, messages: Vec<StoredMessage>) -> &RoomMessages {
        let entry = self.rooms.entry(room.to_string()).or_default();
        entry.messages = messages;
        entry.is_loaded = true;
        entry
    }

    /// Append a locally sent message in the pending state.
    pub fn apply_optimistic(&mut self, room: &str, message: StoredMessage) -> &StoredMessage {
        debug_assert!(message.is_pending());
        self.append(room, message)
    }

    /// Append a message the server delivered.
    pub fn apply_confirmed(&mut self, room: &str, message: StoredMessage) -> &StoredMessage {
        debug_assert!(!message.is_pending());
        self.append(room, message)
    }

    /// Swap the preview of a pending image for its persistent URL.
    ///
    /// Confirmed entries are never touched. Returns the updated entry, or
    /// `None` if no pending image with `local_id` exists in the room.
    pub fn resolve_image(
        &mut self,
        room: &str,
        local_id: &str,
        url: impl Into<String>,
    ) -> Option<&StoredMessage> {
        let entry = self.rooms.get_mut(room)?.messages.iter_mut().find(|m| {
            m.is_pending()
                && m.local_id.as_deref() == Some(local_id)
                && matches!(m.body, MessageBody::Image(_))
        })?;
        entry.body = MessageBody::Image(ImageRef::Remote(url.into()));
        Some(entry)
    }

    fn append(&mut self, room: &str, message: StoredMessage) -> &StoredMessage {
        let entry = self.rooms.entry(room.to_string()).or_default();
        let index = entry.messages.len();
        entry.messages.push(message);
        &entry.messages[index]
    }
}
