//! Gupshup wire protocol: outbound intents, inbound events, and the codec.
//!
//! Frames are JSON text. Outbound frames carry an `action` tag, inbound
//! frames carry a `type` tag. Inbound kinds this client does not know decode
//! to [`ServerEvent::Unknown`] so a newer server can never break an older
//! client.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::models::{MemberRef, UserId, WireMessage};

/// Body of an outbound chat message. Exactly one payload per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundBody {
    Text(String),
    ImageUrl(String),
    GifUrl(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientIntent {
    Join {
        user_id: UserId,
        group: String,
    },
    Message {
        user_id: UserId,
        group: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gif_url: Option<String>,
    },
    Typing {
        user_id: UserId,
        group: String,
    },
    UpdateProfile {
        user_id: UserId,
        name: String,
        photo_url: Option<String>,
    },
}

impl ClientIntent {
    pub fn message(user_id: UserId, group: impl Into<String>, body: OutboundBody) -> Self {
        let (text, image_url, gif_url) = match body {
            OutboundBody::Text(t) => (Some(t), None, None),
            OutboundBody::ImageUrl(u) => (None, Some(u), None),
            OutboundBody::GifUrl(u) => (None, None, Some(u)),
        };
        ClientIntent::Message {
            user_id,
            group: group.into(),
            text,
            image_url,
            gif_url,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientIntent::Join { .. } => "join",
            ClientIntent::Message { .. } => "message",
            ClientIntent::Typing { .. } => "typing",
            ClientIntent::UpdateProfile { .. } => "update_profile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    History {
        #[serde(default)]
        messages: Vec<WireMessage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        online_count: Option<u32>,
    },
    NewMessage {
        message: WireMessage,
    },
    UserJoined {
        user: MemberRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        online_count: Option<u32>,
    },
    UserLeft {
        user: MemberRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        online_count: Option<u32>,
    },
    Typing {
        #[serde(default)]
        user_name: Option<String>,
    },
    ProfileUpdated {
        user_id: UserId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        photo: Option<String>,
    },
    /// Any `type` this client does not understand.
    #[serde(other)]
    Unknown,
}

/// Serialize an intent into a text frame.
pub fn encode(intent: &ClientIntent) -> Result<String, ProtocolError> {
    serde_json::to_string(intent).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Parse an inbound text frame.
///
/// Unknown `type` values yield [`ServerEvent::Unknown`]; anything that is not
/// a well-formed event object fails with [`ProtocolError::MalformedFrame`].
pub fn decode(frame: &str) -> Result<ServerEvent, ProtocolError> {
    serde_json::from_str(frame).map_err(|e| ProtocolError::MalformedFrame {
        reason: e.to_string(),
    })
}
