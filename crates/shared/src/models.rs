//! Shared data models for the gupshup wire protocol.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Identity ---

/// Opaque user identifier.
///
/// Host platforms hand out numeric ids, but the server echoes back whatever
/// it was given, so both shapes are accepted and round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl UserId {
    /// Name shown when neither the local cache nor the server has one.
    pub fn default_display_name(&self) -> String {
        format!("User{}", self)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        UserId::Number(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(n) => UserId::Number(n),
            Err(_) => UserId::Text(value.to_string()),
        }
    }
}

/// A group member as described in join/leave broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl MemberRef {
    pub fn display_name(&self) -> &str {
        name_or_anonymous(self.name.as_deref())
    }
}

/// A sender-supplied name, or "Anonymous" when it is missing or blank.
pub fn name_or_anonymous(name: Option<&str>) -> &str {
    match name {
        Some(name) if !name.trim().is_empty() => name,
        _ => "Anonymous",
    }
}

// --- Messaging ---

/// A chat message as the server sends it, either inside `history` or
/// `new_message`.
///
/// Every field except the author is optional on the wire; history documents
/// have been written by older servers and are not guaranteed to be complete.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gif_url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl WireMessage {
    /// Parsed timestamp, falling back to `received_at` when the server sent
    /// none or something unreadable.
    pub fn timestamp_or(&self, received_at: DateTime<Utc>) -> DateTime<Utc> {
        self.timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(received_at)
    }
}

/// Parse a server timestamp.
///
/// Accepts RFC 3339 and the naive ISO-8601 form (`2024-05-01T10:00:00.123456`)
/// that the server produces; naive values are taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Treat blank strings as absent. The server uses `""` for "no photo".
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
