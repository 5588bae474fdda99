//! Client configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;
pub const DEFAULT_TYPING_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the chat server; HTTP API and socket both hang off it.
    pub server_url: String,
    /// Fixed delay before every reconnection attempt.
    pub reconnect_delay: Duration,
    /// How long a remote typing signal stays visible after its last pulse.
    pub typing_timeout: Duration,
    /// Directory for the durable local store. `None` means the platform default.
    pub data_dir: Option<PathBuf>,
    /// Identity override, mostly for running several clients side by side.
    pub user_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            typing_timeout: Duration::from_millis(DEFAULT_TYPING_TIMEOUT_MS),
            data_dir: None,
            user_id: None,
        }
    }
}

impl ClientConfig {
    /// Read configuration from the process environment.
    ///
    /// Environment variables:
    /// - `GUPSHUP_SERVER_URL` (default: "http://localhost:8080")
    /// - `GUPSHUP_RECONNECT_DELAY_MS` (default: 3000)
    /// - `GUPSHUP_TYPING_TIMEOUT_MS` (default: 3000)
    /// - `GUPSHUP_DATA_DIR` (default: platform config dir)
    /// - `GUPSHUP_USER_ID` (default: stored or generated identity)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        Self {
            server_url: lookup("GUPSHUP_SERVER_URL").unwrap_or(defaults.server_url),
            reconnect_delay: millis("GUPSHUP_RECONNECT_DELAY_MS", defaults.reconnect_delay),
            typing_timeout: millis("GUPSHUP_TYPING_TIMEOUT_MS", defaults.typing_timeout),
            data_dir: lookup("GUPSHUP_DATA_DIR").map(PathBuf::from),
            user_id: lookup("GUPSHUP_USER_ID").filter(|v| !v.trim().is_empty()),
        }
    }

    /// Socket URL derived from the server URL: `http` becomes `ws`,
    /// `https` becomes `wss`, and the path is `/ws`.
    pub fn ws_url(&self) -> EngineResult<String> {
        let mut url = Url::parse(&self.server_url)
            .map_err(|e| EngineError::Config(format!("bad server url: {}", e)))?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|_| {
            EngineError::Config(format!("cannot use {} as a socket url", self.server_url))
        })?;
        url.set_path("/ws");
        url.set_query(None);
        Ok(url.to_string())
    }
}
