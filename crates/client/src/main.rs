//! Gupshup Client - terminal front-end
//!
//! Reads commands from stdin and prints what the engine renders.
//!
//! ```text
//! /join <room>     enter a room (leaves the current one)
//! /leave           leave the current room
//! /name <name>     change display name
//! /photo <path>    upload a profile photo
//! /gif <url>       send a gif
//! /image <path>    upload and send an image
//! /quit            exit
//! anything else    send as a text message
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use futures_channel::mpsc::{unbounded, UnboundedSender};
use gupshup_client::render::RenderSink;
use gupshup_client::stores::{EffectiveProfile, ImageRef, MessageBody, StoredMessage};
use gupshup_client::{
    log_info, log_warn, logging, run, ApiClient, ClientConfig, Collaborators, ConnectionState,
    FileStore, IdentityProvider, LocalStore, MediaBlob, ReconnectConfig, Session, SessionCommand,
    StoredIdentity, WsConnection,
};
use gupshup_shared::UserId;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints everything to stdout, one line per change.
struct TerminalRender;

impl TerminalRender {
    fn line(message: &StoredMessage) -> String {
        let body = match message.body() {
            MessageBody::Text(text) => text.clone(),
            MessageBody::Image(ImageRef::Preview(_)) => "[image uploading...]".to_string(),
            MessageBody::Image(ImageRef::Remote(url)) => format!("[image] {}", url),
            MessageBody::Gif(url) => format!("[gif] {}", url),
        };
        let marker = if message.is_pending() { " (sending)" } else { "" };
        format!(
            "[{}] {}: {}{}",
            message.timestamp.format("%H:%M"),
            message.author_name,
            body,
            marker
        )
    }
}

impl RenderSink for TerminalRender {
    fn connection_state(&mut self, state: ConnectionState) {
        let label = match state {
            ConnectionState::Connecting => "connecting...",
            ConnectionState::Open => "connected",
            ConnectionState::Closed => "disconnected",
        };
        println!("* {}", label);
    }

    fn room_entered(&mut self, room: &str) {
        println!("* entering #{}", room);
    }

    fn room_cleared(&mut self, room: &str) {
        println!("* left #{}", room);
    }

    fn history(&mut self, room: &str, messages: &[StoredMessage]) {
        if messages.is_empty() {
            println!("* #{}: no messages yet", room);
        }
        for message in messages {
            println!("{}", Self::line(message));
        }
    }

    fn message_appended(&mut self, _room: &str, message: &StoredMessage) {
        println!("{}", Self::line(message));
    }

    fn message_updated(&mut self, _room: &str, message: &StoredMessage) {
        println!("{}", Self::line(message));
    }

    fn online_count(&mut self, room: &str, label: &str) {
        println!("* #{}: {}", room, label);
    }

    fn typing(&mut self, _room: &str, indicator: Option<&str>) {
        if let Some(text) = indicator {
            println!("* {}", text);
        }
    }

    fn notification(&mut self, text: &str) {
        println!("* {}", text);
    }

    fn profile(&mut self, profile: &EffectiveProfile) {
        println!("* you are {}", profile.display_name);
    }

    fn upload_failed(&mut self, _room: &str, _local_id: &str) {
        println!("* image upload failed");
    }
}

async fn read_blob(path: &str) -> anyhow::Result<MediaBlob> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path))?;
    let file_name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let mime = match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };
    Ok(MediaBlob {
        file_name,
        mime: mime.to_string(),
        bytes,
    })
}

/// Turn one input line into a command. `None` for blank lines and for
/// commands that already reported their own error.
async fn parse_line(line: &str) -> Option<SessionCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (cmd, arg) = match line.split_once(' ') {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };
    let command = match cmd {
        "/join" => SessionCommand::Join(arg.to_string()),
        "/leave" => SessionCommand::Leave,
        "/name" => SessionCommand::UpdateProfile {
            name: arg.to_string(),
            photo: None,
        },
        "/gif" => SessionCommand::SendGif(arg.to_string()),
        "/image" | "/photo" => match read_blob(arg).await {
            Ok(blob) if cmd == "/image" => SessionCommand::SendImage(blob),
            Ok(blob) => SessionCommand::UpdateProfilePhoto(blob),
            Err(e) => {
                log_warn!("{:#}", e);
                return None;
            }
        },
        "/quit" => SessionCommand::Shutdown,
        _ => SessionCommand::SendText(line.to_string()),
    };
    Some(command)
}

fn send(commands: &UnboundedSender<SessionCommand>, command: SessionCommand) -> bool {
    commands.unbounded_send(command).is_ok()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = ClientConfig::from_env();
    let file_store = match &config.data_dir {
        Some(dir) => FileStore::new(dir)?,
        None => FileStore::in_config_dir()?,
    };
    log_info!("Local data in {}", file_store.dir().display());
    let store: Arc<dyn LocalStore> = Arc::new(file_store);

    let user_id = match &config.user_id {
        Some(id) => UserId::from(id.as_str()),
        None => StoredIdentity::new(store.as_ref()).user_id()?,
    };
    log_info!("Starting as {} against {}", user_id, config.server_url);

    let api = Arc::new(ApiClient::new(config.server_url.clone()));
    let collaborators = Collaborators {
        profiles: api.clone(),
        uploader: api,
    };

    let (mut connection, transport) = WsConnection::open(
        config.ws_url()?,
        ReconnectConfig::with_delay(config.reconnect_delay),
    );

    let session = Session::new(
        user_id,
        Box::new(connection.handle()),
        store,
        TerminalRender,
        config.typing_timeout,
    );

    let (commands, commands_rx) = unbounded();
    let engine = tokio::spawn(run(session, commands_rx, transport, collaborators));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_line(&line).await else {
            continue;
        };
        match command {
            SessionCommand::Shutdown => break,
            SessionCommand::SendText(text) => {
                if !send(&commands, SessionCommand::Typing)
                    || !send(&commands, SessionCommand::SendText(text))
                {
                    break;
                }
            }
            other => {
                if !send(&commands, other) {
                    break;
                }
            }
        }
    }

    send(&commands, SessionCommand::Shutdown);
    engine.await.context("session task failed")?;
    connection.close();
    connection.join().await;
    Ok(())
}
