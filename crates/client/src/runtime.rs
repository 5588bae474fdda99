//! Dispatch loop.
//!
//! Owns the [`Session`] and feeds it one input at a time: user commands,
//! transport events, results of background HTTP work, and the typing-expiry
//! deadline. Uploads and profile requests run as spawned tasks and report
//! back over a channel, so the session itself is never shared.

use std::sync::Arc;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use tokio::time::Instant;

use crate::api_client::{MediaBlob, MediaUploader, ProfileStore};
use crate::error::{EngineError, EngineResult};
use crate::render::RenderSink;
use crate::session::{PendingImage, ProfileUpdate, Session};
use crate::stores::RemoteProfile;
use crate::ws::TransportEvent;

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Join(String),
    Leave,
    SendText(String),
    SendGif(String),
    SendImage(MediaBlob),
    Typing,
    /// Change the display name. `photo: None` keeps the current photo.
    UpdateProfile {
        name: String,
        photo: Option<String>,
    },
    /// Upload a new profile photo, then apply it with the current name.
    UpdateProfilePhoto(MediaBlob),
    Shutdown,
}

/// The HTTP side of the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub profiles: Arc<dyn ProfileStore>,
    pub uploader: Arc<dyn MediaUploader>,
}

enum Completion {
    RemoteProfile(EngineResult<RemoteProfile>),
    ImageUploaded(PendingImage, EngineResult<String>),
    PhotoUploaded(EngineResult<String>),
}

/// Run the session until [`SessionCommand::Shutdown`] or until every command
/// sender is gone. Returns the session so the caller can inspect final state.
pub async fn run<R: RenderSink + 'static>(
    mut session: Session<R>,
    mut commands: UnboundedReceiver<SessionCommand>,
    mut transport: UnboundedReceiver<TransportEvent>,
    collaborators: Collaborators,
) -> Session<R> {
    let (completions_tx, mut completions) = unbounded();
    let mut transport_alive = true;

    if session.wants_remote_profile() {
        spawn_profile_fetch(&session, &collaborators, completions_tx.clone());
    }

    loop {
        let deadline = session.next_deadline();

        tokio::select! {
            event = transport.next(), if transport_alive => match event {
                Some(TransportEvent::StateChanged(state)) => session.handle_connection_state(state),
                Some(TransportEvent::Frame(frame)) => {
                    // Malformed frames are already logged by the session.
                    let _ = session.handle_frame(&frame);
                }
                None => {
                    crate::log_warn!("Transport event stream ended");
                    transport_alive = false;
                }
            },
            Some(done) = completions.next() => {
                on_completion(&mut session, &collaborators, done);
            }
            command = commands.next() => match command {
                Some(SessionCommand::Shutdown) | None => {
                    crate::log_info!("Session shutting down");
                    break;
                }
                Some(command) => {
                    on_command(&mut session, &collaborators, &completions_tx, command);
                }
            },
            _ = sleep_until_deadline(deadline) => {
                session.expire_typing(Instant::now());
            }
        }
    }

    session
}

fn on_command<R: RenderSink>(
    session: &mut Session<R>,
    collaborators: &Collaborators,
    completions: &UnboundedSender<Completion>,
    command: SessionCommand,
) {
    match command {
        SessionCommand::Join(room) => session.join(&room),
        SessionCommand::Leave => session.leave(),
        SessionCommand::SendText(text) => {
            session.send_text(&text);
        }
        SessionCommand::SendGif(url) => {
            session.send_gif(&url);
        }
        SessionCommand::SendImage(blob) => {
            let Some(pending) = session.begin_image() else {
                crate::log_warn!("Not in a room, image not sent");
                return;
            };
            let uploader = collaborators.uploader.clone();
            let completions = completions.clone();
            tokio::spawn(async move {
                let result = uploader.upload(blob).await.map_err(EngineError::upload);
                let _ = completions.unbounded_send(Completion::ImageUploaded(pending, result));
            });
        }
        SessionCommand::Typing => session.typing_pulse(),
        SessionCommand::UpdateProfile { name, photo } => {
            // A rename without a new photo keeps the current one.
            let photo = photo.or_else(|| session.profile().photo_url.clone());
            if let Some(update) = session.update_profile(&name, photo) {
                spawn_profile_push(collaborators, update);
            }
        }
        SessionCommand::UpdateProfilePhoto(blob) => {
            let uploader = collaborators.uploader.clone();
            let completions = completions.clone();
            tokio::spawn(async move {
                let result = uploader.upload(blob).await.map_err(EngineError::upload);
                let _ = completions.unbounded_send(Completion::PhotoUploaded(result));
            });
        }
        SessionCommand::Shutdown => {}
    }
}

fn on_completion<R: RenderSink>(
    session: &mut Session<R>,
    collaborators: &Collaborators,
    done: Completion,
) {
    match done {
        Completion::RemoteProfile(result) => session.apply_remote_profile(result),
        Completion::ImageUploaded(pending, result) => session.complete_image(pending, result),
        Completion::PhotoUploaded(Ok(url)) => {
            let name = session.profile().display_name.clone();
            if let Some(update) = session.update_profile(&name, Some(url)) {
                spawn_profile_push(collaborators, update);
            }
        }
        Completion::PhotoUploaded(Err(e)) => {
            crate::log_warn!("Profile photo not changed: {}", e);
        }
    }
}

fn spawn_profile_fetch<R: RenderSink>(
    session: &Session<R>,
    collaborators: &Collaborators,
    completions: UnboundedSender<Completion>,
) {
    let profiles = collaborators.profiles.clone();
    let user_id = session.user_id().clone();
    tokio::spawn(async move {
        let result = profiles
            .fetch_profile(&user_id)
            .await
            .map_err(EngineError::remote_profile);
        let _ = completions.unbounded_send(Completion::RemoteProfile(result));
    });
}

/// Best-effort write to the remote profile store. The local cache already
/// has the change, so a failure is only logged.
fn spawn_profile_push(collaborators: &Collaborators, update: ProfileUpdate) {
    let profiles = collaborators.profiles.clone();
    tokio::spawn(async move {
        if let Err(e) = profiles
            .update_profile(
                &update.user_id,
                &update.display_name,
                update.photo_url.as_deref(),
            )
            .await
        {
            crate::log_warn!("Remote profile update failed: {}", e);
        }
    });
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
