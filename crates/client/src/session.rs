//! Session controller.
//!
//! One [`Session`] holds all mutable client state: who we are, which room is
//! active, the message store, presence, and the profile cache. It is driven
//! by three kinds of input, each handled to completion before the next:
//! user intents (`join`, `send_text`, ...), transport events
//! (`handle_frame`, `handle_connection_state`), and the typing-expiry clock
//! (`expire_typing`).
//!
//! Room membership moves `NotJoined -> Joining -> Joined`. Joining another
//! room leaves the current one first. Leaving is local only; the server
//! infers departure from the next join or from the disconnect.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gupshup_shared::{
    decode, encode, name_or_anonymous, non_blank, ClientIntent, OutboundBody, ServerEvent, UserId,
    WireMessage,
};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::render::{joined_label, left_label, online_label, typing_label, RenderSink};
use crate::storage::LocalStore;
use crate::stores::{
    EffectiveProfile, ImageRef, MessageBody, MessageStore, PresenceTracker, ProfileCache,
    RemoteProfile, StoredMessage,
};
use crate::ws::{ConnectionState, FrameSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    NotJoined,
    /// `join` sent (or waiting for a connection), history not received yet.
    Joining(String),
    Joined(String),
}

impl Membership {
    pub fn room(&self) -> Option<&str> {
        match self {
            Membership::NotJoined => None,
            Membership::Joining(room) | Membership::Joined(room) => Some(room),
        }
    }

    pub fn joined_room(&self) -> Option<&str> {
        match self {
            Membership::Joined(room) => Some(room),
            _ => None,
        }
    }
}

/// An image message whose upload is still in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub room: String,
    pub local_id: String,
}

/// A profile change to forward to the remote profile store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub user_id: UserId,
    pub display_name: String,
    pub photo_url: Option<String>,
}

pub struct Session<R: RenderSink> {
    user_id: UserId,
    membership: Membership,
    /// Rooms whose `join` went out on the current connection and whose
    /// history has not arrived yet, oldest first. The server answers joins in
    /// order, so the front of this queue names the room of the next history.
    awaiting_history: VecDeque<String>,
    messages: MessageStore,
    presence: PresenceTracker,
    profile: ProfileCache,
    outbound: Box<dyn FrameSink>,
    render: R,
}

impl<R: RenderSink> Session<R> {
    /// Build a session and render the cached (or default) profile right away.
    pub fn new(
        user_id: UserId,
        outbound: Box<dyn FrameSink>,
        store: Arc<dyn LocalStore>,
        render: R,
        typing_timeout: Duration,
    ) -> Self {
        let profile = ProfileCache::load(store, user_id.clone());
        let mut session = Self {
            user_id,
            membership: Membership::NotJoined,
            awaiting_history: VecDeque::new(),
            messages: MessageStore::new(),
            presence: PresenceTracker::new(typing_timeout),
            profile,
            outbound,
            render,
        };
        session.render.profile(session.profile.current());
        session
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn profile(&self) -> &EffectiveProfile {
        self.profile.current()
    }

    pub fn render(&self) -> &R {
        &self.render
    }

    pub fn render_mut(&mut self) -> &mut R {
        &mut self.render
    }

    // =========================================
    // Room lifecycle
    // =========================================

    pub fn join(&mut self, room: &str) {
        let room = room.trim();
        if room.is_empty() {
            return;
        }
        if self.membership.room().is_some() {
            self.leave();
        }
        crate::log_info!("Joining room '{}'", room);
        self.membership = Membership::Joining(room.to_string());
        self.render.room_entered(room);
        self.send_join(room);
    }

    /// Clear the active room's UI state. Nothing is sent to the server.
    pub fn leave(&mut self) {
        let previous = std::mem::replace(&mut self.membership, Membership::NotJoined);
        if let Some(room) = previous.room() {
            crate::log_info!("Leaving room '{}'", room);
            self.presence.clear_room(room);
            self.render.room_cleared(room);
        }
    }

    fn send_join(&mut self, room: &str) {
        let intent = ClientIntent::Join {
            user_id: self.user_id.clone(),
            group: room.to_string(),
        };
        if self.send(&intent) {
            self.awaiting_history.push_back(room.to_string());
        }
    }

    // =========================================
    // Outbound intents
    // =========================================

    /// Send a text message to the joined room.
    ///
    /// The optimistic entry is stored and rendered before the frame is sent,
    /// whether or not the transport accepts it. Returns the entry's local id,
    /// or `None` if nothing was sent (blank text, no joined room).
    pub fn send_text(&mut self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.send_message(
            MessageBody::Text(text.to_string()),
            OutboundBody::Text(text.to_string()),
        )
    }

    pub fn send_gif(&mut self, url: &str) -> Option<String> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        self.send_message(
            MessageBody::Gif(url.to_string()),
            OutboundBody::GifUrl(url.to_string()),
        )
    }

    fn send_message(&mut self, body: MessageBody, outbound: OutboundBody) -> Option<String> {
        let room = self.membership.joined_room()?.to_string();
        let local_id = Uuid::new_v4().to_string();
        self.append_optimistic(&room, &local_id, body);
        self.send(&ClientIntent::message(self.user_id.clone(), room, outbound));
        Some(local_id)
    }

    /// Show an image message with a local preview while it uploads.
    ///
    /// The caller uploads the blob and reports back through
    /// [`complete_image`](Self::complete_image).
    pub fn begin_image(&mut self) -> Option<PendingImage> {
        let room = self.membership.joined_room()?.to_string();
        let local_id = Uuid::new_v4().to_string();
        let preview = ImageRef::Preview(format!("preview://{}", local_id));
        self.append_optimistic(&room, &local_id, MessageBody::Image(preview));
        Some(PendingImage { room, local_id })
    }

    /// Finish an image send. A failed upload never produces an intent, and
    /// neither does an upload that completes after its room was left.
    pub fn complete_image(&mut self, pending: PendingImage, upload: EngineResult<String>) {
        let url = match upload {
            Ok(url) => url,
            Err(e) => {
                crate::log_warn!("Image upload for '{}' failed, not sending: {}", pending.room, e);
                self.render.upload_failed(&pending.room, &pending.local_id);
                return;
            }
        };

        let still_active = self.membership.joined_room() == Some(pending.room.as_str());
        if let Some(updated) = self
            .messages
            .resolve_image(&pending.room, &pending.local_id, url.clone())
        {
            if still_active {
                self.render.message_updated(&pending.room, updated);
            }
        }

        if !still_active {
            crate::log_warn!(
                "Room '{}' is no longer active, not sending uploaded image",
                pending.room
            );
            return;
        }
        self.send(&ClientIntent::message(
            self.user_id.clone(),
            pending.room,
            OutboundBody::ImageUrl(url),
        ));
    }

    /// Tell the room we are typing. One frame per call, no throttling.
    pub fn typing_pulse(&mut self) {
        if let Some(room) = self.membership.joined_room() {
            self.send(&ClientIntent::Typing {
                user_id: self.user_id.clone(),
                group: room.to_string(),
            });
        }
    }

    /// Change the local user's profile.
    ///
    /// Written to the local store first, then announced over the socket. The
    /// returned [`ProfileUpdate`] is for the caller to push to the remote
    /// profile store, best-effort.
    pub fn update_profile(&mut self, display_name: &str, photo_url: Option<String>) -> Option<ProfileUpdate> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return None;
        }
        if let Err(e) = self.profile.update(display_name, photo_url) {
            crate::log_warn!("Profile kept in memory only: {}", e);
        }
        self.render.profile(self.profile.current());

        let current = self.profile.current().clone();
        self.send(&ClientIntent::UpdateProfile {
            user_id: self.user_id.clone(),
            name: current.display_name.clone(),
            photo_url: current.photo_url.clone(),
        });

        Some(ProfileUpdate {
            user_id: self.user_id.clone(),
            display_name: current.display_name,
            photo_url: current.photo_url,
        })
    }

    /// Whether the remote profile is still worth fetching.
    pub fn wants_remote_profile(&self) -> bool {
        self.profile.needs_remote_seed()
    }

    pub fn apply_remote_profile(&mut self, fetched: EngineResult<RemoteProfile>) {
        match fetched {
            Ok(remote) => {
                if let Some(profile) = self.profile.apply_remote(&remote) {
                    self.render.profile(profile);
                }
            }
            Err(e) => crate::log_warn!(
                "{}; showing '{}'",
                e,
                self.profile.current().display_name
            ),
        }
    }

    // =========================================
    // Inbound
    // =========================================

    /// Decode and apply one inbound frame. Malformed frames are logged and
    /// dropped; the error is returned for the caller's information only.
    pub fn handle_frame(&mut self, frame: &str) -> EngineResult<()> {
        match decode(frame) {
            Ok(event) => {
                self.handle_event(event, Instant::now());
                Ok(())
            }
            Err(e) => {
                crate::log_warn!("Dropping frame: {}", e);
                Err(EngineError::from(e))
            }
        }
    }

    pub fn handle_event(&mut self, event: ServerEvent, now: Instant) {
        match event {
            ServerEvent::History {
                messages,
                online_count,
            } => self.on_history(messages, online_count),
            ServerEvent::NewMessage { message } => self.on_new_message(message),
            ServerEvent::UserJoined { user, online_count } => {
                self.on_member_change(joined_label(user.display_name()), online_count)
            }
            ServerEvent::UserLeft { user, online_count } => {
                self.on_member_change(left_label(user.display_name()), online_count)
            }
            ServerEvent::Typing { user_name } => {
                self.on_typing(name_or_anonymous(user_name.as_deref()), now)
            }
            ServerEvent::ProfileUpdated {
                user_id,
                name,
                photo,
            } => self.on_profile_updated(user_id, name, photo),
            ServerEvent::Unknown => crate::log_debug!("Ignoring unknown event kind"),
        }
    }

    pub fn handle_connection_state(&mut self, state: ConnectionState) {
        self.render.connection_state(state);
        match state {
            ConnectionState::Closed => {
                // Whatever the old connection owed us is not coming.
                self.awaiting_history.clear();
            }
            ConnectionState::Open => {
                if let Some(room) = self.membership.room().map(str::to_string) {
                    crate::log_info!("Connection open, rejoining '{}'", room);
                    self.membership = Membership::Joining(room.clone());
                    self.send_join(&room);
                }
            }
            ConnectionState::Connecting => {}
        }
    }

    /// Hide typing indicators whose time is up.
    pub fn expire_typing(&mut self, now: Instant) {
        for room in self.presence.expire(now) {
            self.render.typing(&room, None);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.presence.next_expiry()
    }

    fn on_history(&mut self, messages: Vec<WireMessage>, online_count: Option<u32>) {
        let target = match self.awaiting_history.pop_front() {
            Some(room) => room,
            None => match self.membership.room() {
                Some(room) => room.to_string(),
                None => {
                    crate::log_warn!("Dropping history received outside any room");
                    return;
                }
            },
        };

        // Only the answer to the most recent join may be applied.
        if self.membership.room() != Some(target.as_str()) || !self.awaiting_history.is_empty() {
            crate::log_info!("Discarding late history for '{}'", target);
            return;
        }

        let received_at = Utc::now();
        let history: Vec<StoredMessage> = messages
            .iter()
            .filter_map(|m| StoredMessage::confirmed(m, received_at))
            .collect();

        self.membership = Membership::Joined(target.clone());
        let room = self.messages.apply_history(&target, history);
        crate::log_debug!("Joined '{}' with {} message(s)", target, room.messages.len());
        self.render.history(&target, &room.messages);

        if let Some(count) = online_count {
            self.set_online_count(&target, count);
        }
    }

    /// The room broadcasts currently belong to, provided it is the one shown.
    /// While a join is outstanding the server may still be broadcasting for
    /// the previous room, so nothing is live.
    fn live_room(&self) -> Option<String> {
        if !self.awaiting_history.is_empty() {
            return None;
        }
        self.membership.joined_room().map(str::to_string)
    }

    fn on_new_message(&mut self, message: WireMessage) {
        let Some(room) = self.live_room() else {
            crate::log_debug!("Ignoring message for a room that is not shown");
            return;
        };
        match StoredMessage::confirmed(&message, Utc::now()) {
            Some(stored) => {
                let stored = self.messages.apply_confirmed(&room, stored);
                self.render.message_appended(&room, stored);
            }
            None => crate::log_warn!("Dropping message without a body in '{}'", room),
        }
    }

    fn on_member_change(&mut self, text: String, online_count: Option<u32>) {
        let Some(room) = self.live_room() else {
            return;
        };
        self.render.notification(&text);
        if let Some(count) = online_count {
            self.set_online_count(&room, count);
        }
    }

    fn set_online_count(&mut self, room: &str, count: u32) {
        let snapshot = self.presence.set_online_count(room, count);
        self.render.online_count(room, &online_label(snapshot.online_count));
    }

    fn on_typing(&mut self, user_name: &str, now: Instant) {
        let Some(room) = self.live_room() else {
            return;
        };
        let signal = self.presence.pulse_typing(&room, user_name, now);
        let label = typing_label(&signal.user_name);
        self.render.typing(&room, Some(&label));
    }

    fn on_profile_updated(&mut self, user_id: UserId, name: Option<String>, photo: Option<String>) {
        if user_id != self.user_id {
            crate::log_debug!("Ignoring profile update for {}", user_id);
            return;
        }
        let Some(name) = non_blank(name) else {
            return;
        };
        if let Err(e) = self.profile.update(&name, photo) {
            crate::log_warn!("Profile echo kept in memory only: {}", e);
        }
        self.render.profile(self.profile.current());
    }

    fn append_optimistic(&mut self, room: &str, local_id: &str, body: MessageBody) {
        let profile = self.profile.current();
        let message = StoredMessage::pending(
            local_id,
            self.user_id.clone(),
            profile.display_name.clone(),
            profile.photo_url.clone(),
            body,
        );
        let stored = self.messages.apply_optimistic(room, message);
        self.render.message_appended(room, stored);
    }

    /// Encode and hand a frame to the transport. Returns whether it was
    /// accepted; refusals are logged and the intent is dropped.
    fn send(&self, intent: &ClientIntent) -> bool {
        let frame = match encode(intent) {
            Ok(frame) => frame,
            Err(e) => {
                crate::log_error!("Dropping {} intent: {}", intent.kind(), e);
                return false;
            }
        };
        match self.outbound.send_frame(frame) {
            Ok(()) => true,
            Err(e) => {
                crate::log_warn!("Dropping {} intent: {}", intent.kind(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{self, MemoryStore};
    use crate::stores::profile::{CachedProfile, ProfileSource, PROFILE_KEY};
    use crate::stores::Delivery;
    use crate::test_support::{RecordingRender, RecordingSink, Rendered};

    const ME: i64 = 7;

    fn session_with(sink: &RecordingSink, store: Arc<dyn LocalStore>) -> (Session<RecordingRender>, RecordingRender) {
        let render = RecordingRender::default();
        let session = Session::new(
            UserId::Number(ME),
            Box::new(sink.clone()),
            store,
            render.clone(),
            Duration::from_secs(3),
        );
        (session, render)
    }

    fn session(sink: &RecordingSink) -> (Session<RecordingRender>, RecordingRender) {
        session_with(sink, Arc::new(MemoryStore::new()))
    }

    fn history(texts: &[&str]) -> String {
        let messages: Vec<_> = texts
            .iter()
            .map(|t| serde_json::json!({"user_id": 1, "user_name": "Bob", "text": t}))
            .collect();
        serde_json::json!({"type": "history", "messages": messages, "online_count": 2}).to_string()
    }

    fn joined(room: &str, sink: &RecordingSink) -> (Session<RecordingRender>, RecordingRender) {
        let (mut s, render) = session(sink);
        s.join(room);
        s.handle_frame(&history(&["hello"])).unwrap();
        render.clear();
        (s, render)
    }

    #[test]
    fn join_then_history_transitions_to_joined() {
        let sink = RecordingSink::open();
        let (mut s, render) = session(&sink);

        s.join("lobby");
        assert_eq!(s.membership(), &Membership::Joining("lobby".into()));
        assert_eq!(sink.frames()[0], serde_json::json!({"action": "join", "user_id": ME, "group": "lobby"}));

        s.handle_frame(&history(&["one", "two"])).unwrap();
        assert_eq!(s.membership(), &Membership::Joined("lobby".into()));
        assert!(render.calls().contains(&Rendered::History("lobby".into(), 2)));
        assert!(render
            .calls()
            .contains(&Rendered::Online("lobby".into(), "2 members online".into())));
    }

    #[test]
    fn sending_text_is_optimistic_even_when_disconnected() {
        let sink = RecordingSink::open();
        let (mut s, render) = joined("lobby", &sink);
        sink.set_open(false);

        let local_id = s.send_text("  hi there ").unwrap();

        let room = s.messages().room("lobby").unwrap();
        assert_eq!(room.messages.len(), 2);
        let mine = room.messages.last().unwrap();
        assert_eq!(mine.local_id.as_deref(), Some(local_id.as_str()));
        assert_eq!(mine.delivery(), Delivery::Pending);
        assert_eq!(mine.body(), &MessageBody::Text("hi there".into()));
        assert_eq!(render.calls().len(), 1);
        // Only the join went out; the message was dropped by the transport.
        assert_eq!(sink.actions(), vec!["join"]);
    }

    #[test]
    fn sending_requires_a_joined_room() {
        let sink = RecordingSink::open();
        let (mut s, _render) = session(&sink);
        assert!(s.send_text("nobody home").is_none());

        s.join("lobby");
        assert!(s.send_text("too early").is_none());
        assert!(s.begin_image().is_none());
        assert!(s.messages().room("lobby").is_none());
        assert!(s.send_text("   ").is_none());
    }

    #[test]
    fn message_frame_carries_text() {
        let sink = RecordingSink::open();
        let (mut s, _render) = joined("lobby", &sink);
        s.send_text("hey");
        s.typing_pulse();
        s.typing_pulse();
        let frames = sink.frames();
        assert_eq!(
            frames[1],
            serde_json::json!({"action": "message", "user_id": ME, "group": "lobby", "text": "hey"})
        );
        assert_eq!(sink.actions(), vec!["join", "message", "typing", "typing"]);
    }

    #[test]
    fn switching_rooms_leaves_before_joining() {
        let sink = RecordingSink::open();
        let (mut s, render) = joined("A", &sink);

        s.join("B");
        assert_eq!(
            render.calls(),
            vec![Rendered::Cleared("A".into()), Rendered::Entered("B".into())]
        );
        assert_eq!(s.membership(), &Membership::Joining("B".into()));
        // No leave frame exists in the protocol.
        assert_eq!(sink.actions(), vec!["join", "join"]);
    }

    #[test]
    fn late_history_for_a_previous_room_is_discarded() {
        let sink = RecordingSink::open();
        let (mut s, render) = session(&sink);
        s.join("A");
        s.join("B");

        s.handle_frame(&history(&["for A"])).unwrap();
        assert_eq!(s.membership(), &Membership::Joining("B".into()));
        assert!(s.messages().room("A").is_none());

        s.handle_frame(&history(&["for B", "also B"])).unwrap();
        assert_eq!(s.membership(), &Membership::Joined("B".into()));
        assert_eq!(s.messages().room("B").unwrap().messages.len(), 2);
        assert!(!render.calls().iter().any(|c| matches!(c, Rendered::History(r, _) if r == "A")));
    }

    #[test]
    fn broadcasts_are_ignored_until_history_arrives() {
        let sink = RecordingSink::open();
        let (mut s, _render) = joined("A", &sink);
        s.join("B");
        s.handle_frame(r#"{"type":"new_message","message":{"user_id":1,"text":"old room"}}"#)
            .unwrap();
        assert!(s.messages().room("B").is_none());
        assert_eq!(s.messages().room("A").unwrap().messages.len(), 1);
    }

    #[test]
    fn confirmed_messages_append_after_history() {
        let sink = RecordingSink::open();
        let (mut s, render) = joined("lobby", &sink);
        s.handle_frame(r#"{"type":"new_message","message":{"user_id":1,"user_name":"Bob","text":"later"}}"#)
            .unwrap();

        let room = s.messages().room("lobby").unwrap();
        assert_eq!(room.messages.len(), 2);
        assert_eq!(room.messages[1].body(), &MessageBody::Text("later".into()));
        assert_eq!(room.messages[1].author_name, "Bob");
        assert!(matches!(&render.calls()[0], Rendered::Appended(r, _) if r == "lobby"));
    }

    #[test]
    fn unknown_and_malformed_frames_change_nothing() {
        let sink = RecordingSink::open();
        let (mut s, render) = joined("lobby", &sink);

        assert!(s.handle_frame(r#"{"type":"unknown_future_kind","x":1}"#).is_ok());
        assert!(matches!(s.handle_frame("<html>"), Err(EngineError::MalformedFrame(_))));

        assert!(render.calls().is_empty());
        assert_eq!(s.messages().room("lobby").unwrap().messages.len(), 1);
        assert_eq!(s.membership(), &Membership::Joined("lobby".into()));
        assert_eq!(sink.actions(), vec!["join"]);
    }

    #[test]
    fn typing_indicator_is_debounced_from_the_latest_pulse() {
        let sink = RecordingSink::open();
        let (mut s, render) = joined("lobby", &sink);
        let start = Instant::now();
        let typing = ServerEvent::Typing { user_name: Some("Bob".into()) };

        s.handle_event(typing.clone(), start);
        s.handle_event(typing, start + Duration::from_secs(2));
        assert_eq!(s.next_deadline(), Some(start + Duration::from_secs(5)));

        s.expire_typing(start + Duration::from_secs(3));
        assert!(s.presence().typing("lobby").is_some());

        s.expire_typing(start + Duration::from_secs(5));
        assert!(s.presence().typing("lobby").is_none());
        assert_eq!(
            render.calls().last(),
            Some(&Rendered::Typing("lobby".into(), None))
        );
        assert_eq!(
            render.calls()[0],
            Rendered::Typing("lobby".into(), Some("Bob is typing...".into()))
        );
    }

    #[test]
    fn typing_without_a_name_shows_anonymous() {
        let sink = RecordingSink::open();
        let (mut s, render) = joined("lobby", &sink);
        s.handle_frame(r#"{"type":"typing","user_name":null}"#).unwrap();
        assert_eq!(
            render.calls(),
            vec![Rendered::Typing("lobby".into(), Some("Anonymous is typing...".into()))]
        );
    }

    #[test]
    fn member_changes_notify_and_update_count() {
        let sink = RecordingSink::open();
        let (mut s, render) = joined("lobby", &sink);
        s.handle_frame(r#"{"type":"user_joined","user":{"name":"Cy"},"online_count":1}"#)
            .unwrap();
        s.handle_frame(r#"{"type":"user_left","user":{}}"#).unwrap();
        assert_eq!(
            render.calls(),
            vec![
                Rendered::Notice("Cy joined the chat".into()),
                Rendered::Online("lobby".into(), "1 member online".into()),
                Rendered::Notice("Anonymous left the chat".into()),
            ]
        );
    }

    #[test]
    fn image_send_waits_for_upload() {
        let sink = RecordingSink::open();
        let (mut s, render) = joined("lobby", &sink);

        let pending = s.begin_image().unwrap();
        let preview = s.messages().room("lobby").unwrap().messages.last().unwrap().clone();
        assert!(matches!(preview.body(), MessageBody::Image(ImageRef::Preview(_))));
        assert_eq!(sink.actions(), vec!["join"]);

        s.complete_image(pending, Ok("/static/uploads/cat.png".into()));
        let resolved = s.messages().room("lobby").unwrap().messages.last().unwrap().clone();
        assert_eq!(
            resolved.body(),
            &MessageBody::Image(ImageRef::Remote("/static/uploads/cat.png".into()))
        );
        assert!(matches!(render.calls().last(), Some(Rendered::Updated(_, _))));
        assert_eq!(sink.frames()[1]["image_url"], "/static/uploads/cat.png");
    }

    #[test]
    fn failed_upload_sends_nothing() {
        let sink = RecordingSink::open();
        let (mut s, render) = joined("lobby", &sink);
        let pending = s.begin_image().unwrap();
        let local_id = pending.local_id.clone();

        s.complete_image(pending, Err(EngineError::UploadFailed("HTTP 500".into())));
        assert_eq!(sink.actions(), vec!["join"]);
        assert_eq!(
            render.calls().last(),
            Some(&Rendered::UploadFailed("lobby".into(), local_id))
        );
    }

    #[test]
    fn upload_finishing_after_leaving_is_not_sent() {
        let sink = RecordingSink::open();
        let (mut s, _render) = joined("lobby", &sink);
        let pending = s.begin_image().unwrap();
        s.leave();
        s.complete_image(pending, Ok("/static/uploads/late.png".into()));
        assert_eq!(sink.actions(), vec!["join"]);
    }

    #[test]
    fn profile_update_is_persisted_and_announced() {
        let sink = RecordingSink::open();
        let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
        let (mut s, _render) = session_with(&sink, store.clone());
        assert_eq!(s.profile().display_name, "User7");

        let update = s.update_profile(" Ann ", Some("photoA".into())).unwrap();
        assert_eq!(update.display_name, "Ann");

        let cached: CachedProfile = storage::load(store.as_ref(), PROFILE_KEY).unwrap();
        assert_eq!(cached.display_name.as_deref(), Some("Ann"));
        assert_eq!(
            sink.frames()[0],
            serde_json::json!({"action": "update_profile", "user_id": ME, "name": "Ann", "photo_url": "photoA"})
        );
        assert!(s.update_profile("   ", None).is_none());
    }

    #[test]
    fn profile_update_survives_a_closed_socket() {
        let sink = RecordingSink::default();
        let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
        let (mut s, _render) = session_with(&sink, store.clone());

        assert!(s.update_profile("Ann", None).is_some());
        assert!(sink.frames().is_empty());
        let cached: CachedProfile = storage::load(store.as_ref(), PROFILE_KEY).unwrap();
        assert_eq!(cached.source, ProfileSource::Local);
    }

    #[test]
    fn remote_profile_seeds_only_an_empty_cache() {
        let sink = RecordingSink::open();
        let (mut s, render) = session(&sink);
        assert!(s.wants_remote_profile());

        s.apply_remote_profile(Err(EngineError::RemoteProfileUnavailable("timeout".into())));
        assert_eq!(s.profile().display_name, "User7");

        s.apply_remote_profile(Ok(RemoteProfile {
            display_name: Some("Bob".into()),
            photo_url: Some("photoB".into()),
        }));
        assert_eq!(s.profile().display_name, "Bob");
        assert!(matches!(render.calls().last(), Some(Rendered::Profile(p)) if p.display_name == "Bob"));
        assert!(!s.wants_remote_profile());
    }

    #[test]
    fn profile_echo_applies_only_to_self() {
        let sink = RecordingSink::open();
        let (mut s, _render) = session(&sink);
        s.handle_frame(r#"{"type":"profile_updated","user_id":99,"name":"Other","photo":null}"#)
            .unwrap();
        assert_eq!(s.profile().display_name, "User7");

        s.handle_frame(r#"{"type":"profile_updated","user_id":7,"name":"Me","photo":"p.png"}"#)
            .unwrap();
        assert_eq!(s.profile().display_name, "Me");
        assert_eq!(s.profile().photo_url.as_deref(), Some("p.png"));
    }

    #[test]
    fn reconnect_rejoins_the_active_room() {
        let sink = RecordingSink::open();
        let (mut s, _render) = joined("lobby", &sink);

        s.handle_connection_state(ConnectionState::Closed);
        s.handle_connection_state(ConnectionState::Connecting);
        s.handle_connection_state(ConnectionState::Open);
        assert_eq!(s.membership(), &Membership::Joining("lobby".into()));
        assert_eq!(sink.actions(), vec!["join", "join"]);

        s.handle_frame(&history(&["a", "b", "c"])).unwrap();
        assert_eq!(s.membership(), &Membership::Joined("lobby".into()));
        assert_eq!(s.messages().room("lobby").unwrap().messages.len(), 3);
    }

    #[test]
    fn join_before_connect_is_sent_once_open() {
        let sink = RecordingSink::default();
        let (mut s, _render) = session(&sink);
        s.join("lobby");
        assert!(sink.frames().is_empty());

        sink.set_open(true);
        s.handle_connection_state(ConnectionState::Open);
        assert_eq!(sink.actions(), vec!["join"]);
        s.handle_frame(&history(&[])).unwrap();
        assert!(s.messages().room("lobby").unwrap().is_empty());
    }

    #[test]
    fn cached_profile_is_rendered_at_startup() {
        let sink = RecordingSink::open();
        let store = MemoryStore::new();
        storage::save(
            &store,
            PROFILE_KEY,
            &CachedProfile {
                display_name: Some("Ann".into()),
                photo_url: None,
                source: ProfileSource::Local,
            },
        )
        .unwrap();
        let (s, render) = session_with(&sink, Arc::new(store));
        assert!(!s.wants_remote_profile());
        assert!(matches!(&render.calls()[0], Rendered::Profile(p) if p.display_name == "Ann"));
    }
}
