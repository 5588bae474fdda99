//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{EngineError, EngineResult};
use crate::render::RenderSink;
use crate::stores::{EffectiveProfile, StoredMessage};
use crate::ws::{ConnectionState, FrameSink};

/// Frame sink that records what it was given and can be toggled closed.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub frames: Arc<Mutex<Vec<String>>>,
    pub open: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn open() -> Self {
        let sink = Self::default();
        sink.set_open(true);
        sink
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<serde_json::Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    pub fn actions(&self) -> Vec<String> {
        self.frames()
            .iter()
            .map(|f| f["action"].as_str().unwrap().to_string())
            .collect()
    }
}

impl FrameSink for RecordingSink {
    fn send_frame(&self, frame: String) -> EngineResult<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(EngineError::NotConnected);
        }
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    State(ConnectionState),
    Entered(String),
    Cleared(String),
    History(String, usize),
    Appended(String, StoredMessage),
    Updated(String, StoredMessage),
    Online(String, String),
    Typing(String, Option<String>),
    Notice(String),
    Profile(EffectiveProfile),
    UploadFailed(String, String),
}

/// Render sink that keeps every call for later inspection.
#[derive(Clone, Default)]
pub struct RecordingRender {
    pub calls: Arc<Mutex<Vec<Rendered>>>,
}

impl RecordingRender {
    pub fn calls(&self) -> Vec<Rendered> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn push(&self, call: Rendered) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RenderSink for RecordingRender {
    fn connection_state(&mut self, state: ConnectionState) {
        self.push(Rendered::State(state));
    }

    fn room_entered(&mut self, room: &str) {
        self.push(Rendered::Entered(room.to_string()));
    }

    fn room_cleared(&mut self, room: &str) {
        self.push(Rendered::Cleared(room.to_string()));
    }

    fn history(&mut self, room: &str, messages: &[StoredMessage]) {
        self.push(Rendered::History(room.to_string(), messages.len()));
    }

    fn message_appended(&mut self, room: &str, message: &StoredMessage) {
        self.push(Rendered::Appended(room.to_string(), message.clone()));
    }

    fn message_updated(&mut self, room: &str, message: &StoredMessage) {
        self.push(Rendered::Updated(room.to_string(), message.clone()));
    }

    fn online_count(&mut self, room: &str, label: &str) {
        self.push(Rendered::Online(room.to_string(), label.to_string()));
    }

    fn typing(&mut self, room: &str, indicator: Option<&str>) {
        self.push(Rendered::Typing(room.to_string(), indicator.map(str::to_string)));
    }

    fn notification(&mut self, text: &str) {
        self.push(Rendered::Notice(text.to_string()));
    }

    fn profile(&mut self, profile: &EffectiveProfile) {
        self.push(Rendered::Profile(profile.clone()));
    }

    fn upload_failed(&mut self, room: &str, local_id: &str) {
        self.push(Rendered::UploadFailed(room.to_string(), local_id.to_string()));
    }
}
