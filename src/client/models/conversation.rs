// Conversation aggregation and send gating for the chat screen
use crate::common::models::ChatMessage;
use std::collections::HashSet;

/// Merge a locally-seeded history with the live-channel stream.
///
/// Concatenates `initial` then `live`, keeps only the first occurrence of each
/// message id (so the seeded copy wins on collision), and sorts the result
/// chronologically. Timestamps are parsed to epoch millis before comparing;
/// unparseable ones sort first.
pub fn merge(initial: &[ChatMessage], live: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged: Vec<ChatMessage> = Vec::with_capacity(initial.len() + live.len());
    for message in initial.iter().chain(live.iter()) {
        if seen.insert(message.id.as_str()) {
            merged.push(message.clone());
        }
    }
    merged.sort_by_key(|m| m.created_at_epoch_ms());
    merged
}

/// One conversation screen's message state: the seeded history, the live
/// feed, and a memoized merged view. Every recomputation of the merged list
/// notifies the registered persistence callback with the full list.
#[derive(Default)]
pub struct Conversation {
    thread_id: String,
    initial: Vec<ChatMessage>,
    live: Vec<ChatMessage>,
    merged: Vec<ChatMessage>,
    dirty: bool,
    on_merged: Option<Box<dyn Fn(&[ChatMessage]) + Send + Sync>>,
}

impl Conversation {
    pub fn new(thread_id: &str) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            initial: Vec::new(),
            live: Vec::new(),
            merged: Vec::new(),
            dirty: true,
            on_merged: None,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Replace the seeded history (loaded out-of-band by the store).
    pub fn seed(&mut self, initial: Vec<ChatMessage>) {
        self.initial = initial;
        self.dirty = true;
    }

    pub fn push_live(&mut self, message: ChatMessage) {
        self.live.push(message);
        self.dirty = true;
    }

    /// Register the collaborator that persists the merged list on every
    /// recomputation.
    pub fn set_on_merged<F>(&mut self, callback: F)
    where
        F: Fn(&[ChatMessage]) + Send + Sync + 'static,
    {
        self.on_merged = Some(Box::new(callback));
    }

    /// The merged view. Recomputed only when the inputs changed since the
    /// last call; a recomputation fires the persistence callback.
    pub fn merged(&mut self) -> &[ChatMessage] {
        if self.dirty {
            self.merged = merge(&self.initial, &self.live);
            self.dirty = false;
            if let Some(callback) = &self.on_merged {
                callback(&self.merged);
            }
        }
        &self.merged
    }
}

/// The channel's broadcast primitive, seen from the gate.
pub trait Broadcast {
    fn broadcast(&mut self, content: &str);
}

/// Gates message submission on a live connection and a non-empty draft.
/// The UI disables the send control whenever `can_send` is false, so the
/// no-op path here is a defensive invariant rather than an error.
#[derive(Debug, Default)]
pub struct SendGate {
    connected: bool,
    draft: String,
}

impl SendGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror of the channel's connection state, flipped by the owner when
    /// the subscription succeeds or drops.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_draft(&mut self, draft: &str) {
        self.draft = draft.to_string();
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn can_send(&self) -> bool {
        self.connected && !self.draft.trim().is_empty()
    }

    /// Forward the trimmed draft to the channel and clear it. No-op when the
    /// draft trims to empty or the channel is disconnected.
    pub fn handle_send<B: Broadcast>(&mut self, channel: &mut B) {
        let content = self.draft.trim().to_string();
        if content.is_empty() || !self.connected {
            return;
        }
        channel.broadcast(&content);
        self.draft.clear();
    }
}
