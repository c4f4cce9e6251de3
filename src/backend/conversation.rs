//! Bounded multi-turn conversation history keyed by conversation id

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use utoipa::ToSchema;

/// Conversation used when the caller does not supply an id
pub const DEFAULT_CONVERSATION_ID: &str = "default";

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Chat message stored in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug)]
struct ConversationRecord {
    turns: VecDeque<ChatMessage>,
}

/// Size-bounded message history shared by stateful backends
#[derive(Debug)]
pub struct ConversationStore {
    conversations: DashMap<String, ConversationRecord>,
    max_length: usize,
}

impl ConversationStore {
    pub fn new(max_length: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Append a turn, evicting the oldest ones beyond `max_length`.
    ///
    /// Returns the conversation length after the append.
    pub fn add_message(&self, id: &str, role: Role, content: impl Into<String>) -> usize {
        let mut record = self.record(id);
        self.push(&mut record, role, content.into());
        record.turns.len()
    }

    /// Record one user/assistant exchange atomically.
    ///
    /// Under a single entry lock: opens the conversation with `system_prompt`
    /// if it is empty, builds the reply from the history so far, then appends
    /// the user turn and the reply. Concurrent exchanges on the same id never
    /// interleave. Returns the reply and the conversation length afterwards.
    pub fn record_exchange<F>(
        &self,
        id: &str,
        system_prompt: Option<&str>,
        prompt: &str,
        compose: F,
    ) -> (String, usize)
    where
        F: FnOnce(&[ChatMessage]) -> String,
    {
        let mut record = self.record(id);

        if let Some(system_prompt) = system_prompt {
            if record.turns.is_empty() {
                self.push(&mut record, Role::System, system_prompt.to_string());
            }
        }

        let reply = compose(record.turns.make_contiguous());
        self.push(&mut record, Role::User, prompt.to_string());
        self.push(&mut record, Role::Assistant, reply.clone());
        (reply, record.turns.len())
    }

    fn record(&self, id: &str) -> RefMut<'_, String, ConversationRecord> {
        self.conversations
            .entry(id.to_string())
            .or_insert_with(|| ConversationRecord {
                turns: VecDeque::new(),
            })
    }

    fn push(&self, record: &mut ConversationRecord, role: Role, content: String) {
        record.turns.push_back(ChatMessage { role, content });
        while record.turns.len() > self.max_length {
            record.turns.pop_front();
        }
    }

    /// Ordered copy of a conversation's turns; empty for unknown ids
    pub fn history(&self, id: &str) -> Vec<ChatMessage> {
        self.conversations
            .get(id)
            .map(|r| r.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, id: &str) -> usize {
        self.conversations.get(id).map_or(0, |r| r.turns.len())
    }

    /// Reset a single conversation; others are untouched
    pub fn clear(&self, id: &str) {
        if let Some(mut record) = self.conversations.get_mut(id) {
            record.turns.clear();
        }
    }

    /// Drop a conversation entirely, returning whether it existed
    pub fn remove(&self, id: &str) -> bool {
        self.conversations.remove(id).is_some()
    }

    pub fn conversation_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.conversations.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(20)
    }
}
