//! In-memory chat history and message sanitization.

use std::collections::VecDeque;

use playerqueue_protocol::{ChatLogEntry, SteamId};

use crate::PlayerQueueError;

/// Longest accepted message body, in characters, after sanitization.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// A bounded, chronological buffer of recent chat messages.
///
/// Pushing into a full buffer evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    entries: VecDeque<ChatLogEntry>,
    capacity: usize,
}

impl ChatHistory {
    /// Creates an empty history. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a message, returning the entry it evicted, if any.
    pub fn push(&mut self, entry: ChatLogEntry) -> Option<ChatLogEntry> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Drops every entry whose id is in `message_ids`. Returns the ids
    /// that were actually present.
    pub fn remove(&mut self, message_ids: &[i64]) -> Vec<i64> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if message_ids.contains(&entry.message_id) {
                removed.push(entry.message_id);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn get(&self, message_id: i64) -> Option<&ChatLogEntry> {
        self.entries.iter().find(|e| e.message_id == message_id)
    }

    /// Up to `limit` messages by `steam_id`, newest first.
    pub fn find_by_author(&self, steam_id: SteamId, limit: usize) -> Vec<ChatLogEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.steam_id == steam_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// The newest `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ChatLogEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// All messages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChatLogEntry> {
        self.entries.iter()
    }
}

/// Cleans a user-supplied message body.
///
/// Surrounding whitespace is trimmed, control characters and whitespace
/// other than a plain space are dropped, and `<`/`>` are escaped.
///
/// # Errors
/// [`PlayerQueueError::BadInput`] if nothing is left, or if the cleaned body
/// is longer than [`MAX_MESSAGE_LENGTH`] characters.
pub fn sanitize(body: &str) -> Result<String, PlayerQueueError> {
    let printable: String = body
        .trim()
        .chars()
        .filter(|&c| c == ' ' || !(c.is_control() || c.is_whitespace()))
        .collect();
    let printable = printable.trim();

    if printable.is_empty() {
        return Err(PlayerQueueError::BadInput("empty message".into()));
    }
    let length = printable.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(PlayerQueueError::BadInput(format!(
            "message is {length} characters, limit is {MAX_MESSAGE_LENGTH}"
        )));
    }

    let mut escaped = String::with_capacity(printable.len());
    for c in printable.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    Ok(escaped)
}
