//! Process-lifetime, append-only stores.
//!
//! Nothing is evicted; entries go away only through `clear`. Each store is
//! guarded by a mutex so request handlers can share it through `&self`.

use crate::types::{ChatMessage, PrepResult, PrepSection, Role, VoiceMessage, VoiceMode};
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use uuid::Uuid;

/// Append / list / clear interface shared by the in-memory logs.
pub trait Repository<T> {
    fn append(&self, entry: T);
    /// All entries in insertion order.
    fn list(&self) -> Vec<T>;
    fn latest(&self) -> Option<T>;
    fn clear(&self);
}

#[derive(Debug)]
pub struct MemoryLog<T> {
    entries: Mutex<Vec<T>>,
}

impl<T> MemoryLog<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The last `limit` entries, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<T>
    where
        T: Clone,
    {
        let entries = self.entries();
        let start = entries.len().saturating_sub(limit);
        entries[start..].to_vec()
    }

    pub fn find_last(&self, predicate: impl Fn(&T) -> bool) -> Option<T>
    where
        T: Clone,
    {
        self.entries().iter().rev().find(|entry| predicate(entry)).cloned()
    }
}

impl<T> Default for MemoryLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Repository<T> for MemoryLog<T> {
    fn append(&self, entry: T) {
        self.entries().push(entry);
    }

    fn list(&self) -> Vec<T> {
        self.entries().clone()
    }

    fn latest(&self) -> Option<T> {
        self.entries().last().cloned()
    }

    fn clear(&self) {
        self.entries().clear();
    }
}

/// Millisecond timestamps that never go backwards and never repeat.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<i64>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `ticks` consecutive timestamps and return the first.
    pub fn reserve(&self, ticks: i64) -> i64 {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = now_ms();
        let start = match *last {
            Some(previous) if previous >= now => previous + 1,
            _ => now,
        };
        *last = Some(start + ticks.max(1) - 1);
        start
    }
}

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Generated preparedness results, oldest first.
#[derive(Debug, Default)]
pub struct PrepStore {
    results: MemoryLog<PrepResult>,
    clock: MonotonicClock,
}

impl PrepStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, sections: Vec<PrepSection>, reason: String) -> PrepResult {
        let result = PrepResult {
            id: new_id(),
            sections,
            reason,
            created_at: self.clock.reserve(1),
        };
        self.results.append(result.clone());
        result
    }

    pub fn list(&self) -> Vec<PrepResult> {
        self.results.list()
    }

    pub fn latest(&self) -> Option<PrepResult> {
        self.results.latest()
    }

    pub fn clear(&self) {
        self.results.clear();
    }
}

/// A user entry and the assistant entry that answered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user_message: VoiceMessage,
    pub assistant_message: VoiceMessage,
}

/// Voice log shown to the user plus the chat history replayed to the oracle.
#[derive(Debug, Default)]
pub struct VoiceStore {
    voice: MemoryLog<VoiceMessage>,
    chat: MemoryLog<ChatMessage>,
    clock: MonotonicClock,
}

impl VoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log an oracle exchange in both the voice log and the chat history.
    pub fn add_exchange(&self, user_text: &str, assistant_text: &str) -> Exchange {
        let exchange = self.record_command(user_text, assistant_text);
        for message in [&exchange.user_message, &exchange.assistant_message] {
            self.chat.append(ChatMessage {
                id: new_id(),
                role: message.role,
                content: message.text.clone(),
                created_at: message.created_at,
            });
        }
        exchange
    }

    /// Log a pair in the voice log only; the chat history is left untouched.
    pub fn record_command(&self, user_text: &str, assistant_text: &str) -> Exchange {
        let at = self.clock.reserve(2);
        let exchange = Exchange {
            user_message: VoiceMessage {
                id: new_id(),
                role: Role::User,
                mode: VoiceMode::Stt,
                text: user_text.to_string(),
                created_at: at,
            },
            assistant_message: VoiceMessage {
                id: new_id(),
                role: Role::Assistant,
                mode: VoiceMode::Tts,
                text: assistant_text.to_string(),
                created_at: at + 1,
            },
        };
        self.voice.append(exchange.user_message.clone());
        self.voice.append(exchange.assistant_message.clone());
        exchange
    }

    pub fn voice_messages(&self) -> Vec<VoiceMessage> {
        self.voice.list()
    }

    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.chat.list()
    }

    pub fn recent_chat(&self, limit: usize) -> Vec<ChatMessage> {
        self.chat.tail(limit)
    }

    pub fn last_user_message(&self) -> Option<String> {
        self.chat
            .find_last(|message| message.role == Role::User)
            .map(|message| message.content)
    }

    pub fn clear(&self) {
        self.voice.clear();
        self.chat.clear();
    }
}
