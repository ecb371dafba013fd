use crate::id::IdGenerator;
use crate::id::UuidGenerator;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Maximum number of messages kept by a [`ChatStore`].
pub const CHAT_CAPACITY: usize = 100;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub username: String,
    pub content: String,

    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Bounded chat log shared by every connection of one server.
///
/// The oldest messages are evicted once the capacity is exceeded.
pub struct ChatStore {
    messages: Mutex<VecDeque<ChatMessage>>,
    capacity: usize,
    id_generator: Box<dyn IdGenerator + Send + Sync>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new(CHAT_CAPACITY, Box::new(UuidGenerator))
    }
}

impl ChatStore {
    pub fn new(capacity: usize, id_generator: Box<dyn IdGenerator + Send + Sync>) -> Self {
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
            id_generator,
        }
    }

    pub fn append(&self, username: String, content: String) -> ChatMessage {
        let message = ChatMessage {
            id: self.id_generator.generate(),
            username,
            content,
            timestamp: now_millis(),
        };

        let mut messages = self.lock();
        messages.push_back(message.clone());
        while messages.len() > self.capacity {
            messages.pop_front();
        }
        message
    }

    /// The last `limit` messages, oldest first. `None` returns the whole log.
    pub fn recent(&self, limit: Option<usize>) -> Vec<ChatMessage> {
        let messages = self.lock();
        let skip = limit.map_or(0, |l| messages.len().saturating_sub(l));
        messages.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ChatMessage>> {
        // Every critical section leaves the log consistent, so a poisoned lock is still usable.
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
