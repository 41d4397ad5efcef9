use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageRole};

/// Topic given to a session before its first exchange names it.
pub const DEFAULT_TOPIC: &str = "New Conversation";

/// Rough counters kept per session; refreshed whenever a turn lands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStat {
    pub token_count: u64,
    pub word_count: u64,
    pub char_count: u64,
}

/// One independent conversation thread with its own message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub topic: String,
    pub memory_prompt: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stat: SessionStat,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub last_summarize_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_context_index: Option<usize>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            memory_prompt: String::new(),
            messages: Vec::new(),
            stat: SessionStat::default(),
            last_update: Utc::now(),
            last_summarize_index: 0,
            clear_context_index: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_update = Utc::now();
    }

    /// Recomputes the per-session counters from the message history.
    /// Token count is a 4-chars-per-token estimate, not a real tokenizer.
    pub fn refresh_stat(&mut self) {
        let mut chars = 0u64;
        let mut words = 0u64;
        for msg in &self.messages {
            chars += msg.content.chars().count() as u64;
            words += msg.content.split_whitespace().count() as u64;
        }
        self.stat = SessionStat {
            token_count: chars / 4,
            word_count: words,
            char_count: chars,
        };
    }

    /// The condensed history summary as a system message, injected as
    /// context ahead of the live turns. Empty content when no summary
    /// has been produced yet.
    pub fn memory_prompt_message(&self) -> Message {
        let content = if self.memory_prompt.is_empty() {
            String::new()
        } else {
            format!(
                "This is a summary of the earlier conversation as a recap: {}",
                self.memory_prompt
            )
        };
        Message::new(MessageRole::System, content)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
