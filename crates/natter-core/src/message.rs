use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One conversation turn. `content` is mutated in place while a reply
/// stream is active and is final once `streaming` drops back to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            date: Utc::now(),
            streaming: false,
            is_error: false,
            model: None,
        }
    }

    pub fn new_user(content: String) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn new_system(content: String) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// A streaming assistant message seeded with the first chunk's text.
    pub fn new_assistant(content: String, model: Option<String>) -> Self {
        let mut msg = Self::new(MessageRole::Assistant, content);
        msg.streaming = true;
        msg.model = model;
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_snake_case() {
        let msg = Message::new_user("hi".into());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        // optional fields stay quiet when unset
        assert!(!json.contains("\"model\""));
    }

    #[test]
    fn assistant_starts_streaming() {
        let msg = Message::new_assistant("Hel".into(), Some("gpt-4o-mini".into()));
        assert!(msg.streaming);
        assert_eq!(msg.content, "Hel");
        assert_eq!(msg.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn flags_default_on_deserialize() {
        let json = r#"{"id":"x","role":"assistant","content":"hi","date":"2024-01-01T00:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(!msg.streaming);
        assert!(!msg.is_error);
        assert!(msg.model.is_none());
    }
}
