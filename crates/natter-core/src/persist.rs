use serde_json::Value;

use crate::error::StorageError;

/// Key under which the session store snapshots its whole state.
pub const SESSION_STORE_KEY: &str = "chat-sessions";

/// Key-value snapshot storage. Each key holds one JSON document;
/// the session store writes its entire state under a fixed key after
/// every mutating operation and reads it back once at startup.
pub trait Persistence: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Destructive: wipes every persisted key.
    fn clear_all(&self) -> Result<(), StorageError>;
}
