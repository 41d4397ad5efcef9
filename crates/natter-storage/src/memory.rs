use std::collections::HashMap;
use std::sync::Mutex;

use natter_core::error::StorageError;
use natter_core::persist::Persistence;
use serde_json::Value;

/// In-memory persistence for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a single key, for assertions in tests.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().expect("store lock poisoned").get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Persistence for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().expect("store lock poisoned").remove(key);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StorageError> {
        self.entries.lock().expect("store lock poisoned").clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clear_all_empties_the_map() {
        let store = MemoryStore::new();
        store.save("a", &json!(1)).unwrap();
        store.save("b", &json!(2)).unwrap();
        assert_eq!(store.len(), 2);
        store.clear_all().unwrap();
        assert!(store.is_empty());
    }
}
