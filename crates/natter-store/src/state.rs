use natter_core::session::Session;
use serde::{Deserialize, Serialize};

/// The whole session collection plus the active index. This is what
/// gets snapshotted to persistence after every mutating operation.
///
/// Invariant: `sessions` is never empty. The reducer re-creates a
/// fresh empty session in the same step that would otherwise delete
/// the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    pub sessions: Vec<Session>,
    pub current_session_index: usize,
}

impl StoreState {
    /// The active index forced into bounds. `current_session_index`
    /// can be transiently out of range (e.g. a stale snapshot); reads
    /// clamp it rather than panic.
    pub fn clamped_index(&self) -> usize {
        self.current_session_index
            .min(self.sessions.len().saturating_sub(1))
    }
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            sessions: vec![Session::new()],
            current_session_index: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_holds_one_empty_session() {
        let state = StoreState::default();
        assert_eq!(state.sessions.len(), 1);
        assert_eq!(state.current_session_index, 0);
        assert!(state.sessions[0].messages.is_empty());
    }

    #[test]
    fn clamped_index_pulls_overflow_into_range() {
        let mut state = StoreState::default();
        state.current_session_index = 7;
        assert_eq!(state.clamped_index(), 0);
    }
}
