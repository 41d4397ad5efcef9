use natter_core::session::Session;

use crate::state::StoreState;

/// A session-collection operation. Reducing a command is pure: the
/// caller gets a new state and decides when to persist it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Prepend a fresh empty session and make it active.
    NewSession,
    /// Set the active index. Validity is a caller contract on this
    /// path; out-of-range values are corrected lazily on read.
    SelectSession { index: usize },
    /// Cycle the active index forward/backward with wrap-around.
    NextSession { delta: i64 },
    /// Relocate a session, keeping the previously active session
    /// active regardless of the shift.
    MoveSession { from: usize, to: usize },
    /// Remove a session. Deleting the last remaining session creates
    /// a fresh empty one in the same reduction.
    DeleteSession { index: usize },
    /// Clear messages and memory summary of the active session.
    ResetSession,
    /// Back to a single empty session.
    ClearSessions,
}

/// Applies `command` to `state`. Invalid targets reduce to an
/// unchanged state (fail silent, stay consistent).
pub fn reduce(state: &StoreState, command: &Command) -> StoreState {
    match *command {
        Command::NewSession => {
            let mut sessions = Vec::with_capacity(state.sessions.len() + 1);
            sessions.push(Session::new());
            sessions.extend(state.sessions.iter().cloned());
            StoreState {
                sessions,
                current_session_index: 0,
            }
        }

        Command::SelectSession { index } => StoreState {
            sessions: state.sessions.clone(),
            current_session_index: index,
        },

        Command::NextSession { delta } => {
            let n = state.sessions.len() as i64;
            let i = state.current_session_index as i64;
            StoreState {
                sessions: state.sessions.clone(),
                current_session_index: (i + delta).rem_euclid(n) as usize,
            }
        }

        Command::MoveSession { from, to } => {
            if from >= state.sessions.len() {
                return state.clone();
            }
            let mut sessions = state.sessions.clone();
            let session = sessions.remove(from);
            let to = to.min(sessions.len());
            sessions.insert(to, session);

            // Keep the previously active session active: it either
            // moved itself (from -> to) or was shifted by one when the
            // move crossed over it.
            let old = state.current_session_index;
            let mut next = if old == from { to } else { old };
            if old > from && old <= to {
                next -= 1;
            } else if old < from && old >= to {
                next += 1;
            }

            StoreState {
                sessions,
                current_session_index: next,
            }
        }

        Command::DeleteSession { index } => {
            if index >= state.sessions.len() {
                return state.clone();
            }
            let deleting_last = state.sessions.len() == 1;
            let mut sessions = state.sessions.clone();
            sessions.remove(index);

            let current = state.current_session_index;
            let mut next_index = current
                .saturating_sub(usize::from(index < current))
                .min(sessions.len().saturating_sub(1));

            if deleting_last {
                next_index = 0;
                sessions.push(Session::new());
            }

            StoreState {
                sessions,
                current_session_index: next_index,
            }
        }

        Command::ResetSession => {
            let mut next = state.clone();
            if let Some(session) = next.sessions.get_mut(next.current_session_index) {
                session.messages.clear();
                session.memory_prompt.clear();
                session.refresh_stat();
                session.touch();
            }
            next
        }

        Command::ClearSessions => StoreState::default(),
    }
}
