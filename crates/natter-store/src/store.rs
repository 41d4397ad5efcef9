use std::sync::Arc;
use std::time::{Duration, Instant};

use natter_core::message::Message;
use natter_core::notify::Notifier;
use natter_core::persist::{Persistence, SESSION_STORE_KEY};
use natter_core::session::Session;
use tracing::{debug, warn};

use crate::reducer::{reduce, Command};
use crate::state::StoreState;

/// How long an undo stays available after a delete.
pub const UNDO_WINDOW: Duration = Duration::from_secs(5);

struct PendingUndo {
    snapshot: StoreState,
    expires_at: Instant,
}

/// Owns the session collection and the active index. Every mutation
/// goes through here: a command (or updater) produces a new state,
/// which is committed and snapshotted to persistence in one step.
pub struct SessionStore {
    state: StoreState,
    persistence: Arc<dyn Persistence>,
    notifier: Arc<dyn Notifier>,
    pending_undo: Option<PendingUndo>,
    undo_window: Duration,
}

impl SessionStore {
    /// Loads the persisted snapshot, falling back to the default
    /// single-empty-session state when none exists or it fails to
    /// decode (a stale snapshot is not worth refusing to start over).
    pub fn new(persistence: Arc<dyn Persistence>, notifier: Arc<dyn Notifier>) -> Self {
        let state = match persistence.load(SESSION_STORE_KEY) {
            Ok(Some(value)) => match serde_json::from_value::<StoreState>(value) {
                Ok(state) if !state.sessions.is_empty() => state,
                Ok(_) => StoreState::default(),
                Err(e) => {
                    warn!("discarding undecodable session snapshot: {e}");
                    StoreState::default()
                }
            },
            Ok(None) => StoreState::default(),
            Err(e) => {
                warn!("failed to load session snapshot: {e}");
                StoreState::default()
            }
        };

        Self {
            state,
            persistence,
            notifier,
            pending_undo: None,
            undo_window: UNDO_WINDOW,
        }
    }

    /// Overrides the undo window. Tests use this to exercise expiry
    /// without waiting out the real five seconds.
    pub fn with_undo_window(mut self, window: Duration) -> Self {
        self.undo_window = window;
        self
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn sessions(&self) -> &[Session] {
        &self.state.sessions
    }

    pub fn current_session_index(&self) -> usize {
        self.state.current_session_index
    }

    /// Swaps in the new state and snapshots it. Persistence is
    /// best-effort: a failed write is logged, never surfaced, and the
    /// in-memory mutation stands.
    fn commit(&mut self, next: StoreState) {
        self.state = next;
        match serde_json::to_value(&self.state) {
            Ok(value) => {
                if let Err(e) = self.persistence.save(SESSION_STORE_KEY, &value) {
                    warn!("failed to persist session snapshot: {e}");
                }
            }
            Err(e) => warn!("failed to encode session snapshot: {e}"),
        }
    }

    pub fn apply(&mut self, command: Command) {
        debug!(?command, "applying store command");
        let next = reduce(&self.state, &command);
        self.commit(next);
    }

    pub fn new_session(&mut self) {
        self.apply(Command::NewSession);
    }

    pub fn select_session(&mut self, index: usize) {
        self.apply(Command::SelectSession { index });
    }

    pub fn next_session(&mut self, delta: i64) {
        self.apply(Command::NextSession { delta });
    }

    pub fn move_session(&mut self, from: usize, to: usize) {
        self.apply(Command::MoveSession { from, to });
    }

    /// Removes the session at `index` and opens the undo window. The
    /// pre-delete snapshot is captured whole; `undo_delete` restores
    /// it atomically or not at all.
    pub fn delete_session(&mut self, index: usize) {
        if index >= self.state.sessions.len() {
            return;
        }
        let snapshot = self.state.clone();
        self.apply(Command::DeleteSession { index });
        self.pending_undo = Some(PendingUndo {
            snapshot,
            expires_at: Instant::now() + self.undo_window,
        });
        self.notifier.info(&format!(
            "Session deleted. Undo available for {} seconds.",
            self.undo_window.as_secs()
        ));
    }

    /// Restores the pre-delete snapshot if the window is still open.
    /// Returns whether anything was restored.
    pub fn undo_delete(&mut self) -> bool {
        let Some(pending) = self.pending_undo.take() else {
            return false;
        };
        if Instant::now() > pending.expires_at {
            return false;
        }
        self.commit(pending.snapshot);
        true
    }

    /// Drops the pending undo without restoring anything.
    pub fn dismiss_undo(&mut self) {
        self.pending_undo = None;
    }

    pub fn undo_available(&self) -> bool {
        self.pending_undo
            .as_ref()
            .is_some_and(|p| Instant::now() <= p.expires_at)
    }

    /// The active session. A transiently out-of-range index is
    /// clamped (and the correction persisted) before returning.
    pub fn current_session(&mut self) -> &Session {
        let index = self.state.clamped_index();
        if index != self.state.current_session_index {
            let mut next = self.state.clone();
            next.current_session_index = index;
            self.commit(next);
        }
        &self.state.sessions[index]
    }

    /// Runs `updater` against the active session, then persists. No
    /// diffing: every call is treated as a state change. A missing
    /// target is a silent no-op.
    pub fn update_current_session(&mut self, updater: impl FnOnce(&mut Session)) {
        let index = self.state.current_session_index;
        self.update_session(index, updater);
    }

    pub fn update_session(&mut self, index: usize, updater: impl FnOnce(&mut Session)) {
        let mut next = self.state.clone();
        let Some(session) = next.sessions.get_mut(index) else {
            return;
        };
        updater(session);
        self.commit(next);
    }

    /// Runs `updater` against one message, then persists. A missing
    /// session or message index is a silent no-op.
    pub fn update_message(
        &mut self,
        session_index: usize,
        message_index: usize,
        updater: impl FnOnce(&mut Message),
    ) {
        let mut next = self.state.clone();
        let Some(message) = next
            .sessions
            .get_mut(session_index)
            .and_then(|s| s.messages.get_mut(message_index))
        else {
            return;
        };
        updater(message);
        self.commit(next);
    }

    /// Appends a turn to the active session and refreshes its
    /// bookkeeping (last-update timestamp, counters).
    pub fn on_new_message(&mut self, message: Message) {
        self.update_current_session(|session| {
            session.messages.push(message);
            session.refresh_stat();
            session.touch();
        });
    }

    /// The condensed history summary of the active session as a
    /// system message.
    pub fn memory_prompt(&mut self) -> Message {
        self.current_session().memory_prompt_message()
    }

    pub fn reset_session(&mut self) {
        self.apply(Command::ResetSession);
    }

    pub fn clear_sessions(&mut self) {
        self.apply(Command::ClearSessions);
    }

    /// Destructive wipe: every persisted key is removed and the
    /// in-memory state goes back to a single empty session (the
    /// client-side equivalent of clearing storage and reloading).
    pub fn clear_all_data(&mut self) {
        if let Err(e) = self.persistence.clear_all() {
            warn!("failed to clear persisted data: {e}");
        }
        self.pending_undo = None;
        self.state = StoreState::default();
    }
}
