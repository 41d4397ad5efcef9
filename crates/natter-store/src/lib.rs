mod reducer;
mod state;
mod store;

pub use reducer::{reduce, Command};
pub use state::StoreState;
pub use store::{SessionStore, UNDO_WINDOW};
