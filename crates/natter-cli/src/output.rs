use std::io::{self, Write};

use natter_core::notify::Notifier;
use natter_core::session::Session;
use tokio::sync::mpsc;

/// Terminal toasts: info lines go out dim, errors loud, both on stderr
/// so streamed reply text on stdout stays clean.
pub struct ToastNotifier;

impl Notifier for ToastNotifier {
    fn info(&self, message: &str) {
        eprintln!("  \x1b[90m{message}\x1b[0m");
    }

    fn error(&self, message: &str) {
        eprintln!("  \x1b[31;1m[error]\x1b[0m {message}");
    }
}

/// Prints reply chunks as they arrive until the sender side closes.
pub async fn render_deltas(mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(piece) = rx.recv().await {
        print!("{piece}");
        io::stdout().flush().ok();
    }
}

pub fn render_session_list(sessions: &[Session], current: usize) {
    for (i, session) in sessions.iter().enumerate() {
        let marker = if i == current { " \x1b[33m←\x1b[0m" } else { "" };
        eprintln!(
            "    \x1b[1;33m[{}]\x1b[0m {}{}  \x1b[90m({} msgs)\x1b[0m",
            i + 1,
            session.topic,
            marker,
            session.messages.len(),
        );
    }
    eprintln!();
}
