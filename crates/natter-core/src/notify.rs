/// Transient user notifications (the toast layer of a UI). The store
/// and client only ever talk to this trait; rendering is the
/// embedder's problem.
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Swallows everything. Useful for tests and headless runs.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn info(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}
