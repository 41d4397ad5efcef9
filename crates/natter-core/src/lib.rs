pub mod config;
pub mod error;
pub mod message;
pub mod notify;
pub mod persist;
pub mod session;
