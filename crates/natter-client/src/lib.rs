mod client;

pub use client::{derive_topic, ChatClient, SendOptions, SendOutcome, SendStatus};
