use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file error: {0}")]
    File(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(String),
    #[error("storage encoding error: {0}")]
    Serde(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("http error: {0}")]
    Http(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("stream error: {0}")]
    Stream(String),
}
