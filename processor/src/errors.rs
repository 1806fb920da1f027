use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key-value store error: {0}")]
    KeyValueStore(String),

    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed item: {0}")]
    MalformedItem(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used at handler boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something we will never accept.
    Validation,
    /// Parameter store or environment is missing something.
    Config,
    /// The network path to a backend failed.
    Transport,
    /// A backend answered with an error.
    Backend,
    /// Stored data could not be interpreted.
    Data,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::MissingParameter(_) | Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Transport,
            Error::Database(e) => match e {
                sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed => ErrorKind::Transport,
                _ => ErrorKind::Backend,
            },
            Error::KeyValueStore(_) | Error::ObjectStore(_) | Error::Notification(_) => {
                ErrorKind::Backend
            }
            Error::MalformedItem(_) | Error::Json(_) => ErrorKind::Data,
        }
    }

    /// HTTP status surfaced to the caller. Only validation failures are the
    /// caller's fault.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
