use thiserror::Error;

/// Result type for rendezvous operations
pub type Result<T> = std::result::Result<T, Error>;

/// How a failure should be handled by the per-account loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network trouble or an expired session. Skip the cycle, retry next poll.
    Transient,
    /// The server refused the action. Log it and move on.
    Rejected,
    /// Bad or missing event configuration. Fatal to the event, not the process.
    Config,
    /// Missing data the runner relies on. Ends this account's task only.
    Fatal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("login failed: {0}")]
    Login(String),

    #[error("server rejected request [{code:?}]: {message}")]
    Rejected { code: Option<i64>, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("step {0} missing from event table")]
    MissingStep(u32),

    #[error("option {option} missing from step {step}")]
    MissingOption { step: u32, option: usize },

    #[error("machine tier {0} missing from event table")]
    MissingTier(u32),
}

impl Error {
    pub fn rejected(code: Option<i64>, message: impl Into<String>) -> Self {
        Error::Rejected {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Login(_) | Error::Malformed(_) | Error::Io(_) => {
                ErrorKind::Transient
            }
            Error::Rejected { .. } => ErrorKind::Rejected,
            Error::Json(_) | Error::Config(_) => ErrorKind::Config,
            Error::MissingStep(_) | Error::MissingOption { .. } | Error::MissingTier(_) => {
                ErrorKind::Fatal
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Server message for rejections, if any.
    pub fn rejection_message(&self) -> Option<&str> {
        match self {
            Error::Rejected { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}
