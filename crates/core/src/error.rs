use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad, missing or out-of-bounds action parameters. Raised before any
    /// browser effect is produced.
    #[error("{0}")]
    Validation(String),

    /// The requested action kind has no entry in the dispatch table.
    #[error("Action {0} not supported.")]
    UnsupportedAction(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// Failure forwarded unchanged from the underlying browser call.
    #[error("{0}")]
    Browser(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Tool error: {0}")]
    Tool(String),
}

impl Error {
    /// True for errors raised before the browser was touched.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::UnsupportedAction(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
