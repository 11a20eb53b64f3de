use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the client library.
///
/// None of these are fatal: callers report the message and return to the previous state. Only
/// `Unauthorized` coming out of a failed refresh has already torn the session down.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected locally before any request was made (bad file type, size, arguments)
    #[error("{0}")]
    Validation(String),

    #[error("not authorized (401): {0}")]
    Unauthorized(String),

    #[error("forbidden (403): {0}")]
    Forbidden(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Business error reported by the backend as `success: false`
    #[error("{0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("session storage: {0}")]
    Storage(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}
