use std::{fmt, io};

use ml_core::MlError;

pub type Result<T> = std::result::Result<T, Error>;

/// All errors that can occur while training or evaluating.
#[derive(Debug)]
pub enum Error {
    /// A model, loss or batch source rejected its inputs.
    Ml(MlError),
    /// Invalid configuration, caught before training starts.
    Config(String),
    /// Writing a report or reading a config file failed.
    Io(io::Error),
    /// A config file isn't valid JSON for `LearnerConfig`.
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ml(e) => write!(f, "{e}"),
            Self::Config(msg) => write!(f, "invalid config: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "malformed config: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ml(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Config(_) => None,
        }
    }
}

impl From<MlError> for Error {
    fn from(e: MlError) -> Self {
        Self::Ml(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
