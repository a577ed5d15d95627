use std::fmt;

use tokio::sync::mpsc::error::SendError;

/// Catch-all error type shared by the protocol crates (`stun`, `rtp`, `rtcp`,
/// `turn`, `ice`). Each crate still defines its own richer error enum for
/// domain-specific failure modes; this one only carries opaque causes across
/// crate boundaries (`?` on a foreign error, wrapped with context).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Other(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(message: String) -> Self {
        Error::Other(message)
    }

    pub fn from_std<T>(error: T) -> Self
    where
        T: std::error::Error,
    {
        Error::Other(error.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Other(error.to_string())
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(error: std::num::ParseIntError) -> Self {
        Error::Other(error.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(error: url::ParseError) -> Self {
        Error::Other(error.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(error: std::string::FromUtf8Error) -> Self {
        Error::Other(error.to_string())
    }
}

impl From<std::array::TryFromSliceError> for Error {
    fn from(error: std::array::TryFromSliceError) -> Self {
        Error::Other(error.to_string())
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(error: std::time::SystemTimeError) -> Self {
        Error::Other(error.to_string())
    }
}

impl<T> From<SendError<T>> for Error {
    fn from(error: SendError<T>) -> Self {
        Error::Other(error.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Error::Other(error.to_string())
    }
}
