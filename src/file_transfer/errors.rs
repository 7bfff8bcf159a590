use std::{fmt, io};

use crate::protocol::FrameError;

#[derive(Debug)]
pub enum FileTransferError {
    /// The connection failed; the owning session must be torn down.
    Frame(FrameError),
    /// Local filesystem failure. Only this transfer is lost: the connection
    /// is still correctly framed.
    Io(io::Error),
    /// The file name is unusable (empty, `.`/`..`, or not UTF-8).
    InvalidName(String),
}

impl FileTransferError {
    /// Whether the connection carrying the transfer must be abandoned.
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, Self::Frame(_))
    }
}

impl fmt::Display for FileTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "file transfer connection error: {e}"),
            Self::Io(e) => write!(f, "file transfer I/O error: {e}"),
            Self::InvalidName(name) => write!(f, "invalid file name {name:?}"),
        }
    }
}

impl std::error::Error for FileTransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Frame(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::InvalidName(_) => None,
        }
    }
}

impl From<FrameError> for FileTransferError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<io::Error> for FileTransferError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
