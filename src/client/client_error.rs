use std::{fmt, io};

use crate::client::frame_source::ResourceError;
use crate::file_transfer::FileTransferError;
use crate::protocol::FrameError;

#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    Frame(FrameError),
    Transfer(FileTransferError),
    Resource(ResourceError),
    /// No session is running, or the connections are already closed.
    NotRunning,
    AlreadyRunning,
    /// The server answered with something other than the expected reply.
    UnexpectedReply(String),
    /// A thread panicked while holding a connection lock.
    Poisoned,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Frame(e) => write!(f, "connection error: {e}"),
            Self::Transfer(e) => write!(f, "{e}"),
            Self::Resource(e) => write!(f, "{e}"),
            Self::NotRunning => write!(f, "client session is not running"),
            Self::AlreadyRunning => write!(f, "client session already started"),
            Self::UnexpectedReply(reply) => write!(f, "unexpected server reply {reply:?}"),
            Self::Poisoned => write!(f, "connection lock poisoned"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Frame(e) => Some(e),
            Self::Transfer(e) => Some(e),
            Self::Resource(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FrameError> for ClientError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<FileTransferError> for ClientError {
    fn from(e: FileTransferError) -> Self {
        Self::Transfer(e)
    }
}

impl From<ResourceError> for ClientError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}
