use std::{fmt, io};

/// Malformed traffic. Any of these abandons the connection.
#[derive(Debug)]
pub enum ProtoError {
    /// The length header contained something other than ASCII digits.
    InvalidHeader(Vec<u8>),
    /// Declared (or outgoing) payload exceeds the allowed size.
    TooLarge { max: u64, actual: u64 },
    /// A text message was not valid UTF-8.
    InvalidUtf8,
    /// A text message outside the control vocabulary.
    UnknownControl(String),
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHeader(raw) => {
                write!(f, "invalid length header {:?}", String::from_utf8_lossy(raw))
            }
            Self::TooLarge { max, actual } => {
                write!(f, "message of {actual} bytes exceeds limit of {max}")
            }
            Self::InvalidUtf8 => write!(f, "text message is not valid UTF-8"),
            Self::UnknownControl(cmd) => write!(f, "unknown control message {cmd:?}"),
        }
    }
}

impl std::error::Error for ProtoError {}

/// Result of a failed read or write on a framed connection.
#[derive(Debug)]
pub enum FrameError {
    Io(io::Error),
    /// The peer closed the stream while more bytes were owed.
    ConnectionClosed,
    Proto(ProtoError),
}

impl FrameError {
    /// True for `ConnectionClosed` and for I/O errors that mean the peer is gone.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ),
            Self::Proto(_) => false,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed by peer"),
            Self::Proto(e) => write!(f, "protocol error: {e}"),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Proto(e) => Some(e),
            Self::ConnectionClosed => None,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(e)
        }
    }
}

impl From<ProtoError> for FrameError {
    fn from(e: ProtoError) -> Self {
        Self::Proto(e)
    }
}
