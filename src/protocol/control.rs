use std::fmt;
use std::str::FromStr;

use super::ProtoError;

/// Control vocabulary exchanged as text messages.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Control {
    /// Peer -> coordinator: a binary frame envelope follows.
    Stream,
    /// Peer -> coordinator: end this session.
    Stop,
    /// Peer -> coordinator: a file transfer follows.
    /// Coordinator -> peers (broadcast): a file is available for download.
    UploadFile,
    /// Peer -> coordinator: send me the most recent file.
    RequestLastFile,
    /// Coordinator -> peer: a file transfer follows.
    File,
    /// Coordinator -> peer: nothing to download.
    NoFile,
    /// Coordinator -> peers (broadcast): the exam is over.
    TestOver,
}

impl Control {
    pub const ALL: [Control; 7] = [
        Control::Stream,
        Control::Stop,
        Control::UploadFile,
        Control::RequestLastFile,
        Control::File,
        Control::NoFile,
        Control::TestOver,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Control::Stream => "STREAM",
            Control::Stop => "STOP",
            Control::UploadFile => "UPLOAD_FILE",
            Control::RequestLastFile => "REQUEST_LAST_FILE",
            Control::File => "FILE",
            Control::NoFile => "NO_FILE",
            Control::TestOver => "TEST_OVER",
        }
    }

    /// Messages the coordinator pushes without being asked.
    #[must_use]
    pub const fn is_notification(self) -> bool {
        matches!(self, Control::TestOver | Control::UploadFile)
    }
}

impl FromStr for Control {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Control::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ProtoError::UnknownControl(s.to_owned()))
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn every_word_parses_back() {
        for c in Control::ALL {
            assert_eq!(c.as_str().parse::<Control>().unwrap(), c);
        }
    }

    #[test]
    fn matching_is_exact() {
        assert!("stream".parse::<Control>().is_err());
        assert!("STREAM ".parse::<Control>().is_err());
        assert!("".parse::<Control>().is_err());
    }
}
