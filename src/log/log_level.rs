use std::fmt;

/// Defines the severity levels for log messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Per-chunk and per-frame noise.
    Trace,
    /// Fine-grained events useful while debugging a session.
    Debug,
    /// Connection lifecycle and file transfer milestones.
    Info,
    /// Recoverable faults (bad frame, failed broadcast target).
    Warn,
    /// Faults that abort an operation or a connection.
    Error,
}

impl LogLevel {
    /// Whether this level is compiled in (see the `log-*` cargo features).
    #[must_use]
    pub const fn enabled(self) -> bool {
        match self {
            Self::Trace => cfg!(feature = "log-trace"),
            Self::Debug => cfg!(feature = "log-debug"),
            Self::Info => cfg!(feature = "log-info"),
            Self::Warn => cfg!(feature = "log-warn"),
            Self::Error => cfg!(feature = "log-error"),
        }
    }

    /// Short, fixed-width label used in log files.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warn => "WARN ",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().trim_end())
    }
}
