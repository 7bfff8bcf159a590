//! Process logging: a bounded, non-blocking file logger plus the `LogSink`
//! abstraction every networking component writes through.

pub mod log_level;
pub mod log_macros;
pub mod log_msg;
pub mod log_sink;
pub mod logger;
pub mod logger_handle;

pub use log_level::LogLevel;
pub use log_sink::{LogSink, NoopLogSink};
pub use logger::Logger;
pub use logger_handle::LoggerHandle;

use std::time::SystemTime;

/// Milliseconds since the UNIX epoch, `0` if the clock is before it.
pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
