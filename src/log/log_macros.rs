//! Leveled logging macros over any `LogSink`.
//!
//! The minimum level is chosen at build time with the cargo features
//! `log-trace`, `log-debug`, `log-info` (default), `log-warn` and
//! `log-error`. A call below that level is a constant-false branch: the
//! message is never formatted.

#[macro_export]
macro_rules! sink_log {
    ($sink:expr, $lvl:expr, $($arg:tt)*) => {{
        let __lvl: $crate::log::LogLevel = $lvl;
        if __lvl.enabled() {
            let __msg = format!($($arg)*);
            $sink.log(__lvl, &__msg, module_path!());
        }
    }};
}

#[macro_export]
macro_rules! sink_trace {
    ($sink:expr, $($arg:tt)*) => { $crate::sink_log!($sink, $crate::log::LogLevel::Trace, $($arg)*) };
}

#[macro_export]
macro_rules! sink_debug {
    ($sink:expr, $($arg:tt)*) => { $crate::sink_log!($sink, $crate::log::LogLevel::Debug, $($arg)*) };
}

#[macro_export]
macro_rules! sink_info {
    ($sink:expr, $($arg:tt)*) => { $crate::sink_log!($sink, $crate::log::LogLevel::Info, $($arg)*) };
}

#[macro_export]
macro_rules! sink_warn {
    ($sink:expr, $($arg:tt)*) => { $crate::sink_log!($sink, $crate::log::LogLevel::Warn, $($arg)*) };
}

#[macro_export]
macro_rules! sink_error {
    ($sink:expr, $($arg:tt)*) => { $crate::sink_log!($sink, $crate::log::LogLevel::Error, $($arg)*) };
}
