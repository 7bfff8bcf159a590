use crate::log::log_level::LogLevel;

/// A single log record travelling from a producer thread to the logger worker.
#[derive(Debug, Clone)]
pub struct LogMsg {
    pub level: LogLevel,
    /// Milliseconds since the UNIX epoch.
    pub ts_ms: u128,
    pub text: String,
    /// Module path of the call site.
    pub target: &'static str,
}

impl LogMsg {
    pub fn new(
        level: LogLevel,
        text: impl Into<String>,
        target: &'static str,
        ts_ms: u128,
    ) -> Self {
        Self {
            level,
            ts_ms,
            text: text.into(),
            target,
        }
    }

    /// Renders the record as one log-file line (no trailing newline).
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "[{}] {} {} | {}",
            self.level.label(),
            self.ts_ms,
            self.target,
            self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_contains_level_target_and_text() {
        let msg = LogMsg::new(LogLevel::Warn, "peer dropped", "proctorcast::server", 42);
        assert_eq!(msg.render(), "[WARN ] 42 proctorcast::server | peer dropped");
    }
}
