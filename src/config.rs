use std::collections::HashMap;
use std::fs;
use std::str::FromStr;

/// INI-style configuration: `key = value` lines, `[Section]` headers and `#`
/// comments. Keys before the first header are globals and act as a fallback
/// for the `*_or_default` lookups.
#[derive(Debug, Default)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Error reading file {path}: {e}"))?;
        Ok(Self::parse(&content))
    }

    /// Loads the first readable file among `paths`, or an empty config.
    ///
    /// Returns the config and the path it came from, if any.
    pub fn load_first(paths: &[&str]) -> (Self, Option<String>) {
        for path in paths {
            if let Ok(cfg) = Self::load(path) {
                return (cfg, Some((*path).to_owned()));
            }
        }
        (Self::empty(), None)
    }

    /// Parses configuration text. Malformed lines are skipped.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut globals = HashMap::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim();
                current_section = Some(name.to_string());
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim().to_string();
                let value = value.trim().trim_matches('"').to_string();

                match &current_section {
                    None => {
                        globals.insert(key, value);
                    }
                    Some(sec) => {
                        sections.entry(sec.clone()).or_default().insert(key, value);
                    }
                }
            }
        }
        Config { globals, sections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_or_default<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get(section, key)
            .or_else(|| self.get_global(key))
            .unwrap_or(default)
    }

    #[must_use]
    pub fn get_non_empty_or_default<'a>(
        &'a self,
        section: &str,
        key: &str,
        default: &'a str,
    ) -> &'a str {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .unwrap_or(default)
    }

    /// Parses `[section] key` (or the global `key`) into `T`.
    ///
    /// Returns `None` when the key is absent, empty or does not parse.
    #[must_use]
    pub fn get_parsed<T: FromStr>(&self, section: &str, key: &str) -> Option<T> {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .and_then(|s| s.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# proctorcast sample
echo_stderr = false

[Server]
bind_addr = "0.0.0.0:6000"
storage_dir = ./client_files
max_message_len = 1024

[Client]
fps = fifteen
username =
"#;

    #[test]
    fn parses_sections_globals_and_quotes() {
        let cfg = Config::parse(SAMPLE);
        assert_eq!(cfg.get("Server", "bind_addr"), Some("0.0.0.0:6000"));
        assert_eq!(cfg.get("Server", "storage_dir"), Some("./client_files"));
        assert_eq!(cfg.get_global("echo_stderr"), Some("false"));
        assert_eq!(cfg.get("Client", "username"), Some(""));
    }

    #[test]
    fn non_empty_lookups_fall_back() {
        let cfg = Config::parse(SAMPLE);
        assert_eq!(cfg.get_non_empty("Client", "username"), None);
        assert_eq!(
            cfg.get_non_empty_or_default("Client", "username", "student"),
            "student"
        );
        assert_eq!(cfg.get_or_default("Logging", "echo_stderr", "true"), "false");
    }

    #[test]
    fn get_parsed_rejects_garbage() {
        let cfg = Config::parse(SAMPLE);
        assert_eq!(cfg.get_parsed::<usize>("Server", "max_message_len"), Some(1024));
        assert_eq!(cfg.get_parsed::<u32>("Client", "fps"), None);
        assert_eq!(cfg.get_parsed::<bool>("Logging", "echo_stderr"), Some(false));
        assert_eq!(cfg.get_parsed::<u32>("Client", "missing"), None);
    }

    #[test]
    fn load_first_skips_missing_files() {
        let (cfg, used) = Config::load_first(&["/definitely/not/here.conf"]);
        assert!(used.is_none());
        assert!(cfg.sections.is_empty());
    }
}
