use std::path::PathBuf;

use crate::config::Config;
use crate::log::logger::expand_path;
use crate::protocol::DEFAULT_MAX_MESSAGE_LEN;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4532";
pub const DEFAULT_STORAGE_DIR: &str = "./client_files";
pub const DEFAULT_COLLECT_DIR: &str = "./collected";
pub const DEFAULT_FRAMES_DIR: &str = "./frames";

/// Typed view of the `[Server]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_addr: String,
    /// Where `UPLOAD_FILE` transfers land.
    pub storage_dir: PathBuf,
    /// Root for `collect_submissions`.
    pub collect_dir: PathBuf,
    /// Where the frame dump listener writes the latest picture per user.
    pub frames_dir: PathBuf,
    pub max_message_len: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            collect_dir: PathBuf::from(DEFAULT_COLLECT_DIR),
            frames_dir: PathBuf::from(DEFAULT_FRAMES_DIR),
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl ServerSettings {
    /// Missing or unparsable keys keep their defaults.
    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        let d = Self::default();
        Self {
            bind_addr: cfg
                .get_non_empty_or_default("Server", "bind_addr", DEFAULT_BIND_ADDR)
                .to_owned(),
            storage_dir: cfg
                .get_non_empty("Server", "storage_dir")
                .map_or(d.storage_dir, expand_path),
            collect_dir: cfg
                .get_non_empty("Server", "collect_dir")
                .map_or(d.collect_dir, expand_path),
            frames_dir: cfg
                .get_non_empty("Server", "frames_dir")
                .map_or(d.frames_dir, expand_path),
            max_message_len: cfg
                .get_parsed::<usize>("Server", "max_message_len")
                .filter(|n| *n > 0)
                .unwrap_or(d.max_message_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gives_defaults() {
        assert_eq!(
            ServerSettings::from_config(&Config::empty()),
            ServerSettings::default()
        );
    }

    #[test]
    fn reads_server_section() {
        let cfg = Config::parse(
            "[Server]\nbind_addr = 127.0.0.1:9000\nstorage_dir = /srv/uploads\nmax_message_len = 0\n",
        );
        let s = ServerSettings::from_config(&cfg);
        assert_eq!(s.bind_addr, "127.0.0.1:9000");
        assert_eq!(s.storage_dir, PathBuf::from("/srv/uploads"));
        // Zero would refuse every message; keep the default.
        assert_eq!(s.max_message_len, DEFAULT_MAX_MESSAGE_LEN);
        assert_eq!(s.collect_dir, PathBuf::from(DEFAULT_COLLECT_DIR));
    }
}
