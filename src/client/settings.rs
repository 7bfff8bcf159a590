use std::path::PathBuf;

use crate::config::Config;
use crate::log::logger::expand_path;

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:4532";
pub const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";
pub const DEFAULT_FPS: u32 = 15;
pub const DEFAULT_JPEG_QUALITY: u8 = 50;

/// Typed view of the `[Client]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_addr: String,
    /// Shown next to the picture on the coordinator side; empty means "ask".
    pub username: String,
    pub download_dir: PathBuf,
    pub fps: u32,
    /// Still picture streamed when no camera is used.
    pub frame_image: Option<PathBuf>,
    pub camera_index: u32,
    pub jpeg_quality: u8,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_owned(),
            username: String::new(),
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            fps: DEFAULT_FPS,
            frame_image: None,
            camera_index: 0,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ClientSettings {
    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        let d = Self::default();
        Self {
            server_addr: cfg
                .get_non_empty_or_default("Client", "server_addr", DEFAULT_SERVER_ADDR)
                .to_owned(),
            username: cfg
                .get_non_empty("Client", "username")
                .map(str::to_owned)
                .unwrap_or_default(),
            download_dir: cfg
                .get_non_empty("Client", "download_dir")
                .map_or(d.download_dir, expand_path),
            fps: cfg
                .get_parsed::<u32>("Client", "fps")
                .filter(|fps| *fps > 0)
                .unwrap_or(d.fps),
            frame_image: cfg.get_non_empty("Client", "frame_image").map(expand_path),
            camera_index: cfg
                .get_parsed("Client", "camera_index")
                .unwrap_or(d.camera_index),
            jpeg_quality: cfg
                .get_parsed::<u8>("Client", "jpeg_quality")
                .map_or(d.jpeg_quality, |q| q.min(100)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_client_section_with_fallbacks() {
        let cfg = Config::parse(
            "[Client]\nserver_addr = 10.0.0.2:4532\nusername = alice\nfps = 0\njpeg_quality = 250\nframe_image = ./me.jpg\n",
        );
        let s = ClientSettings::from_config(&cfg);
        assert_eq!(s.server_addr, "10.0.0.2:4532");
        assert_eq!(s.username, "alice");
        assert_eq!(s.fps, DEFAULT_FPS);
        // 250 does not fit a u8 and is ignored.
        assert_eq!(s.jpeg_quality, DEFAULT_JPEG_QUALITY);
        assert_eq!(s.frame_image, Some(PathBuf::from("./me.jpg")));
        assert_eq!(s.download_dir, PathBuf::from(DEFAULT_DOWNLOAD_DIR));
    }

    #[test]
    fn empty_config_gives_defaults() {
        assert_eq!(
            ClientSettings::from_config(&Config::empty()),
            ClientSettings::default()
        );
    }
}
