use std::collections::HashMap;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::file_transfer::receiver::sanitize_name;
use crate::log::LogSink;
use crate::protocol::FrameEnvelope;
use crate::server::listener::ServerListener;
use crate::{sink_debug, sink_info, sink_warn};

/// Display collaborator for a headless coordinator: keeps the latest picture
/// of every user at `<dir>/<username>.jpg`.
///
/// Files are replaced through a rename, so a viewer never reads half a frame.
pub struct FrameDumpListener {
    dir: PathBuf,
    // Which user each stream connection belongs to, learned from its frames.
    users: Mutex<HashMap<SocketAddr, String>>,
    log: Arc<dyn LogSink>,
}

impl FrameDumpListener {
    pub fn new(dir: impl Into<PathBuf>, log: Arc<dyn LogSink>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            users: Mutex::new(HashMap::new()),
            log,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Users currently streaming, sorted.
    #[must_use]
    pub fn active_users(&self) -> Vec<String> {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = users.values().cloned().collect();
        names.sort();
        names.dedup();
        names
    }

    fn store(&self, peer: SocketAddr, name: &str, image: &[u8]) -> io::Result<PathBuf> {
        let target = self.dir.join(format!("{name}.jpg"));
        // One temp file per connection: two sessions may share a username.
        let tmp = self.dir.join(format!(".{name}.{}.jpg.part", peer.port()));
        fs::write(&tmp, image)?;
        fs::rename(&tmp, &target)?;
        Ok(target)
    }
}

impl ServerListener for FrameDumpListener {
    fn on_frame(&self, peer: SocketAddr, frame: Option<FrameEnvelope>) {
        let Some(frame) = frame else {
            let left = self
                .users
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&peer);
            if let Some(name) = left {
                sink_info!(self.log, "{} ({}) stopped streaming", name, peer);
            }
            return;
        };

        let name = match sanitize_name(frame.username.as_bytes()) {
            Ok(name) => name,
            Err(e) => {
                sink_warn!(self.log, "[{}] frame with unusable username: {}", peer, e);
                return;
            }
        };

        let first = self
            .users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer, name.clone())
            .is_none();
        if first {
            sink_info!(self.log, "{} ({}) started streaming", name, peer);
        }

        match self.store(peer, &name, &frame.image) {
            Ok(path) => sink_debug!(self.log, "frame for {} -> {}", name, path.display()),
            Err(e) => sink_warn!(self.log, "cannot store frame for {}: {}", name, e),
        }
    }

    fn on_file_stored(&self, peer: SocketAddr, path: &Path) {
        sink_info!(self.log, "[{}] submitted {}", peer, path.display());
    }
}
