use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use crate::protocol::FrameEnvelope;

/// Display/storage collaborator notified by session handlers.
///
/// Called from session threads, so implementations must be cheap or hand
/// the work off; a slow listener stalls that peer's session.
pub trait ServerListener: Send + Sync {
    /// A decoded stream frame, or `None` once the connection is gone.
    fn on_frame(&self, peer: SocketAddr, frame: Option<FrameEnvelope>);

    /// A peer upload finished and was stored at `path`.
    fn on_file_stored(&self, _peer: SocketAddr, _path: &Path) {}
}

#[derive(Debug, Clone, Default)]
pub struct NoopServerListener;

impl ServerListener for NoopServerListener {
    fn on_frame(&self, _peer: SocketAddr, _frame: Option<FrameEnvelope>) {}
}

/// Channel form of the listener callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Frame {
        peer: SocketAddr,
        frame: FrameEnvelope,
    },
    /// Disconnect sentinel: the display should drop this peer.
    PeerLeft { peer: SocketAddr },
    FileStored { peer: SocketAddr, path: PathBuf },
}

impl ServerListener for Sender<ServerEvent> {
    fn on_frame(&self, peer: SocketAddr, frame: Option<FrameEnvelope>) {
        let ev = match frame {
            Some(frame) => ServerEvent::Frame { peer, frame },
            None => ServerEvent::PeerLeft { peer },
        };
        let _ = self.send(ev);
    }

    fn on_file_stored(&self, peer: SocketAddr, path: &Path) {
        let _ = self.send(ServerEvent::FileStored {
            peer,
            path: path.to_path_buf(),
        });
    }
}
