use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::log::LogSink;
use crate::protocol::Control;
use crate::server::listener::ServerListener;
use crate::server::registry::{BroadcastReport, ClientEndpoint, ConnectionRegistry};
use crate::server::session::Session;
use crate::server::settings::ServerSettings;
use crate::server::submissions::collect_submissions;
use crate::server::uploaded_slot::UploadedFileSlot;
use crate::{sink_debug, sink_info, sink_warn};

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// State shared by the accept loop, every session and every `ServerHandle`.
pub(crate) struct ServerContext {
    pub(crate) registry: ConnectionRegistry,
    pub(crate) slot: UploadedFileSlot,
    pub(crate) listener: Arc<dyn ServerListener>,
    pub(crate) settings: ServerSettings,
    pub(crate) log: Arc<dyn LogSink>,
    running: AtomicBool,
}

/// Accepts peer connections and runs one session thread per connection.
///
/// The two connections of a peer (stream and file) are unrelated entries
/// here; nothing correlates them until a username shows up inside a frame.
pub struct StreamingServer {
    tcp: TcpListener,
    local_addr: SocketAddr,
    ctx: Arc<ServerContext>,
}

impl StreamingServer {
    pub fn bind(
        settings: ServerSettings,
        listener: Arc<dyn ServerListener>,
        log: Arc<dyn LogSink>,
    ) -> io::Result<Self> {
        let tcp = TcpListener::bind(&settings.bind_addr)?;
        let local_addr = tcp.local_addr()?;

        sink_info!(
            log,
            "listening on {} (storage {})",
            local_addr,
            settings.storage_dir.display()
        );

        let ctx = Arc::new(ServerContext {
            registry: ConnectionRegistry::new(log.clone()),
            slot: UploadedFileSlot::new(),
            listener,
            settings,
            log,
            running: AtomicBool::new(true),
        });

        Ok(Self {
            tcp,
            local_addr,
            ctx,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            ctx: self.ctx.clone(),
            local_addr: self.local_addr,
        }
    }

    /// Blocking accept loop. Returns once [`ServerHandle::shutdown`] was called.
    pub fn run(self) -> io::Result<()> {
        let log = self.ctx.log.clone();

        for incoming in self.tcp.incoming() {
            if !self.ctx.running.load(Ordering::SeqCst) {
                break;
            }
            let stream = match incoming {
                Ok(s) => s,
                Err(e) => {
                    sink_warn!(log, "accept failed: {} (continuing to accept)", e);
                    continue;
                }
            };
            if let Err(e) = self.start_session(stream) {
                sink_warn!(log, "could not start session: {}", e);
            }
        }

        sink_info!(log, "accept loop stopped");
        Ok(())
    }

    /// Run the accept loop on its own thread.
    pub fn spawn(self) -> io::Result<(ServerHandle, JoinHandle<io::Result<()>>)> {
        let handle = self.handle();
        let join = thread::Builder::new()
            .name("proctorcast-accept".into())
            .spawn(move || self.run())?;
        Ok((handle, join))
    }

    fn start_session(&self, stream: TcpStream) -> io::Result<()> {
        let ctx = &self.ctx;
        let peer = stream.peer_addr()?;
        let endpoint = ClientEndpoint::new(peer, stream.try_clone()?)?;

        if !ctx.registry.register(endpoint.clone()) {
            let _ = stream.shutdown(Shutdown::Both);
            return Ok(());
        }
        // A shutdown that drained the registry before we registered would
        // otherwise miss this connection.
        if !ctx.running.load(Ordering::SeqCst) {
            if let Some(ep) = ctx.registry.unregister(peer) {
                ep.close();
            }
            return Ok(());
        }

        sink_info!(ctx.log, "accepted {}", peer);
        let session = Session::new(stream, endpoint, ctx.clone());
        let spawned = thread::Builder::new()
            .name(format!("session-{peer}"))
            .spawn(move || session.run());

        if let Err(e) = spawned {
            if let Some(ep) = ctx.registry.unregister(peer) {
                ep.close();
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Control surface of a running server: the coordinator's actions.
#[derive(Clone)]
pub struct ServerHandle {
    ctx: Arc<ServerContext>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn settings(&self) -> &ServerSettings {
        &self.ctx.settings
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ctx.running.load(Ordering::SeqCst)
    }

    /// Addresses of every live connection (two per connected peer).
    #[must_use]
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.ctx.registry.addresses()
    }

    /// The file `REQUEST_LAST_FILE` would hand out right now.
    #[must_use]
    pub fn last_file(&self) -> Option<PathBuf> {
        self.ctx.slot.get()
    }

    /// Tell every connected peer the exam is over.
    pub fn broadcast_test_over(&self) -> BroadcastReport {
        self.ctx.registry.broadcast(Control::TestOver)
    }

    /// Make `path` the file handed out on `REQUEST_LAST_FILE` and tell every
    /// peer a download is available.
    pub fn publish_file(&self, path: &Path) -> io::Result<BroadcastReport> {
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        if let Some(prev) = self.ctx.slot.store(path) {
            sink_debug!(self.ctx.log, "replacing published file {}", prev.display());
        }
        sink_info!(self.ctx.log, "published {}", path.display());
        Ok(self.ctx.registry.broadcast(Control::UploadFile))
    }

    /// Move every stored upload into `<collect_dir>/<label>/`. A last file
    /// that was moved is still served from its new location.
    pub fn collect_submissions(&self, label: &str) -> io::Result<Vec<PathBuf>> {
        let settings = &self.ctx.settings;
        let moved = collect_submissions(
            &settings.storage_dir,
            &settings.collect_dir,
            label,
            &*self.ctx.log,
        )?;

        // Keep serving the last file from where it now lives.
        if let Some(last) = self.ctx.slot.get()
            && last.parent() == Some(settings.storage_dir.as_path())
            && let Some(new_path) = moved
                .iter()
                .find(|p| p.file_name() == last.file_name())
            && self.ctx.slot.relocate(&last, new_path)
        {
            sink_debug!(self.ctx.log, "last file moved to {}", new_path.display());
        }
        Ok(moved)
    }

    /// Stop accepting, send `TEST_OVER` to everyone and close every
    /// connection. Sessions then unwind on their own. Calling it again is a
    /// no-op.
    pub fn shutdown(&self) {
        if !self.ctx.running.swap(false, Ordering::SeqCst) {
            return;
        }
        sink_info!(self.ctx.log, "shutting down");

        self.ctx.registry.broadcast(Control::TestOver);
        let drained = self.ctx.registry.drain();
        for ep in &drained {
            ep.close();
        }
        sink_info!(self.ctx.log, "closed {} connections", drained.len());

        // Unblock the accept loop; it sees `running == false` and exits.
        let wake = wake_addr(self.local_addr);
        if let Err(e) = TcpStream::connect_timeout(&wake, WAKE_TIMEOUT) {
            sink_warn!(self.ctx.log, "could not wake accept loop at {}: {}", wake, e);
        }
    }
}

/// A connectable address for a listener bound to `bound`.
fn wake_addr(bound: SocketAddr) -> SocketAddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, bound.port())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn wake_addr_replaces_wildcard_with_loopback() {
        let any: SocketAddr = "0.0.0.0:4532".parse().unwrap();
        assert_eq!(wake_addr(any), "127.0.0.1:4532".parse().unwrap());

        let v6: SocketAddr = "[::]:80".parse().unwrap();
        assert_eq!(wake_addr(v6).ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));

        let fixed: SocketAddr = "192.168.1.5:7000".parse().unwrap();
        assert_eq!(wake_addr(fixed), fixed);
    }
}
