use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::log::LogSink;
use crate::protocol::{Control, FrameError, send_control};
use crate::{sink_debug, sink_info, sink_warn};

/// Write side of one accepted connection.
///
/// Cloned between the registry (broadcasts) and the session handler
/// (responses). Every message, or a whole file transfer, is written while
/// holding the lock so the two writers never interleave bytes.
#[derive(Clone)]
pub struct ClientEndpoint {
    pub addr: SocketAddr,
    writer: Arc<Mutex<TcpStream>>,
    // Separate handle so closing never waits behind a blocked writer.
    closer: Arc<TcpStream>,
}

impl ClientEndpoint {
    pub fn new(addr: SocketAddr, stream: TcpStream) -> io::Result<Self> {
        let closer = stream.try_clone()?;
        Ok(Self {
            addr,
            writer: Arc::new(Mutex::new(stream)),
            closer: Arc::new(closer),
        })
    }

    /// Run `f` with exclusive write access to the socket.
    pub fn with_writer<T>(&self, f: impl FnOnce(&mut TcpStream) -> T) -> T {
        // A panicked writer leaves at worst a half-written message; the peer
        // sees a protocol error and the session tears down.
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn send_control(&self, control: Control) -> Result<(), FrameError> {
        self.with_writer(|w| send_control(w, control))
    }

    /// Shut the socket down in both directions. Blocked readers on any clone
    /// of the stream wake up with end-of-file.
    pub fn close(&self) {
        let _ = self.closer.shutdown(Shutdown::Both);
    }
}

/// Outcome of a broadcast.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<SocketAddr>,
    pub failed: Vec<SocketAddr>,
}

/// Live connections keyed by peer address.
///
/// Registered on accept, removed exactly once by whoever tears the
/// connection down; the remover is also the one that closes the socket.
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<SocketAddr, ClientEndpoint>>,
    log: Arc<dyn LogSink>,
}

impl ConnectionRegistry {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            log,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SocketAddr, ClientEndpoint>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection. Returns `false` (and keeps the existing entry) if the
    /// address is already registered.
    pub fn register(&self, endpoint: ClientEndpoint) -> bool {
        let addr = endpoint.addr;
        let mut entries = self.entries();
        if entries.contains_key(&addr) {
            sink_warn!(self.log, "refusing duplicate registration for {}", addr);
            return false;
        }
        entries.insert(addr, endpoint);
        sink_info!(self.log, "registered {} ({} live)", addr, entries.len());
        true
    }

    /// Remove a connection. Absent addresses are a no-op returning `None`.
    pub fn unregister(&self, addr: SocketAddr) -> Option<ClientEndpoint> {
        let mut entries = self.entries();
        let removed = entries.remove(&addr);
        if removed.is_some() {
            sink_info!(self.log, "unregistered {} ({} live)", addr, entries.len());
        }
        removed
    }

    /// Remove every connection, handing them to the caller to close.
    pub fn drain(&self) -> Vec<ClientEndpoint> {
        self.entries().drain().map(|(_, ep)| ep).collect()
    }

    /// Point-in-time copy of the live connections.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ClientEndpoint> {
        self.entries().values().cloned().collect()
    }

    #[must_use]
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.entries().keys().copied().collect()
    }

    #[must_use]
    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.entries().contains_key(&addr)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Send `control` to every connection registered at call time.
    ///
    /// Iterates a snapshot, so the map lock is not held during socket writes
    /// and sessions can register or unregister meanwhile. A failing
    /// connection is logged and skipped; its own session handles teardown.
    pub fn broadcast(&self, control: Control) -> BroadcastReport {
        let targets = self.snapshot();
        let mut report = BroadcastReport::default();

        for ep in targets {
            match ep.send_control(control) {
                Ok(()) => {
                    sink_debug!(self.log, "sent {} to {}", control, ep.addr);
                    report.delivered.push(ep.addr);
                }
                Err(e) => {
                    sink_warn!(self.log, "broadcast {} to {} failed: {}", control, ep.addr, e);
                    report.failed.push(ep.addr);
                }
            }
        }

        sink_info!(
            self.log,
            "broadcast {}: {} delivered, {} failed",
            control,
            report.delivered.len(),
            report.failed.len()
        );
        report
    }
}
