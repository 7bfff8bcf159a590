#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;

use proctorcast::log::NoopLogSink;
use proctorcast::server::{ServerEvent, ServerHandle, ServerSettings, StreamingServer};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn temp_dir(tag: &str) -> PathBuf {
    let suffix: u64 = rand::thread_rng().r#gen();
    let dir = std::env::temp_dir().join(format!("proctorcast_it_{tag}_{suffix:x}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

pub struct TestServer {
    pub handle: ServerHandle,
    pub events: Receiver<ServerEvent>,
    pub root: PathBuf,
    accept: Option<JoinHandle<std::io::Result<()>>>,
}

impl TestServer {
    pub fn start(tag: &str) -> Self {
        Self::start_with(tag, |_| {})
    }

    pub fn start_with(tag: &str, tweak: impl FnOnce(&mut ServerSettings)) -> Self {
        let root = temp_dir(tag);
        let mut settings = ServerSettings {
            bind_addr: "127.0.0.1:0".into(),
            storage_dir: root.join("client_files"),
            collect_dir: root.join("collected"),
            frames_dir: root.join("frames"),
            ..ServerSettings::default()
        };
        tweak(&mut settings);

        let (tx, events) = mpsc::channel();
        let server = StreamingServer::bind(settings, Arc::new(tx), Arc::new(NoopLogSink)).unwrap();
        let (handle, accept) = server.spawn().unwrap();
        Self {
            handle,
            events,
            root,
            accept: Some(accept),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.local_addr()
    }

    pub fn connect(&self) -> TcpStream {
        let s = TcpStream::connect(self.addr()).unwrap();
        s.set_read_timeout(Some(TIMEOUT)).unwrap();
        s
    }

    /// Block until `n` connections are registered.
    pub fn wait_for_peers(&self, n: usize) {
        let deadline = Instant::now() + TIMEOUT;
        while self.handle.peers().len() != n {
            assert!(
                Instant::now() < deadline,
                "expected {n} peers, have {:?}",
                self.handle.peers()
            );
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Next event matching `pred`, skipping others.
    pub fn wait_event(&self, mut pred: impl FnMut(&ServerEvent) -> bool) -> ServerEvent {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let ev = self
                .events
                .recv_timeout(left)
                .expect("timed out waiting for server event");
            if pred(&ev) {
                return ev;
            }
        }
    }

    pub fn wait_peer_left(&self, peer: SocketAddr) {
        self.wait_event(|ev| matches!(ev, ServerEvent::PeerLeft { peer: p } if *p == peer));
    }

    pub fn storage_dir(&self) -> &Path {
        &self.handle.settings().storage_dir
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(accept) = self.accept.take() {
            let _ = accept.join();
        }
        let _ = fs::remove_dir_all(&self.root);
    }
}
