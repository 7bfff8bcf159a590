use std::fs::File;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::client::client_error::ClientError;
use crate::client::frame_source::FrameSource;
use crate::client::listener::ClientListener;
use crate::file_transfer::{FileTransferError, recv_file, send_reader};
use crate::log::LogSink;
use crate::protocol::{
    Control, DEFAULT_MAX_MESSAGE_LEN, FrameEnvelope, FrameError, ProtoError, recv_control,
    send_binary, send_control,
};
use crate::{sink_debug, sink_info, sink_warn};

/// How long `stop_session` waits for each loop before detaching it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const JOIN_POLL: Duration = Duration::from_millis(10);

/// State shared with the send and listen loops.
struct Shared {
    running: AtomicBool,
    test_over: AtomicBool,
    file_available: AtomicBool,
    closed: AtomicBool,
    // Shutdown handles, separate from the locked writers.
    stream_closer: TcpStream,
    file_closer: TcpStream,
    listener: Arc<dyn ClientListener>,
    log: Arc<dyn LogSink>,
}

impl Shared {
    fn notify(&self, control: Control) {
        match control {
            Control::TestOver => {
                self.test_over.store(true, Ordering::SeqCst);
                self.listener.on_test_over();
            }
            Control::UploadFile => {
                self.file_available.store(true, Ordering::SeqCst);
                self.listener.on_file_available();
            }
            other => {
                sink_debug!(self.log, "ignoring {} outside a request", other);
            }
        }
    }

    /// Shut both connections down; later calls do nothing.
    fn close_connections(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.stream_closer.shutdown(Shutdown::Both);
        let _ = self.file_closer.shutdown(Shutdown::Both);
        sink_info!(self.log, "connections closed");
    }
}

enum SessionState {
    Idle,
    Running {
        username: String,
        send_loop: JoinHandle<()>,
        listen_loop: JoinHandle<()>,
    },
    Stopped,
}

/// Peer side: a stream connection carrying frames out and broadcasts in,
/// plus a file connection for uploads and downloads.
///
/// The two connections are independent on the server; they only share an
/// address. File requests are serialized by a lock, so one upload or
/// download is in flight at a time.
pub struct StreamingClient {
    server_addr: SocketAddr,
    stream_writer: Arc<Mutex<TcpStream>>,
    file_conn: Mutex<TcpStream>,
    state: Mutex<SessionState>,
    shared: Arc<Shared>,
}

impl StreamingClient {
    /// Open both connections to `addr`. Nothing is sent yet.
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        listener: Arc<dyn ClientListener>,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, ClientError> {
        let stream_conn = TcpStream::connect(&addr)?;
        let file_conn = TcpStream::connect(&addr)?;
        let server_addr = stream_conn.peer_addr()?;
        stream_conn.set_nodelay(true)?;

        sink_info!(
            log,
            "connected to {} (stream {}, files {})",
            server_addr,
            stream_conn.local_addr()?,
            file_conn.local_addr()?
        );

        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            test_over: AtomicBool::new(false),
            file_available: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            stream_closer: stream_conn.try_clone()?,
            file_closer: file_conn.try_clone()?,
            listener,
            log,
        });

        Ok(Self {
            server_addr,
            stream_writer: Arc::new(Mutex::new(stream_conn)),
            file_conn: Mutex::new(file_conn),
            state: Mutex::new(SessionState::Idle),
            shared,
        })
    }

    #[must_use]
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Local address of the stream connection, as the server sees it.
    pub fn stream_local_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.shared.stream_closer.local_addr()?)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Whether the coordinator has sent `TEST_OVER`.
    #[must_use]
    pub fn test_over(&self) -> bool {
        self.shared.test_over.load(Ordering::SeqCst)
    }

    /// Whether a published file was announced since the last call.
    pub fn take_file_available(&self) -> bool {
        self.shared.file_available.swap(false, Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start streaming frames from `source` under `username` and start
    /// listening for broadcasts. A client runs at most one session.
    pub fn start_session(
        &self,
        username: &str,
        source: Box<dyn FrameSource>,
    ) -> Result<(), ClientError> {
        let mut state = self.state();
        match *state {
            SessionState::Idle => {}
            SessionState::Running { .. } => return Err(ClientError::AlreadyRunning),
            SessionState::Stopped => return Err(ClientError::NotRunning),
        }
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ClientError::NotRunning);
        }

        let reader = self.shared.stream_closer.try_clone()?;
        self.shared.running.store(true, Ordering::SeqCst);

        let listen_loop = {
            let shared = self.shared.clone();
            thread::Builder::new()
                .name("proctorcast-listen".into())
                .spawn(move || run_listen_loop(&shared, reader))
        };
        let listen_loop = match listen_loop {
            Ok(h) => h,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let send_loop = {
            let shared = self.shared.clone();
            let writer = self.stream_writer.clone();
            let name = username.to_owned();
            thread::Builder::new()
                .name("proctorcast-send".into())
                .spawn(move || run_send_loop(&shared, &writer, source, name))
        };
        let send_loop = match send_loop {
            Ok(h) => h,
            Err(e) => {
                // Unblock the listen loop before giving up.
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared.close_connections();
                let _ = listen_loop.join();
                *state = SessionState::Stopped;
                return Err(e.into());
            }
        };

        sink_info!(self.shared.log, "session started as {:?}", username);
        *state = SessionState::Running {
            username: username.to_owned(),
            send_loop,
            listen_loop,
        };
        Ok(())
    }

    /// Send `STOP`, wait (bounded) for both loops, then close both
    /// connections. A no-op when no session is running.
    pub fn stop_session(&self) -> Result<(), ClientError> {
        let (send_loop, listen_loop) = {
            let mut state = self.state();
            match std::mem::replace(&mut *state, SessionState::Stopped) {
                SessionState::Running {
                    send_loop,
                    listen_loop,
                    ..
                } => (send_loop, listen_loop),
                other => {
                    *state = other;
                    return Ok(());
                }
            }
        };

        self.shared.running.store(false, Ordering::SeqCst);
        {
            let mut w = self
                .stream_writer
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = send_control(&mut *w, Control::Stop) {
                sink_debug!(self.shared.log, "STOP not delivered: {}", e);
            }
        }

        join_bounded(send_loop, "send", &*self.shared.log);
        self.shared.close_connections();
        join_bounded(listen_loop, "listen", &*self.shared.log);

        sink_info!(self.shared.log, "session stopped");
        Ok(())
    }

    /// Upload `path` on the file connection as `<username>_<file name>`.
    /// Returns the number of content bytes sent.
    pub fn request_upload(&self, path: &Path) -> Result<u64, ClientError> {
        let username = match &*self.state() {
            SessionState::Running { username, .. } => username.clone(),
            _ => return Err(ClientError::NotRunning),
        };
        let base = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FileTransferError::InvalidName(path.display().to_string()))?;
        let wire_name = format!("{username}_{base}");

        // Open first: a missing file must not leave a dangling UPLOAD_FILE.
        let file = File::open(path)?;

        let mut conn = self.file_conn.lock().map_err(|_| ClientError::Poisoned)?;
        send_control(&mut *conn, Control::UploadFile)?;
        let sent = send_reader(&mut *conn, &wire_name, BufReader::new(file), &*self.shared.log)?;

        sink_info!(self.shared.log, "uploaded {:?} ({} bytes)", wire_name, sent);
        Ok(sent)
    }

    /// Ask for the most recently uploaded or published file and store it in
    /// `dest_dir`. `Ok(None)` means the server has nothing to hand out.
    pub fn request_download(&self, dest_dir: &Path) -> Result<Option<PathBuf>, ClientError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ClientError::NotRunning);
        }

        let mut pending = Vec::new();
        let outcome = self.download_locked(dest_dir, &mut pending);

        // Broadcasts that arrived on this connection, reported outside the lock.
        for control in pending {
            self.shared.notify(control);
        }
        if let Ok(Some(_)) = &outcome {
            self.shared.file_available.store(false, Ordering::SeqCst);
        }
        outcome
    }

    fn download_locked(
        &self,
        dest_dir: &Path,
        pending: &mut Vec<Control>,
    ) -> Result<Option<PathBuf>, ClientError> {
        let mut conn = self.file_conn.lock().map_err(|_| ClientError::Poisoned)?;
        send_control(&mut *conn, Control::RequestLastFile)?;

        loop {
            match recv_control(&mut *conn, DEFAULT_MAX_MESSAGE_LEN) {
                Ok(Control::File) => break,
                Ok(Control::NoFile) => {
                    sink_info!(self.shared.log, "server has no file to download");
                    return Ok(None);
                }
                Ok(c) if c.is_notification() => pending.push(c),
                Ok(other) => return Err(ClientError::UnexpectedReply(other.to_string())),
                Err(FrameError::Proto(ProtoError::UnknownControl(word))) => {
                    return Err(ClientError::UnexpectedReply(word));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let received = recv_file(
            &mut *conn,
            dest_dir,
            DEFAULT_MAX_MESSAGE_LEN,
            &*self.shared.log,
        )?;
        Ok(Some(received.path))
    }
}

impl Drop for StreamingClient {
    fn drop(&mut self) {
        let _ = self.stop_session();
        self.shared.close_connections();
    }
}

fn run_send_loop(
    shared: &Shared,
    writer: &Mutex<TcpStream>,
    mut source: Box<dyn FrameSource>,
    username: String,
) {
    let mut frames: u64 = 0;
    let mut failed = false;

    while shared.running.load(Ordering::SeqCst) {
        let image = match source.next_frame() {
            Ok(image) => image,
            Err(e) => {
                // Capture trouble ends streaming only; the listen loop and the
                // file connection stay usable.
                sink_warn!(shared.log, "capture stopped: {}", e);
                break;
            }
        };
        let payload = match FrameEnvelope::new(image, username.as_str()).encode() {
            Ok(p) => p,
            Err(e) => {
                sink_warn!(shared.log, "frame skipped: {}", e);
                continue;
            }
        };

        let mut w = writer.lock().unwrap_or_else(PoisonError::into_inner);
        // Checked under the lock so no frame follows the STOP.
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }
        let sent =
            send_control(&mut *w, Control::Stream).and_then(|()| send_binary(&mut *w, &payload));
        drop(w);

        if let Err(e) = sent {
            sink_warn!(shared.log, "stream send failed after {} frames: {}", frames, e);
            failed = true;
            break;
        }
        frames += 1;
    }

    source.release();
    if failed && shared.running.swap(false, Ordering::SeqCst) {
        shared.close_connections();
    }
    sink_debug!(shared.log, "send loop done ({} frames)", frames);
}

fn run_listen_loop(shared: &Shared, mut reader: TcpStream) {
    loop {
        match recv_control(&mut reader, DEFAULT_MAX_MESSAGE_LEN) {
            Ok(control) => shared.notify(control),
            Err(FrameError::Proto(ProtoError::UnknownControl(word))) => {
                sink_warn!(shared.log, "ignoring unknown message {:?}", word);
            }
            Err(e) => {
                if shared.running.load(Ordering::SeqCst) {
                    sink_warn!(shared.log, "stream connection lost: {}", e);
                } else {
                    sink_debug!(shared.log, "listen loop ended: {}", e);
                }
                break;
            }
        }
    }
}

fn join_bounded(handle: JoinHandle<()>, name: &str, log: &dyn LogSink) {
    let deadline = Instant::now() + JOIN_TIMEOUT;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            sink_warn!(log, "{} loop did not finish in {:?}; detaching", name, JOIN_TIMEOUT);
            return;
        }
        thread::sleep(JOIN_POLL);
    }
    if handle.join().is_err() {
        sink_warn!(log, "{} loop panicked", name);
    }
}
