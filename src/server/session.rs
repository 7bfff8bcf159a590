use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use crate::file_transfer::{FileTransferError, recv_file, send_reader};
use crate::protocol::{
    Control, FrameEnvelope, FrameError, ProtoError, recv_binary_max, recv_control, send_control,
};
use crate::server::registry::ClientEndpoint;
use crate::server::streaming_server::ServerContext;
use crate::{sink_debug, sink_info, sink_warn};

/// Why a session ended.
#[derive(Debug)]
pub enum DisconnectReason {
    /// The peer sent `STOP`.
    Stop,
    /// The peer (or a local shutdown) closed the connection.
    Closed,
    Protocol(ProtoError),
    Io(io::Error),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => write!(f, "peer sent STOP"),
            Self::Closed => write!(f, "connection closed"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl From<FrameError> for DisconnectReason {
    fn from(e: FrameError) -> Self {
        if e.is_disconnect() {
            return Self::Closed;
        }
        match e {
            FrameError::Proto(p) => Self::Protocol(p),
            FrameError::Io(io) => Self::Io(io),
            FrameError::ConnectionClosed => Self::Closed,
        }
    }
}

/// Server side of one accepted connection.
///
/// Reads one control message at a time and dispatches it; anything that
/// breaks the framing ends the session. `run` consumes the session and has a
/// single exit, so cleanup happens exactly once.
pub(crate) struct Session {
    peer: SocketAddr,
    reader: BufReader<TcpStream>,
    endpoint: ClientEndpoint,
    ctx: Arc<ServerContext>,
}

impl Session {
    /// `endpoint` must already be registered; `stream` is this session's read side.
    pub(crate) fn new(stream: TcpStream, endpoint: ClientEndpoint, ctx: Arc<ServerContext>) -> Self {
        Self {
            peer: endpoint.addr,
            reader: BufReader::new(stream),
            endpoint,
            ctx,
        }
    }

    pub(crate) fn run(mut self) {
        sink_debug!(self.ctx.log, "[{}] session started", self.peer);

        let reason = loop {
            if let Err(reason) = self.step() {
                break reason;
            }
        };

        self.teardown(reason);
    }

    /// Handle one command. `Err` means the session is over.
    fn step(&mut self) -> Result<(), DisconnectReason> {
        let max_len = self.ctx.settings.max_message_len;
        let control = match recv_control(&mut self.reader, max_len) {
            Ok(c) => c,
            Err(FrameError::Proto(ProtoError::UnknownControl(word))) => {
                sink_warn!(self.ctx.log, "[{}] ignoring unknown command {:?}", self.peer, word);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match control {
            Control::Stream => self.handle_stream(),
            Control::UploadFile => self.handle_upload(),
            Control::RequestLastFile => self.handle_request_last_file(),
            Control::Stop => Err(DisconnectReason::Stop),
            Control::File | Control::NoFile | Control::TestOver => {
                sink_warn!(
                    self.ctx.log,
                    "[{}] ignoring server-only message {}",
                    self.peer,
                    control
                );
                Ok(())
            }
        }
    }

    fn handle_stream(&mut self) -> Result<(), DisconnectReason> {
        let payload = recv_binary_max(&mut self.reader, self.ctx.settings.max_message_len)?;

        match FrameEnvelope::decode(payload) {
            Ok(frame) => self.ctx.listener.on_frame(self.peer, Some(frame)),
            // A bad frame costs only that frame.
            Err(e) => sink_warn!(self.ctx.log, "[{}] dropped frame: {}", self.peer, e),
        }
        Ok(())
    }

    fn handle_upload(&mut self) -> Result<(), DisconnectReason> {
        let received = recv_file(
            &mut self.reader,
            &self.ctx.settings.storage_dir,
            self.ctx.settings.max_message_len,
            &*self.ctx.log,
        );

        match received {
            Ok(file) => {
                sink_info!(
                    self.ctx.log,
                    "[{}] upload stored at {} ({} bytes)",
                    self.peer,
                    file.path.display(),
                    file.bytes
                );
                self.ctx.slot.store(&file.path);
                self.ctx.listener.on_file_stored(self.peer, &file.path);
                Ok(())
            }
            Err(FileTransferError::Frame(e)) => Err(e.into()),
            Err(e) => {
                sink_warn!(self.ctx.log, "[{}] upload aborted: {}", self.peer, e);
                Ok(())
            }
        }
    }

    fn handle_request_last_file(&mut self) -> Result<(), DisconnectReason> {
        let Some(path) = self.ctx.slot.get() else {
            sink_debug!(self.ctx.log, "[{}] no file to hand out", self.peer);
            return self.reply(Control::NoFile);
        };

        let wire_name = path.file_name().and_then(|n| n.to_str()).map(str::to_owned);
        let opened = File::open(&path);
        let (file, wire_name) = match (opened, wire_name) {
            (Ok(file), Some(name)) => (file, name),
            (Err(e), _) => {
                sink_warn!(
                    self.ctx.log,
                    "[{}] cannot open {}: {}; answering NO_FILE",
                    self.peer,
                    path.display(),
                    e
                );
                return self.reply(Control::NoFile);
            }
            (Ok(_), None) => {
                sink_warn!(
                    self.ctx.log,
                    "[{}] {} has no usable file name; answering NO_FILE",
                    self.peer,
                    path.display()
                );
                return self.reply(Control::NoFile);
            }
        };

        let log = &*self.ctx.log;
        let sent = self.endpoint.with_writer(|w| -> Result<u64, FileTransferError> {
            send_control(w, Control::File)?;
            send_reader(w, &wire_name, BufReader::new(file), log)
        });

        match sent {
            Ok(bytes) => {
                sink_info!(
                    self.ctx.log,
                    "[{}] sent {} ({} bytes)",
                    self.peer,
                    path.display(),
                    bytes
                );
                Ok(())
            }
            Err(FileTransferError::Frame(e)) => Err(e.into()),
            // The sentinel went out; the peer holds a truncated copy.
            Err(e) => {
                sink_warn!(self.ctx.log, "[{}] download cut short: {}", self.peer, e);
                Ok(())
            }
        }
    }

    fn reply(&self, control: Control) -> Result<(), DisconnectReason> {
        self.endpoint
            .send_control(control)
            .map_err(DisconnectReason::from)
    }

    fn teardown(self, reason: DisconnectReason) {
        match &reason {
            DisconnectReason::Stop | DisconnectReason::Closed => {
                sink_info!(self.ctx.log, "[{}] session ended: {}", self.peer, reason);
            }
            DisconnectReason::Protocol(_) | DisconnectReason::Io(_) => {
                sink_warn!(self.ctx.log, "[{}] session aborted: {}", self.peer, reason);
            }
        }

        // Whoever removes the entry closes the socket; a concurrent shutdown
        // may already have done both.
        if let Some(endpoint) = self.ctx.registry.unregister(self.peer) {
            endpoint.close();
        }
        self.ctx.listener.on_frame(self.peer, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_map_to_disconnect_reasons() {
        assert!(matches!(
            DisconnectReason::from(FrameError::ConnectionClosed),
            DisconnectReason::Closed
        ));
        assert!(matches!(
            DisconnectReason::from(FrameError::Io(io::Error::from(io::ErrorKind::ConnectionReset))),
            DisconnectReason::Closed
        ));
        assert!(matches!(
            DisconnectReason::from(FrameError::Io(io::Error::other("boom"))),
            DisconnectReason::Io(_)
        ));
        assert!(matches!(
            DisconnectReason::from(FrameError::Proto(ProtoError::InvalidUtf8)),
            DisconnectReason::Protocol(ProtoError::InvalidUtf8)
        ));
    }
}
