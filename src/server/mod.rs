//! Coordinator side: accept loop, per-connection sessions, the connection
//! registry used for broadcasts, and the coordinator's actions.

pub mod frame_dump;
pub mod listener;
pub mod registry;
pub mod session;
pub mod settings;
pub mod streaming_server;
pub mod submissions;
pub mod uploaded_slot;

pub use frame_dump::FrameDumpListener;
pub use listener::{NoopServerListener, ServerEvent, ServerListener};
pub use registry::{BroadcastReport, ClientEndpoint, ConnectionRegistry};
pub use session::DisconnectReason;
pub use settings::ServerSettings;
pub use streaming_server::{ServerHandle, StreamingServer};
pub use submissions::collect_submissions;
pub use uploaded_slot::UploadedFileSlot;
