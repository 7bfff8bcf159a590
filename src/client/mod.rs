//! Peer side: streams frames to the coordinator, listens for its
//! broadcasts, and uploads or downloads files on a second connection.

#[cfg(feature = "camera")]
pub mod camera_source;
pub mod client_error;
pub mod frame_source;
pub mod listener;
pub mod settings;
pub mod streaming_client;

#[cfg(feature = "camera")]
pub use camera_source::CameraSource;
pub use client_error::ClientError;
pub use frame_source::{FramePacer, FrameSource, ResourceError, StillImageSource};
pub use listener::{ClientEvent, ClientListener, NoopClientListener};
pub use settings::ClientSettings;
pub use streaming_client::StreamingClient;
