//! proctorcast streams webcam frames from exam takers to a proctor over a LAN
//! and carries files and control messages in both directions.
//!
//! It provides two binaries:
//! - `proctor_server`: the coordinator. Accepts peers, stores their frames and
//!   uploads, and broadcasts the end of the exam or a published file.
//! - `proctor_client`: a peer. Streams frames and uploads or downloads files.
//!
//! Everything travels over plain TCP using a length-prefixed framing scheme
//! (see [`protocol`]).

/// Peer side: frame streaming, broadcast listening and file requests.
pub mod client;
/// Handles configuration loading and management.
pub mod config;
/// Chunked file transfer on top of the framing codec.
pub mod file_transfer;
/// Logging utilities for the application.
pub mod log;
/// Wire framing, control vocabulary and the frame envelope.
pub mod protocol;
/// Coordinator side: accept loop, sessions, registry and broadcasts.
pub mod server;
