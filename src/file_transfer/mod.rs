//! Chunked file transfer over the framing codec.
//!
//! A transfer is a run of binary messages on one connection:
//! the file name, then content chunks of at most `CHUNK_SIZE` bytes in file
//! order, then one zero-length message. Nothing is checksummed; a transfer
//! cut short by a dropped connection leaves a partial file behind.

pub mod errors;
pub mod receiver;
pub mod sender;

#[cfg(test)]
mod tests;

pub use errors::FileTransferError;
pub use receiver::{ReceivedFile, recv_file};
pub use sender::{send_file, send_file_as, send_reader};
