//! Wire protocol shared by the coordinator and its peers.
//!
//! ```text
//! Message := Header(HEADER_LEN ASCII digits, payload length) Payload
//! ```
//!
//! Control messages carry UTF-8 commands (see [`Control`]); binary messages
//! carry opaque bytes such as a [`FrameEnvelope`] or a file chunk. Both use the
//! same framing. A zero-length binary message is a valid message and is used
//! as the end-of-file sentinel by `file_transfer`.

pub mod constants;
pub mod control;
pub mod envelope;
pub mod errors;
pub mod framing;

pub use constants::{CHUNK_SIZE, DEFAULT_MAX_MESSAGE_LEN, HEADER_LEN, MAX_REPRESENTABLE_LEN};
pub use control::Control;
pub use envelope::{EnvelopeError, FrameEnvelope};
pub use errors::{FrameError, ProtoError};
pub use framing::{
    read_message, recv_binary, recv_binary_max, recv_control, recv_text, recv_text_max,
    send_binary, send_control, send_text, write_message,
};
