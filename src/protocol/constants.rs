/// Width of the length header: payload length as zero-padded ASCII decimal.
pub const HEADER_LEN: usize = 15;

/// Largest payload length a `HEADER_LEN`-digit header can express.
pub const MAX_REPRESENTABLE_LEN: u64 = 999_999_999_999_999;

/// Upper bound on a received payload unless a caller picks another one.
/// Checked before allocating so a bogus header cannot exhaust memory.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024; // 64 MiB

/// File content is streamed in chunks of this many bytes.
pub const CHUNK_SIZE: usize = 4096;
