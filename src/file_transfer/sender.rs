use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use crate::file_transfer::FileTransferError;
use crate::log::LogSink;
use crate::protocol::{CHUNK_SIZE, send_binary};
use crate::{sink_debug, sink_warn};

/// Send the file at `path` under its base name. Returns the content length.
///
/// The file is opened before anything is written, so a missing file costs
/// nothing on the wire.
pub fn send_file<W: Write>(
    w: &mut W,
    path: &Path,
    log: &dyn LogSink,
) -> Result<u64, FileTransferError> {
    let name = base_name(path)?;
    send_file_as(w, path, &name, log)
}

/// Send the file at `path` announcing it as `wire_name`.
pub fn send_file_as<W: Write>(
    w: &mut W,
    path: &Path,
    wire_name: &str,
    log: &dyn LogSink,
) -> Result<u64, FileTransferError> {
    let file = File::open(path)?;
    send_reader(w, wire_name, BufReader::new(file), log)
}

/// Stream `reader` as a transfer named `wire_name`.
///
/// A read failure part-way still sends the sentinel, so the peer ends up with
/// a truncated file instead of a desynchronized connection; the failure is
/// then returned as `Io`.
pub fn send_reader<W: Write, R: Read>(
    w: &mut W,
    wire_name: &str,
    mut reader: R,
    log: &dyn LogSink,
) -> Result<u64, FileTransferError> {
    if wire_name.is_empty() {
        return Err(FileTransferError::InvalidName(String::new()));
    }
    send_binary(w, wire_name.as_bytes())?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;
    let mut chunks: u64 = 0;

    let outcome = loop {
        let n = match read_chunk(&mut reader, &mut buf) {
            Ok(n) => n,
            Err(e) => break Err(e),
        };
        if n == 0 {
            break Ok(());
        }
        send_binary(w, &buf[..n])?;
        total += n as u64;
        chunks += 1;
        #[cfg(feature = "file-transfer-debug")]
        crate::sink_trace!(log, "sent chunk {} of {:?} ({} bytes)", chunks, wire_name, n);
    };

    send_binary(w, &[])?;

    match outcome {
        Ok(()) => {
            sink_debug!(
                log,
                "sent {:?}: {} bytes in {} chunks",
                wire_name,
                total,
                chunks
            );
            Ok(total)
        }
        Err(e) => {
            sink_warn!(
                log,
                "read error after {} bytes of {:?}, sent truncated: {}",
                total,
                wire_name,
                e
            );
            Err(FileTransferError::Io(e))
        }
    }
}

/// Fill `buf` as far as the reader allows; `0` only at end of file.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn base_name(path: &Path) -> Result<String, FileTransferError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| FileTransferError::InvalidName(path.display().to_string()))
}
