use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::file_transfer::FileTransferError;
use crate::log::LogSink;
use crate::protocol::{FrameError, recv_binary_max};
use crate::{sink_debug, sink_info, sink_warn};

/// A completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Receive one transfer into `dest_dir`, creating the directory if needed.
///
/// Only the last component of the announced name is used, so a peer cannot
/// write outside `dest_dir`. When the name is unusable or the file cannot be
/// created or written, the remaining chunks are still read up to the sentinel
/// and discarded before the error is returned: the connection stays framed
/// and its owner can carry on with the next command.
pub fn recv_file<R: Read>(
    r: &mut R,
    dest_dir: &Path,
    max_len: usize,
    log: &dyn LogSink,
) -> Result<ReceivedFile, FileTransferError> {
    let raw_name = recv_binary_max(r, max_len)?;

    let name = match sanitize_name(&raw_name) {
        Ok(name) => name,
        Err(e) => {
            let skipped = drain_transfer(r, max_len)?;
            sink_warn!(log, "{}; discarded {} bytes", e, skipped);
            return Err(e);
        }
    };

    let path = dest_dir.join(&name);
    let mut out = match fs::create_dir_all(dest_dir).and_then(|()| File::create(&path)) {
        Ok(f) => BufWriter::new(f),
        Err(e) => {
            let skipped = drain_transfer(r, max_len)?;
            sink_warn!(
                log,
                "cannot store {:?} in {}: {}; discarded {} bytes",
                name,
                dest_dir.display(),
                e,
                skipped
            );
            return Err(FileTransferError::Io(e));
        }
    };

    let mut total: u64 = 0;
    loop {
        let chunk = recv_binary_max(r, max_len)?;
        if chunk.is_empty() {
            break;
        }
        if let Err(e) = out.write_all(&chunk) {
            drop(out);
            let skipped = drain_transfer(r, max_len)?;
            remove_partial(&path, log);
            sink_warn!(
                log,
                "write to {} failed after {} bytes: {}; discarded {} bytes",
                path.display(),
                total,
                e,
                skipped
            );
            return Err(FileTransferError::Io(e));
        }
        total += chunk.len() as u64;
        #[cfg(feature = "file-transfer-debug")]
        crate::sink_trace!(log, "{}: +{} bytes ({} total)", name, chunk.len(), total);
    }

    if let Err(e) = out.flush() {
        drop(out);
        remove_partial(&path, log);
        return Err(FileTransferError::Io(e));
    }

    sink_info!(log, "stored {} ({} bytes)", path.display(), total);
    Ok(ReceivedFile { path, bytes: total })
}

/// Read and drop chunk messages up to and including the sentinel.
fn drain_transfer<R: Read>(r: &mut R, max_len: usize) -> Result<u64, FrameError> {
    let mut skipped = 0u64;
    loop {
        let chunk = recv_binary_max(r, max_len)?;
        if chunk.is_empty() {
            return Ok(skipped);
        }
        skipped += chunk.len() as u64;
    }
}

fn remove_partial(path: &Path, log: &dyn LogSink) {
    match fs::remove_file(path) {
        Ok(()) => {
            sink_debug!(log, "removed partial file {}", path.display());
        }
        Err(e) => {
            sink_warn!(log, "failed to remove partial file {}: {}", path.display(), e);
        }
    }
}

/// Final path component of the announced name, with `\` treated as a separator.
pub(crate) fn sanitize_name(raw: &[u8]) -> Result<String, FileTransferError> {
    let invalid = || FileTransferError::InvalidName(String::from_utf8_lossy(raw).into_owned());

    let text = std::str::from_utf8(raw).map_err(|_| invalid())?;
    let last = text.rsplit(['/', '\\']).next().unwrap_or_default();

    match last {
        "" | "." | ".." => Err(invalid()),
        name => Ok(name.to_owned()),
    }
}
