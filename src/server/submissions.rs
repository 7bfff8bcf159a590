use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::log::LogSink;
use crate::{sink_debug, sink_info, sink_warn};

/// Move every regular file in `storage_dir` into `collect_root/<label>/`.
///
/// Returns the new paths, sorted. A missing `storage_dir` means nothing was
/// uploaded yet and yields an empty list. Files that cannot be moved are
/// logged and left in place.
pub fn collect_submissions(
    storage_dir: &Path,
    collect_root: &Path,
    label: &str,
    log: &dyn LogSink,
) -> io::Result<Vec<PathBuf>> {
    let label = folder_label(label)?;

    let entries = match fs::read_dir(storage_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            sink_info!(log, "nothing to collect: {} does not exist", storage_dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let dest_dir = collect_root.join(label);
    fs::create_dir_all(&dest_dir)?;

    let mut moved = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let target = dest_dir.join(entry.file_name());
        match move_file(&entry.path(), &target) {
            Ok(()) => {
                sink_debug!(log, "collected {}", target.display());
                moved.push(target);
            }
            Err(e) => {
                sink_warn!(
                    log,
                    "could not collect {}: {}",
                    entry.path().display(),
                    e
                );
            }
        }
    }

    moved.sort();
    sink_info!(
        log,
        "collected {} submissions into {}",
        moved.len(),
        dest_dir.display()
    );
    Ok(moved)
}

/// `rename` only works within one filesystem; fall back to copy + remove.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

fn folder_label(label: &str) -> io::Result<&str> {
    let trimmed = label.trim();
    let last = trimmed.rsplit(['/', '\\']).next().unwrap_or_default();
    match last {
        "" | "." | ".." => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unusable collection label {label:?}"),
        )),
        name => Ok(name),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::NoopLogSink;
    use rand::Rng;

    fn temp_dir(tag: &str) -> PathBuf {
        let suffix: u64 = rand::thread_rng().r#gen();
        let dir = std::env::temp_dir().join(format!("proctorcast_collect_{tag}_{suffix:x}"));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    #[test]
    fn moves_files_into_labelled_folder() {
        let root = temp_dir("move");
        let storage = root.join("client_files");
        fs::create_dir_all(storage.join("subdir")).unwrap();
        fs::write(storage.join("bob_a.txt"), b"a").unwrap();
        fs::write(storage.join("alice_b.txt"), b"bb").unwrap();

        let moved =
            collect_submissions(&storage, &root.join("collected"), "midterm", &NoopLogSink)
                .unwrap();

        let dest = root.join("collected").join("midterm");
        assert_eq!(moved, vec![dest.join("alice_b.txt"), dest.join("bob_a.txt")]);
        assert_eq!(fs::read(dest.join("alice_b.txt")).unwrap(), b"bb");
        assert!(!storage.join("bob_a.txt").exists());
        // Directories are left alone.
        assert!(storage.join("subdir").is_dir());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn missing_storage_collects_nothing() {
        let root = temp_dir("missing");
        let moved = collect_submissions(
            &root.join("never_created"),
            &root.join("collected"),
            "quiz",
            &NoopLogSink,
        )
        .unwrap();
        assert!(moved.is_empty());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn label_cannot_escape_collect_root() {
        assert_eq!(folder_label("../../etc").unwrap(), "etc");
        assert_eq!(folder_label(" final ").unwrap(), "final");
        assert!(folder_label("..").is_err());
        assert!(folder_label("  ").is_err());
    }
}
