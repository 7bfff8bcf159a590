use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// The most recently uploaded or published file. Holds one path, never a
/// history: every store replaces the previous value.
#[derive(Debug, Default)]
pub struct UploadedFileSlot {
    path: RwLock<Option<PathBuf>>,
}

impl UploadedFileSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot content, returning what it held before.
    pub fn store(&self, path: &Path) -> Option<PathBuf> {
        let mut slot = self.path.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(path.to_path_buf())
    }

    #[must_use]
    pub fn get(&self) -> Option<PathBuf> {
        self.path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Point the slot at `to` if it still holds `from`.
    pub fn relocate(&self, from: &Path, to: &Path) -> bool {
        let mut slot = self.path.write().unwrap_or_else(PoisonError::into_inner);
        match slot.as_deref() {
            Some(current) if current == from => {
                *slot = Some(to.to_path_buf());
                true
            }
            _ => false,
        }
    }

    pub fn clear(&self) -> Option<PathBuf> {
        self.path
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_latest_path() {
        let slot = UploadedFileSlot::new();
        assert_eq!(slot.get(), None);
        assert_eq!(slot.store(Path::new("a.txt")), None);
        assert_eq!(slot.store(Path::new("b.txt")), Some(PathBuf::from("a.txt")));
        assert_eq!(slot.get(), Some(PathBuf::from("b.txt")));
        assert_eq!(slot.clear(), Some(PathBuf::from("b.txt")));
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn relocate_only_moves_the_current_path() {
        let slot = UploadedFileSlot::new();
        assert!(!slot.relocate(Path::new("a.txt"), Path::new("x/a.txt")));
        slot.store(Path::new("a.txt"));
        assert!(!slot.relocate(Path::new("b.txt"), Path::new("x/b.txt")));
        assert!(slot.relocate(Path::new("a.txt"), Path::new("x/a.txt")));
        assert_eq!(slot.get(), Some(PathBuf::from("x/a.txt")));
    }
}
