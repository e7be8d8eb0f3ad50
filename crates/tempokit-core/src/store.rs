//! Output persistence

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Persistence seam: write a file image into a directory
pub trait OutputStore {
    /// Write `bytes` to `dir/filename`, creating `dir` if needed and
    /// replacing any existing file. Returns the written path.
    fn write(&self, dir: &Path, filename: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Plain filesystem store with delete-then-write overwrite
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl OutputStore for FsStore {
    fn write(&self, dir: &Path, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let path = dir.join(filename);
        if path.exists() {
            log::info!("FsStore::write: replacing existing {:?}", path);
            fs::remove_file(&path)?;
        }

        fs::write(&path, bytes)?;
        log::debug!("FsStore::write: wrote {} bytes to {:?}", bytes.len(), path);
        Ok(path)
    }
}
