//! Filesystem access used by the YAML front-end and the reload scanners.

use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Modification-time and content access to on-disk files.
pub trait FileSystem: Send + Sync {
    /// Last modification time of `path`.
    fn mtime(&self, path: &Path) -> io::Result<SystemTime>;

    /// Full content of `path`.
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Full content of `path` as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read_file(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn mtime(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}
