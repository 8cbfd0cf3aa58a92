// LogTail - platform/fs.rs
//
// Filesystem collaborator. The engine only ever needs two operations,
// `stat` and `read_range`, so they sit behind a trait: the real
// implementation talks to the OS and tests substitute an in-memory double.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Size snapshot of an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
}

/// The engine's view of the filesystem.
pub trait FileSource: Send + Sync {
    /// Current size of `path`, or `Ok(None)` when it does not exist.
    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>>;

    /// Read the byte range `[start, end)` of `path`.
    ///
    /// Returns fewer bytes than requested if the file ends before `end`.
    fn read_range(&self, path: &Path, start: u64, end: u64) -> io::Result<Vec<u8>>;
}

/// `FileSource` backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSource for LocalFs {
    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        match std::fs::metadata(path) {
            Ok(m) => Ok(Some(FileStat { size: m.len() })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_range(&self, path: &Path, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let len = end.saturating_sub(start);
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        // `take` keeps the read byte-exact no matter how the OS chunks it.
        file.take(len).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Resolve the identity of a file: an absolute path whose parent directory
/// is canonicalised, so paths reported by OS notifications (which carry the
/// resolved directory) match the registered path.
///
/// The file itself is not canonicalised: a symlinked log keeps the name the
/// user gave it. A parent that does not exist leaves the path absolute but
/// otherwise untouched.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) else {
        return Ok(absolute);
    };
    match parent.canonicalize() {
        Ok(dir) => Ok(dir.join(name)),
        Err(_) => Ok(absolute),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_local_stat_missing_is_none() {
        let dir = TempDir::new().expect("tmpdir");
        let stat = LocalFs.stat(&dir.path().join("nope.log")).expect("stat");
        assert_eq!(stat, None);
    }

    #[test]
    fn test_local_read_range_is_byte_exact() {
        let dir = TempDir::new().expect("tmpdir");
        let path = dir.path().join("app.log");
        fs::write(&path, b"0123456789").expect("write");

        assert_eq!(LocalFs.stat(&path).unwrap(), Some(FileStat { size: 10 }));
        assert_eq!(LocalFs.read_range(&path, 3, 7).unwrap(), b"3456");
        // Range past EOF returns what exists.
        assert_eq!(LocalFs.read_range(&path, 8, 20).unwrap(), b"89");
        assert!(LocalFs.read_range(&path, 5, 5).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_path_is_absolute_with_canonical_parent() {
        let dir = TempDir::new().expect("tmpdir");
        let path = dir.path().join("app.log");
        let resolved = resolve_path(&path).expect("resolve");
        assert!(resolved.is_absolute());
        assert_eq!(
            resolved,
            dir.path().canonicalize().unwrap().join("app.log")
        );
    }
}
