//! File-backed journal.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A journal stored in a single file.
///
/// Writes always land at the end of the file. The cached size is the
/// offset of the next append, so reads never have to stat the file.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` so the data and the new length are on disk
///
/// # Locking
///
/// [`FileBackend::open_locked`] takes an exclusive advisory lock on the file
/// for the lifetime of the backend, so two servers cannot interleave records
/// into the same journal.
///
/// # Example
///
/// ```no_run
/// use ringlog_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut journal = FileBackend::open_locked(Path::new("/var/tmp/ringlog.journal")).unwrap();
/// journal.append_durable(b"hello\n").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
    locked: bool,
}

impl FileBackend {
    /// Opens or creates a journal file without locking it.
    ///
    /// Existing contents are kept; new data is appended after them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size,
            locked: false,
        })
    }

    /// Opens or creates a journal file and locks it exclusively.
    ///
    /// Parent directories are created when missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle already holds the
    /// lock, or an I/O error if the file cannot be opened.
    pub fn open_locked(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut backend = Self::open(path)?;
        backend
            .file
            .get_mut()
            .try_lock_exclusive()
            .map_err(|e| match e.kind() {
                io::ErrorKind::WouldBlock => StorageError::Locked(path.to_path_buf()),
                _ if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                    StorageError::Locked(path.to_path_buf())
                }
                _ => StorageError::Io(e),
            })?;
        backend.locked = true;
        Ok(backend)
    }

    /// Returns the path to the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if this backend holds the exclusive journal lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = self.size;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        let file = self.file.get_mut();
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        self.size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.get_mut().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.size)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.get_mut().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if new_size > self.size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: self.size,
            });
        }

        let file = self.file.get_mut();
        file.set_len(new_size)?;
        file.sync_all()?;
        self.size = new_size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_empty_journal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
        assert!(!backend.is_locked());
    }

    #[test]
    fn append_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");
        let mut backend = FileBackend::open(&path).unwrap();

        assert_eq!(backend.append(b"a\n").unwrap(), 0);
        assert_eq!(backend.append(b"bb\n").unwrap(), 2);
        assert_eq!(backend.size().unwrap(), 5);

        assert_eq!(backend.read_at(2, 3).unwrap(), b"bb\n");
        assert_eq!(backend.read_all().unwrap(), b"a\nbb\n");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("journal")).unwrap();
        backend.append(b"abc\n").unwrap();

        let result = backend.read_at(2, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn durable_append_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append_durable(b"kept\n").unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 5);
        assert_eq!(backend.read_all().unwrap(), b"kept\n");
    }

    #[test]
    fn truncate_drops_tail() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("journal")).unwrap();
        backend.append(b"whole\npart").unwrap();

        backend.truncate(6).unwrap();
        assert_eq!(backend.read_all().unwrap(), b"whole\n");

        let result = backend.truncate(100);
        assert!(matches!(
            result,
            Err(StorageError::TruncateBeyondEnd { requested: 100, size: 6 })
        ));
    }

    #[test]
    fn open_locked_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("journal");

        let backend = FileBackend::open_locked(&path).unwrap();
        assert!(backend.is_locked());
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn second_lock_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");

        let _first = FileBackend::open_locked(&path).unwrap();
        let second = FileBackend::open_locked(&path);
        assert!(matches!(second, Err(StorageError::Locked(_))));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");

        drop(FileBackend::open_locked(&path).unwrap());
        assert!(FileBackend::open_locked(&path).is_ok());
    }
}
