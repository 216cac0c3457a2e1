//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A byte log kept in a single file.
///
/// The file is locked exclusively for the lifetime of the backend, so two
/// handles (in this process or another) cannot append to the same log.
///
/// # Durability
///
/// `append` only hands data to the OS; `sync` calls `File::sync_all`.
///
/// # Example
///
/// ```no_run
/// use brickstore_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("storage.bsj")).unwrap();
/// backend.append(b"entry").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
}

impl FileBackend {
    /// Opens or creates the log at `path` and locks it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle holds the file,
    /// or an I/O error if it cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        file.try_lock_exclusive().map_err(|e| {
            if e.kind() == io::ErrorKind::WouldBlock {
                StorageError::Locked {
                    path: path.to_path_buf(),
                }
            } else {
                StorageError::Io(e)
            }
        })?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size,
        })
    }

    /// Opens the log, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file
    /// cannot be opened and locked.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;
        let mut buffer = Vec::with_capacity(self.size as usize);
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        file.flush()?;
        self.size += data.len() as u64;

        Ok(offset)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.size)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if new_size > self.size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: self.size,
            });
        }

        let file = self.file.lock();
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
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bsj");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bsj");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"persistent ").unwrap();
            backend.append(b"data").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 15);
        assert_eq!(backend.read_all().unwrap(), b"persistent data");
    }

    #[test]
    fn second_handle_is_locked_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bsj");

        let _first = FileBackend::open(&path).unwrap();
        let second = FileBackend::open(&path);
        assert!(matches!(second, Err(StorageError::Locked { .. })));
    }

    #[test]
    fn truncate_then_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bsj");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"good-torn").unwrap();
        backend.truncate(4).unwrap();
        assert_eq!(backend.append(b"!").unwrap(), 4);
        assert_eq!(backend.read_all().unwrap(), b"good!");
    }

    #[test]
    fn create_dirs_and_release_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("db.bsj");

        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert!(path.exists());
        assert_eq!(backend.path(), path.as_path());
        drop(backend);
        assert!(FileBackend::open(&path).is_ok());
    }
}
