use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::time::sleep;

use crate::auth::token::TokenRecord;

const LOCK_RETRY: Duration = Duration::from_millis(50);
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Stored data in {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize data: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Timed out waiting for lock on {0:?}")]
    LockTimeout(PathBuf),
}

/// Held for the duration of a read-check-refresh-write sequence.
///
/// Dropping the guard closes the lock file, which releases the advisory lock.
#[derive(Debug, Default)]
pub struct StorageLock {
    _file: Option<File>,
}

pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<TokenRecord>, StorageError>;
    fn save(&self, record: &TokenRecord) -> Result<(), StorageError>;

    /// Non-blocking attempt at an exclusive lock; `None` if someone else holds it.
    fn try_lock(&self) -> Result<Option<StorageLock>, StorageError> {
        Ok(Some(StorageLock::default()))
    }

    /// Where the data lives, for log messages and errors.
    fn location(&self) -> PathBuf;
}

/// Retries [`TokenStorage::try_lock`] until it succeeds or `timeout` elapses.
pub async fn acquire_lock<S: TokenStorage + ?Sized>(
    storage: &S,
    timeout: Duration,
) -> Result<StorageLock, StorageError> {
    let started = Instant::now();

    loop {
        if let Some(lock) = storage.try_lock()? {
            return Ok(lock);
        }

        if started.elapsed() >= timeout {
            return Err(StorageError::LockTimeout(storage.location()));
        }

        log::trace!("token storage is locked, retrying in {:?}", LOCK_RETRY);
        sleep(LOCK_RETRY).await;
    }
}

#[derive(Debug)]
pub struct JsonTokenStorage {
    filename: PathBuf,
}

impl JsonTokenStorage {
    pub(crate) fn new(filename: PathBuf) -> Self {
        Self { filename }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.filename.clone().into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }
}

impl TokenStorage for JsonTokenStorage {
    fn load(&self) -> Result<Option<TokenRecord>, StorageError> {
        let file = match File::open(&self.filename) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.filename.clone(),
                    source,
                })
            }
        };

        let reader = BufReader::new(file);
        let record = serde_json::from_reader(reader).map_err(|source| StorageError::Corrupt {
            path: self.filename.clone(),
            source,
        })?;

        Ok(Some(record))
    }

    fn save(&self, record: &TokenRecord) -> Result<(), StorageError> {
        log::debug!("saving tokens to {:?}", self.filename);

        write_atomically(&self.filename, |writer| {
            serde_json::to_writer(writer, record).map_err(StorageError::from)
        })
    }

    fn try_lock(&self) -> Result<Option<StorageLock>, StorageError> {
        let path = self.lock_path();
        ensure_parent(&path)?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;

        match file.try_lock() {
            Ok(()) => Ok(Some(StorageLock { _file: Some(file) })),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Error(source)) => Err(StorageError::Write { path, source }),
        }
    }

    fn location(&self) -> PathBuf {
        self.filename.clone()
    }
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Writes through a temporary sibling file and renames it over `path`,
/// so readers only ever see the old or the new contents.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<(), StorageError>,
{
    ensure_parent(path)?;

    let write_error = |source: std::io::Error| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let temp = NamedTempFile::new_in(&dir).map_err(write_error)?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer)?;
        writer.flush().map_err(write_error)?;
    }
    temp.as_file().sync_all().map_err(write_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o600))
            .map_err(write_error)?;
    }

    temp.persist(path).map_err(|err| write_error(err.error))?;

    Ok(())
}
