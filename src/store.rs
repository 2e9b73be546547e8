// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Signup persistence.
//!
//! [`JsonFileStore`] keeps every accepted signup in a single JSON array file.
//! Each append is a full read/rewrite performed under an exclusive OS-level
//! advisory lock on a sidecar `.lock` file, so independent processes sharing
//! the file serialize their writes. The rewrite goes through a temporary file
//! and a rename, so readers only ever see a complete array.

use crate::config::StorageConfig;
use crate::signup::Signup;
use async_trait::async_trait;
use fs2::FileExt;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Storage error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Timed out acquiring lock {path} after {attempts} attempts")]
    LockTimeout { path: PathBuf, attempts: u32 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize signups: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Append-only signup persistence.
#[async_trait]
pub trait SignupStore: Send + Sync {
    /// Durably append one record. On `Ok` the record is in storage.
    async fn append(&self, signup: &Signup) -> Result<(), StoreError>;

    /// All stored records in insertion order.
    async fn load(&self) -> Result<Vec<Signup>, StoreError>;
}

/// Store used when persistence is switched off.
#[derive(Debug, Default)]
pub struct NullStore;

#[async_trait]
impl SignupStore for NullStore {
    async fn append(&self, signup: &Signup) -> Result<(), StoreError> {
        debug!(id = %signup.id, "Storage disabled, signup not persisted");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Signup>, StoreError> {
        Ok(Vec::new())
    }
}

/// JSON array file store guarded by an advisory lock.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    inner: Arc<FileStoreInner>,
}

#[derive(Debug)]
struct FileStoreInner {
    path: PathBuf,
    lock_path: PathBuf,
    lock_attempts: u32,
    lock_retry_delay: Duration,
}

impl JsonFileStore {
    /// Create a store for the configured file. Nothing is touched on disk yet.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            inner: Arc::new(FileStoreInner {
                path: config.storage_path.clone(),
                lock_path: config.lock_path(),
                lock_attempts: config.lock_attempts.max(1),
                lock_retry_delay: config.lock_retry_delay(),
            }),
        }
    }

    /// Path of the signups file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Path of the sidecar lock file.
    pub fn lock_path(&self) -> &Path {
        &self.inner.lock_path
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&FileStoreInner) -> Result<T, StoreError> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(inner.as_ref()))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl SignupStore for JsonFileStore {
    async fn append(&self, signup: &Signup) -> Result<(), StoreError> {
        let signup = signup.clone();
        self.blocking(move |inner| inner.append(signup)).await
    }

    async fn load(&self) -> Result<Vec<Signup>, StoreError> {
        self.blocking(|inner| {
            let _lock = StoreLock::acquire(inner)?;
            inner
                .read_existing()?
                .unwrap_or_default()
                .into_iter()
                .map(|record| serde_json::from_value(record).map_err(StoreError::from))
                .collect()
        })
        .await
    }
}

impl FileStoreInner {
    fn append(&self, signup: Signup) -> Result<(), StoreError> {
        let _lock = StoreLock::acquire(self)?;

        // Records are kept as raw JSON so older or hand-edited entries survive.
        let mut records = match self.read_existing() {
            Ok(existing) => existing.unwrap_or_default(),
            Err(StoreError::Serialize(e)) => {
                self.quarantine_corrupt(&e)?;
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        records.push(serde_json::to_value(&signup)?);
        self.write_all(&records)?;

        info!(id = %signup.id, total = records.len(), path = %self.path.display(), "Signup stored");
        Ok(())
    }

    /// The stored array, `Ok(None)` when the file is absent or blank.
    /// Only a file that is not a JSON array is an error.
    fn read_existing(&self) -> Result<Option<Vec<Value>>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Move an unparsable file aside instead of overwriting it.
    fn quarantine_corrupt(&self, cause: &serde_json::Error) -> Result<(), StoreError> {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", chrono::Utc::now().timestamp()));
        let backup = PathBuf::from(name);

        warn!(
            path = %self.path.display(),
            backup = %backup.display(),
            error = %cause,
            "Signups file is not a valid array, moving it aside"
        );
        fs::rename(&self.path, &backup).map_err(|e| StoreError::io(&self.path, e))
    }

    fn write_all(&self, records: &[Value]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let data = serde_json::to_vec_pretty(records)?;
        let mut file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        file.write_all(&data)
            .and_then(|()| file.sync_all())
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))
    }
}

/// Exclusive hold on the sidecar lock file, released on drop.
struct StoreLock<'a> {
    file: File,
    path: &'a Path,
}

impl<'a> StoreLock<'a> {
    fn acquire(inner: &'a FileStoreInner) -> Result<Self, StoreError> {
        let path = inner.lock_path.as_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;

        for attempt in 1..=inner.lock_attempts {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    // Record the owner for operators inspecting a stuck lock.
                    let owner = std::process::id().to_string();
                    if let Err(e) = file.set_len(0).and_then(|()| file.write_all(owner.as_bytes())) {
                        debug!(path = %path.display(), error = %e, "Could not record lock owner");
                    }
                    debug!(path = %path.display(), attempt, "Acquired store lock");
                    return Ok(Self { file, path });
                }
                Err(e) if is_contended(&e) => {
                    debug!(path = %path.display(), attempt, "Store lock busy");
                    if attempt < inner.lock_attempts {
                        std::thread::sleep(inner.lock_retry_delay);
                    }
                }
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }

        error!(
            path = %path.display(),
            attempts = inner.lock_attempts,
            "Gave up waiting for store lock"
        );
        Err(StoreError::LockTimeout {
            path: path.to_path_buf(),
            attempts: inner.lock_attempts,
        })
    }
}

impl Drop for StoreLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            error!(path = %self.path.display(), error = %e, "Failed to release store lock");
        }
    }
}

fn is_contended(e: &io::Error) -> bool {
    // EWOULDBLOCK/EAGAIN is 11 on Linux and 35 on macOS
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == Some(11)
        || e.raw_os_error() == Some(35)
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
