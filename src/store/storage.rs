//! Backends that hold the persisted profile document

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

#[cfg(test)]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where the profile document lives
pub trait ProfileStorage: Send + Sync {
    /// Read the raw document; `Ok(None)` when nothing was ever persisted
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored document
    fn write(&self, contents: &str) -> Result<(), StorageError>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// JSON file on local disk
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ProfileStorage for JsonFileStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write-then-rename so a crash never leaves a half-written document
        let temp = self.temp_path();
        fs::write(&temp, contents)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory storage with switchable write failures
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    contents: parking_lot::Mutex<Option<String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn with_contents(contents: &str) -> Self {
        let storage = Self::default();
        *storage.contents.lock() = Some(contents.to_string());
        storage
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl ProfileStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(ErrorKind::PermissionDenied, "read refused").into());
        }
        Ok(self.contents.lock().clone())
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(ErrorKind::PermissionDenied, "write refused").into());
        }
        *self.contents.lock() = Some(contents.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
