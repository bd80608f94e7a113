use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use super::value::StoreValue;
use super::writer::{AtomicFileWriter, DocumentWriter};
use super::StoreError;

/// Outcome of reading the backing file when the store was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    None,
    /// First run; the store starts empty and writable
    NoSuchFile,
    AccessDenied,
    FileRead,
    ParseError,
    /// The file parsed but its root is not an object
    NotObject,
}

struct StoreInner {
    data: Map<String, Value>,
    read_only: bool,
    read_error: ReadError,
}

/// Crash-consistent key/value store persisted as one JSON object
///
/// Every mutation rewrites the whole document through the `DocumentWriter`.
/// A failed write rolls back the in-memory change and latches the store into
/// read-only mode so memory and disk never silently diverge.
pub struct JsonStore {
    path: PathBuf,
    writer: Box<dyn DocumentWriter>,
    inner: Mutex<StoreInner>,
}

impl std::fmt::Debug for JsonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("JsonStore")
            .field("path", &self.path)
            .field("keys", &inner.data.len())
            .field("read_only", &inner.read_only)
            .field("read_error", &inner.read_error)
            .finish()
    }
}

impl JsonStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_with_writer(path, Box::new(AtomicFileWriter))
    }

    pub fn open_with_writer(path: impl Into<PathBuf>, writer: Box<dyn DocumentWriter>) -> Self {
        let path = path.into();
        let (data, read_error) = read_document(&path);
        let mut read_only = !matches!(read_error, ReadError::None | ReadError::NoSuchFile);

        let store = Self {
            path,
            writer,
            inner: Mutex::new(StoreInner {
                data,
                read_only,
                read_error,
            }),
        };

        if read_error == ReadError::None {
            // Prove the file is writable now rather than on the first transition.
            let inner = store.lock();
            if let Err(e) = store.write_document(&inner.data) {
                error!(path = ?store.path, error = %e, "Store is not writable, entering read-only mode");
                read_only = true;
            }
            drop(inner);
            store.lock().read_only = read_only;
        }

        match read_error {
            ReadError::None | ReadError::NoSuchFile => info!(
                path = ?store.path,
                read_error = ?read_error,
                read_only = %read_only,
                "Store opened"
            ),
            _ => warn!(
                path = ?store.path,
                read_error = ?read_error,
                "Store could not be read, entering read-only mode"
            ),
        }

        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_only(&self) -> bool {
        self.lock().read_only
    }

    /// Whether the backing file is present on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn read_error(&self) -> ReadError {
        self.lock().read_error
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.lock().data.get(key).cloned()
    }

    pub fn get<T: StoreValue>(&self, key: &str) -> Option<T> {
        self.lock().data.get(key).and_then(T::from_value)
    }

    /// Reads a structured value, e.g. a serialized state payload
    pub fn get_deserialized<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(key = %key, error = %e, "Stored value has unexpected shape");
                None
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    /// Copy of the whole document
    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().data.clone()
    }

    pub fn set<T: StoreValue>(&self, key: &str, value: T) -> bool {
        self.set_value(key, value.to_value())
    }

    pub fn set_serialized<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set_value(key, value),
            Err(e) => {
                error!(key = %key, error = %e, "Failed to serialize store value");
                false
            }
        }
    }

    pub fn set_value(&self, key: &str, value: Value) -> bool {
        self.set_values(vec![(key.to_string(), value)])
    }

    /// Stages several keys and persists them with a single document write
    pub fn set_values(&self, entries: Vec<(String, Value)>) -> bool {
        let mut inner = self.lock();
        if inner.read_only {
            warn!(path = ?self.path, "Rejected write to read-only store");
            return false;
        }

        let mut previous: Vec<(String, Option<Value>)> = Vec::new();
        for (key, value) in entries {
            if inner.data.get(&key) == Some(&value) {
                continue;
            }
            let old = inner.data.insert(key.clone(), value);
            previous.push((key, old));
        }

        if previous.is_empty() {
            return true;
        }

        if let Err(e) = self.write_document(&inner.data) {
            for (key, old) in previous.into_iter().rev() {
                match old {
                    Some(value) => inner.data.insert(key, value),
                    None => inner.data.remove(&key),
                };
            }
            inner.read_only = true;
            error!(path = ?self.path, error = %e, "Store write failed, entering read-only mode");
            return false;
        }

        true
    }

    pub fn remove_key(&self, key: &str) -> bool {
        let mut inner = self.lock();
        if inner.read_only {
            warn!(path = ?self.path, key = %key, "Rejected removal from read-only store");
            return false;
        }

        let Some(old) = inner.data.remove(key) else {
            return true;
        };

        if let Err(e) = self.write_document(&inner.data) {
            inner.data.insert(key.to_string(), old);
            inner.read_only = true;
            error!(path = ?self.path, error = %e, "Store write failed, entering read-only mode");
            return false;
        }

        true
    }

    /// Empties the document and writes it even when the store is read-only
    ///
    /// A successful write makes the store writable again.
    pub fn clear(&self) -> bool {
        let mut inner = self.lock();
        inner.data = Map::new();
        match self.write_document(&inner.data) {
            Ok(()) => {
                inner.read_only = false;
                info!(path = ?self.path, "Store cleared");
                true
            }
            Err(e) => {
                inner.read_only = true;
                error!(path = ?self.path, error = %e, "Failed to clear store");
                false
            }
        }
    }

    /// Empties the document and deletes the backing file
    pub fn clear_and_delete_file(&self) -> bool {
        let mut inner = self.lock();
        inner.data = Map::new();
        match self.writer.remove(&self.path) {
            Ok(()) => {
                inner.read_only = false;
                inner.read_error = ReadError::NoSuchFile;
                info!(path = ?self.path, "Store cleared and file deleted");
                true
            }
            Err(e) => {
                error!(path = ?self.path, error = %e, "Failed to delete store file");
                false
            }
        }
    }

    fn write_document(&self, data: &Map<String, Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(data)?;
        self.writer.write(&self.path, &bytes)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn read_document(path: &Path) -> (Map<String, Value>, ReadError) {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            let read_error = match e.kind() {
                std::io::ErrorKind::NotFound => ReadError::NoSuchFile,
                std::io::ErrorKind::PermissionDenied => ReadError::AccessDenied,
                _ => ReadError::FileRead,
            };
            return (Map::new(), read_error);
        }
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(data)) => (data, ReadError::None),
        Ok(_) => (Map::new(), ReadError::NotObject),
        Err(e) => {
            debug!(path = ?path, error = %e, "Store file is not valid JSON");
            (Map::new(), ReadError::ParseError)
        }
    }
}
