use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use rmad::store::{keys, AtomicFileWriter, DocumentWriter, ReadError, StoreError};
use rmad::JsonStore;

/// Counts document writes and delegates to the real atomic writer
#[derive(Default)]
struct CountingWriter {
    writes: Arc<AtomicUsize>,
}

impl DocumentWriter for CountingWriter {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        AtomicFileWriter.write(path, contents)
    }

    fn remove(&self, path: &Path) -> Result<(), StoreError> {
        AtomicFileWriter.remove(path)
    }
}

#[test]
fn test_values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state");

    let store = JsonStore::open(&path);
    assert_eq!(store.read_error(), ReadError::NoSuchFile);
    assert!(store.set(keys::CURRENT_STATE, 3));
    assert!(store.set(keys::STATE_HISTORY, vec![1, 2]));
    assert!(store.set(keys::SAME_OWNER, true));
    drop(store);

    let reopened = JsonStore::open(&path);
    assert_eq!(reopened.read_error(), ReadError::None);
    assert!(!reopened.read_only());
    assert_eq!(reopened.get::<i32>(keys::CURRENT_STATE), Some(3));
    assert_eq!(reopened.get::<Vec<i32>>(keys::STATE_HISTORY), Some(vec![1, 2]));
    assert_eq!(reopened.get::<bool>(keys::SAME_OWNER), Some(true));
}

#[test]
fn test_batch_is_one_write() {
    let dir = TempDir::new().unwrap();
    let writer = CountingWriter::default();
    let writes = writer.writes.clone();
    let store = JsonStore::open_with_writer(dir.path().join("state"), Box::new(writer));

    assert!(store.set_values(vec![
        (keys::STATE_HISTORY.to_string(), json!([1])),
        (keys::CURRENT_STATE.to_string(), json!(2)),
    ]));
    assert_eq!(writes.load(Ordering::SeqCst), 1);

    // Unchanged values do not touch the disk.
    assert!(store.set(keys::CURRENT_STATE, 2));
    assert_eq!(writes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_garbage_file_is_read_only_until_cleared() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state");
    std::fs::write(&path, "{ not json").unwrap();

    let store = JsonStore::open(&path);
    assert_eq!(store.read_error(), ReadError::ParseError);
    assert!(store.read_only());
    assert!(!store.set(keys::CURRENT_STATE, 1));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");

    assert!(store.clear());
    assert!(!store.read_only());
    assert!(store.set(keys::CURRENT_STATE, 1));
    assert_eq!(JsonStore::open(&path).get::<i32>(keys::CURRENT_STATE), Some(1));
}

#[test]
fn test_mistyped_values_read_as_absent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state");
    std::fs::write(&path, r#"{"current_state": "three", "state_history": [1, "x"]}"#).unwrap();

    let store = JsonStore::open(&path);
    assert_eq!(store.get::<i32>(keys::CURRENT_STATE), None);
    assert_eq!(store.get::<Vec<i32>>(keys::STATE_HISTORY), None);
    assert!(store.contains_key(keys::CURRENT_STATE));
}

#[test]
fn test_delete_file_starts_over() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state");
    let store = JsonStore::open(&path);
    assert!(store.set(keys::CURRENT_STATE, 5));
    assert!(path.exists());

    assert!(store.clear_and_delete_file());
    assert!(!path.exists());
    assert!(store.snapshot().is_empty());
    assert_eq!(store.read_error(), ReadError::NoSuchFile);
}
