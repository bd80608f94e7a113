use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use super::StoreError;

#[cfg(test)]
use mockall::automock;

/// Trait for the durable half of the store
///
/// The store hands over the complete serialized document on every mutation;
/// implementations must either replace the previous file entirely or leave it
/// untouched.
#[cfg_attr(test, automock)]
pub trait DocumentWriter: Send + Sync {
    /// Replace the file at `path` with `contents`
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError>;

    /// Remove the file at `path`; a missing file is not an error
    fn remove(&self, path: &Path) -> Result<(), StoreError>;
}

/// Writes through a synced temporary file in the target directory, then renames
/// it over the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicFileWriter;

impl DocumentWriter for AtomicFileWriter {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(contents)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| StoreError::IoError(e.error))?;

        #[cfg(unix)]
        {
            if let Ok(dir) = fs::File::open(dir) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
