//! Small-file persistence helpers
//!
//! State files (sync bookmark, session) are written atomically: write to a
//! temp file in the same directory, fsync, then rename over the target.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use super::error::{StorageError, StorageResult};

/// Write data to a file atomically
///
/// The target file is never left in a partially-written state.
pub fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Read a file to a string, returning `None` if it doesn't exist
pub fn read_optional(path: &Path) -> StorageResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::ReadError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Remove a file if present
pub fn remove_if_exists(path: &Path) -> StorageResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::from_io(e, path.to_path_buf())),
    }
}
