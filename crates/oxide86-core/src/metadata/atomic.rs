//! Atomic file operations for safe JSON persistence.
//!
//! Implements atomic writes using:
//! 1. Write to temp file with unique PID+TID suffix
//! 2. Sync to ensure data reaches disk
//! 3. Atomic rename to target path
//! 4. Optional backup creation

use crate::error::{LauncherError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::process;
use std::thread;
use tracing::{debug, warn};

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut file = File::open(path).map_err(|e| LauncherError::Io {
        message: format!("Failed to open {}", path.display()),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| LauncherError::Io {
            message: format!("Failed to read {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })?;

    let data: T = serde_json::from_str(&contents).map_err(|e| LauncherError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Write data to a JSON file atomically.
///
/// This function:
/// 1. Serializes data to a temp file with PID+TID suffix
/// 2. Syncs the temp file so the data reaches disk before the rename
/// 3. Optionally creates a .bak backup
/// 4. Atomically renames temp file to target
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T, keep_backup: bool) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| LauncherError::Io {
                message: format!("Failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
    }

    // Generate unique temp file name
    let pid = process::id();
    let tid = thread_id();
    let temp_path = path.with_extension(format!("json.{}.{}.tmp", pid, tid));

    let serialized = serde_json::to_string_pretty(data).map_err(|e| LauncherError::Json {
        message: format!("Failed to serialize data: {}", e),
        source: Some(e),
    })?;

    // Write to temp file
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| LauncherError::Io {
                message: format!("Failed to create temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;

        file.write_all(serialized.as_bytes())
            .map_err(|e| LauncherError::Io {
                message: format!("Failed to write temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;

        file.sync_all().map_err(|e| LauncherError::Io {
            message: format!("Failed to sync temp file {}", temp_path.display()),
            path: Some(temp_path.clone()),
            source: Some(e),
        })?;
    }

    // Create backup if requested and target exists
    if keep_backup && path.exists() {
        let backup_path = path.with_extension("json.bak");
        if let Err(e) = fs::copy(path, &backup_path) {
            warn!("Failed to create backup {}: {}", backup_path.display(), e);
            // Continue anyway - backup failure is not fatal
        } else {
            debug!("Created backup: {}", backup_path.display());
        }
    }

    // Atomic rename
    fs::rename(&temp_path, path).map_err(|e| LauncherError::Io {
        message: format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        ),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Get a unique thread identifier.
fn thread_id() -> u64 {
    // Use thread ID hash as a numeric identifier
    let id = thread::current().id();
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    format!("{:?}", id).hash(&mut hasher);
    hasher.finish()
}
