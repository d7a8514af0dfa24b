//! Machine folder codec.
//!
//! Converts between a [`Machine`] and its on-disk representation: one
//! `machine.json` metadata file plus an optional `icon.png`, both inside the
//! machine's own folder so the library stays self-contained and relocatable.

use super::{atomic_read_json, atomic_write_json};
use crate::config::PathsConfig;
use crate::error::{LauncherError, Result};
use crate::machine_library::{Machine, MachineMetadata, MachineStatus};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Outcome of [`encode`]. The metadata write is all-or-nothing; icon
/// copy/removal is best-effort and any failure lands here instead of
/// blocking the save.
#[derive(Debug, Clone, Default)]
pub struct EncodeReport {
    /// Description of a failed icon copy or removal, if any.
    pub icon_error: Option<String>,
}

/// Read a machine record from `folder`.
///
/// Returns `Ok(None)` when the folder has no metadata file (not a machine
/// folder at all); returns an error when the metadata exists but is
/// unreadable or malformed, so the caller can record the skip. A custom-icon
/// flag without a matching icon file is tolerated: the record simply carries
/// no icon path and presentation falls back to the default icon.
pub fn decode(folder: &Path) -> Result<Option<Machine>> {
    let metadata_path = folder.join(PathsConfig::METADATA_FILENAME);
    let Some(metadata) = atomic_read_json::<MachineMetadata>(&metadata_path)? else {
        return Ok(None);
    };

    let icon_file = folder.join(PathsConfig::ICON_FILENAME);
    let icon_path = (metadata.icon_custom && icon_file.is_file()).then_some(icon_file);

    Ok(Some(Machine {
        id: metadata.id,
        name: metadata.name,
        icon_custom: metadata.icon_custom,
        icon_path,
        notes: metadata.notes,
        status: MachineStatus::Stopped,
    }))
}

/// Write `machine` into `folder`: icon first (best-effort), then the
/// metadata file (atomic, all-or-nothing).
///
/// When `icon_source` is given and the machine uses a custom icon, the
/// source file is copied into the folder as `icon.png`, replacing any prior
/// icon. When the machine does not use a custom icon, a leftover icon file
/// is removed. The stored icon reference is the relative filename, never an
/// absolute path.
pub fn encode(folder: &Path, machine: &Machine, icon_source: Option<&Path>) -> Result<EncodeReport> {
    if machine.name.is_empty() {
        return Err(LauncherError::Validation {
            field: "name".to_string(),
            message: "machine must have a name".to_string(),
        });
    }

    let icon_file = folder.join(PathsConfig::ICON_FILENAME);
    let mut report = EncodeReport::default();

    if machine.icon_custom {
        if let Some(source) = icon_source {
            if source != icon_file {
                if let Err(e) = fs::copy(source, &icon_file) {
                    warn!(
                        "Failed to copy icon {} into {}: {}",
                        source.display(),
                        folder.display(),
                        e
                    );
                    report.icon_error = Some(format!(
                        "Could not save icon from {}: {}",
                        source.display(),
                        e
                    ));
                }
            }
        }
    } else if icon_file.exists() {
        if let Err(e) = fs::remove_file(&icon_file) {
            warn!("Failed to delete icon {}: {}", icon_file.display(), e);
            report.icon_error = Some(format!("Could not delete old icon: {}", e));
        }
    }

    let has_icon = machine.icon_custom && icon_file.is_file();
    let metadata = MachineMetadata {
        id: machine.id,
        name: machine.name.clone(),
        icon_custom: machine.icon_custom,
        icon: has_icon.then(|| PathsConfig::ICON_FILENAME.to_string()),
        notes: machine.notes.clone(),
    };

    atomic_write_json(&folder.join(PathsConfig::METADATA_FILENAME), &metadata, false)?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn machine(name: &str) -> Machine {
        Machine::new(name, "")
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("Atari800");
        fs::create_dir_all(&folder).unwrap();

        let mut original = machine("Atari800");
        original.notes = "PC with sound card".to_string();

        encode(&folder, &original, None).unwrap();

        let decoded = decode(&folder).unwrap().unwrap();
        assert_eq!(decoded.id, original.id);
        assert_eq!(decoded.name, "Atari800");
        assert_eq!(decoded.notes, "PC with sound card");
        assert!(!decoded.icon_custom);
        assert!(decoded.icon_path.is_none());
        assert_eq!(decoded.status, MachineStatus::Stopped);
    }

    #[test]
    fn test_decode_missing_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("Junk");
        fs::create_dir_all(&folder).unwrap();

        assert!(decode(&folder).unwrap().is_none());
    }

    #[test]
    fn test_decode_malformed_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("Broken");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(PathsConfig::METADATA_FILENAME), "{\"name\": 3}").unwrap();

        assert!(decode(&folder).is_err());
    }

    #[test]
    fn test_encode_rejects_empty_name() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("empty");
        fs::create_dir_all(&folder).unwrap();

        let err = encode(&folder, &machine(""), None).unwrap_err();
        assert!(err.is_validation());
        assert!(!folder.join(PathsConfig::METADATA_FILENAME).exists());
    }

    #[test]
    fn test_icon_copied_in_and_referenced_relatively() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("IconBox");
        fs::create_dir_all(&folder).unwrap();
        let source = temp_dir.path().join("picture.png");
        fs::write(&source, b"png bytes").unwrap();

        let mut m = machine("IconBox");
        m.icon_custom = true;
        encode(&folder, &m, Some(&source)).unwrap();

        let icon_file = folder.join(PathsConfig::ICON_FILENAME);
        assert!(icon_file.is_file());

        let stored: MachineMetadata =
            atomic_read_json(&folder.join(PathsConfig::METADATA_FILENAME))
                .unwrap()
                .unwrap();
        assert_eq!(stored.icon.as_deref(), Some(PathsConfig::ICON_FILENAME));

        let decoded = decode(&folder).unwrap().unwrap();
        assert_eq!(decoded.icon_path, Some(icon_file));
    }

    #[test]
    fn test_icon_removed_when_flag_cleared() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("NoIcon");
        fs::create_dir_all(&folder).unwrap();
        let source = temp_dir.path().join("picture.png");
        fs::write(&source, b"png bytes").unwrap();

        let mut m = machine("NoIcon");
        m.icon_custom = true;
        encode(&folder, &m, Some(&source)).unwrap();
        assert!(folder.join(PathsConfig::ICON_FILENAME).exists());

        m.icon_custom = false;
        encode(&folder, &m, None).unwrap();
        assert!(!folder.join(PathsConfig::ICON_FILENAME).exists());
    }

    #[test]
    fn test_icon_copy_failure_does_not_block_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("BadIcon");
        fs::create_dir_all(&folder).unwrap();

        let mut m = machine("BadIcon");
        m.icon_custom = true;
        let report = encode(&folder, &m, Some(Path::new("/no/such/icon.png"))).unwrap();

        assert!(report.icon_error.is_some());
        assert!(folder.join(PathsConfig::METADATA_FILENAME).exists());
    }

    #[test]
    fn test_stale_icon_flag_tolerated() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("Stale");
        fs::create_dir_all(&folder).unwrap();

        // Metadata claims a custom icon but no icon file is present.
        let metadata = MachineMetadata {
            id: uuid::Uuid::new_v4(),
            name: "Stale".to_string(),
            icon_custom: true,
            icon: Some(PathsConfig::ICON_FILENAME.to_string()),
            notes: String::new(),
        };
        atomic_write_json(&folder.join(PathsConfig::METADATA_FILENAME), &metadata, false)
            .unwrap();

        let decoded = decode(&folder).unwrap().unwrap();
        assert!(decoded.icon_custom);
        assert!(decoded.icon_path.is_none());
    }
}
