//! Core MachineLibrary implementation.
//!
//! The MachineLibrary is the authoritative in-memory list of machine
//! records, backed by a root directory holding one folder per machine.
//! It handles:
//! - Wholesale reload from disk (the folder tree is the source of truth)
//! - Create / edit / delete / clone / reorder operations
//! - Persisted sidebar ordering
//! - Folder size reporting

use crate::config::SettingsStore;
use crate::error::{LauncherError, Result};
use crate::events::LibraryEvent;
use crate::machine_library::naming;
use crate::machine_library::types::{Machine, MachineStatus};
use crate::metadata;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;
use walkdir::WalkDir;

/// Broadcast capacity for list-changed notifications.
const EVENT_CAPACITY: usize = 32;

/// Result of a [`MachineLibrary::load`] pass.
///
/// Folders whose metadata exists but cannot be read are skipped without
/// aborting the load; they are collected here so presentation can surface
/// one aggregate warning instead of failing the whole library.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Number of records loaded.
    pub loaded: usize,
    /// Skipped folders with the reason each was skipped.
    pub skipped: Vec<(PathBuf, String)>,
}

/// The machine library store.
///
/// Owns the record list exclusively; all mutations go through its methods
/// and hold the write lock for the full disk operation, so readers always
/// observe a consistent snapshot and writers never interleave.
pub struct MachineLibrary {
    settings: Arc<SettingsStore>,
    machines: RwLock<Vec<Machine>>,
    events: broadcast::Sender<LibraryEvent>,
}

impl MachineLibrary {
    /// Create an empty library bound to the given settings.
    ///
    /// No disk access happens here; call [`load`](Self::load) to populate
    /// the list from the machines root.
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            machines: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Root directory currently holding the machine folders.
    pub fn machines_root(&self) -> PathBuf {
        self.settings.get().machines_path
    }

    /// Subscribe to list-changed notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// Consistent copy of the current record list, in display order.
    pub async fn snapshot(&self) -> Vec<Machine> {
        self.machines.read().await.clone()
    }

    /// Look up a record by id.
    pub async fn get(&self, id: Uuid) -> Option<Machine> {
        self.machines
            .read()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    /// Look up a record by name.
    pub async fn get_by_name(&self, name: &str) -> Option<Machine> {
        self.machines
            .read()
            .await
            .iter()
            .find(|m| m.name == name)
            .cloned()
    }

    /// Apply a supervisor-reported status onto the stored record.
    ///
    /// Returns false when no record with that id exists (for example after
    /// a delete raced with process exit).
    pub async fn apply_status(&self, id: Uuid, status: MachineStatus) -> bool {
        let mut machines = self.machines.write().await;
        match machines.iter_mut().find(|m| m.id == id) {
            Some(machine) => {
                machine.status = status;
                true
            }
            None => false,
        }
    }

    // ========================================
    // Load
    // ========================================

    /// Rebuild the record list from the machines root.
    ///
    /// Scans the root's subdirectories in lexicographic order, decodes each
    /// machine folder, skips folders without a metadata file entirely and
    /// collects malformed ones into the report, then applies the persisted
    /// order and replaces the in-memory list atomically. Statuses reset to
    /// stopped; the supervisor remains the source of truth for live state.
    pub async fn load(&self) -> Result<LoadReport> {
        let root = self.machines_root();

        let mut folders: Vec<PathBuf> = fs::read_dir(&root)
            .map_err(|e| LauncherError::io_with_path(e, &root))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        folders.sort();

        let mut loaded = Vec::new();
        let mut report = LoadReport::default();

        for folder in folders {
            match metadata::decode(&folder) {
                Ok(Some(machine)) => loaded.push(machine),
                Ok(None) => {} // no metadata file, not a machine folder
                Err(e) => {
                    tracing::warn!("Skipping machine folder {}: {}", folder.display(), e);
                    report.skipped.push((folder, e.to_string()));
                }
            }
        }

        // Persisted order first; unknown ids keep scan order at the end.
        let order = self.settings.get().machine_order;
        loaded.sort_by_key(|machine| {
            order
                .iter()
                .position(|id| *id == machine.id)
                .unwrap_or(usize::MAX)
        });

        report.loaded = loaded.len();
        tracing::info!(
            "Loaded {} machines from {} ({} skipped)",
            report.loaded,
            root.display(),
            report.skipped.len()
        );

        *self.machines.write().await = loaded;
        self.emit();
        Ok(report)
    }

    // ========================================
    // Create / Edit / Delete
    // ========================================

    /// Create a new machine: folder, icon, metadata, in-memory record.
    ///
    /// Rejects an empty or duplicate name before touching the disk. A
    /// metadata write failure after the folder was created leaves the
    /// partial folder in place for the user to inspect rather than silently
    /// deleting it.
    pub async fn create(&self, draft: Machine, icon_source: Option<&Path>) -> Result<Machine> {
        Self::validate_name(&draft.name)?;

        let mut machines = self.machines.write().await;
        if machines.iter().any(|m| m.name == draft.name) {
            return Err(LauncherError::DuplicateName {
                name: draft.name.clone(),
            });
        }

        let folder = self.settings.get().machine_dir(&draft.name);
        fs::create_dir_all(&folder).map_err(|e| LauncherError::io_with_path(e, &folder))?;
        metadata::encode(&folder, &draft, icon_source)?;

        let record = refresh_icon(draft, &folder);
        machines.push(record.clone());
        drop(machines);

        tracing::info!("Created machine \"{}\"", record.name);
        self.emit();
        Ok(record)
    }

    /// Update an existing machine, renaming its folder when the name changed.
    ///
    /// Renames copy the old folder to the new name, write the updated icon
    /// and metadata into the copy, and only then remove the old folder, so a
    /// crash mid-operation leaves the original intact. A copy that fails
    /// partway leaves both folders; that is surfaced, not repaired.
    pub async fn edit(&self, updated: Machine, icon_source: Option<&Path>) -> Result<Machine> {
        Self::validate_name(&updated.name)?;

        let mut machines = self.machines.write().await;
        let index = machines
            .iter()
            .position(|m| m.id == updated.id)
            .ok_or_else(|| LauncherError::MachineNotFound {
                name: updated.name.clone(),
            })?;
        let old = machines[index].clone();

        let settings = self.settings.get();
        let old_folder = settings.machine_dir(&old.name);
        let new_folder = settings.machine_dir(&updated.name);

        if !old_folder.is_dir() {
            return Err(LauncherError::MachineNotFound {
                name: old.name.clone(),
            });
        }

        if updated.name != old.name {
            if machines
                .iter()
                .any(|m| m.id != updated.id && m.name == updated.name)
            {
                return Err(LauncherError::DuplicateName {
                    name: updated.name.clone(),
                });
            }

            copy_dir_recursive(&old_folder, &new_folder)?;
            metadata::encode(&new_folder, &updated, icon_source)?;
            fs::remove_dir_all(&old_folder)
                .map_err(|e| LauncherError::io_with_path(e, &old_folder))?;
        } else {
            metadata::encode(&new_folder, &updated, icon_source)?;
        }

        let mut record = refresh_icon(updated, &new_folder);
        record.status = old.status;
        machines[index] = record.clone();
        drop(machines);

        tracing::info!("Edited machine \"{}\"", record.name);
        self.emit();
        Ok(record)
    }

    /// Remove a machine's folder recursively and drop it from memory.
    ///
    /// Refuses to operate on a record with an empty name, which would
    /// otherwise point the recursive delete at the machines root itself.
    /// The caller owns the double confirmation; see
    /// [`Alert::confirm_delete`](crate::error::Alert::confirm_delete).
    pub async fn delete(&self, machine: &Machine) -> Result<()> {
        Self::validate_name(&machine.name)?;

        let mut machines = self.machines.write().await;
        let folder = self.settings.get().machine_dir(&machine.name);
        fs::remove_dir_all(&folder).map_err(|e| LauncherError::io_with_path(e, &folder))?;
        machines.retain(|m| m.id != machine.id);
        drop(machines);

        tracing::info!("Deleted machine \"{}\"", machine.name);
        self.emit();
        Ok(())
    }

    /// Duplicate a machine's folder tree under a derived name and a fresh id.
    pub async fn clone_machine(&self, source: &Machine) -> Result<Machine> {
        let mut machines = self.machines.write().await;
        let name = naming::clone_name(&source.name, machines.iter().map(|m| m.name.as_str()));

        let settings = self.settings.get();
        let source_folder = settings.machine_dir(&source.name);
        if !source_folder.is_dir() {
            return Err(LauncherError::MachineNotFound {
                name: source.name.clone(),
            });
        }
        let clone_folder = settings.machine_dir(&name);
        copy_dir_recursive(&source_folder, &clone_folder)?;

        let clone = Machine {
            id: Uuid::new_v4(),
            name,
            icon_custom: source.icon_custom,
            icon_path: None,
            notes: source.notes.clone(),
            status: MachineStatus::Stopped,
        };
        // The copy brought any icon along; only the metadata needs rewriting.
        metadata::encode(&clone_folder, &clone, None)?;

        let record = refresh_icon(clone, &clone_folder);
        machines.push(record.clone());
        drop(machines);

        tracing::info!(
            "Cloned machine \"{}\" as \"{}\"",
            source.name,
            record.name
        );
        self.emit();
        Ok(record)
    }

    // ========================================
    // Ordering
    // ========================================

    /// Move the record at `from` to position `to` and persist the new order.
    pub async fn move_machine(&self, from: usize, to: usize) -> Result<()> {
        let mut machines = self.machines.write().await;
        if from >= machines.len() || to >= machines.len() {
            return Err(LauncherError::Validation {
                field: "index".to_string(),
                message: format!(
                    "move {} -> {} out of bounds for {} machines",
                    from,
                    to,
                    machines.len()
                ),
            });
        }

        let machine = machines.remove(from);
        machines.insert(to, machine);

        let order: Vec<Uuid> = machines.iter().map(|m| m.id).collect();
        self.settings.update(|s| s.machine_order = order)?;
        drop(machines);

        self.emit();
        Ok(())
    }

    // ========================================
    // Size
    // ========================================

    /// Human-readable total size of the machine's folder.
    ///
    /// Never fails: an unreadable folder reports as the zero sentinel.
    pub fn size_of(&self, machine: &Machine) -> String {
        let folder = self.settings.get().machine_dir(&machine.name);
        let mut total = 0u64;

        for entry in WalkDir::new(&folder).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                if let Ok(meta) = entry.metadata() {
                    total += meta.len();
                }
            }
        }

        format_size(total)
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(LauncherError::Validation {
                field: "name".to_string(),
                message: "machine must have a name".to_string(),
            });
        }
        Ok(())
    }

    fn emit(&self) {
        let _ = self.events.send(LibraryEvent::ListChanged);
    }
}

impl std::fmt::Debug for MachineLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineLibrary")
            .field("machines_root", &self.machines_root())
            .finish()
    }
}

/// Copy a directory tree, creating directories as needed.
fn copy_dir_recursive(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| LauncherError::Other(format!(
            "Failed to walk {}: {}",
            source.display(),
            e
        )))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| LauncherError::Other(format!(
                "Walked outside of {}",
                source.display()
            )))?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)
                .map_err(|e| LauncherError::io_with_path(e, &destination))?;
        } else {
            fs::copy(entry.path(), &destination)
                .map_err(|e| LauncherError::io_with_path(e, &destination))?;
        }
    }
    Ok(())
}

/// Decide the record's icon path from what actually landed on disk.
fn refresh_icon(mut machine: Machine, folder: &Path) -> Machine {
    let icon_file = folder.join(crate::config::PathsConfig::ICON_FILENAME);
    machine.icon_path = (machine.icon_custom && icon_file.is_file()).then_some(icon_file);
    machine.status = MachineStatus::Stopped;
    machine
}

/// Byte-scaled display string using the decimal file-size convention.
fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "Zero KB".to_string();
    }

    let kb = bytes as f64 / 1000.0;
    if kb < 1000.0 {
        return format!("{} KB", kb.round().max(1.0));
    }

    let mut value = kb / 1000.0;
    for unit in ["MB", "GB"] {
        if value < 1000.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1000.0;
    }
    format!("{:.1} TB", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PathsConfig, SettingsStore};
    use tempfile::TempDir;

    async fn setup_library() -> (TempDir, Arc<SettingsStore>, MachineLibrary) {
        let temp_dir = TempDir::new().unwrap();
        let machines_root = temp_dir.path().join("machines");
        fs::create_dir_all(&machines_root).unwrap();

        let settings = Arc::new(SettingsStore::open(temp_dir.path().join("config")).unwrap());
        settings
            .update(|s| s.machines_path = machines_root)
            .unwrap();

        let library = MachineLibrary::new(settings.clone());
        (temp_dir, settings, library)
    }

    #[tokio::test]
    async fn test_create_then_load_round_trips() {
        let (_tmp, _settings, library) = setup_library().await;

        let draft = Machine::new("Atari800", "with sound card");
        let created = library.create(draft, None).await.unwrap();

        let report = library.load().await.unwrap();
        assert_eq!(report.loaded, 1);
        assert!(report.skipped.is_empty());

        let loaded = library.snapshot().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, created.id);
        assert_eq!(loaded[0].name, "Atari800");
        assert_eq!(loaded[0].notes, "with sound card");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let (_tmp, _settings, library) = setup_library().await;

        let err = library.create(Machine::new("", ""), None).await.unwrap_err();
        assert!(err.is_validation());
        assert!(fs::read_dir(library.machines_root())
            .unwrap()
            .next()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_changes_nothing() {
        let (_tmp, _settings, library) = setup_library().await;

        library.create(Machine::new("PC1", ""), None).await.unwrap();
        let err = library
            .create(Machine::new("PC1", ""), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::DuplicateName { .. }));

        let report = library.load().await.unwrap();
        assert_eq!(report.loaded, 1);
        let folders: Vec<_> = fs::read_dir(library.machines_root())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(folders.len(), 1);
    }

    #[tokio::test]
    async fn test_load_skips_folder_without_metadata() {
        let (_tmp, _settings, library) = setup_library().await;

        library
            .create(Machine::new("Atari800", ""), None)
            .await
            .unwrap();
        fs::create_dir_all(library.machines_root().join("Junk")).unwrap();

        let report = library.load().await.unwrap();
        assert_eq!(report.loaded, 1);
        assert!(report.skipped.is_empty());
        assert_eq!(library.snapshot().await[0].name, "Atari800");
    }

    #[tokio::test]
    async fn test_load_reports_malformed_metadata() {
        let (_tmp, _settings, library) = setup_library().await;

        library.create(Machine::new("Good", ""), None).await.unwrap();
        let broken = library.machines_root().join("Broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(PathsConfig::METADATA_FILENAME), "not json").unwrap();

        let report = library.load().await.unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, broken);
    }

    #[tokio::test]
    async fn test_edit_renames_folder_copy_before_delete() {
        let (_tmp, _settings, library) = setup_library().await;

        let created = library
            .create(Machine::new("OldName", "keep these notes"), None)
            .await
            .unwrap();
        let root = library.machines_root();
        fs::write(root.join("OldName").join("86box.cfg"), "state").unwrap();

        let mut updated = created.clone();
        updated.name = "NewName".to_string();
        library.edit(updated, None).await.unwrap();

        assert!(!root.join("OldName").exists());
        assert!(root.join("NewName").is_dir());
        // Emulator-owned state files travel with the rename.
        assert!(root.join("NewName").join("86box.cfg").is_file());

        library.load().await.unwrap();
        let loaded = library.snapshot().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, created.id);
        assert_eq!(loaded[0].name, "NewName");
        assert_eq!(loaded[0].notes, "keep these notes");
    }

    #[tokio::test]
    async fn test_edit_rejects_colliding_rename() {
        let (_tmp, _settings, library) = setup_library().await;

        library.create(Machine::new("First", ""), None).await.unwrap();
        let second = library.create(Machine::new("Second", ""), None).await.unwrap();

        let mut renamed = second.clone();
        renamed.name = "First".to_string();
        let err = library.edit(renamed, None).await.unwrap_err();
        assert!(matches!(err, LauncherError::DuplicateName { .. }));

        // Both folders are still intact.
        assert!(library.machines_root().join("First").is_dir());
        assert!(library.machines_root().join("Second").is_dir());
    }

    #[tokio::test]
    async fn test_edit_missing_folder_is_not_found() {
        let (_tmp, _settings, library) = setup_library().await;

        let created = library.create(Machine::new("Ghost", ""), None).await.unwrap();
        fs::remove_dir_all(library.machines_root().join("Ghost")).unwrap();

        let err = library.edit(created.clone(), None).await.unwrap_err();
        assert!(matches!(err, LauncherError::MachineNotFound { .. }));
        // The stale record stays until an explicit reload.
        assert_eq!(library.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_folder_and_record() {
        let (_tmp, _settings, library) = setup_library().await;

        let machine = library.create(Machine::new("Doomed", ""), None).await.unwrap();
        library.delete(&machine).await.unwrap();

        assert!(!library.machines_root().join("Doomed").exists());
        let report = library.load().await.unwrap();
        assert_eq!(report.loaded, 0);
    }

    #[tokio::test]
    async fn test_delete_refuses_empty_name() {
        let (_tmp, _settings, library) = setup_library().await;

        let mut nameless = Machine::new("x", "");
        nameless.name = String::new();
        let err = library.delete(&nameless).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_clone_naming_never_collides() {
        let (_tmp, _settings, library) = setup_library().await;

        let foo = library.create(Machine::new("Foo", "original"), None).await.unwrap();
        let first = library.clone_machine(&foo).await.unwrap();
        assert_eq!(first.name, "Foo copy 1");
        assert_ne!(first.id, foo.id);

        let second = library.clone_machine(&foo).await.unwrap();
        assert_eq!(second.name, "Foo copy 2");

        let report = library.load().await.unwrap();
        assert_eq!(report.loaded, 3);
        let loaded = library.snapshot().await;
        assert!(loaded.iter().any(|m| m.name == "Foo copy 1"));
        assert!(loaded.iter().any(|m| m.name == "Foo copy 2"));
        // Clones carry the source notes under their own ids.
        assert!(loaded
            .iter()
            .filter(|m| m.name != "Foo")
            .all(|m| m.notes == "original" && m.id != foo.id));
    }

    #[tokio::test]
    async fn test_move_then_load_preserves_order() {
        let (_tmp, _settings, library) = setup_library().await;

        let a = library.create(Machine::new("Alpha", ""), None).await.unwrap();
        let b = library.create(Machine::new("Beta", ""), None).await.unwrap();
        let c = library.create(Machine::new("Gamma", ""), None).await.unwrap();

        library.move_machine(2, 0).await.unwrap();
        let order: Vec<Uuid> = library.snapshot().await.iter().map(|m| m.id).collect();
        assert_eq!(order, vec![c.id, a.id, b.id]);

        library.load().await.unwrap();
        let reloaded: Vec<Uuid> = library.snapshot().await.iter().map(|m| m.id).collect();
        assert_eq!(reloaded, vec![c.id, a.id, b.id]);
    }

    #[tokio::test]
    async fn test_unordered_records_sort_last_in_scan_order() {
        let (_tmp, settings, library) = setup_library().await;

        let a = library.create(Machine::new("Alpha", ""), None).await.unwrap();
        let b = library.create(Machine::new("Beta", ""), None).await.unwrap();
        let c = library.create(Machine::new("Gamma", ""), None).await.unwrap();

        // Only Gamma is pinned; the others keep lexicographic scan order.
        settings.update(|s| s.machine_order = vec![c.id]).unwrap();
        library.load().await.unwrap();

        let order: Vec<Uuid> = library.snapshot().await.iter().map(|m| m.id).collect();
        assert_eq!(order, vec![c.id, a.id, b.id]);
    }

    #[tokio::test]
    async fn test_move_out_of_bounds() {
        let (_tmp, _settings, library) = setup_library().await;
        library.create(Machine::new("Only", ""), None).await.unwrap();

        let err = library.move_machine(0, 3).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_size_of_counts_nested_files() {
        let (_tmp, _settings, library) = setup_library().await;

        let machine = library.create(Machine::new("Sized", ""), None).await.unwrap();
        let folder = library.machines_root().join("Sized");
        fs::create_dir_all(folder.join("disks")).unwrap();
        fs::write(folder.join("disks").join("hdd.img"), vec![0u8; 250_000]).unwrap();

        let size = library.size_of(&machine);
        assert!(size.ends_with(" KB"), "unexpected size string: {}", size);
        assert_ne!(size, "Zero KB");
    }

    #[tokio::test]
    async fn test_size_of_unreadable_folder_is_zero_sentinel() {
        let (_tmp, _settings, library) = setup_library().await;

        let ghost = Machine::new("DoesNotExist", "");
        assert_eq!(library.size_of(&ghost), "Zero KB");
    }

    #[tokio::test]
    async fn test_apply_status_updates_record() {
        let (_tmp, _settings, library) = setup_library().await;

        let machine = library.create(Machine::new("Runner", ""), None).await.unwrap();
        assert!(library.apply_status(machine.id, MachineStatus::Running).await);
        assert_eq!(
            library.get(machine.id).await.unwrap().status,
            MachineStatus::Running
        );
        assert!(!library.apply_status(Uuid::new_v4(), MachineStatus::Stopped).await);
    }

    #[tokio::test]
    async fn test_list_changed_events() {
        let (_tmp, _settings, library) = setup_library().await;
        let mut events = library.subscribe();

        library.create(Machine::new("Evented", ""), None).await.unwrap();
        assert_eq!(events.try_recv().unwrap(), LibraryEvent::ListChanged);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "Zero KB");
        assert_eq!(format_size(500), "1 KB");
        assert_eq!(format_size(2_000), "2 KB");
        assert_eq!(format_size(250_000), "250 KB");
        assert_eq!(format_size(1_500_000), "1.5 MB");
        assert_eq!(format_size(3_200_000_000), "3.2 GB");
        assert_eq!(format_size(2_000_000_000_000), "2.0 TB");
    }
}
