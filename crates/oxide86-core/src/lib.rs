//! oxide86 - Headless library for managing 86Box virtual machines.
//!
//! This crate provides the core functionality of an 86Box launcher: a
//! directory-backed library of machine records (one folder per machine,
//! metadata file plus optional icon) and a process supervisor that spawns
//! the external emulator binary and tracks each machine's run state. It can
//! be used programmatically without any UI layer; `oxide86-cli` is a thin
//! front-end over it.
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide86_library::{MachineLibrary, MachineSupervisor, SettingsStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> oxide86_library::Result<()> {
//!     let settings = Arc::new(SettingsStore::open("/path/to/config")?);
//!     let library = MachineLibrary::new(settings.clone());
//!
//!     let report = library.load().await?;
//!     println!("Found {} machines", report.loaded);
//!
//!     let supervisor = MachineSupervisor::new(settings);
//!     if let Some(machine) = library.get_by_name("Atari800").await {
//!         supervisor.run(&machine).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod machine_library;
pub mod metadata;
pub mod process;

// Re-export commonly used types
pub use config::{Appearance, PathsConfig, Settings, SettingsStore};
pub use error::{Alert, LauncherError, Result};
pub use events::{LibraryEvent, StatusEvent};
pub use machine_library::{LoadReport, Machine, MachineLibrary, MachineMetadata, MachineStatus};
pub use process::{EmulatorInvocation, MachineSupervisor, TrackedMachine};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_library_and_supervisor_share_settings() {
        let temp_dir = TempDir::new().unwrap();
        let machines = temp_dir.path().join("machines");
        std::fs::create_dir_all(&machines).unwrap();

        let settings = Arc::new(SettingsStore::open(temp_dir.path().join("config")).unwrap());
        settings
            .update(|s| s.machines_path = machines.clone())
            .unwrap();

        let library = MachineLibrary::new(settings.clone());
        let supervisor = MachineSupervisor::new(settings);

        assert_eq!(library.machines_root(), machines);
        assert!(supervisor.tracked().is_empty());
    }

    #[tokio::test]
    async fn test_full_round_trip_through_disk() {
        let temp_dir = TempDir::new().unwrap();
        let machines = temp_dir.path().join("machines");
        std::fs::create_dir_all(&machines).unwrap();

        let settings = Arc::new(SettingsStore::open(temp_dir.path().join("config")).unwrap());
        settings.update(|s| s.machines_path = machines).unwrap();

        let library = MachineLibrary::new(settings.clone());
        let created = library
            .create(Machine::new("Atari800", "round trip"), None)
            .await
            .unwrap();

        // A second library over the same root sees exactly the same record.
        let other = MachineLibrary::new(settings);
        other.load().await.unwrap();
        let loaded = other.get(created.id).await.unwrap();
        assert_eq!(loaded.name, created.name);
        assert_eq!(loaded.notes, created.notes);
    }
}
