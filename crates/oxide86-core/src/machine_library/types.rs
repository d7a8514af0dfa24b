//! Machine record types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Per-machine run state. Transient: never persisted to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    #[default]
    Stopped,
    Running,
    Configuring,
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Stopped => "stopped",
            MachineStatus::Running => "running",
            MachineStatus::Configuring => "configuring",
        }
    }

    /// True while an emulator process is tracked for the machine.
    pub fn is_active(&self) -> bool {
        !matches!(self, MachineStatus::Stopped)
    }
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// In-memory machine record.
///
/// `name` doubles as the on-disk folder name under the machines root.
/// `icon_path` points at the icon file inside the machine's own folder and
/// is only `Some` when `icon_custom` is set and the file actually exists;
/// presentation falls back to the default icon otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    /// Stable identifier, assigned at creation, never changes.
    pub id: Uuid,
    /// Display name and folder name; never empty once persisted.
    pub name: String,
    /// Whether a user-supplied icon replaces the default.
    pub icon_custom: bool,
    /// Icon file inside the machine folder, when present.
    pub icon_path: Option<PathBuf>,
    /// Free-form notes.
    pub notes: String,
    /// Transient run state.
    pub status: MachineStatus,
}

impl Machine {
    /// New machine draft with a fresh id and stopped status.
    pub fn new(name: impl Into<String>, notes: impl Into<String>) -> Self {
        Machine {
            id: Uuid::new_v4(),
            name: name.into(),
            icon_custom: false,
            icon_path: None,
            notes: notes.into(),
            status: MachineStatus::Stopped,
        }
    }
}

/// On-disk shape of a machine's metadata file.
///
/// `id` is required: a metadata file that fails to parse (including a
/// missing or invalid id) marks the folder as malformed and it is skipped
/// at load. `icon` stores the relative icon filename, never an absolute
/// path, so a relocated library keeps working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineMetadata {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub icon_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub notes: String,
}
