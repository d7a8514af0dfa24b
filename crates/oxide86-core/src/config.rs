//! Typed configuration for the oxide86 library.
//!
//! The original launcher kept its paths in process-wide mutable defaults;
//! here everything lives in an explicit [`Settings`] value persisted by a
//! [`SettingsStore`] that is constructed once and handed to the library
//! store and the process supervisor.

use crate::error::{LauncherError, Result};
use crate::metadata::{atomic_read_json, atomic_write_json};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

/// Fixed file and directory names used across the library.
pub struct PathsConfig;

impl PathsConfig {
    /// Per-machine metadata file, inside each machine folder.
    pub const METADATA_FILENAME: &'static str = "machine.json";
    /// Per-machine custom icon, inside each machine folder.
    pub const ICON_FILENAME: &'static str = "icon.png";
    /// Settings file, inside the configuration directory.
    pub const SETTINGS_FILENAME: &'static str = "settings.json";
    /// Launch log directory name, inside the configuration directory.
    pub const LOGS_DIR_NAME: &'static str = "logs";
}

/// Appearance preference. Stored and round-tripped for the front-end;
/// never interpreted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Appearance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Appearance::Auto => "auto",
            Appearance::Light => "light",
            Appearance::Dark => "dark",
        }
    }
}

impl std::fmt::Display for Appearance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted launcher settings.
///
/// `machine_order` is the sidebar ordering: machine ids in display order.
/// Records missing from the list sort last in directory-scan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Full path to the 86Box executable.
    pub emulator_path: PathBuf,
    /// Root directory holding one folder per machine.
    pub machines_path: PathBuf,
    /// ROM directory handed to the emulator, used when `custom_roms` is set.
    pub roms_path: PathBuf,
    /// Whether `roms_path` overrides the conventional ROM location.
    pub custom_roms: bool,
    /// Front-end appearance preference.
    pub appearance: Appearance,
    /// Persisted sidebar order of machine ids.
    pub machine_order: Vec<Uuid>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            emulator_path: default_emulator_path(),
            machines_path: default_machines_path(),
            roms_path: default_roms_path(),
            custom_roms: false,
            appearance: Appearance::default(),
            machine_order: Vec::new(),
        }
    }
}

impl Settings {
    /// ROM directory to pass to the emulator, honoring the custom override.
    pub fn rom_dir(&self) -> PathBuf {
        if self.custom_roms {
            self.roms_path.clone()
        } else {
            default_roms_path()
        }
    }

    /// Folder for a machine with the given name, under the machines root.
    pub fn machine_dir(&self, name: &str) -> PathBuf {
        self.machines_path.join(name)
    }
}

/// Conventional 86Box install location.
fn default_emulator_path() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/Applications/86Box.app/Contents/MacOS/86Box")
    } else {
        PathBuf::from("86Box")
    }
}

/// Default machines root: the user's documents directory.
fn default_machines_path() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default ROM directory: the emulator's per-application-support location.
fn default_roms_path() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("net.86box.86Box")
        .join("roms")
}

/// JSON-backed settings persistence with an in-memory cache.
///
/// Reads happen against the cache; every update is written through
/// atomically so a crash mid-save cannot corrupt the previous settings.
pub struct SettingsStore {
    config_dir: PathBuf,
    path: PathBuf,
    cached: RwLock<Settings>,
}

impl SettingsStore {
    /// Open (or initialize) the settings file under `config_dir`.
    ///
    /// A missing file yields defaults without touching disk; the file is
    /// only created on the first update.
    pub fn open(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        let path = config_dir.join(PathsConfig::SETTINGS_FILENAME);

        let settings = atomic_read_json::<Settings>(&path)
            .map_err(|e| LauncherError::Config {
                message: format!("Failed to read settings from {}: {}", path.display(), e),
            })?
            .unwrap_or_default();

        Ok(Self {
            config_dir,
            path,
            cached: RwLock::new(settings),
        })
    }

    /// Current settings snapshot.
    pub fn get(&self) -> Settings {
        self.cached.read().unwrap().clone()
    }

    /// Mutate the settings and persist the result atomically.
    ///
    /// The cache is only replaced after the write succeeds, so readers never
    /// observe settings that did not reach disk.
    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) -> Result<Settings> {
        let mut guard = self.cached.write().unwrap();
        let mut next = guard.clone();
        mutate(&mut next);
        atomic_write_json(&self.path, &next, true)?;
        *guard = next.clone();
        Ok(next)
    }

    /// Path of the settings file itself.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration directory this store lives in.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Launch log directory under the configuration directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.config_dir.join(PathsConfig::LOGS_DIR_NAME)
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .finish()
    }
}
