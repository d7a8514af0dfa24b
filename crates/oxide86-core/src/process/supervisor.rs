//! High-level emulator process supervision.
//!
//! Tracks at most the set of machines the user has launched; each entry in
//! the handle table maps a machine id to its live child process. The table
//! is the source of truth for run state: a machine is running or
//! configuring exactly while its id is tracked, and exit monitoring removes
//! the entry regardless of exit code.

use crate::config::SettingsStore;
use crate::error::{LauncherError, Result};
use crate::events::StatusEvent;
use crate::machine_library::{Machine, MachineStatus};
use crate::process::invocation::EmulatorInvocation;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Broadcast capacity for status notifications.
const EVENT_CAPACITY: usize = 32;

/// Tracked state for one launched machine.
#[derive(Debug, Clone)]
pub struct TrackedMachine {
    /// Machine name at launch time.
    pub name: String,
    /// OS process id, when the runtime reports one.
    pub pid: Option<u32>,
    /// Running or configuring.
    pub status: MachineStatus,
}

/// Process supervisor for 86Box instances.
///
/// Each machine's process is independent; multiple machines may run
/// concurrently. The supervisor does not deduplicate starts for the same
/// machine id (the presentation layer guards on status before issuing
/// run/configure); it only logs when it observes one.
pub struct MachineSupervisor {
    settings: Arc<SettingsStore>,
    handles: Arc<Mutex<HashMap<Uuid, TrackedMachine>>>,
    events: broadcast::Sender<StatusEvent>,
    log_dir: Option<PathBuf>,
}

impl MachineSupervisor {
    /// Create a supervisor bound to the given settings.
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            handles: Arc::new(Mutex::new(HashMap::new())),
            events,
            log_dir: None,
        }
    }

    /// Write each launch's emulator output to a timestamped file under `dir`.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Subscribe to status-changed notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// Start the machine.
    pub async fn run(&self, machine: &Machine) -> Result<()> {
        self.spawn(machine, false).await
    }

    /// Open the machine's emulator configuration.
    pub async fn configure(&self, machine: &Machine) -> Result<()> {
        self.spawn(machine, true).await
    }

    /// Current status for a machine id; stopped when untracked.
    pub fn status_of(&self, id: Uuid) -> MachineStatus {
        self.handles
            .lock()
            .unwrap()
            .get(&id)
            .map(|t| t.status)
            .unwrap_or(MachineStatus::Stopped)
    }

    /// Whether a process is currently tracked for the machine id.
    pub fn is_tracked(&self, id: Uuid) -> bool {
        self.handles.lock().unwrap().contains_key(&id)
    }

    /// Snapshot of all tracked machines.
    pub fn tracked(&self) -> Vec<(Uuid, TrackedMachine)> {
        self.handles
            .lock()
            .unwrap()
            .iter()
            .map(|(id, t)| (*id, t.clone()))
            .collect()
    }

    async fn spawn(&self, machine: &Machine, configure: bool) -> Result<()> {
        let settings = self.settings.get();

        if !settings.emulator_path.is_file() {
            return Err(LauncherError::LaunchFailed {
                name: machine.name.clone(),
                message: format!(
                    "Emulator not found at {}, check the settings",
                    settings.emulator_path.display()
                ),
            });
        }
        let rom_dir = settings.rom_dir();
        if !rom_dir.is_dir() {
            return Err(LauncherError::LaunchFailed {
                name: machine.name.clone(),
                message: format!(
                    "ROM directory not found at {}, check the settings",
                    rom_dir.display()
                ),
            });
        }

        let mut invocation = EmulatorInvocation::new(&settings, machine).configuring(configure);
        if let Some(ref dir) = self.log_dir {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            invocation =
                invocation.with_log_file(dir.join(format!("86box_{}_{}.log", machine.name, timestamp)));
        }

        if self.is_tracked(machine.id) {
            warn!(
                "Machine \"{}\" already has a tracked process, starting another instance",
                machine.name
            );
        }

        let mut child = invocation
            .command()?
            .spawn()
            .map_err(|e| LauncherError::LaunchFailed {
                name: machine.name.clone(),
                message: e.to_string(),
            })?;

        let status = if configure {
            MachineStatus::Configuring
        } else {
            MachineStatus::Running
        };
        let pid = child.id();
        info!(
            "Launched 86Box for \"{}\" (pid {:?}, {})",
            machine.name, pid, status
        );

        self.handles.lock().unwrap().insert(
            machine.id,
            TrackedMachine {
                name: machine.name.clone(),
                pid,
                status,
            },
        );
        let _ = self.events.send(StatusEvent {
            machine_id: machine.id,
            status,
        });

        // Exit monitoring runs off the caller's path; exit codes are logged
        // but not interpreted.
        let handles = Arc::clone(&self.handles);
        let events = self.events.clone();
        let machine_id = machine.id;
        let name = machine.name.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(exit) => debug!("86Box for \"{}\" exited with {}", name, exit),
                Err(e) => warn!("Failed to wait on 86Box for \"{}\": {}", name, e),
            }
            handles.lock().unwrap().remove(&machine_id);
            let _ = events.send(StatusEvent {
                machine_id,
                status: MachineStatus::Stopped,
            });
        });

        Ok(())
    }
}

impl std::fmt::Debug for MachineSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineSupervisor")
            .field("tracked", &self.handles.lock().unwrap().len())
            .finish()
    }
}
