//! Emulator invocation building.
//!
//! The 86Box argument contract is fixed: `-R <rom dir>`, `-V <machine
//! name>`, `-P <machine folder>`, and `-S` only when opening the machine's
//! configuration instead of running it. The spellings are the emulator's
//! ABI and must not change.

use crate::config::Settings;
use crate::error::{LauncherError, Result};
use crate::machine_library::Machine;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// One concrete emulator launch: executable plus the computed argument list.
#[derive(Debug, Clone)]
pub struct EmulatorInvocation {
    /// Full path to the 86Box executable.
    pub executable: PathBuf,
    /// ROM directory handed to the emulator.
    pub rom_dir: PathBuf,
    /// Machine name, used by the emulator as its instance identifier.
    pub machine_name: String,
    /// The machine's own folder.
    pub machine_dir: PathBuf,
    /// Open the emulator's settings dialog instead of booting.
    pub configure: bool,
    /// Redirect the child's stdout/stderr here; discarded when unset.
    pub log_file: Option<PathBuf>,
}

impl EmulatorInvocation {
    /// Resolve executable, ROM directory, and machine folder from settings.
    pub fn new(settings: &Settings, machine: &Machine) -> Self {
        Self {
            executable: settings.emulator_path.clone(),
            rom_dir: settings.rom_dir(),
            machine_name: machine.name.clone(),
            machine_dir: settings.machine_dir(&machine.name),
            configure: false,
            log_file: None,
        }
    }

    /// Switch between run and configuration mode.
    pub fn configuring(mut self, configure: bool) -> Self {
        self.configure = configure;
        self
    }

    /// Set the log file path.
    pub fn with_log_file(mut self, path: impl AsRef<Path>) -> Self {
        self.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// The exact argument list passed to the emulator.
    pub fn args(&self) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-R"),
            self.rom_dir.clone().into_os_string(),
            OsString::from("-V"),
            OsString::from(&self.machine_name),
            OsString::from("-P"),
            self.machine_dir.clone().into_os_string(),
        ];
        if self.configure {
            args.push(OsString::from("-S"));
        }
        args
    }

    /// Build the ready-to-spawn command.
    ///
    /// Opening the log file is the only fallible step; with no log file the
    /// child's output is discarded.
    pub fn command(&self) -> Result<Command> {
        let mut command = Command::new(&self.executable);
        command.args(self.args());
        command.stdin(Stdio::null());

        match &self.log_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| LauncherError::io_with_path(e, parent))?;
                }
                let log = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| LauncherError::io_with_path(e, path))?;
                let log_err = log
                    .try_clone()
                    .map_err(|e| LauncherError::io_with_path(e, path))?;
                command.stdout(Stdio::from(log));
                command.stderr(Stdio::from(log_err));
            }
            None => {
                command.stdout(Stdio::null());
                command.stderr(Stdio::null());
            }
        }

        Ok(command)
    }
}
