//! Notification events published to the presentation layer.
//!
//! The original launcher refreshed its UI through observed properties; here
//! the library store and the process supervisor each publish over a
//! `tokio::sync::broadcast` channel and presentation subscribes explicitly.

use crate::machine_library::MachineStatus;
use uuid::Uuid;

/// Published by [`crate::machine_library::MachineLibrary`] whenever the
/// record list changes (load, create, edit, delete, clone, move).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryEvent {
    ListChanged,
}

/// Published by [`crate::process::MachineSupervisor`] on every per-machine
/// state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub machine_id: Uuid,
    pub status: MachineStatus,
}
