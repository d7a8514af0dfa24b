//! Machine library: the directory-backed record store.
//!
//! One folder per machine under a configurable root; the folder tree is the
//! durable source of truth and the in-memory list is rebuilt from it
//! wholesale on startup and after any path change.

mod library;
pub mod naming;
mod types;

pub use library::{LoadReport, MachineLibrary};
pub use types::{Machine, MachineMetadata, MachineStatus};
