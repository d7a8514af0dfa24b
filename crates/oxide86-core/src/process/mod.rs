//! Emulator process launching and supervision.

mod invocation;
mod supervisor;

pub use invocation::EmulatorInvocation;
pub use supervisor::{MachineSupervisor, TrackedMachine};
