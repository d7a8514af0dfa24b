//! Error types for the oxide86 library.
//!
//! Every failure in the core is represented here and recovered at the
//! component boundary; callers convert errors into a single user-facing
//! alert (title + message + optional confirm/cancel) via [`LauncherError::to_alert`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the oxide86 library.
#[derive(Debug, Error)]
pub enum LauncherError {
    // Validation errors (rejected before any disk mutation)
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("A machine named \"{name}\" already exists")]
    DuplicateName { name: String },

    // Not-found errors
    #[error("Machine \"{name}\" not found in library")]
    MachineNotFound { name: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Process-spawn errors
    #[error("Could not launch emulator for \"{name}\": {message}")]
    LaunchFailed { name: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for oxide86 operations.
pub type Result<T> = std::result::Result<T, LauncherError>;

// Conversion implementations for common error types

impl From<std::io::Error> for LauncherError {
    fn from(err: std::io::Error) -> Self {
        LauncherError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for LauncherError {
    fn from(err: serde_json::Error) -> Self {
        LauncherError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl LauncherError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        LauncherError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// True for errors rejected before any disk mutation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LauncherError::Validation { .. } | LauncherError::DuplicateName { .. }
        )
    }

    /// Convert to the user-facing alert shown by the presentation layer.
    pub fn to_alert(&self) -> Alert {
        let title = match self {
            LauncherError::Validation { .. } | LauncherError::DuplicateName { .. } => {
                "Error saving machine"
            }
            LauncherError::MachineNotFound { .. } => "Machine not found",
            LauncherError::Io { .. } | LauncherError::Json { .. } => "An error occurred",
            LauncherError::Config { .. } => "Configuration error",
            LauncherError::LaunchFailed { .. } => "Emulator not launched",
            LauncherError::Other(_) => "An error occurred",
        };

        Alert {
            title: title.to_string(),
            message: self.to_string(),
            confirmable: false,
        }
    }
}

/// User-facing alert: title, message, and whether a cancel option is shown.
///
/// Destructive commands build a confirmable alert up front (for example the
/// delete confirmation); error conversions always produce a plain dismissable
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub confirmable: bool,
}

impl Alert {
    /// Build the deletion confirmation shown before a machine is removed.
    pub fn confirm_delete(name: &str) -> Self {
        Alert {
            title: format!("Are you sure you want to delete \"{}\" permanently?", name),
            message: "You cannot undo this action.".to_string(),
            confirmable: true,
        }
    }
}
