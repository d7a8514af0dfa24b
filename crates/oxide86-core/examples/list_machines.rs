//! Basic usage example - list the machines in a library root.

use oxide86_library::{MachineLibrary, Result, SettingsStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Get the machines root from args or use the current directory
    let root = std::env::args()
        .nth(1)
        .unwrap_or_else(|| ".".to_string());

    let settings = Arc::new(SettingsStore::open("./oxide86-config")?);
    settings.update(|s| s.machines_path = root.clone().into())?;

    let library = MachineLibrary::new(settings);
    let report = library.load().await?;

    if report.loaded == 0 {
        println!("No machines found in {}.", root);
    } else {
        println!("Found {} machines:", report.loaded);
        for machine in library.snapshot().await {
            println!("  - {} ({})", machine.name, library.size_of(&machine));
        }
    }
    for (folder, reason) in report.skipped {
        println!("Skipped {}: {}", folder.display(), reason);
    }

    Ok(())
}
