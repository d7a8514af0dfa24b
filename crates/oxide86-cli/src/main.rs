//! oxide86 CLI - command-line front-end for the machine library.
//!
//! This binary is the presentation layer: it issues commands to the
//! library store and the process supervisor, renders snapshots, and turns
//! library errors into user-facing alerts on stderr.

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use oxide86_library::{
    Alert, LauncherError, Machine, MachineLibrary, MachineStatus, MachineSupervisor,
    SettingsStore, StatusEvent,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "oxide86")]
#[command(about = "Manage and launch 86Box virtual machines")]
struct Args {
    /// Configuration directory (defaults to the user config dir)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List machines in display order
    List {
        /// Include each machine's folder size
        #[arg(long)]
        sizes: bool,
    },
    /// Add a new machine
    Add {
        name: String,
        #[arg(long, default_value = "")]
        notes: String,
        /// Copy this image into the machine folder as its icon
        #[arg(long)]
        icon: Option<PathBuf>,
    },
    /// Edit a machine
    Edit {
        name: String,
        /// New machine name
        #[arg(long)]
        rename: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Copy this image in as the new custom icon
        #[arg(long)]
        icon: Option<PathBuf>,
        /// Drop the custom icon and fall back to the default
        #[arg(long, conflicts_with = "icon")]
        remove_icon: bool,
    },
    /// Delete a machine permanently
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Clone a machine under a derived name
    Clone { name: String },
    /// Move a machine to a new position in the sidebar order
    Move { from: usize, to: usize },
    /// Show a machine's folder size
    Size { name: String },
    /// Print a machine's folder path
    Path { name: String },
    /// Run a machine and wait for the emulator to exit
    Run { name: String },
    /// Open a machine's emulator configuration and wait for it to close
    Configure { name: String },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the current settings
    Show,
    /// Change settings values
    Set {
        #[arg(long)]
        emulator: Option<PathBuf>,
        #[arg(long)]
        machines: Option<PathBuf>,
        #[arg(long)]
        roms: Option<PathBuf>,
        #[arg(long)]
        custom_roms: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine the user config directory"))?
            .join("oxide86"),
    };
    let settings = Arc::new(SettingsStore::open(&config_dir).map_err(alert_error)?);

    if let Command::Config { command } = &args.command {
        return run_config(&settings, command);
    }

    let library = MachineLibrary::new(settings.clone());
    match library.load().await {
        Ok(report) => {
            if !report.skipped.is_empty() {
                eprintln!("Warning: skipped {} machine folder(s):", report.skipped.len());
                for (folder, reason) in &report.skipped {
                    eprintln!("  {}: {}", folder.display(), reason);
                }
            }
        }
        Err(e) => warn!("No machines found in this library: {}", e),
    }

    match args.command {
        Command::List { sizes } => {
            for machine in library.snapshot().await {
                let icon = if machine.icon_path.is_some() { "*" } else { " " };
                if sizes {
                    let size = library.size_of(&machine);
                    println!("{} {:30} {:>10}  {}", icon, machine.name, size, machine.notes);
                } else {
                    println!("{} {:30} {}", icon, machine.name, machine.notes);
                }
            }
        }
        Command::Add { name, notes, icon } => {
            let draft = {
                let mut m = Machine::new(name, notes);
                m.icon_custom = icon.is_some();
                m
            };
            let created = library
                .create(draft, icon.as_deref())
                .await
                .map_err(alert_error)?;
            println!("Added \"{}\"", created.name);
        }
        Command::Edit {
            name,
            rename,
            notes,
            icon,
            remove_icon,
        } => {
            let mut machine = find(&library, &name).await?;
            if let Some(new_name) = rename {
                machine.name = new_name;
            }
            if let Some(new_notes) = notes {
                machine.notes = new_notes;
            }
            if icon.is_some() {
                machine.icon_custom = true;
            }
            if remove_icon {
                machine.icon_custom = false;
            }
            let updated = library
                .edit(machine, icon.as_deref())
                .await
                .map_err(alert_error)?;
            println!("Saved \"{}\"", updated.name);
        }
        Command::Delete { name, yes } => {
            let machine = find(&library, &name).await?;
            if !yes && !confirm(&Alert::confirm_delete(&machine.name))? {
                println!("Cancelled");
                return Ok(());
            }
            library.delete(&machine).await.map_err(alert_error)?;
            println!("Deleted \"{}\"", machine.name);
        }
        Command::Clone { name } => {
            let machine = find(&library, &name).await?;
            let clone = library.clone_machine(&machine).await.map_err(alert_error)?;
            println!("Cloned \"{}\" as \"{}\"", machine.name, clone.name);
        }
        Command::Move { from, to } => {
            library.move_machine(from, to).await.map_err(alert_error)?;
            for (index, machine) in library.snapshot().await.iter().enumerate() {
                println!("{:3} {}", index, machine.name);
            }
        }
        Command::Size { name } => {
            let machine = find(&library, &name).await?;
            println!("{}", library.size_of(&machine));
        }
        Command::Path { name } => {
            let machine = find(&library, &name).await?;
            println!("{}", library.machines_root().join(&machine.name).display());
        }
        Command::Run { name } => {
            let machine = find(&library, &name).await?;
            launch(&library, &settings, &machine, false).await?;
        }
        Command::Configure { name } => {
            let machine = find(&library, &name).await?;
            launch(&library, &settings, &machine, true).await?;
        }
        Command::Config { .. } => unreachable!("handled before loading the library"),
    }

    Ok(())
}

/// Spawn the emulator for `machine` and block until it exits.
async fn launch(
    library: &MachineLibrary,
    settings: &Arc<SettingsStore>,
    machine: &Machine,
    configure: bool,
) -> Result<()> {
    if library
        .get(machine.id)
        .await
        .map(|m| m.status.is_active())
        .unwrap_or(false)
    {
        bail!("\"{}\" is already running", machine.name);
    }

    let supervisor =
        MachineSupervisor::new(settings.clone()).with_log_dir(settings.logs_dir());
    let mut events = supervisor.subscribe();

    let result = if configure {
        supervisor.configure(machine).await
    } else {
        supervisor.run(machine).await
    };
    result.map_err(alert_error)?;

    // Mirror supervisor state onto the shared record until the process ends.
    loop {
        let StatusEvent { machine_id, status } = events.recv().await?;
        if machine_id != machine.id {
            continue;
        }
        library.apply_status(machine_id, status).await;
        println!("\"{}\" is {}", machine.name, status);
        if status == MachineStatus::Stopped {
            break;
        }
    }

    Ok(())
}

fn run_config(settings: &Arc<SettingsStore>, command: &ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let current = settings.get();
            println!("emulator     {}", current.emulator_path.display());
            println!("machines     {}", current.machines_path.display());
            println!("roms         {}", current.rom_dir().display());
            println!("custom roms  {}", current.custom_roms);
            println!("appearance   {}", current.appearance);
        }
        ConfigCommand::Set {
            emulator,
            machines,
            roms,
            custom_roms,
        } => {
            settings
                .update(|s| {
                    if let Some(path) = emulator {
                        s.emulator_path = path.clone();
                    }
                    if let Some(path) = machines {
                        s.machines_path = path.clone();
                    }
                    if let Some(path) = roms {
                        s.roms_path = path.clone();
                        s.custom_roms = true;
                    }
                    if let Some(flag) = custom_roms {
                        s.custom_roms = *flag;
                    }
                })
                .map_err(alert_error)?;
            println!("Settings saved to {}", settings.path().display());
        }
    }
    Ok(())
}

async fn find(library: &MachineLibrary, name: &str) -> Result<Machine> {
    library
        .get_by_name(name)
        .await
        .ok_or_else(|| alert_error(LauncherError::MachineNotFound { name: name.into() }))
}

/// Show a confirmable alert and read the answer from stdin.
fn confirm(alert: &Alert) -> Result<bool> {
    println!("{}", alert.title);
    println!("{}", alert.message);
    print!("Type y to confirm: ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

/// Convert a library error into the single user-facing alert channel.
fn alert_error(err: LauncherError) -> anyhow::Error {
    let alert = err.to_alert();
    anyhow!("{}: {}", alert.title, alert.message)
}
