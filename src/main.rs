#![forbid(unsafe_code)]

//! Thin command-line front end over the engine. Every subcommand maps
//! onto one library operation; no engine logic lives here.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{Level as TraceLevel, warn};
use tracing_subscriber::FmtSubscriber;

use cursor_reset::{
    BackupManager, BackupReason, ConfigStore, Error, HostPaths, UpdateControl, UpdateState,
    constants, host_version, reset_identity,
};

#[derive(Parser)]
#[command(
    name = "cursor-reset",
    about = "Reset Cursor's device identity, manage config backups, control auto-update",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stop Cursor, back up the config, write a fresh identity, purge caches
    Reset,
    /// Print the current telemetry configuration
    Show,
    /// Print the detected Cursor version
    Version,
    /// Manage configuration backups
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Control Cursor's auto-update behavior
    #[command(subcommand)]
    Update(UpdateCommand),
}

#[derive(Subcommand)]
enum BackupCommand {
    /// Snapshot the current configuration
    Create,
    /// List all backups, oldest first
    List,
    /// Show a backup's identity fields and creation time
    Inspect { backup: PathBuf },
    /// Replace the live configuration with a backup
    Restore { backup: PathBuf },
    /// Delete a backup
    Delete { backup: PathBuf },
}

#[derive(Subcommand)]
enum UpdateCommand {
    /// Disable auto-update
    Disable,
    /// Re-enable auto-update
    Enable,
    /// Show whether auto-update is enabled
    Status,
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Bare filenames are resolved against the backup directory so users can
/// paste names straight from `backup list`.
fn resolve_backup(arg: &Path, paths: &HostPaths) -> PathBuf {
    if arg.is_absolute() || arg.exists() {
        arg.to_path_buf()
    } else {
        paths.backup_dir.join(arg)
    }
}

fn run_backup(command: BackupCommand, paths: &HostPaths) -> Result<()> {
    let manager = BackupManager::new(paths);
    match command {
        BackupCommand::Create => {
            let backup = manager.create(BackupReason::Manual)?;
            println!("Backup created: {}", backup.display());
        }
        BackupCommand::List => {
            let backups = manager.list()?;
            if backups.is_empty() {
                println!("No backups found");
            }
            for backup in backups {
                println!("{}", backup.display());
            }
        }
        BackupCommand::Inspect { backup } => {
            let info = manager.inspect(&resolve_backup(&backup, paths))?;
            let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "n/a".into());
            println!("Backup:       {}", info.path.display());
            println!("Created:      {}", info.created.format("%Y-%m-%d %H:%M:%S"));
            println!("machineId:    {}", field(&info.machine_id));
            println!("macMachineId: {}", field(&info.mac_machine_id));
            println!("devDeviceId:  {}", field(&info.dev_device_id));
            println!("sqmId:        {}", field(&info.sqm_id));
        }
        BackupCommand::Restore { backup } => {
            manager.restore(&resolve_backup(&backup, paths))?;
            println!("Backup restored");
        }
        BackupCommand::Delete { backup } => {
            match manager.delete(&resolve_backup(&backup, paths)) {
                Ok(()) => println!("Backup deleted"),
                // Already gone is reportable, not fatal.
                Err(Error::NotFound(path)) => {
                    println!("Backup already gone: {}", path.display());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(())
}

fn run_update(command: UpdateCommand, paths: &HostPaths) -> Result<()> {
    let control = UpdateControl::for_host(paths);
    match command {
        UpdateCommand::Disable => {
            control.disable()?;
            println!("Auto-update disabled");
        }
        UpdateCommand::Enable => {
            control.enable()?;
            println!("Auto-update enabled");
        }
        UpdateCommand::Status => {
            let state = match control.state()? {
                UpdateState::Enabled => "enabled",
                UpdateState::Disabled => "disabled",
            };
            println!("Auto-update is {state}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    let paths = HostPaths::resolve()?;

    match cli.command {
        Command::Reset => {
            let outcome = reset_identity(&paths)?;
            if !outcome.stopped_processes {
                println!("No running Cursor process found");
            }
            match &outcome.backup {
                Some(backup) => println!("Backup created: {}", backup.display()),
                None => println!("No existing config, nothing to back up"),
            }
            println!("New identity:");
            println!("  machineId:    {}", outcome.identity.machine_id);
            println!("  macMachineId: {}", outcome.identity.mac_machine_id);
            println!("  devDeviceId:  {}", outcome.identity.dev_device_id);
            println!("  sqmId:        {}", outcome.identity.sqm_id);
            for dir in &outcome.purge_failures {
                warn!(dir = %dir.display(), "cache directory was not purged");
            }
        }
        Command::Show => {
            let store = ConfigStore::new(&paths);
            match store.read_filtered(constants::telemetry::PREFIX) {
                Ok(config) => println!("{}", serde_json::to_string_pretty(&config)?),
                Err(Error::NotFound(path)) => {
                    println!("Configuration file not found: {}", path.display());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Version => match host_version(&paths) {
            Some(version) => println!("Cursor version: {version}"),
            None => println!("Cursor version: unknown"),
        },
        Command::Backup(command) => run_backup(command, &paths)?,
        Command::Update(command) => run_update(command, &paths)?,
    }
    Ok(())
}
