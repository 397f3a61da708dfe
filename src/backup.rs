//! Timestamped snapshots of the configuration store
//!
//! Backups are byte-for-byte copies named by a one-second timestamp plus a
//! purpose tag. Two requests inside the same second get a numeric suffix
//! instead of overwriting each other; names stay lexicographically
//! sortable by time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::constants::{storage, telemetry};
use crate::error::{Error, Result};
use crate::paths::HostPaths;
use crate::store;

/// Why a backup is being taken. Non-manual reasons tag the filename so
/// safety copies are distinguishable from user-requested ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupReason {
    Manual,
    PreReset,
    PreRestore,
}

impl BackupReason {
    fn tag(self) -> &'static str {
        match self {
            BackupReason::Manual => "",
            BackupReason::PreReset => "_pre_reset",
            BackupReason::PreRestore => "_pre_restore",
        }
    }
}

/// Identity fields extracted from a backup, for display.
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub created: DateTime<Local>,
    pub machine_id: Option<String>,
    pub mac_machine_id: Option<String>,
    pub dev_device_id: Option<String>,
    pub sqm_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    storage_file: PathBuf,
    backup_dir: PathBuf,
}

impl BackupManager {
    pub fn new(paths: &HostPaths) -> Self {
        BackupManager {
            storage_file: paths.storage_file.clone(),
            backup_dir: paths.backup_dir.clone(),
        }
    }

    /// Copy the current config file into the backup directory.
    /// `NotFound` when there is no config to back up.
    pub fn create(&self, reason: BackupReason) -> Result<PathBuf> {
        if !self.storage_file.exists() {
            return Err(Error::NotFound(self.storage_file.clone()));
        }
        fs::create_dir_all(&self.backup_dir).map_err(|source| Error::Write {
            path: self.backup_dir.clone(),
            source,
        })?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let base = format!("{}{timestamp}{}", storage::BACKUP_PREFIX, reason.tag());

        // Same-second requests get an incrementing suffix, never a silent
        // overwrite.
        let mut candidate = self.backup_dir.join(&base);
        let mut n = 2;
        while candidate.exists() {
            candidate = self.backup_dir.join(format!("{base}_{n}"));
            n += 1;
        }

        fs::copy(&self.storage_file, &candidate).map_err(|source| Error::Write {
            path: candidate.clone(),
            source,
        })?;
        info!(backup = %candidate.display(), reason = ?reason, "created backup");
        Ok(candidate)
    }

    /// All backups, oldest first. A missing or empty backup directory is
    /// an empty list, never an error.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(Error::Write {
                    path: self.backup_dir.clone(),
                    source,
                });
            }
        };
        let mut backups: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(storage::BACKUP_PREFIX))
            })
            .collect();
        // The fixed timestamp format makes filename order chronological.
        backups.sort();
        Ok(backups)
    }

    /// Extract the identity fields and creation time from a backup.
    /// Unparseable content is `CorruptBackup`, whose message is the
    /// user-facing result.
    pub fn inspect(&self, backup: &Path) -> Result<BackupInfo> {
        let contents =
            fs::read_to_string(backup).map_err(|err| Error::from_read(backup, err))?;
        let config: store::ConfigMap =
            serde_json::from_str(&contents).map_err(|err| Error::CorruptBackup {
                path: backup.to_path_buf(),
                message: err.to_string(),
            })?;
        let field = |key: &str| {
            config
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        };
        let created = fs::metadata(backup)
            .and_then(|metadata| metadata.modified())
            .map(DateTime::<Local>::from)
            .map_err(|err| Error::CorruptBackup {
                path: backup.to_path_buf(),
                message: err.to_string(),
            })?;
        Ok(BackupInfo {
            path: backup.to_path_buf(),
            created,
            machine_id: field(telemetry::MACHINE_ID),
            mac_machine_id: field(telemetry::MAC_MACHINE_ID),
            dev_device_id: field(telemetry::DEV_DEVICE_ID),
            sqm_id: field(telemetry::SQM_ID),
        })
    }

    /// Replace the live config file with a backup's contents.
    ///
    /// An implicit safety backup of the current state is taken first, so a
    /// restore is itself always recoverable. The replacement uses the same
    /// atomic discipline as a commit and re-applies hardening.
    pub fn restore(&self, backup: &Path) -> Result<()> {
        if !backup.exists() {
            return Err(Error::NotFound(backup.to_path_buf()));
        }
        match self.create(BackupReason::PreRestore) {
            Ok(safety) => info!(safety = %safety.display(), "saved current state before restore"),
            Err(Error::NotFound(_)) => info!("no current config to preserve before restore"),
            Err(err) => return Err(err),
        }
        let contents = fs::read(backup).map_err(|err| Error::from_read(backup, err))?;
        store::atomic_write(&self.storage_file, &contents)?;
        store::harden(&self.storage_file)?;
        info!(backup = %backup.display(), "restored backup");
        Ok(())
    }

    /// Remove a backup file. `NotFound` when it is already gone, which the
    /// contract treats as reportable, not fatal.
    pub fn delete(&self, backup: &Path) -> Result<()> {
        fs::remove_file(backup).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound(backup.to_path_buf()),
            _ => Error::Write {
                path: backup.to_path_buf(),
                source,
            },
        })?;
        info!(backup = %backup.display(), "deleted backup");
        Ok(())
    }
}
