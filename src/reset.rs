//! The identity-reset workflow
//!
//! Five ordered steps, each individually fallible:
//! stop host -> safety backup -> generate -> commit -> purge caches.
//! A stubborn process is a warning. A backup failure aborts before any
//! destructive step. A commit failure aborts with the original file
//! intact. A cache-purge failure is logged and the reset still counts as
//! succeeded - caches are regenerable, identity correctness is the goal.

use std::path::PathBuf;

use tracing::info;

use crate::backup::{BackupManager, BackupReason};
use crate::error::{Error, Result};
use crate::identity::IdentitySet;
use crate::paths::HostPaths;
use crate::process;
use crate::store::{self, ConfigStore};

/// What a completed reset did, including the non-fatal parts.
#[derive(Debug)]
pub struct ResetOutcome {
    /// Whether any host process was found and stopped
    pub stopped_processes: bool,
    /// Safety backup taken before mutation; None when there was no
    /// config file to protect
    pub backup: Option<PathBuf>,
    /// The identity now committed to disk
    pub identity: IdentitySet,
    /// Cache directories that could not be purged
    pub purge_failures: Vec<PathBuf>,
}

pub fn reset_identity(paths: &HostPaths) -> Result<ResetOutcome> {
    // The host must not be running while its files are rewritten, or it
    // may commit its in-memory view over ours on exit.
    let stopped_processes = process::stop_host_processes();

    let manager = BackupManager::new(paths);
    let backup = match manager.create(BackupReason::PreReset) {
        Ok(path) => Some(path),
        // No config file means nothing to protect; the commit below
        // creates it fresh.
        Err(Error::NotFound(_)) => {
            info!("no existing config; skipping pre-reset backup");
            None
        }
        Err(err) => return Err(err),
    };

    let identity = IdentitySet::generate();
    let config = ConfigStore::new(paths);
    config.commit_identity(&identity)?;

    let purge_failures = store::purge_caches(&paths.cache_dirs)
        .into_iter()
        .map(|(path, _)| path)
        .collect();

    info!("identity reset complete");
    Ok(ResetOutcome {
        stopped_processes,
        backup,
        identity,
        purge_failures,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_reset_rewrites_identity_and_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        let paths = HostPaths::under(dir.path());
        let config = ConfigStore::new(&paths);
        let mut seed = store::ConfigMap::new();
        seed.insert("telemetry.machineId".to_owned(), Value::String("old".into()));
        seed.insert("workbench.theme".to_owned(), Value::String("dark".into()));
        config.merge_and_commit(seed).unwrap();

        let outcome = reset_identity(&paths).unwrap();

        let loaded = config.load().unwrap();
        assert_eq!(
            loaded.get("telemetry.machineId").and_then(Value::as_str),
            Some(outcome.identity.machine_id.as_str())
        );
        assert_ne!(outcome.identity.machine_id, "old");
        assert_eq!(
            loaded.get("workbench.theme").and_then(Value::as_str),
            Some("dark")
        );
    }

    #[test]
    fn test_reset_takes_backup_of_prior_state() {
        let dir = TempDir::new().unwrap();
        let paths = HostPaths::under(dir.path());
        let config = ConfigStore::new(&paths);
        let mut seed = store::ConfigMap::new();
        seed.insert("telemetry.sqmId".to_owned(), Value::String("{OLD}".into()));
        config.merge_and_commit(seed).unwrap();
        let before = fs::read(&paths.storage_file).unwrap();

        let outcome = reset_identity(&paths).unwrap();

        let backup = outcome.backup.expect("a config existed, so a backup must");
        assert_eq!(fs::read(&backup).unwrap(), before);
        assert!(
            backup
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .contains("_pre_reset")
        );
    }

    #[test]
    fn test_reset_without_config_creates_it_and_skips_backup() {
        let dir = TempDir::new().unwrap();
        let paths = HostPaths::under(dir.path());

        let outcome = reset_identity(&paths).unwrap();

        assert!(outcome.backup.is_none());
        let config = ConfigStore::new(&paths).load().unwrap();
        assert_eq!(
            config.get("telemetry.devDeviceId").and_then(Value::as_str),
            Some(outcome.identity.dev_device_id.as_str())
        );
    }

    #[test]
    fn test_reset_syncs_state_file_and_purges_caches() {
        let dir = TempDir::new().unwrap();
        let paths = HostPaths::under(dir.path());
        let config = ConfigStore::new(&paths);
        config.merge_and_commit(store::ConfigMap::new()).unwrap();

        fs::write(&paths.state_file, r#"{"machineId": "stale"}"#).unwrap();
        for cache in &paths.cache_dirs {
            fs::create_dir_all(cache).unwrap();
            fs::write(cache.join("blob"), b"x").unwrap();
        }

        let outcome = reset_identity(&paths).unwrap();

        assert!(outcome.purge_failures.is_empty());
        for cache in &paths.cache_dirs {
            assert!(!cache.exists(), "cache not purged: {}", cache.display());
        }
        let state: store::ConfigMap =
            serde_json::from_str(&fs::read_to_string(&paths.state_file).unwrap()).unwrap();
        assert_eq!(
            state.get("machineId").and_then(Value::as_str),
            Some(outcome.identity.machine_id.as_str())
        );
    }
}
