//! Configuration store for the host's storage.json
//!
//! Mutations are merges, never replacements: keys this engine does not own
//! survive every commit verbatim. Persistence is atomic replace (write a
//! temp file in the same directory, then rename), so a crash or a
//! concurrent reader never observes a half-written file. After a commit
//! the file is hardened to read-only on Unix as a do-not-hand-edit signal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::constants::{storage, telemetry};
use crate::error::{Error, Result};
use crate::identity::IdentitySet;
use crate::paths::HostPaths;

/// Flat key/value view of the configuration file.
pub type ConfigMap = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    state_file: PathBuf,
}

impl ConfigStore {
    pub fn new(paths: &HostPaths) -> Self {
        ConfigStore {
            path: paths.storage_file.clone(),
            state_file: paths.state_file.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full mapping. `NotFound` if the file is absent,
    /// `PermissionDenied` if it exists but cannot be read,
    /// `CorruptConfig` if it is not a JSON object.
    pub fn load(&self) -> Result<ConfigMap> {
        let contents =
            fs::read_to_string(&self.path).map_err(|err| Error::from_read(&self.path, err))?;
        serde_json::from_str::<ConfigMap>(&contents).map_err(|source| Error::CorruptConfig {
            path: self.path.clone(),
            source,
        })
    }

    /// Like [`load`](Self::load) but an absent file is an empty mapping.
    pub fn load_or_default(&self) -> Result<ConfigMap> {
        match self.load() {
            Ok(map) => Ok(map),
            Err(Error::NotFound(_)) => Ok(ConfigMap::new()),
            Err(err) => Err(err),
        }
    }

    /// Overlay `updates` onto the current mapping and persist atomically.
    ///
    /// Update wins key-by-key; all other keys are preserved. On any
    /// failure the original file is untouched (the temp file is never
    /// renamed over it).
    pub fn merge_and_commit(&self, updates: ConfigMap) -> Result<()> {
        let mut config = self.load_or_default()?;
        for (key, value) in updates {
            config.insert(key, value);
        }
        write_json(&self.path, &config)?;
        info!(path = %self.path.display(), "committed configuration");
        Ok(())
    }

    /// Keys beginning with `prefix`, for display and inspection.
    pub fn read_filtered(&self, prefix: &str) -> Result<ConfigMap> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .collect())
    }

    /// Write a fresh identity set into the `telemetry.*` keys.
    ///
    /// A successful commit also syncs the sibling state file's machineId
    /// (same atomic discipline) when that file exists. The state sync is
    /// best-effort: the identity commit stands even if it fails.
    pub fn commit_identity(&self, identity: &IdentitySet) -> Result<()> {
        let mut updates = ConfigMap::new();
        updates.insert(
            telemetry::MACHINE_ID.to_owned(),
            Value::String(identity.machine_id.clone()),
        );
        updates.insert(
            telemetry::MAC_MACHINE_ID.to_owned(),
            Value::String(identity.mac_machine_id.clone()),
        );
        updates.insert(
            telemetry::DEV_DEVICE_ID.to_owned(),
            Value::String(identity.dev_device_id.clone()),
        );
        updates.insert(
            telemetry::SQM_ID.to_owned(),
            Value::String(identity.sqm_id.clone()),
        );
        self.merge_and_commit(updates)?;
        self.sync_state_file(identity);
        Ok(())
    }

    fn sync_state_file(&self, identity: &IdentitySet) {
        if !self.state_file.exists() {
            return;
        }
        let result = (|| -> Result<()> {
            let contents = fs::read_to_string(&self.state_file)
                .map_err(|err| Error::from_read(&self.state_file, err))?;
            let mut state: ConfigMap =
                serde_json::from_str(&contents).map_err(|source| Error::CorruptConfig {
                    path: self.state_file.clone(),
                    source,
                })?;
            state.insert(
                storage::STATE_MACHINE_ID_KEY.to_owned(),
                Value::String(identity.machine_id.clone()),
            );
            write_json(&self.state_file, &state)
        })();
        match result {
            Ok(()) => info!(state = %self.state_file.display(), "synced state file machineId"),
            Err(err) => {
                warn!(state = %self.state_file.display(), error = %err, "failed to sync state file")
            }
        }
    }
}

/// Serialize a mapping as 2-space-indented JSON and commit it atomically,
/// then harden the result.
pub(crate) fn write_json(path: &Path, map: &ConfigMap) -> Result<()> {
    let contents = serde_json::to_string_pretty(map).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source: io::Error::other(source),
    })?;
    atomic_write(path, contents.as_bytes())?;
    harden(path)
}

/// Write-temp-then-rename. Rename is atomic on the same filesystem, so a
/// failed write leaves the target untouched.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).map_err(|source| Error::Write {
        path: tmp.clone(),
        source,
    })?;
    let renamed = match fs::rename(&tmp, path) {
        // Windows refuses to rename over an existing file; drop the target
        // and retry.
        Err(_) if cfg!(windows) && path.exists() => {
            fs::remove_file(path).and_then(|()| fs::rename(&tmp, path))
        }
        other => other,
    };
    if let Err(source) = renamed {
        let _ = fs::remove_file(&tmp);
        return Err(Error::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Mark a committed file read-only (mode 444). No-op on platforms without
/// that convention.
pub(crate) fn harden(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o444)).map_err(|source| {
            Error::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Recursively delete cache directories. Missing directories are fine;
/// failures are returned for logging and never undo anything.
pub fn purge_caches(dirs: &[PathBuf]) -> Vec<(PathBuf, io::Error)> {
    let mut failures = Vec::new();
    for dir in dirs {
        if !dir.exists() {
            continue;
        }
        match fs::remove_dir_all(dir) {
            Ok(()) => info!(dir = %dir.display(), "purged cache directory"),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "failed to purge cache directory");
                failures.push((dir.clone(), err));
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(&HostPaths::under(dir.path()))
    }

    fn string_map(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.load(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_commit_against_absent_file_creates_exactly_those_keys() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .merge_and_commit(string_map(&[("telemetry.machineId", "X")]))
            .unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded.get("telemetry.machineId").and_then(Value::as_str),
            Some("X")
        );
    }

    #[test]
    fn test_merge_preserves_unrelated_keys() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .merge_and_commit(string_map(&[("custom.key", "kept"), ("telemetry.sqmId", "old")]))
            .unwrap();
        store
            .merge_and_commit(string_map(&[("telemetry.sqmId", "new")]))
            .unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.get("custom.key").and_then(Value::as_str), Some("kept"));
        assert_eq!(
            loaded.get("telemetry.sqmId").and_then(Value::as_str),
            Some("new")
        );
    }

    #[test]
    fn test_merge_with_empty_update_is_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .merge_and_commit(string_map(&[("a", "1"), ("b", "2")]))
            .unwrap();
        let before = store.load().unwrap();
        store.merge_and_commit(ConfigMap::new()).unwrap();
        assert_eq!(before, store.load().unwrap());
    }

    #[test]
    fn test_interrupted_write_leaves_original_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.merge_and_commit(string_map(&[("a", "1")])).unwrap();
        let original = fs::read(store.path()).unwrap();

        // Simulate a crash after the temp write but before the rename.
        let tmp = store.path().with_extension("tmp");
        fs::write(&tmp, b"{ half-written garbage").unwrap();

        assert_eq!(fs::read(store.path()).unwrap(), original);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.get("a").and_then(Value::as_str), Some("1"));
    }

    #[test]
    fn test_corrupt_file_reports_corrupt_config() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), b"not json at all").unwrap();
        assert!(matches!(store.load(), Err(Error::CorruptConfig { .. })));
    }

    #[test]
    fn test_read_filtered_returns_only_prefixed_keys() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .merge_and_commit(string_map(&[
                ("telemetry.machineId", "m"),
                ("telemetry.sqmId", "s"),
                ("update.mode", "default"),
            ]))
            .unwrap();
        let filtered = store.read_filtered("telemetry.").unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.keys().all(|k| k.starts_with("telemetry.")));
    }

    #[cfg(unix)]
    #[test]
    fn test_commit_hardens_file_to_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.merge_and_commit(string_map(&[("a", "1")])).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444);

        // A second commit must still succeed over the hardened file.
        store.merge_and_commit(string_map(&[("b", "2")])).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn test_commit_identity_syncs_existing_state_file() {
        let dir = TempDir::new().unwrap();
        let paths = HostPaths::under(dir.path());
        let store = ConfigStore::new(&paths);
        fs::create_dir_all(paths.state_file.parent().unwrap()).unwrap();
        fs::write(
            &paths.state_file,
            r#"{"machineId": "stale", "other": true}"#,
        )
        .unwrap();

        let identity = IdentitySet::generate();
        store.commit_identity(&identity).unwrap();

        let state: ConfigMap =
            serde_json::from_str(&fs::read_to_string(&paths.state_file).unwrap()).unwrap();
        assert_eq!(
            state.get("machineId").and_then(Value::as_str),
            Some(identity.machine_id.as_str())
        );
        // Unrelated state keys survive the sync.
        assert_eq!(state.get("other"), Some(&Value::Bool(true)));

        let config = store.load().unwrap();
        assert_eq!(
            config.get("telemetry.sqmId").and_then(Value::as_str),
            Some(identity.sqm_id.as_str())
        );
    }

    #[test]
    fn test_commit_identity_without_state_file_is_fine() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.commit_identity(&IdentitySet::generate()).unwrap();
        assert!(store.load().unwrap().contains_key("telemetry.machineId"));
    }

    #[test]
    fn test_purge_caches_skips_missing_dirs() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("Cache");
        fs::create_dir_all(present.join("nested")).unwrap();
        fs::write(present.join("nested").join("f"), b"x").unwrap();
        let missing = dir.path().join("Code Cache");

        let failures = purge_caches(&[present.clone(), missing]);
        assert!(failures.is_empty());
        assert!(!present.exists());
    }
}
