//! Host filesystem layout resolution
//!
//! Pure function of OS + environment, no side effects. Every other module
//! receives a `HostPaths` instead of consulting process-wide state, so
//! tests (and callers that relocate the layout) can point the whole engine
//! at any root directory.

use std::path::{Path, PathBuf};

use crate::constants::{host, storage, update};
use crate::error::{Error, Result};

/// Absolute paths of every on-disk artifact the engine touches.
#[derive(Debug, Clone)]
pub struct HostPaths {
    /// Primary configuration file (storage.json)
    pub storage_file: PathBuf,
    /// Sibling state file whose machineId mirrors the config
    pub state_file: PathBuf,
    /// Backup directory, created on demand
    pub backup_dir: PathBuf,
    /// Cache directories purged after a reset
    pub cache_dirs: Vec<PathBuf>,
    /// Updater sentinel, present only on sentinel platforms
    pub updater_sentinel: Option<PathBuf>,
    /// Candidate locations of the host's package.json, probed in order
    pub manifest_candidates: Vec<PathBuf>,
}

impl HostPaths {
    /// Resolve the layout for the current OS and environment.
    pub fn resolve() -> Result<Self> {
        let config_root = dirs::config_dir()
            .ok_or_else(|| Error::PathResolution("no user configuration directory".into()))?;
        let app_dir = config_root.join(host::APP_DIR);
        let mut paths = Self::base(&app_dir);

        #[cfg(target_os = "macos")]
        {
            if let Some(caches) = dirs::cache_dir() {
                paths.cache_dirs.push(caches.join(host::APP_DIR));
            }
            // The sentinel sits under Application Support/Caches, not the
            // system caches directory.
            paths.updater_sentinel =
                Some(config_root.join("Caches").join(update::SENTINEL_FILENAME));
            paths.manifest_candidates = vec![PathBuf::from(
                "/Applications/Cursor.app/Contents/Resources/app/package.json",
            )];
        }

        #[cfg(target_os = "windows")]
        {
            let local = dirs::data_local_dir()
                .ok_or_else(|| Error::PathResolution("no local data directory".into()))?;
            paths.manifest_candidates = vec![
                local
                    .join("Programs")
                    .join("cursor")
                    .join("resources")
                    .join("app")
                    .join("package.json"),
                local
                    .join("cursor")
                    .join("resources")
                    .join("app")
                    .join("package.json"),
            ];
        }

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            paths.manifest_candidates = vec![
                PathBuf::from("/opt/Cursor/resources/app/package.json"),
                PathBuf::from("/usr/share/cursor/resources/app/package.json"),
            ];
        }

        Ok(paths)
    }

    /// Layout rooted at an explicit application directory.
    ///
    /// Used by tests and by callers that manage a relocated install; the
    /// sentinel and manifest live directly under the root here.
    pub fn under(root: &Path) -> Self {
        let mut paths = Self::base(root);
        paths.updater_sentinel = Some(root.join(update::SENTINEL_FILENAME));
        paths.manifest_candidates = vec![
            root.join("resources").join("app").join("package.json"),
        ];
        paths
    }

    fn base(app_dir: &Path) -> Self {
        let global_storage = app_dir.join("User").join("globalStorage");
        HostPaths {
            storage_file: global_storage.join(storage::FILENAME),
            state_file: global_storage.join(storage::STATE_FILENAME),
            backup_dir: global_storage.join(storage::BACKUP_DIR),
            cache_dirs: vec![
                app_dir.join("Cache"),
                app_dir.join("Code Cache"),
                app_dir.join("Session Storage"),
            ],
            updater_sentinel: None,
            manifest_candidates: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_places_storage_in_global_storage() {
        let paths = HostPaths::under(Path::new("/tmp/app"));
        assert_eq!(
            paths.storage_file,
            Path::new("/tmp/app/User/globalStorage/storage.json")
        );
        assert_eq!(
            paths.state_file,
            Path::new("/tmp/app/User/globalStorage/state.json")
        );
        assert_eq!(
            paths.backup_dir,
            Path::new("/tmp/app/User/globalStorage/backups")
        );
    }

    #[test]
    fn test_under_lists_cache_dirs_beside_app_root() {
        let paths = HostPaths::under(Path::new("/tmp/app"));
        assert_eq!(paths.cache_dirs.len(), 3);
        assert!(paths.cache_dirs.iter().all(|d| d.starts_with("/tmp/app")));
    }

    #[test]
    fn test_under_has_sentinel_and_manifest() {
        let paths = HostPaths::under(Path::new("/tmp/app"));
        assert_eq!(
            paths.updater_sentinel.as_deref(),
            Some(Path::new("/tmp/app/cursor-updater"))
        );
        assert_eq!(
            paths.manifest_candidates,
            vec![PathBuf::from("/tmp/app/resources/app/package.json")]
        );
    }
}
