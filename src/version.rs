//! Host application version discovery
//!
//! The version lives in the package.json the host ships inside its
//! install directory. Installs move around between releases, so several
//! candidate locations are probed; a missing or unreadable manifest is
//! "unknown," never an error.

use std::fs;

use serde_json::Value;
use tracing::{info, warn};

use crate::paths::HostPaths;

pub fn host_version(paths: &HostPaths) -> Option<String> {
    for candidate in &paths.manifest_candidates {
        let Ok(contents) = fs::read_to_string(candidate) else {
            continue;
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(manifest) => {
                if let Some(version) = manifest.get("version").and_then(Value::as_str) {
                    info!(manifest = %candidate.display(), version, "detected host version");
                    return Some(version.to_owned());
                }
            }
            Err(err) => {
                warn!(manifest = %candidate.display(), error = %err, "unreadable host manifest")
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_reads_version_from_manifest() {
        let dir = TempDir::new().unwrap();
        let paths = HostPaths::under(dir.path());
        let manifest = &paths.manifest_candidates[0];
        fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        fs::write(manifest, r#"{"name": "cursor", "version": "0.45.2"}"#).unwrap();
        assert_eq!(host_version(&paths).as_deref(), Some("0.45.2"));
    }

    #[test]
    fn test_missing_manifest_is_unknown() {
        let dir = TempDir::new().unwrap();
        let paths = HostPaths::under(dir.path());
        assert_eq!(host_version(&paths), None);
    }

    #[test]
    fn test_manifest_without_version_key_is_unknown() {
        let dir = TempDir::new().unwrap();
        let paths = HostPaths::under(dir.path());
        let manifest = &paths.manifest_candidates[0];
        fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        fs::write(manifest, r#"{"name": "cursor"}"#).unwrap();
        assert_eq!(host_version(&paths), None);
    }
}
