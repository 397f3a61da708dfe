//! Auto-update policy toggle
//!
//! Two mechanisms exist across host platforms: an empty read-only
//! sentinel file that blocks the updater, and three policy keys inside
//! the configuration store. The variant is chosen once from the resolved
//! host layout, not per call site. Both directions are idempotent - a
//! call that finds the desired state already in place confirms it and
//! touches nothing.

use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tracing::info;

use crate::constants::update;
use crate::error::{Error, Result};
use crate::paths::HostPaths;
use crate::store::{self, ConfigMap, ConfigStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone)]
pub enum UpdateControl {
    /// An empty read-only file at this path keeps the updater out.
    Sentinel { path: PathBuf },
    /// Policy keys written through the configuration store.
    ConfigKeys { store: ConfigStore },
}

impl UpdateControl {
    /// Pick the mechanism the host layout uses.
    pub fn for_host(paths: &HostPaths) -> Self {
        match &paths.updater_sentinel {
            Some(path) => UpdateControl::Sentinel { path: path.clone() },
            None => UpdateControl::ConfigKeys {
                store: ConfigStore::new(paths),
            },
        }
    }

    /// Side-effect-free status query. An absent file means Enabled.
    pub fn state(&self) -> Result<UpdateState> {
        match self {
            UpdateControl::Sentinel { path } => {
                let Ok(metadata) = fs::metadata(path) else {
                    return Ok(UpdateState::Enabled);
                };
                // Disabled means exists, empty, and read-only; anything
                // else is a live updater artifact.
                let disabled = metadata.len() == 0 && metadata.permissions().readonly();
                Ok(if disabled {
                    UpdateState::Disabled
                } else {
                    UpdateState::Enabled
                })
            }
            UpdateControl::ConfigKeys { store } => {
                let config = store.load_or_default()?;
                let mode = config
                    .get(update::MODE)
                    .and_then(Value::as_str)
                    .unwrap_or(update::ENABLED_VALUE);
                let channel = config
                    .get(update::CHANNEL)
                    .and_then(Value::as_str)
                    .unwrap_or(update::ENABLED_VALUE);
                let download = config
                    .get(update::ENABLE_DOWNLOAD)
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                let disabled = mode == update::DISABLED_VALUE
                    || channel == update::DISABLED_VALUE
                    || !download;
                Ok(if disabled {
                    UpdateState::Disabled
                } else {
                    UpdateState::Enabled
                })
            }
        }
    }

    pub fn disable(&self) -> Result<()> {
        if self.state()? == UpdateState::Disabled {
            info!("auto-update already disabled");
            return Ok(());
        }
        match self {
            UpdateControl::Sentinel { path } => {
                if path.exists() {
                    fs::remove_file(path).map_err(|source| Error::Write {
                        path: path.clone(),
                        source,
                    })?;
                }
                store::atomic_write(path, b"")?;
                store::harden(path)?;
                info!(sentinel = %path.display(), "auto-update disabled");
            }
            UpdateControl::ConfigKeys { store } => {
                store.merge_and_commit(policy_keys(UpdateState::Disabled))?;
                info!("auto-update disabled");
            }
        }
        Ok(())
    }

    pub fn enable(&self) -> Result<()> {
        if self.state()? == UpdateState::Enabled {
            info!("auto-update already enabled");
            return Ok(());
        }
        match self {
            UpdateControl::Sentinel { path } => {
                fs::remove_file(path).map_err(|source| Error::Write {
                    path: path.clone(),
                    source,
                })?;
                info!(sentinel = %path.display(), "auto-update enabled");
            }
            UpdateControl::ConfigKeys { store } => {
                store.merge_and_commit(policy_keys(UpdateState::Enabled))?;
                info!("auto-update enabled");
            }
        }
        Ok(())
    }
}

fn policy_keys(state: UpdateState) -> ConfigMap {
    let (value, download) = match state {
        UpdateState::Enabled => (update::ENABLED_VALUE, true),
        UpdateState::Disabled => (update::DISABLED_VALUE, false),
    };
    let mut updates = ConfigMap::new();
    updates.insert(update::MODE.to_owned(), Value::String(value.to_owned()));
    updates.insert(update::CHANNEL.to_owned(), Value::String(value.to_owned()));
    updates.insert(update::ENABLE_DOWNLOAD.to_owned(), Value::Bool(download));
    updates
}
