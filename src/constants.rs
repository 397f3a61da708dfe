//! Application-wide constants
//!
//! Key names, file names, and identity conventions for the host
//! application's configuration layout, collected in one place.

/// Host application identification
pub mod host {
    /// Directory name under the user configuration root
    pub const APP_DIR: &str = "Cursor";

    /// Executable names to match when stopping host processes.
    /// Matched by exact case-insensitive equality so this tool's own
    /// binary name never matches.
    pub const PROCESS_NAMES: &[&str] = &["cursor", "cursor.exe"];
}

/// Configuration store file layout
pub mod storage {
    /// Primary configuration file
    pub const FILENAME: &str = "storage.json";

    /// Sibling state file whose machineId mirrors the config file
    pub const STATE_FILENAME: &str = "state.json";

    /// Backup directory beside the configuration file
    pub const BACKUP_DIR: &str = "backups";

    /// Prefix every backup filename carries; the timestamp follows
    pub const BACKUP_PREFIX: &str = "storage.json.backup_";

    /// Key inside the state file kept in sync with the config identity
    pub const STATE_MACHINE_ID_KEY: &str = "machineId";
}

/// Identity keys inside the configuration store
pub mod telemetry {
    pub const PREFIX: &str = "telemetry.";
    pub const MACHINE_ID: &str = "telemetry.machineId";
    pub const MAC_MACHINE_ID: &str = "telemetry.macMachineId";
    pub const DEV_DEVICE_ID: &str = "telemetry.devDeviceId";
    pub const SQM_ID: &str = "telemetry.sqmId";
}

/// Auto-update policy keys and sentinel
pub mod update {
    pub const MODE: &str = "update.mode";
    pub const CHANNEL: &str = "update.channel";
    pub const ENABLE_DOWNLOAD: &str = "update.enableDownload";

    /// Value of MODE/CHANNEL when updates are enabled
    pub const ENABLED_VALUE: &str = "default";

    /// Value of MODE/CHANNEL when updates are disabled
    pub const DISABLED_VALUE: &str = "none";

    /// Sentinel file name on platforms where an empty read-only file
    /// blocks the updater
    pub const SENTINEL_FILENAME: &str = "cursor-updater";
}

/// Machine-identity encoding
pub mod identity {
    /// Literal prefix hex-encoded into every machine id
    pub const MACHINE_ID_PREFIX: &str = "auth0|user_";

    /// Total decoded length of a machine id in bytes (prefix + random)
    pub const MACHINE_ID_BYTES: usize = 32;
}
