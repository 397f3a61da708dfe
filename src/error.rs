//! Error kinds shared across the engine.
//!
//! Every operation returns a structured outcome; callers match on the kind
//! to decide whether a condition is fatal (path resolution), recoverable
//! (missing file, corrupt backup), or reportable (already-deleted backup).

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The environment cannot be mapped to the required directories.
    #[error("cannot resolve host paths: {0}")]
    PathResolution(String),

    /// An expected file is absent. Often recoverable ("no backups yet").
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but reading it was refused. Distinct from
    /// [`Error::NotFound`]: a prior run hardened the file and the caller
    /// lacks the privileges the hardening assumed.
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("config file {} is not valid JSON: {source}", .path.display())]
    CorruptConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Unparseable backup content. The message is the user-facing result;
    /// the backup itself is left untouched.
    #[error("backup {} is unreadable: {message}", .path.display())]
    CorruptBackup { path: PathBuf, message: String },

    /// A file operation failed. For commits this means the atomic replace
    /// never happened and the original file is untouched.
    #[error("file operation failed on {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Classify an I/O error from a read attempt.
    pub(crate) fn from_read(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.to_path_buf()),
            _ => Error::Write {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}
