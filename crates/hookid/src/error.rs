use std::path::PathBuf;

use thiserror::Error;

use crate::hooks::{BlockReason, UnknownVersion};
use crate::version::VersionQuad;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to map {path:?} into memory: {message}")]
    Mapping { path: PathBuf, message: String },

    #[error("Malformed executable image: {0}")]
    MalformedImage(String),

    #[error("Couldn't retrieve EXE version information: {0}")]
    VersionUnavailable(String),

    #[error("{kind} (version = {version:016X})")]
    UnknownVersion {
        version: VersionQuad,
        kind: UnknownVersion,
    },

    #[error("{reason} (version = {version:016X})")]
    Blocked {
        version: VersionQuad,
        reason: BlockReason,
    },

    #[error("Failed to patch memory at address {address:#010x}: {message}")]
    PatchFailed { address: usize, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Check if the build was recognised but deliberately refused
    pub fn is_blocked(&self) -> bool {
        matches!(self, Error::Blocked { .. })
    }
}
