use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes of a reconciliation pass.
///
/// Only `main` decides which of these are fatal; during steady state the
/// coordinator logs them and abandons the cycle.
#[derive(Debug, Error)]
pub enum Error {
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("could not decode container inventory: {0}")]
    InventoryParse(String),

    #[error("managed section markers not found in {}", .path.display())]
    MarkersNotFound { path: PathBuf },

    #[error("cannot write {}: {}", .path.display(), .source)]
    WritePermissionDenied { path: PathBuf, source: io::Error },

    #[error("could not decode runtime event: {0}")]
    EventStreamDecode(String),

    #[error("hosts file I/O failed: {0}")]
    Io(#[from] io::Error),
}
