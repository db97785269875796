use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("keychain is closed")]
    Closed,

    #[error("keychain not initialized at {} (run `goamet-keychain init`)", .0.display())]
    NotInitialized(PathBuf),

    #[error("keychain is locked by another process ({})", .0.display())]
    Locked(PathBuf),

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt keychain data: {0}")]
    Corrupt(String),

    #[error("cannot unseal secret for {0}")]
    Unseal(String),

    #[error("keychain handle poisoned by a panicked writer")]
    Poisoned,
}

impl BackendError {
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}
