//! Error taxonomy for the harness library.
//!
//! Tool failures are never errors here: they are folded into an abnormal
//! exit status on the [`Invocation`](crate::invoke::Invocation). Only
//! problems that prevent a batch from running surface as [`HarnessError`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot read instance directory {path}: {source}")]
    InstanceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("certificate {path}: {source}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
