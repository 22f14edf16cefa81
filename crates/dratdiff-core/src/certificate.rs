//! The shared scratch certificate.
//!
//! One path is reused for every instance; the guard removes it when the
//! batch ends, on any exit path.

use crate::error::{HarnessError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Scoped owner of the scratch certificate path.
#[derive(Debug)]
pub struct ScratchCertificate {
    path: PathBuf,
    released: bool,
}

impl ScratchCertificate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the certificate if present, so the next stage cannot observe a
    /// stale artifact.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(HarnessError::Certificate {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// SHA-256 of the current certificate, `None` when it does not exist.
    pub fn digest(&self) -> Result<Option<String>> {
        digest_file(&self.path)
    }

    /// [`ScratchCertificate::digest`] on the blocking pool, so a multi-gigabyte
    /// proof does not stall the runtime.
    pub async fn digest_in_background(&self) -> Result<Option<String>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || digest_file(&path)).await?
    }

    /// Remove the certificate at the end of a batch, reporting failures.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.clear()
    }
}

/// Stream `path` through SHA-256, `None` when it does not exist.
fn digest_file(path: &Path) -> Result<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(HarnessError::Certificate {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|source| HarnessError::Certificate {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(hex::encode(hasher.finalize())))
}

impl Drop for ScratchCertificate {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.clear() {
            Ok(()) => debug!(path = %self.path.display(), "Removed scratch certificate"),
            Err(e) => warn!(error = %e, "Failed to remove scratch certificate"),
        }
    }
}
