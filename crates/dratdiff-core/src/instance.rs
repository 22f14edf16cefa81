//! Instance discovery.

use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};

/// A problem instance, identified by its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub path: PathBuf,
}

impl Instance {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File name shown in report headers.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// List the regular files directly inside `dir`, in directory iteration order.
///
/// Symlinks are followed; subdirectories and anything that is not a regular
/// file (including dangling links) are skipped.
pub fn discover(dir: &Path) -> Result<Vec<Instance>> {
    let entries = std::fs::read_dir(dir).map_err(|source| HarnessError::InstanceDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut instances = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| HarnessError::InstanceDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if std::fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
            instances.push(Instance::new(path));
        }
    }
    Ok(instances)
}
