//! Harness configuration.
//!
//! Defaults reproduce the classic setup: `glucose` emits the certificate,
//! `drat-trim` is the reference checker and the freshly built
//! `target/release/ratify` is the checker under test.

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SOLVER: &str = "glucose";
pub const DEFAULT_REFERENCE: &str = "drat-trim";
pub const DEFAULT_UNDER_TEST: &str = "target/release/ratify";
pub const DEFAULT_CERTIFICATE: &str = "cert.tmp";

/// Configuration for one harness invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Solver run in certified-refutation mode.
    pub solver: PathBuf,

    /// Trusted reference checker.
    pub reference: PathBuf,

    /// Checker under test, produced by the build command.
    pub under_test: PathBuf,

    /// Shared scratch certificate path, overwritten per instance.
    pub certificate: PathBuf,

    /// Command compiling the checker under test (first element is executable).
    pub build_command: Vec<String>,

    /// Per-invocation timeout for pipeline tools in seconds (0 = wait forever).
    pub timeout_secs: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            solver: PathBuf::from(DEFAULT_SOLVER),
            reference: PathBuf::from(DEFAULT_REFERENCE),
            under_test: PathBuf::from(DEFAULT_UNDER_TEST),
            certificate: PathBuf::from(DEFAULT_CERTIFICATE),
            build_command: vec![
                "cargo".to_string(),
                "build".to_string(),
                "--release".to_string(),
            ],
            timeout_secs: 0,
        }
    }
}

impl HarnessConfig {
    /// Reject configurations that cannot drive a batch.
    pub fn validate(&self) -> Result<()> {
        if self.build_command.is_empty() {
            return Err(HarnessError::InvalidConfig(
                "build command is empty".to_string(),
            ));
        }
        if self.certificate.as_os_str().is_empty() {
            return Err(HarnessError::InvalidConfig(
                "certificate path is empty".to_string(),
            ));
        }
        for (role, path) in [
            ("solver", &self.solver),
            ("reference", &self.reference),
            ("under_test", &self.under_test),
        ] {
            if path.as_os_str().is_empty() {
                return Err(HarnessError::InvalidConfig(format!(
                    "{} binary path is empty",
                    role
                )));
            }
        }
        Ok(())
    }

    /// Timeout applied to solver and checker invocations, if any.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Short name used for the reference checker in report lines.
    pub fn reference_label(&self) -> String {
        tool_label(&self.reference)
    }

    /// Short name used for the checker under test in report lines.
    pub fn under_test_label(&self) -> String {
        tool_label(&self.under_test)
    }
}

/// File name of a tool binary, e.g. `ratify` for `target/release/ratify`.
pub fn tool_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
