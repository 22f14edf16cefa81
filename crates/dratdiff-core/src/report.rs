//! Per-instance reports and the batch summary.
//!
//! Reports render to the console format
//!
//! ```text
//! -- 'php-5.cnf'
//!     created certificate in 0.0213s
//!     refutation successfully validated
//!     ratify took 0.0042s
//!     drat-trim took 0.0051s
//!     OK
//! ```
//!
//! and serialize to one JSON object per line for `--json` output.

use crate::error::Result;
use crate::invoke::Invocation;
use crate::verdict::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Outcome of the three-stage pipeline for one instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceReport {
    /// File name of the instance.
    pub instance: String,

    /// Full instance path.
    pub path: PathBuf,

    pub solve: Invocation,
    pub reference: Invocation,
    pub under_test: Invocation,
    pub verdict: Verdict,

    /// SHA-256 of the certificate the checkers consumed, if one was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_sha256: Option<String>,
}

impl InstanceReport {
    pub fn is_ok(&self) -> bool {
        self.verdict.is_ok()
    }

    /// Serialize as a single JSON line.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for InstanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-- '{}'", self.instance)?;
        writeln!(f, "    created certificate in {}s", self.solve.duration_secs)?;
        match self.verdict.message() {
            Some(message) => {
                writeln!(f, "    {}", message)?;
                writeln!(
                    f,
                    "    {} took {}s",
                    self.under_test.label, self.under_test.duration_secs
                )?;
                writeln!(
                    f,
                    "    {} took {}s",
                    self.reference.label, self.reference.duration_secs
                )?;
                write!(f, "    OK")
            }
            None => write!(
                f,
                "    ERR: {}={} {}={}",
                self.reference.label,
                self.reference.exit_code,
                self.under_test.label,
                self.under_test.exit_code
            ),
        }
    }
}

/// Aggregate counts over one batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub instances: usize,
    pub validated: usize,
    pub rejected: usize,
    pub mismatched: usize,

    /// Exit code of the build step.
    pub build_exit_code: i32,

    /// Total duration in seconds, build step included.
    pub duration_secs: f64,
}

impl BatchSummary {
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            started_at: Utc::now(),
            instances: 0,
            validated: 0,
            rejected: 0,
            mismatched: 0,
            build_exit_code: 0,
            duration_secs: 0.0,
        }
    }

    /// Fold one instance report into the counts.
    pub fn record(&mut self, report: &InstanceReport) {
        self.instances += 1;
        match report.verdict {
            Verdict::Validated => self.validated += 1,
            Verdict::Rejected => self.rejected += 1,
            Verdict::Mismatch { .. } => self.mismatched += 1,
        }
    }

    /// Whether every instance agreed.
    pub fn all_agreed(&self) -> bool {
        self.mismatched == 0
    }

    /// Serialize as a single JSON line.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "-- {} instances: {} validated, {} rejected, {} mismatched",
            self.instances, self.validated, self.rejected, self.mismatched
        )
    }
}
