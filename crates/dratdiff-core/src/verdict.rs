//! Verdict agreement between the reference checker and the checker under test.

use crate::invoke::Invocation;
use serde::{Deserialize, Serialize};

/// Per-instance verdict.
///
/// Only exit code 0 counts as acceptance; every non-zero code (including
/// crashes and timeouts) is a rejection. Specific non-zero codes carry no
/// further meaning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Both checkers accepted the refutation.
    Validated,

    /// Both checkers rejected the refutation.
    Rejected,

    /// Exactly one checker accepted.
    Mismatch { reference: i32, under_test: i32 },
}

impl Verdict {
    /// Apply the agreement rule to the two checker outcomes.
    pub fn evaluate(reference: &Invocation, under_test: &Invocation) -> Self {
        match (reference.succeeded(), under_test.succeeded()) {
            (true, true) => Verdict::Validated,
            (false, false) => Verdict::Rejected,
            _ => Verdict::Mismatch {
                reference: reference.exit_code,
                under_test: under_test.exit_code,
            },
        }
    }

    /// Whether the checkers agreed.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Verdict::Mismatch { .. })
    }

    /// Report line for an agreeing verdict.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Verdict::Validated => Some("refutation successfully validated"),
            Verdict::Rejected => Some("refutation successfully rejected"),
            Verdict::Mismatch { .. } => None,
        }
    }
}
