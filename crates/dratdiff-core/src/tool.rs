//! External tools and the command lines used to invoke them.

use crate::config::{tool_label, HarnessConfig};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Flag putting the checker under test in validation mode.
pub const VALIDATION_FLAG: &str = "-m";

/// The four external roles the harness drives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// cargo build --release
    Build,

    /// <solver> -certified -certified-output=<cert> <instance>
    Solver,

    /// <reference> <instance> <cert>
    Reference,

    /// <under_test> <instance> <cert> -m
    UnderTest,
}

impl Tool {
    /// Get the role name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Build => "build",
            Tool::Solver => "solver",
            Tool::Reference => "reference",
            Tool::UnderTest => "under_test",
        }
    }
}

/// A fully resolved invocation of one external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Role of the tool in the pipeline.
    pub tool: Tool,

    /// Short display name, e.g. `drat-trim`.
    pub label: String,

    /// Executable.
    pub program: PathBuf,

    /// Arguments following the executable.
    pub args: Vec<OsString>,

    /// Capture stdout/stderr instead of passing them through.
    pub capture_output: bool,

    /// Kill the tool after this long.
    pub timeout: Option<Duration>,
}

impl ToolCommand {
    /// Release build of the checker under test. Output is passed through and
    /// no timeout applies.
    pub fn build(config: &HarnessConfig) -> Self {
        let (program, args) = match config.build_command.split_first() {
            Some((program, args)) => (
                PathBuf::from(program),
                args.iter().map(OsString::from).collect(),
            ),
            None => (PathBuf::new(), Vec::new()),
        };
        Self {
            tool: Tool::Build,
            label: config.build_command.join(" "),
            program,
            args,
            capture_output: false,
            timeout: None,
        }
    }

    /// Solver run writing its certificate to the shared scratch path.
    pub fn solve(config: &HarnessConfig, instance: &Path) -> Self {
        let mut output_flag = OsString::from("-certified-output=");
        output_flag.push(config.certificate.as_os_str());
        Self {
            tool: Tool::Solver,
            label: tool_label(&config.solver),
            program: config.solver.clone(),
            args: vec![
                OsString::from("-certified"),
                output_flag,
                instance.as_os_str().to_owned(),
            ],
            capture_output: true,
            timeout: config.timeout(),
        }
    }

    /// Reference checker run over the instance and certificate.
    pub fn reference_check(config: &HarnessConfig, instance: &Path) -> Self {
        Self {
            tool: Tool::Reference,
            label: config.reference_label(),
            program: config.reference.clone(),
            args: vec![
                instance.as_os_str().to_owned(),
                config.certificate.as_os_str().to_owned(),
            ],
            capture_output: true,
            timeout: config.timeout(),
        }
    }

    /// Checker under test run in validation mode.
    pub fn check_under_test(config: &HarnessConfig, instance: &Path) -> Self {
        Self {
            tool: Tool::UnderTest,
            label: config.under_test_label(),
            program: config.under_test.clone(),
            args: vec![
                instance.as_os_str().to_owned(),
                config.certificate.as_os_str().to_owned(),
                OsString::from(VALIDATION_FLAG),
            ],
            capture_output: true,
            timeout: config.timeout(),
        }
    }

    /// Command line as lossy strings, for logging.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}
