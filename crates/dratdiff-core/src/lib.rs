//! dratdiff - differential harness for DRAT proof checkers
//!
//! For every instance in a directory:
//! - Runs a solver in certified mode to produce a refutation certificate
//! - Checks the certificate with a trusted reference checker
//! - Checks it again with the checker under test
//! - Reports whether both checkers reached the same verdict

pub mod build;
pub mod certificate;
pub mod config;
pub mod error;
pub mod instance;
pub mod invoke;
pub mod pipeline;
pub mod report;
pub mod telemetry;
pub mod tool;
pub mod verdict;

// Re-export key types
pub use build::build_checker;
pub use certificate::ScratchCertificate;
pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use instance::{discover, Instance};
pub use invoke::{Invocation, Invoker, ProcessInvoker, ABNORMAL_EXIT};
pub use pipeline::InstanceRunner;
pub use report::{BatchSummary, InstanceReport};
pub use telemetry::init_tracing;
pub use tool::{Tool, ToolCommand};
pub use verdict::Verdict;
