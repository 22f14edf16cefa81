//! Release build of the checker under test.

use crate::config::HarnessConfig;
use crate::invoke::{Invocation, Invoker};
use crate::tool::ToolCommand;
use tracing::{info, warn};

/// Compile the checker under test once, before any instance runs.
///
/// A failed build does not stop the batch; instance runs then exercise
/// whatever binary (if any) sits at the configured path.
pub async fn build_checker<I: Invoker + ?Sized>(invoker: &I, config: &HarnessConfig) -> Invocation {
    let command = ToolCommand::build(config);
    info!(command = %command.label, "Building checker under test");

    let result = invoker.invoke(&command).await;
    if result.succeeded() {
        info!(duration_secs = result.duration_secs, "Build finished");
    } else {
        warn!(
            exit_code = result.exit_code,
            error = result.error.as_deref().unwrap_or(""),
            binary = %config.under_test.display(),
            "Build failed, continuing with existing checker binary"
        );
    }
    result
}
