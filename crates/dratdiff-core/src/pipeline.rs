//! Instance runner: solve, reference check, check under test.

use crate::build::build_checker;
use crate::certificate::ScratchCertificate;
use crate::config::HarnessConfig;
use crate::error::Result;
use crate::instance::{discover, Instance};
use crate::invoke::{Invocation, Invoker, ProcessInvoker};
use crate::report::{BatchSummary, InstanceReport};
use crate::tool::ToolCommand;
use crate::verdict::Verdict;
use futures::stream::{self, Stream, StreamExt};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lines of captured stderr kept in debug logs.
const STDERR_TAIL_LINES: usize = 5;

/// Runs the three-stage pipeline over instances, one at a time.
///
/// Owns the scratch certificate: it is removed by [`InstanceRunner::finish`]
/// or, failing that, when the runner is dropped.
pub struct InstanceRunner<I = ProcessInvoker> {
    config: HarnessConfig,
    invoker: I,
    certificate: ScratchCertificate,
}

impl InstanceRunner<ProcessInvoker> {
    /// Runner spawning real processes.
    pub fn with_processes(config: HarnessConfig) -> Result<Self> {
        Self::new(config, ProcessInvoker)
    }
}

impl<I: Invoker> InstanceRunner<I> {
    pub fn new(config: HarnessConfig, invoker: I) -> Result<Self> {
        config.validate()?;
        let certificate = ScratchCertificate::new(&config.certificate);
        Ok(Self {
            config,
            invoker,
            certificate,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Run the pipeline for a single instance.
    ///
    /// The three tools run strictly in order and each is awaited before the
    /// next starts, so the shared certificate has a single writer.
    pub async fn run_instance(&self, instance: &Instance) -> InstanceReport {
        info!(instance = %instance.path.display(), "Running instance");

        if let Err(e) = self.certificate.clear() {
            warn!(error = %e, "Could not remove previous certificate");
        }

        let solve = self
            .invoker
            .invoke(&ToolCommand::solve(&self.config, &instance.path))
            .await;
        log_invocation(&solve);

        let certificate_sha256 = match self.certificate.digest_in_background().await {
            Ok(digest) => digest,
            Err(e) => {
                warn!(error = %e, "Could not hash certificate");
                None
            }
        };
        match &certificate_sha256 {
            Some(digest) => debug!(sha256 = %digest, "Certificate written"),
            None => warn!(
                instance = %instance.path.display(),
                "Solver produced no certificate"
            ),
        }

        let reference = self
            .invoker
            .invoke(&ToolCommand::reference_check(&self.config, &instance.path))
            .await;
        log_invocation(&reference);

        let under_test = self
            .invoker
            .invoke(&ToolCommand::check_under_test(&self.config, &instance.path))
            .await;
        log_invocation(&under_test);

        let verdict = Verdict::evaluate(&reference, &under_test);
        if verdict.is_ok() {
            info!(instance = %instance.name(), verdict = ?verdict, "Checkers agree");
        } else {
            warn!(
                instance = %instance.name(),
                reference = reference.exit_code,
                under_test = under_test.exit_code,
                "Checkers disagree"
            );
        }

        InstanceReport {
            instance: instance.name(),
            path: instance.path.clone(),
            solve,
            reference,
            under_test,
            verdict,
            certificate_sha256,
        }
    }

    /// Lazily run the pipeline over `instances`, yielding one report per
    /// instance in order. Nothing runs until the stream is polled.
    pub fn run_all(&self, instances: Vec<Instance>) -> impl Stream<Item = InstanceReport> + '_ {
        stream::iter(instances)
            .then(move |instance| async move { self.run_instance(&instance).await })
    }

    /// Build the checker, then run every regular file in `dir`.
    ///
    /// `on_report` sees each report as soon as its instance finishes.
    pub async fn run_batch<F>(&self, dir: &Path, on_report: F) -> Result<BatchSummary>
    where
        F: FnMut(&InstanceReport),
    {
        self.run_batch_with_build_hook(dir, |_| {}, on_report).await
    }

    /// Like [`InstanceRunner::run_batch`], calling `on_built` once the build
    /// step has finished and before the directory is read.
    pub async fn run_batch_with_build_hook<B, F>(
        &self,
        dir: &Path,
        on_built: B,
        mut on_report: F,
    ) -> Result<BatchSummary>
    where
        B: FnOnce(&Invocation),
        F: FnMut(&InstanceReport),
    {
        let start = Instant::now();
        let mut summary = BatchSummary::new(Uuid::new_v4());
        info!(batch_id = %summary.batch_id, dir = %dir.display(), "Starting batch");

        let build = build_checker(&self.invoker, &self.config).await;
        summary.build_exit_code = build.exit_code;
        on_built(&build);

        let instances = discover(dir)?;
        info!(count = instances.len(), "Discovered instances");

        let reports = self.run_all(instances);
        futures::pin_mut!(reports);
        while let Some(report) = reports.next().await {
            summary.record(&report);
            on_report(&report);
        }

        summary.duration_secs = start.elapsed().as_secs_f64();
        info!(
            batch_id = %summary.batch_id,
            instances = summary.instances,
            mismatched = summary.mismatched,
            duration_secs = summary.duration_secs,
            "Batch finished"
        );
        Ok(summary)
    }

    /// Remove the scratch certificate at the end of the batch.
    pub fn finish(self) -> Result<()> {
        self.certificate.release()
    }
}

fn log_invocation(invocation: &Invocation) {
    debug!(
        tool = invocation.tool.name(),
        exit_code = invocation.exit_code,
        duration_secs = invocation.duration_secs,
        timed_out = invocation.timed_out,
        "Tool finished"
    );
    if let Some(error) = &invocation.error {
        warn!(tool = invocation.tool.name(), error = %error, "Tool did not exit normally");
    }
    let tail = stderr_tail(&invocation.stderr, STDERR_TAIL_LINES);
    if !tail.is_empty() {
        debug!(tool = invocation.tool.name(), stderr = %tail, "Tool stderr");
    }
}

/// Last `lines` non-empty lines of `stderr`.
fn stderr_tail(stderr: &str, lines: usize) -> String {
    let kept: Vec<&str> = stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    kept[kept.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Tool;
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Invoker answering from a table of exit codes keyed by tool, recording
    /// every call. The solver writes the certificate like a real one would.
    struct ScriptedInvoker {
        codes: HashMap<Tool, i32>,
        write_certificate: bool,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedInvoker {
        fn new(reference: i32, under_test: i32) -> Self {
            let codes = HashMap::from([
                (Tool::Build, 0),
                (Tool::Solver, 20),
                (Tool::Reference, reference),
                (Tool::UnderTest, under_test),
            ]);
            Self {
                codes,
                write_certificate: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn tools_called(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|argv| argv[0].clone())
                .collect()
        }
    }

    #[async_trait]
    impl Invoker for ScriptedInvoker {
        async fn invoke(&self, command: &ToolCommand) -> Invocation {
            self.calls.lock().unwrap().push(command.argv());
            if command.tool == Tool::Solver && self.write_certificate {
                let flag = command.args[1].to_string_lossy().into_owned();
                let path = flag.trim_start_matches("-certified-output=");
                std::fs::write(path, b"1 2 0\n0\n").unwrap();
            }
            Invocation {
                tool: command.tool,
                label: command.label.clone(),
                exit_code: self.codes[&command.tool],
                duration_secs: 0.01,
                timed_out: false,
                error: None,
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    fn config_in(dir: &Path) -> HarnessConfig {
        HarnessConfig {
            certificate: dir.join("cert.tmp"),
            build_command: vec!["build".to_string()],
            ..HarnessConfig::default()
        }
    }

    #[tokio::test]
    async fn test_run_instance_stage_order() {
        let dir = tempfile::tempdir().unwrap();
        let runner = InstanceRunner::new(config_in(dir.path()), ScriptedInvoker::new(0, 0)).unwrap();

        let report = runner.run_instance(&Instance::new("php-5.cnf")).await;
        assert_eq!(report.verdict, Verdict::Validated);
        assert!(report.certificate_sha256.is_some());
        assert_eq!(
            runner.invoker().tools_called(),
            vec!["glucose", "drat-trim", "target/release/ratify"]
        );
    }

    #[tokio::test]
    async fn test_run_instance_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let runner = InstanceRunner::new(config_in(dir.path()), ScriptedInvoker::new(1, 0)).unwrap();

        let report = runner.run_instance(&Instance::new("php-5.cnf")).await;
        assert_eq!(
            report.verdict,
            Verdict::Mismatch {
                reference: 1,
                under_test: 0
            }
        );
        assert!(!report.is_ok());
    }

    #[tokio::test]
    async fn test_missing_certificate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut invoker = ScriptedInvoker::new(1, 1);
        invoker.write_certificate = false;
        let runner = InstanceRunner::new(config_in(dir.path()), invoker).unwrap();

        let report = runner.run_instance(&Instance::new("sat.cnf")).await;
        assert!(report.certificate_sha256.is_none());
        assert_eq!(report.verdict, Verdict::Rejected);
    }

    #[tokio::test]
    async fn test_stale_certificate_removed_before_solve() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.certificate, b"stale").unwrap();
        let mut invoker = ScriptedInvoker::new(1, 1);
        invoker.write_certificate = false;
        let runner = InstanceRunner::new(config.clone(), invoker).unwrap();

        runner.run_instance(&Instance::new("sat.cnf")).await;
        assert!(!config.certificate.exists());
    }

    #[tokio::test]
    async fn test_run_batch_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let instances = dir.path().join("instances");
        std::fs::create_dir(&instances).unwrap();
        let runner = InstanceRunner::new(config_in(dir.path()), ScriptedInvoker::new(0, 0)).unwrap();

        let mut seen = 0;
        let summary = runner.run_batch(&instances, |_| seen += 1).await.unwrap();
        assert_eq!(seen, 0);
        assert_eq!(summary.instances, 0);
        // Only the build step ran.
        assert_eq!(runner.invoker().tools_called(), vec!["build"]);
        runner.finish().unwrap();
    }

    #[tokio::test]
    async fn test_run_batch_builds_once_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let instances = dir.path().join("instances");
        std::fs::create_dir(&instances).unwrap();
        for name in ["a.cnf", "b.cnf", "c.cnf"] {
            std::fs::write(instances.join(name), "p cnf 1 2\n1 0\n-1 0\n").unwrap();
        }
        let config = config_in(dir.path());
        let runner = InstanceRunner::new(config.clone(), ScriptedInvoker::new(0, 0)).unwrap();

        let mut names = Vec::new();
        let summary = runner
            .run_batch(&instances, |report| names.push(report.instance.clone()))
            .await
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["a.cnf", "b.cnf", "c.cnf"]);
        assert_eq!(summary.validated, 3);
        assert!(summary.all_agreed());

        let tools = runner.invoker().tools_called();
        assert_eq!(tools.iter().filter(|t| *t == "build").count(), 1);
        assert_eq!(tools[0], "build");
        assert_eq!(tools.len(), 1 + 3 * 3);

        assert!(config.certificate.exists());
        runner.finish().unwrap();
        assert!(!config.certificate.exists());
    }

    #[tokio::test]
    async fn test_dropping_runner_removes_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        {
            let runner =
                InstanceRunner::new(config.clone(), ScriptedInvoker::new(0, 0)).unwrap();
            runner.run_instance(&Instance::new("a.cnf")).await;
            assert!(config.certificate.exists());
        }
        assert!(!config.certificate.exists());
    }

    #[tokio::test]
    async fn test_build_hook_runs_before_reports() {
        let dir = tempfile::tempdir().unwrap();
        let instances = dir.path().join("instances");
        std::fs::create_dir(&instances).unwrap();
        std::fs::write(instances.join("a.cnf"), "p cnf 1 2\n1 0\n-1 0\n").unwrap();
        let runner = InstanceRunner::new(config_in(dir.path()), ScriptedInvoker::new(0, 0)).unwrap();

        let events = RefCell::new(Vec::new());
        runner
            .run_batch_with_build_hook(
                &instances,
                |build| events.borrow_mut().push(format!("built {}", build.exit_code)),
                |report| events.borrow_mut().push(report.instance.clone()),
            )
            .await
            .unwrap();
        assert_eq!(events.into_inner(), vec!["built 0", "a.cnf"]);
    }

    #[tokio::test]
    async fn test_run_batch_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let runner = InstanceRunner::new(config_in(dir.path()), ScriptedInvoker::new(0, 0)).unwrap();
        let result = runner.run_batch(&dir.path().join("missing"), |_| {}).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = HarnessConfig {
            build_command: vec![],
            ..HarnessConfig::default()
        };
        assert!(InstanceRunner::new(config, ScriptedInvoker::new(0, 0)).is_err());
    }

    #[test]
    fn test_stderr_tail() {
        let stderr = "c one\n\nc two\nc three\n";
        assert_eq!(stderr_tail(stderr, 2), "c two\nc three");
        assert_eq!(stderr_tail(stderr, 10), "c one\nc two\nc three");
        assert_eq!(stderr_tail("", 3), "");
    }
}
