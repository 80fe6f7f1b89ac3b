//! Run orchestration
//!
//! Processes the requested scenarios sequentially at the planning stage:
//! parse, list both sides, diff, submit. Task execution overlaps across
//! scenarios through the shared pool, which is drained once after the last
//! submission. Scenario-level errors are logged and skipped; only setup
//! failures (handled in `main` before the engine runs) are fatal.

use crate::config::MirrorConfig;
use crate::core::TransferPool;
use crate::error::Result;
use crate::plan::{self, MirrorPlan, Scenario};
use crate::report::{Reporter, Severity};
use crate::storage::BackendSet;
use crate::transfer::{BackendExecutor, TransferExecutor};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// Wires planner, pool, and reporter together for one run
pub struct MirrorEngine {
    config: MirrorConfig,
    backends: BackendSet,
}

impl MirrorEngine {
    /// Build an engine over the run's configuration and opened backends
    pub fn new(config: MirrorConfig, backends: BackendSet) -> Self {
        Self { config, backends }
    }

    /// Run every configured scenario against the real backends
    pub fn run(&self, reporter: &mut Reporter) -> Result<()> {
        let executor = Arc::new(BackendExecutor::new(self.backends.clone()));
        self.run_with_executor(reporter, executor)
    }

    /// Run with an injected executor (the seam the pool tests use)
    pub fn run_with_executor(
        &self,
        reporter: &mut Reporter,
        executor: Arc<dyn TransferExecutor>,
    ) -> Result<()> {
        let mut pool =
            TransferPool::new(executor, self.config.workers, self.config.poll_interval)?;
        let next_task_id = AtomicU64::new(0);

        for directive in &self.config.scenarios {
            match self.plan_scenario(directive, &next_task_id, reporter) {
                Ok((scenario, plan)) => {
                    let label = scenario.to_string();
                    for (key, reason) in &plan.skips {
                        reporter.record_skip(&label, key, *reason);
                    }
                    reporter.log(
                        Severity::Info,
                        format!("{} object(s) to copy", plan.tasks.len()),
                    );
                    for task in plan.tasks {
                        pool.submit(task)?;
                    }
                }
                Err(e) => {
                    reporter.log(Severity::Warning, e.to_string());
                }
            }
        }

        pool.drain(reporter)?;
        pool.shutdown();
        Ok(())
    }

    /// Parse, validate, list, and diff one scenario
    fn plan_scenario(
        &self,
        directive: &str,
        next_task_id: &AtomicU64,
        reporter: &mut Reporter,
    ) -> Result<(Scenario, MirrorPlan)> {
        let scenario = plan::parse_scenario(directive)?;
        reporter.begin_scenario(&scenario.to_string());

        let source = self.backends.get(scenario.source)?;
        let dest = self.backends.get(scenario.dest)?;

        let source_listing = source.list_objects(&scenario.source_container)?;
        let dest_listing = dest.list_objects(&scenario.dest_container)?;
        reporter.log(
            Severity::Debug,
            format!(
                "Source container: {} ({} objects), destination container: {} ({} objects)",
                scenario.source_container,
                source_listing.len(),
                scenario.dest_container,
                dest_listing.len(),
            ),
        );

        let plan = plan::plan(
            &scenario,
            &source_listing,
            &dest_listing,
            self.config.max_object_size,
            &self.config.staging_dir,
            next_task_id,
        );
        Ok((scenario, plan))
    }
}
