//! Test execution.
//!
//! `Executor::execute` dispatches a catalog entry through the
//! [`CheckRegistry`], records every observable step, and seals the outcome
//! into a [`TestResult`]. Faults never escape: they become `fail` or `error`
//! results with the partial step log preserved.

pub mod checks;
pub mod locate;
pub mod registry;
pub mod types;

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::browser::Page;
use crate::capability::CapabilityTokenSet;
use crate::catalog::CatalogEntry;
use crate::collaborator::AiCollaborator;

pub use locate::Target;
pub use registry::{CheckContext, CheckFn, CheckRegistry, ExecutorSettings, Lookup};
pub use types::{
    CheckError, CheckResult, ExecutionStep, RunClock, StepAction, StepLog, TestResult, TestStatus,
};

/// Runs catalog entries one at a time against a shared page
#[derive(Debug, Clone)]
pub struct Executor {
    registry: CheckRegistry,
    settings: ExecutorSettings,
    clock: RunClock,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(CheckRegistry::builtin(), ExecutorSettings::default())
    }
}

impl Executor {
    pub fn new(registry: CheckRegistry, settings: ExecutorSettings) -> Self {
        Self {
            registry,
            settings,
            clock: RunClock::start(),
        }
    }

    /// Share a time origin with the rest of the run
    pub fn with_clock(mut self, clock: RunClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Execute one entry. Single attempt, no retry.
    pub fn execute(
        &self,
        entry: &CatalogEntry,
        page: &mut dyn Page,
        ai: &mut dyn AiCollaborator,
        tokens: &CapabilityTokenSet,
    ) -> TestResult {
        let started = Instant::now();
        let mut log = StepLog::new(self.clock);

        let check: CheckFn = match self.registry.lookup(&entry.category, &entry.id) {
            Lookup::Registered(check) => check,
            Lookup::UnknownCategory => {
                debug!(id = %entry.id, category = %entry.category, "no procedure for category; using generic check");
                checks::generic_check
            }
            Lookup::Unregistered => {
                warn!(id = %entry.id, category = %entry.category, "no check registered");
                return TestResult {
                    test_id: entry.id.clone(),
                    status: TestStatus::Skipped,
                    duration: started.elapsed(),
                    error: Some(format!("no check registered for {}/{}", entry.category, entry.id)),
                    execution_log: Vec::new(),
                };
            }
        };

        let outcome = {
            let mut ctx = CheckContext {
                entry,
                page,
                ai,
                log: &mut log,
                tokens,
                settings: &self.settings,
            };
            check(&mut ctx)
        };

        let (status, error) = match outcome {
            Ok(()) => (TestStatus::Pass, None),
            Err(e) if e.is_assertion() => (TestStatus::Fail, Some(e.to_string())),
            Err(e) => (TestStatus::Error, Some(e.to_string())),
        };
        let duration = started.elapsed();
        info!(id = %entry.id, %status, steps = log.len(), ?duration, "test finished");

        TestResult {
            test_id: entry.id.clone(),
            status,
            duration,
            error,
            execution_log: log.into_steps(),
        }
    }
}
