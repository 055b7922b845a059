use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::browser::BrowserError;
use crate::vlm::VlmError;

/// Kind of observable step recorded during a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    /// Locating an element
    Observe,
    /// Interacting with the page (click, select)
    Act,
    /// Reading a value off the page
    Extract,
    /// Checking a condition
    Assert,
}

/// One entry in a test's execution trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Milliseconds since the run started; non-decreasing within a log
    pub timestamp: u64,
    pub action: StepAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ExecutionStep {
    pub fn new(action: StepAction) -> Self {
        Self {
            timestamp: 0,
            action,
            instruction: None,
            selector: None,
            result: None,
        }
    }

    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// Shared time origin for every log in a run
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    origin: Instant,
}

impl RunClock {
    pub fn start() -> Self {
        Self { origin: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Default for RunClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Append-only step log for one test
#[derive(Debug, Clone)]
pub struct StepLog {
    clock: RunClock,
    steps: Vec<ExecutionStep>,
}

impl StepLog {
    pub fn new(clock: RunClock) -> Self {
        Self {
            clock,
            steps: Vec::new(),
        }
    }

    /// Stamp and append a step
    pub fn push(&mut self, step: ExecutionStep) {
        let last = self.steps.last().map_or(0, |s| s.timestamp);
        let timestamp = self.clock.elapsed_ms().max(last);
        self.steps.push(step.at(timestamp));
    }

    fn record(
        &mut self,
        action: StepAction,
        instruction: impl Into<String>,
        selector: Option<&str>,
        result: Option<serde_json::Value>,
    ) {
        let mut step = ExecutionStep::new(action).instruction(instruction);
        step.selector = selector.map(str::to_string);
        step.result = result;
        self.push(step);
    }

    pub fn observe(&mut self, instruction: impl Into<String>, selector: Option<&str>, result: serde_json::Value) {
        self.record(StepAction::Observe, instruction, selector, Some(result));
    }

    pub fn act(&mut self, instruction: impl Into<String>, selector: &str, result: Option<serde_json::Value>) {
        self.record(StepAction::Act, instruction, Some(selector), result);
    }

    pub fn extract(&mut self, instruction: impl Into<String>, selector: Option<&str>, result: serde_json::Value) {
        self.record(StepAction::Extract, instruction, selector, Some(result));
    }

    pub fn assertion(&mut self, instruction: impl Into<String>, selector: Option<&str>, result: serde_json::Value) {
        self.record(StepAction::Assert, instruction, selector, Some(result));
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<ExecutionStep> {
        self.steps
    }
}

/// Verdict for one executed catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The check ran and every condition held
    Pass,
    /// A checked condition was false
    Fail,
    /// Any other fault (missing element for an action, browser or AI failure)
    Error,
    /// The category is known but no check is registered for this id
    Skipped,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Error => "error",
            TestStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Sealed outcome of one test; `error` is set iff `status` is not `Pass`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_id: String,
    pub status: TestStatus,
    #[serde(rename = "durationMs", with = "duration_millis")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_log: Vec<ExecutionStep>,
}

impl TestResult {
    /// A passing result with the given log, mainly for building fixtures
    pub fn passed(test_id: impl Into<String>, execution_log: Vec<ExecutionStep>) -> Self {
        Self {
            test_id: test_id.into(),
            status: TestStatus::Pass,
            duration: Duration::ZERO,
            error: None,
            execution_log,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == TestStatus::Pass
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Result type for check procedures
pub type CheckResult<T> = Result<T, CheckError>;

/// Faults raised while running a check
#[derive(Debug, Error)]
pub enum CheckError {
    /// A checked condition did not hold
    #[error("Assertion failed: {message} (expected {expected}, got {actual})")]
    Assertion {
        message: String,
        expected: String,
        actual: String,
    },

    /// Browser fault
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// AI collaborator fault
    #[error("AI collaborator error: {0}")]
    Ai(#[from] VlmError),
}

impl CheckError {
    pub fn assertion(
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        CheckError::Assertion {
            message: message.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Whether this fault is an expected-vs-actual mismatch (a `fail`)
    pub fn is_assertion(&self) -> bool {
        matches!(self, CheckError::Assertion { .. })
    }
}
