//! Run events and the reporters that render them.
//!
//! The pipeline only emits events; nothing it decides depends on what a
//! reporter does with them.

use std::time::Duration;

use crate::capability::Detection;
use crate::executor::{TestResult, TestStatus};

/// Progress events emitted by `run_pipeline`, in order
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Navigated { url: String },
    Detected(Detection),
    Selected { selected: Vec<String>, total: usize },
    TestStarted { index: usize, count: usize, test_id: String, name: String },
    TestFinished(TestResult),
    ScriptGenerated { suites: usize, procedures: usize },
}

/// Receiver of run events
pub trait Reporter {
    fn report(&mut self, event: &RunEvent);
}

/// Human-readable progress on stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    /// Print each step of failing tests
    pub verbose: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Reporter for ConsoleReporter {
    fn report(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Navigated { url } => println!("Loaded {}", url),
            RunEvent::Detected(detection) => {
                let tokens: Vec<_> = detection.tokens.iter().collect();
                if detection.degraded {
                    println!(
                        "Capability detection degraded ({}); running baseline tests only",
                        detection.reason.as_deref().unwrap_or("unknown reason")
                    );
                } else {
                    println!("Detected capabilities: {}", tokens.join(", "));
                }
            }
            RunEvent::Selected { selected, total } => {
                println!("Selected {} of {} tests", selected.len(), total);
            }
            RunEvent::TestStarted { index, count, test_id, name } => {
                println!("\n[{}/{}] {}: {}", index + 1, count, test_id, name);
            }
            RunEvent::TestFinished(result) => {
                println!(
                    "  {} ({}, {} steps)",
                    status_label(result.status),
                    format_duration(result.duration),
                    result.execution_log.len()
                );
                if let Some(error) = &result.error {
                    println!("    {}", error);
                }
                if self.verbose && !result.is_pass() {
                    for step in &result.execution_log {
                        println!(
                            "    {:>6}ms {:?} {} {}",
                            step.timestamp,
                            step.action,
                            step.instruction.as_deref().unwrap_or(""),
                            step.selector.as_deref().unwrap_or("")
                        );
                    }
                }
            }
            RunEvent::ScriptGenerated { suites, procedures } => {
                println!("\nGenerated {} test(s) in {} suite(s)", procedures, suites);
            }
        }
    }
}

fn status_label(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Pass => "PASS",
        TestStatus::Fail => "FAIL",
        TestStatus::Error => "ERROR",
        TestStatus::Skipped => "SKIP",
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Keeps every event, for tests and embedding callers
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    pub events: Vec<RunEvent>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, event: &RunEvent) {
        self.events.push(event.clone());
    }
}

/// Discards every event; `--json` runs use it to keep stdout clean
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn report(&mut self, _event: &RunEvent) {}
}
