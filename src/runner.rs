//! The detect -> select -> execute -> generate pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::browser::{BrowserError, Page};
use crate::capability::{Detection, detect};
use crate::catalog::CatalogDocument;
use crate::codegen::{UNCATEGORIZED, generate};
use crate::collaborator::AiCollaborator;
use crate::config;
use crate::executor::{Executor, RunClock, TestResult, TestStatus};
use crate::report::{Reporter, RunEvent};
use crate::selection::select_tests;

/// Faults that abort a run before any test executes
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Could not load {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: BrowserError,
    },
}

/// Per-run inputs
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub base_url: String,
    /// Bound on the initial page-load wait
    pub page_load_timeout: Duration,
}

impl RunOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            page_load_timeout: Duration::from_millis(config::get().browser.page_load_timeout_ms),
        }
    }

    pub fn page_load_timeout(mut self, timeout: Duration) -> Self {
        self.page_load_timeout = timeout;
        self
    }
}

/// Number of results per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pass: usize,
    pub fail: usize,
    pub error: usize,
    pub skipped: usize,
}

impl StatusCounts {
    pub fn tally(results: &[TestResult]) -> Self {
        let mut counts = Self::default();
        for result in results {
            match result.status {
                TestStatus::Pass => counts.pass += 1,
                TestStatus::Fail => counts.fail += 1,
                TestStatus::Error => counts.error += 1,
                TestStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.pass + self.fail + self.error + self.skipped
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub detection: Detection,
    /// Ids of the selected entries, in execution order
    pub selected: Vec<String>,
    pub results: Vec<TestResult>,
    pub summary: StatusCounts,
    /// Generated Playwright script
    pub script: String,
}

impl RunReport {
    /// True when every executed test passed
    pub fn all_passed(&self) -> bool {
        self.summary.pass == self.summary.total()
    }
}

/// Run the whole pipeline against one page.
///
/// Tests run sequentially in catalog order on the shared page; state one
/// test leaves behind (e.g. a filled cart) is visible to the next.
pub fn run_pipeline(
    page: &mut dyn Page,
    ai: &mut dyn AiCollaborator,
    catalog: &CatalogDocument,
    executor: &Executor,
    options: &RunOptions,
    reporter: &mut dyn Reporter,
) -> Result<RunReport, RunError> {
    let started_at = Utc::now();
    let executor = executor.clone().with_clock(RunClock::start());
    let url = options.base_url.clone();

    page.navigate(&url).map_err(|source| RunError::Navigation {
        url: url.clone(),
        source,
    })?;
    match page.wait_for_idle(options.page_load_timeout) {
        Ok(()) => {}
        Err(BrowserError::Timeout(after, what)) => {
            warn!(?after, %what, "page did not settle; continuing");
        }
        Err(source) => return Err(RunError::Navigation { url, source }),
    }
    info!(%url, "page loaded");
    reporter.report(&RunEvent::Navigated { url: url.clone() });

    let detection = detect(page, ai);
    reporter.report(&RunEvent::Detected(detection.clone()));

    let selected = select_tests(&catalog.templates, &detection.tokens);
    let selected_ids: Vec<String> = selected.iter().map(|entry| entry.id.clone()).collect();
    info!(selected = selected.len(), total = catalog.templates.len(), "tests selected");
    reporter.report(&RunEvent::Selected {
        selected: selected_ids.clone(),
        total: catalog.templates.len(),
    });

    let mut results = Vec::with_capacity(selected.len());
    for (index, entry) in selected.iter().enumerate() {
        reporter.report(&RunEvent::TestStarted {
            index,
            count: selected.len(),
            test_id: entry.id.clone(),
            name: entry.name.clone(),
        });
        let result = executor.execute(entry, page, ai, &detection.tokens);
        reporter.report(&RunEvent::TestFinished(result.clone()));
        results.push(result);
    }

    let script = generate(&results, catalog, &url);
    let (suites, procedures) = script_shape(&results, catalog);
    reporter.report(&RunEvent::ScriptGenerated { suites, procedures });

    let summary = StatusCounts::tally(&results);
    info!(
        pass = summary.pass,
        fail = summary.fail,
        error = summary.error,
        skipped = summary.skipped,
        "run finished"
    );

    Ok(RunReport {
        url,
        started_at,
        finished_at: Utc::now(),
        detection,
        selected: selected_ids,
        results,
        summary,
        script,
    })
}

/// (suites, procedures) the generated script contains
fn script_shape(results: &[TestResult], catalog: &CatalogDocument) -> (usize, usize) {
    let passing: Vec<&TestResult> = results.iter().filter(|r| r.is_pass()).collect();
    let categories: BTreeSet<&str> = passing
        .iter()
        .map(|r| catalog.entry(&r.test_id).map_or(UNCATEGORIZED, |e| e.category.as_str()))
        .collect();
    (categories.len(), passing.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MockElement, MockPage};
    use crate::collaborator::{OfflineCollaborator, ScriptedCollaborator};
    use crate::executor::{CheckRegistry, ExecutorSettings};
    use crate::report::CollectingReporter;
    use serde_json::json;

    fn catalog() -> CatalogDocument {
        serde_json::from_value(json!({
            "templates": [
                {"id": "title-visible", "name": "Title", "category": "core-product-info",
                 "preconditions": {"productState": "any"}},
                {"id": "add-to-cart-visible", "name": "Add to cart", "category": "add-to-cart",
                 "preconditions": {"productState": "in_stock"}}
            ]
        }))
        .unwrap()
    }

    fn executor() -> Executor {
        Executor::new(CheckRegistry::builtin(), ExecutorSettings::immediate())
    }

    fn options() -> RunOptions {
        RunOptions {
            base_url: "https://shop.example/p/1".into(),
            page_load_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_degraded_detection_runs_baseline_only() {
        let mut page = MockPage::new()
            .with_element("h1", MockElement::visible("Shoe"))
            .with_element("#AddToCart", MockElement::visible("Add to cart"));
        let mut ai = OfflineCollaborator;
        let mut reporter = CollectingReporter::new();

        let report =
            run_pipeline(&mut page, &mut ai, &catalog(), &executor(), &options(), &mut reporter).unwrap();

        assert!(report.detection.degraded);
        assert_eq!(report.selected, vec!["title-visible".to_string()]);
        assert_eq!(report.summary, StatusCounts { pass: 1, ..Default::default() });
        assert!(report.all_passed());
        assert_eq!(page.navigations, vec!["https://shop.example/p/1".to_string()]);
    }

    #[test]
    fn test_events_in_pipeline_order() {
        let mut page = MockPage::new()
            .with_element("h1", MockElement::visible("Shoe"))
            .with_element("#AddToCart", MockElement::visible("Add to cart"));
        let mut ai = ScriptedCollaborator::new().with_extraction(Ok(json!({
            "inStock": true, "hasVariants": false, "onSale": false,
            "hasSubscription": false, "multipleImages": false
        })));
        let mut reporter = CollectingReporter::new();

        let report =
            run_pipeline(&mut page, &mut ai, &catalog(), &executor(), &options(), &mut reporter).unwrap();

        assert_eq!(report.selected.len(), 2);
        let kinds: Vec<&str> = reporter
            .events
            .iter()
            .map(|e| match e {
                RunEvent::Navigated { .. } => "navigated",
                RunEvent::Detected(_) => "detected",
                RunEvent::Selected { .. } => "selected",
                RunEvent::TestStarted { .. } => "started",
                RunEvent::TestFinished(_) => "finished",
                RunEvent::ScriptGenerated { .. } => "generated",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["navigated", "detected", "selected", "started", "finished", "started", "finished", "generated"]
        );
        assert!(matches!(
            reporter.events.last(),
            Some(RunEvent::ScriptGenerated { suites: 2, procedures: 2 })
        ));
        assert_eq!(ai.extract_calls.len(), 1);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let mut page = MockPage::new();
        let mut ai = OfflineCollaborator;
        let mut reporter = CollectingReporter::new();
        let report =
            run_pipeline(&mut page, &mut ai, &catalog(), &executor(), &options(), &mut reporter).unwrap();

        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("startedAt").is_some());
        assert_eq!(value["summary"]["fail"], json!(1));
        assert_eq!(value["detection"]["degraded"], json!(true));
    }

    #[test]
    fn test_step_timestamps_count_from_run_start() {
        let executor = executor();
        std::thread::sleep(Duration::from_millis(300));
        let mut page = MockPage::new().with_element("h1", MockElement::visible("Shoe"));
        let mut ai = OfflineCollaborator;
        let mut reporter = CollectingReporter::new();

        let report = run_pipeline(&mut page, &mut ai, &catalog(), &executor, &options(), &mut reporter).unwrap();

        let first_step = &report.results[0].execution_log[0];
        assert!(first_step.timestamp < 300, "timestamp {}", first_step.timestamp);
    }

    #[test]
    fn test_navigation_fault_is_fatal() {
        let mut page = MockPage::new().failing_navigation("net::ERR_NAME_NOT_RESOLVED");
        let mut ai = OfflineCollaborator;
        let mut reporter = CollectingReporter::new();

        let err = run_pipeline(&mut page, &mut ai, &catalog(), &executor(), &options(), &mut reporter).unwrap_err();

        assert!(matches!(err, RunError::Navigation { .. }));
        assert!(reporter.events.is_empty());
    }

    #[test]
    fn test_idle_timeout_does_not_stop_run() {
        let mut page = MockPage::new()
            .never_idle()
            .with_element("h1", MockElement::visible("Shoe"));
        let mut ai = OfflineCollaborator;
        let mut reporter = CollectingReporter::new();

        let report =
            run_pipeline(&mut page, &mut ai, &catalog(), &executor(), &options(), &mut reporter).unwrap();

        assert_eq!(report.summary.pass, 1);
    }
}
