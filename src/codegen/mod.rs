//! Playwright script generation from recorded execution traces.
//!
//! `generate` is a pure function of its inputs: passing results become test
//! procedures grouped into one suite per category, everything else is left
//! out. Extracted values are annotated, never re-verified.

pub mod selector;

use tracing::debug;

use crate::catalog::CatalogDocument;
use crate::executor::{ExecutionStep, StepAction, TestResult};

pub use selector::{UNCONVERTED_MARKER, convert_selector, structural_equivalent, ts_string};

/// Category used for results whose id is not in the catalog
pub const UNCATEGORIZED: &str = "uncategorized";

const HEADER: &str = "import { test, expect } from '@playwright/test';\n";

const ADD_TO_CART_LOCATOR: &str = "page.getByRole('button', { name: /add to (cart|bag)/i }).first()";

/// Render a Playwright Test script for the passing results.
pub fn generate(results: &[TestResult], catalog: &CatalogDocument, base_url: &str) -> String {
    let mut suites: Vec<(&str, Vec<&TestResult>)> = Vec::new();
    for result in results {
        let category = catalog
            .entry(&result.test_id)
            .map_or(UNCATEGORIZED, |entry| entry.category.as_str());
        let slot = match suites.iter().position(|(c, _)| *c == category) {
            Some(i) => i,
            None => {
                suites.push((category, Vec::new()));
                suites.len() - 1
            }
        };
        if result.is_pass() {
            suites[slot].1.push(result);
        }
    }

    let mut script = String::from(HEADER);
    script.push_str(&format!("\nconst baseUrl = {};\n", ts_string(base_url)));

    for (category, passing) in &suites {
        if passing.is_empty() {
            debug!(%category, "no passing results; suite omitted");
            continue;
        }
        script.push('\n');
        script.push_str(&render_suite(catalog.category_label(category), passing, catalog));
    }
    script
}

fn render_suite(label: &str, results: &[&TestResult], catalog: &CatalogDocument) -> String {
    let mut suite = format!("test.describe({}, () => {{\n", ts_string(label));
    suite.push_str("  test.beforeEach(async ({ page }) => {\n");
    suite.push_str("    await page.goto(baseUrl);\n");
    suite.push_str("    await page.waitForLoadState('networkidle');\n");
    suite.push_str("  });\n");

    for result in results {
        let name = catalog
            .entry(&result.test_id)
            .map_or(result.test_id.as_str(), |entry| entry.name.as_str());
        let title = format!("{}: {}", result.test_id, name);
        suite.push_str(&format!("\n  test({}, async ({{ page }}) => {{\n", ts_string(&title)));
        for step in &result.execution_log {
            for line in step_lines(step) {
                suite.push_str("    ");
                suite.push_str(&line);
                suite.push('\n');
            }
        }
        suite.push_str("  });\n");
    }
    suite.push_str("});\n");
    suite
}

/// Lines of TypeScript reproducing one step
fn step_lines(step: &ExecutionStep) -> Vec<String> {
    let instruction = step.instruction.as_deref().unwrap_or("");
    match step.action {
        StepAction::Observe => match &step.selector {
            Some(selector) => vec![visibility_assertion(selector, instruction)],
            None => vec![comment(&format!("observe: {}", instruction))],
        },
        StepAction::Act => act_lines(step, instruction),
        StepAction::Extract => {
            let mut lines = vec![comment(&format!("extract: {}", instruction))];
            if let Some(result) = &step.result {
                lines.push(comment(&format!("captured: {}", result)));
            }
            lines
        }
        StepAction::Assert => match (&step.selector, &step.result) {
            (Some(selector), _) => vec![visibility_assertion(selector, instruction)],
            (None, Some(result)) => vec![comment(&format!("assert: {} => {}", instruction, result))],
            (None, None) => vec![comment(&format!("assert: {}", instruction))],
        },
    }
}

fn act_lines(step: &ExecutionStep, instruction: &str) -> Vec<String> {
    let lowered = instruction.to_lowercase();
    let selector = step.selector.as_deref();

    if lowered.contains("click") {
        if is_add_to_cart_intent(&lowered) {
            return vec![format!("await {}.click(); {}", ADD_TO_CART_LOCATOR, comment(instruction))];
        }
        if let Some(selector) = selector {
            return vec![format!(
                "await page.locator({}).first().click(); {}",
                convert_selector(selector),
                comment(instruction)
            )];
        }
    }

    if lowered.contains("select") {
        let index = step
            .result
            .as_ref()
            .and_then(|r| r.get("index"))
            .and_then(|i| i.as_u64());
        if let (Some(selector), Some(index)) = (selector, index) {
            return vec![format!(
                "await page.locator({}).first().selectOption({{ index: {} }}); {}",
                convert_selector(selector),
                index,
                comment(instruction)
            )];
        }
    }

    vec![comment(&format!("act: {}", instruction))]
}

fn is_add_to_cart_intent(lowered: &str) -> bool {
    ["add to cart", "add-to-cart", "add to bag"]
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

fn visibility_assertion(selector: &str, instruction: &str) -> String {
    let line = format!(
        "await expect(page.locator({}).first()).toBeVisible();",
        convert_selector(selector)
    );
    if instruction.is_empty() {
        line
    } else {
        format!("{} {}", line, comment(instruction))
    }
}

/// Single-line `//` comment
fn comment(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if is_line_terminator(c) { ' ' } else { c })
        .collect();
    format!("// {}", flat.trim())
}

/// ECMAScript line terminators
fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}
