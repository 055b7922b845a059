//! Element location: structural candidates first, AI discovery last.

use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::registry::CheckContext;
use super::types::{CheckError, CheckResult};
use crate::vlm::VlmError;

/// Pause between structural polling rounds
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What a check is looking for
#[derive(Debug, Clone, Copy)]
pub struct Target<'t> {
    /// Human-readable intent; also the discovery instruction
    pub instruction: &'t str,
    /// Structural selectors in priority order
    pub candidates: &'t [&'t str],
}

impl<'t> Target<'t> {
    pub const fn new(instruction: &'t str, candidates: &'t [&'t str]) -> Self {
        Self { instruction, candidates }
    }
}

impl CheckContext<'_> {
    /// Find a visible element for `target`, recording one `observe` step.
    ///
    /// Structural candidates are polled in rounds until
    /// `settings.locator_timeout` is spent, so late-rendering elements are
    /// still found. Returns `Ok(None)` when neither a structural candidate nor
    /// discovery yields a visible match. Discovery faults other than AI being
    /// disabled are propagated.
    pub fn locate(&mut self, target: &Target<'_>) -> CheckResult<Option<String>> {
        if let Some(candidate) = self.poll_structural(target)? {
            self.log.observe(
                target.instruction,
                Some(candidate),
                json!({ "strategy": "structural", "visible": true }),
            );
            return Ok(Some(candidate.to_string()));
        }

        debug!(instruction = target.instruction, "structural candidates exhausted; trying discovery");
        let discovered = match self.ai.observe(&mut *self.page, target.instruction) {
            Ok(found) => found,
            Err(VlmError::Disabled) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        for element in discovered {
            // Discovered locators may be malformed; treat that as no match
            let visible = self.page.is_visible(&element.selector).unwrap_or_else(|e| {
                debug!(selector = %element.selector, error = %e, "discovered selector unusable");
                false
            });
            if visible {
                self.log.observe(
                    target.instruction,
                    Some(element.selector.as_str()),
                    json!({ "strategy": "ai", "visible": true, "description": element.description }),
                );
                return Ok(Some(element.selector));
            }
        }

        self.log.observe(target.instruction, None, json!({ "visible": false }));
        Ok(None)
    }

    fn poll_structural<'t>(&mut self, target: &Target<'t>) -> CheckResult<Option<&'t str>> {
        let mut waited = Duration::ZERO;
        loop {
            for candidate in target.candidates {
                if self.page.is_visible(candidate)? {
                    return Ok(Some(*candidate));
                }
            }
            if waited >= self.settings.locator_timeout {
                return Ok(None);
            }
            let pause = POLL_INTERVAL.min(self.settings.locator_timeout - waited);
            self.page.wait(pause);
            waited += pause;
        }
    }

    /// Locate `target` or fail the check with an assertion mismatch
    pub fn require_visible(&mut self, target: &Target<'_>, what: &str) -> CheckResult<String> {
        match self.locate(target)? {
            Some(selector) => Ok(selector),
            None => {
                let message = format!("{} is visible", what);
                self.log.assertion(message.as_str(), None, json!(false));
                Err(CheckError::assertion(message, "visible element", "no visible match"))
            }
        }
    }

    /// Record an `assert` step for `condition`, failing the check when false
    pub fn ensure(
        &mut self,
        condition: bool,
        instruction: &str,
        selector: Option<&str>,
        expected: &str,
        actual: impl Into<String>,
    ) -> CheckResult<()> {
        let actual = actual.into();
        self.log.assertion(
            instruction,
            selector,
            json!({ "passed": condition, "expected": expected, "actual": actual }),
        );
        if condition {
            Ok(())
        } else {
            Err(CheckError::assertion(instruction, expected, actual))
        }
    }
}
