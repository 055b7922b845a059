//! The AI collaborator seam.
//!
//! Detection makes exactly one `extract` call per run; checks call `observe`
//! only after every structural candidate has failed.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::browser::Page;
use crate::vlm::{VlmError, VlmResult};

/// An element located by AI discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedElement {
    /// Locator, typically a path query (`xpath=/html/body/...`)
    pub selector: String,
    /// What the model says the element is
    pub description: String,
}

impl ObservedElement {
    pub fn new(selector: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            description: description.into(),
        }
    }
}

/// AI services the pipeline consumes
pub trait AiCollaborator {
    /// Structured extraction: answer `instruction` as JSON shaped by `schema`
    fn extract(
        &mut self,
        page: &mut dyn Page,
        instruction: &str,
        schema: &serde_json::Value,
    ) -> VlmResult<serde_json::Value>;

    /// Element discovery: candidate locators for `instruction`, best first
    fn observe(&mut self, page: &mut dyn Page, instruction: &str) -> VlmResult<Vec<ObservedElement>>;
}

/// Collaborator used when AI is switched off: every call reports `Disabled`
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCollaborator;

impl AiCollaborator for OfflineCollaborator {
    fn extract(
        &mut self,
        _page: &mut dyn Page,
        _instruction: &str,
        _schema: &serde_json::Value,
    ) -> VlmResult<serde_json::Value> {
        Err(VlmError::Disabled)
    }

    fn observe(&mut self, _page: &mut dyn Page, _instruction: &str) -> VlmResult<Vec<ObservedElement>> {
        Err(VlmError::Disabled)
    }
}

/// Collaborator with canned answers, for tests and demos.
///
/// `observe` answers are matched by case-insensitive substring of the
/// instruction; unmatched instructions discover nothing.
#[derive(Debug, Default)]
pub struct ScriptedCollaborator {
    extractions: VecDeque<VlmResult<serde_json::Value>>,
    observations: Vec<(String, Vec<ObservedElement>)>,
    failing_observe: bool,
    /// Instructions passed to `extract`, in call order
    pub extract_calls: Vec<String>,
    /// Instructions passed to `observe`, in call order
    pub observe_calls: Vec<String>,
}

impl ScriptedCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next `extract` call
    pub fn with_extraction(mut self, reply: VlmResult<serde_json::Value>) -> Self {
        self.extractions.push_back(reply);
        self
    }

    /// Answer `observe` calls mentioning `needle`
    pub fn with_observation(mut self, needle: impl Into<String>, elements: Vec<ObservedElement>) -> Self {
        self.observations.push((needle.into().to_lowercase(), elements));
        self
    }

    /// Make every `observe` call fail with an invalid-response error
    pub fn failing_observe(mut self) -> Self {
        self.failing_observe = true;
        self
    }
}

impl AiCollaborator for ScriptedCollaborator {
    fn extract(
        &mut self,
        _page: &mut dyn Page,
        instruction: &str,
        _schema: &serde_json::Value,
    ) -> VlmResult<serde_json::Value> {
        self.extract_calls.push(instruction.to_string());
        self.extractions
            .pop_front()
            .unwrap_or_else(|| Err(VlmError::InvalidResponse("no scripted extraction".to_string())))
    }

    fn observe(&mut self, _page: &mut dyn Page, instruction: &str) -> VlmResult<Vec<ObservedElement>> {
        self.observe_calls.push(instruction.to_string());
        if self.failing_observe {
            return Err(VlmError::InvalidResponse("scripted observe failure".to_string()));
        }
        let lowered = instruction.to_lowercase();
        Ok(self
            .observations
            .iter()
            .find(|(needle, _)| lowered.contains(needle.as_str()))
            .map(|(_, elements)| elements.clone())
            .unwrap_or_default())
    }
}
