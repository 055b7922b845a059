use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use crate::browser::Page;
use crate::capability::CapabilityTokenSet;
use crate::catalog::CatalogEntry;
use crate::collaborator::AiCollaborator;
use crate::config;

use super::types::{CheckResult, StepLog};

/// Timing knobs for check procedures
#[derive(Debug, Clone, Copy)]
pub struct ExecutorSettings {
    /// Fixed wait after an action that mutates page state
    pub settle: Duration,
    /// How long structural candidates are polled before discovery
    pub locator_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        let browser = &config::get().browser;
        Self {
            settle: Duration::from_millis(browser.settle_ms),
            locator_timeout: Duration::from_millis(browser.locator_timeout_ms),
        }
    }
}

impl ExecutorSettings {
    /// Settings with no waits, for scripted pages
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            locator_timeout: Duration::ZERO,
        }
    }

    pub fn locator_timeout(mut self, timeout: Duration) -> Self {
        self.locator_timeout = timeout;
        self
    }
}

/// Everything a check procedure may touch while it runs
pub struct CheckContext<'a> {
    pub entry: &'a CatalogEntry,
    pub page: &'a mut dyn Page,
    pub ai: &'a mut dyn AiCollaborator,
    pub log: &'a mut StepLog,
    pub tokens: &'a CapabilityTokenSet,
    pub settings: &'a ExecutorSettings,
}

/// A registered check procedure
pub type CheckFn = fn(&mut CheckContext<'_>) -> CheckResult<()>;

/// Outcome of looking up the check for a catalog entry
#[derive(Clone, Copy)]
pub enum Lookup {
    Registered(CheckFn),
    /// The category is known but nothing is registered for this id
    Unregistered,
    /// No procedure exists for the category at all
    UnknownCategory,
}

/// Mapping from `(category, id)` to check procedure
#[derive(Clone, Default)]
pub struct CheckRegistry {
    checks: HashMap<(String, String), CheckFn>,
    categories: BTreeSet<String>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in product page checks
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        super::checks::register_builtin(&mut registry);
        registry
    }

    /// Register a check; the category becomes known
    pub fn register(&mut self, category: &str, id: &str, check: CheckFn) -> &mut Self {
        self.categories.insert(category.to_string());
        self.checks.insert((category.to_string(), id.to_string()), check);
        self
    }

    pub fn lookup(&self, category: &str, id: &str) -> Lookup {
        match self.checks.get(&(category.to_string(), id.to_string())) {
            Some(check) => Lookup::Registered(*check),
            None if self.categories.contains(category) => Lookup::Unregistered,
            None => Lookup::UnknownCategory,
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.checks.keys().collect();
        keys.sort();
        f.debug_struct("CheckRegistry")
            .field("categories", &self.categories)
            .field("checks", &keys)
            .finish()
    }
}
