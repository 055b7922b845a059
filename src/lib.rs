//! PDP Probe - AI-assisted product detail page testing.
//!
//! This crate provides:
//! - Capability detection for a live product page (one AI extraction per run)
//! - Precondition-based test selection from a JSON catalog
//! - Check execution with structural locators first and AI discovery as fallback
//! - Playwright script generation from the recorded step traces
//!
//! # Example
//!
//! ```rust,no_run
//! use pdp_probe::{
//!     CheckRegistry, ConsoleReporter, Executor, ExecutorSettings, RunOptions, VlmClient, VlmConfig,
//!     WebDriverConfig, WebDriverPage, load_catalog, run_pipeline,
//! };
//!
//! let catalog = load_catalog("catalogs/pdp_tests.json").unwrap();
//! let mut page = WebDriverPage::connect(&WebDriverConfig::default()).unwrap();
//! let mut ai = VlmClient::new(VlmConfig::default());
//! let executor = Executor::new(CheckRegistry::builtin(), ExecutorSettings::default());
//! let options = RunOptions::new("https://shop.example/products/trail-runner");
//!
//! let report = run_pipeline(&mut page, &mut ai, &catalog, &executor, &options, &mut ConsoleReporter::new()).unwrap();
//! std::fs::write("pdp.spec.ts", &report.script).unwrap();
//! ```

pub mod browser;
pub mod capability;
pub mod catalog;
pub mod codegen;
pub mod collaborator;
pub mod config;
pub mod executor;
pub mod output;
pub mod report;
pub mod runner;
pub mod selection;
pub mod vlm;

// Re-export catalog types
pub use catalog::{CatalogDocument, CatalogEntry, CatalogError, Preconditions, ProductState, load_catalog, parse_catalog};

// Re-export detection and selection
pub use capability::{CapabilityTokenSet, Detection, PageAnalysis, detect};
pub use selection::select_tests;

// Re-export browser and AI collaborators
pub use browser::{BrowserError, MockElement, MockPage, Page, WebDriverConfig, WebDriverPage};
pub use collaborator::{AiCollaborator, ObservedElement, OfflineCollaborator, ScriptedCollaborator};
pub use vlm::{VlmClient, VlmConfig, VlmError, VlmResult, check_health};

// Re-export execution and generation
pub use codegen::{convert_selector, generate};
pub use executor::{
    CheckRegistry, ExecutionStep, Executor, ExecutorSettings, StepAction, TestResult, TestStatus,
};

// Re-export pipeline, reporting and output
pub use output::{OutputDir, OutputError};
pub use report::{CollectingReporter, ConsoleReporter, Reporter, RunEvent, SilentReporter};
pub use runner::{RunError, RunOptions, RunReport, StatusCounts, run_pipeline};
