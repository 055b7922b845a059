//! Browser abstraction for driving a product page.
//!
//! This module provides a unified interface over the page the run owns:
//! - `WebDriverPage` drives a real browser through a WebDriver server
//! - `MockPage` is a scripted in-memory page for tests and dry runs
//!
//! Selectors are either structural (CSS) or path queries (`xpath=...`, or a
//! bare `/`-rooted XPath as returned by element discovery). Every query
//! addresses the first matching element.

pub mod mock;
pub mod webdriver;

use std::time::Duration;
use thiserror::Error;

pub use mock::{MockElement, MockPage};
pub use webdriver::{WebDriverConfig, WebDriverPage};

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Errors raised by the browser collaborator
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Could not establish or keep the automation session
    #[error("Browser session error: {0}")]
    Session(String),

    /// A browser command failed
    #[error("Browser command failed: {0}")]
    Command(String),

    /// No element matched the selector
    #[error("No element matches selector `{0}`")]
    NotFound(String),

    /// A bounded wait ran out
    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(Duration, String),

    /// I/O error (runtime setup)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The capability set the runner needs from a live page.
///
/// One implementation instance is owned exclusively by a run for its whole
/// lifetime; calls are strictly sequential.
pub trait Page {
    /// Navigate to a URL
    fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// Block until the document reports it is fully loaded, bounded by `timeout`
    fn wait_for_idle(&mut self, timeout: Duration) -> BrowserResult<()>;

    /// Number of elements matching the selector
    fn count(&mut self, selector: &str) -> BrowserResult<usize>;

    /// Whether the first match exists and is displayed
    fn is_visible(&mut self, selector: &str) -> BrowserResult<bool>;

    /// Whether the first match is enabled
    fn is_enabled(&mut self, selector: &str) -> BrowserResult<bool>;

    /// Text of the first match, `None` when nothing matches
    fn text_content(&mut self, selector: &str) -> BrowserResult<Option<String>>;

    /// Click the first match
    fn click(&mut self, selector: &str) -> BrowserResult<()>;

    /// Choose the option at `index` in the first matching `<select>`
    fn select_option(&mut self, selector: &str, index: usize) -> BrowserResult<()>;

    /// Fixed-duration wait (e.g. for UI to react to a mutation)
    fn wait(&mut self, duration: Duration);

    /// PNG screenshot of the viewport
    fn screenshot(&mut self) -> BrowserResult<Vec<u8>>;

    /// Current document HTML
    fn html(&mut self) -> BrowserResult<String>;
}

/// Whether a selector is a path query rather than a structural (CSS) selector
pub fn is_path_query(selector: &str) -> bool {
    let s = selector.trim_start();
    s.starts_with("xpath=") || s.starts_with('/') || s.starts_with("(/") || s.starts_with("./")
}

/// Strip the `xpath=` engine prefix, if any
pub fn path_query_body(selector: &str) -> &str {
    let s = selector.trim_start();
    s.strip_prefix("xpath=").unwrap_or(s)
}
