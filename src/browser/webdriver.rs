//! WebDriver-backed page.
//!
//! fantoccini is async; the page owns a current-thread tokio runtime and
//! blocks on each command so callers stay strictly sequential.

use std::time::{Duration, Instant};

use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::{BrowserError, BrowserResult, Page, is_path_query, path_query_body};
use crate::config;

/// Interval between readiness and locator probes
const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Connection settings for a WebDriver session
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// WebDriver server URL (geckodriver, chromedriver, selenium)
    pub webdriver_url: String,
    /// Run without a visible browser window
    pub headless: bool,
    /// Window size in pixels
    pub window: (u32, u32),
    /// How long actions wait for their target to appear
    pub locator_timeout: Duration,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            webdriver_url: cfg.browser.webdriver_url.clone(),
            headless: cfg.browser.headless,
            window: (1366, 900),
            locator_timeout: Duration::from_millis(cfg.browser.locator_timeout_ms),
        }
    }
}

impl WebDriverConfig {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            ..Default::default()
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn window(mut self, width: u32, height: u32) -> Self {
        self.window = (width, height);
        self
    }

    pub fn locator_timeout(mut self, timeout: Duration) -> Self {
        self.locator_timeout = timeout;
        self
    }

    /// Capabilities for both Firefox and Chrome drivers; each ignores the
    /// other vendor's options.
    fn capabilities(&self) -> serde_json::Map<String, serde_json::Value> {
        let (width, height) = self.window;

        let mut firefox_args = vec![format!("--width={}", width), format!("--height={}", height)];
        let mut chrome_args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--window-size={},{}", width, height),
        ];
        if self.headless {
            firefox_args.push("--headless".to_string());
            chrome_args.push("--headless=new".to_string());
            chrome_args.push("--disable-gpu".to_string());
        }

        let mut caps = serde_json::Map::new();
        caps.insert("moz:firefoxOptions".to_string(), json!({ "args": firefox_args }));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args }));
        caps
    }
}

/// A live browser page driven over WebDriver
pub struct WebDriverPage {
    runtime: Runtime,
    client: Client,
    locator_timeout: Duration,
}

impl WebDriverPage {
    /// Open a new browser session
    pub fn connect(config: &WebDriverConfig) -> BrowserResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        info!(url = %config.webdriver_url, headless = config.headless, "connecting to WebDriver");
        let client = runtime
            .block_on(
                ClientBuilder::native()
                    .capabilities(config.capabilities())
                    .connect(&config.webdriver_url),
            )
            .map_err(|e| {
                BrowserError::Session(format!(
                    "cannot start session at {}: {}",
                    config.webdriver_url, e
                ))
            })?;

        Ok(Self {
            runtime,
            client,
            locator_timeout: config.locator_timeout,
        })
    }

    /// End the browser session
    pub fn close(self) -> BrowserResult<()> {
        self.runtime.block_on(self.client.close()).map_err(command_error)
    }

    fn find_all(&self, selector: &str) -> BrowserResult<Vec<Element>> {
        let client = &self.client;
        self.runtime
            .block_on(async {
                if is_path_query(selector) {
                    client.find_all(Locator::XPath(path_query_body(selector))).await
                } else {
                    client.find_all(Locator::Css(selector)).await
                }
            })
            .map_err(command_error)
    }

    fn first(&self, selector: &str) -> BrowserResult<Option<Element>> {
        Ok(self.find_all(selector)?.into_iter().next())
    }

    /// First match, polling until `locator_timeout` runs out
    fn require(&self, selector: &str) -> BrowserResult<Element> {
        let started = Instant::now();
        loop {
            if let Some(el) = self.first(selector)? {
                return Ok(el);
            }
            if started.elapsed() >= self.locator_timeout {
                return Err(BrowserError::NotFound(selector.to_string()));
            }
            std::thread::sleep(PROBE_INTERVAL);
        }
    }
}

fn command_error(err: CmdError) -> BrowserError {
    BrowserError::Command(err.to_string())
}

impl Page for WebDriverPage {
    fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        debug!(url, "navigating");
        self.runtime.block_on(self.client.goto(url)).map_err(command_error)
    }

    fn wait_for_idle(&mut self, timeout: Duration) -> BrowserResult<()> {
        let client = &self.client;
        let started = Instant::now();
        self.runtime.block_on(async {
            loop {
                let state = client
                    .execute("return document.readyState;", vec![])
                    .await
                    .map_err(command_error)?;
                if state.as_str() == Some("complete") {
                    return Ok(());
                }
                if started.elapsed() >= timeout {
                    return Err(BrowserError::Timeout(timeout, "document readyState".to_string()));
                }
                tokio::time::sleep(PROBE_INTERVAL).await;
            }
        })
    }

    fn count(&mut self, selector: &str) -> BrowserResult<usize> {
        Ok(self.find_all(selector)?.len())
    }

    fn is_visible(&mut self, selector: &str) -> BrowserResult<bool> {
        match self.first(selector)? {
            Some(el) => self.runtime.block_on(el.is_displayed()).map_err(command_error),
            None => Ok(false),
        }
    }

    fn is_enabled(&mut self, selector: &str) -> BrowserResult<bool> {
        let el = self.require(selector)?;
        self.runtime.block_on(el.is_enabled()).map_err(command_error)
    }

    fn text_content(&mut self, selector: &str) -> BrowserResult<Option<String>> {
        match self.first(selector)? {
            Some(el) => self
                .runtime
                .block_on(el.text())
                .map(Some)
                .map_err(command_error),
            None => Ok(None),
        }
    }

    fn click(&mut self, selector: &str) -> BrowserResult<()> {
        let el = self.require(selector)?;
        self.runtime.block_on(el.click()).map_err(command_error)
    }

    fn select_option(&mut self, selector: &str, index: usize) -> BrowserResult<()> {
        let el = self.require(selector)?;
        self.runtime
            .block_on(el.select_by_index(index))
            .map_err(command_error)
    }

    fn wait(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn screenshot(&mut self) -> BrowserResult<Vec<u8>> {
        self.runtime.block_on(self.client.screenshot()).map_err(command_error)
    }

    fn html(&mut self) -> BrowserResult<String> {
        self.runtime.block_on(self.client.source()).map_err(command_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_headless() {
        let config = WebDriverConfig::new("http://localhost:4444")
            .headless(true)
            .window(800, 600);
        let caps = config.capabilities();
        let chrome = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(chrome.iter().any(|a| a == "--headless=new"));
        assert!(chrome.iter().any(|a| a == "--window-size=800,600"));
        let firefox = caps["moz:firefoxOptions"]["args"].as_array().unwrap();
        assert!(firefox.iter().any(|a| a == "--headless"));
    }

    #[test]
    fn test_capabilities_headed() {
        let caps = WebDriverConfig::new("http://localhost:9515")
            .headless(false)
            .capabilities();
        let chrome = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!chrome.iter().any(|a| a == "--headless=new"));
    }
}
