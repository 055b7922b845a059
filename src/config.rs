//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for pdp-probe, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults for a local WebDriver + local VLM setup
//! - A process-wide cached copy read on first access
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PDP_PROBE_TARGET_URL` | Product page to test when no URL argument is given | *(none)* |
//! | `PDP_PROBE_CATALOG` | Path to the test catalog JSON | `catalogs/pdp_tests.json` |
//! | `PDP_PROBE_OUTPUT_DIR` | Directory for generated scripts and reports | `generated-tests` |
//! | `PDP_PROBE_WEBDRIVER_URL` | WebDriver server URL | `http://localhost:4444` |
//! | `PDP_PROBE_HEADLESS` | Run the browser headless | `true` |
//! | `PDP_PROBE_VLM_ENDPOINT` | VLM API endpoint URL | `http://127.0.0.1:8080/v1/chat/completions` |
//! | `PDP_PROBE_VLM_MODEL` | Model name for VLM | `qwen3` |
//! | `PDP_PROBE_VLM_MAX_TOKENS` | Maximum tokens in VLM response | `800` |
//! | `PDP_PROBE_VLM_TIMEOUT` | VLM activity timeout in seconds | `60` |
//! | `PDP_PROBE_VLM_CONNECT_TIMEOUT` | VLM connection timeout in seconds | `10` |
//! | `PDP_PROBE_PAGE_LOAD_TIMEOUT_MS` | Bound on the navigation idle wait | `30000` |
//! | `PDP_PROBE_LOCATOR_TIMEOUT_MS` | Bound on polling a target's structural locators, and on action targets appearing | `2000` |
//! | `PDP_PROBE_SETTLE_MS` | Fixed wait after a mutating action | `1500` |
//!
//! # Example
//!
//! ```bash
//! export PDP_PROBE_VLM_ENDPOINT="http://localhost:11434/v1/chat/completions"
//! export PDP_PROBE_VLM_MODEL="llava"
//! export PDP_PROBE_WEBDRIVER_URL="http://localhost:9515"
//! ```

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default catalog location, relative to the working directory
pub const DEFAULT_CATALOG_PATH: &str = "catalogs/pdp_tests.json";

/// Default output directory for generated scripts
pub const DEFAULT_OUTPUT_DIR: &str = "generated-tests";

/// Default WebDriver server (geckodriver's default port)
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Default VLM API endpoint
pub const DEFAULT_VLM_ENDPOINT: &str = "http://127.0.0.1:8080/v1/chat/completions";

/// Default VLM model name
pub const DEFAULT_VLM_MODEL: &str = "qwen3";

/// Default max tokens for VLM responses
pub const DEFAULT_VLM_MAX_TOKENS: u32 = 800;

/// Default VLM connection timeout (seconds)
pub const DEFAULT_VLM_CONNECT_TIMEOUT: u64 = 10;

/// Default VLM activity timeout (seconds)
pub const DEFAULT_VLM_ACTIVITY_TIMEOUT: u64 = 60;

/// Default bound on waiting for the page to become idle (milliseconds)
pub const DEFAULT_PAGE_LOAD_TIMEOUT_MS: u64 = 30_000;

/// Default bound on structural locator polling per target (milliseconds)
pub const DEFAULT_LOCATOR_TIMEOUT_MS: u64 = 2_000;

/// Default wait after clicks that mutate page state (milliseconds)
pub const DEFAULT_SETTLE_MS: u64 = 1_500;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_TARGET_URL: &str = "PDP_PROBE_TARGET_URL";
pub const ENV_CATALOG: &str = "PDP_PROBE_CATALOG";
pub const ENV_OUTPUT_DIR: &str = "PDP_PROBE_OUTPUT_DIR";
pub const ENV_WEBDRIVER_URL: &str = "PDP_PROBE_WEBDRIVER_URL";
pub const ENV_HEADLESS: &str = "PDP_PROBE_HEADLESS";
pub const ENV_VLM_ENDPOINT: &str = "PDP_PROBE_VLM_ENDPOINT";
pub const ENV_VLM_MODEL: &str = "PDP_PROBE_VLM_MODEL";
pub const ENV_VLM_MAX_TOKENS: &str = "PDP_PROBE_VLM_MAX_TOKENS";
pub const ENV_VLM_CONNECT_TIMEOUT: &str = "PDP_PROBE_VLM_CONNECT_TIMEOUT";
pub const ENV_VLM_ACTIVITY_TIMEOUT: &str = "PDP_PROBE_VLM_TIMEOUT";
pub const ENV_PAGE_LOAD_TIMEOUT: &str = "PDP_PROBE_PAGE_LOAD_TIMEOUT_MS";
pub const ENV_LOCATOR_TIMEOUT: &str = "PDP_PROBE_LOCATOR_TIMEOUT_MS";
pub const ENV_SETTLE: &str = "PDP_PROBE_SETTLE_MS";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for pdp-probe
#[derive(Debug, Clone)]
pub struct Config {
    /// VLM configuration
    pub vlm: VlmSettings,
    /// Browser session configuration
    pub browser: BrowserSettings,
    /// Run and artifact configuration
    pub run: RunSettings,
}

/// VLM-related settings
#[derive(Debug, Clone)]
pub struct VlmSettings {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Connection timeout (seconds)
    pub connect_timeout: u64,
    /// Activity timeout during streaming (seconds)
    pub activity_timeout: u64,
}

/// Browser-related settings
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// WebDriver server URL
    pub webdriver_url: String,
    /// Whether to run without a visible window
    pub headless: bool,
    /// Bound on the post-navigation idle wait (milliseconds)
    pub page_load_timeout_ms: u64,
    /// Bound on structural locator polling per target (milliseconds)
    pub locator_timeout_ms: u64,
    /// Fixed wait after mutating actions (milliseconds)
    pub settle_ms: u64,
}

/// Run-level settings
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Catalog file path
    pub catalog_path: String,
    /// Output directory for generated artifacts
    pub output_dir: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            vlm: VlmSettings::from_env(),
            browser: BrowserSettings::from_env(),
            run: RunSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            vlm: VlmSettings::defaults(),
            browser: BrowserSettings::defaults(),
            run: RunSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl VlmSettings {
    /// Create VLM settings from environment variables
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var(ENV_VLM_ENDPOINT)
                .unwrap_or_else(|_| DEFAULT_VLM_ENDPOINT.to_string()),
            model: env::var(ENV_VLM_MODEL).unwrap_or_else(|_| DEFAULT_VLM_MODEL.to_string()),
            max_tokens: env_parse(ENV_VLM_MAX_TOKENS).unwrap_or(DEFAULT_VLM_MAX_TOKENS),
            connect_timeout: env_parse(ENV_VLM_CONNECT_TIMEOUT)
                .unwrap_or(DEFAULT_VLM_CONNECT_TIMEOUT),
            activity_timeout: env_parse(ENV_VLM_ACTIVITY_TIMEOUT)
                .unwrap_or(DEFAULT_VLM_ACTIVITY_TIMEOUT),
        }
    }

    /// Create VLM settings with defaults
    pub fn defaults() -> Self {
        Self {
            endpoint: DEFAULT_VLM_ENDPOINT.to_string(),
            model: DEFAULT_VLM_MODEL.to_string(),
            max_tokens: DEFAULT_VLM_MAX_TOKENS,
            connect_timeout: DEFAULT_VLM_CONNECT_TIMEOUT,
            activity_timeout: DEFAULT_VLM_ACTIVITY_TIMEOUT,
        }
    }
}

impl BrowserSettings {
    /// Create browser settings from environment variables
    pub fn from_env() -> Self {
        Self {
            webdriver_url: env::var(ENV_WEBDRIVER_URL)
                .unwrap_or_else(|_| DEFAULT_WEBDRIVER_URL.to_string()),
            headless: env::var(ENV_HEADLESS)
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(true),
            page_load_timeout_ms: env_parse(ENV_PAGE_LOAD_TIMEOUT)
                .unwrap_or(DEFAULT_PAGE_LOAD_TIMEOUT_MS),
            locator_timeout_ms: env_parse(ENV_LOCATOR_TIMEOUT)
                .unwrap_or(DEFAULT_LOCATOR_TIMEOUT_MS),
            settle_ms: env_parse(ENV_SETTLE).unwrap_or(DEFAULT_SETTLE_MS),
        }
    }

    /// Create browser settings with defaults
    pub fn defaults() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            page_load_timeout_ms: DEFAULT_PAGE_LOAD_TIMEOUT_MS,
            locator_timeout_ms: DEFAULT_LOCATOR_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }
}

impl RunSettings {
    /// Create run settings from environment variables
    pub fn from_env() -> Self {
        Self {
            catalog_path: env::var(ENV_CATALOG).unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string()),
            output_dir: env::var(ENV_OUTPUT_DIR).unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
        }
    }

    /// Create run settings with defaults
    pub fn defaults() -> Self {
        Self {
            catalog_path: DEFAULT_CATALOG_PATH.to_string(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse a boolean flag value ("1", "true", "yes", "on" and their negatives)
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" YES "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.vlm.endpoint, DEFAULT_VLM_ENDPOINT);
        assert_eq!(config.vlm.model, DEFAULT_VLM_MODEL);
        assert_eq!(config.browser.webdriver_url, DEFAULT_WEBDRIVER_URL);
        assert!(config.browser.headless);
        assert_eq!(config.run.catalog_path, DEFAULT_CATALOG_PATH);
        assert_eq!(config.run.output_dir, DEFAULT_OUTPUT_DIR);
    }

    #[test]
    fn test_browser_timeouts_default() {
        let browser = BrowserSettings::defaults();
        assert_eq!(browser.settle_ms, DEFAULT_SETTLE_MS);
        assert_eq!(browser.locator_timeout_ms, DEFAULT_LOCATOR_TIMEOUT_MS);
        assert_eq!(browser.page_load_timeout_ms, DEFAULT_PAGE_LOAD_TIMEOUT_MS);
    }
}
