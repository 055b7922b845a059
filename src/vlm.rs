//! Vision Language Model (VLM) client with streaming support.
//!
//! Provides the AI collaborator behind capability detection and element
//! discovery, speaking the OpenAI-compatible chat-completions protocol:
//! - Streaming responses (no total timeout, activity-based timeout)
//! - Non-streaming fallback for servers that ignore `stream: true`
//! - Connection health checks
//! - Structured extraction from a page screenshot
//! - Element discovery from a page HTML snapshot
//!
//! # Configuration
//!
//! VLM settings can be configured via environment variables:
//! - `PDP_PROBE_VLM_ENDPOINT`: API endpoint URL
//! - `PDP_PROBE_VLM_MODEL`: Model name
//! - `PDP_PROBE_VLM_MAX_TOKENS`: Max tokens in response
//! - `PDP_PROBE_VLM_TIMEOUT`: Activity timeout (seconds)
//! - `PDP_PROBE_VLM_CONNECT_TIMEOUT`: Connection timeout (seconds)

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::browser::Page;
use crate::collaborator::{AiCollaborator, ObservedElement};
use crate::config;

/// Upper bound on HTML characters sent for element discovery
const MAX_HTML_CHARS: usize = 60_000;

/// Result type for VLM operations
pub type VlmResult<T> = Result<T, VlmError>;

/// Errors that can occur during VLM operations
#[derive(Debug, Error)]
pub enum VlmError {
    /// Failed to connect to the VLM endpoint
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No activity for too long during streaming
    #[error("No response for {0:?}")]
    ActivityTimeout(Duration),

    /// Invalid response from the VLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Capturing page input for the model failed
    #[error("Page capture failed: {0}")]
    Page(#[from] crate::browser::BrowserError),

    /// AI calls are switched off for this run
    #[error("AI collaborator disabled")]
    Disabled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for VLM client
#[derive(Debug, Clone)]
pub struct VlmConfig {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name to use
    pub model: String,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Timeout for initial connection (seconds)
    pub connection_timeout: u64,
    /// Timeout for inactivity during streaming (seconds)
    pub activity_timeout: u64,
}

impl Default for VlmConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            endpoint: cfg.vlm.endpoint.clone(),
            model: cfg.vlm.model.clone(),
            max_tokens: cfg.vlm.max_tokens,
            connection_timeout: cfg.vlm.connect_timeout,
            activity_timeout: cfg.vlm.activity_timeout,
        }
    }
}

impl VlmConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn activity_timeout(mut self, seconds: u64) -> Self {
        self.activity_timeout = seconds;
        self
    }

    pub fn connection_timeout(mut self, seconds: u64) -> Self {
        self.connection_timeout = seconds;
        self
    }
}

/// Check if a VLM endpoint is reachable (connection-only check).
///
/// This only verifies the server accepts TCP connections - it doesn't wait
/// for a full response since VLM requests can take 30+ seconds for large images.
pub fn check_health(endpoint: &str, timeout_secs: u64) -> VlmResult<bool> {
    let url = endpoint.trim_start_matches("http://").trim_start_matches("https://");
    let host_port = url.split('/').next().unwrap_or("127.0.0.1:8080");

    let output = Command::new("curl")
        .args([
            "-s",
            "-o", "/dev/null",
            "-w", "%{http_code}",
            "--connect-timeout", &timeout_secs.to_string(),
            "--max-time", &timeout_secs.to_string(),
            "-I",
            &format!("http://{}", host_port),
        ])
        .output()?;

    let status = String::from_utf8_lossy(&output.stdout);
    // 000 means the connection failed entirely; any real status means reachable
    let code: u16 = status.trim().parse().unwrap_or(0);
    Ok(code > 0)
}

/// Chat-completions client used as the run's AI collaborator
#[derive(Debug, Clone)]
pub struct VlmClient {
    config: VlmConfig,
}

impl VlmClient {
    pub fn new(config: VlmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VlmConfig {
        &self.config
    }

    /// Send one user message and return the model's text reply
    pub fn complete(&self, content: serde_json::Value) -> VlmResult<String> {
        match self.complete_streaming(&content)? {
            Some(text) => Ok(text),
            None => self.complete_non_streaming(&content),
        }
    }

    fn request_body(&self, content: &serde_json::Value, stream: bool) -> VlmResult<String> {
        let request = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": self.config.max_tokens,
            "temperature": 0,
            "stream": stream
        });
        serde_json::to_string(&request).map_err(|e| VlmError::InvalidResponse(e.to_string()))
    }

    /// POST `body` to the endpoint through curl. The body goes over stdin:
    /// an encoded screenshot is larger than `exec` allows for one argument.
    fn spawn_curl(&self, extra_args: &[&str], body: String) -> VlmResult<Child> {
        let mut child = Command::new("curl")
            .arg("-s")
            .args(extra_args)
            .args([
                "-X", "POST",
                &self.config.endpoint,
                "-H", "Content-Type: application/json",
                "--data-binary", "@-",
                "--connect-timeout", &self.config.connection_timeout.to_string(),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VlmError::Io(std::io::Error::other("Failed to capture stdin")))?;
        // Written off-thread so a large body cannot deadlock against stdout
        thread::spawn(move || {
            if let Err(e) = stdin.write_all(body.as_bytes()) {
                debug!(error = %e, "curl closed stdin early");
            }
        });
        Ok(child)
    }

    /// Streaming request with activity timeout. `Ok(None)` means the server
    /// produced no streamed content and the caller should retry without streaming.
    fn complete_streaming(&self, content: &serde_json::Value) -> VlmResult<Option<String>> {
        let request_json = self.request_body(content, true)?;
        let mut child = self.spawn_curl(&["-N"], request_json)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VlmError::Io(std::io::Error::other("Failed to capture stdout")))?;

        let (tx, rx) = mpsc::channel();
        let activity_timeout = Duration::from_secs(self.config.activity_timeout);

        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });

        let mut full_content = String::new();
        let mut last_activity = Instant::now();

        loop {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(line)) => {
                    last_activity = Instant::now();
                    if let Some(data) = line.strip_prefix("data: ") {
                        if data == "[DONE]" {
                            break;
                        }
                        if let Ok(json) = serde_json::from_str::<serde_json::Value>(data) {
                            if let Some(delta) = json["choices"][0]["delta"]["content"].as_str() {
                                full_content.push_str(delta);
                            }
                        }
                    }
                }
                Ok(Err(e)) => {
                    let _ = child.kill();
                    return Err(VlmError::Io(e));
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if last_activity.elapsed() > activity_timeout {
                        let _ = child.kill();
                        return Err(VlmError::ActivityTimeout(activity_timeout));
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = child.wait()?;
        if !status.success() && full_content.is_empty() {
            return Err(VlmError::ConnectionFailed(format!(
                "curl exited with {} for {}",
                status, self.config.endpoint
            )));
        }

        Ok(if full_content.is_empty() { None } else { Some(full_content) })
    }

    fn complete_non_streaming(&self, content: &serde_json::Value) -> VlmResult<String> {
        let request_json = self.request_body(content, false)?;
        debug!(endpoint = %self.config.endpoint, "falling back to non-streaming request");

        let output = self.spawn_curl(&[], request_json)?.wait_with_output()?;

        if !output.status.success() {
            return Err(VlmError::ConnectionFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let response: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| VlmError::InvalidResponse(e.to_string()))?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| VlmError::InvalidResponse("response has no message content".to_string()))
    }
}

impl AiCollaborator for VlmClient {
    fn extract(
        &mut self,
        page: &mut dyn Page,
        instruction: &str,
        schema: &serde_json::Value,
    ) -> VlmResult<serde_json::Value> {
        let png = page.screenshot()?;
        let img_base64 = base64::engine::general_purpose::STANDARD.encode(&png);
        let content = serde_json::json!([
            {
                "type": "image_url",
                "image_url": { "url": format!("data:image/png;base64,{}", img_base64) }
            },
            { "type": "text", "text": build_extract_prompt(instruction, schema) }
        ]);
        let reply = self.complete(content)?;
        parse_json_reply(&reply)
    }

    fn observe(&mut self, page: &mut dyn Page, instruction: &str) -> VlmResult<Vec<ObservedElement>> {
        let html = condense_html(&page.html()?);
        let content = serde_json::json!([
            { "type": "text", "text": build_observe_prompt(instruction, &html) }
        ]);
        let reply = self.complete(content)?;
        let elements = parse_observed(&parse_json_reply(&reply)?);
        if elements.is_empty() {
            warn!(instruction, "element discovery returned no candidates");
        }
        Ok(elements)
    }
}

/// Build the prompt for a structured extraction over a page screenshot
pub fn build_extract_prompt(instruction: &str, schema: &serde_json::Value) -> String {
    format!(
        "You are inspecting a screenshot of an e-commerce product page.\n\
         {}\n\n\
         Respond with a single JSON object matching this JSON Schema and nothing else:\n{}",
        instruction,
        serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
    )
}

/// Build the prompt for element discovery over an HTML snapshot
pub fn build_observe_prompt(instruction: &str, html: &str) -> String {
    format!(
        "Find the element(s) on this product page that match: \"{}\".\n\
         Respond with JSON only, in the form \
         {{\"elements\": [{{\"selector\": \"xpath=/html/body/...\", \"description\": \"...\"}}]}}, \
         best match first. Use absolute XPath selectors, preferring predicates on \
         data-testid, id or class attributes when present.\n\nHTML:\n{}",
        instruction, html
    )
}

static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|svg)\b.*?</(script|style|noscript|svg)>")
        .expect("static regex")
});

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("static regex"));

/// Drop script/style bodies, collapse whitespace and cap the length
fn condense_html(html: &str) -> String {
    let stripped = SCRIPT_OR_STYLE.replace_all(html, "");
    let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");
    collapsed.chars().take(MAX_HTML_CHARS).collect()
}

/// Parse a model reply as JSON, tolerating markdown fences and leading prose
pub fn parse_json_reply(reply: &str) -> VlmResult<serde_json::Value> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    let start = unfenced.find(['{', '[']);
    let end = unfenced.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if e > s => serde_json::from_str(&unfenced[s..=e])
            .map_err(|err| VlmError::InvalidResponse(format!("reply is not JSON: {}", err))),
        _ => Err(VlmError::InvalidResponse(format!(
            "reply contains no JSON: {}",
            unfenced.chars().take(120).collect::<String>()
        ))),
    }
}

/// Read discovered elements from either `{"elements": [...]}` or a bare array
fn parse_observed(value: &serde_json::Value) -> Vec<ObservedElement> {
    let items = value
        .get("elements")
        .and_then(|v| v.as_array())
        .or_else(|| value.as_array());

    items
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let selector = item.get("selector")?.as_str()?.trim();
            if selector.is_empty() {
                return None;
            }
            let description = item
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or_default();
            Some(ObservedElement::new(normalize_discovered(selector), description))
        })
        .collect()
}

/// Bare `/`-rooted paths get the explicit `xpath=` engine prefix
fn normalize_discovered(selector: &str) -> String {
    if selector.starts_with('/') || selector.starts_with("(/") {
        format!("xpath={}", selector)
    } else {
        selector.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_reply_plain() {
        let value = parse_json_reply(r#"{"in_stock": true}"#).unwrap();
        assert_eq!(value["in_stock"], json!(true));
    }

    #[test]
    fn test_parse_json_reply_fenced() {
        let value = parse_json_reply("```json\n{\"on_sale\": false}\n```").unwrap();
        assert_eq!(value["on_sale"], json!(false));
    }

    #[test]
    fn test_parse_json_reply_with_prose() {
        let value = parse_json_reply("Here you go: {\"a\": 1} hope that helps").unwrap();
        assert_eq!(value["a"], json!(1));
    }

    #[test]
    fn test_parse_json_reply_rejects_text() {
        assert!(matches!(
            parse_json_reply("I cannot see the page"),
            Err(VlmError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_observed_shapes() {
        let wrapped = json!({"elements": [
            {"selector": "/html/body/h1", "description": "title"},
            {"selector": "", "description": "empty"},
            {"selector": "xpath=//span[@id='price']"}
        ]});
        let elements = parse_observed(&wrapped);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].selector, "xpath=/html/body/h1");
        assert_eq!(elements[0].description, "title");
        assert_eq!(elements[1].selector, "xpath=//span[@id='price']");

        let bare = json!([{"selector": "button.buy"}]);
        assert_eq!(parse_observed(&bare)[0].selector, "button.buy");
    }

    #[test]
    fn test_condense_html_strips_scripts() {
        let html = "<html><script>var x = 1;</script><h1>Shoe</h1>   <style>h1{}</style></html>";
        assert_eq!(condense_html(html), "<html><h1>Shoe</h1> </html>");
    }

    #[test]
    fn test_build_extract_prompt_includes_schema() {
        let prompt = build_extract_prompt("Is it in stock?", &json!({"type": "object"}));
        assert!(prompt.contains("Is it in stock?"));
        assert!(prompt.contains("\"type\": \"object\""));
    }

    #[test]
    fn test_vlm_config_builder() {
        let config = VlmConfig::new("http://localhost:8080")
            .model("llava")
            .max_tokens(200)
            .activity_timeout(30);

        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.model, "llava");
        assert_eq!(config.max_tokens, 200);
        assert_eq!(config.activity_timeout, 30);
    }

    #[test]
    fn test_full_size_screenshot_reaches_endpoint() {
        // Nothing listens on the discard port, so curl itself must report the failure
        let mut client = VlmClient::new(
            VlmConfig::new("http://127.0.0.1:9/v1/chat/completions").connection_timeout(2),
        );
        let mut page = crate::browser::MockPage::new().with_screenshot(vec![0x89; 300 * 1024]);

        let err = client
            .extract(&mut page, "Describe the product", &json!({"type": "object"}))
            .unwrap_err();

        assert!(matches!(err, VlmError::ConnectionFailed(_)), "got {:?}", err);
    }
}
