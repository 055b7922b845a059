//! Best-effort conversion of recorded locators into structural selectors.
//!
//! Structural selectors pass through. Path queries are matched against a
//! ranked list of attribute rules; the first rule that matches wins, and
//! within a rule the last occurrence (the predicate nearest the target
//! element) is used. Anything left over is kept verbatim with a review
//! marker so the generated script still parses.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::browser::is_path_query;

/// Marker appended to path queries no rule could convert
pub const UNCONVERTED_MARKER: &str = "/* UNCONVERTED path query: manual review required */";

struct ConversionRule {
    name: &'static str,
    pattern: Regex,
    build: fn(&Captures<'_>) -> Option<String>,
}

fn attribute_rule(name: &'static str, attribute: &str, build: fn(&Captures<'_>) -> Option<String>) -> ConversionRule {
    let pattern = format!(r#"@({})\s*=\s*(?:'([^']*)'|"([^"]*)")"#, attribute);
    ConversionRule {
        name,
        pattern: Regex::new(&pattern).expect("static regex"),
        build,
    }
}

static RULES: Lazy<Vec<ConversionRule>> = Lazy::new(|| {
    vec![
        attribute_rule("test-id", r"data-(?:testid|test-id|test|qa|cy)", |caps| {
            let attribute = caps.get(1)?.as_str();
            Some(format!("[{}=\"{}\"]", attribute, attribute_value(value(caps)?)))
        }),
        attribute_rule("class", "class", |caps| {
            let first = value(caps)?.split_whitespace().next()?;
            Some(if is_css_ident(first) {
                format!(".{}", first)
            } else {
                format!("[class~=\"{}\"]", attribute_value(first))
            })
        }),
        attribute_rule("id", "id", |caps| {
            let id = value(caps)?.trim();
            if id.is_empty() {
                return None;
            }
            Some(if is_css_ident(id) {
                format!("#{}", id)
            } else {
                format!("[id=\"{}\"]", attribute_value(id))
            })
        }),
    ]
});

fn value<'c>(caps: &'c Captures<'_>) -> Option<&'c str> {
    caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str())
}

/// Escape a value for a double-quoted CSS attribute selector
fn attribute_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Whether `s` can follow `.` or `#` in a CSS selector without escaping
fn is_css_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Structural equivalent of a path query, if any rule applies
pub fn structural_equivalent(selector: &str) -> Option<String> {
    for rule in RULES.iter() {
        let converted = rule
            .pattern
            .captures_iter(selector)
            .last()
            .and_then(|caps| (rule.build)(&caps));
        if let Some(converted) = converted {
            debug!(rule = rule.name, %selector, %converted, "converted path query");
            return Some(converted);
        }
    }
    None
}

/// Convert a recorded selector into a TypeScript expression for
/// `page.locator(...)`: a single-quoted string literal, followed by the
/// review marker when the locator could not be converted.
pub fn convert_selector(selector: &str) -> String {
    if !is_path_query(selector) {
        return ts_string(selector);
    }
    match structural_equivalent(selector) {
        Some(converted) => ts_string(&converted),
        None => {
            debug!(%selector, "path query left unconverted");
            format!("{} {}", ts_string(selector), UNCONVERTED_MARKER)
        }
    }
}

/// Single-quoted TypeScript string literal
pub fn ts_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
