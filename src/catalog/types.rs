use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Sentinel token that every capability set satisfies
pub const ANY: &str = "any";

/// The full catalog file: test templates plus the vocabulary they draw from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    /// Optional catalog format/version tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Ordered test definitions; execution follows this order
    pub templates: Vec<CatalogEntry>,

    /// Category tag -> display name (or an object with a `name` field)
    #[serde(default)]
    pub categories: BTreeMap<String, serde_json::Value>,

    /// Priority tag -> meaning
    #[serde(default)]
    pub priorities: BTreeMap<String, serde_json::Value>,

    /// State token -> meaning
    #[serde(default)]
    pub states: BTreeMap<String, serde_json::Value>,
}

impl CatalogDocument {
    /// Find an entry by its id
    pub fn entry(&self, id: &str) -> Option<&CatalogEntry> {
        self.templates.iter().find(|entry| entry.id == id)
    }

    /// Human-readable label for a category tag, falling back to the tag itself
    pub fn category_label<'a>(&'a self, category: &'a str) -> &'a str {
        match self.categories.get(category) {
            Some(serde_json::Value::String(label)) => label.as_str(),
            Some(serde_json::Value::Object(map)) => map
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(category),
            _ => category,
        }
    }

    /// Ids that appear more than once, in first-duplicate order
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut dups = Vec::new();
        for entry in &self.templates {
            if !seen.insert(entry.id.as_str()) && !dups.contains(&entry.id.as_str()) {
                dups.push(entry.id.as_str());
            }
        }
        dups
    }
}

/// One test definition from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable unique identifier
    pub id: String,

    /// Short test name
    pub name: String,

    /// What the test verifies; also the AI instruction for uncategorized checks
    #[serde(default)]
    pub description: String,

    /// Category tag (e.g., "pricing", "add-to-cart")
    pub category: String,

    /// Priority tag ("P0" outranks "P1"); informational only
    #[serde(default = "default_priority")]
    pub priority: String,

    /// Conditions gating whether the test applies to a page
    #[serde(default)]
    pub preconditions: Preconditions,
}

fn default_priority() -> String {
    "P1".to_string()
}

/// Requirements a page must meet for an entry to be selected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preconditions {
    /// Required product state(s)
    #[serde(default)]
    pub product_state: ProductState,

    /// Required user state (informational)
    #[serde(default = "any_token")]
    pub user_state: String,

    /// Required viewport (informational)
    #[serde(default = "any_token")]
    pub viewport: String,
}

impl Default for Preconditions {
    fn default() -> Self {
        Self {
            product_state: ProductState::default(),
            user_state: any_token(),
            viewport: any_token(),
        }
    }
}

fn any_token() -> String {
    ANY.to_string()
}

/// The shapes `productState` may take in a catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductState {
    /// A single token, or the `any` sentinel
    Token(String),

    /// Every listed token is required
    AllOf(Vec<String>),

    /// Anything else; never matches
    Other(serde_json::Value),
}

impl Default for ProductState {
    fn default() -> Self {
        ProductState::Token(any_token())
    }
}

impl ProductState {
    pub fn all_of<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProductState::AllOf(tokens.into_iter().map(Into::into).collect())
    }

    /// Whether this is the bare `any` sentinel
    pub fn is_any(&self) -> bool {
        matches!(self, ProductState::Token(token) if token == ANY)
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Error types for catalog loading
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_state_shapes() {
        let single: ProductState = serde_json::from_value(json!("in_stock")).unwrap();
        assert_eq!(single, ProductState::Token("in_stock".into()));

        let list: ProductState = serde_json::from_value(json!(["has_variants", "on_sale"])).unwrap();
        assert_eq!(list, ProductState::all_of(["has_variants", "on_sale"]));

        let other: ProductState = serde_json::from_value(json!({"oneOf": ["a"]})).unwrap();
        assert!(matches!(other, ProductState::Other(_)));
    }

    #[test]
    fn test_preconditions_default_to_any() {
        let entry: CatalogEntry = serde_json::from_value(json!({
            "id": "t1",
            "name": "Title",
            "category": "core-product-info"
        }))
        .unwrap();
        assert!(entry.preconditions.product_state.is_any());
        assert_eq!(entry.preconditions.user_state, "any");
        assert_eq!(entry.priority, "P1");
    }

    #[test]
    fn test_category_label_lookup() {
        let doc: CatalogDocument = serde_json::from_value(json!({
            "templates": [],
            "categories": {
                "pricing": "Pricing",
                "product-media": {"name": "Product Media", "description": "images"}
            }
        }))
        .unwrap();
        assert_eq!(doc.category_label("pricing"), "Pricing");
        assert_eq!(doc.category_label("product-media"), "Product Media");
        assert_eq!(doc.category_label("reviews"), "reviews");
    }

    #[test]
    fn test_duplicate_ids() {
        let entry = |id: &str| CatalogEntry {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            category: "pricing".into(),
            priority: "P0".into(),
            preconditions: Preconditions::default(),
        };
        let doc = CatalogDocument {
            templates: vec![entry("a"), entry("b"), entry("a"), entry("a")],
            ..Default::default()
        };
        assert_eq!(doc.duplicate_ids(), vec!["a"]);
    }
}
