//! Page capability detection.
//!
//! One structured AI extraction per run answers five yes/no questions about
//! the product page; the answers become a flat set of capability tokens that
//! test selection matches catalog preconditions against.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::browser::Page;
use crate::catalog::ANY;
use crate::collaborator::AiCollaborator;

pub const IN_STOCK: &str = "in_stock";
pub const OUT_OF_STOCK: &str = "out_of_stock";
pub const HAS_VARIANTS: &str = "has_variants";
pub const ON_SALE: &str = "on_sale";
pub const HAS_SUBSCRIPTION: &str = "has_subscription";
pub const MULTIPLE_IMAGES: &str = "multiple_images";

const DETECTION_INSTRUCTION: &str = "Analyze this product page. Decide whether the product is in stock, \
whether it offers variants (size, color, or similar options), whether it is on sale (a discounted or \
struck-through price), whether a subscription or recurring-delivery option is offered, and whether there \
is more than one product image. List any other notable product states as short snake_case tokens.";

/// Set of tokens describing what a page can do. Always contains `any`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityTokenSet(BTreeSet<String>);

impl CapabilityTokenSet {
    /// The set used when detection fails: `{any}`
    pub fn minimal() -> Self {
        Self(BTreeSet::from([ANY.to_string()]))
    }

    /// Build from any tokens; `any` is always added
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::minimal();
        set.0.extend(tokens.into_iter().map(Into::into));
        set
    }

    /// Map an extraction result to tokens. Exactly one inventory token is
    /// emitted; free-form states cannot add a second one.
    pub fn from_analysis(analysis: &PageAnalysis) -> Self {
        let mut set = Self::minimal();
        let inventory = if analysis.in_stock { IN_STOCK } else { OUT_OF_STOCK };
        set.0.insert(inventory.to_string());

        let features = [
            (analysis.has_variants, HAS_VARIANTS),
            (analysis.on_sale, ON_SALE),
            (analysis.has_subscription, HAS_SUBSCRIPTION),
            (analysis.multiple_images, MULTIPLE_IMAGES),
        ];
        for (present, token) in features {
            if present {
                set.0.insert(token.to_string());
            }
        }

        for state in &analysis.additional_states {
            let token = normalize_token(state);
            if token.is_empty() || token == IN_STOCK || token == OUT_OF_STOCK {
                continue;
            }
            set.0.insert(token);
        }
        set
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lowercase, trim and snake_case a free-form state name
fn normalize_token(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// What the AI collaborator reports about the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalysis {
    pub in_stock: bool,
    pub has_variants: bool,
    pub on_sale: bool,
    pub has_subscription: bool,
    pub multiple_images: bool,
    #[serde(default)]
    pub additional_states: Vec<String>,
}

impl PageAnalysis {
    /// JSON Schema sent with the extraction request
    pub fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "inStock": { "type": "boolean", "description": "product can be purchased now" },
                "hasVariants": { "type": "boolean", "description": "size/color/style options exist" },
                "onSale": { "type": "boolean", "description": "a discounted or compare-at price is shown" },
                "hasSubscription": { "type": "boolean", "description": "subscribe-and-save or recurring delivery offered" },
                "multipleImages": { "type": "boolean", "description": "more than one product image" },
                "additionalStates": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["inStock", "hasVariants", "onSale", "hasSubscription", "multipleImages"]
        })
    }
}

/// Outcome of capability detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub tokens: CapabilityTokenSet,
    /// True when the AI call failed and `tokens` fell back to `{any}`
    pub degraded: bool,
    /// Why detection degraded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Raw analysis, when detection succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PageAnalysis>,
}

impl Detection {
    pub fn detected(analysis: PageAnalysis) -> Self {
        Self {
            tokens: CapabilityTokenSet::from_analysis(&analysis),
            degraded: false,
            reason: None,
            analysis: Some(analysis),
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            tokens: CapabilityTokenSet::minimal(),
            degraded: true,
            reason: Some(reason.into()),
            analysis: None,
        }
    }
}

/// Detect page capabilities with a single extraction call.
///
/// Never fails: any collaborator fault or malformed reply degrades to the
/// minimal token set so baseline tests still run.
pub fn detect(page: &mut dyn Page, ai: &mut dyn AiCollaborator) -> Detection {
    let reply = match ai.extract(page, DETECTION_INSTRUCTION, &PageAnalysis::schema()) {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "capability detection failed; continuing with baseline tests only");
            return Detection::degraded(e.to_string());
        }
    };

    match serde_json::from_value::<PageAnalysis>(reply) {
        Ok(analysis) => {
            let detection = Detection::detected(analysis);
            info!(
                tokens = ?detection.tokens.iter().collect::<Vec<_>>(),
                "detected page capabilities"
            );
            detection
        }
        Err(e) => {
            warn!(error = %e, "capability reply did not match schema");
            Detection::degraded(format!("malformed detection reply: {}", e))
        }
    }
}
