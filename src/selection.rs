//! Capability-gated test selection.

use tracing::debug;

use crate::capability::CapabilityTokenSet;
use crate::catalog::{ANY, CatalogEntry, ProductState};

/// Entries whose `productState` precondition the tokens satisfy, in catalog order.
///
/// Pure: no I/O, no AI calls, identical output for identical input.
pub fn select_tests<'a>(entries: &'a [CatalogEntry], tokens: &CapabilityTokenSet) -> Vec<&'a CatalogEntry> {
    let selected: Vec<&CatalogEntry> = entries
        .iter()
        .filter(|entry| product_state_matches(&entry.preconditions.product_state, tokens))
        .collect();
    debug!(total = entries.len(), selected = selected.len(), "selected tests");
    selected
}

/// Matching rule for a single `productState` value:
/// - `any` always matches
/// - a single token matches iff present
/// - a non-empty list matches iff every token is present
/// - any other shape never matches
pub fn product_state_matches(state: &ProductState, tokens: &CapabilityTokenSet) -> bool {
    match state {
        ProductState::Token(token) => token_present(token, tokens),
        ProductState::AllOf(required) => {
            !required.is_empty() && required.iter().all(|token| token_present(token, tokens))
        }
        ProductState::Other(_) => false,
    }
}

fn token_present(token: &str, tokens: &CapabilityTokenSet) -> bool {
    token == ANY || tokens.contains(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Preconditions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entry(id: &str, state: ProductState) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category: "core-product-info".to_string(),
            priority: "P0".to_string(),
            preconditions: Preconditions {
                product_state: state,
                ..Preconditions::default()
            },
        }
    }

    fn ids<'a>(entries: &[&'a CatalogEntry]) -> Vec<&'a str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_any_always_included() {
        let entries = vec![entry("t1", ProductState::Token("any".into()))];
        let empty = CapabilityTokenSet::minimal();
        let rich = CapabilityTokenSet::from_tokens(["in_stock", "on_sale"]);
        assert_eq!(ids(&select_tests(&entries, &empty)), vec!["t1"]);
        assert_eq!(ids(&select_tests(&entries, &rich)), vec!["t1"]);
    }

    #[test]
    fn test_any_matches_even_without_sentinel() {
        // A token set that somehow lost `any` still selects sentinel entries
        let tokens: CapabilityTokenSet = serde_json::from_value(json!([])).unwrap();
        assert!(tokens.is_empty());
        assert!(product_state_matches(&ProductState::Token("any".into()), &tokens));
    }

    #[test]
    fn test_single_token() {
        let tokens = CapabilityTokenSet::from_tokens(["in_stock"]);
        assert!(product_state_matches(&ProductState::Token("in_stock".into()), &tokens));
        assert!(!product_state_matches(&ProductState::Token("out_of_stock".into()), &tokens));
    }

    #[test]
    fn test_list_is_conjunctive() {
        let tokens = CapabilityTokenSet::from_tokens(["in_stock", "has_variants"]);
        assert!(product_state_matches(&ProductState::all_of(["in_stock", "has_variants"]), &tokens));
        assert!(!product_state_matches(&ProductState::all_of(["has_variants", "on_sale"]), &tokens));
        assert!(!product_state_matches(&ProductState::all_of(["on_sale", "has_variants"]), &tokens));
    }

    #[test]
    fn test_other_shapes_never_match() {
        let tokens = CapabilityTokenSet::from_tokens(["in_stock"]);
        assert!(!product_state_matches(&ProductState::Other(json!({"in_stock": true})), &tokens));
        assert!(!product_state_matches(&ProductState::Other(json!(42)), &tokens));
        assert!(!product_state_matches(&ProductState::AllOf(vec![]), &tokens));
    }

    #[test]
    fn test_selection_preserves_catalog_order_and_is_repeatable() {
        let entries = vec![
            entry("t1", ProductState::Token("any".into())),
            entry("t2", ProductState::Token("in_stock".into())),
            entry("t3", ProductState::all_of(["has_variants", "on_sale"])),
            entry("t4", ProductState::all_of(["has_variants"])),
        ];
        let tokens = CapabilityTokenSet::from_tokens(["in_stock", "has_variants"]);

        let first = select_tests(&entries, &tokens);
        let second = select_tests(&entries, &tokens);
        assert_eq!(ids(&first), vec!["t1", "t2", "t4"]);
        assert_eq!(first, second);
    }
}
