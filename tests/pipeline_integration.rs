//! End-to-end pipeline tests against an in-memory page.
//!
//! No browser or VLM is needed: `MockPage` stands in for the product page and
//! `ScriptedCollaborator` for the AI.

use pdp_probe::executor::{CheckContext, CheckResult};
use pdp_probe::report::{CollectingReporter, RunEvent};
use pdp_probe::{
    CheckRegistry, Executor, ExecutorSettings, MockElement, MockPage, OfflineCollaborator, OutputDir,
    RunOptions, ScriptedCollaborator, TestStatus, load_catalog, parse_catalog, run_pipeline,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

fn options(url: &str) -> RunOptions {
    RunOptions::new(url).page_load_timeout(Duration::from_millis(100))
}

fn detection_reply(in_stock: bool, has_variants: bool, on_sale: bool, multiple_images: bool) -> serde_json::Value {
    json!({
        "inStock": in_stock,
        "hasVariants": has_variants,
        "onSale": on_sale,
        "hasSubscription": false,
        "multipleImages": multiple_images,
        "additionalStates": []
    })
}

fn shipped_catalog() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("catalogs/pdp_tests.json")
}

fn heading_visible(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    ctx.ensure(true, "heading is visible", Some("h1"), "visible", "visible")
}

fn price_visible(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    ctx.ensure(true, "price is visible", Some(".price"), "visible", "visible")
}

#[test]
fn test_selection_and_generation_scenario() {
    let catalog = parse_catalog(
        r#"{
            "templates": [
                {"id": "t1", "name": "Heading", "category": "core-product-info",
                 "preconditions": {"productState": "any"}},
                {"id": "t2", "name": "Price", "category": "core-product-info",
                 "preconditions": {"productState": "in_stock"}},
                {"id": "t3", "name": "Sale variant", "category": "core-product-info",
                 "preconditions": {"productState": ["has_variants", "on_sale"]}}
            ]
        }"#,
    )
    .unwrap();

    let mut registry = CheckRegistry::new();
    registry
        .register("core-product-info", "t1", heading_visible)
        .register("core-product-info", "t2", price_visible)
        .register("core-product-info", "t3", price_visible);
    let executor = Executor::new(registry, ExecutorSettings::immediate());

    let mut page = MockPage::new();
    let mut ai = ScriptedCollaborator::new().with_extraction(Ok(detection_reply(true, true, false, false)));
    let mut reporter = CollectingReporter::new();

    let report = run_pipeline(
        &mut page,
        &mut ai,
        &catalog,
        &executor,
        &options("https://shop.example/products/boot"),
        &mut reporter,
    )
    .unwrap();

    let tokens: Vec<&str> = report.detection.tokens.iter().collect();
    assert_eq!(tokens, vec!["any", "has_variants", "in_stock"]);
    assert_eq!(report.selected, vec!["t1".to_string(), "t2".to_string()]);
    assert!(report.results.iter().all(|r| r.status == TestStatus::Pass));
    assert!(report.results.iter().all(|r| r.execution_log.len() == 1));

    let script = &report.script;
    assert_eq!(script.matches("test.describe(").count(), 1);
    assert_eq!(script.matches("\n  test('").count(), 2);
    let t1 = script.find("test('t1: Heading'").unwrap();
    let t2 = script.find("test('t2: Price'").unwrap();
    assert!(t1 < t2);
    assert!(!script.contains("t3"));
}

#[test]
fn test_shipped_catalog_loads() {
    let catalog = load_catalog(shipped_catalog()).unwrap();
    assert!(catalog.duplicate_ids().is_empty());
    assert_eq!(catalog.category_label("add-to-cart"), "Add to Cart");

    let registry = CheckRegistry::builtin();
    let unknown: Vec<&str> = catalog
        .templates
        .iter()
        .filter(|e| !registry.categories().any(|c| c == e.category))
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(unknown, vec!["reviews-visible"]);
}

#[test]
fn test_full_run_on_storefront_page() {
    let catalog = load_catalog(shipped_catalog()).unwrap();
    let mut page = MockPage::new()
        .with_element("h1.product__title", MockElement::visible("Alpine Trail Boot"))
        .with_element(".product__description", MockElement::visible("Waterproof leather."))
        .with_element(".price__current", MockElement::visible("$129.00"))
        .with_element(".price__compare", MockElement::visible("$159.00"))
        .with_element("select[name=\"id\"]", MockElement::visible("").with_options(4))
        .with_element("button[name=\"add\"]", MockElement::visible("Add to cart"))
        .with_element("input[name=\"quantity\"]", MockElement::visible("1"))
        .reveal_on_click("button[name=\"add\"]", ".cart-count-bubble", MockElement::visible("1"))
        .with_element(".product__media img", MockElement::visible(""))
        .with_elements(".product__media-list img", MockElement::visible(""), 3)
        .with_element(".product__media-toggle", MockElement::visible(""));
    let mut ai = ScriptedCollaborator::new().with_extraction(Ok(detection_reply(true, true, true, true)));
    let executor = Executor::new(CheckRegistry::builtin(), ExecutorSettings::immediate());
    let mut reporter = CollectingReporter::new();

    let report = run_pipeline(
        &mut page,
        &mut ai,
        &catalog,
        &executor,
        &options("https://shop.example/products/alpine-trail-boot"),
        &mut reporter,
    )
    .unwrap();

    let status_of = |id: &str| {
        report
            .results
            .iter()
            .find(|r| r.test_id == id)
            .map(|r| r.status)
            .unwrap()
    };
    assert_eq!(status_of("title-visible"), TestStatus::Pass);
    assert_eq!(status_of("price-visible"), TestStatus::Pass);
    assert_eq!(status_of("price-format"), TestStatus::Pass);
    assert_eq!(status_of("sale-price-shown"), TestStatus::Pass);
    assert_eq!(status_of("select-variant"), TestStatus::Pass);
    assert_eq!(status_of("add-to-cart-click"), TestStatus::Pass);
    assert_eq!(status_of("image-gallery"), TestStatus::Pass);
    assert_eq!(status_of("thumbnail-click"), TestStatus::Pass);
    // No breadcrumbs or SKU on this page, and discovery finds nothing
    assert_eq!(status_of("breadcrumbs-visible"), TestStatus::Fail);
    assert_eq!(status_of("sku-visible"), TestStatus::Fail);
    assert_eq!(status_of("reviews-visible"), TestStatus::Fail);
    // Subscription not detected
    assert!(!report.selected.contains(&"subscription-price".to_string()));

    assert_eq!(page.clicks.first().map(String::as_str), Some("button[name=\"add\"]"));
    assert_eq!(page.selections, vec![("select[name=\"id\"]".to_string(), 1)]);
    assert_eq!(ai.extract_calls.len(), 1);

    let script = &report.script;
    assert!(script.contains("test.describe('Core Product Info'"));
    assert!(script.contains("test.describe('Add to Cart'"));
    assert!(!script.contains("test.describe('Social Proof'"));
    assert!(!script.contains("breadcrumbs-visible"));
    assert!(script.contains("getByRole('button', { name: /add to (cart|bag)/i })"));
    assert!(script.contains("selectOption({ index: 1 })"));

    let finished = reporter
        .events
        .iter()
        .filter(|e| matches!(e, RunEvent::TestFinished(_)))
        .count();
    assert_eq!(finished, report.selected.len());
}

#[test]
fn test_offline_run_keeps_baseline_and_flags_degradation() {
    let catalog = load_catalog(shipped_catalog()).unwrap();
    let mut page = MockPage::new()
        .with_element("h1", MockElement::visible("Boot"))
        .with_element(".price", MockElement::visible("€89,00"));
    let mut ai = OfflineCollaborator;
    let executor = Executor::new(CheckRegistry::builtin(), ExecutorSettings::immediate());
    let mut reporter = CollectingReporter::new();

    let report = run_pipeline(
        &mut page,
        &mut ai,
        &catalog,
        &executor,
        &options("https://shop.example/products/boot"),
        &mut reporter,
    )
    .unwrap();

    assert!(report.detection.degraded);
    assert!(report.detection.reason.is_some());
    let baseline: Vec<&str> = catalog
        .templates
        .iter()
        .filter(|e| e.preconditions.product_state.is_any())
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(report.selected, baseline);
    assert!(!report.selected.contains(&"add-to-cart-click".to_string()));

    let passed: Vec<&str> = report
        .results
        .iter()
        .filter(|r| r.is_pass())
        .map(|r| r.test_id.as_str())
        .collect();
    assert_eq!(passed, vec!["title-visible", "price-visible", "price-format"]);
}

#[test]
fn test_unregistered_id_is_skipped_not_generated() {
    let catalog = load_catalog(shipped_catalog()).unwrap();
    let mut page = MockPage::new().with_element(".price", MockElement::visible("$20"));
    let mut ai = ScriptedCollaborator::new().with_extraction(Ok(json!({
        "inStock": false, "hasVariants": false, "onSale": false,
        "hasSubscription": true, "multipleImages": false
    })));
    let executor = Executor::new(CheckRegistry::builtin(), ExecutorSettings::immediate());

    let report = run_pipeline(
        &mut page,
        &mut ai,
        &catalog,
        &executor,
        &options("https://shop.example/products/coffee"),
        &mut CollectingReporter::new(),
    )
    .unwrap();

    let skipped = report
        .results
        .iter()
        .find(|r| r.test_id == "subscription-price")
        .unwrap();
    assert_eq!(skipped.status, TestStatus::Skipped);
    assert!(skipped.execution_log.is_empty());
    assert_eq!(report.summary.skipped, 1);
    assert!(!report.script.contains("subscription-price"));
}

#[test]
fn test_artifacts_written_to_output_dir() {
    let catalog = load_catalog(shipped_catalog()).unwrap();
    let mut page = MockPage::new().with_element("h1", MockElement::visible("Boot"));
    let mut ai = OfflineCollaborator;
    let executor = Executor::new(CheckRegistry::builtin(), ExecutorSettings::immediate());
    let report = run_pipeline(
        &mut page,
        &mut ai,
        &catalog,
        &executor,
        &options("https://shop.example/products/boot"),
        &mut CollectingReporter::new(),
    )
    .unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let out = OutputDir::new(tmp.path().join("generated-tests"));
    out.init().unwrap();
    let script_path = out.write_script(&report.script).unwrap();
    let report_path = out.write_report(&report).unwrap();

    let name = script_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("pdp-") && name.ends_with(".spec.ts"));
    let script = std::fs::read_to_string(&script_path).unwrap();
    assert!(script.contains("test('title-visible: Product title is visible'"));

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(saved["url"], json!("https://shop.example/products/boot"));
    assert_eq!(saved["summary"]["pass"], json!(1));
}
