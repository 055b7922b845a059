use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pdp_probe::executor::{ExecutionStep, StepAction};
use pdp_probe::{CapabilityTokenSet, TestResult, convert_selector, generate, parse_catalog, select_tests};

const CATALOG: &str = include_str!("../catalogs/pdp_tests.json");

fn benchmark_selection(c: &mut Criterion) {
    let catalog = parse_catalog(CATALOG).expect("shipped catalog parses");
    let tokens = CapabilityTokenSet::from_tokens(["in_stock", "has_variants", "multiple_images"]);

    c.bench_function("select_tests", |b| {
        b.iter(|| select_tests(black_box(&catalog.templates), black_box(&tokens)))
    });
}

fn benchmark_generation(c: &mut Criterion) {
    let catalog = parse_catalog(CATALOG).expect("shipped catalog parses");
    let results: Vec<TestResult> = catalog
        .templates
        .iter()
        .map(|entry| {
            TestResult::passed(
                entry.id.clone(),
                vec![
                    ExecutionStep::new(StepAction::Observe)
                        .instruction(entry.description.clone())
                        .selector("xpath=//div[@class='product main']//span[@data-testid='price']"),
                    ExecutionStep::new(StepAction::Assert)
                        .instruction(entry.name.clone())
                        .selector("h1.product__title"),
                ],
            )
        })
        .collect();

    c.bench_function("generate_script", |b| {
        b.iter(|| generate(black_box(&results), black_box(&catalog), "https://shop.example/products/boot"))
    });

    c.bench_function("convert_selector", |b| {
        b.iter(|| convert_selector(black_box("xpath=/html/body/main/div[2]/button[@id='AddToCart']")))
    });
}

criterion_group!(benches, benchmark_selection, benchmark_generation);
criterion_main!(benches);
