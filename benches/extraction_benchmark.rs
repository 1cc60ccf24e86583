//! Benchmarks for the hot extraction paths: price parsing and strategy
//! evaluation over a static snapshot.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use harvester::extraction::post_process::parse_price;
use harvester::page::StaticPage;
use harvester::{Probe, RuleEngine, SelectorStrategy};

const LISTING: &str = r#"
    <html><body>
      <div class="grid">
        <div class="product-card"><span class="price-tag">$1,234.56</span></div>
        <div class="product-card"><span class="price-tag">€ 99,99</span></div>
        <div class="product-card"><span class="price-tag">1.234,56 €</span></div>
        <div class="product-card"><span data-testid="price" class="price-tag">$49.99</span></div>
      </div>
    </body></html>
"#;

fn bench_parse_price(c: &mut Criterion) {
    c.bench_function("parse_price_mixed_conventions", |b| {
        b.iter(|| {
            black_box(parse_price(black_box("$1,234.56")));
            black_box(parse_price(black_box("€ 99,99")));
            black_box(parse_price(black_box("1.234,56 €")));
            black_box(parse_price(black_box("Free")));
        });
    });
}

fn bench_strategy_evaluation(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let page = StaticPage::new("https://shop.example.com/list", LISTING);
    let strategy = SelectorStrategy::new(vec![
        Probe::attribute("data-testid", "price"),
        Probe::attribute_contains("class", "price-tag"),
    ])
    .expect("strategy");
    let engine = RuleEngine::immediate();

    c.bench_function("evaluate_two_level_strategy", |b| {
        b.iter(|| {
            runtime
                .block_on(engine.evaluate(black_box(&strategy), &page))
                .expect("evaluation");
        });
    });
}

criterion_group!(benches, bench_parse_price, bench_strategy_evaluation);
criterion_main!(benches);
