use bndls::models::{Actor, ActorKind, SubscriptionStatus};
use bndls::services::{decide_action, AccessEvaluator, Catalogs};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn subscribed(kind: ActorKind, price_id: &str) -> Actor {
    let mut actor = Actor::new(
        "bench-actor",
        kind,
        "bench@example.com",
        "Bench",
        "cus_bench",
        "2026-01-01T00:00:00Z",
    );
    actor.subscription_id = Some("sub_bench".to_string());
    actor.subscription_status = Some(SubscriptionStatus::Active);
    actor.price_id = Some(price_id.to_string());
    actor
}

fn benchmark_decide_action(c: &mut Criterion) {
    let catalogs = Catalogs::builtin().expect("Built-in catalogs");
    let athlete = subscribed(ActorKind::Athlete, "price_athlete_tier2_monthly");

    // Every price the pricing page renders for one actor
    let prices: Vec<String> = catalogs
        .athlete()
        .price_ids()
        .chain(catalogs.brand().price_ids())
        .map(str::to_string)
        .collect();

    let mut group = c.benchmark_group("pricing_page");

    group.bench_function("decide_action_all_prices", |b| {
        b.iter(|| {
            for price in &prices {
                black_box(decide_action(&catalogs, black_box(&athlete), price));
            }
        })
    });

    group.finish();
}

fn benchmark_has_access(c: &mut Criterion) {
    let catalogs = Catalogs::builtin().expect("Built-in catalogs");
    let athlete = subscribed(ActorKind::Athlete, "price_athlete_tier1_yearly");
    let brand = subscribed(ActorKind::Brand, "price_brand_performance_monthly");

    let athlete_side = AccessEvaluator::for_kind(&catalogs, ActorKind::Athlete);
    let reach = AccessEvaluator::brand_reach(&catalogs);
    let tiers = vec!["1".to_string(), "2".to_string(), "3".to_string()];

    let mut group = c.benchmark_group("access_checks");

    group.bench_function("athlete_has_access", |b| {
        b.iter(|| athlete_side.has_access(Some(black_box(&athlete)), black_box("2")))
    });

    group.bench_function("brand_reach_any", |b| {
        b.iter(|| reach.has_access_to_any(Some(black_box(&brand)), black_box(&tiers)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_decide_action, benchmark_has_access);
criterion_main!(benches);
