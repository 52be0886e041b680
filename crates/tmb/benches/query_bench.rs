//! 🔍 Query engine benchmarks: filter + sort + paginate over synthetic quakes.
//!
//! Run with:
//!   cargo bench -p tmb

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use tmb::common::SeismicEvent;
use tmb::query::{EventCriteria, QueryConfig, SortDirection, SortField, run_query};

/// 🌍 A deterministic pile of synthetic events — varied magnitudes, depths,
/// and timestamps, no RNG, so runs compare apples to apples.
fn fleet(count: usize) -> Vec<SeismicEvent> {
    (0..count)
        .map(|i| SeismicEvent {
            external_id: format!("bench{i:06}"),
            latitude: -60.0 + (i % 120) as f64,
            longitude: -170.0 + (i % 340) as f64,
            depth_km: (i % 700) as f64,
            magnitude: 1.0 + (i % 80) as f64 * 0.1,
            occurred_at: Utc.timestamp_opt(1_700_000_000 + (i as i64 * 37) % 2_592_000, 0).unwrap(),
            description: Some(format!("{}km from somewhere tectonic", i % 200)),
            source_url: None,
            ingested_at: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
        })
        .collect()
}

fn bench_filter_sort_paginate(c: &mut Criterion) {
    let config = QueryConfig::default();
    let mut group = c.benchmark_group("query_filter_sort_paginate");

    for size in [1_000usize, 10_000, 50_000] {
        let events = fleet(size);
        let criteria = EventCriteria {
            magnitude_min: Some(4.5),
            description_contains: Some("tectonic".to_string()),
            sort_field: Some(SortField::Magnitude),
            sort_direction: Some(SortDirection::Descending),
            page: Some(2),
            page_size: Some(50),
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| {
                let page = run_query(black_box(&criteria), &config, events.clone())
                    .expect("bench criteria are valid by construction");
                black_box(page)
            })
        });
    }
    group.finish();
}

fn bench_full_listing(c: &mut Criterion) {
    let config = QueryConfig::default();
    let events = fleet(10_000);
    // 📜 the no-criteria path: pure default ordering, no filtering at all
    c.bench_function("query_full_listing_10k", |b| {
        b.iter(|| {
            let page = run_query(black_box(&EventCriteria::default()), &config, events.clone())
                .expect("the empty criteria are always valid");
            black_box(page)
        })
    });
}

criterion_group!(benches, bench_filter_sort_paginate, bench_full_listing);
criterion_main!(benches);
