//! Benchmarks for filter parsing and query compilation.

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use lostpets::models::{Filter, FilterGroup};
use lostpets::query::{FieldMap, PlaceholderStyle, compile_with_style, parse_filter_group};

const SIMPLE_GROUP: &str = "petcolor=brown";
const RANGE_GROUP: &str = "date>=2019-01-01; date<=2019-12-31; pettype in dog,cat";
const COMPLEX_GROUP: &str = "location=riverside; petname=rex; petcolor=brown; petmarks=spot; \
    pettype in dog,cat,other; id in 1,2,3,4,5,6,7,8; date>=2019-01-01";

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_parsing");
    group.measurement_time(Duration::from_secs(5));

    for (name, input) in [
        ("simple", SIMPLE_GROUP),
        ("range", RANGE_GROUP),
        ("complex", COMPLEX_GROUP),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| parse_filter_group(black_box(input)));
        });
    }
    group.finish();
}

/// The five single-attribute groups a match search compiles.
fn match_search_groups() -> Vec<FilterGroup> {
    [
        ("location", "Riverside"),
        ("pettype", "Dog"),
        ("petname", "Rex"),
        ("petcolor", "Brown"),
        ("petmarks", "white paw"),
    ]
    .into_iter()
    .map(|(field, value)| FilterGroup::new().with(field, Filter::eq(value)))
    .collect()
}

fn bench_compilation(c: &mut Criterion) {
    let fields = FieldMap::sightings();
    let mut group = c.benchmark_group("query_compilation");
    group.measurement_time(Duration::from_secs(5));

    let groups = match_search_groups();
    group.bench_function("match_search", |b| {
        b.iter(|| compile_with_style(&fields, black_box(&groups), PlaceholderStyle::Numbered));
    });

    for count in [1usize, 10, 100] {
        let groups: Vec<FilterGroup> = (0..count)
            .map(|i| {
                let ids: Vec<i64> = (0..20).map(|n| n + i64::try_from(i).unwrap_or(0)).collect();
                FilterGroup::new()
                    .with("id", Filter::one_of(ids))
                    .with("petcolor", Filter::eq("brown"))
            })
            .collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("or_groups", count), &groups, |b, groups| {
            b.iter(|| compile_with_style(&fields, black_box(groups), PlaceholderStyle::Dollar));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parsing, bench_compilation);
criterion_main!(benches);
