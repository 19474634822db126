//! Benchmarks for dynatable storage operations

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dynatable::{record, Key, LocalStorage, QueryOptions, Table, TableSchema};

fn seeded_table(records: usize) -> Table {
    let schema = TableSchema::new("bench", "id").with_sort_key("sort");
    let table = Table::new(Arc::new(LocalStorage::new()), schema);
    for i in 0..records {
        let partition = if i % 2 == 0 { "even" } else { "odd" };
        table
            .create(record! { "id" => partition, "sort" => i as i64, "payload" => "x" })
            .expect("seed record");
    }
    table
}

fn storage_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_query");

    for size in [100usize, 1_000, 5_000] {
        let table = seeded_table(size);
        let key = Key::new().with("id", "even");

        group.bench_with_input(BenchmarkId::new("get_many_unpaged", size), &size, |b, _| {
            b.iter(|| {
                let page = table.get_many(&key, QueryOptions::new(), None).unwrap();
                black_box(page.len())
            })
        });

        group.bench_with_input(BenchmarkId::new("get_all_pages_of_50", size), &size, |b, _| {
            b.iter(|| {
                let count = table
                    .get_all(&key, QueryOptions::new().limit(50))
                    .map(|r| r.unwrap())
                    .count();
                black_box(count)
            })
        });
    }
    group.finish();

    let table = seeded_table(1_000);
    c.bench_function("point_get", |b| {
        let key = Key::new().with("id", "odd").with("sort", 501);
        b.iter(|| black_box(table.get(&key).unwrap()))
    });
}

criterion_group!(benches, storage_benchmarks);
criterion_main!(benches);
