use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use entiscope_core::scope::{self, ScopeMode};
use entiscope_core::{share, Entity, IdentityMap, PrimaryKey, Retriever};
use std::cell::RefCell;
use std::hint::black_box;
use std::rc::Rc;

#[derive(Default)]
struct Row {
    id: Option<PrimaryKey>,
}

impl Entity for Row {
    fn id(&self) -> Option<&PrimaryKey> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: PrimaryKey) {
        self.id = Some(id);
    }

    fn bare_constructor() -> Option<fn() -> Self> {
        Some(Self::default)
    }
}

fn row(id: i64) -> entiscope_core::Shared<Row> {
    share(Row {
        id: Some(PrimaryKey::Int(id)),
    })
}

fn bench_insert_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_sequential");

    for size in [10, 100, 1000].iter() {
        let rows: Vec<_> = (0..*size as i64).map(row).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| {
                let mut map = IdentityMap::new();
                for r in rows {
                    black_box(map.insert_entity(r).ok());
                }
            });
        });
    }

    group.finish();
}

fn bench_get_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_sequential");

    for size in [10, 100, 1000].iter() {
        // Pre-populate map
        let mut map = IdentityMap::new();
        for i in 0..*size as i64 {
            map.insert_entity(&row(i)).ok();
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size as i64 {
                    black_box(map.get::<Row>(i));
                }
            });
        });
    }

    group.finish();
}

fn bench_resolve_with_placeholders(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let map = Rc::new(RefCell::new(IdentityMap::new()));
                let retriever = Retriever::push(&map);
                // Every key is resolved twice: once as placeholder, once cached
                for i in 0..size as i64 {
                    black_box(retriever.resolve::<Row>(i).ok());
                    black_box(retriever.resolve::<Row>(i).ok());
                }
                retriever.pop().ok();
            });
        });
    }

    group.finish();
}

fn bench_scope_open_close(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_open_close");

    group.bench_function("force_new", |b| {
        b.iter(|| {
            let guard = scope::open(ScopeMode::ForceNew);
            black_box(scope::is_active());
            guard.close().ok();
        });
    });

    group.bench_function("piggyback", |b| {
        let _outer = scope::open(ScopeMode::Normal);
        b.iter(|| {
            let guard = scope::open(ScopeMode::Normal);
            black_box(guard.is_piggyback());
            guard.close().ok();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_sequential,
    bench_get_sequential,
    bench_resolve_with_placeholders,
    bench_scope_open_close
);
criterion_main!(benches);
