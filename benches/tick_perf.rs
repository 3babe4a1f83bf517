//! Benchmark: tick driver and dependency loading throughput

use archetype_bundle::{BundleConfig, BundleManager, Manifest, MockBundle, MockFetcher, MockSceneLoader, MANIFEST_ITEM_NAME};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

const ROOTS: usize = 64;
const SHARED: usize = 16;

/// `root{i} -> [shared{i % SHARED}, shared{(i + 1) % SHARED}]`
fn manager() -> BundleManager {
    let hash = MockBundle::new().hash();
    let mut builder = Manifest::builder();
    let mut fetcher = MockFetcher::new();

    for i in 0..SHARED {
        builder = builder.bundle(format!("shared{i}"), hash);
        fetcher = fetcher.with_bundle(format!("shared{i}"), MockBundle::new());
    }
    for i in 0..ROOTS {
        builder = builder.bundle_with_dependencies(
            format!("root{i}"),
            hash,
            [format!("shared{}", i % SHARED), format!("shared{}", (i + 1) % SHARED)],
        );
        fetcher = fetcher.with_bundle(format!("root{i}"), MockBundle::new().with_item("item", i));
    }

    let fetcher = fetcher.with_bundle("Manifest", MockBundle::new().with_item(MANIFEST_ITEM_NAME, builder.build()));
    let config = BundleConfig {
        manifest_bundle: "Manifest".to_string(),
        ..BundleConfig::default()
    };

    let mut manager = BundleManager::with_config(fetcher, MockSceneLoader::new(), config);
    if let Ok(operation) = manager.initialize_manifest() {
        while !operation.is_done() {
            manager.tick();
        }
    }
    manager
}

fn tick_perf_benchmark(c: &mut Criterion) {
    c.bench_function("load_unload_roots", |b| {
        b.iter_batched(
            manager,
            |mut manager| {
                for i in 0..ROOTS {
                    let _ = manager.preload_bundle(&format!("root{i}"));
                }
                manager.tick();
                for i in 0..ROOTS {
                    manager.unload(&format!("root{i}"));
                }
                black_box(manager.registry().resident_count())
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("asset_operations_to_completion", |b| {
        b.iter_batched(
            manager,
            |mut manager| {
                let operations: Vec<_> = (0..ROOTS)
                    .filter_map(|i| manager.load_asset::<usize>(&format!("root{i}"), "item").ok())
                    .collect();
                while manager.active_operations() > 0 {
                    manager.tick();
                }
                black_box(operations.iter().filter(|op| op.asset().is_some()).count())
            },
            BatchSize::SmallInput,
        )
    });

    let resident = manager();
    c.bench_function("status_query", |b| {
        b.iter(|| black_box(resident.status("root0").is_ready()))
    });
}

criterion_group!(benches, tick_perf_benchmark);
criterion_main!(benches);
