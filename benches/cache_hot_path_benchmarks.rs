//! # Cache Hot Path Benchmarks
//!
//! Key derivation and in-memory cache hits, the two costs paid on every lookup.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geocode_cache::caching::{
    CacheConfig, CacheManager, CachePolicy, KeyGenerator, LookupRequest, OperationKind, Resolution,
    ResponseCache,
};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn benchmark_key_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_derivation");

    for precision in [2u32, 4, 6] {
        let keys = KeyGenerator::new(precision);
        let request = LookupRequest::reverse(40.712776, -74.005974).with_language("en");
        group.bench_with_input(BenchmarkId::new("reverse", precision), &request, |b, request| {
            b.iter(|| keys.key_for(black_box(request)))
        });
    }

    let keys = KeyGenerator::default();
    let request = LookupRequest::forward("  1600 Amphitheatre Parkway, Mountain View, CA ")
        .with_user_scope("tenant-42");
    group.bench_function("forward_scoped", |b| b.iter(|| keys.key_for(black_box(&request))));

    group.finish();
}

fn benchmark_memory_hit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = rt.block_on(async {
        let manager = Arc::new(CacheManager::new(CacheConfig::default()));
        manager.init().await;
        ResponseCache::new(manager)
    });

    let policy = CachePolicy::perpetual(OperationKind::Reverse);
    let key = KeyGenerator::default()
        .key_for(&LookupRequest::reverse(40.7128, -74.0060))
        .unwrap();
    let payload = json!({
        "formatted_address": "New York, NY, USA",
        "components": [{"long_name": "New York", "types": ["locality", "political"]}],
    });
    let payload = &payload;

    rt.block_on(async {
        cache
            .with_cache(&key, &policy, || async move { Resolution::Success(payload.clone()) })
            .await;
        cache.flush().await;
    });

    c.bench_function("with_cache_memory_hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let served = cache
                    .with_cache(&key, &policy, || async move { Resolution::Success(payload.clone()) })
                    .await;
                black_box(served)
            })
        })
    });
}

criterion_group!(benches, benchmark_key_derivation, benchmark_memory_hit);
criterion_main!(benches);
