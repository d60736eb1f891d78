//! Benchmarks for policy chain overhead
//!
//! This benchmark measures:
//! - Single policy execution on the success path
//! - Standard chain (forever retry + success observer) on the success path
//! - Chain depth cost when composing many policies

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use resilient_http::policy::{
    operation_fn, ConnectivitySignal, Executor, Policy, PolicyChain, ReleaseConnectivityHook,
    RetryPolicy,
};
use resilient_http::Error;

fn observer(signal: ConnectivitySignal) -> RetryPolicy<u32> {
    RetryPolicy::<u32>::builder()
        .handle_result(|v| *v == 200)
        .once()
        .hook(ReleaseConnectivityHook::new(signal))
        .build()
}

fn bench_success_path(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("success_path");

    let single = Executor::new(Arc::new(RetryPolicy::<u32>::builder().forever().build()));
    group.bench_function("single_policy", |b| {
        b.to_async(&rt).iter(|| async {
            let op = operation_fn(|| async { Ok::<u32, Error>(black_box(200)) });
            single.execute(&op).await.unwrap()
        })
    });

    let chain = PolicyChain::builder()
        .then(RetryPolicy::<u32>::builder().forever().build())
        .then(observer(ConnectivitySignal::default()))
        .build()
        .unwrap();
    let standard = Executor::new(chain.as_policy());
    group.bench_function("standard_chain", |b| {
        b.to_async(&rt).iter(|| async {
            let op = operation_fn(|| async { Ok::<u32, Error>(black_box(200)) });
            standard.execute(&op).await.unwrap()
        })
    });

    group.finish();
}

fn bench_chain_depth(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("chain_depth");

    for depth in [1usize, 4, 16] {
        let policies: Vec<Arc<dyn Policy<u32>>> = (0..depth)
            .map(|_| Arc::new(RetryPolicy::<u32>::builder().retry(1).build()) as Arc<dyn Policy<u32>>)
            .collect();
        let executor = Executor::new(PolicyChain::new(policies).unwrap().as_policy());
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.to_async(&rt).iter(|| async {
                let op = operation_fn(|| async { Ok::<u32, Error>(200) });
                executor.execute(&op).await.unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_success_path, bench_chain_depth);
criterion_main!(benches);
