//! Benchmarks for pool provisioning and task throughput.
//!
//! Benchmarks cover:
//! - Planning a pool from configuration
//! - Submit/join round trips for each topology
//! - Parsing a properties file

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

use job_streamer_agent::builders::PoolProvisioner;
use job_streamer_agent::config::{keys, parse_properties, PoolConfiguration};
use job_streamer_agent::core::{PlainThreadFactory, ThreadFactory};

// ============================================================================
// Configurations
// ============================================================================

fn topologies() -> Vec<(&'static str, PoolConfiguration)> {
    vec![
        ("cached", PoolConfiguration::new()),
        (
            "fixed",
            PoolConfiguration::new()
                .with(keys::THREAD_POOL_TYPE, "fixed")
                .with(keys::THREAD_POOL_CORE_SIZE, "4"),
        ),
        (
            "configured_bounded",
            PoolConfiguration::new()
                .with(keys::THREAD_POOL_TYPE, "configured")
                .with(keys::THREAD_POOL_CORE_SIZE, "4")
                .with(keys::THREAD_POOL_MAX_SIZE, "8")
                .with(keys::THREAD_POOL_KEEP_ALIVE_TIME, "30")
                .with(keys::THREAD_POOL_QUEUE_CAPACITY, "256"),
        ),
        (
            "configured_handoff",
            PoolConfiguration::new()
                .with(keys::THREAD_POOL_TYPE, "configured")
                .with(keys::THREAD_POOL_CORE_SIZE, "4")
                .with(keys::THREAD_POOL_MAX_SIZE, "8")
                .with(keys::THREAD_POOL_KEEP_ALIVE_TIME, "30"),
        ),
    ]
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_plan(c: &mut Criterion) {
    let provisioner = PoolProvisioner::default();
    let mut group = c.benchmark_group("plan");
    for (name, config) in topologies() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &config, |b, config| {
            b.iter(|| black_box(provisioner.plan(config).unwrap()));
        });
    }
    group.finish();
}

fn bench_submit_join(c: &mut Criterion) {
    let provisioner = PoolProvisioner::default();
    let mut group = c.benchmark_group("submit_join");
    let batch: u64 = 100;
    group.throughput(Throughput::Elements(batch));

    for (name, config) in topologies() {
        let factory: Arc<dyn ThreadFactory> = Arc::new(PlainThreadFactory::new("bench-worker"));
        let provisioned = provisioner.provision(&config, factory).unwrap();
        let pool = provisioned.pool();
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let handles: Vec<_> = (0..batch).map(|i| pool.submit(move || black_box(i * 2)).unwrap()).collect();
                for handle in handles {
                    black_box(handle.join().unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_parse_properties(c: &mut Criterion) {
    let text = "\
# batch agent
thread-pool-type = configured
thread-pool-core-size = 4
thread-pool-max-size = 8
thread-pool-keep-alive-time = 30
thread-pool-queue-capacity = 256
thread-pool-rejection-policy = caller-runs
thread-factory = plain
";
    c.bench_function("parse_properties", |b| {
        b.iter(|| black_box(parse_properties(black_box(text))));
    });
}

criterion_group!(benches, bench_plan, bench_submit_join, bench_parse_properties);
criterion_main!(benches);
