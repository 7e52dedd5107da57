//! Dispatch throughput benchmarks.
//!
//! Measures the synchronous fast path of `load()` and a coalesced burst
//! that goes through the worker and the owner re-check.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parking_lot::Mutex;
use predicated_loader::{listener_fn, BoxError, Dispatcher, DispatcherConfig, LoadError, MainLoop};

fn bench_immediate_load(c: &mut Criterion) {
    let main_loop = MainLoop::new();
    let loader = Dispatcher::<u64>::new(Arc::new(main_loop.handle())).unwrap();

    let mut group = c.benchmark_group("load_immediate");
    group.throughput(Throughput::Elements(1));
    group.bench_function("present", |b| {
        b.iter(|| {
            loader.load(
                || -> Result<u64, BoxError> { Ok(0) },
                || -> Result<Option<u64>, BoxError> { Ok(Some(7)) },
                listener_fn(
                    |v: u64| {
                        black_box(v);
                    },
                    |_e: LoadError| {},
                ),
            );
        })
    });
    group.finish();

    loader.shutdown();
    loader.await_termination(Duration::from_secs(5));
}

fn bench_coalesced_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_coalesced");

    for burst in [4usize, 16, 64] {
        let main_loop = MainLoop::new();
        let loader = Dispatcher::<u64>::with_config(
            Arc::new(main_loop.handle()),
            DispatcherConfig::with_capacity(burst),
        )
        .unwrap();

        group.throughput(Throughput::Elements(burst as u64));
        group.bench_function(BenchmarkId::new("burst", burst), |b| {
            b.iter(|| {
                let slot: Arc<Mutex<Option<u64>>> = Arc::new(Mutex::new(None));
                let answered = Arc::new(AtomicUsize::new(0));

                for _ in 0..burst {
                    let read = slot.clone();
                    let write = slot.clone();
                    let done = answered.clone();
                    loader.load(
                        || -> Result<u64, BoxError> { Ok(black_box(0xABCD)) },
                        move || -> Result<Option<u64>, BoxError> { Ok(*read.lock()) },
                        listener_fn(
                            move |v: u64| {
                                *write.lock() = Some(v);
                                done.fetch_add(1, Ordering::Relaxed);
                            },
                            |_e: LoadError| {},
                        ),
                    );
                }

                main_loop.run_until(Duration::from_secs(5), || {
                    answered.load(Ordering::Relaxed) == burst
                });
            })
        });

        loader.shutdown();
        loader.await_termination(Duration::from_secs(5));
    }

    group.finish();
}

criterion_group!(benches, bench_immediate_load, bench_coalesced_burst);
criterion_main!(benches);
