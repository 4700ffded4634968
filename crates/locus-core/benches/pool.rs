//! Pool create/destroy/lookup throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use locus_core::{Handle, Pool};

fn create_destroy(c: &mut Criterion) {
    c.bench_function("pool_create_destroy_1k", |b| {
        let mut pool: Pool<u64> = Pool::with_capacity(1024);
        let mut handles: Vec<Handle> = Vec::with_capacity(1024);
        b.iter(|| {
            for i in 0..1024 {
                handles.push(pool.create(i));
            }
            for handle in handles.drain(..) {
                pool.destroy(handle);
            }
        });
    });
}

fn lookup(c: &mut Criterion) {
    let mut pool: Pool<u64> = Pool::with_capacity(1024);
    let handles: Vec<Handle> = (0..1024).map(|i| pool.create(i)).collect();

    c.bench_function("pool_get_1k", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for &handle in &handles {
                sum += *pool.get(black_box(handle));
            }
            black_box(sum)
        });
    });
}

criterion_group!(benches, create_destroy, lookup);
criterion_main!(benches);
