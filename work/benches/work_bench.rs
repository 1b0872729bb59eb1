//! Benchmarks for work difficulty computation and validation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strand_types::{Epoch, Root};
use strand_work::{
    validate_work, work_difficulty, WorkContext, WorkThresholds, WorkVersion,
};

fn bench_difficulty(c: &mut Criterion) {
    let root = Root::new([0xAB; 32]);
    c.bench_function("work_difficulty", |b| {
        let mut nonce = 0u64;
        b.iter(|| {
            nonce = nonce.wrapping_add(1);
            black_box(work_difficulty(WorkVersion::Work1, black_box(&root), nonce))
        })
    });
}

fn bench_validate(c: &mut Criterion) {
    let root = Root::new([0xCD; 32]);
    let thresholds = WorkThresholds::dev();
    let ctx = WorkContext::new(Epoch::Epoch1, false, false);
    c.bench_function("validate_work", |b| {
        b.iter(|| {
            black_box(validate_work(
                &thresholds,
                WorkVersion::Work1,
                &ctx,
                black_box(&root),
                42,
            ))
        })
    });
}

criterion_group!(benches, bench_difficulty, bench_validate);
criterion_main!(benches);
