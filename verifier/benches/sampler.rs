use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use keycheck_verifier::signer_subsets;

fn bench_signer_subsets(c: &mut Criterion) {
    let mut group = c.benchmark_group("signer_subsets");
    for (n, t) in [(16u32, 11u32), (128, 86), (1024, 683), (8192, 5462)] {
        group.bench_function(BenchmarkId::from_parameter(format!("n={} t={}", n, t)), |b| {
            b.iter(|| signer_subsets(n, t));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_signer_subsets);
criterion_main!(benches);
