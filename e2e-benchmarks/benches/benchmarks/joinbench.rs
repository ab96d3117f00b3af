use criterion::{black_box, criterion_group, Criterion};

use crate::benchmarks::benchtemplate::BenchTemplate;
use e2e_benchmarks::Scale;
use queryexe::JoinBuilder;

fn bench_join(c: &mut Criterion, name: &str, scale: Scale) {
    let data = scale.data_set();
    data.bench_store(c, name, |store| {
        let builder = JoinBuilder::new(store).unwrap();
        black_box(builder.build_detail_join().count());
    });
}

fn bench_join_tiny(c: &mut Criterion) {
    bench_join(c, "join_tiny", Scale::Tiny);
}

fn bench_join_small(c: &mut Criterion) {
    bench_join(c, "join_small", Scale::Small);
}

fn bench_join_large(c: &mut Criterion) {
    bench_join(c, "join_large", Scale::Large);
}

criterion_group! {
    name = joinbench;
    config = Criterion::default().sample_size(10);
    targets =
    bench_join_tiny,
    bench_join_small,
    bench_join_large,
}
