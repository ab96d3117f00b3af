use criterion::{black_box, criterion_group, Criterion};

use crate::benchmarks::benchtemplate::BenchTemplate;
use e2e_benchmarks::Scale;
use queryexe::{
    group_by, rolling_sum, AggSpec, JoinBuilder, QueryCatalog, QueryId, SortKey, WindowSpec,
};

fn bench_group_by_category(c: &mut Criterion) {
    let data = Scale::Small.data_set();
    data.bench_store(c, "group_by_category", |store| {
        let rel = JoinBuilder::new(store).unwrap().detail_relation();
        black_box(group_by(&rel, &["category"], &[AggSpec::sum("revenue", "total_price")]).unwrap());
    });
}

fn bench_rolling_revenue(c: &mut Criterion) {
    let data = Scale::Small.data_set();
    data.bench_store(c, "rolling_revenue", |store| {
        let rel = JoinBuilder::new(store).unwrap().detail_relation();
        let spec = WindowSpec::new()
            .partition_by("category")
            .order_by(SortKey::asc("order_date"));
        black_box(rolling_sum(rel, &spec, "total_price", "cum_revenue").unwrap());
    });
}

fn bench_cumulative_revenue(c: &mut Criterion) {
    let data = Scale::Small.data_set();
    data.bench_store(c, "cumulative_revenue", |store| {
        black_box(QueryCatalog::new(store).run(QueryId::CumulativeRevenue).unwrap());
    });
}

fn bench_catalog(c: &mut Criterion) {
    let data = Scale::Small.data_set();
    data.bench_store(c, "run_all", |store| {
        black_box(QueryCatalog::new(store).run_all().unwrap());
    });
}

criterion_group! {
    name = querybench;
    config = Criterion::default().sample_size(10);
    targets =
    bench_group_by_category,
    bench_rolling_revenue,
    bench_cumulative_revenue,
    bench_catalog,
}
