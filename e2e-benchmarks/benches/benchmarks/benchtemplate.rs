use common::DataSet;
use memstore::TableStore;

use criterion::Criterion;

/// Loads a data set once, then benchmarks a routine against the loaded store.
pub trait BenchTemplate {
    fn bench_store<F>(&self, c: &mut Criterion, name: &str, routine: F)
    where
        F: FnMut(&TableStore);
}

impl BenchTemplate for DataSet {
    fn bench_store<F>(&self, c: &mut Criterion, name: &str, mut routine: F)
    where
        F: FnMut(&TableStore),
    {
        let store = TableStore::new();
        if let Err(e) = store.load_data_set(self.clone()) {
            panic!("could not load bench data for {}: {}", name, e);
        }
        c.bench_function(name, |b| b.iter(|| routine(&store)));
    }
}
