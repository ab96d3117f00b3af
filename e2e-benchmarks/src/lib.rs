use common::testutil::gen_random_data_set;
use common::DataSet;

/// Generated data set sizes used across the benchmarks.
#[derive(Debug, Clone, Copy)]
pub enum Scale {
    Tiny,
    Small,
    Large,
}

impl Scale {
    pub fn num_orders(&self) -> usize {
        match self {
            Scale::Tiny => 100,
            Scale::Small => 2_000,
            Scale::Large => 20_000,
        }
    }

    /// A random data set with up to four lines per order.
    pub fn data_set(&self) -> DataSet {
        gen_random_data_set(self.num_orders(), 4)
    }
}
