#[macro_use]
extern crate log;

pub mod aggregate;
pub mod calendar;
pub mod catalog;
pub mod join;
pub mod relation;
pub mod window;

pub use aggregate::{group_by, AggOp, AggSpec};
pub use catalog::{QueryCatalog, QueryId};
pub use join::{DetailJoin, JoinBuilder, JoinedRow};
pub use relation::{Relation, SortKey, SortOrder};
pub use window::{avg_over, rolling_sum, row_number, row_number_unordered, WindowSpec};
