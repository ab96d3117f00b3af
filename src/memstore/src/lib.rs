#[macro_use]
extern crate log;

pub mod csv_utils;
pub mod table_store;

pub use table_store::{TableData, TableStore};
