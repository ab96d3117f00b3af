use crate::table_store::{TableData, TableStore};
use common::{EngineConfig, PizzaError, TableName};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;

/// Read every row of a headered csv file, failing on the first bad row.
fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PizzaError> {
    debug!("memstore::csv_utils trying to open file, path: {:?}", path);
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                error!("Could not read row {} from {:?}: {}", line + 1, path, e);
                return Err(PizzaError::ValidationError(format!(
                    "{}: row {}: {}",
                    path.display(),
                    line + 1,
                    e
                )));
            }
        }
    }
    Ok(rows)
}

/// Import csv data into a table of the store.
///
/// The whole file is parsed before the store is touched, so a bad row leaves
/// the previous snapshot of the table in place.
///
/// # Arguments
///
/// * `store` - Store to load the table into.
/// * `table` - Base table the file holds.
/// * `path` - Path to the csv file.
pub fn import_table<P: AsRef<Path>>(
    store: &TableStore,
    table: TableName,
    path: P,
) -> Result<usize, PizzaError> {
    let path = path.as_ref();
    let data: TableData = match table {
        TableName::Orders => read_rows::<common::Order>(path)?.into(),
        TableName::OrderDetails => read_rows::<common::OrderDetail>(path)?.into(),
        TableName::Pizzas => read_rows::<common::Pizza>(path)?.into(),
        TableName::PizzaTypes => read_rows::<common::PizzaType>(path)?.into(),
    };
    let imported = data.len();
    store.load(table.as_str(), data)?;
    info!("Num records imported into {}: {:?}", table, imported);
    Ok(imported)
}

/// Import all four tables from the configured data directory.
pub fn import_dir(store: &TableStore, config: &EngineConfig) -> Result<(), PizzaError> {
    for table in TableName::ALL.iter() {
        import_table(store, *table, config.table_path(*table))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testutil::*;
    use std::fs;
    use temp_testdir::TempDir;

    const ORDERS: &str = "order_id,order_date,order_time\n\
                          1,2015-01-01,11:38:36\n\
                          2,2015-01-01,11:57:40\n";
    const ORDER_DETAILS: &str = "order_details_id,order_id,pizza_id,quantity\n\
                                 1,1,hawaiian_m,1\n\
                                 2,2,classic_dlx_m,2\n";
    const PIZZAS: &str = "pizza_id,pizza_type_id,size,price\n\
                          hawaiian_m,hawaiian,M,13.25\n\
                          classic_dlx_m,classic_dlx,M,16\n";
    const PIZZA_TYPES: &str = "pizza_type_id,name,category,ingredients\n\
                               hawaiian,The Hawaiian Pizza,Classic,\"Sliced Ham, Pineapple, Mozzarella Cheese\"\n\
                               classic_dlx,The Classic Deluxe Pizza,Classic,\"Pepperoni, Mushrooms\"\n";

    fn write_data_dir() -> TempDir {
        let tdir = TempDir::new(gen_random_dir(), true);
        fs::write(tdir.join("orders.csv"), ORDERS).unwrap();
        fs::write(tdir.join("order_details.csv"), ORDER_DETAILS).unwrap();
        fs::write(tdir.join("pizzas.csv"), PIZZAS).unwrap();
        fs::write(tdir.join("pizza_types.csv"), PIZZA_TYPES).unwrap();
        tdir
    }

    #[test]
    fn test_import_dir() {
        let tdir = write_data_dir();
        let config = EngineConfig {
            data_dir: tdir.to_path_buf(),
            ..EngineConfig::default()
        };
        let store = TableStore::new();
        import_dir(&store, &config).unwrap();

        let orders = store.orders().unwrap();
        assert_eq!(2, orders.len());
        assert_eq!("11:57:40", orders[1].order_time.to_string());
        let pizzas = store.pizzas().unwrap();
        assert_eq!("13.25", pizzas[0].price.to_string());
        assert_eq!("16", pizzas[1].price.to_string());
        let types = store.pizza_types().unwrap();
        assert_eq!(3, types[0].ingredients.len());
        assert_eq!(2, store.order_details().unwrap()[1].quantity);
    }

    #[test]
    fn test_bad_row_keeps_previous_snapshot() {
        let tdir = write_data_dir();
        let store = TableStore::new();
        import_table(&store, TableName::Orders, tdir.join("orders.csv")).unwrap();

        let bad = tdir.join("bad_orders.csv");
        fs::write(&bad, "order_id,order_date,order_time\n3,2015-13-40,10:00:00\n").unwrap();
        let res = import_table(&store, TableName::Orders, &bad);
        assert!(matches!(res, Err(PizzaError::ValidationError(_))));
        assert_eq!(2, store.orders().unwrap().len());
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let tdir = write_data_dir();
        let bad = tdir.join("bad_details.csv");
        fs::write(&bad, "order_details_id,order_id,pizza_id,quantity\n1,1,hawaiian_m,-3\n").unwrap();
        let store = TableStore::new();
        let res = import_table(&store, TableName::OrderDetails, &bad);
        assert!(matches!(res, Err(PizzaError::ValidationError(_))));
        assert!(!store.is_loaded(TableName::OrderDetails));
    }

    #[test]
    fn test_missing_file() {
        let tdir = write_data_dir();
        let store = TableStore::new();
        let res = import_table(&store, TableName::Pizzas, tdir.join("nope.csv"));
        assert!(matches!(res, Err(PizzaError::IOError(_))));
        assert!(!store.is_loaded(TableName::Pizzas));
    }
}
