use crate::{PizzaError, TableName};
use std::fs;
use std::path::{Path, PathBuf};

/// Engine settings. Read from a JSON file; every key is optional.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the table CSV files.
    pub data_dir: PathBuf,
    pub orders_file: String,
    pub order_details_file: String,
    pub pizzas_file: String,
    pub pizza_types_file: String,
    /// Decimal places kept by the averaged catalog outputs.
    pub avg_precision: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            data_dir: PathBuf::from("data/"),
            orders_file: String::from("orders.csv"),
            order_details_file: String::from("order_details.csv"),
            pizzas_file: String::from("pizzas.csv"),
            pizza_types_file: String::from("pizza_types.csv"),
            avg_precision: 2,
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the JSON config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PizzaError> {
        debug!("Reading engine config from {:?}", path.as_ref());
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, PizzaError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Full path of the CSV file backing a table.
    pub fn table_path(&self, table: TableName) -> PathBuf {
        let file = match table {
            TableName::Orders => &self.orders_file,
            TableName::OrderDetails => &self.order_details_file,
            TableName::Pizzas => &self.pizzas_file,
            TableName::PizzaTypes => &self.pizza_types_file,
        };
        self.data_dir.join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::gen_random_dir;
    use temp_testdir::TempDir;

    #[test]
    fn test_partial_config() {
        let config = EngineConfig::from_json(r#"{"data_dir": "/tmp/pizza", "avg_precision": 1}"#)
            .unwrap();
        assert_eq!(1, config.avg_precision);
        assert_eq!("pizzas.csv", config.pizzas_file);
        assert_eq!(
            PathBuf::from("/tmp/pizza/order_details.csv"),
            config.table_path(TableName::OrderDetails)
        );
    }

    #[test]
    fn test_bad_config() {
        let err = EngineConfig::from_json("{\"avg_precision\": \"two\"}").unwrap_err();
        assert!(matches!(err, PizzaError::IOError(_)));
    }

    #[test]
    fn test_from_file() {
        let tdir = TempDir::new(gen_random_dir(), true);
        let path = tdir.join("engine.json");
        fs::write(&path, r#"{"orders_file": "orders_2015.csv"}"#).unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!("orders_2015.csv", config.orders_file);
        assert_eq!(2, config.avg_precision);

        let missing = EngineConfig::from_file(tdir.join("missing.json"));
        assert!(matches!(missing, Err(PizzaError::IOError(_))));
    }
}
