use std::collections::BTreeMap;

use log::info;

use crate::{
    error::{Error, Result},
    sql::{engine::Catalog, schema::Table},
    storage::table::TableStore,
};

/// In-memory table registry
///
/// Tables live for the lifetime of the catalog. Lookups try the exact name
/// first and fall back to a case-insensitive match.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: BTreeMap<String, TableStore>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self { tables: BTreeMap::new() }
    }

    /// Names of all registered tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Key under which `name` is registered
    fn resolve(&self, name: &str) -> Option<String> {
        if self.tables.contains_key(name) {
            return Some(name.to_string());
        }
        self.tables
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()
    }
}

impl Catalog for MemoryCatalog {
    fn create_table(&mut self, table: Table) -> Result<()> {
        if self.tables.contains_key(&table.name) {
            return Err(Error::TableExists(table.name));
        }
        info!("created table {} with {} columns", table.name, table.columns.len());
        self.tables.insert(table.name.clone(), TableStore::new(table));
        Ok(())
    }

    fn get_table(&self, name: &str) -> Option<&TableStore> {
        let key = self.resolve(name)?;
        self.tables.get(&key)
    }

    fn get_table_mut(&mut self, name: &str) -> Option<&mut TableStore> {
        let key = self.resolve(name)?;
        self.tables.get_mut(&key)
    }
}
