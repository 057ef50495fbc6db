use std::collections::BTreeMap;

use log::info;

use crate::{
    error::Result,
    sql::{engine::Catalog, executor::ResultSet, types::Value},
};

use super::Executor;

/// INSERT executor
pub struct Insert {
    table_name: String,
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Insert {
    pub fn new(table_name: String, columns: Vec<String>, values: Vec<Value>) -> Box<Self> {
        Box::new(Self {
            table_name,
            columns,
            values,
        })
    }
}

impl<C: Catalog> Executor<C> for Insert {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let table = catalog.must_get_table_mut(&self.table_name)?;
        table.insert(&self.columns, self.values)?;
        info!("inserted 1 row into {}", table.schema().name);
        Ok(ResultSet::Insert { count: 1 })
    }
}

/// UPDATE executor, reports the count and the table as it stands afterwards
pub struct Update {
    table_name: String,
    columns: BTreeMap<String, Value>,
    where_clause: Option<(String, Value)>,
}

impl Update {
    pub fn new(
        table_name: String,
        columns: BTreeMap<String, Value>,
        where_clause: Option<(String, Value)>,
    ) -> Box<Self> {
        Box::new(Self {
            table_name,
            columns,
            where_clause,
        })
    }
}

impl<C: Catalog> Executor<C> for Update {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let table = catalog.must_get_table_mut(&self.table_name)?;
        let count = table.update(
            &self.columns,
            self.where_clause
                .as_ref()
                .map(|(col, value)| (col.as_str(), value.clone())),
        )?;
        info!("updated {} rows in {}", count, table.schema().name);
        Ok(ResultSet::Update {
            count,
            columns: table.schema().column_names(),
            rows: table.select_all().to_vec(),
        })
    }
}

/// DELETE executor
pub struct Delete {
    table_name: String,
    where_clause: (String, Value),
}

impl Delete {
    pub fn new(table_name: String, where_clause: (String, Value)) -> Box<Self> {
        Box::new(Self {
            table_name,
            where_clause,
        })
    }
}

impl<C: Catalog> Executor<C> for Delete {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let table = catalog.must_get_table_mut(&self.table_name)?;
        let (col, value) = self.where_clause;
        let count = table.delete(&col, value)?;
        info!("deleted {} rows from {}", count, table.schema().name);
        Ok(ResultSet::Delete { count })
    }
}
