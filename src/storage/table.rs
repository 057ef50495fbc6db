use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::{
    error::{Error, Result},
    sql::{
        parser::ast::Operator,
        schema::Table,
        types::{DataType, Row, Value, cast_comparand},
    },
};

/// Schema-aware row container.
///
/// Rows are positional (one value per declared column, in schema order) and
/// kept in insertion order. Every value stored has been cast to its column type.
#[derive(Debug, Clone)]
pub struct TableStore {
    schema: Table,
    rows: Vec<Row>,
}

impl TableStore {
    pub fn new(schema: Table) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Table {
        &self.schema
    }

    /// Inserts one row given as column/value pairs.
    ///
    /// Every declared column must be supplied. The row is fully validated
    /// (casting and primary-key uniqueness) before it is appended.
    pub fn insert(&mut self, columns: &[String], values: Vec<Value>) -> Result<()> {
        if columns.len() != values.len() {
            return Err(Error::Internal(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        for col in columns {
            self.schema.get_col_index(col)?;
        }

        let mut inputs: BTreeMap<&str, Value> = columns
            .iter()
            .map(String::as_str)
            .zip(values)
            .collect();

        let mut row = Vec::with_capacity(self.schema.columns.len());
        for column in &self.schema.columns {
            let raw = inputs
                .remove(column.name.as_str())
                .ok_or_else(|| Error::MissingColumn(column.name.clone()))?;
            row.push(column.datatype.cast(raw)?);
        }

        if let Some(pos) = self.schema.primary_key_index() {
            let key = &row[pos];
            if !key.is_null() && self.rows.iter().any(|r| r[pos].satisfies(&Operator::Equal, key)) {
                return Err(Error::DuplicateKey {
                    column: self.schema.columns[pos].name.clone(),
                    value: key.to_string(),
                });
            }
        }

        debug!("insert into {}: {:?}", self.schema.name, row);
        self.rows.push(row);
        Ok(())
    }

    /// All rows in insertion order
    pub fn select_all(&self) -> &[Row] {
        &self.rows
    }

    pub fn column_type(&self, name: &str) -> Option<DataType> {
        self.schema.column_type(name)
    }

    /// Applies `sets` to every row matching `column = value` (every row when
    /// no filter is given). Returns the number of rows changed.
    ///
    /// All casts and the primary-key check run against a staged copy; the
    /// table is only touched once the whole update is known to be valid.
    pub fn update(
        &mut self,
        sets: &BTreeMap<String, Value>,
        filter: Option<(&str, Value)>,
    ) -> Result<usize> {
        let mut assignments = Vec::with_capacity(sets.len());
        for (col, raw) in sets {
            let pos = self.schema.get_col_index(col)?;
            let value = self.schema.columns[pos].datatype.cast(raw.clone())?;
            assignments.push((pos, value));
        }
        let filter = filter.map(|(col, raw)| self.bind_filter(col, raw)).transpose()?;

        let mut staged = self.rows.clone();
        let mut count = 0;
        for row in staged.iter_mut() {
            if let Some((pos, value)) = &filter {
                if !row[*pos].satisfies(&Operator::Equal, value) {
                    continue;
                }
            }
            for (pos, value) in &assignments {
                row[*pos] = value.clone();
            }
            count += 1;
        }

        if let Some(pk) = self.schema.primary_key_index() {
            if assignments.iter().any(|(pos, _)| *pos == pk) {
                self.check_unique(&staged, pk)?;
            }
        }

        self.rows = staged;
        Ok(count)
    }

    /// Removes every row matching `column = value`, returns how many were removed
    pub fn delete(&mut self, column: &str, value: Value) -> Result<usize> {
        let (pos, value) = self.bind_filter(column, value)?;
        let before = self.rows.len();
        self.rows.retain(|row| !row[pos].satisfies(&Operator::Equal, &value));
        Ok(before - self.rows.len())
    }

    /// Resolves a WHERE column and casts the literal for comparison with it
    fn bind_filter(&self, column: &str, raw: Value) -> Result<(usize, Value)> {
        let pos = self.schema.get_col_index(column)?;
        Ok((pos, cast_comparand(Some(self.schema.columns[pos].datatype), raw)?))
    }

    fn check_unique(&self, rows: &[Row], pk: usize) -> Result<()> {
        let mut seen = HashSet::new();
        for row in rows {
            let key = &row[pk];
            if key.is_null() {
                continue;
            }
            if !seen.insert(bincode::serialize(key)?) {
                return Err(Error::DuplicateKey {
                    column: self.schema.columns[pk].name.clone(),
                    value: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::TableStore;
    use crate::{
        error::{Error, Result},
        sql::{
            schema::{Column, Table},
            types::{DataType, Value},
        },
    };

    fn users() -> TableStore {
        TableStore::new(Table {
            name: "users".into(),
            columns: vec![
                Column { name: "id".into(), datatype: DataType::Integer },
                Column { name: "name".into(), datatype: DataType::Text },
                Column { name: "active".into(), datatype: DataType::Boolean },
            ],
            primary_key: Some("id".into()),
        })
    }

    fn cols() -> Vec<String> {
        vec!["id".into(), "name".into(), "active".into()]
    }

    #[test]
    fn test_insert_preserves_order_and_casts() -> Result<()> {
        let mut t = users();
        t.insert(&cols(), vec![Value::Integer(2), Value::Integer(7), Value::Integer(1)])?;
        t.insert(
            &["active".to_string(), "name".to_string(), "id".to_string()],
            vec![Value::Null, Value::String("b".into()), Value::String("1".into())],
        )?;

        assert_eq!(
            t.select_all(),
            &[
                vec![Value::Integer(2), Value::String("7".into()), Value::Boolean(true)],
                vec![Value::Integer(1), Value::String("b".into()), Value::Null],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_insert_missing_and_unknown_columns() {
        let mut t = users();
        assert!(matches!(
            t.insert(&["id".to_string(), "name".to_string()], vec![Value::Integer(1), Value::Null]),
            Err(Error::MissingColumn(c)) if c == "active"
        ));
        let mut with_extra = cols();
        with_extra.push("age".into());
        assert!(matches!(
            t.insert(&with_extra, vec![Value::Integer(1), Value::Null, Value::Null, Value::Null]),
            Err(Error::ColumnNotFound(_))
        ));
        assert!(t.select_all().is_empty());
    }

    #[test]
    fn test_insert_duplicate_key() -> Result<()> {
        let mut t = users();
        t.insert(&cols(), vec![Value::Integer(1), Value::Null, Value::Null])?;
        let err = t.insert(&cols(), vec![Value::Integer(1), Value::String("x".into()), Value::Null]);
        assert!(matches!(err, Err(Error::DuplicateKey { .. })));
        assert_eq!(t.select_all().len(), 1);

        // NULL keys never collide
        t.insert(&cols(), vec![Value::Null, Value::Null, Value::Null])?;
        t.insert(&cols(), vec![Value::Null, Value::Null, Value::Null])?;
        assert_eq!(t.select_all().len(), 3);
        Ok(())
    }

    #[test]
    fn test_column_type() {
        let t = users();
        assert_eq!(t.column_type("id"), Some(DataType::Integer));
        assert_eq!(t.column_type("name"), Some(DataType::Text));
        assert_eq!(t.column_type("active"), Some(DataType::Boolean));
        assert_eq!(t.column_type("Active"), None);
    }

    #[test]
    fn test_filters_compare_fractions() -> Result<()> {
        let mut t = users();
        t.insert(&cols(), vec![Value::Integer(1), Value::Null, Value::Null])?;
        assert_eq!(t.delete("id", Value::Float(1.5))?, 0);
        assert_eq!(t.delete("id", Value::String("1.0".into()))?, 1);
        Ok(())
    }

    #[test]
    fn test_update_and_delete() -> Result<()> {
        let mut t = users();
        for i in 1..=3 {
            t.insert(&cols(), vec![Value::Integer(i), Value::String("n".into()), Value::Integer(0)])?;
        }

        let mut sets = BTreeMap::new();
        sets.insert("name".to_string(), Value::String("lead".into()));
        assert_eq!(t.update(&sets, Some(("id", Value::String("2".into()))))?, 1);
        assert_eq!(t.select_all()[1][1], Value::String("lead".into()));
        assert_eq!(t.select_all()[0][1], Value::String("n".into()));

        let mut sets = BTreeMap::new();
        sets.insert("id".to_string(), Value::Integer(9));
        assert!(matches!(t.update(&sets, None), Err(Error::DuplicateKey { .. })));
        assert_eq!(t.select_all()[2][0], Value::Integer(3));

        assert_eq!(t.delete("name", Value::String("n".into()))?, 2);
        assert_eq!(t.select_all().len(), 1);
        assert!(matches!(t.delete("nope", Value::Null), Err(Error::ColumnNotFound(_))));
        Ok(())
    }
}
