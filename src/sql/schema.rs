use std::collections::HashSet;

use crate::{
    error::{Error, Result},
    sql::types::DataType,
};

/// Table schema definition
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Name of the primary-key column, if any
    pub primary_key: Option<String>,
}

impl Table {
    /// Validates table schema
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table {} has no columns",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column {} in table {}",
                    column.name, self.name
                )));
            }
        }

        if let Some(pk) = &self.primary_key {
            if !seen.contains(pk.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "primary key {} is not a column of table {}",
                    pk, self.name
                )));
            }
        }

        Ok(())
    }

    /// Returns the column index for a given column name
    pub fn get_col_index(&self, col_name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == col_name)
            .ok_or(Error::ColumnNotFound(col_name.to_string()))
    }

    /// Declared type of a column, `None` for unknown columns
    pub fn column_type(&self, col_name: &str) -> Option<DataType> {
        self.columns
            .iter()
            .find(|c| c.name == col_name)
            .map(|c| c.datatype)
    }

    /// Position of the primary-key column
    pub fn primary_key_index(&self) -> Option<usize> {
        let pk = self.primary_key.as_ref()?;
        self.columns.iter().position(|c| &c.name == pk)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Column schema definition
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
}

#[cfg(test)]
mod tests {
    use super::{Column, Table};
    use crate::{
        error::{Error, Result},
        sql::types::DataType,
    };

    fn users(primary_key: Option<&str>) -> Table {
        Table {
            name: "users".into(),
            columns: vec![
                Column { name: "id".into(), datatype: DataType::Integer },
                Column { name: "name".into(), datatype: DataType::Text },
            ],
            primary_key: primary_key.map(String::from),
        }
    }

    #[test]
    fn test_validate() -> Result<()> {
        users(Some("id")).validate()?;
        users(None).validate()?;
        assert!(matches!(users(Some("nope")).validate(), Err(Error::InvalidSchema(_))));

        let mut dup = users(None);
        dup.columns.push(Column { name: "id".into(), datatype: DataType::Boolean });
        assert!(matches!(dup.validate(), Err(Error::InvalidSchema(_))));
        Ok(())
    }

    #[test]
    fn test_lookups() -> Result<()> {
        let table = users(Some("name"));
        assert_eq!(table.get_col_index("name")?, 1);
        assert_eq!(table.column_type("id"), Some(DataType::Integer));
        assert_eq!(table.column_type("missing"), None);
        assert_eq!(table.primary_key_index(), Some(1));
        assert!(table.get_col_index("missing").is_err());
        Ok(())
    }
}
