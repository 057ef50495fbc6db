use log::debug;

use crate::{
    error::Result,
    sql::{
        engine::Catalog,
        executor::{ResultSet, resolve_column},
        parser::ast::{JoinType, Operator},
        types::Value,
    },
};

use super::Executor;

/// Nested loop join executor - equi-joins the source rows with a table
///
/// Output columns are the source columns followed by the table's columns
/// qualified as `alias.column`. Unmatched source rows (LEFT/FULL) keep their
/// place in source order, padded with nulls; unmatched table rows
/// (RIGHT/FULL) come last.
pub struct NestedLoopJoin<C: Catalog> {
    source: Box<dyn Executor<C>>,
    table_name: String,
    join_type: JoinType,
    left: String,
    right: String,
    right_alias: String,
}

impl<C: Catalog> NestedLoopJoin<C> {
    pub fn new(
        source: Box<dyn Executor<C>>,
        table_name: String,
        join_type: JoinType,
        left: String,
        right: String,
        right_alias: String,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            table_name,
            join_type,
            left,
            right,
            right_alias,
        })
    }
}

impl<C: Catalog> Executor<C> for NestedLoopJoin<C> {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let (lcols, lrows) = self.source.execute(catalog)?.into_scan()?;
        let table = catalog.must_get_table(&self.table_name)?;
        let rcols = table.schema().column_names();
        let rrows = table.select_all();

        let lpos = resolve_column(&lcols, &self.left)?;
        let prefix = format!("{}.", self.right_alias);
        let rpos = resolve_column(
            &rcols,
            self.right.strip_prefix(prefix.as_str()).unwrap_or(&self.right),
        )?;

        let mut new_cols = lcols.clone();
        new_cols.extend(rcols.iter().map(|c| format!("{}{}", prefix, c)));

        let mut new_rows = Vec::new();
        let mut right_matched = vec![false; rrows.len()];
        for lrow in &lrows {
            let mut matched = false;
            for (i, rrow) in rrows.iter().enumerate() {
                if keys_match(&lrow[lpos], &rrow[rpos]) {
                    let mut row = lrow.clone();
                    row.extend(rrow.iter().cloned());
                    new_rows.push(row);
                    matched = true;
                    right_matched[i] = true;
                }
            }

            if !matched && self.join_type.keeps_left() {
                let mut row = lrow.clone();
                row.extend(std::iter::repeat_n(Value::Null, rcols.len()));
                new_rows.push(row);
            }
        }

        if self.join_type.keeps_right() {
            for (rrow, _) in rrows.iter().zip(&right_matched).filter(|(_, m)| !**m) {
                let mut row = vec![Value::Null; lcols.len()];
                row.extend(rrow.iter().cloned());
                new_rows.push(row);
            }
        }

        debug!(
            "{:?} join with {} produced {} rows",
            self.join_type,
            self.table_name,
            new_rows.len()
        );
        Ok(ResultSet::Scan {
            columns: new_cols,
            rows: new_rows,
        })
    }
}

/// Join keys match when both are non-null and equal
fn keys_match(left: &Value, right: &Value) -> bool {
    !left.is_null() && !right.is_null() && left.satisfies(&Operator::Equal, right)
}

#[cfg(test)]
mod tests {
    use super::NestedLoopJoin;
    use crate::{
        error::Result,
        sql::{
            engine::Catalog,
            executor::{Executor, ResultSet},
            parser::ast::JoinType,
            schema::{Column, Table},
            types::{DataType, Row, Value},
        },
        storage::memory::MemoryCatalog,
    };

    struct Rows(Vec<String>, Vec<Row>);

    impl Executor<MemoryCatalog> for Rows {
        fn execute(self: Box<Self>, _: &mut MemoryCatalog) -> Result<ResultSet> {
            Ok(ResultSet::Scan {
                columns: self.0,
                rows: self.1,
            })
        }
    }

    fn catalog() -> Result<MemoryCatalog> {
        let mut catalog = MemoryCatalog::new();
        catalog.create_table(Table {
            name: "orders".into(),
            columns: vec![
                Column { name: "user_id".into(), datatype: DataType::Integer },
                Column { name: "amount".into(), datatype: DataType::Integer },
            ],
            primary_key: None,
        })?;
        let orders = catalog.must_get_table_mut("orders")?;
        let cols = vec!["user_id".to_string(), "amount".to_string()];
        for (uid, amount) in [(Value::Integer(1), 10), (Value::Null, 20), (Value::Integer(7), 30)] {
            orders.insert(&cols, vec![uid, Value::Integer(amount)])?;
        }
        Ok(catalog)
    }

    fn users() -> Box<dyn Executor<MemoryCatalog>> {
        Box::new(Rows(
            vec!["id".into()],
            vec![vec![Value::Integer(1)], vec![Value::Null], vec![Value::Integer(2)]],
        ))
    }

    fn join(join_type: JoinType) -> Result<(Vec<String>, Vec<Row>)> {
        let mut catalog = catalog()?;
        let node = NestedLoopJoin::new(
            users(),
            "orders".into(),
            join_type,
            "u.id".into(),
            "o.user_id".into(),
            "o".into(),
        );
        match node.execute(&mut catalog)? {
            ResultSet::Scan { columns, rows } => Ok((columns, rows)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inner_join_skips_nulls() -> Result<()> {
        let (columns, rows) = join(JoinType::Inner)?;
        assert_eq!(columns, vec!["id", "o.user_id", "o.amount"]);
        assert_eq!(rows, vec![vec![Value::Integer(1), Value::Integer(1), Value::Integer(10)]]);
        Ok(())
    }

    #[test]
    fn test_full_join() -> Result<()> {
        let (_, rows) = join(JoinType::Full)?;
        let amounts: Vec<_> = rows.iter().map(|r| (r[0].clone(), r[2].clone())).collect();
        assert_eq!(
            amounts,
            vec![
                (Value::Integer(1), Value::Integer(10)),
                (Value::Null, Value::Null),
                (Value::Integer(2), Value::Null),
                (Value::Null, Value::Integer(20)),
                (Value::Null, Value::Integer(30)),
            ]
        );
        assert_eq!(join(JoinType::Left)?.1.len(), 3);
        assert_eq!(join(JoinType::Right)?.1.len(), 3);
        Ok(())
    }
}
