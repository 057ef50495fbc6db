use crate::{
    error::{Error, Result},
    storage::table::TableStore,
};

use super::{executor::ResultSet, parser::Parser, plan::Plan, schema::Table};

/// Table registry the executors run against
///
/// Lookups fall back to a case-insensitive match when no table has the
/// exact name given.
pub trait Catalog {
    /// Registers a new table, fails if the name is already taken
    fn create_table(&mut self, table: Table) -> Result<()>;

    fn get_table(&self, name: &str) -> Option<&TableStore>;

    fn get_table_mut(&mut self, name: &str) -> Option<&mut TableStore>;

    /// Returns the table, or `TableNotFound` if it doesn't exist
    fn must_get_table(&self, name: &str) -> Result<&TableStore> {
        self.get_table(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    fn must_get_table_mut(&mut self, name: &str) -> Result<&mut TableStore> {
        self.get_table_mut(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }
}

/// SQL session for executing statements
///
/// The session owns its catalog, so statements run one at a time: each is
/// parsed, planned and executed to completion before `execute` returns.
pub struct Session<C: Catalog> {
    catalog: C,
}

impl<C: Catalog + 'static> Session<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Executes a single SQL statement
    pub fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        let stmt = Parser::new(sql).parse()?;
        Plan::build(stmt, &self.catalog)?.execute(&mut self.catalog)
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::{
        error::{Error, Result},
        sql::{executor::ResultSet, types::Value},
        storage::memory::MemoryCatalog,
    };

    fn setup() -> Result<Session<MemoryCatalog>> {
        let mut s = Session::new(MemoryCatalog::new());
        s.execute("CREATE TABLE users (id INT PRIMARY KEY, department TEXT, role TEXT, salary INT)")?;
        for sql in [
            "INSERT INTO users (id, department, role, salary) VALUES (1, 'Sales', 'Manager', 5000)",
            "INSERT INTO users (id, department, role, salary) VALUES (2, 'Sales', 'Rep', 3000)",
            "INSERT INTO users (id, department, role, salary) VALUES (3, 'Sales', 'Rep', null)",
            "INSERT INTO users (id, department, role, salary) VALUES (4, 'HR', 'Manager', 4500)",
        ] {
            s.execute(sql)?;
        }
        Ok(s)
    }

    fn scan(result: ResultSet) -> (Vec<String>, Vec<Vec<Value>>) {
        match result {
            ResultSet::Scan { columns, rows } => (columns, rows),
            other => panic!("expected scan result, got {:?}", other),
        }
    }

    fn int(i: i64) -> Value {
        Value::Integer(i)
    }

    fn text(s: &str) -> Value {
        Value::String(s.into())
    }

    fn ids(rows: &[Vec<Value>]) -> Vec<Value> {
        rows.iter().map(|r| r[0].clone()).collect()
    }

    #[test]
    fn test_group_by_count() -> Result<()> {
        let mut s = setup()?;
        let (columns, rows) =
            scan(s.execute("SELECT department, COUNT(*) AS cnt FROM users GROUP BY department")?);
        assert_eq!(columns, vec!["department".to_string(), "cnt".to_string()]);
        assert_eq!(rows, vec![vec![text("Sales"), int(3)], vec![text("HR"), int(1)]]);
        Ok(())
    }

    #[test]
    fn test_avg_skips_nulls() -> Result<()> {
        let mut s = setup()?;
        let (columns, rows) = scan(
            s.execute("SELECT AVG(salary) AS avgSalary FROM users WHERE department = 'Sales'")?,
        );
        assert_eq!(columns, vec!["avgSalary".to_string()]);
        assert_eq!(rows, vec![vec![Value::Float(4000.0)]]);
        Ok(())
    }

    #[test]
    fn test_delete_requires_where() -> Result<()> {
        let mut s = setup()?;
        assert_eq!(s.execute("DELETE FROM users"), Err(Error::DeleteRequiresWhere));
        let (_, rows) = scan(s.execute("SELECT * FROM users")?);
        assert_eq!(rows.len(), 4);

        assert_eq!(s.execute("DELETE FROM users WHERE role = 'Rep'")?, ResultSet::Delete { count: 2 });
        let (_, rows) = scan(s.execute("SELECT * FROM users")?);
        assert_eq!(ids(&rows), vec![int(1), int(4)]);
        Ok(())
    }

    #[test]
    fn test_update_then_select() -> Result<()> {
        let mut s = setup()?;
        match s.execute("UPDATE users SET role = 'Lead' WHERE id = 1")? {
            ResultSet::Update { count, rows, .. } => {
                assert_eq!(count, 1);
                assert_eq!(rows.len(), 4);
            }
            other => panic!("unexpected {:?}", other),
        }
        let (_, rows) = scan(s.execute("SELECT * FROM users WHERE id = 1")?);
        assert_eq!(rows, vec![vec![int(1), text("Sales"), text("Lead"), int(5000)]]);
        Ok(())
    }

    #[test]
    fn test_star_order_limit() -> Result<()> {
        let mut s = setup()?;
        let (_, rows) = scan(s.execute("SELECT * FROM users ORDER BY salary DESC LIMIT 2")?);
        assert_eq!(ids(&rows), vec![int(1), int(4)]);

        // Stable: equal keys keep insertion order, NULL sorts lowest
        let (_, rows) = scan(s.execute("SELECT * FROM users ORDER BY department")?);
        assert_eq!(ids(&rows), vec![int(4), int(1), int(2), int(3)]);
        let (_, rows) = scan(s.execute("SELECT * FROM users ORDER BY salary")?);
        assert_eq!(ids(&rows), vec![int(3), int(2), int(4), int(1)]);
        Ok(())
    }

    #[test]
    fn test_insertion_order() -> Result<()> {
        let mut s = setup()?;
        let (columns, rows) = scan(s.execute("SELECT * FROM users")?);
        assert_eq!(columns.len(), 4);
        assert_eq!(ids(&rows), vec![int(1), int(2), int(3), int(4)]);
        Ok(())
    }

    #[test]
    fn test_duplicate_key_leaves_table_untouched() -> Result<()> {
        let mut s = setup()?;
        let err = s.execute("INSERT INTO users (id, department, role, salary) VALUES (2, 'IT', 'Dev', 1)");
        assert!(matches!(err, Err(Error::DuplicateKey { .. })));
        let (_, rows) = scan(s.execute("SELECT * FROM users")?);
        assert_eq!(rows.len(), 4);
        Ok(())
    }

    #[test]
    fn test_single_condition_and_group_agree() -> Result<()> {
        let mut s = setup()?;
        for cond in ["salary > 3000", "department = 'Sales'", "salary <= 4500", "role = null"] {
            let (_, single) = scan(s.execute(&format!("SELECT * FROM users WHERE {}", cond))?);
            let (_, grouped) = scan(s.execute(&format!(
                "SELECT * FROM users WHERE {} AND {}",
                cond, cond
            ))?);
            assert_eq!(single, grouped, "{}", cond);
        }
        Ok(())
    }

    #[test]
    fn test_group_counts_sum_to_filtered() -> Result<()> {
        let mut s = setup()?;
        let (_, rows) = scan(s.execute(
            "SELECT role, COUNT(*) AS n FROM users WHERE salary >= 3000 GROUP BY role",
        )?);
        let total: i64 = rows
            .iter()
            .map(|r| match r[1] {
                Value::Integer(n) => n,
                _ => 0,
            })
            .sum();
        let (_, filtered) = scan(s.execute("SELECT * FROM users WHERE salary >= 3000")?);
        assert_eq!(total, filtered.len() as i64);
        Ok(())
    }

    #[test]
    fn test_pagination_matches_slicing() -> Result<()> {
        let mut s = setup()?;
        let (_, all) = scan(s.execute("SELECT id FROM users ORDER BY id DESC")?);
        for (limit, offset) in [(0, 0), (1, 0), (2, 1), (10, 3), (2, 10)] {
            let (_, page) = scan(s.execute(&format!(
                "SELECT id FROM users ORDER BY id DESC LIMIT {} OFFSET {}",
                limit, offset
            ))?);
            let expected: Vec<_> = all.iter().skip(offset).take(limit).cloned().collect();
            assert_eq!(page, expected, "limit {} offset {}", limit, offset);
        }
        Ok(())
    }

    #[test]
    fn test_having() -> Result<()> {
        let mut s = setup()?;
        let (_, rows) = scan(s.execute(
            "SELECT department, COUNT(*) AS cnt FROM users GROUP BY department HAVING cnt > 1",
        )?);
        assert_eq!(rows, vec![vec![text("Sales"), int(3)]]);

        let (_, rows) = scan(s.execute(
            "SELECT department, COUNT(*) AS cnt FROM users GROUP BY department HAVING MAX(salary) < 5000",
        )?);
        assert_eq!(rows, vec![vec![text("HR"), int(1)]]);

        assert_eq!(
            s.execute("SELECT department FROM users GROUP BY department HAVING department = 'HR'"),
            Err(Error::HavingRequiresAggregate)
        );
        Ok(())
    }

    #[test]
    fn test_grouped_output_follows_select_list() -> Result<()> {
        let mut s = setup()?;
        let (columns, rows) = scan(s.execute(
            "SELECT department AS dept, COUNT(*) AS cnt FROM users GROUP BY department",
        )?);
        assert_eq!(columns, vec!["dept".to_string(), "cnt".to_string()]);
        assert_eq!(rows, vec![vec![text("Sales"), int(3)], vec![text("HR"), int(1)]]);

        let (_, rows) = scan(s.execute(
            "SELECT department AS dept, COUNT(*) AS cnt FROM users GROUP BY department HAVING dept = 'HR'",
        )?);
        assert_eq!(rows, vec![vec![text("HR"), int(1)]]);

        // The source name of a grouped column still works in HAVING and ORDER BY
        let (_, rows) = scan(s.execute(
            "SELECT department AS dept, COUNT(*) AS cnt FROM users GROUP BY department \
             HAVING department = 'Sales' ORDER BY department",
        )?);
        assert_eq!(rows, vec![vec![text("Sales"), int(3)]]);

        let (columns, rows) = scan(s.execute(
            "SELECT COUNT(*) AS cnt, department FROM users GROUP BY department ORDER BY cnt",
        )?);
        assert_eq!(columns, vec!["cnt".to_string(), "department".to_string()]);
        assert_eq!(rows, vec![vec![int(1), text("HR")], vec![int(3), text("Sales")]]);

        assert!(matches!(
            s.execute("SELECT role, COUNT(*) FROM users GROUP BY department"),
            Err(Error::Syntax(_))
        ));
        Ok(())
    }

    #[test]
    fn test_star_ignores_group_by() -> Result<()> {
        let mut s = setup()?;
        let (columns, rows) =
            scan(s.execute("SELECT * FROM users WHERE department = 'Sales' GROUP BY department")?);
        assert_eq!(columns.len(), 4);
        assert_eq!(ids(&rows), vec![int(1), int(2), int(3)]);
        Ok(())
    }

    #[test]
    fn test_plain_column_next_to_ungrouped_aggregate() -> Result<()> {
        let mut s = setup()?;
        assert!(matches!(
            s.execute("SELECT department, COUNT(*) FROM users"),
            Err(Error::Syntax(_))
        ));
        Ok(())
    }

    #[test]
    fn test_fractional_literals_against_int_columns() -> Result<()> {
        let mut s = setup()?;
        let (_, rows) = scan(s.execute("SELECT id FROM users WHERE salary > 4000.5")?);
        assert_eq!(rows, vec![vec![int(1)], vec![int(4)]]);

        let (_, rows) = scan(s.execute(
            "SELECT department, MIN(salary) AS low FROM users GROUP BY department HAVING MIN(salary) > 2999.5",
        )?);
        assert_eq!(rows.len(), 2);
        let (_, rows) = scan(s.execute(
            "SELECT department, MIN(salary) AS low FROM users GROUP BY department HAVING low > 3000.5",
        )?);
        assert_eq!(rows, vec![vec![text("HR"), int(4500)]]);

        assert_eq!(s.execute("DELETE FROM users WHERE id = 1.5")?, ResultSet::Delete { count: 0 });

        // Stored values still have to be whole numbers
        assert!(matches!(
            s.execute("UPDATE users SET salary = 4000.5 WHERE id = 1"),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            s.execute("INSERT INTO users (id, department, role, salary) VALUES (5, 'HR', 'Rep', 1.5)"),
            Err(Error::InvalidValue(_))
        ));
        Ok(())
    }

    #[test]
    fn test_aggregates_without_group() -> Result<()> {
        let mut s = setup()?;
        let (columns, rows) = scan(s.execute(
            "SELECT COUNT(*), COUNT(salary), SUM(salary), MIN(salary), MAX(salary) FROM users",
        )?);
        assert_eq!(
            columns,
            vec!["COUNT(*)", "COUNT(salary)", "SUM(salary)", "MIN(salary)", "MAX(salary)"]
        );
        assert_eq!(rows, vec![vec![int(4), int(3), int(12500), int(3000), int(5000)]]);

        let (_, rows) = scan(s.execute(
            "SELECT SUM(salary) AS s, AVG(salary) AS a, MIN(salary) AS m FROM users WHERE id > 10",
        )?);
        assert_eq!(rows, vec![vec![int(0), Value::Null, Value::Null]]);
        Ok(())
    }

    #[test]
    fn test_projection_and_distinct() -> Result<()> {
        let mut s = setup()?;
        let (columns, rows) = scan(s.execute("SELECT role AS r, id FROM users WHERE id < 3")?);
        assert_eq!(columns, vec!["r".to_string(), "id".to_string()]);
        assert_eq!(rows, vec![vec![text("Manager"), int(1)], vec![text("Rep"), int(2)]]);

        let (_, rows) = scan(s.execute("SELECT DISTINCT role FROM users")?);
        assert_eq!(rows, vec![vec![text("Manager")], vec![text("Rep")]]);

        let (_, rows) = scan(s.execute("SELECT DISTINCT role AS r FROM users ORDER BY r DESC")?);
        assert_eq!(rows, vec![vec![text("Rep")], vec![text("Manager")]]);
        Ok(())
    }

    #[test]
    fn test_or_conditions_and_coercion() -> Result<()> {
        let mut s = setup()?;
        let (_, rows) = scan(s.execute("SELECT id FROM users WHERE id = '4' OR salary < 4000")?);
        assert_eq!(rows, vec![vec![int(2)], vec![int(4)]]);
        assert!(matches!(
            s.execute("SELECT id FROM users WHERE id = 'abc'"),
            Err(Error::InvalidValue(_))
        ));
        Ok(())
    }

    #[test]
    fn test_joins() -> Result<()> {
        let mut s = setup()?;
        s.execute("CREATE TABLE orders (oid INT PRIMARY KEY, user_id INT, amount INT)")?;
        for (oid, uid, amount) in [(10, 1, 100), (11, 1, 50), (12, 2, 70), (13, 9, 30)] {
            s.execute(&format!(
                "INSERT INTO orders (oid, user_id, amount) VALUES ({}, {}, {})",
                oid, uid, amount
            ))?;
        }

        let (columns, rows) = scan(s.execute(
            "SELECT u.id, o.amount FROM users u JOIN orders o ON u.id = o.user_id",
        )?);
        assert_eq!(columns, vec!["u.id".to_string(), "o.amount".to_string()]);
        assert_eq!(
            rows,
            vec![vec![int(1), int(100)], vec![int(1), int(50)], vec![int(2), int(70)]]
        );

        let (_, rows) = scan(s.execute(
            "SELECT id, amount FROM users u LEFT JOIN orders o ON o.user_id = u.id",
        )?);
        assert_eq!(
            rows,
            vec![
                vec![int(1), int(100)],
                vec![int(1), int(50)],
                vec![int(2), int(70)],
                vec![int(3), Value::Null],
                vec![int(4), Value::Null],
            ]
        );

        let (_, rows) = scan(s.execute(
            "SELECT id, o.oid FROM users u RIGHT JOIN orders o ON u.id = o.user_id",
        )?);
        assert_eq!(
            rows,
            vec![
                vec![int(1), int(10)],
                vec![int(1), int(11)],
                vec![int(2), int(12)],
                vec![Value::Null, int(13)],
            ]
        );

        let (_, rows) = scan(s.execute(
            "SELECT * FROM users FULL OUTER JOIN orders ON users.id = orders.user_id",
        )?);
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[5][0], Value::Null);
        assert_eq!(rows[5][4], int(13));

        let (_, rows) = scan(s.execute(
            "SELECT u.department, SUM(o.amount) AS total FROM users u JOIN orders o ON u.id = o.user_id GROUP BY u.department",
        )?);
        assert_eq!(rows, vec![vec![text("Sales"), int(220)]]);
        Ok(())
    }

    #[test]
    fn test_errors_do_not_end_session() -> Result<()> {
        let mut s = setup()?;
        assert!(matches!(s.execute("DROP TABLE users"), Err(Error::UnsupportedStatement(_))));
        assert!(matches!(s.execute("SELECT * FROM nope"), Err(Error::TableNotFound(_))));
        assert!(matches!(s.execute("SELECT nope FROM users"), Err(Error::ColumnNotFound(_))));
        assert!(matches!(
            s.execute("CREATE TABLE users (id INT)"),
            Err(Error::TableExists(_))
        ));
        assert!(matches!(
            s.execute("INSERT INTO users (id, department) VALUES (9, 'IT')"),
            Err(Error::MissingColumn(_))
        ));
        let (_, rows) = scan(s.execute("SELECT * FROM USERS")?);
        assert_eq!(rows.len(), 4);
        Ok(())
    }
}
