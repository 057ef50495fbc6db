use crate::{
    error::{Error, Result},
    sql::{
        engine::Catalog,
        parser::ast::{self, ConditionGroup, Operand, SelectItem},
        plan::{ColumnTypes, Node, Plan},
        schema::{self, Table},
        types::Value,
    },
};

/// Query planner - converts AST into execution plan nodes
///
/// SELECT plans follow a fixed stage order: scan and joins, WHERE filter,
/// aggregation (with HAVING), DISTINCT, ORDER BY, OFFSET, LIMIT, projection.
pub struct Planner<'a, C: Catalog> {
    catalog: &'a C,
}

impl<'a, C: Catalog> Planner<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Builds an execution plan from an AST statement
    pub fn build(&mut self, stmt: ast::Statement) -> Result<Plan> {
        Ok(Plan(self.build_statement(stmt)?))
    }

    fn build_statement(&self, stmt: ast::Statement) -> Result<Node> {
        Ok(match stmt {
            ast::Statement::CreateTable {
                name,
                columns,
                primary_key,
            } => {
                let mut primary_key = primary_key;
                for column in columns.iter().filter(|c| c.primary_key) {
                    if primary_key.replace(column.name.clone()).is_some() {
                        return Err(Error::InvalidSchema(format!(
                            "table {} declares more than one primary key",
                            name
                        )));
                    }
                }
                Node::CreateTable {
                    schema: Table {
                        name,
                        columns: columns
                            .into_iter()
                            .map(|c| schema::Column {
                                name: c.name,
                                datatype: c.datatype,
                            })
                            .collect(),
                        primary_key,
                    },
                }
            }
            ast::Statement::Insert {
                table_name,
                columns,
                values,
            } => Node::Insert {
                table_name,
                columns,
                values: values.into_iter().map(Value::from).collect(),
            },
            ast::Statement::Update {
                table_name,
                columns,
                where_clause,
            } => Node::Update {
                table_name,
                columns: columns
                    .into_iter()
                    .map(|(col, value)| (col, Value::from(value)))
                    .collect(),
                where_clause: where_clause.map(|(col, value)| (col, Value::from(value))),
            },
            ast::Statement::Delete {
                table_name,
                where_clause,
            } => match where_clause {
                Some((col, value)) => Node::Delete {
                    table_name,
                    where_clause: (col, Value::from(value)),
                },
                None => return Err(Error::DeleteRequiresWhere),
            },
            ast::Statement::Select {
                distinct,
                select,
                from,
                joins,
                where_clause,
                group_by,
                having,
                order_by,
                limit,
                offset,
            } => {
                let (mut node, types) = self.build_source(from, joins)?;

                if let Some(predicate) = where_clause {
                    if !only_columns(&predicate) {
                        return Err(Error::Syntax(
                            "aggregate functions are not allowed in WHERE".into(),
                        ));
                    }
                    node = Node::Filter {
                        source: Box::new(node),
                        predicate,
                        types: types.clone(),
                    };
                }

                let has_aggregates = select
                    .iter()
                    .any(|item| matches!(item, SelectItem::Aggregate { .. }));
                if having.is_some() && !has_aggregates {
                    return Err(Error::HavingRequiresAggregate);
                }

                // Aggregation without grouping yields its single row as is
                if group_by.is_none() && has_aggregates {
                    for item in &select {
                        let name = match item {
                            SelectItem::Star => "*",
                            SelectItem::Column { name, .. } => name.as_str(),
                            SelectItem::Aggregate { .. } => continue,
                        };
                        return Err(Error::Syntax(format!(
                            "{} cannot be selected next to an aggregate without GROUP BY",
                            name
                        )));
                    }
                    return Ok(Node::Aggregate {
                        source: Box::new(node),
                        group_by: Vec::new(),
                        exprs: select,
                        having,
                        types,
                    });
                }

                // `SELECT *` returns the filtered rows whole, grouping included
                let star_only = select.iter().all(|item| *item == SelectItem::Star);
                let mut order_by = order_by;
                let mut distinct_on = None;
                let mut grouped = false;

                match group_by {
                    Some(group_by) if !star_only => {
                        // Sorting runs on the grouped output, which carries aliases
                        if let Some((col, _)) = order_by.as_mut() {
                            if let Some(alias) = output_alias(&select, col) {
                                *col = alias;
                            }
                        }
                        node = Node::Aggregate {
                            source: Box::new(node),
                            group_by,
                            exprs: select.clone(),
                            having,
                            types,
                        };
                        grouped = true;
                    }
                    Some(_) => {}
                    None if !star_only => {
                        // ORDER BY may name an output alias; sorting runs before
                        // projection, so point it at the source column
                        if let Some((col, _)) = order_by.as_mut() {
                            if let Some(source) = alias_source(&select, col) {
                                *col = source;
                            }
                        }
                        distinct_on = projected_columns(&select);
                    }
                    None => {}
                }

                if distinct {
                    node = Node::Distinct {
                        source: Box::new(node),
                        on: distinct_on,
                    };
                }

                if let Some(order_by) = order_by {
                    node = Node::Order {
                        source: Box::new(node),
                        order_by,
                    };
                }

                // OFFSET - must be processed before LIMIT when both are present
                if let Some(offset) = offset {
                    node = Node::Offset {
                        source: Box::new(node),
                        offset,
                    };
                }

                if let Some(limit) = limit {
                    node = Node::Limit {
                        source: Box::new(node),
                        limit,
                    };
                }

                if !grouped && !star_only {
                    node = Node::Projection {
                        source: Box::new(node),
                        exprs: select,
                    };
                }

                node
            }
        })
    }

    /// Builds the scan of the FROM table followed by one join node per JOIN
    /// clause, along with the declared type of every resulting column.
    fn build_source(&self, from: ast::FromItem, joins: Vec<ast::Join>) -> Result<(Node, ColumnTypes)> {
        let base = self.catalog.must_get_table(&from.name)?.schema();
        let mut types: ColumnTypes = base
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.datatype))
            .collect();
        let mut node = Node::Scan {
            table_name: base.name.clone(),
        };

        for join in joins {
            let table = self.catalog.must_get_table(&join.table)?.schema();
            for column in &table.columns {
                types.insert(format!("{}.{}", join.right_alias, column.name), column.datatype);
            }
            node = Node::NestedLoopJoin {
                source: Box::new(node),
                table_name: table.name.clone(),
                join_type: join.join_type,
                left: join.left,
                right: join.right,
                right_alias: join.right_alias,
            };
        }
        Ok((node, types))
    }
}

/// Source column of a plain column aliased as `alias`
fn alias_source(select: &[SelectItem], alias: &str) -> Option<String> {
    select.iter().find_map(|item| match item {
        SelectItem::Column { name, alias: a } if a == alias => Some(name.clone()),
        _ => None,
    })
}

/// Output alias of a plain column selected from source column `name`,
/// unless `name` is already an output name
fn output_alias(select: &[SelectItem], name: &str) -> Option<String> {
    let is_output = select.iter().any(|item| match item {
        SelectItem::Column { alias, .. } | SelectItem::Aggregate { alias, .. } => alias == name,
        SelectItem::Star => false,
    });
    if is_output {
        return None;
    }
    select.iter().find_map(|item| match item {
        SelectItem::Column { name: n, alias } if n == name => Some(alias.clone()),
        _ => None,
    })
}

/// Source columns a projection keeps, `None` when it keeps every column
fn projected_columns(select: &[SelectItem]) -> Option<Vec<String>> {
    select
        .iter()
        .map(|item| match item {
            SelectItem::Column { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// Whether every condition of a group compares a column
fn only_columns(group: &ConditionGroup) -> bool {
    group
        .conditions
        .iter()
        .all(|c| matches!(c.operand, Operand::Column(_)))
}
