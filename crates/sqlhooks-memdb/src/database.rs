//! Table storage and command execution.

use crate::command::{ColumnType, Command, Operand};
use sqlhooks_core::error::{QueryError, QueryErrorKind};
use sqlhooks_core::{ColumnInfo, Row, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Table {
    columns: Vec<(String, ColumnType)>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn column(&self, name: &str) -> Result<(usize, ColumnType), QueryError> {
        self.columns
            .iter()
            .position(|(c, _)| c == name)
            .map(|i| (i, self.columns[i].1))
            .ok_or_else(|| {
                QueryError::new(QueryErrorKind::NotFound, format!("unknown column {name:?}"))
            })
    }
}

/// The result of running one command.
#[derive(Debug)]
pub(crate) enum Executed {
    /// WIPE, CREATE and INSERT.
    Changed { rows_affected: u64, last_insert_id: i64 },
    /// SELECT.
    Rows(Vec<Row>),
}

impl Executed {
    pub(crate) fn rows_affected(&self) -> u64 {
        match self {
            Executed::Changed { rows_affected, .. } => *rows_affected,
            Executed::Rows(_) => 0,
        }
    }

    pub(crate) fn last_insert_id(&self) -> i64 {
        match self {
            Executed::Changed { last_insert_id, .. } => *last_insert_id,
            Executed::Rows(_) => 0,
        }
    }

    pub(crate) fn into_rows(self) -> Vec<Row> {
        match self {
            Executed::Changed { .. } => Vec::new(),
            Executed::Rows(rows) => rows,
        }
    }
}

fn unknown_table(name: &str) -> QueryError {
    QueryError::new(QueryErrorKind::NotFound, format!("unknown table {name:?}"))
}

/// One named database: a set of tables.
#[derive(Debug, Clone, Default)]
pub(crate) struct Database {
    tables: BTreeMap<String, Table>,
}

/// Resolves operands against bound arguments, in placeholder order.
struct Binder<'a> {
    args: std::slice::Iter<'a, Value>,
}

impl Binder<'_> {
    fn resolve(
        &mut self,
        column: &str,
        ty: ColumnType,
        operand: &Operand,
    ) -> Result<Value, QueryError> {
        let value = match operand {
            Operand::Placeholder => {
                let arg = self.args.next().ok_or_else(|| {
                    QueryError::new(QueryErrorKind::Parameter, "not enough arguments")
                })?;
                ty.coerce(arg).ok_or_else(|| {
                    QueryError::new(
                        QueryErrorKind::Parameter,
                        format!(
                            "cannot use {} argument for {} column {column:?}",
                            arg.type_name(),
                            ty.as_str()
                        ),
                    )
                })?
            }
            Operand::Literal(literal) => ty.parse_literal(literal).ok_or_else(|| {
                QueryError::new(
                    QueryErrorKind::Syntax,
                    format!("invalid {} literal {literal:?} for column {column:?}", ty.as_str()),
                )
            })?,
        };
        Ok(value)
    }
}

impl Database {
    fn table(&self, name: &str) -> Result<&Table, QueryError> {
        self.tables.get(name).ok_or_else(|| unknown_table(name))
    }

    pub(crate) fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Run `command` with `args` bound to its placeholders.
    pub(crate) fn run(
        &mut self,
        command: &Command,
        args: &[Value],
    ) -> Result<Executed, QueryError> {
        let expected = command.param_count();
        if args.len() != expected {
            return Err(QueryError::new(
                QueryErrorKind::Parameter,
                format!("expected {expected} arguments, got {}", args.len()),
            ));
        }
        let mut binder = Binder { args: args.iter() };

        match command {
            Command::Wipe => {
                self.tables.clear();
                Ok(Executed::Changed {
                    rows_affected: 0,
                    last_insert_id: 0,
                })
            }
            Command::Create { table, columns } => {
                if self.tables.contains_key(table) {
                    return Err(QueryError::new(
                        QueryErrorKind::Constraint,
                        format!("table {table:?} already exists"),
                    ));
                }
                self.tables.insert(
                    table.clone(),
                    Table {
                        columns: columns.clone(),
                        rows: Vec::new(),
                    },
                );
                Ok(Executed::Changed {
                    rows_affected: 0,
                    last_insert_id: 0,
                })
            }
            Command::Insert { table, values } => {
                let t = self
                    .tables
                    .get_mut(table)
                    .ok_or_else(|| unknown_table(table))?;
                let mut row = vec![Value::Null; t.columns.len()];
                for (column, operand) in values {
                    let (index, ty) = t.column(column)?;
                    row[index] = binder.resolve(column, ty, operand)?;
                }
                t.rows.push(row);
                Ok(Executed::Changed {
                    rows_affected: 1,
                    last_insert_id: t.rows.len() as i64,
                })
            }
            Command::Select {
                table,
                columns,
                filter,
            } => {
                let t = self.table(table)?;
                let projection = columns
                    .iter()
                    .map(|c| t.column(c).map(|(i, _)| i))
                    .collect::<Result<Vec<_>, _>>()?;
                let conditions = filter
                    .iter()
                    .map(|(column, operand)| {
                        let (index, ty) = t.column(column)?;
                        Ok((index, binder.resolve(column, ty, operand)?))
                    })
                    .collect::<Result<Vec<_>, QueryError>>()?;

                let info = Arc::new(ColumnInfo::new(columns.clone()));
                let rows = t
                    .rows
                    .iter()
                    .filter(|row| conditions.iter().all(|(i, v)| row[*i] == *v))
                    .map(|row| {
                        let values = projection.iter().map(|i| row[*i].clone()).collect();
                        Row::with_columns(Arc::clone(&info), values)
                    })
                    .collect();
                Ok(Executed::Rows(rows))
            }
        }
    }
}
