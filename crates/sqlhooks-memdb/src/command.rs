//! Parsing of the pipe-delimited command language.
//!
//! ```text
//! WIPE
//! CREATE|<table>|<col>=<type>,...
//! INSERT|<table>|<col>=?,<col>=<literal>,...
//! SELECT|<table>|<col>,...|<col>=?,<col>=<literal>,...
//! ```
//!
//! Column types are `string`, `int32`, `int64`, `bool`, `float64` and `bytes`.
//! A `?` operand takes the next bound argument; anything else is a literal
//! parsed according to the column's type.

use sqlhooks_core::Value;
use sqlhooks_core::error::{QueryError, QueryErrorKind};

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Int32,
    Int64,
    Bool,
    Float64,
    Bytes,
}

impl ColumnType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "int32" => Some(Self::Int32),
            "int64" => Some(Self::Int64),
            "bool" => Some(Self::Bool),
            "float64" => Some(Self::Float64),
            "bytes" => Some(Self::Bytes),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Bool => "bool",
            Self::Float64 => "float64",
            Self::Bytes => "bytes",
        }
    }

    /// Convert a bound argument to this type. `Null` is accepted everywhere.
    pub fn coerce(self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            Self::String => value.as_str().map(|s| Value::Text(s.to_string())),
            Self::Int32 => value
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Int),
            Self::Int64 => value.as_i64().map(Value::BigInt),
            Self::Bool => value.as_bool().map(Value::Bool),
            Self::Float64 => value.as_f64().map(Value::Double),
            Self::Bytes => value.as_bytes().map(|b| Value::Bytes(b.to_vec())),
        }
    }

    /// Parse a literal written in a command. `null` is accepted everywhere.
    pub fn parse_literal(self, literal: &str) -> Option<Value> {
        if literal == "null" {
            return Some(Value::Null);
        }
        match self {
            Self::String => Some(Value::Text(literal.to_string())),
            Self::Int32 => literal.parse().ok().map(Value::Int),
            Self::Int64 => literal.parse().ok().map(Value::BigInt),
            Self::Bool => literal.parse().ok().map(Value::Bool),
            Self::Float64 => literal.parse().ok().map(Value::Double),
            Self::Bytes => Some(Value::Bytes(literal.as_bytes().to_vec())),
        }
    }
}

/// The right-hand side of `col=...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `?`: the next bound argument.
    Placeholder,
    Literal(String),
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Wipe,
    Create {
        table: String,
        columns: Vec<(String, ColumnType)>,
    },
    Insert {
        table: String,
        values: Vec<(String, Operand)>,
    },
    Select {
        table: String,
        columns: Vec<String>,
        filter: Vec<(String, Operand)>,
    },
}

fn syntax(message: impl Into<String>) -> QueryError {
    QueryError::new(QueryErrorKind::Syntax, message)
}

/// Split a comma-separated list, ignoring empty items.
fn items(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn pair(item: &str) -> Result<(&str, &str), QueryError> {
    item.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| syntax(format!("expected <column>=<value>, got {item:?}")))
}

fn operands(list: &str) -> Result<Vec<(String, Operand)>, QueryError> {
    items(list)
        .map(|item| {
            let (column, value) = pair(item)?;
            let operand = if value == "?" {
                Operand::Placeholder
            } else {
                Operand::Literal(value.to_string())
            };
            Ok((column.to_string(), operand))
        })
        .collect()
}

fn table_name(name: &str) -> Result<String, QueryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(syntax("missing table name"));
    }
    Ok(name.to_string())
}

impl Command {
    /// Parse a command.
    pub fn parse(sql: &str) -> Result<Self, QueryError> {
        let parts: Vec<&str> = sql.trim().split('|').collect();
        match parts.as_slice() {
            ["WIPE"] => Ok(Self::Wipe),
            ["CREATE", table, columns] => {
                let columns = items(columns)
                    .map(|item| {
                        let (column, ty) = pair(item)?;
                        let ty = ColumnType::parse(ty)
                            .ok_or_else(|| syntax(format!("unknown column type {ty:?}")))?;
                        Ok((column.to_string(), ty))
                    })
                    .collect::<Result<Vec<_>, QueryError>>()?;
                if columns.is_empty() {
                    return Err(syntax("CREATE needs at least one column"));
                }
                Ok(Self::Create {
                    table: table_name(table)?,
                    columns,
                })
            }
            ["INSERT", table, values] => Ok(Self::Insert {
                table: table_name(table)?,
                values: operands(values)?,
            }),
            ["SELECT", table, columns, filter] => {
                let columns: Vec<String> = items(columns).map(str::to_string).collect();
                if columns.is_empty() {
                    return Err(syntax("SELECT needs at least one column"));
                }
                Ok(Self::Select {
                    table: table_name(table)?,
                    columns,
                    filter: operands(filter)?,
                })
            }
            [verb, ..] => Err(syntax(format!("unsupported command {verb:?}"))),
            [] => Err(syntax("empty command")),
        }
    }

    /// Number of `?` placeholders, i.e. the number of arguments to bind.
    pub fn param_count(&self) -> usize {
        let operands = match self {
            Self::Insert { values, .. } => values,
            Self::Select { filter, .. } => filter,
            Self::Wipe | Self::Create { .. } => return 0,
        };
        operands
            .iter()
            .filter(|(_, op)| *op == Operand::Placeholder)
            .count()
    }

    /// Names of the columns a SELECT returns.
    pub fn result_columns(&self) -> Option<&[String]> {
        match self {
            Self::Select { columns, .. } => Some(columns),
            _ => None,
        }
    }
}
