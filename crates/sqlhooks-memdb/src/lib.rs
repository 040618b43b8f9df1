//! An in-memory driver for sqlhooks.
//!
//! `MemDriver` understands a small pipe-delimited command language instead of
//! SQL, which is enough to exercise every part of the driver interface
//! (statements, queries, prepared statements, transactions) without a real
//! database:
//!
//! ```text
//! WIPE
//! CREATE|t|f1=string,f2=int32
//! INSERT|t|f1=?,f2=7
//! SELECT|t|f1,f2|f1=?
//! ```
//!
//! ```rust,ignore
//! use sqlhooks_memdb::MemDriver;
//!
//! let conn = MemDriver::new().open(&cx, "db").await?;
//! conn.execute(&cx, "CREATE|t|f1=string", &[]).await?;
//! conn.execute(&cx, "INSERT|t|f1=?", &[Value::from("a")]).await?;
//! let rows = conn.query(&cx, "SELECT|t|f1|", &[]).await?;
//! ```

pub mod command;
pub mod connection;
mod database;

pub use command::{ColumnType, Command, Operand};
pub use connection::{MemConnection, MemDriver, MemTransaction};
