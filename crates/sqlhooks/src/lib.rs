//! Hooks around database driver calls.
//!
//! `sqlhooks` decorates any [`Driver`] so that every statement, query and
//! transaction boundary is reported to a set of [`Hooks`] before the call is
//! handed to the real driver:
//!
//! - `before_exec` / `before_query` see the query text and arguments and
//!   return a [`Completion`] fired once the driver call finishes
//! - `on_begin`, `on_commit` and `on_rollback` receive a [`TxId`] shared by a
//!   transaction's begin and its end
//!
//! The driver's results and errors are returned unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlhooks::{Completion, FnHooks, HookedDriver};
//!
//! let hooks = FnHooks::new().with_query(|query, args| {
//!     println!("> {query} {args:?}");
//!     Completion::new(|| println!("< done"))
//! });
//!
//! let driver = HookedDriver::new(MemDriver::new(), hooks);
//! let conn = driver.open(&cx, "db").await?;
//! let rows = conn.query(&cx, "SELECT|t|f1|", &[]).await?;
//! ```
//!
//! To route an already registered driver through hooks by name, use
//! [`register`]:
//!
//! ```rust,ignore
//! sqlhooks::register("memdb-traced", "memdb", TracingHooks::default())?;
//! let conn = sqlhooks::open(&cx, "memdb-traced", "db").await?;
//! ```

pub mod completion;
pub mod connection;
pub mod driver;
pub mod hooks;
pub mod tracing_hooks;

#[cfg(test)]
mod testing;

pub use completion::Completion;
pub use connection::{HookedConnection, HookedTransaction};
pub use driver::{HookedDriver, register, register_in};
pub use hooks::{FnHooks, Hooks, NoopHooks, TxId};
pub use tracing_hooks::{TracingHooks, TracingHooksConfig};

pub use sqlhooks_core::{
    AnyConnection, AnyDriver, AnyTransaction, ColumnInfo, Connection, Cx, Driver, DriverError,
    DriverErrorKind, DriverRegistry, Error, FromValue, IsolationLevel, Outcome,
    PreparedStatement, Result, Row, TransactionOps, Value, drivers, open,
};
