//! Core types and traits for sqlhooks.
//!
//! This crate holds the driver interface that the hook layer decorates:
//!
//! - `Connection` / `TransactionOps` traits implemented by drivers
//! - `Driver` for opening connections, plus type-erased `AnyDriver`,
//!   `AnyConnection` and `AnyTransaction`
//! - `DriverRegistry` for opening connections by driver name
//! - `Value` and `Row` for parameters and results
//! - `Outcome` and `Cx` re-exported from asupersync

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod driver;
pub mod error;
pub mod registry;
pub mod row;
pub mod value;

#[cfg(test)]
mod testing;

pub use connection::{Connection, IsolationLevel, PreparedStatement, TransactionOps};
pub use driver::{
    AnyConnection, AnyDriver, AnyTransaction, BoxFuture, Driver, DynConnection, DynDriver,
    DynTransaction, map_outcome,
};
pub use error::{DriverError, DriverErrorKind, Error, Result};
pub use registry::{DriverRegistry, drivers, open, register};
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;
