//! Drivers and type-erased connections.
//!
//! [`Driver`] opens connections from a data source name. Because
//! [`Connection`] uses `impl Future` returns and a generic transaction type it
//! cannot be a trait object, so this module mirrors it with object-safe
//! boxed-future traits ([`DynConnection`], [`DynTransaction`], [`DynDriver`])
//! and wraps them back into [`AnyConnection`], [`AnyTransaction`] and
//! [`AnyDriver`], which implement the regular traits again. The registry
//! stores drivers in this erased form.

use crate::connection::{Connection, IsolationLevel, PreparedStatement, TransactionOps};
use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, `Send` future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opens connections to a data source.
pub trait Driver: Send + Sync + 'static {
    /// The connection type this driver produces.
    type Conn: Connection + 'static;

    /// Open a new connection. The meaning of `dsn` is driver-specific.
    fn open(
        &self,
        cx: &Cx,
        dsn: &str,
    ) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send;
}

/// Map the success value of an outcome, passing every other variant through.
pub fn map_outcome<T, U>(
    outcome: Outcome<T, Error>,
    f: impl FnOnce(T) -> U,
) -> Outcome<U, Error> {
    match outcome {
        Outcome::Ok(v) => Outcome::Ok(f(v)),
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(reason) => Outcome::Cancelled(reason),
        Outcome::Panicked(payload) => Outcome::Panicked(payload),
    }
}

/// Object-safe mirror of [`Driver`].
pub trait DynDriver: Send + Sync {
    fn open_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        dsn: &'a str,
    ) -> BoxFuture<'a, Outcome<AnyConnection, Error>>;
}

impl<D: Driver> DynDriver for D {
    fn open_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        dsn: &'a str,
    ) -> BoxFuture<'a, Outcome<AnyConnection, Error>> {
        Box::pin(async move { map_outcome(self.open(cx, dsn).await, AnyConnection::new) })
    }
}

/// A shareable, type-erased driver.
#[derive(Clone)]
pub struct AnyDriver(Arc<dyn DynDriver>);

impl AnyDriver {
    pub fn new<D: Driver>(driver: D) -> Self {
        Self(Arc::new(driver))
    }
}

impl std::fmt::Debug for AnyDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyDriver").finish_non_exhaustive()
    }
}

impl Driver for AnyDriver {
    type Conn = AnyConnection;

    fn open(
        &self,
        cx: &Cx,
        dsn: &str,
    ) -> impl Future<Output = Outcome<AnyConnection, Error>> + Send {
        async move { self.0.open_dyn(cx, dsn).await }
    }
}

/// Object-safe mirror of [`Connection`].
pub trait DynConnection: Send + Sync {
    fn query_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Vec<Row>, Error>>;

    fn query_one_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Option<Row>, Error>>;

    fn execute_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<u64, Error>>;

    fn insert_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<i64, Error>>;

    fn batch_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        statements: &'a [(String, Vec<Value>)],
    ) -> BoxFuture<'a, Outcome<Vec<u64>, Error>>;

    fn begin_dyn<'f, 'a: 'f, 'c: 'f>(
        &'a self,
        cx: &'c Cx,
        isolation: Option<IsolationLevel>,
    ) -> BoxFuture<'f, Outcome<AnyTransaction<'a>, Error>>;

    fn prepare_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
    ) -> BoxFuture<'a, Outcome<PreparedStatement, Error>>;

    fn query_prepared_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        stmt: &'a PreparedStatement,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Vec<Row>, Error>>;

    fn execute_prepared_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        stmt: &'a PreparedStatement,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<u64, Error>>;

    fn ping_dyn<'a>(&'a self, cx: &'a Cx) -> BoxFuture<'a, Outcome<(), Error>>;

    fn close_dyn<'a>(self: Box<Self>, cx: &'a Cx) -> BoxFuture<'a, Result<()>>
    where
        Self: 'a;
}

impl<C: Connection> DynConnection for C {
    fn query_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Vec<Row>, Error>> {
        Box::pin(self.query(cx, sql, params))
    }

    fn query_one_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Option<Row>, Error>> {
        Box::pin(self.query_one(cx, sql, params))
    }

    fn execute_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<u64, Error>> {
        Box::pin(self.execute(cx, sql, params))
    }

    fn insert_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<i64, Error>> {
        Box::pin(self.insert(cx, sql, params))
    }

    fn batch_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        statements: &'a [(String, Vec<Value>)],
    ) -> BoxFuture<'a, Outcome<Vec<u64>, Error>> {
        Box::pin(self.batch(cx, statements))
    }

    fn begin_dyn<'f, 'a: 'f, 'c: 'f>(
        &'a self,
        cx: &'c Cx,
        isolation: Option<IsolationLevel>,
    ) -> BoxFuture<'f, Outcome<AnyTransaction<'a>, Error>> {
        Box::pin(async move {
            let outcome = match isolation {
                Some(level) => self.begin_with(cx, level).await,
                None => self.begin(cx).await,
            };
            map_outcome(outcome, AnyTransaction::new)
        })
    }

    fn prepare_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
    ) -> BoxFuture<'a, Outcome<PreparedStatement, Error>> {
        Box::pin(self.prepare(cx, sql))
    }

    fn query_prepared_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        stmt: &'a PreparedStatement,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Vec<Row>, Error>> {
        Box::pin(self.query_prepared(cx, stmt, params))
    }

    fn execute_prepared_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        stmt: &'a PreparedStatement,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<u64, Error>> {
        Box::pin(self.execute_prepared(cx, stmt, params))
    }

    fn ping_dyn<'a>(&'a self, cx: &'a Cx) -> BoxFuture<'a, Outcome<(), Error>> {
        Box::pin(self.ping(cx))
    }

    fn close_dyn<'a>(self: Box<Self>, cx: &'a Cx) -> BoxFuture<'a, Result<()>>
    where
        Self: 'a,
    {
        Box::pin((*self).close(cx))
    }
}

/// A connection whose concrete driver type has been erased.
pub struct AnyConnection(Box<dyn DynConnection>);

impl AnyConnection {
    pub fn new<C: Connection + 'static>(conn: C) -> Self {
        Self(Box::new(conn))
    }
}

impl std::fmt::Debug for AnyConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyConnection").finish_non_exhaustive()
    }
}

impl Connection for AnyConnection {
    type Tx<'conn>
        = AnyTransaction<'conn>
    where
        Self: 'conn;

    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        async move { self.0.query_dyn(cx, sql, params).await }
    }

    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        async move { self.0.query_one_dyn(cx, sql, params).await }
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        async move { self.0.execute_dyn(cx, sql, params).await }
    }

    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        async move { self.0.insert_dyn(cx, sql, params).await }
    }

    fn batch(
        &self,
        cx: &Cx,
        statements: &[(String, Vec<Value>)],
    ) -> impl Future<Output = Outcome<Vec<u64>, Error>> + Send {
        async move { self.0.batch_dyn(cx, statements).await }
    }

    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        async move { self.0.begin_dyn(cx, None).await }
    }

    fn begin_with(
        &self,
        cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        async move { self.0.begin_dyn(cx, Some(isolation)).await }
    }

    fn prepare(
        &self,
        cx: &Cx,
        sql: &str,
    ) -> impl Future<Output = Outcome<PreparedStatement, Error>> + Send {
        async move { self.0.prepare_dyn(cx, sql).await }
    }

    fn query_prepared(
        &self,
        cx: &Cx,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        async move { self.0.query_prepared_dyn(cx, stmt, params).await }
    }

    fn execute_prepared(
        &self,
        cx: &Cx,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        async move { self.0.execute_prepared_dyn(cx, stmt, params).await }
    }

    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move { self.0.ping_dyn(cx).await }
    }

    fn close(self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move { self.0.close_dyn(cx).await }
    }
}

/// Object-safe mirror of [`TransactionOps`].
pub trait DynTransaction: Send + Sync {
    fn query_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Vec<Row>, Error>>;

    fn query_one_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Option<Row>, Error>>;

    fn execute_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<u64, Error>>;

    fn savepoint_dyn<'a>(&'a self, cx: &'a Cx, name: &'a str) -> BoxFuture<'a, Outcome<(), Error>>;

    fn rollback_to_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        name: &'a str,
    ) -> BoxFuture<'a, Outcome<(), Error>>;

    fn release_dyn<'a>(&'a self, cx: &'a Cx, name: &'a str) -> BoxFuture<'a, Outcome<(), Error>>;

    fn commit_dyn<'a>(self: Box<Self>, cx: &'a Cx) -> BoxFuture<'a, Outcome<(), Error>>
    where
        Self: 'a;

    fn rollback_dyn<'a>(self: Box<Self>, cx: &'a Cx) -> BoxFuture<'a, Outcome<(), Error>>
    where
        Self: 'a;
}

impl<T: TransactionOps + Sync> DynTransaction for T {
    fn query_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Vec<Row>, Error>> {
        Box::pin(self.query(cx, sql, params))
    }

    fn query_one_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Option<Row>, Error>> {
        Box::pin(self.query_one(cx, sql, params))
    }

    fn execute_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<u64, Error>> {
        Box::pin(self.execute(cx, sql, params))
    }

    fn savepoint_dyn<'a>(&'a self, cx: &'a Cx, name: &'a str) -> BoxFuture<'a, Outcome<(), Error>> {
        Box::pin(self.savepoint(cx, name))
    }

    fn rollback_to_dyn<'a>(
        &'a self,
        cx: &'a Cx,
        name: &'a str,
    ) -> BoxFuture<'a, Outcome<(), Error>> {
        Box::pin(self.rollback_to(cx, name))
    }

    fn release_dyn<'a>(&'a self, cx: &'a Cx, name: &'a str) -> BoxFuture<'a, Outcome<(), Error>> {
        Box::pin(self.release(cx, name))
    }

    fn commit_dyn<'a>(self: Box<Self>, cx: &'a Cx) -> BoxFuture<'a, Outcome<(), Error>>
    where
        Self: 'a,
    {
        Box::pin((*self).commit(cx))
    }

    fn rollback_dyn<'a>(self: Box<Self>, cx: &'a Cx) -> BoxFuture<'a, Outcome<(), Error>>
    where
        Self: 'a,
    {
        Box::pin((*self).rollback(cx))
    }
}

/// A transaction whose concrete driver type has been erased.
pub struct AnyTransaction<'conn>(Box<dyn DynTransaction + 'conn>);

impl<'conn> AnyTransaction<'conn> {
    pub fn new<T: TransactionOps + Sync + 'conn>(tx: T) -> Self {
        Self(Box::new(tx))
    }
}

impl std::fmt::Debug for AnyTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyTransaction").finish_non_exhaustive()
    }
}

impl TransactionOps for AnyTransaction<'_> {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        async move { self.0.query_dyn(cx, sql, params).await }
    }

    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        async move { self.0.query_one_dyn(cx, sql, params).await }
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        async move { self.0.execute_dyn(cx, sql, params).await }
    }

    fn savepoint(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move { self.0.savepoint_dyn(cx, name).await }
    }

    fn rollback_to(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move { self.0.rollback_to_dyn(cx, name).await }
    }

    fn release(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move { self.0.release_dyn(cx, name).await }
    }

    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move { self.0.commit_dyn(cx).await }
    }

    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move { self.0.rollback_dyn(cx).await }
    }
}
