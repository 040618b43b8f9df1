//! The in-memory driver, its connections and transactions.
#![allow(clippy::result_large_err)] // Error type is defined in sqlhooks-core

use crate::command::Command;
use crate::database::{Database, Executed};
use sqlhooks_core::error::{ConnectionError, TransactionError, TransactionErrorKind};
use sqlhooks_core::{
    Connection, Cx, Driver, Error, IsolationLevel, Outcome, PreparedStatement, Result, Row,
    TransactionOps, Value,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Shared = Arc<Mutex<Database>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Driver for in-memory databases.
///
/// A DSN names a database. Connections opened with the same DSN on the same
/// driver (or on clones of it) share tables; separate drivers never share
/// anything.
#[derive(Debug, Clone, Default)]
pub struct MemDriver {
    databases: Arc<Mutex<HashMap<String, Shared>>>,
}

impl MemDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection to the database named `dsn`, creating it if needed.
    pub fn connect(&self, dsn: &str) -> Result<MemConnection> {
        if dsn.is_empty() {
            return Err(ConnectionError::new("empty data source name").into());
        }
        let db = Arc::clone(lock(&self.databases).entry(dsn.to_string()).or_default());
        tracing::debug!(dsn, "Opened in-memory connection");
        Ok(MemConnection {
            dsn: dsn.to_string(),
            db,
            snapshot: Mutex::new(None),
            next_stmt_id: AtomicU64::new(1),
        })
    }
}

impl Driver for MemDriver {
    type Conn = MemConnection;

    fn open(
        &self,
        _cx: &Cx,
        dsn: &str,
    ) -> impl Future<Output = Outcome<MemConnection, Error>> + Send {
        let result = self.connect(dsn);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }
}

/// A connection to one in-memory database.
///
/// At most one transaction is open per connection. Beginning one snapshots
/// the whole database; rolling back restores the snapshot, which also undoes
/// writes made meanwhile through other connections to the same database.
#[derive(Debug)]
pub struct MemConnection {
    dsn: String,
    db: Shared,
    snapshot: Mutex<Option<Database>>,
    next_stmt_id: AtomicU64,
}

impl MemConnection {
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Names of the tables in this connection's database, sorted.
    pub fn tables(&self) -> Vec<String> {
        lock(&self.db).table_names()
    }

    /// Is a transaction open on this connection?
    pub fn in_transaction(&self) -> bool {
        lock(&self.snapshot).is_some()
    }

    fn run_sync(&self, sql: &str, params: &[Value]) -> Result<Executed> {
        tracing::trace!(dsn = %self.dsn, sql, params = params.len(), "Running command");
        Command::parse(sql)
            .and_then(|command| lock(&self.db).run(&command, params))
            .map_err(|e| Error::Query(e.with_sql(sql)))
    }

    /// Run a command and return the rows it selected.
    pub fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.run_sync(sql, params).map(Executed::into_rows)
    }

    /// Run a command and return the number of rows it changed.
    pub fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.run_sync(sql, params).map(|e| e.rows_affected())
    }

    /// Run an INSERT and return the new row's 1-based position in its table.
    pub fn insert_sync(&self, sql: &str, params: &[Value]) -> Result<i64> {
        self.run_sync(sql, params).map(|e| e.last_insert_id())
    }

    fn prepare_sync(&self, sql: &str) -> Result<PreparedStatement> {
        let command = Command::parse(sql).map_err(|e| Error::Query(e.with_sql(sql)))?;
        let id = self.next_stmt_id.fetch_add(1, Ordering::Relaxed);
        let param_count = command.param_count();
        Ok(match command.result_columns() {
            Some(columns) => {
                PreparedStatement::with_columns(id, sql.to_string(), param_count, columns.to_vec())
            }
            None => PreparedStatement::new(id, sql.to_string(), param_count),
        })
    }

    fn begin_sync(&self) -> Result<()> {
        let mut snapshot = lock(&self.snapshot);
        if snapshot.is_some() {
            return Err(transaction_error(
                TransactionErrorKind::AlreadyActive,
                "already in a transaction",
            ));
        }
        *snapshot = Some(lock(&self.db).clone());
        Ok(())
    }

    fn commit_sync(&self) -> Result<()> {
        if lock(&self.snapshot).take().is_none() {
            return Err(transaction_error(
                TransactionErrorKind::NotActive,
                "not in a transaction",
            ));
        }
        Ok(())
    }

    fn rollback_sync(&self) -> Result<()> {
        let snapshot = lock(&self.snapshot).take().ok_or_else(|| {
            transaction_error(TransactionErrorKind::NotActive, "not in a transaction")
        })?;
        *lock(&self.db) = snapshot;
        Ok(())
    }
}

fn transaction_error(kind: TransactionErrorKind, message: &str) -> Error {
    Error::Transaction(TransactionError::new(kind, message))
}

impl Connection for MemConnection {
    type Tx<'conn>
        = MemTransaction<'conn>
    where
        Self: 'conn;

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.query_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let result = self
            .query_sync(sql, params)
            .map(|rows| rows.into_iter().next());
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.execute_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let result = self.insert_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn batch(
        &self,
        _cx: &Cx,
        statements: &[(String, Vec<Value>)],
    ) -> impl Future<Output = Outcome<Vec<u64>, Error>> + Send {
        let result = statements
            .iter()
            .map(|(sql, params)| self.execute_sync(sql, params))
            .collect::<Result<Vec<_>>>();
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        self.begin_with(cx, IsolationLevel::default())
    }

    fn begin_with(
        &self,
        _cx: &Cx,
        _isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        let result = self.begin_sync().map(|()| MemTransaction::new(self));
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn prepare(
        &self,
        _cx: &Cx,
        sql: &str,
    ) -> impl Future<Output = Outcome<PreparedStatement, Error>> + Send {
        let result = self.prepare_sync(sql);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn query_prepared(
        &self,
        cx: &Cx,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        self.query(cx, stmt.sql(), params)
    }

    fn execute_prepared(
        &self,
        cx: &Cx,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        self.execute(cx, stmt.sql(), params)
    }

    fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    fn close(self, _cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        tracing::debug!(dsn = %self.dsn, "Closed in-memory connection");
        async { Ok(()) }
    }
}

/// A transaction on a [`MemConnection`].
///
/// Dropping it without calling `commit` or `rollback` rolls it back.
pub struct MemTransaction<'conn> {
    conn: &'conn MemConnection,
    finished: bool,
}

impl<'conn> MemTransaction<'conn> {
    fn new(conn: &'conn MemConnection) -> Self {
        Self {
            conn,
            finished: false,
        }
    }
}

impl std::fmt::Debug for MemTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemTransaction")
            .field("dsn", &self.conn.dsn)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Drop for MemTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.conn.rollback_sync();
        }
    }
}

impl TransactionOps for MemTransaction<'_> {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.conn.query_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let result = self
            .conn
            .query_sync(sql, params)
            .map(|rows| rows.into_iter().next());
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.conn.execute_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    // Savepoints are accepted but do not nest snapshots.
    fn savepoint(&self, _cx: &Cx, _name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    fn rollback_to(
        &self,
        _cx: &Cx,
        _name: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    fn release(&self, _cx: &Cx, _name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    fn commit(mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.conn.commit_sync();
        self.finished = true;
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn rollback(mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.conn.rollback_sync();
        self.finished = true;
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }
}
