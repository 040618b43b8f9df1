//! A do-nothing driver for unit tests.
#![allow(clippy::manual_async_fn)] // Trait impls must match trait signatures

use crate::connection::{Connection, IsolationLevel, PreparedStatement, TransactionOps};
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;

#[derive(Debug)]
pub(crate) struct NullDriver;

impl Driver for NullDriver {
    type Conn = NullConnection;

    fn open(
        &self,
        _cx: &Cx,
        _dsn: &str,
    ) -> impl Future<Output = Outcome<NullConnection, Error>> + Send {
        async { Outcome::Ok(NullConnection) }
    }
}

/// Echoes the statement back as a single one-column row and reports
/// `params.len()` rows affected.
#[derive(Debug)]
pub(crate) struct NullConnection;

fn echo(sql: &str) -> Vec<Row> {
    vec![Row::new(vec!["sql".into()], vec![Value::Text(sql.to_string())])]
}

impl Connection for NullConnection {
    type Tx<'conn>
        = NullTransaction
    where
        Self: 'conn;

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let rows = echo(sql);
        async move { Outcome::Ok(rows) }
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let row = echo(sql).pop();
        async move { Outcome::Ok(row) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        _sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let n = params.len() as u64;
        async move { Outcome::Ok(n) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        _sql: &str,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        async { Outcome::Ok(1) }
    }

    fn batch(
        &self,
        _cx: &Cx,
        statements: &[(String, Vec<Value>)],
    ) -> impl Future<Output = Outcome<Vec<u64>, Error>> + Send {
        let counts = statements.iter().map(|(_, p)| p.len() as u64).collect();
        async move { Outcome::Ok(counts) }
    }

    fn begin(&self, _cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        async { Outcome::Ok(NullTransaction) }
    }

    fn begin_with(
        &self,
        _cx: &Cx,
        _isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        async { Outcome::Ok(NullTransaction) }
    }

    fn prepare(
        &self,
        _cx: &Cx,
        sql: &str,
    ) -> impl Future<Output = Outcome<PreparedStatement, Error>> + Send {
        let stmt = PreparedStatement::new(0, sql.to_string(), 0);
        async move { Outcome::Ok(stmt) }
    }

    fn query_prepared(
        &self,
        _cx: &Cx,
        stmt: &PreparedStatement,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let rows = echo(stmt.sql());
        async move { Outcome::Ok(rows) }
    }

    fn execute_prepared(
        &self,
        _cx: &Cx,
        _stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let n = params.len() as u64;
        async move { Outcome::Ok(n) }
    }

    fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    fn close(self, _cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

#[derive(Debug)]
pub(crate) struct NullTransaction;

impl TransactionOps for NullTransaction {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let rows = echo(sql);
        async move { Outcome::Ok(rows) }
    }

    fn query_one(
        &self,
        _cx: &Cx,
        _sql: &str,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        async { Outcome::Ok(None) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        _sql: &str,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        async { Outcome::Ok(0) }
    }

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

    fn commit(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    fn rollback(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }
}
