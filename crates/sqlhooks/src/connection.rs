//! Connections and transactions that run every call through [`Hooks`].
#![allow(clippy::manual_async_fn)] // Trait impls must match trait signatures

use crate::completion::Completion;
use crate::hooks::{Hooks, TxId};
use sqlhooks_core::{
    Connection, Cx, Error, IsolationLevel, Outcome, PreparedStatement, Result, Row,
    TransactionOps, Value, map_outcome,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

fn before_exec<H: Hooks + ?Sized>(hooks: &H, sql: &str, params: &[Value]) -> Completion {
    tracing::trace!(sql, params = params.len(), "Dispatching exec hook");
    hooks.before_exec(sql, params)
}

fn before_query<H: Hooks + ?Sized>(hooks: &H, sql: &str, params: &[Value]) -> Completion {
    tracing::trace!(sql, params = params.len(), "Dispatching query hook");
    hooks.before_query(sql, params)
}

/// Await `fut`, then fire `done`.
///
/// If the returned future is dropped first, `done` fires from its destructor.
async fn observed<T>(done: Completion, fut: impl Future<Output = T>) -> T {
    let outcome = fut.await;
    done.complete();
    outcome
}

/// Await a `begin`, then report the new transaction.
async fn started<T, H: Hooks + ?Sized>(
    begin: impl Future<Output = Outcome<T, Error>>,
    hooks: Arc<H>,
) -> Outcome<HookedTransaction<T, H>, Error> {
    map_outcome(begin.await, |tx| HookedTransaction::start(tx, hooks))
}

/// A connection whose statements, queries and transactions are reported to
/// a set of [`Hooks`].
///
/// The "before" hook runs when an operation's future is created, and its
/// [`Completion`] fires when that future resolves or is dropped. Query text,
/// arguments, results and errors pass through untouched.
pub struct HookedConnection<C, H: ?Sized = dyn Hooks> {
    inner: C,
    hooks: Arc<H>,
}

impl<C, H: Hooks + ?Sized> HookedConnection<C, H> {
    /// Wrap `inner`, reporting to `hooks`.
    pub fn new(inner: C, hooks: Arc<H>) -> Self {
        Self { inner, hooks }
    }

    /// The wrapped connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn hooks(&self) -> &Arc<H> {
        &self.hooks
    }

    /// Unwrap, returning the wrapped connection.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: fmt::Debug, H: ?Sized> fmt::Debug for HookedConnection<C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookedConnection")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<C, H> Connection for HookedConnection<C, H>
where
    C: Connection,
    H: Hooks + ?Sized + 'static,
{
    type Tx<'conn>
        = HookedTransaction<C::Tx<'conn>, H>
    where
        Self: 'conn;

    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let done = before_query(&*self.hooks, sql, params);
        observed(done, self.inner.query(cx, sql, params))
    }

    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let done = before_query(&*self.hooks, sql, params);
        observed(done, self.inner.query_one(cx, sql, params))
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let done = before_exec(&*self.hooks, sql, params);
        observed(done, self.inner.execute(cx, sql, params))
    }

    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let done = before_exec(&*self.hooks, sql, params);
        observed(done, self.inner.insert(cx, sql, params))
    }

    fn batch(
        &self,
        cx: &Cx,
        statements: &[(String, Vec<Value>)],
    ) -> impl Future<Output = Outcome<Vec<u64>, Error>> + Send {
        let done = Completion::all(
            statements
                .iter()
                .map(|(sql, params)| before_exec(&*self.hooks, sql, params))
                .collect(),
        );
        observed(done, self.inner.batch(cx, statements))
    }

    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        started(self.inner.begin(cx), Arc::clone(&self.hooks))
    }

    fn begin_with(
        &self,
        cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        started(self.inner.begin_with(cx, isolation), Arc::clone(&self.hooks))
    }

    fn prepare(
        &self,
        cx: &Cx,
        sql: &str,
    ) -> impl Future<Output = Outcome<PreparedStatement, Error>> + Send {
        self.inner.prepare(cx, sql)
    }

    fn query_prepared(
        &self,
        cx: &Cx,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let done = before_query(&*self.hooks, stmt.sql(), params);
        observed(done, self.inner.query_prepared(cx, stmt, params))
    }

    fn execute_prepared(
        &self,
        cx: &Cx,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let done = before_exec(&*self.hooks, stmt.sql(), params);
        observed(done, self.inner.execute_prepared(cx, stmt, params))
    }

    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.inner.ping(cx)
    }

    fn close(self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        self.inner.close(cx)
    }
}

/// Transaction bookkeeping: the identity and whether an end has been reported.
///
/// Kept apart from the wrapped transaction so `commit`/`rollback` can move the
/// transaction out while the scope keeps guarding the notification.
struct TxScope<H: Hooks + ?Sized> {
    id: TxId,
    hooks: Arc<H>,
    ended: bool,
}

impl<H: Hooks + ?Sized> TxScope<H> {
    fn begin(hooks: Arc<H>) -> Self {
        let id = TxId::generate();
        tracing::trace!(tx = %id, "Transaction started");
        hooks.on_begin(&id);
        Self {
            id,
            hooks,
            ended: false,
        }
    }

    fn commit(mut self) {
        self.ended = true;
        self.hooks.on_commit(&self.id);
    }

    fn rollback(mut self) {
        self.ended = true;
        self.hooks.on_rollback(&self.id);
    }
}

impl<H: Hooks + ?Sized> Drop for TxScope<H> {
    fn drop(&mut self) {
        if !self.ended {
            tracing::debug!(tx = %self.id, "Transaction dropped without commit or rollback");
            self.hooks.on_rollback(&self.id);
        }
    }
}

/// A transaction opened through a [`HookedConnection`].
///
/// `on_begin` has already been reported when this value exists. Exactly one
/// of `on_commit` or `on_rollback` follows with the same [`TxId`]: from
/// [`commit`](TransactionOps::commit), from
/// [`rollback`](TransactionOps::rollback), or, when the transaction is
/// dropped while still open, `on_rollback` from the destructor.
///
/// The driver's commit or rollback only starts once the returned future is
/// polled. Dropping that future early drops the driver transaction unfinished,
/// so the driver rolls back and `on_rollback` is reported.
pub struct HookedTransaction<T, H: Hooks + ?Sized = dyn Hooks> {
    inner: T,
    scope: TxScope<H>,
}

impl<T, H: Hooks + ?Sized> HookedTransaction<T, H> {
    fn start(inner: T, hooks: Arc<H>) -> Self {
        Self {
            inner,
            scope: TxScope::begin(hooks),
        }
    }

    /// The identity reported to the hooks for this transaction.
    pub fn id(&self) -> &TxId {
        &self.scope.id
    }
}

impl<T: fmt::Debug, H: Hooks + ?Sized> fmt::Debug for HookedTransaction<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookedTransaction")
            .field("id", &self.scope.id)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<T, H> TransactionOps for HookedTransaction<T, H>
where
    T: TransactionOps,
    H: Hooks + ?Sized,
{
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let done = before_query(&*self.scope.hooks, sql, params);
        observed(done, self.inner.query(cx, sql, params))
    }

    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let done = before_query(&*self.scope.hooks, sql, params);
        observed(done, self.inner.query_one(cx, sql, params))
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let done = before_exec(&*self.scope.hooks, sql, params);
        observed(done, self.inner.execute(cx, sql, params))
    }

    fn savepoint(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.inner.savepoint(cx, name)
    }

    fn rollback_to(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.inner.rollback_to(cx, name)
    }

    fn release(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.inner.release(cx, name)
    }

    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let Self { inner, scope } = self;
        async move {
            let outcome = inner.commit(cx).await;
            scope.commit();
            outcome
        }
    }

    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let Self { inner, scope } = self;
        async move {
            let outcome = inner.rollback(cx).await;
            scope.rollback();
            outcome
        }
    }
}
