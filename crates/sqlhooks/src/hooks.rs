//! The hook contract and the stock implementations.
//!
//! Implement [`Hooks`] to observe a driver. Every method has a no-op default,
//! so an implementation only overrides the extension points it cares about:
//!
//! - [`before_exec`](Hooks::before_exec) / [`before_query`](Hooks::before_query)
//!   run before the statement reaches the driver and return a [`Completion`]
//!   that fires once the driver call has finished, successfully or not.
//! - [`on_begin`](Hooks::on_begin), [`on_commit`](Hooks::on_commit) and
//!   [`on_rollback`](Hooks::on_rollback) report transaction boundaries with a
//!   [`TxId`] that is the same for a transaction's begin and its end.
//!
//! Hooks observe; they cannot change query text, arguments, results or errors.

use crate::completion::Completion;
use sqlhooks_core::Value;
use std::fmt;
use std::sync::Arc;

/// Opaque identity of one transaction.
///
/// Minted when the transaction begins and reported unchanged when it commits
/// or rolls back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxId(String);

impl TxId {
    /// A fresh, random identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TxId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Callbacks observing driver operations.
///
/// Hooks are shared by every connection a hooked driver opens and may be
/// called from several tasks at once, hence `Send + Sync`. A hook that
/// panics unwinds through the caller's database call.
pub trait Hooks: Send + Sync {
    /// Called before a statement (INSERT, UPDATE, DELETE, ...) executes.
    fn before_exec(&self, _query: &str, _args: &[Value]) -> Completion {
        Completion::noop()
    }

    /// Called before a query executes.
    fn before_query(&self, _query: &str, _args: &[Value]) -> Completion {
        Completion::noop()
    }

    /// A transaction has begun.
    fn on_begin(&self, _tx: &TxId) {}

    /// A transaction has been committed.
    fn on_commit(&self, _tx: &TxId) {}

    /// A transaction has been rolled back.
    fn on_rollback(&self, _tx: &TxId) {}
}

impl<H: Hooks + ?Sized> Hooks for &H {
    fn before_exec(&self, query: &str, args: &[Value]) -> Completion {
        (**self).before_exec(query, args)
    }

    fn before_query(&self, query: &str, args: &[Value]) -> Completion {
        (**self).before_query(query, args)
    }

    fn on_begin(&self, tx: &TxId) {
        (**self).on_begin(tx);
    }

    fn on_commit(&self, tx: &TxId) {
        (**self).on_commit(tx);
    }

    fn on_rollback(&self, tx: &TxId) {
        (**self).on_rollback(tx);
    }
}

impl<H: Hooks + ?Sized> Hooks for Arc<H> {
    fn before_exec(&self, query: &str, args: &[Value]) -> Completion {
        (**self).before_exec(query, args)
    }

    fn before_query(&self, query: &str, args: &[Value]) -> Completion {
        (**self).before_query(query, args)
    }

    fn on_begin(&self, tx: &TxId) {
        (**self).on_begin(tx);
    }

    fn on_commit(&self, tx: &TxId) {
        (**self).on_commit(tx);
    }

    fn on_rollback(&self, tx: &TxId) {
        (**self).on_rollback(tx);
    }
}

impl<H: Hooks + ?Sized> Hooks for Box<H> {
    fn before_exec(&self, query: &str, args: &[Value]) -> Completion {
        (**self).before_exec(query, args)
    }

    fn before_query(&self, query: &str, args: &[Value]) -> Completion {
        (**self).before_query(query, args)
    }

    fn on_begin(&self, tx: &TxId) {
        (**self).on_begin(tx);
    }

    fn on_commit(&self, tx: &TxId) {
        (**self).on_commit(tx);
    }

    fn on_rollback(&self, tx: &TxId) {
        (**self).on_rollback(tx);
    }
}

/// Two hooks run as one, like nested middleware: `A` sees each operation
/// first and its completion fires last.
impl<A: Hooks, B: Hooks> Hooks for (A, B) {
    fn before_exec(&self, query: &str, args: &[Value]) -> Completion {
        let outer = self.0.before_exec(query, args);
        let inner = self.1.before_exec(query, args);
        Completion::all(vec![inner, outer])
    }

    fn before_query(&self, query: &str, args: &[Value]) -> Completion {
        let outer = self.0.before_query(query, args);
        let inner = self.1.before_query(query, args);
        Completion::all(vec![inner, outer])
    }

    fn on_begin(&self, tx: &TxId) {
        self.0.on_begin(tx);
        self.1.on_begin(tx);
    }

    fn on_commit(&self, tx: &TxId) {
        self.1.on_commit(tx);
        self.0.on_commit(tx);
    }

    fn on_rollback(&self, tx: &TxId) {
        self.1.on_rollback(tx);
        self.0.on_rollback(tx);
    }
}

/// Hooks that observe nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl Hooks for NoopHooks {}

type StatementFn = dyn Fn(&str, &[Value]) -> Completion + Send + Sync;
type TxFn = dyn Fn(&TxId) + Send + Sync;

/// Hooks assembled from closures. Unset callbacks behave as no-ops.
///
/// ```rust,ignore
/// let hooks = FnHooks::new()
///     .with_exec(|query, _args| {
///         let query = query.to_string();
///         Completion::new(move || println!("done: {query}"))
///     })
///     .with_begin(|tx| println!("begin {tx}"));
/// ```
#[derive(Default)]
pub struct FnHooks {
    exec: Option<Box<StatementFn>>,
    query: Option<Box<StatementFn>>,
    begin: Option<Box<TxFn>>,
    commit: Option<Box<TxFn>>,
    rollback: Option<Box<TxFn>>,
}

impl FnHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exec(
        mut self,
        f: impl Fn(&str, &[Value]) -> Completion + Send + Sync + 'static,
    ) -> Self {
        self.exec = Some(Box::new(f));
        self
    }

    pub fn with_query(
        mut self,
        f: impl Fn(&str, &[Value]) -> Completion + Send + Sync + 'static,
    ) -> Self {
        self.query = Some(Box::new(f));
        self
    }

    pub fn with_begin(mut self, f: impl Fn(&TxId) + Send + Sync + 'static) -> Self {
        self.begin = Some(Box::new(f));
        self
    }

    pub fn with_commit(mut self, f: impl Fn(&TxId) + Send + Sync + 'static) -> Self {
        self.commit = Some(Box::new(f));
        self
    }

    pub fn with_rollback(mut self, f: impl Fn(&TxId) + Send + Sync + 'static) -> Self {
        self.rollback = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for FnHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHooks")
            .field("exec", &self.exec.is_some())
            .field("query", &self.query.is_some())
            .field("begin", &self.begin.is_some())
            .field("commit", &self.commit.is_some())
            .field("rollback", &self.rollback.is_some())
            .finish()
    }
}

impl Hooks for FnHooks {
    fn before_exec(&self, query: &str, args: &[Value]) -> Completion {
        self.exec
            .as_ref()
            .map_or_else(Completion::noop, |f| f(query, args))
    }

    fn before_query(&self, query: &str, args: &[Value]) -> Completion {
        self.query
            .as_ref()
            .map_or_else(Completion::noop, |f| f(query, args))
    }

    fn on_begin(&self, tx: &TxId) {
        if let Some(f) = &self.begin {
            f(tx);
        }
    }

    fn on_commit(&self, tx: &TxId) {
        if let Some(f) = &self.commit {
            f(tx);
        }
    }

    fn on_rollback(&self, tx: &TxId) {
        if let Some(f) = &self.rollback {
            f(tx);
        }
    }
}
