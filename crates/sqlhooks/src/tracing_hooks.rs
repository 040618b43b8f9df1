//! Hooks that log through `tracing`.

use crate::completion::Completion;
use crate::hooks::{Hooks, TxId};
use sqlhooks_core::Value;
use std::time::{Duration, Instant};

/// Configuration for [`TracingHooks`].
#[derive(Debug, Clone)]
pub struct TracingHooksConfig {
    /// Statements taking at least this long are logged at `warn`.
    pub slow_threshold: Option<Duration>,
    /// Include bound arguments, as JSON, in statement events.
    pub log_params: bool,
}

impl Default for TracingHooksConfig {
    fn default() -> Self {
        Self {
            slow_threshold: Some(Duration::from_millis(500)),
            log_params: false,
        }
    }
}

impl TracingHooksConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slow statement threshold.
    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    /// Never flag statements as slow.
    pub fn no_slow_threshold(mut self) -> Self {
        self.slow_threshold = None;
        self
    }

    /// Enable/disable argument logging.
    pub fn log_params(mut self, enabled: bool) -> Self {
        self.log_params = enabled;
        self
    }
}

/// Logs every statement with its elapsed time, and every transaction
/// boundary with its id.
///
/// Statements are logged at `debug` when they finish, or at `warn` when they
/// reach [`slow_threshold`](TracingHooksConfig::slow_threshold). Arguments are
/// left out unless [`log_params`](TracingHooksConfig::log_params) is set, since
/// they may carry user data.
#[derive(Debug, Clone, Default)]
pub struct TracingHooks {
    config: TracingHooksConfig,
}

impl TracingHooks {
    pub fn new(config: TracingHooksConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TracingHooksConfig {
        &self.config
    }

    fn statement(&self, kind: &'static str, query: &str, args: &[Value]) -> Completion {
        let query = query.to_string();
        let params = self
            .config
            .log_params
            .then(|| serde_json::Value::Array(args.iter().map(Value::to_json).collect()));
        let slow_threshold = self.config.slow_threshold;
        let started = Instant::now();

        tracing::trace!(kind, sql = %query, "Statement started");

        Completion::new(move || {
            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
            let params = params.map(|p| p.to_string());
            if slow_threshold.is_some_and(|t| elapsed >= t) {
                tracing::warn!(
                    kind,
                    sql = %query,
                    params = params.as_deref().map(tracing::field::display),
                    elapsed_ms,
                    "Slow statement"
                );
            } else {
                tracing::debug!(
                    kind,
                    sql = %query,
                    params = params.as_deref().map(tracing::field::display),
                    elapsed_ms,
                    "Statement finished"
                );
            }
        })
    }
}

impl Hooks for TracingHooks {
    fn before_exec(&self, query: &str, args: &[Value]) -> Completion {
        self.statement("exec", query, args)
    }

    fn before_query(&self, query: &str, args: &[Value]) -> Completion {
        self.statement("query", query, args)
    }

    fn on_begin(&self, tx: &TxId) {
        tracing::debug!(tx = %tx, "Transaction begin");
    }

    fn on_commit(&self, tx: &TxId) {
        tracing::debug!(tx = %tx, "Transaction commit");
    }

    fn on_rollback(&self, tx: &TxId) {
        tracing::debug!(tx = %tx, "Transaction rollback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::capture;

    #[test]
    fn statements_are_logged_on_completion() {
        let hooks = TracingHooks::new(TracingHooksConfig::new().no_slow_threshold());
        let logs = capture(|| {
            let done = hooks.before_exec("INSERT|t|f1=?", &[Value::from("secret")]);
            done.complete();
        });

        assert!(logs.contains("Statement started"));
        assert!(logs.contains("Statement finished"));
        assert!(logs.contains("INSERT|t|f1=?"));
        assert!(!logs.contains("secret"));
        assert!(!logs.contains("WARN"));
    }

    #[test]
    fn slow_statements_warn() {
        let hooks = TracingHooks::new(TracingHooksConfig::new().slow_threshold(Duration::ZERO));
        let logs = capture(|| hooks.before_query("SELECT|t|f1|", &[]).complete());

        assert!(logs.contains("WARN"));
        assert!(logs.contains("Slow statement"));
    }

    #[test]
    fn params_are_logged_when_enabled() {
        let hooks = TracingHooks::new(TracingHooksConfig::new().log_params(true));
        let logs = capture(|| {
            hooks
                .before_exec("INSERT|t|f1=?,f2=?", &[Value::from("foo"), Value::Int(3)])
                .complete();
        });

        assert!(logs.contains(r#"["foo",3]"#));
    }

    #[test]
    fn transaction_boundaries_are_logged() {
        let hooks = TracingHooks::default();
        let tx = TxId::generate();
        let logs = capture(|| {
            hooks.on_begin(&tx);
            hooks.on_rollback(&tx);
        });

        assert!(logs.contains("Transaction begin"));
        assert!(logs.contains("Transaction rollback"));
        assert!(logs.contains(tx.as_str()));
    }
}
