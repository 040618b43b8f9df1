//! Test helpers: a recorder that turns every hook call into a log line, and
//! log capture for `tracing` output.

use crate::completion::Completion;
use crate::hooks::FnHooks;
use sqlhooks_core::{Error, Outcome, Value};
use std::io;
use std::sync::{Arc, Mutex};

pub(crate) fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
    }
}

fn args_json(args: &[Value]) -> String {
    serde_json::Value::Array(args.iter().map(Value::to_json).collect()).to_string()
}

/// Records hook calls as `"<event> <detail>"` strings.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn statement(&self, kind: &'static str) -> impl Fn(&str, &[Value]) -> Completion + use<> {
        let recorder = self.clone();
        move |query, args| {
            recorder.push(format!("{kind} {query} {}", args_json(args)));
            let recorder = recorder.clone();
            let query = query.to_string();
            Completion::new(move || recorder.push(format!("done {query}")))
        }
    }

    fn boundary(&self, kind: &'static str) -> impl Fn(&crate::TxId) + use<> {
        let recorder = self.clone();
        move |tx| recorder.push(format!("{kind} {tx}"))
    }

    /// Hooks that report to this recorder.
    pub(crate) fn hooks(&self) -> FnHooks {
        FnHooks::new()
            .with_exec(self.statement("exec"))
            .with_query(self.statement("query"))
            .with_begin(self.boundary("begin"))
            .with_commit(self.boundary("commit"))
            .with_rollback(self.boundary("rollback"))
    }
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a trace-level subscriber and return everything it logged.
pub(crate) fn capture(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = captured.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}
