use asupersync::runtime::RuntimeBuilder;
use sqlhooks::{
    AnyConnection, Completion, Connection, Cx, Driver, DriverErrorKind, DriverRegistry, Error,
    FnHooks, HookedDriver, Hooks, NoopHooks, Outcome, TransactionOps, Value,
};
use sqlhooks_memdb::MemDriver;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

const BASE_DRIVER: &str = "memdb";

/// Registers the plain memdb driver once for the whole test binary.
fn base_driver() -> &'static str {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        DriverRegistry::global()
            .register(BASE_DRIVER, MemDriver::new())
            .expect("register memdb");
    });
    BASE_DRIVER
}

/// Prepares a fresh database through the plain driver, then registers a
/// hooked driver under a unique name and opens the same database through it.
async fn open_with_hooks(cx: &Cx, hooks: impl Hooks + 'static) -> AnyConnection {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let dsn = format!("db-{n}");

    let raw = unwrap_outcome(sqlhooks::open(cx, base_driver(), &dsn).await);
    unwrap_outcome(raw.execute(cx, "WIPE", &[]).await);
    unwrap_outcome(raw.execute(cx, "CREATE|t|f1=string,f2=string", &[]).await);

    let name = format!("memdb-hooked-{n}");
    sqlhooks::register(&name, base_driver(), hooks).expect("register hooked driver");
    unwrap_outcome(sqlhooks::open(cx, &name, &dsn).await)
}

type Seen = Arc<Mutex<Vec<(String, Vec<Value>)>>>;

/// Hooks recording every statement they see and counting fired completions.
fn observing(seen: &Seen, done: &Arc<AtomicUsize>) -> FnHooks {
    let record = |seen: Seen, done: Arc<AtomicUsize>| {
        move |query: &str, args: &[Value]| {
            seen.lock().unwrap().push((query.to_string(), args.to_vec()));
            let done = Arc::clone(&done);
            Completion::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
        }
    };
    FnHooks::new()
        .with_exec(record(Arc::clone(seen), Arc::clone(done)))
        .with_query(record(Arc::clone(seen), Arc::clone(done)))
}

#[test]
fn hooks_observe_query_text_and_arguments() {
    let cases: &[(&str, &str, Vec<Value>)] = &[
        ("exec", "INSERT|t|f1=?,f2=?", vec!["foo".into(), "bar".into()]),
        ("query", "SELECT|t|f1|f1=?,f2=?", vec!["foo".into(), "bar".into()]),
        ("query", "SELECT|t|f1|", vec![]),
        ("stmt.query", "SELECT|t|f1|", vec![]),
        ("stmt.exec", "INSERT|t|f1=?", vec!["x".into()]),
        ("tx.query", "SELECT|t|f1|", vec![]),
        ("tx.exec", "INSERT|t|f1=?", vec!["x".into()]),
    ];

    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    for (op, query, args) in cases {
        let seen = Seen::default();
        let done = Arc::new(AtomicUsize::new(0));

        rt.block_on(async {
            let db = open_with_hooks(&cx, observing(&seen, &done)).await;
            match *op {
                "exec" => {
                    unwrap_outcome(db.execute(&cx, query, args).await);
                }
                "query" => {
                    unwrap_outcome(db.query(&cx, query, args).await);
                }
                "stmt.query" => {
                    let stmt = unwrap_outcome(db.prepare(&cx, query).await);
                    unwrap_outcome(db.query_prepared(&cx, &stmt, args).await);
                }
                "stmt.exec" => {
                    let stmt = unwrap_outcome(db.prepare(&cx, query).await);
                    unwrap_outcome(db.execute_prepared(&cx, &stmt, args).await);
                }
                "tx.query" => {
                    let tx = unwrap_outcome(db.begin(&cx).await);
                    unwrap_outcome(tx.query(&cx, query, args).await);
                    unwrap_outcome(tx.commit(&cx).await);
                }
                "tx.exec" => {
                    let tx = unwrap_outcome(db.begin(&cx).await);
                    unwrap_outcome(tx.execute(&cx, query, args).await);
                    unwrap_outcome(tx.commit(&cx).await);
                }
                other => panic!("unknown op {other}"),
            }
        });

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(query.to_string(), args.clone())],
            "{op}"
        );
        assert_eq!(done.load(Ordering::SeqCst), 1, "{op}: completion should fire once");
    }
}

#[test]
fn empty_hooks_change_nothing() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let db = open_with_hooks(&cx, NoopHooks).await;
        assert_eq!(
            unwrap_outcome(db.execute(&cx, "INSERT|t|f1=?", &[Value::from("foo")]).await),
            1
        );
        assert_eq!(
            unwrap_outcome(db.insert(&cx, "INSERT|t|f1=?", &[Value::from("bar")]).await),
            2
        );
        let rows = unwrap_outcome(db.query(&cx, "SELECT|t|f1|", &[]).await);
        assert_eq!(rows.len(), 2);
        let first = unwrap_outcome(
            db.query_one(&cx, "SELECT|t|f1|f1=?", &[Value::from("bar")])
                .await,
        );
        assert_eq!(first.unwrap().get_named::<String>("f1").unwrap(), "bar");
        assert!(db.is_valid(&cx).await);
        db.close(&cx).await.unwrap();
    });
}

#[test]
fn create_insert_and_select() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    let mut values: Vec<String> = rt.block_on(async {
        let db = open_with_hooks(&cx, NoopHooks).await;
        for (f1, f2) in [("c", "3"), ("a", "1"), ("b", "2")] {
            unwrap_outcome(
                db.execute(&cx, "INSERT|t|f1=?,f2=?", &[Value::from(f1), Value::from(f2)])
                    .await,
            );
        }
        unwrap_outcome(db.query(&cx, "SELECT|t|f1|", &[]).await)
            .iter()
            .map(|row| row.get_named::<String>("f1").unwrap())
            .collect::<Vec<_>>()
    });

    values.sort();
    assert_eq!(values, vec!["a", "b", "c"]);
}

#[test]
fn batch_reports_each_statement() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let seen = Seen::default();
    let done = Arc::new(AtomicUsize::new(0));

    rt.block_on(async {
        let db = open_with_hooks(&cx, observing(&seen, &done)).await;
        let statements = vec![
            ("INSERT|t|f1=?".to_string(), vec![Value::from("a")]),
            ("INSERT|t|f1=?,f2=?".to_string(), vec![Value::from("b"), Value::from("c")]),
        ];
        assert_eq!(unwrap_outcome(db.batch(&cx, &statements).await), vec![1, 1]);
        assert_eq!(*seen.lock().unwrap(), statements);
    });

    assert_eq!(done.load(Ordering::SeqCst), 2);
}

#[derive(Default)]
struct TxLog {
    begin: Mutex<Vec<String>>,
    commit: Mutex<Vec<String>>,
    rollback: Mutex<Vec<String>>,
}

impl Hooks for TxLog {
    fn on_begin(&self, tx: &sqlhooks::TxId) {
        self.begin.lock().unwrap().push(tx.to_string());
    }

    fn on_commit(&self, tx: &sqlhooks::TxId) {
        self.commit.lock().unwrap().push(tx.to_string());
    }

    fn on_rollback(&self, tx: &sqlhooks::TxId) {
        self.rollback.lock().unwrap().push(tx.to_string());
    }
}

#[test]
fn transactions_report_the_same_id_at_both_ends() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    for op in ["commit", "rollback"] {
        let log = Arc::new(TxLog::default());

        rt.block_on(async {
            let db = open_with_hooks(&cx, Arc::clone(&log)).await;
            let tx = unwrap_outcome(db.begin(&cx).await);
            match op {
                "commit" => unwrap_outcome(tx.commit(&cx).await),
                _ => unwrap_outcome(tx.rollback(&cx).await),
            }
        });

        let begin = log.begin.lock().unwrap().clone();
        let (ended, other) = match op {
            "commit" => (
                log.commit.lock().unwrap().clone(),
                log.rollback.lock().unwrap().clone(),
            ),
            _ => (
                log.rollback.lock().unwrap().clone(),
                log.commit.lock().unwrap().clone(),
            ),
        };
        assert_eq!(begin.len(), 1, "{op}");
        assert!(!begin[0].is_empty(), "{op}: id should not be empty");
        assert_eq!(ended, begin, "{op}");
        assert!(other.is_empty(), "{op}");
    }
}

#[test]
fn transaction_ids_are_distinct() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let log = Arc::new(TxLog::default());

    rt.block_on(async {
        let db = open_with_hooks(&cx, Arc::clone(&log)).await;
        for _ in 0..3 {
            let tx = unwrap_outcome(db.begin(&cx).await);
            unwrap_outcome(tx.commit(&cx).await);
        }
    });

    let mut ids = log.begin.lock().unwrap().clone();
    assert_eq!(*log.commit.lock().unwrap(), ids);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn dropped_transaction_reports_rollback_and_is_rolled_back() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let log = Arc::new(TxLog::default());

    let remaining = rt.block_on(async {
        let db = open_with_hooks(&cx, Arc::clone(&log)).await;
        {
            let tx = unwrap_outcome(db.begin(&cx).await);
            unwrap_outcome(tx.execute(&cx, "INSERT|t|f1=?", &[Value::from("x")]).await);
        }
        unwrap_outcome(db.query(&cx, "SELECT|t|f1|", &[]).await).len()
    });

    assert_eq!(remaining, 0);
    assert_eq!(*log.rollback.lock().unwrap(), *log.begin.lock().unwrap());
    assert!(log.commit.lock().unwrap().is_empty());
}

#[test]
fn failed_statement_still_completes_and_error_is_unchanged() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let seen = Seen::default();
    let done = Arc::new(AtomicUsize::new(0));

    rt.block_on(async {
        let db = open_with_hooks(&cx, observing(&seen, &done)).await;
        match db.query(&cx, "SELECT|missing|f1|", &[]).await {
            Outcome::Err(e) => assert_eq!(e.sql(), Some("SELECT|missing|f1|")),
            other => panic!("expected an error, got {other:?}"),
        }
        match db.execute(&cx, "INSERT|t|f1=?", &[]).await {
            Outcome::Err(Error::Query(_)) => {}
            other => panic!("expected a query error, got {other:?}"),
        }
    });

    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(done.load(Ordering::SeqCst), 2);
}

#[test]
fn dropped_future_still_completes() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let seen = Seen::default();
    let done = Arc::new(AtomicUsize::new(0));
    let driver = HookedDriver::new(MemDriver::new(), observing(&seen, &done));

    rt.block_on(async {
        let db = unwrap_outcome(driver.open(&cx, "db").await);
        let pending = db.execute(&cx, "WIPE", &[]);
        drop(pending);
    });

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn wrapping_an_unknown_driver_fails() {
    let err = sqlhooks::register("hooked-nothing", "no-such-driver", NoopHooks).unwrap_err();
    assert_eq!(err.driver_kind(), Some(DriverErrorKind::NotFound));
    assert!(!sqlhooks::drivers().contains(&"hooked-nothing".to_string()));
}

#[test]
fn registering_a_name_twice_fails() {
    sqlhooks::register("memdb-twice", base_driver(), NoopHooks).unwrap();
    let err = sqlhooks::register("memdb-twice", base_driver(), NoopHooks).unwrap_err();
    assert_eq!(err.driver_kind(), Some(DriverErrorKind::AlreadyRegistered));
}

#[test]
fn hooks_stack() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let seen = Seen::default();
    let done = Arc::new(AtomicUsize::new(0));
    let log = Arc::new(TxLog::default());

    rt.block_on(async {
        let db = open_with_hooks(&cx, (observing(&seen, &done), Arc::clone(&log))).await;
        let tx = unwrap_outcome(db.begin(&cx).await);
        unwrap_outcome(tx.execute(&cx, "INSERT|t|f1=?", &[Value::from("x")]).await);
        unwrap_outcome(tx.commit(&cx).await);
    });

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(log.commit.lock().unwrap().len(), 1);
}
