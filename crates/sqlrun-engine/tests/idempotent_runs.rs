use async_trait::async_trait;
use sqlrun_common::{Error, Result};
use sqlrun_engine::{
    ExecutionOutcome, GatePolicy, NamedScript, RunOutcome, SqlRunner, StatementExecutor,
    TableLister,
};
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Tiny stand-in for a database that remembers created tables across runs
/// and rejects multi-statement submissions.
#[derive(Default)]
struct FakeBackend {
    tables: Mutex<BTreeSet<String>>,
    submitted: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

fn word_after<'s>(sql: &'s str, prefix: &str) -> Option<&'s str> {
    let upper = sql.to_uppercase();
    upper.strip_prefix(prefix)?;
    sql[prefix.len()..]
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .find(|w| !w.is_empty())
}

#[async_trait]
impl StatementExecutor for FakeBackend {
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.submitted.lock().unwrap().push(sql.to_string());

        let body = sql.trim_end_matches(';');
        if body.contains(';') && !sql.to_uppercase().contains("BEGIN") {
            return Err(Error::Database("multiple statements provided".into()));
        }

        let mut tables = self.tables.lock().unwrap();
        if let Some(name) = word_after(sql, "CREATE TABLE ") {
            if !tables.insert(name.to_string()) {
                return Err(Error::Database(format!("table {name} already exists")));
            }
            return Ok(0);
        }
        if let Some(name) = word_after(sql, "DROP TABLE ") {
            tables.remove(name);
            return Ok(0);
        }
        if let Some(name) = word_after(sql, "INSERT INTO ") {
            if !tables.contains(name) {
                return Err(Error::Database(format!("no such table: {name}")));
            }
            return Ok(1);
        }
        Ok(0)
    }
}

#[async_trait]
impl TableLister for FakeBackend {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.lock().unwrap().iter().cloned().collect())
    }
}

struct BrokenLister;

#[async_trait]
impl TableLister for BrokenLister {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Err(Error::Database("connection closed".into()))
    }
}

const SCHEMA: &str = "\
-- users and their audit trail
CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE audit (user_id INTEGER);

-- keep the audit table in sync
CREATE TRIGGER users_audit AFTER INSERT ON users
BEGIN
    INSERT INTO audit (user_id) VALUES (new.id);
    UPDATE users SET name = upper(name) WHERE id = new.id;
END;
";

#[tokio::test]
async fn rerunning_a_migration_succeeds_through_skips() {
    let backend = FakeBackend::default();
    let runner = SqlRunner::new(&backend);

    let first = runner.run_migration(SCHEMA, Some(&backend)).await;
    assert!(first.success());
    assert_eq!(first.succeeded(), 3);
    assert_eq!(first.skipped(), 0);
    assert_eq!(
        first.tables(),
        Some(&["audit".to_string(), "users".to_string()][..])
    );

    let second = runner.run_migration(SCHEMA, Some(&backend)).await;
    assert!(second.success());
    assert_eq!(second.failed(), 0);
    assert_eq!(second.skipped(), 2);
    for result in &second.results()[..2] {
        assert!(matches!(
            result.outcome,
            ExecutionOutcome::SkippedIdempotent { .. }
        ));
    }
}

#[tokio::test]
async fn trigger_is_submitted_as_one_statement() {
    let backend = FakeBackend::default();
    let runner = SqlRunner::new(&backend);

    let report = runner.run_migration(SCHEMA, None).await;

    let submitted = backend.submitted();
    assert_eq!(submitted.len(), 3);
    assert!(submitted[2].starts_with("CREATE TRIGGER users_audit"));
    assert!(submitted[2].ends_with("END;"));
    assert!(submitted.iter().all(|s| !s.contains("--")));
    assert_eq!(report.statements_executed(), 3);
    assert!(report.tables().is_none());
}

#[tokio::test]
async fn dangerous_script_is_blocked_before_any_execution() {
    let backend = FakeBackend::default();
    let runner = SqlRunner::new(&backend);

    let outcome = runner.run_script("DROP TABLE users;", false).await;
    match &outcome {
        RunOutcome::Blocked(blocked) => assert!(blocked.requires_confirmation()),
        other => panic!("expected blocked, got {other:?}"),
    }
    assert!(backend.submitted().is_empty());
    assert!(!outcome.success());

    let outcome = runner.run_script("DROP TABLE users;", true).await;
    let report = outcome.report().expect("confirmed script runs");
    assert_eq!(report.statements_executed(), 1);
    assert_eq!(backend.submitted(), vec!["DROP TABLE users;"]);
}

#[tokio::test]
async fn failures_do_not_stop_later_statements() {
    let backend = FakeBackend::default();
    let runner = SqlRunner::new(&backend);

    let outcome = runner
        .run_script(
            "INSERT INTO missing VALUES (1); CREATE TABLE a (id INT); INSERT INTO a VALUES (1);",
            false,
        )
        .await;
    let report = outcome.report().expect("not blocked");

    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.rows_affected_total(), 1);
    assert!(!report.success());
    assert!(report.partial());
    match &report.results()[0].outcome {
        ExecutionOutcome::Failed { error } => assert_eq!(error, "no such table: missing"),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn table_listing_failure_is_swallowed() {
    let backend = FakeBackend::default();
    let runner = SqlRunner::new(&backend);

    let report = runner
        .run_migration("CREATE TABLE a (id INT);", Some(&BrokenLister))
        .await;

    assert!(report.success());
    assert!(report.tables().is_none());
}

#[tokio::test]
async fn unterminated_block_is_reported_but_never_submitted() {
    let backend = FakeBackend::default();
    let runner = SqlRunner::new(&backend);

    let report = runner
        .run_migration(
            "CREATE TABLE a (id INT);\nCREATE TRIGGER t AFTER INSERT ON a BEGIN INSERT INTO a VALUES (1);",
            None,
        )
        .await;

    assert_eq!(backend.submitted(), vec!["CREATE TABLE a (id INT);"]);
    assert_eq!(report.statements_executed(), 1);
    assert_eq!(report.failed(), 1);
    assert!(!report.results()[1].executed);
}

#[tokio::test]
async fn migrations_are_exempt_from_the_gate_by_default() {
    let backend = FakeBackend::default();
    let runner = SqlRunner::new(&backend);
    let scripts = vec![
        NamedScript::new("001_init.sql", "CREATE TABLE a (id INT);"),
        NamedScript::new("002_cleanup.sql", "DROP TABLE a;"),
    ];

    let outcome = runner
        .run_migrations(&scripts, Some(&backend), GatePolicy::default())
        .await;
    let report = outcome.report().expect("exempt migrations run");

    assert!(report.success());
    assert_eq!(report.results()[0].source.as_deref(), Some("001_init.sql"));
    assert_eq!(report.results()[1].source.as_deref(), Some("002_cleanup.sql"));
    assert_eq!(report.tables(), Some(&[] as &[String]));

    let blocked = runner
        .run_migrations(
            &scripts,
            None,
            GatePolicy::Enforce {
                allow_dangerous: false,
            },
        )
        .await;
    assert!(blocked.is_blocked());
    assert_eq!(backend.submitted().len(), 2);
}
