use sqlrun_db::{SqliteExecutor, discover_migrations};
use sqlrun_engine::{ExecutionOutcome, GatePolicy, NamedScript, SqlRunner};
use std::fs;

const SCHEMA: &str = "\
-- core tables
CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, status INTEGER DEFAULT 0);
CREATE TABLE audit (user_id INTEGER, flag INTEGER);
CREATE INDEX idx_audit_user ON audit(user_id);

-- audit every new user; the CASE ... END must not close the trigger early
CREATE TRIGGER users_audit AFTER INSERT ON users
BEGIN
    INSERT INTO audit (user_id, flag)
        VALUES (new.id, CASE WHEN new.status > 0 THEN 1 ELSE 0 END);
    UPDATE users SET name = upper(name) WHERE id = new.id;
END;

INSERT INTO users (id, name) VALUES (1, 'ann; the first');
";

#[tokio::test]
async fn schema_applies_once_and_reruns_as_skips() {
    let db = SqliteExecutor::in_memory().expect("failed to open in-memory database");
    let runner = SqlRunner::new(&db);

    let first = runner.run_migration(SCHEMA, Some(&db)).await;
    assert!(first.success(), "{first}");
    assert_eq!(first.statements_executed(), 5);
    assert_eq!(first.succeeded(), 5);
    assert_eq!(first.rows_affected_total(), 1);
    assert_eq!(
        first.tables(),
        Some(&["audit".to_string(), "users".to_string()][..])
    );

    let second = runner.run_migration(SCHEMA, Some(&db)).await;
    assert!(second.success(), "{second}");
    assert_eq!(second.skipped(), 5);
    match &second.results()[4].outcome {
        ExecutionOutcome::SkippedIdempotent { reason } => {
            assert!(reason.contains("UNIQUE constraint failed"), "{reason}");
        }
        other => panic!("expected the seed insert to be skipped, got {other:?}"),
    }

    // the trigger fired exactly once, for the first seed insert
    let touched = runner
        .run_script("UPDATE audit SET flag = flag;", false)
        .await;
    assert_eq!(
        touched.report().expect("not blocked").rows_affected_total(),
        1
    );
}

#[tokio::test]
async fn destructive_scripts_need_confirmation() {
    let db = SqliteExecutor::in_memory().expect("failed to open in-memory database");
    let runner = SqlRunner::new(&db);
    runner.run_migration(SCHEMA, None).await;

    let blocked = runner.run_script("DELETE FROM audit;", false).await;
    assert!(blocked.is_blocked());

    let confirmed = runner.run_script("DELETE FROM audit;", true).await;
    let report = confirmed.report().expect("confirmed run completes");
    assert!(report.success());
    assert_eq!(report.rows_affected_total(), 1);
}

#[tokio::test]
async fn unrelated_failure_leaves_a_partial_report() {
    let db = SqliteExecutor::in_memory().expect("failed to open in-memory database");
    let runner = SqlRunner::new(&db);

    let outcome = runner
        .run_script(
            "CREATE INDEX idx_missing ON missing(id);\nCREATE TABLE a (id INTEGER);",
            false,
        )
        .await;
    let report = outcome.report().expect("not blocked");

    assert!(report.partial());
    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 1);
}

#[tokio::test]
async fn migration_directory_applies_in_order() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    fs::write(
        dir.path().join("002_seed.sql"),
        "INSERT INTO users (id, name) VALUES (2, 'bob');",
    )
    .unwrap();
    fs::write(dir.path().join("001_schema.sql"), SCHEMA).unwrap();

    let files = discover_migrations(dir.path()).expect("discover should succeed");
    let scripts: Vec<NamedScript> = files.iter().map(|f| f.to_script()).collect();

    let db = SqliteExecutor::open(&dir.path().join("app.db")).expect("open should succeed");
    let runner = SqlRunner::new(&db);

    let outcome = runner
        .run_migrations(&scripts, Some(&db), GatePolicy::Exempt)
        .await;
    let report = outcome.report().expect("exempt migrations are not blocked");
    assert!(report.success(), "{report}");
    assert_eq!(report.statements_executed(), 6);
    assert_eq!(report.results()[5].source.as_deref(), Some("002_seed.sql"));

    let again = runner
        .run_migrations(&scripts, Some(&db), GatePolicy::Exempt)
        .await;
    let report = again.report().expect("exempt migrations are not blocked");
    assert!(report.success(), "{report}");
    assert_eq!(report.skipped(), 6);
}
