//! Permission, connectivity and result-access failures.

mod common;

use common::{test_opts, TestDb};
use sqlcodes::ErrorCategory;
use sqlcodes_db::{report_from_error, sqlite_translator, ConnectOpts, DbError, SqlTemplate};
use std::fmt;
use std::time::Duration;

async fn seeded() -> TestDb {
    let db = TestDb::open().await.unwrap();
    db.template
        .execute_script(
            "CREATE TABLE TEST_PARENT (ID_ INTEGER PRIMARY KEY, STR_ VARCHAR(10) NOT NULL);
             INSERT INTO TEST_PARENT VALUES (1, 'test');",
        )
        .await
        .unwrap();
    db
}

#[tokio::test]
async fn write_through_read_only_connection_is_permission_denied() {
    let db = seeded().await;
    let dsn = db.dsn();

    let reader = SqlTemplate::connect(
        &dsn,
        ConnectOpts {
            read_only: true,
            create_if_missing: false,
            ..test_opts()
        },
    )
    .await
    .unwrap();

    let err = reader
        .execute("CREATE TABLE BLAH (ID_ INTEGER)")
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::PermissionDenied, "{err}");

    // Reading still works
    let rows = reader
        .query("SELECT STR_ FROM TEST_PARENT", |row| row.get::<String>("STR_"))
        .await
        .unwrap();
    assert_eq!(rows, vec!["test".to_string()]);
}

#[tokio::test]
async fn missing_database_location_is_connection_failure() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("no-such-dir").join("app.db");

    let result = SqlTemplate::connect(
        &TestDb::dsn_for(&path),
        ConnectOpts {
            create_if_missing: false,
            acquire_timeout: Some(Duration::from_secs(2)),
            ..ConnectOpts::default()
        },
    )
    .await;

    match result {
        Err(err @ DbError::Classified(_)) => {
            assert_eq!(err.category(), Some(ErrorCategory::ConnectionFailure), "{err}");
        }
        Err(other) => panic!("expected a classified failure, got {other:?}"),
        Ok(_) => panic!("connecting to {path:?} should fail"),
    }
}

#[tokio::test]
async fn unknown_result_column_name_is_invalid_result_access() {
    let db = seeded().await;
    let err = db
        .template
        .query("SELECT STR_ FROM TEST_PARENT", |row| row.get::<String>("STR__"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::InvalidResultAccess);
    assert_eq!(err.failed_statement(), Some("SELECT STR_ FROM TEST_PARENT"));
}

#[tokio::test]
async fn out_of_range_result_ordinal_is_invalid_result_access() {
    let db = seeded().await;
    let err = db
        .template
        .query_first("SELECT STR_ FROM TEST_PARENT", |row| row.get::<String>(7_usize))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::InvalidResultAccess);
}

#[tokio::test]
async fn query_first_on_empty_result_is_none() {
    let db = seeded().await;
    let row = db
        .template
        .query_first("SELECT STR_ FROM TEST_PARENT WHERE ID_ = 42", |row| {
            row.get::<String>(0_usize)
        })
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn syntax_error_in_query_is_bad_syntax() {
    let db = seeded().await;
    let err = db
        .template
        .query("SELEC STR_ FROM TEST_PARENT", |row| row.get::<String>(0_usize))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::BadSyntax);
    assert_eq!(err.vendor_code(), 1);
}

#[derive(Debug)]
struct ProvisioningError {
    source: std::io::Error,
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("could not provision database")
    }
}

impl std::error::Error for ProvisioningError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[test]
fn wrapped_network_failure_is_connection_failure() {
    let err = anyhow::Error::new(ProvisioningError {
        source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
    })
    .context("starting service");

    let report = report_from_error(&*err, None);
    let classified = sqlite_translator().translate_report(report);
    assert_eq!(classified.category(), ErrorCategory::ConnectionFailure);
    assert!(classified.is_transient());
}

#[tokio::test]
async fn classified_error_survives_rewrapping() {
    let db = seeded().await;
    let first = db
        .template
        .execute("INSERT INTO TEST_PARENT VALUES (1, 'dup')")
        .await
        .unwrap_err();
    let wrapped = anyhow::Error::new(first.clone()).context("saving parent");

    let again = sqlite_translator().translate_report(report_from_error(&*wrapped, None));
    assert_eq!(again.category(), ErrorCategory::DuplicateKey);
    assert_eq!(again.vendor_code(), first.vendor_code());
    assert_eq!(again.failed_statement(), first.failed_statement());
}
