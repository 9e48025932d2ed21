//! Extraction of a [`FailureReport`] from driver errors.
//!
//! SQLite reports extended result codes through sqlx as decimal strings; those
//! are passed through untouched. Failures detected on the client side (result
//! column lookup, decoding, I/O while connecting) are given the SQLite code
//! the engine itself would use for the same condition.

use sqlcodes::{ClassifiedError, FailureReport};
use std::error::Error as StdError;

/// Placeholder when neither the driver nor the chain carries a native code.
pub const NO_NATIVE_CODE: i32 = 0;
/// `SQLITE_CANTOPEN`
pub const SQLITE_CANTOPEN: i32 = 14;
/// `SQLITE_MISMATCH`
pub const SQLITE_MISMATCH: i32 = 20;
/// `SQLITE_RANGE`
pub const SQLITE_RANGE: i32 = 25;

/// Report for a failed sqlx call.
pub fn failure_report(err: &sqlx::Error, statement: Option<&str>) -> FailureReport {
    report_from_error(err, statement)
}

/// Report for an arbitrary error, walking its `source()` chain until a driver
/// error, an I/O error or an already classified error turns up.
pub fn report_from_error(
    err: &(dyn StdError + 'static),
    statement: Option<&str>,
) -> FailureReport {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(sqlx_err) = e.downcast_ref::<sqlx::Error>() {
            if let Some(report) = native_report(sqlx_err) {
                return attach_statement(report, statement);
            }
        } else if let Some(classified) = e.downcast_ref::<ClassifiedError>() {
            return attach_statement(reopen(classified), statement);
        } else if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return attach_statement(FailureReport::new(SQLITE_CANTOPEN, io.to_string()), statement);
        }
        current = e.source();
    }

    attach_statement(FailureReport::new(NO_NATIVE_CODE, err.to_string()), statement)
}

fn native_report(err: &sqlx::Error) -> Option<FailureReport> {
    match err {
        sqlx::Error::Database(db) => Some(database_report(db.as_ref())),
        sqlx::Error::ColumnNotFound(name) => Some(FailureReport::new(
            SQLITE_RANGE,
            format!("no column named '{name}' in result set"),
        )),
        sqlx::Error::ColumnIndexOutOfBounds { index, len } => Some(FailureReport::new(
            SQLITE_RANGE,
            format!("column index {index} out of range; result has {len} columns"),
        )),
        sqlx::Error::ColumnDecode { index, source } => Some(FailureReport::new(
            SQLITE_MISMATCH,
            format!("cannot decode column {index}: {source}"),
        )),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => Some(FailureReport::new(SQLITE_CANTOPEN, err.to_string())),
        _ => None,
    }
}

fn database_report(db: &dyn sqlx::error::DatabaseError) -> FailureReport {
    let raw = db.code();
    match raw.as_deref().and_then(|c| c.trim().parse::<i32>().ok()) {
        Some(code) => FailureReport::new(code, db.message()),
        // Non-numeric codes are SQLSTATEs from other backends
        None => {
            let report = FailureReport::new(NO_NATIVE_CODE, db.message());
            match raw {
                Some(state) => report.with_sql_state(state.into_owned()),
                None => report,
            }
        }
    }
}

fn reopen(err: &ClassifiedError) -> FailureReport {
    let mut report = FailureReport::new(err.vendor_code(), err.native_message());
    if let Some(stmt) = err.failed_statement() {
        report = report.with_statement(stmt);
    }
    if let Some(state) = err.sql_state() {
        report = report.with_sql_state(state);
    }
    report
}

fn attach_statement(report: FailureReport, statement: Option<&str>) -> FailureReport {
    match statement {
        Some(stmt) => report.with_statement(stmt),
        None => report,
    }
}
