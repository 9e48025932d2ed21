//! Statement execution against SQLite with classified failures.
//!
//! [`SqlTemplate`] runs statements on a sqlx pool and turns every driver
//! failure into a [`ClassifiedError`] using the shared SQLite registry (or any
//! translator supplied by the caller). Result columns are read through
//! [`RowReader`], so a bad column name or ordinal is classified the same way as
//! a failed statement.
//!
//! ```no_run
//! # async fn demo() -> Result<(), sqlcodes_db::DbError> {
//! use sqlcodes::ErrorCategory;
//! use sqlcodes_db::{ConnectOpts, SqlTemplate};
//!
//! let db = SqlTemplate::connect("sqlite::memory:", ConnectOpts::default()).await?;
//! db.execute("CREATE TABLE T (ID_ INTEGER PRIMARY KEY)").await?;
//! db.execute("INSERT INTO T VALUES (1)").await?;
//!
//! let err = db.execute("INSERT INTO T VALUES (1)").await.unwrap_err();
//! assert_eq!(err.category(), ErrorCategory::DuplicateKey);
//! # Ok(())
//! # }
//! ```

pub mod report;

use sqlcodes::{vendors, ClassifiedError, ErrorCategory, ErrorCodeRegistry, ExceptionTranslator};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use report::{failure_report, report_from_error};

/// Library error type
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Unsupported DSN (expected sqlite:...): {0}")]
    UnsupportedDsn(String),
    #[error("Invalid DSN '{dsn}': {source}")]
    InvalidDsn {
        dsn: String,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Classified(#[from] ClassifiedError),
}

impl DbError {
    /// Category of a classified failure; `None` for DSN problems.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            DbError::Classified(e) => Some(e.category()),
            _ => None,
        }
    }
}

/// Pool and connection options.
#[derive(Clone, Debug)]
pub struct ConnectOpts {
    /// Maximum number of connections in the pool. Forced to 1 for in-memory DSNs.
    pub max_conns: Option<u32>,
    /// Timeout to acquire a connection from the pool.
    pub acquire_timeout: Option<Duration>,
    /// Idle timeout before a connection is closed.
    pub idle_timeout: Option<Duration>,
    /// How long SQLite waits on a locked database before reporting `SQLITE_BUSY`.
    pub busy_timeout: Option<Duration>,
    /// Open the database read-only.
    pub read_only: bool,
    /// Create the database file if it does not exist.
    pub create_if_missing: bool,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            max_conns: Some(4),
            acquire_timeout: Some(Duration::from_secs(30)),
            idle_timeout: None,
            busy_timeout: Some(Duration::from_millis(5_000)),
            read_only: false,
            create_if_missing: true,
        }
    }
}

/// Translator backed by the shared built-in SQLite registry.
pub fn sqlite_translator() -> ExceptionTranslator {
    let registry = vendors::builtin(vendors::SQLITE.vendor)
        .unwrap_or_else(|| Arc::new(ErrorCodeRegistry::from_def(&vendors::SQLITE)));
    ExceptionTranslator::new(registry)
}

/// Executes statements and classifies their failures.
#[derive(Clone)]
pub struct SqlTemplate {
    pool: SqlitePool,
    translator: ExceptionTranslator,
    dsn: String,
}

impl std::fmt::Debug for SqlTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlTemplate")
            .field("dsn", &self.dsn)
            .field("vendor", &self.translator.registry().vendor())
            .finish()
    }
}

impl SqlTemplate {
    /// Check that the DSN names a SQLite database.
    pub fn detect(dsn: &str) -> Result<(), DbError> {
        let s = dsn.trim_start();
        if s.starts_with("sqlite:") {
            Ok(())
        } else {
            Err(DbError::UnsupportedDsn(dsn.to_string()))
        }
    }

    /// Connect using the built-in SQLite registry.
    pub async fn connect(dsn: &str, opts: ConnectOpts) -> Result<Self, DbError> {
        Self::connect_with(dsn, opts, sqlite_translator()).await
    }

    /// Connect with a caller-supplied translator (for example one carrying overrides).
    pub async fn connect_with(
        dsn: &str,
        opts: ConnectOpts,
        translator: ExceptionTranslator,
    ) -> Result<Self, DbError> {
        Self::detect(dsn)?;
        let dsn = dsn.trim_start();

        let mut conn_opts = SqliteConnectOptions::from_str(dsn).map_err(|source| {
            DbError::InvalidDsn {
                dsn: dsn.to_string(),
                source,
            }
        })?;
        conn_opts = conn_opts
            .foreign_keys(true)
            .read_only(opts.read_only)
            .create_if_missing(opts.create_if_missing);
        if let Some(t) = opts.busy_timeout {
            conn_opts = conn_opts.busy_timeout(t);
        }

        let in_memory = dsn.contains(":memory:") || dsn.contains("mode=memory");
        let mut o = SqlitePoolOptions::new();
        if in_memory {
            // Every connection would otherwise see its own empty database
            o = o.max_connections(1).idle_timeout(None).max_lifetime(None);
        } else if let Some(n) = opts.max_conns {
            o = o.max_connections(n);
        }
        if let Some(t) = opts.acquire_timeout {
            o = o.acquire_timeout(t);
        }
        if !in_memory {
            if let Some(t) = opts.idle_timeout {
                o = o.idle_timeout(t);
            }
        }

        let pool = o.connect_with(conn_opts).await.map_err(|e| {
            let classified = translator.translate_report(failure_report(&e, None));
            tracing::warn!(
                dsn,
                category = %classified.category(),
                vendor_code = classified.vendor_code(),
                "database connection failed"
            );
            DbError::Classified(classified)
        })?;

        tracing::info!(dsn, read_only = opts.read_only, "database connected");
        Ok(Self {
            pool,
            translator,
            dsn: dsn.to_string(),
        })
    }

    /// Run one statement, returning the number of affected rows.
    pub async fn execute(&self, sql: &str) -> Result<u64, ClassifiedError> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| self.classify(&e, sql))
    }

    /// Run a script of `;`-separated statements without preparing them.
    pub async fn execute_script(&self, script: &str) -> Result<u64, ClassifiedError> {
        sqlx::raw_sql(script)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| self.classify(&e, script))
    }

    /// Run a query and map every row with `extract`.
    pub async fn query<T, F>(&self, sql: &str, mut extract: F) -> Result<Vec<T>, ClassifiedError>
    where
        F: FnMut(&RowReader<'_>) -> Result<T, ClassifiedError>,
    {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.classify(&e, sql))?;

        rows.iter()
            .map(|row| {
                extract(&RowReader {
                    row,
                    statement: sql,
                    template: self,
                })
            })
            .collect()
    }

    /// Run a query and map the first row, if any.
    pub async fn query_first<T, F>(&self, sql: &str, extract: F) -> Result<Option<T>, ClassifiedError>
    where
        F: FnOnce(&RowReader<'_>) -> Result<T, ClassifiedError>,
    {
        let row = sqlx::query(sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(&e, sql))?;

        row.as_ref()
            .map(|row| {
                extract(&RowReader {
                    row,
                    statement: sql,
                    template: self,
                })
            })
            .transpose()
    }

    pub fn translator(&self) -> &ExceptionTranslator {
        &self.translator
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Graceful pool close.
    pub async fn close(self) {
        self.pool.close().await;
    }

    fn classify(&self, err: &sqlx::Error, sql: &str) -> ClassifiedError {
        let classified = self.translator.translate_report(failure_report(err, Some(sql)));
        tracing::debug!(
            category = %classified.category(),
            vendor_code = classified.vendor_code(),
            statement = sql,
            "statement failed"
        );
        classified
    }
}

/// A result column addressed by name or by 0-based ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef<'a> {
    Name(&'a str),
    Ordinal(usize),
}

impl<'a> From<&'a str> for ColumnRef<'a> {
    fn from(name: &'a str) -> Self {
        ColumnRef::Name(name)
    }
}

impl From<usize> for ColumnRef<'_> {
    fn from(ordinal: usize) -> Self {
        ColumnRef::Ordinal(ordinal)
    }
}

/// Read access to one result row.
pub struct RowReader<'r> {
    row: &'r SqliteRow,
    statement: &'r str,
    template: &'r SqlTemplate,
}

impl<'r> RowReader<'r> {
    /// Decode a column; unknown names, out-of-range ordinals and type
    /// mismatches come back classified.
    pub fn get<'c, T>(&self, column: impl Into<ColumnRef<'c>>) -> Result<T, ClassifiedError>
    where
        T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
    {
        let row: &'r SqliteRow = self.row;
        let decoded = match column.into() {
            ColumnRef::Name(name) => row.try_get(name),
            ColumnRef::Ordinal(index) => row.try_get(index),
        };
        decoded.map_err(|e| self.template.classify(&e, self.statement))
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row.is_empty()
    }
}
