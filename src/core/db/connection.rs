/// Connection Management Module
///
/// Wraps a single SQLite handle: parameterized execution, last-insert-id and
/// affected-row bookkeeping, UUID text/binary conversion and transaction
/// control.
///
/// A `Connection` is not meant to be shared between threads. The affected-row
/// count of the most recent statement is per-connection state, so every
/// concurrent execution path should open its own connection.
use crate::config::{ConnectionOptions, DatabaseConfig};
use crate::core::db::dsn::{Driver, Dsn};
use crate::core::db::query::StatementType;
use crate::core::value::{self, Attributes, Value};
use crate::core::{Result, RowgateError};
use rusqlite::params_from_iter;
use std::cell::Cell;
use std::time::Duration;
use tracing::{debug, error, info};

const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

/// Represents database transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No active transaction (autocommit mode)
    #[default]
    Autocommit,
    /// Transaction in progress
    Transaction,
}

/// Outcome of a single executed statement
#[derive(Debug, Clone, Default)]
pub struct StatementResult {
    /// Statement classification, derived from the SQL text
    pub kind: StatementType,
    /// Result column names (empty for statements that return no rows)
    pub columns: Vec<String>,
    /// Fetched rows, in result order
    pub rows: Vec<Attributes>,
    /// Rows changed by INSERT/UPDATE/DELETE; zero for queries
    pub affected_rows: usize,
}

/// A live database handle
#[derive(Debug)]
pub struct Connection {
    inner: rusqlite::Connection,
    dsn: Dsn,
    last_affected: Cell<Option<usize>>,
}

impl Connection {
    /// Opens a connection for the given DSN with default options
    ///
    /// # Arguments
    ///
    /// * `dsn` - `sqlite::memory:`, `sqlite:/path/to.db`, or a server DSN
    ///
    /// # Errors
    ///
    /// Returns `RowgateError::Connection` if the DSN is malformed, names a
    /// driver this build cannot open, or the driver refuses to connect.
    ///
    /// # Examples
    ///
    /// ```
    /// let conn = rowgate::Connection::open("sqlite::memory:")?;
    /// assert!(!conn.in_transaction());
    /// # Ok::<(), rowgate::RowgateError>(())
    /// ```
    pub fn open(dsn: &str) -> Result<Self> {
        Self::open_with_options(dsn, &ConnectionOptions::default())
    }

    /// Opens a connection from loaded configuration
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::open_with_options(&config.dsn, &config.options)
    }

    /// Opens a connection and applies driver options
    pub fn open_with_options(dsn: &str, options: &ConnectionOptions) -> Result<Self> {
        let parsed = Dsn::parse(dsn)?;

        let inner = match parsed.driver() {
            Driver::Sqlite if parsed.is_memory() => rusqlite::Connection::open_in_memory(),
            Driver::Sqlite => rusqlite::Connection::open(parsed.path().unwrap_or_default()),
            other => {
                return Err(RowgateError::connection(
                    dsn,
                    format!("driver '{}' is not available in this build", other),
                ))
            }
        }
        .map_err(|e| RowgateError::connection(dsn, e.to_string()))?;

        Self::apply_options(&inner, dsn, options)?;

        info!(dsn = %parsed, "connected");

        Ok(Connection {
            inner,
            dsn: parsed,
            last_affected: Cell::new(None),
        })
    }

    fn apply_options(
        inner: &rusqlite::Connection,
        dsn: &str,
        options: &ConnectionOptions,
    ) -> Result<()> {
        let wrap = |e: rusqlite::Error| RowgateError::connection(dsn, e.to_string());

        inner
            .pragma_update(None, "foreign_keys", options.foreign_keys.unwrap_or(true))
            .map_err(wrap)?;

        if let Some(mode) = &options.journal_mode {
            let mode = mode.to_ascii_uppercase();
            if !JOURNAL_MODES.contains(&mode.as_str()) {
                return Err(RowgateError::connection(
                    dsn,
                    format!("unsupported journal_mode '{}'", mode),
                ));
            }
            inner
                .pragma_update_and_check(None, "journal_mode", &mode, |row| row.get::<_, String>(0))
                .map_err(wrap)?;
        }

        if let Some(ms) = options.busy_timeout_ms {
            inner.busy_timeout(Duration::from_millis(ms)).map_err(wrap)?;
        }

        Ok(())
    }

    /// The validated DSN this connection was opened with
    pub fn dsn(&self) -> &Dsn {
        &self.dsn
    }

    /// Executes a parameterized statement with positional `?` placeholders
    ///
    /// Statements that produce columns are fetched completely; all others
    /// report the number of rows they changed. Either way the statement
    /// becomes the connection's "last statement" for `affected_rows`.
    ///
    /// # Errors
    ///
    /// Driver failures are returned unwrapped as `RowgateError::Database`.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let kind = StatementType::from_sql(sql);
        debug!(sql, ?kind, params = params.len(), "executing statement");

        let result = self.run(sql, params, kind).map_err(|e| {
            error!(sql, error = %e, "statement failed");
            RowgateError::Database(e)
        })?;

        self.last_affected.set(Some(result.affected_rows));
        Ok(result)
    }

    fn run(&self, sql: &str, params: &[Value], kind: StatementType) -> rusqlite::Result<StatementResult> {
        let mut stmt = self.inner.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        if columns.is_empty() {
            let affected_rows = stmt.execute(params_from_iter(params.iter()))?;
            return Ok(StatementResult {
                kind,
                columns,
                rows: Vec::new(),
                affected_rows,
            });
        }

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut fetched = Vec::new();
        while let Some(row) = rows.next()? {
            let mut attributes = Attributes::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                attributes.insert(name.clone(), row.get::<_, Value>(i)?);
            }
            fetched.push(attributes);
        }

        Ok(StatementResult {
            kind,
            columns,
            rows: fetched,
            affected_rows: 0,
        })
    }

    /// Runs a script of parameterless statements (DDL, migrations)
    ///
    /// Batches are not tracked: `affected_rows(None)` keeps reporting the
    /// most recent `execute`. Use `execute` when the count matters.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        debug!(sql, "executing batch");
        self.inner.execute_batch(sql).map_err(|e| {
            error!(error = %e, "batch failed");
            RowgateError::Database(e)
        })
    }

    /// Row id generated by the most recent INSERT on an auto-increment table
    pub fn last_insert_id(&self) -> i64 {
        self.inner.last_insert_rowid()
    }

    /// Affected rows of `statement`, or of the most recent statement if none
    /// is given
    ///
    /// # Errors
    ///
    /// Returns `RowgateError::NoStatement` when nothing has been executed yet.
    pub fn affected_rows(&self, statement: Option<&StatementResult>) -> Result<usize> {
        match statement {
            Some(result) => Ok(result.affected_rows),
            None => self.last_affected.get().ok_or(RowgateError::NoStatement),
        }
    }

    /// Converts UUID text to 16 bytes; non-UUID input passes through unchanged
    pub fn uuid_to_binary(&self, value: impl Into<Value>) -> Value {
        value::uuid_to_binary(value.into())
    }

    /// Converts 16 bytes to UUID text; non-binary input passes through unchanged
    pub fn binary_to_uuid(&self, value: impl Into<Value>) -> Value {
        value::binary_to_uuid(value.into())
    }

    /// Starts a transaction. Nested transactions are not supported.
    pub fn begin_transaction(&self) -> Result<()> {
        self.execute_batch("BEGIN")
    }

    pub fn commit(&self) -> Result<()> {
        self.execute_batch("COMMIT")
    }

    pub fn rollback(&self) -> Result<()> {
        self.execute_batch("ROLLBACK")
    }

    pub fn in_transaction(&self) -> bool {
        !self.inner.is_autocommit()
    }

    /// Gets the current transaction state
    pub fn transaction_state(&self) -> TransactionState {
        if self.in_transaction() {
            TransactionState::Transaction
        } else {
            TransactionState::Autocommit
        }
    }
}
