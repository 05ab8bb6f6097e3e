/// Query Execution Module
///
/// Raw-SQL convenience helpers for call sites that need hand-written SQL but
/// still want the connection's UUID conversions. Every helper is a thin
/// wrapper over `Connection::execute` that shapes the fetched rows.
use crate::core::db::connection::Connection;
use crate::core::value::{Attributes, Value};
use crate::core::Result;

/// Query execution service that operates on a database connection
pub struct QueryExecutor<'a> {
    connection: &'a Connection,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor for the given connection
    pub fn new(connection: &'a Connection) -> Self {
        QueryExecutor { connection }
    }

    /// All rows of the result set
    pub fn rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Attributes>> {
        Ok(self.connection.execute(sql, params)?.rows)
    }

    /// First row, or `None` when the query matched nothing
    pub fn row(&self, sql: &str, params: &[Value]) -> Result<Option<Attributes>> {
        Ok(self.connection.execute(sql, params)?.rows.into_iter().next())
    }

    /// First column of the first row; `Value::Null` when there is no row
    pub fn scalar(&self, sql: &str, params: &[Value]) -> Result<Value> {
        let row = self.row(sql, params)?;
        Ok(row
            .and_then(|r| r.into_iter().next().map(|(_, v)| v))
            .unwrap_or(Value::Null))
    }

    /// Scalar result read as an integer count
    ///
    /// Non-integer results (NULL, text) count as zero.
    pub fn count(&self, sql: &str, params: &[Value]) -> Result<i64> {
        Ok(match self.scalar(sql, params)? {
            Value::Int(n) => n,
            Value::Float(f) => f as i64,
            Value::Text(t) => t.trim().parse().unwrap_or(0),
            _ => 0,
        })
    }

    /// First column of every row, flattened
    pub fn column(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>> {
        Ok(self
            .rows(sql, params)?
            .into_iter()
            .filter_map(|r| r.into_iter().next().map(|(_, v)| v))
            .collect())
    }

    pub fn uuid_to_binary(&self, value: impl Into<Value>) -> Value {
        self.connection.uuid_to_binary(value)
    }

    pub fn binary_to_uuid(&self, value: impl Into<Value>) -> Value {
        self.connection.binary_to_uuid(value)
    }
}

/// Represents different SQL statement types for introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementType {
    /// SELECT statement (also `WITH ...` queries)
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// CREATE statement
    Create,
    /// DROP statement
    Drop,
    /// ALTER statement
    Alter,
    /// BEGIN/COMMIT/ROLLBACK transaction commands
    Transaction,
    /// Other statement types
    #[default]
    Other,
}

impl StatementType {
    /// Determines the statement type from a SQL string
    pub fn from_sql(sql: &str) -> Self {
        let sql_upper = sql.trim_start().to_uppercase();
        let keyword = sql_upper
            .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .next()
            .unwrap_or("");

        match keyword {
            "SELECT" | "WITH" => StatementType::Select,
            "INSERT" | "REPLACE" => StatementType::Insert,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "CREATE" => StatementType::Create,
            "DROP" => StatementType::Drop,
            "ALTER" => StatementType::Alter,
            "BEGIN" | "COMMIT" | "ROLLBACK" | "END" | "SAVEPOINT" | "RELEASE" => {
                StatementType::Transaction
            }
            _ => StatementType::Other,
        }
    }
}
