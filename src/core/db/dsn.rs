/// DSN Parsing Module
///
/// Parses and validates data source names before any driver is touched, so
/// a misconfigured DSN fails at construction instead of on the first query.
///
/// Supported shapes:
/// - `sqlite::memory:` and `sqlite:/path/to/file.db`
/// - `mysql:host=...;port=...;dbname=...` (also `mariadb:`)
/// - `pgsql:host=...;dbname=...`
use crate::core::{Result, RowgateError};
use std::fmt;
use std::str::FromStr;

/// Database driver family named by the DSN scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
    Mysql,
    Mariadb,
    Pgsql,
}

impl Driver {
    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(Driver::Sqlite),
            "mysql" => Some(Driver::Mysql),
            "mariadb" => Some(Driver::Mariadb),
            "pgsql" | "postgres" | "postgresql" => Some(Driver::Pgsql),
            _ => None,
        }
    }

    /// MySQL-family servers need a default database in the DSN
    pub fn requires_database(&self) -> bool {
        matches!(self, Driver::Mysql | Driver::Mariadb)
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Driver::Sqlite => "sqlite",
            Driver::Mysql => "mysql",
            Driver::Mariadb => "mariadb",
            Driver::Pgsql => "pgsql",
        };
        f.write_str(name)
    }
}

/// A validated data source name
#[derive(Debug, Clone, PartialEq)]
pub struct Dsn {
    raw: String,
    driver: Driver,
    /// File path (or `:memory:`) for SQLite DSNs
    path: Option<String>,
    /// `key=value` pairs for server DSNs, keys lowercased
    params: Vec<(String, String)>,
}

impl Dsn {
    /// Parses and validates a DSN string
    ///
    /// # Errors
    ///
    /// Returns `RowgateError::Connection` carrying the DSN when the scheme is
    /// missing or unknown, a SQLite path is empty, a server DSN has no host,
    /// or a MySQL-family DSN omits `dbname`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (scheme, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| RowgateError::connection(raw, "missing driver scheme"))?;

        if scheme.is_empty() {
            return Err(RowgateError::connection(raw, "missing driver scheme"));
        }

        let driver = Driver::from_scheme(scheme)
            .ok_or_else(|| RowgateError::connection(raw, format!("unknown driver '{}'", scheme)))?;

        if driver == Driver::Sqlite {
            let path = rest.trim();
            if path.is_empty() {
                return Err(RowgateError::connection(raw, "missing database path"));
            }
            return Ok(Dsn {
                raw: trimmed.to_string(),
                driver,
                path: Some(path.to_string()),
                params: Vec::new(),
            });
        }

        let mut params = Vec::new();
        for segment in rest.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                RowgateError::connection(raw, format!("malformed segment '{}'", segment))
            })?;
            params.push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
        }

        let dsn = Dsn {
            raw: trimmed.to_string(),
            driver,
            path: None,
            params,
        };

        if dsn.param("host").is_none() && dsn.param("unix_socket").is_none() {
            return Err(RowgateError::connection(raw, "missing host"));
        }

        if driver.requires_database() && dsn.database().is_none() {
            return Err(RowgateError::connection(
                raw,
                "missing dbname: MySQL-family DSNs must name a default database",
            ));
        }

        Ok(dsn)
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// SQLite file path, or `:memory:`
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_memory(&self) -> bool {
        self.path.as_deref() == Some(":memory:")
    }

    /// Looks up a non-empty `key=value` parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn database(&self) -> Option<&str> {
        self.param("dbname")
    }
}

impl FromStr for Dsn {
    type Err = RowgateError;

    fn from_str(s: &str) -> Result<Self> {
        Dsn::parse(s)
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
