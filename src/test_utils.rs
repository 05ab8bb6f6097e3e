/// # Test Utilities Module
///
/// Shared fixtures for the unit tests: an isolated in-memory database with a
/// small schema covering both identity strategies, the entities bound to it,
/// and error assertion helpers.
use crate::core::db::connection::Connection;
use crate::core::Result;
use crate::record::{Cast, Entity, Record};
use crate::table::Table;
use std::sync::Once;

/// Auto-increment entity with casts and a computed column
pub struct User;

impl Entity for User {
    fn casts() -> &'static [(&'static str, Cast)] {
        &[("active", Cast::Bool), ("score", Cast::Float), ("created_at", Cast::Date)]
    }

    fn computed_columns() -> &'static [&'static str] {
        &["display_name"]
    }
}

impl Record<User> {
    pub fn name(&self) -> Option<String> {
        self.get("name").as_str().map(String::from)
    }

    pub fn set_name(&mut self, name: &str) {
        self.set("name", name);
    }
}

/// UUID-identity entity with a binary foreign key
pub struct Document;

impl Entity for Document {
    const USES_UUID: bool = true;

    fn uuid_columns() -> &'static [&'static str] {
        &["owner_id"]
    }
}

pub struct Post;

impl Entity for Post {}

const SCHEMA: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        email TEXT,
        note TEXT,
        active INTEGER DEFAULT 1,
        score REAL,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT
    );

    CREATE TABLE documents (
        id BLOB PRIMARY KEY,
        owner_id BLOB,
        title TEXT
    );

    CREATE TABLE posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER REFERENCES users (id) ON DELETE CASCADE,
        title TEXT
    );
";

/// Isolated database test fixture
pub struct GatewayFixture {
    pub conn: Connection,
}

impl GatewayFixture {
    /// Fresh in-memory database with the standard schema. Setup runs as a
    /// batch, so no statement counts as executed yet.
    pub fn new() -> Result<Self> {
        init_test_logging();
        let conn = Connection::open("sqlite::memory:")?;
        conn.execute_batch(SCHEMA)?;
        Ok(GatewayFixture { conn })
    }

    /// Fixture with `count` users named `user1`, `user2`, ...
    pub fn with_users(count: usize) -> Result<Self> {
        let fixture = Self::new()?;
        {
            let users = fixture.users();
            for i in 1..=count {
                let mut user = users.record(
                    [("email", format!("user{}@example.com", i))]
                        .into_iter()
                        .collect(),
                );
                user.set_name(&format!("user{}", i));
                users.insert(user)?;
            }
        }
        Ok(fixture)
    }

    pub fn users(&self) -> Table<'_, User> {
        self.table("users")
    }

    pub fn documents(&self) -> Table<'_, Document> {
        self.table("documents")
    }

    pub fn posts(&self) -> Table<'_, Post> {
        self.table("posts")
    }

    fn table<E: Entity>(&self, name: &str) -> Table<'_, E> {
        match Table::new(&self.conn, name) {
            Ok(table) => table,
            Err(e) => panic!("fixture table '{}' is invalid: {}", name, e),
        }
    }
}

/// Installs a test-writer subscriber once per test binary
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    });
}

/// Error testing utilities
pub mod error_testing {
    use std::fmt::Display;

    /// Asserts the call failed with a message containing `fragment`
    pub fn assert_error_message<T, E: Display>(
        result: &std::result::Result<T, E>,
        fragment: &str,
        context: &str,
    ) {
        match result {
            Ok(_) => panic!("Expected error but got Ok in {}", context),
            Err(e) => {
                let message = e.to_string();
                assert!(
                    message.to_lowercase().contains(&fragment.to_lowercase()),
                    "Expected '{}' in error message '{}' context: {}",
                    fragment,
                    message,
                    context
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;
    use crate::core::RowgateError;

    #[test]
    fn test_fixture_schema() {
        let fixture = GatewayFixture::new().unwrap();
        let tables = fixture
            .conn
            .execute(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                &[],
            )
            .unwrap();
        let names: Vec<Value> = tables.rows.into_iter().filter_map(|r| r.get("name").cloned()).collect();
        assert_eq!(names, vec![Value::from("documents"), Value::from("posts"), Value::from("users")]);
    }

    #[test]
    fn test_with_users() {
        let fixture = GatewayFixture::with_users(3).unwrap();
        let users = fixture.users();
        let third = users.find_by_id(3).unwrap().unwrap();
        assert_eq!(third.name().as_deref(), Some("user3"));
        assert_eq!(third.get("active"), Value::Bool(true));
    }

    #[test]
    fn test_error_message_helper() {
        let result: Result<()> = Err(RowgateError::Persistence("missing id".to_string()));
        error_testing::assert_error_message(&result, "missing id", "helper test");
    }
}
