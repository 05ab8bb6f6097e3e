/// Database Module
///
/// The connection layer of the gateway, organized into focused submodules:
/// - **DSN parsing** (`dsn.rs`): validates data source names before connecting
/// - **Connection Management** (`connection.rs`): execution, bookkeeping, transactions
/// - **Query Execution** (`query.rs`): raw-SQL convenience helpers
///
/// All database operations use the `RowgateError` type for consistent error propagation.
pub mod connection;
pub mod dsn;
pub mod query;

pub use connection::*;
pub use dsn::*;
pub use query::*;
