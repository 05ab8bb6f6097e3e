//! rowgate: a relational data-access layer over SQLite.
//!
//! - [`Connection`] wraps one database handle and converts UUIDs between
//!   text and 16-byte binary.
//! - [`Record`] is a detached row bound to an [`Entity`].
//! - [`Table`] compiles condition descriptions into parameterized SQL and
//!   reads and writes records.
//! - [`seeder::Seeder`] bulk-loads nested seed data through tables.

pub mod config;
pub mod core;
pub mod record;
pub mod seeder;
pub mod table;

#[cfg(test)]
mod test_utils;

pub use crate::config::{load_config, Config};
pub use crate::core::db::{Connection, QueryExecutor, StatementResult};
pub use crate::core::{Attributes, Result, RowgateError, Value};
pub use crate::record::{Cast, Entity, Id, Record};
pub use crate::table::Table;
