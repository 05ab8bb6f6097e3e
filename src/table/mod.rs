//! Table Gateway Module
//!
//! `Table<E>` is the CRUD and query entry point for one physical table bound
//! to one `Entity`. It compiles condition and ordering descriptions into
//! parameterized SQL, hydrates fetched rows into `Record<E>`s and writes
//! records back, translating UUID columns between text and 16-byte binary
//! in both directions.

pub mod condition;
pub mod identifier;
pub mod pagination;
pub mod statement;

pub use condition::{Clause, Condition, Conditions, Operand, Operator, Predicate, WhereClause};
pub use pagination::{Page, PageMeta};
pub use statement::{Direction, OrderBy, SelectStatement};

use crate::core::db::connection::Connection;
use crate::core::value::{self, Attributes, Value};
use crate::core::{Result, RowgateError};
use crate::record::{Entity, Id, Record};
use once_cell::sync::OnceCell;
use statement::{DeleteStatement, InsertStatement, UpdateStatement};
use std::collections::HashSet;
use std::marker::PhantomData;
use tracing::{debug, trace, warn};

/// CRUD gateway for one table.
///
/// ```
/// use rowgate::table::{Conditions, OrderBy, Table};
/// use rowgate::{Connection, Entity};
///
/// struct Note;
/// impl Entity for Note {}
///
/// let conn = Connection::open("sqlite::memory:")?;
/// conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT)")?;
///
/// let notes: Table<Note> = Table::new(&conn, "notes")?;
/// let saved = notes.insert(notes.record([("body", "hello")].into_iter().collect()))?;
/// assert_eq!(saved.get("id").as_i64(), Some(1));
///
/// let found = notes.find_where(&[], &Conditions::new().eq("body", "hello"), &OrderBy::new(), None)?;
/// assert_eq!(found.len(), 1);
/// # Ok::<(), rowgate::RowgateError>(())
/// ```
pub struct Table<'c, E: Entity> {
    conn: &'c Connection,
    name: String,
    quoted: String,
    uuid_columns: OnceCell<HashSet<String>>,
    entity: PhantomData<fn() -> E>,
}

impl<'c, E: Entity> Table<'c, E> {
    /// Binds `E` to the physical table `name`.
    ///
    /// # Errors
    ///
    /// `RowgateError::Query` if `name` is not a plain identifier.
    pub fn new(conn: &'c Connection, name: &str) -> Result<Self> {
        let quoted = identifier::quote(name)?;
        Ok(Table {
            conn,
            name: name.to_string(),
            quoted,
            uuid_columns: OnceCell::new(),
            entity: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &'c Connection {
        self.conn
    }

    /// Record factory for this table's entity.
    pub fn record(&self, attributes: Attributes) -> Record<E> {
        Record::new(attributes)
    }

    /// Resolved once per table: the entity's UUID columns plus `id` for
    /// UUID-identity entities.
    fn uuid_columns(&self) -> &HashSet<String> {
        self.uuid_columns.get_or_init(|| {
            let mut columns: HashSet<String> = E::uuid_columns().iter().map(|c| c.to_string()).collect();
            if E::USES_UUID {
                columns.insert("id".to_string());
            }
            columns
        })
    }

    fn id_value(&self, id: &Id) -> Value {
        if E::USES_UUID {
            value::uuid_to_binary(Value::from(id))
        } else {
            Value::from(id)
        }
    }

    /// Compiles a SELECT without running it.
    pub fn select_statement(
        &self,
        columns: &[&str],
        conditions: &Conditions,
        order_by: &OrderBy,
        limit: Option<u64>,
    ) -> Result<SelectStatement> {
        let columns = columns
            .iter()
            .map(|c| identifier::quote_column(c))
            .collect::<Result<Vec<_>>>()?;
        let filter = WhereClause::compile(conditions, self.uuid_columns())?;
        trace!(table = %self.name, clause = %filter.to_sql(), "compiled conditions");

        Ok(SelectStatement::new(self.quoted.as_str())
            .columns(columns)
            .filter(filter)
            .order_by(order_by.compile()?)
            .limit(limit))
    }

    fn fetch(&self, statement: &SelectStatement) -> Result<Vec<Record<E>>> {
        let result = self.conn.execute(&statement.to_sql(), &statement.params())?;
        Ok(result.rows.into_iter().map(Record::new).collect())
    }

    /// Looks a record up by primary key.
    pub fn find_by_id(&self, id: impl Into<Id>) -> Result<Option<Record<E>>> {
        let id = id.into();
        let statement = SelectStatement::new(self.quoted.as_str())
            .filter(WhereClause::compile(
                &Conditions::new().eq("id", self.id_value(&id)),
                self.uuid_columns(),
            )?)
            .limit(Some(1));
        Ok(self.fetch(&statement)?.into_iter().next())
    }

    /// General query entry point. An empty `columns` slice selects `*`.
    ///
    /// # Errors
    ///
    /// `RowgateError::Query` for invalid column names, disallowed operators
    /// or malformed conditions, before any SQL is sent.
    pub fn find_where(
        &self,
        columns: &[&str],
        conditions: &Conditions,
        order_by: &OrderBy,
        limit: Option<u64>,
    ) -> Result<Vec<Record<E>>> {
        let statement = self.select_statement(columns, conditions, order_by, limit)?;
        self.fetch(&statement)
    }

    pub fn find_first(
        &self,
        columns: &[&str],
        conditions: &Conditions,
        order_by: &OrderBy,
    ) -> Result<Option<Record<E>>> {
        Ok(self
            .find_where(columns, conditions, order_by, Some(1))?
            .into_iter()
            .next())
    }

    /// Number of rows matching `conditions`.
    pub fn count(&self, conditions: &Conditions) -> Result<u64> {
        let statement = self
            .select_statement(&[], conditions, &OrderBy::new(), None)?
            .count();
        let result = self.conn.execute(&statement.to_sql(), &statement.params())?;
        let total = result
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .and_then(|(_, v)| v.as_i64())
            .unwrap_or(0);
        Ok(total.max(0) as u64)
    }

    /// One page of matching records. `page` and `per_page` are clamped to
    /// at least 1; a page past the end comes back empty.
    pub fn paginate(
        &self,
        columns: &[&str],
        conditions: &Conditions,
        page: i64,
        per_page: i64,
        order_by: &OrderBy,
    ) -> Result<Page<E>> {
        let (page, per_page, offset) = pagination::clamp(page, per_page);
        let total = self.count(conditions)?;

        let data = if offset >= total {
            Vec::new()
        } else {
            let statement = self
                .select_statement(columns, conditions, order_by, Some(per_page))?
                .offset(Some(offset));
            self.fetch(&statement)?
        };

        let meta = PageMeta::compute(page, per_page, total, data.len() as u64);
        Ok(Page { data, meta })
    }

    /// Persistable attributes without the identity, minus `skip`, with UUID
    /// columns in binary form.
    fn write_row(&self, record: &Record<E>, skip: &[&str]) -> Attributes {
        let uuid_columns = self.uuid_columns();
        record
            .to_persistable_array()
            .into_iter()
            .filter(|(name, _)| name != "id" && !skip.contains(&name.as_str()))
            .map(|(name, v)| {
                let v = if uuid_columns.contains(&name) {
                    value::uuid_to_binary(v)
                } else {
                    v
                };
                (name, v)
            })
            .collect()
    }

    /// Inserts one record and returns it with its identity filled in.
    ///
    /// `created_at` is never written. UUID entities always write their id;
    /// auto-increment entities write it only when one was set explicitly and
    /// otherwise take the generated row id.
    pub fn insert(&self, mut record: Record<E>) -> Result<Record<E>> {
        if E::USES_UUID && record.id().is_none() {
            record.set_id(value::new_uuid());
        }

        let mut columns = Vec::new();
        let mut values = Vec::new();
        if let Some(id) = record.id() {
            columns.push("id".to_string());
            values.push(self.id_value(id));
        }
        for (name, v) in self.write_row(&record, &["created_at"]) {
            columns.push(name);
            values.push(v);
        }

        let statement = InsertStatement::new(self.quoted.as_str(), columns.as_slice())?.row(values);
        self.conn.execute(&statement.to_sql(), &statement.params())?;

        if record.id().is_none() {
            record.set_id(self.conn.last_insert_id());
        }
        Ok(record)
    }

    /// Inserts all records with a single multi-row statement.
    ///
    /// The column list is the union of every record's columns; a record
    /// missing one binds `NULL`. The id column is written when the entity
    /// uses UUIDs or when any record in the batch carries an id.
    /// Auto-increment ids are not read back.
    pub fn insert_many(&self, mut records: Vec<Record<E>>) -> Result<Vec<Record<E>>> {
        if records.is_empty() {
            return Ok(records);
        }

        if E::USES_UUID {
            for record in records.iter_mut().filter(|r| r.id().is_none()) {
                record.set_id(value::new_uuid());
            }
        }
        let with_id = records.iter().any(|r| r.id().is_some());

        let rows: Vec<Attributes> = records
            .iter()
            .map(|record| {
                let mut row = Attributes::new();
                if with_id {
                    row.insert("id", record.id().map(|id| self.id_value(id)).unwrap_or(Value::Null));
                }
                for (name, v) in self.write_row(record, &["created_at"]) {
                    row.insert(name, v);
                }
                row
            })
            .collect();

        let mut columns: Vec<String> = Vec::new();
        for name in rows.iter().flat_map(Attributes::keys) {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }

        if columns.is_empty() {
            // no column to list, so every row takes its defaults
            let statement = InsertStatement::new::<&str>(self.quoted.as_str(), &[])?;
            for _ in &rows {
                self.conn.execute(&statement.to_sql(), &[])?;
            }
            return Ok(records);
        }

        let mut statement = InsertStatement::new(self.quoted.as_str(), columns.as_slice())?;
        for row in &rows {
            let values = columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            statement = statement.row(values);
        }
        let result = self.conn.execute(&statement.to_sql(), &statement.params())?;
        debug!(table = %self.name, rows = result.affected_rows, "batch insert");

        Ok(records)
    }

    /// Writes every attribute except `id` and `updated_at` back by primary
    /// key and returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// `RowgateError::Persistence` when the record has no id.
    pub fn update(&self, record: &Record<E>) -> Result<usize> {
        let id = record.id().ok_or_else(|| {
            RowgateError::Persistence(format!("cannot update a row of '{}' without an id", self.name))
        })?;

        let assignments: Vec<(String, Value)> = self.write_row(record, &["updated_at"]).into_iter().collect();
        if assignments.is_empty() {
            warn!(table = %self.name, id = %id, "update has nothing to set");
            return Ok(0);
        }

        let statement = UpdateStatement::new(self.quoted.as_str(), assignments, self.id_value(id))?;
        let result = self.conn.execute(&statement.to_sql(), &statement.params())?;
        self.conn.affected_rows(Some(&result))
    }

    /// Deletes the record's row by primary key.
    ///
    /// # Errors
    ///
    /// `RowgateError::Persistence` when the record has no id.
    pub fn delete(&self, record: &Record<E>) -> Result<usize> {
        let id = record.id().ok_or_else(|| {
            RowgateError::Persistence(format!("cannot delete a row of '{}' without an id", self.name))
        })?;

        let statement = DeleteStatement::by_id(self.quoted.as_str(), self.id_value(id));
        let result = self.conn.execute(&statement.to_sql(), &statement.params())?;
        self.conn.affected_rows(Some(&result))
    }

    /// Removes every row.
    pub fn truncate(&self) -> Result<usize> {
        let statement = DeleteStatement::all(self.quoted.as_str());
        Ok(self.conn.execute(&statement.to_sql(), &[])?.affected_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Document, GatewayFixture, User};

    #[test]
    fn test_rejects_invalid_table_name() {
        let fixture = GatewayFixture::new().unwrap();
        assert!(matches!(
            Table::<User>::new(&fixture.conn, "users; DROP TABLE users"),
            Err(RowgateError::Query(_))
        ));
    }

    #[test]
    fn test_select_statement_sql() {
        let fixture = GatewayFixture::new().unwrap();
        let users = fixture.users();
        let statement = users
            .select_statement(
                &["id", "users.name"],
                &Conditions::new().eq("active", 1).in_list("id", [1, 2]),
                &OrderBy::new().desc("name"),
                Some(5),
            )
            .unwrap();
        insta::assert_snapshot!(
            statement.to_sql(),
            @"SELECT `id`, `users`.`name` FROM `users` WHERE `active` = ? AND `id` IN (?, ?) ORDER BY `name` DESC LIMIT 5"
        );
    }

    #[test]
    fn test_select_statement_rejects_bad_columns() {
        let fixture = GatewayFixture::new().unwrap();
        let users = fixture.users();
        let err = users
            .select_statement(&["name, password"], &Conditions::new(), &OrderBy::new(), None)
            .unwrap_err();
        assert!(matches!(err, RowgateError::Query(_)));
    }

    #[test]
    fn test_uuid_condition_binds_binary() {
        let fixture = GatewayFixture::new().unwrap();
        let documents = fixture.documents();
        let owner = "0190a6b2-7c3e-7d41-9a0b-3c5d7e9f1a2b";
        let statement = documents
            .select_statement(&[], &Conditions::new().eq("owner_id", owner), &OrderBy::new(), None)
            .unwrap();
        assert_eq!(statement.params(), vec![value::uuid_to_binary(Value::from(owner))]);
    }

    #[test]
    fn test_insert_assigns_auto_increment_id() {
        let fixture = GatewayFixture::new().unwrap();
        let users = fixture.users();
        let saved = users
            .insert(users.record([("name", "ann"), ("email", "ann@example.com")].into_iter().collect()))
            .unwrap();
        assert_eq!(saved.id(), Some(&Id::Int(1)));

        let found = users.find_by_id(1).unwrap().unwrap();
        assert_eq!(found.get("name"), Value::from("ann"));
        // created_at came from the column default
        assert!(!found.get("created_at").is_null());
    }

    #[test]
    fn test_uuid_insert_round_trip() {
        let fixture = GatewayFixture::new().unwrap();
        let documents = fixture.documents();
        let owner = "0190a6b2-7c3e-7d41-9a0b-3c5d7e9f1a2b";
        let doc = documents.record([("title", "minutes"), ("owner_id", owner)].into_iter().collect());
        let id = doc.id().cloned().unwrap();

        documents.insert(doc).unwrap();

        let stored = fixture
            .conn
            .execute("SELECT id, owner_id FROM documents", &[])
            .unwrap();
        assert!(matches!(stored.rows[0].get("id"), Some(Value::Blob(b)) if b.len() == 16));
        assert!(matches!(stored.rows[0].get("owner_id"), Some(Value::Blob(b)) if b.len() == 16));

        let found = documents.find_by_id(id.clone()).unwrap().unwrap();
        assert_eq!(found.id(), Some(&id));
        assert_eq!(found.get("owner_id"), Value::from(owner));
    }

    #[test]
    fn test_update_and_delete_require_id() {
        let fixture = GatewayFixture::new().unwrap();
        let users = fixture.users();
        let unsaved = users.record([("name", "x")].into_iter().collect());
        assert!(matches!(users.update(&unsaved), Err(RowgateError::Persistence(_))));
        assert!(matches!(users.delete(&unsaved), Err(RowgateError::Persistence(_))));
    }

    #[test]
    fn test_update_with_nothing_to_set() {
        let fixture = GatewayFixture::new().unwrap();
        let users = fixture.users();
        let mut record = users.record(Attributes::new());
        record.set_id(1);
        record.set("updated_at", "2024-01-01 00:00:00");
        assert_eq!(users.update(&record).unwrap(), 0);
    }

    #[test]
    fn test_update_delete_truncate() {
        let fixture = GatewayFixture::with_users(3).unwrap();
        let users = fixture.users();

        let mut first = users.find_by_id(1).unwrap().unwrap();
        first.set("name", "renamed");
        assert_eq!(users.update(&first).unwrap(), 1);
        assert_eq!(users.find_by_id(1).unwrap().unwrap().get("name"), Value::from("renamed"));

        assert_eq!(users.delete(&first).unwrap(), 1);
        assert!(users.find_by_id(1).unwrap().is_none());
        assert_eq!(users.count(&Conditions::new()).unwrap(), 2);

        assert_eq!(users.truncate().unwrap(), 2);
        assert_eq!(users.count(&Conditions::new()).unwrap(), 0);
    }

    #[test]
    fn test_insert_many_empty_is_noop() {
        let fixture = GatewayFixture::new().unwrap();
        let documents: Table<Document> = fixture.documents();
        assert!(documents.insert_many(Vec::new()).unwrap().is_empty());
        assert!(matches!(
            fixture.conn.affected_rows(None),
            Err(RowgateError::NoStatement)
        ));
    }
}
