//! Statement builders.
//!
//! Small value types that render the SQL the table gateway sends. They take
//! already-validated pieces (quoted identifiers, compiled WHERE clauses), so
//! rendering itself cannot fail and is easy to assert on without a database.

use crate::core::value::Value;
use crate::core::{Result, RowgateError};
use crate::table::condition::{placeholders, WhereClause};
use crate::table::identifier;
use std::fmt;

/// Sort direction for ORDER BY terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Case-insensitive `asc`/`desc`; anything else is a query error.
    pub fn parse(raw: &str) -> Result<Direction> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            other => Err(RowgateError::Query(format!("invalid sort direction '{}'", other))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        })
    }
}

/// Ordered list of ORDER BY terms. Column names are validated when the
/// statement is compiled, not when they are added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBy {
    terms: Vec<(String, Direction)>,
}

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(self, column: impl Into<String>) -> Self {
        self.then(column, Direction::Asc)
    }

    pub fn desc(self, column: impl Into<String>) -> Self {
        self.then(column, Direction::Desc)
    }

    pub fn then(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.terms.push((column.into(), direction));
        self
    }

    /// Builds from `(column, direction)` text pairs, e.g. request input.
    pub fn from_pairs<C: AsRef<str>, D: AsRef<str>>(pairs: &[(C, D)]) -> Result<Self> {
        pairs.iter().try_fold(OrderBy::new(), |order, (column, direction)| {
            Ok(order.then(column.as_ref(), Direction::parse(direction.as_ref())?))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Normalizes every term into `` `col` DIR `` form.
    pub fn compile(&self) -> Result<Vec<String>> {
        self.terms
            .iter()
            .map(|(column, direction)| Ok(format!("{} {}", identifier::quote_column(column)?, direction)))
            .collect()
    }
}

/// SELECT (or COUNT) over one table.
#[derive(Debug, Clone, Default)]
pub struct SelectStatement {
    table: String,
    columns: Vec<String>,
    filter: WhereClause,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    count: bool,
}

impl SelectStatement {
    /// `table` must already be quoted.
    pub fn new(table: impl Into<String>) -> Self {
        SelectStatement {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Quoted column list; empty selects `*`.
    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn filter(mut self, filter: WhereClause) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, order_by: Vec<String>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset;
        self
    }

    /// Turns the statement into `SELECT COUNT(*)`; ordering and paging are
    /// dropped.
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    /// LIMIT/OFFSET are rendered as integer literals, never bound.
    pub fn to_sql(&self) -> String {
        let projection = if self.count {
            "COUNT(*)".to_string()
        } else if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", projection, self.table);
        if !self.filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filter.to_sql());
        }
        if self.count {
            return sql;
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }
        sql
    }

    pub fn params(&self) -> Vec<Value> {
        self.filter.params()
    }
}

/// Single- or multi-row INSERT with a fixed column list.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl InsertStatement {
    /// Validates and quotes the column names.
    pub fn new<S: AsRef<str>>(table: impl Into<String>, columns: &[S]) -> Result<Self> {
        let columns = columns
            .iter()
            .map(|c| identifier::quote(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(InsertStatement {
            table: table.into(),
            columns,
            rows: Vec::new(),
        })
    }

    /// Adds one row; values must line up with the column list.
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn to_sql(&self) -> String {
        if self.columns.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES", self.table);
        }
        let tuple = format!("({})", placeholders(self.columns.len()));
        let tuples = vec![tuple; self.rows.len().max(1)].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            self.columns.join(", "),
            tuples
        )
    }

    pub fn params(&self) -> Vec<Value> {
        self.rows.iter().flatten().cloned().collect()
    }
}

/// UPDATE ... SET ... WHERE `id` = ?
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    table: String,
    assignments: Vec<(String, Value)>,
    id: Value,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>, assignments: Vec<(String, Value)>, id: Value) -> Result<Self> {
        let assignments = assignments
            .into_iter()
            .map(|(column, value)| Ok((identifier::quote(&column)?, value)))
            .collect::<Result<Vec<_>>>()?;
        Ok(UpdateStatement {
            table: table.into(),
            assignments,
            id,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn to_sql(&self) -> String {
        let set = self
            .assignments
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect::<Vec<_>>()
            .join(", ");
        format!("UPDATE {} SET {} WHERE `id` = ?", self.table, set)
    }

    pub fn params(&self) -> Vec<Value> {
        self.assignments
            .iter()
            .map(|(_, value)| value.clone())
            .chain(std::iter::once(self.id.clone()))
            .collect()
    }
}

/// DELETE by primary key, or every row when no id is given.
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    table: String,
    id: Option<Value>,
}

impl DeleteStatement {
    pub fn by_id(table: impl Into<String>, id: Value) -> Self {
        DeleteStatement {
            table: table.into(),
            id: Some(id),
        }
    }

    pub fn all(table: impl Into<String>) -> Self {
        DeleteStatement {
            table: table.into(),
            id: None,
        }
    }

    pub fn to_sql(&self) -> String {
        match self.id {
            Some(_) => format!("DELETE FROM {} WHERE `id` = ?", self.table),
            None => format!("DELETE FROM {}", self.table),
        }
    }

    pub fn params(&self) -> Vec<Value> {
        self.id.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::condition::Conditions;
    use std::collections::HashSet;

    fn filter(conditions: Conditions) -> WhereClause {
        WhereClause::compile(&conditions, &HashSet::new()).unwrap()
    }

    #[test]
    fn test_select_all() {
        let sql = SelectStatement::new("`users`").to_sql();
        insta::assert_snapshot!(sql, @"SELECT * FROM `users`");
    }

    #[test]
    fn test_select_full() {
        let statement = SelectStatement::new("`users`")
            .columns(vec!["`id`".into(), "`users`.`name`".into()])
            .filter(filter(Conditions::new().eq("active", 1).op("age", ">", 20)))
            .order_by(OrderBy::new().desc("created_at").asc("id").compile().unwrap())
            .limit(Some(10))
            .offset(Some(20));

        insta::assert_snapshot!(
            statement.to_sql(),
            @"SELECT `id`, `users`.`name` FROM `users` WHERE `active` = ? AND `age` > ? ORDER BY `created_at` DESC, `id` ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(statement.params(), vec![Value::Int(1), Value::Int(20)]);
    }

    #[test]
    fn test_count_ignores_paging() {
        let statement = SelectStatement::new("`users`")
            .filter(filter(Conditions::new().eq("active", 1)))
            .order_by(vec!["`id` ASC".into()])
            .limit(Some(5))
            .count();
        assert_eq!(statement.to_sql(), "SELECT COUNT(*) FROM `users` WHERE `active` = ?");
    }

    #[test]
    fn test_offset_without_limit() {
        let sql = SelectStatement::new("`t`").offset(Some(3)).to_sql();
        assert_eq!(sql, "SELECT * FROM `t` LIMIT -1 OFFSET 3");
    }

    #[test]
    fn test_order_by_validation() {
        assert!(OrderBy::new().asc("name; DROP").compile().is_err());
        assert!(Direction::parse("sideways").is_err());
        assert_eq!(Direction::parse(" desc ").unwrap(), Direction::Desc);

        let order = OrderBy::from_pairs(&[("name", "asc"), ("`users`.`id`", "DESC")]).unwrap();
        assert_eq!(order.compile().unwrap(), vec!["`name` ASC", "`users`.`id` DESC"]);
        assert!(OrderBy::from_pairs(&[("name", "up")]).is_err());
    }

    #[test]
    fn test_insert_statement() {
        let statement = InsertStatement::new("`users`", &["name", "note"])
            .unwrap()
            .row(vec![Value::from("a"), Value::Null])
            .row(vec![Value::from("b"), Value::from("n")]);
        insta::assert_snapshot!(statement.to_sql(), @"INSERT INTO `users` (`name`, `note`) VALUES (?, ?), (?, ?)");
        assert_eq!(statement.params().len(), 4);

        assert!(InsertStatement::new("`users`", &["bad column"]).is_err());

        let empty = InsertStatement::new::<&str>("`users`", &[]).unwrap();
        assert_eq!(empty.to_sql(), "INSERT INTO `users` DEFAULT VALUES");
    }

    #[test]
    fn test_update_and_delete_statements() {
        let update = UpdateStatement::new(
            "`users`",
            vec![("name".into(), Value::from("x")), ("score".into(), Value::Float(1.5))],
            Value::Int(4),
        )
        .unwrap();
        assert_eq!(update.to_sql(), "UPDATE `users` SET `name` = ?, `score` = ? WHERE `id` = ?");
        assert_eq!(update.params(), vec![Value::from("x"), Value::Float(1.5), Value::Int(4)]);

        assert!(UpdateStatement::new("`users`", vec![("a-b".into(), Value::Null)], Value::Int(1)).is_err());

        let delete = DeleteStatement::by_id("`users`", Value::Int(4));
        assert_eq!(delete.to_sql(), "DELETE FROM `users` WHERE `id` = ?");
        assert_eq!(delete.params(), vec![Value::Int(4)]);
        assert_eq!(DeleteStatement::all("`users`").to_sql(), "DELETE FROM `users`");
    }
}
