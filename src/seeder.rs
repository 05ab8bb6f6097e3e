//! Declarative bulk loading.
//!
//! Seed data is an object of `table → [row, ...]`. A row key that names a
//! registered table and holds an array is a nested child collection: each
//! child is inserted after its parent and receives the parent's id under
//! `singular(parent_table)_id`.
//!
//! ```json
//! {
//!   "users": [
//!     {"name": "ann", "posts": [{"title": "hello"}]}
//!   ]
//! }
//! ```

use crate::config::SeedConfig;
use crate::core::value::{Attributes, Value};
use crate::core::{Result, RowgateError};
use crate::record::{Entity, Id};
use crate::table::Table;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// What the seeder needs from a table, without knowing its entity type.
pub trait SeedTable {
    fn table_name(&self) -> &str;

    /// Builds a record from `attributes`, inserts it and returns its id.
    fn insert_attributes(&self, attributes: Attributes) -> Result<Id>;

    fn truncate(&self) -> Result<usize>;
}

impl<'c, E: Entity> SeedTable for Table<'c, E> {
    fn table_name(&self) -> &str {
        self.name()
    }

    fn insert_attributes(&self, attributes: Attributes) -> Result<Id> {
        let record = self.insert(self.record(attributes))?;
        record
            .id()
            .cloned()
            .ok_or_else(|| RowgateError::Seed(format!("insert into '{}' produced no id", self.name())))
    }

    fn truncate(&self) -> Result<usize> {
        Table::truncate(self)
    }
}

/// Rows inserted per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    inserted: BTreeMap<String, usize>,
}

impl SeedReport {
    pub fn inserted(&self, table: &str) -> usize {
        self.inserted.get(table).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.inserted.values().sum()
    }

    fn record(&mut self, table: &str) {
        *self.inserted.entry(table.to_string()).or_default() += 1;
    }
}

/// English-ish singular form of a table name.
///
/// `ies → y`, `(s|x|z|ch|sh)es →` stem, a trailing `s` is dropped unless it
/// is `ss`, anything else is returned as is.
pub fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies").filter(|s| !s.is_empty()) {
        return format!("{}y", stem);
    }
    if let Some(stem) = name.strip_suffix("es") {
        if ["s", "x", "z", "ch", "sh"].iter().any(|end| stem.ends_with(end)) {
            return stem.to_string();
        }
    }
    match name.strip_suffix('s') {
        Some(stem) if !stem.is_empty() && !name.ends_with("ss") => stem.to_string(),
        _ => name.to_string(),
    }
}

/// Foreign-key column a child of `parent_table` receives.
pub fn foreign_key_for(parent_table: &str) -> String {
    format!("{}_id", singularize(parent_table))
}

/// Reads seed data from a `.json` or `.toml` file.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<serde_json::Value> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("toml") => toml::from_str(&content)
            .map_err(|e| RowgateError::Seed(format!("{}: {}", path.display(), e))),
        _ => Err(RowgateError::Seed(format!(
            "unsupported seed file '{}': expected .json or .toml",
            path.display()
        ))),
    }
}

/// Bulk loader over a set of registered tables.
#[derive(Default)]
pub struct Seeder<'a> {
    tables: Vec<Box<dyn SeedTable + 'a>>,
}

impl<'a> Seeder<'a> {
    pub fn new() -> Self {
        Seeder { tables: Vec::new() }
    }

    /// Registers a table; a later registration with the same name wins.
    pub fn register(mut self, table: impl SeedTable + 'a) -> Self {
        self.tables.retain(|t| t.table_name() != table.table_name());
        self.tables.push(Box::new(table));
        self
    }

    fn table(&self, name: &str) -> Option<&dyn SeedTable> {
        self.tables
            .iter()
            .find(|t| t.table_name() == name)
            .map(|t| t.as_ref())
    }

    fn require(&self, name: &str) -> Result<&dyn SeedTable> {
        self.table(name)
            .ok_or_else(|| RowgateError::Seed(format!("no table registered as '{}'", name)))
    }

    /// Inserts every row of `data`, parents before their children.
    pub fn seed(&self, data: &serde_json::Value) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        for (name, rows) in top_level(data)? {
            let table = self.require(name)?;
            let rows = rows_of(name, rows)?;
            if rows.is_empty() {
                warn!(table = name, "seed data has no rows");
            }
            for row in rows {
                self.seed_row(table, row, None, &mut report)?;
            }
        }

        info!(tables = report.inserted.len(), rows = report.total(), "seeding finished");
        Ok(report)
    }

    fn seed_row(
        &self,
        table: &dyn SeedTable,
        row: &serde_json::Value,
        parent: Option<(&str, &Id)>,
        report: &mut SeedReport,
    ) -> Result<()> {
        let object = row.as_object().ok_or_else(|| {
            RowgateError::Seed(format!("rows of '{}' must be objects", table.table_name()))
        })?;

        let mut attributes = Attributes::with_capacity(object.len() + 1);
        let mut children = Vec::new();
        for (key, value) in object {
            match (value, self.table(key)) {
                (serde_json::Value::Array(rows), Some(child)) => children.push((child, rows)),
                _ => {
                    attributes.insert(key.as_str(), Value::from_json(value));
                }
            }
        }
        if let Some((foreign_key, id)) = parent {
            attributes.insert(foreign_key, Value::from(id));
        }

        let id = table.insert_attributes(attributes)?;
        report.record(table.table_name());
        debug!(table = table.table_name(), id = %id, children = children.len(), "seeded row");

        let foreign_key = foreign_key_for(table.table_name());
        for (child, rows) in children {
            for child_row in rows {
                self.seed_row(child, child_row, Some((foreign_key.as_str(), &id)), report)?;
            }
        }
        Ok(())
    }

    /// Tables named in `data`, deepest nesting level first. Tables at the
    /// same depth keep their order of appearance.
    pub fn truncation_order(&self, data: &serde_json::Value) -> Result<Vec<String>> {
        let mut depths: Vec<(String, usize)> = Vec::new();
        for (name, rows) in top_level(data)? {
            self.require(name)?;
            self.collect_depths(name, rows_of(name, rows)?, 0, &mut depths)?;
        }
        // stable sort keeps appearance order within a depth
        depths.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(depths.into_iter().map(|(name, _)| name).collect())
    }

    fn collect_depths(
        &self,
        name: &str,
        rows: &[serde_json::Value],
        depth: usize,
        depths: &mut Vec<(String, usize)>,
    ) -> Result<()> {
        match depths.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = entry.1.max(depth),
            None => depths.push((name.to_string(), depth)),
        }

        for row in rows.iter().filter_map(|r| r.as_object()) {
            for (key, value) in row {
                if let (serde_json::Value::Array(children), Some(_)) = (value, self.table(key)) {
                    self.collect_depths(key, children, depth + 1, depths)?;
                }
            }
        }
        Ok(())
    }

    /// Empties every table named in `data`, children before parents.
    pub fn truncate(&self, data: &serde_json::Value) -> Result<()> {
        for name in self.truncation_order(data)? {
            let removed = self.require(&name)?.truncate()?;
            debug!(table = %name, removed, "truncated");
        }
        Ok(())
    }

    /// Loads the configured seed file, optionally truncating first.
    pub fn run(&self, config: &SeedConfig) -> Result<SeedReport> {
        let data = load_file(&config.path)?;
        if config.truncate {
            self.truncate(&data)?;
        }
        self.seed(&data)
    }
}

fn top_level(data: &serde_json::Value) -> Result<impl Iterator<Item = (&str, &serde_json::Value)>> {
    let object = data
        .as_object()
        .ok_or_else(|| RowgateError::Seed("seed data must be an object of table → rows".to_string()))?;
    Ok(object.iter().map(|(k, v)| (k.as_str(), v)))
}

fn rows_of<'v>(table: &str, rows: &'v serde_json::Value) -> Result<&'v [serde_json::Value]> {
    rows.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| RowgateError::Seed(format!("seed data for '{}' must be an array of rows", table)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::query::QueryExecutor;
    use crate::table::Conditions;
    use crate::test_utils::GatewayFixture;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("batches"), "batch");
        assert_eq!(singularize("wishes"), "wish");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("class"), "class");
        assert_eq!(singularize("data"), "data");
        assert_eq!(singularize("files"), "file");
        assert_eq!(foreign_key_for("users"), "user_id");
    }

    #[test]
    fn test_nested_children_get_parent_id() {
        let fixture = GatewayFixture::new().unwrap();
        let seeder = Seeder::new()
            .register(fixture.users())
            .register(fixture.posts());

        let report = seeder
            .seed(&json!({
                "users": [
                    {"name": "ann", "posts": [{"title": "first"}, {"title": "second"}]},
                    {"name": "bob"}
                ]
            }))
            .unwrap();

        assert_eq!(report.inserted("users"), 2);
        assert_eq!(report.inserted("posts"), 2);
        assert_eq!(report.total(), 4);

        let executor = QueryExecutor::new(&fixture.conn);
        let owners = executor
            .column("SELECT user_id FROM posts ORDER BY id", &[])
            .unwrap();
        assert_eq!(owners, vec![Value::Int(1), Value::Int(1)]);
    }

    #[test]
    fn test_unknown_table_is_rejected() {
        let fixture = GatewayFixture::new().unwrap();
        let seeder = Seeder::new().register(fixture.users());
        let err = seeder.seed(&json!({"ghosts": [{"name": "x"}]})).unwrap_err();
        assert!(matches!(err, RowgateError::Seed(_)));
    }

    #[test]
    fn test_malformed_seed_data() {
        let fixture = GatewayFixture::new().unwrap();
        let seeder = Seeder::new().register(fixture.users());
        assert!(matches!(seeder.seed(&json!([1, 2])), Err(RowgateError::Seed(_))));
        assert!(matches!(seeder.seed(&json!({"users": {"name": "x"}})), Err(RowgateError::Seed(_))));
        assert!(matches!(seeder.seed(&json!({"users": ["x"]})), Err(RowgateError::Seed(_))));
    }

    #[test]
    fn test_truncation_order_is_deepest_first() {
        let fixture = GatewayFixture::new().unwrap();
        let seeder = Seeder::new()
            .register(fixture.users())
            .register(fixture.posts())
            .register(fixture.documents());

        let data = json!({
            "documents": [{"title": "a"}],
            "users": [{"name": "ann", "posts": [{"title": "p"}]}]
        });
        let order = seeder.truncation_order(&data).unwrap();
        assert_eq!(order[0], "posts");
        assert_eq!(order.len(), 3);

        seeder.seed(&data).unwrap();
        seeder.truncate(&data).unwrap();
        assert_eq!(fixture.users().count(&Conditions::new()).unwrap(), 0);
        assert_eq!(fixture.posts().count(&Conditions::new()).unwrap(), 0);
    }

    #[test]
    fn test_run_from_toml_file() {
        let fixture = GatewayFixture::new().unwrap();
        let seeder = Seeder::new()
            .register(fixture.users())
            .register(fixture.posts());

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[[users]]
name = "ann"

[[users.posts]]
title = "hello"
"#
        )
        .unwrap();

        let config = SeedConfig {
            path: file.path().to_path_buf(),
            truncate: true,
        };
        let report = seeder.run(&config).unwrap();
        assert_eq!(report.inserted("users"), 1);
        assert_eq!(report.inserted("posts"), 1);

        // a second run with truncate starts from empty tables again
        let report = seeder.run(&config).unwrap();
        assert_eq!(report.total(), 2);
        assert_eq!(fixture.users().count(&Conditions::new()).unwrap(), 1);
    }

    #[test]
    fn test_load_file_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(load_file(file.path()), Err(RowgateError::Seed(_))));
    }
}
