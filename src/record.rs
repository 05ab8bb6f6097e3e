//! Row representation.
//!
//! A `Record<E>` is a detached row: an identity slot plus an ordered
//! attribute map. It never talks to the database itself; `Table` reads and
//! writes it. The per-table behaviour (identity strategy, UUID columns, casts,
//! computed columns) comes from the `Entity` implementor `E`.
//!
//! Typed fields are plain accessor methods on `Record<Concrete>` that go
//! through `get`/`set`, so the attribute map is the only storage and
//! serialization always sees the latest value.

use crate::core::value::{self, Attributes, Value, DATETIME_FORMAT};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// Target type of a read-time cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Int,
    Float,
    Bool,
    String,
    Date,
}

impl Cast {
    /// Parses the usual cast names (`int`, `integer`, `float`, `double`,
    /// `bool`, `boolean`, `string`, `date`, `datetime`).
    pub fn parse(name: &str) -> Option<Cast> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(Cast::Int),
            "float" | "double" | "real" => Some(Cast::Float),
            "bool" | "boolean" => Some(Cast::Bool),
            "string" | "str" => Some(Cast::String),
            "date" | "datetime" => Some(Cast::Date),
            _ => None,
        }
    }

    /// Applies the cast to a stored value. `NULL` stays `NULL`.
    pub fn apply(&self, value: &Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match self {
            Cast::Int => Value::Int(to_int(value)),
            Cast::Float => Value::Float(to_float(value)),
            Cast::Bool => Value::Bool(to_bool(value)),
            Cast::String => Value::Text(value.to_text()),
            Cast::Date => to_date(value).map(Value::DateTime).unwrap_or_else(|| value.clone()),
        }
    }
}

fn to_int(value: &Value) -> i64 {
    match value {
        Value::Int(i) => *i,
        Value::Float(f) => *f as i64,
        Value::Bool(b) => i64::from(*b),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .or_else(|_| s.parse::<f64>().map(|f| f as i64))
                .unwrap_or(0)
        }
        Value::DateTime(dt) => dt.and_utc().timestamp(),
        Value::Null | Value::Blob(_) => 0,
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Text(s) => s.trim().parse().unwrap_or(0.0),
        Value::DateTime(dt) => dt.and_utc().timestamp() as f64,
        Value::Null | Value::Blob(_) => 0.0,
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Text(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Blob(b) => !b.is_empty(),
        Value::DateTime(_) => true,
        Value::Null => false,
    }
}

fn to_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
        Value::Text(s) => {
            let s = s.trim();
            NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .ok()
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
        _ => None,
    }
}

/// Record identity: an auto-increment integer or a UUID string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Id {
    Int(i64),
    Text(String),
}

impl Id {
    /// Reads an identity out of a column value. Empty values yield `None`;
    /// binary UUIDs come back as text.
    pub fn from_value(value: Value) -> Option<Id> {
        if value.is_empty() {
            return None;
        }
        match value::binary_to_uuid(value) {
            Value::Int(i) => Some(Id::Int(i)),
            Value::Float(f) => Some(Id::Int(f as i64)),
            Value::Text(s) => Some(Id::Text(s)),
            other => Some(Id::Text(other.to_text())),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Id::Int(i) => Some(*i),
            Id::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Id::Text(s) => Some(s),
            Id::Int(_) => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(i) => write!(f, "{}", i),
            Id::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Id {
    fn from(v: i64) -> Self {
        Id::Int(v)
    }
}

impl From<&str> for Id {
    fn from(v: &str) -> Self {
        Id::Text(v.to_string())
    }
}

impl From<String> for Id {
    fn from(v: String) -> Self {
        Id::Text(v)
    }
}

impl From<Id> for Value {
    fn from(id: Id) -> Self {
        match id {
            Id::Int(i) => Value::Int(i),
            Id::Text(s) => Value::Text(s),
        }
    }
}

impl From<&Id> for Value {
    fn from(id: &Id) -> Self {
        id.clone().into()
    }
}

/// Per-table row behaviour, implemented once per concrete record type.
///
/// ```
/// use rowgate::{Cast, Entity};
///
/// struct Invoice;
///
/// impl Entity for Invoice {
///     const USES_UUID: bool = true;
///
///     fn uuid_columns() -> &'static [&'static str] {
///         &["customer_id"]
///     }
///
///     fn casts() -> &'static [(&'static str, Cast)] {
///         &[("paid", Cast::Bool), ("total", Cast::Float)]
///     }
/// }
/// ```
pub trait Entity: 'static {
    /// `true` for time-ordered UUID identities, `false` for auto-increment.
    const USES_UUID: bool = false;

    /// Attributes (other than `id`) holding UUID text stored as 16 bytes.
    fn uuid_columns() -> &'static [&'static str] {
        &[]
    }

    /// Read-time casts by attribute name.
    fn casts() -> &'static [(&'static str, Cast)] {
        &[]
    }

    /// Presentation-only attributes, never written to the database.
    fn computed_columns() -> &'static [&'static str] {
        &[]
    }

    fn cast_for(name: &str) -> Option<Cast> {
        Self::casts()
            .iter()
            .find(|(column, _)| *column == name)
            .map(|(_, cast)| *cast)
    }
}

/// A typed row bound to entity `E`.
pub struct Record<E: Entity> {
    id: Option<Id>,
    attributes: Attributes,
    entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Record<E> {
    /// Builds a record from user data or a fetched row.
    ///
    /// The `id` key moves to the identity slot (binary UUIDs become text).
    /// UUID entities without an id get a fresh UUIDv7 immediately. Columns
    /// listed in `uuid_columns` are converted from binary to text and `bool`
    /// casts are applied eagerly; other casts wait for `get`.
    pub fn new(attributes: Attributes) -> Self {
        let mut id = None;
        let mut stored = Attributes::with_capacity(attributes.len());

        for (name, value) in attributes {
            if name == "id" {
                id = Id::from_value(value);
                continue;
            }
            let value = if E::uuid_columns().contains(&name.as_str()) {
                value::binary_to_uuid(value)
            } else {
                value
            };
            let value = match E::cast_for(&name) {
                Some(Cast::Bool) => Cast::Bool.apply(&value),
                _ => value,
            };
            stored.insert(name, value);
        }

        if id.is_none() && E::USES_UUID {
            id = Some(Id::Text(value::new_uuid()));
        }

        Record {
            id,
            attributes: stored,
            entity: PhantomData,
        }
    }

    /// Record with no attributes (UUID entities still get an id).
    pub fn empty() -> Self {
        Self::new(Attributes::new())
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn set_id(&mut self, id: impl Into<Id>) {
        self.id = Some(id.into());
    }

    /// Reads an attribute with its declared cast applied; `Value::Null` when
    /// absent. `get("id")` returns the identity.
    pub fn get(&self, name: &str) -> Value {
        if name == "id" {
            return self.id.as_ref().map(Value::from).unwrap_or(Value::Null);
        }
        match (self.attributes.get(name), E::cast_for(name)) {
            (Some(value), Some(cast)) => cast.apply(value),
            (Some(value), None) => value.clone(),
            (None, _) => Value::Null,
        }
    }

    /// Stored value without casting.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Writes an attribute. `set("id", ..)` writes the identity slot; an
    /// empty value clears it, except on UUID entities, whose records always
    /// keep an id.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if name == "id" {
            match Id::from_value(value) {
                Some(id) => self.id = Some(id),
                None if E::USES_UUID => {
                    if self.id.is_none() {
                        self.id = Some(Id::Text(value::new_uuid()));
                    }
                }
                None => self.id = None,
            }
        } else {
            self.attributes.insert(name, value);
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Identity plus every attribute, computed columns included.
    pub fn to_array(&self) -> Attributes {
        let mut array = Attributes::with_capacity(self.attributes.len() + 1);
        array.insert("id", self.id.as_ref().map(Value::from).unwrap_or(Value::Null));
        for (name, value) in self.attributes.iter() {
            array.insert(name, value.clone());
        }
        array
    }

    /// `to_array` minus computed columns; what `Table` writes.
    pub fn to_persistable_array(&self) -> Attributes {
        let mut array = self.to_array();
        array.retain(|name, _| !E::computed_columns().contains(&name));
        array
    }
}

impl<E: Entity> Default for Record<E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<E: Entity> Clone for Record<E> {
    fn clone(&self) -> Self {
        Record {
            id: self.id.clone(),
            attributes: self.attributes.clone(),
            entity: PhantomData,
        }
    }
}

impl<E: Entity> PartialEq for Record<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.attributes == other.attributes
    }
}

impl<E: Entity> fmt::Debug for Record<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("entity", &std::any::type_name::<E>())
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl<E: Entity> Serialize for Record<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}
