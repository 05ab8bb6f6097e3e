//! Condition DSL and its compiler.
//!
//! Callers describe a WHERE clause as a mapping of column → condition. The
//! compiler validates every column and operator first, then produces a
//! `WhereClause`: a flat conjunction of `Clause`s that renders SQL with
//! positional placeholders plus the parameters to bind.
//!
//! A condition may take any of these shapes:
//!
//! | Shape | Example | SQL |
//! |-------|---------|-----|
//! | scalar | `"ann"` | `` `name` = ? `` |
//! | null | `null` | `` `deleted_at` IS NULL `` |
//! | keyed | `{"operator": ">", "value": 18}` | `` `age` > ? `` |
//! | indexed | `[">", 18]` or `[18, ">"]` | `` `age` > ? `` |
//! | indexed between | `["BETWEEN", 1, 9]` | `` `age` BETWEEN ? AND ? `` |

use crate::core::value::{self, Value};
use crate::core::{Result, RowgateError};
use crate::table::identifier;
use std::collections::HashSet;
use std::fmt;

/// Allowed comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Operator {
    Eq,
    Ne,
    LtGt,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    NotLike,
    Between,
    In,
    NotIn,
}

impl Operator {
    pub const ALL: [Operator; 12] = [
        Operator::Eq,
        Operator::Ne,
        Operator::LtGt,
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Like,
        Operator::NotLike,
        Operator::Between,
        Operator::In,
        Operator::NotIn,
    ];

    /// Case-insensitive lookup; inner whitespace is collapsed so `not  like`
    /// still matches.
    pub fn parse(raw: &str) -> Option<Operator> {
        let normalized = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        Operator::ALL.into_iter().find(|op| op.as_sql() == normalized)
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::LtGt => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::Between => "BETWEEN",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Right-hand side of a structured condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(Value),
    List(Vec<Value>),
}

impl Operand {
    pub fn single(value: impl Into<Value>) -> Self {
        Operand::Single(value.into())
    }

    pub fn list<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Operand::List(values.into_iter().map(Into::into).collect())
    }

    fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Array(items) => {
                Operand::List(items.iter().map(Value::from_json).collect())
            }
            other => Operand::Single(Value::from_json(other)),
        }
    }

    fn operator_text(&self) -> Option<Operator> {
        match self {
            Operand::Single(Value::Text(text)) => Operator::parse(text),
            _ => None,
        }
    }
}

/// One column's condition, in any of the accepted shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `NULL` compiles to `IS NULL`, anything else to `= ?`
    Scalar(Value),
    /// `{operator, value}`
    Keyed { operator: String, value: Operand },
    /// `[operator, value]`, `[value, operator]` or `[BETWEEN, low, high]`
    Indexed(Vec<Operand>),
}

/// Ordered column → condition mapping; setting a column twice replaces the
/// earlier condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    entries: Vec<(String, Condition)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.entries.iter().map(|(c, cond)| (c.as_str(), cond))
    }

    pub fn push(mut self, column: impl Into<String>, condition: Condition) -> Self {
        let column = column.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = condition,
            None => self.entries.push((column, condition)),
        }
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, Condition::Scalar(value.into()))
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.push(column, Condition::Scalar(Value::Null))
    }

    pub fn op(self, column: impl Into<String>, operator: &str, value: impl Into<Value>) -> Self {
        self.push(
            column,
            Condition::Keyed {
                operator: operator.to_string(),
                value: Operand::single(value),
            },
        )
    }

    pub fn between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.push(
            column,
            Condition::Keyed {
                operator: "BETWEEN".to_string(),
                value: Operand::List(vec![low.into(), high.into()]),
            },
        )
    }

    pub fn in_list<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push(
            column,
            Condition::Keyed {
                operator: "IN".to_string(),
                value: Operand::list(values),
            },
        )
    }

    pub fn not_in<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push(
            column,
            Condition::Keyed {
                operator: "NOT IN".to_string(),
                value: Operand::list(values),
            },
        )
    }

    /// Reads conditions from a JSON object in any of the accepted shapes.
    ///
    /// ```
    /// use rowgate::table::Conditions;
    ///
    /// let conditions = Conditions::from_json(&serde_json::json!({
    ///     "status": "active",
    ///     "age": {"operator": ">=", "value": 18},
    ///     "role": ["IN", ["admin", "staff"]],
    /// }))?;
    /// assert_eq!(conditions.len(), 3);
    /// # Ok::<(), rowgate::RowgateError>(())
    /// ```
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| RowgateError::Query("conditions must be a JSON object".to_string()))?;

        let mut conditions = Conditions::new();
        for (column, raw) in object {
            let condition = match raw {
                serde_json::Value::Object(shape) => {
                    let operator = shape.get("operator").and_then(|o| o.as_str());
                    let value = shape.get("value");
                    match (operator, value) {
                        (Some(operator), Some(value)) => Condition::Keyed {
                            operator: operator.to_string(),
                            value: Operand::from_json(value),
                        },
                        _ => {
                            return Err(RowgateError::Query(format!(
                                "condition for '{}' needs 'operator' and 'value'",
                                column
                            )))
                        }
                    }
                }
                serde_json::Value::Array(items) => {
                    Condition::Indexed(items.iter().map(Operand::from_json).collect())
                }
                scalar => Condition::Scalar(Value::from_json(scalar)),
            };
            conditions = conditions.push(column.clone(), condition);
        }
        Ok(conditions)
    }
}

/// A compiled predicate for a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    IsNull,
    Compare(Operator, Value),
    Between(Value, Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    /// Empty `IN`: matches nothing
    AlwaysFalse,
    /// Empty `NOT IN`: matches everything
    AlwaysTrue,
}

/// One compiled `column predicate` term.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub column: String,
    pub predicate: Predicate,
}

impl Clause {
    pub fn to_sql(&self) -> String {
        let column = format!("`{}`", self.column);
        match &self.predicate {
            Predicate::IsNull => format!("{} IS NULL", column),
            Predicate::Compare(op, _) => format!("{} {} ?", column, op),
            Predicate::Between(_, _) => format!("{} BETWEEN ? AND ?", column),
            Predicate::In(values) => format!("{} IN ({})", column, placeholders(values.len())),
            Predicate::NotIn(values) => {
                format!("{} NOT IN ({})", column, placeholders(values.len()))
            }
            Predicate::AlwaysFalse => "0 = 1".to_string(),
            Predicate::AlwaysTrue => "1 = 1".to_string(),
        }
    }

    pub fn params(&self) -> Vec<Value> {
        match &self.predicate {
            Predicate::IsNull | Predicate::AlwaysFalse | Predicate::AlwaysTrue => Vec::new(),
            Predicate::Compare(_, v) => vec![v.clone()],
            Predicate::Between(low, high) => vec![low.clone(), high.clone()],
            Predicate::In(values) | Predicate::NotIn(values) => values.clone(),
        }
    }
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// A flat `AND` of compiled clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    clauses: Vec<Clause>,
}

impl WhereClause {
    /// Compiles conditions. Scalar values bound to `id` or to any column in
    /// `uuid_columns` are converted from UUID text to binary first.
    ///
    /// # Errors
    ///
    /// `RowgateError::Query` for invalid column names, operators outside the
    /// allow-list, or malformed condition shapes. Nothing is rendered until
    /// every entry has passed.
    pub fn compile(conditions: &Conditions, uuid_columns: &HashSet<String>) -> Result<Self> {
        let clauses = conditions
            .iter()
            .map(|(column, condition)| compile_entry(column, condition, uuid_columns))
            .collect::<Result<Vec<_>>>()?;
        Ok(WhereClause { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Clauses joined with `AND`, without the `WHERE` keyword.
    pub fn to_sql(&self) -> String {
        self.clauses
            .iter()
            .map(Clause::to_sql)
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    pub fn params(&self) -> Vec<Value> {
        self.clauses.iter().flat_map(Clause::params).collect()
    }
}

fn compile_entry(column: &str, condition: &Condition, uuid_columns: &HashSet<String>) -> Result<Clause> {
    identifier::validate(column)?;
    let is_uuid = column == "id" || uuid_columns.contains(column);
    let normalize = |v: &Value| {
        if is_uuid && !v.is_empty() {
            value::uuid_to_binary(v.clone())
        } else {
            v.clone()
        }
    };

    let predicate = match condition {
        Condition::Scalar(Value::Null) => Predicate::IsNull,
        Condition::Scalar(v) => Predicate::Compare(Operator::Eq, normalize(v)),
        Condition::Keyed { operator, value } => {
            let op = Operator::parse(operator).ok_or_else(|| {
                RowgateError::Query(format!("operator '{}' is not allowed on '{}'", operator, column))
            })?;
            build_predicate(column, op, value, &normalize)?
        }
        Condition::Indexed(items) => match items.as_slice() {
            [first, second] => {
                let (op, operand) = match (first.operator_text(), second.operator_text()) {
                    (Some(op), _) => (op, second),
                    (None, Some(op)) => (op, first),
                    (None, None) => {
                        return Err(RowgateError::Query(format!(
                            "no allowed operator found in condition for '{}'",
                            column
                        )))
                    }
                };
                build_predicate(column, op, operand, &normalize)?
            }
            [first, Operand::Single(low), Operand::Single(high)]
                if first.operator_text() == Some(Operator::Between) =>
            {
                Predicate::Between(normalize(low), normalize(high))
            }
            _ => {
                return Err(RowgateError::Query(format!(
                    "malformed condition for '{}': expected [operator, value] or [BETWEEN, low, high]",
                    column
                )))
            }
        },
    };

    Ok(Clause {
        column: column.to_string(),
        predicate,
    })
}

fn build_predicate(
    column: &str,
    op: Operator,
    operand: &Operand,
    normalize: &dyn Fn(&Value) -> Value,
) -> Result<Predicate> {
    match (op, operand) {
        (Operator::Between, Operand::List(values)) => match values.as_slice() {
            [low, high] => Ok(Predicate::Between(normalize(low), normalize(high))),
            _ => Err(RowgateError::Query(format!(
                "BETWEEN on '{}' requires exactly two values, got {}",
                column,
                values.len()
            ))),
        },
        (Operator::Between, Operand::Single(_)) => Err(RowgateError::Query(format!(
            "BETWEEN on '{}' requires exactly two values",
            column
        ))),
        (Operator::In, Operand::List(values)) if values.is_empty() => Ok(Predicate::AlwaysFalse),
        (Operator::NotIn, Operand::List(values)) if values.is_empty() => Ok(Predicate::AlwaysTrue),
        (Operator::In, Operand::List(values)) => {
            Ok(Predicate::In(values.iter().map(normalize).collect()))
        }
        (Operator::NotIn, Operand::List(values)) => {
            Ok(Predicate::NotIn(values.iter().map(normalize).collect()))
        }
        (Operator::In | Operator::NotIn, Operand::Single(_)) => Err(RowgateError::Query(format!(
            "{} on '{}' requires an array of values",
            op, column
        ))),
        (op, Operand::Single(v)) => Ok(Predicate::Compare(op, normalize(v))),
        (op, Operand::List(_)) => Err(RowgateError::Query(format!(
            "{} on '{}' takes a single value, not an array",
            op, column
        ))),
    }
}
