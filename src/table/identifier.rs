//! SQL identifier validation and quoting.
//!
//! Identifiers can never be bound as parameters, so every table, column and
//! order-by name passes through here before it is spliced into SQL text.

use crate::core::{Result, RowgateError};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

/// `true` for letters, digits and underscores not starting with a digit.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Rejects anything that is not a plain identifier.
pub fn validate(name: &str) -> Result<&str> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(RowgateError::Query(format!("invalid identifier '{}'", name)))
    }
}

/// Validates and back-quotes a plain identifier.
pub fn quote(name: &str) -> Result<String> {
    validate(name).map(|n| format!("`{}`", n))
}

/// Normalizes `name`, `table.name` or their back-quoted forms into the
/// canonical quoted form.
pub fn quote_column(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() > 2 {
        return Err(RowgateError::Query(format!("invalid column reference '{}'", raw)));
    }

    let quoted = parts
        .into_iter()
        .map(|part| {
            let bare = part
                .strip_prefix('`')
                .and_then(|p| p.strip_suffix('`'))
                .unwrap_or(part);
            quote(bare)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(quoted.join("."))
}
