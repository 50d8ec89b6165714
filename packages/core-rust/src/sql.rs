//! SQL text helpers: statement joining, column-map expansion and named
//! parameter binding.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::template::js_string;

/// Placeholder replaced by the `COL_MAP` select list.
pub const COL_MAP_TOKEN: &str = ":COL_MAP";

/// Key holding the column map inside `operationDetails`.
pub const COL_MAP_KEY: &str = "COL_MAP";

static NAMED_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z0-9_]+)").expect("named parameter pattern is valid"));

/// Reads `sql` as either a single string or an array of fragments joined by
/// spaces.
#[must_use]
pub fn join_sql(sql: Option<&Value>) -> Option<String> {
    match sql? {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => Some(parts.iter().map(js_string).collect::<Vec<_>>().join(" ")),
        _ => None,
    }
}

/// Renders a column map as `source as alias, ...`.
#[must_use]
pub fn column_list(col_map: &Map<String, Value>) -> String {
    col_map
        .iter()
        .map(|(column, alias)| format!("{column} as {}", js_string(alias)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Replaces the first `:COL_MAP` token with the rendered column list.
#[must_use]
pub fn replace_column_map(sql: &str, col_map: Option<&Map<String, Value>>) -> String {
    match col_map {
        Some(col_map) => sql.replacen(COL_MAP_TOKEN, &column_list(col_map), 1),
        None => sql.to_string(),
    }
}

/// A statement with positional placeholders and its bind values, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub binds: Vec<Value>,
}

/// Turns `:name` tokens into `?` placeholders for every name present in
/// `params`. Tokens without a value are left untouched.
#[must_use]
pub fn bind_named_params(sql: &str, params: Option<&Map<String, Value>>) -> BoundQuery {
    let mut binds = Vec::new();
    let sql = NAMED_PARAM
        .replace_all(sql, |captures: &Captures<'_>| {
            match params.and_then(|params| params.get(&captures[1])) {
                Some(value) => {
                    binds.push(value.clone());
                    "?".to_string()
                }
                None => captures[0].to_string(),
            }
        })
        .into_owned();
    BoundQuery { sql, binds }
}
