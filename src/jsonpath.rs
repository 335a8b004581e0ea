//! Field extraction from decoded resource bodies.
//!
//! Expressions are RFC 9535 JSONPath queries evaluated with `serde_json_path`. The kubectl
//! spellings people copy from `kubectl get -o jsonpath` are accepted as well:
//!
//! - `$.status.phase`, `.status.phase`, `status.phase` and `{.status.phase}`
//! - filters: `$.status.conditions[?(@.type=="Ready")].status`
//! - quoted keys for names containing dots: `$.metadata.annotations['example.com/ready']`
//!
//! Anything the query grammar does not accept is rejected at parse time.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::Error;
use crate::error::Result;

/// A parsed field selector that can be evaluated against any JSON body.
#[derive(Debug, Clone)]
pub struct JsonPath {
    /// The expression after kubectl normalization, always rooted at `$`.
    expression: String,
    query: serde_json_path::JsonPath,
}

impl JsonPath {
    /// Parses an expression, failing on anything that is not a valid query.
    pub fn parse(expression: &str) -> Result<Self> {
        let normalized = normalize(expression)?;
        let query = serde_json_path::JsonPath::parse(&normalized)
            .map_err(|e| Error::invalid_jsonpath(expression, e.to_string()))?;

        Ok(JsonPath {
            expression: normalized,
            query,
        })
    }

    /// Evaluates the path against `body` and renders the first matching value as a string.
    ///
    /// Returns `None` when nothing matches or the match is `null`. Strings are returned
    /// verbatim, scalars as their JSON text and objects or arrays as compact JSON.
    pub fn extract(&self, body: &Value) -> Option<String> {
        match self.query.query(body).first()? {
            Value::Null => None,
            Value::String(s) => Some(s.to_owned()),
            other => Some(other.to_string()),
        }
    }
}

/// Rewrites kubectl style selectors into a `$`-rooted query.
fn normalize(expression: &str) -> Result<String> {
    let mut input = expression.trim();
    if let Some(inner) = input.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        input = inner.trim();
    }

    match input.chars().next() {
        None => Err(Error::invalid_jsonpath(expression, "empty expression")),
        Some('$') => Ok(input.to_owned()),
        Some('.' | '[') => Ok(format!("${input}")),
        // bare `status.phase` reads as `.status.phase`
        Some(_) => Ok(format!("$.{input}")),
    }
}

impl PartialEq for JsonPath {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for JsonPath {}

impl FromStr for JsonPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        JsonPath::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
