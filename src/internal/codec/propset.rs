//! `propset_json`: a comma-separated list of `"key":<value>` pairs, sorted by
//! key, carried verbatim inside [`Build`](super::build::Build) and
//! [`BuildSummary`](super::report::BuildSummary) (`spec.md` §3, §4.B).
//!
//! The on-disk form omits the wrapping `{}` of a JSON object; parsing adds
//! them back so the values can be decoded with `serde_json`.

use serde_json::{Map, Value};

use crate::errors::CovError;

/// Parse a stored `propset_json` string into its key/value pairs. An empty
/// string is the empty property set.
pub fn parse(propset_json: &str) -> Result<Map<String, Value>, CovError> {
    if propset_json.is_empty() {
        return Ok(Map::new());
    }
    let wrapped = format!("{{{propset_json}}}");
    match serde_json::from_str::<Value>(&wrapped) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(CovError::syntax(
            "propset",
            format!("`{propset_json}` is not a valid property set"),
        )),
    }
}

/// Serialize `entries` into the normalised on-disk form: sorted by key (a
/// `serde_json::Map` is a `BTreeMap` without the `preserve_order` feature, so
/// iteration order is already sorted), each pair written `"key":value`.
pub fn normalize(entries: Map<String, Value>) -> String {
    entries
        .into_iter()
        .map(|(key, value)| format!("{}:{value}", Value::String(key)))
        .collect::<Vec<_>>()
        .join(",")
}
