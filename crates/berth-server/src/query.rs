//! Query-string decoding for router parameters.

use berth_core::CoreError;
use std::collections::HashMap;

/// Decoded `key=value` pairs. A repeated key keeps its last value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Query {
    params: HashMap<String, String>,
}

impl Query {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let mut params = HashMap::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.insert(decode(key)?, decode(value)?);
        }
        Ok(Self { params })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_owned()
    }

    /// Boolean parameter; accepts `true`, `false`, `1`, `0`. An empty value
    /// counts as absent.
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, CoreError> {
        match self.get(key) {
            None | Some("") => Ok(default),
            Some(v) => parse_bool(v).ok_or_else(|| {
                CoreError::InvalidArgument(format!(
                    "query parameter '{key}' must be true or false, got '{v}'"
                ))
            }),
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn decode(s: &str) -> Result<String, CoreError> {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| CoreError::InvalidArgument(format!("malformed query string: {e}")))
}

/// Split a request URL into its path and parsed query.
pub fn split_url(url: &str) -> Result<(&str, Query), CoreError> {
    match url.split_once('?') {
        Some((path, raw)) => Ok((path, Query::parse(raw)?)),
        None => Ok((url, Query::default())),
    }
}
