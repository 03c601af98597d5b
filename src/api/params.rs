//! Request parameter sets

use std::collections::btree_map;
use std::collections::BTreeMap;

/// A single query parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    /// Joined with `,` on the wire
    List(Vec<String>),
    /// Present in the set but never sent
    Absent,
}

impl ParamValue {
    /// Wire form, or `None` when the value must be dropped before signing
    pub fn to_wire(&self) -> Option<String> {
        match self {
            ParamValue::Text(s) if !s.is_empty() => Some(s.clone()),
            ParamValue::List(items) if !items.is_empty() => Some(items.join(",")),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Text(value.clone())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

impl From<&[&str]> for ParamValue {
    fn from(value: &[&str]) -> Self {
        ParamValue::List(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParamValue::Absent)
    }
}

/// Mapping of query keys to values for one logical call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParameters(BTreeMap<String, ParamValue>);

impl RequestParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Text value of `key`, if it is plain text
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(ParamValue::as_text)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamValue> {
        self.0.iter()
    }

    /// Wire key/value pairs with absent and empty values stripped
    pub fn wire_pairs(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.to_wire().map(|v| (k.clone(), v)))
            .collect()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for RequestParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl<'a> IntoIterator for &'a RequestParameters {
    type Item = (&'a String, &'a ParamValue);
    type IntoIter = btree_map::Iter<'a, String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
