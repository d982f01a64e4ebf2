//! The numeric key/value environment exchanged with the caller

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// String-keyed `f32` mapping read and written by `GET-ENV` / `SET-ENV!`.
///
/// Insertion order is kept for stable printing; equality ignores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    values: IndexMap<String, f32>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.values.get(key).copied()
    }

    /// Insert or overwrite `key`, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: f32) -> Option<f32> {
        self.values.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<f32> {
        self.values.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn into_inner(self) -> IndexMap<String, f32> {
        self.values
    }
}

impl<K: Into<String>> FromIterator<(K, f32)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, f32)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<K: Into<String>> Extend<(K, f32)> for Environment {
    fn extend<I: IntoIterator<Item = (K, f32)>>(&mut self, iter: I) {
        self.values
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v)));
    }
}

impl IntoIterator for Environment {
    type Item = (String, f32);
    type IntoIter = indexmap::map::IntoIter<String, f32>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl From<HashMap<String, f32>> for Environment {
    fn from(map: HashMap<String, f32>) -> Self {
        map.into_iter().collect()
    }
}

impl From<IndexMap<String, f32>> for Environment {
    fn from(values: IndexMap<String, f32>) -> Self {
        Self { values }
    }
}
