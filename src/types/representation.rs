//! Rendered representations.
//!
//! A `Representation` is an ordered mapping from field name to JSON value.
//! Equality is structural (key order is ignored) and hashing goes through the
//! canonical fingerprint, so representations and lists of them can be used as
//! set members or map keys once they are no longer mutated.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical::canonical_hash;

/// Ordered field name -> value mapping produced by a renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Representation(Map<String, Value>);

impl Representation {
    /// Empty representation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a mutable value by key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Remove a key, keeping the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Mutably borrow the underlying map.
    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// Convert into a JSON object value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Build from a JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Structural fingerprint, independent of key order.
    pub fn fingerprint(&self) -> u64 {
        canonical_hash(&Value::Object(self.0.clone()))
    }

    /// Keys whose values differ between `self` and `other`, among keys both share.
    pub fn changed_keys(&self, other: &Representation) -> Vec<String> {
        self.0
            .iter()
            .filter(|(key, value)| other.0.get(key.as_str()).is_some_and(|o| o != *value))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl Hash for Representation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

impl From<Map<String, Value>> for Representation {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Representation {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of expanding a field: one representation or an ordered sequence.
///
/// Expansion never yields a bare scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expanded {
    /// A single related object.
    One(Representation),
    /// A collection, in accessor order.
    Many(Vec<Representation>),
}

impl Expanded {
    /// Convert into the JSON value substituted for the field.
    pub fn into_value(self) -> Value {
        match self {
            Self::One(rep) => rep.into_value(),
            Self::Many(reps) => Value::Array(reps.into_iter().map(Representation::into_value).collect()),
        }
    }

    /// Structural fingerprint of the whole expansion.
    pub fn fingerprint(&self) -> u64 {
        canonical_hash(&self.clone().into_value())
    }

    /// Whether this is a collection.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many(_))
    }

    /// Borrow the single representation, if this is `One`.
    pub fn as_one(&self) -> Option<&Representation> {
        match self {
            Self::One(rep) => Some(rep),
            Self::Many(_) => None,
        }
    }

    /// Borrow the collection, if this is `Many`.
    pub fn as_many(&self) -> Option<&[Representation]> {
        match self {
            Self::One(_) => None,
            Self::Many(reps) => Some(reps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn rep(value: Value) -> Representation {
        Representation::from_value(value).unwrap()
    }

    #[test]
    fn test_equality_ignores_key_order() {
        let a = rep(json!({"id": 1, "name": "a"}));
        let b = rep(json!({"name": "a", "id": 1}));
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());

        let set: HashSet<Representation> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_changed_keys() {
        let base = rep(json!({"id": 1, "b": "ref", "c": "ref"}));
        let item = rep(json!({"id": 1, "b": "ref", "c": {"id": 7}}));
        assert_eq!(item.changed_keys(&base), vec!["c".to_string()]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut r = rep(json!({"a": 1, "b": 2, "c": 3}));
        r.remove("b");
        let keys: Vec<&String> = r.keys().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_expanded_into_value() {
        let many = Expanded::Many(vec![rep(json!({"id": 1})), rep(json!({"id": 2}))]);
        assert!(many.is_many());
        assert_eq!(many.into_value(), json!([{"id": 1}, {"id": 2}]));
    }
}
