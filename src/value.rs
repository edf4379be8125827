//! Runtime data values
//!
//! The engine processes one canonical tagged value type, [`Node`]. It mirrors
//! the JSON data model (null, bool, number, string, array, object) and adds a
//! typed-object variant so marshalled results and plain data can flow through
//! the same recursion. Object members keep insertion order, which is why the
//! crate enables `serde_json`'s `preserve_order` feature for the boundary
//! conversions.

use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::structure::ObjectRef;

/// A string-keyed map that preserves insertion order.
///
/// Declaration order matters in schema documents (property dispatch, export
/// ordering), so plain hash maps are not an option here.
#[derive(Debug, Clone)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let i = *self.index.get(key)?;
        Some(&mut self.entries[i].1)
    }

    /// Insert a value, keeping the original position when the key exists.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Mutable access to the value under `key`, inserting `default()` first
    /// when the key is new.
    pub fn get_or_insert_with(&mut self, key: &str, default: impl FnOnce() -> V) -> &mut V {
        if !self.index.contains_key(key) {
            self.index.insert(key.to_string(), self.entries.len());
            self.entries.push((key.to_string(), default()));
        }
        let i = self.index[key];
        &mut self.entries[i].1
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut V)> {
        self.entries.iter_mut().map(|(k, v)| (&*k, v))
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<T: IntoIterator<Item = (String, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// The canonical runtime value.
#[derive(Debug, Clone)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Node>),
    /// A generic (untyped) object: ordered key/value members.
    Map(OrderedMap<Node>),
    /// A typed object produced by import, shared by reference so identity
    /// survives cloning (export cycle detection relies on this).
    Object(ObjectRef),
}

impl Node {
    /// Convert from the boundary representation.
    pub fn from_value(value: &Value) -> Node {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Number(n) => Node::Number(n.clone()),
            Value::String(s) => Node::String(s.clone()),
            Value::Array(items) => Node::Array(items.iter().map(Node::from_value).collect()),
            Value::Object(map) => Node::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Node::from_value(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back to the boundary representation. Typed objects serialize
    /// to plain JSON objects, members in insertion order.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            Node::Map(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
            }
            Node::Object(obj) => obj.borrow().serialize().to_value(),
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Node::Map(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Node::Array(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Node::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Compact JSON rendering, used in diagnostic messages.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.to_value()).unwrap_or_else(|_| "null".to_string())
    }
}

impl PartialEq for Node {
    /// Structural equality. Numbers compare the way JSON parsing produced
    /// them (`1` and `1.0` differ), matching enum/const semantics. Typed
    /// objects compare by serialized members.
    fn eq(&self, other: &Node) -> bool {
        crate::diff::count_differences(self, other) == 0
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Node {
        Node::from_value(&value)
    }
}
