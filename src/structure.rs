//! Typed destination objects
//!
//! Import does not reflect over concrete types. The engine drives an abstract
//! member capability — set/get/has plus the bookkeeping export needs — and a
//! factory picks the destination per schema-declared binding. [`ObjectItem`]
//! is the shipped dynamic implementation; callers with concrete types plug in
//! their own [`TypedObject`] impls through an [`ObjectFactory`].

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::value::{Node, OrderedMap};

/// Shared handle to a typed object. `Rc` identity is load-bearing: export
/// cycle detection and `$ref` import dedup both key on the allocation.
pub type ObjectRef = Rc<RefCell<dyn TypedObject>>;

/// Stable identity key for an object handle.
pub(crate) fn object_key(obj: &ObjectRef) -> usize {
    Rc::as_ptr(obj) as *const () as usize
}

/// Member capability the engine marshals through.
pub trait TypedObject: std::fmt::Debug {
    fn set_member(&mut self, name: &str, value: Node);
    fn get_member(&self, name: &str) -> Option<Node>;
    fn has_member(&self, name: &str) -> bool;
    /// Member names in assignment order.
    fn member_names(&self) -> Vec<String>;

    /// Assign `key` inside the nested member `target`, creating the nested
    /// object when missing (flattened-structure declarations).
    fn set_nested_member(&mut self, target: &str, key: &str, value: Node) {
        let nested = match self.get_member(target) {
            Some(Node::Object(obj)) => obj,
            _ => {
                let fresh = ObjectItem::new_ref(None);
                self.set_member(target, Node::Object(fresh.clone()));
                fresh
            }
        };
        nested.borrow_mut().set_member(key, value);
    }

    /// Record that `key` arrived through the given pattern property.
    fn add_pattern_property_name(&mut self, _pattern: &str, _key: &str) {}
    /// Record that `key` arrived as an additional property.
    fn add_additional_property_name(&mut self, _key: &str) {}

    /// The `$ref` chain this object was imported through, innermost first.
    fn from_refs(&self) -> &[String] {
        &[]
    }
    fn set_from_ref(&mut self, _reference: String) {}

    fn set_document_path(&mut self, _path: String) {}

    /// Serialize members to a generic map node.
    fn serialize(&self) -> Node;

    /// Shallow copy used when a cached import gains an extra ref-chain entry.
    fn clone_object(&self) -> ObjectRef;

    fn as_any(&self) -> &dyn Any;
}

/// Dynamic member bag — the default import destination.
#[derive(Debug, Clone, Default)]
pub struct ObjectItem {
    members: OrderedMap<Node>,
    pattern_properties: OrderedMap<Vec<String>>,
    additional_properties: Vec<String>,
    from_refs: Vec<String>,
    document_path: Option<String>,
    /// Schema-declared binding this object was created for, if any.
    pub binding: Option<String>,
}

impl ObjectItem {
    pub fn new(binding: Option<String>) -> Self {
        Self {
            binding,
            ..Self::default()
        }
    }

    pub fn new_ref(binding: Option<String>) -> ObjectRef {
        Rc::new(RefCell::new(Self::new(binding)))
    }

    /// Keys recorded against a pattern property.
    pub fn pattern_property_names(&self, pattern: &str) -> &[String] {
        self.pattern_properties
            .get(pattern)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn additional_property_names(&self) -> &[String] {
        &self.additional_properties
    }

    pub fn document_path(&self) -> Option<&str> {
        self.document_path.as_deref()
    }
}

impl TypedObject for ObjectItem {
    fn set_member(&mut self, name: &str, value: Node) {
        self.members.insert(name, value);
    }

    fn get_member(&self, name: &str) -> Option<Node> {
        self.members.get(name).cloned()
    }

    fn has_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    fn member_names(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    fn add_pattern_property_name(&mut self, pattern: &str, key: &str) {
        let keys = self.pattern_properties.get_or_insert_with(pattern, Vec::new);
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }

    fn add_additional_property_name(&mut self, key: &str) {
        if !self.additional_properties.iter().any(|k| k == key) {
            self.additional_properties.push(key.to_string());
        }
    }

    fn from_refs(&self) -> &[String] {
        &self.from_refs
    }

    fn set_from_ref(&mut self, reference: String) {
        self.from_refs.push(reference);
    }

    fn set_document_path(&mut self, path: String) {
        self.document_path = Some(path);
    }

    fn serialize(&self) -> Node {
        Node::Map(
            self.members
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    fn clone_object(&self) -> ObjectRef {
        Rc::new(RefCell::new(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Produces import destinations, keyed on the schema-declared binding after
/// class-substitution lookup.
pub trait ObjectFactory {
    fn instantiate(&self, binding: Option<&str>) -> ObjectRef;
}

/// Factory producing plain [`ObjectItem`]s tagged with the binding name.
#[derive(Debug, Default)]
pub struct DefaultObjectFactory;

impl ObjectFactory for DefaultObjectFactory {
    fn instantiate(&self, binding: Option<&str>) -> ObjectRef {
        ObjectItem::new_ref(binding.map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_members_keep_assignment_order() {
        let mut item = ObjectItem::new(None);
        item.set_member("b", Node::from_value(&json!(1)));
        item.set_member("a", Node::from_value(&json!(2)));
        assert_eq!(item.member_names(), ["b", "a"]);
        assert_eq!(item.serialize().to_value(), json!({"b": 1, "a": 2}));
    }

    #[test]
    fn test_nested_member_creates_intermediate_object() {
        let mut item = ObjectItem::new(None);
        item.set_nested_member("inner", "x", Node::from_value(&json!(true)));
        item.set_nested_member("inner", "y", Node::from_value(&json!(false)));
        let Some(Node::Object(inner)) = item.get_member("inner") else {
            panic!("expected nested object");
        };
        assert_eq!(
            inner.borrow().serialize().to_value(),
            json!({"x": true, "y": false})
        );
    }

    #[test]
    fn test_bookkeeping_records_are_deduplicated() {
        let mut item = ObjectItem::new(None);
        item.add_additional_property_name("k");
        item.add_additional_property_name("k");
        item.add_pattern_property_name("^x", "x1");
        item.add_pattern_property_name("^x", "x1");
        assert_eq!(item.additional_property_names(), ["k"]);
        assert_eq!(item.pattern_property_names("^x"), ["x1"]);
    }
}
