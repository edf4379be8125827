//! Schema nodes
//!
//! One [`Schema`] holds the keyword set of a single schema fragment. Graphs
//! are produced either by the compiler (`Schema::import`) or programmatically
//! through the builder constructors, and are read-only once built. Nodes are
//! `Rc`-shared so reference cycles compile into genuinely cyclic graphs; the
//! engine is single-threaded by design, so `Rc<RefCell<_>>` is the sharing
//! primitive throughout.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Number, Value};

use crate::value::{Node, OrderedMap};

pub const PROP_REF: &str = "$ref";
pub const PROP_ID: &str = "$id";
pub const PROP_ID_D4: &str = "id";

/// Default property-name mapping selector.
pub const DEFAULT_MAPPING: &str = "default";

/// Shared handle to a schema node.
pub type SchemaRef = Rc<RefCell<Schema>>;

/// Draft compatibility switch. `Auto` accepts both `$id` and `id` scopes and
/// uses draft-06 integer semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    #[default]
    Auto,
    Draft04,
    Draft06,
    Draft07,
}

impl Version {
    /// Detect the draft from a `$schema` URI.
    pub fn from_schema_uri(uri: &str) -> Option<Version> {
        let uri = uri.trim_end_matches('#');
        match uri {
            "http://json-schema.org/draft-04/schema" => Some(Version::Draft04),
            "http://json-schema.org/draft-06/schema" => Some(Version::Draft06),
            "http://json-schema.org/draft-07/schema" | "http://json-schema.org/schema" => {
                Some(Version::Draft07)
            }
            _ => None,
        }
    }

    pub(crate) fn accepts_dollar_id(self) -> bool {
        !matches!(self, Version::Draft04)
    }

    pub(crate) fn accepts_plain_id(self) -> bool {
        matches!(self, Version::Draft04 | Version::Auto)
    }
}

/// A JSON type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    Integer,
    String,
}

impl SchemaType {
    pub fn from_name(name: &str) -> Option<SchemaType> {
        match name {
            "null" => Some(SchemaType::Null),
            "boolean" => Some(SchemaType::Boolean),
            "object" => Some(SchemaType::Object),
            "array" => Some(SchemaType::Array),
            "number" => Some(SchemaType::Number),
            "integer" => Some(SchemaType::Integer),
            "string" => Some(SchemaType::String),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SchemaType::Null => "null",
            SchemaType::Boolean => "boolean",
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::String => "string",
        }
    }
}

/// Exclusive bound: draft-04 boolean form or draft-06+ numeric form. Both
/// forms may appear on one node and combine losslessly.
#[derive(Debug, Clone)]
pub enum Exclusive {
    Bool(bool),
    Number(Number),
}

/// The `items` keyword: one schema for every element, or a positional tuple.
#[derive(Debug, Clone)]
pub enum Items {
    Single(SchemaRef),
    List(Vec<SchemaRef>),
}

/// One `dependencies` entry: schema-shaped or a list of required names.
#[derive(Debug, Clone)]
pub enum Dependency {
    Schema(SchemaRef),
    Keys(Vec<String>),
}

/// A nested-property declaration: one data key routed into a member path of
/// the destination object (flattened structures).
#[derive(Debug, Clone)]
pub struct NestedDecl {
    pub schema: SchemaRef,
    pub member: String,
}

/// Declared properties, in declaration order, with the auxiliary index of
/// nested-property declarations.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    pub items: OrderedMap<SchemaRef>,
    pub nested: OrderedMap<Vec<NestedDecl>>,
}

impl Properties {
    pub fn get(&self, name: &str) -> Option<&SchemaRef> {
        self.items.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    pub fn nested_names(&self) -> Vec<String> {
        self.nested.keys().cloned().collect()
    }
}

/// One schema fragment.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    // Scalar keywords
    pub type_: Option<Vec<SchemaType>>,
    pub enum_: Option<Vec<Node>>,
    /// Presence-sensitive: `const: null` is distinct from absent.
    pub const_: Option<Node>,
    pub multiple_of: Option<Number>,
    pub maximum: Option<Number>,
    pub exclusive_maximum: Option<Exclusive>,
    pub minimum: Option<Number>,
    pub exclusive_minimum: Option<Exclusive>,
    pub max_length: Option<u64>,
    pub min_length: Option<u64>,
    pub pattern: Option<String>,
    pub format: Option<String>,

    // Array keywords
    pub items: Option<Items>,
    pub additional_items: Option<SchemaRef>,
    pub max_items: Option<u64>,
    pub min_items: Option<u64>,
    pub unique_items: bool,
    pub contains: Option<SchemaRef>,

    // Object keywords
    pub max_properties: Option<u64>,
    pub min_properties: Option<u64>,
    pub required: Option<Vec<String>>,
    pub properties: Option<Properties>,
    pub pattern_properties: Option<OrderedMap<SchemaRef>>,
    pub additional_properties: Option<SchemaRef>,
    pub property_names: Option<SchemaRef>,
    pub dependencies: Option<OrderedMap<Dependency>>,

    // Combinators
    pub all_of: Option<Vec<SchemaRef>>,
    pub any_of: Option<Vec<SchemaRef>>,
    pub one_of: Option<Vec<SchemaRef>>,
    pub not: Option<SchemaRef>,
    pub if_: Option<SchemaRef>,
    pub then_: Option<SchemaRef>,
    pub else_: Option<SchemaRef>,

    // Content
    pub content_encoding: Option<String>,
    pub content_media_type: Option<String>,

    pub default: Option<Node>,

    // Binding
    /// Destination-object identity handed to the factory on import.
    pub binding: Option<String>,
    /// Import object-shaped data into a generic map instead of a typed object.
    pub use_object_as_array: bool,

    // Bookkeeping
    pub(crate) boolean: Option<bool>,
    /// `$ref` chain this node was imported through, innermost first.
    pub(crate) from_refs: Vec<String>,
    /// Raw source document, retained on compiled roots for diagnostics.
    pub(crate) source: Option<Rc<Value>>,
    pub(crate) data_to_member: HashMap<String, HashMap<String, String>>,
    pub(crate) member_to_data: HashMap<String, HashMap<String, String>>,
}

impl Schema {
    pub fn new() -> Schema {
        Schema::default()
    }

    fn typed(t: SchemaType) -> Schema {
        Schema {
            type_: Some(vec![t]),
            ..Schema::default()
        }
    }

    pub fn string() -> Schema {
        Schema::typed(SchemaType::String)
    }

    pub fn integer() -> Schema {
        Schema::typed(SchemaType::Integer)
    }

    pub fn number() -> Schema {
        Schema::typed(SchemaType::Number)
    }

    pub fn boolean() -> Schema {
        Schema::typed(SchemaType::Boolean)
    }

    pub fn object() -> Schema {
        Schema::typed(SchemaType::Object)
    }

    pub fn array() -> Schema {
        Schema::typed(SchemaType::Array)
    }

    pub fn null() -> Schema {
        Schema::typed(SchemaType::Null)
    }

    pub fn into_ref(self) -> SchemaRef {
        Rc::new(RefCell::new(self))
    }

    /// Declare a property, preserving declaration order.
    pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Schema {
        self.set_property(name, schema.into_ref());
        self
    }

    pub fn set_property(&mut self, name: impl Into<String>, schema: SchemaRef) {
        self.properties
            .get_or_insert_with(Properties::default)
            .items
            .insert(name, schema);
    }

    pub fn pattern_property(mut self, pattern: impl Into<String>, schema: Schema) -> Schema {
        self.pattern_properties
            .get_or_insert_with(OrderedMap::new)
            .insert(pattern, schema.into_ref());
        self
    }

    /// Route a data key into a member path of the destination object.
    pub fn nested_property(
        mut self,
        data_key: impl Into<String>,
        member: impl Into<String>,
        schema: Schema,
    ) -> Schema {
        let decl = NestedDecl {
            schema: schema.into_ref(),
            member: member.into(),
        };
        let props = self.properties.get_or_insert_with(Properties::default);
        props
            .nested
            .get_or_insert_with(&data_key.into(), Vec::new)
            .push(decl);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Schema {
        self.format = Some(format.into());
        self
    }

    /// Register a data-name ↔ member-name translation under a named mapping.
    pub fn add_property_mapping_in(
        &mut self,
        mapping: &str,
        data_name: impl Into<String>,
        member_name: impl Into<String>,
    ) {
        let data_name = data_name.into();
        let member_name = member_name.into();
        self.data_to_member
            .entry(mapping.to_string())
            .or_default()
            .insert(data_name.clone(), member_name.clone());
        self.member_to_data
            .entry(mapping.to_string())
            .or_default()
            .insert(member_name, data_name);
    }

    /// Register a translation under the default mapping.
    pub fn add_property_mapping(
        &mut self,
        data_name: impl Into<String>,
        member_name: impl Into<String>,
    ) {
        self.add_property_mapping_in(DEFAULT_MAPPING, data_name, member_name);
    }

    pub fn default_value(&self) -> Option<&Node> {
        self.default.as_ref()
    }

    pub fn property_names(&self) -> Vec<String> {
        self.properties.as_ref().map(Properties::names).unwrap_or_default()
    }

    pub fn nested_property_names(&self) -> Vec<String> {
        self.properties
            .as_ref()
            .map(Properties::nested_names)
            .unwrap_or_default()
    }

    pub(crate) fn data_name<'a>(&'a self, mapping: &str, member: &'a str) -> &'a str {
        self.member_to_data
            .get(mapping)
            .and_then(|m| m.get(member))
            .map(String::as_str)
            .unwrap_or(member)
    }

    pub(crate) fn member_name<'a>(&'a self, mapping: &str, data: &'a str) -> &'a str {
        self.data_to_member
            .get(mapping)
            .and_then(|m| m.get(data))
            .map(String::as_str)
            .unwrap_or(data)
    }

    /// Path fragments for the refs this node was imported through, outermost
    /// first (`->$ref[#/a]->$ref[#/b]`).
    pub(crate) fn from_ref_path(&self) -> String {
        let mut out = String::new();
        for reference in self.from_refs.iter().rev() {
            out.push_str("->$ref[");
            out.push_str(reference);
            out.push(']');
        }
        out
    }

    /// Serialize the keyword set back to generic data. Nodes imported
    /// through a reference serialize as the outermost `$ref` pointer.
    pub fn to_value(&self) -> Value {
        if let Some(b) = self.boolean {
            return Value::Bool(b);
        }
        if let Some(outermost) = self.from_refs.last() {
            let mut map = serde_json::Map::new();
            map.insert(PROP_REF.to_string(), Value::String(outermost.clone()));
            return Value::Object(map);
        }
        let mut map = serde_json::Map::new();
        if let Some(types) = &self.type_ {
            let value = if types.len() == 1 {
                Value::String(types[0].name().to_string())
            } else {
                Value::Array(types.iter().map(|t| Value::String(t.name().to_string())).collect())
            };
            map.insert("type".to_string(), value);
        }
        if let Some(values) = &self.enum_ {
            map.insert(
                "enum".to_string(),
                Value::Array(values.iter().map(Node::to_value).collect()),
            );
        }
        if let Some(value) = &self.const_ {
            map.insert("const".to_string(), value.to_value());
        }
        if let Some(n) = &self.multiple_of {
            map.insert("multipleOf".to_string(), Value::Number(n.clone()));
        }
        if let Some(n) = &self.maximum {
            map.insert("maximum".to_string(), Value::Number(n.clone()));
        }
        if let Some(n) = &self.minimum {
            map.insert("minimum".to_string(), Value::Number(n.clone()));
        }
        if let Some(e) = &self.exclusive_maximum {
            map.insert("exclusiveMaximum".to_string(), exclusive_value(e));
        }
        if let Some(e) = &self.exclusive_minimum {
            map.insert("exclusiveMinimum".to_string(), exclusive_value(e));
        }
        if let Some(n) = self.max_length {
            map.insert("maxLength".to_string(), n.into());
        }
        if let Some(n) = self.min_length {
            map.insert("minLength".to_string(), n.into());
        }
        if let Some(p) = &self.pattern {
            map.insert("pattern".to_string(), Value::String(p.clone()));
        }
        if let Some(f) = &self.format {
            map.insert("format".to_string(), Value::String(f.clone()));
        }
        match &self.items {
            Some(Items::Single(schema)) => {
                map.insert("items".to_string(), schema.borrow().to_value());
            }
            Some(Items::List(list)) => {
                map.insert(
                    "items".to_string(),
                    Value::Array(list.iter().map(|s| s.borrow().to_value()).collect()),
                );
            }
            None => {}
        }
        if let Some(schema) = &self.additional_items {
            map.insert("additionalItems".to_string(), schema.borrow().to_value());
        }
        if let Some(n) = self.max_items {
            map.insert("maxItems".to_string(), n.into());
        }
        if let Some(n) = self.min_items {
            map.insert("minItems".to_string(), n.into());
        }
        if self.unique_items {
            map.insert("uniqueItems".to_string(), Value::Bool(true));
        }
        if let Some(schema) = &self.contains {
            map.insert("contains".to_string(), schema.borrow().to_value());
        }
        if let Some(n) = self.max_properties {
            map.insert("maxProperties".to_string(), n.into());
        }
        if let Some(n) = self.min_properties {
            map.insert("minProperties".to_string(), n.into());
        }
        if let Some(required) = &self.required {
            map.insert(
                "required".to_string(),
                Value::Array(required.iter().map(|s| Value::String(s.clone())).collect()),
            );
        }
        if let Some(props) = &self.properties {
            if !props.items.is_empty() {
                map.insert(
                    "properties".to_string(),
                    Value::Object(
                        props
                            .items
                            .iter()
                            .map(|(k, v)| (k.clone(), v.borrow().to_value()))
                            .collect(),
                    ),
                );
            }
        }
        if let Some(patterns) = &self.pattern_properties {
            map.insert(
                "patternProperties".to_string(),
                Value::Object(
                    patterns
                        .iter()
                        .map(|(k, v)| (k.clone(), v.borrow().to_value()))
                        .collect(),
                ),
            );
        }
        if let Some(schema) = &self.additional_properties {
            map.insert("additionalProperties".to_string(), schema.borrow().to_value());
        }
        if let Some(schema) = &self.property_names {
            map.insert("propertyNames".to_string(), schema.borrow().to_value());
        }
        if let Some(deps) = &self.dependencies {
            map.insert(
                "dependencies".to_string(),
                Value::Object(
                    deps.iter()
                        .map(|(k, v)| {
                            let value = match v {
                                Dependency::Schema(s) => s.borrow().to_value(),
                                Dependency::Keys(keys) => Value::Array(
                                    keys.iter().map(|s| Value::String(s.clone())).collect(),
                                ),
                            };
                            (k.clone(), value)
                        })
                        .collect(),
                ),
            );
        }
        for (name, arms) in [
            ("allOf", &self.all_of),
            ("anyOf", &self.any_of),
            ("oneOf", &self.one_of),
        ] {
            if let Some(arms) = arms {
                map.insert(
                    name.to_string(),
                    Value::Array(arms.iter().map(|s| s.borrow().to_value()).collect()),
                );
            }
        }
        for (name, schema) in [
            ("not", &self.not),
            ("if", &self.if_),
            ("then", &self.then_),
            ("else", &self.else_),
        ] {
            if let Some(schema) = schema {
                map.insert(name.to_string(), schema.borrow().to_value());
            }
        }
        if let Some(s) = &self.content_encoding {
            map.insert("contentEncoding".to_string(), Value::String(s.clone()));
        }
        if let Some(s) = &self.content_media_type {
            map.insert("contentMediaType".to_string(), Value::String(s.clone()));
        }
        if let Some(value) = &self.default {
            map.insert("default".to_string(), value.to_value());
        }
        Value::Object(map)
    }
}

fn exclusive_value(e: &Exclusive) -> Value {
    match e {
        Exclusive::Bool(b) => Value::Bool(*b),
        Exclusive::Number(n) => Value::Number(n.clone()),
    }
}

thread_local! {
    static TRUE_SCHEMA: SchemaRef = Schema {
        boolean: Some(true),
        ..Schema::default()
    }
    .into_ref();
    static FALSE_SCHEMA: SchemaRef = Schema {
        boolean: Some(false),
        ..Schema::default()
    }
    .into_ref();
}

/// The process-wide boolean-schema sentinel for `true` or `false`.
pub fn boolean_schema(value: bool) -> SchemaRef {
    if value {
        TRUE_SCHEMA.with(Rc::clone)
    } else {
        FALSE_SCHEMA.with(Rc::clone)
    }
}

pub(crate) fn is_true_schema(schema: &SchemaRef) -> bool {
    schema.borrow().boolean == Some(true)
}

pub(crate) fn is_false_schema(schema: &SchemaRef) -> bool {
    schema.borrow().boolean == Some(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_sentinels_are_singletons() {
        assert!(Rc::ptr_eq(&boolean_schema(true), &boolean_schema(true)));
        assert!(Rc::ptr_eq(&boolean_schema(false), &boolean_schema(false)));
        assert!(is_true_schema(&boolean_schema(true)));
        assert!(is_false_schema(&boolean_schema(false)));
    }

    #[test]
    fn test_builder_round_trips_to_value() {
        let schema = Schema::object()
            .property("id", Schema::integer())
            .property("email", Schema::string().format("email"));
        assert_eq!(
            schema.to_value(),
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "email": {"type": "string", "format": "email"},
                }
            })
        );
    }

    #[test]
    fn test_property_mapping_translates_both_ways() {
        let mut schema = Schema::object();
        schema.add_property_mapping("user_name", "userName");
        assert_eq!(schema.member_name(DEFAULT_MAPPING, "user_name"), "userName");
        assert_eq!(schema.data_name(DEFAULT_MAPPING, "userName"), "user_name");
        assert_eq!(schema.member_name(DEFAULT_MAPPING, "other"), "other");
    }

    #[test]
    fn test_from_ref_path_lists_outermost_first() {
        let mut schema = Schema::string();
        schema.from_refs = vec!["#/d".into(), "#/c".into(), "#/b".into(), "#/a".into()];
        assert_eq!(
            schema.from_ref_path(),
            "->$ref[#/a]->$ref[#/b]->$ref[#/c]->$ref[#/d]"
        );
    }
}
