//! The prebuilt draft meta-schema
//!
//! References to the well-known draft URIs resolve to this singleton instead
//! of going through the remote provider, so schema documents that declare
//! `{"$ref": "http://json-schema.org/draft-07/schema#"}` members validate
//! without network access. The graph is self-referential (`items`,
//! `properties`, the combinators all point back at the root), built once per
//! thread.

use std::rc::Rc;

use serde_json::Number;

use crate::schema::{Items, Schema, SchemaRef, SchemaType};
use crate::value::Node;

thread_local! {
    static META: SchemaRef = build();
}

/// The draft-07 meta-schema singleton.
pub fn meta_schema() -> SchemaRef {
    META.with(Rc::clone)
}

fn any() -> SchemaRef {
    crate::schema::boolean_schema(true)
}

fn simple_types() -> Schema {
    let mut s = Schema::new();
    s.enum_ = Some(
        ["array", "boolean", "integer", "null", "number", "object", "string"]
            .into_iter()
            .map(|name| Node::String(name.to_string()))
            .collect(),
    );
    s
}

fn non_negative_integer() -> Schema {
    let mut s = Schema::integer();
    s.minimum = Some(Number::from(0u64));
    s
}

fn string_array() -> Schema {
    let mut s = Schema::array();
    s.items = Some(Items::Single(Schema::string().into_ref()));
    s.unique_items = true;
    s.default = Some(Node::Array(Vec::new()));
    s
}

fn schema_array(root: &SchemaRef) -> Schema {
    let mut s = Schema::array();
    s.min_items = Some(1);
    s.items = Some(Items::Single(root.clone()));
    s
}

fn schema_map(root: &SchemaRef) -> Schema {
    let mut s = Schema::object();
    s.additional_properties = Some(root.clone());
    s
}

fn build() -> SchemaRef {
    let root = Schema::new().into_ref();

    let mut meta = Schema::new();
    meta.type_ = Some(vec![SchemaType::Object, SchemaType::Boolean]);
    meta.default = Some(Node::Bool(true));

    meta = meta
        .property("$id", Schema::string().format("uri-reference"))
        .property("$schema", Schema::string().format("uri"))
        .property("$ref", Schema::string().format("uri-reference"))
        .property("$comment", Schema::string())
        .property("title", Schema::string())
        .property("description", Schema::string());

    {
        let mut multiple_of = Schema::number();
        multiple_of.exclusive_minimum =
            Some(crate::schema::Exclusive::Number(Number::from(0u64)));
        meta = meta.property("multipleOf", multiple_of);
    }
    meta = meta
        .property("maximum", Schema::number())
        .property("exclusiveMaximum", Schema::number())
        .property("minimum", Schema::number())
        .property("exclusiveMinimum", Schema::number())
        .property("maxLength", non_negative_integer())
        .property("minLength", non_negative_integer())
        .property("pattern", Schema::string().format("regex"))
        .property("maxItems", non_negative_integer())
        .property("minItems", non_negative_integer())
        .property("maxProperties", non_negative_integer())
        .property("minProperties", non_negative_integer())
        .property("required", string_array())
        .property("format", Schema::string())
        .property("contentMediaType", Schema::string())
        .property("contentEncoding", Schema::string());

    {
        let mut unique = Schema::boolean();
        unique.default = Some(Node::Bool(false));
        meta = meta.property("uniqueItems", unique);
    }
    {
        let mut enum_keyword = Schema::array();
        enum_keyword.items = Some(Items::Single(any()));
        meta = meta.property("enum", enum_keyword);
    }
    {
        let mut type_keyword = Schema::new();
        let mut type_list = Schema::array();
        type_list.items = Some(Items::Single(simple_types().into_ref()));
        type_list.min_items = Some(1);
        type_list.unique_items = true;
        type_keyword.any_of = Some(vec![simple_types().into_ref(), type_list.into_ref()]);
        meta = meta.property("type", type_keyword);
    }
    {
        let mut items_keyword = Schema::new();
        items_keyword.any_of = Some(vec![root.clone(), schema_array(&root).into_ref()]);
        items_keyword.default = Some(Node::Bool(true));
        meta = meta.property("items", items_keyword);
    }
    {
        let mut dependency = Schema::new();
        dependency.any_of = Some(vec![root.clone(), string_array().into_ref()]);
        let mut dependencies = Schema::object();
        dependencies.additional_properties = Some(dependency.into_ref());
        meta = meta.property("dependencies", dependencies);
    }
    {
        let mut patterns = schema_map(&root);
        patterns.property_names = Some(Schema::string().format("regex").into_ref());
        meta = meta.property("patternProperties", patterns);
    }

    for name in ["default", "const"] {
        meta.properties
            .get_or_insert_with(Default::default)
            .items
            .insert(name, any());
    }

    for name in ["additionalItems", "contains", "additionalProperties", "propertyNames", "if", "then", "else", "not"] {
        meta.properties
            .get_or_insert_with(Default::default)
            .items
            .insert(name, root.clone());
    }
    meta = meta
        .property("definitions", schema_map(&root))
        .property("properties", schema_map(&root));
    for name in ["allOf", "anyOf", "oneOf"] {
        meta.properties
            .get_or_insert_with(Default::default)
            .items
            .insert(name, schema_array(&root).into_ref());
    }

    *root.borrow_mut() = meta;
    root
}
