//! Schema-document compilation
//!
//! Turns a generic data tree into a [`Schema`] graph. References are
//! dereferenced eagerly with a per-session imported cache: a placeholder node
//! is published before descending into the target, so reference cycles
//! compile into genuinely cyclic graphs, and every node remembers the ref
//! chain it was imported through. `$id`/`id` members open nested resolution
//! scopes, restored on every exit path. The three well-known draft meta
//! URIs short-circuit to the prebuilt meta-schema.

use serde_json::{Map as JsonMap, Number, Value};
use tracing::debug;

use crate::context::Context;
use crate::error::{Result, SchemaError};
use crate::resolver::Imported;
use crate::schema::{
    boolean_schema, Dependency, Items, Properties, Schema, SchemaRef, SchemaType, Version,
    PROP_ID, PROP_ID_D4, PROP_REF,
};
use crate::value::{Node, OrderedMap};

const META_URIS: [&str; 3] = [
    "http://json-schema.org/draft-04/schema",
    "http://json-schema.org/draft-06/schema",
    "http://json-schema.org/draft-07/schema",
];

impl Schema {
    /// Compile a schema document.
    pub fn import(data: &Value) -> Result<SchemaRef> {
        let mut ctx = Context::new();
        Schema::import_with(data, &mut ctx)
    }

    /// Compile a schema document inside an existing context (shared
    /// resolver session, pinned draft version, remote provider).
    pub fn import_with(data: &Value, ctx: &mut Context) -> Result<SchemaRef> {
        debug!("compiling schema document");
        ctx.root_resolver(data.clone());
        let version = ctx.version;
        ctx.with_resolver(|r| r.pre_process_references(data, version));

        if let Value::Object(map) = data {
            if let Some(Value::String(uri)) = map.get("$schema") {
                if let Some(version) = Version::from_schema_uri(uri) {
                    ctx.version = version;
                }
            }
        }

        let root = compile(data, "#", ctx)?;
        root.borrow_mut().source = Some(std::rc::Rc::new(data.clone()));
        Ok(root)
    }
}

/// Compile a fragment of a larger document (failing-sub-schema resolution).
pub(crate) fn compile_fragment(root: &Value, fragment: &Value) -> Result<SchemaRef> {
    let mut ctx = Context::new();
    ctx.root_resolver(root.clone());
    let version = ctx.version;
    ctx.with_resolver(|r| r.pre_process_references(root, version));
    compile(fragment, "#", &mut ctx)
}

/// Boolean schemas in data form: `true` is the empty (accept-all) document,
/// `false` rejects through `not`.
pub(crate) fn unbool_schema_data(value: Value) -> Value {
    match value {
        Value::Bool(true) => Value::Object(JsonMap::new()),
        Value::Bool(false) => serde_json::json!({"not": {}}),
        other => other,
    }
}

fn compile(data: &Value, path: &str, ctx: &mut Context) -> Result<SchemaRef> {
    match data {
        Value::Bool(accepts) => Ok(boolean_schema(*accepts)),
        // A bare string document is shorthand for a reference.
        Value::String(reference) => compile_ref(reference, path, ctx),
        Value::Object(map) => compile_map(map, path, ctx),
        _ => Err(SchemaError::invalid(
            path,
            "a schema must be an object, a boolean or a reference string",
        )),
    }
}

fn compile_ref(reference: &str, path: &str, ctx: &mut Context) -> Result<SchemaRef> {
    if META_URIS.contains(&reference.trim_end_matches('#')) {
        return Ok(crate::meta::meta_schema());
    }
    let _guard = ctx.hold_scope();
    let resolved = ctx.with_resolver(|r| r.resolve_reference(reference))?;
    if let Some(Imported::Schema(cached)) = resolved.imported() {
        return Ok(cached);
    }

    // Publish a placeholder before descending; cyclic referrers share it and
    // the fill below lands in the same allocation.
    let placeholder = Schema::new().into_ref();
    resolved.set_imported(Imported::Schema(placeholder.clone()));
    let target = unbool_schema_data(resolved.data().clone());
    match compile(&target, &format!("{path}/$ref({reference})"), ctx) {
        Ok(compiled) => {
            let mut filled = compiled.borrow().clone();
            filled.from_refs.push(reference.to_string());
            *placeholder.borrow_mut() = filled;
            Ok(placeholder)
        }
        Err(error) => {
            resolved.clear_imported();
            Err(error)
        }
    }
}

fn compile_map(map: &JsonMap<String, Value>, path: &str, ctx: &mut Context) -> Result<SchemaRef> {
    let mut _scopes = Vec::new();
    if ctx.version.accepts_plain_id() {
        if let Some(Value::String(id)) = map.get(PROP_ID_D4) {
            _scopes.push(ctx.push_scope(id));
        }
    }
    if ctx.version.accepts_dollar_id() {
        if let Some(Value::String(id)) = map.get(PROP_ID) {
            _scopes.push(ctx.push_scope(id));
        }
    }

    // A reference replaces the node entirely; sibling keywords are ignored.
    if let Some(Value::String(reference)) = map.get(PROP_REF) {
        return compile_ref(reference, path, ctx);
    }

    let mut schema = Schema::new();
    for (keyword, value) in map {
        let at = format!("{path}/{keyword}");
        match keyword.as_str() {
            "type" => schema.type_ = Some(parse_types(value, &at)?),
            "enum" => {
                let Value::Array(items) = value else {
                    return Err(SchemaError::invalid(&at, "enum must be an array"));
                };
                schema.enum_ = Some(items.iter().map(Node::from_value).collect());
            }
            "const" => schema.const_ = Some(Node::from_value(value)),
            "multipleOf" => schema.multiple_of = Some(expect_number(value, &at)?),
            "maximum" => schema.maximum = Some(expect_number(value, &at)?),
            "minimum" => schema.minimum = Some(expect_number(value, &at)?),
            "exclusiveMaximum" => schema.exclusive_maximum = Some(parse_exclusive(value, &at)?),
            "exclusiveMinimum" => schema.exclusive_minimum = Some(parse_exclusive(value, &at)?),
            "maxLength" => schema.max_length = Some(expect_u64(value, &at)?),
            "minLength" => schema.min_length = Some(expect_u64(value, &at)?),
            "pattern" => schema.pattern = Some(expect_string(value, &at)?),
            "format" => schema.format = Some(expect_string(value, &at)?),
            "items" => {
                schema.items = Some(match value {
                    Value::Array(list) => {
                        let mut compiled = Vec::with_capacity(list.len());
                        for (index, item) in list.iter().enumerate() {
                            compiled.push(compile(item, &format!("{at}/{index}"), ctx)?);
                        }
                        Items::List(compiled)
                    }
                    single => Items::Single(compile(single, &at, ctx)?),
                });
            }
            "additionalItems" => schema.additional_items = Some(compile(value, &at, ctx)?),
            "maxItems" => schema.max_items = Some(expect_u64(value, &at)?),
            "minItems" => schema.min_items = Some(expect_u64(value, &at)?),
            "uniqueItems" => {
                let Value::Bool(unique) = value else {
                    return Err(SchemaError::invalid(&at, "uniqueItems must be a boolean"));
                };
                schema.unique_items = *unique;
            }
            "contains" => schema.contains = Some(compile(value, &at, ctx)?),
            "maxProperties" => schema.max_properties = Some(expect_u64(value, &at)?),
            "minProperties" => schema.min_properties = Some(expect_u64(value, &at)?),
            "required" => schema.required = Some(expect_string_array(value, &at)?),
            "properties" => {
                let Value::Object(entries) = value else {
                    return Err(SchemaError::invalid(&at, "properties must be an object"));
                };
                let mut properties = Properties::default();
                for (name, sub) in entries {
                    let compiled = compile(sub, &format!("{at}/{name}"), ctx)?;
                    properties.items.insert(name.clone(), compiled);
                }
                schema.properties = Some(properties);
            }
            "patternProperties" => {
                let Value::Object(entries) = value else {
                    return Err(SchemaError::invalid(&at, "patternProperties must be an object"));
                };
                let mut patterns = OrderedMap::new();
                for (pattern, sub) in entries {
                    let compiled = compile(sub, &format!("{at}/{pattern}"), ctx)?;
                    patterns.insert(pattern.clone(), compiled);
                }
                schema.pattern_properties = Some(patterns);
            }
            "additionalProperties" => {
                schema.additional_properties = Some(compile(value, &at, ctx)?)
            }
            "propertyNames" => schema.property_names = Some(compile(value, &at, ctx)?),
            "dependencies" => {
                let Value::Object(entries) = value else {
                    return Err(SchemaError::invalid(&at, "dependencies must be an object"));
                };
                let mut dependencies = OrderedMap::new();
                for (name, sub) in entries {
                    let dependency = match sub {
                        Value::Array(_) => Dependency::Keys(expect_string_array(
                            sub,
                            &format!("{at}/{name}"),
                        )?),
                        other => Dependency::Schema(compile(other, &format!("{at}/{name}"), ctx)?),
                    };
                    dependencies.insert(name.clone(), dependency);
                }
                schema.dependencies = Some(dependencies);
            }
            "allOf" => schema.all_of = Some(compile_list(value, &at, ctx)?),
            "anyOf" => schema.any_of = Some(compile_list(value, &at, ctx)?),
            "oneOf" => schema.one_of = Some(compile_list(value, &at, ctx)?),
            "not" => schema.not = Some(compile(value, &at, ctx)?),
            "if" => schema.if_ = Some(compile(value, &at, ctx)?),
            "then" => schema.then_ = Some(compile(value, &at, ctx)?),
            "else" => schema.else_ = Some(compile(value, &at, ctx)?),
            "contentEncoding" => schema.content_encoding = Some(expect_string(value, &at)?),
            "contentMediaType" => schema.content_media_type = Some(expect_string(value, &at)?),
            "default" => schema.default = Some(Node::from_value(value)),
            // Unknown members stay addressable through the retained source
            // document; they carry no keyword semantics.
            _ => {}
        }
    }
    Ok(schema.into_ref())
}

fn compile_list(value: &Value, path: &str, ctx: &mut Context) -> Result<Vec<SchemaRef>> {
    let Value::Array(items) = value else {
        return Err(SchemaError::invalid(path, "expected an array of schemas"));
    };
    if items.is_empty() {
        return Err(SchemaError::invalid(path, "expected at least one schema"));
    }
    let mut compiled = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        compiled.push(compile(item, &format!("{path}/{index}"), ctx)?);
    }
    Ok(compiled)
}

fn parse_types(value: &Value, path: &str) -> Result<Vec<SchemaType>> {
    let parse_one = |v: &Value| -> Result<SchemaType> {
        let Value::String(name) = v else {
            return Err(SchemaError::invalid(path, "type must name a JSON type"));
        };
        SchemaType::from_name(name)
            .ok_or_else(|| SchemaError::invalid(path, format!("unknown type {name:?}")))
    };
    match value {
        Value::Array(items) if !items.is_empty() => items.iter().map(parse_one).collect(),
        Value::Array(_) => Err(SchemaError::invalid(path, "type set must not be empty")),
        single => Ok(vec![parse_one(single)?]),
    }
}

fn parse_exclusive(value: &Value, path: &str) -> Result<crate::schema::Exclusive> {
    match value {
        Value::Bool(flag) => Ok(crate::schema::Exclusive::Bool(*flag)),
        Value::Number(bound) => Ok(crate::schema::Exclusive::Number(bound.clone())),
        _ => Err(SchemaError::invalid(
            path,
            "exclusive bounds must be a boolean or a number",
        )),
    }
}

fn expect_number(value: &Value, path: &str) -> Result<Number> {
    match value {
        Value::Number(n) => Ok(n.clone()),
        _ => Err(SchemaError::invalid(path, "expected a number")),
    }
}

fn expect_u64(value: &Value, path: &str) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| SchemaError::invalid(path, "expected a non-negative integer"))
}

fn expect_string(value: &Value, path: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(SchemaError::invalid(path, "expected a string")),
    }
}

fn expect_string_array(value: &Value, path: &str) -> Result<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(SchemaError::invalid(path, "expected an array of strings"));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            _ => Err(SchemaError::invalid(path, "expected an array of strings")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_basic_keywords() {
        let schema = Schema::import(&json!({
            "type": "object",
            "required": ["a"],
            "properties": {"a": {"type": "integer", "minimum": 1}},
            "additionalProperties": false,
        }))
        .unwrap();
        let schema = schema.borrow();
        assert_eq!(schema.type_, Some(vec![SchemaType::Object]));
        assert_eq!(schema.required, Some(vec!["a".to_string()]));
        let a = schema.properties.as_ref().unwrap().get("a").unwrap();
        assert_eq!(a.borrow().minimum, Some(Number::from(1)));
        assert!(crate::schema::is_false_schema(
            schema.additional_properties.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_reference_chain_records_refs() {
        let schema = Schema::import(&json!({
            "allOf": [{"$ref": "#/a"}],
            "a": {"$ref": "#/b"},
            "b": {"type": "string"},
        }))
        .unwrap();
        let arm = schema.borrow().all_of.as_ref().unwrap()[0].clone();
        assert_eq!(
            arm.borrow().from_ref_path(),
            "->$ref[#/a]->$ref[#/b]"
        );
        assert_eq!(arm.borrow().type_, Some(vec![SchemaType::String]));
    }

    #[test]
    fn test_cyclic_references_compile_to_cyclic_graphs() {
        let schema = Schema::import(&json!({
            "properties": {"next": {"$ref": "#"}},
            "type": "object",
        }))
        .unwrap();
        let next = schema
            .borrow()
            .properties
            .as_ref()
            .unwrap()
            .get("next")
            .unwrap()
            .clone();
        // The cycle closes on the same compiled node.
        let inner = next
            .borrow()
            .properties
            .as_ref()
            .unwrap()
            .get("next")
            .unwrap()
            .clone();
        assert!(std::rc::Rc::ptr_eq(&next, &inner));
    }

    #[test]
    fn test_unresolvable_reference_fails_compilation() {
        let result = Schema::import(&json!({"$ref": "#/nowhere"}));
        assert!(matches!(result, Err(SchemaError::UnresolvedReference(_))));
    }

    #[test]
    fn test_malformed_keywords_are_schema_errors() {
        assert!(Schema::import(&json!({"minLength": "three"})).is_err());
        assert!(Schema::import(&json!({"type": "integerish"})).is_err());
        assert!(Schema::import(&json!(42)).is_err());
    }

    #[test]
    fn test_meta_uri_short_circuits_to_the_prebuilt_schema() {
        let compiled = Schema::import(&json!({"$ref": "http://json-schema.org/draft-07/schema#"}))
            .unwrap();
        assert!(std::rc::Rc::ptr_eq(&compiled, &crate::meta::meta_schema()));
    }
}
