//! Object keyword evaluation, property dispatch and marshalling.
//!
//! Per-member dispatch precedence: dependency checks, exact `properties`
//! match, nested-property declarations, every matching `patternProperties`
//! expression, then `additionalProperties`. Data-level `$ref` members are
//! dereferenced here, with the reference cache providing cycle safety and
//! shared-substructure dedup.

use std::collections::HashSet;
use std::rc::Rc;

use crate::context::{Context, ScopeGuard};
use crate::engine::process;
use crate::error::{ErrorKind, InvalidValue, ObjectViolation};
use crate::path::escape_pattern;
use crate::resolver::Imported;
use crate::schema::{
    is_false_schema, Dependency, NestedDecl, SchemaRef, PROP_ID, PROP_ID_D4, PROP_REF,
};
use crate::value::{Node, OrderedMap};

pub(crate) fn process_object(
    schema_ref: &SchemaRef,
    data: &Node,
    ctx: &mut Context,
) -> Result<Node, InvalidValue> {
    let schema = schema_ref.borrow();
    let Node::Map(data_map) = data else {
        return Ok(ctx.result.take().unwrap_or_else(|| data.clone()));
    };
    let import = ctx.import;

    if !ctx.skip_validation {
        if let Some(required) = &schema.required {
            for member in required {
                let key = if import {
                    schema.data_name(&ctx.mapping, member)
                } else {
                    schema.member_name(&ctx.mapping, member)
                };
                if !data_map.contains_key(key) {
                    return Err(InvalidValue::new(
                        ErrorKind::Object(ObjectViolation::Required),
                        format!(
                            "Required property missing: {key}, data: {}",
                            data.to_json_string()
                        ),
                    )
                    .at(&ctx.path));
                }
            }
        }
    }

    // Construct the destination. A seeded object result (reference dedup)
    // is reused rather than replaced.
    if import && !ctx.validate_only {
        if schema.use_object_as_array {
            ctx.result = Some(Node::Map(OrderedMap::new()));
        } else if !matches!(ctx.result, Some(Node::Object(_))) {
            let binding = ctx.resolve_binding(schema.binding.as_deref());
            let destination = ctx.object_factory.instantiate(binding);
            destination.borrow_mut().set_document_path(ctx.path.clone());
            ctx.result = Some(Node::Object(destination));
        }
    } else if !import {
        ctx.result = Some(Node::Map(OrderedMap::new()));
    }

    // Declared identifiers open a nested resolution scope for this subtree;
    // the guards restore the previous scope on every exit path.
    let mut _scopes: Vec<ScopeGuard> = Vec::new();
    if import {
        if ctx.version.accepts_plain_id() {
            if let Some(Node::String(id)) = data_map.get(PROP_ID_D4) {
                _scopes.push(ctx.push_scope(id));
            }
        }
        if ctx.version.accepts_dollar_id() {
            if let Some(Node::String(id)) = data_map.get(PROP_ID) {
                _scopes.push(ctx.push_scope(id));
            }
        }
    }

    if import {
        if let Some(Node::String(reference)) = data_map.get(PROP_REF) {
            // A literal `$ref` property declaration that is not a
            // uri-reference shadows dereferencing.
            let declared = schema.properties.as_ref().and_then(|props| {
                props
                    .get(PROP_REF)
                    .or_else(|| props.get(schema.member_name(&ctx.mapping, PROP_REF)))
            });
            let dereference = match declared {
                Some(property) => {
                    property.borrow().format.as_deref() == Some("uri-reference")
                }
                None => true,
            };
            if dereference {
                let reference = reference.clone();
                drop(schema);
                return import_reference(schema_ref, &reference, ctx)
                    .map_err(|e| e.at(&ctx.path));
            }
        }
    }
    drop(schema);
    process_members(schema_ref, data, ctx)
}

/// Dereference a data-level `$ref`: the current node *is* the node at the
/// target, processed against the same schema. The reference cache publishes
/// the under-construction destination before descending, which is what makes
/// cycles converge on a single shared instance and repeated targets import
/// once.
fn import_reference(
    schema_ref: &SchemaRef,
    reference_string: &str,
    ctx: &mut Context,
) -> Result<Node, InvalidValue> {
    let _guard = ctx.hold_scope();
    let reference = ctx
        .with_resolver(|r| r.resolve_reference(reference_string))
        .map_err(|e| InvalidValue::new(ErrorKind::Invalid, e.to_string()))?;
    let target = crate::compile::unbool_schema_data(reference.data().clone());
    let target_node = Node::from_value(&target);
    let fragment = format!("->$ref[{reference_string}]");

    if ctx.validate_only {
        let mut child = ctx.child(&fragment);
        return process(schema_ref, &target_node, &mut child);
    }

    if let Some(Imported::Data(cached)) = reference.imported() {
        return Ok(cached);
    }

    // Publish the destination for in-flight cycles when both sides are
    // object-shaped; the descent below fills that same instance.
    let seeded = match (&ctx.result, &target_node) {
        (Some(Node::Object(destination)), Node::Map(_)) => {
            reference.set_imported(Imported::Data(Node::Object(destination.clone())));
            Some(destination.clone())
        }
        _ => None,
    };

    let mut child = ctx.child(&fragment);
    if let Some(destination) = &seeded {
        child.result = Some(Node::Object(destination.clone()));
    }
    match process(schema_ref, &target_node, &mut child) {
        Ok(result) => {
            let result = match &result {
                Node::Object(imported) => {
                    let same_instance = seeded
                        .as_ref()
                        .is_some_and(|destination| Rc::ptr_eq(imported, destination));
                    if same_instance {
                        imported
                            .borrow_mut()
                            .set_from_ref(reference_string.to_string());
                        result.clone()
                    } else {
                        // A transform replaced the destination: extend the
                        // chain on a copy so the cached instance keeps its
                        // own provenance, then cache the final result.
                        let carrier = if imported.borrow().from_refs().is_empty() {
                            imported.clone()
                        } else {
                            imported.borrow().clone_object()
                        };
                        carrier
                            .borrow_mut()
                            .set_from_ref(reference_string.to_string());
                        let node = Node::Object(carrier);
                        reference.set_imported(Imported::Data(node.clone()));
                        node
                    }
                }
                _ => {
                    reference.set_imported(Imported::Data(result.clone()));
                    result
                }
            };
            Ok(result)
        }
        Err(error) => {
            reference.clear_imported();
            Err(error)
        }
    }
}

fn process_members(
    schema_ref: &SchemaRef,
    data: &Node,
    ctx: &mut Context,
) -> Result<Node, InvalidValue> {
    let schema = schema_ref.borrow();
    let Node::Map(data_map) = data else {
        return Ok(ctx.result.take().unwrap_or_else(|| data.clone()));
    };
    let import = ctx.import;

    // Working entries, keys run through the active property-name mapping.
    let mut entries: OrderedMap<Node> = OrderedMap::new();
    for (key, value) in data_map.iter() {
        let mapped = if import {
            schema.member_name(&ctx.mapping, key)
        } else {
            schema.data_name(&ctx.mapping, key)
        };
        entries.insert(mapped, value.clone());
    }

    if !ctx.skip_validation {
        if let Some(min) = schema.min_properties {
            if (entries.len() as u64) < min {
                return Err(InvalidValue::new(
                    ErrorKind::Object(ObjectViolation::TooFewProperties),
                    "Not enough properties",
                )
                .at(&ctx.path));
            }
        }
        if let Some(max) = schema.max_properties {
            if (entries.len() as u64) > max {
                return Err(InvalidValue::new(
                    ErrorKind::Object(ObjectViolation::TooManyProperties),
                    "Too many properties",
                )
                .at(&ctx.path));
            }
        }
        if let Some(names_schema) = &schema.property_names {
            for key in entries.keys() {
                let mut child = ctx.child(&format!("->propertyNames:{key}"));
                process(names_schema, &Node::String(key.clone()), &mut child)?;
            }
        }
    }

    // Substitute declared defaults for missing members. The substituted
    // value still runs through its property schema, but without further
    // validation or recursive defaults.
    let mut default_applied: HashSet<String> = HashSet::new();
    if import && !ctx.validate_only && ctx.apply_defaults {
        if let Some(props) = &schema.properties {
            for (name, property) in props.items.iter() {
                let default = property.borrow().default.clone();
                if let Some(default) = default {
                    if !entries.contains_key(name) {
                        default_applied.insert(name.clone());
                        entries.insert(name.clone(), default);
                    }
                }
            }
        }
    }

    let mut result = ctx.result.take();
    if result.is_none() {
        // Validate-only runs operate on a copy of the data.
        result = Some(data.clone());
    }

    for (key, value) in entries {
        if key.is_empty() && ctx.reject_empty_property_names {
            return Err(InvalidValue::new(ErrorKind::Invalid, "Empty property name").at(&ctx.path));
        }

        if !ctx.skip_validation {
            if let Some(dep) = schema.dependencies.as_ref().and_then(|deps| deps.get(&key)) {
                match dep {
                    Dependency::Schema(dep_schema) => {
                        let mut child = ctx.child(&format!("->dependencies:{key}"));
                        process(dep_schema, data, &mut child)?;
                    }
                    Dependency::Keys(names) => {
                        for name in names {
                            if !data_map.contains_key(name) {
                                return Err(InvalidValue::new(
                                    ErrorKind::Object(ObjectViolation::DependencyMissing),
                                    format!("Dependency property missing: {name}"),
                                )
                                .at(&ctx.path));
                            }
                        }
                    }
                }
            }
        }

        let mut value = value;
        let mut found = false;
        let mut property_found = false;

        if let Some(property) = schema.properties.as_ref().and_then(|p| p.get(&key)) {
            property_found = true;
            found = true;
            let mut child = ctx.child(&format!("->properties:{key}"));
            if default_applied.contains(&key) {
                child.skip_validation = true;
                child.apply_defaults = false;
            }
            value = process(property, &value, &mut child)?;
        }

        let nested: Option<Vec<NestedDecl>> = schema
            .properties
            .as_ref()
            .and_then(|p| p.nested.get(&key))
            .cloned();
        if let Some(declarations) = &nested {
            found = true;
            let mut child = ctx.child(&format!("->nestedProperties:{key}"));
            value = process(&declarations[0].schema, &value, &mut child)?;
        }

        if let Some(patterns) = &schema.pattern_properties {
            for (pattern, pattern_schema) in patterns.iter() {
                let regex = ctx.compiled_regex(pattern).map_err(|e| e.at(&ctx.path))?;
                if regex.is_match(&key) {
                    found = true;
                    let mut child = ctx.child(&format!(
                        "->patternProperties[{}]:{key}",
                        escape_pattern(pattern)
                    ));
                    value = process(pattern_schema, &value, &mut child)?;
                    if import && !ctx.validate_only {
                        if let Some(Node::Object(destination)) = &result {
                            destination
                                .borrow_mut()
                                .add_pattern_property_name(pattern, &key);
                        }
                    }
                }
            }
        }

        if !found {
            if let Some(additional) = &schema.additional_properties {
                if is_false_schema(additional) {
                    if !ctx.skip_validation {
                        return Err(InvalidValue::new(
                            ErrorKind::Object(ObjectViolation::AdditionalNotAllowed),
                            format!("Additional properties not allowed: {key}"),
                        )
                        .at(&ctx.path));
                    }
                } else {
                    let mut child = ctx.child(&format!("->additionalProperties:{key}"));
                    value = process(additional, &value, &mut child)?;
                }
                if import && !schema.use_object_as_array && !ctx.validate_only {
                    if let Some(Node::Object(destination)) = &result {
                        destination.borrow_mut().add_additional_property_name(&key);
                    }
                }
            }
        }

        // Assignment. Nested declarations route through the nested member
        // path first; an exact property match layers the flat member on top.
        if import && !ctx.validate_only && nested.is_some() {
            if let Some(Node::Object(destination)) = &result {
                for declaration in nested.as_deref().unwrap_or_default() {
                    destination.borrow_mut().set_nested_member(
                        &declaration.member,
                        &key,
                        value.clone(),
                    );
                }
                if property_found {
                    destination.borrow_mut().set_member(&key, value.clone());
                }
            }
        } else {
            match &mut result {
                Some(Node::Object(destination)) => {
                    let assign =
                        found || !import || !destination.borrow().has_member(&key);
                    if assign {
                        destination.borrow_mut().set_member(&key, value);
                    }
                }
                Some(Node::Map(map)) => {
                    if found || !import || !map.contains_key(&key) {
                        map.insert(key.clone(), value);
                    }
                }
                _ => {}
            }
        }
    }

    Ok(result.unwrap_or_else(|| data.clone()))
}
