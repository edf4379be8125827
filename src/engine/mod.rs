//! The schema evaluation engine
//!
//! One recursive orchestrator drives both directions. The step order is
//! fixed: typed-object export handling, originating-ref path fragments, the
//! pre-processing hook, keyword checks (type → enum → const → not → string →
//! numeric → if/then/else), combinators (oneOf → anyOf → allOf), object and
//! array structural evaluation, then content decoding. Keyword checks are
//! skipped under skip-validation; structural recursion still happens so
//! marshalling survives.

pub(crate) mod array;
pub(crate) mod combinator;
pub(crate) mod export;
pub(crate) mod object;
pub(crate) mod scalar;

use std::borrow::Cow;

use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::error::{ErrorKind, InvalidValue};
use crate::path::{pointer_add, split_pointer};
use crate::schema::SchemaRef;
use crate::value::{Node, OrderedMap};

/// Apply one schema node to one value. Single entry point for both
/// directions; recursion re-enters here for every sub-schema.
pub(crate) fn process(
    schema_ref: &SchemaRef,
    data: &Node,
    ctx: &mut Context,
) -> Result<Node, InvalidValue> {
    // Boolean sentinels short-circuit before any keyword is read.
    if let Some(accepts) = schema_ref.borrow().boolean {
        if !accepts && !ctx.skip_validation {
            return Err(
                InvalidValue::new(ErrorKind::Logic, "Denied by false schema").at(&ctx.path)
            );
        }
        return Ok(ctx.result.take().unwrap_or_else(|| data.clone()));
    }

    let mut data = Cow::Borrowed(data);

    // Export: collapse ref chains and revisited instances to `$ref`
    // pointers, otherwise serialize the object and continue on its members.
    if !ctx.import {
        if let Node::Object(obj) = &*data {
            let obj = obj.clone();
            if let Some(short) = export::export_object(schema_ref, &obj, ctx)? {
                return Ok(short);
            }
            data = Cow::Owned(obj.borrow().serialize());
        }
    }

    // This node's originating-ref fragments join the processing path.
    let ref_fragments = schema_ref.borrow().from_ref_path();
    ctx.path.push_str(&ref_fragments);

    if let Some(hook) = ctx.pre_processor.clone() {
        let replaced = hook.process(&data, &schema_ref.borrow(), ctx.import);
        data = Cow::Owned(replaced);
    }

    let schema = schema_ref.borrow();

    if !ctx.skip_validation {
        if let Some(coerced) = scalar::check_type(&schema, &data, ctx)? {
            ctx.result = Some(coerced.clone());
            data = Cow::Owned(coerced);
        }
        scalar::check_enum(&schema, &data, ctx)?;
        scalar::check_const(&schema, &data, ctx)?;
        if let Some(not) = &schema.not {
            combinator::process_not(not, &data, ctx)?;
        }
        if let Node::String(s) = &*data {
            scalar::check_string(&schema, s, ctx)?;
        }
        if let Node::Number(n) = &*data {
            scalar::check_numeric(&schema, n, ctx)?;
        }
        if let Some(result) = combinator::process_if(&schema, &data, ctx)? {
            ctx.result = Some(result);
        }
    }

    if let Some(arms) = schema.one_of.clone() {
        let result = combinator::process_one_of(&arms, &data, ctx)?;
        ctx.result = Some(result);
    }
    if let Some(arms) = schema.any_of.clone() {
        let result = combinator::process_any_of(&arms, &data, ctx)?;
        ctx.result = Some(result);
    }
    if let Some(arms) = schema.all_of.clone() {
        let result = combinator::process_all_of(&arms, &data, ctx)?;
        ctx.result = Some(result);
    }

    let has_content = schema.content_encoding.is_some() || schema.content_media_type.is_some();
    drop(schema);

    if data.is_map() {
        let result = object::process_object(schema_ref, &data, ctx)?;
        ctx.result = Some(result);
    }
    if data.is_array() {
        let schema = schema_ref.borrow();
        let result = array::process_array(&schema, &data, ctx)?;
        ctx.result = Some(result);
    }

    if has_content {
        let schema = schema_ref.borrow();
        let encoding = schema.content_encoding.as_deref();
        let media_type = schema.content_media_type.as_deref();
        if ctx.unpack_content {
            let processed = ctx
                .content_codec
                .process(encoding, media_type, &data, ctx.import)
                .map_err(|e| e.at(&ctx.path))?;
            ctx.result = Some(processed);
        } else {
            ctx.content_codec
                .process(encoding, media_type, &data, true)
                .map_err(|e| e.at(&ctx.path))?;
        }
    }

    Ok(ctx.result.take().unwrap_or_else(|| data.into_owned()))
}

/// The public evaluation surface of a compiled schema.
pub trait SchemaContract {
    /// Apply this schema to a value inside an existing context.
    fn process(&self, data: &Node, ctx: &mut Context) -> Result<Node, InvalidValue>;

    /// Decode generic data into a typed value graph, validating on the way.
    fn import_data(&self, data: &Value, ctx: &mut Context) -> Result<Node, InvalidValue>;

    /// Encode a value graph back to generic data, reinserting `$ref`
    /// indirection for shared and cyclic substructures.
    fn export_data(&self, data: &Node, ctx: &mut Context) -> Result<Value, InvalidValue>;

    /// Validation-only convenience: no destination objects are built.
    fn validate(&self, data: &Value) -> Result<(), InvalidValue>;

    fn default_value(&self) -> Option<Node>;
    fn property_names(&self) -> Vec<String>;
    fn nested_property_names(&self) -> Vec<String>;
}

impl SchemaContract for SchemaRef {
    fn process(&self, data: &Node, ctx: &mut Context) -> Result<Node, InvalidValue> {
        process(self, data, ctx)
    }

    fn import_data(&self, data: &Value, ctx: &mut Context) -> Result<Node, InvalidValue> {
        debug!("importing data");
        ctx.import = true;
        ctx.result = None;
        ctx.path = "#".to_string();
        ctx.root_resolver(data.clone());
        let version = ctx.version;
        ctx.with_resolver(|r| r.pre_process_references(data, version));
        let node = Node::from_value(data);
        process(self, &node, ctx)
    }

    fn export_data(&self, data: &Node, ctx: &mut Context) -> Result<Value, InvalidValue> {
        debug!("exporting data");
        ctx.import = false;
        ctx.result = None;
        ctx.is_ref = false;
        ctx.path = "#".to_string();
        ctx.shared.visited.borrow_mut().clear();
        *ctx.shared.exported_definitions.borrow_mut() = OrderedMap::new();

        let mut result = process(self, data, ctx)?;

        // Merge the staged definitions into the root result.
        let definitions = std::mem::take(&mut *ctx.shared.exported_definitions.borrow_mut());
        for (reference, definition) in definitions {
            if let Some(definition) = definition {
                let segments = split_pointer(&reference);
                if !segments.is_empty() {
                    pointer_add(&mut result, &segments, definition);
                }
            }
        }
        Ok(result.to_value())
    }

    fn validate(&self, data: &Value) -> Result<(), InvalidValue> {
        let mut ctx = Context::new();
        ctx.validate_only = true;
        self.import_data(data, &mut ctx).map(|_| ())
    }

    fn default_value(&self) -> Option<Node> {
        self.borrow().default.clone()
    }

    fn property_names(&self) -> Vec<String> {
        self.borrow().property_names()
    }

    fn nested_property_names(&self) -> Vec<String> {
        self.borrow().nested_property_names()
    }
}
