//! Typed-object export: circular-reference detection and `$ref`
//! reconstruction with deduplicated root-level definitions.

use crate::context::Context;
use crate::error::InvalidValue;
use crate::path;
use crate::schema::{SchemaRef, PROP_REF};
use crate::structure::{object_key, ObjectRef};
use crate::value::{Node, OrderedMap};

fn ref_node(target: String) -> Node {
    let mut map = OrderedMap::new();
    map.insert(PROP_REF, Node::String(target));
    Node::Map(map)
}

fn is_external(reference: &str) -> bool {
    reference.contains("://")
}

/// Short-circuit an object export to a `$ref` pointer where possible.
///
/// Returns `Some(node)` when the object collapses to a pointer (recorded ref
/// chain, or an instance seen earlier in this run). Returns `None` when the
/// caller should serialize the object; the instance is then registered in the
/// visited map under its current path.
pub(crate) fn export_object(
    schema: &SchemaRef,
    object: &ObjectRef,
    ctx: &mut Context,
) -> Result<Option<Node>, InvalidValue> {
    if ctx.is_ref {
        // This call is the staged export of a definition body.
        ctx.is_ref = false;
    } else if !ctx.is_root() {
        let refs: Vec<String> = object.borrow().from_refs().to_vec();
        if !refs.is_empty() {
            stage_definitions(schema, object, &refs, ctx)?;
            return Ok(Some(ref_node(refs.last().cloned().unwrap_or_default())));
        }
    }

    let key = object_key(object);
    let first_seen = ctx.shared.visited.borrow().get(&key).cloned();
    if let Some(first_path) = first_seen {
        // Second encounter of the same instance: degrade to a pointer at its
        // first-seen location.
        let pointer = path::data_pointer(&first_path);
        return Ok(Some(ref_node(format!("#{pointer}"))));
    }
    ctx.shared
        .visited
        .borrow_mut()
        .insert(key, ctx.path.clone());
    Ok(None)
}

/// Stage the ref chain for root placement: the innermost ref carries the full
/// export, each outer ref points one step inward. Entries are deduplicated by
/// target; absolute external URIs are never materialized locally.
fn stage_definitions(
    schema: &SchemaRef,
    object: &ObjectRef,
    refs: &[String],
    ctx: &mut Context,
) -> Result<(), InvalidValue> {
    let innermost = &refs[0];
    let staged = ctx
        .shared
        .exported_definitions
        .borrow()
        .contains_key(innermost);
    if !is_external(innermost) && !staged {
        // Placeholder first: the body export below may re-enter this chain.
        ctx.shared
            .exported_definitions
            .borrow_mut()
            .insert(innermost.clone(), None);
        let mut body_ctx = ctx.clone();
        body_ctx.is_ref = true;
        body_ctx.result = None;
        let exported =
            crate::engine::process(schema, &Node::Object(object.clone()), &mut body_ctx)?;
        ctx.shared
            .exported_definitions
            .borrow_mut()
            .insert(innermost.clone(), Some(exported));
    }
    for window in refs.windows(2) {
        let (inner, outer) = (&window[0], &window[1]);
        let staged = ctx.shared.exported_definitions.borrow().contains_key(outer);
        if !is_external(outer) && !staged {
            ctx.shared
                .exported_definitions
                .borrow_mut()
                .insert(outer.clone(), Some(ref_node(inner.clone())));
        }
    }
    Ok(())
}
