//! Array keyword evaluation and positional item marshalling.

use crate::context::Context;
use crate::diff;
use crate::engine::process;
use crate::error::{ArrayViolation, ErrorKind, InvalidValue};
use crate::schema::{is_false_schema, Items, Schema, SchemaRef};
use crate::value::Node;

pub(crate) fn process_array(
    schema: &Schema,
    data: &Node,
    ctx: &mut Context,
) -> Result<Node, InvalidValue> {
    let Node::Array(original) = data else {
        return Ok(ctx.result.take().unwrap_or_else(|| data.clone()));
    };

    // Size bounds apply to the original element count, pre-transform.
    if !ctx.skip_validation {
        if let Some(min) = schema.min_items {
            if (original.len() as u64) < min {
                return Err(InvalidValue::new(
                    ErrorKind::Array(ArrayViolation::TooFewItems),
                    "Not enough items in array",
                )
                .at(&ctx.path));
            }
        }
        if let Some(max) = schema.max_items {
            if (original.len() as u64) > max {
                return Err(InvalidValue::new(
                    ErrorKind::Array(ArrayViolation::TooManyItems),
                    "Too many items in array",
                )
                .at(&ctx.path));
            }
        }
    }

    // `items` normalization: a single schema governs every element (overflow
    // path keeps the `items` name); a tuple validates positionally with
    // `additionalItems` governing the overflow.
    let empty: Vec<SchemaRef> = Vec::new();
    let (tuple, overflow, overflow_name): (&[SchemaRef], Option<&SchemaRef>, &str) =
        match &schema.items {
            Some(Items::Single(single)) => (empty.as_slice(), Some(single), "items"),
            Some(Items::List(list)) => (
                list.as_slice(),
                schema.additional_items.as_ref(),
                "additionalItems",
            ),
            None => (empty.as_slice(), None, "items"),
        };

    let mut items = match ctx.result.take() {
        Some(Node::Array(items)) => items,
        _ => original.clone(),
    };

    for (index, item) in items.iter_mut().enumerate() {
        if let Some(item_schema) = tuple.get(index) {
            let mut child = ctx.child(&format!("->items:{index}"));
            *item = process(item_schema, &item.clone(), &mut child)?;
        } else if let Some(overflow_schema) = overflow {
            if is_false_schema(overflow_schema) {
                if !ctx.skip_validation {
                    return Err(InvalidValue::new(
                        ErrorKind::Array(ArrayViolation::AdditionalNotAllowed),
                        "Unexpected array item",
                    )
                    .at(&ctx.path));
                }
            } else {
                let mut child = ctx.child(&format!("->{overflow_name}[{index}]:{index}"));
                *item = process(overflow_schema, &item.clone(), &mut child)?;
            }
        }
    }

    if !ctx.skip_validation && schema.unique_items {
        for i in 0..original.len() {
            for j in (i + 1)..original.len() {
                if diff::same(&original[i], &original[j]) {
                    return Err(InvalidValue::new(
                        ErrorKind::Array(ArrayViolation::NotUnique),
                        "Array is not unique",
                    )
                    .at(&ctx.path));
                }
            }
        }
    }

    if !ctx.skip_validation {
        if let Some(contains) = &schema.contains {
            if is_false_schema(contains) {
                return Err(InvalidValue::new(
                    ErrorKind::Array(ArrayViolation::ContainsFailed),
                    "Contains is false",
                )
                .at(&ctx.path));
            }
            if original.is_empty() {
                return Err(InvalidValue::new(
                    ErrorKind::Array(ArrayViolation::ContainsFailed),
                    "Empty array fails contains constraint",
                )
                .at(&ctx.path));
            }
            let satisfied = original.iter().enumerate().any(|(index, item)| {
                let mut child = ctx.child(&format!("->{index}"));
                process(contains, item, &mut child).is_ok()
            });
            if !satisfied {
                return Err(InvalidValue::new(
                    ErrorKind::Array(ArrayViolation::ContainsFailed),
                    "Array fails contains constraint",
                )
                .at(&ctx.path));
            }
        }
    }

    Ok(Node::Array(items))
}
