//! Combinator evaluation: not, oneOf, anyOf, allOf, if/then/else.
//!
//! Arms are evaluated in isolated child contexts; failures inside an arm are
//! expected control flow, not errors. oneOf and anyOf bundle the failed arms
//! into one composite diagnostic whose message nests each arm's rendering
//! with one extra space of indentation per level.

use crate::context::Context;
use crate::engine::process;
use crate::error::{pad_lines, ErrorKind, InvalidValue};
use crate::schema::{Schema, SchemaRef};
use crate::value::Node;

pub(crate) fn process_not(
    not: &SchemaRef,
    data: &Node,
    ctx: &mut Context,
) -> Result<(), InvalidValue> {
    let mut child = ctx.child("->not");
    if process(not, data, &mut child).is_err() {
        return Ok(());
    }
    let schema_json =
        serde_json::to_string(&not.borrow().to_value()).unwrap_or_default();
    Err(InvalidValue::new(
        ErrorKind::Logic,
        format!(
            "Not {schema_json} expected, {} received",
            data.to_json_string()
        ),
    )
    .at(&child.path))
}

pub(crate) fn process_one_of(
    arms: &[SchemaRef],
    data: &Node,
    ctx: &mut Context,
) -> Result<Node, InvalidValue> {
    // Under an enclosing skip-validation flag the arms still validate, so the
    // right marshalling branch gets picked; the flag is restored afterwards.
    let skipping = ctx.skip_validation;
    ctx.skip_validation = false;

    let mut successes = 0usize;
    let mut failures: Vec<String> = Vec::new();
    let mut sub_errors: Vec<InvalidValue> = Vec::new();
    let mut result = data.clone();

    for (index, arm) in arms.iter().enumerate() {
        let mut child = ctx.child(&format!("->oneOf[{index}]"));
        match process(arm, data, &mut child) {
            Ok(output) => {
                result = output;
                successes += 1;
                if successes > 1 {
                    break;
                }
            }
            Err(error) => {
                failures.push(format!(" {index}: {}", pad_lines(" ", &error.to_string(), true)));
                sub_errors.push(error);
            }
        }
    }

    ctx.skip_validation = skipping;
    if skipping {
        if successes == 0 {
            if let Some(first) = arms.first() {
                let mut child = ctx.child("->oneOf[0]");
                result = process(first, data, &mut child)?;
            }
        }
        return Ok(result);
    }

    let block = failures.join("\n");
    if successes == 0 {
        return Err(InvalidValue::composite(
            ErrorKind::Logic,
            "No valid results for oneOf",
            format!("No valid results for oneOf {{\n{block}\n}}"),
            sub_errors,
        )
        .at(&ctx.path));
    }
    if successes > 1 {
        return Err(InvalidValue::composite(
            ErrorKind::Logic,
            "More than 1 valid result for oneOf",
            format!(
                "More than 1 valid result for oneOf: {successes}/{} valid results for oneOf {{\n{block}\n}}",
                arms.len()
            ),
            sub_errors,
        )
        .at(&ctx.path));
    }
    Ok(result)
}

pub(crate) fn process_any_of(
    arms: &[SchemaRef],
    data: &Node,
    ctx: &mut Context,
) -> Result<Node, InvalidValue> {
    let mut failures: Vec<String> = Vec::new();
    let mut sub_errors: Vec<InvalidValue> = Vec::new();

    for (index, arm) in arms.iter().enumerate() {
        let mut child = ctx.child(&format!("->anyOf[{index}]"));
        match process(arm, data, &mut child) {
            Ok(output) => return Ok(output),
            Err(error) => {
                failures.push(format!(" {index}: {}", error));
                sub_errors.push(error);
            }
        }
    }

    if ctx.skip_validation {
        return Ok(data.clone());
    }
    let block = pad_lines(" ", &failures.join("\n"), false);
    Err(InvalidValue::composite(
        ErrorKind::Logic,
        "No valid results for anyOf",
        format!("No valid results for anyOf {{\n{block}\n}}"),
        sub_errors,
    )
    .at(&ctx.path))
}

pub(crate) fn process_all_of(
    arms: &[SchemaRef],
    data: &Node,
    ctx: &mut Context,
) -> Result<Node, InvalidValue> {
    // Arm n's output seeds arm n+1's running result, so marshalling
    // transforms accumulate across arms; every arm still validates the
    // original value.
    let mut result: Option<Node> = None;
    for (index, arm) in arms.iter().enumerate() {
        let mut child = ctx.child(&format!("->allOf[{index}]"));
        child.result = result.take();
        result = Some(process(arm, data, &mut child)?);
    }
    Ok(result.unwrap_or_else(|| data.clone()))
}

/// Returns the taken branch's output, or `None` when no branch applies (which
/// leaves the running result untouched).
pub(crate) fn process_if(
    schema: &Schema,
    data: &Node,
    ctx: &mut Context,
) -> Result<Option<Node>, InvalidValue> {
    let Some(condition) = &schema.if_ else {
        return Ok(None);
    };
    let passed = {
        let mut child = ctx.child("->if");
        process(condition, data, &mut child).is_ok()
    };
    let (branch, fragment) = if passed {
        (&schema.then_, "->then")
    } else {
        (&schema.else_, "->else")
    };
    match branch {
        Some(branch) => {
            let mut child = ctx.child(fragment);
            process(branch, data, &mut child).map(Some)
        }
        None => Ok(None),
    }
}
