//! Deep difference counting
//!
//! Small structural comparison used by `enum`, `const` and `uniqueItems`.
//! Counts leaf-level differences between two values; `0` means deep-equal.

use crate::value::Node;

/// Count the structural differences between two values.
///
/// Scalars compare strictly (`1` and `1.0` differ, as do `"1"` and `1`).
/// Arrays compare positionally, maps by key set and member values, and typed
/// objects by their serialized members.
pub fn count_differences(a: &Node, b: &Node) -> usize {
    match (a, b) {
        (Node::Null, Node::Null) => 0,
        (Node::Bool(x), Node::Bool(y)) => usize::from(x != y),
        (Node::Number(x), Node::Number(y)) => usize::from(x != y),
        (Node::String(x), Node::String(y)) => usize::from(x != y),
        (Node::Array(x), Node::Array(y)) => {
            if x.len() != y.len() {
                return x.len().abs_diff(y.len())
                    + x.iter().zip(y).map(|(a, b)| count_differences(a, b)).sum::<usize>();
            }
            x.iter().zip(y).map(|(a, b)| count_differences(a, b)).sum()
        }
        (Node::Map(x), Node::Map(y)) => {
            let mut count = 0;
            for (key, value) in x.iter() {
                match y.get(key) {
                    Some(other) => count += count_differences(value, other),
                    None => count += 1,
                }
            }
            count += y.keys().filter(|k| !x.contains_key(k)).count();
            count
        }
        (Node::Object(_), _) | (_, Node::Object(_)) => {
            count_differences(&unwrap_object(a), &unwrap_object(b))
        }
        _ => 1,
    }
}

/// Deep equality shorthand.
pub fn same(a: &Node, b: &Node) -> bool {
    count_differences(a, b) == 0
}

fn unwrap_object(node: &Node) -> Node {
    match node {
        Node::Object(obj) => obj.borrow().serialize(),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(v: serde_json::Value) -> Node {
        Node::from_value(&v)
    }

    #[test]
    fn test_deep_equal_maps_ignore_key_order() {
        let a = node(json!({"a": 1, "b": [1, 2]}));
        let b = node(json!({"b": [1, 2], "a": 1}));
        assert!(same(&a, &b));
    }

    #[test]
    fn test_counts_nested_differences() {
        let a = node(json!({"a": 1, "b": {"c": true}}));
        let b = node(json!({"a": 2, "b": {"c": false}, "d": null}));
        assert_eq!(count_differences(&a, &b), 3);
    }

    #[test]
    fn test_type_changes_are_one_difference() {
        assert_eq!(count_differences(&node(json!("1")), &node(json!(1))), 1);
        assert_eq!(count_differences(&node(json!(null)), &node(json!(false))), 1);
    }
}
