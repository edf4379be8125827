//! Processing paths and pointers
//!
//! During evaluation the engine accumulates a human-readable processing path
//! such as `#->properties:root->patternProperties[^[a-z]+$]:zoo->oneOf[1]`.
//! Diagnostics derive two machine-addressable views from it:
//!
//! - the *data pointer* (`/root/zoo`) — where in the instance the failure
//!   occurred, built from the `:key`-suffixed segments;
//! - the *schema pointers* — where in the schema document the failing keyword
//!   lives. A `$ref` crossing closes the current pointer with a `/$ref` tail
//!   and starts a new one at the reference target, so one failure deep inside
//!   a reference chain yields one pointer per document region crossed.

use crate::value::Node;

/// Escape a literal for embedding inside a `patternProperties[...]` path
/// fragment (`~` then `:` so the segment parser stays unambiguous).
pub(crate) fn escape_pattern(pattern: &str) -> String {
    pattern.replace('~', "~1").replace(':', "~2")
}

fn unescape_pattern(pattern: &str) -> String {
    pattern.replace("~2", ":").replace("~1", "~")
}

fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Split a JSON pointer (optionally in `#/...` fragment form) into segments.
pub fn split_pointer(pointer: &str) -> Vec<String> {
    let pointer = pointer.strip_prefix('#').unwrap_or(pointer);
    let pointer = pointer.strip_prefix('/').unwrap_or(pointer);
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer.split('/').map(unescape_pointer_segment).collect()
}

fn join_pointer(segments: &[String]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&escape_pointer_segment(segment));
    }
    out
}

/// Split a processing path into its `->`-separated segments, honoring
/// bracketed fragments (patterns and reference URIs may contain `->`).
fn split_path(path: &str) -> Vec<&str> {
    let path = path.strip_prefix('#').unwrap_or(path);
    let mut segments = Vec::new();
    let bytes = path.as_bytes();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b'-' if depth == 0 && bytes.get(i + 1) == Some(&b'>') => {
                if i > start {
                    segments.push(&path[start..i]);
                }
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if start < path.len() {
        segments.push(&path[start..]);
    }
    segments
}

/// One parsed path segment: `name[bracket]:key`, each part optional.
struct Segment<'a> {
    name: &'a str,
    bracket: Option<&'a str>,
    key: Option<&'a str>,
}

fn parse_segment(segment: &str) -> Segment<'_> {
    let bytes = segment.as_bytes();
    let mut depth = 0usize;
    let mut bracket = None;
    let mut name_end = segment.len();
    let mut key_start = None;
    let mut bracket_start = 0usize;
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'[' => {
                if depth == 0 {
                    name_end = name_end.min(i);
                    bracket_start = i + 1;
                }
                depth += 1;
            }
            b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && bracket.is_none() {
                    bracket = Some(&segment[bracket_start..i]);
                }
            }
            b':' if depth == 0 => {
                name_end = name_end.min(i);
                key_start = Some(i + 1);
                break;
            }
            _ => {}
        }
    }
    Segment {
        name: &segment[..name_end],
        bracket,
        key: key_start.map(|i| &segment[i..]),
    }
}

/// Derive the data pointer (`/a/b/0`) from a processing path.
pub fn data_pointer(path: &str) -> String {
    let mut segments = Vec::new();
    for raw in split_path(path) {
        let seg = parse_segment(raw);
        if let Some(key) = seg.key {
            segments.push(key.to_string());
        } else if !seg.name.is_empty() && seg.name.bytes().all(|b| b.is_ascii_digit()) {
            // bare index segments (contains elements)
            segments.push(seg.name.to_string());
        }
    }
    join_pointer(&segments)
}

/// Derive the ordered schema-pointer list from a processing path.
pub fn schema_pointers(path: &str) -> Vec<String> {
    let mut pointers = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for raw in split_path(path) {
        let seg = parse_segment(raw);
        match seg.name {
            "$ref" => {
                current.push("$ref".to_string());
                pointers.push(join_pointer(&current));
                current = seg.bracket.map(split_pointer).unwrap_or_default();
            }
            "properties" | "dependencies" => {
                current.push(seg.name.to_string());
                if let Some(key) = seg.key {
                    current.push(key.to_string());
                }
            }
            "patternProperties" => {
                current.push(seg.name.to_string());
                if let Some(pattern) = seg.bracket {
                    current.push(unescape_pattern(pattern));
                }
            }
            "oneOf" | "anyOf" | "allOf" => {
                current.push(seg.name.to_string());
                if let Some(index) = seg.bracket {
                    current.push(index.to_string());
                }
            }
            // Tuple positions carry their index after the colon; a bracketed
            // index means a single schema governs every element, so the
            // pointer stops at the keyword itself.
            "items" => {
                current.push(seg.name.to_string());
                if seg.bracket.is_none() {
                    if let Some(index) = seg.key {
                        current.push(index.to_string());
                    }
                }
            }
            "additionalItems" | "additionalProperties" | "propertyNames" => {
                current.push(seg.name.to_string());
            }
            "not" | "if" | "then" | "else" => current.push(seg.name.to_string()),
            _ => {}
        }
    }
    pointers.push(join_pointer(&current));
    pointers
}

/// Resolve a JSON pointer against a generic value.
pub fn pointer_get<'a>(value: &'a serde_json::Value, pointer: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in split_pointer(pointer) {
        current = match current {
            serde_json::Value::Object(map) => map.get(&segment)?,
            serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Insert `value` at `segments` inside a map-shaped node, creating missing
/// intermediate maps along the way (export definition merging).
pub(crate) fn pointer_add(target: &mut Node, segments: &[String], value: Node) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };
    let Node::Map(map) = target else { return };
    if rest.is_empty() {
        map.insert(head.clone(), value);
        return;
    }
    let slot = map.get_or_insert_with(head, || Node::Map(crate::value::OrderedMap::new()));
    pointer_add(slot, rest, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DEEP: &str =
        "#->properties:root->patternProperties[^[a-zA-Z0-9_]+$]:zoo->oneOf[2]->$ref[#/ref-to-cde]->$ref[#/cde]->anyOf[1]";

    #[test]
    fn test_data_pointer_collects_keyed_segments() {
        assert_eq!(data_pointer(DEEP), "/root/zoo");
        assert_eq!(data_pointer("#"), "");
        assert_eq!(data_pointer("#->properties:a->items:3"), "/a/3");
    }

    #[test]
    fn test_schema_pointers_split_at_ref_boundaries() {
        assert_eq!(
            schema_pointers(DEEP),
            vec![
                "/properties/root/patternProperties/^[a-zA-Z0-9_]+$/oneOf/2/$ref",
                "/ref-to-cde/$ref",
                "/cde/anyOf/1",
            ]
        );
    }

    #[test]
    fn test_schema_pointer_for_single_schema_items_stops_at_keyword() {
        assert_eq!(schema_pointers("#->items[4]:4"), vec!["/items"]);
        assert_eq!(schema_pointers("#->items:1"), vec!["/items/1"]);
    }

    #[test]
    fn test_pointer_get_walks_objects_and_arrays() {
        let doc = json!({"a": {"b": [10, {"c": true}]}});
        assert_eq!(pointer_get(&doc, "/a/b/1/c"), Some(&json!(true)));
        assert_eq!(pointer_get(&doc, "#/a/b/0"), Some(&json!(10)));
        assert_eq!(pointer_get(&doc, "/a/x"), None);
    }

    #[test]
    fn test_pointer_add_creates_intermediate_maps() {
        let mut node = Node::from_value(&json!({}));
        pointer_add(
            &mut node,
            &["definitions".into(), "x".into()],
            Node::from_value(&json!({"type": "string"})),
        );
        assert_eq!(
            node.to_value(),
            json!({"definitions": {"x": {"type": "string"}}})
        );
    }
}
