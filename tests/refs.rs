//! Reference resolution: chains, cycles, identifier scopes, remote
//! documents, and import stability.

use std::rc::Rc;

use schemabind::{Context, Node, RemoteRefProvider, Schema, SchemaContract, TypedObject};
use serde_json::{json, Value};

#[test]
fn test_reference_chains_resolve_and_report_full_paths() {
    let schema = Schema::import(&json!({
        "allOf": [{"$ref": "#/a"}],
        "a": {"$ref": "#/b"},
        "b": {"$ref": "#/c"},
        "c": {"$ref": "#/d"},
        "d": {"type": "string"},
    }))
    .unwrap();

    schema.validate(&json!("seven")).unwrap();

    let err = schema.validate(&json!(13)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "String expected, 13 received at #->allOf[0]->$ref[#/a]->$ref[#/b]->$ref[#/c]->$ref[#/d]"
    );
}

#[test]
fn test_definitions_are_a_reference_target() {
    let schema = Schema::import(&json!({
        "properties": {
            "left": {"$ref": "#/definitions/side"},
            "right": {"$ref": "#/definitions/side"},
        },
        "definitions": {
            "side": {"type": "integer", "minimum": 0}
        }
    }))
    .unwrap();
    schema.validate(&json!({"left": 1, "right": 2})).unwrap();
    let err = schema.validate(&json!({"left": -1})).unwrap_err();
    assert_eq!(err.data_pointer(), "/left");
}

#[test]
fn test_cyclic_schema_references_terminate() {
    // a -> b -> c -> a closes into a cyclic schema graph at compile time.
    let schema = Schema::import(&json!({
        "properties": {"head": {"$ref": "#/a"}},
        "a": {"properties": {"next": {"$ref": "#/b"}}},
        "b": {"properties": {"next": {"$ref": "#/c"}}},
        "c": {"properties": {"next": {"$ref": "#/a"}}},
    }))
    .unwrap();

    schema
        .validate(&json!({"head": {"next": {"next": {"next": {"next": {}}}}}}))
        .unwrap();
}

#[test]
fn test_import_is_stable_and_idempotent_across_repeated_imports() {
    let schema = Schema::import(&json!({
        "properties": {"a": {}, "b": {}}
    }))
    .unwrap();
    // Both members point at the same target in the data document.
    let data = json!({
        "a": {"$ref": "#/shared"},
        "b": {"$ref": "#/shared"},
        "shared": {"n": 1},
    });

    let mut ctx = Context::new();
    let first = schema.import_data(&data, &mut ctx).unwrap();
    let second = schema.import_data(&data, &mut ctx).unwrap();
    assert_eq!(first.to_value(), second.to_value());

    // A shared reference target imports once, to one shared instance.
    let Node::Object(root) = &first else { panic!("expected object") };
    let (Some(Node::Object(a)), Some(Node::Object(b))) = (
        root.borrow().get_member("a"),
        root.borrow().get_member("b"),
    ) else {
        panic!("expected member objects");
    };
    assert!(Rc::ptr_eq(&a, &b));
}

#[test]
fn test_cyclic_data_references_import_without_looping() {
    let schema = Schema::import(&json!({"additionalProperties": {}})).unwrap();
    let data = json!({
        "a": {"$ref": "#/b"},
        "b": {"$ref": "#/a"},
    });
    let mut ctx = Context::new();
    let imported = schema.import_data(&data, &mut ctx).unwrap();

    let Node::Object(root) = &imported else { panic!("expected object") };
    let (Some(Node::Object(a)), Some(Node::Object(b))) = (
        root.borrow().get_member("a"),
        root.borrow().get_member("b"),
    ) else {
        panic!("expected member objects");
    };
    // The cycle collapses onto one shared instance.
    assert!(Rc::ptr_eq(&a, &b));
}

#[test]
fn test_anchor_identifiers_resolve() {
    let schema = Schema::import(&json!({
        "$ref": "#foo",
        "definitions": {
            "x": {"$id": "#foo", "type": "string"}
        }
    }))
    .unwrap();
    schema.validate(&json!("ok")).unwrap();
    assert!(schema.validate(&json!(5)).is_err());
}

#[test]
fn test_id_scopes_nest_and_restore() {
    // The inner `$id` rebases resolution for its subtree; the sibling
    // property still resolves against the root document.
    let schema = Schema::import(&json!({
        "properties": {
            "inner": {
                "$id": "http://x.test/inner.json",
                "properties": {"v": {"$ref": "#/definitions/local"}},
                "definitions": {"local": {"type": "integer"}}
            },
            "outer": {"$ref": "#/definitions/fromRoot"}
        },
        "definitions": {"fromRoot": {"type": "string"}}
    }))
    .unwrap();
    schema
        .validate(&json!({"inner": {"v": 3}, "outer": "s"}))
        .unwrap();
    assert!(schema.validate(&json!({"inner": {"v": "not an int"}})).is_err());
    assert!(schema.validate(&json!({"outer": 5})).is_err());
}

struct FixedProvider {
    uri: &'static str,
    document: Value,
}

impl RemoteRefProvider for FixedProvider {
    fn fetch(&self, uri: &str) -> Option<Value> {
        (uri == self.uri).then(|| self.document.clone())
    }
}

#[test]
fn test_remote_references_delegate_to_the_provider() {
    let mut ctx = Context::new();
    ctx.remote_provider = Some(Rc::new(FixedProvider {
        uri: "http://types.test/common.json",
        document: json!({"definitions": {"id": {"type": "integer", "minimum": 1}}}),
    }));
    let schema = Schema::import_with(
        &json!({"$ref": "http://types.test/common.json#/definitions/id"}),
        &mut ctx,
    )
    .unwrap();
    schema.validate(&json!(7)).unwrap();
    assert!(schema.validate(&json!(0)).is_err());
}

#[test]
fn test_missing_remote_provider_fails_compilation() {
    let result = Schema::import(&json!({"$ref": "http://types.test/common.json#/x"}));
    assert!(result.is_err());
}

#[test]
fn test_meta_schema_reference_validates_schema_documents() {
    let schema = Schema::import(&json!({
        "properties": {"embedded": {"$ref": "http://json-schema.org/draft-07/schema#"}}
    }))
    .unwrap();
    schema
        .validate(&json!({"embedded": {"type": "string", "minLength": 2}}))
        .unwrap();
    assert!(schema
        .validate(&json!({"embedded": {"minLength": "two"}}))
        .is_err());
}
