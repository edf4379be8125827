//! Bidirectional marshalling: round-trips, typed-object binding, circular
//! export, and `$ref` reinstatement with deduplicated definitions.

use std::collections::HashMap;
use std::rc::Rc;

use schemabind::{
    boolean_schema, Context, ErrorKind, Node, ObjectItem, ObjectViolation, Schema, SchemaContract,
    TypedObject,
};
use serde_json::json;

#[test]
fn test_round_trip_reproduces_the_input() {
    let schema = Schema::import(&json!({
        "properties": {
            "user": {
                "properties": {
                    "id": {"type": "integer"},
                    "tags": {"items": {"type": "string"}},
                }
            }
        }
    }))
    .unwrap();
    let data = json!({"user": {"id": 1, "tags": ["a", "b"], "extra": true}});

    let mut ctx = Context::new();
    let imported = schema.import_data(&data, &mut ctx).unwrap();
    assert!(matches!(imported, Node::Object(_)));
    let exported = schema.export_data(&imported, &mut ctx).unwrap();
    assert_eq!(exported, data);
}

#[test]
fn test_map_representation_comes_from_the_schema() {
    let mut plain = Schema::object().property("a", Schema::integer());
    plain.use_object_as_array = true;
    let schema = plain.into_ref();

    let mut ctx = Context::new();
    let imported = schema.import_data(&json!({"a": 1, "b": 2}), &mut ctx).unwrap();
    // Object-as-map mode imports into a generic map, not a typed object.
    assert!(matches!(imported, Node::Map(_)));
    let exported = schema.export_data(&imported, &mut ctx).unwrap();
    assert_eq!(exported, json!({"a": 1, "b": 2}));
}

#[test]
fn test_circular_object_graph_exports_as_pointer() {
    let a = ObjectItem::new_ref(None);
    let b = ObjectItem::new_ref(None);
    a.borrow_mut().set_member("child", Node::Object(b.clone()));
    b.borrow_mut().set_member("parent", Node::Object(a.clone()));

    let schema = Schema::import(&json!({"additionalProperties": {}})).unwrap();
    let mut ctx = Context::new();
    let exported = schema.export_data(&Node::Object(a), &mut ctx).unwrap();
    assert_eq!(exported, json!({"child": {"parent": {"$ref": "#"}}}));
}

#[test]
fn test_shared_instance_exports_as_pointer_to_first_seen_path() {
    let shared = ObjectItem::new_ref(None);
    shared.borrow_mut().set_member("n", Node::from_value(&json!(1)));
    let root = ObjectItem::new_ref(None);
    root.borrow_mut().set_member("first", Node::Object(shared.clone()));
    root.borrow_mut().set_member("second", Node::Object(shared));

    let schema = Schema::import(&json!({"additionalProperties": {}})).unwrap();
    let mut ctx = Context::new();
    let exported = schema.export_data(&Node::Object(root), &mut ctx).unwrap();
    assert_eq!(
        exported,
        json!({"first": {"n": 1}, "second": {"$ref": "#/first"}})
    );
}

#[test]
fn test_export_reinstates_reference_indirection() {
    let schema = Schema::import(&json!({
        "properties": {"a": {}, "b": {}}
    }))
    .unwrap();
    let data = json!({
        "a": {"$ref": "#/definitions/x"},
        "b": {"$ref": "#/definitions/x"},
        "definitions": {"x": {"t": 1}},
    });

    let mut ctx = Context::new();
    let imported = schema.import_data(&data, &mut ctx).unwrap();
    let exported = schema.export_data(&imported, &mut ctx).unwrap();
    assert_eq!(exported, data);
}

#[test]
fn test_export_does_not_leak_undeclared_members() {
    let mut declared = Schema::object()
        .property("id", Schema::integer())
        .property("email", Schema::string());
    declared.additional_properties = Some(boolean_schema(false));
    let schema = declared.into_ref();

    let item = ObjectItem::new_ref(None);
    item.borrow_mut().set_member("id", Node::from_value(&json!(7)));
    item.borrow_mut()
        .set_member("email", Node::from_value(&json!("j@d.test")));

    let mut ctx = Context::new();
    let exported = schema
        .export_data(&Node::Object(item.clone()), &mut ctx)
        .unwrap();
    assert_eq!(exported, json!({"id": 7, "email": "j@d.test"}));

    item.borrow_mut()
        .set_member("secret", Node::from_value(&json!("hunter2")));
    let err = schema
        .export_data(&Node::Object(item), &mut ctx)
        .unwrap_err();
    assert_eq!(
        err.kind(),
        ErrorKind::Object(ObjectViolation::AdditionalNotAllowed)
    );
}

#[test]
fn test_property_name_mapping_translates_both_directions() {
    let mut mapped = Schema::object().property("userName", Schema::string());
    mapped.required = Some(vec!["userName".to_string()]);
    mapped.add_property_mapping("user_name", "userName");
    let schema = mapped.into_ref();

    let mut ctx = Context::new();
    let imported = schema
        .import_data(&json!({"user_name": "ada"}), &mut ctx)
        .unwrap();
    let Node::Object(item) = &imported else { panic!("expected object") };
    assert_eq!(
        item.borrow().get_member("userName").unwrap().to_value(),
        json!("ada")
    );

    let exported = schema.export_data(&imported, &mut ctx).unwrap();
    assert_eq!(exported, json!({"user_name": "ada"}));

    // Required names are mapped before presence checks.
    assert!(schema.validate(&json!({"user_name": "ada"})).is_ok());
    assert!(schema.validate(&json!({"userName": "ada"})).is_err());
}

#[test]
fn test_nested_declarations_route_into_member_paths() {
    let schema = Schema::object()
        .property("flat", Schema::integer())
        .nested_property("x", "sub", Schema::integer())
        .into_ref();

    let mut ctx = Context::new();
    let imported = schema
        .import_data(&json!({"flat": 1, "x": 3}), &mut ctx)
        .unwrap();
    let Node::Object(item) = &imported else { panic!("expected object") };
    let Some(Node::Object(sub)) = item.borrow().get_member("sub") else {
        panic!("expected nested object");
    };
    assert_eq!(sub.borrow().get_member("x").unwrap().to_value(), json!(3));
    // Flat members are unaffected.
    assert_eq!(item.borrow().get_member("flat").unwrap().to_value(), json!(1));
}

#[test]
fn test_import_records_pattern_and_additional_members() {
    let schema = Schema::import(&json!({
        "patternProperties": {"^x": {}},
        "additionalProperties": {},
    }))
    .unwrap();
    let mut ctx = Context::new();
    let imported = schema
        .import_data(&json!({"x1": 1, "other": 2}), &mut ctx)
        .unwrap();
    let Node::Object(item) = &imported else { panic!("expected object") };
    let item = item.borrow();
    let item = item.as_any().downcast_ref::<ObjectItem>().unwrap();
    assert_eq!(item.pattern_property_names("^x"), ["x1"]);
    assert_eq!(item.additional_property_names(), ["other"]);
}

#[test]
fn test_binding_goes_through_the_substitution_table() {
    let mut bound = Schema::object();
    bound.binding = Some("User".to_string());
    let schema = bound.into_ref();

    let mut ctx = Context::new();
    ctx.class_mapping = Some(Rc::new(HashMap::from([(
        "User".to_string(),
        "AdminUser".to_string(),
    )])));
    let imported = schema.import_data(&json!({}), &mut ctx).unwrap();
    let Node::Object(item) = &imported else { panic!("expected object") };
    let item = item.borrow();
    let item = item.as_any().downcast_ref::<ObjectItem>().unwrap();
    assert_eq!(item.binding.as_deref(), Some("AdminUser"));
}

#[test]
fn test_content_unpacking_round_trips() {
    let schema = Schema::import(&json!({
        "type": "string",
        "contentEncoding": "base64",
        "contentMediaType": "application/json",
    }))
    .unwrap();

    let mut ctx = Context::new();
    ctx.unpack_content = true;
    let imported = schema
        .import_data(&json!("eyJhIjoxfQ=="), &mut ctx)
        .unwrap();
    assert_eq!(imported.to_value(), json!({"a": 1}));

    // Re-packing on export; the unpacked value is no longer a string, so
    // the type keyword is skipped for the encode direction.
    let mut out_ctx = Context::new();
    out_ctx.unpack_content = true;
    out_ctx.skip_validation = true;
    let exported = schema.export_data(&imported, &mut out_ctx).unwrap();
    assert_eq!(exported, json!("eyJhIjoxfQ=="));

    // Without unpacking the codec still validates decodability.
    assert!(schema.validate(&json!("not-base64!")).is_err());
    schema.validate(&json!("eyJhIjoxfQ==")).unwrap();
}

#[test]
fn test_validate_only_builds_no_objects() {
    let schema = Schema::import(&json!({"properties": {"a": {"type": "integer"}}})).unwrap();
    let mut ctx = Context::new();
    ctx.validate_only = true;
    let imported = schema.import_data(&json!({"a": 1}), &mut ctx).unwrap();
    assert!(matches!(imported, Node::Map(_)));
}

#[test]
fn test_typed_object_members_keep_insertion_order_on_export() {
    let item = ObjectItem::new_ref(None);
    item.borrow_mut().set_member("z", Node::from_value(&json!(1)));
    item.borrow_mut().set_member("a", Node::from_value(&json!(2)));
    item.borrow_mut().set_member("m", Node::from_value(&json!(3)));

    let schema = Schema::import(&json!({})).unwrap();
    let mut ctx = Context::new();
    let exported = schema.export_data(&Node::Object(item), &mut ctx).unwrap();
    let keys: Vec<&String> = exported.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["z", "a", "m"]);
}
