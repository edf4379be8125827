//! schemabind
//!
//! Schema-driven validation and bidirectional marshalling for JSON Schema
//! drafts 4, 6 and 7, with structured-object binding.
//!
//! ## Features
//!
//! - **Validation**: the full draft keyword set — scalar constraints,
//!   object/array structure, `oneOf`/`anyOf`/`allOf`/`not`/`if-then-else`
//! - **Import**: decode generic data into typed object graphs while
//!   validating, with defaults, property-name mappings and nested members
//! - **Export**: encode object graphs back to generic data, reinserting
//!   `$ref` indirection for shared and cyclic substructures
//! - **References**: `$ref`/`$id` resolution with scope tracking, cycle-safe
//!   caching and a pluggable remote provider
//! - **Diagnostics**: structured failures carrying schema pointers, a data
//!   pointer and nested sub-diagnostics from combinator arms
//!
//! ## Example
//!
//! ```
//! use schemabind::{Schema, SchemaContract, Context};
//! use serde_json::json;
//!
//! let schema = Schema::import(&json!({
//!     "type": "object",
//!     "properties": {"n": {"type": "number", "maximum": 10}},
//! })).unwrap();
//!
//! schema.validate(&json!({"n": 5})).unwrap();
//!
//! let err = schema.validate(&json!({"n": 11})).unwrap_err();
//! assert_eq!(err.data_pointer(), "/n");
//!
//! let mut ctx = Context::new();
//! let imported = schema.import_data(&json!({"n": 5}), &mut ctx).unwrap();
//! let exported = schema.export_data(&imported, &mut ctx).unwrap();
//! assert_eq!(exported, json!({"n": 5}));
//! ```

mod compile;
pub mod content;
pub mod context;
pub mod diff;
pub mod engine;
pub mod error;
pub mod format;
pub mod meta;
pub mod path;
pub mod resolver;
pub mod schema;
pub mod structure;
pub mod value;

pub use content::{Base64JsonCodec, ContentCodec};
pub use context::{Context, DataPreProcessor};
pub use engine::SchemaContract;
pub use error::{
    ArrayViolation, ErrorDetail, ErrorKind, InvalidValue, NumericViolation, ObjectViolation,
    Result, SchemaError, StringViolation,
};
pub use format::{AcceptAllFormats, FormatChecker};
pub use meta::meta_schema;
pub use resolver::{Reference, RefResolver, RemoteRefProvider};
pub use schema::{
    boolean_schema, Dependency, Exclusive, Items, NestedDecl, Properties, Schema, SchemaRef,
    SchemaType, Version,
};
pub use structure::{DefaultObjectFactory, ObjectFactory, ObjectItem, ObjectRef, TypedObject};
pub use value::{Node, OrderedMap};
