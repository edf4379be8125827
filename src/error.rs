//! Error types
//!
//! Two failure surfaces: [`SchemaError`] for problems with schema documents
//! themselves (malformed keywords, unresolvable references at compile time),
//! and [`InvalidValue`] — the structured validation diagnostic carrying the
//! error kind, the processing path at the failure point, and the nested
//! sub-diagnostics produced by combinators. Schema and data pointers are
//! derived from the processing path on demand.

use serde::Serialize;
use thiserror::Error;

use crate::path;

/// Result type for schema compilation.
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema-document errors.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("invalid schema at {path}: {reason}")]
    InvalidSchema { path: String, reason: String },

    #[error("unresolvable reference: {0}")]
    UnresolvedReference(String),

    #[error("invalid regular expression {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn invalid(path: &str, reason: impl Into<String>) -> Self {
        SchemaError::InvalidSchema {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// String constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringViolation {
    TooShort,
    TooLong,
    Pattern,
    Format,
}

/// Numeric constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericViolation {
    Minimum,
    Maximum,
    MultipleOf,
}

/// Object constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectViolation {
    Required,
    TooFewProperties,
    TooManyProperties,
    AdditionalNotAllowed,
    DependencyMissing,
}

/// Array constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayViolation {
    TooFewItems,
    TooManyItems,
    NotUnique,
    AdditionalNotAllowed,
    ContainsFailed,
}

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Type,
    Enum,
    Const,
    /// not / oneOf / anyOf / boolean-schema composites.
    Logic,
    String(StringViolation),
    Numeric(NumericViolation),
    Object(ObjectViolation),
    Array(ArrayViolation),
    Content,
    /// Generic invalid data, including unresolvable data-level references.
    Invalid,
}

/// A structured validation failure.
///
/// `error` is the short single-line text; `message` is the full rendering,
/// which for combinator failures embeds the indented sub-diagnostic block.
/// Exactly one of these reaches the top-level caller per failed run.
#[derive(Debug, Clone)]
pub struct InvalidValue {
    kind: ErrorKind,
    error: String,
    message: String,
    path: Option<String>,
    sub_errors: Vec<InvalidValue>,
}

impl InvalidValue {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            error: message.clone(),
            message,
            path: None,
            sub_errors: Vec::new(),
        }
    }

    pub(crate) fn composite(
        kind: ErrorKind,
        error: impl Into<String>,
        message: impl Into<String>,
        sub_errors: Vec<InvalidValue>,
    ) -> Self {
        Self {
            kind,
            error: error.into(),
            message: message.into(),
            path: None,
            sub_errors,
        }
    }

    /// Attach the processing path at the raising site. Deeper paths win:
    /// outer frames re-raising an already-located failure leave it alone.
    pub(crate) fn at(mut self, path: &str) -> Self {
        if self.path.is_none() && path != "#" {
            self.path = Some(path.to_string());
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Short single-line error text.
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Sub-diagnostics from combinator arms, addressable by arm index.
    pub fn sub_errors(&self) -> &[InvalidValue] {
        &self.sub_errors
    }

    /// The human-readable processing path at the failure point.
    pub fn processing_path(&self) -> &str {
        self.path.as_deref().unwrap_or("#")
    }

    /// JSON pointer into the instance data.
    pub fn data_pointer(&self) -> String {
        path::data_pointer(self.processing_path())
    }

    /// Ordered schema-pointer list, one entry per `$ref` crossing.
    pub fn schema_pointers(&self) -> Vec<String> {
        path::schema_pointers(self.processing_path())
    }

    /// The innermost schema pointer — where the failing keyword lives.
    pub fn schema_pointer(&self) -> String {
        self.schema_pointers().pop().unwrap_or_default()
    }

    /// Structured, serializable inspection tree.
    pub fn inspect(&self) -> ErrorDetail {
        ErrorDetail {
            error: self.error.clone(),
            schema_pointers: self.schema_pointers(),
            data_pointer: self.data_pointer(),
            processing_path: self.processing_path().to_string(),
            sub_errors: self.sub_errors.iter().map(InvalidValue::inspect).collect(),
        }
    }

    /// Resolve the failing sub-schema by walking the stored schema pointers
    /// against the root schema's retained source document.
    pub fn failed_sub_schema(
        &self,
        root: &crate::schema::SchemaRef,
    ) -> Result<crate::schema::SchemaRef> {
        let source = root.borrow().source.clone().ok_or_else(|| {
            SchemaError::invalid("#", "root schema has no retained source document")
        })?;
        let pointer = self.schema_pointer();
        let fragment = path::pointer_get(&source, &pointer)
            .ok_or_else(|| SchemaError::UnresolvedReference(pointer.clone()))?
            .clone();
        crate::compile::compile_fragment(&source, &fragment)
    }
}

impl std::fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(path) = &self.path {
            write!(f, " at {path}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidValue {}

/// Serializable mirror of a diagnostic tree.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub error: String,
    pub schema_pointers: Vec<String>,
    pub data_pointer: String,
    pub processing_path: String,
    pub sub_errors: Vec<ErrorDetail>,
}

/// Indent every line of `text` by `pad`, optionally leaving the first line
/// untouched (nested combinator message rendering).
pub(crate) fn pad_lines(pad: &str, text: &str, skip_first: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if i > 0 || !skip_first {
            out.push_str(pad);
        }
        out.push_str(line);
    }
    out
}
