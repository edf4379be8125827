//! Evaluation context
//!
//! One [`Context`] accompanies every recursive step. Flags, path and the
//! running result are copied on descent — sibling branches never observe each
//! other's partial state — while the resolver, the export visited map and the
//! staged export definitions live in a shared block mutated in place across
//! the whole run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use regex::Regex;

use crate::content::{Base64JsonCodec, ContentCodec};
use crate::error::{ErrorKind, InvalidValue};
use crate::format::{AcceptAllFormats, FormatChecker};
use crate::resolver::{RefResolver, RemoteRefProvider};
use crate::schema::{Schema, Version, DEFAULT_MAPPING};
use crate::structure::{DefaultObjectFactory, ObjectFactory};
use crate::value::{Node, OrderedMap};

/// Hook run on every value before keyword evaluation.
pub trait DataPreProcessor {
    fn process(&self, data: &Node, schema: &Schema, import: bool) -> Node;
}

/// State shared by reference across one evaluation run.
pub(crate) struct SharedState {
    pub resolver: RefCell<Option<RefResolver>>,
    /// Export cycle detection: object identity → first-seen path.
    pub visited: RefCell<HashMap<usize, String>>,
    /// Export dedup staging: reference → definition (placeholder while the
    /// definition itself is being exported).
    pub exported_definitions: RefCell<OrderedMap<Option<Node>>>,
    /// Session cache of compiled patterns.
    regexes: RefCell<HashMap<String, Rc<Regex>>>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            resolver: RefCell::new(None),
            visited: RefCell::new(HashMap::new()),
            exported_definitions: RefCell::new(OrderedMap::new()),
            regexes: RefCell::new(HashMap::new()),
        }
    }
}

/// Per-call evaluation state. Copy-on-descend.
#[derive(Clone)]
pub struct Context {
    /// `true` while decoding data into objects; `false` while encoding back.
    pub(crate) import: bool,
    pub(crate) path: String,
    pub(crate) result: Option<Node>,
    /// Export-dedup marker: the next object export is a staged definition.
    pub(crate) is_ref: bool,

    /// Skip keyword checks but still perform structural marshalling.
    pub skip_validation: bool,
    /// Validate without constructing destination objects.
    pub validate_only: bool,
    /// Coerce numeric/boolean-shaped strings on import.
    pub tolerate_strings: bool,
    /// Substitute declared defaults for missing properties.
    pub apply_defaults: bool,
    /// Unpack content-encoded values on import (re-pack on export).
    pub unpack_content: bool,
    /// Legacy representation compatibility: reject empty property names.
    pub reject_empty_property_names: bool,
    pub version: Version,
    /// Active property-name mapping selector.
    pub mapping: String,

    /// Binding substitutions applied before the factory call.
    pub class_mapping: Option<Rc<HashMap<String, String>>>,
    pub object_factory: Rc<dyn ObjectFactory>,
    pub format_checker: Rc<dyn FormatChecker>,
    pub content_codec: Rc<dyn ContentCodec>,
    pub pre_processor: Option<Rc<dyn DataPreProcessor>>,
    pub remote_provider: Option<Rc<dyn RemoteRefProvider>>,

    pub(crate) shared: Rc<SharedState>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            import: true,
            path: "#".to_string(),
            result: None,
            is_ref: false,
            skip_validation: false,
            validate_only: false,
            tolerate_strings: false,
            apply_defaults: false,
            unpack_content: false,
            reject_empty_property_names: false,
            version: Version::Auto,
            mapping: DEFAULT_MAPPING.to_string(),
            class_mapping: None,
            object_factory: Rc::new(DefaultObjectFactory),
            format_checker: Rc::new(AcceptAllFormats),
            content_codec: Rc::new(Base64JsonCodec),
            pre_processor: None,
            remote_provider: None,
            shared: Rc::new(SharedState::new()),
        }
    }

    /// Derive the child context for one recursive descent: same flags and
    /// shared state, extended path, cleared result.
    pub(crate) fn child(&self, fragment: &str) -> Context {
        let mut child = self.clone();
        child.result = None;
        child.path.push_str(fragment);
        child
    }

    pub(crate) fn is_root(&self) -> bool {
        self.path == "#"
    }

    /// Root the resolver at a new document, keeping the session caches when
    /// the caller reuses one context across calls.
    pub(crate) fn root_resolver(&self, root_data: serde_json::Value) {
        let mut slot = self.shared.resolver.borrow_mut();
        match slot.as_mut() {
            Some(resolver) => resolver.set_root_data(root_data),
            None => *slot = Some(RefResolver::new(root_data)),
        }
        if let (Some(resolver), Some(provider)) = (slot.as_mut(), self.remote_provider.clone()) {
            resolver.set_remote_provider(provider);
        }
    }

    /// Run `f` with the session resolver (creating an empty-rooted one on
    /// first use).
    pub(crate) fn with_resolver<R>(&self, f: impl FnOnce(&mut RefResolver) -> R) -> R {
        let mut slot = self.shared.resolver.borrow_mut();
        let resolver = slot.get_or_insert_with(|| RefResolver::new(serde_json::Value::Null));
        f(resolver)
    }

    /// Install the resolution scope declared by `id`; the returned guard
    /// restores the previous scope on every exit path.
    pub(crate) fn push_scope(&self, id: &str) -> ScopeGuard {
        let previous = self.with_resolver(|r| r.update_resolution_scope(id));
        ScopeGuard {
            shared: self.shared.clone(),
            previous: Some(previous),
        }
    }

    /// Guard the current scope without changing it (reference descents).
    pub(crate) fn hold_scope(&self) -> ScopeGuard {
        let previous = self.with_resolver(|r| r.resolution_scope());
        ScopeGuard {
            shared: self.shared.clone(),
            previous: Some(previous),
        }
    }

    /// Compile (or fetch from the session cache) a pattern. Bad patterns are
    /// schema defects surfaced as generic invalid-data failures.
    pub(crate) fn compiled_regex(&self, pattern: &str) -> Result<Rc<Regex>, InvalidValue> {
        if let Some(found) = self.shared.regexes.borrow().get(pattern) {
            return Ok(found.clone());
        }
        let compiled = Regex::new(pattern).map_err(|e| {
            InvalidValue::new(
                ErrorKind::Invalid,
                format!("Invalid pattern {pattern:?}: {e}"),
            )
        })?;
        let compiled = Rc::new(compiled);
        self.shared
            .regexes
            .borrow_mut()
            .insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Resolve the destination binding through the substitution table.
    pub(crate) fn resolve_binding<'a>(&'a self, binding: Option<&'a str>) -> Option<&'a str> {
        let binding = binding?;
        match &self.class_mapping {
            Some(mapping) => Some(mapping.get(binding).map(String::as_str).unwrap_or(binding)),
            None => Some(binding),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Restores the resolution scope when dropped.
pub(crate) struct ScopeGuard {
    shared: Rc<SharedState>,
    previous: Option<String>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Some(resolver) = self.shared.resolver.borrow_mut().as_mut() {
                resolver.set_resolution_scope(previous);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_context_isolates_result_and_extends_path() {
        let mut ctx = Context::new();
        ctx.result = Some(Node::Null);
        let child = ctx.child("->properties:a");
        assert!(child.result.is_none());
        assert_eq!(child.path, "#->properties:a");
        assert_eq!(ctx.path, "#");
    }

    #[test]
    fn test_scope_guard_restores_on_drop() {
        let ctx = Context::new();
        ctx.root_resolver(serde_json::json!({}));
        {
            let _guard = ctx.push_scope("http://x.test/a.json");
            assert_eq!(
                ctx.with_resolver(|r| r.resolution_scope()),
                "http://x.test/a.json"
            );
        }
        assert_eq!(ctx.with_resolver(|r| r.resolution_scope()), "");
    }

    #[test]
    fn test_regex_cache_returns_shared_instances() {
        let ctx = Context::new();
        let a = ctx.compiled_regex("^a+$").unwrap();
        let b = ctx.compiled_regex("^a+$").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(ctx.compiled_regex("(unclosed").is_err());
    }
}
