//! Reference resolution
//!
//! Resolves `$ref` targets against a base-URI resolution scope. One resolver
//! lives for one import/compile session; identical targets resolve to the
//! same [`Reference`] instance, whose imported-result slot is what breaks
//! reference cycles and dedups shared substructures.
//!
//! Lookup order for a resolved URI: explicitly registered `$id` anchors (a
//! pre-registration walk collects them at session start), the root document,
//! previously fetched documents, then the pluggable remote provider.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::trace;
use url::Url;

use crate::error::SchemaError;
use crate::path;
use crate::schema::{SchemaRef, Version, PROP_ID, PROP_ID_D4};
use crate::value::Node;

/// Synchronous provider for non-local reference targets.
pub trait RemoteRefProvider {
    /// Return the raw document for `uri`, or `None` when unavailable.
    fn fetch(&self, uri: &str) -> Option<Value>;
}

/// A cached import result. Schema compilation caches compiled nodes; data
/// import caches marshalled values.
#[derive(Clone)]
pub(crate) enum Imported {
    Data(Node),
    Schema(SchemaRef),
}

/// A resolved reference target.
pub struct Reference {
    uri: String,
    data: Value,
    imported: RefCell<Option<Imported>>,
}

impl Reference {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Raw data at the target.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub(crate) fn imported(&self) -> Option<Imported> {
        self.imported.borrow().clone()
    }

    pub(crate) fn set_imported(&self, value: Imported) {
        *self.imported.borrow_mut() = Some(value);
    }

    pub(crate) fn clear_imported(&self) {
        *self.imported.borrow_mut() = None;
    }
}

/// Session-scoped reference resolver.
pub struct RefResolver {
    root_data: Rc<Value>,
    scope: String,
    /// Absolute URI → registered subdocument (`$id` anchors).
    ids: HashMap<String, Value>,
    /// Fetched remote documents by document URI.
    documents: HashMap<String, Rc<Value>>,
    references: HashMap<String, Rc<Reference>>,
    remote: Option<Rc<dyn RemoteRefProvider>>,
}

impl RefResolver {
    pub fn new(root_data: Value) -> Self {
        Self {
            root_data: Rc::new(root_data),
            scope: String::new(),
            ids: HashMap::new(),
            documents: HashMap::new(),
            references: HashMap::new(),
            remote: None,
        }
    }

    pub fn set_root_data(&mut self, data: Value) {
        self.root_data = Rc::new(data);
    }

    pub fn set_remote_provider(&mut self, provider: Rc<dyn RemoteRefProvider>) {
        self.remote = Some(provider);
    }

    pub fn resolution_scope(&self) -> String {
        self.scope.clone()
    }

    pub fn set_resolution_scope(&mut self, scope: String) {
        self.scope = scope;
    }

    /// Install the scope declared by `id` and return the previous scope for
    /// the caller's guard to restore.
    pub fn update_resolution_scope(&mut self, id: &str) -> String {
        let new_scope = resolve_uri(id, &self.scope);
        trace!(scope = %new_scope, "resolution scope updated");
        std::mem::replace(&mut self.scope, new_scope)
    }

    /// Walk a document and register every `$id`/`id`-anchored subtree under
    /// its absolute URI, so references by identifier resolve later.
    pub fn pre_process_references(&mut self, data: &Value, version: Version) {
        let scope = self.scope.clone();
        self.register_ids(data, &scope, version);
    }

    fn register_ids(&mut self, data: &Value, scope: &str, version: Version) {
        match data {
            Value::Array(items) => {
                for item in items {
                    self.register_ids(item, scope, version);
                }
            }
            Value::Object(map) => {
                let mut scope = scope.to_string();
                let id = declared_id(map, version);
                if let Some(id) = id {
                    let absolute = resolve_uri(id, &scope);
                    self.ids.insert(absolute.clone(), data.clone());
                    scope = absolute;
                }
                for value in map.values() {
                    self.register_ids(value, &scope, version);
                }
            }
            _ => {}
        }
    }

    /// Resolve `reference` against the current scope. The scope moves to the
    /// resolved target (callers guard and restore around the descent).
    pub fn resolve_reference(&mut self, reference: &str) -> Result<Rc<Reference>, SchemaError> {
        let absolute = resolve_uri(reference, &self.scope);
        if let Some(found) = self.references.get(&absolute).cloned() {
            self.scope = absolute;
            return Ok(found);
        }
        trace!(reference, %absolute, "resolving reference");
        let data = self.locate(&absolute)?;
        let resolved = Rc::new(Reference {
            uri: absolute.clone(),
            data,
            imported: RefCell::new(None),
        });
        self.references.insert(absolute.clone(), resolved.clone());
        self.scope = absolute;
        Ok(resolved)
    }

    fn locate(&mut self, absolute: &str) -> Result<Value, SchemaError> {
        // Registered anchors win: they may name a subtree directly.
        if let Some(found) = self.ids.get(absolute) {
            return Ok(found.clone());
        }
        let (document_uri, fragment) = split_fragment(absolute);
        let document = self.document(document_uri)?;
        if fragment.is_empty() {
            return Ok((*document).clone());
        }
        if fragment.starts_with('/') {
            return path::pointer_get(&document, fragment)
                .cloned()
                .ok_or_else(|| SchemaError::UnresolvedReference(absolute.to_string()));
        }
        Err(SchemaError::UnresolvedReference(absolute.to_string()))
    }

    fn document(&mut self, uri: &str) -> Result<Rc<Value>, SchemaError> {
        if uri.is_empty() {
            return Ok(self.root_data.clone());
        }
        if let Some(found) = self.ids.get(uri) {
            return Ok(Rc::new(found.clone()));
        }
        if let Some(found) = self.documents.get(uri) {
            return Ok(found.clone());
        }
        let provider = self
            .remote
            .clone()
            .ok_or_else(|| SchemaError::UnresolvedReference(uri.to_string()))?;
        trace!(uri, "fetching remote document");
        let fetched = provider
            .fetch(uri)
            .ok_or_else(|| SchemaError::UnresolvedReference(uri.to_string()))?;
        // Register the fetched document's own anchors under its URI.
        self.register_ids(&fetched, uri, Version::Auto);
        let fetched = Rc::new(fetched);
        self.documents.insert(uri.to_string(), fetched.clone());
        Ok(fetched)
    }
}

fn declared_id(map: &serde_json::Map<String, Value>, version: Version) -> Option<&str> {
    if version.accepts_dollar_id() {
        if let Some(Value::String(id)) = map.get(PROP_ID) {
            return Some(id);
        }
    }
    if version.accepts_plain_id() {
        if let Some(Value::String(id)) = map.get(PROP_ID_D4) {
            return Some(id);
        }
    }
    None
}

fn split_fragment(uri: &str) -> (&str, &str) {
    match uri.find('#') {
        Some(i) => (&uri[..i], &uri[i + 1..]),
        None => (uri, ""),
    }
}

fn has_scheme(uri: &str) -> bool {
    uri.split_once(':').is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
            && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
    })
}

/// Resolve a (possibly relative) reference against a base URI. Handles the
/// fragment-only and relative-path forms schema documents use without
/// requiring the base to be an absolute URL.
pub(crate) fn resolve_uri(reference: &str, base: &str) -> String {
    let reference = normalize(reference);
    if reference.is_empty() {
        return base.to_string();
    }
    if let Some(fragment) = reference.strip_prefix('#') {
        let (base_doc, _) = split_fragment(base);
        if fragment.is_empty() {
            return base_doc.to_string();
        }
        return format!("{base_doc}#{fragment}");
    }
    if has_scheme(reference) {
        return reference.to_string();
    }
    let (base_doc, _) = split_fragment(base);
    if let Ok(base_url) = Url::parse(base_doc) {
        if let Ok(joined) = base_url.join(reference) {
            return normalize(joined.as_str()).to_string();
        }
    }
    // Plain relative join: replace everything after the last path separator.
    match base_doc.rfind('/') {
        Some(i) => format!("{}{}", &base_doc[..=i], reference),
        None => reference.to_string(),
    }
}

fn normalize(uri: &str) -> &str {
    uri.strip_suffix('#').unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_uri_forms() {
        assert_eq!(resolve_uri("#/definitions/a", ""), "#/definitions/a");
        assert_eq!(
            resolve_uri("#/a", "http://x.test/root.json"),
            "http://x.test/root.json#/a"
        );
        assert_eq!(
            resolve_uri("other.json", "http://x.test/dir/root.json"),
            "http://x.test/dir/other.json"
        );
        assert_eq!(
            resolve_uri("http://y.test/s.json#", "http://x.test/root.json"),
            "http://y.test/s.json"
        );
        assert_eq!(resolve_uri("folder/item.json", "entry.json"), "folder/item.json");
    }

    #[test]
    fn test_same_target_resolves_to_same_reference() {
        let mut resolver = RefResolver::new(json!({"a": {"type": "string"}}));
        let first = resolver.resolve_reference("#/a").unwrap();
        resolver.set_resolution_scope(String::new());
        let second = resolver.resolve_reference("#/a").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.data(), &json!({"type": "string"}));
    }

    #[test]
    fn test_registered_id_subtrees_resolve_by_identifier() {
        let doc = json!({
            "definitions": {
                "entry": {"$id": "http://x.test/entry.json", "type": "integer"}
            }
        });
        let mut resolver = RefResolver::new(doc.clone());
        resolver.pre_process_references(&doc, Version::Auto);
        let found = resolver.resolve_reference("http://x.test/entry.json").unwrap();
        assert_eq!(
            found.data(),
            &json!({"$id": "http://x.test/entry.json", "type": "integer"})
        );
    }

    #[test]
    fn test_unresolvable_reference_is_an_error() {
        let mut resolver = RefResolver::new(json!({}));
        assert!(matches!(
            resolver.resolve_reference("#/missing"),
            Err(SchemaError::UnresolvedReference(_))
        ));
        assert!(matches!(
            resolver.resolve_reference("http://remote.test/s.json"),
            Err(SchemaError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_update_resolution_scope_returns_previous() {
        let mut resolver = RefResolver::new(json!({}));
        resolver.set_resolution_scope("http://x.test/root.json".to_string());
        let prev = resolver.update_resolution_scope("sub/folder.json");
        assert_eq!(prev, "http://x.test/root.json");
        assert_eq!(resolver.resolution_scope(), "http://x.test/sub/folder.json");
        resolver.set_resolution_scope(prev);
        assert_eq!(resolver.resolution_scope(), "http://x.test/root.json");
    }
}
