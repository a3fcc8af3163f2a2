//! JSON-LD context loading and the compaction round-trip check.
//!
//! Expansion and compaction are done by the [`json_ld`] crate. Context URLs
//! are resolved by a [`ContextLoader`], which is put behind the processor's
//! own [`Loader`] trait. Terms that the context does not define are dropped
//! during expansion and show up as a structural difference after compaction.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use iref::Iri;
use json_ld::{JsonLdProcessor, LoadError, Loader, RemoteDocument, RemoteDocumentReference};
use serde_json::{Map, Value};

use crate::error::Error;

pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const CREDENTIALS_EXAMPLES_V1_CONTEXT: &str =
    "https://www.w3.org/2018/credentials/examples/v1";
pub const ODRL_CONTEXT: &str = "https://www.w3.org/ns/odrl.jsonld";

fn load_static_context(json: &str) -> Value {
    // Embedded at build time.
    serde_json::from_str(json).expect("embedded context must be valid JSON")
}

lazy_static::lazy_static! {
    static ref CREDENTIALS_V1_CONTEXT_DOCUMENT: Value =
        load_static_context(vcdm_contexts::CREDENTIALS_V1);
    static ref CREDENTIALS_EXAMPLES_V1_CONTEXT_DOCUMENT: Value =
        load_static_context(vcdm_contexts::CREDENTIALS_EXAMPLES_V1);
    static ref ODRL_CONTEXT_DOCUMENT: Value = load_static_context(vcdm_contexts::ODRL);
}

/// Resolves a context URL to its document (an object with an `@context` member).
pub trait ContextLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<Value, Error>;
}

/// Serves the contexts embedded in this crate and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticLoader;

impl ContextLoader for StaticLoader {
    fn load(&self, url: &str) -> Result<Value, Error> {
        match url {
            CREDENTIALS_V1_CONTEXT => Ok(CREDENTIALS_V1_CONTEXT_DOCUMENT.clone()),
            CREDENTIALS_EXAMPLES_V1_CONTEXT => Ok(CREDENTIALS_EXAMPLES_V1_CONTEXT_DOCUMENT.clone()),
            ODRL_CONTEXT => Ok(ODRL_CONTEXT_DOCUMENT.clone()),
            _ => Err(Error::ContextLoading(format!("Unknown context: {}", url))),
        }
    }
}

/// Caller-supplied context documents, consulted before a fallback loader.
#[derive(Clone)]
pub struct ContextMap {
    documents: HashMap<String, Value>,
    fallback: Option<Arc<dyn ContextLoader>>,
}

impl ContextMap {
    /// A map that falls back to the embedded contexts.
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            fallback: Some(Arc::new(StaticLoader)),
        }
    }

    /// A map that knows only the documents added to it.
    pub fn without_fallback() -> Self {
        Self {
            documents: HashMap::new(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ContextLoader>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_context(mut self, url: impl Into<String>, document: Value) -> Self {
        self.documents.insert(url.into(), document);
        self
    }
}

impl Default for ContextMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextLoader for ContextMap {
    fn load(&self, url: &str) -> Result<Value, Error> {
        if let Some(document) = self.documents.get(url) {
            return Ok(document.clone());
        }
        match &self.fallback {
            Some(fallback) => fallback.load(url),
            None => Err(Error::ContextLoading(format!("Unknown context: {}", url))),
        }
    }
}

/// A [`ContextLoader`] seen through the [`Loader`] trait of `json-ld`.
///
/// The first failure of the wrapped loader is kept, so that it is reported as
/// is rather than wrapped in a processing error.
struct JsonLdLoader<'a> {
    loader: &'a dyn ContextLoader,
    failure: RefCell<Option<Error>>,
}

impl<'a> JsonLdLoader<'a> {
    fn new(loader: &'a dyn ContextLoader) -> Self {
        Self {
            loader,
            failure: RefCell::new(None),
        }
    }

    fn fetch(&self, url: &Iri) -> Result<json_syntax::Value, Error> {
        let document = self.loader.load(url.as_str())?;
        to_json_syntax(&document)
    }

    fn processing_error(&self, e: impl std::fmt::Display) -> Error {
        match self.failure.borrow_mut().take() {
            Some(failure) => failure,
            None => Error::JsonLd(e.to_string()),
        }
    }
}

impl Loader for JsonLdLoader<'_> {
    async fn load(&self, url: &Iri) -> Result<RemoteDocument, LoadError> {
        log::debug!("Loading JSON-LD context {}", url.as_str());
        match self.fetch(url) {
            Ok(document) => Ok(RemoteDocument::new(Some(url.to_owned()), None, document)),
            Err(e) => {
                let cause = Error::ContextLoading(e.to_string());
                self.failure.borrow_mut().get_or_insert(e);
                Err(LoadError::new(url.to_owned(), cause))
            }
        }
    }
}

fn to_json_syntax(value: &Value) -> Result<json_syntax::Value, Error> {
    json_syntax::to_value(value).map_err(|e| Error::JsonLd(e.to_string()))
}

/// Expand `document` and compact it again against its own top-level
/// `@context`.
pub fn compact(document: &Value, loader: &dyn ContextLoader) -> Result<Value, Error> {
    let context: json_ld::syntax::Context = match document.get("@context") {
        Some(context) => serde_json::from_value(context.clone())
            .map_err(|e| Error::InvalidContext(e.to_string()))?,
        None => json_ld::syntax::Context::Many(Vec::new()),
    };
    let input = RemoteDocument::new(None, None, to_json_syntax(document)?);
    let context = RemoteDocumentReference::Loaded(RemoteDocument::new(None, None, context));
    let loader = JsonLdLoader::new(loader);
    let compacted = async_std::task::block_on(input.compact(context, &loader))
        .map_err(|e| loader.processing_error(e))?;
    Ok(serde_json::to_value(&compacted)?)
}

/// Fail with [`Error::JsonLdInconsistent`] when compaction changes the shape
/// of `document`, i.e. when some property is not defined by its context.
pub fn check_equivalence(document: &Value, loader: &dyn ContextLoader) -> Result<(), Error> {
    let compacted = compact(document, loader)?;
    let fields = differing_fields(&normalize(document), &normalize(&compacted));
    if fields.is_empty() {
        Ok(())
    } else {
        log::debug!("JSON-LD compaction changed fields {:?}", fields);
        Err(Error::JsonLdInconsistent { fields })
    }
}

/// Drop `@context`, unwrap single-element arrays and the `{"id": x}` and
/// `{"@value": x}` objects.
fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let object: Map<String, Value> = object
                .iter()
                .filter(|(key, _)| key.as_str() != "@context")
                .map(|(key, value)| (key.clone(), normalize(value)))
                .collect();
            if object.len() == 1 {
                if let Some(value) = object.get("id").or_else(|| object.get("@value")) {
                    return value.clone();
                }
            }
            Value::Object(object)
        }
        Value::Array(items) if items.len() == 1 => normalize(&items[0]),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => other.clone(),
    }
}

fn same_structure(original: &Value, compacted: &Value) -> bool {
    match (original, compacted) {
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).map_or(false, |other| same_structure(value, other)))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_structure(x, y))
        }
        (Value::Object(_), _) | (_, Value::Object(_)) => false,
        (Value::Array(_), _) | (_, Value::Array(_)) => false,
        // values are rewritten by compaction; only shape matters
        _ => true,
    }
}

fn differing_fields(original: &Value, compacted: &Value) -> Vec<String> {
    let (original, compacted) = match (original, compacted) {
        (Value::Object(a), Value::Object(b)) => (a, b),
        _ => {
            return if same_structure(original, compacted) {
                Vec::new()
            } else {
                vec!["(root)".to_string()]
            }
        }
    };
    let mut fields: Vec<String> = original
        .iter()
        .filter(|(key, value)| {
            compacted
                .get(key.as_str())
                .map_or(true, |other| !same_structure(value, other))
        })
        .map(|(key, _)| key.clone())
        .collect();
    fields.extend(
        compacted
            .keys()
            .filter(|key| !original.contains_key(key.as_str()))
            .cloned(),
    );
    fields.sort();
    fields
}
