//! Classifying and loading one realm file.

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::card::{CardResource, SerializedError, SingleCardDocument, is_single_card_document};
use crate::index::Module;
use crate::module_syntax::ModuleSyntax;
use crate::realm::{
    INSTANCE_EXTENSION, Reader, ReaderError, RealmPaths, has_executable_extension,
    trim_instance_extension,
};
use crate::types::CARD_API_MODULE;

/// What a file turned out to be.
#[derive(Debug, Clone)]
pub enum Visited {
    Module { url: Url, result: Result<Module, SerializedError> },
    /// `url` is the instance URL, the file URL without `.json`.
    Instance { url: Url, result: Result<CardResource, SerializedError> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Module,
    Instance,
    Other,
}

pub fn classify(url: &Url) -> FileClass {
    if has_executable_extension(url.path()) {
        FileClass::Module
    } else if url.path().ends_with(INSTANCE_EXTENSION) {
        FileClass::Instance
    } else {
        FileClass::Other
    }
}

/// Load a file and turn it into a module or an instance.
///
/// `Ok(None)` covers missing files, files of no interest, and JSON documents
/// that are not card documents.
pub fn visit_file(
    paths: &RealmPaths,
    reader: &dyn Reader,
    url: &Url,
) -> Result<Option<Visited>, ReaderError> {
    let class = classify(url);
    if class == FileClass::Other {
        return Ok(None);
    }
    let Ok(local) = paths.local(url) else {
        return Ok(None);
    };
    if class == FileClass::Module && is_foundational_module(url) {
        return Ok(None);
    }
    let Some(file) = reader.read_file_as_text(&local)? else {
        return Ok(None);
    };

    Ok(match class {
        FileClass::Module => Some(Visited::Module { url: url.clone(), result: analyze_module(url, &file.content) }),
        FileClass::Instance => {
            let Some(instance_url) = trim_instance_extension(url) else {
                return Ok(None);
            };
            load_instance(&instance_url, &file.content, file.last_modified)
                .map(|result| Visited::Instance { url: instance_url, result })
        }
        FileClass::Other => None,
    })
}

/// The card-api module defines the root card and is never analyzed itself.
fn is_foundational_module(url: &Url) -> bool {
    url.as_str()
        .strip_prefix(CARD_API_MODULE)
        .is_some_and(|rest| rest.is_empty() || has_executable_extension(rest))
}

fn analyze_module(url: &Url, source: &str) -> Result<Module, SerializedError> {
    match ModuleSyntax::parse(source) {
        Ok(syntax) => Ok(Module {
            url: url.to_string(),
            consumes: syntax.consumes(url),
            syntax: Arc::new(syntax),
        }),
        Err(e) => {
            tracing::warn!(module = %url, error = %e, "module analysis failed");
            Err(SerializedError::new(400, "Module analysis failed", e.to_string()))
        }
    }
}

fn load_instance(
    url: &Url,
    content: &str,
    last_modified: i64,
) -> Option<Result<CardResource, SerializedError>> {
    let value: Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(instance = %url, error = %e, "instance is not valid JSON");
            return Some(Err(SerializedError::new(400, "Invalid JSON", e.to_string())));
        }
    };
    if !is_single_card_document(&value) {
        tracing::debug!(file = %url, "JSON file is not a card document");
        return None;
    }
    let document: SingleCardDocument = match serde_json::from_value(value) {
        Ok(document) => document,
        Err(e) => return Some(Err(SerializedError::new(400, "Invalid card document", e.to_string()))),
    };

    let mut resource = document.data;
    resource.id = Some(url.to_string());
    resource.meta.last_modified = Some(last_modified);
    Some(Ok(resource))
}
