//! Turning a loaded instance into a search entry.

use std::collections::{BTreeSet, VecDeque};

use serde_json::Value;
use url::Url;

use super::state::{ModuleWithErrors, RunState, SearchEntry, SearchEntryWithErrors};
use crate::card::{CardRef, CardResource, SerializedError, internal_key_for};
use crate::realm::resolve_module;

/// Build the entry for an instance against the definitions of `state`.
pub fn entry_for(
    url: &Url,
    result: Result<CardResource, SerializedError>,
    state: &RunState,
) -> SearchEntryWithErrors {
    let resource = match result {
        Ok(resource) => resource,
        Err(error) => return SearchEntryWithErrors::Error { error },
    };

    let adopts = &resource.meta.adopts_from;
    let Some(module) = resolve_module(&adopts.module, url) else {
        return SearchEntryWithErrors::Error {
            error: SerializedError::new(
                400,
                "Invalid adoptsFrom",
                format!("cannot resolve module '{}' from {url}", adopts.module),
            ),
        };
    };

    let key = internal_key_for(&CardRef::exported(module.as_str(), &adopts.name), None);
    let mut deps = module_deps(&module, state);
    deps.extend(link_deps(url, &resource));

    let Some(types) = state.definitions.types_of(&key) else {
        tracing::warn!(instance = %url, card = %key, "instance adopts from an unknown card");
        return SearchEntryWithErrors::Error {
            error: SerializedError::new(404, "Card type not found", format!("no definition for {key}"))
                .with_deps(deps),
        };
    };
    for ancestor in &types {
        if let Some(module) = state.definitions.get(ancestor).and_then(|d| d.id.code_ref()) {
            deps.insert(module.module);
        }
    }

    let mut search_data = resource.attributes.clone();
    search_data.insert("id".to_string(), Value::String(url.to_string()));

    SearchEntryWithErrors::Entry {
        entry: Box::new(SearchEntry { resource, search_data, types, deps, html: None }),
    }
}

/// The adopted module plus every in-realm module it reaches through imports.
fn module_deps(module: &Url, state: &RunState) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    let mut queue = VecDeque::from([module.to_string()]);
    while let Some(next) = queue.pop_front() {
        if !deps.insert(next.clone()) {
            continue;
        }
        if let Some(ModuleWithErrors::Module(found)) = state.modules.get(&next) {
            for consumed in &found.consumes {
                if consumed.starts_with(state.realm_url.as_str()) {
                    queue.push_back(consumed.clone());
                }
            }
        }
    }
    deps
}

fn link_deps(url: &Url, resource: &CardResource) -> Vec<String> {
    resource
        .relationships
        .values()
        .filter_map(|r| r.links.self_link.as_deref())
        .filter_map(|link| url.join(link).ok())
        .map(|target| target.to_string())
        .collect()
}
