//! Expansion of relationship links into included resources.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::card::{CardResource, ResourceIdentifier, ResourceType, SingleCardDocument};
use crate::index::{Indexer, IndexerError, SearchEntryWithErrors};
use crate::loader::{FetchError, Loader};
use crate::realm::RealmPaths;

/// Link chains longer than this are still marked on the relationship but no
/// longer expanded.
pub const MAX_LINK_DEPTH: usize = 5;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unable to load linked card {url} (status {status}): {message}")]
    Status { url: String, status: u16, message: String },

    #[error("linked card {url} is not a card document: {body}")]
    NotCardDocument { url: String, body: String },

    #[error("cannot resolve link '{link}' relative to {base}")]
    BadLink { link: String, base: String },

    #[error(transparent)]
    Indexer(#[from] IndexerError),
}

/// Resolves links locally through the indexer and remotely through the loader.
pub struct LinkResolver<'a> {
    paths: &'a RealmPaths,
    indexer: &'a dyn Indexer,
    loader: &'a dyn Loader,
}

impl<'a> LinkResolver<'a> {
    pub fn new(paths: &'a RealmPaths, indexer: &'a dyn Indexer, loader: &'a dyn Loader) -> Self {
        Self { paths, indexer, loader }
    }

    /// Expand the links of `resource`, appending newly found resources to
    /// `included`.
    ///
    /// Resources whose id is in `omit` are never included; the caller already
    /// holds them.
    pub fn load_links(
        &self,
        resource: &mut CardResource,
        omit: &[String],
        included: Vec<CardResource>,
    ) -> Result<Vec<CardResource>, LinkError> {
        let mut visited = HashSet::new();
        self.load(resource, omit, included, &mut visited, &[])
    }

    fn load(
        &self,
        resource: &mut CardResource,
        omit: &[String],
        mut included: Vec<CardResource>,
        visited: &mut HashSet<String>,
        stack: &[String],
    ) -> Result<Vec<CardResource>, LinkError> {
        if let Some(id) = &resource.id
            && !visited.insert(id.clone())
        {
            return Ok(Vec::new());
        }

        let base = match resource.id.as_deref().map(Url::parse) {
            Some(Ok(url)) => url,
            _ => self.paths.url().clone(),
        };

        let names: Vec<String> = resource.relationships.keys().cloned().collect();
        for name in names {
            let Some(link) = resource.relationships[&name].links.self_link.clone() else {
                continue;
            };
            let link_url = base.join(&link).map_err(|_| LinkError::BadLink {
                link: link.clone(),
                base: base.to_string(),
            })?;

            let mut found_links = false;
            let mut too_deep = false;
            if let Some(mut linked) = self.resolve(&link_url)? {
                if stack.len() > MAX_LINK_DEPTH {
                    too_deep = true;
                } else {
                    let mut nested_included = included.clone();
                    nested_included.push(linked.clone());
                    let mut nested_stack: Vec<String> = resource.id.iter().cloned().collect();
                    nested_stack.extend(stack.iter().cloned());

                    let nested = self.load(&mut linked, omit, nested_included, visited, &nested_stack)?;
                    for mut found in nested {
                        found_links = true;
                        if found.id == linked.id {
                            // carry the relationship data filled in while recursing
                            found = linked.clone();
                        }
                        let already = included.iter().any(|r| r.id == found.id);
                        if !already && !found.id.as_ref().is_some_and(|id| omit.contains(id)) {
                            included.push(found.with_self_link());
                        }
                    }
                }
            }

            // past the depth limit the target exists but is not inlined
            let relationship_id = link_url.to_string();
            let satisfiable = found_links
                || too_deep
                || omit.contains(&relationship_id)
                || included.iter().any(|r| r.id.as_deref() == Some(relationship_id.as_str()));
            if satisfiable && let Some(relationship) = resource.relationships.get_mut(&name) {
                relationship.data =
                    Some(ResourceIdentifier { resource_type: ResourceType::Card, id: relationship_id });
            }
        }
        Ok(included)
    }

    fn resolve(&self, url: &Url) -> Result<Option<CardResource>, LinkError> {
        if self.paths.in_realm(url) {
            return Ok(match self.indexer.get_card(url)? {
                Some(SearchEntryWithErrors::Entry { entry }) => Some(entry.resource.with_self_link()),
                _ => None,
            });
        }

        let response = self.loader.fetch(url)?;
        if !response.ok() {
            return Err(LinkError::Status {
                url: url.to_string(),
                status: response.status,
                message: response.error_message().unwrap_or_default(),
            });
        }
        match serde_json::from_value::<SingleCardDocument>(response.body.clone()) {
            Ok(document) => Ok(Some(document.data.with_self_link())),
            Err(_) => Err(LinkError::NotCardDocument {
                url: url.to_string(),
                body: compact(&response.body),
            }),
        }
    }
}

fn compact(body: &Value) -> String {
    let text = body.to_string();
    match text.char_indices().nth(200) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
