//! Fetching from realms.
//!
//! The index reaches other realms (for remote card definitions and remote
//! links) only through a [`Loader`].

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::card::{CardRef, SingleCardDocument};
use crate::index::{CardLookup, SearchIndex};
use crate::types::{self, BASE_REALM, CardDefinition};

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("no realm answers for {0}")]
    Unreachable(String),

    #[error("request to {url} failed: {message}")]
    Failed { url: String, message: String },
}

/// A realm's answer to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Value,
}

impl FetchResponse {
    pub fn ok_json(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, title: &str, message: &str) -> Self {
        Self {
            status,
            body: json!({ "errors": [{ "status": status, "title": title, "message": message }] }),
        }
    }

    pub fn not_found(url: &Url) -> Self {
        Self::error(404, "Not Found", &format!("{url} not found"))
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First error message in a JSON:API error body.
    pub fn error_message(&self) -> Option<String> {
        self.body["errors"][0]["message"].as_str().map(str::to_string)
    }
}

pub trait Loader: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError>;

    /// Monotonic version of a realm's published index, when known.
    fn realm_version(&self, _realm: &Url) -> Option<u64> {
        None
    }

    /// Normalize a query value for comparison against instances of
    /// `field_card`.
    fn format_query_value(&self, field_card: &CardRef, value: &Value) -> Value {
        types::format_query_value(field_card, value)
    }
}

/// Routes requests to the base realm and to registered in-process indexes.
#[derive(Default)]
pub struct RealmLoader {
    realms: RwLock<Vec<(Url, Weak<SearchIndex>)>>,
}

impl RealmLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `index` for requests under its realm URL.
    pub fn register(&self, index: &Arc<SearchIndex>) {
        let url = index.realm_url().clone();
        let mut realms = self.realms.write();
        realms.retain(|(realm, existing)| realm != &url && existing.strong_count() > 0);
        realms.push((url, Arc::downgrade(index)));
    }

    fn index_for(&self, url: &Url) -> Option<Arc<SearchIndex>> {
        self.realms
            .read()
            .iter()
            .filter(|(realm, _)| url.as_str().starts_with(realm.as_str()))
            .max_by_key(|(realm, _)| realm.as_str().len())
            .and_then(|(_, index)| index.upgrade())
    }
}

/// Parse `_typeOf?type=exportedCard&module=..&name=..` query parameters.
fn type_of_query(url: &Url) -> Option<CardRef> {
    let mut module = None;
    let mut name = None;
    let mut kind = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "type" => kind = Some(value.into_owned()),
            "module" => module = Some(value.into_owned()),
            "name" => name = Some(value.into_owned()),
            _ => {}
        }
    }
    match kind.as_deref() {
        Some("exportedCard") | None => Some(CardRef::exported(module?, name?)),
        _ => None,
    }
}

fn is_type_of_request(url: &Url) -> bool {
    url.path().ends_with("/_typeOf")
}

fn definition_response(url: &Url, definition: Option<Value>) -> FetchResponse {
    match definition {
        Some(body) => FetchResponse::ok_json(body),
        None => FetchResponse::not_found(url),
    }
}

impl Loader for RealmLoader {
    fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        if url.as_str().starts_with(BASE_REALM.as_str()) && self.index_for(url).is_none() {
            if !is_type_of_request(url) {
                return Ok(FetchResponse::not_found(url));
            }
            let definition = type_of_query(url).and_then(|card_ref| {
                types::base_definitions()
                    .into_iter()
                    .find(|d| d.id == card_ref)
                    .map(|d: CardDefinition| d.to_document())
            });
            return Ok(definition_response(url, definition));
        }

        let index = self.index_for(url).ok_or_else(|| FetchError::Unreachable(url.to_string()))?;

        if is_type_of_request(url) {
            let definition = type_of_query(url).and_then(|card_ref| index.type_of_document(&card_ref));
            return Ok(definition_response(url, definition));
        }

        let lookup = index.card(url, false).map_err(|e| FetchError::Failed {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(match lookup {
            Some(CardLookup::Doc(doc)) => {
                let body = serde_json::to_value::<SingleCardDocument>(doc).map_err(|e| {
                    FetchError::Failed { url: url.to_string(), message: e.to_string() }
                })?;
                FetchResponse::ok_json(body)
            }
            Some(CardLookup::Error(error)) => {
                FetchResponse::error(error.status, &error.title, &error.message)
            }
            None => FetchResponse::not_found(url),
        })
    }

    fn realm_version(&self, realm: &Url) -> Option<u64> {
        self.index_for(realm).map(|index| index.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::root_card_ref;

    #[test]
    fn test_serves_base_realm_definitions() {
        let loader = RealmLoader::new();
        let url = types::type_of_url(&BASE_REALM, types::CARD_API_MODULE, "Card").unwrap();
        let response = loader.fetch(&url).unwrap();
        assert!(response.ok());
        let definition = CardDefinition::from_document(&response.body).unwrap();
        assert_eq!(definition.id, root_card_ref());
    }

    #[test]
    fn test_unknown_base_type_is_not_found() {
        let loader = RealmLoader::new();
        let url = types::type_of_url(&BASE_REALM, "https://cardstack.com/base/nope", "X").unwrap();
        assert_eq!(loader.fetch(&url).unwrap().status, 404);
    }

    #[test]
    fn test_unregistered_realm_is_unreachable() {
        let loader = RealmLoader::new();
        let url = Url::parse("http://elsewhere/realm/card").unwrap();
        assert!(matches!(loader.fetch(&url), Err(FetchError::Unreachable(_))));
    }

    #[test]
    fn test_type_of_query() {
        let url = Url::parse("http://x/_typeOf?type=exportedCard&module=http%3A%2F%2Fx%2Fpet&name=Pet")
            .unwrap();
        assert_eq!(type_of_query(&url), Some(CardRef::exported("http://x/pet", "Pet")));
        assert!(is_type_of_request(&url));
    }
}
