//! Card definitions owned by other realms.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use super::definition::{CardDefinition, Definitions};
use super::errors::DefinitionError;
use crate::card::{CardRef, internal_key_for};
use crate::loader::Loader;

/// Remote definitions cached per realm and realm version.
///
/// Entries for a realm are dropped as soon as its version changes. Realms
/// that report no version are only cached for the duration of one run.
#[derive(Debug, Default)]
pub struct TypeCache {
    realms: Mutex<HashMap<String, CachedRealm>>,
}

#[derive(Debug, Default)]
struct CachedRealm {
    version: Option<u64>,
    definitions: HashMap<String, Arc<CardDefinition>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, realm: &Url, version: Option<u64>, key: &str) -> Option<Arc<CardDefinition>> {
        let realms = self.realms.lock();
        let cached = realms.get(realm.as_str())?;
        if cached.version != version {
            return None;
        }
        cached.definitions.get(key).cloned()
    }

    pub fn put(&self, realm: &Url, version: Option<u64>, definition: Arc<CardDefinition>) {
        let mut realms = self.realms.lock();
        let cached = realms.entry(realm.to_string()).or_default();
        if cached.version != version {
            cached.definitions.clear();
            cached.version = version;
        }
        cached.definitions.insert(definition.key.clone(), definition);
    }

    /// Drop realms with no known version. Called at the start of each run.
    pub fn forget_unversioned(&self) {
        self.realms.lock().retain(|_, cached| cached.version.is_some());
    }

    pub fn len(&self) -> usize {
        self.realms.lock().values().map(|c| c.definitions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the `_typeOf` lookup URL for an exported card of `realm`.
pub fn type_of_url(realm: &Url, module: &str, name: &str) -> Option<Url> {
    let mut url = realm.join("_typeOf").ok()?;
    url.query_pairs_mut()
        .append_pair("type", "exportedCard")
        .append_pair("module", module)
        .append_pair("name", name);
    Some(url)
}

/// Fetches definitions from the realm that owns a module.
pub struct RemoteTypes<'a> {
    loader: &'a dyn Loader,
    cache: &'a TypeCache,
    realms: &'a [Url],
}

impl<'a> RemoteTypes<'a> {
    /// `realms` lists every realm this index may consult, base realm included.
    pub fn new(loader: &'a dyn Loader, cache: &'a TypeCache, realms: &'a [Url]) -> Self {
        Self { loader, cache, realms }
    }

    fn realm_for(&self, module: &Url) -> Option<&Url> {
        self.realms
            .iter()
            .filter(|realm| module.as_str().starts_with(realm.as_str()))
            .max_by_key(|realm| realm.as_str().len())
    }

    /// Definition of `name` exported by a module of another realm.
    ///
    /// The definition is added to `definitions` together with whatever it
    /// reaches through its super chain and fields.
    pub fn definition(
        &self,
        module: &Url,
        name: &str,
        definitions: &mut Definitions,
    ) -> Result<Arc<CardDefinition>, DefinitionError> {
        let card_ref = CardRef::exported(module.as_str(), name);
        let key = internal_key_for(&card_ref, None);
        if let Some(definition) = definitions.get(&key) {
            return Ok(definition.clone());
        }

        let realm = self
            .realm_for(module)
            .ok_or_else(|| DefinitionError::UnknownRealm(module.to_string()))?;
        let version = self.loader.realm_version(realm);

        let definition = match self.cache.get(realm, version, &key) {
            Some(definition) => definition,
            None => {
                let definition = Arc::new(self.fetch(realm, module, name)?);
                self.cache.put(realm, version, definition.clone());
                definition
            }
        };

        definitions.insert(definition.clone());
        if definition.key != key {
            definitions.alias(key, definition.clone());
        }
        self.complete(&definition, definitions)?;
        Ok(definition)
    }

    fn fetch(&self, realm: &Url, module: &Url, name: &str) -> Result<CardDefinition, DefinitionError> {
        let url = type_of_url(realm, module.as_str(), name)
            .ok_or_else(|| DefinitionError::UnresolvableModule(module.to_string()))?;
        tracing::debug!(url = %url, "fetching remote card definition");

        let response = self.loader.fetch(&url)?;
        if !response.ok() {
            return Err(DefinitionError::TypeLookup { url: url.to_string(), status: response.status });
        }
        CardDefinition::from_document(&response.body)
            .map_err(|source| DefinitionError::InvalidDefinition { url: url.to_string(), source })
    }

    /// Pull in the exported cards a fetched definition refers to.
    fn complete(
        &self,
        definition: &CardDefinition,
        definitions: &mut Definitions,
    ) -> Result<(), DefinitionError> {
        let referenced = definition
            .super_ref
            .iter()
            .chain(definition.fields.values().map(|f| &f.field_card));
        for card_ref in referenced {
            if definitions.get_ref(card_ref).is_some() {
                continue;
            }
            let CardRef::ExportedCard { module, name } = card_ref else {
                tracing::debug!(card = %definition.key, "remote card refers to a non-exported card");
                continue;
            };
            let Ok(module) = Url::parse(module) else {
                return Err(DefinitionError::UnresolvableModule(module.clone()));
            };
            self.definition(&module, name, definitions)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardRef;

    #[test]
    fn test_type_of_url() {
        let realm = Url::parse("http://other/realm/").unwrap();
        let url = type_of_url(&realm, "http://other/realm/pet", "Pet").unwrap();
        assert_eq!(
            url.as_str(),
            "http://other/realm/_typeOf?type=exportedCard&module=http%3A%2F%2Fother%2Frealm%2Fpet&name=Pet"
        );
    }

    #[test]
    fn test_cache_invalidated_by_version() {
        let cache = TypeCache::new();
        let realm = Url::parse("http://other/realm/").unwrap();
        let definition = Arc::new(CardDefinition::new(
            CardRef::exported("http://other/realm/pet", "Pet"),
            None,
        ));
        cache.put(&realm, Some(1), definition.clone());

        assert!(cache.get(&realm, Some(1), &definition.key).is_some());
        assert!(cache.get(&realm, Some(2), &definition.key).is_none());

        cache.put(&realm, Some(2), definition.clone());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unversioned_entries_are_forgotten() {
        let cache = TypeCache::new();
        let realm = Url::parse("http://other/realm/").unwrap();
        let definition =
            Arc::new(CardDefinition::new(CardRef::exported("http://other/realm/pet", "Pet"), None));
        cache.put(&realm, None, definition.clone());
        assert!(cache.get(&realm, None, &definition.key).is_some());

        cache.forget_unversioned();
        assert!(cache.is_empty());
    }
}
