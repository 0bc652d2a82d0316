#![allow(dead_code)]

use std::sync::Arc;

use cardindex_core::index::{LocalRunner, SearchIndex, SearchIndexBuilder};
use cardindex_core::realm::{MemoryReader, RealmPaths};
use url::Url;

pub const REALM: &str = "http://test/realm/";

pub const PET: &str = r#"
import { contains, field, Card } from 'https://cardstack.com/base/card-api';
import StringCard from 'https://cardstack.com/base/string';

export class Pet extends Card {
  @field firstName = contains(StringCard);
}
"#;

pub const DOG: &str = r#"
import { contains, field } from 'https://cardstack.com/base/card-api';
import StringCard from 'https://cardstack.com/base/string';
import NumberCard from 'https://cardstack.com/base/number';
import { Pet } from './pet';

export class Dog extends Pet {
  @field breed = contains(StringCard);
  @field age = contains(NumberCard);
}
"#;

/// A card instance document adopting from `module`/`name`.
pub fn instance(module: &str, name: &str, attributes: serde_json::Value) -> String {
    serde_json::json!({
        "data": {
            "type": "card",
            "attributes": attributes,
            "meta": { "adoptsFrom": { "module": module, "name": name } }
        }
    })
    .to_string()
}

/// An instance with one linked relationship.
pub fn linked_instance(module: &str, name: &str, field: &str, link: &str) -> String {
    serde_json::json!({
        "data": {
            "type": "card",
            "attributes": {},
            "relationships": { field: { "links": { "self": link } } },
            "meta": { "adoptsFrom": { "module": module, "name": name } }
        }
    })
    .to_string()
}

pub fn pet_realm() -> Arc<MemoryReader> {
    Arc::new(MemoryReader::with_files([
        ("pet.gts".to_string(), PET.to_string()),
        ("dog.gts".to_string(), DOG.to_string()),
        ("mango.json".to_string(), instance("./pet", "Pet", serde_json::json!({ "firstName": "Mango" }))),
        (
            "dogs/rex.json".to_string(),
            instance("../dog", "Dog", serde_json::json!({ "firstName": "Rex", "breed": "Lab", "age": 3 })),
        ),
        (
            "dogs/fido.json".to_string(),
            instance("../dog", "Dog", serde_json::json!({ "firstName": "Fido", "breed": "Poodle", "age": 7 })),
        ),
    ]))
}

pub fn builder(realm: &str, reader: Arc<MemoryReader>) -> SearchIndexBuilder {
    SearchIndex::builder(RealmPaths::parse(realm).unwrap(), reader).runner(Arc::new(LocalRunner))
}

pub fn url(path: &str) -> Url {
    Url::parse(REALM).unwrap().join(path).unwrap()
}

pub fn ids(document: &cardindex_core::card::CardCollectionDocument) -> Vec<String> {
    document.data.iter().filter_map(|r| r.id.clone()).collect()
}
