//! JSON:API shaped card documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::CodeRef;

/// The only resource type an instance document may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    #[default]
    Card,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMeta {
    pub adopts_from: CodeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(rename = "self", default)]
    pub self_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub links: Links,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResourceIdentifier>,
}

/// A single card instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Relationship>,
    pub meta: CardMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl CardResource {
    /// Copy of the resource with `links.self` pointing at its id.
    pub fn with_self_link(&self) -> CardResource {
        let mut resource = self.clone();
        resource.links = Some(Links { self_link: resource.id.clone() });
        resource
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleCardDocument {
    pub data: CardResource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<CardResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardCollectionDocument {
    pub data: Vec<CardResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<CardResource>,
}

pub fn is_card_resource(value: &Value) -> bool {
    serde_json::from_value::<CardResource>(value.clone()).is_ok()
}

pub fn is_single_card_document(value: &Value) -> bool {
    serde_json::from_value::<SingleCardDocument>(value.clone()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dog() -> Value {
        json!({
            "data": {
                "type": "card",
                "attributes": { "firstName": "Mango" },
                "relationships": {
                    "owner": { "links": { "self": "../Person/hassan" } }
                },
                "meta": { "adoptsFrom": { "module": "../dog", "name": "Dog" } }
            }
        })
    }

    #[test]
    fn test_parses_single_card_document() {
        let doc: SingleCardDocument = serde_json::from_value(dog()).unwrap();
        assert_eq!(doc.data.attributes["firstName"], "Mango");
        assert_eq!(doc.data.meta.adopts_from, CodeRef::new("../dog", "Dog"));
        assert_eq!(
            doc.data.relationships["owner"].links.self_link.as_deref(),
            Some("../Person/hassan")
        );
        assert!(is_single_card_document(&dog()));
    }

    #[test]
    fn test_rejects_wrong_resource_type() {
        let mut value = dog();
        value["data"]["type"] = json!("module");
        assert!(!is_single_card_document(&value));
        assert!(!is_card_resource(&value["data"]));
    }

    #[test]
    fn test_rejects_missing_adopts_from() {
        let value = json!({ "type": "card", "meta": {} });
        assert!(!is_card_resource(&value));
    }

    #[test]
    fn test_with_self_link() {
        let doc: SingleCardDocument = serde_json::from_value(dog()).unwrap();
        let mut resource = doc.data;
        resource.id = Some("http://r/Dog/mango".into());
        let linked = resource.with_self_link();
        assert_eq!(linked.links.unwrap().self_link.as_deref(), Some("http://r/Dog/mango"));
    }
}
