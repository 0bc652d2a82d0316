//! Card definitions and the resolved definition graph.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::card::{CardRef, internal_key_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Contains,
    ContainsMany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub field_type: FieldType,
    pub field_card: CardRef,
}

/// The resolved shape of a card type.
///
/// `fields` includes everything inherited from the super chain; a field
/// declared by the card itself replaces an inherited one of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDefinition {
    pub id: CardRef,
    pub key: String,
    pub super_ref: Option<CardRef>,
    pub fields: BTreeMap<String, FieldDefinition>,
}

impl CardDefinition {
    pub fn new(id: CardRef, super_ref: Option<CardRef>) -> Self {
        let key = internal_key_for(&id, None);
        Self { id, key, super_ref, fields: BTreeMap::new() }
    }

    /// Render as a `card-definition` resource document.
    pub fn to_document(&self) -> Value {
        let mut relationships = BTreeMap::new();
        relationships.insert(
            "_super".to_string(),
            self.super_ref.as_ref().map(|r| DefinitionRelationship {
                meta: RelationshipMeta::Super { card_ref: r.clone() },
            }),
        );
        for (name, field) in &self.fields {
            let meta = match field.field_type {
                FieldType::Contains => RelationshipMeta::Contains { card_ref: field.field_card.clone() },
                FieldType::ContainsMany => {
                    RelationshipMeta::ContainsMany { card_ref: field.field_card.clone() }
                }
            };
            relationships.insert(name.clone(), Some(DefinitionRelationship { meta }));
        }

        let document = DefinitionDocument {
            data: DefinitionResource {
                id: self.key.clone(),
                resource_type: DefinitionType::CardDefinition,
                attributes: DefinitionAttributes { card_ref: self.id.clone() },
                relationships,
            },
        };
        serde_json::to_value(document).unwrap_or(Value::Null)
    }

    /// Parse a `card-definition` resource document.
    pub fn from_document(value: &Value) -> Result<Self, serde_json::Error> {
        let document = DefinitionDocument::deserialize(value)?;
        let resource = document.data;

        let mut definition = CardDefinition::new(resource.attributes.card_ref, None);
        for (name, relationship) in resource.relationships {
            let Some(relationship) = relationship else { continue };
            match relationship.meta {
                RelationshipMeta::Super { card_ref } => definition.super_ref = Some(card_ref),
                RelationshipMeta::Contains { card_ref } => {
                    definition.fields.insert(
                        name,
                        FieldDefinition { field_type: FieldType::Contains, field_card: card_ref },
                    );
                }
                RelationshipMeta::ContainsMany { card_ref } => {
                    definition.fields.insert(
                        name,
                        FieldDefinition { field_type: FieldType::ContainsMany, field_card: card_ref },
                    );
                }
            }
        }
        Ok(definition)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DefinitionDocument {
    data: DefinitionResource,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum DefinitionType {
    CardDefinition,
}

#[derive(Debug, Serialize, Deserialize)]
struct DefinitionResource {
    id: String,
    #[serde(rename = "type")]
    resource_type: DefinitionType,
    attributes: DefinitionAttributes,
    #[serde(default)]
    relationships: BTreeMap<String, Option<DefinitionRelationship>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DefinitionAttributes {
    #[serde(rename = "cardRef")]
    card_ref: CardRef,
}

#[derive(Debug, Serialize, Deserialize)]
struct DefinitionRelationship {
    meta: RelationshipMeta,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum RelationshipMeta {
    Super {
        #[serde(rename = "ref")]
        card_ref: CardRef,
    },
    Contains {
        #[serde(rename = "ref")]
        card_ref: CardRef,
    },
    ContainsMany {
        #[serde(rename = "ref")]
        card_ref: CardRef,
    },
}

/// Card definitions keyed by internal key.
///
/// A definition may be reachable under more than one key: a card requested
/// through a non-exported reference is aliased to its exported identity.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    by_key: HashMap<String, Arc<CardDefinition>>,
}

impl Definitions {
    pub fn get(&self, key: &str) -> Option<&Arc<CardDefinition>> {
        self.by_key.get(key)
    }

    pub fn get_ref(&self, card_ref: &CardRef) -> Option<&Arc<CardDefinition>> {
        self.get(&internal_key_for(card_ref, None))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Insert under the definition's own key.
    pub fn insert(&mut self, definition: Arc<CardDefinition>) {
        self.by_key.insert(definition.key.clone(), definition);
    }

    /// Make `definition` reachable under an extra key.
    pub fn alias(&mut self, key: String, definition: Arc<CardDefinition>) {
        self.by_key.insert(key, definition);
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<CardDefinition>)> {
        self.by_key.iter()
    }

    /// Keys of the card and every ancestor, nearest first.
    ///
    /// Returns `None` when the card itself is unknown. A chain that leaves the
    /// known definitions stops at the last known ancestor.
    pub fn types_of(&self, key: &str) -> Option<Vec<String>> {
        let mut definition = self.get(key)?;
        let mut types = vec![definition.key.clone()];
        let mut seen = HashSet::from([definition.key.clone()]);
        while let Some(super_ref) = &definition.super_ref {
            let Some(parent) = self.get_ref(super_ref) else { break };
            if !seen.insert(parent.key.clone()) {
                break;
            }
            types.push(parent.key.clone());
            definition = parent;
        }
        Some(types)
    }

    /// Exported cards declared by `module`, ordered by export name.
    pub fn exported_cards_of(&self, module: &str) -> Vec<CardRef> {
        let mut cards: Vec<CardRef> = self
            .by_key
            .values()
            .filter(|def| {
                matches!(&def.id, CardRef::ExportedCard { module: m, .. } if m == module)
            })
            .map(|def| def.id.clone())
            .collect();
        cards.sort_by_key(|r| internal_key_for(r, None));
        cards.dedup();
        cards
    }
}
