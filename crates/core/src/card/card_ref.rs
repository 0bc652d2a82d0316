//! References to card types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// A named export of a module: `{ module, name }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeRef {
    pub module: String,
    pub name: String,
}

impl CodeRef {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self { module: module.into(), name: name.into() }
    }
}

/// Identifies a card type, possibly one that is not exported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CardRef {
    ExportedCard { module: String, name: String },
    AncestorOf { card: Box<CardRef> },
    FieldOf { card: Box<CardRef>, field: String },
}

impl CardRef {
    pub fn exported(module: impl Into<String>, name: impl Into<String>) -> Self {
        CardRef::ExportedCard { module: module.into(), name: name.into() }
    }

    pub fn ancestor_of(card: CardRef) -> Self {
        CardRef::AncestorOf { card: Box::new(card) }
    }

    pub fn field_of(card: CardRef, field: impl Into<String>) -> Self {
        CardRef::FieldOf { card: Box::new(card), field: field.into() }
    }

    /// The `{ module, name }` pair, if this is an exported reference.
    pub fn code_ref(&self) -> Option<CodeRef> {
        match self {
            CardRef::ExportedCard { module, name } => Some(CodeRef::new(module, name)),
            _ => None,
        }
    }

    /// Make every module in the reference absolute relative to `base`.
    pub fn resolved(&self, base: &Url) -> CardRef {
        match self {
            CardRef::ExportedCard { module, name } => {
                CardRef::exported(absolute_module(module, Some(base)), name)
            }
            CardRef::AncestorOf { card } => CardRef::ancestor_of(card.resolved(base)),
            CardRef::FieldOf { card, field } => CardRef::field_of(card.resolved(base), field),
        }
    }
}

impl From<&CodeRef> for CardRef {
    fn from(code_ref: &CodeRef) -> Self {
        CardRef::exported(&code_ref.module, &code_ref.name)
    }
}

impl From<CodeRef> for CardRef {
    fn from(code_ref: CodeRef) -> Self {
        CardRef::ExportedCard { module: code_ref.module, name: code_ref.name }
    }
}

fn absolute_module(module: &str, relative_to: Option<&Url>) -> String {
    match relative_to.and_then(|base| base.join(module).ok()) {
        Some(url) => url.to_string(),
        None => module.to_string(),
    }
}

/// Canonical string key for a card reference.
///
/// Exported cards key as `<module>/<name>`; ancestors append `/ancestor`
/// and fields append `/fields/<field>` to the key of the card they hang off.
pub fn internal_key_for(card_ref: &CardRef, relative_to: Option<&Url>) -> String {
    match card_ref {
        CardRef::ExportedCard { module, name } => {
            format!("{}/{}", absolute_module(module, relative_to), name)
        }
        CardRef::AncestorOf { card } => format!("{}/ancestor", internal_key_for(card, relative_to)),
        CardRef::FieldOf { card, field } => {
            format!("{}/fields/{}", internal_key_for(card, relative_to), field)
        }
    }
}

pub fn is_card_ref(value: &Value) -> bool {
    serde_json::from_value::<CardRef>(value.clone()).is_ok()
}
