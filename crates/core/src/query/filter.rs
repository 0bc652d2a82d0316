//! Query and filter types, as they appear on the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::card::CodeRef;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortExpression>>,
}

/// A filter node. The variant is decided by which key the object carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    Type(TypeFilter),
    Any(AnyFilter),
    Every(EveryFilter),
    Not(NotFilter),
    Eq(EqFilter),
    Contains(ContainsFilter),
    Range(RangeFilter),
}

impl Filter {
    /// The card type this node scopes its fields to, if it names one.
    pub fn on(&self) -> Option<&CodeRef> {
        match self {
            Filter::Type(f) => f.on.as_ref(),
            Filter::Any(f) => f.on.as_ref(),
            Filter::Every(f) => f.on.as_ref(),
            Filter::Not(f) => f.on.as_ref(),
            Filter::Eq(f) => f.on.as_ref(),
            Filter::Contains(f) => f.on.as_ref(),
            Filter::Range(f) => f.on.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeFilter {
    #[serde(rename = "type")]
    pub card: CodeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<CodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnyFilter {
    pub any: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<CodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EveryFilter {
    pub every: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<CodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotFilter {
    pub not: Box<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<CodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EqFilter {
    pub eq: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<CodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainsFilter {
    pub contains: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<CodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeFilter {
    pub range: BTreeMap<String, RangeBounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<CodeRef>,
}

/// Bounds of a range filter; a bound is applied only when supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortExpression {
    pub by: String,
    pub on: CodeRef,
    #[serde(default)]
    pub direction: Direction,
}
