//! Compiled filters and their three-valued evaluation.
//!
//! Every predicate yields `Some(true)`, `Some(false)` or `None`. `None`
//! means the entry's schema does not carry what the filter asks about, which
//! is different from a value that is present but does not match.

use serde_json::{Map, Value};
use url::Url;

use super::FilterError;
use super::filter::{Filter, RangeBounds};
use super::value::{compare_same_kind, value_text, values_equal};
use crate::card::{CardRef, internal_key_for};
use crate::index::SearchEntry;
use crate::loader::Loader;
use crate::types::{CardDefinition, Definitions, FieldType, root_card_ref};

/// Three-valued AND: false wins, then unknown, then true.
pub fn every(results: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for result in results {
        match result {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown { None } else { Some(true) }
}

/// Three-valued OR: true wins; false only when every child is false.
pub fn any(results: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for result in results {
        match result {
            Some(true) => return Some(true),
            None => unknown = true,
            Some(false) => {}
        }
    }
    if unknown { None } else { Some(false) }
}

#[derive(Debug, Clone, PartialEq)]
enum Test {
    Eq(Value),
    Contains(Value),
    Range(RangeBounds),
}

impl Test {
    fn query_is_null(&self) -> bool {
        match self {
            Test::Eq(value) | Test::Contains(value) => value.is_null(),
            Test::Range(bounds) => {
                [&bounds.gt, &bounds.gte, &bounds.lt, &bounds.lte].iter().all(|b| b.is_none())
            }
        }
    }

    /// Outcome when an intermediate object on the path is absent.
    fn on_missing_container(&self) -> Option<bool> {
        match self {
            Test::Range(_) => None,
            _ if self.query_is_null() => Some(true),
            _ => None,
        }
    }

    fn apply(&self, instance: Option<&Value>) -> Option<bool> {
        let instance = instance.filter(|v| !v.is_null());
        match self {
            Test::Eq(query) => match (instance, query.is_null()) {
                (None, true) => Some(true),
                (None, false) => None,
                (Some(value), _) => Some(values_equal(value, query)),
            },
            Test::Contains(query) => match (instance, query.is_null()) {
                (None, true) => Some(true),
                (None, false) | (Some(_), true) => None,
                (Some(value), false) => {
                    let haystack = value_text(value).to_lowercase();
                    Some(haystack.contains(&value_text(query).to_lowercase()))
                }
            },
            Test::Range(bounds) => {
                let value = instance?;
                if self.query_is_null() {
                    return None;
                }
                let ok = |bound: &Option<Value>, accept: fn(std::cmp::Ordering) -> bool| {
                    bound
                        .as_ref()
                        .is_none_or(|b| compare_same_kind(value, b).is_some_and(accept))
                };
                Some(
                    ok(&bounds.gt, |o| o.is_gt())
                        && ok(&bounds.gte, |o| o.is_ge())
                        && ok(&bounds.lt, |o| o.is_lt())
                        && ok(&bounds.lte, |o| o.is_le()),
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PathStep {
    name: String,
    many: bool,
}

/// One `path: operand` pair of an eq, contains or range node.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCheck {
    path: Vec<PathStep>,
    test: Test,
}

impl FieldCheck {
    fn evaluate(&self, search_data: &Map<String, Value>) -> Option<bool> {
        let first = &self.path[0];
        let value = search_data.get(&first.name);
        self.step(0, value)
    }

    /// Evaluate the value reached at `path[index]`.
    fn step(&self, index: usize, value: Option<&Value>) -> Option<bool> {
        let step = &self.path[index];
        if step.many {
            return match value {
                Some(Value::Array(items)) if items.is_empty() => self.descend(index, None),
                Some(Value::Array(items)) => {
                    let results: Vec<Option<bool>> =
                        items.iter().map(|item| self.descend(index, Some(item))).collect();
                    if results.contains(&Some(true)) {
                        Some(true)
                    } else if results.contains(&Some(false)) {
                        Some(false)
                    } else {
                        None
                    }
                }
                other => self.descend(index, other),
            };
        }
        self.descend(index, value)
    }

    fn descend(&self, index: usize, value: Option<&Value>) -> Option<bool> {
        if index + 1 == self.path.len() {
            return self.test.apply(value);
        }
        match value {
            Some(Value::Object(object)) => {
                let next = &self.path[index + 1];
                self.step(index + 1, object.get(&next.name))
            }
            _ => self.test.on_missing_container(),
        }
    }
}

/// A filter bound to the definitions it was compiled against.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    Everything,
    /// Entry's type chain contains this key.
    Type(String),
    Any(Vec<Matcher>),
    Every(Vec<Matcher>),
    Not(Box<Matcher>),
    Fields { on: String, checks: Vec<FieldCheck> },
}

impl Matcher {
    pub fn evaluate(&self, entry: &SearchEntry) -> Option<bool> {
        match self {
            Matcher::Everything => Some(true),
            Matcher::Type(key) => Some(entry.types.iter().any(|t| t == key)),
            Matcher::Any(children) => any(children.iter().map(|m| m.evaluate(entry))),
            Matcher::Every(children) => every(children.iter().map(|m| m.evaluate(entry))),
            Matcher::Not(inner) => inner.evaluate(entry).map(|b| !b),
            Matcher::Fields { on, checks } => {
                let has_type = entry.types.iter().any(|t| t == on);
                every(checks.iter().map(|check| {
                    if has_type { check.evaluate(&entry.search_data) } else { None }
                }))
            }
        }
    }

    pub fn matches(&self, entry: &SearchEntry) -> bool {
        self.evaluate(entry) == Some(true)
    }
}

/// Compiles filters against a definition graph.
pub struct MatcherBuilder<'a> {
    definitions: &'a Definitions,
    loader: &'a dyn Loader,
    realm: &'a Url,
}

impl<'a> MatcherBuilder<'a> {
    pub fn new(definitions: &'a Definitions, loader: &'a dyn Loader, realm: &'a Url) -> Self {
        Self { definitions, loader, realm }
    }

    pub fn build(&self, filter: Option<&Filter>) -> Result<Matcher, FilterError> {
        match filter {
            None => Ok(Matcher::Everything),
            Some(filter) => self.build_node(filter, &root_card_ref()),
        }
    }

    fn build_node(&self, filter: &Filter, parent_on: &CardRef) -> Result<Matcher, FilterError> {
        let on = match filter.on() {
            Some(code_ref) => CardRef::from(code_ref).resolved(self.realm),
            None => parent_on.clone(),
        };

        Ok(match filter {
            Filter::Type(f) => Matcher::Type(internal_key_for(&CardRef::from(&f.card), Some(self.realm))),
            Filter::Any(f) => Matcher::Any(
                f.any.iter().map(|child| self.build_node(child, &on)).collect::<Result<_, _>>()?,
            ),
            Filter::Every(f) => Matcher::Every(
                f.every.iter().map(|child| self.build_node(child, &on)).collect::<Result<_, _>>()?,
            ),
            Filter::Not(f) => Matcher::Not(Box::new(self.build_node(&f.not, &on)?)),
            Filter::Eq(f) => self.fields(&on, f.eq.iter().map(|(path, v)| (path, Operand::Eq(v))))?,
            Filter::Contains(f) => {
                self.fields(&on, f.contains.iter().map(|(path, v)| (path, Operand::Contains(v))))?
            }
            Filter::Range(f) => {
                self.fields(&on, f.range.iter().map(|(path, b)| (path, Operand::Range(b))))?
            }
        })
    }

    fn fields<'f>(
        &self,
        on: &CardRef,
        operands: impl Iterator<Item = (&'f String, Operand<'f>)>,
    ) -> Result<Matcher, FilterError> {
        let definition = self.definition(on)?;
        let mut checks = Vec::new();
        for (path, operand) in operands {
            checks.push(self.field_check(definition, path, operand)?);
        }
        Ok(Matcher::Fields { on: definition.key.clone(), checks })
    }

    fn definition(&self, card_ref: &CardRef) -> Result<&'a CardDefinition, FilterError> {
        let key = internal_key_for(card_ref, Some(self.realm));
        self.definitions
            .get(&key)
            .map(|d| d.as_ref())
            .ok_or(FilterError::NonexistentType(key))
    }

    fn field_check(
        &self,
        on: &'a CardDefinition,
        path: &str,
        operand: Operand<'_>,
    ) -> Result<FieldCheck, FilterError> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut definition = on;
        let mut steps = Vec::with_capacity(segments.len());
        let mut leaf_card = None;

        for (i, segment) in segments.iter().enumerate() {
            let field = definition.fields.get(*segment).ok_or_else(|| FilterError::NonexistentField {
                path: path.to_string(),
                card: definition.key.clone(),
            })?;
            steps.push(PathStep {
                name: segment.to_string(),
                many: field.field_type == FieldType::ContainsMany,
            });
            if i + 1 < segments.len() {
                definition = self.definition(&field.field_card)?;
            } else {
                leaf_card = Some(&field.field_card);
            }
        }

        let leaf_card = leaf_card.ok_or_else(|| FilterError::NonexistentField {
            path: path.to_string(),
            card: on.key.clone(),
        })?;
        let format = |value: &Value| self.loader.format_query_value(leaf_card, value);
        let test = match operand {
            Operand::Eq(value) => Test::Eq(format(value)),
            Operand::Contains(value) => Test::Contains(format(value)),
            Operand::Range(bounds) => Test::Range(RangeBounds {
                gt: bounds.gt.as_ref().map(format),
                gte: bounds.gte.as_ref().map(format),
                lt: bounds.lt.as_ref().map(format),
                lte: bounds.lte.as_ref().map(format),
            }),
        };
        Ok(FieldCheck { path: steps, test })
    }
}

enum Operand<'f> {
    Eq(&'f Value),
    Contains(&'f Value),
    Range(&'f RangeBounds),
}
