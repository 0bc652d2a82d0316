//! Sorting of search results.

use std::cmp::Ordering;

use serde_json::Value;
use url::Url;

use super::filter::{Direction, SortExpression};
use super::value::compare_total;
use crate::card::{CardRef, internal_key_for};
use crate::index::SearchEntry;
use crate::types::CARD_API_MODULE;

/// Sort key every sort ends with, so equal keys still order deterministically.
pub fn id_tiebreak() -> SortExpression {
    SortExpression {
        by: "id".to_string(),
        on: crate::card::CodeRef::new(CARD_API_MODULE, "Card"),
        direction: Direction::Asc,
    }
}

struct SortKey {
    by: Vec<String>,
    on: String,
    direction: Direction,
}

/// Comparator built from sort expressions plus the id tiebreak.
pub struct Sorter {
    keys: Vec<SortKey>,
}

impl Sorter {
    pub fn new(expressions: &[SortExpression], realm: &Url) -> Self {
        let keys = expressions
            .iter()
            .cloned()
            .chain(std::iter::once(id_tiebreak()))
            .map(|expression| SortKey {
                by: expression.by.split('.').map(str::to_string).collect(),
                on: internal_key_for(&CardRef::from(&expression.on), Some(realm)),
                direction: expression.direction,
            })
            .collect();
        Self { keys }
    }

    pub fn compare(&self, a: &SearchEntry, b: &SearchEntry) -> Ordering {
        for key in &self.keys {
            let ordering = compare_by(key, a, b);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    pub fn sort(&self, entries: &mut [SearchEntry]) {
        entries.sort_by(|a, b| self.compare(a, b));
    }
}

fn field_value<'e>(entry: &'e SearchEntry, path: &[String]) -> Option<&'e Value> {
    let (first, rest) = path.split_first()?;
    let mut value = entry.search_data.get(first)?;
    for segment in rest {
        value = value.get(segment)?;
    }
    Some(value).filter(|v| !v.is_null())
}

fn sort_value<'e>(key: &SortKey, entry: &'e SearchEntry) -> Option<&'e Value> {
    if entry.types.iter().any(|t| t == &key.on) { field_value(entry, &key.by) } else { None }
}

/// Entries lacking the type or the value sort after those that have it when
/// ascending, before them when descending.
fn compare_by(key: &SortKey, a: &SearchEntry, b: &SearchEntry) -> Ordering {
    let ordering = match (sort_value(key, a), sort_value(key, b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare_total(x, y),
    };
    match key.direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}
