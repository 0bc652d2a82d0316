//! Structured queries over indexed entries.

mod filter;
mod matcher;
mod sorter;
mod value;

use thiserror::Error;
use url::Url;

pub use filter::{
    AnyFilter, ContainsFilter, Direction, EqFilter, EveryFilter, Filter, NotFilter, Query,
    RangeBounds, RangeFilter, SortExpression, TypeFilter,
};
pub use matcher::{FieldCheck, Matcher, MatcherBuilder, any, every};
pub use sorter::{Sorter, id_tiebreak};
pub use value::{compare_total, values_equal};

use crate::index::SearchEntry;
use crate::loader::Loader;
use crate::types::Definitions;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The query names a card type the index does not know.
    #[error("your filter refers to nonexistent type {0}")]
    NonexistentType(String),

    /// A field path segment is not declared by the card it is resolved on.
    #[error("your filter refers to nonexistent field \"{path}\" on type {card}")]
    NonexistentField { path: String, card: String },
}

/// Filter then sort entries.
pub fn execute(
    entries: impl IntoIterator<Item = SearchEntry>,
    query: &Query,
    definitions: &Definitions,
    loader: &dyn Loader,
    realm: &Url,
) -> Result<Vec<SearchEntry>, FilterError> {
    let matcher = MatcherBuilder::new(definitions, loader, realm).build(query.filter.as_ref())?;
    let mut matched: Vec<SearchEntry> =
        entries.into_iter().filter(|entry| matcher.matches(entry)).collect();
    let sorter = Sorter::new(query.sort.as_deref().unwrap_or_default(), realm);
    sorter.sort(&mut matched);
    Ok(matched)
}
