//! The data produced by an indexing run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::card::{CardResource, SerializedError};
use crate::module_syntax::ModuleSyntax;
use crate::realm::EntryKind;
use crate::types::Definitions;
use crate::walk::IgnoreMap;

/// An indexed instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub resource: CardResource,
    /// Attributes plus `id`, the data filters and sorts run against.
    pub search_data: Map<String, Value>,
    /// Internal keys of the adopted card and every ancestor, nearest first.
    pub types: Vec<String>,
    /// Dependency keys: module URLs and linked instance URLs.
    pub deps: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl SearchEntry {
    pub fn id(&self) -> Option<&str> {
        self.resource.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchEntryWithErrors {
    Entry { entry: Box<SearchEntry> },
    Error { error: SerializedError },
}

impl SearchEntryWithErrors {
    pub fn entry(&self) -> Option<&SearchEntry> {
        match self {
            SearchEntryWithErrors::Entry { entry } => Some(entry),
            SearchEntryWithErrors::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&SerializedError> {
        match self {
            SearchEntryWithErrors::Entry { .. } => None,
            SearchEntryWithErrors::Error { error } => Some(error),
        }
    }

    /// Dependency keys of either variant.
    pub fn deps(&self) -> Vec<&str> {
        match self {
            SearchEntryWithErrors::Entry { entry } => entry.deps.iter().map(String::as_str).collect(),
            SearchEntryWithErrors::Error { error } => error.deps.iter().map(String::as_str).collect(),
        }
    }
}

/// An analyzed module.
#[derive(Debug, Clone)]
pub struct Module {
    pub url: String,
    /// Module URLs this module imports.
    pub consumes: Vec<String>,
    pub syntax: Arc<ModuleSyntax>,
}

#[derive(Debug, Clone)]
pub enum ModuleWithErrors {
    Module(Module),
    Error { module_url: String, error: SerializedError },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub instances_indexed: usize,
    pub instance_errors: usize,
    pub module_errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Everything an indexing run knows about a realm.
#[derive(Debug, Clone)]
pub struct RunState {
    pub realm_url: Url,
    /// Instances keyed by instance URL (file URL without `.json`).
    pub instances: BTreeMap<Url, SearchEntryWithErrors>,
    /// Modules keyed both by file URL and by extension-trimmed URL.
    pub modules: BTreeMap<String, ModuleWithErrors>,
    pub definitions: Definitions,
    /// Directory listings keyed by directory URL.
    pub directories: BTreeMap<Url, Vec<DirectoryEntry>>,
    pub ignore_map: IgnoreMap,
    /// Raw ignore file contents keyed by the URL of their directory.
    pub ignore_data: BTreeMap<String, String>,
    pub stats: Stats,
    /// File URLs touched by the run that produced this state.
    pub invalidations: Vec<Url>,
}

impl RunState {
    pub fn empty(realm_url: Url) -> Self {
        Self {
            realm_url,
            instances: BTreeMap::new(),
            modules: BTreeMap::new(),
            definitions: Definitions::default(),
            directories: BTreeMap::new(),
            ignore_map: IgnoreMap::default(),
            ignore_data: BTreeMap::new(),
            stats: Stats::default(),
            invalidations: Vec::new(),
        }
    }

    /// Recount stats from the current instances and modules.
    pub fn recompute_stats(&mut self) {
        let mut stats = Stats::default();
        for instance in self.instances.values() {
            match instance {
                SearchEntryWithErrors::Entry { .. } => stats.instances_indexed += 1,
                SearchEntryWithErrors::Error { .. } => stats.instance_errors += 1,
            }
        }
        let failed: BTreeSet<&str> = self
            .modules
            .values()
            .filter_map(|m| match m {
                ModuleWithErrors::Error { module_url, .. } => Some(module_url.as_str()),
                ModuleWithErrors::Module(_) => None,
            })
            .collect();
        stats.module_errors = failed.len();
        self.stats = stats;
    }

    /// Indexed entries, ordered by instance URL.
    pub fn entries(&self) -> impl Iterator<Item = &SearchEntry> {
        self.instances.values().filter_map(SearchEntryWithErrors::entry)
    }
}
