//! Where published index state lives between runs.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use thiserror::Error;
use url::Url;

use super::schema::SchemaError;
use super::state::{RunState, SearchEntry, SearchEntryWithErrors};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("failed to encode entry {url}: {source}")]
    Encode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode entry {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to prepare index location {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A realm's stored entries as of one commit.
#[derive(Debug, Clone, Default)]
pub struct StoredEntries {
    /// Version of the commit the entries belong to; `None` before the first.
    pub version: Option<u64>,
    pub entries: Vec<SearchEntry>,
}

/// Storage for the entries a run publishes.
///
/// Every `commit` replaces everything previously stored for the realm.
pub trait Indexer: Send + Sync {
    fn commit(&self, state: &Arc<RunState>, version: u64) -> Result<(), IndexerError>;

    /// The stored entry of an instance URL.
    fn get_card(&self, url: &Url) -> Result<Option<SearchEntryWithErrors>, IndexerError>;

    /// Every stored entry of a realm, ordered by instance URL, read from a
    /// single commit.
    fn entries(&self, realm: &Url) -> Result<StoredEntries, IndexerError>;
}

struct Committed {
    version: u64,
    state: Arc<RunState>,
}

/// Keeps the last committed state in memory.
#[derive(Default)]
pub struct SnapshotIndexer {
    committed: ArcSwapOption<Committed>,
}

impl SnapshotIndexer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indexer for SnapshotIndexer {
    fn commit(&self, state: &Arc<RunState>, version: u64) -> Result<(), IndexerError> {
        self.committed.store(Some(Arc::new(Committed { version, state: state.clone() })));
        Ok(())
    }

    fn get_card(&self, url: &Url) -> Result<Option<SearchEntryWithErrors>, IndexerError> {
        Ok(self.committed.load().as_ref().and_then(|c| c.state.instances.get(url).cloned()))
    }

    fn entries(&self, realm: &Url) -> Result<StoredEntries, IndexerError> {
        Ok(match self.committed.load().as_ref() {
            Some(c) if &c.state.realm_url == realm => StoredEntries {
                version: Some(c.version),
                entries: c.state.entries().cloned().collect(),
            },
            _ => StoredEntries::default(),
        })
    }
}
