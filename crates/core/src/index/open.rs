//! Opening a configured realm.

use std::sync::Arc;

use thiserror::Error;

use super::db::DbIndexer;
use super::queue::ThreadQueue;
use super::runner::LocalRunner;
use super::search_index::{Dispatch, SearchIndex};
use super::store::{Indexer, IndexerError, SnapshotIndexer};
use crate::config::types::{Backend, DispatchMode, ResolvedConfig};
use crate::loader::RealmLoader;
use crate::realm::{FsReader, PathError, RealmPaths};

#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Indexer(#[from] IndexerError),
}

/// Build a `SearchIndex` over the realm a profile points at.
///
/// The index is registered with `realm_loader`; nothing is indexed until
/// [`SearchIndex::run`] is called.
pub fn open_realm(
    config: &ResolvedConfig,
    realm_loader: &Arc<RealmLoader>,
) -> Result<Arc<SearchIndex>, OpenError> {
    let paths = RealmPaths::new(config.realm_url.clone())?;
    let indexer: Arc<dyn Indexer> = match config.index.backend {
        Backend::Memory => Arc::new(SnapshotIndexer::new()),
        Backend::Sqlite => Arc::new(DbIndexer::open(&config.index.db_path)?),
    };
    let dispatch = match config.index.dispatch {
        DispatchMode::InProcess => Dispatch::InProcess,
        DispatchMode::Queue => Dispatch::Queue(Arc::new(ThreadQueue::new())),
    };

    tracing::debug!(
        realm = %config.realm_url,
        root = %config.realm_root.display(),
        backend = ?config.index.backend,
        "opening realm"
    );

    Ok(SearchIndex::builder(paths, Arc::new(FsReader::new(&config.realm_root)))
        .runner(Arc::new(LocalRunner))
        .indexer(indexer)
        .dispatch(dispatch)
        .known_realms(config.known_realms.clone())
        .realm_loader(realm_loader.clone())
        .build())
}
