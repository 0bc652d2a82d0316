//! Realm index: run state, runners, storage and the `SearchIndex` facade.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cardindex_core::index::{LocalRunner, SearchIndex, SearchOptions};
//! use cardindex_core::query::Query;
//! use cardindex_core::realm::{FsReader, RealmPaths};
//!
//! let paths = RealmPaths::parse("http://localhost:4201/demo/").unwrap();
//! let index = SearchIndex::builder(paths, Arc::new(FsReader::new("/srv/demo")))
//!     .runner(Arc::new(LocalRunner))
//!     .build();
//! index.run().unwrap();
//! let found = index.search(&Query::default(), SearchOptions::default()).unwrap();
//! println!("{} cards", found.data.len());
//! ```

pub mod db;
mod entries;
pub mod open;
pub mod options;
pub mod queue;
pub mod runner;
pub mod schema;
mod search_index;
mod state;
mod store;

pub use db::DbIndexer;
pub use entries::entry_for;
pub use open::{OpenError, open_realm};
pub use options::{EntrySetter, OptionsLease, RunnerOptions, RunnerOptionsManager};
pub use queue::{Job, JobHandle, Queue, QueueError, ThreadQueue};
pub use runner::{IndexRunner, LocalRunner, Operation, RunnerError};
pub use schema::{SCHEMA_VERSION, SchemaError};
pub use search_index::{
    CardLookup, Dispatch, RunPhase, SearchError, SearchIndex, SearchIndexBuilder, SearchOptions,
    UpdateOptions,
};
pub use state::{
    DirectoryEntry, Module, ModuleWithErrors, RunState, SearchEntry, SearchEntryWithErrors, Stats,
};
pub use store::{Indexer, IndexerError, SnapshotIndexer, StoredEntries};
