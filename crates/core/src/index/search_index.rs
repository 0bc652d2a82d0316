//! The per-realm index: owns the published state and serves queries.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::options::{EntrySetter, RunnerOptions, RunnerOptionsManager};
use super::queue::Queue;
use super::runner::{IndexRunner, Operation, RunnerError};
use super::state::{DirectoryEntry, RunState, SearchEntry, SearchEntryWithErrors, Stats};
use super::store::{Indexer, IndexerError, SnapshotIndexer};
use crate::card::{
    CardCollectionDocument, CardRef, SerializedError, SingleCardDocument, internal_key_for,
};
use crate::links::{LinkError, LinkResolver};
use crate::loader::{Loader, RealmLoader};
use crate::query::{self, FilterError, Query};
use crate::realm::{Reader, RealmPaths, resolve_module, trim_instance_extension};
use crate::types::{CardDefinition, TypeCache};

/// Where index jobs execute.
#[derive(Clone, Default)]
pub enum Dispatch {
    /// On the calling thread.
    #[default]
    InProcess,
    /// On a queue worker, one job at a time per realm.
    Queue(Arc<dyn Queue>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Building,
    Publishing,
    Revisiting,
    Merging,
}

/// Answer to a card lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CardLookup {
    Doc(SingleCardDocument),
    Error(SerializedError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Indexer(#[from] IndexerError),

    #[error("invalid card id '{0}'")]
    InvalidId(String),

    /// The store kept answering for a different version than the one published.
    #[error("index for {realm} is at version {stored:?} but version {published} is published")]
    Stale { realm: String, published: u64, stored: Option<u64> },
}

/// How many times `search` re-reads the store while a publish is in flight.
const CONSISTENT_READ_ATTEMPTS: usize = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub load_links: bool,
}

/// Options for [`SearchIndex::update`].
#[derive(Default)]
pub struct UpdateOptions<'a> {
    pub delete: bool,
    /// Called with the invalidated URLs once the new state is published.
    pub on_invalidation: Option<&'a dyn Fn(&[Url])>,
}

pub struct SearchIndexBuilder {
    paths: RealmPaths,
    reader: Arc<dyn Reader>,
    loader: Option<Arc<dyn Loader>>,
    realm_loader: Option<Arc<RealmLoader>>,
    runner: Option<Arc<dyn IndexRunner>>,
    indexer: Option<Arc<dyn Indexer>>,
    dispatch: Dispatch,
    known_realms: Vec<Url>,
    type_cache: Option<Arc<TypeCache>>,
}

impl SearchIndexBuilder {
    pub fn runner(mut self, runner: Arc<dyn IndexRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Use `realm_loader` for fetches and register the built index with it.
    pub fn realm_loader(mut self, realm_loader: Arc<RealmLoader>) -> Self {
        self.realm_loader = Some(realm_loader);
        self
    }

    pub fn indexer(mut self, indexer: Arc<dyn Indexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn known_realms(mut self, realms: Vec<Url>) -> Self {
        self.known_realms = realms;
        self
    }

    pub fn type_cache(mut self, cache: Arc<TypeCache>) -> Self {
        self.type_cache = Some(cache);
        self
    }

    pub fn build(self) -> Arc<SearchIndex> {
        let loader: Arc<dyn Loader> = match (self.loader, &self.realm_loader) {
            (Some(loader), _) => loader,
            (None, Some(realm_loader)) => realm_loader.clone(),
            (None, None) => Arc::new(RealmLoader::new()),
        };
        let index = Arc::new(SearchIndex {
            current: ArcSwap::from_pointee(Published {
                version: 0,
                state: Arc::new(RunState::empty(self.paths.url().clone())),
            }),
            paths: self.paths,
            reader: self.reader,
            loader,
            runner: self.runner,
            indexer: self.indexer.unwrap_or_else(|| Arc::new(SnapshotIndexer::new())),
            dispatch: self.dispatch,
            known_realms: self.known_realms,
            type_cache: self.type_cache.unwrap_or_default(),
            options: Arc::new(RunnerOptionsManager::new()),
            staged: Arc::new(Mutex::new(BTreeMap::new())),
            run_lock: Mutex::new(()),
            phase: Mutex::new(RunPhase::Idle),
        });
        if let Some(realm_loader) = self.realm_loader {
            realm_loader.register(&index);
        }
        index
    }
}

pub struct SearchIndex {
    paths: RealmPaths,
    reader: Arc<dyn Reader>,
    loader: Arc<dyn Loader>,
    runner: Option<Arc<dyn IndexRunner>>,
    indexer: Arc<dyn Indexer>,
    dispatch: Dispatch,
    known_realms: Vec<Url>,
    type_cache: Arc<TypeCache>,
    options: Arc<RunnerOptionsManager>,
    /// Entries streamed by the run in flight.
    staged: Arc<Mutex<BTreeMap<Url, SearchEntryWithErrors>>>,
    current: ArcSwap<Published>,
    run_lock: Mutex<()>,
    phase: Mutex<RunPhase>,
}

/// A published state and the version it was committed under.
struct Published {
    version: u64,
    state: Arc<RunState>,
}

/// Returns the index to idle when the phase it set ends.
struct PhaseGuard<'a> {
    phase: &'a Mutex<RunPhase>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock() = RunPhase::Idle;
    }
}

impl SearchIndex {
    pub fn builder(paths: RealmPaths, reader: Arc<dyn Reader>) -> SearchIndexBuilder {
        SearchIndexBuilder {
            paths,
            reader,
            loader: None,
            realm_loader: None,
            runner: None,
            indexer: None,
            dispatch: Dispatch::InProcess,
            known_realms: Vec::new(),
            type_cache: None,
        }
    }

    pub fn realm_url(&self) -> &Url {
        self.paths.url()
    }

    pub fn paths(&self) -> &RealmPaths {
        &self.paths
    }

    /// Number of states published so far.
    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.lock()
    }

    /// The published state.
    pub fn run_state(&self) -> Arc<RunState> {
        self.current.load().state.clone()
    }

    pub fn stats(&self) -> Stats {
        self.current.load().state.stats
    }

    /// Reindex the whole realm.
    pub fn run(&self) -> Result<(), RunnerError> {
        let _lock = self.run_lock.lock();
        let runner = self.runner()?;
        let _phase = self.enter(RunPhase::Building);
        let state = self.dispatch_job(move |options| runner.from_scratch(options))?;
        self.publish(state, RunPhase::Publishing)
    }

    /// Reindex after a change to one file.
    pub fn update(&self, url: &Url, opts: UpdateOptions<'_>) -> Result<(), RunnerError> {
        let invalidations = {
            let _lock = self.run_lock.lock();
            let runner = self.runner()?;
            let previous = self.run_state();
            let operation = if opts.delete { Operation::Delete } else { Operation::Update };
            let changed = url.clone();
            let _phase = self.enter(RunPhase::Revisiting);
            let state = self.dispatch_job(move |options| {
                runner.incremental(&previous, &changed, operation, options)
            })?;
            let invalidations = state.invalidations.clone();
            self.publish(state, RunPhase::Merging)?;
            invalidations
        };
        notify(opts.on_invalidation, &invalidations);
        Ok(())
    }

    /// Reindex after changes to several files.
    ///
    /// A single file is handled incrementally; more than one triggers a
    /// from-scratch run.
    pub fn update_batch(
        &self,
        urls: &[Url],
        on_invalidation: Option<&dyn Fn(&[Url])>,
    ) -> Result<(), RunnerError> {
        match urls {
            [] => Ok(()),
            [url] => {
                let delete = match self.paths.local(url) {
                    Ok(local) => self.reader.read_file_as_text(&local)?.is_none(),
                    Err(_) => false,
                };
                self.update(url, UpdateOptions { delete, on_invalidation })
            }
            _ => {
                self.run()?;
                notify(on_invalidation, &self.current.load().state.invalidations);
                Ok(())
            }
        }
    }

    fn runner(&self) -> Result<Arc<dyn IndexRunner>, RunnerError> {
        self.runner.clone().ok_or_else(|| RunnerError::NotRegistered(self.realm_url().to_string()))
    }

    /// Start a run in `phase`; the index is idle again once the guard drops.
    fn enter(&self, phase: RunPhase) -> PhaseGuard<'_> {
        self.set_phase(phase);
        PhaseGuard { phase: &self.phase }
    }

    fn set_phase(&self, phase: RunPhase) {
        *self.phase.lock() = phase;
        tracing::debug!(realm = %self.realm_url(), ?phase, "index phase");
    }

    fn runner_options(&self) -> RunnerOptions {
        let staged = self.staged.clone();
        let setter: EntrySetter = Arc::new(move |url: &Url, entry: &SearchEntryWithErrors| {
            staged.lock().insert(url.clone(), entry.clone());
        });
        RunnerOptions {
            paths: self.paths.clone(),
            reader: self.reader.clone(),
            loader: self.loader.clone(),
            type_cache: self.type_cache.clone(),
            known_realms: self.known_realms.clone(),
            entry_setter: Some(setter),
        }
    }

    /// Run a job with registered options, in process or on the queue.
    fn dispatch_job<F>(&self, job: F) -> Result<RunState, RunnerError>
    where
        F: FnOnce(&RunnerOptions) -> Result<RunState, RunnerError> + Send + 'static,
    {
        self.staged.lock().clear();
        let lease = self.options.register(self.runner_options());
        let id = lease.id();
        let manager = self.options.clone();
        let work = move || {
            let options = manager.get(id).ok_or(RunnerError::UnknownOptions(id))?;
            job(&options)
        };

        match &self.dispatch {
            Dispatch::InProcess => work(),
            Dispatch::Queue(queue) => {
                let name = format!("index:{}", self.realm_url());
                queue.publish(&name, Box::new(work))?.done()
            }
        }
    }

    /// Merge streamed entries, persist, then swap in the new state.
    ///
    /// Callers hold the run lock and the guard of the phase this follows.
    fn publish(&self, mut state: RunState, phase: RunPhase) -> Result<(), RunnerError> {
        self.set_phase(phase);
        let staged = std::mem::take(&mut *self.staged.lock());
        let mut merged = false;
        for (url, entry) in staged {
            if !state.instances.contains_key(&url) {
                state.instances.insert(url, entry);
                merged = true;
            }
        }
        if merged {
            state.recompute_stats();
        }

        let state = Arc::new(state);
        let version = self.current.load().version + 1;
        self.indexer.commit(&state, version)?;
        self.current.store(Arc::new(Published { version, state: state.clone() }));

        tracing::info!(
            realm = %self.realm_url(),
            version,
            instances = state.stats.instances_indexed,
            instance_errors = state.stats.instance_errors,
            module_errors = state.stats.module_errors,
            "published index"
        );
        Ok(())
    }

    /// Entries matching `query`, with linked resources when asked.
    pub fn search(&self, query: &Query, opts: SearchOptions) -> Result<CardCollectionDocument, SearchError> {
        let matched = match &query.id {
            Some(id) => {
                let url = Url::parse(id).map_err(|_| SearchError::InvalidId(id.clone()))?;
                match self.indexer.get_card(&url)? {
                    Some(SearchEntryWithErrors::Entry { entry }) => vec![*entry],
                    _ => Vec::new(),
                }
            }
            None => {
                let (published, entries) = self.consistent_entries()?;
                let definitions = &published.state.definitions;
                query::execute(entries, query, definitions, self.loader.as_ref(), self.realm_url())?
            }
        };

        let mut document = CardCollectionDocument::default();
        if opts.load_links {
            let omit: Vec<String> = matched.iter().filter_map(|e| e.id().map(str::to_string)).collect();
            let resolver = self.link_resolver();
            for entry in matched {
                let mut resource = entry.resource;
                document.included =
                    resolver.load_links(&mut resource, &omit, std::mem::take(&mut document.included))?;
                document.data.push(resource.with_self_link());
            }
        } else {
            document.data = matched.into_iter().map(|e| e.resource.with_self_link()).collect();
        }
        Ok(document)
    }

    /// Stored entries together with the published state they belong to.
    ///
    /// A publish commits to the store before swapping the state, so a read
    /// landing in between sees a newer store; it waits for the swap.
    fn consistent_entries(&self) -> Result<(Arc<Published>, Vec<SearchEntry>), SearchError> {
        let mut stored_version = None;
        for attempt in 0..CONSISTENT_READ_ATTEMPTS {
            let published = self.current.load_full();
            if published.version == 0 {
                return Ok((published, Vec::new()));
            }
            let stored = self.indexer.entries(self.realm_url())?;
            if stored.version == Some(published.version) {
                return Ok((published, stored.entries));
            }
            stored_version = stored.version;
            if attempt < 8 {
                std::thread::yield_now();
            } else {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        Err(SearchError::Stale {
            realm: self.realm_url().to_string(),
            published: self.current.load().version,
            stored: stored_version,
        })
    }

    /// The document of one instance. `url` may carry the `.json` suffix.
    pub fn card(&self, url: &Url, load_links: bool) -> Result<Option<CardLookup>, SearchError> {
        let url = instance_url(url);
        Ok(match self.indexer.get_card(&url)? {
            Some(SearchEntryWithErrors::Entry { entry }) => {
                let mut resource = entry.resource;
                let included = if load_links {
                    self.link_resolver().load_links(&mut resource, &[url.to_string()], Vec::new())?
                } else {
                    Vec::new()
                };
                Some(CardLookup::Doc(SingleCardDocument { data: resource.with_self_link(), included }))
            }
            Some(SearchEntryWithErrors::Error { error }) => Some(CardLookup::Error(error)),
            None => None,
        })
    }

    pub fn search_entry(&self, url: &Url) -> Result<Option<SearchEntryWithErrors>, IndexerError> {
        self.indexer.get_card(&instance_url(url))
    }

    /// Definition of a card, with a relative module resolved against the realm.
    pub fn type_of(&self, card_ref: &CardRef) -> Option<Arc<CardDefinition>> {
        let resolved = resolve_card_ref(card_ref, self.realm_url());
        self.current.load().state.definitions.get(&internal_key_for(&resolved, None)).cloned()
    }

    /// `typeOf` rendered as a card-definition document.
    pub fn type_of_document(&self, card_ref: &CardRef) -> Option<Value> {
        self.type_of(card_ref).map(|definition| definition.to_document())
    }

    pub fn exported_cards_of(&self, module: &str) -> Vec<CardRef> {
        let module = match resolve_module(module, self.realm_url()) {
            Some(url) => url.to_string(),
            None => module.to_string(),
        };
        self.current.load().state.definitions.exported_cards_of(&module)
    }

    pub fn directory(&self, url: &Url) -> Option<Vec<DirectoryEntry>> {
        self.current.load().state.directories.get(url).cloned()
    }

    pub fn is_ignored(&self, url: &Url) -> bool {
        self.current.load().state.ignore_map.is_ignored(&self.paths, url)
    }

    fn link_resolver(&self) -> LinkResolver<'_> {
        LinkResolver::new(&self.paths, self.indexer.as_ref(), self.loader.as_ref())
    }
}

fn notify(callback: Option<&dyn Fn(&[Url])>, invalidations: &[Url]) {
    if let Some(callback) = callback {
        let urls: Vec<Url> = invalidations.iter().map(instance_url).collect();
        callback(&urls);
    }
}

fn instance_url(url: &Url) -> Url {
    trim_instance_extension(url).unwrap_or_else(|| url.clone())
}

/// Resolve exported modules against `base`, dropping executable extensions.
fn resolve_card_ref(card_ref: &CardRef, base: &Url) -> CardRef {
    match card_ref {
        CardRef::ExportedCard { module, name } => match resolve_module(module, base) {
            Some(url) => CardRef::exported(url.as_str(), name),
            None => card_ref.clone(),
        },
        CardRef::AncestorOf { card } => CardRef::ancestor_of(resolve_card_ref(card, base)),
        CardRef::FieldOf { card, field } => CardRef::field_of(resolve_card_ref(card, base), field),
    }
}
