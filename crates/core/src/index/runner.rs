//! From-scratch and incremental index runs.

use std::collections::BTreeSet;

use thiserror::Error;
use url::Url;

use super::entries::entry_for;
use super::options::RunnerOptions;
use super::queue::QueueError;
use super::state::{ModuleWithErrors, RunState, SearchEntryWithErrors};
use super::store::IndexerError;
use crate::card::{CardResource, SerializedError};
use crate::realm::{
    INSTANCE_EXTENSION, ReaderError, trim_executable_extension, trim_instance_extension,
};
use crate::types::{DefinitionResolver, RemoteTypes};
use crate::walk::{FileClass, Visited, Walk, WalkError, Walker, classify, is_ignore_file, visit_file};

#[derive(Debug, Error)]
pub enum RunnerError {
    /// A run was requested on an index built without a runner.
    #[error("no index runner registered for {0}")]
    NotRegistered(String),

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// The options for a run were released before the worker looked them up.
    #[error("no runner options registered under id {0}")]
    UnknownOptions(u64),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("index job panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Indexer(#[from] IndexerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Update,
    Delete,
}

/// Produces run states. Implementations must never touch the previous state.
pub trait IndexRunner: Send + Sync {
    fn from_scratch(&self, options: &RunnerOptions) -> Result<RunState, RunnerError>;

    fn incremental(
        &self,
        previous: &RunState,
        url: &Url,
        operation: Operation,
        options: &RunnerOptions,
    ) -> Result<RunState, RunnerError>;
}

/// Runs against the options' reader on the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalRunner;

impl IndexRunner for LocalRunner {
    fn from_scratch(&self, options: &RunnerOptions) -> Result<RunState, RunnerError> {
        let started = std::time::Instant::now();
        options.type_cache.forget_unversioned();

        let walk = Walker::new(&options.paths, options.reader.as_ref()).walk()?;
        let mut state = RunState::empty(options.paths.url().clone());
        let files = absorb_walk(&mut state, walk);

        let mut pending = Vec::new();
        for file in &files {
            match visit_file(&options.paths, options.reader.as_ref(), file)? {
                Some(Visited::Module { url, result }) => insert_module(&mut state, &url, result),
                Some(Visited::Instance { url, result }) => pending.push((url, result)),
                None => {}
            }
        }

        rebuild_definitions(&mut state, options);
        state.invalidations = pending.iter().filter_map(|(url, _)| instance_file_url(url)).collect();
        settle(&mut state, pending, options);
        state.recompute_stats();

        tracing::info!(
            realm = %state.realm_url,
            instances = state.stats.instances_indexed,
            instance_errors = state.stats.instance_errors,
            module_errors = state.stats.module_errors,
            definitions = state.definitions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "from-scratch run complete"
        );
        Ok(state)
    }

    fn incremental(
        &self,
        previous: &RunState,
        url: &Url,
        operation: Operation,
        options: &RunnerOptions,
    ) -> Result<RunState, RunnerError> {
        if is_ignore_file(url) {
            tracing::info!(file = %url, "ignore rules changed, reindexing from scratch");
            let mut state = self.from_scratch(options)?;
            state.invalidations.insert(0, url.clone());
            return Ok(state);
        }

        let walk = Walker::new(&options.paths, options.reader.as_ref()).walk()?;
        let mut state = previous.clone();
        absorb_walk(&mut state, walk);
        state.invalidations = vec![url.clone()];

        if state.ignore_map.is_ignored(&options.paths, url) {
            tracing::debug!(file = %url, "skipping ignored file");
            return Ok(state);
        }

        let mut changed = BTreeSet::new();
        let mut pending = Vec::new();
        let mut definitions_stale = false;

        match classify(url) {
            FileClass::Module => {
                let trimmed = trim_executable_extension(url);
                state.modules.remove(url.as_str());
                state.modules.remove(trimmed.as_str());
                if operation == Operation::Update
                    && let Some(Visited::Module { url, result }) =
                        visit_file(&options.paths, options.reader.as_ref(), url)?
                {
                    insert_module(&mut state, &url, result);
                }
                changed.insert(trimmed.to_string());
                definitions_stale = true;
            }
            FileClass::Instance => {
                let Some(instance_url) = trim_instance_extension(url) else {
                    return Ok(state);
                };
                state.instances.remove(&instance_url);
                if operation == Operation::Update
                    && let Some(Visited::Instance { url, result }) =
                        visit_file(&options.paths, options.reader.as_ref(), url)?
                {
                    pending.push((url, result));
                }
                changed.insert(instance_url.to_string());
            }
            FileClass::Other => return Ok(state),
        }

        let dependents = dependents_of(&state, &changed);
        for dependent in &dependents {
            state.instances.remove(dependent);
        }

        if definitions_stale {
            rebuild_definitions(&mut state, options);
        }

        for dependent in &dependents {
            let Some(file) = instance_file_url(dependent) else { continue };
            if let Some(Visited::Instance { url, result }) =
                visit_file(&options.paths, options.reader.as_ref(), &file)?
            {
                pending.push((url, result));
            }
            state.invalidations.push(file);
        }

        settle(&mut state, pending, options);
        state.recompute_stats();

        tracing::info!(
            realm = %state.realm_url,
            file = %url,
            ?operation,
            invalidated = state.invalidations.len(),
            "incremental run complete"
        );
        Ok(state)
    }
}

/// Move listings and ignore rules of a walk into `state`, returning its files.
fn absorb_walk(state: &mut RunState, walk: Walk) -> Vec<Url> {
    state.directories = walk.directories;
    state.ignore_map = walk.ignore_map;
    state.ignore_data = walk.ignore_data;
    walk.files
}

/// Register a module under both its file URL and its extension-trimmed URL.
fn insert_module(
    state: &mut RunState,
    url: &Url,
    result: Result<super::state::Module, SerializedError>,
) {
    let trimmed = trim_executable_extension(url).to_string();
    let module = match result {
        Ok(module) => ModuleWithErrors::Module(module),
        Err(error) => ModuleWithErrors::Error { module_url: url.to_string(), error },
    };
    state.modules.insert(url.to_string(), module.clone());
    state.modules.insert(trimmed, module);
}

fn rebuild_definitions(state: &mut RunState, options: &RunnerOptions) {
    let realms = options.remote_realms();
    let remote = RemoteTypes::new(options.loader.as_ref(), &options.type_cache, &realms);
    let build = DefinitionResolver::new(&options.paths, &state.modules, remote).build();
    if !build.errors.is_empty() {
        tracing::debug!(realm = %state.realm_url, failed = build.errors.len(), "some cards have no definition");
    }
    state.definitions = build.definitions;
}

/// Turn loaded instances into entries and hand each to the entry setter.
fn settle(
    state: &mut RunState,
    pending: Vec<(Url, Result<CardResource, SerializedError>)>,
    options: &RunnerOptions,
) {
    for (url, result) in pending {
        let entry = entry_for(&url, result, state);
        if let SearchEntryWithErrors::Error { error } = &entry {
            tracing::warn!(instance = %url, error = %error, "instance indexed with error");
        }
        options.set_entry(&url, &entry);
        state.instances.insert(url, entry);
    }
}

/// Instances whose deps reach any changed key, transitively through other
/// invalidated instances.
fn dependents_of(state: &RunState, changed: &BTreeSet<String>) -> Vec<Url> {
    let mut invalid = changed.clone();
    let mut found: Vec<Url> = Vec::new();
    loop {
        let mut grew = false;
        for (url, instance) in &state.instances {
            if invalid.contains(url.as_str()) {
                continue;
            }
            if instance.deps().iter().any(|dep| invalid.contains(*dep)) {
                invalid.insert(url.to_string());
                found.push(url.clone());
                grew = true;
            }
        }
        if !grew {
            return found;
        }
    }
}

fn instance_file_url(instance: &Url) -> Option<Url> {
    Url::parse(&format!("{instance}{INSTANCE_EXTENSION}")).ok()
}
