//! Per-run options handed to whichever worker executes a run.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use url::Url;

use super::state::SearchEntryWithErrors;
use crate::loader::Loader;
use crate::realm::{Reader, RealmPaths};
use crate::types::{BASE_REALM, TypeCache};

/// Receives each entry as soon as a run produces it.
pub type EntrySetter = Arc<dyn Fn(&Url, &SearchEntryWithErrors) + Send + Sync>;

/// Everything a run needs besides the previous state.
#[derive(Clone)]
pub struct RunnerOptions {
    pub paths: RealmPaths,
    pub reader: Arc<dyn Reader>,
    pub loader: Arc<dyn Loader>,
    pub type_cache: Arc<TypeCache>,
    /// Realms other than this one that may own card types.
    pub known_realms: Vec<Url>,
    pub entry_setter: Option<EntrySetter>,
}

impl RunnerOptions {
    pub fn new(paths: RealmPaths, reader: Arc<dyn Reader>, loader: Arc<dyn Loader>) -> Self {
        Self {
            paths,
            reader,
            loader,
            type_cache: Arc::new(TypeCache::new()),
            known_realms: Vec::new(),
            entry_setter: None,
        }
    }

    pub fn set_entry(&self, url: &Url, entry: &SearchEntryWithErrors) {
        if let Some(setter) = &self.entry_setter {
            setter(url, entry);
        }
    }

    /// Realms consulted for external definitions, the base realm included.
    pub fn remote_realms(&self) -> Vec<Url> {
        let mut realms = self.known_realms.clone();
        if !realms.contains(&BASE_REALM) {
            realms.push(BASE_REALM.clone());
        }
        realms
    }
}

/// Registry of options for in-flight runs, keyed by a run id.
#[derive(Default)]
pub struct RunnerOptionsManager {
    next_id: AtomicU64,
    registered: Mutex<HashMap<u64, Arc<RunnerOptions>>>,
}

impl RunnerOptionsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register options for one run. The entry lives as long as the lease.
    pub fn register(self: &Arc<Self>, options: RunnerOptions) -> OptionsLease {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.registered.lock().insert(id, Arc::new(options));
        OptionsLease { id, manager: Arc::clone(self) }
    }

    pub fn get(&self, id: u64) -> Option<Arc<RunnerOptions>> {
        self.registered.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.registered.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its options from the registry when dropped.
pub struct OptionsLease {
    id: u64,
    manager: Arc<RunnerOptionsManager>,
}

impl OptionsLease {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for OptionsLease {
    fn drop(&mut self) {
        self.manager.registered.lock().remove(&self.id);
    }
}
