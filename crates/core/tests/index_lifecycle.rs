mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use cardindex_core::card::CardRef;
use std::sync::{OnceLock, Weak};

use cardindex_core::index::{
    DbIndexer, Dispatch, IndexRunner, Indexer, IndexerError, LocalRunner, Operation, RunPhase,
    RunState, RunnerError, RunnerOptions, SearchEntryWithErrors, SearchError, SearchIndex,
    SearchOptions, SnapshotIndexer, StoredEntries, ThreadQueue, UpdateOptions,
};
use cardindex_core::query::Query;
use cardindex_core::types::{FieldType, Primitive, root_card_ref};
use common::{REALM, builder, ids, instance, pet_realm, url};
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;
use url::Url;

fn all() -> Query {
    Query::default()
}

#[test]
fn run_is_idempotent() {
    let index = builder(REALM, pet_realm()).build();

    index.run().unwrap();
    let first = index.run_state();
    index.run().unwrap();
    let second = index.run_state();

    let keys = |s: &cardindex_core::index::RunState| s.instances.keys().cloned().collect::<Vec<_>>();
    let defs = |s: &cardindex_core::index::RunState| {
        s.definitions.iter().map(|(k, _)| k.clone()).collect::<BTreeSet<_>>()
    };
    assert_eq!(keys(&first), keys(&second));
    assert_eq!(defs(&first), defs(&second));
    assert_eq!(first.stats, second.stats);
    assert_eq!(second.stats.instances_indexed, 3);
    assert_eq!(index.version(), 2);
    assert_eq!(index.phase(), RunPhase::Idle);
}

#[test]
fn dog_inherits_pet_fields() {
    let index = builder(REALM, pet_realm()).build();
    index.run().unwrap();

    let dog = index.type_of(&CardRef::exported("./dog", "Dog")).expect("Dog is defined");
    assert_eq!(dog.super_ref, Some(CardRef::exported(url("pet").as_str(), "Pet")));
    let fields: Vec<_> = dog.fields.keys().cloned().collect();
    assert_eq!(fields, vec!["age", "breed", "firstName"]);
    assert_eq!(dog.fields["age"].field_type, FieldType::Contains);
    assert_eq!(dog.fields["age"].field_card, Primitive::Number.card_ref());

    let pet = index.type_of(&CardRef::exported("./pet.gts", "Pet")).expect("Pet is defined");
    assert_eq!(pet.super_ref, Some(root_card_ref()));
    assert_eq!(
        index.exported_cards_of("./dog"),
        vec![CardRef::exported(url("dog").as_str(), "Dog")]
    );
}

#[test]
fn instances_carry_their_type_chain() {
    let index = builder(REALM, pet_realm()).build();
    index.run().unwrap();

    let rex = index.search_entry(&url("dogs/rex.json")).unwrap().unwrap();
    let rex = rex.entry().unwrap();
    assert_eq!(
        rex.types,
        vec![
            format!("{}/Dog", url("dog")),
            format!("{}/Pet", url("pet")),
            "https://cardstack.com/base/card-api/Card".to_string(),
        ]
    );
    assert!(rex.deps.contains(url("pet").as_str()));
}

#[test]
fn search_filters_and_sorts() {
    let index = builder(REALM, pet_realm()).build();
    index.run().unwrap();

    let query: Query = serde_json::from_value(json!({
        "filter": { "type": { "module": "./pet", "name": "Pet" } },
        "sort": [{ "by": "firstName", "on": { "module": "./pet", "name": "Pet" } }]
    }))
    .unwrap();
    let found = index.search(&query, SearchOptions::default()).unwrap();
    assert_eq!(
        ids(&found),
        vec![url("dogs/fido").to_string(), url("mango").to_string(), url("dogs/rex").to_string()]
    );

    let older: Query = serde_json::from_value(json!({
        "filter": { "on": { "module": "./dog", "name": "Dog" }, "range": { "age": { "gt": 5 } } }
    }))
    .unwrap();
    let found = index.search(&older, SearchOptions::default()).unwrap();
    assert_eq!(ids(&found), vec![url("dogs/fido").to_string()]);
}

#[test]
fn not_over_missing_field_is_indeterminate() {
    let index = builder(REALM, pet_realm()).build();
    index.run().unwrap();

    let query: Query = serde_json::from_value(json!({
        "filter": { "on": { "module": "./dog", "name": "Dog" }, "not": { "eq": { "breed": "Lab" } } }
    }))
    .unwrap();
    let found = index.search(&query, SearchOptions::default()).unwrap();
    // mango is not a Dog, so the negation stays unknown and mango is excluded
    assert_eq!(ids(&found), vec![url("dogs/fido").to_string()]);
}

#[test]
fn search_rejects_unknown_fields() {
    let index = builder(REALM, pet_realm()).build();
    index.run().unwrap();

    let query: Query = serde_json::from_value(json!({
        "filter": { "on": { "module": "./pet", "name": "Pet" }, "eq": { "breed": "Lab" } }
    }))
    .unwrap();
    let err = index.search(&query, SearchOptions::default()).unwrap_err();
    assert!(err.to_string().contains("nonexistent field"), "{err}");
}

#[test]
fn sort_ties_break_on_id() {
    let reader = Arc::new(cardindex_core::realm::MemoryReader::with_files([
        ("pet.gts".to_string(), common::PET.to_string()),
        ("b.json".to_string(), instance("./pet", "Pet", json!({ "firstName": "Same" }))),
        ("a.json".to_string(), instance("./pet", "Pet", json!({ "firstName": "Same" }))),
    ]));
    let index = builder(REALM, reader).build();
    index.run().unwrap();

    let query: Query = serde_json::from_value(json!({
        "sort": [{ "by": "firstName", "on": { "module": "./pet", "name": "Pet" } }]
    }))
    .unwrap();
    let found = index.search(&query, SearchOptions::default()).unwrap();
    assert_eq!(ids(&found), vec![url("a").to_string(), url("b").to_string()]);
}

#[test]
fn incremental_delete_removes_from_search() {
    let reader = pet_realm();
    let index = builder(REALM, reader.clone()).build();
    index.run().unwrap();

    let seen = Mutex::new(Vec::new());
    let record = |urls: &[Url]| seen.lock().extend(urls.iter().cloned());
    reader.remove("mango.json");
    index
        .update(&url("mango.json"), UpdateOptions { delete: true, on_invalidation: Some(&record) })
        .unwrap();

    assert_eq!(index.run_state().invalidations, vec![url("mango.json")]);
    assert_eq!(*seen.lock(), vec![url("mango")]);
    let found = index.search(&all(), SearchOptions::default()).unwrap();
    assert!(!ids(&found).contains(&url("mango").to_string()));
    assert_eq!(index.stats().instances_indexed, 2);
}

#[test]
fn module_change_reindexes_dependents() {
    let reader = pet_realm();
    let index = builder(REALM, reader.clone()).build();
    index.run().unwrap();

    reader.write("dog.gts", common::DOG.replace("breed", "kind"));
    index.update(&url("dog.gts"), UpdateOptions::default()).unwrap();

    let state = index.run_state();
    assert_eq!(state.invalidations[0], url("dog.gts"));
    assert!(state.invalidations.contains(&url("dogs/rex.json")));
    assert!(state.invalidations.contains(&url("dogs/fido.json")));
    assert!(!state.invalidations.contains(&url("mango.json")));

    let dog = index.type_of(&CardRef::exported("./dog", "Dog")).unwrap();
    assert!(dog.fields.contains_key("kind"));
}

#[test]
fn batch_of_many_runs_from_scratch() {
    let reader = pet_realm();
    let index = builder(REALM, reader.clone()).build();
    index.run().unwrap();

    reader.write("tuffy.json", instance("./pet", "Pet", json!({ "firstName": "Tuffy" })));
    reader.remove("mango.json");
    let seen = Mutex::new(Vec::new());
    let record = |urls: &[Url]| seen.lock().extend(urls.iter().cloned());
    index.update_batch(&[url("tuffy.json"), url("mango.json")], Some(&record)).unwrap();

    assert!(seen.lock().contains(&url("tuffy")));
    let found = ids(&index.search(&all(), SearchOptions::default()).unwrap());
    assert!(found.contains(&url("tuffy").to_string()));
    assert!(!found.contains(&url("mango").to_string()));

    // a single missing file is treated as a delete
    reader.remove("tuffy.json");
    index.update_batch(&[url("tuffy.json")], None).unwrap();
    assert!(index.card(&url("tuffy"), false).unwrap().is_none());
}

#[test]
fn run_without_runner_fails() {
    let index = cardindex_core::index::SearchIndex::builder(
        cardindex_core::realm::RealmPaths::parse(REALM).unwrap(),
        pet_realm(),
    )
    .build();

    assert!(matches!(index.run(), Err(RunnerError::NotRegistered(_))));
    assert!(matches!(
        index.update(&url("mango.json"), UpdateOptions::default()),
        Err(RunnerError::NotRegistered(_))
    ));
    assert_eq!(index.version(), 0);
}

#[test]
fn queue_dispatch_serializes_runs() {
    let reader = pet_realm();
    let index = builder(REALM, reader.clone())
        .dispatch(Dispatch::Queue(Arc::new(ThreadQueue::new())))
        .build();
    index.run().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let index = index.clone();
            let reader = reader.clone();
            thread::spawn(move || {
                let path = format!("extra-{i}.json");
                reader.write(path.clone(), instance("./pet", "Pet", json!({ "firstName": format!("Pet {i}") })));
                index.update(&url(&path), UpdateOptions::default()).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.stats().instances_indexed, 7);
    assert_eq!(index.version(), 5);
}

#[test]
fn sqlite_backend_serves_committed_entries() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("index.db");
    let index = builder(REALM, pet_realm())
        .indexer(Arc::new(DbIndexer::open(&db_path).unwrap()))
        .build();
    index.run().unwrap();

    let found = index.search(&all(), SearchOptions::default()).unwrap();
    assert_eq!(found.data.len(), 3);

    let reopened = DbIndexer::open(&db_path).unwrap();
    assert_eq!(reopened.realm_version(&Url::parse(REALM).unwrap()).unwrap(), Some(1));
    assert_eq!(reopened.count_instances(&Url::parse(REALM).unwrap()).unwrap(), 3);
}

#[test]
fn search_does_not_mix_unpublished_store_rows() {
    let db = Arc::new(DbIndexer::open_in_memory().unwrap());
    let index = builder(REALM, pet_realm()).indexer(db.clone()).build();
    index.run().unwrap();

    // A commit whose state has not been swapped in yet.
    let mut pending = (*index.run_state()).clone();
    pending.instances.clear();
    db.commit(&Arc::new(pending), 2).unwrap();

    let result = index.search(&all(), SearchOptions::default());
    assert!(matches!(
        result,
        Err(SearchError::Stale { published: 1, stored: Some(2), .. })
    ));

    index.run().unwrap();
    assert_eq!(index.version(), 2);
    let found = index.search(&all(), SearchOptions::default()).unwrap();
    assert_eq!(found.data.len(), 3);
}

/// Records `SearchIndex::phase` from inside a run.
#[derive(Default)]
struct PhaseLog {
    index: OnceLock<Weak<SearchIndex>>,
    seen: Mutex<Vec<RunPhase>>,
}

impl PhaseLog {
    fn record(&self) {
        if let Some(index) = self.index.get().and_then(Weak::upgrade) {
            self.seen.lock().push(index.phase());
        }
    }
}

struct LoggingRunner(Arc<PhaseLog>);

impl IndexRunner for LoggingRunner {
    fn from_scratch(&self, options: &RunnerOptions) -> Result<RunState, RunnerError> {
        self.0.record();
        LocalRunner.from_scratch(options)
    }

    fn incremental(
        &self,
        previous: &RunState,
        url: &Url,
        operation: Operation,
        options: &RunnerOptions,
    ) -> Result<RunState, RunnerError> {
        self.0.record();
        LocalRunner.incremental(previous, url, operation, options)
    }
}

struct LoggingIndexer(Arc<PhaseLog>, SnapshotIndexer);

impl Indexer for LoggingIndexer {
    fn commit(&self, state: &Arc<RunState>, version: u64) -> Result<(), IndexerError> {
        self.0.record();
        self.1.commit(state, version)
    }

    fn get_card(&self, url: &Url) -> Result<Option<SearchEntryWithErrors>, IndexerError> {
        self.1.get_card(url)
    }

    fn entries(&self, realm: &Url) -> Result<StoredEntries, IndexerError> {
        self.1.entries(realm)
    }
}

#[test]
fn run_phases_follow_each_other_without_idle_gap() {
    let log = Arc::new(PhaseLog::default());
    let index = builder(REALM, pet_realm())
        .runner(Arc::new(LoggingRunner(log.clone())))
        .indexer(Arc::new(LoggingIndexer(log.clone(), SnapshotIndexer::new())))
        .build();
    log.index.set(Arc::downgrade(&index)).unwrap();

    index.run().unwrap();
    index.update(&url("mango.json"), UpdateOptions { delete: true, on_invalidation: None }).unwrap();

    assert_eq!(
        *log.seen.lock(),
        vec![RunPhase::Building, RunPhase::Publishing, RunPhase::Revisiting, RunPhase::Merging]
    );
    assert_eq!(index.phase(), RunPhase::Idle);
}

#[test]
fn card_lookup_accepts_json_suffix_and_reports_errors() {
    let reader = pet_realm();
    reader.write("broken.json", "{ nope");
    let index = builder(REALM, reader).build();
    index.run().unwrap();

    match index.card(&url("mango.json"), false).unwrap() {
        Some(cardindex_core::index::CardLookup::Doc(doc)) => {
            assert_eq!(doc.data.id.as_deref(), Some(url("mango").as_str()));
            assert_eq!(doc.data.links.unwrap().self_link.as_deref(), Some(url("mango").as_str()));
        }
        other => panic!("expected a document, got {other:?}"),
    }
    match index.card(&url("broken"), false).unwrap() {
        Some(cardindex_core::index::CardLookup::Error(error)) => assert_eq!(error.status, 400),
        other => panic!("expected an error, got {other:?}"),
    }
    assert_eq!(index.stats().instance_errors, 1);
}

#[test]
fn directories_are_listed() {
    let index = builder(REALM, pet_realm()).build();
    index.run().unwrap();

    let listing = index.directory(&url("dogs/")).unwrap();
    let names: Vec<_> = listing.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["fido.json", "rex.json"]);
}
