mod common;

use std::sync::Arc;

use cardindex_core::index::{SearchOptions, UpdateOptions};
use cardindex_core::query::Query;
use cardindex_core::realm::MemoryReader;
use common::{PET, REALM, builder, ids, instance, url};
use serde_json::json;

fn pet(name: &str) -> String {
    instance("http://test/realm/pet", "Pet", json!({ "firstName": name }))
}

fn realm() -> Arc<MemoryReader> {
    Arc::new(MemoryReader::with_files([
        ("pet.gts".to_string(), PET.to_string()),
        (".gitignore".to_string(), "*.json\n".to_string()),
        ("mango.json".to_string(), pet("Mango")),
        ("sub/.gitignore".to_string(), "!keep.json\n".to_string()),
        ("sub/keep.json".to_string(), pet("Keep")),
        ("node_modules/dep.json".to_string(), pet("Dep")),
    ]))
}

#[test]
fn most_specific_ignore_file_wins() {
    let index = builder(REALM, realm()).build();
    index.run().unwrap();

    assert!(index.is_ignored(&url("mango.json")));
    assert!(!index.is_ignored(&url("sub/keep.json")));
    assert!(index.is_ignored(&url("node_modules/dep.json")));
    assert!(index.is_ignored(&url(".realm.json")));
    assert!(!index.is_ignored(&url("")));

    let found = index.search(&Query::default(), SearchOptions::default()).unwrap();
    assert_eq!(ids(&found), vec![url("sub/keep").to_string()]);

    let root: Vec<_> = index.directory(&url("")).unwrap().into_iter().map(|e| e.name).collect();
    assert!(!root.contains(&"mango.json".to_string()));
    assert!(!root.contains(&"node_modules".to_string()));
}

#[test]
fn monacoignore_takes_precedence() {
    let reader = realm();
    reader.write(".monacoignore", "sub/\n");
    let index = builder(REALM, reader).build();
    index.run().unwrap();

    assert!(!index.is_ignored(&url("mango.json")));
    assert!(index.is_ignored(&url("sub/keep.json")));
}

#[test]
fn editing_an_ignore_file_reindexes() {
    let reader = realm();
    let index = builder(REALM, reader.clone()).build();
    index.run().unwrap();

    reader.write(".gitignore", "sub/\n");
    index.update(&url(".gitignore"), UpdateOptions::default()).unwrap();

    let found = index.search(&Query::default(), SearchOptions::default()).unwrap();
    assert_eq!(ids(&found), vec![url("mango").to_string()]);
}
