use std::path::Path;

use cardindex_core::realm::EntryKind;
use serde::Serialize;
use tabled::Tabled;

use super::common::{indexed_realm, realm_url_for};
use super::output::{print_json, print_table};
use crate::LsArgs;

#[derive(Serialize, Tabled)]
struct EntryRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
}

pub fn run(config: Option<&Path>, profile: Option<&str>, json: bool, args: LsArgs) {
    let index = indexed_realm(config, profile);
    let mut dir = args.dir.trim_start_matches('/').to_string();
    if !dir.is_empty() && !dir.ends_with('/') {
        dir.push('/');
    }
    let url = realm_url_for(&index, &dir);

    let Some(listing) = index.directory(&url) else {
        eprintln!("No directory at {}", url);
        std::process::exit(1);
    };
    let rows: Vec<EntryRow> = listing
        .into_iter()
        .map(|entry| EntryRow {
            name: entry.name,
            kind: match entry.kind {
                EntryKind::File => "file",
                EntryKind::Directory => "directory",
            },
        })
        .collect();

    if json {
        print_json(&rows);
    } else {
        print_table(&rows, "Empty directory.");
    }
}
