//! Index command: run the indexer and report what it found.

use std::path::Path;

use serde::Serialize;
use tabled::Tabled;

use super::common::indexed_realm;
use super::output::{print_json, print_table};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexReport {
    realm_url: String,
    version: u64,
    instances_indexed: usize,
    instance_errors: usize,
    module_errors: usize,
    definitions: usize,
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Stat")]
    name: &'static str,
    #[tabled(rename = "Count")]
    count: String,
}

pub fn run(config: Option<&Path>, profile: Option<&str>, json: bool) {
    let index = indexed_realm(config, profile);
    let state = index.run_state();
    let report = IndexReport {
        realm_url: index.realm_url().to_string(),
        version: index.version(),
        instances_indexed: state.stats.instances_indexed,
        instance_errors: state.stats.instance_errors,
        module_errors: state.stats.module_errors,
        definitions: state.definitions.len(),
    };

    if json {
        print_json(&report);
        return;
    }

    println!("Indexed {} (version {})", report.realm_url, report.version);
    let rows = vec![
        StatRow { name: "instances indexed", count: report.instances_indexed.to_string() },
        StatRow { name: "instance errors", count: report.instance_errors.to_string() },
        StatRow { name: "module errors", count: report.module_errors.to_string() },
        StatRow { name: "definitions", count: report.definitions.to_string() },
    ];
    print_table(&rows, "");

    for (url, entry) in &state.instances {
        if let Some(error) = entry.error() {
            eprintln!("  {}: {} ({})", url, error.title, error.message);
        }
    }
}
