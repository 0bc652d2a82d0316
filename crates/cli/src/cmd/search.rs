//! Search command implementation.

use std::path::Path;

use cardindex_core::index::SearchOptions;
use cardindex_core::query::{Filter, Query, SortExpression};
use serde::de::DeserializeOwned;

use super::common::indexed_realm;
use super::output::{CardRow, print_json, print_table};
use crate::SearchArgs;

fn parse_arg<T: DeserializeOwned>(flag: &str, raw: Option<&str>) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            eprintln!("Invalid --{flag}: {e}");
            std::process::exit(2);
        }
    }
}

pub fn run(config: Option<&Path>, profile: Option<&str>, json: bool, args: SearchArgs) {
    let query = Query {
        id: None,
        filter: parse_arg::<Filter>("filter", args.filter.as_deref()),
        sort: parse_arg::<Vec<SortExpression>>("sort", args.sort.as_deref()),
    };

    let index = indexed_realm(config, profile);
    let found = match index.search(&query, SearchOptions { load_links: args.load_links }) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        }
    };

    if json {
        print_json(&found);
        return;
    }

    let rows: Vec<CardRow> = found.data.iter().map(CardRow::from).collect();
    print_table(&rows, "No cards found.");
    if !found.included.is_empty() {
        println!("Included:");
        let included: Vec<CardRow> = found.included.iter().map(CardRow::from).collect();
        print_table(&included, "");
    }
}
