use std::path::Path;

use cardindex_core::index::CardLookup;

use super::common::{indexed_realm, realm_url_for};
use super::output::print_json;
use crate::CardArgs;

pub fn run(config: Option<&Path>, profile: Option<&str>, args: CardArgs) {
    let index = indexed_realm(config, profile);
    let url = realm_url_for(&index, &args.path);

    match index.card(&url, args.load_links) {
        Ok(Some(CardLookup::Doc(doc))) => print_json(&doc),
        Ok(Some(CardLookup::Error(error))) => {
            print_json(&error);
            std::process::exit(1);
        }
        Ok(None) => {
            eprintln!("No card at {}", url);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error loading {}: {}", url, e);
            std::process::exit(1);
        }
    }
}
