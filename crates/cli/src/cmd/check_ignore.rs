use std::path::Path;

use super::common::{indexed_realm, realm_url_for};
use super::output::print_json;
use crate::CheckIgnoreArgs;

pub fn run(config: Option<&Path>, profile: Option<&str>, json: bool, args: CheckIgnoreArgs) {
    let index = indexed_realm(config, profile);
    let url = realm_url_for(&index, &args.path);
    let ignored = index.is_ignored(&url);

    if json {
        print_json(&serde_json::json!({ "url": url.as_str(), "ignored": ignored }));
    } else if ignored {
        println!("{}: ignored", args.path);
    } else {
        println!("{}: not ignored", args.path);
    }
}
