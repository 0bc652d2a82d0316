//! Config loading and realm opening shared by every indexing command.

use std::path::Path;
use std::sync::Arc;

use cardindex_core::config::loader::ConfigLoader;
use cardindex_core::config::types::ResolvedConfig;
use cardindex_core::index::{SearchIndex, open_realm};
use cardindex_core::loader::RealmLoader;
use url::Url;

use crate::logging;

pub fn load_config(config: Option<&Path>, profile: Option<&str>) -> ResolvedConfig {
    match ConfigLoader::load(config, profile) {
        Ok(rc) => rc,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

/// Load config, start logging, and index the configured realm.
pub fn indexed_realm(config: Option<&Path>, profile: Option<&str>) -> Arc<SearchIndex> {
    let rc = load_config(config, profile);
    logging::init(&rc);

    tracing::debug!(realm = %rc.realm_url, root = %rc.realm_root.display(), "opening realm");
    let loader = Arc::new(RealmLoader::new());
    let index = match open_realm(&rc, &loader) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("Error opening realm {}: {}", rc.realm_url, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = index.run() {
        eprintln!("Error indexing realm {}: {}", rc.realm_url, e);
        std::process::exit(1);
    }
    index
}

/// Resolve a realm-relative path, or accept an absolute URL as is.
pub fn realm_url_for(index: &SearchIndex, path: &str) -> Url {
    if let Ok(url) = Url::parse(path) {
        return url;
    }
    match index.realm_url().join(path.trim_start_matches('/')) {
        Ok(url) => url,
        Err(e) => {
            eprintln!("Invalid path '{}': {}", path, e);
            std::process::exit(2);
        }
    }
}
