use std::path::Path;

use cardindex_core::config::loader::{ConfigLoader, default_config_path};
use cardindex_core::config::types::{Backend, DispatchMode};

pub fn run(config: Option<&Path>, profile: Option<&str>) {
    let shown_path = config.map_or_else(
        || default_config_path().display().to_string(),
        |p| p.display().to_string(),
    );

    match ConfigLoader::load(config, profile) {
        Ok(rc) => {
            println!("OK   cardx doctor");
            println!("path: {shown_path}");
            println!("profile: {}", rc.active_profile);
            println!("realm_url: {}", rc.realm_url);
            println!("realm_root: {}", rc.realm_root.display());
            for realm in &rc.known_realms {
                println!("known_realm: {realm}");
            }
            let backend = match rc.index.backend {
                Backend::Memory => "memory",
                Backend::Sqlite => "sqlite",
            };
            println!("index.backend: {backend}");
            if rc.index.backend == Backend::Sqlite {
                println!("index.db_path: {}", rc.index.db_path.display());
            }
            let dispatch = match rc.index.dispatch {
                DispatchMode::InProcess => "in-process",
                DispatchMode::Queue => "queue",
            };
            println!("index.dispatch: {dispatch}");
        }
        Err(e) => {
            println!("FAIL cardx doctor");
            println!("{e}");
            if config.is_none() {
                println!("looked for: {shown_path}");
            }
            std::process::exit(1);
        }
    }
}
