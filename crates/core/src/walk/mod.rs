//! Realm traversal: directory walking, ignore rules and file classification.

mod ignores;
mod visit;
mod walker;

pub use ignores::{
    IGNORE_FILES, IgnoreError, IgnoreMap, NODE_MODULES, REALM_METADATA_FILE, is_ignore_file,
};
pub use visit::{FileClass, Visited, classify, visit_file};
pub use walker::{Walk, WalkError, Walker};
