//! Scoped ignore rules.
//!
//! Each directory holding an ignore file contributes one rule set, scoped to
//! that directory. A path is judged by the most specific scope that contains
//! it; scopes do not cascade.

use std::collections::BTreeMap;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use thiserror::Error;
use url::Url;

use crate::realm::RealmPaths;

/// File names whose contents are ignore rules.
pub const IGNORE_FILES: &[&str] = &[".monacoignore", ".gitignore"];

/// Realm metadata, never indexed.
pub const REALM_METADATA_FILE: &str = ".realm.json";

/// Installed packages, never indexed.
pub const NODE_MODULES: &str = "node_modules";

#[derive(Debug, Error)]
pub enum IgnoreError {
    #[error("invalid ignore rules in {0}: {1}")]
    Compile(String, #[source] ignore::Error),
}

pub fn is_ignore_file(url: &Url) -> bool {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .is_some_and(|name| IGNORE_FILES.contains(&name))
}

/// Compiled ignore rules keyed by the URL of the directory they apply to.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMap {
    scopes: BTreeMap<String, Gitignore>,
}

impl IgnoreMap {
    /// Compile raw ignore file contents keyed by directory URL.
    pub fn compile(
        paths: &RealmPaths,
        data: &BTreeMap<String, String>,
    ) -> Result<Self, IgnoreError> {
        let mut map = IgnoreMap::default();
        for (dir, contents) in data {
            map.insert(paths, dir, contents)?;
        }
        Ok(map)
    }

    /// Add (or replace) the rules scoped to `dir_url`.
    pub fn insert(
        &mut self,
        paths: &RealmPaths,
        dir_url: &str,
        contents: &str,
    ) -> Result<(), IgnoreError> {
        let local = Url::parse(dir_url)
            .ok()
            .and_then(|url| paths.local(&url).ok())
            .unwrap_or_default();
        let root = if local.is_empty() { ".".to_string() } else { local };

        let mut builder = GitignoreBuilder::new(&root);
        for line in contents.lines() {
            builder
                .add_line(None, line)
                .map_err(|e| IgnoreError::Compile(dir_url.to_string(), e))?;
        }
        let gitignore = builder.build().map_err(|e| IgnoreError::Compile(dir_url.to_string(), e))?;
        self.scopes.insert(dir_url.to_string(), gitignore);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Whether `url` is excluded from indexing.
    pub fn is_ignored(&self, paths: &RealmPaths, url: &Url) -> bool {
        if url == paths.url() {
            return false;
        }
        if paths.file_url(REALM_METADATA_FILE).is_ok_and(|meta| &meta == url) {
            return true;
        }
        if url.path_segments().is_some_and(|mut s| s.any(|segment| segment == NODE_MODULES)) {
            return true;
        }

        let Some(rules) = self
            .scopes
            .iter()
            .filter(|(scope, _)| url.as_str().starts_with(scope.as_str()))
            .max_by_key(|(scope, _)| scope.len())
            .map(|(_, rules)| rules)
        else {
            return false;
        };
        let Ok(local) = paths.local(url) else {
            return false;
        };
        if local.is_empty() {
            return false;
        }
        let is_dir = url.path().ends_with('/');
        rules.matched_path_or_any_parents(&local, is_dir).is_ignore()
    }
}
