//! Recursive realm directory walker.

use std::collections::BTreeMap;

use thiserror::Error;
use url::Url;

use super::ignores::{IGNORE_FILES, IgnoreError, IgnoreMap};
use crate::index::DirectoryEntry;
use crate::realm::{EntryKind, PathError, Reader, ReaderError, RealmPaths};

#[derive(Debug, Error)]
pub enum WalkError {
    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Ignore(#[from] IgnoreError),
}

/// What a walk found: listings, ignore rules, and every file not ignored.
#[derive(Debug, Default)]
pub struct Walk {
    pub directories: BTreeMap<Url, Vec<DirectoryEntry>>,
    pub ignore_map: IgnoreMap,
    pub ignore_data: BTreeMap<String, String>,
    /// File URLs in walk order.
    pub files: Vec<Url>,
}

/// Walker for discovering the files of a realm.
pub struct Walker<'a> {
    paths: &'a RealmPaths,
    reader: &'a dyn Reader,
}

impl<'a> Walker<'a> {
    pub fn new(paths: &'a RealmPaths, reader: &'a dyn Reader) -> Self {
        Self { paths, reader }
    }

    /// Walk the whole realm from its root.
    pub fn walk(&self) -> Result<Walk, WalkError> {
        let mut walk = Walk::default();
        self.visit_directory("", &mut walk)?;
        tracing::debug!(
            realm = %self.paths.url(),
            files = walk.files.len(),
            directories = walk.directories.len(),
            "walked realm"
        );
        Ok(walk)
    }

    fn visit_directory(&self, local: &str, walk: &mut Walk) -> Result<(), WalkError> {
        let dir_url = self.paths.directory_url(local)?;

        // Rules must be in place before this directory's children are judged.
        if let Some(contents) = self.ignore_patterns(local)? {
            walk.ignore_map.insert(self.paths, dir_url.as_str(), &contents)?;
            walk.ignore_data.insert(dir_url.to_string(), contents);
        }

        let mut listing = Vec::new();
        for entry in self.reader.readdir(local)? {
            let url = match entry.kind {
                EntryKind::Directory => self.paths.directory_url(&entry.path)?,
                EntryKind::File => self.paths.file_url(&entry.path)?,
            };
            if walk.ignore_map.is_ignored(self.paths, &url) {
                continue;
            }
            listing.push(DirectoryEntry { name: entry.name.clone(), kind: entry.kind });
            match entry.kind {
                EntryKind::Directory => self.visit_directory(&entry.path, walk)?,
                EntryKind::File => walk.files.push(url),
            }
        }
        walk.directories.insert(dir_url, listing);
        Ok(())
    }

    /// First ignore file present in a directory, in precedence order.
    fn ignore_patterns(&self, local: &str) -> Result<Option<String>, WalkError> {
        for name in IGNORE_FILES {
            let path = if local.is_empty() { name.to_string() } else { format!("{local}/{name}") };
            if let Some(file) = self.reader.read_file_as_text(&path)? {
                return Ok(Some(file.content));
            }
        }
        Ok(None)
    }
}
