//! File access for a realm.
//!
//! The index never touches the filesystem directly; it reads through a
//! [`Reader`] so tests can run against an in-memory realm.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to read {0}: {1}")]
    Io(String, #[source] io::Error),

    #[error("failed to list directory {0}: {1}")]
    Walk(String, #[source] walkdir::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// Realm-relative path of the child.
    pub path: String,
    pub kind: EntryKind,
}

/// Contents of a file plus its modification time in unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub content: String,
    pub last_modified: i64,
}

pub trait Reader: Send + Sync {
    /// Read a realm-relative file. A missing file is `Ok(None)`.
    fn read_file_as_text(&self, path: &str) -> Result<Option<FileRef>, ReaderError>;

    /// List the immediate children of a realm-relative directory.
    fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, ReaderError>;
}

/// Reader backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsReader {
    root: PathBuf,
}

impl FsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, local: &str) -> PathBuf {
        let local = local.trim_matches('/');
        if local.is_empty() { self.root.clone() } else { self.root.join(local) }
    }
}

impl Reader for FsReader {
    fn read_file_as_text(&self, path: &str) -> Result<Option<FileRef>, ReaderError> {
        let full = self.resolve(path);
        let content = match fs::read_to_string(&full) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ReaderError::Io(full.display().to_string(), e)),
        };
        let modified = fs::metadata(&full)
            .and_then(|m| m.modified())
            .map_err(|e| ReaderError::Io(full.display().to_string(), e))?;
        let last_modified = DateTime::<Utc>::from(modified).timestamp();
        Ok(Some(FileRef { content, last_modified }))
    }

    fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, ReaderError> {
        let dir = self.resolve(path);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let prefix = path.trim_matches('/');

        let mut entries = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| ReaderError::Walk(dir.display().to_string(), e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if entry.file_type().is_dir() { EntryKind::Directory } else { EntryKind::File };
            let path = if prefix.is_empty() { name.clone() } else { format!("{prefix}/{name}") };
            entries.push(DirEntry { name, path, kind });
        }
        Ok(entries)
    }
}

/// Reader over an in-memory file map. Directories exist implicitly.
#[derive(Debug, Default)]
pub struct MemoryReader {
    files: RwLock<BTreeMap<String, FileRef>>,
    clock: AtomicI64,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a reader from `(path, contents)` pairs.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let reader = Self::new();
        for (path, content) in files {
            reader.write(path, content);
        }
        reader
    }

    /// Create or overwrite a file, bumping its modification time.
    pub fn write(&self, path: impl Into<String>, content: impl Into<String>) {
        let last_modified = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let path = path.into().trim_matches('/').to_string();
        self.files.write().insert(path, FileRef { content: content.into(), last_modified });
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(path.trim_matches('/')).is_some()
    }
}

impl Reader for MemoryReader {
    fn read_file_as_text(&self, path: &str) -> Result<Option<FileRef>, ReaderError> {
        Ok(self.files.read().get(path.trim_matches('/')).cloned())
    }

    fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, ReaderError> {
        let prefix = path.trim_matches('/');
        let mut children: BTreeMap<String, EntryKind> = BTreeMap::new();

        for key in self.files.read().keys() {
            let rest = if prefix.is_empty() {
                key.as_str()
            } else {
                match key.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children.insert(dir.to_string(), EntryKind::Directory);
                }
                None => {
                    children.entry(rest.to_string()).or_insert(EntryKind::File);
                }
            }
        }

        Ok(children
            .into_iter()
            .map(|(name, kind)| {
                let path = if prefix.is_empty() { name.clone() } else { format!("{prefix}/{name}") };
                DirEntry { name, path, kind }
            })
            .collect())
    }
}
