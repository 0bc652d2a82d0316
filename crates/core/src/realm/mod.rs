//! Realm addressing and file access.

mod paths;
mod reader;

pub use paths::{
    EXECUTABLE_EXTENSIONS, INSTANCE_EXTENSION, PathError, RealmPaths, has_executable_extension,
    resolve_module, trim_executable_extension, trim_instance_extension,
};
pub use reader::{DirEntry, EntryKind, FileRef, FsReader, MemoryReader, Reader, ReaderError};
