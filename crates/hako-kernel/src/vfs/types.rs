//! Core VFS types.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::path::VirtualPath;

/// File type enumeration.
///
/// Symlinks never appear here: the resolver either refuses them or reports
/// the kind of their target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file (or anything that is not a directory).
    File,
    /// Directory.
    Directory,
}

impl FileType {
    pub fn of(meta: &Metadata) -> Self {
        if meta.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        }
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Directory entry, a read-only projection for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time.
    pub mtime: SystemTime,
}

impl DirEntry {
    pub fn from_metadata(name: impl Into<String>, meta: &Metadata) -> Self {
        let kind = FileType::of(meta);
        Self {
            name: name.into(),
            kind,
            size: if kind.is_dir() { 0 } else { meta.len() },
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// A virtual path after the resolver walk.
///
/// `real_path` is a descendant of the sandbox root unless `via_symlink` is
/// set, which only happens when the mount follows symlinks.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    /// The client's virtual path, used in every error message.
    pub virtual_path: VirtualPath,
    /// Where the path lives on disk.
    pub real_path: PathBuf,
    /// Whether the final component exists.
    pub exists: bool,
    /// Kind of the final component when it exists.
    pub kind: Option<FileType>,
    /// Whether the parent directory exists (always true for the root).
    pub parent_exists: bool,
    /// A symlink was dereferenced somewhere on the path.
    pub via_symlink: bool,
}

impl ResolvedLocation {
    pub fn is_dir(&self) -> bool {
        self.kind.is_some_and(|k| k.is_dir())
    }

    pub fn is_root(&self) -> bool {
        self.virtual_path.is_root()
    }

    pub fn path(&self) -> &Path {
        &self.real_path
    }

    /// Virtual path rendered for messages.
    pub fn display(&self) -> String {
        self.virtual_path.to_string()
    }
}
