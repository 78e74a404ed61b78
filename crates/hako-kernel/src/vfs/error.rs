//! VFS error types.

use std::io;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Absolute filesystem paths inside system messages. The leading group keeps
/// words like "Input/output" intact.
static ABSOLUTE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(^|[\s'"(=])/[^\s'"`:,;()]+"#).expect("static regex"));

/// VFS error type.
///
/// Path-carrying variants hold the client's *virtual* path, never the real
/// location on disk, so every message is safe to echo back to a client.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Traversal, malformed encoding, or a missing leading slash.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// A symlink on the path was refused by the mount's symlink policy.
    #[error("not found: {0}")]
    SymlinkBlocked(String),

    /// RPC call name outside the known command set.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// RPC call with the wrong number of arguments.
    #[error("{call} takes {expected} argument(s), got {got}")]
    ArityMismatch {
        call: String,
        expected: usize,
        got: usize,
    },

    /// Mount is read-only.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a SymlinkBlocked error.
    pub fn symlink_blocked(path: impl Into<String>) -> Self {
        Self::SymlinkBlocked(path.into())
    }

    /// Create an UnknownCommand error.
    pub fn unknown_command(call: impl Into<String>) -> Self {
        Self::UnknownCommand(call.into())
    }

    /// Map an I/O error observed while touching `path`, keeping the typed
    /// kinds that have a dedicated variant.
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(path),
            io::ErrorKind::NotADirectory => Self::not_a_directory(path),
            io::ErrorKind::IsADirectory => Self::is_a_directory(path),
            _ => Self::Io(err),
        }
    }

    /// True for NotFound and its symlink-policy specialisation.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::SymlinkBlocked(_))
    }

    /// Message suitable for a client response.
    ///
    /// I/O errors are the only variant that can carry an operating system
    /// message; absolute paths in it are replaced with `<path>`.
    pub fn client_message(&self) -> String {
        match self {
            Self::Io(err) => format!("I/O error: {}", redact_paths(&err.to_string())),
            other => other.to_string(),
        }
    }
}

/// Replace every absolute filesystem path in `message` with `<path>`.
pub fn redact_paths(message: &str) -> String {
    ABSOLUTE_PATH
        .replace_all(message, "${1}<path>")
        .into_owned()
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_paths() {
        let msg = "failed to copy /srv/share/secret.txt to /tmp/x: Permission denied";
        assert_eq!(
            redact_paths(msg),
            "failed to copy <path> to <path>: Permission denied"
        );
    }

    #[test]
    fn test_redact_paths_leaves_words_alone() {
        assert_eq!(
            redact_paths("Input/output error (os error 5)"),
            "Input/output error (os error 5)"
        );
        assert_eq!(redact_paths("'/etc/passwd'"), "'<path>'");
    }

    #[test]
    fn test_client_message_redacts_io() {
        let err = VfsError::Io(io::Error::other("cannot open /home/amy/root/file"));
        let msg = err.client_message();
        assert!(!msg.contains("/home"));
        assert!(msg.contains("<path>"));
    }

    #[test]
    fn test_symlink_blocked_reads_as_not_found() {
        let err = VfsError::symlink_blocked("/docker/readme.md");
        assert!(err.is_not_found());
        assert_eq!(err.client_message(), "not found: /docker/readme.md");
    }

    #[test]
    fn test_from_io_keeps_kind() {
        let err = VfsError::from_io("/a", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, VfsError::NotFound(p) if p == "/a"));

        let err = VfsError::from_io("/a", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, VfsError::Io(_)));
    }
}
