//! Per-server mount configuration.

use std::path::{Path, PathBuf};

use super::symlink::SymlinkPolicy;

/// Immutable description of one sandbox: where it lives on disk, which URL
/// prefix exposes it, and how symlinks inside it are treated.
///
/// Built once at startup and shared read-only by every request; nothing in
/// the kernel keeps ambient root or prefix state.
#[derive(Debug, Clone)]
pub struct MountContext {
    root: PathBuf,
    url_prefix: String,
    symlinks: SymlinkPolicy,
    read_only: bool,
    show_hidden: bool,
}

impl MountContext {
    /// Create a context rooted at `root`, mounted at `/`, refusing symlinks.
    ///
    /// The root is canonicalized at construction time (e.g. macOS `/tmp` →
    /// `/private/tmp`) so prefix checks against it are exact.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            url_prefix: "/".to_string(),
            symlinks: SymlinkPolicy::Refuse,
            read_only: false,
            show_hidden: false,
        }
    }

    /// Mount under a URL prefix. Normalized to start and end with `/`.
    pub fn with_url_prefix(mut self, prefix: &str) -> Self {
        self.url_prefix = normalize_prefix(prefix);
        self
    }

    /// Set the symlink policy.
    pub fn with_symlinks(mut self, policy: SymlinkPolicy) -> Self {
        self.symlinks = policy;
        self
    }

    /// Convenience for `with_symlinks` from a boolean flag.
    pub fn follow_symlinks(self, follow: bool) -> Self {
        self.with_symlinks(SymlinkPolicy::from_follow(follow))
    }

    /// Refuse every mutation on this mount.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Include dot-files in listings.
    pub fn with_hidden(mut self, show_hidden: bool) -> Self {
        self.show_hidden = show_hidden;
        self
    }

    /// Canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL prefix, always of the form `/` or `/a/b/`.
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn symlinks(&self) -> SymlinkPolicy {
        self.symlinks
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    /// Strip the mount prefix from a raw request path.
    ///
    /// Returns the remainder with a leading `/`, or `None` when the request
    /// does not belong to this mount. `/fancy-path` matches the mount
    /// `/fancy-path/` as its root.
    pub fn strip_prefix<'a>(&self, request_path: &'a str) -> Option<&'a str> {
        if self.url_prefix == "/" {
            return request_path.starts_with('/').then_some(request_path);
        }
        let bare = &self.url_prefix[..self.url_prefix.len() - 1];
        let rest = request_path.strip_prefix(bare)?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// Route path for an endpoint that lives directly under the prefix,
    /// e.g. `rpc` → `/fancy-path/rpc`.
    pub fn endpoint(&self, name: &str) -> String {
        format!("{}{}", self.url_prefix, name)
    }
}

/// Normalize a URL prefix to start and end with `/`, collapsing repeats.
fn normalize_prefix(prefix: &str) -> String {
    let segments: Vec<&str> = prefix.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    }
}
