//! Symlink gate.
//!
//! Consulted by the resolver for every path segment that the filesystem
//! reports as a symbolic link, on every resolution (listing, fetch, upload,
//! mkdir, both ends of a move, delete).

use serde::{Deserialize, Serialize};

/// Server-wide policy for traversing symbolic links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymlinkPolicy {
    /// Any link anywhere on the path makes the whole path nonexistent.
    #[default]
    Refuse,
    /// Links are dereferenced and the walk continues at the target, which
    /// may live outside the sandbox root.
    Follow,
}

/// Outcome of asking the gate about one symlink segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Resolution fails as `SymlinkBlocked`.
    Deny,
    /// Dereference the link and keep walking from its target.
    Descend,
}

impl SymlinkPolicy {
    pub fn from_follow(follow: bool) -> Self {
        if follow { Self::Follow } else { Self::Refuse }
    }

    pub fn follows(self) -> bool {
        matches!(self, Self::Follow)
    }

    /// Decide what to do with a segment that is a symbolic link.
    pub fn gate(self) -> GateDecision {
        match self {
            Self::Refuse => GateDecision::Deny,
            Self::Follow => GateDecision::Descend,
        }
    }
}
