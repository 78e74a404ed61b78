//! Sandboxed view of a local directory tree.
//!
//! Key components:
//!
//! - [`MountContext`] - Root, URL prefix and symlink policy for one sandbox
//! - [`VirtualPath`] - Decoded, traversal-free client path
//! - [`resolve`] - Segment-by-segment walk from the root to a location
//! - [`SymlinkPolicy`] - The gate consulted for every symlink segment
//! - [`LocalBackend`] - Listing, streaming and mutations on resolved locations
//!
//! ## Design Decisions
//!
//! - **Parse, then walk**: [`VirtualPath`] rejects `.`/`..`/empty segments
//!   syntactically, so traversal never reaches the filesystem. The walk only
//!   deals with links and missing components.
//! - **Locations, not strings**: backend operations take a
//!   [`ResolvedLocation`] and never re-parse client input.
//! - **No shared state**: the filesystem is the only source of truth. There
//!   is no cache, lock table or index.

pub mod backends;
mod error;
mod mount;
mod path;
mod resolve;
mod symlink;
mod types;

pub use backends::{FileStream, LocalBackend};
pub use error::{VfsError, VfsResult, redact_paths};
pub use mount::MountContext;
pub use path::VirtualPath;
pub use resolve::resolve;
pub use symlink::{GateDecision, SymlinkPolicy};
pub use types::{DirEntry, FileType, ResolvedLocation};
