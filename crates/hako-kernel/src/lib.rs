//! # hako-kernel
//!
//! Core crate for hako, a small HTTP file browser.
//!
//! The kernel owns everything between an untrusted client path and the real
//! filesystem:
//! - Parses and validates virtual paths (no `..`, no control characters)
//! - Walks them from the sandbox root, gating every symlink segment
//! - Lists, streams, writes and mutates resolved locations
//! - Dispatches the `mkdirp` / `mv` / `rm` RPC commands
//! - Renders directory listings
//!
//! It knows nothing about HTTP; see `hako-server` for that.

pub mod listing;
pub mod rpc;
pub mod vfs;

pub use listing::render_listing;
pub use rpc::{CallName, RpcCommand, RpcRequest, RpcResult};
pub use vfs::{
    DirEntry, FileStream, FileType, LocalBackend, MountContext, ResolvedLocation, SymlinkPolicy,
    VfsError, VfsResult, VirtualPath,
};
