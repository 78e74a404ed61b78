//! VFS backend implementations.

mod local;

pub use local::{FileStream, LocalBackend};
