//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Default HTTP port for hako.
pub const DEFAULT_PORT: u16 = 8001;

/// Default bind address (localhost only for security).
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default URL prefix the sandbox is mounted under.
pub const DEFAULT_URL_PREFIX: &str = "/";

/// Request header carrying the percent-encoded upload destination.
pub const UPLOAD_PATH_HEADER: &str = "hako-path";

/// Endpoint names, relative to the URL prefix.
pub const UPLOAD_ENDPOINT: &str = "post";
pub const RPC_ENDPOINT: &str = "rpc";
