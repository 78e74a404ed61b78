//! Command line and environment configuration.

use std::io;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::Parser;
use hako_kernel::{MountContext, SymlinkPolicy};
use thiserror::Error;

use crate::constants::{DEFAULT_BIND_ADDRESS, DEFAULT_PORT, DEFAULT_URL_PREFIX};

/// Serve a directory tree over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "hako", version, about = "HTTP file browser for a single directory")]
pub struct Args {
    /// Directory to serve
    #[arg(env = "HAKO_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Bind address (IP literal)
    #[arg(long, env = "HAKO_HOST", default_value = DEFAULT_BIND_ADDRESS)]
    pub host: String,

    /// HTTP port
    #[arg(short, long, env = "HAKO_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// URL prefix to mount the tree under, e.g. /fancy-path/
    #[arg(long, env = "HAKO_PREFIX", default_value = DEFAULT_URL_PREFIX)]
    pub prefix: String,

    /// Follow symlinks, including ones pointing outside the root
    #[arg(long, env = "HAKO_SYMLINKS")]
    pub symlinks: bool,

    /// Refuse uploads and every mutation RPC
    #[arg(long, env = "HAKO_READ_ONLY")]
    pub read_only: bool,

    /// List dot-files
    #[arg(long, env = "HAKO_HIDDEN")]
    pub hidden: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, env = "HAKO_VERBOSE")]
    pub verbose: bool,
}

/// Configuration errors, reported before the server binds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open root {path}: {source}")]
    RootUnavailable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("root {0} is not a directory")]
    RootNotDirectory(String),

    #[error("invalid url prefix {0:?}: use letters, digits and - _ . ~ separated by /")]
    InvalidPrefix(String),

    #[error("invalid bind address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub root: PathBuf,
    pub prefix: String,
    pub symlinks: SymlinkPolicy,
    pub read_only: bool,
    pub show_hidden: bool,
}

impl ServerConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let root = canonical_root(&args.root)?;
        validate_prefix(&args.prefix)?;

        let ip: IpAddr = args
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidAddress {
                addr: args.host.clone(),
                source,
            })?;

        Ok(Self {
            addr: SocketAddr::new(ip, args.port),
            root,
            prefix: args.prefix.clone(),
            symlinks: SymlinkPolicy::from_follow(args.symlinks),
            read_only: args.read_only,
            show_hidden: args.hidden,
        })
    }

    /// The immutable mount shared by every request.
    pub fn mount_context(&self) -> MountContext {
        MountContext::new(&self.root)
            .with_url_prefix(&self.prefix)
            .with_symlinks(self.symlinks)
            .with_read_only(self.read_only)
            .with_hidden(self.show_hidden)
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf, ConfigError> {
    let canonical = dunce::canonicalize(root).map_err(|source| ConfigError::RootUnavailable {
        path: root.display().to_string(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(ConfigError::RootNotDirectory(root.display().to_string()));
    }
    Ok(canonical)
}

/// Prefixes end up in route paths and `<base href>`, so they are limited to
/// unreserved URL characters and may not contain dot segments.
fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    let charset_ok = prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '/'));
    let has_dot_segment = prefix.split('/').any(|s| s == "." || s == "..");
    if !charset_ok || has_dot_segment {
        return Err(ConfigError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}
