//! hako server library
//!
//! HTTP surface for a hako sandbox: browsing, raw fetch, upload and the
//! mutation RPC, all under one configurable URL prefix.

pub mod config;
pub mod constants;
pub mod error;
pub mod http;

pub use config::{Args, ConfigError, ServerConfig};
pub use error::ApiError;
pub use http::{router, serve, shutdown_signal};
