//! Mutation RPCs: `mkdirp`, `mv`, `rm`.
//!
//! The command set is closed. A call name outside it is `UnknownCommand`;
//! adding a command means adding a variant and a match arm here.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info};

use crate::vfs::{LocalBackend, VfsError, VfsResult, VirtualPath};

/// Wire form of an RPC call: `{"call": "mv", "args": ["/a", "/b"]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub call: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Known call names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CallName {
    Mkdirp,
    Mv,
    Rm,
}

impl CallName {
    /// Number of path arguments the call takes.
    pub fn arity(self) -> usize {
        match self {
            CallName::Mkdirp | CallName::Rm => 1,
            CallName::Mv => 2,
        }
    }
}

/// A parsed command whose arguments are valid absolute virtual paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcCommand {
    Mkdirp(VirtualPath),
    Mv { src: VirtualPath, dst: VirtualPath },
    Rm(VirtualPath),
}

impl RpcCommand {
    /// Parse a call name and its arguments.
    ///
    /// Every argument must be an absolute virtual path (leading `/`) free of
    /// traversal; nothing touches the filesystem until all of them pass.
    pub fn parse(call: &str, args: &[String]) -> VfsResult<Self> {
        let name = CallName::from_str(call).map_err(|_| VfsError::unknown_command(call))?;
        let arity = || VfsError::ArityMismatch {
            call: name.to_string(),
            expected: name.arity(),
            got: args.len(),
        };
        if args.len() != name.arity() {
            return Err(arity());
        }

        let paths = args
            .iter()
            .map(|arg| VirtualPath::parse_absolute(arg))
            .collect::<VfsResult<Vec<_>>>()?;

        match (name, paths.as_slice()) {
            (CallName::Mkdirp, [path]) => Ok(RpcCommand::Mkdirp(path.clone())),
            (CallName::Mv, [src, dst]) => Ok(RpcCommand::Mv {
                src: src.clone(),
                dst: dst.clone(),
            }),
            (CallName::Rm, [path]) => Ok(RpcCommand::Rm(path.clone())),
            _ => Err(arity()),
        }
    }

    pub fn name(&self) -> CallName {
        match self {
            RpcCommand::Mkdirp(_) => CallName::Mkdirp,
            RpcCommand::Mv { .. } => CallName::Mv,
            RpcCommand::Rm(_) => CallName::Rm,
        }
    }

    /// Resolve every argument and apply the command.
    pub async fn run(&self, backend: &LocalBackend) -> VfsResult<()> {
        match self {
            RpcCommand::Mkdirp(path) => {
                let loc = backend.resolve(path).await?;
                backend.mkdirp(&loc).await
            }
            RpcCommand::Mv { src, dst } => {
                let src = backend.resolve(src).await?;
                let dst = backend.resolve(dst).await?;
                backend.rename(&src, &dst).await
            }
            RpcCommand::Rm(path) => {
                let loc = backend.resolve(path).await?;
                backend.remove(&loc).await
            }
        }
    }
}

/// The `{ok, message}` envelope returned for every call.
///
/// `message` is `ok` on success and starts with `error:` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcResult {
    pub ok: bool,
    pub message: String,
}

impl RpcResult {
    pub fn success() -> Self {
        Self {
            ok: true,
            message: "ok".to_string(),
        }
    }

    pub fn failure(err: &VfsError) -> Self {
        Self {
            ok: false,
            message: format!("error: {}", err.client_message()),
        }
    }

    pub fn from_outcome(outcome: &VfsResult<()>) -> Self {
        match outcome {
            Ok(()) => Self::success(),
            Err(err) => Self::failure(err),
        }
    }
}

/// Parse and run one call.
pub async fn execute(backend: &LocalBackend, call: &str, args: &[String]) -> VfsResult<()> {
    let command = RpcCommand::parse(call, args).inspect_err(|e| {
        debug!(call, error = %e, "rejected rpc");
    })?;
    command.run(backend).await?;
    info!(call = %command.name(), ?args, "rpc ok");
    Ok(())
}

/// Parse and run one call, folding the outcome into an envelope.
pub async fn dispatch(backend: &LocalBackend, request: &RpcRequest) -> RpcResult {
    RpcResult::from_outcome(&execute(backend, &request.call, &request.args).await)
}
