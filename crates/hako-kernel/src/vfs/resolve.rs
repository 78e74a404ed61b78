//! Path resolver.
//!
//! Walks a [`VirtualPath`] from the sandbox root one segment at a time,
//! consulting the symlink gate for every segment that is a link. No library
//! canonicalization is applied to the path as a whole: a single canonicalize
//! call would silently follow links the policy is meant to refuse.
//!
//! The walk and the later filesystem operation are separate syscalls, so a
//! link swapped in between them is not caught. Closing that window would
//! need every operation to open relative to a directory handle with
//! no-follow semantics; the resolver accepts the gap.

use std::io;

use tokio::fs;
use tracing::debug;

use super::error::{VfsError, VfsResult};
use super::mount::MountContext;
use super::path::VirtualPath;
use super::symlink::GateDecision;
use super::types::{FileType, ResolvedLocation};

/// Resolve `path` against the mount.
///
/// Missing trailing components are not an error: the location comes back
/// with `exists == false` so that mkdir/upload/move can create it. A
/// non-directory in the middle of the path, or a symlink the gate refuses,
/// is.
pub async fn resolve(ctx: &MountContext, path: &VirtualPath) -> VfsResult<ResolvedLocation> {
    let shown = path.to_string();
    let segments = path.segments();

    let mut current = ctx.root().to_path_buf();
    let mut via_symlink = false;

    if segments.is_empty() {
        let meta = fs::metadata(&current)
            .await
            .map_err(|e| VfsError::from_io(&shown, e))?;
        return Ok(ResolvedLocation {
            virtual_path: path.clone(),
            real_path: current,
            exists: true,
            kind: Some(FileType::of(&meta)),
            parent_exists: true,
            via_symlink,
        });
    }

    let last = segments.len() - 1;
    for (i, seg) in segments.iter().enumerate() {
        let candidate = current.join(seg);

        let meta = match fs::symlink_metadata(&candidate).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Nothing below a missing segment can be a link yet.
                let real_path = segments[i + 1..]
                    .iter()
                    .fold(candidate, |acc, s| acc.join(s));
                return finish(ctx, path, ResolvedLocation {
                    virtual_path: path.clone(),
                    real_path,
                    exists: false,
                    kind: None,
                    parent_exists: i == last,
                    via_symlink,
                });
            }
            Err(e) => return Err(VfsError::from_io(&shown, e)),
        };

        let meta = if meta.file_type().is_symlink() {
            match ctx.symlinks().gate() {
                GateDecision::Deny => {
                    debug!(path = %shown, segment = %seg, "symlink refused by policy");
                    return Err(VfsError::symlink_blocked(&shown));
                }
                GateDecision::Descend => {
                    // Dangling links and loops both read as missing.
                    let target = fs::canonicalize(&candidate)
                        .await
                        .map_err(|_| VfsError::not_found(&shown))?;
                    let meta = fs::metadata(&target)
                        .await
                        .map_err(|_| VfsError::not_found(&shown))?;
                    debug!(path = %shown, segment = %seg, "following symlink");
                    via_symlink = true;
                    current = target;
                    meta
                }
            }
        } else {
            current = candidate;
            meta
        };

        if i < last && !meta.is_dir() {
            return Err(VfsError::not_a_directory(&shown));
        }
        if i == last {
            return finish(ctx, path, ResolvedLocation {
                virtual_path: path.clone(),
                real_path: current,
                exists: true,
                kind: Some(FileType::of(&meta)),
                parent_exists: true,
                via_symlink,
            });
        }
    }

    unreachable!("loop returns on the last segment")
}

/// Final containment check. Only a followed symlink may leave the root.
fn finish(
    ctx: &MountContext,
    path: &VirtualPath,
    location: ResolvedLocation,
) -> VfsResult<ResolvedLocation> {
    if !location.via_symlink && !location.real_path.starts_with(ctx.root()) {
        return Err(VfsError::invalid_path(path.to_string()));
    }
    Ok(location)
}
