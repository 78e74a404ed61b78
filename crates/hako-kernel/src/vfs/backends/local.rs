//! Local filesystem backend.
//!
//! Performs listing, reads, writes and mutations against locations the
//! resolver has already validated. Nothing in here parses client strings.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::mount::MountContext;
use crate::vfs::path::VirtualPath;
use crate::vfs::resolve::resolve;
use crate::vfs::types::{DirEntry, ResolvedLocation};

/// Open file handed back by [`LocalBackend::read`].
#[derive(Debug)]
pub struct FileStream {
    pub file: fs::File,
    pub size: u64,
    pub mtime: SystemTime,
}

/// Local filesystem backend.
///
/// All operations are confined to the mount's root. For example, if the
/// root is `/srv/share`, then the virtual path `/hols/a.jpg` is
/// `/srv/share/hols/a.jpg`, unless a followed symlink says otherwise.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    ctx: MountContext,
}

impl LocalBackend {
    pub fn new(ctx: MountContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &MountContext {
        &self.ctx
    }

    /// Resolve a virtual path against this backend's mount.
    pub async fn resolve(&self, path: &VirtualPath) -> VfsResult<ResolvedLocation> {
        resolve(&self.ctx, path).await
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> VfsResult<()> {
        if self.ctx.read_only() {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Read directory entries, unsorted.
    ///
    /// Entries that no virtual path could address are skipped: non-UTF-8
    /// names, links the symlink policy refuses, dangling links, and dot-files
    /// unless the mount shows them.
    pub async fn list(&self, loc: &ResolvedLocation) -> VfsResult<Vec<DirEntry>> {
        if !loc.exists {
            return Err(VfsError::not_found(loc.display()));
        }
        if !loc.is_dir() {
            return Err(VfsError::not_a_directory(loc.display()));
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(loc.path())
            .await
            .map_err(|e| VfsError::from_io(&loc.display(), e))?;

        while let Some(entry) = dir.next_entry().await.map_err(VfsError::from)? {
            let Ok(name) = entry.file_name().into_string() else {
                debug!(dir = %loc.display(), "skipping non-UTF-8 entry name");
                continue;
            };
            if !self.ctx.show_hidden() && name.starts_with('.') {
                continue;
            }

            let file_type = entry.file_type().await.map_err(VfsError::from)?;
            let meta = if file_type.is_symlink() {
                if !self.ctx.symlinks().follows() {
                    continue;
                }
                match fs::metadata(entry.path()).await {
                    Ok(meta) => meta,
                    Err(_) => continue,
                }
            } else {
                entry.metadata().await.map_err(VfsError::from)?
            };

            entries.push(DirEntry::from_metadata(name, &meta));
        }

        Ok(entries)
    }

    /// Open a file for streaming.
    pub async fn read(&self, loc: &ResolvedLocation) -> VfsResult<FileStream> {
        if !loc.exists {
            return Err(VfsError::not_found(loc.display()));
        }
        if loc.is_dir() {
            return Err(VfsError::is_a_directory(loc.display()));
        }

        let file = fs::File::open(loc.path())
            .await
            .map_err(|e| VfsError::from_io(&loc.display(), e))?;
        let meta = file.metadata().await.map_err(VfsError::from)?;

        Ok(FileStream {
            file,
            size: meta.len(),
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        })
    }

    /// Create or overwrite a file with the contents of `reader`.
    ///
    /// The parent directory must already exist. Content is copied through a
    /// fixed buffer; an aborted stream leaves a partial file behind.
    pub async fn write<R>(&self, loc: &ResolvedLocation, reader: R) -> VfsResult<u64>
    where
        R: AsyncRead,
    {
        self.check_writable()?;
        if loc.is_root() || loc.is_dir() {
            return Err(VfsError::is_a_directory(loc.display()));
        }
        if !loc.parent_exists {
            return Err(VfsError::invalid_path(loc.display()));
        }

        let mut file = fs::File::create(loc.path())
            .await
            .map_err(|e| VfsError::from_io(&loc.display(), e))?;

        tokio::pin!(reader);
        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(VfsError::from)?;
        file.flush().await.map_err(VfsError::from)?;

        info!(path = %loc.display(), bytes = written, "wrote file");
        Ok(written)
    }

    /// Create a directory and any missing parents. Existing directories are
    /// left alone.
    pub async fn mkdirp(&self, loc: &ResolvedLocation) -> VfsResult<()> {
        self.check_writable()?;
        if loc.exists && loc.is_dir() {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder.create(loc.path()).await.map_err(|e| {
            warn!(path = %loc.display(), error = %e, "mkdirp failed");
            VfsError::Io(e)
        })?;

        info!(path = %loc.display(), "created directory");
        Ok(())
    }

    /// Move `src` to `dst`.
    ///
    /// Tries an atomic rename first. When the two sides live on different
    /// filesystems (possible once a symlink has been followed) the tree is
    /// copied and the source removed, which is not atomic.
    pub async fn rename(&self, src: &ResolvedLocation, dst: &ResolvedLocation) -> VfsResult<()> {
        self.check_writable()?;
        if src.is_root() || dst.is_root() {
            return Err(VfsError::invalid_path("/"));
        }
        if !src.exists {
            return Err(VfsError::not_found(src.display()));
        }
        if !dst.parent_exists {
            return Err(VfsError::invalid_path(dst.display()));
        }

        match fs::rename(src.path(), dst.path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!(
                    from = %src.display(),
                    to = %dst.display(),
                    "rename crosses devices, copying"
                );
                let from = src.path().to_path_buf();
                let to = dst.path().to_path_buf();
                tokio::task::spawn_blocking(move || {
                    copy_tree(&from, &to)?;
                    remove_tree(&from)
                })
                .await
                .map_err(io::Error::other)??;
            }
            Err(e) => {
                warn!(from = %src.display(), to = %dst.display(), error = %e, "rename failed");
                return Err(VfsError::Io(e));
            }
        }

        info!(from = %src.display(), to = %dst.display(), "moved");
        Ok(())
    }

    /// Recursively delete a file or directory.
    pub async fn remove(&self, loc: &ResolvedLocation) -> VfsResult<()> {
        self.check_writable()?;
        if loc.is_root() {
            return Err(VfsError::invalid_path("/"));
        }
        if !loc.exists {
            return Err(VfsError::not_found(loc.display()));
        }

        let result = if loc.is_dir() {
            fs::remove_dir_all(loc.path()).await
        } else {
            fs::remove_file(loc.path()).await
        };
        result.map_err(|e| VfsError::from_io(&loc.display(), e))?;

        info!(path = %loc.display(), "removed");
        Ok(())
    }
}

/// Copy a file, directory tree or symlink. Links are recreated, not
/// dereferenced.
fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = std::fs::symlink_metadata(src)?;
    if meta.file_type().is_symlink() {
        let target = std::fs::read_link(src)?;
        return std::os::unix::fs::symlink(target, dst);
    }
    if !meta.is_dir() {
        std::fs::copy(src, dst)?;
        return Ok(());
    }

    std::fs::create_dir(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        copy_tree(&entry.path(), &dst.join(entry.file_name()))?;
    }
    Ok(())
}

fn remove_tree(path: &Path) -> io::Result<()> {
    if std::fs::symlink_metadata(path)?.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::FileType;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    async fn setup() -> (LocalBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(MountContext::new(dir.path()));
        (backend, dir)
    }

    async fn loc(backend: &LocalBackend, path: &str) -> ResolvedLocation {
        backend
            .resolve(&VirtualPath::parse_absolute(path).unwrap())
            .await
            .unwrap()
    }

    async fn read_string(backend: &LocalBackend, path: &str) -> String {
        use tokio::io::AsyncReadExt;
        let mut stream = backend.read(&loc(backend, path).await).await.unwrap();
        let mut out = String::new();
        stream.file.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (backend, _dir) = setup().await;

        let written = backend
            .write(&loc(&backend, "/하 하").await, "123 하".as_bytes())
            .await
            .unwrap();
        assert_eq!(written, "123 하".len() as u64);
        assert_eq!(read_string(&backend, "/하 하").await, "123 하");
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let (backend, dir) = setup().await;
        std::fs::write(dir.path().join("a.txt"), b"old content").unwrap();

        backend
            .write(&loc(&backend, "/a.txt").await, &b"new"[..])
            .await
            .unwrap();
        assert_eq!(read_string(&backend, "/a.txt").await, "new");
    }

    #[tokio::test]
    async fn test_write_requires_parent() {
        let (backend, dir) = setup().await;

        let err = backend
            .write(&loc(&backend, "/missing/a.txt").await, &b"x"[..])
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
        assert!(!dir.path().join("missing").exists());
    }

    #[tokio::test]
    async fn test_write_onto_directory() {
        let (backend, dir) = setup().await;
        std::fs::create_dir(dir.path().join("d")).unwrap();

        let err = backend
            .write(&loc(&backend, "/d").await, &b"x"[..])
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::IsADirectory(_)));
    }

    #[tokio::test]
    async fn test_read_errors() {
        let (backend, dir) = setup().await;
        std::fs::create_dir(dir.path().join("d")).unwrap();

        let err = backend.read(&loc(&backend, "/nope").await).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));

        let err = backend.read(&loc(&backend, "/d").await).await.unwrap_err();
        assert!(matches!(err, VfsError::IsADirectory(_)));
    }

    #[tokio::test]
    async fn test_mkdirp_and_list() {
        let (backend, _dir) = setup().await;

        backend.mkdirp(&loc(&backend, "/a/b/c").await).await.unwrap();
        backend.mkdirp(&loc(&backend, "/a/b/c").await).await.unwrap();
        backend
            .write(&loc(&backend, "/a/file.txt").await, &b"12345"[..])
            .await
            .unwrap();

        let entries = backend.list(&loc(&backend, "/a").await).await.unwrap();
        let mut names: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        names.sort_by_key(|(name, _)| *name);
        assert_eq!(
            names,
            [("b", FileType::Directory), ("file.txt", FileType::File)]
        );
        let file = entries.iter().find(|e| e.name == "file.txt").unwrap();
        assert_eq!(file.size, 5);
    }

    #[tokio::test]
    async fn test_mkdirp_over_file_fails() {
        let (backend, dir) = setup().await;
        std::fs::write(dir.path().join("f"), b"x").unwrap();

        let err = backend.mkdirp(&loc(&backend, "/f").await).await.unwrap_err();
        assert!(matches!(err, VfsError::Io(_)));
    }

    #[tokio::test]
    async fn test_list_errors() {
        let (backend, dir) = setup().await;
        std::fs::write(dir.path().join("f"), b"x").unwrap();

        let err = backend.list(&loc(&backend, "/f").await).await.unwrap_err();
        assert!(matches!(err, VfsError::NotADirectory(_)));

        let err = backend.list(&loc(&backend, "/nope").await).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_hides_dotfiles_by_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".secret"), b"x").unwrap();
        std::fs::write(dir.path().join("plain"), b"x").unwrap();

        let hidden = LocalBackend::new(MountContext::new(dir.path()));
        let entries = hidden.list(&loc(&hidden, "/").await).await.unwrap();
        assert_eq!(entries.len(), 1);

        let shown = LocalBackend::new(MountContext::new(dir.path()).with_hidden(true));
        let entries = shown.list(&loc(&shown, "/").await).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_list_symlinks_follow_policy() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        symlink(outside.path(), dir.path().join("docker")).unwrap();
        symlink(dir.path().join("gone"), dir.path().join("dangling")).unwrap();

        let refuse = LocalBackend::new(MountContext::new(dir.path()));
        assert!(refuse.list(&loc(&refuse, "/").await).await.unwrap().is_empty());

        let follow = LocalBackend::new(MountContext::new(dir.path()).follow_symlinks(true));
        let entries = follow.list(&loc(&follow, "/").await).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "docker");
        assert!(entries[0].is_dir());
    }

    #[tokio::test]
    async fn test_rename() {
        let (backend, dir) = setup().await;
        std::fs::create_dir(dir.path().join("AAA")).unwrap();
        std::fs::create_dir(dir.path().join("hols")).unwrap();

        backend
            .rename(&loc(&backend, "/AAA").await, &loc(&backend, "/hols/AAA").await)
            .await
            .unwrap();

        assert!(!dir.path().join("AAA").exists());
        assert!(dir.path().join("hols/AAA").is_dir());
    }

    #[tokio::test]
    async fn test_rename_errors() {
        let (backend, dir) = setup().await;
        std::fs::create_dir(dir.path().join("AAA")).unwrap();

        let err = backend
            .rename(&loc(&backend, "/nope").await, &loc(&backend, "/x").await)
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));

        let err = backend
            .rename(&loc(&backend, "/AAA").await, &loc(&backend, "/no/parent").await)
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));

        let err = backend
            .rename(&loc(&backend, "/").await, &loc(&backend, "/x").await)
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
        assert!(dir.path().join("AAA").is_dir());
    }

    #[tokio::test]
    async fn test_remove() {
        let (backend, dir) = setup().await;
        std::fs::create_dir_all(dir.path().join("hols/AAA/x")).unwrap();
        std::fs::write(dir.path().join("hols/AAA/x/f"), b"x").unwrap();
        std::fs::write(dir.path().join("file"), b"x").unwrap();

        backend.remove(&loc(&backend, "/hols/AAA").await).await.unwrap();
        backend.remove(&loc(&backend, "/file").await).await.unwrap();
        assert!(!dir.path().join("hols/AAA").exists());
        assert!(!dir.path().join("file").exists());

        let err = backend.remove(&loc(&backend, "/hols/AAA").await).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));

        let err = backend.remove(&loc(&backend, "/").await).await.unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_read_only_refuses_mutations() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f"), b"x").unwrap();
        let backend = LocalBackend::new(MountContext::new(dir.path()).with_read_only(true));

        let f = loc(&backend, "/f").await;
        assert!(matches!(backend.remove(&f).await, Err(VfsError::ReadOnly)));
        assert!(matches!(
            backend.mkdirp(&loc(&backend, "/d").await).await,
            Err(VfsError::ReadOnly)
        ));
        assert!(matches!(
            backend.write(&f, &b"y"[..]).await,
            Err(VfsError::ReadOnly)
        ));
        assert!(dir.path().join("f").exists());
    }

    #[tokio::test]
    async fn test_mutations_follow_symlink_target() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        symlink(outside.path(), dir.path().join("docker")).unwrap();
        let backend = LocalBackend::new(MountContext::new(dir.path()).follow_symlinks(true));

        backend
            .mkdirp(&loc(&backend, "/docker/testfolder").await)
            .await
            .unwrap();
        assert!(outside.path().join("testfolder").is_dir());

        backend
            .remove(&loc(&backend, "/docker/testfolder").await)
            .await
            .unwrap();
        assert!(!outside.path().join("testfolder").exists());
        assert!(dir.path().join("docker").exists());
    }

    #[test]
    fn test_copy_tree_then_remove() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("t/sub")).unwrap();
        std::fs::write(src.path().join("t/sub/f"), b"data").unwrap();
        symlink("sub/f", src.path().join("t/link")).unwrap();

        copy_tree(&src.path().join("t"), &dst.path().join("t")).unwrap();
        remove_tree(&src.path().join("t")).unwrap();

        assert!(!src.path().join("t").exists());
        assert_eq!(std::fs::read(dst.path().join("t/sub/f")).unwrap(), b"data");
        assert_eq!(
            std::fs::read_link(dst.path().join("t/link")).unwrap(),
            Path::new("sub/f")
        );
    }
}
