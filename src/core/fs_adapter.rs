//! Virtual filesystem adapter between the sandbox file store and the
//! embedded version-control engine.
//!
//! The engine expects a narrow POSIX-flavored contract: read/write/stat/
//! mkdir/readdir plus symlink and permission calls. The sandbox has neither
//! symlinks nor a permission model, so those calls are stubbed to fail
//! predictably instead of crashing the engine. Every write is additionally
//! recorded in an in-memory side table so the file map can be reconstructed
//! after a clone or checkout completes.
//!
//! # Public API
//! - [`SandboxFs`]: Async collaborator trait the sandbox file store implements
//! - [`MemFs`]: Bundled in-memory implementation (local embedded filesystem)
//! - [`GitFs`]: The adapter handed to the engine, with the side table
//! - [`FileRecord`], [`StatResult`], [`DirEntry`]: Supporting data types

use crate::core::error::{Result, SyncError};
use crate::core::path_utils;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// One directory listing entry, as reported by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub mtime_ms: i64,
}

/// The sandbox file store, as consumed by this crate.
///
/// Every call is an independent asynchronous operation; cancellation (a
/// dropped future) must not leave the store half-written for a single call.
#[async_trait]
pub trait SandboxFs: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
    async fn mkdir(&self, path: &str) -> Result<()>;
    async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>>;
    async fn rm_file(&self, path: &str) -> Result<()>;
    async fn rm_dir(&self, path: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
enum MemNode {
    Dir,
    File { data: Vec<u8>, mtime_ms: i64 },
}

/// In-memory filesystem tree.
///
/// Serves as the local embedded filesystem for native sessions and as the
/// sandbox stand-in in tests. Paths are normalized POSIX strings; the root
/// `/` always exists.
#[derive(Default)]
pub struct MemFs {
    nodes: Mutex<BTreeMap<String, MemNode>>,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_parents(nodes: &mut BTreeMap<String, MemNode>, path: &str) {
        let mut dir = path_utils::dirname(path);
        while dir != "/" && dir != "." {
            nodes.entry(dir.clone()).or_insert(MemNode::Dir);
            dir = path_utils::dirname(&dir);
        }
    }

    fn children<'a>(
        nodes: &'a BTreeMap<String, MemNode>,
        dir: &str,
    ) -> Vec<(&'a String, &'a MemNode)> {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };
        nodes
            .iter()
            .filter(|(k, _)| {
                k.starts_with(&prefix) && {
                    let rest = &k[prefix.len()..];
                    !rest.is_empty() && !rest.contains('/')
                }
            })
            .collect()
    }
}

#[async_trait]
impl SandboxFs for MemFs {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = path_utils::normalize(path);
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(&path) {
            Some(MemNode::File { data, .. }) => Ok(data.clone()),
            _ => Err(SyncError::not_found(path)),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let path = path_utils::normalize(path);
        let mut nodes = self.nodes.lock().unwrap();
        Self::ensure_parents(&mut nodes, &path);
        nodes.insert(
            path,
            MemNode::File {
                data: data.to_vec(),
                mtime_ms: now_ms(),
            },
        );
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let path = path_utils::normalize(path);
        let mut nodes = self.nodes.lock().unwrap();
        Self::ensure_parents(&mut nodes, &path);
        nodes.insert(path, MemNode::Dir);
        Ok(())
    }

    async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let path = path_utils::normalize(path);
        let nodes = self.nodes.lock().unwrap();
        if path != "/" && !matches!(nodes.get(&path), Some(MemNode::Dir)) {
            return Err(SyncError::not_found(path));
        }
        let entries = Self::children(&nodes, &path)
            .into_iter()
            .map(|(full_path, node)| {
                let name = path_utils::basename(full_path);
                match node {
                    MemNode::Dir => DirEntry {
                        name,
                        is_dir: true,
                        size: 0,
                        mtime_ms: 0,
                    },
                    MemNode::File { data, mtime_ms } => DirEntry {
                        name,
                        is_dir: false,
                        size: data.len() as u64,
                        mtime_ms: *mtime_ms,
                    },
                }
            })
            .collect();
        Ok(entries)
    }

    async fn rm_file(&self, path: &str) -> Result<()> {
        let path = path_utils::normalize(path);
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get(&path) {
            Some(MemNode::File { .. }) => {
                nodes.remove(&path);
                Ok(())
            }
            _ => Err(SyncError::not_found(path)),
        }
    }

    async fn rm_dir(&self, path: &str) -> Result<()> {
        let path = path_utils::normalize(path);
        let mut nodes = self.nodes.lock().unwrap();
        if !matches!(nodes.get(&path), Some(MemNode::Dir)) {
            return Err(SyncError::not_found(path));
        }
        if !Self::children(&nodes, &path).is_empty() {
            return Err(SyncError::Io(std::io::Error::other("directory not empty")));
        }
        nodes.remove(&path);
        Ok(())
    }
}

/// One recorded write: the exact bytes and the declared encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub data: Vec<u8>,
    pub encoding: Option<String>,
}

/// Minimal stat metadata, sufficient for the embedded engine.
///
/// uid/gid/mode are placeholders; the sandbox has no ownership model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatResult {
    pub is_file: bool,
    pub is_dir: bool,
    pub size: u64,
    pub mtime_ms: i64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

/// The filesystem the embedded engine operates against.
///
/// One adapter instance serves one remote identity. Reads and directory
/// operations delegate to the underlying store; writes additionally upsert
/// the side table keyed by the engine-visible path. No operation silently
/// swallows an underlying failure.
pub struct GitFs {
    remote: String,
    fs: Arc<dyn SandboxFs>,
    records: Mutex<HashMap<String, FileRecord>>,
}

impl GitFs {
    pub fn new(remote: impl Into<String>, fs: Arc<dyn SandboxFs>) -> Self {
        Self {
            remote: remote.into(),
            fs,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// The remote identity this adapter is scoped to.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.fs.read_file(path).await
    }

    /// Write through to the store, then record the content and encoding in
    /// the side table. The record lands only after the write succeeds, so a
    /// cancelled call never leaves a phantom entry.
    pub async fn write_file(
        &self,
        path: &str,
        data: &[u8],
        encoding: Option<&str>,
    ) -> Result<()> {
        self.fs.write_file(path, data).await?;
        self.records.lock().unwrap().insert(
            path_utils::normalize(path),
            FileRecord {
                data: data.to_vec(),
                encoding: encoding.map(str::to_string),
            },
        );
        Ok(())
    }

    pub async fn mkdir(&self, path: &str) -> Result<()> {
        self.fs.mkdir(path).await
    }

    pub async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        self.fs.readdir(path).await
    }

    pub async fn rm(&self, path: &str) -> Result<()> {
        self.fs.rm_file(path).await
    }

    pub async fn rmdir(&self, path: &str) -> Result<()> {
        self.fs.rm_dir(path).await
    }

    /// `unlink` is `rm` under its POSIX name, which is what the engine calls.
    pub async fn unlink(&self, path: &str) -> Result<()> {
        self.fs.rm_file(path).await
    }

    /// Synthesize stat metadata by listing the parent directory and matching
    /// the base name. A missing entry fails with `ENOENT`; the engine uses
    /// that code to decide whether a path is new.
    pub async fn stat(&self, path: &str) -> Result<StatResult> {
        let normalized = path_utils::normalize(path);
        if normalized == "/" {
            self.fs.readdir("/").await?;
            return Ok(StatResult {
                is_file: false,
                is_dir: true,
                size: 0,
                mtime_ms: 0,
                uid: 0,
                gid: 0,
                mode: 0o40755,
            });
        }

        let parent = path_utils::dirname(&normalized);
        let base = path_utils::basename(&normalized);
        let entries = self.fs.readdir(&parent).await?;
        let entry = entries
            .into_iter()
            .find(|e| e.name == base)
            .ok_or_else(|| SyncError::not_found(&normalized))?;

        Ok(StatResult {
            is_file: !entry.is_dir,
            is_dir: entry.is_dir,
            size: entry.size,
            mtime_ms: entry.mtime_ms,
            uid: 0,
            gid: 0,
            mode: if entry.is_dir { 0o40755 } else { 0o100644 },
        })
    }

    /// No symlinks in the sandbox, so lstat is stat.
    pub async fn lstat(&self, path: &str) -> Result<StatResult> {
        self.stat(path).await
    }

    /// The sandbox has no symlink model; fails with `ENOTSUP`.
    pub fn symlink(&self, _target: &str, _path: &str) -> Result<()> {
        Err(SyncError::unsupported("symlink"))
    }

    /// The sandbox has no symlink model; fails with `ENOTSUP`.
    pub fn readlink(&self, _path: &str) -> Result<String> {
        Err(SyncError::unsupported("readlink"))
    }

    /// The sandbox has no permission model; succeeds unconditionally.
    pub fn chmod(&self, _path: &str, _mode: u32) -> Result<()> {
        Ok(())
    }

    /// Walk the side table and re-key every record relative to the project
    /// root, for return to the caller after a clone or checkout.
    pub fn export(&self, root: &str) -> HashMap<String, FileRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(path, record)| (path_utils::relative(root, path), record.clone()))
            .collect()
    }

    /// Convenience view of [`GitFs::export`] with contents decoded as text.
    pub fn text_map(&self, root: &str) -> HashMap<String, String> {
        self.export(root)
            .into_iter()
            .map(|(path, record)| (path, String::from_utf8_lossy(&record.data).into_owned()))
            .collect()
    }

    /// Number of recorded writes.
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Discard the side table wholesale, e.g. after an aborted clone.
    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GitFs {
        GitFs::new("github.com", Arc::new(MemFs::new()))
    }

    #[tokio::test]
    async fn test_write_then_read_exact_bytes() {
        let fs = adapter();
        let text = "fn main() {}\n".as_bytes();
        let binary = [0u8, 159, 146, 150, 255];

        fs.write_file("/project/src/main.rs", text, Some("utf8"))
            .await
            .unwrap();
        fs.write_file("/project/logo.bin", &binary, None)
            .await
            .unwrap();

        assert_eq!(fs.read_file("/project/src/main.rs").await.unwrap(), text);
        assert_eq!(fs.read_file("/project/logo.bin").await.unwrap(), binary);
    }

    #[tokio::test]
    async fn test_stat_synthesis_from_parent_listing() {
        let fs = adapter();
        fs.write_file("/project/a.txt", b"hello", None).await.unwrap();
        fs.mkdir("/project/src").await.unwrap();

        let file = fs.stat("/project/a.txt").await.unwrap();
        assert!(file.is_file);
        assert!(!file.is_dir);
        assert_eq!(file.size, 5);
        assert_eq!(file.mode, 0o100644);
        assert_eq!((file.uid, file.gid), (0, 0));

        let dir = fs.lstat("/project/src").await.unwrap();
        assert!(dir.is_dir);
        assert_eq!(dir.mode, 0o40755);

        let root = fs.stat("/").await.unwrap();
        assert!(root.is_dir);
    }

    #[tokio::test]
    async fn test_stat_missing_path_is_enoent() {
        let fs = adapter();
        fs.mkdir("/project").await.unwrap();
        let err = fs.stat("/project/nope.txt").await.unwrap_err();
        assert_eq!(err.posix_code(), Some("ENOENT"));
    }

    #[tokio::test]
    async fn test_symlink_family_stubs() {
        let fs = adapter();
        assert_eq!(
            fs.symlink("/a", "/b").unwrap_err().posix_code(),
            Some("ENOTSUP")
        );
        assert_eq!(
            fs.readlink("/a").unwrap_err().posix_code(),
            Some("ENOTSUP")
        );
        // chmod succeeds unconditionally
        fs.chmod("/anything", 0o755).unwrap();
    }

    #[tokio::test]
    async fn test_side_table_export_rekeys_relative() {
        let fs = adapter();
        fs.write_file("/home/project/README.md", b"# Project", Some("utf8"))
            .await
            .unwrap();
        fs.write_file("/home/project/src/lib.rs", b"pub fn x() {}", Some("utf8"))
            .await
            .unwrap();

        let map = fs.export("/home/project");
        assert_eq!(map.len(), 2);
        assert_eq!(map["README.md"].data, b"# Project");
        assert_eq!(map["src/lib.rs"].encoding.as_deref(), Some("utf8"));

        let text = fs.text_map("/home/project");
        assert_eq!(text["README.md"], "# Project");
    }

    #[tokio::test]
    async fn test_overwrite_upserts_side_table() {
        let fs = adapter();
        fs.write_file("/p/f.txt", b"one", None).await.unwrap();
        fs.write_file("/p/f.txt", b"two", None).await.unwrap();
        assert_eq!(fs.record_count(), 1);
        assert_eq!(fs.export("/p")["f.txt"].data, b"two");
    }

    #[tokio::test]
    async fn test_clear_discards_side_table_wholesale() {
        let fs = adapter();
        fs.write_file("/p/f.txt", b"data", None).await.unwrap();
        assert_eq!(fs.record_count(), 1);
        fs.clear();
        assert_eq!(fs.record_count(), 0);
        // Underlying store is untouched; only the side table resets
        assert_eq!(fs.read_file("/p/f.txt").await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_memfs_readdir_and_removal() {
        let fs = MemFs::new();
        fs.write_file("/a/b/file.txt", b"x").await.unwrap();
        fs.mkdir("/a/empty").await.unwrap();

        let names: Vec<String> = fs
            .readdir("/a")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["b".to_string(), "empty".to_string()]);

        // rmdir refuses non-empty directories
        assert!(fs.rm_dir("/a/b").await.is_err());
        fs.rm_file("/a/b/file.txt").await.unwrap();
        fs.rm_dir("/a/b").await.unwrap();
        assert!(fs.read_file("/a/b/file.txt").await.unwrap_err().is_not_found());

        // removing a missing file reports ENOENT
        assert!(fs.rm_file("/a/ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_readdir_missing_dir_is_enoent() {
        let fs = MemFs::new();
        assert!(fs.readdir("/nope").await.unwrap_err().is_not_found());
    }
}
