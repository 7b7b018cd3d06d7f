//! `git2`-backed engine for native deployments.
//!
//! Operates on a real checkout directory under a workspace root. The
//! repository is reopened per call rather than held across awaits, and the
//! status matrix is recomputed from scratch on every call, a deliberate
//! simplicity/correctness trade-off over incremental maintenance.

use crate::core::engine::GitEngine;
use crate::core::error::{Result, SyncError};
use crate::core::status::StatusRow;
use crate::core::vault::Credential;
use async_trait::async_trait;
use git2::build::RepoBuilder;
use git2::{
    Cred, FetchOptions, ObjectType, Oid, PushOptions, RemoteCallbacks, Repository, Signature,
    Status, StatusOptions,
};
use std::path::{Path, PathBuf};

/// Directory name for a remote URL: scheme stripped, separators flattened.
fn checkout_dir_name(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    rest.trim_end_matches(".git")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '-' })
        .collect()
}

fn auth_callbacks(auth: &Credential) -> RemoteCallbacks<'static> {
    let username = auth.username.clone();
    let secret = auth.secret.clone();
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, _username_from_url, _allowed| {
        log::debug!("credential callback for {url}");
        Cred::userpass_plaintext(&username, &secret)
    });
    callbacks
}

pub struct LocalEngine {
    workspace: PathBuf,
    url: Option<String>,
    checkout: Option<PathBuf>,
}

impl LocalEngine {
    /// Engine whose checkouts live under the given workspace directory.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            url: None,
            checkout: None,
        }
    }

    /// Engine over an existing checkout, e.g. a project already on disk.
    pub fn at(checkout: impl Into<PathBuf>) -> Self {
        let checkout = checkout.into();
        Self {
            workspace: checkout.parent().map(Path::to_path_buf).unwrap_or_default(),
            url: None,
            checkout: Some(checkout),
        }
    }

    fn repo(&self) -> Result<Repository> {
        let checkout = self.require_checkout()?;
        Ok(Repository::open(checkout)?)
    }

    fn require_checkout(&self) -> Result<&PathBuf> {
        self.checkout
            .as_ref()
            .ok_or_else(|| SyncError::Git(git2::Error::from_str("engine has no checkout; call init first")))
    }

    fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .ok_or_else(|| SyncError::Git(git2::Error::from_str("engine has no remote URL; call init first")))
    }

    fn signature(repo: &Repository) -> Result<Signature<'static>> {
        repo.signature()
            .or_else(|_| Signature::now("git-bridge", "git-bridge@localhost"))
            .map_err(Into::into)
    }

    /// True when the worktree file at `path` hashes to the same blob the
    /// HEAD tree records. Distinguishes a staged deletion with an identical
    /// untracked file left behind from one where the path was recreated
    /// with new content.
    fn worktree_matches_head(repo: &Repository, workdir: &Path, path: &str) -> Result<bool> {
        let head_tree = repo.head()?.peel_to_tree()?;
        let entry = match head_tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(_) => return Ok(false),
        };
        let disk = Oid::hash_file(ObjectType::Blob, workdir.join(path))?;
        Ok(disk == entry.id())
    }

    fn matrix_row(repo: &Repository, workdir: &Path, path: &str, flags: Status) -> Result<StatusRow> {
        if flags.contains(Status::CONFLICTED) {
            // Merge conflicts do not occur in this product's flows; report
            // the file as fully diverged rather than failing the matrix.
            log::warn!("conflicted entry in status matrix: {path}");
            return Ok(StatusRow::new(path, 1, 2, 3));
        }

        let index_new = flags.intersects(Status::INDEX_NEW);
        let index_modified =
            flags.intersects(Status::INDEX_MODIFIED | Status::INDEX_TYPECHANGE | Status::INDEX_RENAMED);
        let index_deleted = flags.intersects(Status::INDEX_DELETED);
        let wt_new = flags.intersects(Status::WT_NEW);
        let wt_modified =
            flags.intersects(Status::WT_MODIFIED | Status::WT_TYPECHANGE | Status::WT_RENAMED);
        let wt_deleted = flags.intersects(Status::WT_DELETED);

        let (head, worktree, stage) = match (
            index_new,
            index_modified,
            index_deleted,
            wt_new,
            wt_modified,
            wt_deleted,
        ) {
            (false, false, false, false, false, false) => (1, 1, 1),
            (false, false, false, true, false, false) => (0, 2, 0),
            (true, false, false, false, false, false) => (0, 2, 2),
            (true, false, false, false, true, false) => (0, 2, 3),
            (true, false, false, false, false, true) => (0, 0, 3),
            (false, false, false, false, true, false) => (1, 2, 1),
            (false, true, false, false, false, false) => (1, 2, 2),
            (false, true, false, false, true, false) => (1, 2, 3),
            (false, false, false, false, false, true) => (1, 0, 1),
            (false, false, true, false, false, false) => (1, 0, 0),
            (false, true, false, false, false, true) => (1, 0, 3),
            (false, false, true, true, _, false) => {
                if Self::worktree_matches_head(repo, workdir, path)? {
                    (1, 1, 0)
                } else {
                    (1, 2, 0)
                }
            }
            _ => {
                return Err(SyncError::unknown_status_tuple(
                    path,
                    format!("git2:{:?}", flags),
                ))
            }
        };
        Ok(StatusRow::new(path, head, worktree, stage))
    }
}

#[async_trait]
impl GitEngine for LocalEngine {
    fn init(&mut self, url: &str) -> Result<()> {
        self.url = Some(url.to_string());
        self.checkout = Some(self.workspace.join(checkout_dir_name(url)));
        Ok(())
    }

    fn workdir(&self) -> Option<PathBuf> {
        self.checkout.clone()
    }

    fn current_branch(&self) -> Result<String> {
        let repo = self.repo()?;
        let head = repo.head()?;
        match head.shorthand() {
            Some(name) if head.is_branch() => Ok(name.to_string()),
            _ => Ok("HEAD".to_string()),
        }
    }

    fn is_ignored(&self, path: &str) -> Result<bool> {
        Ok(self.repo()?.is_path_ignored(path)?)
    }

    fn status_matrix(&self) -> Result<Vec<StatusRow>> {
        let repo = self.repo()?;
        let workdir = self
            .checkout
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_unmodified(true)
            .include_ignored(false);

        let statuses = repo.statuses(Some(&mut opts))?;
        let mut rows = Vec::with_capacity(statuses.len());
        for entry in statuses.iter() {
            let path = entry
                .path()
                .ok_or_else(|| git2::Error::from_str("non-UTF-8 path in status entry"))?;
            rows.push(Self::matrix_row(&repo, &workdir, path, entry.status())?);
        }
        rows.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(rows)
    }

    async fn clone_repo(&mut self, auth: &Credential) -> Result<()> {
        let url = self.require_url()?.to_string();
        let checkout = self.require_checkout()?.clone();

        if checkout.join(".git").exists() {
            log::debug!("checkout for {url} already present, skipping clone");
            return Ok(());
        }

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(auth_callbacks(auth));
        RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(&url, &checkout)?;
        log::debug!("cloned {url} into {}", checkout.display());
        Ok(())
    }

    async fn fetch(&mut self, refspec: Option<&str>, auth: &Credential) -> Result<()> {
        let repo = self.repo()?;
        let mut remote = repo.find_remote("origin")?;
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(auth_callbacks(auth));

        let refspecs: Vec<&str> = refspec.into_iter().collect();
        remote.fetch(&refspecs, Some(&mut fetch_options), None)?;
        Ok(())
    }

    async fn push(&mut self, reference: &str, auth: &Credential) -> Result<()> {
        let repo = self.repo()?;
        let mut remote = repo.find_remote("origin")?;
        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(auth_callbacks(auth));

        let refspec = format!("refs/heads/{reference}:refs/heads/{reference}");
        remote
            .push(&[refspec.as_str()], Some(&mut push_options))
            .map_err(|err| {
                let message = err.message().to_string();
                if message.contains("fast-forward") || message.contains("fastforward") {
                    SyncError::NonFastForward { message }
                } else {
                    SyncError::Git(err)
                }
            })
    }

    async fn commit(&mut self, message: &str) -> Result<String> {
        let repo = self.repo()?;
        let mut index = repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let signature = Self::signature(&repo)?;

        let parent = match repo.head() {
            Ok(head) => head.target().map(|oid| repo.find_commit(oid)).transpose()?,
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        index.write()?;
        Ok(oid.to_string())
    }

    async fn stage(&mut self, path: &str) -> Result<()> {
        let repo = self.repo()?;
        let checkout = self.require_checkout()?;
        let mut index = repo.index()?;
        if checkout.join(path).exists() {
            index.add_path(Path::new(path))?;
        } else {
            // Staging a worktree deletion removes the index entry.
            index.remove_path(Path::new(path))?;
        }
        index.write()?;
        Ok(())
    }

    async fn unstage(&mut self, path: &str) -> Result<()> {
        let repo = self.repo()?;
        match repo.head() {
            Ok(head) => {
                let target = head.peel(ObjectType::Commit)?;
                repo.reset_default(Some(&target), [path])?;
            }
            Err(_) => {
                // No commits yet; unstaging means dropping the index entry.
                let mut index = repo.index()?;
                index.remove_path(Path::new(path))?;
                index.write()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("git invocation failed");
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn scripted_repo() -> (TempDir, LocalEngine) {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-b", "main"]);
        git(dir.path(), &["config", "user.name", "Test User"]);
        git(dir.path(), &["config", "user.email", "test@example.com"]);
        let engine = LocalEngine::at(dir.path());
        (dir, engine)
    }

    #[test]
    fn test_checkout_dir_name() {
        assert_eq!(
            checkout_dir_name("https://github.com/octocat/project.git"),
            "github.com-octocat-project"
        );
        assert_eq!(
            checkout_dir_name("git@gitlab.com:group/project"),
            "git-gitlab.com-group-project"
        );
    }

    #[test]
    fn test_init_assigns_checkout_under_workspace() {
        let dir = TempDir::new().unwrap();
        let mut engine = LocalEngine::new(dir.path());
        engine.init("https://github.com/octocat/project.git").unwrap();
        let workdir = engine.workdir().unwrap();
        assert!(workdir.starts_with(dir.path()));
        assert!(workdir.ends_with("github.com-octocat-project"));
    }

    #[tokio::test]
    async fn test_commit_stage_and_branch_on_fresh_repo() {
        let (dir, mut engine) = scripted_repo();
        std::fs::write(dir.path().join("README.md"), "# project\n").unwrap();

        engine.stage("README.md").await.unwrap();
        let oid = engine.commit("Initial commit").await.unwrap();
        assert_eq!(oid.len(), 40);
        assert_eq!(engine.current_branch().unwrap(), "main");

        let rows = engine.status_matrix().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], StatusRow::new("README.md", 1, 1, 1));
    }

    #[tokio::test]
    async fn test_stage_and_unstage_roundtrip() {
        let (dir, mut engine) = scripted_repo();
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        engine.stage("a.txt").await.unwrap();
        engine.commit("add a").await.unwrap();

        std::fs::write(dir.path().join("a.txt"), "two").unwrap();
        engine.stage("a.txt").await.unwrap();
        let rows = engine.status_matrix().unwrap();
        assert_eq!(rows[0], StatusRow::new("a.txt", 1, 2, 2));

        engine.unstage("a.txt").await.unwrap();
        let rows = engine.status_matrix().unwrap();
        assert_eq!(rows[0], StatusRow::new("a.txt", 1, 2, 1));
    }

    #[tokio::test]
    async fn test_is_ignored_respects_gitignore() {
        let (dir, engine) = scripted_repo();
        std::fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();
        assert!(engine.is_ignored("target/debug/build.log").unwrap());
        assert!(!engine.is_ignored("src/main.rs").unwrap());
    }
}
