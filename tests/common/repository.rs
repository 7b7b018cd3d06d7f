//! Test repository setup utilities
//!
//! Provides functions for creating scratch git repositories in the various
//! tracking states the status matrix tests exercise.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test repository setup result. The TempDir must be kept alive for the
/// duration of the test to prevent cleanup.
pub struct TestRepo {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestRepo {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Run a git command in the repository, panicking on failure so broken
/// fixtures surface immediately.
pub fn git(repo: &Path, args: &[&str]) {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Create a fresh repository with user config set to avoid prompts.
pub fn setup_test_repo() -> anyhow::Result<TestRepo> {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().to_path_buf();

    git(&path, &["init", "-b", "main"]);
    git(&path, &["config", "user.name", "Test User"]);
    git(&path, &["config", "user.email", "test@example.com"]);

    Ok(TestRepo { temp_dir, path })
}

/// Create a repository whose single file `tracked.txt` is committed.
pub fn setup_repo_with_commit() -> anyhow::Result<TestRepo> {
    let repo = setup_test_repo()?;
    create_file(&repo.path, "tracked.txt", "original content\n")?;
    git(&repo.path, &["add", "tracked.txt"]);
    git(&repo.path, &["commit", "-m", "add tracked file"]);
    Ok(repo)
}

pub fn create_file(repo: &Path, name: &str, content: &str) -> anyhow::Result<()> {
    fs::write(repo.join(name), content)?;
    Ok(())
}

pub fn remove_file(repo: &Path, name: &str) -> anyhow::Result<()> {
    fs::remove_file(repo.join(name))?;
    Ok(())
}
