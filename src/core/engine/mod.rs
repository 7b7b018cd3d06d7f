//! The embedded version-control engine boundary.
//!
//! The synchronization core does not implement object storage, packfiles,
//! or merge algorithms; it drives an engine through [`GitEngine`]. The
//! hosted product plugs in a sandbox-backed engine that talks to a
//! [`crate::core::fs_adapter::GitFs`]; native deployments use the bundled
//! [`LocalEngine`] over a checkout directory.

pub mod local;

use crate::core::error::Result;
use crate::core::fs_adapter::GitFs;
use crate::core::status::StatusRow;
use crate::core::vault::Credential;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub use local::LocalEngine;

/// Capability interface of the embedded version-control engine.
///
/// Remote operations take the credential resolved by the orchestrator;
/// engines never consult the vault themselves.
#[async_trait]
pub trait GitEngine: Send + Sync {
    /// Point the engine at a remote URL. Called whenever the session
    /// switches remotes; state tied to the previous remote is discarded.
    fn init(&mut self, url: &str) -> Result<()>;

    /// Receive the session's filesystem adapter. Engines that operate
    /// against the sandbox file store keep it; engines with their own
    /// storage (like [`LocalEngine`]) ignore it.
    fn attach_adapter(&mut self, _adapter: Arc<GitFs>) {}

    /// The local working directory, once one exists.
    fn workdir(&self) -> Option<PathBuf>;

    fn current_branch(&self) -> Result<String>;

    fn is_ignored(&self, path: &str) -> Result<bool>;

    /// One row per tracked or untracked file, recomputed from scratch on
    /// every call.
    fn status_matrix(&self) -> Result<Vec<StatusRow>>;

    async fn clone_repo(&mut self, auth: &Credential) -> Result<()>;

    async fn fetch(&mut self, refspec: Option<&str>, auth: &Credential) -> Result<()>;

    async fn push(&mut self, reference: &str, auth: &Credential) -> Result<()>;

    /// Commit staged changes; returns the new commit id.
    async fn commit(&mut self, message: &str) -> Result<String>;

    async fn stage(&mut self, path: &str) -> Result<()>;

    async fn unstage(&mut self, path: &str) -> Result<()>;
}
