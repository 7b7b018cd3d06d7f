//! The sync session: thin glue between the adapter, the engine, the vault,
//! and the persistence store.
//!
//! A session owns exactly one filesystem adapter at a time, keyed by the
//! current remote URL; switching remotes reinitializes the adapter against
//! the new URL and hands it to the engine. Remote operations resolve
//! authentication through the vault and fail closed when no credential is
//! stored; interactive credential entry is an injected concern that lives
//! outside this layer.
//!
//! # Concurrency
//! One logical thread of control per session: callers must await each
//! remote operation before issuing the next against the same remote. This
//! is a documented caller-discipline invariant; no internal queue or lock
//! enforces it.

use crate::core::engine::GitEngine;
use crate::core::error::{Result, SyncError};
use crate::core::fs_adapter::{GitFs, SandboxFs};
use crate::core::persist::{KeyValueStore, SyncState};
use crate::core::providers::remote_identity;
use crate::core::status::{classify, GitFileStatus, StatusRow};
use crate::core::vault::{Credential, Vault};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a clone: where the project landed and what it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    pub root_dir: String,
    pub file_map: HashMap<String, String>,
}

pub struct SyncSession {
    engine: Box<dyn GitEngine>,
    vault: Vault,
    store: Arc<dyn KeyValueStore>,
    fs: Arc<dyn SandboxFs>,
    adapter: Option<Arc<GitFs>>,
    remote_url: Option<String>,
}

impl SyncSession {
    pub fn new(
        engine: Box<dyn GitEngine>,
        vault: Vault,
        store: Arc<dyn KeyValueStore>,
        fs: Arc<dyn SandboxFs>,
    ) -> Self {
        Self {
            engine,
            vault,
            store,
            fs,
            adapter: None,
            remote_url: None,
        }
    }

    /// The adapter for the current remote, if one is initialized.
    pub fn adapter(&self) -> Option<&Arc<GitFs>> {
        self.adapter.as_ref()
    }

    pub fn current_remote(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut Vault {
        &mut self.vault
    }

    /// The last-used remote metadata persisted by an earlier session.
    pub fn last_state(&self) -> Option<SyncState> {
        SyncState::load(&*self.store)
    }

    /// Reinitialize the adapter and the engine when the remote changes.
    fn ensure_remote(&mut self, url: &str) -> Result<()> {
        if self.remote_url.as_deref() == Some(url) {
            return Ok(());
        }
        let domain = remote_identity(url)?;
        let adapter = Arc::new(GitFs::new(domain, self.fs.clone()));
        self.engine.attach_adapter(adapter.clone());
        self.engine.init(url)?;
        self.adapter = Some(adapter);
        self.remote_url = Some(url.to_string());
        log::debug!("sync session now targets {url}");
        Ok(())
    }

    fn require_remote(&self) -> Result<&str> {
        self.remote_url.as_deref().ok_or(SyncError::NoRemoteConfigured)
    }

    /// Resolve the credential for a remote from the vault. No stored
    /// credential fails closed; this layer never proceeds unauthenticated.
    fn auth_for(&mut self, url: &str) -> Result<Credential> {
        let domain = remote_identity(url)?;
        self.vault.ensure_encryption()?;
        self.vault
            .lookup(&domain)?
            .ok_or(SyncError::AuthenticationRequired { domain })
    }

    /// Persist the credential and the last-used remote metadata after a
    /// successful remote operation.
    fn record_success(&mut self, url: &str, auth: &Credential) -> Result<()> {
        let domain = remote_identity(url)?;
        self.vault.save(&domain, auth)?;
        let branch = self
            .engine
            .current_branch()
            .unwrap_or_else(|_| "main".to_string());
        SyncState::new(url, branch).save(&*self.store)
    }

    /// Clone the remote into the session's file store and return the
    /// resulting file map, re-keyed relative to the project root.
    pub async fn clone(&mut self, url: &str) -> Result<CloneOutcome> {
        self.ensure_remote(url)?;
        let auth = self.auth_for(url)?;

        if let Err(err) = self.engine.clone_repo(&auth).await {
            // Leave nothing half-recorded; the caller discards the attempt
            // wholesale.
            if let Some(adapter) = &self.adapter {
                adapter.clear();
            }
            return Err(err);
        }
        self.record_success(url, &auth)?;

        let root_dir = self
            .engine
            .workdir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());
        let file_map = match &self.adapter {
            Some(adapter) => adapter.text_map(&root_dir),
            None => HashMap::new(),
        };
        Ok(CloneOutcome { root_dir, file_map })
    }

    pub async fn fetch(&mut self, refspec: Option<&str>) -> Result<()> {
        let url = self.require_remote()?.to_string();
        let auth = self.auth_for(&url)?;
        self.engine.fetch(refspec, &auth).await?;
        self.record_success(&url, &auth)
    }

    pub async fn push(&mut self, reference: &str) -> Result<()> {
        let url = self.require_remote()?.to_string();
        let auth = self.auth_for(&url)?;
        self.engine.push(reference, &auth).await?;
        self.record_success(&url, &auth)
    }

    /// Commit staged changes; returns the new commit id.
    pub async fn commit(&mut self, message: &str) -> Result<String> {
        self.require_remote()?;
        self.engine.commit(message).await
    }

    pub async fn stage_file(&mut self, path: &str) -> Result<()> {
        self.engine.stage(path).await
    }

    pub async fn unstage_file(&mut self, path: &str) -> Result<()> {
        self.engine.unstage(path).await
    }

    pub fn is_ignored(&self, path: &str) -> Result<bool> {
        self.engine.is_ignored(path)
    }

    /// Raw status rows, recomputed from scratch on every call.
    pub fn status_matrix(&self) -> Result<Vec<StatusRow>> {
        self.engine.status_matrix()
    }

    /// Classified status per file, for the status/history UI.
    pub fn status(&self) -> Result<Vec<(String, GitFileStatus)>> {
        self.status_matrix()?
            .into_iter()
            .map(|row| classify(&row).map(|status| (row.path, status)))
            .collect()
    }
}
