//! Core functionality of the synchronization layer.
//!
//! This module provides the fundamental building blocks: the filesystem
//! adapter, status classification, the credential vault, provider bindings,
//! the engine boundary, and the sync session that glues them together.

pub mod engine;
pub mod error;
pub mod fs_adapter;
pub mod path_utils;
pub mod persist;
pub mod providers;
pub mod status;
pub mod sync;
pub mod vault;

// === Error handling ===
// Core error types and result type used throughout the crate
pub use error::{Result, SyncError};

// === Filesystem adapter ===
// The virtual filesystem handed to the embedded engine, plus the sandbox
// collaborator trait and the bundled in-memory implementation
pub use fs_adapter::{DirEntry, FileRecord, GitFs, MemFs, SandboxFs, StatResult};

// === Status classification ===
// Raw status rows and the closed taxonomy of named file states
pub use status::{
    classify, differs_from_head, has_unstaged_divergence, index_matches_head,
    is_deleted_in_worktree, GitFileStatus, StatusRow,
};

// === Credential vault ===
// Encrypted at-rest credential storage keyed by remote domain
pub use vault::{Credential, Vault};

// === Persistence ===
// Key-value collaborator trait and the last-used remote metadata
pub use persist::{JsonFileStore, KeyValueStore, MemoryStore, SyncState};

// === Providers ===
// Capability interface per hosting provider and the push orchestration
pub use providers::{
    descriptor_for_domain, provider_slug, push_with_repo_handling, remote_identity, CommitFile,
    GitProvider, GithubProvider, GitlabProvider, Interaction, PushOutcome,
    RemoteProviderDescriptor, RepoHandle, PROVIDERS,
};

// === Engine boundary ===
// The embedded version-control engine collaborator and its local binding
pub use engine::{GitEngine, LocalEngine};

// === Sync session ===
// The orchestrator owning one adapter per remote
pub use sync::{CloneOutcome, SyncSession};
