//! Git Bridge - the synchronization core between a sandboxed project and
//! remote source-control hosts.
//!
//! This library provides the machinery a sandbox-hosted assistant needs to
//! keep a project in sync with GitHub or GitLab: a virtual filesystem
//! adapter for the embedded version-control engine, a deterministic file
//! status classifier, an encrypted credential vault, hosting-provider
//! bindings with retry-on-conflict push orchestration, and the sync session
//! that ties them together.
//!
//! # Public API
//! The main public interface is re-exported from the [`core`] module:
//! - Filesystem adapter and sandbox filesystem traits
//! - Status rows and the closed file-status taxonomy
//! - The credential vault and its persistence collaborator
//! - Provider bindings and the push orchestration entry point
//! - The sync session

pub mod core;

// Re-export the core public API for external users
pub use crate::core::{
    classify,
    descriptor_for_domain,
    differs_from_head,
    has_unstaged_divergence,
    index_matches_head,
    is_deleted_in_worktree,
    provider_slug,
    push_with_repo_handling,
    remote_identity,

    CloneOutcome,
    CommitFile,
    Credential,
    DirEntry,
    FileRecord,
    GitEngine,
    GitFileStatus,
    GitFs,
    GitProvider,
    GithubProvider,
    GitlabProvider,
    Interaction,
    JsonFileStore,
    KeyValueStore,
    LocalEngine,
    MemFs,
    MemoryStore,
    PushOutcome,
    RemoteProviderDescriptor,
    RepoHandle,
    Result,
    SandboxFs,
    StatResult,
    StatusRow,
    SyncError,
    SyncSession,
    SyncState,
    Vault,
    PROVIDERS,
};
