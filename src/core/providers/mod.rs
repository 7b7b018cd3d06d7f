//! Hosting-provider abstraction for push, commit, branch, and merge-request
//! operations.
//!
//! A [`GitProvider`] is implemented once per hosting API (GitHub, GitLab).
//! Provider-specific metadata lives in [`RemoteProviderDescriptor`] values:
//! configuration, not behavior. The [`push_with_repo_handling`] entry point
//! drives the create-or-commit flow shared by both providers, including the
//! single bounded retry after a non-fast-forward rejection.
//!
//! # Public API
//! - [`GitProvider`]: Capability interface, two implementations
//! - [`push_with_repo_handling`]: The orchestration entry point
//! - [`Interaction`]: Injected confirm/prompt callbacks
//! - [`RepoHandle`], [`CommitFile`], [`PushOutcome`], [`RemoteProviderDescriptor`]

pub mod github;
pub mod gitlab;

use crate::core::error::{Result, SyncError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use github::GithubProvider;
pub use gitlab::GitlabProvider;

/// Commit message used when pushing a freshly created repository.
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial commit";

/// Static metadata for one hosting provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteProviderDescriptor {
    pub title: &'static str,
    pub domain: &'static str,
    pub slug: &'static str,
    pub token_instructions: &'static str,
    pub icon: &'static str,
}

/// The supported hosting providers.
pub const PROVIDERS: [RemoteProviderDescriptor; 2] = [
    RemoteProviderDescriptor {
        title: "GitHub",
        domain: "github.com",
        slug: "github",
        token_instructions:
            "Create a personal access token with repo scope under Settings > Developer settings > Personal access tokens",
        icon: "github",
    },
    RemoteProviderDescriptor {
        title: "GitLab",
        domain: "gitlab.com",
        slug: "gitlab",
        token_instructions:
            "Create a personal access token with api scope under Preferences > Access Tokens",
        icon: "gitlab",
    },
];

/// Descriptor for a domain, if the domain belongs to a known provider.
pub fn descriptor_for_domain(domain: &str) -> Option<&'static RemoteProviderDescriptor> {
    PROVIDERS
        .iter()
        .find(|d| d.domain == domain || domain.ends_with(&format!(".{}", d.domain)))
}

/// Short provider name for a domain (`github`, `gitlab`), used as the
/// legacy credential key prefix.
pub fn provider_slug(domain: &str) -> Option<&'static str> {
    descriptor_for_domain(domain).map(|d| d.slug)
}

/// Extract the remote identity: the host-name portion of a remote URL, up
/// to the first path separator. This is the vault lookup key and the
/// provider-selection key.
pub fn remote_identity(url: &str) -> Result<String> {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    let host = rest
        .split(['/', ':'])
        .next()
        .unwrap_or("")
        .rsplit('@')
        .next()
        .unwrap_or("");
    if host.is_empty() {
        return Err(SyncError::UnknownProvider {
            domain: url.to_string(),
        });
    }
    Ok(host.to_string())
}

/// Provider-specific opaque project handle. Scoped to one push/commit
/// session; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoHandle {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub web_url: String,
    /// Numeric project id, used by the GitLab API paths.
    pub project_id: Option<u64>,
}

/// One file in an outgoing commit, exact bytes as authored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFile {
    pub path: String,
    pub data: Vec<u8>,
}

impl CommitFile {
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }
}

/// Structured result of a push entry point. Expected failure modes land
/// here with a human-readable message instead of crossing the UI boundary
/// as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub success: bool,
    pub message: String,
}

impl PushOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// UI-level decision callbacks, injected so the orchestration logic is
/// testable without a UI.
pub trait Interaction: Send + Sync {
    /// Ask the user a yes/no question.
    fn request_confirmation(&self, message: &str) -> bool;
    /// Ask the user for a line of input; `None` means cancelled.
    fn request_input(&self, message: &str) -> Option<String>;
}

/// Capability interface implemented per hosting provider.
#[async_trait]
pub trait GitProvider: Send + Sync {
    fn descriptor(&self) -> &'static RemoteProviderDescriptor;

    /// Install the token used for every subsequent request.
    fn set_token(&mut self, secret: &str);

    /// Drop the cached repository handle.
    fn reset_handle(&mut self);

    /// The cached handle from the last lookup or creation, if any.
    fn handle(&self) -> Option<&RepoHandle>;

    /// Substring that identifies a non-fast-forward rejection in this
    /// provider's error text.
    fn non_fast_forward_marker(&self) -> &'static str;

    async fn validate_credentials(&self, username: &str, secret: &str) -> Result<bool>;

    /// Look up a repository; `None` means it does not exist (an expected
    /// outcome that drives the create-repo flow, not an error).
    async fn get_repo(&mut self, name: &str, owner: &str) -> Result<Option<RepoHandle>>;

    async fn create_repo(&mut self, name: &str) -> Result<RepoHandle>;

    async fn check_file_existence(&self, branch: &str, path: &str) -> Result<bool>;

    /// Commit the given files to the default branch of the cached handle.
    async fn create_commit(&self, files: &[CommitFile], message: &str) -> Result<()>;

    async fn create_branch(&self, name: &str, from_ref: &str) -> Result<()>;

    /// Open a merge/pull request; returns its web URL.
    async fn create_merge_request(
        &self,
        source_branch: &str,
        target_branch: &str,
        title: &str,
    ) -> Result<String>;

    /// Push all files as a single commit with the fixed initial message.
    async fn push(&self, files: &[CommitFile]) -> Result<()> {
        self.create_commit(files, INITIAL_COMMIT_MESSAGE).await
    }
}

fn is_non_fast_forward(provider: &dyn GitProvider, err: &SyncError) -> bool {
    match err {
        SyncError::NonFastForward { .. } => true,
        SyncError::Api { message, .. } => message.contains(provider.non_fast_forward_marker()),
        _ => false,
    }
}

/// Create-or-commit orchestration shared by both providers.
///
/// Looks up the repository; a missing repository triggers a create-repo
/// confirmation, an existing one a commit-message prompt. A commit rejected
/// as non-fast-forward offers one pull-and-retry round; the retry count is
/// bounded explicitly so persistent conflicts terminate with a failure
/// outcome. Expected failures return `PushOutcome { success: false }`;
/// only programmer errors and unexpected provider faults surface as `Err`.
pub async fn push_with_repo_handling(
    provider: &mut dyn GitProvider,
    interaction: &dyn Interaction,
    repo_name: &str,
    username: &str,
    files: &[CommitFile],
    secret: &str,
) -> Result<PushOutcome> {
    let mut retries_left = 1u8;

    loop {
        provider.set_token(secret);
        provider.reset_handle();

        let Some(handle) = provider.get_repo(repo_name, username).await? else {
            let title = provider.descriptor().title;
            let create = interaction.request_confirmation(&format!(
                "Repository \"{repo_name}\" was not found on {title}. Create it?"
            ));
            if !create {
                log::debug!("user declined creating {repo_name} on {title}");
                return Ok(PushOutcome::failed("Repository creation cancelled"));
            }
            let handle = provider.create_repo(repo_name).await?;
            provider.push(files).await?;
            return Ok(PushOutcome::ok(format!(
                "Repository created and code pushed: {}",
                handle.web_url
            )));
        };

        let message = interaction
            .request_input("Enter commit message:")
            .filter(|m| !m.trim().is_empty());
        let Some(message) = message else {
            return Ok(PushOutcome::failed("Commit message is required"));
        };

        match provider.create_commit(files, &message).await {
            Ok(()) => {
                return Ok(PushOutcome::ok(format!(
                    "Changes committed to {}",
                    handle.web_url
                )));
            }
            Err(err) if is_non_fast_forward(provider, &err) => {
                if retries_left == 0 {
                    return Ok(PushOutcome::failed(
                        "The remote branch moved again; pull the latest changes and push manually",
                    ));
                }
                let retry = interaction.request_confirmation(
                    "The remote has new commits. Pull the latest changes and retry the push?",
                );
                if !retry {
                    return Ok(PushOutcome::failed(
                        "Push rejected: pull the remote changes manually and push again",
                    ));
                }
                retries_left -= 1;
                log::debug!("retrying push of {repo_name} after non-fast-forward rejection");
                // Loop re-fetches the handle before the retry.
            }
            Err(err) => return Err(err),
        }
    }
}
