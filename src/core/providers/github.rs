//! GitHub REST v3 binding of the provider interface.
//!
//! Commit construction follows the blob-tree-commit style: every file is
//! written as a blob, a tree is built from the base tree, a commit object is
//! created with the prior branch tip as parent, and finally the branch ref
//! is moved. The ref update is the only durable step; nothing reports
//! success before it completes.

use crate::core::error::{Result, SyncError};
use crate::core::providers::{
    CommitFile, GitProvider, RemoteProviderDescriptor, RepoHandle, PROVIDERS,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("git-bridge/", env!("CARGO_PKG_VERSION"));

/// Error payload shape shared by most GitHub endpoints.
#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Deserialize)]
struct RepoOwner {
    login: String,
}

#[derive(Deserialize)]
struct RepoResponse {
    name: String,
    owner: RepoOwner,
    default_branch: String,
    html_url: String,
}

#[derive(Deserialize)]
struct ObjectRef {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: ObjectRef,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
    tree: ObjectRef,
}

#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Deserialize)]
struct PullResponse {
    html_url: String,
}

pub struct GithubProvider {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    repo: Option<RepoHandle>,
}

impl Default for GithubProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GithubProvider {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Point the provider at a different API root, e.g. a test server or a
    /// GitHub Enterprise installation.
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            token: None,
            repo: None,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.api_base))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder
    }

    /// Map a non-success response onto the error taxonomy: authentication
    /// failures and non-fast-forward rejections get their own variants,
    /// everything else becomes an API error with provider context.
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ApiError>()
            .await
            .map(|e| e.message)
            .unwrap_or_else(|_| status.to_string());
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::authentication_failed(self.descriptor().domain));
        }
        if message.contains(self.non_fast_forward_marker()) {
            return Err(SyncError::NonFastForward { message });
        }
        Err(SyncError::api("GitHub", status.as_u16(), message))
    }

    fn require_handle(&self) -> Result<&RepoHandle> {
        self.repo.as_ref().ok_or(SyncError::MissingRepoHandle)
    }

    fn handle_from(repo: RepoResponse) -> RepoHandle {
        RepoHandle {
            owner: repo.owner.login,
            name: repo.name,
            default_branch: repo.default_branch,
            web_url: repo.html_url,
            project_id: None,
        }
    }

    async fn resolve_ref(&self, owner: &str, name: &str, reference: &str) -> Result<String> {
        let is_sha = reference.len() == 40 && reference.bytes().all(|b| b.is_ascii_hexdigit());
        if is_sha {
            return Ok(reference.to_string());
        }
        let response = self
            .request(
                Method::GET,
                &format!("/repos/{owner}/{name}/git/ref/heads/{reference}"),
            )
            .send()
            .await?;
        let reference: RefResponse = self.check(response).await?.json().await?;
        Ok(reference.object.sha)
    }
}

#[async_trait]
impl GitProvider for GithubProvider {
    fn descriptor(&self) -> &'static RemoteProviderDescriptor {
        &PROVIDERS[0]
    }

    fn set_token(&mut self, secret: &str) {
        self.token = Some(secret.to_string());
    }

    fn reset_handle(&mut self) {
        self.repo = None;
    }

    fn handle(&self) -> Option<&RepoHandle> {
        self.repo.as_ref()
    }

    fn non_fast_forward_marker(&self) -> &'static str {
        "fast forward"
    }

    async fn validate_credentials(&self, username: &str, secret: &str) -> Result<bool> {
        // Built directly so the probe uses the candidate token, not any
        // token already installed on the provider.
        let response = self
            .client
            .get(format!("{}/user", self.api_base))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {secret}"))
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::FORBIDDEN
        {
            return Ok(false);
        }
        let user: UserResponse = self.check(response).await?.json().await?;
        Ok(user.login.eq_ignore_ascii_case(username))
    }

    async fn get_repo(&mut self, name: &str, owner: &str) -> Result<Option<RepoHandle>> {
        let response = self
            .request(Method::GET, &format!("/repos/{owner}/{name}"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            self.repo = None;
            return Ok(None);
        }
        let repo: RepoResponse = self.check(response).await?.json().await?;
        let handle = Self::handle_from(repo);
        self.repo = Some(handle.clone());
        Ok(Some(handle))
    }

    async fn create_repo(&mut self, name: &str) -> Result<RepoHandle> {
        let response = self
            .request(Method::POST, "/user/repos")
            .json(&json!({ "name": name, "private": false }))
            .send()
            .await?;
        let repo: RepoResponse = self.check(response).await?.json().await?;
        let handle = Self::handle_from(repo);
        self.repo = Some(handle.clone());
        log::debug!("created GitHub repository {}", handle.web_url);
        Ok(handle)
    }

    async fn check_file_existence(&self, branch: &str, path: &str) -> Result<bool> {
        let handle = self.require_handle()?;
        let path = path.trim_start_matches('/');
        let response = self
            .request(
                Method::GET,
                &format!(
                    "/repos/{}/{}/contents/{path}?ref={branch}",
                    handle.owner, handle.name
                ),
            )
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn create_commit(&self, files: &[CommitFile], message: &str) -> Result<()> {
        let handle = self.require_handle()?;
        let (owner, name) = (handle.owner.as_str(), handle.name.as_str());
        let branch = handle.default_branch.as_str();

        let base_sha = self.resolve_ref(owner, name, branch).await?;
        let response = self
            .request(
                Method::GET,
                &format!("/repos/{owner}/{name}/git/commits/{base_sha}"),
            )
            .send()
            .await?;
        let base_commit: CommitResponse = self.check(response).await?.json().await?;

        let mut tree_entries = Vec::with_capacity(files.len());
        for file in files {
            let response = self
                .request(Method::POST, &format!("/repos/{owner}/{name}/git/blobs"))
                .json(&json!({
                    "content": BASE64.encode(&file.data),
                    "encoding": "base64",
                }))
                .send()
                .await?;
            let blob: ShaResponse = self.check(response).await?.json().await?;
            tree_entries.push(json!({
                "path": file.path.trim_start_matches('/'),
                "mode": "100644",
                "type": "blob",
                "sha": blob.sha,
            }));
        }

        let response = self
            .request(Method::POST, &format!("/repos/{owner}/{name}/git/trees"))
            .json(&json!({
                "base_tree": base_commit.tree.sha,
                "tree": tree_entries,
            }))
            .send()
            .await?;
        let tree: ShaResponse = self.check(response).await?.json().await?;

        let response = self
            .request(Method::POST, &format!("/repos/{owner}/{name}/git/commits"))
            .json(&json!({
                "message": message,
                "tree": tree.sha,
                "parents": [base_commit.sha],
            }))
            .send()
            .await?;
        let commit: ShaResponse = self.check(response).await?.json().await?;

        // The branch ref move is the only durable step; everything above is
        // unreferenced object creation until this succeeds.
        let response = self
            .request(
                Method::PATCH,
                &format!("/repos/{owner}/{name}/git/refs/heads/{branch}"),
            )
            .json(&json!({ "sha": commit.sha, "force": false }))
            .send()
            .await?;
        self.check(response).await?;
        log::debug!("moved {owner}/{name}@{branch} to {}", commit.sha);
        Ok(())
    }

    async fn create_branch(&self, name: &str, from_ref: &str) -> Result<()> {
        let handle = self.require_handle()?;
        let sha = self
            .resolve_ref(&handle.owner, &handle.name, from_ref)
            .await?;
        let response = self
            .request(
                Method::POST,
                &format!("/repos/{}/{}/git/refs", handle.owner, handle.name),
            )
            .json(&json!({ "ref": format!("refs/heads/{name}"), "sha": sha }))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn create_merge_request(
        &self,
        source_branch: &str,
        target_branch: &str,
        title: &str,
    ) -> Result<String> {
        let handle = self.require_handle()?;
        let response = self
            .request(
                Method::POST,
                &format!("/repos/{}/{}/pulls", handle.owner, handle.name),
            )
            .json(&json!({
                "title": title,
                "head": source_branch,
                "base": target_branch,
            }))
            .send()
            .await?;
        let pull: PullResponse = self.check(response).await?.json().await?;
        Ok(pull.html_url)
    }
}
