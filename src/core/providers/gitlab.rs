//! GitLab REST v4 binding of the provider interface.
//!
//! Commit construction follows the file-action style: each file's existence
//! is probed at the target branch to decide between an `update` and a
//! `create` action, and all actions are submitted as one atomic multi-file
//! commit. Either the whole commit lands or nothing does, so cancellation
//! cannot leave a partially-applied commit.

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

const DEFAULT_API_BASE: &str = "https://gitlab.com/api/v4";

#[derive(Deserialize)]
struct ApiError {
    message: serde_json::Value,
}

#[derive(Deserialize)]
struct UserResponse {
    username: String,
}

#[derive(Deserialize)]
struct Namespace {
    path: String,
}

#[derive(Deserialize)]
struct ProjectResponse {
    id: u64,
    path: String,
    namespace: Namespace,
    #[serde(default)]
    default_branch: Option<String>,
    web_url: String,
}

#[derive(Deserialize)]
struct MergeRequestResponse {
    web_url: String,
}

/// Percent-encode one path for use inside a GitLab URL segment.
fn encode_path(path: &str) -> String {
    path.replace('/', "%2F").replace('.', "%2E")
}

pub struct GitlabProvider {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    repo: Option<RepoHandle>,
}

impl Default for GitlabProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GitlabProvider {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Point the provider at a different API root, e.g. a test server or a
    /// self-hosted installation.
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
            .request(method, format!("{}{path}", self.api_base));
        if let Some(token) = &self.token {
            builder = builder.header("PRIVATE-TOKEN", token.clone());
        }
        builder
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ApiError>()
            .await
            .map(|e| match e.message {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_else(|_| status.to_string());
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::authentication_failed(self.descriptor().domain));
        }
        if message.contains(self.non_fast_forward_marker()) {
            return Err(SyncError::NonFastForward { message });
        }
        Err(SyncError::api("GitLab", status.as_u16(), message))
    }

    fn require_handle(&self) -> Result<&RepoHandle> {
        self.repo.as_ref().ok_or(SyncError::MissingRepoHandle)
    }

    /// API path segment addressing the cached project: the numeric id when
    /// known, else the URL-encoded `owner/name` pair.
    fn project_ref(&self) -> Result<String> {
        let handle = self.require_handle()?;
        Ok(match handle.project_id {
            Some(id) => id.to_string(),
            None => encode_path(&format!("{}/{}", handle.owner, handle.name)),
        })
    }

    fn handle_from(project: ProjectResponse) -> RepoHandle {
        RepoHandle {
            owner: project.namespace.path,
            name: project.path,
            default_branch: project.default_branch.unwrap_or_else(|| "main".to_string()),
            web_url: project.web_url,
            project_id: Some(project.id),
        }
    }
}

#[async_trait]
impl GitProvider for GitlabProvider {
    fn descriptor(&self) -> &'static RemoteProviderDescriptor {
        &PROVIDERS[1]
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
        "has changed since you started editing"
    }

    async fn validate_credentials(&self, username: &str, secret: &str) -> Result<bool> {
        // Built directly so the probe uses the candidate token, not any
        // token already installed on the provider.
        let response = self
            .client
            .get(format!("{}/user", self.api_base))
            .header("PRIVATE-TOKEN", secret)
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::FORBIDDEN
        {
            return Ok(false);
        }
        let user: UserResponse = self.check(response).await?.json().await?;
        Ok(user.username.eq_ignore_ascii_case(username))
    }

    async fn get_repo(&mut self, name: &str, owner: &str) -> Result<Option<RepoHandle>> {
        let response = self
            .request(
                Method::GET,
                &format!("/projects/{}", encode_path(&format!("{owner}/{name}"))),
            )
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            self.repo = None;
            return Ok(None);
        }
        let project: ProjectResponse = self.check(response).await?.json().await?;
        let handle = Self::handle_from(project);
        self.repo = Some(handle.clone());
        Ok(Some(handle))
    }

    async fn create_repo(&mut self, name: &str) -> Result<RepoHandle> {
        let response = self
            .request(Method::POST, "/projects")
            .json(&json!({ "name": name }))
            .send()
            .await?;
        let project: ProjectResponse = self.check(response).await?.json().await?;
        let handle = Self::handle_from(project);
        self.repo = Some(handle.clone());
        log::debug!("created GitLab project {}", handle.web_url);
        Ok(handle)
    }

    async fn check_file_existence(&self, branch: &str, path: &str) -> Result<bool> {
        let project = self.project_ref()?;
        let path = path.trim_start_matches('/');
        let response = self
            .request(
                Method::GET,
                &format!(
                    "/projects/{project}/repository/files/{}?ref={branch}",
                    encode_path(path)
                ),
            )
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn create_commit(&self, files: &[CommitFile], message: &str) -> Result<()> {
        let handle = self.require_handle()?;
        let branch = handle.default_branch.clone();
        let project = self.project_ref()?;

        let mut actions = Vec::with_capacity(files.len());
        for file in files {
            let path = file.path.trim_start_matches('/');
            let action = if self.check_file_existence(&branch, path).await? {
                "update"
            } else {
                "create"
            };
            actions.push(match String::from_utf8(file.data.clone()) {
                Ok(text) => json!({
                    "action": action,
                    "file_path": path,
                    "content": text,
                }),
                Err(_) => json!({
                    "action": action,
                    "file_path": path,
                    "content": BASE64.encode(&file.data),
                    "encoding": "base64",
                }),
            });
        }

        // One atomic multi-file commit; GitLab applies all actions or none.
        let response = self
            .request(Method::POST, &format!("/projects/{project}/repository/commits"))
            .json(&json!({
                "branch": branch,
                "commit_message": message,
                "actions": actions,
            }))
            .send()
            .await?;
        self.check(response).await?;
        log::debug!("committed {} files to {branch}", files.len());
        Ok(())
    }

    async fn create_branch(&self, name: &str, from_ref: &str) -> Result<()> {
        let project = self.project_ref()?;
        let response = self
            .request(
                Method::POST,
                &format!("/projects/{project}/repository/branches"),
            )
            .json(&json!({ "branch": name, "ref": from_ref }))
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
        let project = self.project_ref()?;
        let response = self
            .request(Method::POST, &format!("/projects/{project}/merge_requests"))
            .json(&json!({
                "source_branch": source_branch,
                "target_branch": target_branch,
                "title": title,
            }))
            .send()
            .await?;
        let merge_request: MergeRequestResponse = self.check(response).await?.json().await?;
        Ok(merge_request.web_url)
    }
}
