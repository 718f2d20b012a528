//! GitHub Release management over the REST API

use super::{PublishedRelease, ReleasePublisher, ReleaseSpec, UploadedAsset};
use crate::config::EnvConfig;
use crate::error::{PublishError, ReleaseError, Result};
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// Configuration for GitHub releases
#[derive(Debug, Clone)]
pub struct GitHubReleaseConfig {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// API base URL
    pub api_url: String,
    /// Commit the tag is created on, when the tag does not exist yet
    pub target_commitish: Option<String>,
    /// Access token
    pub token: String,
}

impl GitHubReleaseConfig {
    /// Build from a repository and the environment
    ///
    /// Token from `GH_TOKEN` or `GITHUB_TOKEN`, API base from
    /// `GITHUB_API_URL`, target commit from `GITHUB_SHA`.
    pub fn from_env(owner: String, repo: String, env: &EnvConfig) -> Result<Self> {
        let token = env
            .get("GH_TOKEN")
            .or_else(|| env.get("GITHUB_TOKEN"))
            .ok_or(PublishError::MissingToken)?;

        Ok(Self {
            owner,
            repo,
            api_url: env
                .get("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            target_commitish: env.get("GITHUB_SHA"),
            token,
        })
    }
}

#[derive(Serialize)]
struct CreateReleaseRequest<'a> {
    tag_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_commitish: Option<&'a str>,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
    generate_release_notes: bool,
}

#[derive(Deserialize)]
struct ReleaseResponse {
    id: u64,
    tag_name: String,
    html_url: String,
    upload_url: String,
}

impl From<ReleaseResponse> for PublishedRelease {
    fn from(r: ReleaseResponse) -> Self {
        Self {
            id: r.id,
            tag: r.tag_name,
            html_url: r.html_url,
            upload_url: r.upload_url,
        }
    }
}

#[derive(Deserialize)]
struct AssetResponse {
    name: String,
    size: u64,
    browser_download_url: String,
}

/// GitHub release manager
#[derive(Debug, Clone)]
pub struct GitHubReleaseManager {
    client: Client,
    config: GitHubReleaseConfig,
}

impl GitHubReleaseManager {
    /// Create new GitHub release manager
    pub fn new(config: GitHubReleaseConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    /// Repository as `owner/repo`
    pub fn repository(&self) -> String {
        format!("{}/{}", self.config.owner, self.config.repo)
    }

    fn api(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.api_url)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(["repos", self.config.owner.as_str(), self.config.repo.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.config.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<reqwest::Response> {
        self.authorized(request)
            .send()
            .await
            .map_err(|e| network_error(operation, e))
    }
}

fn network_error(operation: &str, e: reqwest::Error) -> ReleaseError {
    PublishError::Network {
        operation: operation.to_string(),
        reason: e.to_string(),
    }
    .into()
}

async fn api_error(operation: &str, response: reqwest::Response) -> ReleaseError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    PublishError::Api {
        operation: operation.to_string(),
        status,
        message,
    }
    .into()
}

/// Upload endpoint for a release, with the asset name as query
///
/// GitHub returns `upload_url` as a URI template ending in `{?name,label}`.
fn asset_upload_url(upload_url: &str, name: &str) -> Result<Url> {
    let base = upload_url.split('{').next().unwrap_or(upload_url);
    let mut url = Url::parse(base)?;
    url.query_pairs_mut().append_pair("name", name);
    Ok(url)
}

impl ReleasePublisher for GitHubReleaseManager {
    async fn find_release(&self, tag: &str) -> Result<Option<PublishedRelease>> {
        let url = self.api(&["releases", "tags", tag])?;
        let response = self.send("get_release_by_tag", self.client.get(url)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let release: ReleaseResponse = response
                    .json()
                    .await
                    .map_err(|e| network_error("get_release_by_tag", e))?;
                Ok(Some(release.into()))
            }
            _ => Err(api_error("get_release_by_tag", response).await),
        }
    }

    async fn create_release(&self, spec: &ReleaseSpec) -> Result<PublishedRelease> {
        let url = self.api(&["releases"])?;
        let body = CreateReleaseRequest {
            tag_name: &spec.tag,
            target_commitish: self.config.target_commitish.as_deref(),
            name: &spec.title,
            body: &spec.body,
            draft: false,
            prerelease: false,
            generate_release_notes: spec.generate_notes,
        };

        let response = self
            .send("create_release", self.client.post(url).json(&body))
            .await?;
        if !response.status().is_success() {
            return Err(api_error("create_release", response).await);
        }

        let release: ReleaseResponse = response
            .json()
            .await
            .map_err(|e| network_error("create_release", e))?;
        log::info!("Created release {} at {}", release.tag_name, release.html_url);
        Ok(release.into())
    }

    async fn upload_asset(&self, release: &PublishedRelease, path: &Path) -> Result<UploadedAsset> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PublishError::InvalidPattern {
                pattern: path.display().to_string(),
                reason: "attachment has no UTF-8 file name".to_string(),
            })?
            .to_string();

        let content = Bytes::from(tokio::fs::read(path).await?);
        let url = asset_upload_url(&release.upload_url, &name)?;
        let request = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_LENGTH, content.len())
            .body(content);

        let response = self.send("upload_release_asset", request).await?;
        if !response.status().is_success() {
            return Err(api_error("upload_release_asset", response).await);
        }

        let asset: AssetResponse = response
            .json()
            .await
            .map_err(|e| network_error("upload_release_asset", e))?;
        Ok(UploadedAsset {
            name: asset.name,
            size: asset.size,
            download_url: asset.browser_download_url,
        })
    }
}

/// Parse GitHub owner/repo from an `owner/repo` string
pub fn parse_github_repo(repo: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = repo.split('/').collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(PublishError::MissingRepository {
            reason: format!("Invalid GitHub repository format: '{}'. Expected: owner/repo", repo),
        }
        .into());
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Parse GitHub owner/repo from git remote URL
///
/// Supports Git URL formats:
/// - SSH SCP-like: git@github.com:owner/repo.git
/// - HTTPS: https://github.com/owner/repo.git
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    if url.contains('@') && url.contains(':') && !url.contains("://") {
        let parts: Vec<&str> = url.split(':').collect();
        if parts.len() == 2 {
            let path = parts[1].trim_end_matches(".git");
            if let Ok(pair) = parse_github_repo(path) {
                return Ok(pair);
            }
        }
    }

    if let Some(path_start) = url.find("github.com/") {
        let path = url[path_start + "github.com/".len()..].trim_end_matches(".git");
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() >= 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            return Ok((parts[0].to_string(), parts[1].to_string()));
        }
    }

    Err(PublishError::MissingRepository {
        reason: format!("Could not parse GitHub owner/repo from URL: '{}'", url),
    }
    .into())
}

/// Detect origin URL from git config
pub async fn detect_origin_url(repo_path: &Path) -> Result<String> {
    let output = tokio::process::Command::new("git")
        .args(["remote", "get-url", "origin"])
        .current_dir(repo_path)
        .output()
        .await
        .map_err(|e| PublishError::MissingRepository {
            reason: format!("git remote get-url origin: {}", e),
        })?;

    if !output.status.success() {
        return Err(PublishError::MissingRepository {
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Resolve owner/repo from an explicit value or the origin remote
pub async fn resolve_repository(explicit: Option<&str>, project_dir: &Path) -> Result<(String, String)> {
    match explicit {
        Some(repo) => parse_github_repo(repo),
        None => {
            let origin = detect_origin_url(project_dir).await?;
            parse_github_url(&origin)
        }
    }
}
