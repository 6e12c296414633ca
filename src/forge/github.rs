//! GitHub REST implementation of the forge gateway.

use super::{ForgeGateway, PullRequestInfo};
use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use serde_json::json;

const API_ROOT: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("relpilot/", env!("CARGO_PKG_VERSION"));

/// Configuration for the GitHub gateway
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// Repository in `owner/name` form
    pub repository: String,
    /// API token; resolved from config or environment, never logged
    pub token: String,
}

/// [`ForgeGateway`] over the GitHub REST API
pub struct GitHubForge {
    client: reqwest::Client,
    config: GitHubConfig,
}

#[derive(Deserialize)]
struct PullRequestResponse {
    state: String,
    html_url: String,
    url: String,
    number: u64,
    id: u64,
}

#[derive(Deserialize)]
struct PullRequestBody {
    body: Option<String>,
}

impl GitHubForge {
    /// Create a gateway for one repository.
    ///
    /// `token` falls back to the `GITHUB_TOKEN` then `GH_TOKEN` environment
    /// variables, matching common CI conventions.
    pub fn new(repository: String, token: Option<String>) -> Result<Self> {
        let token = token
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .or_else(|| std::env::var("GH_TOKEN").ok())
            .filter(|t| !t.is_empty())
            .ok_or(ForgeError::MissingToken)?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ForgeError::Transport {
                operation: "client init".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            config: GitHubConfig { repository, token },
        })
    }

    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ForgeError::Transport {
                operation: operation.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ForgeError::Rejected {
                operation: operation.to_string(),
                status: status.as_u16(),
                message,
            }
            .into());
        }
        Ok(response)
    }
}

#[async_trait]
impl ForgeGateway for GitHubForge {
    async fn create_release_pr(
        &self,
        head_branch: &str,
        base_branch: &str,
        version: &Version,
        last_version: &Version,
    ) -> Result<PullRequestInfo> {
        let operation = "create pull request";
        let endpoint = format!("{API_ROOT}/repos/{}/pulls", self.config.repository);
        let payload = json!({
            "title": format!("Release {version}"),
            "head": head_branch,
            "base": base_branch,
            "body": format!(
                "Automated release pull request: {last_version} -> {version}."
            ),
        });

        let response = self
            .send(operation, self.client.post(&endpoint).json(&payload))
            .await?;
        let pr: PullRequestResponse =
            response.json().await.map_err(|e| ForgeError::BadResponse {
                operation: operation.to_string(),
                reason: e.to_string(),
            })?;

        Ok(PullRequestInfo {
            state: pr.state,
            html_url: pr.html_url,
            url: pr.url,
            number: pr.number,
            id: pr.id,
            notes: String::new(),
        })
    }

    async fn release(&self, tag: &str, body: &str) -> Result<()> {
        let operation = "create release";
        let endpoint = format!("{API_ROOT}/repos/{}/releases", self.config.repository);
        let payload = json!({
            "tag_name": tag,
            "name": tag,
            "body": body,
            "draft": false,
            "prerelease": false,
        });

        self.send(operation, self.client.post(&endpoint).json(&payload))
            .await?;
        Ok(())
    }

    async fn extract_release_notes(&self, pr_number: u64) -> Result<String> {
        let operation = "fetch pull request body";
        let endpoint = format!(
            "{API_ROOT}/repos/{}/pulls/{pr_number}",
            self.config.repository
        );

        let response = self.send(operation, self.client.get(&endpoint)).await?;
        let pr: PullRequestBody =
            response.json().await.map_err(|e| ForgeError::BadResponse {
                operation: operation.to_string(),
                reason: e.to_string(),
            })?;

        Ok(pr.body.unwrap_or_default())
    }
}
