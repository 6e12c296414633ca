//! Forge gateway: pull-request and release-object primitives.

mod github;

pub use github::GitHubForge;

use crate::error::Result;
use async_trait::async_trait;
use semver::Version;

/// Pull request created for a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    /// PR state as reported by the forge ("open", "closed", ...)
    pub state: String,
    /// Browser URL
    pub html_url: String,
    /// API URL
    pub url: String,
    /// PR number within the repository
    pub number: u64,
    /// Forge-global identifier
    pub id: u64,
    /// Release notes extracted later; empty until then
    pub notes: String,
}

/// Pull-request and release-object primitives against the code host
#[async_trait]
pub trait ForgeGateway: Send + Sync {
    /// Open the release pull request from `head_branch` into `base_branch`
    async fn create_release_pr(
        &self,
        head_branch: &str,
        base_branch: &str,
        version: &Version,
        last_version: &Version,
    ) -> Result<PullRequestInfo>;

    /// Create the published release object for an existing tag
    async fn release(&self, tag: &str, body: &str) -> Result<()>;

    /// Extract release notes from the release pull request body
    async fn extract_release_notes(&self, pr_number: u64) -> Result<String>;
}
