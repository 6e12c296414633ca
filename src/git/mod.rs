//! Repository gateway: branch, tag, diff and merge primitives.
//!
//! The workflow engine only ever talks to [`RepositoryGateway`]; the
//! subprocess-backed implementation lives in [`cli_gateway`]. Merge
//! conflicts are classified here, at the gateway boundary, into the tagged
//! [`crate::error::GitError::MergeConflict`] variant.

mod cli_gateway;

pub use cli_gateway::GitCli;

use crate::error::Result;
use async_trait::async_trait;

/// Branch, tag, diff and merge primitives against a git remote.
///
/// Implementations must be substitutable by mocks in tests, hence the
/// object-safe async trait.
#[async_trait]
pub trait RepositoryGateway: Send + Sync {
    /// Pull the given branch from the configured remote
    async fn pull(&self, branch: &str) -> Result<()>;

    /// Fetch refs and tags from the configured remote
    async fn fetch(&self) -> Result<()>;

    /// Check out an existing branch
    async fn checkout(&self, branch: &str) -> Result<()>;

    /// Create a local branch at the current head and check it out
    async fn local_branch(&self, name: &str) -> Result<()>;

    /// Delete a branch locally and on the remote
    async fn delete_branch(&self, name: &str) -> Result<()>;

    /// Whether a branch exists locally or on the remote
    async fn has_branch(&self, name: &str) -> Result<bool>;

    /// Whether a tag exists locally or on the remote
    async fn has_tag(&self, name: &str) -> Result<bool>;

    /// Whether two branches differ
    async fn has_diff(&self, a: &str, b: &str) -> Result<bool>;

    /// Whether the working tree has uncommitted changes
    async fn has_local_changes(&self) -> Result<bool>;

    /// Whether a GPG signing key is configured for tagging
    async fn has_sign_key(&self) -> Result<bool>;

    /// Create an annotated (or signed, when a key is configured) tag on a branch
    async fn tag(&self, branch: &str, tag_name: &str, message: &str) -> Result<()>;

    /// Merge the release branch back into the base branch and push.
    ///
    /// Returns [`crate::error::GitError::MergeConflict`] when the merge
    /// stops on conflicts; any other failure is a plain command error.
    async fn merge_back(&self, base: &str, release: &str) -> Result<()>;

    /// Push the current branch to the remote
    async fn push(&self) -> Result<()>;

    /// Stage everything, commit on the given branch and push.
    ///
    /// Returns the paths that were part of the commit; empty when there was
    /// nothing to commit.
    async fn commit_and_push(&self, branch: &str, message: &str) -> Result<Vec<String>>;

    /// Most recent reachable release tag, if any
    async fn get_last_tag(&self) -> Result<Option<String>>;

    /// Names of all local branches
    async fn get_local_branches(&self) -> Result<Vec<String>>;

    /// Repository name in `owner/name` form, derived from the remote URL
    async fn get_repository_name(&self) -> Result<String>;

    /// Subjects and bodies of commits made since the given tag
    async fn commits_since(&self, tag: &str) -> Result<Vec<String>>;
}
