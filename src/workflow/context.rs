//! Shared release context threaded through every step.

use crate::forge::PullRequestInfo;
use crate::target::{ReleaseTarget, TargetMetadata};
use semver::Version;
use std::path::PathBuf;

/// Mutable state shared by the steps of one release run.
///
/// Created empty at workflow start, progressively filled by successive
/// steps, and discarded when the process exits. Fields are
/// write-once-then-read except `pull_request`, which is created by the PR
/// step and later enriched with notes. The version fields are behind
/// accessors so they can only be set once.
pub struct ReleaseContext {
    /// The releasable unit in scope; set by the target-resolution step
    pub target: Option<ReleaseTarget>,
    /// Metadata loaded from the target manifest
    pub metadata: Option<TargetMetadata>,
    /// Filesystem root used to resolve the target
    pub search_root: PathBuf,
    /// Long-lived branch the releasing branch merges back into
    pub base_branch: String,
    /// Long-lived branch the release is diffed against and PR'd into
    pub release_branch: String,
    /// Last released version, read from history before computing the next
    pub last_version: Option<Version>,
    /// Tag of the last release
    pub last_tag: Option<String>,
    /// Pull request created for this release; absent until created
    pub pull_request: Option<PullRequestInfo>,
    /// Free-text operator annotation attached to the published release
    pub comment: Option<String>,
    version: Option<Version>,
    tag: Option<String>,
    releasing_branch: Option<String>,
    auth_token: Option<String>,
}

impl ReleaseContext {
    /// Create an empty context for one run
    pub fn new(
        search_root: PathBuf,
        base_branch: String,
        release_branch: String,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            target: None,
            metadata: None,
            search_root,
            base_branch,
            release_branch,
            last_version: None,
            last_tag: None,
            pull_request: None,
            comment: None,
            version: None,
            tag: None,
            releasing_branch: None,
            auth_token,
        }
    }

    /// Record the computed release version.
    ///
    /// Derives `tag` and `releasing_branch` so they stay consistent with
    /// the version for the life of the context. Panics if called twice:
    /// the version is immutable once set, and a second call is a step
    /// sequencing bug, not a runtime condition.
    pub fn set_release_version(
        &mut self,
        version: Version,
        last_version: Version,
        branch_prefix: &str,
    ) {
        assert!(
            self.version.is_none(),
            "release version must be set exactly once"
        );
        self.tag = Some(format!("v{version}"));
        self.releasing_branch = Some(format!("{branch_prefix}-{version}"));
        self.last_version = Some(last_version);
        self.version = Some(version);
    }

    /// Next version, once computed
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Tag for the next version (`"v" + version`), once computed
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Short-lived branch staging this release, once derived
    pub fn releasing_branch(&self) -> Option<&str> {
        self.releasing_branch.as_deref()
    }

    /// Opaque forge credential; intentionally excluded from Debug output
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

// Manual impl so the auth token never reaches logs.
impl std::fmt::Debug for ReleaseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseContext")
            .field("target", &self.target)
            .field("search_root", &self.search_root)
            .field("base_branch", &self.base_branch)
            .field("release_branch", &self.release_branch)
            .field("releasing_branch", &self.releasing_branch)
            .field("last_version", &self.last_version)
            .field("last_tag", &self.last_tag)
            .field("version", &self.version)
            .field("tag", &self.tag)
            .field("pull_request", &self.pull_request)
            .field("comment", &self.comment)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ReleaseContext {
        ReleaseContext::new(
            PathBuf::from("/tmp/repo"),
            "develop".to_string(),
            "master".to_string(),
            Some("token-value".to_string()),
        )
    }

    #[test]
    fn version_derives_tag_and_releasing_branch() {
        let mut ctx = context();
        ctx.set_release_version(Version::new(1, 3, 0), Version::new(1, 2, 3), "release");
        assert_eq!(ctx.version().unwrap().to_string(), "1.3.0");
        assert_eq!(ctx.tag(), Some("v1.3.0"));
        assert_eq!(ctx.releasing_branch(), Some("release-1.3.0"));
        assert_eq!(ctx.last_version.as_ref().unwrap().to_string(), "1.2.3");
    }

    #[test]
    #[should_panic(expected = "exactly once")]
    fn version_cannot_be_set_twice() {
        let mut ctx = context();
        ctx.set_release_version(Version::new(1, 3, 0), Version::new(1, 2, 3), "release");
        ctx.set_release_version(Version::new(1, 4, 0), Version::new(1, 3, 0), "release");
    }

    #[test]
    fn debug_output_redacts_auth_token() {
        let rendered = format!("{:?}", context());
        assert!(!rendered.contains("token-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
