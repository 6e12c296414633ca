//! relpilot - stateful release orchestration for git-hosted packages
//!
//! Automates the ceremony of cutting a release: version detection from tag
//! history, releasing-branch management, manifest bumps, merge-back with
//! manual conflict resolution, tagging, pull request creation, release
//! notes extraction and publication. A release run is a fixed pipeline of
//! named steps executed against one shared context; see [`workflow`] for
//! the engine and [`workflow::ReleaseContext`] for the state it threads
//! through.
//!
//! Two kinds of target are supported: a standalone package whose checkout
//! is the repository root, and a modular extension discovered inside a
//! larger instance tree. Target selection, git access and forge access sit
//! behind traits so embedders and tests can substitute them.

pub mod cli;
pub mod error;
pub mod forge;
pub mod git;
pub mod prompt;
pub mod target;
pub mod version;
pub mod workflow;

pub use error::{Result, WorkflowError};

use semver::Version;

/// Configuration shared by every step of a run, derived from the CLI (or
/// supplied directly by an embedder).
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Long-lived branch the releasing branch merges back into
    pub base_branch: String,
    /// Long-lived branch the release is diffed against and PR'd into
    pub release_branch: String,
    /// Prefix of the short-lived releasing branch (`<prefix>-<version>`)
    pub branch_prefix: String,
    /// Skip version computation and release this exact version
    pub version_to_release: Option<Version>,
    /// Shell command producing release artifacts, if the package has one
    pub build_command: Option<String>,
    /// Free-text annotation appended to the published release notes
    pub release_comment: Option<String>,
    /// Forge credential; falls back to the environment when absent
    pub auth_token: Option<String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_branch: "develop".to_string(),
            release_branch: "master".to_string(),
            branch_prefix: "release".to_string(),
            version_to_release: None,
            build_command: None,
            release_comment: None,
            auth_token: None,
        }
    }
}
