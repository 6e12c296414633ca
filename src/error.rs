//! Error types for relpilot release workflows.
//!
//! Classification of a failure as fatal or soft is a property of the step
//! that raised it, not of the error type. The one exception is
//! [`GitError::MergeConflict`], which the workflow engine always routes to
//! the conflict resolution flow regardless of the step.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for relpilot operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Main error type for all relpilot operations
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Next-version resolution errors
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Target selection and metadata errors
    #[error("Target error: {0}")]
    Target(#[from] TargetError),

    /// Git gateway errors
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Forge (GitHub) gateway errors
    #[error("Forge error: {0}")]
    Forge(#[from] ForgeError),

    /// Prompt provider errors
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    /// Operator declined a confirmation checkpoint
    #[error("Aborted by operator: {reason}")]
    Declined {
        /// Which checkpoint was declined
        reason: String,
    },

    /// A required step precondition does not hold
    #[error("{0}")]
    Precondition(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Next-version resolution errors
#[derive(Error, Debug)]
pub enum VersionError {
    /// No tag exists to derive a next version from
    #[error("No previous release tag found. There is no safe default first version.")]
    NoPriorTag,

    /// Tag cannot be parsed as, or coerced to, a semantic version
    #[error("Cannot derive a semantic version from tag '{tag}'")]
    Unparseable {
        /// The offending tag
        tag: String,
    },
}

/// Target selection and metadata errors
#[derive(Error, Debug)]
pub enum TargetError {
    /// Manifest missing or not a releasable unit
    #[error("Invalid release target at {path}: {reason}")]
    InvalidTarget {
        /// Path that was inspected
        path: PathBuf,
        /// Reason the target was rejected
        reason: String,
    },

    /// Explicit target identifier matched no candidate
    #[error("Target '{name}' not found under {}", search_root.display())]
    TargetNotFound {
        /// Identifier supplied by the operator
        name: String,
        /// Root that was searched
        search_root: PathBuf,
    },

    /// Manifest could not be read or parsed
    #[error("Failed to read manifest at {path}: {reason}")]
    ManifestUnreadable {
        /// Manifest path
        path: PathBuf,
        /// Reason for the failure
        reason: String,
    },

    /// Manifest version update failed
    #[error("Failed to update version in {path}: {reason}")]
    UpdateFailed {
        /// Manifest path
        path: PathBuf,
        /// Reason for the failure
        reason: String,
    },
}

/// Git gateway errors
#[derive(Error, Debug)]
pub enum GitError {
    /// Path is not inside a git repository
    #[error("Not a git repository: {}", path.display())]
    NotRepository {
        /// Path that was inspected
        path: PathBuf,
    },

    /// The git binary is not installed or not on PATH
    #[error("git executable not found: {reason}")]
    BinaryNotFound {
        /// Lookup failure detail
        reason: String,
    },

    /// Merge produced conflicts that need manual resolution.
    ///
    /// Decided at the gateway boundary; downstream code matches on this
    /// variant instead of sniffing message text.
    #[error("Merge of '{source_branch}' into '{target}' produced conflicts:\n{details}")]
    MergeConflict {
        /// Branch being merged
        source_branch: String,
        /// Branch merged into
        target: String,
        /// Conflicting paths, one per line
        details: String,
    },

    /// A git command exited unsuccessfully
    #[error("git {command} failed: {stderr}")]
    CommandFailed {
        /// Subcommand and arguments that failed
        command: String,
        /// Captured stderr
        stderr: String,
    },

    /// Repository name could not be determined from the remote
    #[error("Cannot resolve repository name from remote '{remote}': {reason}")]
    NoRepositoryName {
        /// Remote that was inspected
        remote: String,
        /// Reason for the failure
        reason: String,
    },
}

impl GitError {
    /// Whether this error is a merge conflict summary
    pub fn is_conflict(&self) -> bool {
        matches!(self, GitError::MergeConflict { .. })
    }
}

/// Forge (GitHub) gateway errors
#[derive(Error, Debug)]
pub enum ForgeError {
    /// No usable authentication token
    #[error("GitHub token not provided. Set GITHUB_TOKEN or GH_TOKEN, or pass --token.")]
    MissingToken,

    /// The forge rejected a request
    #[error("GitHub rejected {operation}: {status} {message}")]
    Rejected {
        /// Operation that was attempted
        operation: String,
        /// HTTP status code
        status: u16,
        /// Response message body
        message: String,
    },

    /// Transport-level failure
    #[error("GitHub request failed during {operation}: {reason}")]
    Transport {
        /// Operation that was attempted
        operation: String,
        /// Underlying failure
        reason: String,
    },

    /// Response could not be decoded
    #[error("Unexpected GitHub response for {operation}: {reason}")]
    BadResponse {
        /// Operation that was attempted
        operation: String,
        /// Decoding failure detail
        reason: String,
    },
}

/// Prompt provider errors
#[derive(Error, Debug)]
pub enum PromptError {
    /// Terminal interaction failed
    #[error("Prompt '{name}' failed: {reason}")]
    Interaction {
        /// Prompt name
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// Interactive input needed but the engine is non-interactive
    #[error("Prompt '{name}' requires interactive mode and no override was supplied")]
    NonInteractive {
        /// Prompt name
        name: String,
    },
}

impl WorkflowError {
    /// Whether this error carries a merge conflict summary.
    ///
    /// The engine uses this to route the error to the conflict resolution
    /// flow no matter which step raised it.
    pub fn is_merge_conflict(&self) -> bool {
        matches!(self, WorkflowError::Git(git) if git.is_conflict())
    }
}
