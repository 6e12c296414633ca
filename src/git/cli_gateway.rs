//! Subprocess-backed [`RepositoryGateway`] implementation.
//!
//! Every operation shells out to the `git` binary with explicit arguments
//! and classifies failures from exit status and stderr. Conflict detection
//! for `merge_back` happens here so callers only see the tagged variant.

use super::RepositoryGateway;
use crate::error::{GitError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

/// Record separator for commit log parsing (ASCII RS)
const LOG_SEPARATOR: char = '\x1e';

/// [`RepositoryGateway`] backed by the `git` command-line tool
pub struct GitCli {
    repo_path: PathBuf,
    remote: String,
}

impl GitCli {
    /// Open the repository at `repo_path`, verifying that the `git` binary
    /// is available and the path is inside a work tree.
    pub async fn open(repo_path: &Path, remote: &str) -> Result<Self> {
        which::which("git").map_err(|e| GitError::BinaryNotFound {
            reason: e.to_string(),
        })?;

        let gateway = Self {
            repo_path: repo_path.to_path_buf(),
            remote: remote.to_string(),
        };

        let probe = gateway.run(&["rev-parse", "--git-dir"]).await?;
        if !probe.status.success() {
            return Err(GitError::NotRepository {
                path: repo_path.to_path_buf(),
            }
            .into());
        }

        Ok(gateway)
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        log::debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .await?;
        Ok(output)
    }

    /// Run a git command and fail on a non-zero exit status
    async fn run_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn changed_paths(&self) -> Result<Vec<String>> {
        let status = self.run_checked(&["status", "--porcelain"]).await?;
        Ok(status
            .lines()
            .filter_map(|line| line.get(3..).map(str::to_string))
            .collect())
    }

    async fn conflicting_paths(&self) -> Result<String> {
        let listing = self
            .run_checked(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        Ok(listing.trim().to_string())
    }
}

#[async_trait]
impl RepositoryGateway for GitCli {
    async fn pull(&self, branch: &str) -> Result<()> {
        self.run_checked(&["pull", &self.remote, branch]).await?;
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        self.run_checked(&["fetch", "--tags", &self.remote]).await?;
        Ok(())
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        self.run_checked(&["checkout", branch]).await?;
        Ok(())
    }

    async fn local_branch(&self, name: &str) -> Result<()> {
        self.run_checked(&["checkout", "-b", name]).await?;
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<()> {
        self.run_checked(&["branch", "-D", name]).await?;
        // The remote copy may never have existed; a failed remote delete for
        // that reason is not an error.
        let output = self
            .run(&["push", &self.remote, "--delete", name])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.contains("remote ref does not exist") {
                return Err(GitError::CommandFailed {
                    command: format!("push {} --delete {}", self.remote, name),
                    stderr: stderr.trim().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    async fn has_branch(&self, name: &str) -> Result<bool> {
        let local = self
            .run(&["show-ref", "--verify", "--quiet", &format!("refs/heads/{name}")])
            .await?;
        if local.status.success() {
            return Ok(true);
        }
        let remote = self
            .run_checked(&["ls-remote", "--heads", &self.remote, name])
            .await?;
        Ok(!remote.trim().is_empty())
    }

    async fn has_tag(&self, name: &str) -> Result<bool> {
        let local = self.run_checked(&["tag", "--list", name]).await?;
        if !local.trim().is_empty() {
            return Ok(true);
        }
        let remote = self
            .run_checked(&["ls-remote", "--tags", &self.remote, name])
            .await?;
        Ok(!remote.trim().is_empty())
    }

    async fn has_diff(&self, a: &str, b: &str) -> Result<bool> {
        let output = self.run(&["diff", "--quiet", a, b]).await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(GitError::CommandFailed {
                command: format!("diff --quiet {a} {b}"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into()),
        }
    }

    async fn has_local_changes(&self) -> Result<bool> {
        let status = self.run_checked(&["status", "--porcelain"]).await?;
        Ok(!status.trim().is_empty())
    }

    async fn has_sign_key(&self) -> Result<bool> {
        let output = self.run(&["config", "user.signingkey"]).await?;
        Ok(output.status.success()
            && !String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    async fn tag(&self, branch: &str, tag_name: &str, message: &str) -> Result<()> {
        self.checkout(branch).await?;
        let sign_flag = if self.has_sign_key().await? { "-s" } else { "-a" };
        self.run_checked(&["tag", sign_flag, tag_name, "-m", message])
            .await?;
        self.run_checked(&["push", &self.remote, tag_name]).await?;
        Ok(())
    }

    async fn merge_back(&self, base: &str, release: &str) -> Result<()> {
        self.checkout(base).await?;
        self.pull(base).await?;

        let output = self.run(&["merge", "--no-ff", release]).await?;
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            // git reports conflicted paths as "CONFLICT (...)" lines on
            // stdout; older tooling wrapped them in a "CONFLICTS:" summary.
            if stdout.contains("CONFLICT") || stderr.contains("CONFLICTS:") {
                let details = self.conflicting_paths().await.unwrap_or_default();
                return Err(GitError::MergeConflict {
                    source_branch: release.to_string(),
                    target: base.to_string(),
                    details: if details.is_empty() {
                        stdout.trim().to_string()
                    } else {
                        details
                    },
                }
                .into());
            }
            return Err(GitError::CommandFailed {
                command: format!("merge --no-ff {release}"),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        self.push().await
    }

    async fn push(&self) -> Result<()> {
        self.run_checked(&["push", &self.remote, "HEAD"]).await?;
        Ok(())
    }

    async fn commit_and_push(&self, branch: &str, message: &str) -> Result<Vec<String>> {
        self.checkout(branch).await?;
        self.run_checked(&["add", "--all"]).await?;

        let changed = self.changed_paths().await?;
        if changed.is_empty() {
            return Ok(Vec::new());
        }

        self.run_checked(&["commit", "-m", message]).await?;
        self.run_checked(&["push", &self.remote, branch]).await?;
        Ok(changed)
    }

    async fn get_last_tag(&self) -> Result<Option<String>> {
        let output = self.run(&["describe", "--tags", "--abbrev=0"]).await?;
        if output.status.success() {
            let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Ok((!tag.is_empty()).then_some(tag))
        } else {
            // "fatal: No names found" means the history has no tags yet.
            Ok(None)
        }
    }

    async fn get_local_branches(&self) -> Result<Vec<String>> {
        let listing = self
            .run_checked(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])
            .await?;
        Ok(listing.lines().map(str::to_string).collect())
    }

    async fn get_repository_name(&self) -> Result<String> {
        let raw = self
            .run(&["remote", "get-url", &self.remote])
            .await?;
        if !raw.status.success() {
            return Err(GitError::NoRepositoryName {
                remote: self.remote.clone(),
                reason: String::from_utf8_lossy(&raw.stderr).trim().to_string(),
            }
            .into());
        }
        let remote_url = String::from_utf8_lossy(&raw.stdout).trim().to_string();
        parse_repository_name(&remote_url).ok_or_else(|| {
            GitError::NoRepositoryName {
                remote: self.remote.clone(),
                reason: format!("unrecognized remote URL '{remote_url}'"),
            }
            .into()
        })
    }

    async fn commits_since(&self, tag: &str) -> Result<Vec<String>> {
        let range = format!("{tag}..HEAD");
        let format = format!("--format=%B{LOG_SEPARATOR}");
        let log = self.run_checked(&["log", &range, &format]).await?;
        Ok(log
            .split(LOG_SEPARATOR)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Extract `owner/name` from an HTTPS or scp-style SSH remote URL
fn parse_repository_name(remote_url: &str) -> Option<String> {
    let trimmed = remote_url.trim_end_matches('/');
    let path = if let Ok(parsed) = url::Url::parse(trimmed) {
        parsed.path().trim_start_matches('/').to_string()
    } else if let Some((_, path)) = trimmed.split_once(':') {
        // scp-style: git@github.com:owner/repo.git
        path.to_string()
    } else {
        return None;
    };

    let path = path.trim_end_matches(".git");
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let name = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    Some(format!("{owner}/{name}"))
}
