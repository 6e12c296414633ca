//! Command line argument parsing and validation.

use clap::Parser;
use semver::Version;
use std::path::PathBuf;

/// Release orchestration for git-hosted packages and extensions
#[derive(Parser, Debug)]
#[command(
    name = "relpilot",
    version,
    about = "Release orchestration for git-hosted packages and extensions",
    long_about = "Cuts a release end to end: computes the next version from tag \
history, stages it on a releasing branch, bumps the manifest, merges back, \
tags, opens the release pull request and publishes the release.

Usage:
  relpilot
  relpilot --version 1.3.0
  relpilot --instance /var/www/site --extension ext-foo"
)]
pub struct Args {
    /// Directory of the package to release (defaults to the working directory)
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Release an extension of the instance tree at this root instead of a package
    #[arg(long, value_name = "DIR")]
    pub instance: Option<PathBuf>,

    /// Extension to release, skipping the selection prompt
    #[arg(long, value_name = "NAME", requires = "instance")]
    pub extension: Option<String>,

    /// Release this exact version instead of computing one from history
    #[arg(long = "release-version", value_name = "VERSION")]
    pub release_version: Option<Version>,

    /// Branch the releasing branch is merged back into
    #[arg(long, value_name = "BRANCH", default_value = "develop")]
    pub base_branch: String,

    /// Branch releases are diffed against, tagged on, and PR'd into
    #[arg(long, value_name = "BRANCH", default_value = "master")]
    pub release_branch: String,

    /// Prefix of the short-lived releasing branch
    #[arg(long, value_name = "PREFIX", default_value = "release")]
    pub branch_prefix: String,

    /// Shell command producing release artifacts (packages only)
    #[arg(long, value_name = "CMD")]
    pub build_command: Option<String>,

    /// Annotation appended to the published release notes
    #[arg(long, value_name = "TEXT")]
    pub comment: Option<String>,

    /// Forge API token (falls back to GITHUB_TOKEN, then GH_TOKEN)
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Owner the updated manifest is chown'd to (extension releases)
    #[arg(long, value_name = "USER", requires = "instance")]
    pub www_user: Option<String>,

    /// Remote used for all repository operations
    #[arg(long, value_name = "REMOTE", default_value = "origin")]
    pub remote: String,

    /// Answer every checkpoint with its confirming choice
    #[arg(long, short = 'y')]
    pub non_interactive: bool,

    /// Enable verbose output
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Suppress all non-error output
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.path.is_some() && self.instance.is_some() {
            return Err("--path targets a package and --instance an extension tree; pass one or the other".to_string());
        }
        if self.base_branch == self.release_branch {
            return Err("base and release branches must differ".to_string());
        }
        // An unattended run cannot answer the extension selection prompt,
        // and silently picking a candidate would release the wrong thing.
        if self.non_interactive && self.instance.is_some() && self.extension.is_none() {
            return Err(
                "a non-interactive extension release requires --extension to name the target"
                    .to_string(),
            );
        }
        Ok(())
    }
}
