//! Release target selection and manifest metadata.
//!
//! A run releases exactly one target: either the package in the working
//! directory or a modular extension discovered inside an instance tree. The
//! two kinds form a closed set; each provides metadata loading and a
//! format-preserving manifest version update.

use crate::error::{Result, TargetError};
use crate::prompt::Prompt;
use async_trait::async_trait;
use semver::Version;
use std::path::{Path, PathBuf};

/// Directory holding extension checkouts inside an instance tree
const EXTENSIONS_DIR: &str = "extensions";

/// Manifest file name for both target kinds
const MANIFEST: &str = "Cargo.toml";

/// The releasable unit in scope for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseTarget {
    /// A modular extension inside a larger instance tree
    Extension {
        /// Extension name
        name: String,
        /// Extension directory inside the instance tree
        path: PathBuf,
        /// Repository root for git operations (the extension checkout)
        repo_path: PathBuf,
    },
    /// A standalone package
    Package {
        /// Package name
        name: String,
        /// Package directory, which is also the repository root
        path: PathBuf,
    },
}

impl ReleaseTarget {
    /// Name of the releasable unit
    pub fn name(&self) -> &str {
        match self {
            ReleaseTarget::Extension { name, .. } | ReleaseTarget::Package { name, .. } => name,
        }
    }

    /// Repository root used for git operations
    pub fn repo_path(&self) -> &Path {
        match self {
            ReleaseTarget::Extension { repo_path, .. } => repo_path,
            ReleaseTarget::Package { path, .. } => path,
        }
    }

    /// Path of the manifest whose version gets bumped
    pub fn manifest_path(&self) -> PathBuf {
        match self {
            ReleaseTarget::Extension { path, .. } | ReleaseTarget::Package { path, .. } => {
                path.join(MANIFEST)
            }
        }
    }
}

/// Metadata loaded from the target manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMetadata {
    /// Declared package name
    pub name: String,
    /// Declared version
    pub version: String,
    /// Repository in `owner/name` form
    pub repo_name: String,
}

/// A selected target plus its loaded metadata
#[derive(Debug, Clone)]
pub struct SelectedTarget {
    /// The releasable unit
    pub target: ReleaseTarget,
    /// Metadata from its manifest
    pub metadata: TargetMetadata,
}

/// Selects the releasable unit and mediates manifest writes
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// Determine the target in scope and load its metadata
    async fn select_target(&self, prompt: &dyn Prompt) -> Result<SelectedTarget>;

    /// Write the new version into the target manifest
    fn update_version(&self, target: &ReleaseTarget, version: &Version) -> Result<()>;
}

/// Package variant: the working directory (or an explicit path) is the target
pub struct PackageResolver {
    path: PathBuf,
}

impl PackageResolver {
    /// Target the package at `path`
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl TargetResolver for PackageResolver {
    async fn select_target(&self, _prompt: &dyn Prompt) -> Result<SelectedTarget> {
        let manifest_path = self.path.join(MANIFEST);
        if !manifest_path.is_file() {
            return Err(TargetError::InvalidTarget {
                path: self.path.clone(),
                reason: format!("no {MANIFEST} found"),
            }
            .into());
        }

        let metadata = read_manifest(&manifest_path)?;
        Ok(SelectedTarget {
            target: ReleaseTarget::Package {
                name: metadata.name.clone(),
                path: self.path.clone(),
            },
            metadata,
        })
    }

    fn update_version(&self, target: &ReleaseTarget, version: &Version) -> Result<()> {
        write_manifest_version(&target.manifest_path(), version)
    }
}

/// Extension variant: the target lives under `<root>/extensions/<name>`
pub struct ExtensionResolver {
    root: PathBuf,
    /// Pre-selected extension name from the CLI, validated before use
    requested: Option<String>,
    /// Process owner for manifest writes, when the instance files are not
    /// owned by the releasing user
    www_user: Option<String>,
}

impl ExtensionResolver {
    /// Target an extension inside the instance tree rooted at `root`
    pub fn new(root: PathBuf, requested: Option<String>, www_user: Option<String>) -> Self {
        Self {
            root,
            requested,
            www_user,
        }
    }

    /// Extension directories under the instance tree that carry a manifest
    fn discover(&self) -> Result<Vec<String>> {
        let extensions_root = self.root.join(EXTENSIONS_DIR);
        let mut found = Vec::new();
        if extensions_root.is_dir() {
            for entry in std::fs::read_dir(&extensions_root)? {
                let entry = entry?;
                if entry.path().join(MANIFEST).is_file()
                    && let Some(name) = entry.file_name().to_str()
                {
                    found.push(name.to_string());
                }
            }
        }
        found.sort();
        Ok(found)
    }

    fn verify_instance(&self) -> Result<()> {
        // A usable instance tree carries its own manifest at the root.
        if !self.root.join(MANIFEST).is_file() {
            return Err(TargetError::InvalidTarget {
                path: self.root.clone(),
                reason: "not a usable instance tree (no root manifest)".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl TargetResolver for ExtensionResolver {
    async fn select_target(&self, prompt: &dyn Prompt) -> Result<SelectedTarget> {
        self.verify_instance()?;

        let candidates = self.discover()?;
        let name = match &self.requested {
            Some(requested) => {
                if !candidates.contains(requested) {
                    return Err(TargetError::TargetNotFound {
                        name: requested.clone(),
                        search_root: self.root.join(EXTENSIONS_DIR),
                    }
                    .into());
                }
                requested.clone()
            }
            None => {
                if candidates.is_empty() {
                    return Err(TargetError::InvalidTarget {
                        path: self.root.join(EXTENSIONS_DIR),
                        reason: "no extensions found".to_string(),
                    }
                    .into());
                }
                prompt.select(
                    "extension",
                    "Which extension should be released?",
                    &candidates,
                )?
            }
        };

        let path = self.root.join(EXTENSIONS_DIR).join(&name);
        let metadata = read_manifest(&path.join(MANIFEST))?;
        Ok(SelectedTarget {
            target: ReleaseTarget::Extension {
                name,
                repo_path: path.clone(),
                path,
            },
            metadata,
        })
    }

    fn update_version(&self, target: &ReleaseTarget, version: &Version) -> Result<()> {
        let manifest_path = target.manifest_path();
        write_manifest_version(&manifest_path, version)?;

        if let Some(user) = &self.www_user {
            let output = std::process::Command::new("chown")
                .arg(user)
                .arg(&manifest_path)
                .output()?;
            if !output.status.success() {
                return Err(TargetError::UpdateFailed {
                    path: manifest_path,
                    reason: format!(
                        "chown to '{}' failed: {}",
                        user,
                        String::from_utf8_lossy(&output.stderr).trim()
                    ),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Read name, version and repository name from a manifest
fn read_manifest(manifest_path: &Path) -> Result<TargetMetadata> {
    let content =
        std::fs::read_to_string(manifest_path).map_err(|e| TargetError::ManifestUnreadable {
            path: manifest_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let value: toml::Value =
        toml::from_str(&content).map_err(|e| TargetError::ManifestUnreadable {
            path: manifest_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let package = value
        .get("package")
        .ok_or_else(|| invalid(manifest_path, "no [package] section"))?;

    let name = package
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(manifest_path, "missing 'name' in [package]"))?
        .to_string();

    let version = package
        .get("version")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(manifest_path, "missing 'version' in [package]"))?
        .to_string();

    let repository = package
        .get("repository")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(manifest_path, "missing 'repository' in [package]"))?;

    let repo_name = repo_name_from_url(repository)
        .ok_or_else(|| invalid(manifest_path, "repository is not an owner/name URL"))?;

    Ok(TargetMetadata {
        name,
        version,
        repo_name,
    })
}

fn invalid(manifest_path: &Path, reason: &str) -> crate::error::WorkflowError {
    TargetError::InvalidTarget {
        path: manifest_path.to_path_buf(),
        reason: reason.to_string(),
    }
    .into()
}

/// Update the manifest version without disturbing formatting
fn write_manifest_version(manifest_path: &Path, version: &Version) -> Result<()> {
    let content =
        std::fs::read_to_string(manifest_path).map_err(|e| TargetError::UpdateFailed {
            path: manifest_path.to_path_buf(),
            reason: format!("failed to read: {e}"),
        })?;

    let mut doc =
        content
            .parse::<toml_edit::DocumentMut>()
            .map_err(|e| TargetError::UpdateFailed {
                path: manifest_path.to_path_buf(),
                reason: format!("failed to parse: {e}"),
            })?;

    doc["package"]["version"] = toml_edit::value(version.to_string());

    std::fs::write(manifest_path, doc.to_string()).map_err(|e| TargetError::UpdateFailed {
        path: manifest_path.to_path_buf(),
        reason: format!("failed to write: {e}"),
    })?;
    Ok(())
}

/// Extract `owner/name` from a manifest repository URL
fn repo_name_from_url(repository: &str) -> Option<String> {
    let parsed = url::Url::parse(repository).ok()?;
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let name = segments.next()?.trim_end_matches(".git");
    Some(format!("{owner}/{name}"))
}
