//! The release workflow engine.
//!
//! A release run is a fixed, ordered list of named steps executed
//! sequentially against one [`ReleaseContext`]. Each step carries a failure
//! policy: a fatal step aborts the whole run, a soft step is logged and
//! skipped. Merge conflicts are the one error routed by type instead of by
//! step: whichever step surfaces one, the engine hands it to the conflict
//! resolution flow before deciding the step's fate.

mod conflict;
mod context;
mod steps;

pub use context::ReleaseContext;

use crate::cli::OutputManager;
use crate::error::{GitError, Result, WorkflowError};
use crate::forge::ForgeGateway;
use crate::git::RepositoryGateway;
use crate::prompt::{ConfirmationGate, Prompt};
use crate::target::TargetResolver;
use crate::WorkflowConfig;
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;

/// Builds gateways once the target (and with it the repository path and
/// name) is known. Tests substitute this to inject recording mocks.
#[async_trait::async_trait]
pub trait GatewayProvider: Send + Sync {
    /// Repository gateway rooted at the target checkout
    async fn repository(&self, repo_path: &Path) -> Result<Arc<dyn RepositoryGateway>>;

    /// Forge gateway for the target repository
    fn forge(&self, repo_name: &str, token: Option<String>) -> Result<Arc<dyn ForgeGateway>>;
}

/// Production [`GatewayProvider`]: git CLI plus GitHub REST
pub struct DefaultGatewayProvider {
    /// Remote name used for all repository operations
    pub origin: String,
}

#[async_trait::async_trait]
impl GatewayProvider for DefaultGatewayProvider {
    async fn repository(&self, repo_path: &Path) -> Result<Arc<dyn RepositoryGateway>> {
        let gateway = crate::git::GitCli::open(repo_path, &self.origin).await?;
        Ok(Arc::new(gateway))
    }

    fn forge(&self, repo_name: &str, token: Option<String>) -> Result<Arc<dyn ForgeGateway>> {
        let forge = crate::forge::GitHubForge::new(repo_name.to_string(), token)?;
        Ok(Arc::new(forge))
    }
}

/// Collaborators shared by every step
pub struct Services {
    /// Selects the releasable unit and mediates manifest writes
    pub resolver: Box<dyn TargetResolver>,
    /// Builds gateways once the target is known
    pub gateways: Box<dyn GatewayProvider>,
    /// Operator prompt provider
    pub prompt: Box<dyn Prompt>,
    /// Checkpoint wrapper honoring the non-interactive bypass
    pub gate: ConfirmationGate,
    /// Operator-facing output
    pub output: OutputManager,
    /// CLI-derived configuration
    pub config: WorkflowConfig,
}

/// Per-run mutable state: the context plus the gateways bound by the
/// target-resolution step.
pub struct WorkflowState {
    /// The shared release context
    pub ctx: ReleaseContext,
    repo: Option<Arc<dyn RepositoryGateway>>,
    forge: Option<Arc<dyn ForgeGateway>>,
}

impl WorkflowState {
    fn new(ctx: ReleaseContext) -> Self {
        Self {
            ctx,
            repo: None,
            forge: None,
        }
    }

    /// Bind gateways after target resolution
    pub fn bind_gateways(
        &mut self,
        repo: Arc<dyn RepositoryGateway>,
        forge: Arc<dyn ForgeGateway>,
    ) {
        self.repo = Some(repo);
        self.forge = Some(forge);
    }

    /// Repository gateway; errors if the target step has not run yet
    pub fn repo(&self) -> Result<Arc<dyn RepositoryGateway>> {
        self.repo.clone().ok_or_else(|| {
            WorkflowError::Precondition(
                "repository gateway not bound: target resolution has not run".to_string(),
            )
        })
    }

    /// Forge gateway; errors if the target step has not run yet
    pub fn forge(&self) -> Result<Arc<dyn ForgeGateway>> {
        self.forge.clone().ok_or_else(|| {
            WorkflowError::Precondition(
                "forge gateway not bound: target resolution has not run".to_string(),
            )
        })
    }
}

/// Whether a step's failure aborts the run or is merely logged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Any error terminates the entire run
    Fatal,
    /// Errors are logged and the run continues; the step's context fields
    /// keep their prior state
    Soft,
}

/// Handler signature shared by all steps
pub type StepFn = for<'a> fn(&'a Services, &'a mut WorkflowState) -> BoxFuture<'a, Result<()>>;

/// One named step of the pipeline
pub struct StepDescriptor {
    /// Step name, for logs and test enumeration
    pub name: &'static str,
    /// Failure policy applied by the engine
    pub policy: FailurePolicy,
    /// The handler
    pub run: StepFn,
}

/// Outcome of a completed run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Names of the steps that ran to completion
    pub completed: Vec<&'static str>,
    /// Warning trail from soft failures
    pub warnings: Vec<String>,
}

/// Executes the step pipeline over one release context
pub struct WorkflowEngine {
    services: Services,
    steps: Vec<StepDescriptor>,
}

impl WorkflowEngine {
    /// Engine with an explicit step list (tests substitute steps here)
    pub fn new(services: Services, steps: Vec<StepDescriptor>) -> Self {
        Self { services, steps }
    }

    /// Engine configured for a standalone package release
    pub fn for_package(services: Services) -> Self {
        Self::new(services, steps::package_steps())
    }

    /// Engine configured for a modular extension release
    pub fn for_extension(services: Services) -> Self {
        Self::new(services, steps::extension_steps())
    }

    /// Names of the configured steps, in execution order
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    /// Execute the pipeline.
    ///
    /// Returns the report on success; a fatal step failure propagates as
    /// the error, with no further steps executed and no rollback of the
    /// steps already completed.
    pub async fn run(&self, search_root: std::path::PathBuf) -> Result<RunReport> {
        let config = &self.services.config;
        let ctx = ReleaseContext::new(
            search_root,
            config.base_branch.clone(),
            config.release_branch.clone(),
            config.auth_token.clone(),
        );
        let mut state = WorkflowState::new(ctx);
        let mut report = RunReport::default();

        for step in &self.steps {
            log::debug!("step {}", step.name);
            let outcome = match (step.run)(&self.services, &mut state).await {
                Err(err) if err.is_merge_conflict() => {
                    let WorkflowError::Git(GitError::MergeConflict {
                        source_branch: source,
                        target,
                        details,
                    }) = &err
                    else {
                        unreachable!("is_merge_conflict guarantees the variant");
                    };
                    conflict::resolve_manually(&self.services, &state, source, target, details)
                        .await
                }
                other => other,
            };

            match outcome {
                Ok(()) => report.completed.push(step.name),
                Err(err) => match step.policy {
                    FailurePolicy::Soft => {
                        let warning = format!("{}: {err}", step.name);
                        log::warn!("{warning}");
                        self.services.output.warn(&warning);
                        report.warnings.push(warning);
                    }
                    FailurePolicy::Fatal => return Err(err),
                },
            }
        }

        Ok(report)
    }
}
