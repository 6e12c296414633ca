//! The concrete steps of the release pipeline.
//!
//! Steps are plain functions over `(Services, WorkflowState)` registered in
//! declarative step tables, so tests can enumerate, reorder or substitute
//! them without invoking the whole pipeline. Failure policy lives on the
//! descriptor, not in the step body; the exceptions are the confirmation
//! declines, which every step reports as [`WorkflowError::Declined`].

use super::{FailurePolicy, Services, StepDescriptor, StepFn, WorkflowState};
use crate::error::{Result, VersionError, WorkflowError};
use crate::target::ReleaseTarget;
use crate::version::{self, ResolvedVersion};
use futures::FutureExt;
use futures::future::BoxFuture;
use semver::Version;

fn fatal(name: &'static str, run: StepFn) -> StepDescriptor {
    StepDescriptor {
        name,
        policy: FailurePolicy::Fatal,
        run,
    }
}

fn soft(name: &'static str, run: StepFn) -> StepDescriptor {
    StepDescriptor {
        name,
        policy: FailurePolicy::Soft,
        run,
    }
}

/// Pipeline for a standalone package release
pub(super) fn package_steps() -> Vec<StepDescriptor> {
    vec![
        fatal("resolve-target", resolve_target),
        fatal("check-working-tree", check_working_tree),
        fatal("prepare-version", prepare_version),
        fatal("check-release-required", check_release_required),
        fatal("check-not-already-released", check_not_already_released),
        fatal("create-releasing-branch", create_releasing_branch),
        fatal("bump-manifest-version", bump_manifest_version),
        soft("build-package", build_package),
        fatal("commit-build-artifacts", commit_build_artifacts),
        fatal("merge-back", merge_back),
        fatal("tag-release", tag_release),
        fatal("create-pull-request", create_pull_request),
        soft("extract-release-notes", extract_release_notes),
        fatal("confirm-release", confirm_release),
        fatal("publish-release", publish_release),
        fatal("publish-package", publish_package),
        fatal("delete-releasing-branch", delete_releasing_branch),
    ]
}

/// Pipeline for a modular extension release: no build and no registry
/// publication, everything else identical.
pub(super) fn extension_steps() -> Vec<StepDescriptor> {
    vec![
        fatal("resolve-target", resolve_target),
        fatal("check-working-tree", check_working_tree),
        fatal("prepare-version", prepare_version),
        fatal("check-release-required", check_release_required),
        fatal("check-not-already-released", check_not_already_released),
        fatal("create-releasing-branch", create_releasing_branch),
        fatal("bump-manifest-version", bump_manifest_version),
        fatal("merge-back", merge_back),
        fatal("tag-release", tag_release),
        fatal("create-pull-request", create_pull_request),
        soft("extract-release-notes", extract_release_notes),
        fatal("confirm-release", confirm_release),
        fatal("publish-release", publish_release),
        fatal("delete-releasing-branch", delete_releasing_branch),
    ]
}

fn precondition(message: impl Into<String>) -> WorkflowError {
    WorkflowError::Precondition(message.into())
}

fn required_target(state: &WorkflowState) -> Result<ReleaseTarget> {
    state
        .ctx
        .target
        .clone()
        .ok_or_else(|| precondition("no release target selected"))
}

fn required_version(state: &WorkflowState) -> Result<Version> {
    state
        .ctx
        .version()
        .cloned()
        .ok_or_else(|| precondition("release version has not been computed"))
}

fn required_tag(state: &WorkflowState) -> Result<String> {
    state
        .ctx
        .tag()
        .map(str::to_string)
        .ok_or_else(|| precondition("release tag has not been derived"))
}

fn required_releasing_branch(state: &WorkflowState) -> Result<String> {
    state
        .ctx
        .releasing_branch()
        .map(str::to_string)
        .ok_or_else(|| precondition("releasing branch has not been derived"))
}

/// Step 1: resolve the target, load metadata and bind the gateways.
fn resolve_target<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        services.output.doing("Resolving release target");
        let selected = services
            .resolver
            .select_target(services.prompt.as_ref())
            .await?;

        let repo = services
            .gateways
            .repository(selected.target.repo_path())
            .await?;
        let forge = services.gateways.forge(
            &selected.metadata.repo_name,
            state.ctx.auth_token().map(str::to_string),
        )?;
        state.bind_gateways(repo, forge);

        services.output.done(&format!(
            "Releasing {} ({}, currently {})",
            selected.target.name(),
            selected.metadata.repo_name,
            selected.metadata.version
        ));
        state.ctx.metadata = Some(selected.metadata);
        state.ctx.target = Some(selected.target);
        Ok(())
    }
    .boxed()
}

/// Step 2: refuse to release over uncommitted local changes.
fn check_working_tree<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        if state.repo()?.has_local_changes().await? {
            return Err(precondition(
                "the target repository has uncommitted changes; commit or stash them first",
            ));
        }
        services.output.done("Working tree is clean");
        Ok(())
    }
    .boxed()
}

/// Step 3: sync branches and compute the next version.
///
/// With `--version` the computation is skipped and the supplied version is
/// used (resuming an existing releasing branch); the existence checks in
/// the next steps still apply.
fn prepare_version<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let repo = state.repo()?;
        let base = state.ctx.base_branch.clone();
        let release = state.ctx.release_branch.clone();

        services.output.doing("Syncing base and release branches");
        repo.fetch().await?;
        repo.checkout(&base).await?;
        repo.pull(&base).await?;
        repo.checkout(&release).await?;
        repo.pull(&release).await?;

        let last_tag = repo.get_last_tag().await?;
        state.ctx.last_tag = last_tag.clone();

        let resolved = match &services.config.version_to_release {
            Some(version) => {
                let last_version = match &last_tag {
                    Some(tag) => version::coerce_version(tag)?,
                    None => {
                        services
                            .output
                            .info("No prior release tag; treating this as the first tracked release");
                        Version::new(0, 0, 0)
                    }
                };
                services
                    .output
                    .info(&format!("Using operator-supplied version {version}"));
                ResolvedVersion {
                    version: version.clone(),
                    last_version,
                }
            }
            None => {
                let tag = last_tag
                    .as_deref()
                    .ok_or(VersionError::NoPriorTag)?;
                let commits = repo.commits_since(tag).await?;
                let bump = version::recommend_bump(&commits);
                services.output.info(&format!(
                    "{} commit(s) since {tag} recommend a {bump} bump",
                    commits.len()
                ));
                version::compute_next_version(Some(tag), bump)?
            }
        };

        let (version, last_version) = (resolved.version.clone(), resolved.last_version.clone());
        state.ctx.set_release_version(
            resolved.version,
            resolved.last_version,
            &services.config.branch_prefix,
        );
        services.output.done(&format!(
            "Next version: {version} (last released: {last_version})"
        ));
        Ok(())
    }
    .boxed()
}

/// Step 4: when base and release do not differ, ask before proceeding.
fn check_release_required<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let repo = state.repo()?;
        if repo
            .has_diff(&state.ctx.base_branch, &state.ctx.release_branch)
            .await?
        {
            return Ok(());
        }

        let confirmed = services.gate.confirm(
            services.prompt.as_ref(),
            &services.output,
            "release-required",
            &format!(
                "'{}' and '{}' have no differences. Release anyway?",
                state.ctx.base_branch, state.ctx.release_branch
            ),
            false,
        )?;
        if !confirmed {
            return Err(WorkflowError::Declined {
                reason: "no differences between base and release branches".to_string(),
            });
        }
        Ok(())
    }
    .boxed()
}

/// Step 5: never re-run a release whose tag or branch already exists.
fn check_not_already_released<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let repo = state.repo()?;
        let tag = required_tag(state)?;
        let releasing = required_releasing_branch(state)?;

        if repo.has_tag(&tag).await? {
            return Err(precondition(format!(
                "tag '{tag}' already exists; this version appears to have been released"
            )));
        }
        if repo.has_branch(&releasing).await? {
            return Err(precondition(format!(
                "branch '{releasing}' already exists; a release for this version is in progress"
            )));
        }
        services
            .output
            .done(&format!("No existing '{tag}' tag or '{releasing}' branch"));
        Ok(())
    }
    .boxed()
}

/// Step 6: create the releasing branch from the release branch.
fn create_releasing_branch<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let repo = state.repo()?;
        let releasing = required_releasing_branch(state)?;
        repo.checkout(&state.ctx.release_branch).await?;
        repo.local_branch(&releasing).await?;
        services.output.done(&format!("Created branch '{releasing}'"));
        Ok(())
    }
    .boxed()
}

/// Step 7: bump the manifest version and push the commit.
fn bump_manifest_version<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let repo = state.repo()?;
        let target = required_target(state)?;
        let version = required_version(state)?;
        let releasing = required_releasing_branch(state)?;

        services.resolver.update_version(&target, &version)?;
        let changed = repo
            .commit_and_push(&releasing, &format!("chore(release): {version}"))
            .await?;
        if changed.is_empty() {
            services
                .output
                .info(&format!("Manifest already declares {version}"));
        } else {
            services
                .output
                .done(&format!("Bumped manifest version to {version}"));
        }
        Ok(())
    }
    .boxed()
}

/// Step 8 (soft): run the configured build command.
fn build_package<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let Some(command) = services.config.build_command.clone() else {
            services.output.info("No build command configured, skipping build");
            return Ok(());
        };
        let target = required_target(state)?;

        services.output.doing(&format!("Building package: {command}"));
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(target.repo_path())
            .output()
            .await?;
        if !output.status.success() {
            return Err(precondition(format!(
                "build command failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        services.output.done("Build finished");
        Ok(())
    }
    .boxed()
}

/// Step 9: commit and push whatever the build changed.
fn commit_build_artifacts<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let repo = state.repo()?;
        let releasing = required_releasing_branch(state)?;
        let changed = repo
            .commit_and_push(&releasing, "build: release artifacts")
            .await?;
        if changed.is_empty() {
            services.output.info("No build artifacts to commit");
        } else {
            services
                .output
                .done(&format!("Committed {} build artifact(s)", changed.len()));
        }
        Ok(())
    }
    .boxed()
}

/// Step 10: merge the releasing branch back into the base branch.
///
/// A conflict from the gateway is routed by the engine to the manual
/// resolution flow; any other failure is fatal here.
fn merge_back<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let repo = state.repo()?;
        let releasing = required_releasing_branch(state)?;
        let base = state.ctx.base_branch.clone();
        repo.merge_back(&base, &releasing).await?;
        services
            .output
            .done(&format!("Merged '{releasing}' back into '{base}'"));
        Ok(())
    }
    .boxed()
}

/// Step 11: create the release tag on the release branch.
fn tag_release<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let repo = state.repo()?;
        let tag = required_tag(state)?;
        let version = required_version(state)?;

        if repo.has_sign_key().await? {
            services.output.info("Signing key configured, tag will be signed");
        }
        repo.tag(&state.ctx.release_branch, &tag, &format!("Release {version}"))
            .await?;
        services.output.done(&format!(
            "Tagged '{}' with {tag}",
            state.ctx.release_branch
        ));
        Ok(())
    }
    .boxed()
}

/// Step 12: open the release pull request into the release branch.
fn create_pull_request<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let forge = state.forge()?;
        let releasing = required_releasing_branch(state)?;
        let version = required_version(state)?;
        let last_version = state
            .ctx
            .last_version
            .clone()
            .ok_or_else(|| precondition("last released version is unknown"))?;

        services.output.doing(&format!(
            "Opening pull request '{releasing}' -> '{}'",
            state.ctx.release_branch
        ));
        let pr = forge
            .create_release_pr(&releasing, &state.ctx.release_branch, &version, &last_version)
            .await?;
        services
            .output
            .done(&format!("Created pull request {}", pr.html_url));
        state.ctx.pull_request = Some(pr);
        Ok(())
    }
    .boxed()
}

/// Step 13 (soft): extract release notes from the pull request body.
///
/// The pull request record starts with empty notes, so a failure here
/// leaves `notes` as `""` and never blocks the remaining steps.
fn extract_release_notes<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let forge = state.forge()?;
        let number = state
            .ctx
            .pull_request
            .as_ref()
            .ok_or_else(|| precondition("no pull request to extract notes from"))?
            .number;

        let notes = forge.extract_release_notes(number).await?;
        if let Some(pr) = state.ctx.pull_request.as_mut() {
            pr.notes = notes;
        }
        services.output.done("Extracted release notes");
        Ok(())
    }
    .boxed()
}

/// Step 14: final checkpoint before the release object goes public.
fn confirm_release<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let tag = required_tag(state)?;
        let confirmed = services.gate.confirm(
            services.prompt.as_ref(),
            &services.output,
            "create-release",
            &format!("Create the published release {tag}?"),
            true,
        )?;
        if !confirmed {
            return Err(WorkflowError::Declined {
                reason: format!("release {tag} was not confirmed"),
            });
        }
        Ok(())
    }
    .boxed()
}

/// Step 15: create the published release object on the forge.
fn publish_release<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let forge = state.forge()?;
        let tag = required_tag(state)?;

        state.ctx.comment = services.config.release_comment.clone();
        let notes = state
            .ctx
            .pull_request
            .as_ref()
            .map(|pr| pr.notes.clone())
            .unwrap_or_default();
        let body = match state.ctx.comment.as_deref() {
            Some(comment) if !comment.is_empty() && notes.is_empty() => comment.to_string(),
            Some(comment) if !comment.is_empty() => format!("{notes}\n\n{comment}"),
            _ => notes,
        };

        forge.release(&tag, &body).await?;
        services.output.done(&format!("Published release {tag}"));
        Ok(())
    }
    .boxed()
}

/// Step 16 (package only): publish to the package registry, behind an
/// explicit confirmation.
fn publish_package<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let target = required_target(state)?;
        let version = required_version(state)?;

        let confirmed = services.gate.confirm(
            services.prompt.as_ref(),
            &services.output,
            "publish-package",
            &format!("Publish {} {version} to the registry?", target.name()),
            true,
        )?;
        if !confirmed {
            return Err(WorkflowError::Declined {
                reason: "registry publication declined".to_string(),
            });
        }

        services.output.doing("Publishing to the registry");
        let output = tokio::process::Command::new("cargo")
            .arg("publish")
            .current_dir(target.repo_path())
            .output()
            .await?;
        if !output.status.success() {
            return Err(precondition(format!(
                "registry publish failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        services
            .output
            .done(&format!("Published {} {version}", target.name()));
        Ok(())
    }
    .boxed()
}

/// Step 17: delete the short-lived releasing branch.
fn delete_releasing_branch<'a>(
    services: &'a Services,
    state: &'a mut WorkflowState,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let repo = state.repo()?;
        let releasing = required_releasing_branch(state)?;
        let version = required_version(state)?;
        repo.checkout(&state.ctx.base_branch).await?;
        repo.delete_branch(&releasing).await?;
        services
            .output
            .done(&format!("Release {version} complete"));
        Ok(())
    }
    .boxed()
}
