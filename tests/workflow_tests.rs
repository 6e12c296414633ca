//! End-to-end workflow tests over recording gateway mocks.
//!
//! The target resolver and manifest writes are real (backed by a tempdir
//! instance tree); only the git and forge gateways are mocked, so these
//! tests exercise the full step pipeline including the version arithmetic
//! and the manifest bump.

use async_trait::async_trait;
use relpilot::cli::OutputManager;
use relpilot::error::{ForgeError, GitError, Result, WorkflowError};
use relpilot::forge::{ForgeGateway, PullRequestInfo};
use relpilot::git::RepositoryGateway;
use relpilot::prompt::{ConfirmationGate, Prompt, ScriptedPrompt};
use relpilot::target::{ExtensionResolver, PackageResolver, TargetResolver};
use relpilot::workflow::{GatewayProvider, RunReport, Services, WorkflowEngine};
use relpilot::WorkflowConfig;
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum MergeBehavior {
    #[default]
    Clean,
    Conflict,
    Fails,
}

/// Scripted repository state for one test
#[derive(Default)]
struct RepoFixture {
    last_tag: Option<String>,
    commits: Vec<String>,
    branches_differ: bool,
    existing_tags: Vec<String>,
    existing_branches: Vec<String>,
    local_changes: bool,
    nothing_to_commit: bool,
    merge: MergeBehavior,
}

/// Recording [`RepositoryGateway`] mock
struct MockRepo {
    fixture: RepoFixture,
    calls: Mutex<Vec<String>>,
}

impl MockRepo {
    fn new(fixture: RepoFixture) -> Arc<Self> {
        Arc::new(Self {
            fixture,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl RepositoryGateway for MockRepo {
    async fn pull(&self, branch: &str) -> Result<()> {
        self.record(format!("pull {branch}"));
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        self.record("fetch");
        Ok(())
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        self.record(format!("checkout {branch}"));
        Ok(())
    }

    async fn local_branch(&self, name: &str) -> Result<()> {
        self.record(format!("local_branch {name}"));
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<()> {
        self.record(format!("delete_branch {name}"));
        Ok(())
    }

    async fn has_branch(&self, name: &str) -> Result<bool> {
        Ok(self.fixture.existing_branches.iter().any(|b| b == name))
    }

    async fn has_tag(&self, name: &str) -> Result<bool> {
        Ok(self.fixture.existing_tags.iter().any(|t| t == name))
    }

    async fn has_diff(&self, _a: &str, _b: &str) -> Result<bool> {
        Ok(self.fixture.branches_differ)
    }

    async fn has_local_changes(&self) -> Result<bool> {
        Ok(self.fixture.local_changes)
    }

    async fn has_sign_key(&self) -> Result<bool> {
        Ok(false)
    }

    async fn tag(&self, branch: &str, tag_name: &str, _message: &str) -> Result<()> {
        self.record(format!("tag {branch} {tag_name}"));
        Ok(())
    }

    async fn merge_back(&self, base: &str, release: &str) -> Result<()> {
        self.record(format!("merge_back {base} {release}"));
        match self.fixture.merge {
            MergeBehavior::Clean => Ok(()),
            MergeBehavior::Conflict => Err(GitError::MergeConflict {
                source_branch: release.to_string(),
                target: base.to_string(),
                details: "src/lib.rs\nCargo.toml".to_string(),
            }
            .into()),
            MergeBehavior::Fails => Err(GitError::CommandFailed {
                command: "merge".to_string(),
                stderr: "fatal: refusing to merge unrelated histories".to_string(),
            }
            .into()),
        }
    }

    async fn push(&self) -> Result<()> {
        self.record("push");
        Ok(())
    }

    async fn commit_and_push(&self, branch: &str, message: &str) -> Result<Vec<String>> {
        self.record(format!("commit_and_push {branch} {message}"));
        if self.fixture.nothing_to_commit {
            return Ok(Vec::new());
        }
        Ok(vec!["Cargo.toml".to_string()])
    }

    async fn get_last_tag(&self) -> Result<Option<String>> {
        Ok(self.fixture.last_tag.clone())
    }

    async fn get_local_branches(&self) -> Result<Vec<String>> {
        Ok(self.fixture.existing_branches.clone())
    }

    async fn get_repository_name(&self) -> Result<String> {
        Ok("acme/ext-foo".to_string())
    }

    async fn commits_since(&self, tag: &str) -> Result<Vec<String>> {
        self.record(format!("commits_since {tag}"));
        Ok(self.fixture.commits.clone())
    }
}

/// Recording [`ForgeGateway`] mock
#[derive(Default)]
struct MockForge {
    notes_fail: bool,
    calls: Mutex<Vec<String>>,
    releases: Mutex<Vec<(String, String)>>,
}

impl MockForge {
    fn new(notes_fail: bool) -> Arc<Self> {
        Arc::new(Self {
            notes_fail,
            ..Self::default()
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn releases(&self) -> Vec<(String, String)> {
        self.releases.lock().unwrap().clone()
    }
}

#[async_trait]
impl ForgeGateway for MockForge {
    async fn create_release_pr(
        &self,
        head_branch: &str,
        base_branch: &str,
        version: &Version,
        last_version: &Version,
    ) -> Result<PullRequestInfo> {
        self.calls.lock().unwrap().push(format!(
            "create_release_pr {head_branch} -> {base_branch} ({last_version} -> {version})"
        ));
        Ok(PullRequestInfo {
            state: "open".to_string(),
            html_url: "https://github.com/acme/ext-foo/pull/7".to_string(),
            url: "https://api.github.com/repos/acme/ext-foo/pulls/7".to_string(),
            number: 7,
            id: 4242,
            notes: String::new(),
        })
    }

    async fn release(&self, tag: &str, body: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("release {tag}"));
        self.releases
            .lock()
            .unwrap()
            .push((tag.to_string(), body.to_string()));
        Ok(())
    }

    async fn extract_release_notes(&self, pr_number: u64) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("extract_release_notes {pr_number}"));
        if self.notes_fail {
            return Err(ForgeError::Rejected {
                operation: "get pull request".to_string(),
                status: 500,
                message: "server error".to_string(),
            }
            .into());
        }
        Ok("## Changes\n- metrics exporter".to_string())
    }
}

struct MockGateways {
    repo: Arc<MockRepo>,
    forge: Arc<MockForge>,
}

#[async_trait]
impl GatewayProvider for MockGateways {
    async fn repository(&self, _repo_path: &Path) -> Result<Arc<dyn RepositoryGateway>> {
        Ok(self.repo.clone())
    }

    fn forge(&self, _repo_name: &str, _token: Option<String>) -> Result<Arc<dyn ForgeGateway>> {
        Ok(self.forge.clone())
    }
}

fn write_manifest(dir: &Path, name: &str, version: &str) {
    std::fs::write(
        dir.join("Cargo.toml"),
        format!(
            "[package]\nname = \"{name}\"\nversion = \"{version}\"\n\
             repository = \"https://github.com/acme/{name}\"\n"
        ),
    )
    .unwrap();
}

/// Instance tree with one extension checkout
fn instance_with_extension(name: &str, version: &str) -> (TempDir, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    write_manifest(root.path(), "instance", "0.1.0");
    let ext_dir = root.path().join("extensions").join(name);
    std::fs::create_dir_all(&ext_dir).unwrap();
    write_manifest(&ext_dir, name, version);
    (root, ext_dir)
}

fn services(
    root: &Path,
    repo: &Arc<MockRepo>,
    forge: &Arc<MockForge>,
    prompt: ScriptedPrompt,
    interactive: bool,
    config: WorkflowConfig,
) -> Services {
    Services {
        resolver: Box::new(ExtensionResolver::new(
            root.to_path_buf(),
            Some("ext-foo".to_string()),
            None,
        )) as Box<dyn TargetResolver>,
        gateways: Box::new(MockGateways {
            repo: repo.clone(),
            forge: forge.clone(),
        }),
        prompt: Box::new(prompt) as Box<dyn Prompt>,
        gate: ConfirmationGate::new(interactive),
        output: OutputManager::new(false, true),
        config,
    }
}

fn package_services(
    pkg_dir: &Path,
    repo: &Arc<MockRepo>,
    forge: &Arc<MockForge>,
    prompt: ScriptedPrompt,
    config: WorkflowConfig,
) -> Services {
    Services {
        resolver: Box::new(PackageResolver::new(pkg_dir.to_path_buf())) as Box<dyn TargetResolver>,
        gateways: Box::new(MockGateways {
            repo: repo.clone(),
            forge: forge.clone(),
        }),
        prompt: Box::new(prompt) as Box<dyn Prompt>,
        gate: ConfirmationGate::new(true),
        output: OutputManager::new(false, true),
        config,
    }
}

/// Run the package pipeline against a tempdir package checkout.
///
/// The registry-publish gate is always answered last in `confirms`; tests
/// decline it so nothing is ever handed to the real registry tool.
async fn run_package_release(
    fixture: RepoFixture,
    confirms: impl IntoIterator<Item = bool>,
    config: WorkflowConfig,
) -> (Result<RunReport>, Arc<MockRepo>, Arc<MockForge>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "widgets", "1.2.3");
    let repo = MockRepo::new(fixture);
    let forge = MockForge::new(false);
    let services = package_services(
        dir.path(),
        &repo,
        &forge,
        ScriptedPrompt::with_confirms(confirms),
        config,
    );
    let engine = WorkflowEngine::for_package(services);
    let outcome = engine.run(dir.path().to_path_buf()).await;
    (outcome, repo, forge, dir)
}

async fn run_extension_release(
    fixture: RepoFixture,
    prompt: ScriptedPrompt,
    interactive: bool,
    notes_fail: bool,
) -> (Result<RunReport>, Arc<MockRepo>, Arc<MockForge>, TempDir, PathBuf) {
    let (root, ext_dir) = instance_with_extension("ext-foo", "1.2.3");
    let repo = MockRepo::new(fixture);
    let forge = MockForge::new(notes_fail);
    let services = services(
        root.path(),
        &repo,
        &forge,
        prompt,
        interactive,
        WorkflowConfig::default(),
    );
    let engine = WorkflowEngine::for_extension(services);
    let outcome = engine.run(root.path().to_path_buf()).await;
    (outcome, repo, forge, root, ext_dir)
}

#[tokio::test]
async fn extension_release_runs_the_full_pipeline() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: add metrics exporter".to_string()],
        branches_differ: true,
        ..RepoFixture::default()
    };
    let (outcome, repo, forge, _root, ext_dir) =
        run_extension_release(fixture, ScriptedPrompt::default(), true, false).await;

    let report = outcome.unwrap();
    assert!(report.warnings.is_empty());
    assert_eq!(report.completed.len(), 14);

    // feat commit on top of 1.2.3 => 1.3.0, tag v1.3.0, branch release-1.3.0
    let calls = repo.calls();
    assert!(calls.contains(&"local_branch release-1.3.0".to_string()));
    assert!(calls.contains(&"tag master v1.3.0".to_string()));
    assert!(calls.contains(&"merge_back develop release-1.3.0".to_string()));
    assert!(calls.contains(&"delete_branch release-1.3.0".to_string()));
    assert!(
        calls
            .iter()
            .any(|c| c.starts_with("commit_and_push release-1.3.0 chore(release): 1.3.0"))
    );

    // Exactly one PR into the release branch and one published release.
    assert_eq!(
        forge.calls().iter().filter(|c| c.starts_with("create_release_pr")).count(),
        1
    );
    assert!(forge
        .calls()
        .contains(&"create_release_pr release-1.3.0 -> master (1.2.3 -> 1.3.0)".to_string()));
    let releases = forge.releases();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].0, "v1.3.0");
    assert_eq!(releases[0].1, "## Changes\n- metrics exporter");

    // The extension manifest was bumped in place.
    let manifest = std::fs::read_to_string(ext_dir.join("Cargo.toml")).unwrap();
    assert!(manifest.contains("version = \"1.3.0\""));
}

#[tokio::test]
async fn declined_no_diff_checkpoint_aborts_before_any_branch_work() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["chore: deps".to_string()],
        branches_differ: false,
        ..RepoFixture::default()
    };
    let (outcome, repo, forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::with_confirms([false]), true, false).await;

    assert!(matches!(outcome, Err(WorkflowError::Declined { .. })));
    assert_eq!(repo.count("local_branch"), 0);
    assert_eq!(repo.count("tag"), 0);
    assert!(forge.calls().is_empty());
}

#[tokio::test]
async fn non_interactive_run_auto_confirms_the_no_diff_checkpoint() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["chore: deps".to_string()],
        branches_differ: false,
        ..RepoFixture::default()
    };
    let (outcome, _repo, forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::default(), false, false).await;

    // chore-only history => patch release 1.2.4
    let report = outcome.unwrap();
    assert!(report.warnings.is_empty());
    assert_eq!(forge.releases(), vec![(
        "v1.2.4".to_string(),
        "## Changes\n- metrics exporter".to_string()
    )]);
}

#[tokio::test]
async fn existing_tag_aborts_before_anything_is_created() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        existing_tags: vec!["v1.3.0".to_string()],
        ..RepoFixture::default()
    };
    let (outcome, repo, forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::default(), true, false).await;

    let err = outcome.unwrap_err();
    assert!(matches!(err, WorkflowError::Precondition(_)));
    assert!(err.to_string().contains("v1.3.0"));
    assert_eq!(repo.count("local_branch"), 0);
    assert_eq!(repo.count("commit_and_push"), 0);
    assert!(forge.calls().is_empty());
}

#[tokio::test]
async fn existing_releasing_branch_aborts_before_anything_is_created() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        existing_branches: vec!["release-1.3.0".to_string()],
        ..RepoFixture::default()
    };
    let (outcome, repo, forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::default(), true, false).await;

    let err = outcome.unwrap_err();
    assert!(matches!(err, WorkflowError::Precondition(_)));
    assert!(err.to_string().contains("release-1.3.0"));
    assert_eq!(repo.count("local_branch"), 0);
    assert!(forge.calls().is_empty());
}

#[tokio::test]
async fn uncommitted_changes_abort_the_run() {
    let fixture = RepoFixture {
        local_changes: true,
        ..RepoFixture::default()
    };
    let (outcome, repo, _forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::default(), true, false).await;

    assert!(matches!(outcome, Err(WorkflowError::Precondition(_))));
    // Nothing beyond the working tree check ran.
    assert_eq!(repo.count("fetch"), 0);
}

#[tokio::test]
async fn missing_prior_tag_is_fatal() {
    let fixture = RepoFixture {
        last_tag: None,
        branches_differ: true,
        ..RepoFixture::default()
    };
    let (outcome, _repo, forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::default(), true, false).await;

    assert!(matches!(
        outcome,
        Err(WorkflowError::Version(
            relpilot::error::VersionError::NoPriorTag
        ))
    ));
    assert!(forge.calls().is_empty());
}

#[tokio::test]
async fn resolved_conflict_pushes_once_and_continues() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        merge: MergeBehavior::Conflict,
        ..RepoFixture::default()
    };
    let (outcome, repo, forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::with_confirms([true]), true, false).await;

    let report = outcome.unwrap();
    assert!(report.warnings.is_empty());
    assert_eq!(repo.count("push"), 1);
    assert_eq!(forge.releases().len(), 1);
}

#[tokio::test]
async fn declined_conflict_aborts_without_pushing() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        merge: MergeBehavior::Conflict,
        ..RepoFixture::default()
    };
    // No scripted answer: the conflict prompt defaults to declining.
    let (outcome, repo, forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::default(), true, false).await;

    assert!(matches!(outcome, Err(WorkflowError::Declined { .. })));
    assert_eq!(repo.count("push"), 0);
    assert!(forge.releases().is_empty());
}

#[tokio::test]
async fn non_conflict_merge_failure_skips_the_conflict_flow() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        merge: MergeBehavior::Fails,
        ..RepoFixture::default()
    };
    let (outcome, repo, forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::with_confirms([true]), true, false).await;

    assert!(matches!(
        outcome,
        Err(WorkflowError::Git(GitError::CommandFailed { .. }))
    ));
    // The manual-resolution push never happens for a plain merge failure.
    assert_eq!(repo.count("push"), 0);
    assert!(forge.releases().is_empty());
}

#[tokio::test]
async fn notes_extraction_failure_is_soft_and_leaves_notes_empty() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        ..RepoFixture::default()
    };
    let (outcome, _repo, forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::default(), true, true).await;

    let report = outcome.unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("extract-release-notes"));

    // The release still went out, with an empty body.
    assert_eq!(forge.releases(), vec![("v1.3.0".to_string(), String::new())]);
}

#[tokio::test]
async fn operator_supplied_version_skips_history_analysis() {
    let (root, _ext_dir) = instance_with_extension("ext-foo", "1.2.3");
    let repo = MockRepo::new(RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        branches_differ: true,
        ..RepoFixture::default()
    });
    let forge = MockForge::new(false);
    let config = WorkflowConfig {
        version_to_release: Some(Version::new(2, 0, 0)),
        ..WorkflowConfig::default()
    };
    let services = services(
        root.path(),
        &repo,
        &forge,
        ScriptedPrompt::default(),
        true,
        config,
    );
    let engine = WorkflowEngine::for_extension(services);
    engine.run(root.path().to_path_buf()).await.unwrap();

    assert_eq!(repo.count("commits_since"), 0);
    assert!(repo.calls().contains(&"tag master v2.0.0".to_string()));
    assert!(forge
        .calls()
        .contains(&"create_release_pr release-2.0.0 -> master (1.2.3 -> 2.0.0)".to_string()));
}

#[tokio::test]
async fn release_comment_is_appended_to_the_notes() {
    let (root, _ext_dir) = instance_with_extension("ext-foo", "1.2.3");
    let repo = MockRepo::new(RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        ..RepoFixture::default()
    });
    let forge = MockForge::new(false);
    let config = WorkflowConfig {
        release_comment: Some("Rollout window: Tuesday".to_string()),
        ..WorkflowConfig::default()
    };
    let services = services(
        root.path(),
        &repo,
        &forge,
        ScriptedPrompt::default(),
        true,
        config,
    );
    let engine = WorkflowEngine::for_extension(services);
    engine.run(root.path().to_path_buf()).await.unwrap();

    let releases = forge.releases();
    assert_eq!(
        releases[0].1,
        "## Changes\n- metrics exporter\n\nRollout window: Tuesday"
    );
}

#[tokio::test]
async fn declined_final_confirmation_stops_before_publication() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        ..RepoFixture::default()
    };
    let (outcome, repo, forge, _root, _ext) =
        run_extension_release(fixture, ScriptedPrompt::with_confirms([false]), true, false).await;

    assert!(matches!(outcome, Err(WorkflowError::Declined { .. })));
    // PR exists by then, but no release and no branch cleanup.
    assert_eq!(forge.calls().iter().filter(|c| c.starts_with("create_release_pr")).count(), 1);
    assert!(forge.releases().is_empty());
    assert_eq!(repo.count("delete_branch"), 0);
}

#[tokio::test]
async fn package_build_failure_is_soft_and_the_release_still_publishes() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        ..RepoFixture::default()
    };
    let config = WorkflowConfig {
        build_command: Some("false".to_string()),
        ..WorkflowConfig::default()
    };
    // Confirm the release, decline the registry publish.
    let (outcome, repo, forge, _dir) =
        run_package_release(fixture, [true, false], config).await;

    // The failing build never stopped the pipeline: artifacts were
    // committed, the tag was created and the release went out before the
    // declined registry gate ended the run.
    assert!(matches!(outcome, Err(WorkflowError::Declined { .. })));
    assert_eq!(repo.count("commit_and_push"), 2);
    assert!(repo.calls().contains(&"tag master v1.3.0".to_string()));
    assert_eq!(forge.releases().len(), 1);
}

#[tokio::test]
async fn package_build_command_runs_in_the_package_directory() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        ..RepoFixture::default()
    };
    let config = WorkflowConfig {
        build_command: Some("printf ok > build-stamp".to_string()),
        ..WorkflowConfig::default()
    };
    let (outcome, _repo, forge, dir) =
        run_package_release(fixture, [true, false], config).await;

    assert!(matches!(outcome, Err(WorkflowError::Declined { .. })));
    let stamp = std::fs::read_to_string(dir.path().join("build-stamp")).unwrap();
    assert_eq!(stamp, "ok");
    assert_eq!(forge.releases().len(), 1);
}

#[tokio::test]
async fn declined_registry_publish_stops_before_branch_cleanup() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        ..RepoFixture::default()
    };
    let (outcome, repo, forge, _dir) =
        run_package_release(fixture, [true, false], WorkflowConfig::default()).await;

    match outcome {
        Err(WorkflowError::Declined { reason }) => {
            assert!(reason.contains("registry"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    // The GitHub release exists, but the releasing branch was not cleaned
    // up and no registry publication was attempted.
    assert_eq!(forge.releases().len(), 1);
    assert_eq!(repo.count("delete_branch"), 0);
}

#[tokio::test]
async fn empty_artifact_commit_does_not_stop_the_package_run() {
    let fixture = RepoFixture {
        last_tag: Some("v1.2.3".to_string()),
        commits: vec!["feat: exporter".to_string()],
        branches_differ: true,
        nothing_to_commit: true,
        ..RepoFixture::default()
    };
    let (outcome, repo, forge, _dir) =
        run_package_release(fixture, [true, false], WorkflowConfig::default()).await;

    assert!(matches!(outcome, Err(WorkflowError::Declined { .. })));
    // Manifest bump and artifact commits both reported no changes; the
    // pipeline still tagged and released.
    assert_eq!(repo.count("commit_and_push"), 2);
    assert_eq!(forge.releases().len(), 1);
}

#[tokio::test]
async fn first_tracked_release_resume_reports_a_zero_base_version() {
    let (root, _ext_dir) = instance_with_extension("ext-foo", "1.2.3");
    let repo = MockRepo::new(RepoFixture {
        last_tag: None,
        branches_differ: true,
        ..RepoFixture::default()
    });
    let forge = MockForge::new(false);
    let config = WorkflowConfig {
        version_to_release: Some(Version::new(2, 0, 0)),
        ..WorkflowConfig::default()
    };
    let services = services(
        root.path(),
        &repo,
        &forge,
        ScriptedPrompt::default(),
        true,
        config,
    );
    let engine = WorkflowEngine::for_extension(services);
    engine.run(root.path().to_path_buf()).await.unwrap();

    assert!(forge
        .calls()
        .contains(&"create_release_pr release-2.0.0 -> master (0.0.0 -> 2.0.0)".to_string()));
}

#[test]
fn package_pipeline_adds_build_and_registry_steps() {
    let (root, _ext_dir) = instance_with_extension("ext-foo", "1.2.3");
    let repo = MockRepo::new(RepoFixture::default());
    let forge = MockForge::new(false);

    let package = WorkflowEngine::for_package(services(
        root.path(),
        &repo,
        &forge,
        ScriptedPrompt::default(),
        true,
        WorkflowConfig::default(),
    ));
    let extension = WorkflowEngine::for_extension(services(
        root.path(),
        &repo,
        &forge,
        ScriptedPrompt::default(),
        true,
        WorkflowConfig::default(),
    ));

    let package_steps = package.step_names();
    assert!(package_steps.contains(&"build-package"));
    assert!(package_steps.contains(&"publish-package"));

    let extension_steps = extension.step_names();
    assert!(!extension_steps.contains(&"build-package"));
    assert!(!extension_steps.contains(&"publish-package"));
    assert_eq!(extension_steps.first(), Some(&"resolve-target"));
    assert_eq!(extension_steps.last(), Some(&"delete-releasing-branch"));
}
