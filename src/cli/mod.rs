//! Command line interface for relpilot.
//!
//! Wires the parsed arguments into a configured workflow engine: target
//! resolver, gateway provider, prompt provider and confirmation gate, then
//! runs the pipeline and maps the outcome to an exit code.

mod args;
mod output;

pub use args::Args;
pub use output::OutputManager;

use crate::error::{Result, WorkflowError};
use crate::prompt::{ConfirmationGate, Prompt, ScriptedPrompt, TerminalPrompt};
use crate::target::{ExtensionResolver, PackageResolver, TargetResolver};
use crate::workflow::{DefaultGatewayProvider, Services, WorkflowEngine};
use crate::WorkflowConfig;
use std::path::PathBuf;

/// Exit code for a run aborted at a checkpoint rather than by a failure
const EXIT_DECLINED: i32 = 2;

/// Exit code for inconsistent arguments (sysexits EX_USAGE)
const EXIT_USAGE: i32 = 64;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    if let Err(message) = args.validate() {
        let output = OutputManager::new(false, false);
        output.error(&message);
        return Ok(EXIT_USAGE);
    }
    execute(args).await
}

async fn execute(args: Args) -> Result<i32> {
    let output = OutputManager::new(args.verbose, args.quiet);

    let token = args
        .token
        .clone()
        .or_else(|| std::env::var("GH_TOKEN").ok());

    let config = WorkflowConfig {
        base_branch: args.base_branch.clone(),
        release_branch: args.release_branch.clone(),
        branch_prefix: args.branch_prefix.clone(),
        version_to_release: args.release_version.clone(),
        build_command: args.build_command.clone(),
        release_comment: args.comment.clone(),
        auth_token: token,
    };

    let prompt: Box<dyn Prompt> = if args.non_interactive {
        Box::new(ScriptedPrompt::default())
    } else {
        Box::new(TerminalPrompt)
    };

    let search_root = search_root(&args)?;
    let resolver: Box<dyn TargetResolver> = match &args.instance {
        Some(root) => Box::new(ExtensionResolver::new(
            root.clone(),
            args.extension.clone(),
            args.www_user.clone(),
        )),
        None => Box::new(PackageResolver::new(search_root.clone())),
    };

    let services = Services {
        resolver,
        gateways: Box::new(DefaultGatewayProvider {
            origin: args.remote.clone(),
        }),
        prompt,
        gate: ConfirmationGate::new(!args.non_interactive),
        output: output.clone(),
        config,
    };

    let engine = if args.instance.is_some() {
        WorkflowEngine::for_extension(services)
    } else {
        WorkflowEngine::for_package(services)
    };

    match engine.run(search_root).await {
        Ok(report) => {
            if !report.warnings.is_empty() {
                output.warn(&format!(
                    "Release finished with {} warning(s)",
                    report.warnings.len()
                ));
            }
            Ok(0)
        }
        Err(WorkflowError::Declined { reason }) => {
            output.warn(&format!("Release aborted: {reason}"));
            Ok(EXIT_DECLINED)
        }
        Err(err) => Err(err),
    }
}

/// Root directory the run operates from
fn search_root(args: &Args) -> Result<PathBuf> {
    if let Some(instance) = &args.instance {
        return Ok(instance.clone());
    }
    if let Some(path) = &args.path {
        return Ok(path.clone());
    }
    Ok(std::env::current_dir()?)
}
