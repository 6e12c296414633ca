//! relpilot - release orchestration for git-hosted packages and extensions.

use relpilot::cli;
use relpilot::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false, false);
            output.error(&format!("Fatal error: {e}"));
            process::exit(1);
        }
    }
}
