//! Manual resolution flow for merge-back conflicts.

use super::{Services, WorkflowState};
use crate::error::{Result, WorkflowError};

/// Ask the operator to resolve a merge conflict by hand.
///
/// Presents the conflicting paths, then poses a confirmation defaulting to
/// false. Confirmed: the manually resolved branch is pushed and the run
/// continues. Declined: the run fails fatally without pushing. The prompt
/// is posed directly (not through the non-interactive bypass): an
/// unattended run cannot have resolved a conflict by hand, so its default
/// answer must be the declining one.
pub(super) async fn resolve_manually(
    services: &Services,
    state: &WorkflowState,
    source: &str,
    target: &str,
    details: &str,
) -> Result<()> {
    let output = &services.output;
    output.warn(&format!(
        "Merging '{source}' into '{target}' produced conflicts:"
    ));
    for line in details.lines() {
        output.indent(line);
    }
    output.info("Resolve the conflicts in the repository, commit the merge, then confirm.");

    let confirmed = services.prompt.confirm(
        "merge-conflict",
        "Has the merge been completed manually?",
        false,
    )?;

    if !confirmed {
        return Err(WorkflowError::Declined {
            reason: format!("merge of '{source}' into '{target}' was not resolved"),
        });
    }

    state.repo()?.push().await?;
    output.done(&format!("Pushed manually resolved merge into '{target}'"));
    Ok(())
}
