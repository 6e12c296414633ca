//! Operator prompts and the confirmation gate.
//!
//! Steps never talk to the terminal directly: they go through the
//! [`Prompt`] trait so a non-interactive resolver (or a scripted one in
//! tests) can stand in, and through [`ConfirmationGate`] so the
//! non-interactive bypass always leaves an audit message.

use crate::cli::OutputManager;
use crate::error::{PromptError, Result};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Yes/no and selection prompts posed to the operator.
///
/// Implementations may block on the terminal; the workflow is strictly
/// sequential, so a blocking prompt is a legitimate suspension point.
pub trait Prompt: Send + Sync {
    /// Pose a yes/no question
    fn confirm(&self, name: &str, message: &str, default: bool) -> Result<bool>;

    /// Pose a single-choice selection
    fn select(&self, name: &str, message: &str, options: &[String]) -> Result<String>;
}

/// Interactive prompt provider backed by the terminal
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn confirm(&self, name: &str, message: &str, default: bool) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(message)
            .default(default)
            .interact()
            .map_err(|e| {
                PromptError::Interaction {
                    name: name.to_string(),
                    reason: e.to_string(),
                }
                .into()
            })
    }

    fn select(&self, name: &str, message: &str, options: &[String]) -> Result<String> {
        let index = dialoguer::Select::new()
            .with_prompt(message)
            .items(options)
            .default(0)
            .interact()
            .map_err(|e| PromptError::Interaction {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(options[index].clone())
    }
}

/// Non-interactive default resolver.
///
/// Answers confirmations with scripted values (falling back to the prompt
/// default) and selections with scripted values (falling back to the first
/// option). This is the substitutable prompt provider used by tests and by
/// callers embedding the engine without a terminal.
#[derive(Default)]
pub struct ScriptedPrompt {
    confirms: Mutex<VecDeque<bool>>,
    selections: Mutex<VecDeque<String>>,
}

impl ScriptedPrompt {
    /// Queue answers for upcoming confirmations
    pub fn with_confirms(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            confirms: Mutex::new(answers.into_iter().collect()),
            selections: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue an answer for an upcoming selection
    pub fn push_selection(&self, answer: impl Into<String>) {
        self.selections
            .lock()
            .expect("prompt queue poisoned")
            .push_back(answer.into());
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&self, _name: &str, _message: &str, default: bool) -> Result<bool> {
        Ok(self
            .confirms
            .lock()
            .expect("prompt queue poisoned")
            .pop_front()
            .unwrap_or(default))
    }

    fn select(&self, name: &str, _message: &str, options: &[String]) -> Result<String> {
        if let Some(scripted) = self
            .selections
            .lock()
            .expect("prompt queue poisoned")
            .pop_front()
        {
            return Ok(scripted);
        }
        options.first().cloned().ok_or_else(|| {
            PromptError::NonInteractive {
                name: name.to_string(),
            }
            .into()
        })
    }
}

/// Checkpoint wrapper around a yes/no decision.
///
/// When the engine is non-interactive the prompt is skipped and treated as
/// auto-confirmed, but an informational message still documents the
/// decision for the operator's audit trail.
pub struct ConfirmationGate {
    interactive: bool,
}

impl ConfirmationGate {
    /// Create a gate; `interactive = false` bypasses every checkpoint
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }

    /// Whether checkpoints actually prompt
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Pose a checkpoint question, or auto-confirm when non-interactive
    pub fn confirm(
        &self,
        prompt: &dyn Prompt,
        output: &OutputManager,
        name: &str,
        message: &str,
        default: bool,
    ) -> Result<bool> {
        if !self.interactive {
            output.info(&format!("{name}: auto-confirmed (non-interactive)"));
            return Ok(true);
        }
        prompt.confirm(name, message, default)
    }
}
