//! Operator input for verification codes and delete confirmation
//!
//! Everything that reads a line from the operator goes through the
//! [`Prompter`] trait, so the login and delete flows can be driven by the
//! terminal ([`ConsolePrompter`]) or by canned answers ([`ScriptedPrompter`]).

use std::collections::VecDeque;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::{PhotosweepError, Result};

/// Source of single-line answers to operator prompts
pub trait Prompter {
    /// Show `prompt` and return the line entered, without the line ending
    ///
    /// # Errors
    ///
    /// Returns `PhotosweepError::Prompt` if input cannot be read.
    fn ask(&mut self, prompt: &str) -> Result<String>;
}

/// Terminal prompter backed by rustyline
///
/// End of input (Ctrl-D, or a closed pipe) reads as an empty answer;
/// Ctrl-C is an error.
pub struct ConsolePrompter {
    editor: DefaultEditor,
}

impl ConsolePrompter {
    /// Create a prompter attached to the process terminal
    ///
    /// # Errors
    ///
    /// Returns an error if the line editor cannot be initialized.
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new()
            .map_err(|e| PhotosweepError::Prompt(format!("Failed to open terminal: {}", e)))?;
        Ok(Self { editor })
    }
}

/// Run blocking terminal input without stalling other runtime workers
///
/// `block_in_place` is only available on the multi-threaded runtime; outside
/// it (or outside any runtime) the call runs directly.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle)
            if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread =>
        {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

impl Prompter for ConsolePrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        let editor = &mut self.editor;
        match run_blocking(|| editor.readline(prompt)) {
            Ok(line) => Ok(line),
            Err(ReadlineError::Eof) => Ok(String::new()),
            Err(ReadlineError::Interrupted) => {
                Err(PhotosweepError::Prompt("Interrupted".to_string()).into())
            }
            Err(e) => Err(PhotosweepError::Prompt(e.to_string()).into()),
        }
    }
}

/// Prompter that replays a fixed list of answers
///
/// Every prompt shown is recorded so tests can assert on how often and
/// what the operator was asked.
///
/// # Examples
///
/// ```
/// use photosweep::prompt::{Prompter, ScriptedPrompter};
///
/// let mut prompter = ScriptedPrompter::new(["123456"]);
/// assert_eq!(prompter.ask("Enter the 2FA code: ").unwrap(), "123456");
/// assert_eq!(prompter.prompts(), ["Enter the 2FA code: "]);
/// assert!(prompter.ask("again? ").is_err());
/// ```
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedPrompter {
    /// Create a prompter answering with `answers` in order
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Prompts shown so far, in order
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().ok_or_else(|| {
            PhotosweepError::Prompt(format!("No scripted answer for prompt: {}", prompt)).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_prompter_replays_in_order() {
        let mut prompter = ScriptedPrompter::new(vec!["first", "second"]);
        assert_eq!(prompter.ask("a").unwrap(), "first");
        assert_eq!(prompter.ask("b").unwrap(), "second");
        assert_eq!(prompter.prompts(), ["a", "b"]);
    }

    #[test]
    fn test_run_blocking_outside_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[tokio::test]
    async fn test_run_blocking_on_current_thread_runtime() {
        assert_eq!(run_blocking(|| "line".to_string()), "line");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_blocking_on_multi_thread_runtime() {
        assert_eq!(run_blocking(|| 42), 42);
    }

    #[test]
    fn test_scripted_prompter_exhausted_is_prompt_error() {
        let mut prompter = ScriptedPrompter::default();
        let err = prompter.ask("confirm? ").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PhotosweepError>(),
            Some(PhotosweepError::Prompt(_))
        ));
        assert_eq!(prompter.prompts().len(), 1);
    }
}
