/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes two top-level command modules:

- `download`: Save photos taken on or before a date to a local directory
- `delete`:   Remove photos taken on or before a date, after confirmation

Both handlers sign in, open the photo library, and hand it to the
selection pipeline. The `*_from` variants take any [`PhotoLibrary`] and a
[`Prompter`] so the command output can be exercised without a network.
*/

use crate::auth;
use crate::config::Config;
use crate::error::Result;
use crate::photos::PhotoLibrary;
use crate::pipeline::{self, CutoffDate, DeleteOutcome, RunOutcome};
use crate::prompt::{ConsolePrompter, Prompter};
use chrono::NaiveDate;
use colored::Colorize;
use std::path::Path;

/// Report creation-date failures after the per-action summary
fn report_undated(undated: usize) {
    if undated > 0 {
        let message = format!(
            "Skipped {} photos whose creation date could not be determined.",
            undated
        );
        println!("{}", message.yellow());
    }
}

// Download command handler
pub mod download {
    use super::*;

    /// Download every photo taken on or before `date` into `output_dir`
    ///
    /// # Errors
    ///
    /// Returns an error if sign-in fails, the library cannot be opened, or
    /// enumeration fails. Individual download failures are only reported.
    pub async fn run_download(config: Config, date: NaiveDate, output_dir: &Path) -> Result<()> {
        let mut prompter = ConsolePrompter::new()?;
        let session = auth::authenticate(&config.icloud, &mut prompter).await?;
        let library = session.photos()?;

        tracing::info!(
            account = session.account_name(),
            cutoff = %date,
            output_dir = %output_dir.display(),
            "Starting download"
        );
        download_from(&library, date, output_dir).await?;
        Ok(())
    }

    /// Closing line of a download run
    pub fn summary_line(outcome: &RunOutcome, output_dir: &Path) -> String {
        format!(
            "{} photos downloaded to '{}'.",
            outcome.succeeded,
            output_dir.display()
        )
    }

    /// Run the download pipeline against `library` and print the summary
    pub async fn download_from(
        library: &dyn PhotoLibrary,
        date: NaiveDate,
        output_dir: &Path,
    ) -> Result<RunOutcome> {
        let outcome = pipeline::download_all(library, CutoffDate::new(date), output_dir).await?;

        println!("{}", summary_line(&outcome, output_dir));
        if outcome.failed > 0 {
            let message = format!(
                "{} of {} matching photos failed to download.",
                outcome.failed, outcome.matched
            );
            println!("{}", message.yellow());
        }
        report_undated(outcome.undated);
        Ok(outcome)
    }
}

// Delete command handler
pub mod delete {
    use super::*;

    /// Delete every photo taken on or before `date`, after confirmation
    ///
    /// The same terminal prompter answers the verification-code prompt and
    /// the delete confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if sign-in fails, the library cannot be opened,
    /// enumeration fails, or the confirmation cannot be read.
    pub async fn run_delete(config: Config, date: NaiveDate) -> Result<()> {
        let mut prompter = ConsolePrompter::new()?;
        let session = auth::authenticate(&config.icloud, &mut prompter).await?;
        let library = session.photos()?;

        tracing::info!(account = session.account_name(), cutoff = %date, "Starting delete");
        delete_from(&library, date, &mut prompter).await?;
        Ok(())
    }

    /// Select, confirm and delete against `library`, printing the summary
    pub async fn delete_from(
        library: &dyn PhotoLibrary,
        date: NaiveDate,
        prompter: &mut dyn Prompter,
    ) -> Result<DeleteOutcome> {
        let selection = pipeline::select_matching(library.assets(), CutoffDate::new(date)).await?;
        let undated = selection.undated;
        let outcome = pipeline::delete_all(library, selection, prompter).await?;

        match &outcome {
            DeleteOutcome::Canceled { .. } => println!("{}", "Deletion canceled.".yellow()),
            DeleteOutcome::Completed(run) if run.matched > 0 => {
                println!("Deleted {} out of {} photos.", run.succeeded, run.matched);
            }
            DeleteOutcome::Completed(_) => {}
        }
        report_undated(undated);
        Ok(outcome)
    }
}
