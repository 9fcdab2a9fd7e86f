//! Terminal progress bars and the truncate prompt.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use ora_pg_sync::{Confirmation, CopyOutcome, ProgressSink, RowError};
use tracing::warn;

/// The exact answer that allows a truncate.
pub const TRUNCATE_ANSWER: &str = "yes, please!";

/// One progress bar per table; a spinner when the row count is unknown.
#[derive(Default)]
pub struct ConsoleProgress {
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ConsoleProgress {
    fn bar(&self, table: &str) -> Option<ProgressBar> {
        self.bars.lock().ok()?.get(table).cloned()
    }
}

impl ProgressSink for ConsoleProgress {
    fn table_started(&self, table: &str, expected_rows: Option<u64>) {
        let bar = match expected_rows {
            Some(total) => {
                let bar = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template(
                    "{prefix:20} [{bar:30}] {pos}/{len} rows {percent:>3}% ({per_sec}, {eta})",
                ) {
                    bar.set_style(style.progress_chars("=>-"));
                }
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template("{prefix:20} {spinner} {pos} rows ({per_sec})") {
                    bar.set_style(style);
                }
                bar.enable_steady_tick(Duration::from_millis(120));
                bar
            }
        };
        bar.set_prefix(table.to_string());
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(table.to_string(), bar);
        }
    }

    fn rows_processed(&self, table: &str, rows: u64) {
        if let Some(bar) = self.bar(table) {
            bar.inc(rows);
        }
    }

    fn row_failed(&self, table: &str, error: &RowError) {
        let line = format!("{}: row {} has error {}", table, error.offset, error.reason);
        match self.bar(table) {
            Some(bar) => bar.println(line),
            None => eprintln!("{}", line),
        }
    }

    fn table_finished(&self, outcome: &CopyOutcome) {
        let bar = self.bars.lock().ok().and_then(|mut b| b.remove(&outcome.table));
        match (bar, &outcome.skipped) {
            (Some(bar), _) => bar.finish_with_message(format!("{} loaded", outcome.rows_loaded)),
            (None, Some(reason)) => eprintln!("{}: skipped ({})", outcome.table, reason),
            (None, None) => {}
        }
    }
}

/// Asks the operator on the terminal before truncating.
pub struct PromptConfirmation;

impl Confirmation for PromptConfirmation {
    fn confirm_truncate(&self, tables: &[String]) -> bool {
        println!("{}", "*".repeat(80));
        println!("Tables to truncate: {}", tables.join(", "));
        let answer: String = match Input::new()
            .with_prompt(format!("Truncate tables before copy? type \"{}\"", TRUNCATE_ANSWER))
            .allow_empty(true)
            .interact_text()
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Truncate prompt failed: {}", e);
                return false;
            }
        };
        answer == TRUNCATE_ANSWER
    }
}
