//! Spinners, colored output, and summary formatting.
//!
//! Everything the updater prints goes through this module so the decision
//! logic in `repo`, `stash` and `updater` stays free of formatting.

use crate::config::Config;
use crate::git::{CommitInfo, GitError};
use crate::repo::SyncOutcome;
use chrono::{Local, TimeZone};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner tick interval in milliseconds.
const PROGRESS_TICK_MS: u64 = 80;

const RULE_WIDTH: usize = 66;

/// Spinner shown while a blocking command runs.
/// Uses `Option` so nothing is drawn in verbose mode, where git commands are
/// echoed instead.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    #[must_use]
    pub fn start(config: &Config, message: &str) -> Self {
        if config.is_verbose() {
            eprintln!("  {}...", message.dimmed());
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.cyan} {msg}")
        {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));
        Self { bar: Some(bar) }
    }

    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Runs `f` behind a spinner, clearing it before returning.
pub fn with_spinner<T>(config: &Config, message: &str, f: impl FnOnce() -> T) -> T {
    let spinner = Spinner::start(config, message);
    let result = f();
    spinner.finish();
    result
}

pub fn print_banner() {
    let rule = "#".repeat(54).cyan();
    println!("{rule}");
    println!("{}", centered("Welcome to the BrewPi Updater!", 54).bold());
    println!("{rule}\n");
}

pub fn print_section(title: &str) {
    println!("\n\n{}", format!("*** {title} ***").cyan().bold());
}

pub fn status(message: &str) {
    println!("{message}");
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message.yellow());
}

pub fn failure(message: &str) {
    eprintln!("{} {}", "✗".red(), message.red());
}

/// Shows git's own message for a failed command.
pub fn command_error(error: &GitError) {
    let text = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    for line in text.lines() {
        eprintln!("    {}", line.dimmed());
    }
}

/// Prints output of a git command that succeeded, when it said anything.
pub fn command_output(text: &str) {
    if !text.trim().is_empty() {
        println!("{text}");
    }
}

/// Prints `[i] item` lines followed by the skip entry at index `items.len()`.
pub fn print_options(heading: &str, items: &[String]) {
    println!("\n{}", heading.bold());
    for line in format_options(items) {
        println!("{line}");
    }
}

fn format_options(items: &[String]) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("[{i}] {item}"))
        .chain(std::iter::once(format!(
            "[{}] Skip updating this repository.",
            items.len()
        )))
        .collect()
}

/// Renders a commit time in local time, e.g. `Tue, 02 Jan 2024 13:45:00`.
#[must_use]
pub fn format_timestamp(seconds: i64) -> String {
    match Local.timestamp_opt(seconds, 0).single() {
        Some(time) => time.format("%a, %d %b %Y %H:%M:%S").to_string(),
        None => format!("@{seconds}"),
    }
}

pub fn print_commit_comparison(
    local_name: &str,
    local: &CommitInfo,
    remote_name: &str,
    remote: &CommitInfo,
) {
    let width = local_name.len().max(remote_name.len());
    println!(
        "The latest commit in {:<width$} is {} on {}",
        local_name,
        local.hash.yellow(),
        format_timestamp(local.committed_at)
    );
    println!(
        "The latest commit on {:<width$} is {} on {}",
        remote_name,
        remote.hash.yellow(),
        format_timestamp(remote.committed_at)
    );
}

pub fn print_stash_explanation() {
    println!(
        "\nYou have local changes in this repository that prevent a successful merge.\n\
         These changes can be stashed to bring your repository back to its original\n\
         state so we can merge.\n\
         Your changes are not lost, but saved on the stash. You can (optionally) get\n\
         them back later with 'git stash pop'."
    );
}

pub fn print_stash_report(diff: &str) {
    let rule = "-".repeat(RULE_WIDTH).dimmed();
    success("Stash successful.");
    println!(
        "{}",
        "Your local changes were in conflict with the last update of code."
            .yellow()
            .bold()
    );
    println!("The conflict was:\n{rule}");
    println!("{diff}");
    println!("{rule}");
    println!(
        "To make merging possible, these changes were stashed.\n\
         To merge the changes back in, you can use 'git stash pop'.\n\
         Only do this if you really know what you are doing. Your\n\
         changes might be incompatible with the update or could\n\
         cause a new merge conflict."
    );
}

pub fn print_summary(results: &[(&str, Option<&SyncOutcome>)]) {
    println!("\n{}", "Summary".cyan().bold());
    for (label, outcome) in results {
        let text = match outcome {
            Some(outcome) => describe(outcome),
            None => "not found".red().to_string(),
        };
        println!("  {:<24} {}", label, text);
    }
}

fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Updated { .. } => "updated".green().to_string(),
        SyncOutcome::UpToDate { switched_to: None } => "up to date".normal().to_string(),
        SyncOutcome::UpToDate {
            switched_to: Some(branch),
        } => format!("switched to {branch}").green().to_string(),
        SyncOutcome::NotMerged {
            switched_to,
            reason,
        } => match switched_to {
            Some(branch) => format!("switched to {branch}, not merged: {reason}")
                .yellow()
                .to_string(),
            None => format!("not merged: {reason}").yellow().to_string(),
        },
        SyncOutcome::Skipped => "skipped".dimmed().to_string(),
        SyncOutcome::Aborted { reason } => format!("failed: {reason}").red().to_string(),
    }
}

fn centered(text: &str, width: usize) -> String {
    let padding = width.saturating_sub(text.len()) / 2;
    format!("{:>w$}", text, w = padding + text.len())
}
