//! Stashing local edits that block a checkout or merge.

use crate::git::{GitError, VersionControl};
use crate::output;
use crate::prompt::Prompter;

/// Git identity keys a stash needs, with the wording used when asking.
const IDENTITY_KEYS: [(&str, &str); 2] = [
    ("user.name", "user name"),
    ("user.email", "user e-mail address"),
];

/// Result of offering to stash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StashOutcome {
    pub stashed: bool,
    /// Diff of the new stash entry; empty when nothing was stashed.
    pub diff: String,
}

impl StashOutcome {
    fn failed() -> Self {
        Self::default()
    }
}

/// Offers to stash uncommitted changes so a blocked operation can be retried.
///
/// Declining, or any git failure, yields `stashed == false` and leaves the
/// working tree untouched. Only prompt I/O errors are returned as `Err`.
pub fn stash_changes(
    repo: &dyn VersionControl,
    prompter: &mut dyn Prompter,
) -> anyhow::Result<StashOutcome> {
    output::print_stash_explanation();
    let answer =
        prompter.confirm("Would you like to stash local changes? (Required to continue)")?;
    if !answer.accepted() {
        output::warning(
            "Changes are not stashed, cannot continue without stashing. Aborting update.",
        );
        return Ok(StashOutcome::failed());
    }

    output::status("Attempting to stash any changes.");
    if let Err(e) = ensure_identity(repo, prompter)? {
        output::failure("Unable to configure a git identity, which stashing requires.");
        output::command_error(&e);
        return Ok(StashOutcome::failed());
    }

    match repo.stash() {
        Ok(true) => {}
        Ok(false) => {
            output::status("There were no local changes to stash.");
            return Ok(StashOutcome {
                stashed: true,
                diff: String::new(),
            });
        }
        Err(e) => {
            output::command_error(&e);
            output::failure(
                "Unable to stash, don't want to overwrite your stuff, aborting this branch update.",
            );
            return Ok(StashOutcome::failed());
        }
    }

    let diff = match repo.stash_show_latest() {
        Ok(diff) => diff,
        Err(e) => {
            output::warning("Stashed, but could not show the stashed changes.");
            output::command_error(&e);
            String::new()
        }
    };
    output::print_stash_report(&diff);

    Ok(StashOutcome {
        stashed: true,
        diff,
    })
}

/// Sets a global git user name and e-mail when either is missing.
///
/// The outer `Result` carries prompt failures; the inner one git failures.
fn ensure_identity(
    repo: &dyn VersionControl,
    prompter: &mut dyn Prompter,
) -> anyhow::Result<Result<(), GitError>> {
    for (key, description) in IDENTITY_KEYS {
        match repo.config_get(key) {
            Ok(Some(_)) => continue,
            Ok(None) => {}
            Err(e) => return Ok(Err(e)),
        }

        output::warning(&format!(
            "No {description} set for git, which is necessary to stash."
        ));
        let value = loop {
            let answer = prompter.input(&format!(
                "Please enter a global {description} for git on this system"
            ))?;
            let answer = answer.trim();
            if !answer.is_empty() {
                break answer.to_string();
            }
        };
        if let Err(e) = repo.config_set_global(key, &value) {
            return Ok(Err(e));
        }
    }
    Ok(Ok(()))
}
