// Branch selection, update decision, and merge logic for one repository

use crate::config::Config;
use crate::constants::{MASTER_BRANCH, MAX_BLOCKED_ATTEMPTS, is_stable_branch};
use crate::git::{GitError, Remote, RemoteBranch, VersionControl};
use crate::output;
use crate::prompt::{Choice, Prompter, choose};
use crate::stash;

/// What a synchronization pass settled on before touching the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDecision {
    pub local_branch: String,
    pub remote: String,
    pub remote_branch: RemoteBranch,
    pub needs_checkout: bool,
    /// Known only once the branch is in place and commit times are compared.
    pub needs_update: bool,
}

/// How a synchronization pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Newer upstream commits were merged.
    Updated { switched_to: Option<String> },
    /// Local HEAD is at least as recent as the remote branch.
    UpToDate { switched_to: Option<String> },
    /// An update was available but was declined or could not be merged.
    NotMerged {
        switched_to: Option<String>,
        reason: String,
    },
    /// The operator chose to leave this repository alone.
    Skipped,
    /// Nothing was changed because a step failed.
    Aborted { reason: String },
}

impl SyncOutcome {
    /// True when the working tree moved: a branch switch or a merge.
    #[must_use]
    pub fn changed(&self) -> bool {
        match self {
            SyncOutcome::Updated { .. } => true,
            SyncOutcome::UpToDate { switched_to } | SyncOutcome::NotMerged { switched_to, .. } => {
                switched_to.is_some()
            }
            SyncOutcome::Skipped | SyncOutcome::Aborted { .. } => false,
        }
    }

    fn aborted(reason: impl Into<String>) -> Self {
        SyncOutcome::Aborted {
            reason: reason.into(),
        }
    }

    /// A failure after a possible branch switch; the switch still counts.
    fn failed_after(switched_to: Option<String>, reason: impl Into<String>) -> Self {
        match switched_to {
            Some(_) => SyncOutcome::NotMerged {
                switched_to,
                reason: reason.into(),
            },
            None => SyncOutcome::aborted(reason),
        }
    }
}

/// Result of an operation that may be retried once after stashing.
#[derive(Debug)]
enum Attempt {
    Succeeded(String),
    /// Local edits were in the way and the operator did not stash them.
    NotStashed,
    Failed(GitError),
}

/// Runs `op`, stashing and retrying when local edits block it. Gives up
/// after [`MAX_BLOCKED_ATTEMPTS`] tries or on any other failure.
fn retry_after_stash(
    repo: &dyn VersionControl,
    prompter: &mut dyn Prompter,
    retry_message: &str,
    op: impl Fn() -> Result<String, GitError>,
) -> anyhow::Result<Attempt> {
    let mut attempt = 1;
    loop {
        let error = match op() {
            Ok(out) => return Ok(Attempt::Succeeded(out)),
            Err(e) => e,
        };
        if attempt >= MAX_BLOCKED_ATTEMPTS || !error.is_blocked_by_local_changes() {
            return Ok(Attempt::Failed(error));
        }

        output::command_error(&error);
        if !stash::stash_changes(repo, prompter)?.stashed {
            return Ok(Attempt::NotStashed);
        }
        output::status(retry_message);
        attempt += 1;
    }
}

/// Checks `repo` against its remote and applies an update if the operator
/// agrees.
///
/// Git failures end the pass with [`SyncOutcome::Aborted`] or
/// [`SyncOutcome::NotMerged`]; only prompt I/O errors are returned as `Err`.
pub fn check_repo(
    repo: &dyn VersionControl,
    prompter: &mut dyn Prompter,
    config: &Config,
) -> anyhow::Result<SyncOutcome> {
    let work_dir = repo.work_dir().display().to_string();

    let local_branch = match repo.current_branch() {
        Ok(branch) => branch,
        Err(e) => {
            output::command_error(&e);
            output::failure("Could not determine the active branch. Aborting.");
            return Ok(SyncOutcome::aborted("could not read the active branch"));
        }
    };
    output::status(&format!("You are on branch {local_branch}"));

    let mut target = local_branch.clone();
    if !is_stable_branch(&local_branch) && !config.is_interactive() {
        output::warning(&format!(
            "Your checked out branch is not {MASTER_BRANCH}, our stable release branch."
        ));
        output::status(&format!(
            "It is highly recommended that you switch to the stable {MASTER_BRANCH} branch."
        ));
        if prompter.confirm("Would you like to do that?")?.accepted() {
            output::status(&format!("Switching branch to {MASTER_BRANCH}."));
            target = MASTER_BRANCH.to_string();
        }
    }

    let remotes = match repo.remotes() {
        Ok(remotes) if !remotes.is_empty() => remotes,
        Ok(_) => {
            output::failure(&format!("No remotes are configured for {work_dir}. Aborting."));
            return Ok(SyncOutcome::aborted("no remotes configured"));
        }
        Err(e) => {
            output::command_error(&e);
            return Ok(SyncOutcome::aborted("could not list remotes"));
        }
    };
    let Some(remote) = select_remote(&remotes, &work_dir, prompter, config)? else {
        return Ok(SyncOutcome::Skipped);
    };

    let fetched = output::with_spinner(
        config,
        &format!("Fetching from {}", remote.name),
        || repo.fetch_prune(&remote.name),
    );
    if let Err(e) = fetched {
        output::command_error(&e);
        output::failure(&format!("Failed to fetch from {}. Aborting.", remote.name));
        return Ok(SyncOutcome::aborted(format!("fetch from {} failed", remote.name)));
    }

    let branches = match repo.remote_branches(&remote.name) {
        Ok(branches) => branches,
        Err(e) => {
            output::command_error(&e);
            output::failure(&format!(
                "Failed to get references from remote. Aborting update of {work_dir}"
            ));
            return Ok(SyncOutcome::aborted("could not list remote branches"));
        }
    };
    let Some(selected) = select_remote_branch(
        &branches,
        &remote,
        &target,
        &local_branch,
        &work_dir,
        prompter,
        config,
    )?
    else {
        return Ok(SyncOutcome::Skipped);
    };
    let Some(remote_branch) = selected.map(|i| branches[i].clone()) else {
        output::failure(&format!(
            "Could not find branch {target} on remote {}. Aborting.",
            remote.name
        ));
        return Ok(SyncOutcome::aborted(format!(
            "branch {target} not found on {}",
            remote.name
        )));
    };

    let mut decision = SyncDecision {
        needs_checkout: remote_branch.name != local_branch,
        local_branch,
        remote: remote.name.clone(),
        remote_branch,
        needs_update: false,
    };

    let mut switched_to = None;
    if decision.needs_checkout {
        let branch = decision.remote_branch.name.clone();
        output::status(&format!(
            "The {branch} branch is not your currently active branch."
        ));
        if !prompter
            .confirm("Would you like me to check it out for you now? (Required to continue)")?
            .accepted()
        {
            output::status("Skipping this branch.");
            return Ok(SyncOutcome::Skipped);
        }
        if let Err(reason) = switch_branch(repo, prompter, &decision.remote_branch)? {
            return Ok(SyncOutcome::aborted(reason));
        }
        switched_to = Some(branch);
    }

    let local = match repo.head_commit() {
        Ok(commit) => commit,
        Err(e) => {
            output::command_error(&e);
            return Ok(SyncOutcome::failed_after(
                switched_to,
                "could not read the local commit",
            ));
        }
    };
    let remote_full = decision.remote_branch.full_name();
    output::print_commit_comparison(
        &work_dir,
        &local,
        &remote_full,
        &decision.remote_branch.commit,
    );

    // Wall-clock comparison, not ancestry: a newer local commit counts as
    // up to date even when it does not contain the remote tip.
    decision.needs_update = local.committed_at < decision.remote_branch.commit.committed_at;
    if !decision.needs_update {
        output::success(&format!("Your local version of {work_dir} is up to date."));
        return Ok(SyncOutcome::UpToDate { switched_to });
    }

    output::warning("*** Updates are available ***");
    if !prompter
        .confirm(&format!("Would you like to update {work_dir} from {remote_full}?"))?
        .accepted()
    {
        return Ok(SyncOutcome::NotMerged {
            switched_to,
            reason: "update declined".to_string(),
        });
    }

    if update_repo(
        repo,
        prompter,
        config,
        &decision.remote,
        &decision.remote_branch.name,
    )? {
        Ok(SyncOutcome::Updated { switched_to })
    } else {
        Ok(SyncOutcome::NotMerged {
            switched_to,
            reason: "merge failed".to_string(),
        })
    }
}

/// Merges `remote/branch` into the active branch.
///
/// Local edits that block the merge are stashed (with consent) and the merge
/// is retried exactly once. Returns whether the merge landed.
pub fn update_repo(
    repo: &dyn VersionControl,
    prompter: &mut dyn Prompter,
    config: &Config,
    remote: &str,
    branch: &str,
) -> anyhow::Result<bool> {
    let fetched = output::with_spinner(config, &format!("Fetching {remote}/{branch}"), || {
        repo.fetch_branch(remote, branch)
    });
    if let Err(e) = fetched {
        output::command_error(&e);
        output::failure(&format!("Failed to fetch {remote}/{branch}. Aborting."));
        return Ok(false);
    }

    let upstream = format!("{remote}/{branch}");
    match retry_after_stash(repo, prompter, "Trying to merge again.", || {
        repo.merge(&upstream)
    })? {
        Attempt::Succeeded(out) => {
            output::command_output(&out);
            output::success(&format!("{branch} updated."));
            Ok(true)
        }
        Attempt::NotStashed => Ok(false),
        Attempt::Failed(e) => {
            output::command_error(&e);
            if e.is_blocked_by_local_changes() {
                output::failure(
                    "Sorry, cannot automatically stash/discard local changes. Aborting.",
                );
            } else {
                output::failure(&format!("Merging {upstream} failed. Aborting."));
            }
            if let Err(abort) = repo.abort_merge() {
                output::warning("Could not abort the unfinished merge.");
                output::command_error(&abort);
            }
            Ok(false)
        }
    }
}

/// Picks the remote to update from. `None` means the operator skipped.
fn select_remote(
    remotes: &[Remote],
    work_dir: &str,
    prompter: &mut dyn Prompter,
    config: &Config,
) -> anyhow::Result<Option<Remote>> {
    let default = &remotes[0];
    if !config.is_interactive() || remotes.len() == 1 {
        return Ok(Some(default.clone()));
    }

    let names: Vec<String> = remotes.iter().map(|r| r.name.clone()).collect();
    output::print_options(&format!("Multiple remotes found in {work_dir}"), &names);
    let prompt = format!("From which remote do you want to update? [{}]", default.name);
    match choose(prompter, &prompt, remotes.len())? {
        Choice::Default => {
            output::status(&format!("Updating from default remote {}.", default.name));
            Ok(Some(default.clone()))
        }
        Choice::Index(i) => Ok(Some(remotes[i].clone())),
        Choice::Skip => Ok(None),
    }
}

/// Finds the branch matching `target`, letting the operator override it in
/// interactive mode. The outer `None` means skip; the inner `None` means no
/// branch matched.
fn select_remote_branch(
    branches: &[RemoteBranch],
    remote: &Remote,
    target: &str,
    local_branch: &str,
    work_dir: &str,
    prompter: &mut dyn Prompter,
    config: &Config,
) -> anyhow::Result<Option<Option<usize>>> {
    let matching = branches.iter().position(|b| b.name == target);
    if !config.is_interactive() {
        return Ok(Some(matching));
    }

    let names: Vec<String> = branches.iter().map(|b| b.name.clone()).collect();
    output::print_options(
        &format!(
            "Available branches on the remote '{}' for {work_dir}:",
            remote.name
        ),
        &names,
    );
    let prompt = format!("Enter the number of the branch you wish to update [{local_branch}]");
    match choose(prompter, &prompt, branches.len())? {
        Choice::Default => {
            output::status(&format!("Keeping current branch {local_branch}"));
            Ok(Some(matching))
        }
        Choice::Index(i) => Ok(Some(Some(i))),
        Choice::Skip => Ok(None),
    }
}

/// Switches to the branch behind `remote_branch`, creating a tracking branch
/// when it does not exist locally. `Err` carries the reason it failed.
fn switch_branch(
    repo: &dyn VersionControl,
    prompter: &mut dyn Prompter,
    remote_branch: &RemoteBranch,
) -> anyhow::Result<Result<(), String>> {
    let branch = &remote_branch.name;
    let upstream = remote_branch.full_name();

    let exists = match repo.has_local_branch(branch) {
        Ok(exists) => exists,
        Err(e) => {
            output::command_error(&e);
            return Ok(Err(format!("could not inspect local branch {branch}")));
        }
    };

    let attempt = retry_after_stash(repo, prompter, "Trying to checkout again.", || {
        if exists {
            repo.checkout(branch)
        } else {
            repo.checkout_tracking(branch, &upstream)
        }
    })?;

    match attempt {
        Attempt::Succeeded(out) => {
            output::command_output(&out);
            output::success(&format!("Successfully switched to {branch}"));
            Ok(Ok(()))
        }
        Attempt::NotStashed => Ok(Err(format!("local changes block checkout of {branch}"))),
        Attempt::Failed(e) => {
            output::command_error(&e);
            output::failure(
                "I was unable to checkout. Please try it manually from the command line and re-run this tool.",
            );
            Ok(Err(format!("checkout of {branch} failed")))
        }
    }
}
