//! Git command wrappers.
//!
//! This module provides a thin wrapper around git CLI commands, handling
//! command execution and error formatting. [`VersionControl`] is the seam
//! the rest of the crate talks to; [`GitRepo`] implements it by shelling
//! out to `git` in a working tree.

use crate::config::Config;
use crate::constants::{LATEST_STASH, LOCAL_CHANGES_MARKER, NOTHING_TO_STASH, REMOTE_HEAD};
use colored::Colorize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Callback invoked with the working tree and arguments of every git command.
pub type GitLogger = fn(&Path, &[&str]);

/// Echoes each git command to stderr before it runs.
pub fn verbose_logger(repo: &Path, args: &[&str]) {
    eprintln!(
        "  {} {}",
        format!("[{}]", repo.display()).dimmed(),
        format!("git {}", args.join(" ")).dimmed()
    );
}

pub fn no_op_logger(_repo: &Path, _args: &[&str]) {}

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Failed to spawn git command: {0}")]
    Spawn(#[source] std::io::Error),

    /// Git ran and exited non-zero. `message` is git's own text, verbatim.
    #[error("git {command} failed: {message}")]
    Command { command: String, message: String },

    #[error("Invalid ref name: {0:?}")]
    InvalidRef(String),

    #[error("Unexpected git output: {0:?}")]
    Parse(String),
}

impl GitError {
    /// Git's message for a failed command, if git ran at all.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            GitError::Command { message, .. } => Some(message),
            _ => None,
        }
    }

    /// True when the command was refused because uncommitted edits would be
    /// clobbered, which a stash can resolve.
    #[must_use]
    pub fn is_blocked_by_local_changes(&self) -> bool {
        self.message()
            .is_some_and(|message| message.contains(LOCAL_CHANGES_MARKER))
    }
}

pub fn run_git(repo: &Path, config: &Config, args: &[&str]) -> Result<String, GitError> {
    (config.git_logger())(repo, args);

    let output = std::process::Command::new("git")
        .current_dir(repo)
        .args(args)
        .output()
        .map_err(GitError::Spawn)?;

    if output.status.success() {
        let result = String::from_utf8_lossy(&output.stdout);
        Ok(result.trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        Err(GitError::Command {
            command: args.join(" "),
            message,
        })
    }
}

fn validate_ref_name(name: &str) -> Result<(), GitError> {
    if name.is_empty()
        || name.starts_with('-')
        || name.contains('\0')
        || name.contains('\n')
        || name.contains(char::is_whitespace)
    {
        return Err(GitError::InvalidRef(name.to_string()));
    }
    Ok(())
}

/// Hash and committer time of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    /// Committer timestamp, seconds since the Unix epoch.
    pub committed_at: i64,
}

/// A configured remote, in the order it appears in the git config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

/// A remote-tracking branch such as `origin/master`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    pub remote: String,
    /// Branch name relative to the remote, e.g. `master`.
    pub name: String,
    pub commit: CommitInfo,
}

impl RemoteBranch {
    /// `remote/branch`, the form git accepts for merge and checkout.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.remote, self.name)
    }
}

/// The git operations the updater relies on.
///
/// Every failure is a [`GitError`]; callers decide whether it is
/// recoverable.
pub trait VersionControl {
    fn work_dir(&self) -> &Path;
    fn current_branch(&self) -> Result<String, GitError>;
    fn remotes(&self) -> Result<Vec<Remote>, GitError>;
    /// Remote-tracking branches of `remote`, without the symbolic HEAD.
    fn remote_branches(&self, remote: &str) -> Result<Vec<RemoteBranch>, GitError>;
    fn head_commit(&self) -> Result<CommitInfo, GitError>;
    fn has_local_branch(&self, branch: &str) -> Result<bool, GitError>;
    fn fetch_prune(&self, remote: &str) -> Result<(), GitError>;
    fn fetch_branch(&self, remote: &str, branch: &str) -> Result<(), GitError>;
    fn merge(&self, upstream: &str) -> Result<String, GitError>;
    /// Abandons an in-progress merge; a no-op when none is running.
    fn abort_merge(&self) -> Result<(), GitError>;
    fn checkout(&self, branch: &str) -> Result<String, GitError>;
    /// Creates `branch` tracking `upstream` and switches to it.
    fn checkout_tracking(&self, branch: &str, upstream: &str) -> Result<String, GitError>;
    /// Returns false when there was nothing to stash.
    fn stash(&self) -> Result<bool, GitError>;
    fn stash_show_latest(&self) -> Result<String, GitError>;
    fn config_get(&self, key: &str) -> Result<Option<String>, GitError>;
    fn config_set_global(&self, key: &str, value: &str) -> Result<(), GitError>;
}

/// A working tree driven through the git CLI.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
    config: Config,
}

impl GitRepo {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    fn git(&self, args: &[&str]) -> Result<String, GitError> {
        run_git(&self.path, &self.config, args)
    }
}

impl VersionControl for GitRepo {
    fn work_dir(&self) -> &Path {
        &self.path
    }

    fn current_branch(&self) -> Result<String, GitError> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn remotes(&self) -> Result<Vec<Remote>, GitError> {
        match self.git(&["config", "--get-regexp", r"^remote\..*\.url$"]) {
            Ok(output) => Ok(parse_remotes(&output)),
            // `config --get-regexp` exits 1 when nothing matches.
            Err(GitError::Command { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn remote_branches(&self, remote: &str) -> Result<Vec<RemoteBranch>, GitError> {
        validate_ref_name(remote)?;
        let pattern = format!("refs/remotes/{remote}/");
        let output = self.git(&[
            "for-each-ref",
            "--format=%(refname)%09%(objectname)%09%(committerdate:raw)",
            &pattern,
        ])?;
        parse_remote_branches(remote, &output)
    }

    fn head_commit(&self) -> Result<CommitInfo, GitError> {
        let output = self.git(&["log", "-1", "--format=%H%x09%ct", "HEAD"])?;
        let (hash, time) = output
            .split_once('\t')
            .ok_or_else(|| GitError::Parse(output.clone()))?;
        Ok(CommitInfo {
            hash: hash.to_string(),
            committed_at: parse_timestamp(time)?,
        })
    }

    fn has_local_branch(&self, branch: &str) -> Result<bool, GitError> {
        validate_ref_name(branch)?;
        let output = self.git(&["branch", "--list", branch])?;
        Ok(!output.is_empty())
    }

    fn fetch_prune(&self, remote: &str) -> Result<(), GitError> {
        validate_ref_name(remote)?;
        self.git(&["fetch", remote, "--prune"])?;
        Ok(())
    }

    fn fetch_branch(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        validate_ref_name(remote)?;
        validate_ref_name(branch)?;
        self.git(&["fetch", remote, branch])?;
        Ok(())
    }

    fn merge(&self, upstream: &str) -> Result<String, GitError> {
        validate_ref_name(upstream)?;
        self.git(&["merge", "--no-edit", upstream])
    }

    fn abort_merge(&self) -> Result<(), GitError> {
        if self
            .git(&["rev-parse", "-q", "--verify", "MERGE_HEAD"])
            .is_err()
        {
            return Ok(());
        }
        self.git(&["merge", "--abort"])?;
        Ok(())
    }

    fn checkout(&self, branch: &str) -> Result<String, GitError> {
        validate_ref_name(branch)?;
        self.git(&["checkout", branch])
    }

    fn checkout_tracking(&self, branch: &str, upstream: &str) -> Result<String, GitError> {
        validate_ref_name(branch)?;
        validate_ref_name(upstream)?;
        self.git(&["checkout", "-b", branch, "--track", upstream])
    }

    fn stash(&self) -> Result<bool, GitError> {
        let output = self.git(&["stash"])?;
        Ok(!output.contains(NOTHING_TO_STASH))
    }

    fn stash_show_latest(&self) -> Result<String, GitError> {
        self.git(&["stash", "show", "-p", LATEST_STASH])
    }

    fn config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        match self.git(&["config", "--get", key]) {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            // Exit status 1 means the key is unset.
            Err(GitError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn config_set_global(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.git(&["config", "--global", key, value])?;
        Ok(())
    }
}

/// Parses `%ct` or a raw date (`<seconds> <offset>`), keeping the seconds.
fn parse_timestamp(raw: &str) -> Result<i64, GitError> {
    raw.split_whitespace()
        .next()
        .and_then(|seconds| seconds.parse::<i64>().ok())
        .ok_or_else(|| GitError::Parse(raw.to_string()))
}

/// Parses `git config --get-regexp` output (`remote.<name>.url <url>` lines).
fn parse_remotes(output: &str) -> Vec<Remote> {
    output
        .lines()
        .filter_map(|line| {
            let (key, url) = line.split_once(char::is_whitespace)?;
            let name = key.strip_prefix("remote.")?.strip_suffix(".url")?;
            Some(Remote {
                name: name.to_string(),
                url: url.trim().to_string(),
            })
        })
        .collect()
}

/// Parses tab-separated `for-each-ref` output, dropping `<remote>/HEAD`.
fn parse_remote_branches(remote: &str, output: &str) -> Result<Vec<RemoteBranch>, GitError> {
    let prefix = format!("refs/remotes/{remote}/");
    let mut branches = Vec::new();

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let mut fields = line.split('\t');
        let (Some(refname), Some(hash), Some(time)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(GitError::Parse(line.to_string()));
        };
        let Some(name) = refname.strip_prefix(&prefix) else {
            continue;
        };
        if name == REMOTE_HEAD {
            continue;
        }
        branches.push(RemoteBranch {
            remote: remote.to_string(),
            name: name.to_string(),
            commit: CommitInfo {
                hash: hash.to_string(),
                committed_at: parse_timestamp(time)?,
            },
        });
    }

    Ok(branches)
}
