//! Finding the checkout of a managed repository on disk.

use crate::constants::{GIT_DIR, MAX_LOCATE_ATTEMPTS};
use crate::output;
use crate::prompt::Prompter;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A repository the updater keeps current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedRepo {
    /// Human name used in messages, e.g. "BrewPi python script".
    pub label: &'static str,
    /// Substring the remote URL must contain, e.g. "brewpi-script".
    pub url_marker: &'static str,
    /// Question asked when the path has to be corrected.
    pub question: &'static str,
}

pub const SCRIPT_REPO: ManagedRepo = ManagedRepo {
    label: "BrewPi python script",
    url_marker: "brewpi-script",
    question: "To which path did you install the BrewPi python scripts?",
};

pub const WEB_REPO: ManagedRepo = ManagedRepo {
    label: "BrewPi web interface",
    url_marker: "brewpi-www",
    question: "To which path did you install the BrewPi web application?",
};

/// Why a candidate path was rejected.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("The path '{}' does not exist", .0.display())]
    Missing(PathBuf),

    #[error("The path '{}' does not seem to be a valid git repository", .0.display())]
    NotARepo(PathBuf),

    #[error("The git configuration in '{}' could not be read: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The path '{}' does not seem to be the {label} git repository", .path.display())]
    WrongRepo { path: PathBuf, label: &'static str },
}

/// Checks that `path` is a git working tree whose remote URL names `repo`.
pub fn validate(path: &Path, repo: &ManagedRepo) -> Result<(), LocateError> {
    if !path.exists() {
        return Err(LocateError::Missing(path.to_path_buf()));
    }
    let git_dir = path.join(GIT_DIR);
    if !git_dir.is_dir() {
        return Err(LocateError::NotARepo(path.to_path_buf()));
    }
    let config = std::fs::read_to_string(git_dir.join("config")).map_err(|source| {
        LocateError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    })?;
    if config
        .lines()
        .any(|line| is_url_line(line) && line.contains(repo.url_marker))
    {
        Ok(())
    } else {
        Err(LocateError::WrongRepo {
            path: path.to_path_buf(),
            label: repo.label,
        })
    }
}

fn is_url_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix("url")
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

/// Confirms `initial` or asks the operator for a better path, trying at most
/// [`MAX_LOCATE_ATTEMPTS`] paths. `None` means the repository was not found.
pub fn locate_repo(
    initial: PathBuf,
    repo: &ManagedRepo,
    prompter: &mut dyn Prompter,
) -> anyhow::Result<Option<PathBuf>> {
    let mut path = initial;
    let mut attempt = 1;
    loop {
        let error = match validate(&path, repo) {
            Ok(()) => return Ok(Some(path)),
            Err(e) => e,
        };
        output::warning(&error.to_string());

        if attempt >= MAX_LOCATE_ATTEMPTS {
            output::failure(&format!(
                "Maximum number of tries reached, updating the {} repository aborted.",
                repo.label
            ));
            return Ok(None);
        }
        path = PathBuf::from(prompter.input(repo.question)?.trim());
        attempt += 1;
    }
}
