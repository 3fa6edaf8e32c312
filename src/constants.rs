//! Application-wide constants.
//!
//! Centralized configuration values to avoid magic strings throughout the codebase.

use std::path::PathBuf;

/// Branches considered stable releases. Anything else is experimental.
pub const STABLE_BRANCHES: [&str; 2] = [MASTER_BRANCH, LEGACY_BRANCH];
pub const MASTER_BRANCH: &str = "master";
pub const LEGACY_BRANCH: &str = "legacy";

/// Symbolic ref every remote carries; never a selectable branch.
pub const REMOTE_HEAD: &str = "HEAD";

/// Total attempts the locator makes before giving up on a repository.
pub const MAX_LOCATE_ATTEMPTS: usize = 3;

/// Attempts at a checkout or merge blocked by local edits: the first try
/// and a single retry after stashing.
pub const MAX_BLOCKED_ATTEMPTS: usize = 2;

/// Git directory name used to detect repositories.
pub const GIT_DIR: &str = ".git";

/// Git emits this for both checkout and merge when tracked edits are in the
/// way. Untracked files that would be overwritten use different wording and
/// are not something a stash clears.
pub const LOCAL_CHANGES_MARKER: &str =
    "Your local changes to the following files would be overwritten by";

/// Printed by `git stash` when the working tree is already clean.
pub const NOTHING_TO_STASH: &str = "No local changes to save";

/// Most recent stash slot, shown after stashing.
pub const LATEST_STASH: &str = "stash@{0}";

pub const DEFAULT_SCRIPT_PATH: &str = "/home/brewpi";
/// Web root since Raspbian Jessie.
pub const DEFAULT_WEB_PATH: &str = "/var/www/html";
pub const LEGACY_WEB_PATH: &str = "/var/www";

/// Marker file that keeps the application from being restarted by cron.
pub const DO_NOT_RUN_MARKER: &str = "do_not_run_brewpi";

/// Process pattern signalled when the application is stopped.
pub const APP_PROCESS_PATTERN: &str = "brewpi.py";

/// Helper living next to the updater binary; exits 0 when already current.
pub const SELF_UPDATE_HELPER: &str = "updateToolsRepo.sh";

/// Helpers inside the script repository's `utils` directory.
pub const UTILS_DIR: &str = "utils";
pub const POST_UPDATE_HELPER: &str = "runAfterUpdate.sh";
pub const FIRMWARE_UPDATER: &str = "updateFirmware.py";

const DEFAULT_PYTHON: &str = "python3";

/// Returns the interpreter used to launch the firmware updater.
///
/// Can be customized via the BREWPI_PYTHON environment variable.
/// Falls back to `python3` if not set or empty.
///
/// Example: `BREWPI_PYTHON=python2 brewpi-updater`
pub fn python_interpreter() -> String {
    std::env::var("BREWPI_PYTHON")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PYTHON.to_string())
}

/// Returns the directory the self-update helper is expected in.
///
/// Defaults to the directory holding the running executable; the
/// BREWPI_TOOLS_DIR environment variable overrides it.
pub fn tools_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("BREWPI_TOOLS_DIR").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.canonicalize().ok())
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the first guess for the web interface checkout.
pub fn default_web_path() -> PathBuf {
    let path = PathBuf::from(DEFAULT_WEB_PATH);
    if path.is_dir() {
        path
    } else {
        PathBuf::from(LEGACY_WEB_PATH)
    }
}

/// Returns true for branches the updater treats as stable releases.
pub fn is_stable_branch(branch: &str) -> bool {
    STABLE_BRANCHES.contains(&branch)
}
