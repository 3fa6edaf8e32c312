//! Test infrastructure for brewpi-updater integration tests.
#![allow(dead_code)]

use anyhow::Result;
use brewpi_updater::config::{Config, Mode};
use brewpi_updater::git::{CommitInfo, GitError, Remote, RemoteBranch, VersionControl, run_git};
use brewpi_updater::host::{Host, SelfUpdate};
use brewpi_updater::prompt::Prompter;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use tempfile::TempDir;

pub fn test_config() -> Config {
    Config::default()
}

pub fn interactive_config() -> Config {
    Config {
        mode: Mode::Interactive,
        ..Config::default()
    }
}

// ---------------------------------------------------------------------------
// Real repositories
// ---------------------------------------------------------------------------

/// A temporary git repository for testing.
/// Automatically cleaned up when dropped.
pub struct TestRepo {
    _temp_dir: TempDir,
    path: PathBuf,
}

/// Commit time of the first commit in every `TestRepo`.
pub const INITIAL_COMMIT_TIME: i64 = 1_600_000_000;

impl TestRepo {
    /// Creates a new test repository with an initial commit on the master branch.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();

        git(&path, &["init", "-b", "master"])?;
        configure_identity(&path)?;

        let repo = Self {
            _temp_dir: temp_dir,
            path,
        };
        repo.commit_file("README.md", "# Test Repo\n", INITIAL_COMMIT_TIME)?;
        Ok(repo)
    }

    /// Creates a test repository pushed to a bare remote named `origin`.
    /// Returns the repo and the remote TempDir (must be kept alive).
    pub fn with_remote() -> Result<(Self, TempDir)> {
        let remote_dir = TempDir::new()?;
        git(remote_dir.path(), &["init", "--bare", "-b", "master"])?;

        let local = Self::new()?;
        local.add_remote("origin", remote_dir.path())?;
        git(&local.path, &["push", "-u", "origin", "master"])?;

        Ok((local, remote_dir))
    }

    /// Clones `remote` into a fresh temporary directory.
    pub fn clone_from(remote: &Path) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("clone");
        git(
            temp_dir.path(),
            &["clone", remote.to_str().unwrap(), path.to_str().unwrap()],
        )?;
        configure_identity(&path)?;
        Ok(Self {
            _temp_dir: temp_dir,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_remote(&self, name: &str, url: &Path) -> Result<()> {
        git(&self.path, &["remote", "add", name, url.to_str().unwrap()])?;
        Ok(())
    }

    /// Writes `content` to `file` and commits it with a fixed timestamp.
    pub fn commit_file(&self, file: &str, content: &str, timestamp: i64) -> Result<()> {
        std::fs::write(self.path.join(file), content)?;
        git(&self.path, &["add", file])?;

        let date = format!("{timestamp} +0000");
        let output = Command::new("git")
            .current_dir(&self.path)
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date)
            .args(["commit", "-m", &format!("Update {file}")])
            .output()?;
        anyhow::ensure!(
            output.status.success(),
            "commit failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(())
    }

    pub fn make_dirty(&self, file: &str) -> Result<()> {
        std::fs::write(self.path.join(file), "# Local edit\n")?;
        Ok(())
    }

    pub fn read(&self, file: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.path.join(file))?)
    }

    pub fn stash_count(&self) -> Result<usize> {
        let output = git(&self.path, &["stash", "list"])?;
        Ok(output.lines().count())
    }

    pub fn head(&self) -> Result<String> {
        git(&self.path, &["rev-parse", "HEAD"])
    }
}

fn configure_identity(path: &Path) -> Result<()> {
    git(path, &["config", "user.email", "test@example.com"])?;
    git(path, &["config", "user.name", "Test User"])?;
    Ok(())
}

pub fn git(path: &Path, args: &[&str]) -> Result<String> {
    Ok(run_git(path, &test_config(), args)?)
}

/// Writes just enough of a checkout for the locator to accept it.
pub fn fake_checkout(parent: &Path, name: &str, url: &str) -> Result<PathBuf> {
    let path = parent.join(name);
    std::fs::create_dir_all(path.join(".git"))?;
    std::fs::write(
        path.join(".git").join("config"),
        format!("[core]\n\tbare = false\n[remote \"origin\"]\n\turl = {url}\n"),
    )?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Scripted version control
// ---------------------------------------------------------------------------

pub fn blocked_error(operation: &str) -> GitError {
    GitError::Command {
        command: operation.to_string(),
        message: format!(
            "error: Your local changes to the following files would be overwritten by {operation}:\n\tbrewpi.py\nPlease commit your changes or stash them before you {operation}.\nAborting"
        ),
    }
}

pub fn conflict_error() -> GitError {
    GitError::Command {
        command: "merge origin/master".to_string(),
        message: "CONFLICT (content): Merge conflict in brewpi.py\nAutomatic merge failed; fix conflicts and then commit the result.".to_string(),
    }
}

/// Untracked files in the way; stashing tracked edits does not clear it.
pub fn untracked_error(operation: &str) -> GitError {
    GitError::Command {
        command: operation.to_string(),
        message: format!(
            "error: The following untracked working tree files would be overwritten by {operation}:\n\tnew.txt\nPlease move or remove them before you {operation}.\nAborting"
        ),
    }
}

pub fn network_error() -> GitError {
    GitError::Command {
        command: "fetch origin --prune".to_string(),
        message: "fatal: unable to access 'https://github.com/BrewPi/brewpi-script/': Could not resolve host".to_string(),
    }
}

struct FakeState {
    path: PathBuf,
    branch: RefCell<String>,
    local_branches: RefCell<Vec<String>>,
    remotes: RefCell<Vec<Remote>>,
    remote_branches: RefCell<Vec<RemoteBranch>>,
    head: RefCell<CommitInfo>,
    merge_results: RefCell<VecDeque<Result<String, GitError>>>,
    checkout_results: RefCell<VecDeque<Result<String, GitError>>>,
    stash_results: RefCell<VecDeque<Result<bool, GitError>>>,
    fetch_error: RefCell<Option<GitError>>,
    config: RefCell<HashMap<String, String>>,
    calls: RefCell<Vec<String>>,
}

/// A `VersionControl` with scripted answers that records every call.
///
/// Clones share state, so a test can keep one handle while the code under
/// test owns another.
#[derive(Clone)]
pub struct FakeRepo {
    state: Rc<FakeState>,
}

impl FakeRepo {
    /// A repository on `branch` whose HEAD was committed at `head_time`, with
    /// a configured git identity and no remotes.
    pub fn new(branch: &str, head_time: i64) -> Self {
        let config = HashMap::from([
            ("user.name".to_string(), "Test User".to_string()),
            ("user.email".to_string(), "test@example.com".to_string()),
        ]);
        Self {
            state: Rc::new(FakeState {
                path: PathBuf::from("/home/brewpi"),
                branch: RefCell::new(branch.to_string()),
                local_branches: RefCell::new(vec![branch.to_string()]),
                remotes: RefCell::new(Vec::new()),
                remote_branches: RefCell::new(Vec::new()),
                head: RefCell::new(CommitInfo {
                    hash: "local0000".to_string(),
                    committed_at: head_time,
                }),
                merge_results: RefCell::new(VecDeque::new()),
                checkout_results: RefCell::new(VecDeque::new()),
                stash_results: RefCell::new(VecDeque::new()),
                fetch_error: RefCell::new(None),
                config: RefCell::new(config),
                calls: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Adds a remote carrying `branches` as `(name, commit time)` pairs.
    pub fn with_remote(self, name: &str, branches: &[(&str, i64)]) -> Self {
        self.state.remotes.borrow_mut().push(Remote {
            name: name.to_string(),
            url: format!("https://github.com/{name}/brewpi-script.git"),
        });
        for (branch, time) in branches {
            self.state.remote_branches.borrow_mut().push(RemoteBranch {
                remote: name.to_string(),
                name: branch.to_string(),
                commit: CommitInfo {
                    hash: format!("{name}-{branch}"),
                    committed_at: *time,
                },
            });
        }
        self
    }

    pub fn with_local_branch(self, branch: &str) -> Self {
        self.state
            .local_branches
            .borrow_mut()
            .push(branch.to_string());
        self
    }

    pub fn with_merge_results(self, results: Vec<Result<String, GitError>>) -> Self {
        self.state.merge_results.borrow_mut().extend(results);
        self
    }

    pub fn with_checkout_results(self, results: Vec<Result<String, GitError>>) -> Self {
        self.state.checkout_results.borrow_mut().extend(results);
        self
    }

    pub fn with_stash_results(self, results: Vec<Result<bool, GitError>>) -> Self {
        self.state.stash_results.borrow_mut().extend(results);
        self
    }

    pub fn with_fetch_error(self, error: GitError) -> Self {
        *self.state.fetch_error.borrow_mut() = Some(error);
        self
    }

    pub fn without_identity(self) -> Self {
        self.state.config.borrow_mut().clear();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.calls.borrow().clone()
    }

    /// Number of calls whose name starts with `op`, e.g. `"merge"`.
    pub fn count(&self, op: &str) -> usize {
        self.state
            .calls
            .borrow()
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .count()
    }

    /// Calls that change the working tree.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                let op = c.split(' ').next().unwrap_or_default();
                matches!(op, "merge" | "checkout" | "checkout_tracking" | "stash")
            })
            .collect()
    }

    pub fn branch(&self) -> String {
        self.state.branch.borrow().clone()
    }

    pub fn config_value(&self, key: &str) -> Option<String> {
        self.state.config.borrow().get(key).cloned()
    }

    fn record(&self, call: String) {
        self.state.calls.borrow_mut().push(call);
    }
}

impl VersionControl for FakeRepo {
    fn work_dir(&self) -> &Path {
        &self.state.path
    }

    fn current_branch(&self) -> Result<String, GitError> {
        self.record("current_branch".to_string());
        Ok(self.branch())
    }

    fn remotes(&self) -> Result<Vec<Remote>, GitError> {
        self.record("remotes".to_string());
        Ok(self.state.remotes.borrow().clone())
    }

    fn remote_branches(&self, remote: &str) -> Result<Vec<RemoteBranch>, GitError> {
        self.record(format!("remote_branches {remote}"));
        Ok(self
            .state
            .remote_branches
            .borrow()
            .iter()
            .filter(|b| b.remote == remote)
            .cloned()
            .collect())
    }

    fn head_commit(&self) -> Result<CommitInfo, GitError> {
        self.record("head_commit".to_string());
        Ok(self.state.head.borrow().clone())
    }

    fn has_local_branch(&self, branch: &str) -> Result<bool, GitError> {
        self.record(format!("has_local_branch {branch}"));
        Ok(self
            .state
            .local_branches
            .borrow()
            .iter()
            .any(|b| b == branch))
    }

    fn fetch_prune(&self, remote: &str) -> Result<(), GitError> {
        self.record(format!("fetch_prune {remote}"));
        match self.state.fetch_error.borrow_mut().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn fetch_branch(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.record(format!("fetch_branch {remote} {branch}"));
        Ok(())
    }

    fn merge(&self, upstream: &str) -> Result<String, GitError> {
        self.record(format!("merge {upstream}"));
        self.state
            .merge_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok("Fast-forward".to_string()))
    }

    fn abort_merge(&self) -> Result<(), GitError> {
        self.record("abort_merge".to_string());
        Ok(())
    }

    fn checkout(&self, branch: &str) -> Result<String, GitError> {
        self.record(format!("checkout {branch}"));
        let result = self
            .state
            .checkout_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()));
        if result.is_ok() {
            *self.state.branch.borrow_mut() = branch.to_string();
        }
        result
    }

    fn checkout_tracking(&self, branch: &str, upstream: &str) -> Result<String, GitError> {
        self.record(format!("checkout_tracking {branch} {upstream}"));
        let result = self
            .state
            .checkout_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()));
        if result.is_ok() {
            *self.state.branch.borrow_mut() = branch.to_string();
            self.state
                .local_branches
                .borrow_mut()
                .push(branch.to_string());
        }
        result
    }

    fn stash(&self) -> Result<bool, GitError> {
        self.record("stash".to_string());
        self.state
            .stash_results
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(true))
    }

    fn stash_show_latest(&self) -> Result<String, GitError> {
        self.record("stash_show".to_string());
        Ok("brewpi.py | 2 +-".to_string())
    }

    fn config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        self.record(format!("config_get {key}"));
        Ok(self.config_value(key))
    }

    fn config_set_global(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.record(format!("config_set_global {key} {value}"));
        self.state
            .config
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted operator
// ---------------------------------------------------------------------------

/// Replays canned answers and records every prompt shown.
/// Running out of answers is an error, so an unexpected question fails the
/// test instead of hanging it.
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            prompts: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted answer for prompt: {prompt}"))
    }
}

// ---------------------------------------------------------------------------
// Scripted host
// ---------------------------------------------------------------------------

/// Records what the orchestrator asks of the machine.
pub struct FakeHost {
    pub superuser: bool,
    pub self_update: SelfUpdate,
    pub repos: HashMap<PathBuf, FakeRepo>,
    pub after_update_error: Option<String>,
    pub firmware_code: Option<i32>,
    pub events: Vec<String>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            superuser: true,
            self_update: SelfUpdate::Current,
            repos: HashMap::new(),
            after_update_error: None,
            firmware_code: Some(0),
            events: Vec::new(),
        }
    }
}

impl FakeHost {
    pub fn with_repo(mut self, path: &Path, repo: FakeRepo) -> Self {
        self.repos.insert(path.to_path_buf(), repo);
        self
    }

    pub fn has_event(&self, prefix: &str) -> bool {
        self.events.iter().any(|e| e.starts_with(prefix))
    }
}

impl Host for FakeHost {
    fn is_superuser(&self) -> bool {
        self.superuser
    }

    fn check_self_update(&mut self) -> Result<SelfUpdate> {
        self.events.push("self_update".to_string());
        Ok(self.self_update.clone())
    }

    fn stop_application(&mut self, web_path: &Path) {
        self.events.push(format!("stop {}", web_path.display()));
    }

    fn start_application(&mut self, web_path: &Path) {
        self.events.push(format!("start {}", web_path.display()));
    }

    fn open_repo(&self, path: &Path) -> Box<dyn VersionControl> {
        let repo = self
            .repos
            .get(path)
            .unwrap_or_else(|| panic!("no fake repository at {}", path.display()));
        Box::new(repo.clone())
    }

    fn run_after_update(&mut self, script_path: &Path) -> Result<()> {
        self.events
            .push(format!("after_update {}", script_path.display()));
        match &self.after_update_error {
            Some(message) => anyhow::bail!("{message}"),
            None => Ok(()),
        }
    }

    fn update_firmware(&mut self, _script_path: &Path, mode: Mode) -> Result<Option<i32>> {
        self.events.push(format!("firmware {}", mode.firmware_flag()));
        Ok(self.firmware_code)
    }
}
