//! Everything outside the repositories themselves: privileges, helper
//! scripts, the firmware updater and the running application.
//!
//! The orchestrator only talks to [`Host`], which keeps the update sequence
//! testable without root or a BrewPi install.

use crate::config::{Config, Mode};
use crate::constants::{
    self, APP_PROCESS_PATTERN, DO_NOT_RUN_MARKER, FIRMWARE_UPDATER, POST_UPDATE_HELPER,
    SELF_UPDATE_HELPER, UTILS_DIR,
};
use crate::git::{GitRepo, VersionControl};
use crate::output;
use anyhow::Context;
use nix::unistd::geteuid;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Result of running the self-update helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfUpdate {
    /// Helper exited 0.
    Current,
    /// Helper exited non-zero after updating the tools checkout.
    Updated,
    HelperMissing(PathBuf),
}

/// External capabilities the update sequence depends on.
pub trait Host {
    fn is_superuser(&self) -> bool;
    fn check_self_update(&mut self) -> anyhow::Result<SelfUpdate>;
    /// Stops running instances and keeps them from restarting.
    fn stop_application(&mut self, web_path: &Path);
    /// Lets the application run again.
    fn start_application(&mut self, web_path: &Path);
    fn open_repo(&self, path: &Path) -> Box<dyn VersionControl>;
    /// Runs the post-update helper of the script repository.
    fn run_after_update(&mut self, script_path: &Path) -> anyhow::Result<()>;
    /// Runs the firmware updater and returns its exit code.
    fn update_firmware(&mut self, script_path: &Path, mode: Mode) -> anyhow::Result<Option<i32>>;
}

/// The real machine.
#[derive(Debug, Clone)]
pub struct SystemHost {
    config: Config,
    tools_dir: PathBuf,
}

impl SystemHost {
    #[must_use]
    pub fn new(config: Config, tools_dir: PathBuf) -> Self {
        Self { config, tools_dir }
    }
}

#[must_use]
pub fn marker_path(web_path: &Path) -> PathBuf {
    web_path.join(DO_NOT_RUN_MARKER)
}

#[must_use]
pub fn post_update_helper(script_path: &Path) -> PathBuf {
    script_path.join(UTILS_DIR).join(POST_UPDATE_HELPER)
}

#[must_use]
pub fn firmware_updater(script_path: &Path) -> PathBuf {
    script_path.join(UTILS_DIR).join(FIRMWARE_UPDATER)
}

impl Host for SystemHost {
    fn is_superuser(&self) -> bool {
        geteuid().is_root()
    }

    fn check_self_update(&mut self) -> anyhow::Result<SelfUpdate> {
        let helper = self.tools_dir.join(SELF_UPDATE_HELPER);
        if !helper.is_file() {
            return Ok(SelfUpdate::HelperMissing(helper));
        }
        output::status("Checking whether the update script is up to date.");
        let status = Command::new("bash")
            .arg(&helper)
            .status()
            .with_context(|| format!("Failed to run {}", helper.display()))?;
        Ok(if status.success() {
            SelfUpdate::Current
        } else {
            SelfUpdate::Updated
        })
    }

    fn stop_application(&mut self, web_path: &Path) {
        output::status("Stopping running instances of BrewPi.");
        let marker = marker_path(web_path);
        if let Err(e) = std::fs::write(&marker, b"") {
            output::warning(&format!("Could not create {}: {e}", marker.display()));
        }
        // Nothing to stop is not an error; older installs may not run at all.
        let _ = Command::new("pkill")
            .args(["-TERM", "-f", APP_PROCESS_PATTERN])
            .status();
    }

    fn start_application(&mut self, web_path: &Path) {
        let marker = marker_path(web_path);
        if !marker.is_file() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&marker) {
            output::warning(&format!("Could not remove {}: {e}", marker.display()));
        }
    }

    fn open_repo(&self, path: &Path) -> Box<dyn VersionControl> {
        Box::new(GitRepo::new(path, self.config))
    }

    fn run_after_update(&mut self, script_path: &Path) -> anyhow::Result<()> {
        let helper = post_update_helper(script_path);
        output::status("Installing dependencies, updating CRON and fixing file permissions.");
        // The helper talks to the operator directly, so no spinner over it.
        let status = Command::new("bash")
            .arg(&helper)
            .status()
            .with_context(|| format!("Failed to run {}", helper.display()))?;
        if !status.success() {
            anyhow::bail!("{} exited with {}", helper.display(), status);
        }
        Ok(())
    }

    fn update_firmware(&mut self, script_path: &Path, mode: Mode) -> anyhow::Result<Option<i32>> {
        let updater = firmware_updater(script_path);
        let python = constants::python_interpreter();
        let status = Command::new(&python)
            .arg(&updater)
            .arg(mode.firmware_flag())
            .status()
            .with_context(|| format!("Failed to run {python} {}", updater.display()))?;
        Ok(status.code())
    }
}
