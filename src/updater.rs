//! Top-level update sequence.
//!
//! Runs the two repository passes one after the other and decides whether
//! the post-update helper has to run.

use crate::config::{Config, Locations};
use crate::host::{Host, SelfUpdate, post_update_helper};
use crate::locate::{self, SCRIPT_REPO, WEB_REPO};
use crate::output;
use crate::prompt::Prompter;
use crate::repo::{self, SyncOutcome};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Conditions that end the run before any repository is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpdaterError {
    #[error("This update script should be run as root.\nTry running it again with sudo, exiting.")]
    NotSuperuser,

    #[error(
        "The required file {} was not found. This is likely to occur if you manually\n\
         copied the updater here. Please run it from the location where you installed\n\
         the brewpi-tools git repo and try again.",
        .0.display()
    )]
    MissingSelfUpdateHelper(PathBuf),

    #[error(
        "This script was not up-to-date and has been automatically updated.\n\
         Please re-run the updater."
    )]
    SelfUpdated,
}

/// How the optional firmware step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirmwareUpdate {
    #[default]
    Skipped,
    Succeeded,
    /// Exit code of the updater; `None` when it was killed by a signal.
    Failed { code: Option<i32> },
    NotStarted,
}

/// What happened during a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Where the script repository was found, if anywhere.
    pub script_path: Option<PathBuf>,
    pub script: Option<SyncOutcome>,
    pub web_path: Option<PathBuf>,
    pub web: Option<SyncOutcome>,
    pub ran_post_update: bool,
    pub firmware: FirmwareUpdate,
}

impl RunSummary {
    #[must_use]
    pub fn changed(&self) -> bool {
        [&self.script, &self.web]
            .into_iter()
            .flatten()
            .any(SyncOutcome::changed)
    }
}

/// Runs the whole update.
///
/// Fatal preconditions come back as [`UpdaterError`] inside the error;
/// everything else is reported on the console and recorded in the summary.
pub fn run(
    config: &Config,
    locations: Locations,
    host: &mut dyn Host,
    prompter: &mut dyn Prompter,
) -> anyhow::Result<RunSummary> {
    output::print_banner();
    if config.is_interactive() {
        output::status("Using interactive (advanced) update with user input.\n");
    }

    if !host.is_superuser() {
        return Err(UpdaterError::NotSuperuser.into());
    }
    match host.check_self_update()? {
        SelfUpdate::Current => {}
        SelfUpdate::Updated => return Err(UpdaterError::SelfUpdated.into()),
        SelfUpdate::HelperMissing(path) => {
            return Err(UpdaterError::MissingSelfUpdateHelper(path).into());
        }
    }

    output::warning(
        "It is not recommended to update during a brew.\n  \
         If you are actively logging a brew we recommend canceling the update with ctrl-c.",
    );

    let mut summary = RunSummary::default();
    let result = update_all(config, &locations, host, prompter, &mut summary);

    // The application is let back in even when a prompt failed halfway.
    let web_path = summary
        .web_path
        .as_deref()
        .unwrap_or(locations.web_path.as_path());
    host.start_application(web_path);
    result?;

    output::print_summary(&[
        (SCRIPT_REPO.label, summary.script.as_ref()),
        (WEB_REPO.label, summary.web.as_ref()),
    ]);
    output::print_section("Done updating BrewPi");
    output::status(
        "Please refresh your browser with ctrl-F5 to make sure it is not showing an\n\
         old cached version.",
    );

    Ok(summary)
}

fn update_all(
    config: &Config,
    locations: &Locations,
    host: &mut dyn Host,
    prompter: &mut dyn Prompter,
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    output::print_section("Updating BrewPi script repository");
    summary.script_path =
        locate::locate_repo(locations.script_path.clone(), &SCRIPT_REPO, prompter)?;
    if let Some(path) = &summary.script_path {
        host.stop_application(&locations.web_path);
        summary.script = Some(sync(host, path, prompter, config)?);
    }

    output::print_section("Updating BrewPi web interface repository");
    summary.web_path = locate::locate_repo(locations.web_path.clone(), &WEB_REPO, prompter)?;
    if let Some(path) = &summary.web_path {
        summary.web = Some(sync(host, path, prompter, config)?);
    }

    // Helpers live in the script repository, wherever it turned out to be.
    let script_dir = summary
        .script_path
        .clone()
        .unwrap_or_else(|| locations.script_path.clone());
    if summary.changed() {
        output::status(&format!(
            "\nOne or more repositories were updated, running {} now.",
            post_update_helper(&script_dir).display()
        ));
        if let Err(e) = host.run_after_update(&script_dir) {
            output::failure(&format!(
                "I tried to execute the post-update script, but an error occurred: {e:#}\n  \
                 Try running it from the command line in your <brewpi-script>/utils dir."
            ));
        }
        summary.ran_post_update = true;
    } else {
        print_manual_hint(&script_dir);
    }

    summary.firmware = offer_firmware_update(host, prompter, config, &script_dir)?;
    Ok(())
}

fn sync(
    host: &dyn Host,
    path: &Path,
    prompter: &mut dyn Prompter,
    config: &Config,
) -> anyhow::Result<SyncOutcome> {
    let repo = host.open_repo(path);
    repo::check_repo(repo.as_ref(), prompter, config)
}

fn print_manual_hint(script_dir: &Path) {
    output::status("\nNo changes were made, skipping the post-update script.");
    output::status("If you encounter problems, you can start it manually with:");
    output::status(&format!(
        "'sudo {}'",
        post_update_helper(script_dir).display()
    ));
}

fn offer_firmware_update(
    host: &mut dyn Host,
    prompter: &mut dyn Prompter,
    config: &Config,
    script_dir: &Path,
) -> anyhow::Result<FirmwareUpdate> {
    output::status(
        "\nThe update script can automatically check your controller firmware version\n\
         and program it with the latest release on GitHub.",
    );
    if !prompter
        .confirm("Would you like to do this now?")?
        .accepted()
    {
        output::status("Skipping controller update.");
        return Ok(FirmwareUpdate::Skipped);
    }

    Ok(match host.update_firmware(script_dir, config.mode) {
        Ok(Some(0)) => {
            output::success("Firmware update complete.");
            FirmwareUpdate::Succeeded
        }
        Ok(code) => {
            let shown = code.map_or_else(|| "a signal".to_string(), |c| c.to_string());
            output::warning(&format!("The firmware updater exited with {shown}."));
            FirmwareUpdate::Failed { code }
        }
        Err(e) => {
            output::failure(&format!("Could not start the firmware updater: {e:#}"));
            FirmwareUpdate::NotStarted
        }
    })
}
