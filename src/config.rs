//! Configuration types for CLI mode, verbosity and install locations.

use crate::constants;
use crate::git::{self, GitLogger};
use std::path::PathBuf;

/// Runtime configuration derived from CLI arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Whether the operator picks remotes and branches.
    pub mode: Mode,
    /// Controls the verbosity level of CLI output.
    pub verbosity: Verbosity,
}

impl Config {
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.mode == Mode::Interactive
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Returns the appropriate git logger based on verbosity settings.
    ///
    /// Config only decides which logger function to use; the loggers
    /// themselves live in the git module.
    #[must_use]
    pub fn git_logger(&self) -> GitLogger {
        if self.is_verbose() {
            git::verbose_logger
        } else {
            git::no_op_logger
        }
    }
}

/// How much the operator is asked during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Follow the current (or stable) branch on the first remote.
    #[default]
    Default,
    /// `--ask`: choose remote and branch from enumerated lists.
    Interactive,
}

impl Mode {
    /// Flag handed to the firmware updater.
    #[must_use]
    pub fn firmware_flag(self) -> &'static str {
        match self {
            Mode::Interactive => "--beta",
            Mode::Default => "--silent",
        }
    }
}

/// Verbosity level for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Normal,
    Verbose,
}

/// First guesses for where things are installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
    /// Checkout of the BrewPi python scripts.
    pub script_path: PathBuf,
    /// Checkout of the BrewPi web interface.
    pub web_path: PathBuf,
    /// Directory holding the self-update helper.
    pub tools_dir: PathBuf,
}

impl Locations {
    /// Builds locations from optional overrides, falling back to the
    /// standard install paths.
    #[must_use]
    pub fn resolve(script_path: Option<PathBuf>, web_path: Option<PathBuf>) -> Self {
        Self {
            script_path: script_path
                .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_SCRIPT_PATH)),
            web_path: web_path.unwrap_or_else(constants::default_web_path),
            tools_dir: constants::tools_dir(),
        }
    }
}
