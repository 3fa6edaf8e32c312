//! BrewPi repository updater library.
//!
//! This crate keeps the BrewPi script and web interface checkouts current by:
//! - Locating each repository and checking it is the expected one
//! - Choosing a remote and branch (interactively with `--ask`)
//! - Switching branches and merging newer upstream commits
//! - Stashing local edits that block a checkout or merge
//! - Running the post-update and firmware helpers when something changed

pub mod config;
pub mod constants;
pub mod git;
pub mod host;
pub mod locate;
pub mod output;
pub mod prompt;
pub mod repo;
pub mod stash;
pub mod updater;
