use brewpi_updater::config::{Config, Locations, Mode, Verbosity};
use brewpi_updater::host::SystemHost;
use brewpi_updater::output;
use brewpi_updater::prompt::TerminalPrompter;
use brewpi_updater::updater;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Updates the BrewPi script and web interface repositories.
#[derive(Debug, Parser)]
#[command(name = "brewpi-updater", version)]
struct Cli {
    /// Do not use default options, but ask which remotes and branches to check out
    #[arg(short = 'a', long = "ask")]
    ask: bool,

    /// Echo every git command before running it
    #[arg(short, long)]
    verbose: bool,

    /// Where the BrewPi python scripts are installed
    #[arg(long, value_name = "DIR")]
    script_path: Option<PathBuf>,

    /// Where the BrewPi web interface is installed
    #[arg(long, value_name = "DIR")]
    web_path: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            mode: if self.ask {
                Mode::Interactive
            } else {
                Mode::Default
            },
            verbosity: if self.verbose {
                Verbosity::Verbose
            } else {
                Verbosity::Normal
            },
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config();
    let locations = Locations::resolve(cli.script_path, cli.web_path);

    let mut host = SystemHost::new(config, locations.tools_dir.clone());
    let mut prompter = TerminalPrompter;

    match updater::run(&config, locations, &mut host, &mut prompter) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            output::failure(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
