mod config;
mod dispatch;
mod logging;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use xrpkg_core::TargetState;

use crate::render::{current_output_style, render_error_line};

#[derive(Parser, Debug)]
#[command(name = "xrpkg")]
#[command(about = "IOS-XR software package lifecycle manager", long_about = None)]
struct Cli {
    /// Config file (defaults to $XRPKG_CONFIG, then /etc/xrpkg/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Disable badges, colors and spinners.
    #[arg(long, global = true)]
    plain: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a package to the requested lifecycle state.
    Apply(ApplyArgs),
    /// Show the observed state of a package.
    Status {
        pkgname: String,
        #[arg(long)]
        json: bool,
    },
    /// Print `show install log` for one or more operation ids.
    Log {
        #[arg(required = true)]
        operation_ids: Vec<String>,
    },
    /// Print the effective configuration as TOML.
    Config,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Args, Debug, Clone)]
struct ApplyArgs {
    #[arg(long, value_enum, default_value_t = CliTargetState::Present)]
    state: CliTargetState,
    #[arg(long)]
    pkgname: String,
    #[arg(long)]
    pkgpath: Option<String>,
    #[arg(long)]
    label: Option<String>,
    #[arg(long)]
    force: bool,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    no_platform_check: bool,
    #[arg(long, conflicts_with = "max_wait_secs")]
    max_polls: Option<u32>,
    /// Total time to wait for install operations, spread over poll intervals.
    #[arg(long)]
    max_wait_secs: Option<u64>,
    #[arg(long)]
    poll_interval_secs: Option<u64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliTargetState {
    Present,
    Absent,
    Updated,
    Activated,
    Deactivated,
    Committed,
}

impl From<CliTargetState> for TargetState {
    fn from(value: CliTargetState) -> Self {
        match value {
            CliTargetState::Present => TargetState::Present,
            CliTargetState::Absent => TargetState::Absent,
            CliTargetState::Updated => TargetState::Updated,
            CliTargetState::Activated => TargetState::Activated,
            CliTargetState::Deactivated => TargetState::Deactivated,
            CliTargetState::Committed => TargetState::Committed,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliCompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

impl From<CliCompletionShell> for Shell {
    fn from(value: CliCompletionShell) -> Self {
        match value {
            CliCompletionShell::Bash => Shell::Bash,
            CliCompletionShell::Zsh => Shell::Zsh,
            CliCompletionShell::Fish => Shell::Fish,
            CliCompletionShell::Powershell => Shell::PowerShell,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = logging::init_logging(cli.verbose) {
        eprintln!("{err}");
    }

    let style = current_output_style(cli.plain);
    match dispatch::run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", render_error_line(style, &format!("{err:#}")));
            ExitCode::FAILURE
        }
    }
}
