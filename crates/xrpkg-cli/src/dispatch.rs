use std::io;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::CommandFactory;
use tracing::info;
use xrpkg_core::{LifecycleRequest, LifecycleResult};
use xrpkg_device::{CommandExecutor, DeviceTransport};
use xrpkg_installer::{
    apply_lifecycle_request, install_in_progress, observe_package, show_install_log,
    InstallError, LifecycleOptions, PollSettings,
};

use crate::config::{load_config, XrpkgConfig};
use crate::render::{
    current_output_style, finish_spinner, format_lifecycle_lines, format_status_lines,
    render_error_line, render_failure_json, render_result_json, render_status_json, render_status_line,
    start_spinner, OutputStyle,
};
use crate::{ApplyArgs, Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<ExitCode> {
    let style = current_output_style(cli.plain);

    match cli.command {
        Commands::Apply(args) => {
            let config = load_config(cli.config.as_deref())?;
            let request = request_from_args(&args);
            let options = lifecycle_options_for(&config, &args)?;
            let mut executor =
                CommandExecutor::new(config.transport()).with_policy(config.retry_policy());

            let spinner = if args.json {
                None
            } else {
                start_spinner(
                    style,
                    &format!("{} -> {}", request.pkgname, request.state),
                )
            };
            let outcome = run_apply(&mut executor, &request, &options);
            finish_spinner(spinner);

            return Ok(report_apply(&request, outcome, args.json, style));
        }
        Commands::Status { pkgname, json } => {
            let config = load_config(cli.config.as_deref())?;
            let mut executor =
                CommandExecutor::new(config.transport()).with_policy(config.retry_policy());
            let busy = install_in_progress(&mut executor)
                .context("failed to query install operations")?;
            let observed = observe_package(&mut executor, &pkgname)
                .with_context(|| format!("failed to observe package '{pkgname}'"))?;

            if json {
                println!("{}", render_status_json(&pkgname, observed, busy));
            } else {
                for line in format_status_lines(&pkgname, observed, busy, style) {
                    println!("{line}");
                }
            }
        }
        Commands::Log { operation_ids } => {
            let config = load_config(cli.config.as_deref())?;
            let mut executor =
                CommandExecutor::new(config.transport()).with_policy(config.retry_policy());
            for id in &operation_ids {
                let log = show_install_log(&mut executor, id)
                    .with_context(|| format!("failed to fetch install log for operation {id}"))?;
                println!(
                    "{}",
                    render_status_line(style, "step", &format!("operation {id}"))
                );
                println!("{}", log.trim_end());
            }
        }
        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(
                clap_complete::Shell::from(shell),
                &mut command,
                "xrpkg",
                &mut io::stdout(),
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

pub(crate) fn request_from_args(args: &ApplyArgs) -> LifecycleRequest {
    let mut request = LifecycleRequest::new(args.state.into(), args.pkgname.clone())
        .with_force(args.force);
    if let Some(pkgpath) = &args.pkgpath {
        request = request.with_pkgpath(pkgpath.clone());
    }
    if let Some(label) = &args.label {
        request = request.with_label(label.clone());
    }
    request
}

pub(crate) fn lifecycle_options_for(
    config: &XrpkgConfig,
    args: &ApplyArgs,
) -> Result<LifecycleOptions> {
    let mut options = config.lifecycle_options()?;
    if args.no_platform_check {
        options.verify_platform = false;
    }
    if let Some(max_polls) = args.max_polls {
        options.poll.max_polls = max_polls.max(1);
    }
    if let Some(interval) = args.poll_interval_secs {
        options.poll.interval = Duration::from_secs(interval);
    }
    if let Some(max_wait) = args.max_wait_secs {
        options.poll =
            PollSettings::from_max_wait(Duration::from_secs(max_wait), options.poll.interval);
    }
    Ok(options)
}

pub(crate) fn run_apply<T: DeviceTransport>(
    executor: &mut CommandExecutor<T>,
    request: &LifecycleRequest,
    options: &LifecycleOptions,
) -> Result<LifecycleResult, InstallError> {
    info!(
        package = %request.pkgname,
        target = %request.state,
        "applying lifecycle request"
    );
    apply_lifecycle_request(executor, request, options)
}

fn report_apply(
    request: &LifecycleRequest,
    outcome: Result<LifecycleResult, InstallError>,
    json: bool,
    style: OutputStyle,
) -> ExitCode {
    match (outcome, json) {
        (Ok(result), true) => {
            println!("{}", render_result_json(&result));
            ExitCode::SUCCESS
        }
        (Ok(result), false) => {
            for line in format_lifecycle_lines(request, &result, style) {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        (Err(err), true) => {
            println!("{}", render_failure_json(&err.to_string()));
            ExitCode::FAILURE
        }
        (Err(err), false) => {
            eprintln!(
                "{}",
                render_error_line(
                    style,
                    &format!("{} {}: {err}", request.pkgname, request.state)
                )
            );
            ExitCode::FAILURE
        }
    }
}
