use tracing::info;
use xrpkg_core::{
    extract_operation_ids, LifecycleRequest, LifecycleResult, PackageState, RequestError,
    TargetState,
};
use xrpkg_device::{CommandExecutor, DeviceTransport, PromptAnswer};

use crate::{
    await_operations, install_in_progress, observe_package, supports_install_workflow,
    InstallError, PollSettings,
};

/// Substrings in the immediate response of a mutating command that mean the
/// device refused it.
const REJECTION_TOKENS: [&str; 2] = ["Error:", "Exception:"];

#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    pub poll: PollSettings,
    /// Answers sent with commands that may ask for confirmation.
    pub prompts: Vec<PromptAnswer>,
    pub verify_platform: bool,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            poll: PollSettings::default(),
            prompts: vec![PromptAnswer::confirm()],
            verify_platform: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
    pub text: String,
    pub interactive: bool,
}

impl InstallCommand {
    fn plain(text: String) -> Self {
        Self {
            text,
            interactive: false,
        }
    }

    fn interactive(text: String) -> Self {
        Self {
            text,
            interactive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleStep {
    Satisfied { message: String },
    Issue(InstallCommand),
}

/// Runs one lifecycle request against the device. State is re-read from the
/// device on every call; a request whose target already holds returns
/// `changed = false` without issuing any install command.
pub fn apply_lifecycle_request<T: DeviceTransport>(
    executor: &mut CommandExecutor<T>,
    request: &LifecycleRequest,
    options: &LifecycleOptions,
) -> Result<LifecycleResult, InstallError> {
    request.validate()?;

    if options.verify_platform && !supports_install_workflow(executor)? {
        return Err(InstallError::UnsupportedPlatform);
    }
    if install_in_progress(executor)? {
        return Err(InstallError::OperationInProgress);
    }

    // Commit never reads package membership.
    let step = if request.state == TargetState::Committed {
        commit_step(request)
    } else {
        let observed = observe_package(executor, &request.pkgname)?;
        plan_lifecycle_step(request, observed)?
    };

    match step {
        LifecycleStep::Satisfied { message } => {
            info!(
                package = %request.pkgname,
                state = %request.state,
                "package already in requested state"
            );
            Ok(LifecycleResult::unchanged(message))
        }
        LifecycleStep::Issue(command) => run_install_command(executor, &command, options),
    }
}

/// Decides what a request needs given the observed package state. Commit
/// ignores `observed`: it persists whatever set is active.
pub fn plan_lifecycle_step(
    request: &LifecycleRequest,
    observed: PackageState,
) -> Result<LifecycleStep, InstallError> {
    let name = request.pkgname.as_str();
    let satisfied = |message: String| -> Result<LifecycleStep, InstallError> {
        Ok(LifecycleStep::Satisfied { message })
    };
    let violation = || -> Result<LifecycleStep, InstallError> {
        Err(InstallError::PreconditionViolation {
            package: name.to_string(),
            target: request.state,
            observed,
        })
    };

    match (request.state, observed) {
        (TargetState::Committed, _) => Ok(commit_step(request)),
        (TargetState::Present, PackageState::Active)
        | (TargetState::Updated, PackageState::Active)
        | (TargetState::Activated, PackageState::Active) => {
            satisfied(format!("{name} package is already active\n"))
        }
        (TargetState::Present, PackageState::Added) => {
            satisfied(format!("{name} package is already added\n"))
        }
        (TargetState::Present, PackageState::Absent) => {
            let path = source_path(request)?;
            Ok(LifecycleStep::Issue(InstallCommand::plain(format!(
                "install add source {path} {}",
                request.package_file()
            ))))
        }
        (TargetState::Absent, PackageState::Active) => violation(),
        (TargetState::Absent, PackageState::Added) => Ok(LifecycleStep::Issue(
            InstallCommand::plain(format!("install remove {name}")),
        )),
        (TargetState::Absent, PackageState::Absent)
        | (TargetState::Deactivated, PackageState::Absent) => {
            satisfied(format!("{name} package has already been removed\n"))
        }
        (TargetState::Updated, PackageState::Added | PackageState::Absent) => {
            let path = source_path(request)?;
            Ok(LifecycleStep::Issue(InstallCommand::plain(format!(
                "install update source {path} {}",
                request.package_file()
            ))))
        }
        (TargetState::Activated, PackageState::Added) => Ok(LifecycleStep::Issue(
            InstallCommand::interactive(with_force(format!("install activate {name}"), request)),
        )),
        (TargetState::Activated, PackageState::Absent) => violation(),
        (TargetState::Deactivated, PackageState::Active) => Ok(LifecycleStep::Issue(
            InstallCommand::interactive(with_force(format!("install deactivate {name}"), request)),
        )),
        (TargetState::Deactivated, PackageState::Added) => {
            satisfied(format!("{name} package is already deactivated\n"))
        }
    }
}

fn commit_step(request: &LifecycleRequest) -> LifecycleStep {
    let mut text = "install commit".to_string();
    if let Some(label) = request.label.as_deref().filter(|label| !label.is_empty()) {
        text.push_str(&format!(" label {label}"));
    }
    LifecycleStep::Issue(InstallCommand::plain(text))
}

fn run_install_command<T: DeviceTransport>(
    executor: &mut CommandExecutor<T>,
    command: &InstallCommand,
    options: &LifecycleOptions,
) -> Result<LifecycleResult, InstallError> {
    info!(command = %command.text, "issuing install command");
    let response = if command.interactive && !options.prompts.is_empty() {
        executor.execute_with_prompts(&command.text, &options.prompts)?
    } else {
        executor.execute(&command.text)?
    };

    if REJECTION_TOKENS
        .iter()
        .any(|token| response.contains(token))
    {
        return Err(InstallError::CommandRejected {
            command: command.text.clone(),
            response,
        });
    }

    let operation_ids = extract_operation_ids(&response);
    let logs = await_operations(executor, &operation_ids, &options.poll)?;

    let mut stdout = Vec::with_capacity(logs.len() + 1);
    stdout.push(response);
    stdout.extend(logs);
    Ok(LifecycleResult::changed(stdout, operation_ids))
}

fn source_path(request: &LifecycleRequest) -> Result<&str, InstallError> {
    request
        .package_path()
        .ok_or_else(|| RequestError::MissingPackagePath(request.state).into())
}

fn with_force(mut text: String, request: &LifecycleRequest) -> String {
    if request.force {
        text.push_str(" force");
    }
    text
}
