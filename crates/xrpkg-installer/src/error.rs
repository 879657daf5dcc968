use thiserror::Error;
use xrpkg_core::{PackageState, RequestError, TargetState};
use xrpkg_device::DeviceError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("use the 32-bit install workflow: this device does not run 64-bit IOS-XR")]
    UnsupportedPlatform,

    #[error("other install operation in progress")]
    OperationInProgress,

    #[error("{package} is {observed}, cannot reach '{target}': {}", precondition_hint(.target))]
    PreconditionViolation {
        package: String,
        target: TargetState,
        observed: PackageState,
    },

    #[error("package {package} is reported both active and inactive")]
    InconsistentPackageState { package: String },

    #[error("device rejected `{command}`: {}", .response.trim())]
    CommandRejected { command: String, response: String },

    #[error("timeout waiting for install to complete after {polls} polls (operations: [{}])", .operation_ids.join(", "))]
    OperationTimeout {
        operation_ids: Vec<String>,
        polls: u32,
    },

    #[error("install operation {operation_id} aborted: {line}")]
    OperationAborted {
        operation_id: String,
        line: String,
        log: String,
    },
}

fn precondition_hint(target: &TargetState) -> &'static str {
    match target {
        TargetState::Absent => "please deactivate first",
        TargetState::Activated => "must be present before activate",
        _ => "transition not supported from this state",
    }
}
