use tracing::debug;
use xrpkg_core::PackageState;
use xrpkg_device::{CommandExecutor, DeviceError, DeviceTransport};

use crate::InstallError;

pub const SHOW_VERSION: &str = "show version";
pub const SHOW_INSTALL_REQUEST: &str = "show install request";
pub const SHOW_INSTALL_ACTIVE: &str = "show install active";
pub const SHOW_INSTALL_INACTIVE: &str = "show install inactive";

pub const NO_INSTALL_IN_PROGRESS: &str = "No install operation in progress";
/// Only 64-bit IOS-XR prints this section in `show version`.
pub const BUILD_INFORMATION_TOKEN: &str = "Build Information:";

pub fn supports_install_workflow<T: DeviceTransport>(
    executor: &mut CommandExecutor<T>,
) -> Result<bool, DeviceError> {
    let response = executor.execute(SHOW_VERSION)?;
    Ok(response.contains(BUILD_INFORMATION_TOKEN))
}

pub fn install_in_progress<T: DeviceTransport>(
    executor: &mut CommandExecutor<T>,
) -> Result<bool, DeviceError> {
    let response = executor.execute(SHOW_INSTALL_REQUEST)?;
    Ok(!response.contains(NO_INSTALL_IN_PROGRESS))
}

// Plain substring containment: `foo-1.0` also matches a listed `foo-1.0.1`.
pub fn package_active<T: DeviceTransport>(
    executor: &mut CommandExecutor<T>,
    pkg_name: &str,
) -> Result<bool, DeviceError> {
    let response = executor.execute(SHOW_INSTALL_ACTIVE)?;
    Ok(response.contains(pkg_name))
}

pub fn package_added<T: DeviceTransport>(
    executor: &mut CommandExecutor<T>,
    pkg_name: &str,
) -> Result<bool, DeviceError> {
    let response = executor.execute(SHOW_INSTALL_INACTIVE)?;
    Ok(response.contains(pkg_name))
}

pub fn observe_package<T: DeviceTransport>(
    executor: &mut CommandExecutor<T>,
    pkg_name: &str,
) -> Result<PackageState, InstallError> {
    let active = package_active(executor, pkg_name)?;
    let added = package_added(executor, pkg_name)?;
    let observed = PackageState::from_membership(active, added).ok_or_else(|| {
        InstallError::InconsistentPackageState {
            package: pkg_name.to_string(),
        }
    })?;
    debug!(package = pkg_name, state = %observed, "observed package state");
    Ok(observed)
}

pub fn show_install_log<T: DeviceTransport>(
    executor: &mut CommandExecutor<T>,
    operation_id: &str,
) -> Result<String, DeviceError> {
    executor.execute(&format!("show install log {operation_id}"))
}
