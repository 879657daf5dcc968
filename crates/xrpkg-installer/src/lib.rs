mod error;
mod inspect;
mod lifecycle;
mod poll;

pub use error::InstallError;
pub use inspect::{
    install_in_progress, observe_package, package_active, package_added, show_install_log,
    supports_install_workflow, BUILD_INFORMATION_TOKEN, NO_INSTALL_IN_PROGRESS, SHOW_INSTALL_ACTIVE,
    SHOW_INSTALL_INACTIVE, SHOW_INSTALL_REQUEST, SHOW_VERSION,
};
pub use lifecycle::{
    apply_lifecycle_request, plan_lifecycle_step, InstallCommand, LifecycleOptions, LifecycleStep,
};
pub use poll::{await_operations, PollSettings, ABORTED_TOKEN};

#[cfg(test)]
mod tests;
