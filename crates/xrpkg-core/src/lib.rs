mod operation;
mod request;
mod result;
mod state;

pub use operation::extract_operation_ids;
pub use request::{LifecycleRequest, RequestError, PACKAGE_FILE_SUFFIX};
pub use result::LifecycleResult;
pub use state::{PackageState, TargetState};
