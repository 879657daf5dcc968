mod conversation;
mod error;
mod executor;
mod transport;
mod xr_cli;

pub use conversation::converse;
pub use error::DeviceError;
pub use executor::{CommandExecutor, RetryPolicy};
pub use transport::{
    CommandRequest, DeviceTransport, PromptAnswer, SendOutcome, CONFIRM_PROMPT_ANSWER,
    CONFIRM_PROMPT_PATTERN,
};
pub use xr_cli::{
    XrCliTransport, XR_CLI_DEFAULT_IDLE_TIMEOUT, XR_CLI_DEFAULT_SHELL, XR_CLI_DEFAULT_WRAPPER,
};
