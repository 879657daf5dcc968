use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("too many timeouts trying to send command `{command}` ({attempts} attempts): {last_error}")]
    CommandDeliveryTimeout {
        command: String,
        attempts: u32,
        last_error: String,
    },

    #[error("transport failed sending command `{command}`: {reason}")]
    TransportFailed { command: String, reason: String },
}
