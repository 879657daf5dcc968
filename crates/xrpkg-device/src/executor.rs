use std::thread::sleep;
use std::time::Duration;

use tracing::{debug, warn};

use crate::{CommandRequest, DeviceError, DeviceTransport, PromptAnswer, SendOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Delivers commands through a [`DeviceTransport`], retrying transient
/// failures under a [`RetryPolicy`]. Only delivery is retried; the executor
/// never inspects the response text.
pub struct CommandExecutor<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: DeviceTransport> CommandExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn execute(&mut self, command: &str) -> Result<String, DeviceError> {
        self.send(&CommandRequest::new(command))
    }

    pub fn execute_with_prompts(
        &mut self,
        command: &str,
        prompts: &[PromptAnswer],
    ) -> Result<String, DeviceError> {
        self.send(&CommandRequest::new(command).with_prompts(prompts.to_vec()))
    }

    pub fn send(&mut self, request: &CommandRequest) -> Result<String, DeviceError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.transport.send(request) {
                SendOutcome::Delivered(response) => {
                    debug!(command = %request.command, attempt, "command delivered");
                    return Ok(response);
                }
                SendOutcome::Fatal(reason) => {
                    return Err(DeviceError::TransportFailed {
                        command: request.command.clone(),
                        reason,
                    });
                }
                SendOutcome::Transient(reason) => {
                    warn!(
                        command = %request.command,
                        attempt,
                        attempts,
                        "command delivery failed: {reason}"
                    );
                    last_error = reason;
                    if attempt < attempts && !self.policy.delay.is_zero() {
                        sleep(self.policy.delay);
                    }
                }
            }
        }

        Err(DeviceError::CommandDeliveryTimeout {
            command: request.command.clone(),
            attempts,
            last_error,
        })
    }
}
