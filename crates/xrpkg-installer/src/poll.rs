use std::thread::sleep;
use std::time::Duration;

use tracing::{debug, info};
use xrpkg_device::{CommandExecutor, DeviceTransport};

use crate::{install_in_progress, show_install_log, InstallError};

/// Case-sensitive marker the device writes into the log of a failed operation.
pub const ABORTED_TOKEN: &str = "aborted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_polls: 100,
        }
    }
}

impl PollSettings {
    /// Spreads `max_wait` over polls `interval` apart, with at least one poll.
    pub fn from_max_wait(max_wait: Duration, interval: Duration) -> Self {
        let max_polls = if interval.is_zero() {
            1
        } else {
            (max_wait.as_millis() / interval.as_millis().max(1)).max(1)
        };
        Self {
            interval,
            max_polls: u32::try_from(max_polls).unwrap_or(u32::MAX),
        }
    }

    pub fn max_wait(&self) -> Duration {
        self.interval.saturating_mul(self.max_polls)
    }
}

/// Blocks until the device reports no install operation in progress, then
/// returns the log of every operation in `operation_ids`, in input order.
///
/// Logs are only inspected for [`ABORTED_TOKEN`] after polling finishes. No
/// log is fetched when the poll budget runs out.
pub fn await_operations<T: DeviceTransport>(
    executor: &mut CommandExecutor<T>,
    operation_ids: &[String],
    settings: &PollSettings,
) -> Result<Vec<String>, InstallError> {
    debug!(
        operations = ?operation_ids,
        max_wait = ?settings.max_wait(),
        "waiting for install operations"
    );
    let mut remaining = settings.max_polls;
    loop {
        if remaining == 0 {
            return Err(InstallError::OperationTimeout {
                operation_ids: operation_ids.to_vec(),
                polls: settings.max_polls,
            });
        }
        if !install_in_progress(executor)? {
            break;
        }
        remaining -= 1;
        debug!(
            remaining,
            operations = ?operation_ids,
            "install operation still in progress"
        );
        if !settings.interval.is_zero() {
            sleep(settings.interval);
        }
    }

    let mut logs = Vec::with_capacity(operation_ids.len());
    for operation_id in operation_ids {
        logs.push(show_install_log(executor, operation_id)?);
    }

    for (operation_id, log) in operation_ids.iter().zip(&logs) {
        if log.contains(ABORTED_TOKEN) {
            let line = log
                .lines()
                .find(|line| line.contains(ABORTED_TOKEN))
                .unwrap_or(log.as_str())
                .trim()
                .to_string();
            return Err(InstallError::OperationAborted {
                operation_id: operation_id.clone(),
                line,
                log: log.clone(),
            });
        }
    }

    info!(operations = ?operation_ids, "install operations completed");
    Ok(logs)
}
