use super::*;
use std::collections::BTreeMap;
use std::time::Duration;

use xrpkg_core::{LifecycleRequest, PackageState, RequestError, TargetState, PACKAGE_FILE_SUFFIX};
use xrpkg_device::{
    CommandExecutor, CommandRequest, DeviceError, DeviceTransport, RetryPolicy, SendOutcome,
};

const OSPF: &str = "xrv9k-ospf-1.0.0.0-r61102I";
const TFTP: &str = "tftp://192.168.1.1";

/// In-memory IOS-XR install pipeline answering the commands the lifecycle
/// code sends.
#[derive(Debug, Default)]
struct SimulatedDevice {
    active: Vec<String>,
    inactive: Vec<String>,
    committed: Vec<String>,
    legacy: bool,
    busy_polls: u32,
    busy_after_command: u32,
    next_operation: u32,
    abort_next: bool,
    reject_next: bool,
    silent_next: bool,
    logs: BTreeMap<String, String>,
    sent: Vec<String>,
    prompted: Vec<String>,
}

impl SimulatedDevice {
    fn new() -> Self {
        Self {
            next_operation: 1,
            ..Self::default()
        }
    }

    fn with_active(mut self, name: &str) -> Self {
        self.active.push(name.to_string());
        self
    }

    fn with_inactive(mut self, name: &str) -> Self {
        self.inactive.push(name.to_string());
        self
    }

    fn mutating_commands(&self) -> Vec<&str> {
        self.sent
            .iter()
            .map(String::as_str)
            .filter(|command| command.starts_with("install "))
            .collect()
    }

    fn sent_after(&self, command: &str) -> Vec<&str> {
        self.sent
            .iter()
            .skip_while(|sent| sent.as_str() != command)
            .skip(1)
            .map(String::as_str)
            .collect()
    }

    fn respond(&mut self, command: &str) -> String {
        if command == SHOW_VERSION {
            return if self.legacy {
                "Cisco IOS XR Software, Version 5.3.3[Default]\nROM: System Bootstrap\n".to_string()
            } else {
                "Cisco IOS XR Software, Version 6.1.2\nCopyright (c) 2013-2016 by Cisco Systems, Inc.\n\nBuild Information:\n Built By     : ahoang\n".to_string()
            };
        }
        if command == SHOW_INSTALL_REQUEST {
            if self.busy_polls > 0 {
                self.busy_polls = self.busy_polls.saturating_sub(1);
                return "The install operation 9 is 40% complete\n".to_string();
            }
            return "No install operation in progress\n".to_string();
        }
        if command == SHOW_INSTALL_ACTIVE {
            return render_listing("Active Packages", &self.active);
        }
        if command == SHOW_INSTALL_INACTIVE {
            return render_listing("Inactive Packages", &self.inactive);
        }
        if let Some(id) = command.strip_prefix("show install log ") {
            return self
                .logs
                .get(id)
                .cloned()
                .unwrap_or_else(|| format!("No log information for operation {id}\n"));
        }
        self.apply_install(command)
    }

    fn apply_install(&mut self, command: &str) -> String {
        if self.reject_next {
            self.reject_next = false;
            return "Error: another install operation is in progress\n".to_string();
        }

        let aborted = std::mem::take(&mut self.abort_next);
        if !aborted {
            let tokens = command.split_whitespace().collect::<Vec<_>>();
            match tokens.as_slice() {
                ["install", "add", "source", _, file] => {
                    self.inactive.push(package_from_file(file));
                }
                ["install", "update", "source", _, file] => {
                    let name = package_from_file(file);
                    self.inactive.retain(|pkg| pkg != &name);
                    self.active.push(name);
                }
                ["install", "remove", name] => {
                    self.inactive.retain(|pkg| pkg != name);
                }
                ["install", "activate", name, ..] => {
                    self.inactive.retain(|pkg| pkg != name);
                    self.active.push(name.to_string());
                }
                ["install", "deactivate", name, ..] => {
                    self.active.retain(|pkg| pkg != name);
                    self.inactive.push(name.to_string());
                }
                ["install", "commit", ..] => {
                    self.committed = self.active.clone();
                }
                _ => return format!("% Invalid input detected at '^' marker.\n{command}\n"),
            }
        }

        self.busy_polls = self.busy_after_command;
        if std::mem::take(&mut self.silent_next) {
            return format!("{command}\n");
        }

        let id = self.next_operation.to_string();
        self.next_operation += 1;
        let outcome = if aborted {
            format!("Install operation {id} aborted")
        } else {
            format!("Install operation {id} finished successfully")
        };
        self.logs.insert(
            id.clone(),
            format!("Install operation {id} started by root:\n  {command}\n{outcome}\n"),
        );
        format!("Install operation {id} started by root:\n  {command}\nThe install operation will continue asynchronously.\n")
    }
}

impl DeviceTransport for SimulatedDevice {
    fn send(&mut self, request: &CommandRequest) -> SendOutcome {
        self.sent.push(request.command.clone());
        if !request.prompts.is_empty() {
            self.prompted.push(request.command.clone());
        }
        SendOutcome::Delivered(self.respond(&request.command))
    }
}

struct UnreachableDevice;

impl DeviceTransport for UnreachableDevice {
    fn send(&mut self, _request: &CommandRequest) -> SendOutcome {
        SendOutcome::Transient("connection timed out".to_string())
    }
}

fn render_listing(title: &str, packages: &[String]) -> String {
    let mut out = format!("Node 0/RP0/CPU0 [RP]\n  {title}: {}\n", packages.len());
    for package in packages {
        out.push_str(&format!("    {package}\n"));
    }
    out
}

fn package_from_file(file: &str) -> String {
    file.strip_suffix(PACKAGE_FILE_SUFFIX).unwrap_or(file).to_string()
}

fn executor(device: SimulatedDevice) -> CommandExecutor<SimulatedDevice> {
    CommandExecutor::new(device).with_policy(RetryPolicy::default().with_delay(Duration::ZERO))
}

fn fast_options() -> LifecycleOptions {
    LifecycleOptions {
        poll: PollSettings {
            interval: Duration::ZERO,
            max_polls: 5,
        },
        ..LifecycleOptions::default()
    }
}

fn request_for(state: TargetState) -> LifecycleRequest {
    let request = LifecycleRequest::new(state, OSPF);
    if state.requires_package_path() {
        request.with_pkgpath(TFTP)
    } else {
        request
    }
}

#[test]
fn present_from_absent_adds_package_and_polls_operation() {
    let mut device = SimulatedDevice::new();
    device.next_operation = 42;
    device.busy_after_command = 2;
    let mut executor = executor(device);

    let request = LifecycleRequest::new(TargetState::Present, "foo-1.0").with_pkgpath("tftp://10.0.0.1");
    let result = apply_lifecycle_request(&mut executor, &request, &fast_options())
        .expect("present should succeed");

    assert!(result.changed);
    assert_eq!(result.operation_ids, vec!["42"]);
    let device = executor.transport();
    assert_eq!(
        device.mutating_commands(),
        vec!["install add source tftp://10.0.0.1 foo-1.0.x86_64.rpm"]
    );
    assert!(device.sent.contains(&"show install log 42".to_string()));
    assert_eq!(device.inactive, vec!["foo-1.0"]);
}

#[test]
fn transcript_keeps_command_response_then_logs() {
    let mut executor = executor(SimulatedDevice::new());
    let result = apply_lifecycle_request(
        &mut executor,
        &request_for(TargetState::Present),
        &fast_options(),
    )
    .expect("present should succeed");

    assert_eq!(result.stdout.len(), 2);
    assert!(result.stdout[0].starts_with("Install operation 1 started by root:"));
    assert!(result.stdout[1].contains("Install operation 1 finished successfully"));
    assert_eq!(result.stdout_lines[1][0], "Install operation 1 started by root:");
}

#[test]
fn every_target_is_idempotent_on_second_call() {
    let cases = [
        (TargetState::Present, SimulatedDevice::new()),
        (TargetState::Updated, SimulatedDevice::new()),
        (TargetState::Activated, SimulatedDevice::new().with_inactive(OSPF)),
        (TargetState::Deactivated, SimulatedDevice::new().with_active(OSPF)),
        (TargetState::Absent, SimulatedDevice::new().with_inactive(OSPF)),
    ];

    for (state, device) in cases {
        let mut executor = executor(device);
        let request = request_for(state);

        let first = apply_lifecycle_request(&mut executor, &request, &fast_options())
            .unwrap_or_else(|err| panic!("first {state} call failed: {err}"));
        assert!(first.changed, "first {state} call should change the device");

        let mutations = executor.transport().mutating_commands().len();
        let second = apply_lifecycle_request(&mut executor, &request, &fast_options())
            .unwrap_or_else(|err| panic!("second {state} call failed: {err}"));
        assert!(!second.changed, "second {state} call should be a no-op");
        assert_eq!(
            executor.transport().mutating_commands().len(),
            mutations,
            "second {state} call must not issue install commands"
        );
    }
}

#[test]
fn commit_always_issues_command() {
    let mut executor = executor(SimulatedDevice::new().with_active(OSPF));
    let request = request_for(TargetState::Committed);

    for _ in 0..2 {
        let result = apply_lifecycle_request(&mut executor, &request, &fast_options())
            .expect("commit should succeed");
        assert!(result.changed);
    }
    let device = executor.transport();
    assert_eq!(device.mutating_commands(), vec!["install commit", "install commit"]);
    assert_eq!(device.committed, vec![OSPF]);
}

#[test]
fn commit_ignores_overlapping_package_listings() {
    let smu = format!("{OSPF}.CSCxr33333");
    let mut executor = executor(SimulatedDevice::new().with_active(OSPF).with_inactive(&smu));

    let result = apply_lifecycle_request(
        &mut executor,
        &request_for(TargetState::Committed),
        &fast_options(),
    )
    .expect("commit must not depend on package membership");

    assert!(result.changed);
    let device = executor.transport();
    assert_eq!(device.mutating_commands(), vec!["install commit"]);
    assert!(!device.sent.iter().any(|command| command == "show install active"
        || command == "show install inactive"));
}

#[test]
fn commit_label_and_activate_force_pass_through() {
    let mut executor = executor(SimulatedDevice::new().with_inactive(OSPF));

    apply_lifecycle_request(
        &mut executor,
        &request_for(TargetState::Activated).with_force(true),
        &fast_options(),
    )
    .expect("activate should succeed");
    apply_lifecycle_request(
        &mut executor,
        &request_for(TargetState::Committed).with_label("golden-2024"),
        &fast_options(),
    )
    .expect("commit should succeed");

    assert_eq!(
        executor.transport().mutating_commands(),
        vec![
            format!("install activate {OSPF} force").as_str(),
            "install commit label golden-2024",
        ]
    );
}

#[test]
fn activation_and_deactivation_carry_prompt_answers() {
    let mut executor = executor(SimulatedDevice::new().with_inactive(OSPF));

    apply_lifecycle_request(&mut executor, &request_for(TargetState::Activated), &fast_options())
        .expect("activate should succeed");
    apply_lifecycle_request(&mut executor, &request_for(TargetState::Deactivated), &fast_options())
        .expect("deactivate should succeed");

    assert_eq!(
        executor.transport().prompted,
        vec![
            format!("install activate {OSPF}"),
            format!("install deactivate {OSPF}")
        ]
    );
}

#[test]
fn absent_while_active_is_precondition_violation_without_commands() {
    let mut executor = executor(SimulatedDevice::new().with_active(OSPF));

    let err = apply_lifecycle_request(&mut executor, &request_for(TargetState::Absent), &fast_options())
        .expect_err("removing an active package must fail");

    assert_eq!(
        err,
        InstallError::PreconditionViolation {
            package: OSPF.to_string(),
            target: TargetState::Absent,
            observed: PackageState::Active,
        }
    );
    assert!(err.to_string().contains("please deactivate first"));
    assert!(executor.transport().mutating_commands().is_empty());
}

#[test]
fn activate_requires_package_to_be_present() {
    let mut executor = executor(SimulatedDevice::new());

    let err = apply_lifecycle_request(&mut executor, &request_for(TargetState::Activated), &fast_options())
        .expect_err("activating an absent package must fail");

    assert!(matches!(err, InstallError::PreconditionViolation { observed: PackageState::Absent, .. }));
    assert!(err.to_string().contains("must be present before activate"));
    assert!(executor.transport().mutating_commands().is_empty());
}

#[test]
fn running_operation_blocks_request_at_entry() {
    let mut device = SimulatedDevice::new();
    device.busy_polls = 1;
    let mut executor = executor(device);

    let err = apply_lifecycle_request(&mut executor, &request_for(TargetState::Present), &fast_options())
        .expect_err("busy device must reject the request");

    assert_eq!(err, InstallError::OperationInProgress);
    assert!(executor.transport().mutating_commands().is_empty());
}

#[test]
fn missing_pkgpath_fails_before_talking_to_device() {
    let mut executor = executor(SimulatedDevice::new());

    let err = apply_lifecycle_request(
        &mut executor,
        &LifecycleRequest::new(TargetState::Updated, OSPF),
        &fast_options(),
    )
    .expect_err("update without path must fail");

    assert_eq!(
        err,
        InstallError::InvalidRequest(RequestError::MissingPackagePath(TargetState::Updated))
    );
    assert!(executor.transport().sent.is_empty());
}

#[test]
fn legacy_platform_is_rejected_unless_check_disabled() {
    let mut device = SimulatedDevice::new();
    device.legacy = true;
    let mut executor = executor(device);

    let err = apply_lifecycle_request(&mut executor, &request_for(TargetState::Present), &fast_options())
        .expect_err("32-bit IOS-XR must be rejected");
    assert_eq!(err, InstallError::UnsupportedPlatform);

    let options = LifecycleOptions {
        verify_platform: false,
        ..fast_options()
    };
    let result = apply_lifecycle_request(&mut executor, &request_for(TargetState::Present), &options)
        .expect("platform check disabled");
    assert!(result.changed);
}

#[test]
fn contradictory_membership_is_surfaced() {
    let mut executor = executor(SimulatedDevice::new().with_active(OSPF).with_inactive(OSPF));

    let err = apply_lifecycle_request(&mut executor, &request_for(TargetState::Deactivated), &fast_options())
        .expect_err("package in both sets must fail");

    assert_eq!(
        err,
        InstallError::InconsistentPackageState {
            package: OSPF.to_string()
        }
    );
}

#[test]
fn name_prefix_matches_longer_listed_package() {
    let mut executor = executor(SimulatedDevice::new().with_active("foo-1.0.1"));

    let observed = observe_package(&mut executor, "foo-1.0").expect("query should succeed");
    assert_eq!(observed, PackageState::Active);
}

#[test]
fn aborted_log_fails_with_log_line() {
    let mut device = SimulatedDevice::new();
    device.abort_next = true;
    device.next_operation = 42;
    let mut executor = executor(device);

    let err = apply_lifecycle_request(&mut executor, &request_for(TargetState::Present), &fast_options())
        .expect_err("aborted operation must fail");

    match err {
        InstallError::OperationAborted {
            operation_id,
            line,
            log,
        } => {
            assert_eq!(operation_id, "42");
            assert_eq!(line, "Install operation 42 aborted");
            assert!(log.starts_with("Install operation 42 started by root:"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn rejected_command_is_fatal_and_not_polled() {
    let mut device = SimulatedDevice::new();
    device.reject_next = true;
    let mut executor = executor(device);

    let err = apply_lifecycle_request(&mut executor, &request_for(TargetState::Present), &fast_options())
        .expect_err("rejected command must fail");

    let command = format!("install add source {TFTP} {OSPF}.x86_64.rpm");
    assert!(matches!(err, InstallError::CommandRejected { command: ref sent, .. } if *sent == command));
    assert!(executor.transport().sent_after(&command).is_empty());
}

#[test]
fn synchronous_command_without_ids_still_changes() {
    let mut device = SimulatedDevice::new().with_active(OSPF);
    device.silent_next = true;
    let mut executor = executor(device);

    let result = apply_lifecycle_request(&mut executor, &request_for(TargetState::Committed), &fast_options())
        .expect("commit should succeed");

    assert!(result.changed);
    assert!(result.operation_ids.is_empty());
    assert_eq!(result.stdout, vec!["install commit\n"]);
    assert!(!executor
        .transport()
        .sent
        .iter()
        .any(|command| command.starts_with("show install log")));
}

#[test]
fn delivery_timeout_surfaces_as_device_error() {
    let mut executor = CommandExecutor::new(UnreachableDevice)
        .with_policy(RetryPolicy::default().with_delay(Duration::ZERO));

    let err = apply_lifecycle_request(&mut executor, &request_for(TargetState::Committed), &fast_options())
        .expect_err("unreachable device must fail");

    assert_eq!(
        err,
        InstallError::Device(DeviceError::CommandDeliveryTimeout {
            command: SHOW_VERSION.to_string(),
            attempts: 5,
            last_error: "connection timed out".to_string(),
        })
    );
}

#[test]
fn poll_timeout_fetches_no_logs() {
    let mut device = SimulatedDevice::new();
    device.busy_polls = u32::MAX;
    let mut executor = executor(device);
    let settings = PollSettings {
        interval: Duration::ZERO,
        max_polls: 3,
    };

    let err = await_operations(&mut executor, &["7".to_string()], &settings)
        .expect_err("busy device must time out");

    assert_eq!(
        err,
        InstallError::OperationTimeout {
            operation_ids: vec!["7".to_string()],
            polls: 3,
        }
    );
    let device = executor.transport();
    assert_eq!(device.sent, vec![SHOW_INSTALL_REQUEST; 3]);
}

#[test]
fn poll_timeout_during_lifecycle_reports_operation() {
    let mut device = SimulatedDevice::new();
    device.busy_after_command = u32::MAX;
    let mut executor = executor(device);

    let err = apply_lifecycle_request(&mut executor, &request_for(TargetState::Present), &fast_options())
        .expect_err("operation that never finishes must time out");

    assert!(matches!(err, InstallError::OperationTimeout { ref operation_ids, polls: 5 } if operation_ids == &["1"]));
    assert!(!executor
        .transport()
        .sent
        .iter()
        .any(|command| command.starts_with("show install log")));
}

#[test]
fn abort_check_runs_after_every_log_is_fetched() {
    let mut device = SimulatedDevice::new();
    device.logs.insert(
        "3".to_string(),
        "Install operation 3 started\nInstall operation 3 aborted\n".to_string(),
    );
    device.logs.insert(
        "4".to_string(),
        "Install operation 4 started\nInstall operation 4 finished successfully\n".to_string(),
    );
    let mut executor = executor(device);

    let err = await_operations(
        &mut executor,
        &["3".to_string(), "4".to_string()],
        &PollSettings::default(),
    )
    .expect_err("aborted log must fail");

    assert!(matches!(err, InstallError::OperationAborted { ref operation_id, .. } if operation_id == "3"));
    let device = executor.transport();
    assert!(device.sent.contains(&"show install log 3".to_string()));
    assert!(device.sent.contains(&"show install log 4".to_string()));
}

#[test]
fn clean_logs_are_returned_in_input_order() {
    let mut device = SimulatedDevice::new();
    device.busy_polls = 2;
    device.logs.insert("8".to_string(), "log eight".to_string());
    device.logs.insert("2".to_string(), "log two".to_string());
    let mut executor = executor(device);
    let settings = PollSettings {
        interval: Duration::ZERO,
        max_polls: 3,
    };

    let logs = await_operations(&mut executor, &["8".to_string(), "2".to_string()], &settings)
        .expect("operations should complete");

    assert_eq!(logs, vec!["log eight", "log two"]);
}

#[test]
fn abort_token_is_case_sensitive() {
    let mut device = SimulatedDevice::new();
    device.logs.insert(
        "5".to_string(),
        "Install operation 5 Aborted by user request\n".to_string(),
    );
    let mut executor = executor(device);

    let logs = await_operations(&mut executor, &["5".to_string()], &PollSettings::default())
        .expect("capitalised token is not the abort marker");
    assert_eq!(logs.len(), 1);
}

#[test]
fn poll_settings_from_max_wait() {
    let settings = PollSettings::from_max_wait(Duration::from_secs(300), Duration::from_secs(3));
    assert_eq!(settings, PollSettings::default());
    assert_eq!(settings.max_wait(), Duration::from_secs(300));

    let tiny = PollSettings::from_max_wait(Duration::from_secs(1), Duration::from_secs(3));
    assert_eq!(tiny.max_polls, 1);
}

#[test]
fn planning_agrees_with_satisfaction_table() {
    let observations = [PackageState::Absent, PackageState::Added, PackageState::Active];
    for state in TargetState::ALL {
        for observed in observations {
            let request = request_for(state);
            match plan_lifecycle_step(&request, observed) {
                Ok(LifecycleStep::Satisfied { .. }) => {
                    assert!(state.is_satisfied_by(observed), "{state} from {observed}")
                }
                Ok(LifecycleStep::Issue(_)) | Err(InstallError::PreconditionViolation { .. }) => {
                    assert!(!state.is_satisfied_by(observed), "{state} from {observed}")
                }
                Err(other) => panic!("unexpected planning error: {other}"),
            }
        }
    }
}

#[test]
fn update_plans_update_command_from_added() {
    let step = plan_lifecycle_step(&request_for(TargetState::Updated), PackageState::Added)
        .expect("update should plan");
    assert_eq!(
        step,
        LifecycleStep::Issue(InstallCommand {
            text: format!("install update source {TFTP} {OSPF}.x86_64.rpm"),
            interactive: false,
        })
    );
}
