use std::io::{self, Read};
use std::process::{ChildStdout, Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::{converse, CommandRequest, DeviceTransport, SendOutcome};

pub const XR_CLI_DEFAULT_SHELL: &str = "/bin/bash";
pub const XR_CLI_DEFAULT_WRAPPER: &str =
    "source /etc/profile ; PATH=/pkg/sbin:/pkg/bin:${PATH} nsenter -t 1 -n -- xr_cli '{command}'";
/// How long an interactive command may stay silent before it is killed.
pub const XR_CLI_DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

const READ_CHUNK: usize = 4096;

/// Runs commands on-box by handing them to `xr_cli` inside the XR network
/// namespace. `{command}` in the wrapper is replaced by the single-quote
/// escaped command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrCliTransport {
    shell: String,
    wrapper: String,
    idle_timeout: Duration,
}

impl Default for XrCliTransport {
    fn default() -> Self {
        Self::new(XR_CLI_DEFAULT_SHELL, XR_CLI_DEFAULT_WRAPPER)
    }
}

impl XrCliTransport {
    pub fn new(shell: impl Into<String>, wrapper: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            wrapper: wrapper.into(),
            idle_timeout: XR_CLI_DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn render(&self, command: &str) -> String {
        self.wrapper
            .replace("{command}", &escape_single_quote_shell(command))
    }

    pub fn build_command(&self, command: &str) -> Command {
        let mut process = Command::new(&self.shell);
        process.arg("-c").arg(self.render(command));
        process
    }

    fn run_interactive(&self, request: &CommandRequest) -> SendOutcome {
        let mut process = self.build_command(&request.command);
        process
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(err) => return classify_spawn_error(&self.shell, err),
        };

        let (Some(stdout), Some(mut stdin)) = (child.stdout.take(), child.stdin.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return SendOutcome::Transient("xr_cli stdio was not piped".to_string());
        };
        let mut output = ChannelReader::new(spawn_output_pump(stdout), self.idle_timeout);
        let conversation = converse(&mut output, &mut stdin, &request.prompts, None);
        drop(stdin);

        let response = match conversation {
            Ok(response) => response,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return SendOutcome::Transient(format!("xr_cli conversation failed: {err}"));
            }
        };

        match child.wait() {
            Ok(status) if status.code().is_some() => SendOutcome::Delivered(response),
            Ok(status) => {
                SendOutcome::Transient(format!("xr_cli terminated abnormally: {status}"))
            }
            Err(err) => SendOutcome::Transient(format!("failed waiting for xr_cli: {err}")),
        }
    }
}

impl DeviceTransport for XrCliTransport {
    fn send(&mut self, request: &CommandRequest) -> SendOutcome {
        debug!(command = %request.command, "sending command through xr_cli");
        if !request.prompts.is_empty() {
            return self.run_interactive(request);
        }

        match self.build_command(&request.command).output() {
            Ok(output) => classify_output(output),
            Err(err) => classify_spawn_error(&self.shell, err),
        }
    }
}

/// Reads the child's stdout on a helper thread so the conversation can give
/// up when the device stops talking, e.g. on a question no prompt answers.
fn spawn_output_pump(mut stdout: ChildStdout) -> Receiver<io::Result<Vec<u8>>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            match stdout.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => {
                    if sender.send(Ok(chunk[..read].to_vec())).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    let _ = sender.send(Err(err));
                    break;
                }
            }
        }
    });
    receiver
}

struct ChannelReader {
    chunks: Receiver<io::Result<Vec<u8>>>,
    idle_timeout: Duration,
    pending: Vec<u8>,
    offset: usize,
}

impl ChannelReader {
    fn new(chunks: Receiver<io::Result<Vec<u8>>>, idle_timeout: Duration) -> Self {
        Self {
            chunks,
            idle_timeout,
            pending: Vec::new(),
            offset: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.offset == self.pending.len() {
            match self.chunks.recv_timeout(self.idle_timeout) {
                Ok(Ok(chunk)) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                Ok(Err(err)) => return Err(err),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no output for {:?}", self.idle_timeout),
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let count = buf.len().min(self.pending.len() - self.offset);
        buf[..count].copy_from_slice(&self.pending[self.offset..self.offset + count]);
        self.offset += count;
        Ok(count)
    }
}

fn classify_output(output: Output) -> SendOutcome {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.code().is_none() {
        return SendOutcome::Transient(format!("xr_cli terminated abnormally: {}", output.status));
    }
    if !output.status.success() && stdout.trim().is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return SendOutcome::Transient(format!(
            "xr_cli exited with {} stderr='{}'",
            output.status,
            stderr.trim()
        ));
    }
    SendOutcome::Delivered(stdout)
}

fn classify_spawn_error(shell: &str, err: io::Error) -> SendOutcome {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            SendOutcome::Fatal(format!("cannot start shell '{shell}': {err}"))
        }
        _ => SendOutcome::Transient(format!("failed to start shell '{shell}': {err}")),
    }
}

fn escape_single_quote_shell(value: &str) -> String {
    value.replace('\'', "'\\''")
}
