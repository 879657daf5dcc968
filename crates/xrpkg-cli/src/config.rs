use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use xrpkg_device::{
    PromptAnswer, RetryPolicy, XrCliTransport, CONFIRM_PROMPT_ANSWER, CONFIRM_PROMPT_PATTERN,
    XR_CLI_DEFAULT_IDLE_TIMEOUT, XR_CLI_DEFAULT_SHELL, XR_CLI_DEFAULT_WRAPPER,
};
use xrpkg_installer::{LifecycleOptions, PollSettings};

pub const CONFIG_ENV: &str = "XRPKG_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/xrpkg/config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XrpkgConfig {
    pub executor: ExecutorConfig,
    pub poll: PollConfig,
    pub platform: PlatformConfig,
    pub prompts: Vec<PromptConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    pub attempts: u32,
    pub retry_delay_secs: u64,
    pub idle_timeout_secs: u64,
    pub shell: String,
    pub wrapper: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub max_polls: u32,
    /// Replaces `max_polls` with `max_wait_secs / interval_secs` polls when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wait_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    pub verify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    pub pattern: String,
    pub answer: String,
}

impl Default for XrpkgConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            poll: PollConfig::default(),
            platform: PlatformConfig::default(),
            prompts: vec![PromptConfig {
                pattern: CONFIRM_PROMPT_PATTERN.to_string(),
                answer: CONFIRM_PROMPT_ANSWER.to_string(),
            }],
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.max_attempts,
            retry_delay_secs: policy.delay.as_secs(),
            idle_timeout_secs: XR_CLI_DEFAULT_IDLE_TIMEOUT.as_secs(),
            shell: XR_CLI_DEFAULT_SHELL.to_string(),
            wrapper: XR_CLI_DEFAULT_WRAPPER.to_string(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        let settings = PollSettings::default();
        Self {
            interval_secs: settings.interval.as_secs(),
            max_polls: settings.max_polls,
            max_wait_secs: None,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self { verify: true }
    }
}

impl XrpkgConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.executor.attempts)
            .with_delay(Duration::from_secs(self.executor.retry_delay_secs))
    }

    pub fn poll_settings(&self) -> PollSettings {
        let interval = Duration::from_secs(self.poll.interval_secs);
        match self.poll.max_wait_secs {
            Some(max_wait) => {
                PollSettings::from_max_wait(Duration::from_secs(max_wait), interval)
            }
            None => PollSettings {
                interval,
                max_polls: self.poll.max_polls,
            },
        }
    }

    pub fn transport(&self) -> XrCliTransport {
        XrCliTransport::new(&self.executor.shell, &self.executor.wrapper)
            .with_idle_timeout(Duration::from_secs(self.executor.idle_timeout_secs))
    }

    pub fn prompt_answers(&self) -> Result<Vec<PromptAnswer>> {
        self.prompts
            .iter()
            .map(|prompt| {
                PromptAnswer::new(&prompt.pattern, &prompt.answer)
                    .with_context(|| format!("invalid prompt pattern: {}", prompt.pattern))
            })
            .collect()
    }

    pub fn lifecycle_options(&self) -> Result<LifecycleOptions> {
        Ok(LifecycleOptions {
            poll: self.poll_settings(),
            prompts: self.prompt_answers()?,
            verify_platform: self.platform.verify,
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render xrpkg config")
    }

    fn validate(&self) -> Result<()> {
        if self.executor.shell.trim().is_empty() {
            return Err(anyhow!("executor.shell must not be empty"));
        }
        if !self.executor.wrapper.contains("{command}") {
            return Err(anyhow!(
                "executor.wrapper must contain the {{command}} placeholder"
            ));
        }
        if self.poll.max_polls == 0 {
            return Err(anyhow!("poll.max_polls must be at least 1"));
        }
        if self.executor.idle_timeout_secs == 0 {
            return Err(anyhow!("executor.idle_timeout_secs must be at least 1"));
        }
        for prompt in self.prompt_answers()? {
            if prompt.pattern.is_match(b"") {
                return Err(anyhow!(
                    "prompt pattern must not match empty text: {}",
                    prompt.pattern.as_str()
                ));
            }
        }
        Ok(())
    }
}

pub fn parse_config(raw: &str) -> Result<XrpkgConfig> {
    let config: XrpkgConfig = toml::from_str(raw).context("failed to parse xrpkg config")?;
    config.validate()?;
    Ok(config)
}

/// Loads the config from `explicit`, then `$XRPKG_CONFIG`, then the default
/// path. Only the default path may be missing.
pub fn load_config(explicit: Option<&Path>) -> Result<XrpkgConfig> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match std::env::var_os(CONFIG_ENV) {
            Some(path) => (PathBuf::from(path), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        },
    };

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
            return Ok(XrpkgConfig::default());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read xrpkg config: {}", path.display()));
        }
    };

    parse_config(&raw).with_context(|| format!("invalid xrpkg config: {}", path.display()))
}
