use regex::bytes::Regex;

/// IOS-XR confirmation prompt printed by `install activate` and friends,
/// e.g. `Proceed with activation? [yes/no]:[no] `.
pub const CONFIRM_PROMPT_PATTERN: &str = r"[\r\n]?\[yes/no\]:\[\w+\]\s";
pub const CONFIRM_PROMPT_ANSWER: &str = "yes";

#[derive(Debug, Clone)]
pub struct PromptAnswer {
    pub pattern: Regex,
    pub answer: String,
}

impl PromptAnswer {
    pub fn new(pattern: &str, answer: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            answer: answer.into(),
        })
    }

    pub fn confirm() -> Self {
        Self {
            pattern: Regex::new(CONFIRM_PROMPT_PATTERN).expect("confirm prompt pattern must compile"),
            answer: CONFIRM_PROMPT_ANSWER.to_string(),
        }
    }
}

/// One command to deliver. Prompt answers travel with the request so each
/// call decides which interactive questions it is prepared to answer.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: String,
    pub prompts: Vec<PromptAnswer>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            prompts: Vec::new(),
        }
    }

    pub fn with_prompts(mut self, prompts: Vec<PromptAnswer>) -> Self {
        self.prompts = prompts;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered(String),
    /// The attempt failed in a way a later attempt may not.
    Transient(String),
    /// Retrying cannot help (missing binary, permissions).
    Fatal(String),
}

#[cfg_attr(test, mockall::automock)]
pub trait DeviceTransport {
    fn send(&mut self, request: &CommandRequest) -> SendOutcome;
}

impl<T: DeviceTransport + ?Sized> DeviceTransport for Box<T> {
    fn send(&mut self, request: &CommandRequest) -> SendOutcome {
        (**self).send(request)
    }
}
