use serde::Serialize;

/// Outcome of one lifecycle invocation. `stdout` holds one entry per logical
/// device response in call order; `stdout_lines` is the same text split on
/// line boundaries for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleResult {
    pub changed: bool,
    pub stdout: Vec<String>,
    pub stdout_lines: Vec<Vec<String>>,
    pub operation_ids: Vec<String>,
}

impl LifecycleResult {
    pub fn unchanged(message: impl Into<String>) -> Self {
        Self::from_parts(false, vec![message.into()], Vec::new())
    }

    pub fn changed(stdout: Vec<String>, operation_ids: Vec<String>) -> Self {
        Self::from_parts(true, stdout, operation_ids)
    }

    fn from_parts(changed: bool, stdout: Vec<String>, operation_ids: Vec<String>) -> Self {
        let stdout_lines = stdout
            .iter()
            .map(|response| response.lines().map(str::to_string).collect())
            .collect();
        Self {
            changed,
            stdout,
            stdout_lines,
            operation_ids,
        }
    }
}
