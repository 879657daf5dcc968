use std::sync::LazyLock;

use regex::Regex;

static OPERATION_STARTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"operation (\d+) started").expect("operation id pattern must compile")
});

/// Returns every install operation id announced in `response`, in the order
/// the device printed them. Reprinted ids are kept; callers de-duplicate.
pub fn extract_operation_ids(response: &str) -> Vec<String> {
    OPERATION_STARTED
        .captures_iter(response)
        .filter_map(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
        .collect()
}
