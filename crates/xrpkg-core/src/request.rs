use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TargetState;

/// Extension appended to a package name to form the file fetched by
/// `install add` and `install update`.
pub const PACKAGE_FILE_SUFFIX: &str = ".x86_64.rpm";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("package name must not be empty")]
    EmptyPackageName,

    #[error("package path required for state '{0}'")]
    MissingPackagePath(TargetState),

    #[error("unknown package state '{0}': expected one of present, absent, updated, activated, deactivated, committed")]
    UnknownTarget(String),

    #[error("{field} must not contain line breaks")]
    MultilineValue { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRequest {
    pub state: TargetState,
    pub pkgname: String,
    #[serde(default)]
    pub pkgpath: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub force: bool,
}

impl LifecycleRequest {
    pub fn new(state: TargetState, pkgname: impl Into<String>) -> Self {
        Self {
            state,
            pkgname: pkgname.into(),
            pkgpath: None,
            label: None,
            force: false,
        }
    }

    pub fn with_pkgpath(mut self, pkgpath: impl Into<String>) -> Self {
        self.pkgpath = Some(pkgpath.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.pkgname.trim().is_empty() {
            return Err(RequestError::EmptyPackageName);
        }
        let fields = [
            ("pkgname", Some(self.pkgname.as_str())),
            ("pkgpath", self.pkgpath.as_deref()),
            ("label", self.label.as_deref()),
        ];
        for (field, value) in fields {
            if value.is_some_and(|value| value.contains(['\n', '\r'])) {
                return Err(RequestError::MultilineValue { field });
            }
        }
        if self.state.requires_package_path() && self.package_path().is_none() {
            return Err(RequestError::MissingPackagePath(self.state));
        }
        Ok(())
    }

    pub fn package_path(&self) -> Option<&str> {
        self.pkgpath
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }

    pub fn package_file(&self) -> String {
        format!("{}{}", self.pkgname, PACKAGE_FILE_SUFFIX)
    }
}
