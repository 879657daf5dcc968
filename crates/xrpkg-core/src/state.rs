use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RequestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Present,
    Absent,
    Updated,
    Activated,
    Deactivated,
    Committed,
}

impl TargetState {
    pub const ALL: [TargetState; 6] = [
        Self::Present,
        Self::Absent,
        Self::Updated,
        Self::Activated,
        Self::Deactivated,
        Self::Committed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Updated => "updated",
            Self::Activated => "activated",
            Self::Deactivated => "deactivated",
            Self::Committed => "committed",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "updated" => Some(Self::Updated),
            "activated" => Some(Self::Activated),
            "deactivated" => Some(Self::Deactivated),
            "committed" => Some(Self::Committed),
            _ => None,
        }
    }

    /// Targets that bring new bits onto the device need a source location.
    pub fn requires_package_path(self) -> bool {
        matches!(self, Self::Present | Self::Updated)
    }

    /// Whether `observed` already satisfies this target. `Committed` is never
    /// satisfied because commit state is not observable from package listings.
    pub fn is_satisfied_by(self, observed: PackageState) -> bool {
        match self {
            Self::Present => matches!(observed, PackageState::Active | PackageState::Added),
            Self::Absent => observed == PackageState::Absent,
            Self::Updated | Self::Activated => observed == PackageState::Active,
            Self::Deactivated => matches!(observed, PackageState::Added | PackageState::Absent),
            Self::Committed => false,
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetState {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| RequestError::UnknownTarget(s.to_string()))
    }
}

/// Package membership as reported by the device at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageState {
    Absent,
    Added,
    Active,
}

impl PackageState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Added => "added",
            Self::Active => "active",
        }
    }

    pub fn from_membership(active: bool, added: bool) -> Option<Self> {
        match (active, added) {
            (true, true) => None,
            (true, false) => Some(Self::Active),
            (false, true) => Some(Self::Added),
            (false, false) => Some(Self::Absent),
        }
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
