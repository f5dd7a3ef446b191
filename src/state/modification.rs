/// Modification state definitions for change detection
///
/// This module defines how an entity relates to the previous crawl of the
/// same source.
use std::fmt;

/// Classification of an entity relative to a prior crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModificationState {
    /// Entity has never been seen before
    #[default]
    New,

    /// Entity was seen before but its fingerprint changed
    Modified,

    /// Entity was seen before with the same fingerprint
    Unmodified,

    /// Processing the entity failed; the record carries the error fields
    Error,
}

impl ModificationState {
    /// Returns true if the entity content has to be materialized
    pub fn needs_materialize(&self) -> bool {
        matches!(self, Self::New | Self::Modified)
    }

    /// Returns true if this represents a failed entity
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Converts the state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Modified => "modified",
            Self::Unmodified => "unmodified",
            Self::Error => "error",
        }
    }

    /// Parses a state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "modified" => Some(Self::Modified),
            "unmodified" => Some(Self::Unmodified),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns all possible states
    pub fn all_states() -> [Self; 4] {
        [Self::New, Self::Modified, Self::Unmodified, Self::Error]
    }
}

impl fmt::Display for ModificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
