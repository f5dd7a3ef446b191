//! Change tracker trait and error types
//!
//! The tracker remembers the fingerprint each entity had when it was last
//! processed, so the engine can skip materializing unchanged entities.

use crate::state::ModificationState;
use thiserror::Error;

/// Errors that can occur during change tracking
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Tracker unavailable: {0}")]
    Unavailable(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Classifies entities relative to the previous crawl
///
/// Implementations must be safe to share between concurrent crawl roots.
pub trait ChangeTracker: Send + Sync {
    /// Classifies an entity id + fingerprint as new, modified or unmodified
    fn classify(&self, id: &str, fingerprint: &str) -> TrackerResult<ModificationState>;

    /// Remembers `fingerprint` as the processed state of `id`
    fn record(&self, id: &str, fingerprint: &str) -> TrackerResult<()>;
}

/// Shared classification rule for trackers backed by a fingerprint lookup
///
/// An empty fingerprint carries no identity, so it never proves that an
/// entity is unchanged.
pub fn classify_against(stored: Option<&str>, fingerprint: &str) -> ModificationState {
    match stored {
        None => ModificationState::New,
        Some(previous) if !fingerprint.is_empty() && previous == fingerprint => {
            ModificationState::Unmodified
        }
        Some(_) => ModificationState::Modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_against() {
        assert_eq!(classify_against(None, "a"), ModificationState::New);
        assert_eq!(classify_against(Some("a"), "a"), ModificationState::Unmodified);
        assert_eq!(classify_against(Some("a"), "b"), ModificationState::Modified);
    }

    #[test]
    fn test_empty_fingerprint_is_never_unmodified() {
        assert_eq!(classify_against(Some(""), ""), ModificationState::Modified);
        assert_eq!(classify_against(None, ""), ModificationState::New);
    }
}
