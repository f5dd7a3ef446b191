//! In-memory change tracker

use crate::state::ModificationState;
use crate::tracker::traits::{classify_against, ChangeTracker, TrackerError, TrackerResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Change tracker that keeps fingerprints for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryChangeTracker {
    fingerprints: Mutex<HashMap<String, String>>,
}

impl MemoryChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fingerprints.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChangeTracker for MemoryChangeTracker {
    fn classify(&self, id: &str, fingerprint: &str) -> TrackerResult<ModificationState> {
        let fingerprints = self
            .fingerprints
            .lock()
            .map_err(|e| TrackerError::Unavailable(format!("Failed to lock tracker: {}", e)))?;
        Ok(classify_against(
            fingerprints.get(id).map(String::as_str),
            fingerprint,
        ))
    }

    fn record(&self, id: &str, fingerprint: &str) -> TrackerResult<()> {
        let mut fingerprints = self
            .fingerprints
            .lock()
            .map_err(|e| TrackerError::Unavailable(format!("Failed to lock tracker: {}", e)))?;
        fingerprints.insert(id.to_string(), fingerprint.to_string());
        Ok(())
    }
}
