//! External collaborators
//!
//! The production tracker and the host application are outside this
//! library. Both are reached through traits so callers can plug in a
//! real service or an in-memory stand-in.

use serde::{Deserialize, Serialize};
use shotpath_template::CanonicalPath;
use std::collections::HashMap;

/// Record returned by a production tracker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackerRecord {
    /// Tracker entity type, e.g. `Shot`
    pub entity_type: String,
    /// Tracker id
    pub id: u64,
    /// Entity name
    pub name: String,
}

/// Lookup service of a production tracker
pub trait ProductionTracker {
    /// Record of `name` within `entity_type`, if the tracker knows it
    fn lookup(&self, entity_type: &str, name: &str) -> Option<TrackerRecord>;
}

/// In-memory tracker
#[derive(Debug, Clone, Default)]
pub struct StaticTracker {
    records: HashMap<(String, String), TrackerRecord>,
}

impl StaticTracker {
    /// Empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, entity_type: &str, id: u64, name: &str) -> Self {
        self.insert(entity_type, id, name);
        self
    }

    /// Add or replace a record
    pub fn insert(&mut self, entity_type: &str, id: u64, name: &str) -> Option<TrackerRecord> {
        let record = TrackerRecord {
            entity_type: entity_type.to_string(),
            id,
            name: name.to_string(),
        };
        self.records
            .insert((entity_type.to_string(), name.to_string()), record)
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no record is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ProductionTracker for StaticTracker {
    fn lookup(&self, entity_type: &str, name: &str) -> Option<TrackerRecord> {
        self.records
            .get(&(entity_type.to_string(), name.to_string()))
            .cloned()
    }
}

/// Failure reported by a host application
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// No document is open
    #[error("no document is open in the host")]
    NoDocument,

    /// Host refused or failed to save
    #[error("host failed to save {path}: {reason}")]
    SaveFailed {
        /// Target path
        path: CanonicalPath,
        /// Host message
        reason: String,
    },
}

/// Application that owns the open document
pub trait HostApplication {
    /// Canonical path of the open document
    ///
    /// # Errors
    /// `NoDocument` if nothing is open
    fn current_path(&self) -> Result<CanonicalPath, HostError>;

    /// Save the open document under `path`
    ///
    /// # Errors
    /// `SaveFailed` if the host cannot write the document
    fn save_as(&mut self, path: &CanonicalPath) -> Result<(), HostError>;
}
