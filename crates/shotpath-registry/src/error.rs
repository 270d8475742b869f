//! Error types for the registry

use crate::blob::BlobError;
use crate::config::ConfigError;
use shotpath_entity::{EntityError, HostError};
use shotpath_template::{CanonicalPath, EntityKind, TemplateError};

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Entity construction or navigation failed
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Grammar table could not be built
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Side-car blob failure
    #[error(transparent)]
    Blob(#[from] BlobError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Host application failure
    #[error(transparent)]
    Host(#[from] HostError),

    /// Cache slot holds a value of another type
    #[error("cache slot for {kind} {path} holds another type")]
    TypeMismatch {
        /// Kind of the slot
        kind: EntityKind,
        /// Path of the slot
        path: CanonicalPath,
    },

    /// Host document is not a work file or increment
    #[error("{path} is a {kind}, not a work file")]
    NotAWorkFile {
        /// Resolved kind
        kind: EntityKind,
        /// Document path
        path: CanonicalPath,
    },
}

impl RegistryError {
    /// True if the path simply did not match a grammar
    #[inline]
    #[must_use]
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::Entity(e) if e.is_no_match())
    }
}
