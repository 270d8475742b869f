//! Error types for entities

use crate::metadata::MetadataError;
use shotpath_template::{CanonicalPath, EntityKind, Mismatch, PathError, TemplateError};
use std::path::PathBuf;

/// Result type for entity operations
pub type Result<T> = std::result::Result<T, EntityError>;

/// Errors constructing or navigating entities
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// Path does not have the shape of the kind (routine probe outcome)
    #[error("{path} is not a {kind}: {reason}")]
    NoMatch {
        kind: EntityKind,
        path: CanonicalPath,
        reason: Mismatch,
    },

    /// Path has the shape of the kind but a field fails its constraint
    #[error("{path} as {kind}: field '{field}' value '{value}' is malformed: {reason}")]
    MalformedField {
        kind: EntityKind,
        path: CanonicalPath,
        field: String,
        value: String,
        reason: String,
    },

    /// Path matches no kind at all
    #[error("{path} does not match any known entity kind")]
    Unrecognised { path: CanonicalPath },

    /// Sequence lookup that requires at least one entry found none
    #[error("no {kind} versions found next to {path}")]
    MissingVersion {
        kind: EntityKind,
        path: CanonicalPath,
    },

    /// Navigation between kinds that are not ancestor and descendant
    #[error("{ancestor} is not an ancestor of {kind}")]
    NotAncestor {
        kind: EntityKind,
        ancestor: EntityKind,
    },

    /// Entity of one kind given where another is required
    #[error("expected a {expected}, found a {actual}")]
    KindMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },

    /// Template construction or path building failed
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Invalid path
    #[error(transparent)]
    Path(#[from] PathError),

    /// Embedded metadata could not be read
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Directory listing failed
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EntityError {
    /// True for the routine "not this kind" outcome
    #[inline]
    #[must_use]
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch { .. } | Self::Unrecognised { .. })
    }

    /// True if enumeration may skip this path and carry on
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoMatch { .. } | Self::MalformedField { .. } | Self::Unrecognised { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let path = CanonicalPath::new("/mnt/projects/x").unwrap();
        let no_match = EntityError::NoMatch {
            kind: EntityKind::WorkFile,
            path: path.clone(),
            reason: Mismatch::OutsideRoots,
        };
        assert!(no_match.is_no_match());
        assert!(no_match.is_recoverable());

        let missing = EntityError::MissingVersion {
            kind: EntityKind::WorkFile,
            path,
        };
        assert!(!missing.is_no_match());
        assert!(!missing.is_recoverable());
        assert_eq!(
            missing.to_string(),
            "no work_file versions found next to /mnt/projects/x"
        );
    }
}
