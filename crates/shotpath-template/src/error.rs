//! Error types for the template grammar
//!
//! - [`TemplateError`]: building templates, grammar tables and paths
//! - [`MatchError`]: a concrete path failing one template

use crate::path::PathError;
use crate::table::{Context, EntityKind};
use std::path::PathBuf;

/// Errors building templates or applying fields
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Malformed skeleton text
    #[error("invalid skeleton '{skeleton}': {reason}")]
    Skeleton { skeleton: String, reason: String },

    /// Skeleton uses the reserved root field
    #[error("field name '{field}' is reserved")]
    ReservedField { field: String },

    /// Two fields with nothing between them cannot be split
    #[error("fields '{first}' and '{second}' are adjacent in '{skeleton}'")]
    AdjacentFields {
        skeleton: String,
        first: String,
        second: String,
    },

    /// Skeleton references a field with no declared constraint
    #[error("{kind}/{context}: field '{field}' has no declared constraint")]
    UndeclaredField {
        kind: EntityKind,
        context: Context,
        field: String,
    },

    /// Version fields of one template declare different widths
    #[error("{kind}/{context}: mixed version widths {widths:?}")]
    MixedVersionWidths {
        kind: EntityKind,
        context: Context,
        widths: Vec<usize>,
    },

    /// Numeric width outside `1..=MAX_WIDTH`
    #[error("field '{field}' declares unsupported width {width}")]
    InvalidWidth { field: String, width: usize },

    /// Pattern constraint does not compile
    #[error("field '{field}' has an invalid pattern: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// Two templates for the same kind and context
    #[error("duplicate template for {kind}/{context}")]
    DuplicateTemplate { kind: EntityKind, context: Context },

    /// No template for a (kind, context) pair
    #[error("no template for {kind}/{context}")]
    MissingTemplate { kind: EntityKind, context: Context },

    /// Grammar table built without any project root
    #[error("grammar table needs at least one project root")]
    NoRoots,

    /// Required field missing when building a path
    #[error("{kind}: missing field '{field}'")]
    MissingField { kind: EntityKind, field: String },

    /// Field value violates its constraint when building a path
    #[error("{kind}: field '{field}' value '{value}' is invalid: {reason}")]
    ConstraintViolation {
        kind: EntityKind,
        field: String,
        value: String,
        reason: String,
    },

    /// Root field names a directory that is not a configured root
    #[error("'{root}' is not a configured project root")]
    UnknownRoot { root: String },

    /// Bad path in a field or root list
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// Grammar file does not deserialize
    #[error("invalid grammar file: {0}")]
    GrammarFile(#[from] toml::de::Error),

    /// Grammar file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a path does not satisfy a template structurally
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Mismatch {
    /// Path is not below any configured root
    #[error("path is not under any configured project root")]
    OutsideRoots,

    /// Wrong number of segments below the root
    #[error("expected {expected} segments below the root, found {actual}")]
    SegmentCount { expected: usize, actual: usize },

    /// Literal text does not line up
    #[error("segment {index} '{actual}' does not match '{expected}'")]
    Literal {
        index: usize,
        expected: String,
        actual: String,
    },
}

/// Outcome of a failed parse against one template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// Path does not have the template's shape
    #[error("no match: {0}")]
    NoMatch(Mismatch),

    /// Path has the template's shape but a field fails its constraint
    #[error("field '{field}' value '{value}' is malformed: {reason}")]
    Malformed {
        field: String,
        value: String,
        reason: String,
    },
}

impl MatchError {
    /// True for a structural mismatch
    #[inline]
    #[must_use]
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch(_))
    }
}
