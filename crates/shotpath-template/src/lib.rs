//! shotpath path grammar
//!
//! Bidirectional mapping between production artifact paths and structured
//! field maps.
//!
//! # Overview
//!
//! - **CanonicalPath**: lexically normalised absolute path, the equality key
//! - **Template**: skeleton plus field constraints for one entity kind
//! - **GrammarTable**: every template in fixed priority order, anchored to
//!   the configured project roots
//!
//! # Example
//!
//! ```rust
//! use shotpath_template::{CanonicalPath, Context, EntityKind, GrammarTable, ProjectRoots};
//!
//! let roots = ProjectRoots::new([CanonicalPath::new("/mnt/projects").unwrap()]).unwrap();
//! let table = GrammarTable::with_default_grammar(roots).unwrap();
//!
//! let template = table.template(EntityKind::EntityRoot, Context::Shot).unwrap();
//! let path = CanonicalPath::new(r"\mnt\projects\demo\sequences\sq010\sh010").unwrap();
//! let fields = template.parse(&path).unwrap();
//! assert_eq!(fields.text("shot"), Some("sh010"));
//! assert_eq!(template.apply_fields(&fields).unwrap(), path);
//! ```

#![warn(missing_docs)]

pub mod constraint;
pub mod error;
pub mod field;
pub mod grammar_file;
pub mod path;
pub mod skeleton;
pub mod table;
pub mod template;

// Re-exports
pub use constraint::{Constraint, ConstraintError, MAX_WIDTH};
pub use error::{MatchError, Mismatch, TemplateError};
pub use field::{FieldValue, Fields, ROOT_FIELD};
pub use grammar_file::{ConstraintSpec, GrammarFile, TemplateSpec, DEFAULT_GRAMMAR};
pub use path::{CanonicalPath, PathError};
pub use skeleton::{Piece, Segment, Skeleton};
pub use table::{Context, EntityKind, GrammarTable, ProjectRoots, UnknownName};
pub use template::Template;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for path grammar work
    pub use crate::{
        CanonicalPath, Context, EntityKind, FieldValue, Fields, GrammarTable, MatchError,
        ProjectRoots, Template, TemplateError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
