//! shotpath production entities
//!
//! Typed views of production artifact paths built on the path grammar.
//!
//! # Overview
//!
//! - **Entities**: one type per kind, from project root down to output
//!   file sequences, all sealed behind [`Entity`]
//! - **Hierarchy**: parent and child navigation by path prefix and
//!   directory listing
//! - **Versions**: numeric sequencing of work files, increments and outputs
//! - **Probe**: resolution of a path of unknown kind
//! - **Metadata**: marker records embedded in ASCII artifacts, and the
//!   provenance queries built on them
//!
//! # Example
//!
//! ```rust,no_run
//! use shotpath_entity::prelude::*;
//! use shotpath_template::{CanonicalPath, GrammarTable, ProjectRoots};
//!
//! let roots = ProjectRoots::new([CanonicalPath::new("/mnt/projects")?])?;
//! let table = GrammarTable::with_default_grammar(roots)?;
//!
//! let work = WorkFile::parse_str(
//!     &table,
//!     "/mnt/projects/demo/sequences/sq010/sh010/anim/work/maya/sh010_anim_blocking_v003.ma",
//! )?;
//! let next = version::find_next(&table, &work)?;
//! println!("save as {}", next.path());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

pub mod collaborators;
pub mod entity;
pub mod error;
pub mod frames;
pub mod hierarchy;
pub mod kinds;
pub mod metadata;
pub mod probe;
pub mod provenance;
pub mod version;

// Re-exports
pub use collaborators::{HostApplication, HostError, ProductionTracker, StaticTracker, TrackerRecord};
pub use entity::{Attributes, PathEntity};
pub use error::{EntityError, Result};
pub use hierarchy::HasParent;
pub use kinds::{
    AnyEntity, Entity, EntityRoot, Increment, OutputFile, OutputFileSequence, OutputName,
    OutputStatus, OutputType, OutputVersion, ProjectRoot, SequenceRoot, StepRoot, WorkArea,
    WorkFile,
};
pub use metadata::{
    decode_metadata, read_metadata, MetadataError, MetadataMap, MetadataReader, MetadataRecord,
    DEFAULT_SCAN_LIMIT, METADATA_MARKER,
};
pub use probe::{resolve, try_parse, ProbeOutcome, PROBE_ORDER};
pub use provenance::{outputs_of, provenance_of, source_asset_of, Provenance};
pub use version::Versioned;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for entity work
    pub use crate::{
        version, AnyEntity, Entity, EntityError, EntityRoot, HasParent, Increment, OutputFile,
        OutputFileSequence, OutputName, OutputType, OutputVersion, PathEntity, ProjectRoot,
        SequenceRoot, StepRoot, Versioned, WorkArea, WorkFile,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
