//! shotpath registry
//!
//! One [`Registry`] per catalogue: it owns the grammar table, keeps one
//! shared instance per entity, stores tagged side-car blobs next to work
//! files and drives the host save workflow.
//!
//! # Example
//!
//! ```rust,no_run
//! use shotpath_entity::{Entity, WorkFile};
//! use shotpath_registry::{CatalogueConfig, Registry};
//! use shotpath_template::CanonicalPath;
//!
//! let config = CatalogueConfig::new().with_root(CanonicalPath::new("/mnt/projects")?);
//! let mut registry = Registry::new(config)?;
//!
//! let work = registry.obtain_str::<WorkFile>(
//!     "/mnt/projects/demo/sequences/sq010/sh010/anim/work/maya/sh010_anim_blocking_v003.ma",
//! )?;
//! registry.cache_write(&work, "thumbnail", &vec![1001_u32, 1100])?;
//! let latest = registry.latest(work.as_ref())?;
//! println!("latest is {}", latest.path());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

pub mod blob;
pub mod config;
pub mod error;
pub mod filter;
pub mod host;
pub mod registry;

// Re-exports
pub use blob::{BlobError, BlobStore, Cached};
pub use config::{CatalogueConfig, ConfigError, DEFAULT_SIDECAR_DIR};
pub use error::{RegistryError, Result};
pub use filter::CacheFilter;
pub use host::{current_entity, current_work_file, save_next_version};
pub use registry::{Registry, SharedEntity};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for registry work
    pub use crate::{CacheFilter, Cached, CatalogueConfig, Registry, RegistryError, SharedEntity};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
