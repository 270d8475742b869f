//! Cache invalidation filters

use shotpath_template::{CanonicalPath, EntityKind};

/// Which cached entries to drop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheFilter {
    /// Everything
    All,
    /// Instances of one kind; `WorkFile` also drops memoised blobs
    Kind(EntityKind),
    /// Entries whose path lies at or below the prefix
    Under(CanonicalPath),
}

impl CacheFilter {
    /// True if an entry of `kind` at `path` is selected
    #[must_use]
    pub fn matches(&self, kind: EntityKind, path: &CanonicalPath) -> bool {
        match self {
            Self::All => true,
            Self::Kind(selected) => *selected == kind,
            Self::Under(prefix) => prefix.is_prefix_of(path),
        }
    }
}
