//! Identity cache
//!
//! The [`Registry`] hands out at most one live instance per
//! `(kind, canonical path)`. Every constructor that goes through it returns
//! the shared `Arc`, so attribute or status changes made through one handle
//! are seen through all of them.
//!
//! Receivers are `&mut self` and nothing is locked internally. Callers that
//! share a registry across threads wrap it in one lock of their own.

use crate::blob::{BlobStore, Cached};
use crate::config::CatalogueConfig;
use crate::error::{RegistryError, Result};
use crate::filter::CacheFilter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shotpath_entity::{
    hierarchy, probe, provenance, version, AnyEntity, Entity, EntityRoot, HasParent, Increment,
    MetadataReader, OutputFile, OutputFileSequence, OutputName, OutputType, OutputVersion,
    PathEntity, ProjectRoot, SequenceRoot, StepRoot, Versioned, WorkArea, WorkFile,
};
use shotpath_template::{CanonicalPath, EntityKind, GrammarTable};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Slot = Arc<dyn Any + Send + Sync>;

/// Shared instance of any kind
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum SharedEntity {
    ProjectRoot(Arc<ProjectRoot>),
    SequenceRoot(Arc<SequenceRoot>),
    EntityRoot(Arc<EntityRoot>),
    StepRoot(Arc<StepRoot>),
    WorkArea(Arc<WorkArea>),
    WorkFile(Arc<WorkFile>),
    Increment(Arc<Increment>),
    OutputType(Arc<OutputType>),
    OutputName(Arc<OutputName>),
    OutputVersion(Arc<OutputVersion>),
    OutputFile(Arc<OutputFile>),
    OutputFileSequence(Arc<OutputFileSequence>),
}

impl SharedEntity {
    /// Untyped view
    #[must_use]
    pub fn entity(&self) -> &PathEntity {
        match self {
            Self::ProjectRoot(e) => e.entity(),
            Self::SequenceRoot(e) => e.entity(),
            Self::EntityRoot(e) => e.entity(),
            Self::StepRoot(e) => e.entity(),
            Self::WorkArea(e) => e.entity(),
            Self::WorkFile(e) => e.entity(),
            Self::Increment(e) => e.entity(),
            Self::OutputType(e) => e.entity(),
            Self::OutputName(e) => e.entity(),
            Self::OutputVersion(e) => e.entity(),
            Self::OutputFile(e) => e.entity(),
            Self::OutputFileSequence(e) => e.entity(),
        }
    }

    /// Entity kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.entity().kind()
    }

    /// Canonical path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &CanonicalPath {
        self.entity().path()
    }
}

impl fmt::Display for SharedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.entity(), f)
    }
}

/// Identity cache plus side-car blobs for one catalogue
pub struct Registry {
    config: CatalogueConfig,
    table: GrammarTable,
    reader: MetadataReader,
    instances: HashMap<(EntityKind, CanonicalPath), Slot>,
    blobs: BlobStore,
}

impl Registry {
    /// Build a registry from validated settings
    ///
    /// # Errors
    /// Returns error if the configuration or grammar is invalid
    pub fn new(config: CatalogueConfig) -> Result<Self> {
        config.validate()?;
        let table = config.grammar_table()?;
        tracing::info!(
            roots = config.roots.len(),
            templates = table.templates().len(),
            "registry ready"
        );
        Ok(Self {
            reader: config.metadata_reader(),
            blobs: BlobStore::new(config.sidecar_dir.clone()),
            table,
            config,
            instances: HashMap::new(),
        })
    }

    /// Settings the registry was built from
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CatalogueConfig {
        &self.config
    }

    /// Grammar table
    #[inline]
    #[must_use]
    pub fn table(&self) -> &GrammarTable {
        &self.table
    }

    /// Metadata reader
    #[inline]
    #[must_use]
    pub fn reader(&self) -> &MetadataReader {
        &self.reader
    }

    /// Number of cached instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True if no instance is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// True if an instance of `T` at `path` is cached
    #[must_use]
    pub fn contains<T: Entity>(&self, path: &CanonicalPath) -> bool {
        self.instances.contains_key(&(T::KIND, path.clone()))
    }

    fn cached<T: Entity>(&self, path: &CanonicalPath) -> Result<Option<Arc<T>>> {
        let Some(slot) = self.instances.get(&(T::KIND, path.clone())) else {
            return Ok(None);
        };
        Arc::clone(slot)
            .downcast::<T>()
            .map(Some)
            .map_err(|_| RegistryError::TypeMismatch {
                kind: T::KIND,
                path: path.clone(),
            })
    }

    fn store<T: Entity>(&mut self, entity: T) -> Arc<T> {
        if let Some(output) = (&entity as &dyn Any).downcast_ref::<OutputVersion>() {
            if let Err(e) = output.seed_status(&self.table, &self.reader) {
                tracing::warn!(path = %output.path(), error = %e, "cannot seed output status");
            }
        }
        let shared = Arc::new(entity);
        let slot: Slot = shared.clone();
        self.instances.insert((T::KIND, shared.path().clone()), slot);
        shared
    }

    /// Shared instance for `entity`, registering it if it is new
    ///
    /// # Errors
    /// `TypeMismatch` if the slot is corrupted
    pub fn intern<T: Entity>(&mut self, entity: T) -> Result<Arc<T>> {
        match self.cached::<T>(entity.path())? {
            Some(existing) => Ok(existing),
            None => Ok(self.store(entity)),
        }
    }

    /// Shared instance of kind `T` at `path`
    ///
    /// # Errors
    /// Returns error if the path does not parse as `T`
    pub fn obtain<T: Entity>(&mut self, path: &CanonicalPath) -> Result<Arc<T>> {
        if let Some(existing) = self.cached::<T>(path)? {
            tracing::debug!(kind = %T::KIND, path = %path, "cache hit");
            return Ok(existing);
        }
        let entity = T::parse(&self.table, path)?;
        Ok(self.store(entity))
    }

    /// Canonicalise a raw path, then [`Registry::obtain`] it
    ///
    /// # Errors
    /// Returns error if the path is relative or does not parse as `T`
    pub fn obtain_str<T: Entity>(&mut self, raw: impl AsRef<str>) -> Result<Arc<T>> {
        let path = CanonicalPath::new(raw).map_err(shotpath_entity::EntityError::from)?;
        self.obtain(&path)
    }

    /// Shared instance of whatever kind `path` is
    ///
    /// # Errors
    /// Returns error if no grammar recognises the path
    pub fn resolve(&mut self, path: &CanonicalPath) -> Result<SharedEntity> {
        let entity = probe::resolve(&self.table, path)?;
        self.intern_any(entity)
    }

    /// Shared instance for an entity of any kind
    ///
    /// # Errors
    /// `TypeMismatch` if the slot is corrupted
    pub fn intern_any(&mut self, entity: AnyEntity) -> Result<SharedEntity> {
        Ok(match entity {
            AnyEntity::ProjectRoot(e) => SharedEntity::ProjectRoot(self.intern(e)?),
            AnyEntity::SequenceRoot(e) => SharedEntity::SequenceRoot(self.intern(e)?),
            AnyEntity::EntityRoot(e) => SharedEntity::EntityRoot(self.intern(e)?),
            AnyEntity::StepRoot(e) => SharedEntity::StepRoot(self.intern(e)?),
            AnyEntity::WorkArea(e) => SharedEntity::WorkArea(self.intern(e)?),
            AnyEntity::WorkFile(e) => SharedEntity::WorkFile(self.intern(e)?),
            AnyEntity::Increment(e) => SharedEntity::Increment(self.intern(e)?),
            AnyEntity::OutputType(e) => SharedEntity::OutputType(self.intern(e)?),
            AnyEntity::OutputName(e) => SharedEntity::OutputName(self.intern(e)?),
            AnyEntity::OutputVersion(e) => SharedEntity::OutputVersion(self.intern(e)?),
            AnyEntity::OutputFile(e) => SharedEntity::OutputFile(self.intern(e)?),
            AnyEntity::OutputFileSequence(e) => SharedEntity::OutputFileSequence(self.intern(e)?),
        })
    }

    fn intern_all<T: Entity>(&mut self, entities: Vec<T>) -> Result<Vec<Arc<T>>> {
        entities.into_iter().map(|e| self.intern(e)).collect()
    }

    /// Shared parent of `entity`
    ///
    /// # Errors
    /// Returns error if the path prefix does not parse as the parent kind
    pub fn parent<C: HasParent>(&mut self, entity: &C) -> Result<Arc<C::Parent>> {
        let parent = entity.parent(&self.table)?;
        self.intern(parent)
    }

    /// Shared children of kind `C` found on disk below `parent`
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn children<P: Entity, C: Entity>(&mut self, parent: &P) -> Result<Vec<Arc<C>>> {
        let found = hierarchy::children::<P, C>(&self.table, parent)?;
        self.intern_all(found)
    }

    /// Shared siblings of `entity` in its sequence, ascending
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn versions<T: Versioned>(&mut self, entity: &T) -> Result<Vec<Arc<T>>> {
        let found = version::find_versions(&self.table, entity)?;
        self.intern_all(found)
    }

    /// Shared latest sibling, or `entity` itself for an empty sequence
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn latest<T: Versioned>(&mut self, entity: &T) -> Result<Arc<T>> {
        let latest = version::find_latest(&self.table, entity)?;
        self.intern(latest)
    }

    /// Shared instance one past the latest (path not created)
    ///
    /// # Errors
    /// Returns error if the next number does not fit the grammar width
    pub fn next<T: Versioned>(&mut self, entity: &T) -> Result<Arc<T>> {
        let next = version::find_next(&self.table, entity)?;
        self.intern(next)
    }

    /// True if `entity` is the latest of its sequence
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn is_latest<T: Versioned>(&self, entity: &T) -> Result<bool> {
        Ok(version::is_latest(&self.table, entity)?)
    }

    /// Shared work file an increment was saved from
    ///
    /// # Errors
    /// Returns error if the work file path cannot be built
    pub fn work_of(&mut self, increment: &Increment) -> Result<Arc<WorkFile>> {
        let work = increment.get_work(&self.table)?;
        self.intern(work)
    }

    /// Shared output versions produced from `work_file` or its increments
    ///
    /// # Errors
    /// Returns I/O errors from walking the output tree
    pub fn outputs_of(&mut self, work_file: &WorkFile) -> Result<Vec<Arc<OutputVersion>>> {
        let found = provenance::outputs_of(&self.table, work_file, &self.reader)?;
        self.intern_all(found)
    }

    /// Drop cached instances and memoised blobs selected by `filter`
    ///
    /// Returns the number of dropped entries.
    pub fn clear_caches(&mut self, filter: &CacheFilter) -> usize {
        let before = self.instances.len();
        self.instances
            .retain(|(kind, path), _| !filter.matches(*kind, path));
        let instances = before - self.instances.len();
        let blobs = self.blobs.clear(filter);
        tracing::info!(?filter, instances, blobs, "caches cleared");
        instances + blobs
    }

    /// Store `value` under `tag` for `work_file`
    ///
    /// # Errors
    /// Returns error if the tag is invalid or the side-car cannot be written
    pub fn cache_write<V: Serialize>(
        &mut self,
        work_file: &WorkFile,
        tag: &str,
        value: &V,
    ) -> Result<()> {
        self.blobs.write(work_file.path(), tag, value)?;
        Ok(())
    }

    /// Value stored under `tag` for `work_file`
    ///
    /// # Errors
    /// `Blob(InvalidTag)` for a tag that is not a plain name
    pub fn cache_read<V: DeserializeOwned>(
        &mut self,
        work_file: &WorkFile,
        tag: &str,
    ) -> Result<Cached<V>> {
        Ok(self.blobs.read(work_file.path(), tag)?)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("instances", &self.instances.len())
            .field("blobs", &self.blobs.len())
            .finish_non_exhaustive()
    }
}
