//! Typed entity kinds
//!
//! Each kind wraps a [`PathEntity`] whose kind is fixed by the type. The
//! [`Entity`] trait is sealed: the set of kinds is closed by the grammar.

use crate::collaborators::{ProductionTracker, TrackerRecord};
use crate::entity::PathEntity;
use crate::error::{EntityError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shotpath_template::{CanonicalPath, Context, EntityKind, Fields, GrammarTable};
use std::fmt::{self, Display, Formatter};

mod private {
    pub trait Sealed {}
}

/// An entity of one statically known kind
pub trait Entity: Sized + Send + Sync + 'static + private::Sealed {
    /// Kind every value of this type has
    const KIND: EntityKind;

    /// Wrap an untyped entity
    ///
    /// # Errors
    /// `KindMismatch` if the entity has another kind
    fn from_entity(entity: PathEntity) -> Result<Self>;

    /// Untyped view
    fn entity(&self) -> &PathEntity;

    /// Parse a canonical path as this kind
    ///
    /// # Errors
    /// `NoMatch` or `MalformedField` if the path is not this kind
    fn parse(table: &GrammarTable, path: &CanonicalPath) -> Result<Self> {
        Self::from_entity(PathEntity::parse(table, Self::KIND, path)?)
    }

    /// Canonicalise then parse a raw path
    ///
    /// # Errors
    /// As [`Entity::parse`]; also fails on relative paths
    fn parse_str(table: &GrammarTable, raw: impl AsRef<str>) -> Result<Self> {
        Self::parse(table, &CanonicalPath::new(raw)?)
    }

    /// Build from fields without touching the disk
    ///
    /// # Errors
    /// Returns error if a field is missing or invalid
    fn from_fields(table: &GrammarTable, context: Context, fields: &Fields) -> Result<Self> {
        Self::from_entity(PathEntity::from_fields(table, Self::KIND, context, fields)?)
    }

    /// Canonical path
    fn path(&self) -> &CanonicalPath {
        self.entity().path()
    }

    /// Extracted fields
    fn fields(&self) -> &Fields {
        self.entity().fields()
    }

    /// Context of the matching template
    fn context(&self) -> Context {
        self.entity().context()
    }

    /// Check if the path currently exists on disk
    fn exists(&self) -> bool {
        self.path().to_path_buf().exists()
    }
}

fn check_kind(expected: EntityKind, entity: &PathEntity) -> Result<()> {
    if entity.kind() == expected {
        Ok(())
    } else {
        Err(EntityError::KindMismatch {
            expected,
            actual: entity.kind(),
        })
    }
}

macro_rules! entity_kind {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(PathEntity);

        impl private::Sealed for $name {}

        impl Entity for $name {
            const KIND: EntityKind = EntityKind::$kind;

            fn from_entity(entity: PathEntity) -> Result<Self> {
                check_kind(Self::KIND, &entity)?;
                Ok(Self(entity))
            }

            fn entity(&self) -> &PathEntity {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }
    };
}

entity_kind!(
    /// A project directory under a root
    ProjectRoot => ProjectRoot
);
entity_kind!(
    /// A sequence, or an asset type in the asset context
    SequenceRoot => SequenceRoot
);
entity_kind!(
    /// A shot or an asset
    EntityRoot => EntityRoot
);
entity_kind!(
    /// A pipeline step
    StepRoot => StepRoot
);
entity_kind!(
    /// Host application work directory
    WorkArea => WorkArea
);
entity_kind!(
    /// Editable versioned artifact
    WorkFile => WorkFile
);
entity_kind!(
    /// Auto-saved sub-revision of a work file
    Increment => Increment
);
entity_kind!(
    /// Published output category
    OutputType => OutputType
);
entity_kind!(
    /// Named output stream
    OutputName => OutputName
);
entity_kind!(
    /// One published file
    OutputFile => OutputFile
);
entity_kind!(
    /// Frame range with a `####` placeholder
    OutputFileSequence => OutputFileSequence
);

impl ProjectRoot {
    /// Project name
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.text("project").unwrap_or_default()
    }

    /// Tracker record of the project
    #[must_use]
    pub fn tracking_record(&self, tracker: &dyn ProductionTracker) -> Option<TrackerRecord> {
        tracker.lookup("Project", self.name())
    }
}

impl EntityRoot {
    /// Shot or asset name
    #[must_use]
    pub fn name(&self) -> &str {
        self.context()
            .entity_field()
            .and_then(|field| self.0.text(field))
            .unwrap_or_default()
    }

    /// Tracker record of the shot or asset
    #[must_use]
    pub fn tracking_record(&self, tracker: &dyn ProductionTracker) -> Option<TrackerRecord> {
        let entity_type = match self.context() {
            Context::Asset => "Asset",
            _ => "Shot",
        };
        tracker.lookup(entity_type, self.name())
    }
}

impl StepRoot {
    /// Step name
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.text("step").unwrap_or_default()
    }
}

impl WorkFile {
    /// Task name
    #[must_use]
    pub fn task(&self) -> &str {
        self.0.text("task").unwrap_or_default()
    }

    /// Version number
    #[must_use]
    pub fn version(&self) -> u32 {
        self.0.number("version").unwrap_or_default()
    }
}

impl Increment {
    /// Increment index
    #[must_use]
    pub fn increment(&self) -> u32 {
        self.0.number("increment").unwrap_or_default()
    }

    /// Version of the owning work file
    #[must_use]
    pub fn version(&self) -> u32 {
        self.0.number("version").unwrap_or_default()
    }

    /// The work file this increment was saved from
    ///
    /// # Errors
    /// Returns error if the work file path cannot be built
    pub fn get_work(&self, table: &GrammarTable) -> Result<WorkFile> {
        WorkFile::from_fields(table, self.context(), &self.fields().without("increment"))
    }
}

/// Review state of an output version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    /// Written but not yet published
    #[default]
    Pending,
    /// Available to downstream steps
    Published,
    /// Signed off
    Approved,
    /// Superseded or withdrawn
    Deprecated,
    /// Tag this library does not know
    #[serde(untagged)]
    Unknown(String),
}

impl OutputStatus {
    /// Parse a tag, keeping unknown tags verbatim
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "published" => Self::Published,
            "approved" => Self::Approved,
            "deprecated" => Self::Deprecated,
            _ => Self::Unknown(tag.to_string()),
        }
    }

    /// Tag text
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Approved => "approved",
            Self::Deprecated => "deprecated",
            Self::Unknown(tag) => tag,
        }
    }
}

impl Display for OutputStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numbered publish of an output name, with a mutable status
#[derive(Debug)]
pub struct OutputVersion {
    entity: PathEntity,
    status: RwLock<OutputStatus>,
}

impl private::Sealed for OutputVersion {}

impl Entity for OutputVersion {
    const KIND: EntityKind = EntityKind::OutputVersion;

    fn from_entity(entity: PathEntity) -> Result<Self> {
        check_kind(Self::KIND, &entity)?;
        Ok(Self::wrap(entity))
    }

    fn entity(&self) -> &PathEntity {
        &self.entity
    }
}

impl OutputVersion {
    fn wrap(entity: PathEntity) -> Self {
        Self {
            entity,
            status: RwLock::new(OutputStatus::default()),
        }
    }

    /// Version number
    #[must_use]
    pub fn version(&self) -> u32 {
        self.entity.number("version").unwrap_or_default()
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> OutputStatus {
        self.status.read().clone()
    }

    /// Change the status, returning the previous one
    pub fn set_status(&self, status: OutputStatus) -> OutputStatus {
        std::mem::replace(&mut *self.status.write(), status)
    }
}

impl Clone for OutputVersion {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            status: RwLock::new(self.status()),
        }
    }
}

impl PartialEq for OutputVersion {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl Eq for OutputVersion {}

impl PartialOrd for OutputVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OutputVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.entity.cmp(&other.entity)
    }
}

impl std::hash::Hash for OutputVersion {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.entity.hash(state);
    }
}

impl Display for OutputVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.entity, f)
    }
}

/// Any entity, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyEntity {
    /// See [`ProjectRoot`]
    ProjectRoot(ProjectRoot),
    /// See [`SequenceRoot`]
    SequenceRoot(SequenceRoot),
    /// See [`EntityRoot`]
    EntityRoot(EntityRoot),
    /// See [`StepRoot`]
    StepRoot(StepRoot),
    /// See [`WorkArea`]
    WorkArea(WorkArea),
    /// See [`WorkFile`]
    WorkFile(WorkFile),
    /// See [`Increment`]
    Increment(Increment),
    /// See [`OutputType`]
    OutputType(OutputType),
    /// See [`OutputName`]
    OutputName(OutputName),
    /// See [`OutputVersion`]
    OutputVersion(OutputVersion),
    /// See [`OutputFile`]
    OutputFile(OutputFile),
    /// See [`OutputFileSequence`]
    OutputFileSequence(OutputFileSequence),
}

impl AnyEntity {
    /// Tag an untyped entity by its kind
    #[must_use]
    pub fn from_entity(entity: PathEntity) -> Self {
        match entity.kind() {
            EntityKind::ProjectRoot => Self::ProjectRoot(ProjectRoot(entity)),
            EntityKind::SequenceRoot => Self::SequenceRoot(SequenceRoot(entity)),
            EntityKind::EntityRoot => Self::EntityRoot(EntityRoot(entity)),
            EntityKind::StepRoot => Self::StepRoot(StepRoot(entity)),
            EntityKind::WorkArea => Self::WorkArea(WorkArea(entity)),
            EntityKind::WorkFile => Self::WorkFile(WorkFile(entity)),
            EntityKind::Increment => Self::Increment(Increment(entity)),
            EntityKind::OutputType => Self::OutputType(OutputType(entity)),
            EntityKind::OutputName => Self::OutputName(OutputName(entity)),
            EntityKind::OutputVersion => Self::OutputVersion(OutputVersion::wrap(entity)),
            EntityKind::OutputFile => Self::OutputFile(OutputFile(entity)),
            EntityKind::OutputFileSequence => Self::OutputFileSequence(OutputFileSequence(entity)),
        }
    }

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

impl Display for AnyEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self.entity(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotpath_template::ROOT_FIELD;
    use shotpath_test_utils::{ProjectFixture, ASSET, SHOT};

    #[test]
    fn typed_parse_checks_kind() {
        let fx = ProjectFixture::new();
        let step = StepRoot::parse(fx.table(), &fx.path(&format!("{ASSET}/rig"))).unwrap();
        assert_eq!(step.name(), "rig");
        assert_eq!(step.context(), Context::Asset);

        let untyped = step.entity().clone();
        assert!(matches!(
            WorkFile::from_entity(untyped),
            Err(EntityError::KindMismatch { .. })
        ));
    }

    #[test]
    fn increment_get_work_strips_increment() {
        let fx = ProjectFixture::new();
        let inc = Increment::parse(
            fx.table(),
            &fx.path(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v003.0012.ma")),
        )
        .unwrap();
        assert_eq!(inc.increment(), 12);

        let work = inc.get_work(fx.table()).unwrap();
        assert_eq!(
            work.path(),
            &fx.path(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v003.ma"))
        );
        assert_eq!(work.fields(), &inc.fields().without("increment"));
        assert_eq!(work.version(), inc.version());
    }

    #[test]
    fn work_file_path_is_not_an_increment() {
        let fx = ProjectFixture::new();
        let path = fx.path(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v003.ma"));
        assert!(Increment::parse(fx.table(), &path).unwrap_err().is_no_match());
        assert!(WorkFile::parse(fx.table(), &path).is_ok());
    }

    #[test]
    fn tracking_records_hit_and_miss() {
        use crate::collaborators::StaticTracker;

        let fx = ProjectFixture::new();
        let tracker = StaticTracker::new()
            .with("Project", 1, "demo")
            .with("Shot", 1042, "sh010")
            .with("Asset", 77, "hero");

        let project = ProjectRoot::parse(fx.table(), &fx.path("demo")).unwrap();
        assert_eq!(project.tracking_record(&tracker).map(|r| r.id), Some(1));

        let shot = EntityRoot::parse(fx.table(), &fx.path(SHOT)).unwrap();
        let record = shot.tracking_record(&tracker).unwrap();
        assert_eq!(record.entity_type, "Shot");
        assert_eq!(record.id, 1042);

        let asset = EntityRoot::parse(fx.table(), &fx.path(ASSET)).unwrap();
        assert_eq!(asset.name(), "archer");
        assert!(asset.tracking_record(&tracker).is_none());

        let tracker = tracker.with("Shot", 5, "archer");
        assert!(asset.tracking_record(&tracker).is_none());
        let tracker = tracker.with("Asset", 9, "archer");
        assert_eq!(asset.tracking_record(&tracker).map(|r| r.id), Some(9));
    }

    #[test]
    fn output_status_tags() {
        assert_eq!(OutputStatus::from_tag("Approved"), OutputStatus::Approved);
        assert_eq!(
            OutputStatus::from_tag("on_hold"),
            OutputStatus::Unknown("on_hold".into())
        );
        let json = serde_json::to_string(&OutputStatus::Published).unwrap();
        assert_eq!(json, "\"published\"");
    }

    #[test]
    fn output_version_status_is_mutable() {
        let fx = ProjectFixture::new();
        let fields = Fields::new()
            .with(ROOT_FIELD, fx.root().to_string())
            .with("project", "demo")
            .with("asset_type", "character")
            .with("asset", "archer")
            .with("step", "rig")
            .with("output_type", "rig")
            .with("output_name", "rig_main")
            .with("version", 16u32);
        let version = OutputVersion::from_fields(fx.table(), Context::Asset, &fields).unwrap();
        assert_eq!(version.status(), OutputStatus::Pending);
        assert_eq!(
            version.set_status(OutputStatus::Approved),
            OutputStatus::Pending
        );
        assert_eq!(version.status(), OutputStatus::Approved);
        assert!(!version.exists());
    }

    #[test]
    fn any_entity_tags_by_kind() {
        let fx = ProjectFixture::new();
        let entity = PathEntity::parse(
            fx.table(),
            EntityKind::EntityRoot,
            &fx.path(SHOT),
        )
        .unwrap();
        let any = AnyEntity::from_entity(entity);
        assert_eq!(any.kind(), EntityKind::EntityRoot);
        match any {
            AnyEntity::EntityRoot(root) => assert_eq!(root.name(), "sh010"),
            other => panic!("unexpected {other}"),
        }
    }
}
