//! Parent and child navigation between kinds
//!
//! Navigation is purely path based: a parent is a path prefix parsed as the
//! coarser kind, children are directory entries parsed as the finer kind.

use crate::entity::PathEntity;
use crate::error::Result;
use crate::kinds::{
    Entity, EntityRoot, Increment, OutputFile, OutputFileSequence, OutputName, OutputType,
    OutputVersion, ProjectRoot, SequenceRoot, StepRoot, WorkArea, WorkFile,
};
use shotpath_template::{Context, EntityKind, FieldValue, GrammarTable};

/// Kind of the directory that contains an entity of `kind`
#[must_use]
pub const fn parent_kind(kind: EntityKind) -> Option<EntityKind> {
    use EntityKind as K;
    match kind {
        K::ProjectRoot => None,
        K::SequenceRoot => Some(K::ProjectRoot),
        K::EntityRoot => Some(K::SequenceRoot),
        K::StepRoot => Some(K::EntityRoot),
        K::WorkArea | K::OutputType => Some(K::StepRoot),
        K::WorkFile | K::Increment => Some(K::WorkArea),
        K::OutputName => Some(K::OutputType),
        K::OutputVersion => Some(K::OutputName),
        K::OutputFile | K::OutputFileSequence => Some(K::OutputVersion),
    }
}

/// True if `ancestor` is strictly coarser than `kind` along the tree
#[must_use]
pub fn is_ancestor(ancestor: EntityKind, kind: EntityKind) -> bool {
    let mut current = parent_kind(kind);
    while let Some(parent) = current {
        if parent == ancestor {
            return true;
        }
        current = parent_kind(parent);
    }
    false
}

/// Context of the `kind` template above an entity in `context`
#[must_use]
pub fn context_of(kind: EntityKind, context: Context) -> Context {
    if kind == EntityKind::ProjectRoot {
        Context::Project
    } else {
        context
    }
}

/// Typed parent navigation
pub trait HasParent: Entity {
    /// Kind of the containing entity
    type Parent: Entity;

    /// The containing entity
    ///
    /// # Errors
    /// Returns error if the path prefix does not parse as the parent kind
    fn parent(&self, table: &GrammarTable) -> Result<Self::Parent> {
        Self::Parent::from_entity(self.entity().parent_of_kind(table, Self::Parent::KIND)?)
    }
}

impl HasParent for SequenceRoot {
    type Parent = ProjectRoot;
}
impl HasParent for EntityRoot {
    type Parent = SequenceRoot;
}
impl HasParent for StepRoot {
    type Parent = EntityRoot;
}
impl HasParent for WorkArea {
    type Parent = StepRoot;
}
impl HasParent for WorkFile {
    type Parent = WorkArea;
}
impl HasParent for Increment {
    type Parent = WorkArea;
}
impl HasParent for OutputType {
    type Parent = StepRoot;
}
impl HasParent for OutputName {
    type Parent = OutputType;
}
impl HasParent for OutputVersion {
    type Parent = OutputName;
}
impl HasParent for OutputFile {
    type Parent = OutputVersion;
}
impl HasParent for OutputFileSequence {
    type Parent = OutputVersion;
}

/// Typed children of `parent` found on disk
///
/// # Errors
/// Returns I/O errors from the directory scan
pub fn children<P: Entity, C: Entity>(table: &GrammarTable, parent: &P) -> Result<Vec<C>> {
    parent
        .entity()
        .children_of_kind(table, C::KIND)?
        .into_iter()
        .map(C::from_entity)
        .collect()
}

/// Typed child built from the parent's fields plus one more
fn child<P: Entity, C: Entity>(
    table: &GrammarTable,
    parent: &P,
    context: Context,
    extra: &[(&str, FieldValue)],
) -> Result<C> {
    let mut fields = parent.fields().clone();
    for (name, value) in extra {
        fields.insert(*name, value.clone());
    }
    C::from_fields(table, context, &fields)
}

impl ProjectRoot {
    /// Sequences and asset types on disk
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn sequences(&self, table: &GrammarTable) -> Result<Vec<SequenceRoot>> {
        children(table, self)
    }

    /// Sequence with the given name (not created)
    ///
    /// # Errors
    /// Returns error if the name violates its constraint
    pub fn sequence(&self, table: &GrammarTable, name: &str) -> Result<SequenceRoot> {
        child(table, self, Context::Shot, &[("sequence", name.into())])
    }

    /// Asset type with the given name (not created)
    ///
    /// # Errors
    /// Returns error if the name violates its constraint
    pub fn asset_type(&self, table: &GrammarTable, name: &str) -> Result<SequenceRoot> {
        child(table, self, Context::Asset, &[("asset_type", name.into())])
    }
}

impl SequenceRoot {
    /// Shots or assets on disk
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn entities(&self, table: &GrammarTable) -> Result<Vec<EntityRoot>> {
        children(table, self)
    }

    /// Shot or asset with the given name (not created)
    ///
    /// # Errors
    /// Returns error if the name violates its constraint
    pub fn entity_named(&self, table: &GrammarTable, name: &str) -> Result<EntityRoot> {
        let field = self.context().entity_field().unwrap_or("shot");
        child(table, self, self.context(), &[(field, name.into())])
    }
}

impl EntityRoot {
    /// Steps on disk
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn steps(&self, table: &GrammarTable) -> Result<Vec<StepRoot>> {
        children(table, self)
    }

    /// Step with the given name (not created)
    ///
    /// # Errors
    /// Returns error if the name violates its constraint
    pub fn step(&self, table: &GrammarTable, name: &str) -> Result<StepRoot> {
        child(table, self, self.context(), &[("step", name.into())])
    }
}

impl StepRoot {
    /// Work areas on disk
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn work_areas(&self, table: &GrammarTable) -> Result<Vec<WorkArea>> {
        children(table, self)
    }

    /// Work area of one host application (not created)
    ///
    /// # Errors
    /// Returns error if the name violates its constraint
    pub fn work_area(&self, table: &GrammarTable, dcc: &str) -> Result<WorkArea> {
        child(table, self, self.context(), &[("dcc", dcc.into())])
    }

    /// Output types on disk
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn output_types(&self, table: &GrammarTable) -> Result<Vec<OutputType>> {
        children(table, self)
    }

    /// Output type with the given name (not created)
    ///
    /// # Errors
    /// Returns error if the name violates its constraint
    pub fn output_type(&self, table: &GrammarTable, name: &str) -> Result<OutputType> {
        child(table, self, self.context(), &[("output_type", name.into())])
    }
}

impl WorkArea {
    /// Work files on disk, all tasks and versions
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn work_files(&self, table: &GrammarTable) -> Result<Vec<WorkFile>> {
        children(table, self)
    }

    /// Work file path for a task, version and extension (not created)
    ///
    /// # Errors
    /// Returns error if a value violates its constraint
    pub fn work_file(
        &self,
        table: &GrammarTable,
        task: &str,
        version: u32,
        ext: &str,
    ) -> Result<WorkFile> {
        let extra = [
            ("task", FieldValue::from(task)),
            ("version", version.into()),
            ("ext", ext.into()),
        ];
        child(table, self, self.context(), &extra)
    }

    /// Increments on disk, all tasks and versions
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn increments(&self, table: &GrammarTable) -> Result<Vec<Increment>> {
        children(table, self)
    }
}

impl WorkFile {
    /// Increments saved from this work file
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn increments(&self, table: &GrammarTable) -> Result<Vec<Increment>> {
        let area = self.parent(table)?;
        let own = self.fields();
        Ok(area
            .increments(table)?
            .into_iter()
            .filter(|inc| inc.fields().without("increment") == *own)
            .collect())
    }
}

impl OutputType {
    /// Output names on disk
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn output_names(&self, table: &GrammarTable) -> Result<Vec<OutputName>> {
        children(table, self)
    }

    /// Output name (not created)
    ///
    /// # Errors
    /// Returns error if the name violates its constraint
    pub fn output_name(&self, table: &GrammarTable, name: &str) -> Result<OutputName> {
        child(table, self, self.context(), &[("output_name", name.into())])
    }
}

impl OutputName {
    /// Published versions on disk, ascending
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn output_versions(&self, table: &GrammarTable) -> Result<Vec<OutputVersion>> {
        children(table, self)
    }

    /// Output version with the given number (not created)
    ///
    /// # Errors
    /// Returns error if the number does not fit the version width
    pub fn output_version(&self, table: &GrammarTable, version: u32) -> Result<OutputVersion> {
        child(table, self, self.context(), &[("version", version.into())])
    }

    /// Highest published version, if any
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn latest_output_version(&self, table: &GrammarTable) -> Result<Option<OutputVersion>> {
        Ok(self.output_versions(table)?.into_iter().max_by_key(OutputVersion::version))
    }
}

impl OutputVersion {
    /// Published files across every format directory
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn output_files(&self, table: &GrammarTable) -> Result<Vec<OutputFile>> {
        children(table, self)
    }

    /// Frame sequences across every format directory
    ///
    /// One sequence is returned per distinct placeholder path, however many
    /// frames exist on disk.
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn output_file_sequences(&self, table: &GrammarTable) -> Result<Vec<OutputFileSequence>> {
        crate::frames::sequences_below(table, self)
    }
}

impl PathEntity {
    /// Immediate parent, whatever its kind
    ///
    /// # Errors
    /// `NotAncestor` on a project root
    pub fn parent(&self, table: &GrammarTable) -> Result<Self> {
        match parent_kind(self.kind()) {
            Some(kind) => self.parent_of_kind(table, kind),
            None => Err(crate::EntityError::NotAncestor {
                kind: self.kind(),
                ancestor: self.kind(),
            }),
        }
    }
}
