//! Path entities
//!
//! A [`PathEntity`] is a canonical path decomposed by one template into a
//! field map, plus a mutable attribute bag shared by every holder of the
//! same instance.

use crate::error::{EntityError, Result};
use crate::hierarchy;
use parking_lot::RwLock;
use serde_json::Value;
use shotpath_template::{
    CanonicalPath, Context, EntityKind, Fields, GrammarTable, MatchError, Mismatch, Template,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;

/// Free-form attributes attached to an entity
pub type Attributes = BTreeMap<String, Value>;

/// A path decomposed into fields by one template
#[derive(Debug)]
pub struct PathEntity {
    kind: EntityKind,
    context: Context,
    path: CanonicalPath,
    fields: Fields,
    attributes: RwLock<Attributes>,
}

impl PathEntity {
    pub(crate) fn new(kind: EntityKind, context: Context, path: CanonicalPath, fields: Fields) -> Self {
        Self {
            kind,
            context,
            path,
            fields,
            attributes: RwLock::new(Attributes::new()),
        }
    }

    /// Parse a path as `kind`, trying every context in priority order
    ///
    /// # Errors
    /// `MalformedField` if some template selected the path but a field
    /// failed, otherwise `NoMatch`
    pub fn parse(table: &GrammarTable, kind: EntityKind, path: &CanonicalPath) -> Result<Self> {
        let mut first_mismatch = None;
        let mut first_malformed = None;

        for template in table.templates_for(kind) {
            match template.parse(path) {
                Ok(fields) => return Ok(Self::new(kind, template.context(), path.clone(), fields)),
                Err(MatchError::NoMatch(reason)) => {
                    first_mismatch.get_or_insert(reason);
                }
                Err(malformed @ MatchError::Malformed { .. }) => {
                    first_malformed.get_or_insert(malformed);
                }
            }
        }

        Err(match first_malformed {
            Some(malformed) => malformed_error(kind, path, malformed),
            None => EntityError::NoMatch {
                kind,
                path: path.clone(),
                reason: first_mismatch.unwrap_or(Mismatch::OutsideRoots),
            },
        })
    }

    /// Canonicalise a raw path string, then parse it as `kind`
    ///
    /// # Errors
    /// See [`PathEntity::parse`]; also fails on relative paths
    pub fn parse_str(table: &GrammarTable, kind: EntityKind, raw: impl AsRef<str>) -> Result<Self> {
        Self::parse(table, kind, &CanonicalPath::new(raw)?)
    }

    /// Parse a path against the single template of `kind` in `context`
    ///
    /// # Errors
    /// `MissingTemplate` if the table has no such template, otherwise as
    /// [`PathEntity::parse`]
    pub fn parse_in(
        table: &GrammarTable,
        kind: EntityKind,
        context: Context,
        path: &CanonicalPath,
    ) -> Result<Self> {
        let template = table.require(kind, context)?;
        Self::parse_with(template, path)
    }

    pub(crate) fn parse_with(template: &Template, path: &CanonicalPath) -> Result<Self> {
        match template.parse(path) {
            Ok(fields) => Ok(Self::new(
                template.kind(),
                template.context(),
                path.clone(),
                fields,
            )),
            Err(MatchError::NoMatch(reason)) => Err(EntityError::NoMatch {
                kind: template.kind(),
                path: path.clone(),
                reason,
            }),
            Err(malformed) => Err(malformed_error(template.kind(), path, malformed)),
        }
    }

    /// Compute the path of an entity from its fields
    ///
    /// The path is only constructed; nothing is created on disk.
    ///
    /// # Errors
    /// Returns error if a field is missing or invalid
    pub fn from_fields(
        table: &GrammarTable,
        kind: EntityKind,
        context: Context,
        fields: &Fields,
    ) -> Result<Self> {
        let template = table.require(kind, context)?;
        let path = template.apply_fields(fields)?;
        Self::parse_with(template, &path)
    }

    /// Entity kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Context of the template that matched
    #[inline]
    #[must_use]
    pub fn context(&self) -> Context {
        self.context
    }

    /// Canonical path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &CanonicalPath {
        &self.path
    }

    /// Extracted fields, `root` first
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Textual field value
    #[inline]
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.text(field)
    }

    /// Numeric field value
    #[inline]
    #[must_use]
    pub fn number(&self, field: &str) -> Option<u32> {
        self.fields.number(field)
    }

    /// Value of the field that numbers this kind's sequence
    #[must_use]
    pub fn sequence_number(&self) -> Option<u32> {
        self.kind
            .sequence_field()
            .and_then(|field| self.fields.number(field))
    }

    /// Template this entity was parsed with
    ///
    /// # Errors
    /// Returns `MissingTemplate` if the table lacks the template
    pub fn template<'t>(&self, table: &'t GrammarTable) -> Result<&'t Template> {
        Ok(table.require(self.kind, self.context)?)
    }

    /// Attribute value
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes.read().get(key).cloned()
    }

    /// Set an attribute, returning the previous value
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.write().insert(key.into(), value.into())
    }

    /// Remove an attribute
    pub fn remove_attribute(&self, key: &str) -> Option<Value> {
        self.attributes.write().remove(key)
    }

    /// Snapshot of every attribute
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        self.attributes.read().clone()
    }

    /// Coarser entity containing this one
    ///
    /// Truncates the path to the segment count of `kind`'s template and
    /// parses the prefix as `kind`.
    ///
    /// # Errors
    /// `NotAncestor` if `kind` is not coarser than this entity's kind
    pub fn parent_of_kind(&self, table: &GrammarTable, kind: EntityKind) -> Result<Self> {
        if !hierarchy::is_ancestor(kind, self.kind) {
            return Err(EntityError::NotAncestor {
                kind: self.kind,
                ancestor: kind,
            });
        }
        let template = table.require(kind, hierarchy::context_of(kind, self.context))?;
        let depth = self.root_len(table) + template.depth();
        Self::parse_with(template, &self.path.truncate(depth))
    }

    /// Entities of `kind` found below this one on disk
    ///
    /// Lists as many directory levels as separate the two kinds. Entries
    /// that do not parse are skipped. A missing directory yields nothing.
    ///
    /// # Errors
    /// `NotAncestor` if this entity's kind is not coarser than `kind`;
    /// I/O errors other than not-found
    pub fn children_of_kind(&self, table: &GrammarTable, kind: EntityKind) -> Result<Vec<Self>> {
        if !hierarchy::is_ancestor(self.kind, kind) {
            return Err(EntityError::NotAncestor {
                kind,
                ancestor: self.kind,
            });
        }

        let own_depth = self.path.len() - self.root_len(table);
        let mut out = Vec::new();
        for template in table.templates_for(kind) {
            if self.context != Context::Project && template.context() != self.context {
                continue;
            }
            let levels = template.depth().saturating_sub(own_depth);
            for candidate in list_descendants(&self.path, levels)? {
                match Self::parse_with(template, &candidate) {
                    Ok(entity) => out.push(entity),
                    Err(e) if e.is_recoverable() => {
                        tracing::trace!(path = %candidate, %kind, error = %e, "skipping entry");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        out.sort();
        out.dedup();
        Ok(out)
    }

    /// Segments taken by the project root
    fn root_len(&self, table: &GrammarTable) -> usize {
        table
            .roots()
            .split(&self.path)
            .map_or(0, |(root, _)| root.len())
    }

    /// Fields except the sequence number, as an ordering key
    fn series_key(&self) -> Vec<(&str, &shotpath_template::FieldValue)> {
        let skip = self.kind.sequence_field();
        let mut key: Vec<_> = self
            .fields
            .iter()
            .filter(|(name, _)| Some(*name) != skip)
            .collect();
        key.sort();
        key
    }
}

pub(crate) fn malformed_error(kind: EntityKind, path: &CanonicalPath, err: MatchError) -> EntityError {
    match err {
        MatchError::Malformed {
            field,
            value,
            reason,
        } => EntityError::MalformedField {
            kind,
            path: path.clone(),
            field,
            value,
            reason,
        },
        MatchError::NoMatch(reason) => EntityError::NoMatch {
            kind,
            path: path.clone(),
            reason,
        },
    }
}

/// Paths exactly `levels` directories below `dir`
pub(crate) fn list_descendants(dir: &CanonicalPath, levels: usize) -> Result<Vec<CanonicalPath>> {
    let mut frontier = vec![dir.clone()];
    for level in 0..levels {
        let mut next = Vec::new();
        for parent in &frontier {
            if level > 0 && !parent.to_path_buf().is_dir() {
                continue;
            }
            next.extend(list_dir(parent)?);
        }
        frontier = next;
    }
    Ok(frontier)
}

/// Entries of one directory; empty if it does not exist
pub(crate) fn list_dir(dir: &CanonicalPath) -> Result<Vec<CanonicalPath>> {
    let fs_path = dir.to_path_buf();
    let entries = match fs::read_dir(&fs_path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(EntityError::Io {
                path: fs_path,
                source,
            })
        }
    };

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| EntityError::Io {
            path: fs_path.clone(),
            source,
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::trace!(dir = %dir, "skipping non UTF-8 entry");
            continue;
        };
        out.push(dir.child(name)?);
    }
    out.sort();
    tracing::debug!(dir = %dir, entries = out.len(), "listed directory");
    Ok(out)
}

impl Clone for PathEntity {
    /// Clones get their own attribute cell, seeded with a snapshot
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            context: self.context,
            path: self.path.clone(),
            fields: self.fields.clone(),
            attributes: RwLock::new(self.attributes()),
        }
    }
}

impl PartialEq for PathEntity {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.path == other.path
    }
}

impl Eq for PathEntity {}

impl Hash for PathEntity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.path.hash(state);
    }
}

impl PartialOrd for PathEntity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathEntity {
    /// Kind, then the fields outside the sequence, then the sequence
    /// number as an integer, then the path
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.series_key().cmp(&other.series_key()))
            .then_with(|| self.sequence_number().cmp(&other.sequence_number()))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl std::fmt::Display for PathEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotpath_test_utils::{ProjectFixture, SHOT};

    #[test]
    fn parse_and_rebuild_work_file() {
        let fx = ProjectFixture::new();
        let path = fx.path(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v003.ma"));
        let entity = PathEntity::parse(fx.table(), EntityKind::WorkFile, &path).unwrap();

        assert_eq!(entity.context(), Context::Shot);
        assert_eq!(entity.text("task"), Some("blocking"));
        assert_eq!(entity.sequence_number(), Some(3));

        let rebuilt =
            PathEntity::from_fields(fx.table(), EntityKind::WorkFile, Context::Shot, entity.fields())
                .unwrap();
        assert_eq!(rebuilt, entity);
    }

    #[test]
    fn differently_spelled_paths_are_equal() {
        let fx = ProjectFixture::new();
        let clean = fx.path(&format!("{SHOT}/anim"));
        let messy = format!("{}//{SHOT}/./anim/", fx.root()).replace('/', "\\");
        let a = PathEntity::parse(fx.table(), EntityKind::StepRoot, &clean).unwrap();
        let b = PathEntity::parse_str(fx.table(), EntityKind::StepRoot, messy).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn versions_order_numerically() {
        let fx = ProjectFixture::new();
        let parse = |v: &str| {
            PathEntity::parse(
                fx.table(),
                EntityKind::WorkFile,
                &fx.path(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v{v}.ma")),
            )
            .unwrap()
        };
        let mut versions = vec![parse("010"), parse("009"), parse("002")];
        versions.sort();
        let numbers: Vec<_> = versions.iter().filter_map(PathEntity::sequence_number).collect();
        assert_eq!(numbers, vec![2, 9, 10]);
    }

    #[test]
    fn malformed_versus_no_match() {
        let fx = ProjectFixture::new();
        let short = fx.path(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v03.ma"));
        let err = PathEntity::parse(fx.table(), EntityKind::WorkFile, &short).unwrap_err();
        assert!(matches!(err, EntityError::MalformedField { ref field, .. } if field == "version"));
        assert!(err.is_recoverable());

        let other = fx.path(&format!("{SHOT}/anim/notes.txt"));
        let err = PathEntity::parse(fx.table(), EntityKind::WorkFile, &other).unwrap_err();
        assert!(err.is_no_match());
    }

    #[test]
    fn parent_of_kind_truncates() {
        let fx = ProjectFixture::new();
        let path = fx.path(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v003.ma"));
        let entity = PathEntity::parse(fx.table(), EntityKind::WorkFile, &path).unwrap();

        let step = entity.parent_of_kind(fx.table(), EntityKind::StepRoot).unwrap();
        assert_eq!(step.path(), &fx.path(&format!("{SHOT}/anim")));

        let project = entity.parent_of_kind(fx.table(), EntityKind::ProjectRoot).unwrap();
        assert_eq!(project.context(), Context::Project);
        assert_eq!(project.text("project"), Some("demo"));

        assert!(matches!(
            step.parent_of_kind(fx.table(), EntityKind::WorkFile),
            Err(EntityError::NotAncestor { .. })
        ));
    }

    #[test]
    fn children_skip_unrelated_entries() {
        let fx = ProjectFixture::new();
        fx.shot_work_file("blocking", 1);
        fx.shot_work_file("blocking", 2);
        fx.touch(&format!("{SHOT}/anim/work/maya/notes.txt"));
        fx.mkdir(&format!("{SHOT}/anim/work/maya/backup"));

        let area = PathEntity::parse(
            fx.table(),
            EntityKind::WorkArea,
            &fx.path(&format!("{SHOT}/anim/work/maya")),
        )
        .unwrap();
        let files = area.children_of_kind(fx.table(), EntityKind::WorkFile).unwrap();
        assert_eq!(files.len(), 2);

        let missing = PathEntity::parse(
            fx.table(),
            EntityKind::WorkArea,
            &fx.path(&format!("{SHOT}/anim/work/nuke")),
        )
        .unwrap();
        assert!(missing
            .children_of_kind(fx.table(), EntityKind::WorkFile)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn project_children_span_both_contexts() {
        let fx = ProjectFixture::new();
        fx.mkdir("demo/sequences/sq010");
        fx.mkdir("demo/assets/prop");
        let project = PathEntity::parse(fx.table(), EntityKind::ProjectRoot, &fx.path("demo")).unwrap();
        let children = project
            .children_of_kind(fx.table(), EntityKind::SequenceRoot)
            .unwrap();
        let contexts: Vec<_> = children.iter().map(PathEntity::context).collect();
        assert_eq!(contexts.len(), 2);
        assert!(contexts.contains(&Context::Shot));
        assert!(contexts.contains(&Context::Asset));
    }

    #[test]
    fn attributes_are_per_instance() {
        let fx = ProjectFixture::new();
        let entity = PathEntity::parse(fx.table(), EntityKind::ProjectRoot, &fx.path("demo")).unwrap();
        assert_eq!(entity.set_attribute("fps", 24), None);
        let copy = entity.clone();
        copy.set_attribute("fps", 25);
        assert_eq!(entity.attribute("fps"), Some(Value::from(24)));
        assert_eq!(copy.attribute("fps"), Some(Value::from(25)));
    }
}
