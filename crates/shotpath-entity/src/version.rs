//! Version sequencing
//!
//! A sequence is every path parsed with the same template whose fields
//! equal the entity's apart from the sequence field. Path segments that use
//! the sequence field are listed from disk, so output files are found across
//! their `v{version}` directories. All results are computed from the
//! directory contents at call time.

use crate::entity::{list_dir, PathEntity};
use crate::error::{EntityError, Result};
use crate::kinds::{Entity, Increment, OutputFile, OutputFileSequence, OutputVersion, WorkFile};
use shotpath_template::{CanonicalPath, GrammarTable, Template};

/// An entity numbered within a sequence of siblings
pub trait Versioned: Entity + Clone {
    /// Field holding the sequence number
    const SEQUENCE_FIELD: &'static str;

    /// Sequence number
    fn number(&self) -> u32 {
        self.entity().number(Self::SEQUENCE_FIELD).unwrap_or_default()
    }

    /// Same entity with another sequence number (path not created)
    ///
    /// # Errors
    /// Returns error if the number does not fit the grammar width
    fn with_number(&self, table: &GrammarTable, number: u32) -> Result<Self> {
        let mut fields = self.fields().clone();
        fields.insert(Self::SEQUENCE_FIELD, number);
        Self::from_fields(table, self.context(), &fields)
    }

    /// Sibling read from one candidate path
    ///
    /// # Errors
    /// Recoverable match errors if the candidate is not a sibling
    fn parse_sibling(
        _table: &GrammarTable,
        template: &Template,
        candidate: &CanonicalPath,
    ) -> Result<Self> {
        Self::from_entity(PathEntity::parse_with(template, candidate)?)
    }
}

impl Versioned for WorkFile {
    const SEQUENCE_FIELD: &'static str = "version";
}

impl Versioned for Increment {
    const SEQUENCE_FIELD: &'static str = "increment";
}

impl Versioned for OutputVersion {
    const SEQUENCE_FIELD: &'static str = "version";
}

impl Versioned for OutputFile {
    const SEQUENCE_FIELD: &'static str = "version";
}

impl Versioned for OutputFileSequence {
    const SEQUENCE_FIELD: &'static str = "version";

    /// Sequences exist on disk only as frame files
    fn parse_sibling(
        table: &GrammarTable,
        _template: &Template,
        candidate: &CanonicalPath,
    ) -> Result<Self> {
        Self::from_frame_path(table, candidate).map(|(sequence, _)| sequence)
    }
}

/// Sequence number of an entity
#[inline]
#[must_use]
pub fn number_of<T: Versioned>(entity: &T) -> u32 {
    entity.number()
}

/// Paths that may hold a sibling of `path` under `template`
///
/// Segments without `field` are copied from `path`; segments using it are
/// listed from disk. Intermediate entries that are not directories are
/// dropped.
fn sibling_candidates(
    template: &Template,
    path: &CanonicalPath,
    field: &str,
) -> Result<Vec<CanonicalPath>> {
    let Some((root, rest)) = template.roots().split(path) else {
        return Ok(Vec::new());
    };
    if rest.len() != template.depth() {
        return Ok(Vec::new());
    }

    let last = rest.len().saturating_sub(1);
    let mut frontier = vec![root.clone()];
    for (index, (segment, text)) in template.skeleton().segments().iter().zip(rest).enumerate() {
        let listed = segment.fields().any(|name| name == field);
        let mut next = Vec::new();
        for dir in &frontier {
            if !listed {
                next.push(dir.child(text.as_str())?);
                continue;
            }
            for candidate in list_dir(dir)? {
                if index == last || candidate.to_path_buf().is_dir() {
                    next.push(candidate);
                }
            }
        }
        frontier = next;
    }
    Ok(frontier)
}

/// Siblings of `entity` in its sequence, ascending by number
///
/// Entries that do not parse, or that differ in any field but the sequence
/// field, are skipped. `entity` itself is included only if it exists.
///
/// # Errors
/// Returns I/O errors from the directory scan
pub fn find_versions<T: Versioned>(table: &GrammarTable, entity: &T) -> Result<Vec<T>> {
    let template = entity.entity().template(table)?;

    let mut out: Vec<T> = Vec::new();
    for candidate in sibling_candidates(template, entity.path(), T::SEQUENCE_FIELD)? {
        let sibling = match T::parse_sibling(table, template, &candidate) {
            Ok(sibling) => sibling,
            Err(e) if e.is_recoverable() => {
                tracing::trace!(path = %candidate, error = %e, "not a sibling");
                continue;
            }
            Err(e) => return Err(e),
        };
        if entity.fields().matches_except(sibling.fields(), T::SEQUENCE_FIELD) {
            out.push(sibling);
        }
    }
    out.sort_by_key(T::number);
    out.dedup_by(|a, b| a.entity() == b.entity());
    tracing::debug!(
        path = %entity.path(),
        count = out.len(),
        "found versions"
    );
    Ok(out)
}

/// Highest-numbered sibling, or `entity` itself when the sequence is empty
///
/// # Errors
/// Returns I/O errors from the directory scan
pub fn find_latest<T: Versioned>(table: &GrammarTable, entity: &T) -> Result<T> {
    Ok(find_versions(table, entity)?
        .pop()
        .unwrap_or_else(|| entity.clone()))
}

/// Highest-numbered sibling
///
/// # Errors
/// `MissingVersion` if no sibling exists on disk
pub fn require_latest<T: Versioned>(table: &GrammarTable, entity: &T) -> Result<T> {
    find_versions(table, entity)?
        .pop()
        .ok_or_else(|| EntityError::MissingVersion {
            kind: T::KIND,
            path: entity.path().clone(),
        })
}

/// One past the highest number on disk, or 1 for an empty sequence
///
/// Only the path is constructed; nothing is created.
///
/// # Errors
/// Returns error if the next number does not fit the grammar width
pub fn find_next<T: Versioned>(table: &GrammarTable, entity: &T) -> Result<T> {
    let next = find_versions(table, entity)?
        .last()
        .map_or(1, |latest| latest.number().saturating_add(1));
    entity.with_number(table, next)
}

/// True if `entity` is the latest of its sequence
///
/// # Errors
/// Returns I/O errors from the directory scan
pub fn is_latest<T: Versioned>(table: &GrammarTable, entity: &T) -> Result<bool> {
    Ok(find_latest(table, entity)?.entity() == entity.entity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotpath_template::TemplateError;
    use shotpath_test_utils::{ProjectFixture, ASSET, SHOT};

    fn work(fx: &ProjectFixture, version: u32) -> WorkFile {
        WorkFile::parse(
            fx.table(),
            &fx.path(&format!(
                "{SHOT}/anim/work/maya/sh010_anim_blocking_v{version:03}.ma"
            )),
        )
        .unwrap()
    }

    fn rig_output(fx: &ProjectFixture, version: u32) -> OutputFile {
        OutputFile::parse(
            fx.table(),
            &fx.path(&format!(
                "{ASSET}/rig/output/rig/rig_main/v{version:03}/maya/archer_rig_main_v{version:03}.mb"
            )),
        )
        .unwrap()
    }

    #[test]
    fn latest_is_numeric_not_lexicographic() {
        let fx = ProjectFixture::new();
        for v in [1, 2, 3, 10] {
            fx.shot_work_file("blocking", v);
        }
        let latest = find_latest(fx.table(), &work(&fx, 2)).unwrap();
        assert_eq!(latest.version(), 10);
    }

    #[test]
    fn v009_sorts_before_v010() {
        let fx = ProjectFixture::new();
        fx.shot_work_file("blocking", 10);
        fx.shot_work_file("blocking", 9);
        let versions = find_versions(fx.table(), &work(&fx, 9)).unwrap();
        let numbers: Vec<_> = versions.iter().map(number_of).collect();
        assert_eq!(numbers, vec![9, 10]);
        assert!(is_latest(fx.table(), &work(&fx, 10)).unwrap());
        assert!(!is_latest(fx.table(), &work(&fx, 9)).unwrap());
    }

    #[test]
    fn other_tasks_and_extensions_are_not_siblings() {
        let fx = ProjectFixture::new();
        fx.shot_work_file("blocking", 1);
        fx.shot_work_file("spline", 5);
        fx.touch(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v007.mb"));
        fx.touch(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v003.0001.ma"));
        fx.touch(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v04.ma"));

        let versions = find_versions(fx.table(), &work(&fx, 1)).unwrap();
        assert_eq!(versions, vec![work(&fx, 1)]);
    }

    #[test]
    fn next_on_empty_sequence_is_one() {
        let fx = ProjectFixture::new();
        let unsaved = work(&fx, 5);
        assert_eq!(find_next(fx.table(), &unsaved).unwrap().version(), 1);
        assert_eq!(find_latest(fx.table(), &unsaved).unwrap(), unsaved);
        assert!(matches!(
            require_latest(fx.table(), &unsaved),
            Err(EntityError::MissingVersion { .. })
        ));
    }

    #[test]
    fn next_preserves_gaps() {
        let fx = ProjectFixture::new();
        fx.shot_work_file("blocking", 1);
        fx.shot_work_file("blocking", 7);
        let next = find_next(fx.table(), &work(&fx, 1)).unwrap();
        assert_eq!(next.version(), 8);
        assert!(!next.exists());
    }

    #[test]
    fn next_overflowing_width_is_an_error() {
        let fx = ProjectFixture::new();
        fx.shot_work_file("blocking", 999);
        let err = find_next(fx.table(), &work(&fx, 999)).unwrap_err();
        assert!(matches!(
            err,
            EntityError::Template(TemplateError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn increments_sequence_within_one_version() {
        let fx = ProjectFixture::new();
        for name in [
            "sh010_anim_blocking_v003.0001.ma",
            "sh010_anim_blocking_v003.0004.ma",
            "sh010_anim_blocking_v002.0009.ma",
        ] {
            fx.touch(&format!("{SHOT}/anim/work/maya/{name}"));
        }
        let inc = Increment::parse(
            fx.table(),
            &fx.path(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v003.0001.ma")),
        )
        .unwrap();
        assert_eq!(find_latest(fx.table(), &inc).unwrap().increment(), 4);
        assert_eq!(find_next(fx.table(), &inc).unwrap().increment(), 5);
    }

    #[test]
    fn output_files_sequence_across_version_directories() {
        let fx = ProjectFixture::new();
        for v in [2, 3, 16] {
            fx.asset_output_file("rig_main", v, "");
        }
        fx.asset_output_file("rig_alt", 20, "");
        fx.touch(&format!("{ASSET}/rig/output/rig/rig_main/v005/abc/archer_rig_main_v005.abc"));
        fx.touch(&format!("{ASSET}/rig/output/rig/rig_main/notes.txt"));

        let v2 = rig_output(&fx, 2);
        let numbers: Vec<_> = find_versions(fx.table(), &v2)
            .unwrap()
            .iter()
            .map(number_of)
            .collect();
        assert_eq!(numbers, vec![2, 3, 16]);
        assert_eq!(find_latest(fx.table(), &v2).unwrap(), rig_output(&fx, 16));
        assert!(!is_latest(fx.table(), &v2).unwrap());
        assert!(is_latest(fx.table(), &rig_output(&fx, 16)).unwrap());

        let next = find_next(fx.table(), &v2).unwrap();
        assert_eq!(next, rig_output(&fx, 17));
        assert!(!next.exists());
    }

    #[test]
    fn nine_ten_and_gaps_for_work_and_output_files() {
        let fx = ProjectFixture::new();
        for v in [9, 10] {
            fx.shot_work_file("blocking", v);
            fx.asset_output_file("rig_main", v, "");
        }
        assert_eq!(find_latest(fx.table(), &work(&fx, 9)).unwrap().version(), 10);
        assert_eq!(find_latest(fx.table(), &rig_output(&fx, 9)).unwrap().number(), 10);

        let fx = ProjectFixture::new();
        for v in [1, 5] {
            fx.shot_work_file("spline", v);
            fx.asset_output_file("rig_main", v, "");
        }
        let spline = WorkFile::parse(
            fx.table(),
            &fx.path(&format!("{SHOT}/anim/work/maya/sh010_anim_spline_v001.ma")),
        )
        .unwrap();
        assert_eq!(find_next(fx.table(), &spline).unwrap().version(), 6);
        assert_eq!(find_next(fx.table(), &rig_output(&fx, 1)).unwrap().number(), 6);
    }

    #[test]
    fn frame_sequences_sequence_by_version() {
        let fx = ProjectFixture::new();
        for v in [1, 4] {
            fx.shot_render_frame("beauty", v, 1001);
            fx.shot_render_frame("beauty", v, 1002);
        }
        fx.shot_render_frame("specular", 7, 1001);

        let (first, _) =
            OutputFileSequence::from_frame_path(fx.table(), &fx.shot_render_frame("beauty", 1, 1001))
                .unwrap();
        let versions: Vec<_> = find_versions(fx.table(), &first)
            .unwrap()
            .iter()
            .map(OutputFileSequence::version)
            .collect();
        assert_eq!(versions, vec![1, 4]);
        assert_eq!(find_next(fx.table(), &first).unwrap().version(), 5);
    }
}
