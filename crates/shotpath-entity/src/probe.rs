//! Kind probing
//!
//! A path of unknown kind is tried against every template, most specific
//! kind first. Each attempt yields a tagged outcome; nothing is thrown and
//! caught.

use crate::entity::{malformed_error, PathEntity};
use crate::error::{EntityError, Result};
use crate::frames::FRAME_FIELD;
use crate::kinds::{AnyEntity, OutputFileSequence};
use shotpath_template::{CanonicalPath, Context, EntityKind, Fields, GrammarTable, MatchError};

/// Kinds in the order they are probed
pub const PROBE_ORDER: [EntityKind; 12] = [
    EntityKind::Increment,
    EntityKind::WorkFile,
    EntityKind::OutputFileSequence,
    EntityKind::OutputFile,
    EntityKind::OutputVersion,
    EntityKind::OutputName,
    EntityKind::OutputType,
    EntityKind::WorkArea,
    EntityKind::StepRoot,
    EntityKind::EntityRoot,
    EntityKind::SequenceRoot,
    EntityKind::ProjectRoot,
];

/// Result of one template against one path
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// Kind of the template
    pub kind: EntityKind,
    /// Context of the template
    pub context: Context,
    /// Parsed fields, or why the template did not apply
    pub result: std::result::Result<Fields, MatchError>,
}

impl ProbeOutcome {
    /// True if the template parsed the path
    #[inline]
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.result.is_ok()
    }
}

/// Try every template on `path`, in probe order
///
/// Within one kind, templates keep their table order.
#[must_use]
pub fn try_parse(table: &GrammarTable, path: &CanonicalPath) -> Vec<ProbeOutcome> {
    PROBE_ORDER
        .iter()
        .flat_map(|kind| table.templates_for(*kind))
        .map(|template| ProbeOutcome {
            kind: template.kind(),
            context: template.context(),
            result: template.parse(path),
        })
        .collect()
}

/// Entity of the first template that parses `path`
///
/// A concrete frame file resolves to the sequence that owns it.
///
/// # Errors
/// `MalformedField` for the first template that selected the path but
/// rejected a field, `Unrecognised` if no template selected it
pub fn resolve(table: &GrammarTable, path: &CanonicalPath) -> Result<AnyEntity> {
    let mut first_malformed = None;

    for outcome in try_parse(table, path) {
        match outcome.result {
            Ok(fields) => {
                let entity = PathEntity::new(outcome.kind, outcome.context, path.clone(), fields);
                return Ok(AnyEntity::from_entity(entity));
            }
            Err(MatchError::NoMatch(reason)) => {
                tracing::trace!(
                    kind = %outcome.kind,
                    context = outcome.context.as_str(),
                    %reason,
                    "probe miss"
                );
            }
            Err(MatchError::Malformed { ref field, .. })
                if outcome.kind == EntityKind::OutputFileSequence && field == FRAME_FIELD =>
            {
                match OutputFileSequence::from_frame_path(table, path) {
                    Ok((sequence, _)) => return Ok(AnyEntity::OutputFileSequence(sequence)),
                    Err(e) if e.is_recoverable() => {
                        tracing::trace!(error = %e, "not a frame file");
                        first_malformed.get_or_insert(e);
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(malformed) => {
                tracing::trace!(kind = %outcome.kind, error = %malformed, "probe malformed");
                if first_malformed.is_none() {
                    first_malformed = Some(malformed_error(outcome.kind, path, malformed));
                }
            }
        }
    }

    Err(first_malformed.unwrap_or_else(|| EntityError::Unrecognised { path: path.clone() }))
}

/// Canonicalise a raw path string, then resolve it
///
/// # Errors
/// See [`resolve`]; also fails on relative paths
pub fn resolve_str(table: &GrammarTable, raw: impl AsRef<str>) -> Result<AnyEntity> {
    resolve(table, &CanonicalPath::new(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::Entity;
    use shotpath_test_utils::{ProjectFixture, ASSET, SHOT};

    fn kind_of(fx: &ProjectFixture, rel: &str) -> EntityKind {
        resolve(fx.table(), &fx.path(rel)).unwrap().kind()
    }

    #[test]
    fn every_level_resolves_to_its_kind() {
        let fx = ProjectFixture::new();
        let cases = [
            ("demo", EntityKind::ProjectRoot),
            ("demo/sequences/sq010", EntityKind::SequenceRoot),
            (SHOT, EntityKind::EntityRoot),
            (ASSET, EntityKind::EntityRoot),
            ("demo/assets/character", EntityKind::SequenceRoot),
        ];
        for (rel, kind) in cases {
            assert_eq!(kind_of(&fx, rel), kind, "{rel}");
        }

        let shot_cases = [
            ("anim", EntityKind::StepRoot),
            ("anim/work/maya", EntityKind::WorkArea),
            ("anim/work/maya/sh010_anim_blocking_v001.ma", EntityKind::WorkFile),
            ("anim/work/maya/sh010_anim_blocking_v001.0002.ma", EntityKind::Increment),
            ("light/output/render", EntityKind::OutputType),
            ("light/output/render/beauty", EntityKind::OutputName),
            ("light/output/render/beauty/v002", EntityKind::OutputVersion),
            (
                "light/output/render/beauty/v002/exr/sh010_beauty_v002.####.exr",
                EntityKind::OutputFileSequence,
            ),
            (
                "light/output/render/beauty/v002/mov/sh010_beauty_v002.mov",
                EntityKind::OutputFile,
            ),
        ];
        for (rel, kind) in shot_cases {
            assert_eq!(kind_of(&fx, &format!("{SHOT}/{rel}")), kind, "{rel}");
        }
    }

    #[test]
    fn outcomes_follow_probe_order() {
        let fx = ProjectFixture::new();
        let outcomes = try_parse(fx.table(), &fx.path(SHOT));
        assert_eq!(outcomes.len(), fx.table().templates().len());
        assert_eq!(outcomes[0].kind, EntityKind::Increment);
        assert_eq!(outcomes[0].context, Context::Shot);
        assert_eq!(outcomes[1].context, Context::Asset);
        assert_eq!(outcomes.last().map(|o| o.kind), Some(EntityKind::ProjectRoot));

        let matches: Vec<_> = outcomes.iter().filter(|o| o.is_match()).collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, EntityKind::EntityRoot);
    }

    #[test]
    fn unknown_and_outside_paths() {
        let fx = ProjectFixture::new();
        let err = resolve(fx.table(), &fx.path("demo/editorial/notes.txt")).unwrap_err();
        assert!(matches!(err, EntityError::Unrecognised { .. }));
        assert!(err.is_no_match());

        let outside = CanonicalPath::new("/elsewhere/demo").unwrap();
        assert!(matches!(
            resolve(fx.table(), &outside),
            Err(EntityError::Unrecognised { .. })
        ));
    }

    #[test]
    fn malformed_version_is_reported() {
        let fx = ProjectFixture::new();
        let err = resolve(
            fx.table(),
            &fx.path(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v01.ma")),
        )
        .unwrap_err();
        assert!(matches!(err, EntityError::MalformedField { .. }), "{err}");
        assert!(err.is_recoverable());
    }

    #[test]
    fn frame_file_resolves_to_its_sequence() {
        let fx = ProjectFixture::new();
        let frame = fx.shot_render_frame("beauty", 2, 1001);
        let AnyEntity::OutputFileSequence(sequence) = resolve(fx.table(), &frame).unwrap() else {
            panic!("expected an output file sequence");
        };
        assert_eq!(sequence.version(), 2);
        assert_eq!(
            sequence.path(),
            &fx.path(&format!(
                "{SHOT}/light/output/render/beauty/v002/exr/sh010_beauty_v002.####.exr"
            ))
        );
        assert_eq!(sequence.frame_path(fx.table(), 1001).unwrap(), frame);
    }

    #[test]
    fn short_frame_number_stays_malformed() {
        let fx = ProjectFixture::new();
        let path = fx.path(&format!(
            "{SHOT}/light/output/render/beauty/v002/exr/sh010_beauty_v002.101.exr"
        ));
        let err = resolve(fx.table(), &path).unwrap_err();
        assert!(matches!(err, EntityError::MalformedField { .. }), "{err}");
    }
}
