//! Output file sequences
//!
//! A sequence entity carries a `####` placeholder in place of the frame
//! number. Concrete frame files are read by re-constraining the `frame`
//! field of the same template to a fixed-width number.

use crate::entity::{list_descendants, list_dir, PathEntity};
use crate::error::{EntityError, Result};
use crate::kinds::{Entity, OutputFileSequence, OutputVersion};
use shotpath_template::{
    CanonicalPath, Constraint, EntityKind, FieldValue, GrammarTable, Template,
};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

pub(crate) const FRAME_FIELD: &str = "frame";

/// Template reading concrete frame numbers, plus the placeholder width
fn frame_template(template: &Template) -> Result<(Template, usize)> {
    let width = template
        .constraint(FRAME_FIELD)
        .and_then(Constraint::width)
        .unwrap_or(4);
    let frames = template.with_constraint(FRAME_FIELD, Constraint::Number { width })?;
    Ok((frames, width))
}

fn placeholder(width: usize) -> FieldValue {
    FieldValue::Text("#".repeat(width))
}

impl OutputFileSequence {
    /// Sequence owning one concrete frame file, and that frame's number
    ///
    /// # Errors
    /// `NoMatch` or `MalformedField` if the path is not a frame file
    pub fn from_frame_path(table: &GrammarTable, path: &CanonicalPath) -> Result<(Self, u32)> {
        let mut first_error = None;
        for template in table.templates_for(EntityKind::OutputFileSequence) {
            let (frames, width) = frame_template(template)?;
            match PathEntity::parse_with(&frames, path) {
                Ok(frame_file) => {
                    let number = frame_file.number(FRAME_FIELD).unwrap_or_default();
                    let mut fields = frame_file.fields().clone();
                    fields.insert(FRAME_FIELD, placeholder(width));
                    let sequence = Self::from_fields(table, template.context(), &fields)?;
                    return Ok((sequence, number));
                }
                Err(e) if e.is_recoverable() => {
                    first_error.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(first_error.unwrap_or_else(|| EntityError::Unrecognised { path: path.clone() }))
    }

    /// Version number
    #[must_use]
    pub fn version(&self) -> u32 {
        self.entity().number("version").unwrap_or_default()
    }

    /// Path of one frame (not created)
    ///
    /// # Errors
    /// Returns error if the frame number does not fit the placeholder width
    pub fn frame_path(&self, table: &GrammarTable, frame: u32) -> Result<CanonicalPath> {
        let (frames, _) = frame_template(self.entity().template(table)?)?;
        let fields = self.fields().clone().with(FRAME_FIELD, frame);
        Ok(frames.apply_fields(&fields)?)
    }

    /// Frame numbers present on disk, ascending
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn frames(&self, table: &GrammarTable) -> Result<Vec<u32>> {
        let (frames, _) = frame_template(self.entity().template(table)?)?;
        let Some(dir) = self.path().parent() else {
            return Ok(Vec::new());
        };

        let mut found = BTreeSet::new();
        for candidate in list_dir(&dir)? {
            let frame_file = match PathEntity::parse_with(&frames, &candidate) {
                Ok(frame_file) => frame_file,
                Err(e) if e.is_recoverable() => continue,
                Err(e) => return Err(e),
            };
            if self.fields().matches_except(frame_file.fields(), FRAME_FIELD) {
                if let Some(n) = frame_file.number(FRAME_FIELD) {
                    found.insert(n);
                }
            }
        }
        Ok(found.into_iter().collect())
    }

    /// First and last frame on disk
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn frame_range(&self, table: &GrammarTable) -> Result<Option<RangeInclusive<u32>>> {
        let frames = self.frames(table)?;
        Ok(match (frames.first(), frames.last()) {
            (Some(first), Some(last)) => Some(*first..=*last),
            _ => None,
        })
    }

    /// Frames inside the range that are absent on disk
    ///
    /// # Errors
    /// Returns I/O errors from the directory scan
    pub fn missing_frames(&self, table: &GrammarTable) -> Result<Vec<u32>> {
        let frames = self.frames(table)?;
        let (Some(first), Some(last)) = (frames.first(), frames.last()) else {
            return Ok(Vec::new());
        };
        let present: BTreeSet<u32> = frames.iter().copied().collect();
        Ok((*first..=*last).filter(|n| !present.contains(n)).collect())
    }
}

/// Distinct frame sequences below an output version
pub(crate) fn sequences_below(
    table: &GrammarTable,
    version: &OutputVersion,
) -> Result<Vec<OutputFileSequence>> {
    let mut out: Vec<OutputFileSequence> = Vec::new();
    for format_dir in list_descendants(version.path(), 1)? {
        for candidate in list_dir(&format_dir)? {
            match OutputFileSequence::from_frame_path(table, &candidate) {
                Ok((sequence, _)) => {
                    if !out.contains(&sequence) {
                        out.push(sequence);
                    }
                }
                Err(e) if e.is_recoverable() => {
                    tracing::trace!(path = %candidate, error = %e, "not a frame file");
                }
                Err(e) => return Err(e),
            }
        }
    }
    out.sort();
    Ok(out)
}
