//! Provenance queries over embedded metadata
//!
//! Unreadable records and unparseable origins are reported as
//! [`Provenance::Unknown`], never as errors.

use crate::error::{EntityError, Result};
use crate::hierarchy::HasParent;
use crate::kinds::{AnyEntity, Entity, OutputFileSequence, OutputVersion, WorkFile};
use crate::metadata::{MetadataMap, MetadataReader};
use crate::probe;
use serde_json::Value;
use shotpath_template::{CanonicalPath, Context, EntityKind, GrammarTable};

const ORIGIN_KEY: &str = "origin";
const SOURCE_ASSET_KEY: &str = "source_asset";

/// Where an artifact came from
#[derive(Debug, Clone, PartialEq)]
pub enum Provenance {
    /// Recorded path resolved to an entity
    Known(AnyEntity),
    /// No record, or a path no grammar matched
    Unknown {
        /// Recorded path, if any
        origin: Option<String>,
    },
}

impl Provenance {
    /// Resolved entity, if known
    #[must_use]
    pub fn entity(&self) -> Option<&AnyEntity> {
        match self {
            Self::Known(entity) => Some(entity),
            Self::Unknown { .. } => None,
        }
    }

    /// True if the origin resolved
    #[inline]
    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

fn read_quietly(reader: &MetadataReader, path: &CanonicalPath) -> Option<MetadataMap> {
    match reader.read(&path.to_path_buf()) {
        Ok(map) => Some(map),
        Err(e) => {
            tracing::debug!(path = %path, error = %e, "metadata unavailable");
            None
        }
    }
}

fn recorded_entity(table: &GrammarTable, map: Option<&MetadataMap>, key: &str) -> Provenance {
    let Some(Value::String(recorded)) = map.and_then(|map| map.get(key)) else {
        return Provenance::Unknown { origin: None };
    };
    let resolved = CanonicalPath::new(recorded)
        .map_err(EntityError::from)
        .and_then(|path| probe::resolve(table, &path));
    match resolved {
        Ok(entity) => Provenance::Known(entity),
        Err(e) => {
            tracing::debug!(recorded = %recorded, error = %e, "recorded path not recognised");
            Provenance::Unknown {
                origin: Some(recorded.clone()),
            }
        }
    }
}

/// Entity the artifact at `path` was produced from
#[must_use]
pub fn provenance_of(
    table: &GrammarTable,
    path: &CanonicalPath,
    reader: &MetadataReader,
) -> Provenance {
    recorded_entity(table, read_quietly(reader, path).as_ref(), ORIGIN_KEY)
}

/// Asset the artifact at `path` derives from
///
/// A recorded path below an asset resolves to that asset's entity root.
/// Anything outside an asset branch is `Unknown`.
#[must_use]
pub fn source_asset_of(
    table: &GrammarTable,
    path: &CanonicalPath,
    reader: &MetadataReader,
) -> Provenance {
    let provenance = recorded_entity(table, read_quietly(reader, path).as_ref(), SOURCE_ASSET_KEY);
    let Provenance::Known(entity) = provenance else {
        return provenance;
    };
    let origin = Some(entity.path().to_string());
    if entity.entity().context() != Context::Asset {
        return Provenance::Unknown { origin };
    }
    if matches!(entity, AnyEntity::EntityRoot(_)) {
        return Provenance::Known(entity);
    }
    match entity.entity().parent_of_kind(table, EntityKind::EntityRoot) {
        Ok(root) => Provenance::Known(AnyEntity::from_entity(root)),
        Err(_) => Provenance::Unknown { origin },
    }
}

fn produced_by(table: &GrammarTable, provenance: &Provenance, work_file: &WorkFile) -> bool {
    match provenance.entity() {
        Some(AnyEntity::WorkFile(origin)) => origin == work_file,
        Some(AnyEntity::Increment(origin)) => origin
            .get_work(table)
            .is_ok_and(|owner| &owner == work_file),
        _ => false,
    }
}

/// Provenance of a frame sequence, read from its first frame on disk
fn sequence_produced_by(
    table: &GrammarTable,
    sequence: &OutputFileSequence,
    reader: &MetadataReader,
    work_file: &WorkFile,
) -> Result<bool> {
    let Some(first) = sequence.frames(table)?.first().copied() else {
        return Ok(false);
    };
    let frame = sequence.frame_path(table, first)?;
    Ok(produced_by(table, &provenance_of(table, &frame, reader), work_file))
}

/// Output versions whose files or frame sequences record `work_file` or one
/// of its increments as their origin
///
/// # Errors
/// Returns I/O errors from walking the step's output tree
pub fn outputs_of(
    table: &GrammarTable,
    work_file: &WorkFile,
    reader: &MetadataReader,
) -> Result<Vec<OutputVersion>> {
    let step = work_file.parent(table)?.parent(table)?;
    let mut out = Vec::new();

    for output_type in step.output_types(table)? {
        for output_name in output_type.output_names(table)? {
            for version in output_name.output_versions(table)? {
                let files = version.output_files(table)?;
                let mut produced = files.iter().any(|file| {
                    produced_by(table, &provenance_of(table, file.path(), reader), work_file)
                });
                if !produced {
                    for sequence in version.output_file_sequences(table)? {
                        if sequence_produced_by(table, &sequence, reader, work_file)? {
                            produced = true;
                            break;
                        }
                    }
                }
                if produced {
                    out.push(version);
                }
            }
        }
    }

    tracing::debug!(work_file = %work_file.path(), count = out.len(), "found outputs");
    Ok(out)
}
