//! Templates: one entity kind's grammar
//!
//! A [`Template`] pairs a [`Skeleton`] with the constraints of the fields it
//! uses. It parses concrete paths into [`Fields`] and builds paths back
//! from them, with the round-trip guarantee
//! `parse(apply_fields(f)) == f` for every valid `f`.

use crate::constraint::{Constraint, MAX_WIDTH};
use crate::error::{MatchError, Mismatch, TemplateError};
use crate::field::{FieldValue, Fields, ROOT_FIELD};
use crate::path::CanonicalPath;
use crate::skeleton::{match_segment, Captures, Piece, SegmentFailure, Skeleton};
use crate::table::{Context, EntityKind, ProjectRoots};
use indexmap::IndexMap;

/// Grammar of one entity kind in one context
#[derive(Debug, Clone)]
pub struct Template {
    kind: EntityKind,
    context: Context,
    skeleton: Skeleton,
    fields: IndexMap<String, Constraint>,
    roots: ProjectRoots,
}

impl Template {
    /// Build a template from a skeleton and the declared field constraints
    ///
    /// Only the constraints of fields the skeleton uses are kept, in order
    /// of first appearance.
    ///
    /// # Errors
    /// Returns error if the skeleton uses an undeclared field, a numeric
    /// width is out of range, or version fields declare mixed widths
    pub fn new(
        kind: EntityKind,
        context: Context,
        skeleton: Skeleton,
        declared: &IndexMap<String, Constraint>,
        roots: ProjectRoots,
    ) -> Result<Self, TemplateError> {
        let mut fields = IndexMap::new();
        for name in skeleton.field_names() {
            let constraint = declared
                .get(name)
                .ok_or_else(|| TemplateError::UndeclaredField {
                    kind,
                    context,
                    field: name.to_string(),
                })?;
            fields.insert(name.to_string(), constraint.clone());
        }

        let template = Self {
            kind,
            context,
            skeleton,
            fields,
            roots,
        };
        template.validate()?;
        Ok(template)
    }

    fn validate(&self) -> Result<(), TemplateError> {
        let mut widths: Vec<usize> = Vec::new();
        for (name, constraint) in &self.fields {
            if let Some(width) = constraint.width() {
                if width == 0 || width > MAX_WIDTH {
                    return Err(TemplateError::InvalidWidth {
                        field: name.clone(),
                        width,
                    });
                }
            }
            if let Some(width) = constraint.version_width() {
                if !widths.contains(&width) {
                    widths.push(width);
                }
            }
        }
        if widths.len() > 1 {
            return Err(TemplateError::MixedVersionWidths {
                kind: self.kind,
                context: self.context,
                widths,
            });
        }
        Ok(())
    }

    /// Entity kind this template describes
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Context (project, shot or asset branch)
    #[inline]
    #[must_use]
    pub fn context(&self) -> Context {
        self.context
    }

    /// The path skeleton
    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Number of segments below the project root
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.skeleton.len()
    }

    /// Project roots paths are resolved against
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &ProjectRoots {
        &self.roots
    }

    /// Field names in order, excluding `root`
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Constraint of one field
    #[inline]
    #[must_use]
    pub fn constraint(&self, field: &str) -> Option<&Constraint> {
        self.fields.get(field)
    }

    /// Check if the template uses a field
    #[inline]
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Width of the version token, if the template has one
    #[must_use]
    pub fn version_width(&self) -> Option<usize> {
        self.fields.values().find_map(Constraint::version_width)
    }

    /// Same template with one field re-constrained
    ///
    /// # Errors
    /// Returns error if the field is not used by the template or the
    /// result fails validation
    pub fn with_constraint(
        &self,
        field: &str,
        constraint: Constraint,
    ) -> Result<Self, TemplateError> {
        let slot = self.fields.get(field).ok_or_else(|| TemplateError::UndeclaredField {
            kind: self.kind,
            context: self.context,
            field: field.to_string(),
        })?;
        if *slot == constraint {
            return Ok(self.clone());
        }
        let mut out = self.clone();
        out.fields.insert(field.to_string(), constraint);
        out.validate()?;
        Ok(out)
    }

    /// Build a concrete path from field values
    ///
    /// Fields the template does not use are ignored.
    ///
    /// # Errors
    /// - `MissingField` if `root` or a used field is absent
    /// - `ConstraintViolation` if a value violates its constraint
    /// - `UnknownRoot` if `root` is not a configured project root
    pub fn apply_fields(&self, fields: &Fields) -> Result<CanonicalPath, TemplateError> {
        let root_text = fields.root().ok_or_else(|| TemplateError::MissingField {
            kind: self.kind,
            field: ROOT_FIELD.to_string(),
        })?;
        let root = CanonicalPath::new(root_text)?;
        if !self.roots.contains(&root) {
            return Err(TemplateError::UnknownRoot {
                root: root.to_string(),
            });
        }

        let mut segments = Vec::with_capacity(self.skeleton.len());
        for segment in self.skeleton.segments() {
            let mut text = String::new();
            for piece in segment.pieces() {
                match piece {
                    Piece::Literal(literal) => text.push_str(literal),
                    Piece::Field(name) => text.push_str(&self.format_field(name, fields)?),
                }
            }
            segments.push(text);
        }

        Ok(root.with_segments(segments)?)
    }

    fn format_field(&self, name: &str, fields: &Fields) -> Result<String, TemplateError> {
        let value = fields.get(name).ok_or_else(|| TemplateError::MissingField {
            kind: self.kind,
            field: name.to_string(),
        })?;
        let constraint = self
            .fields
            .get(name)
            .ok_or_else(|| TemplateError::UndeclaredField {
                kind: self.kind,
                context: self.context,
                field: name.to_string(),
            })?;
        constraint
            .format_value(value)
            .map_err(|e| TemplateError::ConstraintViolation {
                kind: self.kind,
                field: name.to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    /// Parse a concrete path into field values
    ///
    /// Literal segments are compared first, then each wildcard field is
    /// extracted and validated on its own so a failure names the field.
    ///
    /// # Errors
    /// - `NoMatch` if the path is outside the roots, has the wrong number of
    ///   segments, or its literals do not line up
    /// - `Malformed` if the shape matches but a field fails its constraint
    ///   or disagrees with an earlier occurrence of the same field
    pub fn parse(&self, path: &CanonicalPath) -> Result<Fields, MatchError> {
        let (root, rest) = self
            .roots
            .split(path)
            .ok_or(MatchError::NoMatch(Mismatch::OutsideRoots))?;

        if rest.len() != self.skeleton.len() {
            return Err(MatchError::NoMatch(Mismatch::SegmentCount {
                expected: self.skeleton.len(),
                actual: rest.len(),
            }));
        }

        for (index, (segment, text)) in self.skeleton.segments().iter().zip(rest).enumerate() {
            if let Some(literal) = segment.as_literal() {
                if literal != text {
                    return Err(MatchError::NoMatch(Mismatch::Literal {
                        index,
                        expected: literal.to_string(),
                        actual: text.clone(),
                    }));
                }
            }
        }

        let mut bound = Fields::new().with(ROOT_FIELD, root.to_string());
        for (index, (segment, text)) in self.skeleton.segments().iter().zip(rest).enumerate() {
            if segment.as_literal().is_some() {
                continue;
            }
            let captures = {
                let bound = &bound;
                match_segment(segment, text, &mut |name, raw, captures| {
                    self.check_field(name, raw, bound, captures)
                })
            };
            match captures {
                Ok(captures) => {
                    for (name, value) in captures {
                        if !bound.contains(&name) {
                            bound.insert(name, value);
                        }
                    }
                }
                Err(SegmentFailure::Literal) => {
                    return Err(MatchError::NoMatch(Mismatch::Literal {
                        index,
                        expected: segment.to_string(),
                        actual: text.clone(),
                    }));
                }
                Err(SegmentFailure::Field(failure)) => {
                    return Err(MatchError::Malformed {
                        field: failure.field,
                        value: failure.value,
                        reason: failure.reason,
                    });
                }
            }
        }

        Ok(bound)
    }

    fn check_field(
        &self,
        name: &str,
        raw: &str,
        bound: &Fields,
        captures: &Captures,
    ) -> Result<FieldValue, String> {
        let constraint = self
            .fields
            .get(name)
            .ok_or_else(|| format!("field '{name}' is not declared"))?;
        let value = constraint.parse_value(raw).map_err(|e| e.to_string())?;

        let earlier = bound.get(name).or_else(|| {
            captures
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value)
        });
        match earlier {
            Some(previous) if *previous != value => Err(format!(
                "conflicts with earlier value '{previous}'"
            )),
            _ => Ok(value),
        }
    }
}
