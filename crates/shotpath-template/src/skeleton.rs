//! Path skeletons
//!
//! A [`Skeleton`] is the textual shape of a template, such as
//! `{project}/sequences/{sequence}/{shot}`: a list of segments, each made of
//! literal pieces and `{field}` wildcards.

use crate::error::TemplateError;
use crate::field::{FieldValue, ROOT_FIELD};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One piece of a skeleton segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Text that must appear verbatim
    Literal(String),
    /// Wildcard filled by a named field
    Field(String),
}

/// One `/`-separated segment of a skeleton
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pieces: Vec<Piece>,
}

impl Segment {
    /// Pieces left to right
    #[inline]
    #[must_use]
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// The literal text if the segment has no fields
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self.pieces.as_slice() {
            [Piece::Literal(text)] => Some(text),
            _ => None,
        }
    }

    /// Field names used in this segment
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Field(name) => Some(name.as_str()),
            Piece::Literal(_) => None,
        })
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => write!(f, "{text}")?,
                Piece::Field(name) => write!(f, "{{{name}}}")?,
            }
        }
        Ok(())
    }
}

/// Relative path pattern of literal and wildcard segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    segments: Vec<Segment>,
}

impl Skeleton {
    /// Parse skeleton text
    ///
    /// # Errors
    /// Returns error for absolute or empty skeletons, empty segments,
    /// unbalanced braces, bad field names, or two fields with no literal
    /// between them
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let invalid = |reason: &str| TemplateError::Skeleton {
            skeleton: text.to_string(),
            reason: reason.to_string(),
        };

        if text.is_empty() {
            return Err(invalid("skeleton is empty"));
        }
        if text.starts_with('/') || text.contains('\\') {
            return Err(invalid("skeleton must be a relative '/'-separated path"));
        }

        let mut segments = Vec::new();
        for raw in text.split('/') {
            if raw.is_empty() {
                return Err(invalid("empty segment"));
            }
            segments.push(parse_segment(text, raw)?);
        }

        Ok(Self { segments })
    }

    /// Segments in order
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if empty (never true for a parsed skeleton)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Field names in order of first appearance
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.segments.iter().flat_map(Segment::fields) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

fn parse_segment(skeleton: &str, raw: &str) -> Result<Segment, TemplateError> {
    let invalid = |reason: String| TemplateError::Skeleton {
        skeleton: skeleton.to_string(),
        reason,
    };

    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    match c {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(invalid(format!("nested '{{' in segment '{raw}'"))),
                        c if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' => {
                            name.push(c);
                        }
                        c => {
                            return Err(invalid(format!(
                                "invalid character '{c}' in field name in segment '{raw}'"
                            )))
                        }
                    }
                }
                if !closed {
                    return Err(invalid(format!("unclosed '{{' in segment '{raw}'")));
                }
                if name.is_empty() {
                    return Err(invalid(format!("empty field name in segment '{raw}'")));
                }
                if name == ROOT_FIELD {
                    return Err(TemplateError::ReservedField { field: name });
                }
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                if let Some(Piece::Field(previous)) = pieces.last() {
                    return Err(TemplateError::AdjacentFields {
                        skeleton: skeleton.to_string(),
                        first: previous.clone(),
                        second: name,
                    });
                }
                pieces.push(Piece::Field(name));
            }
            '}' => return Err(invalid(format!("unmatched '}}' in segment '{raw}'"))),
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    if raw == "." || raw == ".." {
        return Err(invalid(format!("segment '{raw}' is not allowed")));
    }

    Ok(Segment { pieces })
}

impl FromStr for Skeleton {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Skeleton {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Field that failed its check while matching a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldFailure {
    pub(crate) field: String,
    pub(crate) value: String,
    pub(crate) reason: String,
}

/// Why a segment did not match
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SegmentFailure {
    /// Literals cannot be aligned with the text
    Literal,
    /// Literals align but no split satisfies every field
    Field(FieldFailure),
}

/// Captured `(field, value)` pairs of one segment, left to right
pub(crate) type Captures = Vec<(String, FieldValue)>;

/// Match one mixed segment against a path segment
///
/// `check` validates a raw token for a field given the captures made so far
/// in this segment. A field followed by a literal may end at any occurrence
/// of that literal; splits are tried left to right and the first one where
/// every field passes wins.
pub(crate) fn match_segment<F>(
    segment: &Segment,
    text: &str,
    check: &mut F,
) -> Result<Captures, SegmentFailure>
where
    F: FnMut(&str, &str, &Captures) -> Result<FieldValue, String>,
{
    let mut captures = Vec::new();
    let mut first_failure = None;
    if walk(
        &segment.pieces,
        text,
        &mut captures,
        check,
        &mut first_failure,
    ) {
        return Ok(captures);
    }

    // Would the literals align if every field accepted anything?
    let mut accept_all =
        |_: &str, raw: &str, _: &Captures| Ok::<_, String>(FieldValue::Text(raw.to_string()));
    let aligned = walk(
        &segment.pieces,
        text,
        &mut Vec::new(),
        &mut accept_all,
        &mut None,
    );

    match (aligned, first_failure) {
        (true, Some(failure)) => Err(SegmentFailure::Field(failure)),
        _ => Err(SegmentFailure::Literal),
    }
}

fn walk<F>(
    pieces: &[Piece],
    text: &str,
    captures: &mut Captures,
    check: &mut F,
    first_failure: &mut Option<FieldFailure>,
) -> bool
where
    F: FnMut(&str, &str, &Captures) -> Result<FieldValue, String>,
{
    match pieces.split_first() {
        None => text.is_empty(),
        Some((Piece::Literal(literal), rest)) => text
            .strip_prefix(literal.as_str())
            .is_some_and(|tail| walk(rest, tail, captures, check, first_failure)),
        Some((Piece::Field(name), rest)) => {
            for end in candidate_ends(text, rest.first()) {
                let raw = &text[..end];
                match check(name, raw, captures) {
                    Ok(value) => {
                        captures.push((name.clone(), value));
                        if walk(rest, &text[end..], captures, check, first_failure) {
                            return true;
                        }
                        captures.pop();
                    }
                    Err(reason) => {
                        if first_failure.is_none() {
                            *first_failure = Some(FieldFailure {
                                field: name.clone(),
                                value: raw.to_string(),
                                reason,
                            });
                        }
                    }
                }
            }
            false
        }
    }
}

/// Byte offsets where a field starting at 0 may end
fn candidate_ends(text: &str, next: Option<&Piece>) -> Vec<usize> {
    match next {
        None if text.is_empty() => Vec::new(),
        None => vec![text.len()],
        Some(Piece::Literal(literal)) => text
            .char_indices()
            .map(|(i, _)| i)
            .filter(|&i| i > 0 && text[i..].starts_with(literal.as_str()))
            .collect(),
        // Adjacent fields are rejected when the skeleton is parsed
        Some(Piece::Field(_)) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any_text(_: &str, raw: &str, _: &Captures) -> Result<FieldValue, String> {
        Ok(FieldValue::Text(raw.to_string()))
    }

    #[test]
    fn parse_literal_and_field_segments() {
        let skeleton = Skeleton::parse("{project}/sequences/{shot}_v{version}.{ext}").unwrap();
        assert_eq!(skeleton.len(), 3);
        assert_eq!(skeleton.segments()[1].as_literal(), Some("sequences"));
        assert_eq!(
            skeleton.segments()[2].pieces(),
            &[
                Piece::Field("shot".into()),
                Piece::Literal("_v".into()),
                Piece::Field("version".into()),
                Piece::Literal(".".into()),
                Piece::Field("ext".into()),
            ]
        );
        assert_eq!(
            skeleton.field_names(),
            vec!["project", "shot", "version", "ext"]
        );
        assert_eq!(
            skeleton.to_string(),
            "{project}/sequences/{shot}_v{version}.{ext}"
        );
    }

    #[test]
    fn reject_bad_skeletons() {
        for bad in [
            "",
            "/abs/{x}",
            "a//b",
            "{open",
            "close}",
            "{}",
            "{Upper}",
            "{a{b}}",
            "a/./b",
        ] {
            assert!(Skeleton::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn reject_adjacent_fields() {
        assert!(matches!(
            Skeleton::parse("{shot}{step}"),
            Err(TemplateError::AdjacentFields { .. })
        ));
    }

    #[test]
    fn reject_reserved_root_field() {
        assert!(matches!(
            Skeleton::parse("{root}/x"),
            Err(TemplateError::ReservedField { .. })
        ));
    }

    #[test]
    fn field_may_contain_following_literal() {
        let skeleton = Skeleton::parse("{name}_v{version}").unwrap();
        let mut check = |field: &str, raw: &str, _: &Captures| {
            if field == "version" && !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err("not numeric".to_string());
            }
            Ok(FieldValue::Text(raw.to_string()))
        };
        let captures = match_segment(&skeleton.segments()[0], "a_v1_v003", &mut check).unwrap();
        assert_eq!(captures[0].1, FieldValue::Text("a_v1".into()));
        assert_eq!(captures[1].1, FieldValue::Text("003".into()));
    }

    #[test]
    fn literal_mismatch_versus_field_failure() {
        let skeleton = Skeleton::parse("{name}_v{version}.{ext}").unwrap();
        let segment = &skeleton.segments()[0];

        assert_eq!(
            match_segment(segment, "shot010.ma", &mut any_text),
            Err(SegmentFailure::Literal)
        );

        let mut reject_ext = |field: &str, raw: &str, _: &Captures| {
            if field == "ext" {
                Err("bad ext".to_string())
            } else {
                Ok(FieldValue::Text(raw.to_string()))
            }
        };
        match match_segment(segment, "shot_v001.ma", &mut reject_ext) {
            Err(SegmentFailure::Field(failure)) => {
                assert_eq!(failure.field, "ext");
                assert_eq!(failure.value, "ma");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn trailing_text_is_a_mismatch() {
        let skeleton = Skeleton::parse("v{version}").unwrap();
        let segment = &skeleton.segments()[0];
        assert!(match_segment(segment, "v001", &mut any_text).is_ok());
        assert_eq!(
            match_segment(segment, "x001", &mut any_text),
            Err(SegmentFailure::Literal)
        );
        assert_eq!(
            match_segment(segment, "v", &mut any_text),
            Err(SegmentFailure::Literal)
        );
    }
}
