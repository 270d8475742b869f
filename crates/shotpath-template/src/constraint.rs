//! Field constraints
//!
//! A [`Constraint`] decides whether a raw path token is a valid value for a
//! field and how a value is rendered back into a token.

use crate::field::FieldValue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{self, Display, Formatter};

static ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("static regex"));
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("static regex"));

/// Widest numeric token a constraint may declare (fits in `u32`)
pub const MAX_WIDTH: usize = 9;

/// Constraint on the values of one field
#[derive(Debug, Clone)]
pub enum Constraint {
    /// ASCII letters and digits
    Alnum,

    /// ASCII letters, digits, `_` and `-`; must start with a letter or digit
    Identifier,

    /// Anchored user regex
    Pattern(Regex),

    /// One of a fixed list of values
    Choice(Vec<String>),

    /// Zero-padded version number of exactly `width` digits, value >= 1
    Version {
        /// Token width in digits
        width: usize,
    },

    /// Zero-padded number of exactly `width` digits
    Number {
        /// Token width in digits
        width: usize,
    },

    /// Frame placeholder made of exactly `width` `#` characters
    FramePlaceholder {
        /// Placeholder width
        width: usize,
    },
}

impl Constraint {
    /// Compile an anchored pattern constraint
    ///
    /// # Errors
    /// Returns error if the regex is invalid
    pub fn pattern(regex: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{regex})$")).map(Self::Pattern)
    }

    /// Token width for fixed-width numeric constraints
    #[inline]
    #[must_use]
    pub fn width(&self) -> Option<usize> {
        match self {
            Self::Version { width } | Self::Number { width } | Self::FramePlaceholder { width } => {
                Some(*width)
            }
            _ => None,
        }
    }

    /// Width if this is a version constraint
    #[inline]
    #[must_use]
    pub fn version_width(&self) -> Option<usize> {
        match self {
            Self::Version { width } => Some(*width),
            _ => None,
        }
    }

    /// Validate a raw token taken from a path
    ///
    /// # Errors
    /// Returns the violated rule
    pub fn parse_value(&self, raw: &str) -> Result<FieldValue, ConstraintError> {
        if raw.is_empty() {
            return Err(ConstraintError::Empty);
        }
        match self {
            Self::Version { width } => {
                let n = parse_padded(raw, *width)?;
                if n == 0 {
                    return Err(ConstraintError::ZeroVersion);
                }
                Ok(FieldValue::Number(n))
            }
            Self::Number { width } => parse_padded(raw, *width).map(FieldValue::Number),
            Self::FramePlaceholder { width } => {
                if raw.len() == *width && raw.chars().all(|c| c == '#') {
                    Ok(FieldValue::Text(raw.to_string()))
                } else {
                    Err(ConstraintError::Placeholder { width: *width })
                }
            }
            _ => {
                self.check_text(raw)?;
                Ok(FieldValue::Text(raw.to_string()))
            }
        }
    }

    /// Render a value into a path token
    ///
    /// # Errors
    /// Returns the violated rule
    pub fn format_value(&self, value: &FieldValue) -> Result<String, ConstraintError> {
        match (self, value) {
            (Self::Version { width }, FieldValue::Number(n)) => {
                if *n == 0 {
                    return Err(ConstraintError::ZeroVersion);
                }
                format_padded(*n, *width)
            }
            (Self::Number { width }, FieldValue::Number(n)) => format_padded(*n, *width),
            (Self::Version { .. } | Self::Number { .. }, FieldValue::Text(_)) => {
                Err(ConstraintError::WrongType { expected: "number" })
            }
            (Self::FramePlaceholder { .. }, FieldValue::Text(text)) => {
                self.parse_value(text)?;
                Ok(text.clone())
            }
            (_, FieldValue::Number(_)) => Err(ConstraintError::WrongType { expected: "text" }),
            (_, FieldValue::Text(text)) => {
                if text.is_empty() {
                    return Err(ConstraintError::Empty);
                }
                self.check_text(text)?;
                Ok(text.clone())
            }
        }
    }

    fn check_text(&self, raw: &str) -> Result<(), ConstraintError> {
        if raw.contains(['/', '\\']) {
            return Err(ConstraintError::Separator);
        }
        let ok = match self {
            Self::Alnum => ALNUM.is_match(raw),
            Self::Identifier => IDENTIFIER.is_match(raw),
            Self::Pattern(regex) => regex.is_match(raw),
            Self::Choice(values) => values.iter().any(|v| v == raw),
            Self::Version { .. } | Self::Number { .. } | Self::FramePlaceholder { .. } => false,
        };
        if ok {
            Ok(())
        } else {
            Err(ConstraintError::Rejected {
                constraint: self.to_string(),
            })
        }
    }
}

fn parse_padded(raw: &str, width: usize) -> Result<u32, ConstraintError> {
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConstraintError::NotNumeric);
    }
    if raw.len() != width {
        return Err(ConstraintError::Width {
            expected: width,
            actual: raw.len(),
        });
    }
    raw.parse::<u32>().map_err(|_| ConstraintError::NotNumeric)
}

fn format_padded(n: u32, width: usize) -> Result<String, ConstraintError> {
    let text = format!("{n:0width$}");
    if text.len() > width {
        return Err(ConstraintError::Overflow { value: n, width });
    }
    Ok(text)
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Alnum, Self::Alnum) | (Self::Identifier, Self::Identifier) => true,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            (Self::Choice(a), Self::Choice(b)) => a == b,
            (Self::Version { width: a }, Self::Version { width: b })
            | (Self::Number { width: a }, Self::Number { width: b })
            | (Self::FramePlaceholder { width: a }, Self::FramePlaceholder { width: b }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constraint {}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alnum => write!(f, "alnum"),
            Self::Identifier => write!(f, "identifier"),
            Self::Pattern(regex) => write!(f, "pattern {}", regex.as_str()),
            Self::Choice(values) => write!(f, "one of [{}]", values.join(", ")),
            Self::Version { width } => write!(f, "version({width})"),
            Self::Number { width } => write!(f, "number({width})"),
            Self::FramePlaceholder { width } => write!(f, "frame placeholder({width})"),
        }
    }
}

/// Why a value failed its constraint
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintError {
    /// Empty token
    #[error("value is empty")]
    Empty,

    /// Token contains a path separator
    #[error("value contains a path separator")]
    Separator,

    /// Token not accepted by the constraint
    #[error("value does not satisfy {constraint}")]
    Rejected {
        /// Constraint description
        constraint: String,
    },

    /// Non-digit characters in a numeric token
    #[error("value is not numeric")]
    NotNumeric,

    /// Numeric token with the wrong padding
    #[error("expected {expected} digits, found {actual}")]
    Width {
        /// Declared width
        expected: usize,
        /// Width found
        actual: usize,
    },

    /// Version numbers start at 1
    #[error("version must be at least 1")]
    ZeroVersion,

    /// Number too large for the declared width
    #[error("{value} does not fit in {width} digits")]
    Overflow {
        /// Value given
        value: u32,
        /// Declared width
        width: usize,
    },

    /// Placeholder of the wrong shape
    #[error("expected {width} '#' characters")]
    Placeholder {
        /// Declared width
        width: usize,
    },

    /// Text given where a number is expected or vice versa
    #[error("expected a {expected} value")]
    WrongType {
        /// Expected value type
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_requires_exact_width() {
        let c = Constraint::Version { width: 3 };
        assert_eq!(c.parse_value("016").unwrap(), FieldValue::Number(16));
        assert_eq!(
            c.parse_value("16"),
            Err(ConstraintError::Width {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            c.parse_value("0016"),
            Err(ConstraintError::Width {
                expected: 3,
                actual: 4
            })
        );
        assert_eq!(c.parse_value("0a1"), Err(ConstraintError::NotNumeric));
        assert_eq!(c.parse_value("000"), Err(ConstraintError::ZeroVersion));
    }

    #[test]
    fn version_formatting_pads_and_overflows() {
        let c = Constraint::Version { width: 3 };
        assert_eq!(c.format_value(&FieldValue::Number(7)).unwrap(), "007");
        assert_eq!(c.format_value(&FieldValue::Number(999)).unwrap(), "999");
        assert_eq!(
            c.format_value(&FieldValue::Number(1000)),
            Err(ConstraintError::Overflow {
                value: 1000,
                width: 3
            })
        );
        assert!(matches!(
            c.format_value(&FieldValue::Text("007".into())),
            Err(ConstraintError::WrongType { .. })
        ));
    }

    #[test]
    fn number_allows_zero() {
        let c = Constraint::Number { width: 4 };
        assert_eq!(c.parse_value("0000").unwrap(), FieldValue::Number(0));
        assert_eq!(c.format_value(&FieldValue::Number(12)).unwrap(), "0012");
    }

    #[test]
    fn alnum_rejects_underscore() {
        assert!(Constraint::Alnum.parse_value("sh010").is_ok());
        assert!(Constraint::Alnum.parse_value("sh_010").is_err());
    }

    #[test]
    fn identifier_allows_inner_underscore() {
        assert!(Constraint::Identifier.parse_value("rig_main").is_ok());
        assert!(Constraint::Identifier.parse_value("_rig").is_err());
        assert!(Constraint::Identifier.parse_value("rig.main").is_err());
    }

    #[test]
    fn pattern_is_anchored() {
        let c = Constraint::pattern("sh[0-9]{3}").unwrap();
        assert!(c.parse_value("sh010").is_ok());
        assert!(c.parse_value("xsh010").is_err());
        assert!(c.parse_value("sh0100").is_err());
    }

    #[test]
    fn choice_and_separator() {
        let c = Constraint::Choice(vec!["maya".into(), "nuke".into()]);
        assert!(c.parse_value("nuke").is_ok());
        assert!(c.parse_value("houdini").is_err());
        assert_eq!(
            Constraint::pattern(".+").unwrap().parse_value("a/b"),
            Err(ConstraintError::Separator)
        );
    }

    #[test]
    fn frame_placeholder() {
        let c = Constraint::FramePlaceholder { width: 4 };
        assert!(c.parse_value("####").is_ok());
        assert!(c.parse_value("###").is_err());
        assert!(c.parse_value("1001").is_err());
        assert_eq!(c.format_value(&FieldValue::Text("####".into())).unwrap(), "####");
    }

    #[test]
    fn constraint_equality_compares_patterns() {
        assert_eq!(
            Constraint::pattern("a+").unwrap(),
            Constraint::pattern("a+").unwrap()
        );
        assert_ne!(Constraint::Alnum, Constraint::Identifier);
    }
}
