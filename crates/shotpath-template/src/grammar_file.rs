//! TOML grammar files
//!
//! A grammar file declares field constraints once and lists templates in
//! priority order:
//!
//! ```toml
//! [fields]
//! project = { type = "identifier" }
//! version = { type = "version", width = 3 }
//!
//! [[templates]]
//! kind = "project_root"
//! context = "project"
//! skeleton = "{project}"
//! ```

use crate::constraint::Constraint;
use crate::error::TemplateError;
use crate::table::{Context, EntityKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Built-in production grammar
pub const DEFAULT_GRAMMAR: &str = include_str!("default_grammar.toml");

/// Deserialized grammar file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrammarFile {
    /// Field constraints by name
    #[serde(default)]
    pub fields: IndexMap<String, ConstraintSpec>,

    /// Templates in priority order
    #[serde(default)]
    pub templates: Vec<TemplateSpec>,
}

impl GrammarFile {
    /// Parse grammar file text
    ///
    /// # Errors
    /// Returns error if the text is not a valid grammar file
    pub fn from_toml_str(text: &str) -> Result<Self, TemplateError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a grammar file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// One `[[templates]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSpec {
    /// Entity kind
    pub kind: EntityKind,
    /// Project, shot or asset branch
    pub context: Context,
    /// Skeleton relative to the project root
    pub skeleton: String,
}

/// Serialized form of a [`Constraint`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintSpec {
    /// See [`Constraint::Alnum`]
    Alnum,
    /// See [`Constraint::Identifier`]
    Identifier,
    /// See [`Constraint::Pattern`]
    Pattern {
        /// Unanchored regex
        regex: String,
    },
    /// See [`Constraint::Choice`]
    Choice {
        /// Accepted values
        values: Vec<String>,
    },
    /// See [`Constraint::Version`]
    Version {
        /// Digits
        width: usize,
    },
    /// See [`Constraint::Number`]
    Number {
        /// Digits
        width: usize,
    },
    /// See [`Constraint::FramePlaceholder`]
    FramePlaceholder {
        /// Number of `#`
        width: usize,
    },
}

impl ConstraintSpec {
    /// Compile into a constraint
    ///
    /// # Errors
    /// Returns `InvalidPattern` if a pattern does not compile
    pub fn to_constraint(&self, field: &str) -> Result<Constraint, TemplateError> {
        Ok(match self {
            Self::Alnum => Constraint::Alnum,
            Self::Identifier => Constraint::Identifier,
            Self::Pattern { regex } => {
                Constraint::pattern(regex).map_err(|source| TemplateError::InvalidPattern {
                    field: field.to_string(),
                    source,
                })?
            }
            Self::Choice { values } => Constraint::Choice(values.clone()),
            Self::Version { width } => Constraint::Version { width: *width },
            Self::Number { width } => Constraint::Number { width: *width },
            Self::FramePlaceholder { width } => Constraint::FramePlaceholder { width: *width },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grammar_parses() {
        let grammar = GrammarFile::from_toml_str(DEFAULT_GRAMMAR).unwrap();
        assert_eq!(
            grammar.fields.get("version"),
            Some(&ConstraintSpec::Version { width: 3 })
        );
        assert_eq!(grammar.templates[0].kind, EntityKind::ProjectRoot);
        assert_eq!(grammar.templates[0].skeleton, "{project}");
    }

    #[test]
    fn constraint_specs_compile() {
        let text = r#"
            [fields]
            shot = { type = "pattern", regex = "sh[0-9]{3}" }
            dcc = { type = "choice", values = ["maya", "nuke"] }
            frame = { type = "number", width = 4 }
        "#;
        let grammar = GrammarFile::from_toml_str(text).unwrap();
        assert!(grammar.templates.is_empty());
        let shot = grammar.fields["shot"].to_constraint("shot").unwrap();
        assert!(shot.parse_value("sh010").is_ok());
        assert_eq!(
            grammar.fields["frame"].to_constraint("frame").unwrap(),
            Constraint::Number { width: 4 }
        );
    }

    #[test]
    fn bad_pattern_names_field() {
        let entry = ConstraintSpec::Pattern {
            regex: "(".to_string(),
        };
        match entry.to_constraint("shot") {
            Err(TemplateError::InvalidPattern { field, .. }) => assert_eq!(field, "shot"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_constraint_type_rejected() {
        let text = r#"
            [fields]
            shot = { type = "uuid" }
        "#;
        assert!(matches!(
            GrammarFile::from_toml_str(text),
            Err(TemplateError::GrammarFile(_))
        ));
    }
}
