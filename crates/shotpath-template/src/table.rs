//! Entity kinds, project roots and the grammar table

use crate::constraint::Constraint;
use crate::error::TemplateError;
use crate::grammar_file::{GrammarFile, DEFAULT_GRAMMAR};
use crate::path::CanonicalPath;
use crate::skeleton::Skeleton;
use crate::template::Template;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Every kind of entity the grammar knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A project directory under a root
    ProjectRoot,
    /// A sequence (shot context) or asset type (asset context)
    SequenceRoot,
    /// A shot or asset
    EntityRoot,
    /// A pipeline step of a shot or asset
    StepRoot,
    /// Host application work directory of a step
    WorkArea,
    /// Editable versioned artifact
    WorkFile,
    /// Auto-saved sub-revision of a work file
    Increment,
    /// Published output category of a step
    OutputType,
    /// Named output stream within a type
    OutputName,
    /// Numbered publish of an output name
    OutputVersion,
    /// Single published file
    OutputFile,
    /// Numbered frame range sharing one output version
    OutputFileSequence,
}

impl EntityKind {
    /// All kinds, coarsest first
    pub const ALL: [Self; 12] = [
        Self::ProjectRoot,
        Self::SequenceRoot,
        Self::EntityRoot,
        Self::StepRoot,
        Self::WorkArea,
        Self::WorkFile,
        Self::Increment,
        Self::OutputType,
        Self::OutputName,
        Self::OutputVersion,
        Self::OutputFile,
        Self::OutputFileSequence,
    ];

    /// Grammar file name of the kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProjectRoot => "project_root",
            Self::SequenceRoot => "sequence_root",
            Self::EntityRoot => "entity_root",
            Self::StepRoot => "step_root",
            Self::WorkArea => "work_area",
            Self::WorkFile => "work_file",
            Self::Increment => "increment",
            Self::OutputType => "output_type",
            Self::OutputName => "output_name",
            Self::OutputVersion => "output_version",
            Self::OutputFile => "output_file",
            Self::OutputFileSequence => "output_file_sequence",
        }
    }

    /// Field that numbers a sequence of siblings of this kind
    #[must_use]
    pub const fn sequence_field(self) -> Option<&'static str> {
        match self {
            Self::WorkFile | Self::OutputVersion | Self::OutputFile | Self::OutputFileSequence => {
                Some("version")
            }
            Self::Increment => Some("increment"),
            _ => None,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// Branch of the project tree a template belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    /// Project level, above the shot/asset split
    Project,
    /// Sequences and shots
    Shot,
    /// Asset types and assets
    Asset,
}

impl Context {
    /// Grammar file name of the context
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Shot => "shot",
            Self::Asset => "asset",
        }
    }

    /// Field naming the shot or asset entity in this context
    #[must_use]
    pub const fn entity_field(self) -> Option<&'static str> {
        match self {
            Self::Project => None,
            Self::Shot => Some("shot"),
            Self::Asset => Some("asset"),
        }
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Context {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Project, Self::Shot, Self::Asset]
            .into_iter()
            .find(|context| context.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// Unrecognised kind or context name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name '{0}'")]
pub struct UnknownName(pub String);

/// Directories under which projects live, longest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoots(Arc<[CanonicalPath]>);

impl ProjectRoots {
    /// Build a root set
    ///
    /// # Errors
    /// Returns `NoRoots` if the set is empty
    pub fn new(roots: impl IntoIterator<Item = CanonicalPath>) -> Result<Self, TemplateError> {
        let mut roots: Vec<CanonicalPath> = roots.into_iter().collect();
        roots.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        roots.dedup();
        if roots.is_empty() {
            return Err(TemplateError::NoRoots);
        }
        Ok(Self(roots.into()))
    }

    /// Roots, longest first
    pub fn iter(&self) -> impl Iterator<Item = &CanonicalPath> {
        self.0.iter()
    }

    /// Check if a path is exactly one of the roots
    #[must_use]
    pub fn contains(&self, path: &CanonicalPath) -> bool {
        self.0.iter().any(|root| root == path)
    }

    /// Split a path into its deepest root and the segments below it
    #[must_use]
    pub fn split<'a>(&self, path: &'a CanonicalPath) -> Option<(&CanonicalPath, &'a [String])> {
        self.0
            .iter()
            .find_map(|root| path.relative_to(root).map(|rest| (root, rest)))
    }
}

/// Every template of a grammar, in priority order
#[derive(Debug, Clone)]
pub struct GrammarTable {
    roots: ProjectRoots,
    templates: Vec<Template>,
}

impl GrammarTable {
    /// Build a table from a grammar file
    ///
    /// # Errors
    /// Returns error if any template fails validation or a
    /// (kind, context) pair is declared twice
    pub fn new(roots: ProjectRoots, grammar: &GrammarFile) -> Result<Self, TemplateError> {
        let mut declared = IndexMap::new();
        for (name, entry) in &grammar.fields {
            declared.insert(name.clone(), entry.to_constraint(name)?);
        }

        let mut templates: Vec<Template> = Vec::with_capacity(grammar.templates.len());
        for entry in &grammar.templates {
            if templates
                .iter()
                .any(|t| t.kind() == entry.kind && t.context() == entry.context)
            {
                return Err(TemplateError::DuplicateTemplate {
                    kind: entry.kind,
                    context: entry.context,
                });
            }
            let skeleton = Skeleton::parse(&entry.skeleton)?;
            templates.push(Template::new(
                entry.kind,
                entry.context,
                skeleton,
                &declared,
                roots.clone(),
            )?);
        }

        tracing::debug!(
            templates = templates.len(),
            roots = roots.0.len(),
            "grammar table built"
        );
        Ok(Self { roots, templates })
    }

    /// Build a table from the built-in grammar
    ///
    /// # Errors
    /// Returns error if the root set is rejected
    pub fn with_default_grammar(roots: ProjectRoots) -> Result<Self, TemplateError> {
        let grammar = GrammarFile::from_toml_str(DEFAULT_GRAMMAR)?;
        Self::new(roots, &grammar)
    }

    /// Build a table from grammar file text
    ///
    /// # Errors
    /// Returns error if the text does not deserialize or validate
    pub fn from_toml_str(roots: ProjectRoots, text: &str) -> Result<Self, TemplateError> {
        Self::new(roots, &GrammarFile::from_toml_str(text)?)
    }

    /// Build a table from a grammar file on disk
    ///
    /// # Errors
    /// Returns error if the file cannot be read or does not validate
    pub fn from_file(roots: ProjectRoots, path: &Path) -> Result<Self, TemplateError> {
        Self::new(roots, &GrammarFile::from_file(path)?)
    }

    /// Configured project roots
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &ProjectRoots {
        &self.roots
    }

    /// All templates in table order
    #[inline]
    #[must_use]
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Templates of one kind in priority order
    pub fn templates_for(&self, kind: EntityKind) -> impl Iterator<Item = &Template> {
        self.templates.iter().filter(move |t| t.kind() == kind)
    }

    /// Template of one kind and context
    #[must_use]
    pub fn template(&self, kind: EntityKind, context: Context) -> Option<&Template> {
        self.templates
            .iter()
            .find(|t| t.kind() == kind && t.context() == context)
    }

    /// Template of one kind and context, or an error naming the pair
    ///
    /// # Errors
    /// Returns `MissingTemplate` when the table has no such template
    pub fn require(&self, kind: EntityKind, context: Context) -> Result<&Template, TemplateError> {
        self.template(kind, context)
            .ok_or_else(|| TemplateError::MissingTemplate { kind, context })
    }

    /// Replace one field's constraint in every template that uses it
    ///
    /// # Errors
    /// Returns error if a re-constrained template fails validation
    pub fn with_constraint(&self, field: &str, constraint: &Constraint) -> Result<Self, TemplateError> {
        let templates = self
            .templates
            .iter()
            .map(|t| {
                if t.has_field(field) {
                    t.with_constraint(field, constraint.clone())
                } else {
                    Ok(t.clone())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            roots: self.roots.clone(),
            templates,
        })
    }
}
