//! Catalogue configuration
//!
//! ```toml
//! roots = ["/mnt/projects", "//fileserver/projects"]
//! sidecar_dir = ".shotpath"
//! metadata_scan_limit = 65536
//! grammar = "/etc/shotpath/grammar.toml"
//! ```

use serde::{Deserialize, Serialize};
use shotpath_entity::{MetadataReader, DEFAULT_SCAN_LIMIT};
use shotpath_template::{CanonicalPath, GrammarTable, ProjectRoots, TemplateError};
use std::path::{Path, PathBuf};

/// Default side-car directory name
pub const DEFAULT_SIDECAR_DIR: &str = ".shotpath";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid TOML or unknown key
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// No project root is configured
    #[error("at least one project root is required")]
    NoRoots,

    /// Side-car directory is not a single plain name
    #[error("side-car directory '{0}' must be a single path segment")]
    InvalidSidecarDir(String),

    /// Metadata scan limit of zero
    #[error("metadata scan limit must be positive")]
    ZeroScanLimit,
}

/// Settings for one registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogueConfig {
    /// Directories under which projects live
    pub roots: Vec<CanonicalPath>,

    /// Directory name holding side-car blobs next to work files
    pub sidecar_dir: String,

    /// Bytes scanned for embedded metadata
    pub metadata_scan_limit: usize,

    /// Grammar file replacing the built-in grammar
    pub grammar: Option<PathBuf>,
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            sidecar_dir: DEFAULT_SIDECAR_DIR.to_string(),
            metadata_scan_limit: DEFAULT_SCAN_LIMIT,
            grammar: None,
        }
    }
}

impl CatalogueConfig {
    /// Default configuration without roots
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style root
    #[must_use]
    pub fn with_root(mut self, root: CanonicalPath) -> Self {
        self.roots.push(root);
        self
    }

    /// Builder-style side-car directory
    #[must_use]
    pub fn with_sidecar_dir(mut self, name: impl Into<String>) -> Self {
        self.sidecar_dir = name.into();
        self
    }

    /// Builder-style metadata scan limit
    #[must_use]
    pub fn with_metadata_scan_limit(mut self, limit: usize) -> Self {
        self.metadata_scan_limit = limit;
        self
    }

    /// Builder-style grammar file
    #[must_use]
    pub fn with_grammar(mut self, path: impl Into<PathBuf>) -> Self {
        self.grammar = Some(path.into());
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns error on invalid TOML, unknown keys or failed validation
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is invalid
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check the settings are usable
    ///
    /// # Errors
    /// Returns the first failed check
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() {
            return Err(ConfigError::NoRoots);
        }
        let name = self.sidecar_dir.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidSidecarDir(self.sidecar_dir.clone()));
        }
        if self.metadata_scan_limit == 0 {
            return Err(ConfigError::ZeroScanLimit);
        }
        Ok(())
    }

    /// Metadata reader honouring the scan limit
    #[must_use]
    pub fn metadata_reader(&self) -> MetadataReader {
        MetadataReader::new(self.metadata_scan_limit)
    }

    /// Grammar table over the configured roots
    ///
    /// # Errors
    /// Returns error if there are no roots or the grammar file is invalid
    pub fn grammar_table(&self) -> Result<GrammarTable, TemplateError> {
        let roots = ProjectRoots::new(self.roots.iter().cloned())?;
        match &self.grammar {
            Some(path) => GrammarTable::from_file(roots, path),
            None => GrammarTable::with_default_grammar(roots),
        }
    }
}
