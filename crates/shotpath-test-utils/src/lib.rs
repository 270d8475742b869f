//! Testing utilities for shotpath workspace
//!
//! Temporary project trees laid out in the default grammar, plus test
//! logging.

#![allow(missing_docs)]

use shotpath_template::{CanonicalPath, GrammarTable, ProjectRoots};
use std::fs;
use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Shot branch prefix used by the helpers, relative to the root
pub const SHOT: &str = "demo/sequences/sq010/sh010";

/// Asset branch prefix used by the helpers, relative to the root
pub const ASSET: &str = "demo/assets/character/archer";

static LOGGING: Once = Once::new();

/// Install a fmt subscriber honouring `RUST_LOG`, once per test binary
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A project root in a temp directory with the default grammar
pub struct ProjectFixture {
    dir: TempDir,
    root: CanonicalPath,
    table: GrammarTable,
}

impl ProjectFixture {
    pub fn new() -> Self {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let root = CanonicalPath::from_path(dir.path()).unwrap();
        let roots = ProjectRoots::new([root.clone()]).unwrap();
        let table = GrammarTable::with_default_grammar(roots).unwrap();
        Self { dir, root, table }
    }

    pub fn root(&self) -> &CanonicalPath {
        &self.root
    }

    pub fn table(&self) -> &GrammarTable {
        &self.table
    }

    pub fn fs_path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Canonical path of `rel` below the root, whether or not it exists
    pub fn path(&self, rel: &str) -> CanonicalPath {
        self.root.with_segments(rel.split('/')).unwrap()
    }

    pub fn mkdir(&self, rel: &str) -> CanonicalPath {
        fs::create_dir_all(self.fs_path(rel)).unwrap();
        self.path(rel)
    }

    /// Create an empty file, along with its parent directories
    pub fn touch(&self, rel: &str) -> CanonicalPath {
        self.write(rel, "")
    }

    pub fn write(&self, rel: &str, contents: &str) -> CanonicalPath {
        let path = self.fs_path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        self.path(rel)
    }

    /// Work file below the shot `anim` step
    pub fn shot_work_file(&self, task: &str, version: u32) -> CanonicalPath {
        self.touch(&format!(
            "{SHOT}/anim/work/maya/sh010_anim_{task}_v{version:03}.ma"
        ))
    }

    /// Output file below the asset `rig` step
    pub fn asset_output_file(&self, output_name: &str, version: u32, contents: &str) -> CanonicalPath {
        self.write(
            &format!(
                "{ASSET}/rig/output/rig/{output_name}/v{version:03}/maya/archer_{output_name}_v{version:03}.mb"
            ),
            contents,
        )
    }

    /// One rendered frame below the shot `light` step
    pub fn shot_render_frame(&self, output_name: &str, version: u32, frame: u32) -> CanonicalPath {
        self.touch(&format!(
            "{SHOT}/light/output/render/{output_name}/v{version:03}/exr/sh010_{output_name}_v{version:03}.{frame:04}.exr"
        ))
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}
