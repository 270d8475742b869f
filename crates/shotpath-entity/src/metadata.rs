//! Embedded metadata records
//!
//! Hosts write one marker line into ASCII artifacts when saving:
//!
//! ```text
//! shotpath-metadata: {"origin": "/mnt/projects/...", "type": "rig"}
//! ```
//!
//! Reading scans the head of the file for the marker. Older writers used
//! `True`, `False` and `None` for the JSON literals; those spellings are
//! accepted through an allow-list. Any other bare word is kept as a string
//! and reported at warn level.

use crate::error::Result as EntityResult;
use crate::kinds::{Entity, OutputStatus, OutputVersion};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shotpath_template::GrammarTable;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Marker that starts the metadata line
pub const METADATA_MARKER: &str = "shotpath-metadata:";

/// Bytes scanned from the start of a file by default
pub const DEFAULT_SCAN_LIMIT: usize = 65_536;

/// Decoded metadata, keyed by name
pub type MetadataMap = BTreeMap<String, Value>;

/// Bare words accepted in place of JSON literals
const LITERAL_SPELLINGS: &[(&str, &str)] = &[
    ("true", "true"),
    ("false", "false"),
    ("null", "null"),
    ("True", "true"),
    ("False", "false"),
    ("None", "null"),
];

/// Errors reading or writing metadata
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Marker present but the payload cannot be decoded
    #[error("malformed metadata: {reason}")]
    Malformed {
        /// Decoder message
        reason: String,
    },

    /// Record could not be encoded
    #[error("cannot encode metadata: {0}")]
    Encode(#[source] serde_json::Error),

    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// The record embedded in an artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Work file the artifact was produced from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Asset the artifact derives from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_asset: Option<String>,

    /// Free-form type tag
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,

    /// Every other key
    #[serde(flatten)]
    pub extra: MetadataMap,
}

impl MetadataRecord {
    /// Record naming the producing work file
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            ..Self::default()
        }
    }

    /// Builder-style source asset
    #[must_use]
    pub fn with_source_asset(mut self, source_asset: impl Into<String>) -> Self {
        self.source_asset = Some(source_asset.into());
        self
    }

    /// Builder-style type tag
    #[must_use]
    pub fn with_type_tag(mut self, type_tag: impl Into<String>) -> Self {
        self.type_tag = Some(type_tag.into());
        self
    }

    /// Builder-style extra key
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Rebuild a record from a decoded map
    ///
    /// Known keys whose values are not strings stay in `extra`.
    #[must_use]
    pub fn from_map(mut map: MetadataMap) -> Self {
        let mut take = |key: &str| match map.remove(key) {
            Some(Value::String(text)) => Some(text),
            Some(other) => {
                map.insert(key.to_string(), other);
                None
            }
            None => None,
        };
        let origin = take("origin");
        let source_asset = take("source_asset");
        let type_tag = take("type");
        Self {
            origin,
            source_asset,
            type_tag,
            extra: map,
        }
    }

    /// One-line JSON encoding
    ///
    /// # Errors
    /// Returns error if an extra value cannot be encoded
    pub fn encode(&self) -> Result<String, MetadataError> {
        serde_json::to_string(self).map_err(MetadataError::Encode)
    }

    /// Marker line ready to embed in an artifact
    ///
    /// # Errors
    /// Returns error if the record cannot be encoded
    pub fn embed_line(&self) -> Result<String, MetadataError> {
        Ok(format!("{METADATA_MARKER} {}", self.encode()?))
    }
}

/// Decode a metadata payload into a map
///
/// # Errors
/// `Malformed` if the payload is not a JSON object even after the literal
/// spellings are normalised
pub fn decode_metadata(payload: &str) -> Result<MetadataMap, MetadataError> {
    let payload = payload.trim();
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(_) => serde_json::from_str::<Value>(&normalise_literals(payload)).map_err(|e| {
            MetadataError::Malformed {
                reason: e.to_string(),
            }
        })?,
    };
    match value {
        Value::Object(map) => Ok(into_map(map)),
        other => Err(MetadataError::Malformed {
            reason: format!("expected an object, found {other}"),
        }),
    }
}

fn into_map(map: Map<String, Value>) -> MetadataMap {
    map.into_iter().collect()
}

/// Rewrite bare words outside strings to JSON literals or strings
fn normalise_literals(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len());
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                let mut escaped = false;
                for c in chars.by_ref() {
                    out.push(c);
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        break;
                    }
                }
            }
            c if c.is_ascii_digit() || c == '-' => {
                out.push(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || matches!(next, '.' | '+' | '-') {
                        out.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match LITERAL_SPELLINGS.iter().find(|(spelling, _)| *spelling == word) {
                    Some((_, literal)) => out.push_str(literal),
                    None => {
                        tracing::warn!(word = %word, "unrecognised bare word in metadata, keeping as string");
                        out.push_str(&Value::String(word).to_string());
                    }
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Reader bounded to the head of each file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataReader {
    scan_limit: usize,
}

impl MetadataReader {
    /// Reader scanning at most `scan_limit` bytes
    #[must_use]
    pub fn new(scan_limit: usize) -> Self {
        Self { scan_limit }
    }

    /// Bytes scanned per file
    #[inline]
    #[must_use]
    pub fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    /// Read the metadata of a file
    ///
    /// A file without the marker yields an empty map.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Malformed` if the payload is
    /// undecodable
    pub fn read(&self, path: &Path) -> Result<MetadataMap, MetadataError> {
        let io = |source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io)?;
        let mut head = Vec::new();
        file.take(self.scan_limit as u64)
            .read_to_end(&mut head)
            .map_err(io)?;

        let text = String::from_utf8_lossy(&head);
        let Some(payload) = text
            .lines()
            .find_map(|line| line.split_once(METADATA_MARKER).map(|(_, rest)| rest))
        else {
            tracing::debug!(path = %path.display(), "no metadata marker");
            return Ok(MetadataMap::new());
        };
        decode_metadata(payload)
    }

    /// Read and rebuild the record of a file
    ///
    /// # Errors
    /// As [`MetadataReader::read`]
    pub fn record(&self, path: &Path) -> Result<MetadataRecord, MetadataError> {
        self.read(path).map(MetadataRecord::from_map)
    }
}

impl Default for MetadataReader {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_LIMIT)
    }
}

/// Read the metadata of a file, scanning at most `scan_limit` bytes
///
/// # Errors
/// As [`MetadataReader::read`]
pub fn read_metadata(path: &Path, scan_limit: usize) -> Result<MetadataMap, MetadataError> {
    MetadataReader::new(scan_limit).read(path)
}

impl OutputVersion {
    /// Seed the status from the `status` key of the first output file
    ///
    /// Leaves the status untouched when there is no output file or no
    /// `status` string. Returns the status now held.
    ///
    /// # Errors
    /// Returns scan errors and unreadable or undecodable metadata
    pub fn seed_status(
        &self,
        table: &GrammarTable,
        reader: &MetadataReader,
    ) -> EntityResult<OutputStatus> {
        let Some(first) = self.output_files(table)?.into_iter().next() else {
            return Ok(self.status());
        };
        let map = reader.read(&first.path().to_path_buf())?;
        if let Some(Value::String(tag)) = map.get("status") {
            self.set_status(OutputStatus::from_tag(tag));
        }
        Ok(self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn encode_and_embed() {
        let record = MetadataRecord::new("/mnt/projects/demo/x_v001.ma")
            .with_type_tag("rig")
            .with_extra("status", "approved");
        let line = record.embed_line().unwrap();
        assert!(line.starts_with("shotpath-metadata: {"));
        assert!(!line.contains('\n'));

        let decoded = decode_metadata(line.trim_start_matches(METADATA_MARKER)).unwrap();
        assert_eq!(MetadataRecord::from_map(decoded), record);
    }

    #[test]
    fn legacy_literal_spellings() {
        let map = decode_metadata(r#"{"a": True, "b": False, "c": None, "d": "True"}"#).unwrap();
        assert_eq!(map["a"], json!(true));
        assert_eq!(map["b"], json!(false));
        assert_eq!(map["c"], Value::Null);
        assert_eq!(map["d"], json!("True"));
    }

    #[test]
    fn unknown_bare_word_is_kept() {
        let map = decode_metadata(r#"{"flag": Yes, "n": -1.5e3}"#).unwrap();
        assert_eq!(map["flag"], json!("Yes"));
        assert_eq!(map["n"], json!(-1500.0));
    }

    #[test]
    fn undecodable_payloads() {
        assert!(matches!(
            decode_metadata("{\"a\": "),
            Err(MetadataError::Malformed { .. })
        ));
        assert!(matches!(
            decode_metadata("[1, 2]"),
            Err(MetadataError::Malformed { .. })
        ));
    }

    #[test]
    fn read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let with = dir.path().join("with.ma");
        std::fs::write(
            &with,
            "//Maya ASCII scene\n// shotpath-metadata: {\"origin\": \"/p/x\", \"type\": \"anim\"}\ncreateNode;\n",
        )
        .unwrap();
        let without = dir.path().join("without.ma");
        std::fs::write(&without, "createNode;\n").unwrap();

        let reader = MetadataReader::default();
        let record = reader.record(&with).unwrap();
        assert_eq!(record.origin.as_deref(), Some("/p/x"));
        assert_eq!(record.type_tag.as_deref(), Some("anim"));
        assert!(reader.read(&without).unwrap().is_empty());
        assert!(matches!(
            reader.read(&dir.path().join("missing.ma")),
            Err(MetadataError::Io { .. })
        ));
    }

    #[test]
    fn marker_beyond_scan_limit_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.ma");
        let mut text = "x".repeat(200);
        text.push_str("\nshotpath-metadata: {\"origin\": \"/p/x\"}\n");
        std::fs::write(&path, text).unwrap();

        assert!(MetadataReader::new(64).read(&path).unwrap().is_empty());
        assert_eq!(MetadataReader::new(4096).read(&path).unwrap().len(), 1);
    }

    #[test]
    fn output_version_status_seeded_from_first_file() {
        use shotpath_test_utils::{ProjectFixture, ASSET};

        let fx = ProjectFixture::new();
        let file = fx.asset_output_file(
            "rig_main",
            3,
            "// shotpath-metadata: {\"status\": \"approved\"}\n",
        );
        let version = OutputVersion::parse(
            fx.table(),
            &file.parent().unwrap().parent().unwrap(),
        )
        .unwrap();
        assert_eq!(version.status(), OutputStatus::Pending);
        let seeded = version
            .seed_status(fx.table(), &MetadataReader::default())
            .unwrap();
        assert_eq!(seeded, OutputStatus::Approved);

        let empty = OutputVersion::parse(
            fx.table(),
            &fx.path(&format!("{ASSET}/rig/output/rig/rig_main/v004")),
        )
        .unwrap();
        assert_eq!(
            empty.seed_status(fx.table(), &MetadataReader::default()).unwrap(),
            OutputStatus::Pending
        );
    }
}
