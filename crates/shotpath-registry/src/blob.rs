//! Tagged side-car blobs
//!
//! Each `(work file, tag)` pair owns one file:
//!
//! ```text
//! <work dir>/<sidecar dir>/<work file name>/<tag>.blob
//! ```
//!
//! Values are stored as JSON. Writes go to a temp file in the target
//! directory and are renamed into place, so readers see either the old or
//! the new value. Decoded values are memoised against a blake3 digest of
//! the side-car bytes.

use crate::filter::CacheFilter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shotpath_template::{CanonicalPath, EntityKind};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

const BLOB_EXTENSION: &str = "blob";

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("static regex"));

/// Side-car errors
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// Tag is not a plain name
    #[error("invalid blob tag '{0}'")]
    InvalidTag(String),

    /// Path has no directory or file name to hang a side-car on
    #[error("{0} cannot own side-car blobs")]
    NoSidecar(CanonicalPath),

    /// Value could not be encoded
    #[error("cannot encode blob: {0}")]
    Encode(#[source] serde_json::Error),

    /// Side-car file could not be written
    #[error("io error writing {path}: {source}")]
    Io {
        /// Target path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a blob read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cached<V> {
    /// Stored value
    Hit(V),
    /// Nothing stored under the tag
    Miss,
}

impl<V> Cached<V> {
    /// True for a hit
    #[inline]
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Stored value, if any
    #[inline]
    #[must_use]
    pub fn into_option(self) -> Option<V> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Miss => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Memo {
    digest: blake3::Hash,
    value: Value,
}

/// Side-car blob files plus an in-memory memo of decoded values
#[derive(Debug)]
pub struct BlobStore {
    sidecar_dir: String,
    memo: HashMap<(CanonicalPath, String), Memo>,
}

impl BlobStore {
    /// Store using `sidecar_dir` as the side-car directory name
    #[must_use]
    pub fn new(sidecar_dir: impl Into<String>) -> Self {
        Self {
            sidecar_dir: sidecar_dir.into(),
            memo: HashMap::new(),
        }
    }

    /// Number of memoised values
    #[must_use]
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    /// True if nothing is memoised
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    /// Side-car file for `(owner, tag)`
    ///
    /// # Errors
    /// `InvalidTag` or `NoSidecar`
    pub fn sidecar_path(&self, owner: &CanonicalPath, tag: &str) -> Result<PathBuf, BlobError> {
        if !TAG.is_match(tag) {
            return Err(BlobError::InvalidTag(tag.to_string()));
        }
        let (Some(dir), Some(name)) = (owner.parent(), owner.file_name()) else {
            return Err(BlobError::NoSidecar(owner.clone()));
        };
        Ok(dir
            .to_path_buf()
            .join(&self.sidecar_dir)
            .join(name)
            .join(format!("{tag}.{BLOB_EXTENSION}")))
    }

    /// Store `value` under `tag`, replacing any earlier value
    ///
    /// # Errors
    /// Returns error if the tag is invalid, the value cannot be encoded or
    /// the file cannot be written
    pub fn write<V: Serialize>(
        &mut self,
        owner: &CanonicalPath,
        tag: &str,
        value: &V,
    ) -> Result<PathBuf, BlobError> {
        let target = self.sidecar_path(owner, tag)?;
        let value = serde_json::to_value(value).map_err(BlobError::Encode)?;
        let bytes = serde_json::to_vec(&value).map_err(BlobError::Encode)?;
        let io = |source| BlobError::Io {
            path: target.clone(),
            source,
        };

        let dir = target.parent().map(PathBuf::from).unwrap_or_default();
        fs::create_dir_all(&dir).map_err(io)?;
        let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(io)?;
        temp.write_all(&bytes).map_err(io)?;
        temp.flush().map_err(io)?;
        temp.persist(&target).map_err(|e| io(e.error))?;

        let digest = blake3::hash(&bytes);
        self.memo
            .insert((owner.clone(), tag.to_string()), Memo { digest, value });
        tracing::debug!(owner = %owner, tag, "blob written");
        Ok(target)
    }

    /// Value stored under `tag`
    ///
    /// A side-car that cannot be read or decoded is reported at warn level
    /// and treated as a miss.
    ///
    /// # Errors
    /// `InvalidTag` or `NoSidecar`
    pub fn read<V: DeserializeOwned>(
        &mut self,
        owner: &CanonicalPath,
        tag: &str,
    ) -> Result<Cached<V>, BlobError> {
        let target = self.sidecar_path(owner, tag)?;
        let key = (owner.clone(), tag.to_string());

        let bytes = match fs::read(&target) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.memo.remove(&key);
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %target.display(), error = %e, "unreadable side-car");
                }
                return Ok(Cached::Miss);
            }
        };
        let digest = blake3::hash(&bytes);

        let memoised = self
            .memo
            .get(&key)
            .filter(|memo| memo.digest == digest)
            .map(|memo| memo.value.clone());

        let value = if let Some(value) = memoised {
            tracing::debug!(owner = %owner, tag, "blob memo hit");
            value
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => {
                    self.memo.insert(
                        key,
                        Memo {
                            digest,
                            value: value.clone(),
                        },
                    );
                    value
                }
                Err(e) => {
                    tracing::warn!(path = %target.display(), error = %e, "undecodable side-car");
                    self.memo.remove(&key);
                    return Ok(Cached::Miss);
                }
            }
        };

        match serde_json::from_value(value) {
            Ok(decoded) => Ok(Cached::Hit(decoded)),
            Err(e) => {
                tracing::warn!(path = %target.display(), error = %e, "side-car holds another type");
                Ok(Cached::Miss)
            }
        }
    }

    /// Drop memoised values selected by `filter`, returning how many
    pub fn clear(&mut self, filter: &CacheFilter) -> usize {
        let before = self.memo.len();
        self.memo
            .retain(|(owner, _), _| !filter.matches(EntityKind::WorkFile, owner));
        before - self.memo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Thumbnail {
        width: u32,
        frames: Vec<u32>,
    }

    fn owner(dir: &tempfile::TempDir) -> CanonicalPath {
        CanonicalPath::from_path(dir.path())
            .unwrap()
            .child("sh010_anim_blocking_v001.ma")
            .unwrap()
    }

    #[test]
    fn sidecar_layout() {
        let store = BlobStore::new(".shotpath");
        let owner = CanonicalPath::new("/p/work/maya/a_v001.ma").unwrap();
        assert_eq!(
            store.sidecar_path(&owner, "thumb.v2").unwrap(),
            PathBuf::from("/p/work/maya/.shotpath/a_v001.ma/thumb.v2.blob")
        );
        for bad in ["", ".hidden", "a/b", "a b", "-x"] {
            assert!(matches!(
                store.sidecar_path(&owner, bad),
                Err(BlobError::InvalidTag(_))
            ));
        }
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let owner = owner(&dir);
        let mut store = BlobStore::new(".shotpath");
        let value = Thumbnail {
            width: 256,
            frames: vec![1001, 1050],
        };

        store.write(&owner, "thumb", &value).unwrap();
        assert_eq!(store.read::<Thumbnail>(&owner, "thumb").unwrap(), Cached::Hit(value));
        assert_eq!(store.read::<Thumbnail>(&owner, "other").unwrap(), Cached::Miss);
    }

    #[test]
    fn fresh_store_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let owner = owner(&dir);
        BlobStore::new(".shotpath").write(&owner, "n", &7_u32).unwrap();

        let mut fresh = BlobStore::new(".shotpath");
        assert!(fresh.is_empty());
        assert_eq!(fresh.read::<u32>(&owner, "n").unwrap(), Cached::Hit(7));
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn deleted_sidecar_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let owner = owner(&dir);
        let mut store = BlobStore::new(".shotpath");
        let path = store.write(&owner, "n", &1_u32).unwrap();
        fs::remove_file(path).unwrap();
        assert_eq!(store.read::<u32>(&owner, "n").unwrap(), Cached::Miss);
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_or_mistyped_sidecar_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let owner = owner(&dir);
        let mut store = BlobStore::new(".shotpath");
        let path = store.write(&owner, "n", &"text").unwrap();
        assert_eq!(store.read::<u32>(&owner, "n").unwrap(), Cached::Miss);

        fs::write(&path, "{not json").unwrap();
        let mut fresh = BlobStore::new(".shotpath");
        assert_eq!(fresh.read::<String>(&owner, "n").unwrap(), Cached::Miss);
    }

    #[test]
    fn same_length_rewrite_is_not_served_stale() {
        let dir = tempfile::tempdir().unwrap();
        let owner = owner(&dir);
        let mut store = BlobStore::new(".shotpath");
        let path = store.write(&owner, "n", &1_u32).unwrap();
        assert_eq!(store.read::<u32>(&owner, "n").unwrap(), Cached::Hit(1));

        fs::write(&path, "2").unwrap();
        assert_eq!(store.read::<u32>(&owner, "n").unwrap(), Cached::Hit(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn writes_leave_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let owner = owner(&dir);
        let mut store = BlobStore::new(".shotpath");
        for n in 0..5_u32 {
            store.write(&owner, "n", &n).unwrap();
        }
        let sidecar = dir.path().join(".shotpath").join("sh010_anim_blocking_v001.ma");
        let names: Vec<_> = fs::read_dir(sidecar)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["n.blob".to_string()]);
    }

    #[test]
    fn clear_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let root = CanonicalPath::from_path(dir.path()).unwrap();
        let a = root.with_segments(["a", "x_v001.ma"]).unwrap();
        let b = root.with_segments(["b", "x_v001.ma"]).unwrap();
        let mut store = BlobStore::new(".shotpath");
        store.write(&a, "t", &1_u32).unwrap();
        store.write(&b, "t", &2_u32).unwrap();

        let dropped = store.clear(&CacheFilter::Under(root.child("a").unwrap()));
        assert_eq!(dropped, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.clear(&CacheFilter::Kind(EntityKind::StepRoot)), 0);
        assert_eq!(store.clear(&CacheFilter::All), 1);
    }
}
