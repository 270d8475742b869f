//! Canonical absolute paths
//!
//! Provides [`CanonicalPath`], the normalised form every entity is keyed by.
//! Normalisation is purely lexical; the filesystem is never consulted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Normalised absolute path
///
/// Equality, hashing and ordering operate on the normalised form, so two
/// differently spelled paths naming the same location compare equal.
///
/// # Normalisation
/// - `\` becomes `/`, repeated separators collapse
/// - `.` segments are dropped, `..` pops one segment (never above the prefix)
/// - trailing separators are removed
/// - Windows drive letters are lower-cased: `C:\Proj` → `c:/Proj`
/// - UNC prefixes are kept: `\\server\share\x` → `//server/share/x`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalPath {
    prefix: String,
    segments: Vec<String>,
}

impl CanonicalPath {
    /// Normalise an absolute path string
    ///
    /// # Errors
    /// Returns error if the path is empty, relative, or a malformed UNC path
    pub fn new(raw: impl AsRef<str>) -> Result<Self, PathError> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let unified = raw.replace('\\', "/");
        let (prefix, rest) = split_prefix(&unified)?;

        let mut segments: Vec<String> = Vec::new();
        for segment in rest.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other.to_string()),
            }
        }

        Ok(Self { prefix, segments })
    }

    /// Normalise a filesystem path
    ///
    /// # Errors
    /// Returns error if the path is not valid UTF-8 or not absolute
    pub fn from_path(path: &Path) -> Result<Self, PathError> {
        let text = path
            .to_str()
            .ok_or_else(|| PathError::NotUtf8(path.to_path_buf()))?;
        Self::new(text)
    }

    /// Build from an existing prefix path plus extra segments
    ///
    /// # Errors
    /// Returns error if a segment is empty or contains a separator
    pub fn with_segments<I, S>(&self, extra: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = self.clone();
        for segment in extra {
            out = out.child(segment)?;
        }
        Ok(out)
    }

    /// Prefix: `/`, `c:/` or `//server/share/`
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Segments below the prefix
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments below the prefix
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True if this is a bare prefix (`/`, `c:/`)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parent path (if not a bare prefix)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            Some(self.truncate(self.segments.len() - 1))
        }
    }

    /// Keep only the first `len` segments
    #[must_use]
    pub fn truncate(&self, len: usize) -> Self {
        Self {
            prefix: self.prefix.clone(),
            segments: self.segments[..len.min(self.segments.len())].to_vec(),
        }
    }

    /// Last segment (file or directory name)
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Append one segment, returning new path
    ///
    /// # Errors
    /// Returns error if the segment is empty, `.`/`..`, or contains a separator
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, PathError> {
        let segment = segment.into();
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(PathError::InvalidSegment(segment));
        }
        if segment.contains(['/', '\\']) {
            return Err(PathError::InvalidSegment(segment));
        }
        let mut out = self.clone();
        out.segments.push(segment);
        Ok(out)
    }

    /// Check if `self` is `other` or one of its ancestors
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.prefix == other.prefix
            && self.segments.len() <= other.segments.len()
            && self.segments == other.segments[..self.segments.len()]
    }

    /// Segments of `self` below `ancestor`
    #[must_use]
    pub fn relative_to(&self, ancestor: &Self) -> Option<&[String]> {
        if ancestor.is_prefix_of(self) {
            Some(&self.segments[ancestor.segments.len()..])
        } else {
            None
        }
    }

    /// Convert to a filesystem path
    #[inline]
    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.to_string())
    }
}

fn split_prefix(unified: &str) -> Result<(String, &str), PathError> {
    let bytes = unified.as_bytes();

    // UNC: //server/share/...
    if unified.starts_with("//") && !unified.starts_with("///") {
        let mut parts = unified[2..].splitn(3, '/');
        let server = parts.next().unwrap_or_default();
        let share = parts.next().unwrap_or_default();
        if server.is_empty() || share.is_empty() {
            return Err(PathError::InvalidUnc(unified.to_string()));
        }
        let rest = parts.next().unwrap_or_default();
        return Ok((format!("//{server}/{share}/"), rest));
    }

    if unified.starts_with('/') {
        return Ok(("/".to_string(), &unified[1..]));
    }

    // Drive letter: C:/... or bare C:
    if bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/')
    {
        let letter = char::from(bytes[0]).to_ascii_lowercase();
        let rest = if bytes.len() > 2 { &unified[3..] } else { "" };
        return Ok((format!("{letter}:/"), rest));
    }

    Err(PathError::NotAbsolute(unified.to_string()))
}

impl Display for CanonicalPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() && self.prefix.starts_with("//") {
            return write!(f, "{}", self.prefix.trim_end_matches('/'));
        }
        write!(f, "{}{}", self.prefix, self.segments.join("/"))
    }
}

impl FromStr for CanonicalPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&Path> for CanonicalPath {
    type Error = PathError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        Self::from_path(path)
    }
}

impl TryFrom<PathBuf> for CanonicalPath {
    type Error = PathError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::from_path(&path)
    }
}

impl Serialize for CanonicalPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CanonicalPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Errors related to canonical paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty input
    #[error("path is empty")]
    Empty,

    /// Relative or drive-relative input
    #[error("path '{0}' is not absolute")]
    NotAbsolute(String),

    /// UNC path without server or share
    #[error("malformed UNC path '{0}'")]
    InvalidUnc(String),

    /// Path that cannot be represented as UTF-8
    #[error("path '{}' is not valid UTF-8", .0.display())]
    NotUtf8(PathBuf),

    /// Segment that is empty or contains a separator
    #[error("invalid path segment '{0}'")]
    InvalidSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(raw: &str) -> CanonicalPath {
        CanonicalPath::new(raw).unwrap()
    }

    #[test]
    fn posix_path_normalises_separators() {
        let path = canon("/mnt//projects/./demo/");
        assert_eq!(path.to_string(), "/mnt/projects/demo");
        assert_eq!(path.segments(), &["mnt", "projects", "demo"]);
    }

    #[test]
    fn parent_dir_segments_pop() {
        assert_eq!(canon("/a/b/../c").to_string(), "/a/c");
        assert_eq!(canon("/../a").to_string(), "/a");
    }

    #[test]
    fn windows_drive_letter_is_lowercased() {
        let a = canon(r"C:\Projects\Demo");
        let b = canon("c:/Projects/Demo");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "c:/Projects/Demo");
        assert_eq!(canon("D:").to_string(), "d:/");
    }

    #[test]
    fn segment_case_is_preserved() {
        assert_ne!(canon("/a/Shot"), canon("/a/shot"));
    }

    #[test]
    fn unc_prefix_is_kept() {
        let path = canon(r"\\server\share\proj\x");
        assert_eq!(path.prefix(), "//server/share/");
        assert_eq!(path.to_string(), "//server/share/proj/x");
        assert_eq!(canon("//server/share").to_string(), "//server/share");
    }

    #[test]
    fn relative_paths_are_rejected() {
        assert!(matches!(
            CanonicalPath::new("proj/x"),
            Err(PathError::NotAbsolute(_))
        ));
        assert!(matches!(
            CanonicalPath::new("C:proj"),
            Err(PathError::NotAbsolute(_))
        ));
        assert!(matches!(CanonicalPath::new(""), Err(PathError::Empty)));
        assert!(matches!(
            CanonicalPath::new("//server"),
            Err(PathError::InvalidUnc(_))
        ));
    }

    #[test]
    fn parent_and_child() {
        let path = canon("/a/b");
        assert_eq!(path.parent().unwrap(), canon("/a"));
        assert_eq!(path.child("c").unwrap(), canon("/a/b/c"));
        assert!(canon("/").parent().is_none());
        assert!(path.child("x/y").is_err());
        assert!(path.child("..").is_err());
    }

    #[test]
    fn prefix_and_relative() {
        let root = canon("/mnt/projects");
        let path = canon("/mnt/projects/demo/assets");
        assert!(root.is_prefix_of(&path));
        assert!(!path.is_prefix_of(&root));
        assert_eq!(path.relative_to(&root).unwrap(), &["demo", "assets"]);
        assert!(canon("/mnt/other").relative_to(&root).is_none());
        assert!(!canon("c:/mnt/projects").is_prefix_of(&path));
    }

    #[test]
    fn serde_uses_string_form() {
        let path = canon(r"C:\a\b");
        let text = toml::to_string(&Wrap { path: path.clone() }).unwrap();
        assert_eq!(text.trim(), r#"path = "c:/a/b""#);

        let back: Wrap = toml::from_str(&text).unwrap();
        assert_eq!(back.path, path);
    }

    #[derive(Serialize, Deserialize)]
    struct Wrap {
        path: CanonicalPath,
    }
}
