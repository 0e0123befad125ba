//! Paths into the document's logical tree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered list of string segments, e.g. widget id → row id → column id.
///
/// The empty path is the overlay root. On the wire a path is a JSON array
/// of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<String>);

impl Path {
    /// The empty path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// First segment and the remaining segments.
    pub fn split_first(&self) -> Option<(&str, &[String])> {
        self.0.split_first().map(|(head, rest)| (head.as_str(), rest))
    }

    /// This path with one more segment appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend(self.0.iter().cloned());
        segments.push(segment.into());
        Self(segments)
    }

    /// Concatenation of `self` and `other`.
    pub fn join(&self, other: &Path) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + other.0.len());
        segments.extend(self.0.iter().cloned());
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    /// Parse the `/`-separated, percent-encoded form produced by `Display`.
    ///
    /// Malformed escapes (`%zz`, a trailing `%`) are kept literally. A
    /// segment whose escapes decode to invalid UTF-8 is kept undecoded.
    /// Both `""` and `"/"` are the root.
    pub fn parse_escaped(text: &str) -> Self {
        if text.is_empty() || text == "/" {
            return Self::root();
        }
        Self(text.split('/').map(unescape_segment).collect())
    }

}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(&urlencoding::encode(segment))?;
        }
        Ok(())
    }
}

fn unescape_segment(segment: &str) -> String {
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(segments: [&str; N]) -> Self {
        segments.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl AsRef<[String]> for Path {
    fn as_ref(&self) -> &[String] {
        &self.0
    }
}
