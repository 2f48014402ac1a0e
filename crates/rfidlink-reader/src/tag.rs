//! Tag identifiers and read results.

use crate::error::{ReaderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default maximum tag identifier length in characters.
pub const DEFAULT_TAG_MAX_LENGTH: usize = 20;

/// Normalized tag identifier.
///
/// The raw text is trimmed and upper-cased before validation, so `" e2003a "`
/// and `"E2003A"` are the same identifier. Valid identifiers are non-empty,
/// printable ASCII (interior spaces allowed), and no longer than the
/// configured maximum.
///
/// # Examples
///
/// ```
/// use rfidlink_reader::TagId;
///
/// let a = TagId::new(" abc123\r\n").unwrap();
/// let b: TagId = "ABC123".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "ABC123");
///
/// assert!(TagId::new("   ").is_err());
/// assert!(TagId::with_max_length("ABCDEF", 4).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagId(String);

impl TagId {
    /// Create a tag identifier with the default maximum length.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::InvalidTag` if the normalized text is empty, too
    /// long, or contains anything other than printable ASCII.
    pub fn new(raw: &str) -> Result<Self> {
        Self::with_max_length(raw, DEFAULT_TAG_MAX_LENGTH)
    }

    /// Create a tag identifier bounded by `max_length` characters.
    ///
    /// # Errors
    ///
    /// Same as [`TagId::new`].
    pub fn with_max_length(raw: &str, max_length: usize) -> Result<Self> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(ReaderError::invalid_tag("Tag ID must not be empty"));
        }

        if !trimmed.chars().all(|c| c == ' ' || c.is_ascii_graphic()) {
            return Err(ReaderError::invalid_tag(format!(
                "Tag ID must be printable ASCII, got {trimmed:?}"
            )));
        }

        let len = trimmed.len();
        if len > max_length {
            return Err(ReaderError::invalid_tag(format!(
                "Tag ID must be at most {max_length} chars, got {len}"
            )));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Get the normalized identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TagId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for TagId {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        TagId::new(s)
    }
}

impl TryFrom<String> for TagId {
    type Error = ReaderError;

    fn try_from(value: String) -> Result<Self> {
        TagId::new(&value)
    }
}

impl From<TagId> for String {
    fn from(tag: TagId) -> Self {
        tag.0
    }
}

/// Outcome of a single tag read.
///
/// An empty channel is the common case for a reader with nothing in range
/// and is reported as [`TagRead::NoTag`], never as an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagRead {
    /// A tag answered.
    Present(TagId),

    /// Nothing in range this cycle.
    NoTag,
}

impl TagRead {
    /// The identifier, if a tag answered.
    pub fn tag(&self) -> Option<&TagId> {
        match self {
            Self::Present(tag) => Some(tag),
            Self::NoTag => None,
        }
    }

    /// Consume the read, returning the identifier if present.
    pub fn into_tag(self) -> Option<TagId> {
        match self {
            Self::Present(tag) => Some(tag),
            Self::NoTag => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

impl fmt::Display for TagRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present(tag) => write!(f, "{tag}"),
            Self::NoTag => write!(f, "NO TAG"),
        }
    }
}

impl From<TagId> for TagRead {
    fn from(tag: TagId) -> Self {
        Self::Present(tag)
    }
}
