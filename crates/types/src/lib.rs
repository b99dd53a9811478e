//! Validated identifier types shared by the ramupload crates.

use std::borrow::Borrow;

/// Errors that can occur when creating validated identifier types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input was empty
    #[error("Name cannot be empty")]
    Empty,

    /// The input was `.` or `..`
    #[error("Name cannot be a relative path component: {0}")]
    RelativeComponent(String),

    /// The input contained a path separator or NUL byte
    #[error("Name contains a path separator or NUL byte: {0}")]
    InvalidCharacter(String),
}

/// A single directory name within the data tree.
///
/// Subject and experiment identifiers are nothing more than the names of the
/// directories they live in, so this type only guarantees that the value can
/// be joined onto a path as exactly one component. It is non-empty, is not
/// `.` or `..`, and contains no `/`, `\` or NUL characters.
///
/// Unlike free-text fields the input is **not** trimmed: `" R1"` and `"R1"`
/// are different directories.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirName(String);

/// Subject code such as `R1042J`.
pub type SubjectId = DirName;

/// Experiment name such as `FR1` or `catFR3`.
pub type ExperimentId = DirName;

impl DirName {
    /// Creates a new `DirName` from the given input.
    ///
    /// # Errors
    ///
    /// Returns a `TextError` if the input is empty, is `.`/`..`, or contains a
    /// path separator.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let value = input.as_ref();
        if value.is_empty() {
            return Err(TextError::Empty);
        }
        if value == "." || value == ".." {
            return Err(TextError::RelativeComponent(value.to_owned()));
        }
        if value.contains(['/', '\\', '\0']) {
            return Err(TextError::InvalidCharacter(value.to_owned()));
        }
        Ok(Self(value.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a hidden entry (dot-file) that crawlers should skip.
    pub fn is_hidden(&self) -> bool {
        self.0.starts_with('.')
    }
}

impl std::fmt::Display for DirName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DirName {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for DirName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::path::Path> for DirName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl Borrow<str> for DirName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for DirName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DirName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl serde::Serialize for DirName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for DirName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DirName::new(&s).map_err(serde::de::Error::custom)
    }
}
