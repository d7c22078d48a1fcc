use std::fmt;

/// Result alias used across the decoding engine.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors surfaced while opening a package or decoding its contents.
///
/// Variants carry enough context (entry name, sizes, resource id) to be
/// actionable in diagnostics without exposing raw buffer contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The input buffer is not a readable ZIP container.
    NotAnArchive(String),
    /// The named entry does not exist in the container.
    EntryNotFound(String),
    /// An entry's declared uncompressed size does not match what its
    /// stream actually produced.
    SizeMismatch {
        entry: String,
        declared: u64,
        actual: u64,
    },
    /// The binary XML chunk stream is structurally invalid.
    MalformedXml(String),
    /// The compiled resource table chunk stream is structurally invalid.
    MalformedResourceTable(String),
    /// The decoded document is not a usable manifest.
    InvalidManifest(String),
    /// No entry exists for the given resource id.
    ResourceNotFound(u32),
    /// Reference resolution exceeded the depth bound or revisited an id.
    ReferenceCycle(u32),
    /// The search pattern is not a valid regular expression.
    InvalidPattern(String),
    /// The input buffer exceeds the enforced size ceiling.
    TooLarge { size: usize, limit: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NotAnArchive(msg) => write!(f, "not a readable archive: {msg}"),
            DecodeError::EntryNotFound(name) => write!(f, "entry '{name}' not found in archive"),
            DecodeError::SizeMismatch {
                entry,
                declared,
                actual,
            } => write!(
                f,
                "entry '{entry}' declared {declared} uncompressed bytes but produced {actual}"
            ),
            DecodeError::MalformedXml(msg) => write!(f, "malformed binary XML: {msg}"),
            DecodeError::MalformedResourceTable(msg) => {
                write!(f, "malformed resource table: {msg}")
            }
            DecodeError::InvalidManifest(msg) => write!(f, "invalid manifest: {msg}"),
            DecodeError::ResourceNotFound(id) => {
                write!(f, "resource 0x{id:08x} not found in table")
            }
            DecodeError::ReferenceCycle(id) => {
                write!(f, "reference chain from 0x{id:08x} did not terminate")
            }
            DecodeError::InvalidPattern(msg) => write!(f, "invalid search pattern: {msg}"),
            DecodeError::TooLarge { size, limit } => {
                write!(f, "input of {size} bytes exceeds the {limit} byte ceiling")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<regex::Error> for DecodeError {
    fn from(value: regex::Error) -> Self {
        DecodeError::InvalidPattern(value.to_string())
    }
}
