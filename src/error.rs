/// Crate-level error types for docsym.
use std::path::PathBuf;

use crate::range::TextRange;
use crate::workspace::DocumentId;

/// Failures of the document service, configuration and CLI surfaces.
///
/// Core symbol operations never return this type: a symbol that cannot be
/// restored or a location that cannot be navigated to is reported as `None`.
#[allow(clippy::error_impl_error, reason = "crate-level error type")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration file named on the command line does not exist.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// The document id does not name an open document.
    #[error("document not open: {id}")]
    DocumentNotFound {
        /// Id that was looked up.
        id: DocumentId,
    },

    /// An edit range does not fit the document it was applied to.
    #[error("edit {range} out of bounds for {} ({len} bytes)", path.display())]
    EditOutOfBounds {
        /// Length of the document text in bytes.
        len: usize,
        /// Document the edit targeted.
        path: PathBuf,
        /// Replaced range in the pre-edit text.
        range: TextRange,
    },

    /// A markdown file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A file exceeds the configured size limit.
    #[error("file too large ({size_bytes} bytes, max {max_bytes}): {}", file.display())]
    FileTooLarge {
        /// File that exceeded the size limit.
        file: PathBuf,
        /// Maximum allowed file size in bytes.
        max_bytes: u64,
        /// Actual file size in bytes.
        size_bytes: u64,
    },

    /// An offset given on the command line is not a position in the document.
    #[error("invalid offset {offset} in {} ({len} bytes)", path.display())]
    InvalidOffset {
        /// Length of the document text in bytes.
        len: usize,
        /// Offset that was requested.
        offset: usize,
        /// Document the offset was applied to.
        path: PathBuf,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// A report could not be serialized to JSON.
    #[error("json: {0}")]
    Json(
        /// The wrapped serialization error.
        #[from]
        serde_json::Error,
    ),

    /// No header or link label covers the requested offset.
    #[error("no symbol at offset {offset} in {}", path.display())]
    NoSymbolAtOffset {
        /// Offset that was requested.
        offset: usize,
        /// Document that was searched.
        path: PathBuf,
    },

    /// Tree-sitter failed to parse a document.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// Document that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// The filesystem watcher could not be set up.
    #[error("watch: {0}")]
    Watch(
        /// The wrapped notify error.
        #[from]
        notify::Error,
    ),
}
