//! Navigation requests and the targets that produce them.
//!
//! This module only encodes *where* to go. Opening the file, scrolling and
//! focusing belong to whoever consumes a [`NavigationRequest`].

use std::fmt;
use std::path::{Path, PathBuf};

use crate::workspace::{Document, DocumentId, ReadGuard};

/// Payload of [`NavigationRequest::Directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRequest {
    /// Existing directory at creation time.
    directory: PathBuf,
}

impl DirectoryRequest {
    /// Directory to show.
    pub fn path(&self) -> &Path {
        return &self.directory;
    }
}

/// Icon tag for a presentation. Rendering is up to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    /// A directory target.
    Directory,
    /// A markdown heading.
    Header,
    /// A link label.
    Link,
}

/// Where a request lands, in editor terms.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Location {
    /// One-based column in characters. `None` for directories.
    pub column: Option<usize>,
    /// One-based line. `None` for directories.
    pub line: Option<usize>,
    /// File or directory path.
    pub path: PathBuf,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{}:{line}:{column}", self.path.display()),
            _ => write!(f, "{}", self.path.display()),
        };
    }
}

/// Implemented by symbols that can be navigated to.
pub trait NavigatableSymbol {
    /// Places this symbol can be shown at. Empty if its document is gone.
    fn navigation_targets(&self, read: &ReadGuard<'_>) -> Vec<NavigationTarget>;
}

/// A request to navigate somewhere. Build one through [`NavigationRequest::source`]
/// or [`NavigationRequest::directory`]; both return `None` when navigation is
/// currently impossible. The payloads have private fields, so no other code
/// can produce a request that skipped those checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationRequest {
    /// Show a directory.
    Directory(DirectoryRequest),
    /// Put the caret at an offset in a document.
    Source(SourceRequest),
}

impl NavigationRequest {
    /// A request for an existing directory, or `None` if it is gone.
    ///
    /// Whether the directory exists is asked of the workspace, which owns all
    /// file access.
    pub fn directory(read: &ReadGuard<'_>, directory: &Path) -> Option<Self> {
        read.assert_background_thread();
        if !read.directory_exists(directory) {
            return None;
        }
        return Some(Self::Directory(DirectoryRequest {
            directory: directory.to_path_buf(),
        }));
    }

    /// Target directory of a `Directory` request.
    pub fn directory_path(&self) -> Option<&Path> {
        return match self {
            Self::Directory(request) => Some(request.path()),
            Self::Source(_) => None,
        };
    }

    /// Target document of a `Source` request.
    pub const fn document(&self) -> Option<DocumentId> {
        return match self {
            Self::Directory(_) => None,
            Self::Source(request) => Some(request.document),
        };
    }

    /// Resolve to a path with line and column under the current text.
    /// `None` if the document has since been closed or the offset no longer fits.
    pub fn location(&self, read: &ReadGuard<'_>) -> Option<Location> {
        return match self {
            Self::Directory(request) => Some(Location {
                column: None,
                line: None,
                path: request.directory.clone(),
            }),
            Self::Source(request) => {
                let document = read.document(request.document)?;
                let (line, column) = document.line_col(request.offset)?;
                Some(Location {
                    column: Some(column),
                    line: Some(line),
                    path: document.path().to_path_buf(),
                })
            },
        };
    }

    /// Caret offset of a `Source` request.
    pub const fn offset(&self) -> Option<usize> {
        return match self {
            Self::Directory(_) => None,
            Self::Source(request) => Some(request.offset),
        };
    }

    /// A request for `offset` in `document`.
    ///
    /// `None` if the document is closed or binary, if `offset` lies past the
    /// end of the text, or if it splits a character. Must be called under read
    /// consistency and off the primary thread.
    pub fn source(read: &ReadGuard<'_>, document: DocumentId, offset: usize) -> Option<Self> {
        read.assert_background_thread();
        let doc = read.document(document)?;
        if doc.is_binary() || !doc.text().is_char_boundary(offset) {
            return None;
        }
        return Some(Self::Source(SourceRequest { document, offset }));
    }
}

/// A navigable place belonging to a symbol.
///
/// Holds a copy of the symbol's display data, not the symbol, so targets can
/// outlive the symbol that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    /// Document the target is in.
    document: DocumentId,
    /// Icon of the owning symbol.
    icon: Icon,
    /// Byte offset of the target.
    offset: usize,
    /// Display text of the owning symbol.
    text: String,
}

impl NavigationTarget {
    /// Document the target is in.
    pub const fn document(&self) -> DocumentId {
        return self.document;
    }

    /// Resolve the target into a request. `None` when it can no longer be
    /// navigated to.
    pub fn navigation_request(&self, read: &ReadGuard<'_>) -> Option<NavigationRequest> {
        return NavigationRequest::source(read, self.document, self.offset);
    }

    /// Target at `offset` presenting `text` with `icon`.
    pub(crate) const fn new(document: DocumentId, offset: usize, text: String, icon: Icon) -> Self {
        return Self {
            document,
            icon,
            offset,
            text,
        };
    }

    /// Byte offset of the target.
    pub const fn offset(&self) -> usize {
        return self.offset;
    }

    /// Render the target. `None` once its document is closed.
    pub fn presentation(&self, read: &ReadGuard<'_>) -> Option<Presentation> {
        let document = read.document(self.document)?;
        return Some(Presentation::builder(self.text.clone()).icon(self.icon).location_in(document).build());
    }
}

/// What a target looks like in a list: text, icon and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Presentation {
    /// Secondary location hint, the containing directory.
    container_text: Option<String>,
    /// Icon tag.
    icon: Icon,
    /// Primary location hint, the file name.
    location_text: Option<String>,
    /// Main label.
    presentable_text: String,
}

impl Presentation {
    /// Start building a presentation for `text`.
    pub const fn builder(text: String) -> PresentationBuilder {
        return PresentationBuilder {
            container_text: None,
            icon: Icon::Link,
            location_text: None,
            presentable_text: text,
        };
    }

    /// Containing directory, if any.
    pub fn container_text(&self) -> Option<&str> {
        return self.container_text.as_deref();
    }

    /// Icon tag.
    pub const fn icon(&self) -> Icon {
        return self.icon;
    }

    /// File name the target is located in.
    pub fn location_text(&self) -> Option<&str> {
        return self.location_text.as_deref();
    }

    /// Main label.
    pub fn presentable_text(&self) -> &str {
        return &self.presentable_text;
    }
}

/// Builder for [`Presentation`].
#[derive(Debug, Clone)]
pub struct PresentationBuilder {
    /// See [`Presentation::container_text`].
    container_text: Option<String>,
    /// See [`Presentation::icon`].
    icon: Icon,
    /// See [`Presentation::location_text`].
    location_text: Option<String>,
    /// See [`Presentation::presentable_text`].
    presentable_text: String,
}

impl PresentationBuilder {
    /// Finish the presentation.
    pub fn build(self) -> Presentation {
        return Presentation {
            container_text: self.container_text,
            icon: self.icon,
            location_text: self.location_text,
            presentable_text: self.presentable_text,
        };
    }

    /// Set the icon.
    pub const fn icon(mut self, icon: Icon) -> Self {
        self.icon = icon;
        return self;
    }

    /// Add "located in" hints: the file name and its directory.
    pub fn location_in(mut self, document: &Document) -> Self {
        let path = document.path();
        self.location_text = path.file_name().map(|n| return n.to_string_lossy().into_owned());
        self.container_text = path
            .parent()
            .filter(|p| return !p.as_os_str().is_empty())
            .map(|p| return p.display().to_string());
        return self;
    }
}

/// Payload of [`NavigationRequest::Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRequest {
    /// Document to open.
    document: DocumentId,
    /// Byte offset on a character boundary, at most the text length.
    offset: usize,
}

impl SourceRequest {
    /// Document to open.
    pub const fn document(&self) -> DocumentId {
        return self.document;
    }

    /// Caret offset in bytes.
    pub const fn offset(&self) -> usize {
        return self.offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Workspace;

    #[test]
    fn source_request_keeps_exact_offset() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "# Title\n");
        let read = workspace.read();

        for offset in [0, 3, 8] {
            let request = NavigationRequest::source(&read, id, offset).unwrap();
            let NavigationRequest::Source(source) = &request else {
                panic!("expected a source request, got {request:?}");
            };
            assert_eq!((source.document(), source.offset()), (id, offset));
            assert_eq!(request.offset(), Some(offset));
            assert_eq!(request.document(), Some(id));
            assert_eq!(request.directory_path(), None);
            assert_eq!(NavigationRequest::source(&read, id, offset), Some(request));
        }
    }

    #[test]
    fn source_request_rejects_offsets_past_the_end() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "# Title\n");
        let read = workspace.read();
        assert_eq!(NavigationRequest::source(&read, id, 9), None);
        assert_eq!(NavigationRequest::source(&read, id, usize::MAX), None);
    }

    #[test]
    fn source_request_rejects_split_characters() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "# Café\n");
        let read = workspace.read();
        // 'é' occupies bytes 5 and 6.
        assert_eq!(NavigationRequest::source(&read, id, 6), None);
        assert!(NavigationRequest::source(&read, id, 7).is_some());
    }

    #[test]
    fn source_request_needs_an_open_text_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.md");
        std::fs::write(&path, [0xff_u8, 0xfe, 0x00]).unwrap();

        let workspace = Workspace::new();
        let binary = workspace.open(&path).unwrap();
        let closed = workspace.open_text("gone.md", "x");
        workspace.close(closed);

        let read = workspace.read();
        assert_eq!(NavigationRequest::source(&read, binary, 0), None);
        assert_eq!(NavigationRequest::source(&read, closed, 0), None);
    }

    #[test]
    fn directory_request_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new();
        let read = workspace.read();

        let request = NavigationRequest::directory(&read, dir.path()).unwrap();
        assert_eq!(request.directory_path(), Some(dir.path()));
        assert_eq!(request.document(), None);
        assert_eq!(request.offset(), None);
        assert_eq!(request.location(&read).unwrap().to_string(), dir.path().display().to_string());
        assert_eq!(NavigationRequest::directory(&read, &dir.path().join("missing")), None);
    }

    #[test]
    fn source_location_is_line_and_column() {
        let workspace = Workspace::new();
        let id = workspace.open_text("docs/a.md", "# Title\n\nSee [foo].\n");
        let read = workspace.read();

        let request = NavigationRequest::source(&read, id, 14).unwrap();
        assert_eq!(request.location(&read).unwrap().to_string(), "docs/a.md:3:6");
    }

    #[test]
    fn primary_thread_is_rejected_under_test() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "# Title\n");
        workspace.mark_primary_thread();
        let read = workspace.read();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            return NavigationRequest::source(&read, id, 0);
        }));
        assert!(outcome.is_err(), "primary-thread request must panic under test");
    }

    #[test]
    fn presentation_carries_location_hints() {
        let workspace = Workspace::new();
        let id = workspace.open_text("docs/guide.md", "");
        let read = workspace.read();

        let presentation = Presentation::builder("Intro".to_string())
            .icon(Icon::Header)
            .location_in(read.document(id).unwrap())
            .build();
        assert_eq!(presentation.presentable_text(), "Intro");
        assert_eq!(presentation.location_text(), Some("guide.md"));
        assert_eq!(presentation.container_text(), Some("docs"));
    }
}
