//! Search and rename seams, plus a small usage finder over open documents.
//!
//! Labels are only matched inside their own document. Headers are matched by
//! `[text](path#slug)` links from every document in the project, and by
//! `[text](#slug)` links inside their own document.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::factory;
use crate::navigation::Presentation;
use crate::project;
use crate::range::TextRange;
use crate::symbol::Symbol;
use crate::tree::{LabelRole, NodeKind};
use crate::workspace::{Cancelled, Document, DocumentId, ReadGuard};

/// Kind of a `[label]: url` definition.
const DEFINITION: NodeKind = NodeKind::LinkLabel {
    role: LabelRole::Definition,
};

/// `[text](target#fragment)` with an optional target path.
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(link_pattern);

/// Implemented by symbols that can be renamed.
pub trait RenameTarget {
    /// Widest scope a rename may have to touch.
    fn maximal_search_scope(&self) -> SearchScope;

    /// How the target is shown in the rename dialog.
    fn presentation(&self, read: &ReadGuard<'_>) -> Option<Presentation>;

    /// Current name offered for editing.
    fn target_name(&self) -> &str;
}

/// Where usages of a symbol can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "document")]
pub enum SearchScope {
    /// Only inside one document.
    Document(DocumentId),
    /// Anywhere in the project.
    Project,
}

impl SearchScope {
    /// Whether `document` lies inside this scope.
    pub fn contains(self, document: DocumentId) -> bool {
        return match self {
            Self::Document(id) => id == document,
            Self::Project => true,
        };
    }
}

/// Implemented by symbols that usage search can look for.
pub trait SearchTarget {
    /// Widest scope to search.
    fn maximal_search_scope(&self) -> SearchScope;

    /// How the target is shown in the usage view.
    fn presentation(&self, read: &ReadGuard<'_>) -> Option<Presentation>;

    /// String to look for.
    fn search_text(&self) -> &str;

    /// Handler that drives the search.
    fn usage_handler(&self) -> UsageHandler;
}

/// One place a symbol is used.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Usage {
    /// Document the usage is in.
    pub document: DocumentId,
    /// The usage declares the symbol rather than referring to it.
    pub is_declaration: bool,
    /// Span of the matched label or link fragment.
    pub range: TextRange,
}

/// A handler with no custom behavior: it only carries the string to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageHandler {
    /// Plain text the search matches.
    search_string: String,
}

impl UsageHandler {
    /// Handler searching for `search_string` with default rules.
    pub fn empty(search_string: impl Into<String>) -> Self {
        return Self {
            search_string: search_string.into(),
        };
    }

    /// Plain text the search matches.
    pub fn search_string(&self) -> &str {
        return &self.search_string;
    }
}

/// The symbol that `symbol` refers to: the definition of a label, or the
/// header itself.
pub fn find_declaration(read: &ReadGuard<'_>, symbol: &Symbol) -> Option<Symbol> {
    if symbol.is_declaration() {
        return Some(symbol.clone());
    }
    let anchor = symbol.anchor_text()?;
    return factory::document_symbols(read, symbol.document())
        .into_iter()
        .find(|s| return s.kind() == DEFINITION && s.anchor_text() == Some(anchor));
}

/// Every usage of `symbol` within its maximal search scope, in document id
/// then offset order. The symbol's own occurrence is included.
///
/// # Errors
///
/// Returns `Cancelled` if a writer shows up during the scan.
pub fn find_usages(read: &ReadGuard<'_>, symbol: &Symbol) -> Result<Vec<Usage>, Cancelled> {
    read.assert_background_thread();
    return match symbol.kind() {
        NodeKind::Header { .. } => header_usages(read, symbol),
        NodeKind::LinkLabel { .. } => label_usages(read, symbol),
    };
}

/// Links pointing at `header`, plus the header itself.
///
/// # Errors
///
/// Returns `Cancelled` if a writer shows up during the scan.
fn header_usages(read: &ReadGuard<'_>, header: &Symbol) -> Result<Vec<Usage>, Cancelled> {
    let Some(target) = read.document(header.document()) else {
        return Ok(Vec::new());
    };
    let target_path = project::normalize_path(target.path());
    let slug = header.search_text();
    let scope = header.maximal_search_scope();

    let mut usages = Vec::new();
    for document in read.documents().filter(|d| return scope.contains(d.id()) && !d.is_binary()) {
        read.check_canceled()?;
        if document.id() == header.document() {
            usages.push(Usage {
                document: document.id(),
                is_declaration: true,
                range: header.range(),
            });
        }
        for (link_target, fragment) in links_in(document) {
            read.check_canceled()?;
            let Some(fragment_text) = fragment.substring(document.text()) else {
                continue;
            };
            if fragment_text != slug || link_target != target_path {
                continue;
            }
            tracing::trace!(document = %document.id(), range = %fragment, "header link");
            usages.push(Usage {
                document: document.id(),
                is_declaration: false,
                range: fragment,
            });
        }
    }
    usages.sort_by_key(|u| return (u.document, u.range.start()));
    return Ok(usages);
}

/// Labels in the same document whose normalized text matches.
///
/// # Errors
///
/// Returns `Cancelled` if a writer shows up during the scan.
fn label_usages(read: &ReadGuard<'_>, label: &Symbol) -> Result<Vec<Usage>, Cancelled> {
    let Some(anchor) = label.anchor_text() else {
        return Ok(Vec::new());
    };
    let mut usages = Vec::new();
    for candidate in factory::document_symbols(read, label.document()) {
        read.check_canceled()?;
        if !matches!(candidate.kind(), NodeKind::LinkLabel { .. }) || candidate.anchor_text() != Some(anchor) {
            continue;
        }
        usages.push(Usage {
            document: candidate.document(),
            is_declaration: candidate.is_declaration(),
            range: candidate.range(),
        });
    }
    return Ok(usages);
}

/// Compile the link pattern.
///
/// # Panics
///
/// Panics if the hardcoded pattern is invalid.
#[allow(clippy::expect_used, reason = "literal pattern checked by tests")]
fn link_pattern() -> Regex {
    return Regex::new(r"\[[^\]]*\]\(([^)#\s]*)#([^)\s]+)\)").expect("valid regex");
}

/// Every `[..](path#fragment)` link in `document`: the resolved target path
/// and the range of the fragment. External URLs are skipped.
fn links_in(document: &Document) -> Vec<(PathBuf, TextRange)> {
    let text = document.text();
    return LINK_PATTERN
        .captures_iter(text)
        .filter_map(|cap| {
            let target = cap.get(1)?;
            let fragment = cap.get(2)?;
            if target.as_str().contains("://") {
                return None;
            }
            let resolved = project::resolve_link(document.path(), target.as_str());
            return Some((resolved, TextRange::new(fragment.start(), fragment.end())));
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Workspace;

    /// The example document used throughout the usage tests.
    const SAMPLE: &str = "# Title\n\nSee [foo].\n\n[foo]: http://x";

    fn find(workspace: &Workspace, id: DocumentId, text: &str) -> Symbol {
        return factory::document_symbols(&workspace.read(), id)
            .into_iter()
            .find(|s| s.text() == text)
            .unwrap();
    }

    #[test]
    fn link_pattern_compiles() {
        let captures = link_pattern().captures("[x](a.md#setup)").unwrap();
        assert_eq!(&captures[1], "a.md");
        assert_eq!(&captures[2], "setup");
    }

    #[test]
    fn label_usages_stay_in_the_document() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", SAMPLE);
        workspace.open_text("b.md", "See [foo].\n\n[foo]: http://y");
        let reference = find(&workspace, id, "foo");

        let read = workspace.read();
        let usages = find_usages(&read, &reference).unwrap();
        assert_eq!(usages.len(), 2);
        assert!(usages.iter().all(|u| u.document == id));
        assert_eq!(usages.iter().filter(|u| u.is_declaration).count(), 1);
    }

    #[test]
    fn label_usages_match_normalized_text() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "See [Foo  Bar] and [foo bar][].\n\n[FOO BAR]: http://x\n");
        let reference = find(&workspace, id, "Foo  Bar");

        let read = workspace.read();
        assert_eq!(find_usages(&read, &reference).unwrap().len(), 3);
    }

    #[test]
    fn reference_goes_to_its_definition() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", SAMPLE);
        let reference = find(&workspace, id, "foo");
        assert!(!reference.is_declaration());

        let read = workspace.read();
        let declaration = find_declaration(&read, &reference).unwrap();
        assert!(declaration.is_declaration());
        assert_eq!(declaration.range().start(), SAMPLE.rfind("foo").unwrap());
    }

    #[test]
    fn undefined_reference_has_no_declaration() {
        let workspace = Workspace::new();
        let id = workspace.open_text("a.md", "See [missing].\n");
        let reference = find(&workspace, id, "missing");
        assert_eq!(find_declaration(&workspace.read(), &reference), None);
    }

    #[test]
    fn header_usages_span_the_project() {
        let workspace = Workspace::new();
        let guide = workspace.open_text("docs/guide.md", "## Setup\n\nBack to [top](#setup).\n");
        let other = workspace.open_text("docs/other.md", "[a](guide.md#setup) [b](guide.md#teardown)\n");
        let readme = workspace.open_text("README.md", "[c](./docs/guide.md#setup) [d](https://x.io/guide.md#setup)\n");
        let header = find(&workspace, guide, "Setup");

        let read = workspace.read();
        let usages = find_usages(&read, &header).unwrap();
        let places: Vec<(DocumentId, bool)> = usages.iter().map(|u| (u.document, u.is_declaration)).collect();
        assert_eq!(places, vec![(guide, true), (guide, false), (other, false), (readme, false)]);

        let in_other = usages.iter().find(|u| u.document == other).unwrap();
        let text = read.document(other).unwrap().text();
        assert_eq!(in_other.range.substring(text), Some("setup"));
    }

    #[test]
    fn scope_membership() {
        let workspace = Workspace::new();
        let a = workspace.open_text("a.md", "");
        let b = workspace.open_text("b.md", "");
        assert!(SearchScope::Document(a).contains(a));
        assert!(!SearchScope::Document(a).contains(b));
        assert!(SearchScope::Project.contains(b));
    }
}
