//! Symbols: named, locatable elements of a markdown document at one revision.

use std::hash::{Hash, Hasher};

use crate::factory;
use crate::navigation::{Icon, NavigatableSymbol, NavigationTarget, Presentation};
use crate::pointer::Pointer;
use crate::range::TextRange;
use crate::tree::{LabelRole, NodeKind};
use crate::usage::{RenameTarget, SearchScope, SearchTarget, UsageHandler};
use crate::workspace::{DocumentId, ReadGuard};

/// A header or link label as it existed when it was created.
///
/// Immutable. When the document changes, restore a fresh symbol through its
/// [`Pointer`] instead of adjusting this one.
///
/// Two symbols are equal when document, range and text are equal. The anchor
/// and revision are restoration aids and do not take part in identity.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Header slug or normalized label, used to re-find the symbol.
    anchor_text: Option<String>,
    /// Owning document.
    document: DocumentId,
    /// Header or label, with level or role.
    kind: NodeKind,
    /// Semantic text range at `revision`.
    range: TextRange,
    /// Document revision the range is expressed in.
    revision: u64,
    /// Text covered by `range` at creation time.
    text: String,
}

impl Symbol {
    /// Slug for headers, normalized label for labels.
    pub fn anchor_text(&self) -> Option<&str> {
        return self.anchor_text.as_deref();
    }

    /// A pointer that can re-find this symbol after the document changes.
    pub fn create_pointer(&self) -> Pointer {
        return Pointer::new(
            self.document,
            self.range,
            self.text.clone(),
            self.anchor_text.clone(),
            self.kind,
            self.revision,
        );
    }

    /// Owning document.
    pub const fn document(&self) -> DocumentId {
        return self.document;
    }

    /// A heading symbol. Headers always carry their slug.
    pub fn header(
        document: DocumentId,
        range: TextRange,
        text: String,
        anchor_text: String,
        level: u8,
        revision: u64,
    ) -> Self {
        return Self {
            anchor_text: Some(anchor_text),
            document,
            kind: NodeKind::Header { level },
            range,
            revision,
            text,
        };
    }

    /// Icon tag shown next to the symbol.
    const fn icon(&self) -> Icon {
        return match self.kind {
            NodeKind::Header { .. } => Icon::Header,
            NodeKind::LinkLabel { .. } => Icon::Link,
        };
    }

    /// Headers declare themselves; labels only at a `[label]: url` definition.
    pub const fn is_declaration(&self) -> bool {
        return match self.kind {
            NodeKind::Header { .. } => true,
            NodeKind::LinkLabel { role } => role.is_definition(),
        };
    }

    /// Header or label, with level or role.
    pub const fn kind(&self) -> NodeKind {
        return self.kind;
    }

    /// A link label symbol. The anchor is derived from the text.
    pub fn link_label(document: DocumentId, range: TextRange, text: String, role: LabelRole, revision: u64) -> Self {
        return Self {
            anchor_text: factory::normalize_label(&text),
            document,
            kind: NodeKind::LinkLabel { role },
            range,
            revision,
            text,
        };
    }

    /// Labels are only meaningful inside their own file; headers can be linked
    /// from anywhere in the project.
    pub const fn maximal_search_scope(&self) -> SearchScope {
        return match self.kind {
            NodeKind::Header { .. } => SearchScope::Project,
            NodeKind::LinkLabel { .. } => SearchScope::Document(self.document),
        };
    }

    /// Label, icon and location of the symbol. `None` once the document is closed.
    pub fn presentation(&self, read: &ReadGuard<'_>) -> Option<Presentation> {
        let document = read.document(self.document)?;
        return Some(Presentation::builder(self.text.clone()).icon(self.icon()).location_in(document).build());
    }

    /// Semantic text range at `revision`.
    pub const fn range(&self) -> TextRange {
        return self.range;
    }

    /// Document revision the range is expressed in.
    pub const fn revision(&self) -> u64 {
        return self.revision;
    }

    /// What usage search looks for: the slug of a header, the text of a label.
    pub fn search_text(&self) -> &str {
        return match self.kind {
            NodeKind::Header { .. } => self.anchor_text.as_deref().unwrap_or(&self.text),
            NodeKind::LinkLabel { .. } => &self.text,
        };
    }

    /// Name offered to rename.
    pub fn target_name(&self) -> &str {
        return &self.text;
    }

    /// Text covered by the range at creation time.
    pub fn text(&self) -> &str {
        return &self.text;
    }

    /// Handler that searches for plain occurrences of `search_text`.
    pub fn usage_handler(&self) -> UsageHandler {
        return UsageHandler::empty(self.search_text());
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.document.hash(state);
        self.range.hash(state);
        self.text.hash(state);
    }
}

impl NavigatableSymbol for Symbol {
    fn navigation_targets(&self, read: &ReadGuard<'_>) -> Vec<NavigationTarget> {
        if read.document(self.document).is_none() {
            return Vec::new();
        }
        return vec![NavigationTarget::new(
            self.document,
            self.range.start(),
            self.text.clone(),
            self.icon(),
        )];
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        return self.document == other.document && self.range == other.range && self.text == other.text;
    }
}

impl RenameTarget for Symbol {
    fn maximal_search_scope(&self) -> SearchScope {
        return Self::maximal_search_scope(self);
    }

    fn presentation(&self, read: &ReadGuard<'_>) -> Option<Presentation> {
        return Self::presentation(self, read);
    }

    fn target_name(&self) -> &str {
        return Self::target_name(self);
    }
}

impl SearchTarget for Symbol {
    fn maximal_search_scope(&self) -> SearchScope {
        return Self::maximal_search_scope(self);
    }

    fn presentation(&self, read: &ReadGuard<'_>) -> Option<Presentation> {
        return Self::presentation(self, read);
    }

    fn search_text(&self) -> &str {
        return Self::search_text(self);
    }

    fn usage_handler(&self) -> UsageHandler {
        return Self::usage_handler(self);
    }
}
