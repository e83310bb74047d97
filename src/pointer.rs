//! Restorable, weakly held references to symbols.
//!
//! A [`Pointer`] stores plain data only: document id, range, text, anchor and
//! the symbol kind. It never holds tree nodes or the original [`Symbol`], so a
//! stale pointer cannot keep an obsolete parse alive, and it can be sent to
//! and restored from any thread at any time.

use crate::factory;
use crate::range::TextRange;
use crate::symbol::Symbol;
use crate::tree::{NodeKind, SyntaxTree};
use crate::workspace::{Cancelled, Document, DocumentId, ReadGuard, Workspace};

/// Enough data to re-find a symbol after its document has been edited or
/// reparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    /// Slug or normalized label; drives the fallback search.
    anchor_text: Option<String>,
    /// Document the symbol lived in.
    document: DocumentId,
    /// Header or label; restoration only considers nodes of the same kind.
    kind: NodeKind,
    /// Last known range, at `revision`.
    range: TextRange,
    /// Document revision `range` is expressed in.
    revision: u64,
    /// Last known text.
    text: String,
}

impl Pointer {
    /// Document the symbol lived in.
    pub const fn document(&self) -> DocumentId {
        return self.document;
    }

    /// Pick the equal-anchor node closest to the last known start.
    /// Equidistant candidates resolve to the earliest in document order.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if a writer shows up during the scan.
    fn locate_by_anchor(
        &self,
        read: &ReadGuard<'_>,
        document: &Document,
        tree: &SyntaxTree,
    ) -> Result<Option<Symbol>, Cancelled> {
        let Some(anchor) = self.anchor_text.as_deref() else {
            return Ok(None);
        };

        let mut best: Option<(usize, Symbol)> = None;
        for node in tree.nodes_like(self.kind) {
            read.check_canceled()?;
            let Some(candidate) = factory::symbol_for_node(document, node) else {
                continue;
            };
            if candidate.anchor_text() != Some(anchor) {
                continue;
            }
            let distance = candidate.range().start().abs_diff(self.range.start());
            tracing::trace!(anchor, distance, range = %candidate.range(), "anchor candidate");
            if best.as_ref().is_none_or(|(closest, _)| return distance < *closest) {
                best = Some((distance, candidate));
            }
        }
        return Ok(best.map(|(_, symbol)| return symbol));
    }

    /// Cheap path: carry the range through the edit log and check that a node
    /// of the same kind still covers exactly that text.
    fn locate_directly(&self, document: &Document, tree: &SyntaxTree) -> Option<Symbol> {
        let mapped = document.map_range(self.range, self.revision)?;
        if mapped.substring(document.text())? != self.text {
            return None;
        }
        let node = tree
            .candidates_at(self.kind, mapped.start())
            .find(|n| return factory::content_range(document.text(), n) == Some(mapped))?;
        return self.recreate(node.kind, mapped, document.revision());
    }

    /// Create a pointer from primitive data. No tree access happens here.
    pub const fn new(
        document: DocumentId,
        range: TextRange,
        text: String,
        anchor_text: Option<String>,
        kind: NodeKind,
        revision: u64,
    ) -> Self {
        return Self {
            anchor_text,
            document,
            kind,
            range,
            revision,
            text,
        };
    }

    /// Last known range.
    pub const fn range(&self) -> TextRange {
        return self.range;
    }

    /// Re-wrap the stored data at a new location. Headers keep text and
    /// anchor; labels keep their text and derive the anchor again.
    fn recreate(&self, kind: NodeKind, range: TextRange, revision: u64) -> Option<Symbol> {
        return match kind {
            NodeKind::Header { level } => Some(Symbol::header(
                self.document,
                range,
                self.text.clone(),
                self.anchor_text.clone()?,
                level,
                revision,
            )),
            NodeKind::LinkLabel { role } => {
                Some(Symbol::link_label(self.document, range, self.text.clone(), role, revision))
            },
        };
    }

    /// Restore the symbol against whatever the workspace holds now.
    ///
    /// Acquires read consistency itself and retries from scratch whenever a
    /// writer cancels the attempt. Must not be called while the calling thread
    /// already holds a [`ReadGuard`]; use [`Pointer::try_restore`] then.
    ///
    /// `None` means the symbol no longer exists.
    pub fn restore(&self, workspace: &Workspace) -> Option<Symbol> {
        loop {
            let read = workspace.read();
            match self.try_restore(&read) {
                Err(Cancelled) => {
                    drop(read);
                    tracing::debug!(document = %self.document, "restore canceled by pending write, retrying");
                    std::thread::yield_now();
                },
                Ok(symbol) => return symbol,
            }
        }
    }

    /// Last known text.
    pub fn text(&self) -> &str {
        return &self.text;
    }

    /// One restoration attempt under the caller's read guard.
    ///
    /// The result depends only on the stored data and the current document
    /// state; nothing is remembered between calls.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if a writer interrupted the fallback scan. Discard
    /// everything and call again with a fresh guard.
    pub fn try_restore(&self, read: &ReadGuard<'_>) -> Result<Option<Symbol>, Cancelled> {
        let Some(document) = read.document(self.document) else {
            return Ok(None);
        };
        let tree = match document.tree() {
            Err(e) => {
                tracing::warn!(document = %self.document, error = %e, "cannot restore symbol");
                return Ok(None);
            },
            Ok(t) => t,
        };

        if let Some(symbol) = self.locate_directly(document, &tree) {
            tracing::debug!(document = %self.document, range = %symbol.range(), "restored by range tracking");
            return Ok(Some(symbol));
        }

        read.assert_background_thread();
        let restored = self.locate_by_anchor(read, document, &tree)?;
        match restored.as_ref() {
            None => tracing::debug!(document = %self.document, text = %self.text, "symbol is gone"),
            Some(symbol) => {
                tracing::debug!(document = %self.document, range = %symbol.range(), "restored by anchor");
            },
        }
        return Ok(restored);
    }
}
