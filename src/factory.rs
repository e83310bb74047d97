//! Symbol factory: turns header and link label nodes into [`Symbol`]s.
//!
//! A symbol's range covers the semantic text only. Heading markers, closing
//! `#` sequences, label brackets and surrounding whitespace are trimmed away.

use crate::range::TextRange;
use crate::symbol::Symbol;
use crate::tree::{NodeKind, SyntaxNode};
use crate::workspace::{Document, DocumentId, ReadGuard};

/// Trimmed content range of a header or label node.
///
/// `None` when the node has no content child or nothing is left after trimming.
pub fn content_range(text: &str, node: &SyntaxNode) -> Option<TextRange> {
    let raw = node.content?;
    return match node.kind {
        NodeKind::Header { .. } => {
            let atx = node
                .range
                .substring(text)
                .is_some_and(|s| return s.trim_start().starts_with('#'));
            trim_header_content(text, raw, atx)
        },
        NodeKind::LinkLabel { .. } => trim_label_content(text, raw),
    };
}

/// Every symbol of a document, in document order.
///
/// Empty for closed documents or when the document cannot be parsed.
pub fn document_symbols(read: &ReadGuard<'_>, id: DocumentId) -> Vec<Symbol> {
    let Some(document) = read.document(id) else {
        return Vec::new();
    };
    let tree = match document.tree() {
        Err(e) => {
            tracing::warn!(%id, error = %e, "cannot list symbols");
            return Vec::new();
        },
        Ok(t) => t,
    };

    let mut symbols: Vec<Symbol> = tree
        .headers()
        .iter()
        .chain(tree.labels())
        .filter_map(|node| return symbol_for_node(document, node))
        .collect();
    symbols.sort_by_key(|s| return (s.range().start(), s.range().end()));
    return symbols;
}

/// Byte length of the prefix removed when `s` was trimmed down to `rest`.
const fn leading_len(s: &str, rest: &str) -> usize {
    return s.len().saturating_sub(rest.len());
}

/// Normalize a link label for matching: trimmed, internal whitespace
/// collapsed to one space, lowercased. `None` for a blank label.
pub fn normalize_label(label: &str) -> Option<String> {
    let collapsed = label.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    return Some(collapsed.to_lowercase());
}

/// Convert heading text to a URL-compatible slug.
/// Lowercase, spaces/non-alphanumeric to hyphens, collapse runs, trim edges.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut result = String::with_capacity(lowered.len());
    let mut prev_hyphen = true; // Start true to trim leading hyphens.

    for c in lowered.chars() {
        if c.is_alphanumeric() {
            result.push(c);
            prev_hyphen = false;
            continue;
        }
        if prev_hyphen {
            continue;
        }
        result.push('-');
        prev_hyphen = true;
    }

    if result.ends_with('-') {
        result.pop();
    }
    return result;
}

/// The innermost symbol whose range contains `offset`.
pub fn symbol_at(read: &ReadGuard<'_>, id: DocumentId, offset: usize) -> Option<Symbol> {
    return document_symbols(read, id)
        .into_iter()
        .filter(|s| return s.range().contains(offset))
        .min_by_key(|s| return s.range().len());
}

/// Build the symbol for one node of `document`'s current tree.
///
/// Returns `None` for shapes that carry no symbol: an empty heading, a blank
/// label, or a heading whose text has no slug.
pub fn symbol_for_node(document: &Document, node: &SyntaxNode) -> Option<Symbol> {
    let text = document.text();
    let range = content_range(text, node)?;
    let symbol_text = range.substring(text)?.to_string();

    return match node.kind {
        NodeKind::Header { level } => {
            let anchor = slugify(&symbol_text);
            if anchor.is_empty() {
                return None;
            }
            Some(Symbol::header(document.id(), range, symbol_text, anchor, level, document.revision()))
        },
        NodeKind::LinkLabel { role } => {
            normalize_label(&symbol_text)?;
            Some(Symbol::link_label(document.id(), range, symbol_text, role, document.revision()))
        },
    };
}

/// Trim whitespace and, for ATX headings, an optional closing `#` sequence.
fn trim_header_content(text: &str, raw: TextRange, atx: bool) -> Option<TextRange> {
    let s = raw.substring(text)?;
    let start_trimmed = s.trim_start();
    let skip = leading_len(s, start_trimmed);
    let mut content = start_trimmed.trim_end();

    if atx {
        let without_closing = content.trim_end_matches('#');
        if without_closing.is_empty() {
            return None;
        }
        if without_closing.len() < content.len() && without_closing.ends_with(|c: char| return c == ' ' || c == '\t') {
            content = without_closing.trim_end();
        }
    }

    if content.is_empty() {
        return None;
    }
    return Some(TextRange::at(raw.start().saturating_add(skip), content.len()));
}

/// Strip whitespace and one pair of surrounding brackets from a label.
fn trim_label_content(text: &str, raw: TextRange) -> Option<TextRange> {
    let s = raw.substring(text)?;
    let trimmed = s.trim_start();
    let mut skip = leading_len(s, trimmed);

    let mut inner = trimmed.trim_end();
    if let Some(rest) = inner.strip_prefix('[') {
        inner = rest;
        skip = skip.saturating_add(1);
    }
    inner = inner.strip_suffix(']').unwrap_or(inner);

    let inner_trimmed = inner.trim_start();
    skip = skip.saturating_add(leading_len(inner, inner_trimmed));
    let content = inner_trimmed.trim_end();

    if content.is_empty() {
        return None;
    }
    return Some(TextRange::at(raw.start().saturating_add(skip), content.len()));
}
