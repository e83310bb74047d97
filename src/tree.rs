//! Markdown syntax tree: headers and link labels extracted with tree-sitter-md.
//!
//! The block grammar finds headings and link reference definitions; every
//! `inline` block is then re-parsed with the inline grammar to find the
//! reference-style links that use a label.

use std::path::Path;

use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::Error;
use crate::range::TextRange;

/// Where a link label sits in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelRole {
    /// `[label][]`
    Collapsed,
    /// `[label]: destination`
    Definition,
    /// `[text][label]`
    Full,
    /// `[label]`
    Shortcut,
}

impl LabelRole {
    /// Definitions declare a label; every other role references one.
    pub const fn is_definition(self) -> bool {
        return matches!(self, Self::Definition);
    }
}

/// Shape of a node the symbol factory understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum NodeKind {
    /// ATX (`## Title`) or setext heading.
    Header {
        /// Heading level, 1 through 6.
        level: u8,
    },
    /// A link label at a definition or reference site.
    LinkLabel {
        /// Definition or one of the reference link forms.
        role: LabelRole,
    },
}

impl NodeKind {
    /// Whether two kinds denote the same kind of target. Heading levels may
    /// change and reference forms may be rewritten without changing what the
    /// node points at, but a definition never stands in for a reference.
    pub const fn same_target_kind(self, other: Self) -> bool {
        return match (self, other) {
            (Self::Header { .. }, Self::Header { .. }) => true,
            (Self::LinkLabel { role: a }, Self::LinkLabel { role: b }) => {
                a.is_definition() == b.is_definition()
            },
            _ => false,
        };
    }
}

/// A header or link label node of one parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    /// Span of the child that holds the node's text: the heading content or
    /// the bracketed label. `None` for an empty heading.
    pub content: Option<TextRange>,
    /// What the node is.
    pub kind: NodeKind,
    /// Raw span of the whole node, markers included.
    pub range: TextRange,
}

/// Headers and link labels of one document revision, each list in document order.
#[derive(Debug, Default)]
pub struct SyntaxTree {
    /// Heading nodes.
    headers: Vec<SyntaxNode>,
    /// Link label nodes, definitions and references together.
    labels: Vec<SyntaxNode>,
}

impl SyntaxTree {
    /// Nodes of the same target kind as `kind` whose raw range touches `offset`.
    pub fn candidates_at(&self, kind: NodeKind, offset: usize) -> impl Iterator<Item = &SyntaxNode> {
        let list = self.list_for(kind);
        let first = list.partition_point(|n| return n.range.end() < offset);
        return list
            .get(first..)
            .unwrap_or_default()
            .iter()
            .take_while(move |n| return n.range.start() <= offset)
            .filter(move |n| return n.kind.same_target_kind(kind));
    }

    /// All heading nodes in document order.
    pub fn headers(&self) -> &[SyntaxNode] {
        return &self.headers;
    }

    /// All link label nodes in document order.
    pub fn labels(&self) -> &[SyntaxNode] {
        return &self.labels;
    }

    /// The per-kind node list `kind` lives in.
    fn list_for(&self, kind: NodeKind) -> &[SyntaxNode] {
        return match kind {
            NodeKind::Header { .. } => &self.headers,
            NodeKind::LinkLabel { .. } => &self.labels,
        };
    }

    /// Every node of the same target kind as `kind`, in document order.
    pub fn nodes_like(&self, kind: NodeKind) -> impl Iterator<Item = &SyntaxNode> {
        return self
            .list_for(kind)
            .iter()
            .filter(move |n| return n.kind.same_target_kind(kind));
    }

    /// Parse markdown text into headers and link labels.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` if a grammar cannot be loaded or tree-sitter
    /// gives up on the block structure.
    pub fn parse(path: &Path, text: &str) -> Result<Self, Error> {
        let block = parse_source(path, text, &tree_sitter_md::LANGUAGE.into())?;
        let mut inline_parser = new_parser(path, &tree_sitter_md::INLINE_LANGUAGE.into())?;

        let mut tree = Self::default();
        collect_block_nodes(block.root_node(), text, &mut inline_parser, &mut tree);
        tree.headers.sort_by_key(|n| return (n.range.start(), n.range.end()));
        tree.labels.sort_by_key(|n| return (n.range.start(), n.range.end()));

        tracing::trace!(
            path = %path.display(),
            headers = tree.headers.len(),
            labels = tree.labels.len(),
            "parsed markdown"
        );
        return Ok(tree);
    }
}

/// First child of `node` whose kind is one of `kinds`.
fn child_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    return node.children(&mut cursor).find(|c| return kinds.contains(&c.kind()));
}

/// Extract an ATX heading. The level comes from the `atx_hN_marker` child.
fn collect_atx_heading(heading: Node<'_>, tree: &mut SyntaxTree) {
    let level = {
        let mut cursor = heading.walk();
        heading
            .children(&mut cursor)
            .find_map(|c| return marker_level(c.kind()))
            .unwrap_or(1)
    };
    let content = heading
        .child_by_field_name("heading_content")
        .or_else(|| return child_of_kind(heading, &["inline"]))
        .map(|c| return node_range(c, 0));

    tree.headers.push(SyntaxNode {
        content,
        kind: NodeKind::Header { level },
        range: node_range(heading, 0),
    });
}

/// Walk block structure, collecting headings and definitions, and hand every
/// `inline` node to the inline grammar.
fn collect_block_nodes(node: Node<'_>, text: &str, inline_parser: &mut Parser, tree: &mut SyntaxTree) {
    match node.kind() {
        "atx_heading" => collect_atx_heading(node, tree),
        "setext_heading" => collect_setext_heading(node, tree),
        "link_reference_definition" => collect_definition(node, tree),
        "inline" => {
            collect_inline_nodes(node, text, inline_parser, tree);
            return;
        },
        _ => {},
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_block_nodes(child, text, inline_parser, tree);
    }
}

/// Extract the label of a `[label]: destination` definition.
fn collect_definition(definition: Node<'_>, tree: &mut SyntaxTree) {
    let Some(label) = child_of_kind(definition, &["link_label"]) else {
        return;
    };
    tree.labels.push(SyntaxNode {
        content: Some(node_range(label, 0)),
        kind: NodeKind::LinkLabel { role: LabelRole::Definition },
        range: node_range(definition, 0),
    });
}

/// Re-parse one `inline` block with the inline grammar and collect its
/// reference-style links. Offsets are shifted back into document space.
fn collect_inline_nodes(inline: Node<'_>, text: &str, inline_parser: &mut Parser, tree: &mut SyntaxTree) {
    let base = inline.start_byte();
    let Some(slice) = text.get(base..inline.end_byte()) else {
        return;
    };
    let Some(parsed) = inline_parser.parse(slice, None) else {
        tracing::warn!(offset = base, "inline grammar returned no tree");
        return;
    };
    walk_inline(parsed.root_node(), base, tree);
}

/// Extract a setext heading; `===` underlines are level 1, `---` level 2.
fn collect_setext_heading(heading: Node<'_>, tree: &mut SyntaxTree) {
    let level = if child_of_kind(heading, &["setext_h1_underline"]).is_some() { 1 } else { 2 };
    let content = heading
        .child_by_field_name("heading_content")
        .or_else(|| return child_of_kind(heading, &["paragraph"]))
        .map(|c| return node_range(c, 0));

    tree.headers.push(SyntaxNode {
        content,
        kind: NodeKind::Header { level },
        range: node_range(heading, 0),
    });
}

/// Reference link forms and the child that holds their label.
fn link_label_child<'t>(link: Node<'t>) -> Option<(LabelRole, Node<'t>)> {
    return match link.kind() {
        "collapsed_reference_link" => Some((LabelRole::Collapsed, child_of_kind(link, &["link_text"])?)),
        "full_reference_link" => Some((LabelRole::Full, child_of_kind(link, &["link_label"])?)),
        "shortcut_link" => Some((LabelRole::Shortcut, child_of_kind(link, &["link_text"])?)),
        _ => None,
    };
}

/// Heading level encoded in an `atx_hN_marker` kind.
fn marker_level(kind: &str) -> Option<u8> {
    let digit = kind.strip_prefix("atx_h")?.strip_suffix("_marker")?;
    return digit.parse().ok();
}

/// Create a parser for `language`.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the grammar ABI does not match the runtime.
fn new_parser(path: &Path, language: &Language) -> Result<Parser, Error> {
    let mut parser = Parser::new();
    parser.set_language(language).map_err(|e| {
        return Error::ParseFailed {
            file: path.to_path_buf(),
            reason: e.to_string(),
        };
    })?;
    return Ok(parser);
}

/// Document-space range of a tree-sitter node parsed from a slice starting at `base`.
fn node_range(node: Node<'_>, base: usize) -> TextRange {
    return TextRange::new(node.start_byte(), node.end_byte()).shift_right(base);
}

/// Parse source into a tree-sitter tree.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the language cannot be set or parsing fails.
fn parse_source(path: &Path, source: &str, language: &Language) -> Result<Tree, Error> {
    let mut parser = new_parser(path, language)?;
    return parser.parse(source, None).ok_or_else(|| {
        return Error::ParseFailed {
            file: path.to_path_buf(),
            reason: "tree-sitter returned None".to_string(),
        };
    });
}

/// Collect reference-style links below an inline-grammar node.
fn walk_inline(node: Node<'_>, base: usize, tree: &mut SyntaxTree) {
    if let Some((role, label)) = link_label_child(node) {
        tree.labels.push(SyntaxNode {
            content: Some(node_range(label, base)),
            kind: NodeKind::LinkLabel { role },
            range: node_range(node, base),
        });
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_inline(child, base, tree);
    }
}
