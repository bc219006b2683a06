//! # Refinement
//!
//! The normalization pass between property resolution and layout proper:
//! whitespace handling on character data, structural validation, and tagging
//! every node with the formatter that owns it. Text mutations happen in
//! place; empty text nodes are left in the arena and skipped downstream.

use crate::config::LayoutOptions;
use crate::diagnostics::DiagnosticSink;
use crate::error::LayoutError;
use crate::fo::{FoElement, FoTree, NodeId};
use crate::properties::ResolvedStyle;

/// Which formatter owns a node during layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutClass {
    /// Block-level: `block`, `block-container`, `list-block`, `list-item`.
    Block,
    /// Inline-level content that flows into lines.
    Inline,
    Table,
    Image,
    Float,
    Absolute,
    Footnote,
    Marker,
    /// Structural node with no formatter of its own (root, masters, flows).
    Structural,
}

/// Run refinement. Returns the per-node layout classes; the tree's text
/// content is normalized in place.
pub fn refine(
    tree: &mut FoTree,
    styles: &[ResolvedStyle],
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
) -> Result<Vec<LayoutClass>, LayoutError> {
    check_depth(tree, options)?;
    validate_structure(tree, sink)?;
    collapse_whitespace(tree, styles);
    Ok(classify(tree, styles))
}

fn check_depth(tree: &FoTree, options: &LayoutOptions) -> Result<(), LayoutError> {
    let limit = options.max_nesting_depth as usize;
    for id in 0..tree.len() {
        if tree.depth(id) > limit {
            return Err(LayoutError::LimitExceeded {
                guard: "max-nesting-depth",
                limit: options.max_nesting_depth as u64,
            });
        }
    }
    Ok(())
}

fn validate_structure(tree: &FoTree, sink: &mut DiagnosticSink) -> Result<(), LayoutError> {
    // Marker classes declared anywhere in the document.
    let mut declared_classes: Vec<&str> = Vec::new();
    for id in 0..tree.len() {
        if tree.node(id).element == FoElement::Marker {
            if let Some(class) = tree.attr(id, "marker-class-name") {
                declared_classes.push(class);
            }
        }
    }

    for id in 0..tree.len() {
        let node = tree.node(id);
        match node.element {
            FoElement::TableRow => {
                if !has_ancestor(tree, id, FoElement::Table) {
                    return Err(LayoutError::InvalidDocument(
                        "table-row outside any table".into(),
                    ));
                }
            }
            FoElement::TableCell => {
                if !has_ancestor(tree, id, FoElement::Table) {
                    return Err(LayoutError::InvalidDocument(
                        "table-cell outside any table".into(),
                    ));
                }
            }
            FoElement::RetrieveMarker => {
                match tree.attr(id, "retrieve-class-name") {
                    Some(class) if declared_classes.contains(&class) => {}
                    Some(class) => sink.warn(
                        "unmatched-retrieve-marker",
                        format!("retrieve-marker class '{class}' has no matching marker"),
                    ),
                    None => sink.warn(
                        "unmatched-retrieve-marker",
                        "retrieve-marker without retrieve-class-name".to_string(),
                    ),
                }
                if !has_ancestor(tree, id, FoElement::StaticContent) {
                    sink.warn(
                        "misplaced-retrieve-marker",
                        "retrieve-marker outside static-content is ignored".to_string(),
                    );
                }
            }
            FoElement::Marker => {
                if tree.attr(id, "marker-class-name").is_none() {
                    sink.warn("marker-without-class", "marker lacks marker-class-name".to_string());
                }
            }
            FoElement::Footnote => {
                if tree.find_child(id, FoElement::FootnoteBody).is_none() {
                    sink.warn("footnote-without-body", "footnote lacks footnote-body".to_string());
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn has_ancestor(tree: &FoTree, id: NodeId, element: FoElement) -> bool {
    let mut current = tree.node(id).parent;
    while let Some(p) = current {
        if tree.node(p).element == element {
            return true;
        }
        current = tree.node(p).parent;
    }
    false
}

/// Normalize character data per the governing `white-space` value, then trim
/// block edges: a paragraph never starts or ends with a collapsed space.
fn collapse_whitespace(tree: &mut FoTree, styles: &[ResolvedStyle]) {
    // First pass: per-node collapse.
    for id in 0..tree.len() {
        if tree.node(id).element != FoElement::Text {
            continue;
        }
        let Some(raw) = tree.node(id).text.clone() else { continue };
        use crate::properties::WhiteSpaceMode;
        let collapsed = match styles[id].white_space() {
            WhiteSpaceMode::Normal | WhiteSpaceMode::Nowrap => collapse_runs(&raw, true),
            WhiteSpaceMode::PreLine => collapse_runs(&raw, false),
            WhiteSpaceMode::Pre | WhiteSpaceMode::PreWrap => raw,
        };
        tree.set_text(id, collapsed);
    }

    // Second pass: drop whitespace-only text in block-structural context and
    // trim paragraph edges.
    for id in 0..tree.len() {
        let element = tree.node(id).element;
        if !accepts_inline_content(element) {
            // Whitespace-only children of structural nodes carry no content.
            for &child in tree.children(id).to_vec().iter() {
                if tree.node(child).element == FoElement::Text {
                    if let Some(t) = &tree.node(child).text {
                        if t.chars().all(char::is_whitespace) {
                            tree.set_text(child, String::new());
                        }
                    }
                }
            }
        }
        if element == FoElement::Block && styles[id].white_space().collapses() {
            trim_paragraph_edges(tree, id);
        }
    }
}

/// Collapse whitespace runs to single spaces. When `fold_newlines` is false,
/// newlines survive as hard breaks (`pre-line`).
fn collapse_runs(text: &str, fold_newlines: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        let is_newline = ch == '\n' || ch == '\r';
        if ch.is_whitespace() && (fold_newlines || !is_newline) {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

/// Remove the leading space of the first inline text and the trailing space
/// of the last, and merge space runs across node boundaries.
fn trim_paragraph_edges(tree: &mut FoTree, block: NodeId) {
    let mut text_nodes = Vec::new();
    collect_inline_text(tree, block, &mut text_nodes);
    if text_nodes.is_empty() {
        return;
    }

    // Leading edge.
    for &id in &text_nodes {
        let Some(text) = tree.node(id).text.clone() else { continue };
        if text.is_empty() {
            continue;
        }
        let trimmed = text.trim_start_matches(' ').to_string();
        tree.set_text(id, trimmed.clone());
        if !trimmed.is_empty() {
            break;
        }
    }
    // Trailing edge.
    for &id in text_nodes.iter().rev() {
        let Some(text) = tree.node(id).text.clone() else { continue };
        if text.is_empty() {
            continue;
        }
        let trimmed = text.trim_end_matches(' ').to_string();
        tree.set_text(id, trimmed.clone());
        if !trimmed.is_empty() {
            break;
        }
    }
    // Cross-boundary runs: if one node ends with a space, the next must not
    // start with one.
    let mut prev_ends_space = false;
    for &id in &text_nodes {
        let Some(text) = tree.node(id).text.clone() else { continue };
        if text.is_empty() {
            continue;
        }
        let adjusted = if prev_ends_space {
            text.trim_start_matches(' ').to_string()
        } else {
            text
        };
        prev_ends_space = adjusted.ends_with(' ');
        tree.set_text(id, adjusted);
    }
}

fn collect_inline_text(tree: &FoTree, id: NodeId, out: &mut Vec<NodeId>) {
    for &child in tree.children(id) {
        let element = tree.node(child).element;
        match element {
            FoElement::Text => out.push(child),
            // Nested blocks start their own paragraphs; markers and footnote
            // bodies are out of the paragraph stream.
            FoElement::Block | FoElement::BlockContainer | FoElement::Table
            | FoElement::ListBlock | FoElement::Marker | FoElement::FootnoteBody
            | FoElement::Float => {}
            _ => collect_inline_text(tree, child, out),
        }
    }
}

/// Can this element directly hold inline content?
fn accepts_inline_content(element: FoElement) -> bool {
    matches!(
        element,
        FoElement::Block
            | FoElement::Inline
            | FoElement::InlineContainer
            | FoElement::BasicLink
            | FoElement::Marker
            | FoElement::BookmarkTitle
            | FoElement::Leader
            | FoElement::FootnoteBody
            | FoElement::ListItemLabel
            | FoElement::ListItemBody
            | FoElement::TableCell
    )
}

fn classify(tree: &FoTree, styles: &[ResolvedStyle]) -> Vec<LayoutClass> {
    (0..tree.len())
        .map(|id| {
            let node = tree.node(id);
            match node.element {
                FoElement::Block | FoElement::ListBlock | FoElement::ListItem => LayoutClass::Block,
                FoElement::BlockContainer => {
                    if styles[id].absolute_position().is_some() {
                        LayoutClass::Absolute
                    } else {
                        LayoutClass::Block
                    }
                }
                FoElement::Table => LayoutClass::Table,
                FoElement::ExternalGraphic | FoElement::InstreamForeignObject => LayoutClass::Image,
                FoElement::Float => LayoutClass::Float,
                FoElement::Footnote => LayoutClass::Footnote,
                FoElement::Marker => LayoutClass::Marker,
                FoElement::Inline
                | FoElement::InlineContainer
                | FoElement::Character
                | FoElement::BasicLink
                | FoElement::Leader
                | FoElement::PageNumber
                | FoElement::PageNumberCitation
                | FoElement::Text => LayoutClass::Inline,
                _ => LayoutClass::Structural,
            }
        })
        .collect()
}
