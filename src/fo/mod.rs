//! # Formatting-Object Tree
//!
//! The input representation: a tree of formatting objects, each with a
//! qualified element name, attributes, and children. Nodes live in one arena
//! and reference each other by index, which keeps traversal cheap and lets
//! the page formatter re-queue subtree ranges without lifetime entanglement.

pub mod reader;

use std::collections::BTreeMap;

/// Index of a node in the [`FoTree`] arena.
pub type NodeId = usize;

/// The XSL-FO vocabulary this core understands. Unknown elements in the FO
/// namespace are skipped by the reader with a diagnostic and never reach the
/// tree. `Text` is synthetic: a run of character data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoElement {
    Root,
    LayoutMasterSet,
    SimplePageMaster,
    RegionBody,
    RegionBefore,
    RegionAfter,
    RegionStart,
    RegionEnd,
    PageSequence,
    Flow,
    StaticContent,
    Block,
    BlockContainer,
    Inline,
    InlineContainer,
    Character,
    ExternalGraphic,
    InstreamForeignObject,
    BasicLink,
    Leader,
    PageNumber,
    PageNumberCitation,
    Marker,
    RetrieveMarker,
    Table,
    TableColumn,
    TableHeader,
    TableFooter,
    TableBody,
    TableRow,
    TableCell,
    ListBlock,
    ListItem,
    ListItemLabel,
    ListItemBody,
    Float,
    Footnote,
    FootnoteBody,
    BookmarkTree,
    Bookmark,
    BookmarkTitle,
    Text,
}

impl FoElement {
    /// Map a local element name to its kind. `None` means the element is not
    /// part of the supported vocabulary.
    pub fn from_local_name(name: &str) -> Option<Self> {
        Some(match name {
            "root" => Self::Root,
            "layout-master-set" => Self::LayoutMasterSet,
            "simple-page-master" => Self::SimplePageMaster,
            "region-body" => Self::RegionBody,
            "region-before" => Self::RegionBefore,
            "region-after" => Self::RegionAfter,
            "region-start" => Self::RegionStart,
            "region-end" => Self::RegionEnd,
            "page-sequence" => Self::PageSequence,
            "flow" => Self::Flow,
            "static-content" => Self::StaticContent,
            "block" => Self::Block,
            "block-container" => Self::BlockContainer,
            "inline" => Self::Inline,
            "inline-container" => Self::InlineContainer,
            "character" => Self::Character,
            "external-graphic" => Self::ExternalGraphic,
            "instream-foreign-object" => Self::InstreamForeignObject,
            "basic-link" => Self::BasicLink,
            "leader" => Self::Leader,
            "page-number" => Self::PageNumber,
            "page-number-citation" => Self::PageNumberCitation,
            "marker" => Self::Marker,
            "retrieve-marker" => Self::RetrieveMarker,
            "table" => Self::Table,
            "table-column" => Self::TableColumn,
            "table-header" => Self::TableHeader,
            "table-footer" => Self::TableFooter,
            "table-body" => Self::TableBody,
            "table-row" => Self::TableRow,
            "table-cell" => Self::TableCell,
            "list-block" => Self::ListBlock,
            "list-item" => Self::ListItem,
            "list-item-label" => Self::ListItemLabel,
            "list-item-body" => Self::ListItemBody,
            "float" => Self::Float,
            "footnote" => Self::Footnote,
            "footnote-body" => Self::FootnoteBody,
            "bookmark-tree" => Self::BookmarkTree,
            "bookmark" => Self::Bookmark,
            "bookmark-title" => Self::BookmarkTitle,
            _ => return None,
        })
    }

    /// True for elements whose children are inline-level content.
    pub fn is_inline_level(self) -> bool {
        matches!(
            self,
            Self::Inline
                | Self::InlineContainer
                | Self::Character
                | Self::BasicLink
                | Self::Leader
                | Self::PageNumber
                | Self::PageNumberCitation
                | Self::Text
                | Self::ExternalGraphic
                | Self::InstreamForeignObject
                | Self::Footnote
        )
    }
}

/// One node in the arena.
#[derive(Debug, Clone)]
pub struct FoNode {
    pub element: FoElement,
    /// Attribute name → raw string value. A sorted map keeps attribute
    /// iteration deterministic.
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// Character data for `Text` nodes, raw as read; whitespace handling
    /// happens during refinement.
    pub text: Option<String>,
}

/// Arena-backed FO tree. Node 0, when present, is the `fo:root`.
#[derive(Debug, Clone, Default)]
pub struct FoTree {
    nodes: Vec<FoNode>,
}

impl FoTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() { None } else { Some(0) }
    }

    pub fn node(&self, id: NodeId) -> &FoNode {
        &self.nodes[id]
    }

    pub fn push(&mut self, element: FoElement, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(FoNode {
            element,
            attributes: BTreeMap::new(),
            children: Vec::new(),
            parent,
            text: None,
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(id);
        }
        id
    }

    pub fn push_text(&mut self, parent: NodeId, text: String) -> NodeId {
        let id = self.push(FoElement::Text, Some(parent));
        self.nodes[id].text = Some(text);
        id
    }

    pub fn set_attribute(&mut self, id: NodeId, name: String, value: String) {
        self.nodes[id].attributes.insert(name, value);
    }

    pub fn set_text(&mut self, id: NodeId, text: String) {
        self.nodes[id].text = Some(text);
    }

    /// Raw attribute value on a node.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id].attributes.get(name).map(String::as_str)
    }

    /// Children of a node, in document order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// First child with the given element kind.
    pub fn find_child(&self, id: NodeId, element: FoElement) -> Option<NodeId> {
        self.children(id).iter().copied().find(|&c| self.node(c).element == element)
    }

    /// All children with the given element kind, in document order.
    pub fn children_of_kind(&self, id: NodeId, element: FoElement) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.node(c).element == element)
            .collect()
    }

    /// Depth of a node (root = 0).
    pub fn depth(&self, mut id: NodeId) -> usize {
        let mut d = 0;
        while let Some(p) = self.nodes[id].parent {
            d += 1;
            id = p;
        }
        d
    }

    /// Pre-order walk over the whole tree.
    pub fn walk(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: Vec<NodeId> = self.root().into_iter().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            for &child in self.children(id).iter().rev() {
                stack.push(child);
            }
            Some(id)
        })
    }

    /// Concatenated character data of a node's descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(text) = &self.nodes[id].text {
            out.push_str(text);
        }
        for &child in self.children(id) {
            self.collect_text(child, out);
        }
    }

    /// Find the node carrying `id="..."` equal to `target`.
    pub fn find_by_id(&self, target: &str) -> Option<NodeId> {
        self.walk().find(|&n| self.attr(n, "id") == Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_parent_child_links() {
        let mut tree = FoTree::new();
        let root = tree.push(FoElement::Root, None);
        let seq = tree.push(FoElement::PageSequence, Some(root));
        let flow = tree.push(FoElement::Flow, Some(seq));
        let block = tree.push(FoElement::Block, Some(flow));
        tree.push_text(block, "hello".into());

        assert_eq!(tree.root(), Some(root));
        assert_eq!(tree.children(seq), &[flow]);
        assert_eq!(tree.node(block).parent, Some(flow));
        assert_eq!(tree.depth(block), 3);
        assert_eq!(tree.text_content(root), "hello");
    }

    #[test]
    fn walk_is_preorder_document_order() {
        let mut tree = FoTree::new();
        let root = tree.push(FoElement::Root, None);
        let a = tree.push(FoElement::Block, Some(root));
        let a1 = tree.push(FoElement::Inline, Some(a));
        let b = tree.push(FoElement::Block, Some(root));
        let order: Vec<NodeId> = tree.walk().collect();
        assert_eq!(order, vec![root, a, a1, b]);
    }

    #[test]
    fn element_name_lookup() {
        assert_eq!(FoElement::from_local_name("table-cell"), Some(FoElement::TableCell));
        assert_eq!(FoElement::from_local_name("retrieve-marker"), Some(FoElement::RetrieveMarker));
        assert_eq!(FoElement::from_local_name("wrapper-thing"), None);
    }
}
