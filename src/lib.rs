//! # Folio
//!
//! A page-native XSL-FO layout core.
//!
//! Folio takes a formatting-object tree (pages, flows, blocks, inlines,
//! tables, graphics) and produces an **area tree**: a fully resolved,
//! geometry-stamped sequence of pages where every box has a definitive
//! position and size in page points. A downstream serializer turns the area
//! tree into PDF bytes; that serializer, like the font parser and the image
//! decoder, is an external collaborator consumed through the traits in
//! [`services`].
//!
//! ## Architecture
//!
//! ```text
//! XSL-FO XML (or an FoTree built directly)
//!       ↓
//!   [fo]          — arena tree of formatting objects
//!       ↓
//!   [properties]  — cascade: every node gains a ResolvedStyle
//!       ↓
//!   [refine]      — whitespace, validation, layout classes
//!       ↓
//!   [text]        — paragraphs into lines (greedy or Knuth-Plass)
//!   [table]       — columns, rows, spans, border collapse
//!       ↓
//!   [pagination]  — pages, keeps/breaks, floats, footnotes, markers
//!       ↓
//!   [area]        — the area tree + its JSON debug form
//! ```
//!
//! Layout is single-threaded, synchronous, and deterministic: identical
//! input, options, and font metrics produce byte-identical area trees.

pub mod area;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fo;
pub mod pagination;
pub mod properties;
pub mod refine;
pub mod services;
pub mod table;
pub mod text;

pub use area::AreaTree;
pub use config::LayoutOptions;
pub use diagnostics::{Diagnostic, DiagnosticSink};
pub use error::LayoutError;
pub use services::Services;

use fo::FoTree;

/// Lay out an XSL-FO document with the built-in service bundle.
///
/// This is the primary entry point. Takes the XML source and returns the
/// fully resolved area tree.
pub fn layout_xml(xml: &str, options: &LayoutOptions) -> Result<AreaTree, LayoutError> {
    let services = Services::builtin(
        options.hyphenation_min_word_length,
        options.hyphenation_min_left_chars,
        options.hyphenation_min_right_chars,
    );
    let mut sink = DiagnosticSink::new();
    layout_xml_with(xml, options, &services, &mut sink)
}

/// Same as [`layout_xml`] but also returns the diagnostics collected along
/// the way.
pub fn layout_xml_with_diagnostics(
    xml: &str,
    options: &LayoutOptions,
) -> Result<(AreaTree, Vec<Diagnostic>), LayoutError> {
    let services = Services::builtin(
        options.hyphenation_min_word_length,
        options.hyphenation_min_left_chars,
        options.hyphenation_min_right_chars,
    );
    let mut sink = DiagnosticSink::new();
    let tree = layout_xml_with(xml, options, &services, &mut sink)?;
    Ok((tree, sink.into_records()))
}

/// Lay out XML with caller-provided services and diagnostic sink.
pub fn layout_xml_with(
    xml: &str,
    options: &LayoutOptions,
    services: &Services,
    sink: &mut DiagnosticSink,
) -> Result<AreaTree, LayoutError> {
    let mut tree = fo::reader::parse(xml, sink)?;
    layout_tree(&mut tree, options, services, sink)
}

/// Run the pipeline on an already-built FO tree. The tree is refined in
/// place (whitespace normalization mutates character data).
pub fn layout_tree(
    tree: &mut FoTree,
    options: &LayoutOptions,
    services: &Services,
    sink: &mut DiagnosticSink,
) -> Result<AreaTree, LayoutError> {
    let styles = properties::resolve_styles(tree, sink);
    let classes = refine::refine(tree, &styles, options, sink)?;
    pagination::layout_document(tree, &styles, &classes, services, options, sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<fo:root xmlns:fo="http://www.w3.org/1999/XSL/Format">
  <fo:layout-master-set>
    <fo:simple-page-master master-name="page" page-width="595pt" page-height="842pt" margin="72pt">
      <fo:region-body/>
    </fo:simple-page-master>
  </fo:layout-master-set>
  <fo:page-sequence master-reference="page">
    <fo:flow flow-name="xsl-region-body">
      <fo:block>Hello</fo:block>
    </fo:flow>
  </fo:page-sequence>
</fo:root>"#;

    #[test]
    fn minimal_document_produces_one_page() {
        let tree = layout_xml(MINIMAL, &LayoutOptions::default()).unwrap();
        assert_eq!(tree.pages.len(), 1);
        assert_eq!(tree.pages[0].width, 595.0);
        assert_eq!(tree.pages[0].height, 842.0);
        assert!(!tree.pages[0].areas.is_empty());
    }

    #[test]
    fn layout_is_deterministic() {
        let opts = LayoutOptions::default();
        let a = layout_xml(MINIMAL, &opts).unwrap();
        let b = layout_xml(MINIMAL, &opts).unwrap();
        let ja = area::json::to_json_string(&a, area::json::DetailLevel::Full);
        let jb = area::json::to_json_string(&b, area::json::DetailLevel::Full);
        assert_eq!(ja, jb);
    }
}
