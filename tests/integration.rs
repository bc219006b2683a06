//! Integration tests for the full layout pipeline.
//!
//! These exercise the path from XSL-FO XML to the area tree. They verify:
//! - geometry of the simple single-block case
//! - justification arithmetic
//! - optimal line breaking with hyphenation
//! - proportional table columns
//! - keeps across page boundaries
//! - forced page counts
//! - the universal invariants (ordering, containment, determinism)

use folio::area::json::{to_json_string, DetailLevel};
use folio::area::{Area, AreaTree, PageViewport};
use folio::config::{LayoutOptions, LineBreaking};
use folio::services::{FontMetrics, FontSpec};

// ─── Helpers ────────────────────────────────────────────────────

/// Wrap flow content in a minimal document: A4-ish page, 1in margin.
fn doc(flow: &str) -> String {
    doc_with_page(595.0, 842.0, 72.0, flow, "")
}

fn doc_with_page(width: f64, height: f64, margin: f64, flow: &str, extra: &str) -> String {
    format!(
        r#"<fo:root xmlns:fo="http://www.w3.org/1999/XSL/Format">
  <fo:layout-master-set>
    <fo:simple-page-master master-name="page" page-width="{width}pt" page-height="{height}pt" margin="{margin}pt">
      <fo:region-body/>
      <fo:region-before extent="16pt"/>
      <fo:region-after extent="16pt"/>
    </fo:simple-page-master>
  </fo:layout-master-set>
  <fo:page-sequence master-reference="page"{extra}>
    <fo:flow flow-name="xsl-region-body">
{flow}
    </fo:flow>
  </fo:page-sequence>
</fo:root>"#
    )
}

fn layout(xml: &str) -> AreaTree {
    folio::layout_xml(xml, &LayoutOptions::default()).expect("layout should succeed")
}

fn layout_with(xml: &str, options: &LayoutOptions) -> AreaTree {
    folio::layout_xml(xml, options).expect("layout should succeed")
}

/// All inline text on a page, in area order.
fn page_texts(page: &PageViewport) -> Vec<String> {
    let mut out = Vec::new();
    for area in &page.areas {
        collect_texts(area, &mut out);
    }
    out
}

fn collect_texts(area: &Area, out: &mut Vec<String>) {
    match area {
        Area::Block(b) => {
            for c in &b.children {
                collect_texts(c, out);
            }
        }
        Area::Line(l) => {
            for inline in &l.inlines {
                out.push(inline.text.clone());
            }
        }
        Area::Inline(i) => out.push(i.text.clone()),
        Area::Table(t) => {
            for row in &t.rows {
                for cell in &row.cells {
                    for c in &cell.children {
                        collect_texts(c, out);
                    }
                }
            }
        }
        Area::Float(f) => {
            for c in &f.children {
                collect_texts(c, out);
            }
        }
        Area::Image(_) | Area::Leader(_) => {}
    }
}

fn first_block(page: &PageViewport) -> &folio::area::BlockArea {
    page.areas
        .iter()
        .find_map(|a| match a {
            Area::Block(b) => Some(b),
            _ => None,
        })
        .expect("page should have a block area")
}

fn lines_of<'a>(block: &'a folio::area::BlockArea) -> Vec<&'a folio::area::LineArea> {
    let mut out = Vec::new();
    fn walk<'a>(area: &'a Area, out: &mut Vec<&'a folio::area::LineArea>) {
        match area {
            Area::Line(l) => out.push(l),
            Area::Block(b) => {
                for c in &b.children {
                    walk(c, out);
                }
            }
            _ => {}
        }
    }
    for c in &block.children {
        walk(c, &mut out);
    }
    out
}

/// Lines across every block on the page, in order.
fn page_lines(page: &PageViewport) -> Vec<&folio::area::LineArea> {
    let mut out = Vec::new();
    for area in &page.areas {
        fn walk<'a>(area: &'a Area, out: &mut Vec<&'a folio::area::LineArea>) {
            match area {
                Area::Line(l) => out.push(l),
                Area::Block(b) => {
                    for c in &b.children {
                        walk(c, out);
                    }
                }
                _ => {}
            }
        }
        walk(area, &mut out);
    }
    out
}

// ─── S1: single block, single page ──────────────────────────────

#[test]
fn single_block_geometry() {
    let tree = layout(&doc(r#"<fo:block font-size="12pt">Hello</fo:block>"#));
    assert_eq!(tree.pages.len(), 1);
    let page = &tree.pages[0];
    assert_eq!(page.width, 595.0);
    assert_eq!(page.height, 842.0);

    let block = first_block(page);
    assert!((block.rect.x - 72.0).abs() < 1e-6, "block x = {}", block.rect.x);
    assert!((block.rect.y - 72.0).abs() < 1e-6, "block y = {}", block.rect.y);

    let lines = lines_of(block);
    assert_eq!(lines.len(), 1);
    assert!((lines[0].rect.height - 14.4).abs() < 1e-6, "line height = {}", lines[0].rect.height);

    assert_eq!(lines[0].inlines.len(), 1);
    let inline = &lines[0].inlines[0];
    assert_eq!(inline.text, "Hello");
    let catalog = folio::services::FontCatalog::new();
    let expected = catalog.measure_run(&FontSpec::default(), 12.0, "Hello");
    assert!(
        (inline.rect.width - expected).abs() < 1e-6,
        "inline width {} != measured {}",
        inline.rect.width,
        expected
    );
}

// ─── S2: justified paragraph, greedy ────────────────────────────

#[test]
fn justified_paragraph_fills_measure() {
    // Body width = 344 - 2*72 = 200pt.
    let xml = doc_with_page(
        344.0,
        842.0,
        72.0,
        r#"<fo:block font-size="12pt" text-align="justify">the quick brown fox jumps over the lazy dog</fo:block>"#,
        "",
    );
    let tree = layout(&xml);
    let lines = page_lines(&tree.pages[0]);
    assert!(lines.len() >= 2, "expected at least two lines, got {}", lines.len());

    for (i, line) in lines.iter().enumerate() {
        let is_last = i == lines.len() - 1;
        let widths: f64 = line.inlines.iter().map(|inl| inl.rect.width).sum();
        let deltas: f64 = line
            .inlines
            .iter()
            .map(|inl| inl.word_spacing * inl.text.matches(' ').count() as f64)
            .sum();
        if is_last {
            for inline in &line.inlines {
                assert_eq!(inline.word_spacing, 0.0, "last line must not be justified");
            }
        } else {
            assert!(
                (widths + deltas - 200.0).abs() < 0.01,
                "line {i}: widths {widths} + deltas {deltas} != 200"
            );
        }
    }
}

// ─── S3: Knuth-Plass with hyphenation ───────────────────────────

#[test]
fn optimal_breaking_with_hyphenation() {
    let text = "the extraordinary circumnavigation of the peninsula demonstrated \
                considerable understanding of international communication";
    let xml = doc_with_page(
        344.0,
        842.0,
        72.0,
        &format!(r#"<fo:block font-size="12pt" text-align="justify">{text}</fo:block>"#),
        "",
    );
    let options = LayoutOptions {
        line_breaking: LineBreaking::Optimal,
        enable_hyphenation: true,
        ..Default::default()
    };
    let a = layout_with(&xml, &options);
    let b = layout_with(&xml, &options);

    // Deterministic break set.
    assert_eq!(
        to_json_string(&a, DetailLevel::Full),
        to_json_string(&b, DetailLevel::Full)
    );

    let lines = page_lines(&a.pages[0]);
    assert!(lines.len() >= 2);

    // No two consecutive hyphenated line endings.
    let mut prev_hyphen = false;
    for line in &lines {
        let ends_hyphen = line
            .inlines
            .last()
            .map(|inl| inl.text.ends_with('-'))
            .unwrap_or(false);
        assert!(
            !(prev_hyphen && ends_hyphen),
            "two consecutive lines end in hyphens"
        );
        prev_hyphen = ends_hyphen;
    }
}

#[test]
fn optimal_matches_greedy_on_trivial_input() {
    let xml = doc(r#"<fo:block>short text</fo:block>"#);
    let greedy = layout_with(&xml, &LayoutOptions::default());
    let optimal = layout_with(
        &xml,
        &LayoutOptions { line_breaking: LineBreaking::Optimal, ..Default::default() },
    );
    assert_eq!(
        to_json_string(&greedy, DetailLevel::Geometry),
        to_json_string(&optimal, DetailLevel::Geometry)
    );
}

// ─── S4: proportional table columns ─────────────────────────────

#[test]
fn proportional_column_widths() {
    // Body width = 544 - 2*72 = 400pt.
    let xml = doc_with_page(
        544.0,
        842.0,
        72.0,
        r#"<fo:table>
             <fo:table-column column-width="100pt"/>
             <fo:table-column column-width="1*"/>
             <fo:table-column column-width="2*"/>
             <fo:table-body>
               <fo:table-row>
                 <fo:table-cell><fo:block>a</fo:block></fo:table-cell>
                 <fo:table-cell><fo:block>b</fo:block></fo:table-cell>
                 <fo:table-cell><fo:block>c</fo:block></fo:table-cell>
               </fo:table-row>
             </fo:table-body>
           </fo:table>"#,
        "",
    );
    let tree = layout(&xml);
    let table = tree.pages[0]
        .areas
        .iter()
        .find_map(|a| match a {
            Area::Table(t) => Some(t),
            _ => None,
        })
        .expect("table area");
    assert_eq!(table.column_widths.len(), 3);
    assert!((table.column_widths[0] - 100.0).abs() < 1e-6);
    assert!((table.column_widths[1] - 100.0).abs() < 1e-6);
    assert!((table.column_widths[2] - 200.0).abs() < 1e-6);
}

#[test]
fn separate_borders_account_for_spacing() {
    // Property: sum of column widths + (n+1) * border-spacing = table width
    // when widths are fully specified.
    let xml = doc_with_page(
        544.0,
        842.0,
        72.0,
        r#"<fo:table border-spacing="4pt">
             <fo:table-column column-width="150pt"/>
             <fo:table-column column-width="1*"/>
             <fo:table-body>
               <fo:table-row>
                 <fo:table-cell><fo:block>a</fo:block></fo:table-cell>
                 <fo:table-cell><fo:block>b</fo:block></fo:table-cell>
               </fo:table-row>
             </fo:table-body>
           </fo:table>"#,
        "",
    );
    let tree = layout(&xml);
    let table = tree.pages[0]
        .areas
        .iter()
        .find_map(|a| match a {
            Area::Table(t) => Some(t),
            _ => None,
        })
        .expect("table area");
    let total: f64 = table.column_widths.iter().sum::<f64>()
        + (table.column_widths.len() as f64 + 1.0) * table.border_spacing;
    assert!((total - 400.0).abs() < 1e-6, "columns + gaps = {total}");
}

#[test]
fn table_header_repeats_across_pages() {
    let mut rows = String::new();
    for i in 0..60 {
        rows.push_str(&format!(
            "<fo:table-row><fo:table-cell><fo:block>row {i}</fo:block></fo:table-cell></fo:table-row>"
        ));
    }
    let xml = doc_with_page(
        400.0,
        300.0,
        36.0,
        &format!(
            r#"<fo:table>
                 <fo:table-column column-width="1*"/>
                 <fo:table-header>
                   <fo:table-row><fo:table-cell><fo:block>HEAD</fo:block></fo:table-cell></fo:table-row>
                 </fo:table-header>
                 <fo:table-body>{rows}</fo:table-body>
               </fo:table>"#
        ),
        "",
    );
    let tree = layout(&xml);
    assert!(tree.pages.len() >= 2, "table should straddle pages");
    for page in &tree.pages {
        let texts = page_texts(page);
        if texts.is_empty() {
            continue;
        }
        assert_eq!(texts[0], "HEAD", "every fragment starts with the header");
    }
}

// ─── S5: keep-with-next across a page boundary ──────────────────

#[test]
fn keep_with_next_moves_pair_to_next_page() {
    // Body height = 300 - 72 = 228pt → 15 lines of 14.4pt fit.
    let mut flow = String::new();
    for i in 0..14 {
        flow.push_str(&format!("<fo:block>filler {i}</fo:block>"));
    }
    flow.push_str(r#"<fo:block keep-with-next="always">heading</fo:block>"#);
    flow.push_str(r#"<fo:block>body text</fo:block>"#);
    let xml = doc_with_page(400.0, 300.0, 36.0, &flow, "");
    let tree = layout(&xml);
    assert_eq!(tree.pages.len(), 2, "expected exactly two pages");

    let page1 = page_texts(&tree.pages[0]);
    let page2 = page_texts(&tree.pages[1]);
    assert!(
        !page1.iter().any(|t| t.contains("heading")),
        "heading must not stay at the bottom of page 1"
    );
    assert_eq!(page1.last().map(String::as_str), Some("filler 13"));
    assert!(page2.iter().any(|t| t.contains("heading")));
    assert!(page2.iter().any(|t| t.contains("body text")));
    let heading_pos = page2.iter().position(|t| t.contains("heading")).unwrap();
    let body_pos = page2.iter().position(|t| t.contains("body text")).unwrap();
    assert!(heading_pos < body_pos);
}

// ─── S6: force-page-count=even ──────────────────────────────────

#[test]
fn force_page_count_even_appends_blank_page() {
    // ~45 lines at 14.4pt into a 228pt body → 3 pages.
    let mut flow = String::new();
    for i in 0..45 {
        flow.push_str(&format!("<fo:block>line {i}</fo:block>"));
    }
    let xml = doc_with_page(400.0, 300.0, 36.0, &flow, r#" force-page-count="even""#);
    let tree = layout(&xml);
    assert_eq!(tree.pages.len() % 2, 0, "page count must be even");
    let last = tree.pages.last().unwrap();
    assert!(last.areas.is_empty(), "the padding page is blank");
    assert_eq!(last.page_number as usize, tree.pages.len());
}

// ─── Breaks ─────────────────────────────────────────────────────

#[test]
fn break_before_page_starts_new_page() {
    let flow = r#"<fo:block>first</fo:block>
                  <fo:block break-before="page">second</fo:block>"#;
    let tree = layout(&doc(flow));
    assert_eq!(tree.pages.len(), 2);
    assert!(page_texts(&tree.pages[0]).iter().any(|t| t == "first"));
    let page2 = &tree.pages[1];
    assert!(page_texts(page2).iter().any(|t| t == "second"));
    // The forced block's first area sits at the top of the body region.
    let block = first_block(page2);
    assert!((block.rect.y - 72.0).abs() < 1e-6, "block y = {}", block.rect.y);
}

#[test]
fn break_before_even_page_inserts_blank() {
    let flow = r#"<fo:block>first</fo:block>
                  <fo:block break-before="even-page">second</fo:block>"#;
    let tree = layout(&doc(flow));
    assert_eq!(tree.pages.len(), 2, "page 2 is even, no blank needed");
    let flow = r#"<fo:block>first</fo:block>
                  <fo:block break-before="odd-page">second</fo:block>"#;
    let tree = layout(&doc(flow));
    assert_eq!(tree.pages.len(), 3, "blank page 2, content on odd page 3");
    assert!(tree.pages[1].areas.is_empty());
}

// ─── Markers and static content ─────────────────────────────────

#[test]
fn page_numbers_in_static_content() {
    let mut flow = String::new();
    for i in 0..20 {
        flow.push_str(&format!("<fo:block>content {i}</fo:block>"));
    }
    let xml = format!(
        r#"<fo:root xmlns:fo="http://www.w3.org/1999/XSL/Format">
  <fo:layout-master-set>
    <fo:simple-page-master master-name="page" page-width="400pt" page-height="300pt" margin="36pt">
      <fo:region-body margin-top="20pt"/>
      <fo:region-before extent="16pt"/>
    </fo:simple-page-master>
  </fo:layout-master-set>
  <fo:page-sequence master-reference="page">
    <fo:static-content flow-name="xsl-region-before">
      <fo:block>Page <fo:page-number/></fo:block>
    </fo:static-content>
    <fo:flow flow-name="xsl-region-body">{flow}</fo:flow>
  </fo:page-sequence>
</fo:root>"#
    );
    let tree = layout(&xml);
    assert!(tree.pages.len() >= 2);
    for (i, page) in tree.pages.iter().enumerate() {
        let texts = page_texts(page);
        let expected = format!("{}", i + 1);
        assert!(
            texts.iter().any(|t| t.contains(&expected)),
            "page {} header should carry its number; texts = {:?}",
            i + 1,
            texts
        );
    }
}

#[test]
fn retrieve_marker_tracks_page_content() {
    let xml = format!(
        r#"<fo:root xmlns:fo="http://www.w3.org/1999/XSL/Format">
  <fo:layout-master-set>
    <fo:simple-page-master master-name="page" page-width="400pt" page-height="300pt" margin="36pt">
      <fo:region-body margin-top="20pt"/>
      <fo:region-before extent="16pt"/>
    </fo:simple-page-master>
  </fo:layout-master-set>
  <fo:page-sequence master-reference="page">
    <fo:static-content flow-name="xsl-region-before">
      <fo:block><fo:retrieve-marker retrieve-class-name="chapter"
        retrieve-position="last-starting-within-page"/></fo:block>
    </fo:static-content>
    <fo:flow flow-name="xsl-region-body">
      <fo:block><fo:marker marker-class-name="chapter">Alpha</fo:marker>Alpha starts</fo:block>
      {filler}
      <fo:block><fo:marker marker-class-name="chapter">Beta</fo:marker>Beta starts</fo:block>
      <fo:block>tail</fo:block>
    </fo:flow>
  </fo:page-sequence>
</fo:root>"#,
        filler = "<fo:block>filler</fo:block>".repeat(16)
    );
    let tree = layout(&xml);
    assert!(tree.pages.len() >= 2, "need a page break between the chapters");
    // Page 1 header names Alpha (the last marker starting on page 1).
    let texts1 = page_texts(&tree.pages[0]);
    assert!(texts1.iter().any(|t| t.contains("Alpha")), "page 1 texts: {texts1:?}");
    assert!(!texts1.iter().any(|t| t == "Beta"));
    // The page where Beta lands shows Beta in its header.
    let beta_page = tree
        .pages
        .iter()
        .find(|p| page_texts(p).iter().any(|t| t.contains("Beta starts")))
        .expect("Beta block must land somewhere");
    assert!(page_texts(beta_page).iter().any(|t| t == "Beta"));
}

// ─── Footnotes ──────────────────────────────────────────────────

#[test]
fn footnote_body_lands_at_page_bottom() {
    let xml = doc(
        r#"<fo:block>body text<fo:footnote>
             <fo:inline>*</fo:inline>
             <fo:footnote-body><fo:block>the note</fo:block></fo:footnote-body>
           </fo:footnote> continues</fo:block>"#,
    );
    let tree = layout(&xml);
    let page = &tree.pages[0];
    let texts = page_texts(page);
    assert!(texts.iter().any(|t| t.contains('*')), "citation in flow: {texts:?}");
    assert!(texts.iter().any(|t| t.contains("the note")));

    // The note body sits near the bottom of the body region (bottom = 770).
    let mut note_y = None;
    for area in &page.areas {
        let mut lines = Vec::new();
        fn walk<'a>(area: &'a Area, out: &mut Vec<&'a folio::area::LineArea>) {
            match area {
                Area::Line(l) => out.push(l),
                Area::Block(b) => {
                    for c in &b.children {
                        walk(c, out);
                    }
                }
                _ => {}
            }
        }
        walk(area, &mut lines);
        for line in lines {
            if line.inlines.iter().any(|i| i.text.contains("the note")) {
                note_y = Some(line.rect.y);
            }
        }
    }
    let note_y = note_y.expect("note line present");
    assert!(note_y > 700.0, "footnote should be near the page bottom, y = {note_y}");
}

// ─── Floats ─────────────────────────────────────────────────────

#[test]
fn before_float_displaces_flow() {
    let xml = doc(
        r#"<fo:float float="before"><fo:block>floating note</fo:block></fo:float>
           <fo:block>main content</fo:block>"#,
    );
    let tree = layout(&xml);
    let page = &tree.pages[0];
    let float = page
        .areas
        .iter()
        .find_map(|a| match a {
            Area::Float(f) => Some(f),
            _ => None,
        })
        .expect("float area on page 1");
    assert!((float.rect.y - 72.0).abs() < 1e-6);
    // Flow content starts below the float.
    let block = first_block(page);
    assert!(
        block.rect.y >= float.rect.bottom() - 1e-6,
        "flow (y={}) must clear the float (bottom={})",
        block.rect.y,
        float.rect.bottom()
    );
}

// ─── Links and citations ────────────────────────────────────────

#[test]
fn basic_link_produces_link_area_and_citation_resolves() {
    let xml = doc(
        r#"<fo:block id="target">the target</fo:block>
           <fo:block>see <fo:basic-link internal-destination="target">here</fo:basic-link>
             on page <fo:page-number-citation ref-id="target"/></fo:block>"#,
    );
    let tree = layout(&xml);
    let page = &tree.pages[0];
    assert!(
        !page.links.is_empty(),
        "basic-link should produce a link area"
    );
    let texts = page_texts(page);
    assert!(
        texts.iter().any(|t| t.contains('1')),
        "citation should resolve to page 1: {texts:?}"
    );
}

// ─── Universal invariants ───────────────────────────────────────

#[test]
fn sibling_blocks_do_not_overlap() {
    let mut flow = String::new();
    for i in 0..30 {
        flow.push_str(&format!(
            "<fo:block space-before=\"3pt\">paragraph number {i} with some text</fo:block>"
        ));
    }
    let tree = layout(&doc(&flow));
    for page in &tree.pages {
        let blocks: Vec<_> = page
            .areas
            .iter()
            .filter_map(|a| match a {
                Area::Block(b) => Some(b),
                _ => None,
            })
            .collect();
        for pair in blocks.windows(2) {
            assert!(
                pair[0].rect.bottom() <= pair[1].rect.y + 1e-6,
                "blocks overlap: {:?} then {:?}",
                pair[0].rect,
                pair[1].rect
            );
        }
    }
}

#[test]
fn children_contained_in_parents() {
    let tree = layout(&doc(
        r##"<fo:block padding="6pt" border="1pt solid black" background-color="#eeeeee">
             contained content with several words to wrap across lines when the
             measure gets narrow enough for multiple line areas
           </fo:block>"##,
    ));
    fn check(area: &Area) {
        if let Area::Block(b) = area {
            for child in &b.children {
                let c = child.rect();
                assert!(c.x >= b.rect.x - 1e-6, "child left escapes parent");
                assert!(c.right() <= b.rect.right() + 1e-6, "child right escapes parent");
                assert!(c.y >= b.rect.y - 1e-6, "child top escapes parent");
                assert!(c.bottom() <= b.rect.bottom() + 1e-6, "child bottom escapes parent");
                check(child);
            }
        }
    }
    for page in &tree.pages {
        for area in &page.areas {
            check(area);
        }
    }
}

#[test]
fn determinism_byte_identical_serialization() {
    let xml = doc_with_page(
        400.0,
        300.0,
        36.0,
        &(0..25)
            .map(|i| format!("<fo:block>deterministic content {i}</fo:block>"))
            .collect::<String>(),
        "",
    );
    let opts = LayoutOptions::default();
    let a = to_json_string(&layout_with(&xml, &opts), DetailLevel::Full);
    let b = to_json_string(&layout_with(&xml, &opts), DetailLevel::Full);
    assert_eq!(a, b);
}

#[test]
fn reordering_independent_blocks_reorders_areas() {
    let ab = layout(&doc(
        "<fo:block>alpha text</fo:block><fo:block>beta text</fo:block>",
    ));
    let ba = layout(&doc(
        "<fo:block>beta text</fo:block><fo:block>alpha text</fo:block>",
    ));
    let texts_ab = page_texts(&ab.pages[0]);
    let texts_ba = page_texts(&ba.pages[0]);
    assert_eq!(texts_ab, vec!["alpha text", "beta text"]);
    assert_eq!(texts_ba, vec!["beta text", "alpha text"]);
    // Same geometry, swapped occupants.
    let blocks_ab: Vec<_> = ab.pages[0]
        .areas
        .iter()
        .filter_map(|a| match a {
            Area::Block(b) => Some(b.rect),
            _ => None,
        })
        .collect();
    let blocks_ba: Vec<_> = ba.pages[0]
        .areas
        .iter()
        .filter_map(|a| match a {
            Area::Block(b) => Some(b.rect),
            _ => None,
        })
        .collect();
    assert_eq!(blocks_ab.len(), 2);
    assert_eq!(blocks_ab[0].y, blocks_ba[0].y);
    assert_eq!(blocks_ab[1].y, blocks_ba[1].y);
}

#[test]
fn pagination_loses_nothing() {
    let count = 40;
    let flow: String = (0..count)
        .map(|i| format!("<fo:block>unit {i}</fo:block>"))
        .collect();
    let tree = layout(&doc_with_page(400.0, 300.0, 36.0, &flow, ""));
    let mut all: Vec<String> = Vec::new();
    for page in &tree.pages {
        all.extend(page_texts(page));
    }
    assert_eq!(all.len(), count, "every block appears exactly once: {all:?}");
    for i in 0..count {
        assert_eq!(all[i], format!("unit {i}"));
    }
}

// ─── Error handling ─────────────────────────────────────────────

#[test]
fn unknown_property_is_diagnostic_not_fatal() {
    let xml = doc(r#"<fo:block nonsense-property="12">still works</fo:block>"#);
    let (tree, diagnostics) =
        folio::layout_xml_with_diagnostics(&xml, &LayoutOptions::default()).unwrap();
    assert_eq!(tree.pages.len(), 1);
    assert!(diagnostics.iter().any(|d| d.code == "unknown-property"));
}

#[test]
fn missing_master_is_invalid_document() {
    let xml = r#"<fo:root xmlns:fo="http://www.w3.org/1999/XSL/Format">
      <fo:layout-master-set>
        <fo:simple-page-master master-name="a"><fo:region-body/></fo:simple-page-master>
      </fo:layout-master-set>
      <fo:page-sequence master-reference="missing">
        <fo:flow flow-name="xsl-region-body"><fo:block>x</fo:block></fo:flow>
      </fo:page-sequence>
    </fo:root>"#;
    let err = folio::layout_xml(xml, &LayoutOptions::default()).unwrap_err();
    assert!(matches!(err, folio::LayoutError::InvalidDocument(_)));
}

#[test]
fn max_pages_guard_trips() {
    let flow: String = (0..80)
        .map(|i| format!("<fo:block>line {i}</fo:block>"))
        .collect();
    let xml = doc_with_page(400.0, 300.0, 36.0, &flow, "");
    let options = LayoutOptions { max_pages: 2, ..Default::default() };
    let err = folio::layout_xml(&xml, &options).unwrap_err();
    assert!(matches!(
        err,
        folio::LayoutError::LimitExceeded { guard: "max-pages", .. }
    ));
}

#[test]
fn strict_hyphenation_without_patterns_is_service_error() {
    let xml = doc(r#"<fo:block language="zz">unhyphenatable</fo:block>"#);
    let options = LayoutOptions {
        enable_hyphenation: true,
        strict_layout: true,
        ..Default::default()
    };
    let err = folio::layout_xml(&xml, &options).unwrap_err();
    assert!(matches!(err, folio::LayoutError::ServiceUnavailable(_)));
}

#[test]
fn nonstrict_hyphenation_without_patterns_degrades() {
    let xml = doc(r#"<fo:block language="zz">unhyphenatable words flow on</fo:block>"#);
    let options = LayoutOptions {
        enable_hyphenation: true,
        strict_layout: false,
        ..Default::default()
    };
    let tree = folio::layout_xml(&xml, &options).unwrap();
    assert_eq!(tree.pages.len(), 1);
}
