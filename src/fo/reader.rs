//! XML → FO tree input adapter.
//!
//! A thin pull-parse over `quick-xml`. The layout core's real input is the
//! [`FoTree`]; this adapter exists so a document can be fed straight from
//! disk. Elements outside the supported vocabulary are skipped (subtree and
//! all) with a diagnostic, per the contract for unknown FO-namespace
//! elements.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{FoElement, FoTree, NodeId};
use crate::diagnostics::DiagnosticSink;
use crate::error::LayoutError;

/// The XSL-FO namespace.
pub const FO_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Format";

/// Parse an XSL-FO document into an FO tree.
pub fn parse(xml: &str, sink: &mut DiagnosticSink) -> Result<FoTree, LayoutError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut tree = FoTree::new();
    let mut stack: Vec<NodeId> = Vec::new();
    // Depth counter while inside a skipped (unknown) element.
    let mut skipping = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                if skipping > 0 {
                    skipping += 1;
                    continue;
                }
                let name = local_name(start.name().as_ref());
                match FoElement::from_local_name(&name) {
                    Some(element) => {
                        if stack.is_empty() && element != FoElement::Root {
                            return Err(LayoutError::InvalidDocument(format!(
                                "document element must be fo:root, found fo:{name}"
                            )));
                        }
                        let id = tree.push(element, stack.last().copied());
                        for attr in start.attributes().with_checks(false).flatten() {
                            let key = local_name(attr.key.as_ref());
                            if key == "xmlns" || key.starts_with("xmlns:") {
                                continue;
                            }
                            let value = attr
                                .unescape_value()
                                .map(|v| v.into_owned())
                                .unwrap_or_else(|_| {
                                    String::from_utf8_lossy(&attr.value).into_owned()
                                });
                            tree.set_attribute(id, key, value);
                        }
                        stack.push(id);
                    }
                    None => {
                        sink.info("skipped-element", format!("skipping unknown element '{name}'"));
                        skipping = 1;
                    }
                }
            }
            Event::Empty(start) => {
                if skipping > 0 {
                    continue;
                }
                let name = local_name(start.name().as_ref());
                match FoElement::from_local_name(&name) {
                    Some(element) => {
                        let id = tree.push(element, stack.last().copied());
                        for attr in start.attributes().with_checks(false).flatten() {
                            let key = local_name(attr.key.as_ref());
                            if key == "xmlns" || key.starts_with("xmlns:") {
                                continue;
                            }
                            let value = attr
                                .unescape_value()
                                .map(|v| v.into_owned())
                                .unwrap_or_else(|_| {
                                    String::from_utf8_lossy(&attr.value).into_owned()
                                });
                            tree.set_attribute(id, key, value);
                        }
                    }
                    None => {
                        sink.info("skipped-element", format!("skipping unknown element '{name}'"));
                    }
                }
            }
            Event::End(_) => {
                if skipping > 0 {
                    skipping -= 1;
                    continue;
                }
                stack.pop();
            }
            Event::Text(t) => {
                if skipping > 0 {
                    continue;
                }
                if let Some(&parent) = stack.last() {
                    let text = t.unescape().map(|v| v.into_owned()).unwrap_or_default();
                    if !text.is_empty() {
                        tree.push_text(parent, text);
                    }
                }
            }
            Event::CData(t) => {
                if skipping > 0 {
                    continue;
                }
                if let Some(&parent) = stack.last() {
                    let text = String::from_utf8_lossy(&t).into_owned();
                    if !text.is_empty() {
                        tree.push_text(parent, text);
                    }
                }
            }
            Event::Eof => break,
            // Comments, PIs, doctype: nothing to keep.
            _ => {}
        }
        buf.clear();
    }

    if tree.is_empty() {
        return Err(LayoutError::InvalidDocument("empty document: no fo:root found".into()));
    }
    Ok(tree)
}

/// Strip any namespace prefix from a qualified name.
fn local_name(qname: &[u8]) -> String {
    let s = String::from_utf8_lossy(qname);
    match s.rfind(':') {
        Some(pos) => s[pos + 1..].to_string(),
        None => s.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<fo:root xmlns:fo="http://www.w3.org/1999/XSL/Format">
  <fo:layout-master-set>
    <fo:simple-page-master master-name="page" page-width="595pt" page-height="842pt">
      <fo:region-body/>
    </fo:simple-page-master>
  </fo:layout-master-set>
  <fo:page-sequence master-reference="page">
    <fo:flow flow-name="xsl-region-body">
      <fo:block font-size="12pt">Hello</fo:block>
    </fo:flow>
  </fo:page-sequence>
</fo:root>"#;

    #[test]
    fn parses_minimal_document() {
        let mut sink = DiagnosticSink::new();
        let tree = parse(MINIMAL, &mut sink).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).element, FoElement::Root);
        let seq = tree.find_child(root, FoElement::PageSequence).unwrap();
        assert_eq!(tree.attr(seq, "master-reference"), Some("page"));
        let flow = tree.find_child(seq, FoElement::Flow).unwrap();
        let block = tree.find_child(flow, FoElement::Block).unwrap();
        assert_eq!(tree.attr(block, "font-size"), Some("12pt"));
        assert_eq!(tree.text_content(block), "Hello");
    }

    #[test]
    fn unknown_elements_are_skipped_with_diagnostic() {
        let xml = r#"<fo:root xmlns:fo="http://www.w3.org/1999/XSL/Format">
          <fo:wrapper><fo:block>inside unknown</fo:block></fo:wrapper>
          <fo:page-sequence master-reference="p"/>
        </fo:root>"#;
        let mut sink = DiagnosticSink::new();
        let tree = parse(xml, &mut sink).unwrap();
        assert!(sink.has("skipped-element"));
        // The block inside the unknown wrapper is gone with its parent.
        let root = tree.root().unwrap();
        assert!(tree.find_child(root, FoElement::Block).is_none());
        assert!(tree.find_child(root, FoElement::PageSequence).is_some());
    }

    #[test]
    fn non_root_document_element_is_fatal() {
        let mut sink = DiagnosticSink::new();
        let err = parse("<fo:block xmlns:fo=\"x\">text</fo:block>", &mut sink).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidDocument(_)));
    }

    #[test]
    fn empty_input_is_fatal() {
        let mut sink = DiagnosticSink::new();
        assert!(parse("", &mut sink).is_err());
    }
}
