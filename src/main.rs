//! # Folio CLI
//!
//! Usage:
//!   folio input.fo -o areas.json
//!   cat input.fo | folio -o areas.json
//!   folio --example > sample.fo
//!   folio input.fo --detail full

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use folio::area::json::{to_json, DetailLevel};
use folio::LayoutOptions;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_document());
        return;
    }

    let input = if args.len() > 1 && !args[1].starts_with('-') {
        match fs::read_to_string(&args[1]) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("failed to read {}: {e}", args[1]);
                process::exit(1);
            }
        }
    } else {
        let mut buf = String::new();
        if io::stdin().read_to_string(&mut buf).is_err() {
            eprintln!("failed to read stdin");
            process::exit(1);
        }
        buf
    };

    let output_path = args
        .windows(2)
        .find(|w| w[0] == "-o")
        .map(|w| w[1].clone());

    let detail = args
        .windows(2)
        .find(|w| w[0] == "--detail")
        .map(|w| w[1].as_str().to_string())
        .unwrap_or_else(|| "spacing".to_string());
    let detail = match detail.as_str() {
        "geometry" => DetailLevel::Geometry,
        "spacing" => DetailLevel::Spacing,
        "full" => DetailLevel::Full,
        other => {
            eprintln!("unknown detail level '{other}' (use geometry|spacing|full)");
            process::exit(1);
        }
    };

    let options = LayoutOptions::default();
    match folio::layout_xml_with_diagnostics(&input, &options) {
        Ok((tree, diagnostics)) => {
            for d in &diagnostics {
                eprintln!("[{:?}] {}: {}", d.severity, d.code, d.message);
            }
            let json = serde_json::to_string_pretty(&to_json(&tree, detail))
                .expect("area-tree JSON is always serializable");
            match output_path {
                Some(path) => {
                    if let Err(e) = fs::write(&path, &json) {
                        eprintln!("failed to write {path}: {e}");
                        process::exit(1);
                    }
                    eprintln!("wrote {} pages to {path}", tree.pages.len());
                }
                None => println!("{json}"),
            }
        }
        Err(e) => {
            eprintln!("layout failed: {e}");
            process::exit(1);
        }
    }
}

fn example_document() -> &'static str {
    r##"<?xml version="1.0" encoding="UTF-8"?>
<fo:root xmlns:fo="http://www.w3.org/1999/XSL/Format">
  <fo:layout-master-set>
    <fo:simple-page-master master-name="body" page-width="595pt" page-height="842pt" margin="54pt">
      <fo:region-body region-name="xsl-region-body" margin-top="24pt"/>
      <fo:region-before extent="18pt"/>
      <fo:region-after extent="18pt"/>
    </fo:simple-page-master>
  </fo:layout-master-set>
  <fo:page-sequence master-reference="body">
    <fo:static-content flow-name="xsl-region-before">
      <fo:block font-size="9pt" text-align="end">
        <fo:retrieve-marker retrieve-class-name="chapter"/>
      </fo:block>
    </fo:static-content>
    <fo:static-content flow-name="xsl-region-after">
      <fo:block font-size="9pt" text-align="center">Page <fo:page-number/></fo:block>
    </fo:static-content>
    <fo:flow flow-name="xsl-region-body">
      <fo:block font-size="24pt" font-weight="bold" space-after="12pt" keep-with-next="always" id="intro">
        <fo:marker marker-class-name="chapter">Introduction</fo:marker>
        Introduction
      </fo:block>
      <fo:block font-size="11pt" line-height="1.4" text-align="justify" space-after="8pt">
        The quick brown fox jumps over the lazy dog. The five boxing wizards
        jump quickly. Pack my box with five dozen liquor jugs.
      </fo:block>
      <fo:table border-collapse="separate" border-spacing="2pt" space-after="8pt">
        <fo:table-column column-width="120pt"/>
        <fo:table-column column-width="1*"/>
        <fo:table-header>
          <fo:table-row>
            <fo:table-cell background-color="#eeeeee" padding="4pt">
              <fo:block font-weight="bold">Item</fo:block>
            </fo:table-cell>
            <fo:table-cell background-color="#eeeeee" padding="4pt">
              <fo:block font-weight="bold">Description</fo:block>
            </fo:table-cell>
          </fo:table-row>
        </fo:table-header>
        <fo:table-body>
          <fo:table-row>
            <fo:table-cell padding="4pt" border="0.5pt solid #999999">
              <fo:block>Layout</fo:block>
            </fo:table-cell>
            <fo:table-cell padding="4pt" border="0.5pt solid #999999">
              <fo:block>Pages, flows, blocks, inlines, tables, graphics.</fo:block>
            </fo:table-cell>
          </fo:table-row>
        </fo:table-body>
      </fo:table>
      <fo:block font-size="11pt">
        See <fo:basic-link internal-destination="intro" color="blue"
        text-decoration="underline">the introduction</fo:basic-link> on page
        <fo:page-number-citation ref-id="intro"/>.
      </fo:block>
    </fo:flow>
  </fo:page-sequence>
</fo:root>
"##
}
