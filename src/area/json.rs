//! Debug serialization of the area tree.
//!
//! The JSON form is the regression-test oracle: coordinates round to two
//! decimals and map keys serialize in sorted order, so identical layouts
//! produce byte-identical output. Three depth filters trade completeness for
//! noise in diffs.

use serde_json::{json, Map, Value};

use super::{
    AbsoluteArea, Area, AreaTree, BlockArea, Border, BorderSet, Color, Edges, InlineArea,
    LineArea, PageViewport, TableArea, TableCellArea,
};

/// How much detail the export carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    /// Rectangles and text only.
    Geometry,
    /// Adds spacing: margins, padding, space-before/after, word spacing,
    /// baselines.
    #[default]
    Spacing,
    /// Everything, including fonts, colors, and borders.
    Full,
}

/// Round to two decimals, normalizing negative zero.
fn round2(v: f64) -> f64 {
    let r = (v * 100.0).round() / 100.0;
    if r == 0.0 { 0.0 } else { r }
}

/// Serialize the tree at the given detail level.
pub fn to_json(tree: &AreaTree, detail: DetailLevel) -> Value {
    json!({
        "pages": tree.pages.iter().map(|p| page_json(p, detail)).collect::<Vec<_>>(),
    })
}

/// The canonical string form: compact, sorted keys, stable across runs.
pub fn to_json_string(tree: &AreaTree, detail: DetailLevel) -> String {
    to_json(tree, detail).to_string()
}

fn page_json(page: &PageViewport, detail: DetailLevel) -> Value {
    let mut obj = Map::new();
    obj.insert("pageNumber".into(), json!(page.page_number));
    obj.insert("width".into(), json!(round2(page.width)));
    obj.insert("height".into(), json!(round2(page.height)));
    obj.insert(
        "areas".into(),
        Value::Array(page.areas.iter().map(|a| area_json(a, detail)).collect()),
    );
    if !page.absolute_areas.is_empty() {
        obj.insert(
            "absoluteAreas".into(),
            Value::Array(page.absolute_areas.iter().map(|a| absolute_json(a, detail)).collect()),
        );
    }
    if !page.links.is_empty() && detail != DetailLevel::Geometry {
        obj.insert(
            "links".into(),
            Value::Array(
                page.links
                    .iter()
                    .map(|l| {
                        json!({
                            "rect": rect_json(&l.rect),
                            "target": serde_json::to_value(&l.target).unwrap_or(Value::Null),
                        })
                    })
                    .collect(),
            ),
        );
    }
    Value::Object(obj)
}

fn rect_json(rect: &super::Rect) -> Value {
    json!({
        "x": round2(rect.x),
        "y": round2(rect.y),
        "width": round2(rect.width),
        "height": round2(rect.height),
    })
}

fn edges_json(edges: &Edges) -> Value {
    json!({
        "top": round2(edges.top),
        "right": round2(edges.right),
        "bottom": round2(edges.bottom),
        "left": round2(edges.left),
    })
}

fn color_json(color: &Color) -> Value {
    json!({
        "r": round2(color.r),
        "g": round2(color.g),
        "b": round2(color.b),
        "a": round2(color.a),
    })
}

fn border_json(border: &Border) -> Value {
    json!({
        "width": round2(border.width),
        "style": serde_json::to_value(border.style).unwrap_or(Value::Null),
        "color": color_json(&border.color),
    })
}

fn borders_json(borders: &BorderSet) -> Value {
    json!({
        "top": border_json(&borders.top),
        "right": border_json(&borders.right),
        "bottom": border_json(&borders.bottom),
        "left": border_json(&borders.left),
    })
}

fn area_json(area: &Area, detail: DetailLevel) -> Value {
    match area {
        Area::Block(block) => block_json(block, detail),
        Area::Line(line) => line_json(line, detail),
        Area::Inline(inline) => inline_json(inline, detail),
        Area::Table(table) => table_json(table, detail),
        Area::Image(image) => {
            let mut obj = Map::new();
            obj.insert("kind".into(), json!("image"));
            obj.insert("rect".into(), rect_json(&image.rect));
            if detail == DetailLevel::Full {
                obj.insert("src".into(), json!(image.src));
                obj.insert("intrinsicWidth".into(), json!(round2(image.intrinsic_width)));
                obj.insert("intrinsicHeight".into(), json!(round2(image.intrinsic_height)));
            }
            Value::Object(obj)
        }
        Area::Float(float) => {
            let mut obj = Map::new();
            obj.insert("kind".into(), json!("float"));
            obj.insert("rect".into(), rect_json(&float.rect));
            obj.insert("side".into(), serde_json::to_value(float.side).unwrap_or(Value::Null));
            obj.insert(
                "children".into(),
                Value::Array(float.children.iter().map(|c| area_json(c, detail)).collect()),
            );
            Value::Object(obj)
        }
        Area::Leader(leader) => {
            let mut obj = Map::new();
            obj.insert("kind".into(), json!("leader"));
            obj.insert("rect".into(), rect_json(&leader.rect));
            if detail == DetailLevel::Full {
                obj.insert(
                    "pattern".into(),
                    serde_json::to_value(leader.pattern).unwrap_or(Value::Null),
                );
            }
            Value::Object(obj)
        }
    }
}

fn block_json(block: &BlockArea, detail: DetailLevel) -> Value {
    let mut obj = Map::new();
    obj.insert("kind".into(), json!("block"));
    obj.insert("rect".into(), rect_json(&block.rect));
    if detail != DetailLevel::Geometry {
        obj.insert("margin".into(), edges_json(&block.margin));
        obj.insert("padding".into(), edges_json(&block.padding));
        obj.insert("spaceBefore".into(), json!(round2(block.space_before)));
        obj.insert("spaceAfter".into(), json!(round2(block.space_after)));
    }
    if detail == DetailLevel::Full {
        obj.insert("borders".into(), borders_json(&block.borders));
        if let Some(bg) = &block.background {
            obj.insert("background".into(), color_json(bg));
        }
    }
    obj.insert(
        "children".into(),
        Value::Array(block.children.iter().map(|c| area_json(c, detail)).collect()),
    );
    Value::Object(obj)
}

fn line_json(line: &LineArea, detail: DetailLevel) -> Value {
    let mut obj = Map::new();
    obj.insert("kind".into(), json!("line"));
    obj.insert("rect".into(), rect_json(&line.rect));
    if detail != DetailLevel::Geometry {
        obj.insert("baseline".into(), json!(round2(line.baseline)));
    }
    obj.insert(
        "inlines".into(),
        Value::Array(line.inlines.iter().map(|i| inline_json(i, detail)).collect()),
    );
    Value::Object(obj)
}

fn inline_json(inline: &InlineArea, detail: DetailLevel) -> Value {
    let mut obj = Map::new();
    obj.insert("kind".into(), json!("inline"));
    obj.insert("rect".into(), rect_json(&inline.rect));
    obj.insert("text".into(), json!(inline.text));
    if detail != DetailLevel::Geometry {
        obj.insert("wordSpacing".into(), json!(round2(inline.word_spacing)));
        if inline.baseline_offset != 0.0 {
            obj.insert("baselineOffset".into(), json!(round2(inline.baseline_offset)));
        }
    }
    if detail == DetailLevel::Full {
        obj.insert("fontFamily".into(), json!(inline.font.family));
        obj.insert("fontWeight".into(), json!(inline.font.weight));
        obj.insert("fontItalic".into(), json!(inline.font.italic));
        obj.insert("fontSize".into(), json!(round2(inline.font_size)));
        obj.insert("color".into(), color_json(&inline.color));
        if let Some(dec) = inline.decoration {
            obj.insert("decoration".into(), serde_json::to_value(dec).unwrap_or(Value::Null));
        }
        if let Some(bg) = &inline.background {
            obj.insert("background".into(), color_json(bg));
        }
    }
    Value::Object(obj)
}

fn table_json(table: &TableArea, detail: DetailLevel) -> Value {
    let mut obj = Map::new();
    obj.insert("kind".into(), json!("table"));
    obj.insert("rect".into(), rect_json(&table.rect));
    obj.insert(
        "columnWidths".into(),
        Value::Array(table.column_widths.iter().map(|w| json!(round2(*w))).collect()),
    );
    if detail != DetailLevel::Geometry {
        obj.insert("borderCollapse".into(), json!(table.border_collapse));
        obj.insert("borderSpacing".into(), json!(round2(table.border_spacing)));
    }
    obj.insert(
        "rows".into(),
        Value::Array(
            table
                .rows
                .iter()
                .map(|row| {
                    let mut r = Map::new();
                    r.insert("rect".into(), rect_json(&row.rect));
                    if row.repeated {
                        r.insert("repeated".into(), json!(true));
                    }
                    r.insert(
                        "cells".into(),
                        Value::Array(row.cells.iter().map(|c| cell_json(c, detail)).collect()),
                    );
                    Value::Object(r)
                })
                .collect(),
        ),
    );
    Value::Object(obj)
}

fn cell_json(cell: &TableCellArea, detail: DetailLevel) -> Value {
    let mut obj = Map::new();
    obj.insert("rect".into(), rect_json(&cell.rect));
    obj.insert("columnIndex".into(), json!(cell.column_index));
    if cell.col_span > 1 {
        obj.insert("colSpan".into(), json!(cell.col_span));
    }
    if cell.row_span > 1 {
        obj.insert("rowSpan".into(), json!(cell.row_span));
    }
    if detail != DetailLevel::Geometry {
        obj.insert("padding".into(), edges_json(&cell.padding));
        obj.insert(
            "verticalAlign".into(),
            serde_json::to_value(cell.vertical_align).unwrap_or(Value::Null),
        );
    }
    if detail == DetailLevel::Full {
        obj.insert("borders".into(), borders_json(&cell.borders));
        if let Some(bg) = &cell.background {
            obj.insert("background".into(), color_json(bg));
        }
    }
    obj.insert(
        "children".into(),
        Value::Array(cell.children.iter().map(|c| area_json(c, detail)).collect()),
    );
    Value::Object(obj)
}

fn absolute_json(area: &AbsoluteArea, detail: DetailLevel) -> Value {
    let mut obj = Map::new();
    obj.insert("kind".into(), json!("absolute"));
    obj.insert("rect".into(), rect_json(&area.rect));
    obj.insert("position".into(), serde_json::to_value(area.position).unwrap_or(Value::Null));
    obj.insert("zIndex".into(), json!(area.z_index));
    obj.insert(
        "children".into(),
        Value::Array(area.children.iter().map(|c| area_json(c, detail)).collect()),
    );
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Rect;
    use crate::services::FontSpec;

    fn tiny_tree() -> AreaTree {
        AreaTree {
            pages: vec![PageViewport {
                page_number: 1,
                width: 595.0,
                height: 842.0,
                areas: vec![Area::Line(LineArea {
                    rect: Rect::new(72.0, 72.004, 100.12345, 14.4),
                    baseline: 82.266,
                    inlines: vec![InlineArea {
                        rect: Rect::new(72.0, 73.65, 28.67, 11.1),
                        text: "Hi".into(),
                        font: FontSpec::default(),
                        font_size: 12.0,
                        color: Color::BLACK,
                        decoration: None,
                        word_spacing: 0.0,
                        baseline_offset: 0.0,
                        background: None,
                    }],
                })],
                absolute_areas: vec![],
                links: vec![],
            }],
            bookmarks: vec![],
        }
    }

    #[test]
    fn coordinates_round_to_two_decimals() {
        let value = to_json(&tiny_tree(), DetailLevel::Geometry);
        let line = &value["pages"][0]["areas"][0];
        assert_eq!(line["rect"]["y"], json!(72.0));
        assert_eq!(line["rect"]["width"], json!(100.12));
    }

    #[test]
    fn geometry_level_omits_spacing() {
        let value = to_json(&tiny_tree(), DetailLevel::Geometry);
        let line = &value["pages"][0]["areas"][0];
        assert!(line.get("baseline").is_none());
        let inline = &line["inlines"][0];
        assert!(inline.get("wordSpacing").is_none());
        assert!(inline.get("fontFamily").is_none());
    }

    #[test]
    fn full_level_carries_fonts() {
        let value = to_json(&tiny_tree(), DetailLevel::Full);
        let inline = &value["pages"][0]["areas"][0]["inlines"][0];
        assert_eq!(inline["fontFamily"], json!("Helvetica"));
        assert_eq!(inline["fontSize"], json!(12.0));
    }

    #[test]
    fn serialization_is_byte_stable() {
        let a = to_json_string(&tiny_tree(), DetailLevel::Full);
        let b = to_json_string(&tiny_tree(), DetailLevel::Full);
        assert_eq!(a, b);
    }

    #[test]
    fn negative_zero_is_normalized() {
        assert_eq!(round2(-0.0001), 0.0);
        assert!(round2(-0.0001).is_sign_positive());
    }
}
