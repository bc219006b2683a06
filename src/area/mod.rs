//! # Area Tree
//!
//! The output of layout: a sequence of pages whose every box carries a
//! definitive position and size in page points (1/72 inch). The origin is the
//! top-left corner of the page and y grows downward; a downstream PDF
//! serializer flips to bottom-left at emit time.
//!
//! Areas are created in document order and are append-only. Once a
//! [`PageViewport`] is committed to the tree it is never mutated again; the
//! page formatter's speculative work happens on tentative lists that are
//! truncated on rollback, never on committed pages.

pub mod json;

use serde::Serialize;

use crate::services::FontSpec;

/// An axis-aligned rectangle in absolute page points, top-left origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Translate by (dx, dy), returning the moved rectangle.
    pub fn shifted(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// An RGB color with alpha, each channel in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Perceptual darkness used by the collapsed-border winner rules.
    pub fn luminance(&self) -> f64 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Per-side widths (margins, padding).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self { top: v, right: v, bottom: v, left: v }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Border line style, ordered by the collapse priority of §border rules:
/// `hidden` beats everything, `none` loses to everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    None,
    Inset,
    Groove,
    Outset,
    Ridge,
    Dotted,
    Dashed,
    Solid,
    Double,
    Hidden,
}

/// One border edge: width, style, color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Border {
    pub width: f64,
    pub style: BorderStyle,
    pub color: Color,
}

impl Default for Border {
    fn default() -> Self {
        Self { width: 0.0, style: BorderStyle::None, color: Color::BLACK }
    }
}

/// Borders for the four sides of a box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BorderSet {
    pub top: Border,
    pub right: Border,
    pub bottom: Border,
    pub left: Border,
}

impl BorderSet {
    pub fn horizontal(&self) -> f64 {
        self.left.width + self.right.width
    }

    pub fn vertical(&self) -> f64 {
        self.top.width + self.bottom.width
    }
}

/// Text decoration carried on an inline area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextDecoration {
    Underline,
    Overline,
    LineThrough,
}

/// The complete output of a layout run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AreaTree {
    pub pages: Vec<PageViewport>,
    /// Outline entries parsed from `bookmark-tree`, carried for the emitter.
    pub bookmarks: Vec<Bookmark>,
}

/// One output page.
#[derive(Debug, Clone, Serialize)]
pub struct PageViewport {
    /// 1-based page number.
    pub page_number: u32,
    pub width: f64,
    pub height: f64,
    /// Normal-flow areas plus static-content areas, in paint order.
    pub areas: Vec<Area>,
    /// Out-of-flow absolutely positioned areas, sorted by z-index.
    pub absolute_areas: Vec<AbsoluteArea>,
    /// Link hot zones on this page.
    pub links: Vec<LinkArea>,
}

/// A PDF outline entry.
#[derive(Debug, Clone, Serialize)]
pub struct Bookmark {
    pub title: String,
    /// `id` of the FO node the bookmark points at.
    pub internal_destination: Option<String>,
    pub external_destination: Option<String>,
    pub children: Vec<Bookmark>,
}

/// Geometry-stamped content. Consumers dispatch on the tag; there is no
/// shared base type.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum Area {
    Block(BlockArea),
    Line(LineArea),
    Inline(InlineArea),
    Table(TableArea),
    Image(ImageArea),
    Float(FloatArea),
    /// A filled rule or dot pattern emitted by `fo:leader`.
    Leader(LeaderArea),
}

impl Area {
    pub fn rect(&self) -> Rect {
        match self {
            Area::Block(a) => a.rect,
            Area::Line(a) => a.rect,
            Area::Inline(a) => a.rect,
            Area::Table(a) => a.rect,
            Area::Image(a) => a.rect,
            Area::Float(a) => a.rect,
            Area::Leader(a) => a.rect,
        }
    }

    /// Translate this area and all its descendants.
    pub fn shift(&mut self, dx: f64, dy: f64) {
        match self {
            Area::Block(a) => {
                a.rect = a.rect.shifted(dx, dy);
                for c in &mut a.children {
                    c.shift(dx, dy);
                }
            }
            Area::Line(a) => {
                a.rect = a.rect.shifted(dx, dy);
                a.baseline += dy;
                for i in &mut a.inlines {
                    i.rect = i.rect.shifted(dx, dy);
                }
            }
            Area::Inline(a) => a.rect = a.rect.shifted(dx, dy),
            Area::Table(a) => {
                a.rect = a.rect.shifted(dx, dy);
                for r in &mut a.rows {
                    r.rect = r.rect.shifted(dx, dy);
                    for c in &mut r.cells {
                        c.rect = c.rect.shifted(dx, dy);
                        for child in &mut c.children {
                            child.shift(dx, dy);
                        }
                    }
                }
            }
            Area::Image(a) => a.rect = a.rect.shifted(dx, dy),
            Area::Float(a) => {
                a.rect = a.rect.shifted(dx, dy);
                for c in &mut a.children {
                    c.shift(dx, dy);
                }
            }
            Area::Leader(a) => a.rect = a.rect.shifted(dx, dy),
        }
    }
}

/// A block-level box with resolved box properties.
#[derive(Debug, Clone, Serialize)]
pub struct BlockArea {
    pub rect: Rect,
    pub margin: Edges,
    pub padding: Edges,
    pub borders: BorderSet,
    pub background: Option<Color>,
    /// Resolved space-before used on this page (post collapsing).
    pub space_before: f64,
    pub space_after: f64,
    pub children: Vec<Area>,
}

/// One line of a paragraph; children are inline areas in visual order.
#[derive(Debug, Clone, Serialize)]
pub struct LineArea {
    pub rect: Rect,
    /// Absolute y of the baseline.
    pub baseline: f64,
    pub inlines: Vec<InlineArea>,
}

/// A run of text (or an inline leader gap) with one resolved style.
#[derive(Debug, Clone, Serialize)]
pub struct InlineArea {
    pub rect: Rect,
    pub text: String,
    pub font: FontSpec,
    pub font_size: f64,
    pub color: Color,
    pub decoration: Option<TextDecoration>,
    /// Extra width the renderer must add to each space in `text` to realize
    /// justification. Zero when the line is not justified.
    pub word_spacing: f64,
    /// Shift of this run's baseline relative to the line baseline
    /// (positive = raised).
    pub baseline_offset: f64,
    pub background: Option<Color>,
}

/// A laid-out table.
#[derive(Debug, Clone, Serialize)]
pub struct TableArea {
    pub rect: Rect,
    pub column_widths: Vec<f64>,
    pub border_collapse: bool,
    pub border_spacing: f64,
    pub borders: BorderSet,
    pub background: Option<Color>,
    pub rows: Vec<TableRowArea>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableRowArea {
    pub rect: Rect,
    /// True when this row is a re-emitted header or footer.
    pub repeated: bool,
    pub cells: Vec<TableCellArea>,
}

/// How cell content is aligned inside a cell taller than it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellAlign {
    #[default]
    Before,
    Center,
    After,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCellArea {
    pub rect: Rect,
    pub column_index: usize,
    pub col_span: usize,
    pub row_span: usize,
    pub vertical_align: CellAlign,
    pub padding: Edges,
    pub borders: BorderSet,
    pub background: Option<Color>,
    pub children: Vec<Area>,
}

/// A placed external graphic. Pixel data stays with the emitter; layout only
/// records the source and the scaled box.
#[derive(Debug, Clone, Serialize)]
pub struct ImageArea {
    pub rect: Rect,
    pub src: String,
    pub intrinsic_width: f64,
    pub intrinsic_height: f64,
}

/// Which region edge a float was placed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatSide {
    Start,
    End,
    Before,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloatArea {
    pub rect: Rect,
    pub side: FloatSide,
    pub children: Vec<Area>,
}

/// Fill pattern of a leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderPattern {
    #[default]
    Space,
    Rule,
    Dots,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderArea {
    pub rect: Rect,
    pub pattern: LeaderPattern,
    pub color: Color,
}

/// Positioning scheme of an out-of-flow area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsoluteMode {
    Absolute,
    Fixed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbsoluteArea {
    pub rect: Rect,
    pub position: AbsoluteMode,
    pub z_index: i32,
    pub children: Vec<Area>,
}

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "target")]
pub enum LinkTarget {
    /// `id` of an FO node; resolves to a page + offset at emit time.
    Internal(String),
    External(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkArea {
    pub rect: Rect,
    pub target: LinkTarget,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::FontSpec;

    #[test]
    fn shift_moves_nested_children() {
        let inline = InlineArea {
            rect: Rect::new(10.0, 10.0, 50.0, 12.0),
            text: "x".into(),
            font: FontSpec::default(),
            font_size: 12.0,
            color: Color::BLACK,
            decoration: None,
            word_spacing: 0.0,
            baseline_offset: 0.0,
            background: None,
        };
        let mut block = Area::Block(BlockArea {
            rect: Rect::new(0.0, 0.0, 100.0, 40.0),
            margin: Edges::default(),
            padding: Edges::default(),
            borders: BorderSet::default(),
            background: None,
            space_before: 0.0,
            space_after: 0.0,
            children: vec![Area::Line(LineArea {
                rect: Rect::new(10.0, 10.0, 80.0, 14.4),
                baseline: 20.0,
                inlines: vec![inline],
            })],
        });
        block.shift(5.0, 7.0);
        assert_eq!(block.rect().x, 5.0);
        if let Area::Block(b) = &block {
            if let Area::Line(l) = &b.children[0] {
                assert_eq!(l.rect.y, 17.0);
                assert_eq!(l.baseline, 27.0);
                assert_eq!(l.inlines[0].rect.x, 15.0);
            } else {
                panic!("expected line");
            }
        }
    }

    #[test]
    fn border_style_collapse_order() {
        assert!(BorderStyle::Hidden > BorderStyle::Double);
        assert!(BorderStyle::Double > BorderStyle::Solid);
        assert!(BorderStyle::Solid > BorderStyle::Dashed);
        assert!(BorderStyle::Dashed > BorderStyle::Dotted);
        assert!(BorderStyle::None < BorderStyle::Inset);
    }
}
