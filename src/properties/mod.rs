//! # Property Resolution
//!
//! The cascade: every FO node gains a [`ResolvedStyle`] mapping each
//! enumerated property to a typed value. The walk is parent-first, so a
//! node's inherited values read the parent's *computed* style; relative units
//! (`em`, `ex`, font-size percentages) resolve during the walk, while
//! percentages on dimensions stay symbolic until the consumer knows the
//! containing measure.
//!
//! The store is a dense array keyed by [`PropertyId`]; cascade is an
//! index-wise merge of specified values over inherited-or-initial ones.
//! Resolution is pure: same tree + options in, same styles out.

pub mod parse;

use crate::area::{Border, BorderSet, BorderStyle, CellAlign, Color, Edges, FloatSide,
    LeaderPattern, TextDecoration};
use crate::diagnostics::DiagnosticSink;
use crate::fo::{FoTree, NodeId};
use crate::services::FontSpec;
use parse::{BreakWhen, KeepStrength, ParsedLength};

/// Every property the layout stages consult. The discriminant doubles as the
/// slot index in the dense store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum PropertyId {
    FontFamily,
    FontSize,
    FontWeight,
    FontStyle,
    ColorProp,
    LineHeight,
    TextAlign,
    TextAlignLast,
    TextIndent,
    TextDecorationProp,
    WhiteSpace,
    Language,
    Hyphenate,
    WritingMode,
    BaselineShift,
    BackgroundColor,
    Width,
    Height,
    ContentWidth,
    ContentHeight,
    MarginTop,
    MarginRight,
    MarginBottom,
    MarginLeft,
    PaddingTop,
    PaddingRight,
    PaddingBottom,
    PaddingLeft,
    BorderTopWidth,
    BorderTopStyle,
    BorderTopColor,
    BorderRightWidth,
    BorderRightStyle,
    BorderRightColor,
    BorderBottomWidth,
    BorderBottomStyle,
    BorderBottomColor,
    BorderLeftWidth,
    BorderLeftStyle,
    BorderLeftColor,
    SpaceBefore,
    SpaceAfter,
    KeepWithNext,
    KeepWithPrevious,
    KeepTogether,
    BreakBefore,
    BreakAfter,
    PageWidth,
    PageHeight,
    Extent,
    NumberColumnsSpanned,
    NumberRowsSpanned,
    BorderCollapse,
    BorderSpacing,
    DisplayAlign,
    FloatProp,
    LeaderPatternProp,
    LeaderLength,
    ProvisionalDistanceBetweenStarts,
    ProvisionalLabelSeparation,
    AbsolutePosition,
    OffsetTop,
    OffsetRight,
    OffsetBottom,
    OffsetLeft,
    ZIndex,
    RetrievePositionProp,
    RetrieveBoundaryProp,
    ForcePageCountProp,
    InitialPageNumber,
    TableOmitHeaderAtBreak,
    TableOmitFooterAtBreak,
}

pub const PROPERTY_COUNT: usize = PropertyId::TableOmitFooterAtBreak as usize + 1;

impl PropertyId {
    /// Every property in slot order.
    pub const ALL: [PropertyId; PROPERTY_COUNT] = {
        use PropertyId::*;
        [
            FontFamily, FontSize, FontWeight, FontStyle, ColorProp, LineHeight, TextAlign,
            TextAlignLast, TextIndent, TextDecorationProp, WhiteSpace, Language, Hyphenate,
            WritingMode, BaselineShift, BackgroundColor, Width, Height, ContentWidth,
            ContentHeight, MarginTop, MarginRight, MarginBottom, MarginLeft, PaddingTop,
            PaddingRight, PaddingBottom, PaddingLeft, BorderTopWidth, BorderTopStyle,
            BorderTopColor, BorderRightWidth, BorderRightStyle, BorderRightColor,
            BorderBottomWidth, BorderBottomStyle, BorderBottomColor, BorderLeftWidth,
            BorderLeftStyle, BorderLeftColor, SpaceBefore, SpaceAfter, KeepWithNext,
            KeepWithPrevious, KeepTogether, BreakBefore, BreakAfter, PageWidth, PageHeight,
            Extent, NumberColumnsSpanned, NumberRowsSpanned, BorderCollapse, BorderSpacing,
            DisplayAlign, FloatProp, LeaderPatternProp, LeaderLength,
            ProvisionalDistanceBetweenStarts, ProvisionalLabelSeparation, AbsolutePosition,
            OffsetTop, OffsetRight, OffsetBottom, OffsetLeft, ZIndex, RetrievePositionProp,
            RetrieveBoundaryProp, ForcePageCountProp, InitialPageNumber,
            TableOmitHeaderAtBreak, TableOmitFooterAtBreak,
        ]
    };
}

/// A space specifier: the `{min, opt, max, precedence, conditionality}`
/// quintuple of `space-before` / `space-after`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceSpec {
    pub minimum: f64,
    pub optimum: f64,
    pub maximum: f64,
    pub precedence: i32,
    /// `conditionality = discard`: the space vanishes at region edges.
    pub discard: bool,
}

impl SpaceSpec {
    pub const ZERO: SpaceSpec =
        SpaceSpec { minimum: 0.0, optimum: 0.0, maximum: 0.0, precedence: 0, discard: true };

    pub fn fixed(v: f64) -> Self {
        SpaceSpec { minimum: v, optimum: v, maximum: v, precedence: 0, discard: true }
    }
}

/// Keyword tokens stored in the property slots. One flat namespace; typed
/// accessors on [`ResolvedStyle`] translate to the per-property enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Start,
    Center,
    End,
    Justify,
    Normal,
    Italic,
    Oblique,
    Pre,
    Nowrap,
    PreWrap,
    PreLine,
    Underline,
    Overline,
    LineThrough,
    NoDecoration,
    LrTb,
    Before,
    After,
    Collapse,
    Separate,
    Space,
    Rule,
    Dots,
    Absolute,
    Fixed,
    AutoKw,
    Even,
    Odd,
    EndOnEven,
    EndOnOdd,
    FirstStartingWithinPage,
    FirstIncludingCarryover,
    LastStartingWithinPage,
    LastEndingWithinPage,
    PageBoundary,
    PageSequenceBoundary,
    DocumentBoundary,
    True,
    False,
    Solid,
    Dashed,
    Dotted,
    Double,
    Hidden,
    Groove,
    Ridge,
    Inset,
    Outset,
}

/// One typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Length(f64),
    Percent(f64),
    Number(f64),
    Integer(i64),
    Str(String),
    Color(Color),
    Keyword(Keyword),
    Space(SpaceSpec),
    Keep(KeepStrength),
    Break(BreakWhen),
    Auto,
}

/// Whether a property inherits from the parent's computed value.
fn is_inherited(id: PropertyId) -> bool {
    use PropertyId::*;
    matches!(
        id,
        FontFamily
            | FontSize
            | FontWeight
            | FontStyle
            | ColorProp
            | LineHeight
            | TextAlign
            | TextAlignLast
            | TextIndent
            | WhiteSpace
            | Language
            | Hyphenate
            | WritingMode
            | BorderCollapse
            | BorderSpacing
            | DisplayAlign
            | LeaderPatternProp
    )
}

/// The initial value of each property.
fn initial(id: PropertyId) -> PropertyValue {
    use PropertyId::*;
    match id {
        FontFamily => PropertyValue::Str("Helvetica".to_string()),
        FontSize => PropertyValue::Length(12.0),
        FontWeight => PropertyValue::Integer(400),
        FontStyle => PropertyValue::Keyword(Keyword::Normal),
        ColorProp => PropertyValue::Color(Color::BLACK),
        LineHeight => PropertyValue::Number(1.2),
        TextAlign => PropertyValue::Keyword(Keyword::Start),
        TextAlignLast => PropertyValue::Auto,
        TextIndent => PropertyValue::Length(0.0),
        TextDecorationProp => PropertyValue::Keyword(Keyword::NoDecoration),
        WhiteSpace => PropertyValue::Keyword(Keyword::Normal),
        Language => PropertyValue::Str("en-US".to_string()),
        Hyphenate => PropertyValue::Keyword(Keyword::False),
        WritingMode => PropertyValue::Keyword(Keyword::LrTb),
        BaselineShift => PropertyValue::Length(0.0),
        BackgroundColor => PropertyValue::Auto,
        Width | Height | ContentWidth | ContentHeight => PropertyValue::Auto,
        MarginTop | MarginRight | MarginBottom | MarginLeft => PropertyValue::Length(0.0),
        PaddingTop | PaddingRight | PaddingBottom | PaddingLeft => PropertyValue::Length(0.0),
        BorderTopWidth | BorderRightWidth | BorderBottomWidth | BorderLeftWidth => {
            PropertyValue::Length(0.0)
        }
        BorderTopStyle | BorderRightStyle | BorderBottomStyle | BorderLeftStyle => {
            PropertyValue::Keyword(Keyword::NoDecoration)
        }
        BorderTopColor | BorderRightColor | BorderBottomColor | BorderLeftColor => {
            PropertyValue::Color(Color::BLACK)
        }
        SpaceBefore | SpaceAfter => PropertyValue::Space(SpaceSpec::ZERO),
        KeepWithNext | KeepWithPrevious | KeepTogether => PropertyValue::Keep(KeepStrength::Auto),
        BreakBefore | BreakAfter => PropertyValue::Break(BreakWhen::Auto),
        PageWidth | PageHeight => PropertyValue::Auto,
        Extent => PropertyValue::Length(0.0),
        NumberColumnsSpanned | NumberRowsSpanned => PropertyValue::Integer(1),
        BorderCollapse => PropertyValue::Keyword(Keyword::Separate),
        BorderSpacing => PropertyValue::Length(0.0),
        DisplayAlign => PropertyValue::Keyword(Keyword::Before),
        FloatProp => PropertyValue::Keyword(Keyword::NoDecoration),
        LeaderPatternProp => PropertyValue::Keyword(Keyword::Space),
        LeaderLength => PropertyValue::Auto,
        ProvisionalDistanceBetweenStarts => PropertyValue::Length(24.0),
        ProvisionalLabelSeparation => PropertyValue::Length(6.0),
        AbsolutePosition => PropertyValue::Auto,
        OffsetTop | OffsetRight | OffsetBottom | OffsetLeft => PropertyValue::Auto,
        ZIndex => PropertyValue::Integer(0),
        RetrievePositionProp => PropertyValue::Keyword(Keyword::FirstStartingWithinPage),
        RetrieveBoundaryProp => PropertyValue::Keyword(Keyword::PageBoundary),
        ForcePageCountProp => PropertyValue::Auto,
        InitialPageNumber => PropertyValue::Auto,
        TableOmitHeaderAtBreak | TableOmitFooterAtBreak => PropertyValue::Keyword(Keyword::False),
    }
}

/// Text alignment after keyword translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlignment {
    #[default]
    Start,
    Center,
    End,
    Justify,
}

/// `white-space` handling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhiteSpaceMode {
    #[default]
    Normal,
    Pre,
    Nowrap,
    PreWrap,
    PreLine,
}

impl WhiteSpaceMode {
    /// Do runs of spaces and newlines collapse to single spaces?
    pub fn collapses(self) -> bool {
        matches!(self, WhiteSpaceMode::Normal | WhiteSpaceMode::Nowrap)
    }

    /// Are newlines preserved as forced line breaks?
    pub fn preserves_newlines(self) -> bool {
        matches!(self, WhiteSpaceMode::Pre | WhiteSpaceMode::PreWrap | WhiteSpaceMode::PreLine)
    }

    /// Is automatic line wrapping allowed?
    pub fn allows_wrap(self) -> bool {
        !matches!(self, WhiteSpaceMode::Pre | WhiteSpaceMode::Nowrap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievePosition {
    #[default]
    FirstStartingWithinPage,
    FirstIncludingCarryover,
    LastStartingWithinPage,
    LastEndingWithinPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrieveBoundary {
    #[default]
    Page,
    PageSequence,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForcePageCount {
    #[default]
    Auto,
    Even,
    Odd,
    EndOnEven,
    EndOnOdd,
}

/// The computed style of one FO node. Immutable once built.
#[derive(Debug, Clone)]
pub struct ResolvedStyle {
    slots: Box<[PropertyValue]>,
}

impl ResolvedStyle {
    pub fn get(&self, id: PropertyId) -> &PropertyValue {
        &self.slots[id as usize]
    }

    fn length(&self, id: PropertyId, base: f64) -> f64 {
        match self.get(id) {
            PropertyValue::Length(v) => *v,
            PropertyValue::Percent(p) => base * p / 100.0,
            _ => 0.0,
        }
    }

    fn opt_length(&self, id: PropertyId, base: f64) -> Option<f64> {
        match self.get(id) {
            PropertyValue::Length(v) => Some(*v),
            PropertyValue::Percent(p) => Some(base * p / 100.0),
            _ => None,
        }
    }

    pub fn font(&self) -> FontSpec {
        let family = match self.get(PropertyId::FontFamily) {
            PropertyValue::Str(s) => s.clone(),
            _ => "Helvetica".to_string(),
        };
        let weight = match self.get(PropertyId::FontWeight) {
            PropertyValue::Integer(w) => *w as u32,
            _ => 400,
        };
        let italic = matches!(
            self.get(PropertyId::FontStyle),
            PropertyValue::Keyword(Keyword::Italic) | PropertyValue::Keyword(Keyword::Oblique)
        );
        FontSpec { family, weight, italic }
    }

    pub fn font_size(&self) -> f64 {
        match self.get(PropertyId::FontSize) {
            PropertyValue::Length(v) => *v,
            _ => 12.0,
        }
    }

    pub fn color(&self) -> Color {
        match self.get(PropertyId::ColorProp) {
            PropertyValue::Color(c) => *c,
            _ => Color::BLACK,
        }
    }

    /// Line height in points: a number multiplies font-size, a length passes
    /// through.
    pub fn line_height(&self) -> f64 {
        match self.get(PropertyId::LineHeight) {
            PropertyValue::Number(m) => m * self.font_size(),
            PropertyValue::Length(v) => *v,
            _ => 1.2 * self.font_size(),
        }
    }

    pub fn text_align(&self) -> TextAlignment {
        match self.get(PropertyId::TextAlign) {
            PropertyValue::Keyword(Keyword::Center) => TextAlignment::Center,
            PropertyValue::Keyword(Keyword::End) => TextAlignment::End,
            PropertyValue::Keyword(Keyword::Justify) => TextAlignment::Justify,
            _ => TextAlignment::Start,
        }
    }

    /// Alignment of the last line; `None` means follow `text-align` with the
    /// justify exception (last line starts).
    pub fn text_align_last(&self) -> Option<TextAlignment> {
        match self.get(PropertyId::TextAlignLast) {
            PropertyValue::Keyword(Keyword::Center) => Some(TextAlignment::Center),
            PropertyValue::Keyword(Keyword::End) => Some(TextAlignment::End),
            PropertyValue::Keyword(Keyword::Justify) => Some(TextAlignment::Justify),
            PropertyValue::Keyword(Keyword::Start) => Some(TextAlignment::Start),
            _ => None,
        }
    }

    pub fn text_indent(&self, base: f64) -> f64 {
        self.length(PropertyId::TextIndent, base)
    }

    pub fn text_decoration(&self) -> Option<TextDecoration> {
        match self.get(PropertyId::TextDecorationProp) {
            PropertyValue::Keyword(Keyword::Underline) => Some(TextDecoration::Underline),
            PropertyValue::Keyword(Keyword::Overline) => Some(TextDecoration::Overline),
            PropertyValue::Keyword(Keyword::LineThrough) => Some(TextDecoration::LineThrough),
            _ => None,
        }
    }

    pub fn white_space(&self) -> WhiteSpaceMode {
        match self.get(PropertyId::WhiteSpace) {
            PropertyValue::Keyword(Keyword::Pre) => WhiteSpaceMode::Pre,
            PropertyValue::Keyword(Keyword::Nowrap) => WhiteSpaceMode::Nowrap,
            PropertyValue::Keyword(Keyword::PreWrap) => WhiteSpaceMode::PreWrap,
            PropertyValue::Keyword(Keyword::PreLine) => WhiteSpaceMode::PreLine,
            _ => WhiteSpaceMode::Normal,
        }
    }

    pub fn language(&self) -> &str {
        match self.get(PropertyId::Language) {
            PropertyValue::Str(s) => s,
            _ => "en-US",
        }
    }

    pub fn hyphenate(&self) -> bool {
        matches!(self.get(PropertyId::Hyphenate), PropertyValue::Keyword(Keyword::True))
    }

    /// True when the writing mode is the supported `lr-tb`.
    pub fn is_lr_tb(&self) -> bool {
        matches!(self.get(PropertyId::WritingMode), PropertyValue::Keyword(Keyword::LrTb))
    }

    pub fn baseline_shift(&self) -> f64 {
        self.length(PropertyId::BaselineShift, 0.0)
    }

    pub fn background(&self) -> Option<Color> {
        match self.get(PropertyId::BackgroundColor) {
            PropertyValue::Color(c) if c.a > 0.0 => Some(*c),
            _ => None,
        }
    }

    pub fn width(&self, base: f64) -> Option<f64> {
        self.opt_length(PropertyId::Width, base)
    }

    pub fn height(&self) -> Option<f64> {
        self.opt_length(PropertyId::Height, 0.0)
    }

    pub fn content_width(&self, base: f64) -> Option<f64> {
        self.opt_length(PropertyId::ContentWidth, base)
    }

    pub fn content_height(&self) -> Option<f64> {
        self.opt_length(PropertyId::ContentHeight, 0.0)
    }

    pub fn margin(&self, base: f64) -> Edges {
        Edges {
            top: self.length(PropertyId::MarginTop, base),
            right: self.length(PropertyId::MarginRight, base),
            bottom: self.length(PropertyId::MarginBottom, base),
            left: self.length(PropertyId::MarginLeft, base),
        }
    }

    pub fn padding(&self, base: f64) -> Edges {
        Edges {
            top: self.length(PropertyId::PaddingTop, base),
            right: self.length(PropertyId::PaddingRight, base),
            bottom: self.length(PropertyId::PaddingBottom, base),
            left: self.length(PropertyId::PaddingLeft, base),
        }
    }

    fn border_side(
        &self,
        width: PropertyId,
        style: PropertyId,
        color: PropertyId,
    ) -> Border {
        let style = match self.get(style) {
            PropertyValue::Keyword(k) => keyword_to_style(*k),
            _ => BorderStyle::None,
        };
        let width = if style == BorderStyle::None || style == BorderStyle::Hidden {
            0.0
        } else {
            self.length(width, 0.0)
        };
        let color = match self.get(color) {
            PropertyValue::Color(c) => *c,
            _ => Color::BLACK,
        };
        Border { width, style, color }
    }

    pub fn borders(&self) -> BorderSet {
        BorderSet {
            top: self.border_side(
                PropertyId::BorderTopWidth,
                PropertyId::BorderTopStyle,
                PropertyId::BorderTopColor,
            ),
            right: self.border_side(
                PropertyId::BorderRightWidth,
                PropertyId::BorderRightStyle,
                PropertyId::BorderRightColor,
            ),
            bottom: self.border_side(
                PropertyId::BorderBottomWidth,
                PropertyId::BorderBottomStyle,
                PropertyId::BorderBottomColor,
            ),
            left: self.border_side(
                PropertyId::BorderLeftWidth,
                PropertyId::BorderLeftStyle,
                PropertyId::BorderLeftColor,
            ),
        }
    }

    pub fn space_before(&self) -> SpaceSpec {
        match self.get(PropertyId::SpaceBefore) {
            PropertyValue::Space(s) => *s,
            _ => SpaceSpec::ZERO,
        }
    }

    pub fn space_after(&self) -> SpaceSpec {
        match self.get(PropertyId::SpaceAfter) {
            PropertyValue::Space(s) => *s,
            _ => SpaceSpec::ZERO,
        }
    }

    fn keep(&self, id: PropertyId) -> KeepStrength {
        match self.get(id) {
            PropertyValue::Keep(k) => *k,
            _ => KeepStrength::Auto,
        }
    }

    pub fn keep_with_next(&self) -> KeepStrength {
        self.keep(PropertyId::KeepWithNext)
    }

    pub fn keep_with_previous(&self) -> KeepStrength {
        self.keep(PropertyId::KeepWithPrevious)
    }

    pub fn keep_together(&self) -> KeepStrength {
        self.keep(PropertyId::KeepTogether)
    }

    fn brk(&self, id: PropertyId) -> BreakWhen {
        match self.get(id) {
            PropertyValue::Break(b) => *b,
            _ => BreakWhen::Auto,
        }
    }

    pub fn break_before(&self) -> BreakWhen {
        self.brk(PropertyId::BreakBefore)
    }

    pub fn break_after(&self) -> BreakWhen {
        self.brk(PropertyId::BreakAfter)
    }

    pub fn page_width(&self) -> Option<f64> {
        self.opt_length(PropertyId::PageWidth, 0.0)
    }

    pub fn page_height(&self) -> Option<f64> {
        self.opt_length(PropertyId::PageHeight, 0.0)
    }

    pub fn extent(&self) -> f64 {
        self.length(PropertyId::Extent, 0.0)
    }

    pub fn number_columns_spanned(&self) -> usize {
        match self.get(PropertyId::NumberColumnsSpanned) {
            PropertyValue::Integer(n) => (*n).max(1) as usize,
            _ => 1,
        }
    }

    pub fn number_rows_spanned(&self) -> usize {
        match self.get(PropertyId::NumberRowsSpanned) {
            PropertyValue::Integer(n) => (*n).max(1) as usize,
            _ => 1,
        }
    }

    pub fn border_collapse(&self) -> bool {
        matches!(self.get(PropertyId::BorderCollapse), PropertyValue::Keyword(Keyword::Collapse))
    }

    pub fn border_spacing(&self) -> f64 {
        self.length(PropertyId::BorderSpacing, 0.0)
    }

    pub fn display_align(&self) -> CellAlign {
        match self.get(PropertyId::DisplayAlign) {
            PropertyValue::Keyword(Keyword::Center) => CellAlign::Center,
            PropertyValue::Keyword(Keyword::After) => CellAlign::After,
            _ => CellAlign::Before,
        }
    }

    pub fn float_side(&self) -> Option<FloatSide> {
        match self.get(PropertyId::FloatProp) {
            PropertyValue::Keyword(Keyword::Start) => Some(FloatSide::Start),
            PropertyValue::Keyword(Keyword::End) => Some(FloatSide::End),
            PropertyValue::Keyword(Keyword::Before) => Some(FloatSide::Before),
            _ => None,
        }
    }

    pub fn leader_pattern(&self) -> LeaderPattern {
        match self.get(PropertyId::LeaderPatternProp) {
            PropertyValue::Keyword(Keyword::Rule) => LeaderPattern::Rule,
            PropertyValue::Keyword(Keyword::Dots) => LeaderPattern::Dots,
            _ => LeaderPattern::Space,
        }
    }

    pub fn leader_length(&self, base: f64) -> Option<f64> {
        self.opt_length(PropertyId::LeaderLength, base)
    }

    pub fn provisional_distance_between_starts(&self) -> f64 {
        self.length(PropertyId::ProvisionalDistanceBetweenStarts, 0.0)
    }

    pub fn provisional_label_separation(&self) -> f64 {
        self.length(PropertyId::ProvisionalLabelSeparation, 0.0)
    }

    pub fn absolute_position(&self) -> Option<crate::area::AbsoluteMode> {
        match self.get(PropertyId::AbsolutePosition) {
            PropertyValue::Keyword(Keyword::Absolute) => Some(crate::area::AbsoluteMode::Absolute),
            PropertyValue::Keyword(Keyword::Fixed) => Some(crate::area::AbsoluteMode::Fixed),
            _ => None,
        }
    }

    pub fn offset(&self, side: PropertyId, base: f64) -> Option<f64> {
        self.opt_length(side, base)
    }

    pub fn z_index(&self) -> i32 {
        match self.get(PropertyId::ZIndex) {
            PropertyValue::Integer(z) => *z as i32,
            _ => 0,
        }
    }

    pub fn retrieve_position(&self) -> RetrievePosition {
        match self.get(PropertyId::RetrievePositionProp) {
            PropertyValue::Keyword(Keyword::FirstIncludingCarryover) => {
                RetrievePosition::FirstIncludingCarryover
            }
            PropertyValue::Keyword(Keyword::LastStartingWithinPage) => {
                RetrievePosition::LastStartingWithinPage
            }
            PropertyValue::Keyword(Keyword::LastEndingWithinPage) => {
                RetrievePosition::LastEndingWithinPage
            }
            _ => RetrievePosition::FirstStartingWithinPage,
        }
    }

    pub fn retrieve_boundary(&self) -> RetrieveBoundary {
        match self.get(PropertyId::RetrieveBoundaryProp) {
            PropertyValue::Keyword(Keyword::PageSequenceBoundary) => RetrieveBoundary::PageSequence,
            PropertyValue::Keyword(Keyword::DocumentBoundary) => RetrieveBoundary::Document,
            _ => RetrieveBoundary::Page,
        }
    }

    pub fn force_page_count(&self) -> ForcePageCount {
        match self.get(PropertyId::ForcePageCountProp) {
            PropertyValue::Keyword(Keyword::Even) => ForcePageCount::Even,
            PropertyValue::Keyword(Keyword::Odd) => ForcePageCount::Odd,
            PropertyValue::Keyword(Keyword::EndOnEven) => ForcePageCount::EndOnEven,
            PropertyValue::Keyword(Keyword::EndOnOdd) => ForcePageCount::EndOnOdd,
            _ => ForcePageCount::Auto,
        }
    }

    pub fn initial_page_number(&self) -> Option<u32> {
        match self.get(PropertyId::InitialPageNumber) {
            PropertyValue::Integer(n) if *n >= 1 => Some(*n as u32),
            _ => None,
        }
    }

    pub fn omit_header_at_break(&self) -> bool {
        matches!(
            self.get(PropertyId::TableOmitHeaderAtBreak),
            PropertyValue::Keyword(Keyword::True)
        )
    }

    pub fn omit_footer_at_break(&self) -> bool {
        matches!(
            self.get(PropertyId::TableOmitFooterAtBreak),
            PropertyValue::Keyword(Keyword::True)
        )
    }
}

/// Resolve styles for every node, parent-first. The arena guarantees parent
/// indices precede child indices, so one forward pass suffices.
pub fn resolve_styles(
    tree: &FoTree,
    sink: &mut DiagnosticSink,
) -> Vec<ResolvedStyle> {
    let mut styles: Vec<ResolvedStyle> = Vec::with_capacity(tree.len());
    for id in 0..tree.len() {
        let parent_style = tree.node(id).parent.map(|p| &styles[p]);
        styles.push(resolve_one(tree, id, parent_style, sink));
    }
    styles
}

fn resolve_one(
    tree: &FoTree,
    id: NodeId,
    parent: Option<&ResolvedStyle>,
    sink: &mut DiagnosticSink,
) -> ResolvedStyle {
    let parent_font_size = parent.map(|p| p.font_size()).unwrap_or(12.0);

    // font-size first: em/ex/% on other properties resolve against it.
    let font_size = match tree.attr(id, "font-size") {
        Some(raw) => match parse::parse_length(raw) {
            Some(ParsedLength::Percent(p)) => parent_font_size * p / 100.0,
            Some(ParsedLength::Em(m)) => parent_font_size * m,
            Some(ParsedLength::Ex(m)) => 0.5 * parent_font_size * m,
            Some(ParsedLength::Pt(v)) => v,
            Some(ParsedLength::Auto) | None => {
                sink.warn("unparseable-value", format!("font-size '{raw}' is not a length"));
                parent_font_size
            }
        },
        None => parent_font_size,
    };

    let mut specified: Vec<Option<PropertyValue>> = vec![None; PROPERTY_COUNT];
    specified[PropertyId::FontSize as usize] = Some(PropertyValue::Length(font_size));

    let node = tree.node(id);
    for (name, raw) in &node.attributes {
        if name == "font-size" {
            continue;
        }
        apply_attribute(name, raw, font_size, &mut specified, sink);
    }

    let mut slots = Vec::with_capacity(PROPERTY_COUNT);
    for (idx, &pid) in PropertyId::ALL.iter().enumerate() {
        let value = match specified[idx].take() {
            Some(v) => v,
            None => {
                if is_inherited(pid) {
                    match parent {
                        Some(p) => p.slots[idx].clone(),
                        None => initial(pid),
                    }
                } else {
                    initial(pid)
                }
            }
        };
        slots.push(value);
    }

    ResolvedStyle { slots: slots.into_boxed_slice() }
}

fn set(slots: &mut [Option<PropertyValue>], id: PropertyId, value: PropertyValue) {
    slots[id as usize] = Some(value);
}

fn set_length(
    slots: &mut [Option<PropertyValue>],
    id: PropertyId,
    raw: &str,
    font_size: f64,
    sink: &mut DiagnosticSink,
) {
    match parse::parse_length(raw) {
        Some(ParsedLength::Percent(p)) => set(slots, id, PropertyValue::Percent(p)),
        Some(ParsedLength::Auto) => set(slots, id, PropertyValue::Auto),
        Some(other) => {
            if let Some(pt) = other.to_points(font_size) {
                set(slots, id, PropertyValue::Length(pt));
            }
        }
        None => sink.warn("unparseable-value", format!("'{raw}' is not a length")),
    }
}

fn set_color(
    slots: &mut [Option<PropertyValue>],
    id: PropertyId,
    raw: &str,
    sink: &mut DiagnosticSink,
) {
    match parse::parse_color(raw) {
        Some(c) => set(slots, id, PropertyValue::Color(c)),
        None => sink.warn("unparseable-value", format!("'{raw}' is not a color")),
    }
}

fn set_border_style(
    slots: &mut [Option<PropertyValue>],
    id: PropertyId,
    raw: &str,
    sink: &mut DiagnosticSink,
) {
    match parse::parse_border_style(raw) {
        Some(style) => set(slots, id, PropertyValue::Keyword(style_to_keyword(style))),
        None => sink.warn("invalid-enum", format!("'{raw}' is not a border style")),
    }
}

/// Apply one attribute to the specified-value slots. Shorthands expand to
/// their longhands here so the store only ever holds longhand values.
fn apply_attribute(
    name: &str,
    raw: &str,
    font_size: f64,
    slots: &mut [Option<PropertyValue>],
    sink: &mut DiagnosticSink,
) {
    use PropertyId::*;
    let raw = raw.trim();

    // Compound (dotted) space and keep components.
    if let Some((base_name, component)) = name.split_once('.') {
        match base_name {
            "space-before" | "space-after" => {
                let pid = if base_name == "space-before" { SpaceBefore } else { SpaceAfter };
                let mut space = match &slots[pid as usize] {
                    Some(PropertyValue::Space(s)) => *s,
                    _ => SpaceSpec::ZERO,
                };
                match component {
                    "minimum" => {
                        if let Some(v) =
                            parse::parse_length(raw).and_then(|l| l.to_points(font_size))
                        {
                            space.minimum = v;
                        }
                    }
                    "optimum" => {
                        if let Some(v) =
                            parse::parse_length(raw).and_then(|l| l.to_points(font_size))
                        {
                            space.optimum = v;
                        }
                    }
                    "maximum" => {
                        if let Some(v) =
                            parse::parse_length(raw).and_then(|l| l.to_points(font_size))
                        {
                            space.maximum = v;
                        }
                    }
                    "precedence" => {
                        space.precedence = if raw == "force" { i32::MAX } else { raw.parse().unwrap_or(0) };
                    }
                    "conditionality" => space.discard = raw != "retain",
                    _ => {
                        sink.warn("unknown-property", format!("unknown component '{name}'"));
                        return;
                    }
                }
                set(slots, pid, PropertyValue::Space(space));
                return;
            }
            "keep-together" | "keep-with-next" | "keep-with-previous" => {
                // Only the within-page component participates in page breaking.
                if component == "within-page" || component == "within-column" {
                    let pid = match base_name {
                        "keep-together" => KeepTogether,
                        "keep-with-next" => KeepWithNext,
                        _ => KeepWithPrevious,
                    };
                    match parse::parse_keep(raw) {
                        Some(k) => set(slots, pid, PropertyValue::Keep(k)),
                        None => sink.warn("invalid-enum", format!("'{raw}' is not a keep value")),
                    }
                }
                return;
            }
            _ => {}
        }
    }

    match name {
        "font-family" => {
            // Use the first family in the list; quoting is tolerated.
            let family = raw
                .split(',')
                .next()
                .unwrap_or(raw)
                .trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .to_string();
            set(slots, FontFamily, PropertyValue::Str(family));
        }
        "font-weight" => {
            let weight = match raw {
                "normal" => Some(400),
                "bold" => Some(700),
                "bolder" => Some(700),
                "lighter" => Some(300),
                _ => raw.parse::<i64>().ok().filter(|w| (100..=900).contains(w)),
            };
            match weight {
                Some(w) => set(slots, FontWeight, PropertyValue::Integer(w)),
                None => sink.warn("invalid-enum", format!("'{raw}' is not a font weight")),
            }
        }
        "font-style" => {
            let kw = match raw {
                "normal" => Some(Keyword::Normal),
                "italic" => Some(Keyword::Italic),
                "oblique" => Some(Keyword::Oblique),
                _ => None,
            };
            match kw {
                Some(k) => set(slots, FontStyle, PropertyValue::Keyword(k)),
                None => sink.warn("invalid-enum", format!("'{raw}' is not a font style")),
            }
        }
        "color" => set_color(slots, ColorProp, raw, sink),
        "background-color" => set_color(slots, BackgroundColor, raw, sink),
        "line-height" => {
            if raw == "normal" {
                set(slots, LineHeight, PropertyValue::Number(1.2));
            } else if let Ok(multiplier) = raw.parse::<f64>() {
                set(slots, LineHeight, PropertyValue::Number(multiplier));
            } else {
                match parse::parse_length(raw) {
                    Some(ParsedLength::Percent(p)) => {
                        set(slots, LineHeight, PropertyValue::Number(p / 100.0));
                    }
                    Some(l) => {
                        if let Some(pt) = l.to_points(font_size) {
                            set(slots, LineHeight, PropertyValue::Length(pt));
                        }
                    }
                    None => sink.warn("unparseable-value", format!("line-height '{raw}'")),
                }
            }
        }
        "text-align" => {
            let kw = match raw {
                "start" | "left" => Some(Keyword::Start),
                "center" => Some(Keyword::Center),
                "end" | "right" => Some(Keyword::End),
                "justify" => Some(Keyword::Justify),
                _ => None,
            };
            match kw {
                Some(k) => set(slots, TextAlign, PropertyValue::Keyword(k)),
                None => sink.warn("invalid-enum", format!("text-align '{raw}'")),
            }
        }
        "text-align-last" => {
            let kw = match raw {
                "start" | "left" => Some(Keyword::Start),
                "center" => Some(Keyword::Center),
                "end" | "right" => Some(Keyword::End),
                "justify" => Some(Keyword::Justify),
                "relative" | "auto" => None,
                _ => None,
            };
            if let Some(k) = kw {
                set(slots, TextAlignLast, PropertyValue::Keyword(k));
            }
        }
        "text-indent" => set_length(slots, TextIndent, raw, font_size, sink),
        "text-decoration" => {
            let kw = match raw {
                "none" => Some(Keyword::NoDecoration),
                "underline" => Some(Keyword::Underline),
                "overline" => Some(Keyword::Overline),
                "line-through" => Some(Keyword::LineThrough),
                _ => None,
            };
            match kw {
                Some(k) => set(slots, TextDecorationProp, PropertyValue::Keyword(k)),
                None => sink.warn("invalid-enum", format!("text-decoration '{raw}'")),
            }
        }
        "white-space" | "white-space-treatment" => {
            let kw = match raw {
                "normal" | "ignore-if-surrounding-linefeed" => Some(Keyword::Normal),
                "pre" | "preserve" => Some(Keyword::Pre),
                "nowrap" => Some(Keyword::Nowrap),
                "pre-wrap" => Some(Keyword::PreWrap),
                "pre-line" => Some(Keyword::PreLine),
                _ => None,
            };
            match kw {
                Some(k) => set(slots, WhiteSpace, PropertyValue::Keyword(k)),
                None => sink.warn("invalid-enum", format!("white-space '{raw}'")),
            }
        }
        "language" | "xml:lang" => set(slots, Language, PropertyValue::Str(raw.to_string())),
        "hyphenate" => {
            let kw = if raw == "true" { Keyword::True } else { Keyword::False };
            set(slots, Hyphenate, PropertyValue::Keyword(kw));
        }
        "writing-mode" => {
            if raw == "lr-tb" || raw == "lr" {
                set(slots, WritingMode, PropertyValue::Keyword(Keyword::LrTb));
            } else {
                sink.warn(
                    "unsupported-writing-mode",
                    format!("writing-mode '{raw}' is not supported; using lr-tb"),
                );
                set(slots, WritingMode, PropertyValue::Keyword(Keyword::LrTb));
            }
        }
        "baseline-shift" => {
            let v = match raw {
                "super" => Some(0.35 * font_size),
                "sub" => Some(-0.25 * font_size),
                "baseline" => Some(0.0),
                _ => parse::parse_length(raw).and_then(|l| l.to_points(font_size)),
            };
            match v {
                Some(pt) => set(slots, BaselineShift, PropertyValue::Length(pt)),
                None => sink.warn("unparseable-value", format!("baseline-shift '{raw}'")),
            }
        }
        "width" => set_length(slots, Width, raw, font_size, sink),
        "height" => set_length(slots, Height, raw, font_size, sink),
        "content-width" => set_length(slots, ContentWidth, raw, font_size, sink),
        "content-height" => set_length(slots, ContentHeight, raw, font_size, sink),
        "margin" => {
            if let Some([t, r, b, l]) = parse::expand_box_shorthand(raw) {
                set_length(slots, MarginTop, t, font_size, sink);
                set_length(slots, MarginRight, r, font_size, sink);
                set_length(slots, MarginBottom, b, font_size, sink);
                set_length(slots, MarginLeft, l, font_size, sink);
            } else {
                sink.warn("unparseable-value", format!("margin '{raw}'"));
            }
        }
        "margin-top" => set_length(slots, MarginTop, raw, font_size, sink),
        "margin-right" => set_length(slots, MarginRight, raw, font_size, sink),
        "margin-bottom" => set_length(slots, MarginBottom, raw, font_size, sink),
        "margin-left" => set_length(slots, MarginLeft, raw, font_size, sink),
        // XSL writing-mode-relative aliases; lr-tb maps start→left, end→right.
        "start-indent" => set_length(slots, MarginLeft, raw, font_size, sink),
        "end-indent" => set_length(slots, MarginRight, raw, font_size, sink),
        "padding" => {
            if let Some([t, r, b, l]) = parse::expand_box_shorthand(raw) {
                set_length(slots, PaddingTop, t, font_size, sink);
                set_length(slots, PaddingRight, r, font_size, sink);
                set_length(slots, PaddingBottom, b, font_size, sink);
                set_length(slots, PaddingLeft, l, font_size, sink);
            } else {
                sink.warn("unparseable-value", format!("padding '{raw}'"));
            }
        }
        "padding-top" | "padding-before" => set_length(slots, PaddingTop, raw, font_size, sink),
        "padding-right" | "padding-end" => set_length(slots, PaddingRight, raw, font_size, sink),
        "padding-bottom" | "padding-after" => set_length(slots, PaddingBottom, raw, font_size, sink),
        "padding-left" | "padding-start" => set_length(slots, PaddingLeft, raw, font_size, sink),
        "border" => {
            let b = parse::parse_border_shorthand(raw, font_size);
            for (w, s, c) in [
                (BorderTopWidth, BorderTopStyle, BorderTopColor),
                (BorderRightWidth, BorderRightStyle, BorderRightColor),
                (BorderBottomWidth, BorderBottomStyle, BorderBottomColor),
                (BorderLeftWidth, BorderLeftStyle, BorderLeftColor),
            ] {
                apply_border_shorthand(slots, &b, w, s, c);
            }
        }
        "border-top" | "border-before" => {
            let b = parse::parse_border_shorthand(raw, font_size);
            apply_border_shorthand(slots, &b, BorderTopWidth, BorderTopStyle, BorderTopColor);
        }
        "border-right" | "border-end" => {
            let b = parse::parse_border_shorthand(raw, font_size);
            apply_border_shorthand(slots, &b, BorderRightWidth, BorderRightStyle, BorderRightColor);
        }
        "border-bottom" | "border-after" => {
            let b = parse::parse_border_shorthand(raw, font_size);
            apply_border_shorthand(slots, &b, BorderBottomWidth, BorderBottomStyle, BorderBottomColor);
        }
        "border-left" | "border-start" => {
            let b = parse::parse_border_shorthand(raw, font_size);
            apply_border_shorthand(slots, &b, BorderLeftWidth, BorderLeftStyle, BorderLeftColor);
        }
        "border-width" => {
            if let Some([t, r, b, l]) = parse::expand_box_shorthand(raw) {
                for (v, pid) in [
                    (t, BorderTopWidth),
                    (r, BorderRightWidth),
                    (b, BorderBottomWidth),
                    (l, BorderLeftWidth),
                ] {
                    let w = parse::border_width_keyword(v)
                        .or_else(|| parse::parse_length(v).and_then(|x| x.to_points(font_size)));
                    if let Some(w) = w {
                        set(slots, pid, PropertyValue::Length(w));
                    }
                }
            }
        }
        "border-style" => {
            if let Some([t, r, b, l]) = parse::expand_box_shorthand(raw) {
                set_border_style(slots, BorderTopStyle, t, sink);
                set_border_style(slots, BorderRightStyle, r, sink);
                set_border_style(slots, BorderBottomStyle, b, sink);
                set_border_style(slots, BorderLeftStyle, l, sink);
            }
        }
        "border-color" => {
            if let Some([t, r, b, l]) = parse::expand_box_shorthand(raw) {
                set_color(slots, BorderTopColor, t, sink);
                set_color(slots, BorderRightColor, r, sink);
                set_color(slots, BorderBottomColor, b, sink);
                set_color(slots, BorderLeftColor, l, sink);
            }
        }
        "border-top-width" => set_length(slots, BorderTopWidth, raw, font_size, sink),
        "border-right-width" => set_length(slots, BorderRightWidth, raw, font_size, sink),
        "border-bottom-width" => set_length(slots, BorderBottomWidth, raw, font_size, sink),
        "border-left-width" => set_length(slots, BorderLeftWidth, raw, font_size, sink),
        "border-top-style" => set_border_style(slots, BorderTopStyle, raw, sink),
        "border-right-style" => set_border_style(slots, BorderRightStyle, raw, sink),
        "border-bottom-style" => set_border_style(slots, BorderBottomStyle, raw, sink),
        "border-left-style" => set_border_style(slots, BorderLeftStyle, raw, sink),
        "border-top-color" => set_color(slots, BorderTopColor, raw, sink),
        "border-right-color" => set_color(slots, BorderRightColor, raw, sink),
        "border-bottom-color" => set_color(slots, BorderBottomColor, raw, sink),
        "border-left-color" => set_color(slots, BorderLeftColor, raw, sink),
        "space-before" => {
            if let Some(v) = parse::parse_length(raw).and_then(|l| l.to_points(font_size)) {
                set(slots, SpaceBefore, PropertyValue::Space(SpaceSpec::fixed(v)));
            } else {
                sink.warn("unparseable-value", format!("space-before '{raw}'"));
            }
        }
        "space-after" => {
            if let Some(v) = parse::parse_length(raw).and_then(|l| l.to_points(font_size)) {
                set(slots, SpaceAfter, PropertyValue::Space(SpaceSpec::fixed(v)));
            } else {
                sink.warn("unparseable-value", format!("space-after '{raw}'"));
            }
        }
        "keep-with-next" | "keep-with-previous" | "keep-together" => {
            let pid = match name {
                "keep-with-next" => KeepWithNext,
                "keep-with-previous" => KeepWithPrevious,
                _ => KeepTogether,
            };
            match parse::parse_keep(raw) {
                Some(k) => set(slots, pid, PropertyValue::Keep(k)),
                None => sink.warn("invalid-enum", format!("'{raw}' is not a keep value")),
            }
        }
        "break-before" | "page-break-before" => {
            let normalized = if raw == "always" { "page" } else { raw };
            match parse::parse_break(normalized) {
                Some(b) => set(slots, BreakBefore, PropertyValue::Break(b)),
                None => sink.warn("invalid-enum", format!("break-before '{raw}'")),
            }
        }
        "break-after" | "page-break-after" => {
            let normalized = if raw == "always" { "page" } else { raw };
            match parse::parse_break(normalized) {
                Some(b) => set(slots, BreakAfter, PropertyValue::Break(b)),
                None => sink.warn("invalid-enum", format!("break-after '{raw}'")),
            }
        }
        "page-width" => set_length(slots, PageWidth, raw, font_size, sink),
        "page-height" => set_length(slots, PageHeight, raw, font_size, sink),
        "extent" => set_length(slots, Extent, raw, font_size, sink),
        "number-columns-spanned" => match raw.parse::<i64>() {
            Ok(n) if n >= 1 => set(slots, NumberColumnsSpanned, PropertyValue::Integer(n)),
            _ => sink.warn("unparseable-value", format!("number-columns-spanned '{raw}'")),
        },
        "number-rows-spanned" => match raw.parse::<i64>() {
            Ok(n) if n >= 1 => set(slots, NumberRowsSpanned, PropertyValue::Integer(n)),
            _ => sink.warn("unparseable-value", format!("number-rows-spanned '{raw}'")),
        },
        "border-collapse" => {
            let kw = match raw {
                "collapse" => Some(Keyword::Collapse),
                "separate" => Some(Keyword::Separate),
                _ => None,
            };
            match kw {
                Some(k) => set(slots, BorderCollapse, PropertyValue::Keyword(k)),
                None => sink.warn("invalid-enum", format!("border-collapse '{raw}'")),
            }
        }
        "border-spacing" => set_length(slots, BorderSpacing, raw, font_size, sink),
        "display-align" | "vertical-align" => {
            let kw = match raw {
                "before" | "top" => Some(Keyword::Before),
                "center" | "middle" => Some(Keyword::Center),
                "after" | "bottom" => Some(Keyword::After),
                "auto" => Some(Keyword::Before),
                _ => None,
            };
            match kw {
                Some(k) => set(slots, DisplayAlign, PropertyValue::Keyword(k)),
                None => sink.warn("invalid-enum", format!("display-align '{raw}'")),
            }
        }
        "float" => {
            let kw = match raw {
                "start" | "left" => Some(Keyword::Start),
                "end" | "right" => Some(Keyword::End),
                "before" => Some(Keyword::Before),
                "none" => Some(Keyword::NoDecoration),
                _ => None,
            };
            match kw {
                Some(k) => set(slots, FloatProp, PropertyValue::Keyword(k)),
                None => sink.warn("invalid-enum", format!("float '{raw}'")),
            }
        }
        "leader-pattern" => {
            let kw = match raw {
                "space" => Some(Keyword::Space),
                "rule" => Some(Keyword::Rule),
                "dots" => Some(Keyword::Dots),
                _ => None,
            };
            match kw {
                Some(k) => set(slots, LeaderPatternProp, PropertyValue::Keyword(k)),
                None => sink.warn("invalid-enum", format!("leader-pattern '{raw}'")),
            }
        }
        "leader-length" => set_length(slots, LeaderLength, raw, font_size, sink),
        "provisional-distance-between-starts" => {
            set_length(slots, ProvisionalDistanceBetweenStarts, raw, font_size, sink)
        }
        "provisional-label-separation" => {
            set_length(slots, ProvisionalLabelSeparation, raw, font_size, sink)
        }
        "absolute-position" | "position" => {
            let kw = match raw {
                "absolute" => Some(Keyword::Absolute),
                "fixed" => Some(Keyword::Fixed),
                "auto" | "relative" | "static" => None,
                _ => None,
            };
            if let Some(k) = kw {
                set(slots, AbsolutePosition, PropertyValue::Keyword(k));
            }
        }
        "top" => set_length(slots, OffsetTop, raw, font_size, sink),
        "right" => set_length(slots, OffsetRight, raw, font_size, sink),
        "bottom" => set_length(slots, OffsetBottom, raw, font_size, sink),
        "left" => set_length(slots, OffsetLeft, raw, font_size, sink),
        "z-index" => match raw.parse::<i64>() {
            Ok(z) => set(slots, ZIndex, PropertyValue::Integer(z)),
            Err(_) => sink.warn("unparseable-value", format!("z-index '{raw}'")),
        },
        "retrieve-position" => {
            let kw = match raw {
                "first-starting-within-page" => Some(Keyword::FirstStartingWithinPage),
                "first-including-carryover" => Some(Keyword::FirstIncludingCarryover),
                "last-starting-within-page" => Some(Keyword::LastStartingWithinPage),
                "last-ending-within-page" => Some(Keyword::LastEndingWithinPage),
                _ => None,
            };
            match kw {
                Some(k) => set(slots, RetrievePositionProp, PropertyValue::Keyword(k)),
                None => sink.warn("invalid-enum", format!("retrieve-position '{raw}'")),
            }
        }
        "retrieve-boundary" => {
            let kw = match raw {
                "page" => Some(Keyword::PageBoundary),
                "page-sequence" => Some(Keyword::PageSequenceBoundary),
                "document" => Some(Keyword::DocumentBoundary),
                _ => None,
            };
            match kw {
                Some(k) => set(slots, RetrieveBoundaryProp, PropertyValue::Keyword(k)),
                None => sink.warn("invalid-enum", format!("retrieve-boundary '{raw}'")),
            }
        }
        "force-page-count" => {
            let kw = match raw {
                "auto" | "no-force" => None,
                "even" => Some(Keyword::Even),
                "odd" => Some(Keyword::Odd),
                "end-on-even" => Some(Keyword::EndOnEven),
                "end-on-odd" => Some(Keyword::EndOnOdd),
                _ => {
                    sink.warn("invalid-enum", format!("force-page-count '{raw}'"));
                    None
                }
            };
            if let Some(k) = kw {
                set(slots, ForcePageCountProp, PropertyValue::Keyword(k));
            }
        }
        "initial-page-number" => {
            if let Ok(n) = raw.parse::<i64>() {
                set(slots, InitialPageNumber, PropertyValue::Integer(n));
            }
        }
        "table-omit-header-at-break" => {
            let kw = if raw == "true" { Keyword::True } else { Keyword::False };
            set(slots, TableOmitHeaderAtBreak, PropertyValue::Keyword(kw));
        }
        "table-omit-footer-at-break" => {
            let kw = if raw == "true" { Keyword::True } else { Keyword::False };
            set(slots, TableOmitFooterAtBreak, PropertyValue::Keyword(kw));
        }
        // Identifiers and references read directly off the FO tree by their
        // consumers; not part of the cascading property set.
        "id" | "master-reference" | "master-name" | "flow-name" | "region-name" | "src"
        | "marker-class-name" | "retrieve-class-name" | "internal-destination"
        | "external-destination" | "column-width" | "column-number" | "format"
        | "leader-pattern-width" | "scaling" | "overflow" | "reference-orientation"
        | "hyphenation-character" | "country" | "role" | "starting-state" => {}
        _ => {
            sink.warn("unknown-property", format!("unknown property '{name}'"));
        }
    }
}

fn apply_border_shorthand(
    slots: &mut [Option<PropertyValue>],
    b: &parse::BorderShorthand,
    width: PropertyId,
    style: PropertyId,
    color: PropertyId,
) {
    if let Some(w) = b.width {
        set(slots, width, PropertyValue::Length(w));
    }
    if let Some(s) = b.style {
        set(slots, style, PropertyValue::Keyword(style_to_keyword(s)));
    } else if b.width.is_some() {
        // A bare width implies a solid border; width without style renders
        // nothing per the border model.
        set(slots, style, PropertyValue::Keyword(style_to_keyword(BorderStyle::Solid)));
    }
    if let Some(c) = b.color {
        set(slots, color, PropertyValue::Color(c));
    }
}

fn style_to_keyword(style: BorderStyle) -> Keyword {
    match style {
        BorderStyle::None => Keyword::NoDecoration,
        BorderStyle::Hidden => Keyword::Hidden,
        BorderStyle::Dotted => Keyword::Dotted,
        BorderStyle::Dashed => Keyword::Dashed,
        BorderStyle::Solid => Keyword::Solid,
        BorderStyle::Double => Keyword::Double,
        BorderStyle::Groove => Keyword::Groove,
        BorderStyle::Ridge => Keyword::Ridge,
        BorderStyle::Inset => Keyword::Inset,
        BorderStyle::Outset => Keyword::Outset,
    }
}

fn keyword_to_style(k: Keyword) -> BorderStyle {
    match k {
        Keyword::Hidden => BorderStyle::Hidden,
        Keyword::Dotted => BorderStyle::Dotted,
        Keyword::Dashed => BorderStyle::Dashed,
        Keyword::Solid => BorderStyle::Solid,
        Keyword::Double => BorderStyle::Double,
        Keyword::Groove => BorderStyle::Groove,
        Keyword::Ridge => BorderStyle::Ridge,
        Keyword::Inset => BorderStyle::Inset,
        Keyword::Outset => BorderStyle::Outset,
        _ => BorderStyle::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fo::{FoElement, FoTree};

    fn styled(attrs: &[(&str, &str)], parent_attrs: &[(&str, &str)]) -> Vec<ResolvedStyle> {
        let mut tree = FoTree::new();
        let root = tree.push(FoElement::Root, None);
        let parent = tree.push(FoElement::Block, Some(root));
        for (k, v) in parent_attrs {
            tree.set_attribute(parent, k.to_string(), v.to_string());
        }
        let child = tree.push(FoElement::Block, Some(parent));
        for (k, v) in attrs {
            tree.set_attribute(child, k.to_string(), v.to_string());
        }
        let mut sink = DiagnosticSink::new();
        resolve_styles(&tree, &mut sink)
    }

    #[test]
    fn initial_values_fill_every_slot() {
        let styles = styled(&[], &[]);
        let child = &styles[2];
        assert_eq!(child.font_size(), 12.0);
        assert_eq!(child.text_align(), TextAlignment::Start);
        assert_eq!(child.margin(0.0), Edges::default());
        assert_eq!(child.keep_with_next(), KeepStrength::Auto);
        assert!((child.line_height() - 14.4).abs() < 1e-9);
    }

    #[test]
    fn inherited_properties_flow_from_parent_computed() {
        let styles = styled(&[], &[("font-size", "18pt"), ("color", "#ff0000")]);
        let child = &styles[2];
        assert_eq!(child.font_size(), 18.0);
        assert_eq!(child.color(), Color::rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn non_inherited_properties_reset_to_initial() {
        let styles = styled(&[], &[("margin-left", "20pt"), ("space-before", "10pt")]);
        let child = &styles[2];
        assert_eq!(child.margin(0.0).left, 0.0);
        assert_eq!(child.space_before(), SpaceSpec::ZERO);
    }

    #[test]
    fn font_size_percent_resolves_against_parent() {
        let styles = styled(&[("font-size", "120%")], &[("font-size", "10pt")]);
        assert!((styles[2].font_size() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn em_resolves_against_own_font_size() {
        let styles = styled(&[("font-size", "20pt"), ("margin-top", "2em")], &[]);
        assert_eq!(styles[2].margin(0.0).top, 40.0);
    }

    #[test]
    fn dimension_percent_stays_symbolic() {
        let styles = styled(&[("width", "50%")], &[]);
        assert_eq!(styles[2].width(400.0), Some(200.0));
        assert_eq!(styles[2].width(100.0), Some(50.0));
    }

    #[test]
    fn margin_shorthand_expands() {
        let styles = styled(&[("margin", "1pt 2pt 3pt 4pt")], &[]);
        let m = styles[2].margin(0.0);
        assert_eq!((m.top, m.right, m.bottom, m.left), (1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn border_shorthand_sets_all_sides() {
        let styles = styled(&[("border", "1pt solid red")], &[]);
        let b = styles[2].borders();
        assert_eq!(b.top.width, 1.0);
        assert_eq!(b.left.style, BorderStyle::Solid);
        assert_eq!(b.bottom.color, Color::rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn border_without_style_has_zero_used_width() {
        let styles = styled(&[("border-top-width", "3pt")], &[]);
        assert_eq!(styles[2].borders().top.width, 0.0);
    }

    #[test]
    fn compound_space_components() {
        let styles = styled(
            &[
                ("space-before.minimum", "2pt"),
                ("space-before.optimum", "6pt"),
                ("space-before.maximum", "10pt"),
                ("space-before.conditionality", "retain"),
            ],
            &[],
        );
        let s = styles[2].space_before();
        assert_eq!((s.minimum, s.optimum, s.maximum), (2.0, 6.0, 10.0));
        assert!(!s.discard);
    }

    #[test]
    fn plain_space_sets_all_three() {
        let styles = styled(&[("space-after", "8pt")], &[]);
        let s = styles[2].space_after();
        assert_eq!((s.minimum, s.optimum, s.maximum), (8.0, 8.0, 8.0));
        assert!(s.discard);
    }

    #[test]
    fn keeps_parse_tri_state() {
        let styles = styled(
            &[("keep-with-next", "always"), ("keep-together.within-page", "3")],
            &[],
        );
        assert_eq!(styles[2].keep_with_next(), KeepStrength::Always);
        assert_eq!(styles[2].keep_together(), KeepStrength::Strength(3));
    }

    #[test]
    fn unknown_property_diagnosed_not_fatal() {
        let mut tree = FoTree::new();
        let root = tree.push(FoElement::Root, None);
        let block = tree.push(FoElement::Block, Some(root));
        tree.set_attribute(block, "colour".into(), "red".into());
        let mut sink = DiagnosticSink::new();
        let styles = resolve_styles(&tree, &mut sink);
        assert!(sink.has("unknown-property"));
        assert_eq!(styles[1].color(), Color::BLACK);
    }

    #[test]
    fn unparseable_value_falls_back_to_initial() {
        let styles = styled(&[("margin-top", "banana")], &[]);
        assert_eq!(styles[2].margin(0.0).top, 0.0);
    }

    #[test]
    fn unsupported_writing_mode_degrades_with_diagnostic() {
        let mut tree = FoTree::new();
        let root = tree.push(FoElement::Root, None);
        tree.set_attribute(root, "writing-mode".into(), "rl-tb".into());
        let mut sink = DiagnosticSink::new();
        let styles = resolve_styles(&tree, &mut sink);
        assert!(sink.has("unsupported-writing-mode"));
        assert!(styles[0].is_lr_tb());
    }

    #[test]
    fn resolution_is_deterministic() {
        let a = styled(&[("font-size", "14pt"), ("margin", "3pt")], &[("color", "navy")]);
        let b = styled(&[("font-size", "14pt"), ("margin", "3pt")], &[("color", "navy")]);
        assert_eq!(a[2].font_size(), b[2].font_size());
        assert_eq!(a[2].color(), b[2].color());
        assert_eq!(a[2].margin(0.0), b[2].margin(0.0));
    }
}
