//! # Paragraph Formatting
//!
//! Turns the inline content of a block into geometry: linearize into a
//! box/glue/penalty item stream, choose break points (greedy here, optimal in
//! [`knuth_plass`]), then stamp [`LineArea`]s and [`InlineArea`]s with
//! absolute-in-paragraph coordinates.
//!
//! Glyph widths come from the [`FontMetrics`] service; hyphenation break
//! offsets from the [`HyphenationEngine`]; neither is computed here.

pub mod knuth_plass;

use std::collections::BTreeMap;

use crate::area::{
    Area, Color, ImageArea, LeaderArea, LeaderPattern, LineArea, InlineArea, LinkArea, LinkTarget,
    Rect, TextDecoration,
};
use crate::config::{LayoutOptions, LineBreaking};
use crate::diagnostics::DiagnosticSink;
use crate::error::LayoutError;
use crate::fo::{FoElement, FoTree, NodeId};
use crate::properties::{ResolvedStyle, TextAlignment};
use crate::services::{BaseDirection, FontSpec, Services};

/// Resolved inline style shared by a run of characters.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: FontSpec,
    pub size: f64,
    pub color: Color,
    pub decoration: Option<TextDecoration>,
    pub baseline_shift: f64,
    pub background: Option<Color>,
    pub link: Option<LinkTarget>,
}

impl TextStyle {
    fn from_resolved(style: &ResolvedStyle, link: Option<LinkTarget>) -> Self {
        Self {
            font: style.font(),
            size: style.font_size(),
            color: style.color(),
            decoration: style.text_decoration(),
            baseline_shift: style.baseline_shift(),
            background: style.background(),
            link,
        }
    }
}

/// What a box item carries.
#[derive(Debug, Clone)]
pub enum BoxPayload {
    /// A glyph cluster (word or word fragment).
    Text { text: String, style: usize },
    /// An inline graphic, pre-sized. `svg` holds foreign-object markup for
    /// the converter service; assembly invokes it per placed area.
    Image {
        src: String,
        width: f64,
        height: f64,
        intrinsic_width: f64,
        intrinsic_height: f64,
        svg: Option<String>,
    },
    /// An expandable leader; assembly gives it the line's residual slack.
    Leader { pattern: LeaderPattern, color: Color, min_width: f64, opt_width: Option<f64> },
}

/// One item of the linearized inline stream.
#[derive(Debug, Clone)]
pub enum InlineItem {
    Box { width: f64, ascent: f64, descent: f64, payload: BoxPayload },
    Glue { width: f64, stretch: f64, shrink: f64, style: usize },
    /// `cost = -∞` forces a break, `+∞` forbids one; `flagged` marks a hyphen.
    Penalty { width: f64, cost: f64, flagged: bool, style: usize },
}

impl InlineItem {
    pub fn is_box(&self) -> bool {
        matches!(self, InlineItem::Box { .. })
    }

    pub fn width(&self) -> f64 {
        match self {
            InlineItem::Box { width, .. }
            | InlineItem::Glue { width, .. }
            | InlineItem::Penalty { width, .. } => *width,
        }
    }
}

/// A block's inline content, linearized and ready for line breaking.
#[derive(Debug, Default)]
pub struct Paragraph {
    pub items: Vec<InlineItem>,
    pub styles: Vec<TextStyle>,
    /// Footnote bodies anchored at an item index (their citation).
    pub footnotes: Vec<(usize, NodeId)>,
}

impl Paragraph {
    pub fn is_empty(&self) -> bool {
        !self.items.iter().any(InlineItem::is_box)
    }
}

/// Values the builder needs from the surrounding page state.
pub struct ParagraphContext<'a> {
    /// 1-based number of the page currently being filled.
    pub page_number: u32,
    /// Pages on which an `id` has already been committed.
    pub id_pages: &'a BTreeMap<String, u32>,
    /// Marker registry of the page, present only while laying out static
    /// content (retrieval depends on what actually landed on the page).
    pub markers: Option<&'a crate::pagination::markers::MarkerRegistry>,
}

/// One chosen line: items `[start, end]` with `end` the break item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChosenLine {
    pub start: usize,
    pub end: usize,
    pub ratio: f64,
    /// Break is at a flagged (hyphen) penalty.
    pub flagged: bool,
}

// ─── Item stream construction ───────────────────────────────────

struct ItemBuilder<'a> {
    tree: &'a FoTree,
    styles: &'a [ResolvedStyle],
    services: &'a Services,
    options: &'a LayoutOptions,
    ctx: &'a ParagraphContext<'a>,
    out: Paragraph,
}

/// Linearize the inline content of `block` into an item stream.
pub fn build_paragraph(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    services: &Services,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
    block: NodeId,
    ctx: &ParagraphContext<'_>,
) -> Result<Paragraph, LayoutError> {
    let block_style = &styles[block];
    if options.enable_hyphenation && options.strict_layout {
        let lang = block_style.language();
        if !services.hyphenator.supports(lang) {
            return Err(LayoutError::ServiceUnavailable(format!(
                "no hyphenation patterns for language '{lang}'"
            )));
        }
    }

    let mut builder = ItemBuilder {
        tree,
        styles,
        services,
        options,
        ctx,
        out: Paragraph::default(),
    };
    builder.walk_inline(block, None, sink)?;
    builder.finish();
    Ok(builder.out)
}

impl<'a> ItemBuilder<'a> {
    fn style_index(&mut self, style: TextStyle) -> usize {
        if let Some(pos) = self.out.styles.iter().position(|s| *s == style) {
            return pos;
        }
        self.out.styles.push(style);
        self.out.styles.len() - 1
    }

    fn walk_inline(
        &mut self,
        node: NodeId,
        link: Option<&LinkTarget>,
        sink: &mut DiagnosticSink,
    ) -> Result<(), LayoutError> {
        for &child in self.tree.children(node) {
            let element = self.tree.node(child).element;
            match element {
                FoElement::Text => {
                    let text = self.tree.node(child).text.clone().unwrap_or_default();
                    if !text.is_empty() {
                        self.push_text(&text, child, link.cloned());
                    }
                }
                FoElement::Inline | FoElement::InlineContainer => {
                    self.walk_inline(child, link, sink)?;
                }
                FoElement::BasicLink => {
                    let target = self
                        .tree
                        .attr(child, "internal-destination")
                        .map(|d| LinkTarget::Internal(d.to_string()))
                        .or_else(|| {
                            self.tree
                                .attr(child, "external-destination")
                                .map(|d| LinkTarget::External(d.to_string()))
                        });
                    if target.is_none() {
                        sink.warn("link-without-destination", "basic-link has no destination");
                    }
                    self.walk_inline(child, target.as_ref().or(link), sink)?;
                }
                FoElement::Character => {
                    if let Some(ch) = self.tree.attr(child, "character") {
                        let ch = ch.to_string();
                        self.push_text(&ch, child, link.cloned());
                    }
                }
                FoElement::PageNumber => {
                    let text = self.ctx.page_number.to_string();
                    self.push_text(&text, child, link.cloned());
                }
                FoElement::PageNumberCitation => {
                    let text = match self.tree.attr(child, "ref-id") {
                        Some(id) => match self.ctx.id_pages.get(id) {
                            Some(page) => page.to_string(),
                            None => {
                                sink.warn(
                                    "unresolved-citation",
                                    format!("page-number-citation '{id}' is not yet placed"),
                                );
                                "?".to_string()
                            }
                        },
                        None => {
                            sink.warn("unresolved-citation", "page-number-citation without ref-id");
                            "?".to_string()
                        }
                    };
                    self.push_text(&text, child, link.cloned());
                }
                FoElement::Leader => {
                    self.push_leader(child);
                }
                FoElement::RetrieveMarker => {
                    if let Some(registry) = self.ctx.markers {
                        if let Some(class) = self.tree.attr(child, "retrieve-class-name") {
                            let position = self.styles[child].retrieve_position();
                            if let Some(marker) = registry.retrieve(class, position) {
                                self.walk_inline(marker, link, sink)?;
                            }
                        }
                    }
                }
                FoElement::ExternalGraphic => {
                    self.push_graphic(child, sink)?;
                }
                FoElement::InstreamForeignObject => {
                    self.push_foreign_object(child, sink);
                }
                FoElement::Footnote => {
                    // Citation is the inline child; the body queues for the
                    // bottom of the hosting page.
                    let body = self.tree.find_child(child, FoElement::FootnoteBody);
                    for &fc in self.tree.children(child) {
                        if self.tree.node(fc).element != FoElement::FootnoteBody {
                            self.walk_inline_single(fc, link, sink)?;
                        }
                    }
                    if let Some(body) = body {
                        let anchor = self.out.items.len().saturating_sub(1);
                        self.out.footnotes.push((anchor, body));
                    }
                }
                // Markers and block-level children are not part of the
                // paragraph stream.
                FoElement::Marker | FoElement::Float | FoElement::Block
                | FoElement::BlockContainer | FoElement::Table | FoElement::ListBlock => {}
                _ => {}
            }
        }
        Ok(())
    }

    fn walk_inline_single(
        &mut self,
        node: NodeId,
        link: Option<&LinkTarget>,
        sink: &mut DiagnosticSink,
    ) -> Result<(), LayoutError> {
        match self.tree.node(node).element {
            FoElement::Text => {
                let text = self.tree.node(node).text.clone().unwrap_or_default();
                if !text.is_empty() {
                    self.push_text(&text, node, link.cloned());
                }
                Ok(())
            }
            _ => self.walk_inline(node, link, sink),
        }
    }

    /// Split a text run into word boxes and space glue, with forced breaks
    /// for preserved newlines and hyphenation penalties inside long words.
    fn push_text(&mut self, text: &str, node: NodeId, link: Option<LinkTarget>) {
        let style = &self.styles[node];
        let hyphenate = self.options.enable_hyphenation || style.hyphenate();
        let lang = if style.language() == "en-US" && !self.options.hyphenation_language.is_empty() {
            self.options.hyphenation_language.clone()
        } else {
            style.language().to_string()
        };
        let text_style = TextStyle::from_resolved(style, link);
        let font = text_style.font.clone();
        let size = text_style.size;
        let style_idx = self.style_index(text_style);

        let space_width = self.services.fonts.measure_glyph(&font, size, ' ').advance;
        let stretch = space_width * self.options.knuth_plass_space_stretch_ratio;
        let shrink = space_width * self.options.knuth_plass_space_shrink_ratio;
        let (ascent, descent) = self.services.fonts.face_extent(&font, size);

        let text = self.reorder_for_direction(text);

        let mut word = String::new();
        let mut flush_word = |builder: &mut ItemBuilder<'a>, word: &mut String| {
            if word.is_empty() {
                return;
            }
            builder.push_word(word, &font, size, ascent, descent, style_idx, hyphenate, &lang);
            word.clear();
        };

        for ch in text.chars() {
            match ch {
                ' ' => {
                    flush_word(self, &mut word);
                    self.out.items.push(InlineItem::Glue {
                        width: space_width,
                        stretch,
                        shrink,
                        style: style_idx,
                    });
                }
                '\n' | '\r' | '\u{2028}' => {
                    flush_word(self, &mut word);
                    // A forced break: infinite-stretch glue then −∞ penalty.
                    self.out.items.push(InlineItem::Glue {
                        width: 0.0,
                        stretch: 1e7,
                        shrink: 0.0,
                        style: style_idx,
                    });
                    self.out.items.push(InlineItem::Penalty {
                        width: 0.0,
                        cost: f64::NEG_INFINITY,
                        flagged: false,
                        style: style_idx,
                    });
                }
                _ => word.push(ch),
            }
        }
        flush_word(self, &mut word);
    }

    fn push_word(
        &mut self,
        word: &str,
        font: &FontSpec,
        size: f64,
        ascent: f64,
        descent: f64,
        style: usize,
        hyphenate: bool,
        lang: &str,
    ) {
        let breaks = if hyphenate && word.chars().count() >= self.options.hyphenation_min_word_length
        {
            self.services.hyphenator.find_breaks(word, lang)
        } else {
            Vec::new()
        };

        if breaks.is_empty() {
            let width = self.services.fonts.measure_run(font, size, word);
            self.out.items.push(InlineItem::Box {
                width,
                ascent,
                descent,
                payload: BoxPayload::Text { text: word.to_string(), style },
            });
            return;
        }

        let hyphen_width = self.services.fonts.measure_glyph(font, size, '-').advance;
        let chars: Vec<char> = word.chars().collect();
        let mut at = 0usize;
        for &offset in &breaks {
            let fragment: String = chars[at..offset].iter().collect();
            let width = self.services.fonts.measure_run(font, size, &fragment);
            self.out.items.push(InlineItem::Box {
                width,
                ascent,
                descent,
                payload: BoxPayload::Text { text: fragment, style },
            });
            self.out.items.push(InlineItem::Penalty {
                width: hyphen_width,
                cost: self.options.knuth_plass_hyphen_penalty,
                flagged: true,
                style,
            });
            at = offset;
        }
        let tail: String = chars[at..].iter().collect();
        let width = self.services.fonts.measure_run(font, size, &tail);
        self.out.items.push(InlineItem::Box {
            width,
            ascent,
            descent,
            payload: BoxPayload::Text { text: tail, style },
        });
    }

    /// Reorder RTL runs into visual order via the bidi service. Pure LTR text
    /// passes through untouched.
    fn reorder_for_direction(&self, text: &str) -> String {
        let runs = self.services.bidi.resolve_paragraph(text, BaseDirection::LeftToRight);
        if runs.len() <= 1 && runs.iter().all(|r| r.level % 2 == 0) {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        for run in runs {
            let slice = &text[run.range.clone()];
            if run.level % 2 == 1 {
                out.extend(slice.chars().rev());
            } else {
                out.push_str(slice);
            }
        }
        out
    }

    fn push_leader(&mut self, node: NodeId) {
        let style = &self.styles[node];
        let pattern = style.leader_pattern();
        let color = style.color();
        let opt_width = style.leader_length(0.0);
        self.out.items.push(InlineItem::Box {
            width: opt_width.unwrap_or(12.0),
            ascent: style.font_size() * 0.7,
            descent: 0.0,
            payload: BoxPayload::Leader {
                pattern,
                color,
                min_width: opt_width.unwrap_or(12.0),
                opt_width,
            },
        });
    }

    fn push_graphic(&mut self, node: NodeId, sink: &mut DiagnosticSink) -> Result<(), LayoutError> {
        let style = &self.styles[node];
        let src = self.tree.attr(node, "src").unwrap_or_default().to_string();

        let mut intrinsic = (0.0f64, 0.0f64);
        if !src.is_empty() {
            match crate::services::read_graphic_bytes(&src) {
                Ok(bytes) => {
                    if bytes.len() as u64 > self.options.max_image_size_bytes {
                        return Err(LayoutError::LimitExceeded {
                            guard: "max-image-size-bytes",
                            limit: self.options.max_image_size_bytes,
                        });
                    }
                    match self.services.images.decode(&bytes) {
                        Ok(info) => {
                            let scale = 72.0 / if info.dpi > 0.0 { info.dpi } else { self.options.default_image_dpi };
                            intrinsic = (
                                info.intrinsic_width_px as f64 * scale,
                                info.intrinsic_height_px as f64 * scale,
                            );
                        }
                        Err(e) => sink.warn("image-decode-failed", e),
                    }
                }
                Err(e) => sink.warn("image-missing", e),
            }
        } else {
            sink.warn("image-missing", "external-graphic without src");
        }

        if intrinsic.0 <= 0.0 || intrinsic.1 <= 0.0 {
            // Placeholder box so layout can proceed.
            intrinsic = (36.0, 36.0);
        }

        let width = style.content_width(intrinsic.0).unwrap_or(intrinsic.0);
        let height = style
            .content_height()
            .unwrap_or_else(|| width * intrinsic.1 / intrinsic.0);

        self.out.items.push(InlineItem::Box {
            width,
            ascent: height,
            descent: 0.0,
            payload: BoxPayload::Image {
                src,
                width,
                height,
                intrinsic_width: intrinsic.0,
                intrinsic_height: intrinsic.1,
                svg: None,
            },
        });
        Ok(())
    }

    fn push_foreign_object(&mut self, node: NodeId, sink: &mut DiagnosticSink) {
        let style = &self.styles[node];
        let width = style.content_width(0.0).unwrap_or(72.0);
        let height = style.content_height().unwrap_or(72.0);
        // The reader keeps foreign markup only as character data; the
        // converter gets whatever survived.
        let markup = self.tree.text_content(node);
        let svg = if self.services.svg.is_some() && !markup.trim().is_empty() {
            Some(markup)
        } else {
            if self.services.svg.is_none() {
                sink.warn(
                    "svg-unavailable",
                    "no SVG converter registered; instream-foreign-object rendered as placeholder",
                );
            }
            None
        };
        self.out.items.push(InlineItem::Box {
            width,
            ascent: height,
            descent: 0.0,
            payload: BoxPayload::Image {
                src: String::new(),
                width,
                height,
                intrinsic_width: width,
                intrinsic_height: height,
                svg,
            },
        });
    }

    /// Terminate the stream: infinite-stretch glue plus a forced break.
    fn finish(&mut self) {
        // Drop trailing glue so the last line does not end in a space.
        while matches!(self.out.items.last(), Some(InlineItem::Glue { .. })) {
            self.out.items.pop();
        }
        if self.out.items.is_empty() {
            return;
        }
        let style = self.out.styles.len().saturating_sub(1);
        self.out.items.push(InlineItem::Glue { width: 0.0, stretch: 1e7, shrink: 0.0, style });
        self.out.items.push(InlineItem::Penalty {
            width: 0.0,
            cost: f64::NEG_INFINITY,
            flagged: false,
            style,
        });
    }
}

// ─── Break selection ────────────────────────────────────────────

/// Is `items[i]` a legal break candidate?
fn is_break_candidate(items: &[InlineItem], i: usize) -> bool {
    match &items[i] {
        InlineItem::Penalty { cost, .. } => *cost < f64::INFINITY,
        InlineItem::Glue { .. } => i > 0 && items[i - 1].is_box(),
        InlineItem::Box { .. } => false,
    }
}

/// Greedy first-fit breaking: accumulate width, break at the last candidate
/// before overflow. O(n).
pub fn break_greedy(items: &[InlineItem], target: f64) -> Vec<ChosenLine> {
    let mut lines = Vec::new();
    let mut start = skip_leading_glue(items, 0);
    let mut width = 0.0;
    let mut last_candidate: Option<usize> = None;
    let mut i = start;

    while i < items.len() {
        if is_break_candidate(items, i) {
            let forced = matches!(&items[i], InlineItem::Penalty { cost, .. } if cost.is_infinite() && *cost < 0.0);
            if forced {
                lines.push(make_line(items, start, i, target));
                start = skip_leading_glue(items, i + 1);
                width = 0.0;
                last_candidate = None;
                i = start;
                continue;
            }
            last_candidate = Some(i);
        }

        let item_width = match &items[i] {
            InlineItem::Box { width, .. } => *width,
            InlineItem::Glue { width, .. } => *width,
            InlineItem::Penalty { .. } => 0.0,
        };

        if items[i].is_box() && width + item_width > target && i > start {
            // Overflow: break at the last candidate, or force a break right
            // before this box when a single word exceeds the measure.
            let break_at = last_candidate.unwrap_or_else(|| (i - 1).max(start));
            lines.push(make_line(items, start, break_at, target));
            start = skip_leading_glue(items, break_at + 1);
            width = 0.0;
            last_candidate = None;
            i = start;
            continue;
        }

        width += item_width;
        i += 1;
    }

    if start < items.len() {
        lines.push(make_line(items, start, items.len() - 1, target));
    }
    drop_trailing_empty_line(items, &mut lines);
    lines
}

/// The paragraph-final filler glue and forced penalty can leave a line with
/// no boxes at the end; it carries no content and is dropped.
pub(crate) fn drop_trailing_empty_line(items: &[InlineItem], lines: &mut Vec<ChosenLine>) {
    while lines.len() > 1 {
        let last = lines.last().expect("len > 1");
        let has_box = (last.start..=last.end.min(items.len() - 1)).any(|i| items[i].is_box());
        if has_box {
            break;
        }
        lines.pop();
    }
}

fn skip_leading_glue(items: &[InlineItem], mut i: usize) -> usize {
    while i < items.len() && matches!(items[i], InlineItem::Glue { .. }) {
        i += 1;
    }
    i
}

/// Finish a line `[start, end]` and compute its adjustment ratio.
fn make_line(items: &[InlineItem], start: usize, end: usize, target: f64) -> ChosenLine {
    let (natural, stretch, shrink) = line_measures(items, start, end);
    let ratio = adjustment_ratio(natural, stretch, shrink, target);
    let flagged = matches!(&items[end], InlineItem::Penalty { flagged: true, .. });
    ChosenLine { start, end, ratio, flagged }
}

/// Natural width, total stretch, and total shrink of a line `[start, end]`.
/// Trailing glue at the break is excluded; a penalty break contributes its
/// width (the hyphen).
pub(crate) fn line_measures(items: &[InlineItem], start: usize, end: usize) -> (f64, f64, f64) {
    let mut natural = 0.0;
    let mut stretch = 0.0;
    let mut shrink = 0.0;
    for i in start..=end.min(items.len() - 1) {
        match &items[i] {
            InlineItem::Box { width, .. } => natural += width,
            InlineItem::Glue { width, stretch: st, shrink: sh, .. } => {
                if i != end {
                    natural += width;
                    stretch += st;
                    shrink += sh;
                }
            }
            InlineItem::Penalty { width, .. } => {
                if i == end {
                    natural += width;
                }
            }
        }
    }
    (natural, stretch, shrink)
}

pub(crate) fn adjustment_ratio(natural: f64, stretch: f64, shrink: f64, target: f64) -> f64 {
    if (natural - target).abs() < f64::EPSILON {
        0.0
    } else if natural < target {
        if stretch > 0.0 { (target - natural) / stretch } else { f64::INFINITY }
    } else if shrink > 0.0 {
        (target - natural) / shrink
    } else {
        f64::NEG_INFINITY
    }
}

/// Break a paragraph with the configured strategy. The optimal breaker falls
/// back to greedy (with a diagnostic) when no feasible break set exists even
/// after tolerance widening.
pub fn break_lines(
    paragraph: &Paragraph,
    target: f64,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
) -> Vec<ChosenLine> {
    match options.line_breaking {
        LineBreaking::Greedy => break_greedy(&paragraph.items, target),
        LineBreaking::Optimal => {
            let config = knuth_plass::KnuthPlassConfig {
                target,
                tolerance: options.knuth_plass_tolerance,
                line_penalty: options.knuth_plass_line_penalty,
                flagged_demerit: options.knuth_plass_flagged_demerit,
                fitness_demerit: options.knuth_plass_fitness_demerit,
            };
            match knuth_plass::break_optimal(&paragraph.items, &config) {
                Some(lines) => lines,
                None => {
                    sink.warn(
                        "overfull-line",
                        "no feasible optimal break set; falling back to first-fit",
                    );
                    break_greedy(&paragraph.items, target)
                }
            }
        }
    }
}

// ─── Line assembly ──────────────────────────────────────────────

/// The assembled geometry of a paragraph, in paragraph-local coordinates
/// (x = 0 at the content-rect left edge, y = 0 at the paragraph top).
#[derive(Debug, Default)]
pub struct AssembledParagraph {
    pub lines: Vec<LineArea>,
    /// Inline images and leaders, positioned within their line band.
    pub extras: Vec<Area>,
    pub links: Vec<LinkArea>,
    /// Footnote bodies anchored per line, in line order.
    pub line_footnotes: Vec<Vec<NodeId>>,
    pub height: f64,
}

/// Stamp geometry for chosen lines.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    paragraph: &Paragraph,
    chosen: &[ChosenLine],
    align: TextAlignment,
    align_last: Option<TextAlignment>,
    content_width: f64,
    nominal_line_height: f64,
    first_line_indent: f64,
    services: &Services,
) -> AssembledParagraph {
    let mut out = AssembledParagraph::default();
    let mut y = 0.0;

    for (line_idx, line) in chosen.iter().enumerate() {
        let is_last = line_idx == chosen.len() - 1;
        let indent = if line_idx == 0 { first_line_indent } else { 0.0 };
        let target = content_width - indent;

        let (natural, stretch, shrink) = line_measures(&paragraph.items, line.start, line.end);
        let slack = target - natural;

        // Leaders soak up the whole slack before alignment distributes it.
        let leader_count = (line.start..=line.end)
            .filter(|&i| {
                matches!(
                    &paragraph.items[i],
                    InlineItem::Box { payload: BoxPayload::Leader { .. }, .. }
                )
            })
            .count();
        let leader_extra = if leader_count > 0 && slack > 0.0 {
            slack / leader_count as f64
        } else {
            0.0
        };

        let effective_align = if is_last {
            match align_last {
                Some(a) => a,
                None => {
                    if align == TextAlignment::Justify { TextAlignment::Start } else { align }
                }
            }
        } else {
            align
        };

        let justify = effective_align == TextAlignment::Justify && leader_count == 0;
        let ratio = if justify {
            adjustment_ratio(natural, stretch, shrink, target).clamp(-1.0, f64::INFINITY)
        } else if slack < 0.0 && shrink > 0.0 {
            // Overfull lines shrink toward fitting regardless of alignment.
            (slack / shrink).max(-1.0)
        } else {
            0.0
        };

        // Line extents.
        let mut max_ascent: f64 = 0.0;
        let mut max_descent: f64 = 0.0;
        for i in line.start..=line.end {
            if let InlineItem::Box { ascent, descent, .. } = &paragraph.items[i] {
                max_ascent = max_ascent.max(*ascent);
                max_descent = max_descent.max(*descent);
            }
        }
        if max_ascent == 0.0 && max_descent == 0.0 {
            // An empty (forced-break) line still occupies one line height.
            max_ascent = nominal_line_height * 0.8;
            max_descent = nominal_line_height * 0.2;
        }
        let line_height = nominal_line_height.max(max_ascent + max_descent);
        let half_leading = (line_height - (max_ascent + max_descent)) / 2.0;
        let baseline = y + half_leading + max_ascent;

        // Width actually advanced, with justification and leader growth.
        let adjusted_width = if justify && ratio != 0.0 {
            target
        } else {
            natural + leader_extra * leader_count as f64
        };

        let x0 = indent
            + match effective_align {
                TextAlignment::Start | TextAlignment::Justify => 0.0,
                TextAlignment::Center => (target - adjusted_width).max(0.0) / 2.0,
                TextAlignment::End => (target - adjusted_width).max(0.0),
            };

        // Glue outside the [first box, last box] span was consumed by the
        // break (or is the paragraph-final filler) and must not advance.
        let first_box = (line.start..=line.end)
            .find(|&i| paragraph.items[i].is_box())
            .unwrap_or(line.start);
        let last_box = (line.start..=line.end)
            .rev()
            .find(|&i| paragraph.items[i].is_box())
            .unwrap_or(line.end);

        let mut inlines: Vec<InlineArea> = Vec::new();
        let mut x = x0;
        let mut run_text = String::new();
        let mut run_style: Option<usize> = None;
        let mut run_x = x0;
        let mut run_natural = 0.0;
        let mut run_gaps = 0usize;
        let mut footnotes_here: Vec<NodeId> = Vec::new();

        let per_gap = |st: f64, sh: f64| -> f64 {
            if ratio >= 0.0 { ratio * st } else { ratio * sh }
        };

        macro_rules! flush_run {
            () => {
                if let Some(style_idx) = run_style.take() {
                    if !run_text.is_empty() {
                        let style = &paragraph.styles[style_idx];
                        let gap_delta = if run_gaps > 0 && justify {
                            (x - run_x - run_natural) / run_gaps as f64
                        } else {
                            0.0
                        };
                        let (asc, desc) = services.fonts.face_extent(&style.font, style.size);
                        let rect = Rect::new(
                            run_x,
                            baseline - asc - style.baseline_shift,
                            run_natural,
                            asc + desc,
                        );
                        if let Some(link) = &style.link {
                            out.links.push(LinkArea { rect, target: link.clone() });
                        }
                        inlines.push(InlineArea {
                            rect,
                            text: std::mem::take(&mut run_text),
                            font: style.font.clone(),
                            font_size: style.size,
                            color: style.color,
                            decoration: style.decoration,
                            word_spacing: gap_delta,
                            baseline_offset: style.baseline_shift,
                            background: style.background,
                        });
                    } else {
                        run_text.clear();
                    }
                }
                run_natural = 0.0;
                run_gaps = 0;
            };
        }

        for i in line.start..=line.end {
            // Footnote citations anchored at this item belong to this line.
            for (anchor, body) in &paragraph.footnotes {
                if *anchor == i {
                    footnotes_here.push(*body);
                }
            }
            match &paragraph.items[i] {
                InlineItem::Box { width, payload, .. } => match payload {
                    BoxPayload::Text { text, style } => {
                        if run_style != Some(*style) {
                            flush_run!();
                            run_style = Some(*style);
                            run_x = x;
                        }
                        run_text.push_str(text);
                        run_natural += width;
                        x += width;
                    }
                    BoxPayload::Image { src, width: w, height: h, intrinsic_width, intrinsic_height, svg } => {
                        flush_run!();
                        let rect = Rect::new(x, baseline - h, *w, *h);
                        let converted = svg.as_ref().zip(services.svg.as_ref()).and_then(
                            |(markup, converter)| converter.render_to_areas(markup, rect).ok(),
                        );
                        match converted {
                            Some(subtree) => out.extras.extend(subtree),
                            None => out.extras.push(Area::Image(ImageArea {
                                rect,
                                src: src.clone(),
                                intrinsic_width: *intrinsic_width,
                                intrinsic_height: *intrinsic_height,
                            })),
                        }
                        x += w;
                        run_x = x;
                    }
                    BoxPayload::Leader { pattern, color, min_width, opt_width } => {
                        flush_run!();
                        let w = opt_width.unwrap_or(*min_width).max(*min_width) + leader_extra;
                        out.extras.push(Area::Leader(LeaderArea {
                            rect: Rect::new(x, baseline - 2.0, w, 2.0),
                            pattern: *pattern,
                            color: *color,
                        }));
                        x += w;
                        run_x = x;
                    }
                },
                InlineItem::Glue { width, stretch: st, shrink: sh, style } => {
                    if i <= first_box || i >= last_box {
                        continue;
                    }
                    let advance = width + if justify { per_gap(*st, *sh) } else if ratio < 0.0 { per_gap(*st, *sh) } else { 0.0 };
                    if run_style == Some(*style) {
                        run_text.push(' ');
                        run_natural += width;
                        run_gaps += 1;
                    } else {
                        flush_run!();
                        run_style = Some(*style);
                        run_x = x;
                        run_text.push(' ');
                        run_natural += width;
                        run_gaps += 1;
                    }
                    x += advance;
                }
                InlineItem::Penalty { width, flagged, style, .. } => {
                    if i == line.end && *flagged {
                        // Visible hyphen at the break.
                        if run_style != Some(*style) {
                            flush_run!();
                            run_style = Some(*style);
                            run_x = x;
                        }
                        run_text.push('-');
                        run_natural += width;
                        x += width;
                    }
                }
            }
        }
        flush_run!();

        let line_width = (x - x0).max(0.0);
        out.lines.push(LineArea {
            rect: Rect::new(x0, y, line_width, line_height),
            baseline,
            inlines,
        });
        out.line_footnotes.push(footnotes_here);
        y += line_height;
    }

    out.height = y;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fo::FoTree;
    use crate::properties::resolve_styles;

    fn paragraph_from(text: &str, options: &LayoutOptions) -> (Paragraph, Services) {
        let mut tree = FoTree::new();
        let root = tree.push(FoElement::Root, None);
        let block = tree.push(FoElement::Block, Some(root));
        tree.push_text(block, text.to_string());
        let mut sink = DiagnosticSink::new();
        let styles = resolve_styles(&tree, &mut sink);
        let services = Services::builtin(
            options.hyphenation_min_word_length,
            options.hyphenation_min_left_chars,
            options.hyphenation_min_right_chars,
        );
        let ctx = ParagraphContext { page_number: 1, id_pages: &BTreeMap::new(), markers: None };
        let para =
            build_paragraph(&tree, &styles, &services, options, &mut sink, block, &ctx).unwrap();
        (para, services)
    }

    #[test]
    fn stream_shape_words_and_glue() {
        let (para, _) = paragraph_from("Hello World", &LayoutOptions::default());
        let boxes = para.items.iter().filter(|i| i.is_box()).count();
        let glues = para
            .items
            .iter()
            .filter(|i| matches!(i, InlineItem::Glue { .. }))
            .count();
        assert_eq!(boxes, 2);
        // One inter-word glue plus the final infinite-stretch glue.
        assert_eq!(glues, 2);
        assert!(matches!(
            para.items.last(),
            Some(InlineItem::Penalty { cost, .. }) if *cost == f64::NEG_INFINITY
        ));
    }

    #[test]
    fn glue_dimensions_follow_options() {
        let (para, services) = paragraph_from("a b", &LayoutOptions::default());
        let space = services
            .fonts
            .measure_glyph(&FontSpec::default(), 12.0, ' ')
            .advance;
        let glue = para
            .items
            .iter()
            .find_map(|i| match i {
                InlineItem::Glue { width, stretch, shrink, .. } if *width > 0.0 => {
                    Some((*width, *stretch, *shrink))
                }
                _ => None,
            })
            .unwrap();
        assert!((glue.0 - space).abs() < 1e-9);
        assert!((glue.1 - space * 0.5).abs() < 1e-9);
        assert!((glue.2 - space * 0.333).abs() < 1e-9);
    }

    #[test]
    fn hyphenation_inserts_flagged_penalties() {
        let options = LayoutOptions { enable_hyphenation: true, ..Default::default() };
        let (para, _) = paragraph_from("extraordinary", &options);
        let flagged = para
            .items
            .iter()
            .filter(|i| matches!(i, InlineItem::Penalty { flagged: true, .. }))
            .count();
        assert!(flagged > 0, "expected hyphenation penalties");
        for item in &para.items {
            if let InlineItem::Penalty { flagged: true, cost, .. } = item {
                assert_eq!(*cost, 50.0);
            }
        }
    }

    #[test]
    fn greedy_single_line_when_it_fits() {
        let (para, _) = paragraph_from("Hello World", &LayoutOptions::default());
        let lines = break_greedy(&para.items, 500.0);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn greedy_wraps_at_spaces() {
        let (para, _) = paragraph_from("the quick brown fox jumps over the lazy dog", &LayoutOptions::default());
        let lines = break_greedy(&para.items, 100.0);
        assert!(lines.len() >= 2);
        // No line's natural shrunk width exceeds the measure.
        for line in &lines {
            let (natural, _, shrink) = line_measures(&para.items, line.start, line.end);
            assert!(natural - shrink <= 100.0 + 1e-6, "overfull line: {natural}");
        }
    }

    #[test]
    fn forced_break_honored() {
        let mut tree = FoTree::new();
        let root = tree.push(FoElement::Root, None);
        let block = tree.push(FoElement::Block, Some(root));
        tree.set_attribute(block, "white-space".into(), "pre".into());
        tree.push_text(block, "one\ntwo".into());
        let mut sink = DiagnosticSink::new();
        let styles = resolve_styles(&tree, &mut sink);
        let services = Services::default();
        let options = LayoutOptions::default();
        let ctx = ParagraphContext { page_number: 1, id_pages: &BTreeMap::new(), markers: None };
        let para =
            build_paragraph(&tree, &styles, &services, &options, &mut sink, block, &ctx).unwrap();
        let lines = break_greedy(&para.items, 500.0);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn justified_lines_fill_the_measure() {
        let options = LayoutOptions::default();
        let (para, services) = paragraph_from("the quick brown fox jumps over the lazy dog", &options);
        let target = 200.0;
        let chosen = break_greedy(&para.items, target);
        let assembled = assemble(
            &para,
            &chosen,
            TextAlignment::Justify,
            None,
            target,
            14.4,
            0.0,
            &services,
        );
        assert!(assembled.lines.len() >= 2);
        for (i, line) in assembled.lines.iter().enumerate() {
            let gaps: usize = line
                .inlines
                .iter()
                .map(|inl| inl.text.matches(' ').count())
                .sum();
            let sum: f64 = line.inlines.iter().map(|inl| inl.rect.width).sum();
            let total = sum
                + line
                    .inlines
                    .iter()
                    .map(|inl| inl.word_spacing * inl.text.matches(' ').count() as f64)
                    .sum::<f64>();
            if i < assembled.lines.len() - 1 && gaps > 0 {
                assert!(
                    (total - target).abs() < 0.01,
                    "line {i}: widths+deltas = {total}, want {target}"
                );
            } else {
                for inl in &line.inlines {
                    assert_eq!(inl.word_spacing, 0.0, "final line must not justify");
                }
            }
        }
    }

    #[test]
    fn line_height_uses_nominal_when_glyphs_are_smaller() {
        let (para, services) = paragraph_from("Hello", &LayoutOptions::default());
        let chosen = break_greedy(&para.items, 500.0);
        let assembled = assemble(
            &para,
            &chosen,
            TextAlignment::Start,
            None,
            500.0,
            14.4,
            0.0,
            &services,
        );
        assert_eq!(assembled.lines.len(), 1);
        assert!((assembled.lines[0].rect.height - 14.4).abs() < 1e-9);
        assert!((assembled.height - 14.4).abs() < 1e-9);
    }

    #[test]
    fn assembly_is_deterministic() {
        let (para, services) = paragraph_from("the quick brown fox jumps over the lazy dog", &LayoutOptions::default());
        let chosen = break_greedy(&para.items, 150.0);
        let a = assemble(&para, &chosen, TextAlignment::Justify, None, 150.0, 14.4, 0.0, &services);
        let b = assemble(&para, &chosen, TextAlignment::Justify, None, 150.0, 14.4, 0.0, &services);
        assert_eq!(a.lines.len(), b.lines.len());
        for (la, lb) in a.lines.iter().zip(&b.lines) {
            assert_eq!(la.rect, lb.rect);
            assert_eq!(la.inlines.len(), lb.inlines.len());
        }
    }
}
