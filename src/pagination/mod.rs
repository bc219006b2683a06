//! # Page Formatting
//!
//! The page is the fundamental unit of layout: every decision is made with
//! the page boundary as a hard constraint. The flow's blocks are first
//! *atomized* into indivisible vertical chunks (single lines, table row
//! groups, whole unbreakable boxes), then the page builder places atoms one
//! by one, recording a break candidate at every legal boundary. When an atom
//! does not fit, the builder rolls back to the best candidate (a cheap
//! truncation of the tentative list), re-queues the remainder, and commits
//! the page.
//!
//! Static-content regions are laid out *after* the page's flow content, so
//! marker retrieval sees what actually landed on the page.

pub mod breaks;
pub mod markers;
pub mod spaces;

use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crate::area::{
    AbsoluteArea, AbsoluteMode, Area, AreaTree, BlockArea, Bookmark, BorderSet, Color, Edges,
    FloatArea, FloatSide, LinkArea, PageViewport, Rect, TableArea, TableRowArea,
};
use crate::config::LayoutOptions;
use crate::diagnostics::DiagnosticSink;
use crate::error::LayoutError;
use crate::fo::{FoElement, FoTree, NodeId};
use crate::properties::parse::{BreakWhen, KeepStrength};
use crate::properties::{ForcePageCount, ResolvedStyle, SpaceSpec};
use crate::refine::LayoutClass;
use crate::services::Services;
use crate::table::TableLayout;
use crate::text::{self, ParagraphContext};
use breaks::{select_break, BreakCandidate};
use markers::MarkerRegistry;

// ─── Page masters ───────────────────────────────────────────────

#[derive(Debug, Clone)]
struct RegionDef {
    name: String,
    extent: f64,
}

#[derive(Debug, Clone)]
struct PageMaster {
    width: f64,
    height: f64,
    margin: Edges,
    body_margin: Edges,
    before: Option<RegionDef>,
    after: Option<RegionDef>,
    start: Option<RegionDef>,
    end: Option<RegionDef>,
}

impl PageMaster {
    /// The page content rectangle inside the master margins.
    fn content_rect(&self) -> Rect {
        Rect::new(
            self.margin.left,
            self.margin.top,
            self.width - self.margin.horizontal(),
            self.height - self.margin.vertical(),
        )
    }

    /// The region-body content rectangle.
    fn body_rect(&self) -> Rect {
        let content = self.content_rect();
        Rect::new(
            content.x + self.body_margin.left,
            content.y + self.body_margin.top,
            content.width - self.body_margin.horizontal(),
            content.height - self.body_margin.vertical(),
        )
    }

    fn region_rect(&self, name: &str) -> Option<Rect> {
        let content = self.content_rect();
        if self.before.as_ref().map(|r| r.name == name).unwrap_or(false) {
            let extent = self.before.as_ref().map(|r| r.extent).unwrap_or(0.0);
            return Some(Rect::new(content.x, content.y, content.width, extent));
        }
        if self.after.as_ref().map(|r| r.name == name).unwrap_or(false) {
            let extent = self.after.as_ref().map(|r| r.extent).unwrap_or(0.0);
            return Some(Rect::new(content.x, content.bottom() - extent, content.width, extent));
        }
        if self.start.as_ref().map(|r| r.name == name).unwrap_or(false) {
            let extent = self.start.as_ref().map(|r| r.extent).unwrap_or(0.0);
            return Some(Rect::new(content.x, content.y, extent, content.height));
        }
        if self.end.as_ref().map(|r| r.name == name).unwrap_or(false) {
            let extent = self.end.as_ref().map(|r| r.extent).unwrap_or(0.0);
            return Some(Rect::new(content.right() - extent, content.y, extent, content.height));
        }
        None
    }
}

fn collect_masters(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    options: &LayoutOptions,
) -> Result<BTreeMap<String, PageMaster>, LayoutError> {
    let root = tree
        .root()
        .ok_or_else(|| LayoutError::InvalidDocument("empty FO tree".into()))?;
    let master_set = tree
        .find_child(root, FoElement::LayoutMasterSet)
        .ok_or_else(|| LayoutError::InvalidDocument("missing layout-master-set".into()))?;

    let mut masters = BTreeMap::new();
    for &master in tree.children(master_set) {
        if tree.node(master).element != FoElement::SimplePageMaster {
            continue;
        }
        let name = tree
            .attr(master, "master-name")
            .ok_or_else(|| {
                LayoutError::InvalidDocument("simple-page-master without master-name".into())
            })?
            .to_string();
        let style = &styles[master];
        let (default_w, default_h) = options.default_page_size;
        let width = style.page_width().unwrap_or(default_w);
        let height = style.page_height().unwrap_or(default_h);
        let margin = style.margin(width);

        let mut def = PageMaster {
            width,
            height,
            margin,
            body_margin: Edges::default(),
            before: None,
            after: None,
            start: None,
            end: None,
        };
        for &region in tree.children(master) {
            let region_style = &styles[region];
            let extent = region_style.extent();
            let default_name = match tree.node(region).element {
                FoElement::RegionBody => "xsl-region-body",
                FoElement::RegionBefore => "xsl-region-before",
                FoElement::RegionAfter => "xsl-region-after",
                FoElement::RegionStart => "xsl-region-start",
                FoElement::RegionEnd => "xsl-region-end",
                _ => continue,
            };
            let name = tree.attr(region, "region-name").unwrap_or(default_name).to_string();
            match tree.node(region).element {
                FoElement::RegionBody => def.body_margin = region_style.margin(width),
                FoElement::RegionBefore => def.before = Some(RegionDef { name, extent }),
                FoElement::RegionAfter => def.after = Some(RegionDef { name, extent }),
                FoElement::RegionStart => def.start = Some(RegionDef { name, extent }),
                FoElement::RegionEnd => def.end = Some(RegionDef { name, extent }),
                _ => {}
            }
        }
        masters.insert(name, def);
    }
    if masters.is_empty() {
        return Err(LayoutError::InvalidDocument("no simple-page-master defined".into()));
    }
    Ok(masters)
}

// ─── Atoms ──────────────────────────────────────────────────────

/// A block a run of atoms belongs to. Emission rebuilds one [`BlockArea`]
/// fragment per page from maximal runs sharing a node, so a block split
/// across pages gets one fragment per page with borders suppressed at the
/// broken edges.
#[derive(Debug, Clone)]
struct WrapperSeg {
    node: NodeId,
    /// Border-box x and width, in flow-local coordinates.
    x: f64,
    width: f64,
    /// This atom is the node's first / last atom.
    first: bool,
    last: bool,
    margin: Edges,
    padding: Edges,
    borders: BorderSet,
    background: Option<Color>,
}

#[derive(Debug, Clone)]
enum AtomBody {
    /// Content at atom-local coordinates (y = 0 at atom top).
    Areas(Vec<Area>),
    /// One body chunk of a table.
    TableChunk { table: Rc<TableLayout>, index: usize, x: f64 },
}

/// An indivisible vertical chunk of flow content.
#[derive(Debug, Clone)]
struct Atom {
    height: f64,
    body: AtomBody,
    space_before: SpaceSpec,
    space_after: SpaceSpec,
    keep_before: KeepStrength,
    keep_after: KeepStrength,
    /// The boundary before this atom lies inside a keep-together block.
    keep_within: bool,
    break_before: BreakWhen,
    break_after: BreakWhen,
    footnotes: Vec<NodeId>,
    floats: Vec<NodeId>,
    absolutes: Vec<NodeId>,
    links: Vec<LinkArea>,
    ids: Vec<String>,
    markers_start: Vec<(String, NodeId)>,
    markers_end: Vec<(String, NodeId)>,
    wrappers: Vec<WrapperSeg>,
}

impl Atom {
    fn new(height: f64, body: AtomBody) -> Self {
        Self {
            height,
            body,
            space_before: SpaceSpec::ZERO,
            space_after: SpaceSpec::ZERO,
            keep_before: KeepStrength::Auto,
            keep_after: KeepStrength::Auto,
            keep_within: false,
            break_before: BreakWhen::Auto,
            break_after: BreakWhen::Auto,
            footnotes: Vec::new(),
            floats: Vec::new(),
            absolutes: Vec::new(),
            links: Vec::new(),
            ids: Vec::new(),
            markers_start: Vec::new(),
            markers_end: Vec::new(),
            wrappers: Vec::new(),
        }
    }

    fn table_ptr(&self) -> Option<*const TableLayout> {
        match &self.body {
            AtomBody::TableChunk { table, .. } => Some(Rc::as_ptr(table)),
            AtomBody::Areas(_) => None,
        }
    }
}

/// Combine a space specifier with a fixed margin contribution.
fn space_plus_fixed(space: SpaceSpec, fixed: f64) -> SpaceSpec {
    if fixed == 0.0 {
        return space;
    }
    SpaceSpec {
        minimum: space.minimum + fixed,
        optimum: space.optimum + fixed,
        maximum: space.maximum + fixed,
        precedence: space.precedence,
        // Margins are unconditional.
        discard: false,
    }
}

// ─── Static (unbounded-height) layout ───────────────────────────

/// Lay out the block-level content of `container` at a fixed width with no
/// page constraint: table cells, footnote bodies, floats, list items, and
/// static-content regions all flow through here. Returns areas at a (0,0)
/// local origin plus the content height.
#[allow(clippy::too_many_arguments)]
pub(crate) fn layout_block_content(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    classes: &[LayoutClass],
    services: &Services,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
    container: NodeId,
    width: f64,
    ctx: &ParagraphContext<'_>,
) -> Result<(Vec<Area>, f64), LayoutError> {
    let mut out: Vec<Area> = Vec::new();
    let mut y = 0.0f64;
    let mut prev_after: Option<SpaceSpec> = None;
    let mut saw_block = false;

    for &child in tree.children(container) {
        match classes[child] {
            LayoutClass::Block => {
                saw_block = true;
                let (area, outer_height, before, after) = if tree.node(child).element
                    == FoElement::ListBlock
                {
                    layout_list_static(
                        tree, styles, classes, services, options, sink, child, width, ctx,
                    )?
                } else {
                    layout_block_static(
                        tree, styles, classes, services, options, sink, child, width, ctx,
                    )?
                };
                let space = match prev_after.take() {
                    Some(prev) => spaces::collapse_pair(prev, before),
                    None => before,
                };
                // Content inside an unbounded box has no region edge; the
                // first space is discarded only when conditional.
                let at_edge = out.is_empty();
                y += spaces::resolve(space, at_edge).used;
                let mut area = area;
                area.shift(0.0, y);
                y += outer_height;
                prev_after = Some(after);
                out.push(area);
            }
            LayoutClass::Table => {
                saw_block = true;
                let layout = crate::table::layout_table(
                    tree, styles, classes, services, options, sink, child, width, ctx,
                )?;
                let space = match prev_after.take() {
                    Some(prev) => spaces::collapse_pair(prev, layout.space_before),
                    None => layout.space_before,
                };
                y += spaces::resolve(space, out.is_empty()).used;
                let (mut area, table_height) = assemble_full_table(&layout);
                area.shift(0.0, y);
                y += table_height + layout.margin.vertical();
                prev_after = Some(layout.space_after);
                out.push(area);
            }
            LayoutClass::Inline => {
                // Inline content directly inside the container: handled as a
                // single paragraph pass once below.
            }
            LayoutClass::Marker | LayoutClass::Float | LayoutClass::Footnote => {}
            LayoutClass::Structural => {
                if tree.node(child).element == FoElement::RetrieveMarker {
                    if let (Some(registry), Some(class)) =
                        (ctx.markers, tree.attr(child, "retrieve-class-name"))
                    {
                        let position = styles[child].retrieve_position();
                        if let Some(marker) = registry.retrieve(class, position) {
                            let (areas, h) = layout_block_content(
                                tree, styles, classes, services, options, sink, marker, width, ctx,
                            )?;
                            for mut area in areas {
                                area.shift(0.0, y);
                                out.push(area);
                            }
                            y += h;
                        }
                    }
                }
            }
            LayoutClass::Absolute | LayoutClass::Image => {}
        }
    }

    if !saw_block {
        // Pure inline content: the container itself is the paragraph.
        let paragraph = text::build_paragraph(
            tree, styles, services, options, sink, container, ctx,
        )?;
        if !paragraph.is_empty() {
            let style = &styles[container];
            let measure = if style.white_space().allows_wrap() { width } else { f64::INFINITY };
            let chosen = text::break_lines(&paragraph, measure, options, sink);
            let assembled = text::assemble(
                &paragraph,
                &chosen,
                style.text_align(),
                style.text_align_last(),
                width,
                style.line_height(),
                style.text_indent(width),
                services,
            );
            for line in assembled.lines {
                out.push(Area::Line(line));
            }
            out.extend(assembled.extras);
            y = assembled.height;
        }
    }

    Ok((out, y))
}

/// One block laid out statically: returns its area (local origin at the
/// block's margin-box top-left), outer height including margins, and its
/// space specifiers.
#[allow(clippy::too_many_arguments)]
fn layout_block_static(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    classes: &[LayoutClass],
    services: &Services,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
    block: NodeId,
    width: f64,
    ctx: &ParagraphContext<'_>,
) -> Result<(Area, f64, SpaceSpec, SpaceSpec), LayoutError> {
    let style = &styles[block];
    let margin = style.margin(width);
    let padding = style.padding(width);
    let borders = style.borders();

    let border_box_width =
        style.width(width).unwrap_or(width - margin.horizontal());
    let content_width = (border_box_width - padding.horizontal() - borders.horizontal()).max(0.0);

    let (children, content_height) = layout_block_content(
        tree, styles, classes, services, options, sink, block, content_width, ctx,
    )?;
    let mut children = children;
    for child in &mut children {
        child.shift(margin.left + borders.left.width + padding.left, borders.top.width + padding.top);
    }

    let box_height = content_height + padding.vertical() + borders.vertical();
    let area = Area::Block(BlockArea {
        rect: Rect::new(margin.left, 0.0, border_box_width, box_height),
        margin,
        padding,
        borders,
        background: style.background(),
        space_before: 0.0,
        space_after: 0.0,
        children,
    });
    Ok((area, box_height + margin.vertical(), style.space_before(), style.space_after()))
}

/// A list block in an unbounded context: each item's label and body sit side
/// by side at the provisional distances.
#[allow(clippy::too_many_arguments)]
fn layout_list_static(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    classes: &[LayoutClass],
    services: &Services,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
    list: NodeId,
    width: f64,
    ctx: &ParagraphContext<'_>,
) -> Result<(Area, f64, SpaceSpec, SpaceSpec), LayoutError> {
    let style = &styles[list];
    let margin = style.margin(width);
    let distance = style.provisional_distance_between_starts();
    let separation = style.provisional_label_separation();
    let box_width = width - margin.horizontal();
    let label_width = (distance - separation).max(0.0);
    let body_width = (box_width - distance).max(0.0);

    let mut children: Vec<Area> = Vec::new();
    let mut y = 0.0f64;
    for &item in &tree.children_of_kind(list, FoElement::ListItem) {
        let item_style = &styles[item];
        y += spaces::resolve(item_style.space_before(), y == 0.0).used;
        let mut item_height = 0.0f64;
        if let Some(label) = tree.find_child(item, FoElement::ListItemLabel) {
            let (areas, h) = layout_block_content(
                tree, styles, classes, services, options, sink, label, label_width, ctx,
            )?;
            for mut area in areas {
                area.shift(margin.left, y);
                children.push(area);
            }
            item_height = item_height.max(h);
        }
        if let Some(body) = tree.find_child(item, FoElement::ListItemBody) {
            let (areas, h) = layout_block_content(
                tree, styles, classes, services, options, sink, body, body_width, ctx,
            )?;
            for mut area in areas {
                area.shift(margin.left + distance, y);
                children.push(area);
            }
            item_height = item_height.max(h);
        }
        y += item_height + spaces::resolve(item_style.space_after(), false).used;
    }

    let area = Area::Block(BlockArea {
        rect: Rect::new(margin.left, 0.0, box_width, y),
        margin,
        padding: Edges::default(),
        borders: BorderSet::default(),
        background: style.background(),
        space_before: 0.0,
        space_after: 0.0,
        children,
    });
    Ok((area, y + margin.vertical(), style.space_before(), style.space_after()))
}

/// A whole table as one area (used in unbounded contexts: cells, static
/// regions, floats). Header, body, footer stack in order.
fn assemble_full_table(layout: &TableLayout) -> (Area, f64) {
    let spacing = layout.border_spacing;
    let mut rows: Vec<TableRowArea> = Vec::new();
    let mut y = layout.borders.top.width + layout.padding.top + spacing;
    for chunk in layout.header.iter().chain(&layout.body).chain(&layout.footer) {
        for row in &chunk.rows {
            let mut row = row.clone();
            shift_row(&mut row, layout.margin.left + layout.borders.left.width + layout.padding.left, y);
            rows.push(row);
        }
        y += chunk.height + spacing;
    }
    let height = y + layout.padding.bottom + layout.borders.bottom.width;
    let area = Area::Table(TableArea {
        rect: Rect::new(layout.margin.left, 0.0, layout.width, height),
        column_widths: layout.column_widths.clone(),
        border_collapse: layout.border_collapse,
        border_spacing: layout.border_spacing,
        borders: layout.borders,
        background: layout.background,
        rows,
    });
    (area, height)
}

fn shift_row(row: &mut TableRowArea, dx: f64, dy: f64) {
    row.rect = row.rect.shifted(dx, dy);
    for cell in &mut row.cells {
        cell.rect = cell.rect.shifted(dx, dy);
        for child in &mut cell.children {
            child.shift(dx, dy);
        }
    }
}

// ─── Atomization ────────────────────────────────────────────────

struct Atomizer<'a> {
    tree: &'a FoTree,
    styles: &'a [ResolvedStyle],
    classes: &'a [LayoutClass],
    services: &'a Services,
    options: &'a LayoutOptions,
}

impl<'a> Atomizer<'a> {
    /// Atomize one top-level flow child at the given width.
    fn atomize(
        &self,
        sink: &mut DiagnosticSink,
        node: NodeId,
        width: f64,
        ctx: &ParagraphContext<'_>,
    ) -> Result<Vec<Atom>, LayoutError> {
        let mut out = Vec::new();
        self.atomize_block_level(sink, node, 0.0, width, ctx, &mut out)?;
        Ok(out)
    }

    fn atomize_block_level(
        &self,
        sink: &mut DiagnosticSink,
        node: NodeId,
        x: f64,
        width: f64,
        ctx: &ParagraphContext<'_>,
        out: &mut Vec<Atom>,
    ) -> Result<(), LayoutError> {
        match self.classes[node] {
            LayoutClass::Block => self.atomize_block(sink, node, x, width, ctx, out),
            LayoutClass::Table => self.atomize_table(sink, node, x, width, ctx, out),
            LayoutClass::Absolute => {
                let mut atom = Atom::new(0.0, AtomBody::Areas(Vec::new()));
                atom.absolutes.push(node);
                out.push(atom);
                Ok(())
            }
            LayoutClass::Float => {
                let mut atom = Atom::new(0.0, AtomBody::Areas(Vec::new()));
                atom.floats.push(node);
                out.push(atom);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn atomize_block(
        &self,
        sink: &mut DiagnosticSink,
        block: NodeId,
        x: f64,
        width: f64,
        ctx: &ParagraphContext<'_>,
        out: &mut Vec<Atom>,
    ) -> Result<(), LayoutError> {
        let style = &self.styles[block];
        if !style.is_lr_tb() {
            sink.warn("unsupported-writing-mode", "writing-mode degraded to lr-tb");
        }
        let margin = style.margin(width);
        let padding = style.padding(width);
        let borders = style.borders();
        let border_box_width = style.width(width).unwrap_or(width - margin.horizontal());
        let content_width =
            (border_box_width - padding.horizontal() - borders.horizontal()).max(0.0);
        let box_x = x + margin.left;
        let content_x = box_x + borders.left.width + padding.left;

        let element = self.tree.node(block).element;
        let first_index = out.len();

        if element == FoElement::ListBlock {
            self.atomize_list_block(sink, block, box_x, border_box_width, ctx, out)?;
        } else {
            let block_children: Vec<NodeId> = self
                .tree
                .children(block)
                .iter()
                .copied()
                .filter(|&c| {
                    matches!(
                        self.classes[c],
                        LayoutClass::Block
                            | LayoutClass::Table
                            | LayoutClass::Absolute
                            | LayoutClass::Float
                    )
                })
                .collect();

            if block_children.is_empty() {
                self.atomize_paragraph(sink, block, content_x, content_width, ctx, out)?;
            } else {
                for &child in &block_children {
                    self.atomize_block_level(sink, child, content_x, content_width, ctx, out)?;
                }
            }
        }

        if out.len() == first_index {
            // An empty block still owns its spaces and decorations.
            out.push(Atom::new(0.0, AtomBody::Areas(Vec::new())));
        }

        self.decorate_atoms(block, box_x, border_box_width, margin, padding, borders, out, first_index);
        Ok(())
    }

    /// Apply a block's wrapper, spaces, keeps, breaks, markers, and id to the
    /// atoms `[first_index..]` it produced.
    #[allow(clippy::too_many_arguments)]
    fn decorate_atoms(
        &self,
        block: NodeId,
        box_x: f64,
        box_width: f64,
        margin: Edges,
        padding: Edges,
        borders: BorderSet,
        out: &mut Vec<Atom>,
        first_index: usize,
    ) {
        let style = &self.styles[block];
        let count = out.len() - first_index;
        if count == 0 {
            return;
        }

        // Leading and trailing box extents ride on the first/last atoms.
        // Table chunks manage their own frame, so for them the extent turns
        // into unconditional space instead.
        let lead = padding.top + borders.top.width;
        let trail = padding.bottom + borders.bottom.width;
        if lead > 0.0 {
            let first = &mut out[first_index];
            match &mut first.body {
                AtomBody::Areas(areas) => {
                    for area in areas.iter_mut() {
                        area.shift(0.0, lead);
                    }
                    first.height += lead;
                    for link in &mut first.links {
                        link.rect.y += lead;
                    }
                }
                AtomBody::TableChunk { .. } => {
                    first.space_before = space_plus_fixed(first.space_before, lead);
                }
            }
        }
        if trail > 0.0 {
            let last = out.last_mut().expect("count > 0");
            match &last.body {
                AtomBody::Areas(_) => last.height += trail,
                AtomBody::TableChunk { .. } => {
                    last.space_after = space_plus_fixed(last.space_after, trail);
                }
            }
        }

        let keep_together = style.keep_together();
        let background = style.background();
        for (offset, atom) in out[first_index..].iter_mut().enumerate() {
            let is_first = offset == 0;
            let is_last = offset == count - 1;
            atom.wrappers.insert(
                0,
                WrapperSeg {
                    node: block,
                    x: box_x,
                    width: box_width,
                    first: is_first,
                    last: is_last,
                    margin,
                    padding,
                    borders,
                    background,
                },
            );
            if !is_first && keep_together > atom.keep_before {
                atom.keep_before = keep_together;
                atom.keep_within = true;
            }
        }

        let first = &mut out[first_index];
        first.space_before = spaces::collapse_chain(
            &[space_plus_fixed(style.space_before(), margin.top), first.space_before],
            self.options.max_iterations,
        );
        if style.keep_with_previous() > first.keep_before {
            first.keep_before = style.keep_with_previous();
        }
        if style.break_before() != BreakWhen::Auto {
            first.break_before = style.break_before();
        }
        if let Some(id) = self.tree.attr(block, "id") {
            first.ids.push(id.to_string());
        }
        for &marker in &self.tree.children_of_kind(block, FoElement::Marker) {
            if let Some(class) = self.tree.attr(marker, "marker-class-name") {
                first.markers_start.push((class.to_string(), marker));
            }
        }
        // Float children of the block anchor at its first atom.
        for &child in self.tree.children(block) {
            if self.classes[child] == LayoutClass::Float {
                if !out[first_index].floats.contains(&child) {
                    out[first_index].floats.push(child);
                }
            }
        }

        let last = out.last_mut().expect("count > 0");
        last.space_after = spaces::collapse_chain(
            &[space_plus_fixed(style.space_after(), margin.bottom), last.space_after],
            self.options.max_iterations,
        );
        if style.keep_with_next() > last.keep_after {
            last.keep_after = style.keep_with_next();
        }
        if style.break_after() != BreakWhen::Auto {
            last.break_after = style.break_after();
        }
        for &marker in &self.tree.children_of_kind(block, FoElement::Marker) {
            if let Some(class) = self.tree.attr(marker, "marker-class-name") {
                last.markers_end.push((class.to_string(), marker));
            }
        }
    }

    /// A paragraph block: one atom per line.
    fn atomize_paragraph(
        &self,
        sink: &mut DiagnosticSink,
        block: NodeId,
        content_x: f64,
        content_width: f64,
        ctx: &ParagraphContext<'_>,
        out: &mut Vec<Atom>,
    ) -> Result<(), LayoutError> {
        let style = &self.styles[block];
        let paragraph = text::build_paragraph(
            self.tree, self.styles, self.services, self.options, sink, block, ctx,
        )?;
        if paragraph.is_empty() {
            return Ok(());
        }
        // `nowrap`/`pre` text breaks only at forced points.
        let measure = if style.white_space().allows_wrap() {
            content_width
        } else {
            f64::INFINITY
        };
        let chosen = text::break_lines(&paragraph, measure, self.options, sink);
        for line in &chosen {
            if line.ratio < -1.0 {
                sink.warn("overfull-line", "line exceeds the measure even fully shrunk");
                break;
            }
        }
        let assembled = text::assemble(
            &paragraph,
            &chosen,
            style.text_align(),
            style.text_align_last(),
            content_width,
            style.line_height(),
            style.text_indent(content_width),
            self.services,
        );

        let mut extras = assembled.extras;
        let mut links = assembled.links;
        for (idx, mut line) in assembled.lines.into_iter().enumerate() {
            let band = (line.rect.y, line.rect.bottom());
            let dy = -line.rect.y;
            line.rect.y = 0.0;
            line.baseline += dy;
            for inline in &mut line.inlines {
                inline.rect.y += dy;
            }
            line.rect.x += content_x;
            for inline in &mut line.inlines {
                inline.rect.x += content_x;
            }

            let mut atom = Atom::new(line.rect.height, AtomBody::Areas(vec![Area::Line(line)]));

            // Extras and links whose band overlaps this line ride along.
            let mut kept = Vec::new();
            for mut extra in extras.drain(..) {
                let r = extra.rect();
                if r.y >= band.0 - 1e-9 && r.y < band.1 {
                    extra.shift(content_x, dy);
                    if let AtomBody::Areas(areas) = &mut atom.body {
                        areas.push(extra);
                    }
                } else {
                    kept.push(extra);
                }
            }
            extras = kept;
            let mut kept_links = Vec::new();
            for mut link in links.drain(..) {
                if link.rect.y >= band.0 - 1e-9 && link.rect.y < band.1 {
                    link.rect.x += content_x;
                    link.rect.y += dy;
                    atom.links.push(link);
                } else {
                    kept_links.push(link);
                }
            }
            links = kept_links;

            atom.footnotes = assembled.line_footnotes.get(idx).cloned().unwrap_or_default();
            out.push(atom);
        }
        Ok(())
    }

    fn atomize_table(
        &self,
        sink: &mut DiagnosticSink,
        table: NodeId,
        x: f64,
        width: f64,
        ctx: &ParagraphContext<'_>,
        out: &mut Vec<Atom>,
    ) -> Result<(), LayoutError> {
        let mut layout = crate::table::layout_table(
            self.tree, self.styles, self.classes, self.services, self.options, sink, table, width,
            ctx,
        )?;
        if layout.border_collapse {
            let table_borders = layout.borders;
            for chunk in layout
                .header
                .iter_mut()
                .chain(layout.body.iter_mut())
                .chain(layout.footer.iter_mut())
            {
                crate::table::collapse_chunk_borders(chunk, &table_borders);
            }
        }
        let space_before = space_plus_fixed(layout.space_before, layout.margin.top);
        let space_after = space_plus_fixed(layout.space_after, layout.margin.bottom);
        let keep_together = layout.keep_together;
        let table_x = x + layout.margin.left;
        let shared = Rc::new(layout);

        let body_len = shared.body.len();
        if body_len == 0 {
            // Header/footer-only table renders as a single chunk.
            let (area, height) = assemble_full_table(&shared);
            let mut atom = Atom::new(height, AtomBody::Areas(vec![area]));
            atom.space_before = space_before;
            atom.space_after = space_after;
            out.push(atom);
            return Ok(());
        }

        for index in 0..body_len {
            let chunk_height = shared.body[index].height;
            let mut atom = Atom::new(
                chunk_height,
                AtomBody::TableChunk { table: Rc::clone(&shared), index, x: table_x },
            );
            if index == 0 {
                atom.space_before = space_before;
                if let Some(id) = self.tree.attr(table, "id") {
                    atom.ids.push(id.to_string());
                }
            } else if keep_together > KeepStrength::Auto {
                atom.keep_before = keep_together;
                atom.keep_within = true;
            }
            if index == body_len - 1 {
                atom.space_after = space_after;
            }
            out.push(atom);
        }
        Ok(())
    }

    /// List blocks: label and body side by side, one atom per list item.
    fn atomize_list_block(
        &self,
        sink: &mut DiagnosticSink,
        list: NodeId,
        x: f64,
        width: f64,
        ctx: &ParagraphContext<'_>,
        out: &mut Vec<Atom>,
    ) -> Result<(), LayoutError> {
        let list_style = &self.styles[list];
        let distance = list_style.provisional_distance_between_starts();
        let separation = list_style.provisional_label_separation();
        let label_width = (distance - separation).max(0.0);
        let body_width = (width - distance).max(0.0);

        for &item in &self.tree.children_of_kind(list, FoElement::ListItem) {
            let item_style = &self.styles[item];
            let mut label_areas = Vec::new();
            let mut label_height = 0.0;
            if let Some(label) = self.tree.find_child(item, FoElement::ListItemLabel) {
                let (areas, h) = layout_block_content(
                    self.tree, self.styles, self.classes, self.services, self.options, sink,
                    label, label_width, ctx,
                )?;
                label_areas = areas;
                label_height = h;
            }
            let mut body_areas = Vec::new();
            let mut body_height = 0.0;
            if let Some(body) = self.tree.find_child(item, FoElement::ListItemBody) {
                let (areas, h) = layout_block_content(
                    self.tree, self.styles, self.classes, self.services, self.options, sink,
                    body, body_width, ctx,
                )?;
                body_areas = areas;
                body_height = h;
            }

            let mut areas = Vec::new();
            for mut area in label_areas {
                area.shift(x, 0.0);
                areas.push(area);
            }
            for mut area in body_areas {
                area.shift(x + distance, 0.0);
                areas.push(area);
            }
            let mut atom =
                Atom::new(label_height.max(body_height), AtomBody::Areas(areas));
            atom.space_before = item_style.space_before();
            atom.space_after = item_style.space_after();
            if item_style.keep_with_next() > atom.keep_after {
                atom.keep_after = item_style.keep_with_next();
            }
            if item_style.keep_with_previous() > atom.keep_before {
                atom.keep_before = item_style.keep_with_previous();
            }
            out.push(atom);
        }
        Ok(())
    }
}

// ─── The page formatter ─────────────────────────────────────────

struct PlacedAtom {
    atom: Atom,
    /// Absolute x of the flow origin for this atom (shifted by an active
    /// float band).
    x: f64,
    /// Absolute y of the atom's content top.
    y: f64,
    /// Space actually inserted before the atom.
    space_used: f64,
}

/// Band carved out of the body by a side float.
struct FloatBand {
    x_shift: f64,
    width: f64,
    bottom: f64,
}

struct PageBuilder {
    page_number: u32,
    body: Rect,
    cursor: f64,
    placed: Vec<PlacedAtom>,
    candidates: Vec<BreakCandidate>,
    float_areas: Vec<Area>,
    footnote_stack: Vec<(Vec<Area>, f64)>,
    band: Option<FloatBand>,
}

impl PageBuilder {
    fn new(page_number: u32, master: &PageMaster) -> Self {
        let body = master.body_rect();
        Self {
            page_number,
            body,
            cursor: body.y,
            placed: Vec::new(),
            candidates: Vec::new(),
            float_areas: Vec::new(),
            footnote_stack: Vec::new(),
            band: None,
        }
    }

    fn footnote_height(&self) -> f64 {
        self.footnote_stack.iter().map(|(_, h)| *h).sum()
    }

    fn limit(&self) -> f64 {
        self.body.bottom() - self.footnote_height()
    }

    fn is_empty(&self) -> bool {
        self.placed.is_empty() && self.float_areas.is_empty()
    }

    /// Content width at the current cursor, accounting for an active band.
    fn flow_width(&self) -> f64 {
        match &self.band {
            Some(band) if self.cursor < band.bottom => band.width,
            _ => self.body.width,
        }
    }

    fn flow_x_shift(&self) -> f64 {
        match &self.band {
            Some(band) if self.cursor < band.bottom => band.x_shift,
            _ => 0.0,
        }
    }
}

/// Lay the whole document out into an area tree.
pub fn layout_document(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    classes: &[LayoutClass],
    services: &Services,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
) -> Result<AreaTree, LayoutError> {
    let root = tree
        .root()
        .ok_or_else(|| LayoutError::InvalidDocument("empty FO tree".into()))?;
    let masters = collect_masters(tree, styles, options)?;

    let mut area_tree = AreaTree::default();
    if let Some(bookmark_tree) = tree.find_child(root, FoElement::BookmarkTree) {
        area_tree.bookmarks = collect_bookmarks(tree, bookmark_tree);
    }

    let mut id_pages: BTreeMap<String, u32> = BTreeMap::new();
    let mut next_page_number = 1u32;

    for &sequence in &tree.children_of_kind(root, FoElement::PageSequence) {
        let master_name = tree.attr(sequence, "master-reference").ok_or_else(|| {
            LayoutError::InvalidDocument("page-sequence without master-reference".into())
        })?;
        let master = masters.get(master_name).ok_or_else(|| {
            LayoutError::InvalidDocument(format!("unknown page master '{master_name}'"))
        })?;
        let sequence_style = &styles[sequence];
        if let Some(initial) = sequence_style.initial_page_number() {
            next_page_number = initial;
        }

        let formatter = SequenceFormatter {
            atomizer: Atomizer { tree, styles, classes, services, options },
            tree,
            styles,
            classes,
            services,
            options,
            master,
            sequence,
        };
        next_page_number = formatter.run(
            sink,
            &mut area_tree,
            &mut id_pages,
            next_page_number,
            sequence_style.force_page_count(),
        )?;
    }

    Ok(area_tree)
}

fn collect_bookmarks(tree: &FoTree, parent: NodeId) -> Vec<Bookmark> {
    tree.children_of_kind(parent, FoElement::Bookmark)
        .iter()
        .map(|&b| {
            let title = tree
                .find_child(b, FoElement::BookmarkTitle)
                .map(|t| tree.text_content(t).trim().to_string())
                .unwrap_or_default();
            Bookmark {
                title,
                internal_destination: tree.attr(b, "internal-destination").map(String::from),
                external_destination: tree.attr(b, "external-destination").map(String::from),
                children: collect_bookmarks(tree, b),
            }
        })
        .collect()
}

struct SequenceFormatter<'a> {
    atomizer: Atomizer<'a>,
    tree: &'a FoTree,
    styles: &'a [ResolvedStyle],
    classes: &'a [LayoutClass],
    services: &'a Services,
    options: &'a LayoutOptions,
    master: &'a PageMaster,
    sequence: NodeId,
}

impl<'a> SequenceFormatter<'a> {
    fn run(
        &self,
        sink: &mut DiagnosticSink,
        area_tree: &mut AreaTree,
        id_pages: &mut BTreeMap<String, u32>,
        first_page_number: u32,
        force: ForcePageCount,
    ) -> Result<u32, LayoutError> {
        let flow = self
            .tree
            .children_of_kind(self.sequence, FoElement::Flow)
            .first()
            .copied()
            .ok_or_else(|| LayoutError::InvalidDocument("page-sequence without flow".into()))?;
        let top_blocks: Vec<NodeId> = self
            .tree
            .children(flow)
            .iter()
            .copied()
            .filter(|&c| {
                !matches!(self.classes[c], LayoutClass::Structural | LayoutClass::Inline)
                    || self.classes[c] == LayoutClass::Float
            })
            .collect();

        let mut next_block = 0usize;
        let mut queue: VecDeque<Atom> = VecDeque::new();
        let mut pending_floats: VecDeque<NodeId> = VecDeque::new();
        let mut registry = MarkerRegistry::new();
        let mut page_number = first_page_number;
        let pages_before = area_tree.pages.len();
        let mut pending_parity: Option<u32> = None;

        'pages: loop {
            if area_tree.pages.len() as u32 >= self.options.max_pages {
                return Err(LayoutError::LimitExceeded {
                    guard: "max-pages",
                    limit: self.options.max_pages as u64,
                });
            }

            // Parity demanded by an even-page / odd-page break.
            if let Some(parity) = pending_parity {
                if page_number % 2 != parity {
                    area_tree.pages.push(blank_page(self.master, page_number));
                    page_number += 1;
                    continue;
                }
                pending_parity = None;
            }

            registry.start_page();
            let mut builder = PageBuilder::new(page_number, self.master);
            self.place_floats(sink, &mut builder, &mut pending_floats, id_pages)?;

            loop {
                if queue.is_empty() {
                    if next_block >= top_blocks.len() {
                        break;
                    }
                    let ctx = ParagraphContext {
                        page_number: builder.page_number,
                        id_pages: &*id_pages,
                        markers: None,
                    };
                    let atoms = self.atomizer.atomize(
                        sink,
                        top_blocks[next_block],
                        builder.flow_width(),
                        &ctx,
                    )?;
                    next_block += 1;
                    queue.extend(atoms);
                    continue;
                }

                let atom = queue.pop_front().expect("queue checked non-empty");

                // Forced break before the atom.
                if atom.break_before.forces_page_break() && !builder.is_empty() {
                    pending_parity = parity_of(atom.break_before);
                    queue.push_front(atom);
                    break;
                }

                match self.try_place(sink, &mut builder, atom, id_pages, &mut registry)? {
                    Placement::Placed { break_after, floats } => {
                        pending_floats.extend(floats);
                        // A float anchored before any vertical progress can
                        // still go on this page; later anchors wait for the
                        // next one.
                        if !pending_floats.is_empty()
                            && builder.cursor <= builder.body.y + 1e-6
                        {
                            self.place_floats(sink, &mut builder, &mut pending_floats, id_pages)?;
                        }
                        if break_after.forces_page_break() {
                            pending_parity = parity_of(break_after);
                            break;
                        }
                    }
                    Placement::PageFull { requeue } => {
                        for atom in requeue.into_iter().rev() {
                            queue.push_front(atom);
                        }
                        break;
                    }
                }
            }

            let exhausted = queue.is_empty() && next_block >= top_blocks.len();
            self.commit_page(sink, area_tree, builder, &registry, id_pages)?;
            page_number += 1;

            if exhausted && pending_floats.is_empty() {
                break 'pages;
            }
        }

        // force-page-count: pad with blank pages.
        let emitted = (area_tree.pages.len() - pages_before) as u32;
        let needs_blank = match force {
            ForcePageCount::Auto => false,
            ForcePageCount::Even => emitted % 2 == 1,
            ForcePageCount::Odd => emitted % 2 == 0,
            ForcePageCount::EndOnEven => (page_number - 1) % 2 == 1,
            ForcePageCount::EndOnOdd => (page_number - 1) % 2 == 0,
        };
        if needs_blank {
            area_tree.pages.push(blank_page(self.master, page_number));
            page_number += 1;
        }

        Ok(page_number)
    }

    /// Place pending floats at the top of a fresh page.
    fn place_floats(
        &self,
        sink: &mut DiagnosticSink,
        builder: &mut PageBuilder,
        pending: &mut VecDeque<NodeId>,
        id_pages: &BTreeMap<String, u32>,
    ) -> Result<(), LayoutError> {
        let ctx = ParagraphContext {
            page_number: builder.page_number,
            id_pages,
            markers: None,
        };
        let mut deferred = VecDeque::new();
        while let Some(float_node) = pending.pop_front() {
            let side = self.styles[float_node].float_side().unwrap_or(FloatSide::Before);
            let width = match side {
                FloatSide::Before => builder.body.width,
                FloatSide::Start | FloatSide::End => self
                    .float_width(float_node)
                    .unwrap_or(builder.body.width / 3.0),
            };
            let (areas, height) = layout_block_content(
                self.tree, self.styles, self.classes, self.services, self.options, sink,
                float_node, width, &ctx,
            )?;
            let available = builder.body.height - (builder.cursor - builder.body.y);
            if height > available {
                if builder.cursor > builder.body.y + 1e-6 {
                    // No room this page; try again on the next one.
                    deferred.push_back(float_node);
                    continue;
                }
                // Taller than a whole page: place anyway rather than defer
                // forever.
                sink.warn("page-overflow", "float taller than the page body overflows");
            }
            let x = match side {
                FloatSide::Before | FloatSide::Start => builder.body.x,
                FloatSide::End => builder.body.right() - width,
            };
            let y = builder.cursor;
            let mut children = areas;
            for area in &mut children {
                area.shift(x, y);
            }
            let float_area = FloatArea {
                rect: Rect::new(x, y, width, height),
                side,
                children,
            };
            match side {
                FloatSide::Before => {
                    builder.cursor += height;
                }
                FloatSide::Start => {
                    builder.band = Some(FloatBand {
                        x_shift: width + 6.0,
                        width: builder.body.width - width - 6.0,
                        bottom: y + height,
                    });
                }
                FloatSide::End => {
                    builder.band = Some(FloatBand {
                        x_shift: 0.0,
                        width: builder.body.width - width - 6.0,
                        bottom: y + height,
                    });
                }
            }
            builder.float_areas.push(Area::Float(float_area));
        }
        *pending = deferred;
        Ok(())
    }

    fn float_width(&self, float_node: NodeId) -> Option<f64> {
        self.tree
            .children(float_node)
            .iter()
            .find(|&&c| self.classes[c] == LayoutClass::Block)
            .and_then(|&c| self.styles[c].width(0.0))
    }

    /// Try to place one atom; on overflow, select a break, roll back, and
    /// report the atoms to re-queue.
    fn try_place(
        &self,
        sink: &mut DiagnosticSink,
        builder: &mut PageBuilder,
        atom: Atom,
        id_pages: &mut BTreeMap<String, u32>,
        registry: &mut MarkerRegistry,
    ) -> Result<Placement, LayoutError> {
        // Floats queue for the next page unless this page is still fresh.
        // (Handled by the caller via the pending queue; here they only add
        // height-zero anchors.)

        let at_page_top = builder.placed.is_empty();
        let prev_after = builder.placed.last().map(|p| p.atom.space_after);
        let space_spec = match prev_after {
            Some(prev) => spaces::collapse_pair(prev, atom.space_before),
            None => atom.space_before,
        };
        let resolved = spaces::resolve(space_spec, at_page_top);

        // Footnotes this atom brings along.
        let ctx = ParagraphContext {
            page_number: builder.page_number,
            id_pages: &*id_pages,
            markers: None,
        };
        let mut footnote_areas: Vec<(Vec<Area>, f64)> = Vec::new();
        for &body in &atom.footnotes {
            let (areas, height) = layout_block_content(
                self.tree, self.styles, self.classes, self.services, self.options, sink, body,
                builder.body.width, &ctx,
            )?;
            footnote_areas.push((areas, height));
        }
        let footnote_height: f64 = footnote_areas.iter().map(|(_, h)| *h).sum();

        // Tables need their header above the chunk and room for the footer
        // below when they open on this page. Only the leading part shifts
        // the chunk's y; the footer is a reservation.
        let (table_lead, table_reserve) = match &atom.body {
            AtomBody::TableChunk { table, index, .. } => {
                let already_open = builder
                    .placed
                    .last()
                    .and_then(|p| p.atom.table_ptr())
                    .map(|ptr| ptr == Rc::as_ptr(table))
                    .unwrap_or(false);
                if already_open {
                    (table.border_spacing, 0.0)
                } else {
                    let show_header = *index == 0 || table.repeat_header;
                    let lead = if show_header { table.header_height() } else { 0.0 }
                        + table.borders.top.width
                        + table.padding.top
                        + table.border_spacing;
                    let reserve = table.footer_height()
                        + table.borders.bottom.width
                        + table.padding.bottom;
                    (lead, reserve)
                }
            }
            AtomBody::Areas(_) => (0.0, 0.0),
        };

        let needed = resolved.used + table_lead + table_reserve + atom.height + footnote_height;
        let available = builder.limit() - builder.cursor;

        let fits = needed <= available + 1e-6;
        let fits_with_min = !fits
            && atom.keep_before > KeepStrength::Auto
            && resolved.minimum + table_lead + table_reserve + atom.height + footnote_height
                <= available + 1e-6;

        if fits || fits_with_min {
            let space_used = if fits { resolved.used } else { resolved.minimum };
            // Break opportunity before this atom.
            if !builder.placed.is_empty() {
                let prev_keep = builder.placed.last().map(|p| p.atom.keep_after).unwrap_or_default();
                let forbid = prev_keep.max(atom.keep_before);
                builder.candidates.push(BreakCandidate {
                    placed_index: builder.placed.len(),
                    forbid,
                    within_keep_together: atom.keep_within,
                });
            }
            let y = builder.cursor + space_used + table_lead;
            builder.cursor = y + atom.height;

            for id in &atom.ids {
                id_pages.entry(id.clone()).or_insert(builder.page_number);
            }
            for (class, marker) in &atom.markers_start {
                registry.block_started(class, *marker);
            }
            for (class, marker) in &atom.markers_end {
                registry.block_ended(class, *marker);
            }
            for (areas, height) in footnote_areas {
                builder.footnote_stack.push((areas, height));
            }
            let break_after = atom.break_after;
            let floats = atom.floats.clone();
            let x = builder.body.x + builder.flow_x_shift();
            builder.placed.push(PlacedAtom { atom, x, y, space_used });
            return Ok(Placement::Placed { break_after, floats });
        }

        // Overflow. An empty page that still cannot host the atom either
        // overflows visibly or is a structural impossibility.
        if builder.is_empty() {
            if self.options.strict_layout && atom.keep_within {
                return Err(LayoutError::UnsupportedFeature(
                    "keep-together content taller than a page".into(),
                ));
            }
            sink.warn("page-overflow", "content taller than the page body overflows");
            let y = builder.cursor + resolved.used + table_lead;
            builder.cursor = y + atom.height;
            for id in &atom.ids {
                id_pages.entry(id.clone()).or_insert(builder.page_number);
            }
            let break_after = atom.break_after;
            let floats = atom.floats.clone();
            let x = builder.body.x;
            builder.placed.push(PlacedAtom { atom, x, y, space_used: resolved.used });
            return Ok(Placement::Placed { break_after, floats });
        }

        // The boundary right before this atom is the latest opportunity of
        // all; breaking here costs no rollback.
        let prev_keep = builder.placed.last().map(|p| p.atom.keep_after).unwrap_or_default();
        let forbid_here = prev_keep.max(atom.keep_before);
        if forbid_here < KeepStrength::Always {
            return Ok(Placement::PageFull { requeue: vec![atom] });
        }

        match select_break(&builder.candidates) {
            Some(choice) => {
                if choice.violated {
                    if self.options.strict_layout && choice.violated_keep_together {
                        return Err(LayoutError::UnsupportedFeature(
                            "keep-together constraint cannot be satisfied within one page".into(),
                        ));
                    }
                    sink.warn(
                        "unsatisfiable-keep",
                        "keep constraints forced a break inside a kept group",
                    );
                }
                // Roll back: truncate the tentative list at the chosen
                // boundary and re-queue what fell off plus the current atom.
                let mut requeue: Vec<Atom> = builder
                    .placed
                    .drain(choice.placed_index..)
                    .map(|p| p.atom)
                    .collect();
                requeue.push(atom);
                builder.candidates.retain(|c| c.placed_index < choice.placed_index);
                builder.cursor = builder
                    .placed
                    .last()
                    .map(|p| p.y + p.atom.height)
                    .unwrap_or(builder.body.y);
                Ok(Placement::PageFull { requeue })
            }
            None => {
                // Every placed atom belongs to the kept group. Violating the
                // keep at the latest boundary beats losing the page.
                if self.options.strict_layout && atom.keep_within {
                    return Err(LayoutError::UnsupportedFeature(
                        "keep-together constraint cannot be satisfied within one page".into(),
                    ));
                }
                sink.warn(
                    "unsatisfiable-keep",
                    "keep constraints forced a break inside a kept group",
                );
                Ok(Placement::PageFull { requeue: vec![atom] })
            }
        }
    }

    /// Freeze the builder into a committed page viewport.
    fn commit_page(
        &self,
        sink: &mut DiagnosticSink,
        area_tree: &mut AreaTree,
        builder: PageBuilder,
        registry: &MarkerRegistry,
        id_pages: &mut BTreeMap<String, u32>,
    ) -> Result<(), LayoutError> {
        let mut areas: Vec<Area> = Vec::new();
        let mut links: Vec<LinkArea> = Vec::new();
        let mut absolutes: Vec<AbsoluteArea> = Vec::new();

        areas.extend(builder.float_areas.iter().cloned());

        // Flow content: wrap atom runs into their block fragments.
        let emitted = emit_atoms(&builder.placed, &mut links);
        areas.extend(emitted);

        // Out-of-flow absolutes.
        let ctx = ParagraphContext {
            page_number: builder.page_number,
            id_pages: &*id_pages,
            markers: None,
        };
        for placed in &builder.placed {
            for &node in &placed.atom.absolutes {
                absolutes.push(self.layout_absolute(sink, node, &builder, &ctx)?);
            }
        }
        absolutes.sort_by_key(|a| a.z_index);

        // Footnotes stack upward from the body bottom.
        let total_footnotes: f64 = builder.footnote_stack.iter().map(|(_, h)| *h).sum();
        let mut fy = builder.body.bottom() - total_footnotes;
        for (footnote_areas, height) in &builder.footnote_stack {
            for area in footnote_areas {
                let mut area = area.clone();
                area.shift(builder.body.x, fy);
                areas.push(area);
            }
            fy += height;
        }

        // Static regions, laid out after the flow so markers resolve.
        for &static_node in &self.tree.children_of_kind(self.sequence, FoElement::StaticContent) {
            let flow_name = self.tree.attr(static_node, "flow-name").unwrap_or_default();
            let Some(region) = self.master.region_rect(flow_name) else {
                sink.warn(
                    "unknown-region",
                    format!("static-content names unknown region '{flow_name}'"),
                );
                continue;
            };
            let static_ctx = ParagraphContext {
                page_number: builder.page_number,
                id_pages: &*id_pages,
                markers: Some(registry),
            };
            let (static_areas, _) = layout_block_content(
                self.tree, self.styles, self.classes, self.services, self.options, sink,
                static_node, region.width, &static_ctx,
            )?;
            for mut area in static_areas {
                area.shift(region.x, region.y);
                areas.push(area);
            }
        }

        area_tree.pages.push(PageViewport {
            page_number: builder.page_number,
            width: self.master.width,
            height: self.master.height,
            areas,
            absolute_areas: absolutes,
            links,
        });
        Ok(())
    }

    fn layout_absolute(
        &self,
        sink: &mut DiagnosticSink,
        node: NodeId,
        builder: &PageBuilder,
        ctx: &ParagraphContext<'_>,
    ) -> Result<AbsoluteArea, LayoutError> {
        let style = &self.styles[node];
        let mode = style.absolute_position().unwrap_or(AbsoluteMode::Absolute);
        let reference = match mode {
            AbsoluteMode::Absolute => builder.body,
            AbsoluteMode::Fixed => {
                Rect::new(0.0, 0.0, self.master.width, self.master.height)
            }
        };
        use crate::properties::PropertyId;
        let left = style.offset(PropertyId::OffsetLeft, reference.width);
        let right = style.offset(PropertyId::OffsetRight, reference.width);
        let top = style.offset(PropertyId::OffsetTop, reference.height);
        let bottom = style.offset(PropertyId::OffsetBottom, reference.height);

        let width = style.width(reference.width).unwrap_or_else(|| match (left, right) {
            (Some(l), Some(r)) => (reference.width - l - r).max(0.0),
            _ => reference.width / 2.0,
        });
        let (mut children, height) = layout_block_content(
            self.tree, self.styles, self.classes, self.services, self.options, sink, node, width,
            ctx,
        )?;
        let height = style.height().unwrap_or(height);

        let x = reference.x
            + match (left, right) {
                (Some(l), _) => l,
                (None, Some(r)) => reference.width - r - width,
                (None, None) => 0.0,
            };
        let y = reference.y
            + match (top, bottom) {
                (Some(t), _) => t,
                (None, Some(b)) => reference.height - b - height,
                (None, None) => 0.0,
            };
        for child in &mut children {
            child.shift(x, y);
        }
        Ok(AbsoluteArea {
            rect: Rect::new(x, y, width, height),
            position: mode,
            z_index: style.z_index(),
            children,
        })
    }
}

enum Placement {
    Placed { break_after: BreakWhen, floats: Vec<NodeId> },
    PageFull { requeue: Vec<Atom> },
}

fn parity_of(brk: BreakWhen) -> Option<u32> {
    match brk {
        BreakWhen::EvenPage => Some(0),
        BreakWhen::OddPage => Some(1),
        _ => None,
    }
}

fn blank_page(master: &PageMaster, page_number: u32) -> PageViewport {
    PageViewport {
        page_number,
        width: master.width,
        height: master.height,
        areas: Vec::new(),
        absolute_areas: Vec::new(),
        links: Vec::new(),
    }
}

// ─── Atom emission ──────────────────────────────────────────────

/// Turn placed atoms into page areas, reconstructing block fragments from
/// wrapper runs and table fragments from chunk runs.
fn emit_atoms(placed: &[PlacedAtom], links: &mut Vec<LinkArea>) -> Vec<Area> {
    emit_level(placed, 0, links)
}

fn emit_level(placed: &[PlacedAtom], depth: usize, links: &mut Vec<LinkArea>) -> Vec<Area> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < placed.len() {
        let atom = &placed[i].atom;

        if let Some(seg) = atom.wrappers.get(depth) {
            // Maximal run of atoms belonging to the same block.
            let node = seg.node;
            let mut j = i + 1;
            while j < placed.len()
                && placed[j]
                    .atom
                    .wrappers
                    .get(depth)
                    .map(|s| s.node == node)
                    .unwrap_or(false)
            {
                j += 1;
            }
            out.push(emit_wrapper_fragment(&placed[i..j], depth, links));
            i = j;
            continue;
        }

        if let AtomBody::TableChunk { table, .. } = &atom.body {
            // Maximal run of chunks of the same table.
            let ptr = Rc::as_ptr(table);
            let mut j = i + 1;
            while j < placed.len()
                && placed[j].atom.table_ptr() == Some(ptr)
                && placed[j].atom.wrappers.get(depth).is_none()
            {
                j += 1;
            }
            out.push(emit_table_fragment(&placed[i..j]));
            i = j;
            continue;
        }

        // Bare atom: emit its areas at their absolute position.
        if let AtomBody::Areas(areas) = &atom.body {
            for area in areas {
                let mut area = area.clone();
                area.shift(placed[i].x, placed[i].y);
                out.push(area);
            }
        }
        for link in &atom.links {
            let mut link = link.clone();
            link.rect.x += placed[i].x;
            link.rect.y += placed[i].y;
            links.push(link);
        }
        i += 1;
    }
    out
}

/// A run of atoms sharing the wrapper at `depth`: one block fragment.
fn emit_wrapper_fragment(run: &[PlacedAtom], depth: usize, links: &mut Vec<LinkArea>) -> Area {
    let seg = run[0].atom.wrappers[depth].clone();
    let has_first = run
        .iter()
        .any(|p| p.atom.wrappers.get(depth).map(|s| s.first).unwrap_or(false));
    let has_last = run
        .iter()
        .any(|p| p.atom.wrappers.get(depth).map(|s| s.last).unwrap_or(false));

    let top = run.first().expect("non-empty run").y;
    let last = run.last().expect("non-empty run");
    let bottom = last.y + last.atom.height;

    let children = emit_level(run, depth + 1, links);

    // Borders vanish at broken edges: a fragment continuing from (or onto)
    // another page has no top (or bottom) border.
    let mut borders = seg.borders;
    if !has_first {
        borders.top = crate::area::Border::default();
    }
    if !has_last {
        borders.bottom = crate::area::Border::default();
    }

    Area::Block(BlockArea {
        rect: Rect::new(run[0].x + seg.x, top, seg.width, bottom - top),
        margin: seg.margin,
        padding: seg.padding,
        borders,
        background: seg.background,
        space_before: run.first().map(|p| p.space_used).unwrap_or(0.0),
        space_after: 0.0,
        children,
    })
}

/// A table continued or completed on one page: header chunks (repeated when
/// configured), the run's body chunks, then footer chunks.
fn emit_table_fragment(run: &[PlacedAtom]) -> Area {
    let flow_x = run[0].x;
    let (table, first_index, x) = match &run[0].atom.body {
        AtomBody::TableChunk { table, index, x } => (Rc::clone(table), *index, *x),
        AtomBody::Areas(_) => unreachable!("table run starts with a chunk"),
    };
    let spacing = table.border_spacing;
    let is_table_start = first_index == 0;
    let last_index = match &run.last().expect("non-empty run").atom.body {
        AtomBody::TableChunk { index, .. } => *index,
        AtomBody::Areas(_) => first_index,
    };
    let is_table_end = last_index + 1 == table.body.len();

    let show_header = is_table_start || table.repeat_header;
    let show_footer = is_table_end || table.repeat_footer;

    let top = run[0].y - if show_header { table.header_height() } else { 0.0 }
        - table.borders.top.width
        - table.padding.top
        - spacing;

    let abs_x = flow_x + x;
    let content_x = abs_x + table.borders.left.width + table.padding.left;
    let mut rows: Vec<TableRowArea> = Vec::new();

    let mut y = top + table.borders.top.width + table.padding.top + spacing;
    if show_header {
        for chunk in &table.header {
            for row in &chunk.rows {
                let mut row = row.clone();
                row.repeated = !is_table_start;
                shift_row(&mut row, content_x, y);
                rows.push(row);
            }
            y += chunk.height + spacing;
        }
    }
    for placed in run {
        if let AtomBody::TableChunk { index, .. } = &placed.atom.body {
            for row in &table.body[*index].rows {
                let mut row = row.clone();
                shift_row(&mut row, content_x, placed.y);
                rows.push(row);
            }
            y = placed.y + table.body[*index].height + spacing;
        }
    }
    if show_footer {
        for chunk in &table.footer {
            for row in &chunk.rows {
                let mut row = row.clone();
                row.repeated = !is_table_end;
                shift_row(&mut row, content_x, y);
                rows.push(row);
            }
            y += chunk.height + spacing;
        }
    }

    let bottom = y + table.padding.bottom + table.borders.bottom.width;
    Area::Table(TableArea {
        rect: Rect::new(abs_x, top, table.width, bottom - top),
        column_widths: table.column_widths.clone(),
        border_collapse: table.border_collapse,
        border_spacing: table.border_spacing,
        borders: table.borders,
        background: table.background,
        rows,
    })
}
