//! # Table Layout
//!
//! Column width resolution, row sizing with span support, and border
//! handling. Cell content is laid out by delegating back to the block/
//! paragraph machinery, so anything that can appear in a flow can appear in
//! a cell.
//!
//! The output is a [`TableLayout`]: width-resolved columns plus row chunks in
//! table-local coordinates. The page formatter places chunks, re-emitting
//! header and footer chunks on every page the table straddles.

use crate::area::{
    Area, Border, BorderSet, CellAlign, Color, Edges, TableCellArea, TableRowArea, Rect,
};
use crate::config::LayoutOptions;
use crate::diagnostics::DiagnosticSink;
use crate::error::LayoutError;
use crate::fo::{FoElement, FoTree, NodeId};
use crate::properties::parse::{parse_column_width, ColumnWidthSpec, KeepStrength};
use crate::properties::{ResolvedStyle, SpaceSpec};
use crate::refine::LayoutClass;
use crate::services::Services;
use crate::text::ParagraphContext;

/// One vertical slice of a table that must stay together on a page: a single
/// row, or a run of rows tied by rowspans.
#[derive(Debug, Clone)]
pub struct RowChunk {
    pub height: f64,
    /// Rows in chunk-local coordinates (x = 0 at the table content left,
    /// y = 0 at the chunk top).
    pub rows: Vec<TableRowArea>,
}

/// A width-resolved table ready for pagination.
#[derive(Debug, Clone)]
pub struct TableLayout {
    /// Border-box width of the table.
    pub width: f64,
    pub column_widths: Vec<f64>,
    pub border_collapse: bool,
    pub border_spacing: f64,
    pub borders: BorderSet,
    pub background: Option<Color>,
    pub margin: Edges,
    pub padding: Edges,
    pub header: Vec<RowChunk>,
    pub footer: Vec<RowChunk>,
    pub body: Vec<RowChunk>,
    pub repeat_header: bool,
    pub repeat_footer: bool,
    pub space_before: SpaceSpec,
    pub space_after: SpaceSpec,
    pub keep_together: KeepStrength,
}

impl TableLayout {
    pub fn header_height(&self) -> f64 {
        chunk_stack_height(&self.header, self.border_spacing)
    }

    pub fn footer_height(&self) -> f64 {
        chunk_stack_height(&self.footer, self.border_spacing)
    }
}

fn chunk_stack_height(chunks: &[RowChunk], spacing: f64) -> f64 {
    let content: f64 = chunks.iter().map(|c| c.height).sum();
    content + chunks.len() as f64 * spacing
}

/// Lay out a table at the given available width.
#[allow(clippy::too_many_arguments)]
pub fn layout_table(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    classes: &[LayoutClass],
    services: &Services,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
    table: NodeId,
    available_width: f64,
    ctx: &ParagraphContext<'_>,
) -> Result<TableLayout, LayoutError> {
    let style = &styles[table];
    let margin = style.margin(available_width);
    let padding = style.padding(available_width);
    let borders = style.borders();
    let border_collapse = style.border_collapse();
    let border_spacing = if border_collapse { 0.0 } else { style.border_spacing() };

    let table_width = style
        .width(available_width)
        .unwrap_or(available_width - margin.horizontal());
    let content_width = table_width - padding.horizontal() - borders.horizontal();

    // Collect the grid parts.
    let column_nodes = tree.children_of_kind(table, FoElement::TableColumn);
    let header_rows = collect_rows(tree, table, FoElement::TableHeader);
    let footer_rows = collect_rows(tree, table, FoElement::TableFooter);
    let body_rows = collect_rows(tree, table, FoElement::TableBody);

    guard_cell_count(tree, options, &header_rows, &footer_rows, &body_rows)?;

    let column_count = infer_column_count(tree, styles, &column_nodes, &header_rows, &body_rows);
    if column_count == 0 {
        sink.warn("empty-table", "table has no columns or rows");
        return Ok(TableLayout {
            width: table_width,
            column_widths: Vec::new(),
            border_collapse,
            border_spacing,
            borders,
            background: style.background(),
            margin,
            padding,
            header: Vec::new(),
            footer: Vec::new(),
            body: Vec::new(),
            repeat_header: false,
            repeat_footer: false,
            space_before: style.space_before(),
            space_after: style.space_after(),
            keep_together: style.keep_together(),
        });
    }

    // Inter-column gaps eat into the width available to columns.
    let gap_total = border_spacing * (column_count as f64 + 1.0);
    let columns_width = (content_width - gap_total).max(0.0);

    let column_widths = resolve_column_widths(
        tree,
        styles,
        classes,
        services,
        options,
        sink,
        &column_nodes,
        column_count,
        columns_width,
        style.font_size(),
        &header_rows,
        &body_rows,
        ctx,
    )?;

    let mut grid = GridCursor::new(column_count);
    let header = layout_rows(
        tree, styles, classes, services, options, sink, &header_rows, &column_widths,
        border_spacing, ctx, &mut grid, true,
    )?;
    let mut grid = GridCursor::new(column_count);
    let footer = layout_rows(
        tree, styles, classes, services, options, sink, &footer_rows, &column_widths,
        border_spacing, ctx, &mut grid, true,
    )?;
    let mut grid = GridCursor::new(column_count);
    let body = layout_rows(
        tree, styles, classes, services, options, sink, &body_rows, &column_widths,
        border_spacing, ctx, &mut grid, false,
    )?;

    // Header/footer presence with omission control.
    let has_header = !header.is_empty();
    let has_footer = !footer.is_empty();
    let header_style = tree.find_child(table, FoElement::TableHeader).map(|h| &styles[h]);
    let footer_style = tree.find_child(table, FoElement::TableFooter).map(|f| &styles[f]);
    let repeat_header = has_header
        && !header_style.map(|s| s.omit_header_at_break()).unwrap_or(false)
        && !style.omit_header_at_break();
    let repeat_footer = has_footer
        && !footer_style.map(|s| s.omit_footer_at_break()).unwrap_or(false)
        && !style.omit_footer_at_break();

    Ok(TableLayout {
        width: table_width,
        column_widths,
        border_collapse,
        border_spacing,
        borders,
        background: style.background(),
        margin,
        padding,
        header,
        footer,
        body,
        repeat_header,
        repeat_footer,
        space_before: style.space_before(),
        space_after: style.space_after(),
        keep_together: style.keep_together(),
    })
}

fn collect_rows(tree: &FoTree, table: NodeId, group: FoElement) -> Vec<NodeId> {
    let mut rows = Vec::new();
    for &child in tree.children(table) {
        if tree.node(child).element == group {
            rows.extend(tree.children_of_kind(child, FoElement::TableRow));
        }
    }
    // Rows directly under the table body-less form are treated as body rows.
    if group == FoElement::TableBody {
        rows.extend(tree.children_of_kind(table, FoElement::TableRow));
    }
    rows
}

fn guard_cell_count(
    tree: &FoTree,
    options: &LayoutOptions,
    header: &[NodeId],
    footer: &[NodeId],
    body: &[NodeId],
) -> Result<(), LayoutError> {
    let cells: usize = header
        .iter()
        .chain(footer)
        .chain(body)
        .map(|&r| tree.children_of_kind(r, FoElement::TableCell).len())
        .sum();
    if cells as u32 > options.max_table_cells {
        return Err(LayoutError::LimitExceeded {
            guard: "max-table-cells",
            limit: options.max_table_cells as u64,
        });
    }
    Ok(())
}

fn infer_column_count(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    columns: &[NodeId],
    header_rows: &[NodeId],
    body_rows: &[NodeId],
) -> usize {
    if !columns.is_empty() {
        return columns.len();
    }
    header_rows
        .iter()
        .chain(body_rows)
        .map(|&row| {
            tree.children_of_kind(row, FoElement::TableCell)
                .iter()
                .map(|&c| styles[c].number_columns_spanned())
                .sum::<usize>()
        })
        .max()
        .unwrap_or(0)
}

/// Column width resolution per the four-specifier model: literal lengths and
/// percentages bind first; the remainder goes to proportional (`k*`) columns
/// by coefficient; `auto` columns size from dry-run content measures, clamped
/// between min and max content width. When proportional and auto columns
/// coexist, auto participates as `1*` with a min-content floor.
#[allow(clippy::too_many_arguments)]
fn resolve_column_widths(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    classes: &[LayoutClass],
    services: &Services,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
    columns: &[NodeId],
    column_count: usize,
    available: f64,
    font_size: f64,
    header_rows: &[NodeId],
    body_rows: &[NodeId],
    ctx: &ParagraphContext<'_>,
) -> Result<Vec<f64>, LayoutError> {
    let mut specs: Vec<ColumnWidthSpec> = Vec::with_capacity(column_count);
    for i in 0..column_count {
        let spec = columns
            .get(i)
            .and_then(|&col| tree.attr(col, "column-width"))
            .map(|raw| match parse_column_width(raw, font_size) {
                Some(s) => s,
                None => {
                    sink.warn("unparseable-value", format!("column-width '{raw}'"));
                    ColumnWidthSpec::Auto
                }
            })
            .unwrap_or(ColumnWidthSpec::Auto);
        specs.push(spec);
    }
    // With no column declarations at all, distribute evenly (the classic
    // equal-columns default).
    if columns.is_empty() {
        return Ok(vec![available / column_count as f64; column_count]);
    }

    let mut widths = vec![0.0f64; column_count];
    let mut remainder = available;

    for (i, spec) in specs.iter().enumerate() {
        match spec {
            ColumnWidthSpec::Length(v) => {
                widths[i] = *v;
                remainder -= v;
            }
            ColumnWidthSpec::Percent(p) => {
                let v = available * p / 100.0;
                widths[i] = v;
                remainder -= v;
            }
            _ => {}
        }
    }
    remainder = remainder.max(0.0);

    let has_auto = specs.iter().any(|s| matches!(s, ColumnWidthSpec::Auto));
    let has_star = specs.iter().any(|s| matches!(s, ColumnWidthSpec::Proportional(_)));

    // Content measures for auto columns only (dry runs are not free).
    let content: Vec<Option<(f64, f64)>> = specs
        .iter()
        .enumerate()
        .map(|(i, s)| {
            matches!(s, ColumnWidthSpec::Auto).then(|| {
                column_content_widths(
                    tree, styles, classes, services, options, sink, header_rows, body_rows, i, ctx,
                )
            })
        })
        .collect();

    if has_star || has_auto {
        // Effective coefficients: stars keep theirs, autos weigh in at 1 (or
        // by max-content when no stars compete).
        let auto_by_content = !has_star;
        let mut coefficients = vec![0.0f64; column_count];
        let mut total_coeff = 0.0;
        for (i, spec) in specs.iter().enumerate() {
            let c = match spec {
                ColumnWidthSpec::Proportional(k) => *k,
                ColumnWidthSpec::Auto => {
                    if auto_by_content {
                        content[i].map(|(_, max)| max.max(1.0)).unwrap_or(1.0)
                    } else {
                        1.0
                    }
                }
                _ => 0.0,
            };
            coefficients[i] = c;
            total_coeff += c;
        }
        if total_coeff > 0.0 {
            let mut surplus = 0.0;
            for i in 0..column_count {
                if coefficients[i] == 0.0 {
                    continue;
                }
                let share = remainder * coefficients[i] / total_coeff;
                let w = match specs[i] {
                    ColumnWidthSpec::Auto => {
                        let (min, max) = content[i].unwrap_or((0.0, share));
                        let clamped = share.clamp(min.min(max), max.max(min));
                        surplus += share - clamped;
                        clamped
                    }
                    _ => share,
                };
                widths[i] = w;
            }
            // Clamping surplus flows to proportional columns, earlier first.
            if surplus.abs() > 1e-9 && has_star {
                let star_total: f64 = specs
                    .iter()
                    .zip(&coefficients)
                    .filter(|(s, _)| matches!(s, ColumnWidthSpec::Proportional(_)))
                    .map(|(_, c)| *c)
                    .sum();
                if star_total > 0.0 {
                    for (i, spec) in specs.iter().enumerate() {
                        if matches!(spec, ColumnWidthSpec::Proportional(_)) {
                            widths[i] += surplus * coefficients[i] / star_total;
                        }
                    }
                }
            }
        }
    }

    Ok(widths)
}

/// Dry-run measures for an auto column: (min content width, max content
/// width) over every cell that starts in it.
#[allow(clippy::too_many_arguments)]
fn column_content_widths(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    classes: &[LayoutClass],
    services: &Services,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
    header_rows: &[NodeId],
    body_rows: &[NodeId],
    column: usize,
    ctx: &ParagraphContext<'_>,
) -> (f64, f64) {
    let mut min_w = 0.0f64;
    let mut max_w = 0.0f64;
    for &row in header_rows.iter().chain(body_rows) {
        let mut at = 0usize;
        for &cell in &tree.children_of_kind(row, FoElement::TableCell) {
            let span = styles[cell].number_columns_spanned();
            if at == column && span == 1 {
                let (min, max) = content_measures(
                    tree, styles, classes, services, options, sink, cell, ctx,
                );
                let pad = styles[cell].padding(0.0).horizontal()
                    + styles[cell].borders().horizontal();
                min_w = min_w.max(min + pad);
                max_w = max_w.max(max + pad);
            }
            at += span;
        }
    }
    (min_w, max_w.max(min_w))
}

/// (widest unbreakable piece, natural single-line width) of a node's content.
#[allow(clippy::too_many_arguments)]
fn content_measures(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    classes: &[LayoutClass],
    services: &Services,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
    node: NodeId,
    ctx: &ParagraphContext<'_>,
) -> (f64, f64) {
    let mut min_w = 0.0f64;
    let mut max_w = 0.0f64;
    for &child in tree.children(node) {
        match classes[child] {
            LayoutClass::Block => {
                let para = match crate::text::build_paragraph(
                    tree, styles, services, options, sink, child, ctx,
                ) {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                let mut line = 0.0f64;
                let mut word = 0.0f64;
                for item in &para.items {
                    match item {
                        crate::text::InlineItem::Box { width, .. } => {
                            line += width;
                            word += width;
                        }
                        crate::text::InlineItem::Glue { width, .. } => {
                            line += width;
                            min_w = min_w.max(word);
                            word = 0.0;
                        }
                        crate::text::InlineItem::Penalty { .. } => {
                            min_w = min_w.max(word);
                        }
                    }
                }
                min_w = min_w.max(word);
                max_w = max_w.max(line);
                let (nested_min, nested_max) = content_measures(
                    tree, styles, classes, services, options, sink, child, ctx,
                );
                min_w = min_w.max(nested_min);
                max_w = max_w.max(nested_max);
            }
            LayoutClass::Image => {
                let w = styles[child].content_width(0.0).unwrap_or(36.0);
                min_w = min_w.max(w);
                max_w = max_w.max(w);
            }
            LayoutClass::Table => {
                // Nested tables contribute their fixed width when they have
                // one; auto nested tables fall back to a shallow scan.
                if let Some(w) = styles[child].width(0.0) {
                    min_w = min_w.max(w);
                    max_w = max_w.max(w);
                } else {
                    let (nmin, nmax) = content_measures(
                        tree, styles, classes, services, options, sink, child, ctx,
                    );
                    min_w = min_w.max(nmin);
                    max_w = max_w.max(nmax);
                }
            }
            _ => {}
        }
    }
    (min_w, max_w)
}

/// Occupancy tracking for rowspans: which columns of upcoming rows are
/// already covered, and by how much height the spanning cell still needs.
struct GridCursor {
    columns: usize,
    /// Per column: number of further rows still covered by a rowspan.
    covered: Vec<usize>,
    /// Open rowspan cells: (start column, span, rows remaining, cell index in
    /// its chunk row, content height still unaccounted).
    open: Vec<OpenSpan>,
}

struct OpenSpan {
    chunk_row: usize,
    cell_index: usize,
    rows_remaining: usize,
    content_height: f64,
}

impl GridCursor {
    fn new(columns: usize) -> Self {
        Self { columns, covered: vec![0; columns], open: Vec::new() }
    }

    fn next_free(&self, from: usize) -> usize {
        let mut at = from;
        while at < self.columns && self.covered[at] > 0 {
            at += 1;
        }
        at
    }

    fn advance_row(&mut self) {
        for c in &mut self.covered {
            *c = c.saturating_sub(1);
        }
        for span in &mut self.open {
            span.rows_remaining = span.rows_remaining.saturating_sub(1);
        }
    }
}

/// Lay out a run of rows into chunks. Rows tied together by open rowspans
/// form one chunk; header/footer rows always form one chunk so repetition is
/// all-or-nothing.
#[allow(clippy::too_many_arguments)]
fn layout_rows(
    tree: &FoTree,
    styles: &[ResolvedStyle],
    classes: &[LayoutClass],
    services: &Services,
    options: &LayoutOptions,
    sink: &mut DiagnosticSink,
    rows: &[NodeId],
    column_widths: &[f64],
    border_spacing: f64,
    ctx: &ParagraphContext<'_>,
    grid: &mut GridCursor,
    single_chunk: bool,
) -> Result<Vec<RowChunk>, LayoutError> {
    let mut chunks: Vec<RowChunk> = Vec::new();
    let mut current_rows: Vec<TableRowArea> = Vec::new();
    let mut current_height = 0.0f64;

    for &row in rows {
        let row_style = &styles[row];
        let cells = tree.children_of_kind(row, FoElement::TableCell);

        let row_y = current_height;
        let mut cell_areas: Vec<TableCellArea> = Vec::new();
        let mut row_content_height = row_style.height().unwrap_or(0.0);
        let mut column_at = 0usize;

        for &cell in &cells {
            let cell_style = &styles[cell];
            let col = grid.next_free(column_at);
            if col >= column_widths.len() {
                sink.warn("table-overflow", "cell beyond declared columns is dropped");
                break;
            }
            let col_span = cell_style.number_columns_spanned().min(column_widths.len() - col);
            let row_span = cell_style.number_rows_spanned();

            let width: f64 = column_widths[col..col + col_span].iter().sum::<f64>()
                + border_spacing * (col_span as f64 - 1.0);
            let padding = cell_style.padding(width);
            let borders = cell_style.borders();
            let inner_width = (width - padding.horizontal() - borders.horizontal()).max(0.0);

            let (mut children, content_height) = crate::pagination::layout_block_content(
                tree, styles, classes, services, options, sink, cell, inner_width, ctx,
            )?;
            let box_height = content_height + padding.vertical() + borders.vertical();

            // x position of this column within the table content box.
            let x: f64 = column_widths[..col].iter().sum::<f64>()
                + border_spacing * (col as f64 + 1.0);

            // Content arrives at a (0,0) local origin; move it into the
            // cell's content box within the chunk.
            for child in &mut children {
                child.shift(x + padding.left + borders.left.width, row_y + padding.top + borders.top.width);
            }

            if row_span == 1 {
                row_content_height = row_content_height.max(box_height);
            } else {
                grid.open.push(OpenSpan {
                    chunk_row: current_rows.len(),
                    cell_index: cell_areas.len(),
                    rows_remaining: row_span,
                    content_height: box_height,
                });
                for covered in grid.covered[col..col + col_span].iter_mut() {
                    *covered = row_span;
                }
            }

            cell_areas.push(TableCellArea {
                rect: Rect::new(x, row_y, width, box_height),
                column_index: col,
                col_span,
                row_span,
                vertical_align: cell_style.display_align(),
                padding,
                borders,
                background: cell_style.background(),
                children,
            });
            column_at = col + col_span;
        }

        // Shift cell content into place and normalize single-span cell
        // heights to the row height.
        for cell in &mut cell_areas {
            if cell.row_span == 1 {
                finalize_cell_height(cell, row_content_height);
            }
        }

        let total_width: f64 =
            column_widths.iter().sum::<f64>() + border_spacing * (column_widths.len() as f64 + 1.0);
        current_rows.push(TableRowArea {
            rect: Rect::new(0.0, row_y, total_width, row_content_height),
            repeated: false,
            cells: cell_areas,
        });
        current_height = row_y + row_content_height + border_spacing;

        grid.advance_row();

        // Close the chunk when no rowspan straddles the boundary.
        let spans_open = grid.open.iter().any(|s| s.rows_remaining > 0);
        if !single_chunk && !spans_open {
            distribute_span_deficits(&mut current_rows, &mut grid.open, border_spacing);
            let height = current_rows
                .last()
                .map(|r| r.rect.bottom())
                .unwrap_or(0.0);
            chunks.push(RowChunk { height, rows: std::mem::take(&mut current_rows) });
            current_height = 0.0;
            grid.open.clear();
        }
    }

    if !current_rows.is_empty() {
        distribute_span_deficits(&mut current_rows, &mut grid.open, border_spacing);
        let height = current_rows.last().map(|r| r.rect.bottom()).unwrap_or(0.0);
        chunks.push(RowChunk { height, rows: current_rows });
        grid.open.clear();
    }

    Ok(chunks)
}

/// After all rows a span covers are sized: if their summed height falls short
/// of the spanning cell's content, distribute the deficit equally across the
/// spanned rows, then stretch every spanning cell to its final height.
fn distribute_span_deficits(rows: &mut [TableRowArea], open: &mut Vec<OpenSpan>, spacing: f64) {
    for span in open.iter() {
        let start = span.chunk_row;
        let covered = rows.len() - start;
        if covered == 0 {
            continue;
        }
        let spanned_height: f64 = rows[start..].iter().map(|r| r.rect.height).sum::<f64>()
            + spacing * (covered as f64 - 1.0);
        let deficit = span.content_height - spanned_height;
        if deficit > 1e-9 {
            let per_row = deficit / covered as f64;
            for row in rows[start..].iter_mut() {
                row.rect.height += per_row;
            }
        }
    }
    // Re-stack rows after any growth.
    let mut y = 0.0;
    for row in rows.iter_mut() {
        let dy = y - row.rect.y;
        if dy != 0.0 {
            row.rect.y = y;
            for cell in &mut row.cells {
                cell.rect.y += dy;
                for child in &mut cell.children {
                    child.shift(0.0, dy);
                }
            }
        }
        y = row.rect.bottom() + spacing;
    }
    // Spanning cells stretch over their rows.
    for span in open.drain(..) {
        let start = span.chunk_row;
        let covered = rows.len() - start;
        let total: f64 = rows[start..].iter().map(|r| r.rect.height).sum::<f64>()
            + spacing * (covered as f64 - 1.0);
        if let Some(cell) = rows[start].cells.get_mut(span.cell_index) {
            finalize_cell_height(cell, total);
        }
    }
}

/// Grow a cell to `height` and apply display-align to its content.
fn finalize_cell_height(cell: &mut TableCellArea, height: f64) {
    let slack = height - cell.rect.height;
    cell.rect.height = height;
    if slack > 1e-9 {
        let dy = match cell.vertical_align {
            CellAlign::Before => 0.0,
            CellAlign::Center => slack / 2.0,
            CellAlign::After => slack,
        };
        if dy > 0.0 {
            for child in &mut cell.children {
                child.shift(0.0, dy);
            }
        }
    }
}

/// Winner of two adjoining borders per the collapse rules: wider wins, then
/// stronger style, then darker color, then the earlier owner (cell over row
/// over table, encoded by calling order).
pub fn collapse_winner(a: Border, b: Border) -> Border {
    if (a.width - b.width).abs() > 1e-9 {
        return if a.width > b.width { a } else { b };
    }
    if a.style != b.style {
        return if a.style > b.style { a } else { b };
    }
    if (a.color.luminance() - b.color.luminance()).abs() > 1e-9 {
        return if a.color.luminance() < b.color.luminance() { a } else { b };
    }
    a
}

/// Apply collapsed-border resolution across a laid-out chunk: shared edges
/// between horizontally adjacent cells and the table's own edges.
pub fn collapse_chunk_borders(chunk: &mut RowChunk, table_borders: &BorderSet) {
    for row in &mut chunk.rows {
        let count = row.cells.len();
        for i in 0..count {
            if i + 1 < count {
                let winner = collapse_winner(row.cells[i].borders.right, row.cells[i + 1].borders.left);
                row.cells[i].borders.right = winner;
                row.cells[i + 1].borders.left = winner;
            }
        }
        if let Some(first) = row.cells.first_mut() {
            first.borders.left = collapse_winner(first.borders.left, table_borders.left);
        }
        if let Some(last) = row.cells.last_mut() {
            last.borders.right = collapse_winner(last.borders.right, table_borders.right);
        }
    }
    // Vertical adjacency between consecutive rows.
    for r in 1..chunk.rows.len() {
        let (before, after) = chunk.rows.split_at_mut(r);
        let above = before.last_mut().expect("split at r >= 1");
        for cell in &mut after[0].cells {
            if let Some(upper) = above
                .cells
                .iter_mut()
                .find(|u| u.column_index == cell.column_index)
            {
                let winner = collapse_winner(upper.borders.bottom, cell.borders.top);
                upper.borders.bottom = winner;
                cell.borders.top = winner;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::BorderStyle;

    #[test]
    fn collapse_prefers_wider_border() {
        let thin = Border { width: 0.5, style: BorderStyle::Solid, color: Color::BLACK };
        let thick = Border { width: 2.0, style: BorderStyle::Dotted, color: Color::BLACK };
        assert_eq!(collapse_winner(thin, thick).width, 2.0);
    }

    #[test]
    fn collapse_style_priority_on_equal_width() {
        let solid = Border { width: 1.0, style: BorderStyle::Solid, color: Color::BLACK };
        let double = Border { width: 1.0, style: BorderStyle::Double, color: Color::BLACK };
        let hidden = Border { width: 1.0, style: BorderStyle::Hidden, color: Color::BLACK };
        assert_eq!(collapse_winner(solid, double).style, BorderStyle::Double);
        assert_eq!(collapse_winner(double, hidden).style, BorderStyle::Hidden);
    }

    #[test]
    fn collapse_darker_color_wins_ties() {
        let dark = Border { width: 1.0, style: BorderStyle::Solid, color: Color::rgb(0.1, 0.1, 0.1) };
        let light = Border { width: 1.0, style: BorderStyle::Solid, color: Color::rgb(0.9, 0.9, 0.9) };
        assert_eq!(collapse_winner(light, dark).color, dark.color);
    }

    #[test]
    fn collapse_first_argument_wins_full_ties() {
        let a = Border { width: 1.0, style: BorderStyle::Solid, color: Color::BLACK };
        let b = Border { width: 1.0, style: BorderStyle::Solid, color: Color::BLACK };
        let w = collapse_winner(a, b);
        assert_eq!(w, a);
    }
}
