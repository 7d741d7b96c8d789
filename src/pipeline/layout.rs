//! Heuristic page layout: positioned text runs → paragraphs, tables, images.
//!
//! This module never touches pdfium. [`crate::pipeline::extract`] turns each
//! page into a [`PageLayout`] and calls [`analyze`], which makes the grouping
//! logic testable with hand-built coordinates.
//!
//! The algorithm:
//! 1. Cluster runs into rows by vertical centre (`row_tolerance`)
//! 2. Merge runs within a row into cells; a gap wider than
//!    `cell_gap × height` separates two cells
//! 3. Consecutive rows with `min_cols`+ cells and a similar cell count
//!    (±1) form a table region of at least `min_rows` rows
//! 4. Column boundaries come from clustering left edges (`col_tolerance`)
//! 5. Remaining rows become lines; a vertical gap wider than
//!    `paragraph_gap × line height` starts a new paragraph
//! 6. Paragraphs, tables and images are ordered by their top edge
//!
//! Coordinates use a top-left origin with `y` growing downwards, in points.

use crate::config::LayoutConfig;
use crate::content::Table;
use std::cmp::Ordering;

/// A piece of text with its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextRun {
    fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Position of an embedded image. `id` is opaque to the layout pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBox {
    pub id: usize,
    pub y: f32,
}

/// Everything the layout pass needs to know about one page.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    /// 1-based page number.
    pub number: usize,
    pub runs: Vec<TextRun>,
    pub images: Vec<ImageBox>,
}

/// One reading-order item on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    Paragraph(String),
    Table(Table),
    /// The [`ImageBox::id`] of an image.
    Image(usize),
}

#[derive(Debug)]
struct Cell {
    text: String,
    x: f32,
    right: f32,
}

impl Cell {
    fn center_x(&self) -> f32 {
        (self.x + self.right) / 2.0
    }
}

#[derive(Debug)]
struct Row {
    top: f32,
    bottom: f32,
    cells: Vec<Cell>,
}

impl Row {
    fn height(&self) -> f32 {
        (self.bottom - self.top).max(1.0)
    }

    fn line_text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Group a page into ordered paragraphs, tables and images.
pub fn analyze(page: &PageLayout, config: &LayoutConfig) -> Vec<PageItem> {
    let rows = build_rows(&page.runs, config);
    let regions = find_table_regions(&rows, config);

    let mut placed: Vec<(f32, PageItem)> = Vec::new();
    let mut lines: Vec<&Row> = Vec::new();
    let mut i = 0;
    while i < rows.len() {
        if let Some(&(start, end)) = regions.iter().find(|(s, _)| *s == i) {
            if let Some(table) = build_table(&rows[start..end], config) {
                flush_paragraphs(&mut lines, config, &mut placed);
                placed.push((rows[start].top, PageItem::Table(table)));
                i = end;
                continue;
            }
        }
        lines.push(&rows[i]);
        i += 1;
    }
    flush_paragraphs(&mut lines, config, &mut placed);

    for image in &page.images {
        placed.push((image.y, PageItem::Image(image.id)));
    }

    // Stable: text before an image that starts on the same line.
    placed.sort_by(|a, b| cmp_f32(a.0, b.0));
    placed.into_iter().map(|(_, item)| item).collect()
}

/// Cluster runs into rows and merge each row's runs into cells.
fn build_rows(runs: &[TextRun], config: &LayoutConfig) -> Vec<Row> {
    let mut sorted: Vec<&TextRun> = runs.iter().filter(|r| !r.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| cmp_f32(a.y, b.y).then_with(|| cmp_f32(a.x, b.x)));

    let mut clusters: Vec<Vec<&TextRun>> = Vec::new();
    for run in sorted {
        let found = clusters.iter_mut().find(|row| {
            row.first()
                .is_some_and(|first| (run.center_y() - first.center_y()).abs() <= config.row_tolerance)
        });
        match found {
            Some(row) => row.push(run),
            None => clusters.push(vec![run]),
        }
    }

    let mut rows: Vec<Row> = clusters
        .into_iter()
        .map(|mut runs| {
            runs.sort_by(|a, b| cmp_f32(a.x, b.x));
            let top = runs.iter().map(|r| r.y).fold(f32::MAX, f32::min);
            let bottom = runs.iter().map(|r| r.y + r.height).fold(f32::MIN, f32::max);
            Row {
                top,
                bottom,
                cells: merge_cells(&runs, config),
            }
        })
        .collect();
    rows.sort_by(|a, b| cmp_f32(a.top, b.top));
    rows
}

fn merge_cells(runs: &[&TextRun], config: &LayoutConfig) -> Vec<Cell> {
    let mut cells: Vec<Cell> = Vec::new();
    for run in runs {
        let text = run.text.trim();
        let height = run.height.max(1.0);
        match cells.last_mut() {
            Some(cell) if run.x - cell.right <= config.cell_gap * height => {
                // Glyph-level runs touch; word-level runs leave a space.
                if run.x - cell.right > 0.15 * height && !cell.text.ends_with(' ') {
                    cell.text.push(' ');
                }
                cell.text.push_str(text);
                cell.right = cell.right.max(run.right());
            }
            _ => cells.push(Cell {
                text: text.to_string(),
                x: run.x,
                right: run.right(),
            }),
        }
    }
    cells
}

/// Half-open row ranges that look like tables.
fn find_table_regions(rows: &[Row], config: &LayoutConfig) -> Vec<(usize, usize)> {
    let mut regions = Vec::new();
    let mut start: Option<usize> = None;
    let mut expected_cols = 0usize;

    for (i, row) in rows.iter().enumerate() {
        let cols = row.cells.len();
        if cols < config.min_cols {
            if let Some(s) = start.take() {
                if i - s >= config.min_rows {
                    regions.push((s, i));
                }
            }
            continue;
        }
        match start {
            Some(_) if cols.abs_diff(expected_cols) <= 1 => {}
            Some(s) => {
                if i - s >= config.min_rows {
                    regions.push((s, i));
                }
                start = Some(i);
                expected_cols = cols;
            }
            None => {
                start = Some(i);
                expected_cols = cols;
            }
        }
    }
    if let Some(s) = start {
        if rows.len() - s >= config.min_rows {
            regions.push((s, rows.len()));
        }
    }
    regions
}

fn build_table(region: &[Row], config: &LayoutConfig) -> Option<Table> {
    let boundaries = column_boundaries(region, config);
    let num_cols = boundaries.len().saturating_sub(1);
    if num_cols < config.min_cols {
        return None;
    }

    let rows = region
        .iter()
        .map(|row| {
            let mut out = vec![String::new(); num_cols];
            for cell in &row.cells {
                let col = column_index(cell.center_x(), &boundaries);
                let slot = &mut out[col.min(num_cols - 1)];
                if !slot.is_empty() {
                    slot.push(' ');
                }
                slot.push_str(&cell.text);
            }
            out
        })
        .collect();
    Some(Table::new(rows))
}

fn column_boundaries(region: &[Row], config: &LayoutConfig) -> Vec<f32> {
    let mut xs: Vec<f32> = region
        .iter()
        .flat_map(|row| row.cells.iter().map(|c| c.x))
        .collect();
    xs.sort_by(|a, b| cmp_f32(*a, *b));

    let Some(&first) = xs.first() else {
        return Vec::new();
    };
    let mut boundaries = vec![first];
    for &x in &xs[1..] {
        if boundaries.last().is_some_and(|&last| x - last > config.col_tolerance) {
            boundaries.push(x);
        }
    }
    let max_right = region
        .iter()
        .flat_map(|row| row.cells.iter().map(|c| c.right))
        .fold(f32::MIN, f32::max);
    boundaries.push(max_right);
    boundaries
}

fn column_index(center_x: f32, boundaries: &[f32]) -> usize {
    boundaries
        .windows(2)
        .position(|w| center_x >= w[0] && center_x < w[1])
        .unwrap_or(boundaries.len().saturating_sub(2))
}

/// Turn buffered non-table rows into paragraphs.
fn flush_paragraphs(lines: &mut Vec<&Row>, config: &LayoutConfig, placed: &mut Vec<(f32, PageItem)>) {
    let mut current: Option<(f32, String)> = None;
    let mut prev: Option<&Row> = None;

    for row in lines.drain(..) {
        let text = row.line_text();
        let breaks = prev.is_some_and(|p| row.top - p.bottom > config.paragraph_gap * p.height());
        match current.as_mut() {
            Some((_, para)) if !breaks => join_line(para, &text),
            _ => {
                if let Some((top, para)) = current.take() {
                    placed.push((top, PageItem::Paragraph(para)));
                }
                current = Some((row.top, text));
            }
        }
        prev = Some(row);
    }
    if let Some((top, para)) = current {
        placed.push((top, PageItem::Paragraph(para)));
    }
}

/// Append a wrapped line, undoing end-of-line hyphenation.
fn join_line(para: &mut String, line: &str) {
    let mut tail = para.chars().rev();
    let hyphenated = tail.next() == Some('-')
        && tail.next().is_some_and(char::is_alphabetic)
        && line.chars().next().is_some_and(char::is_lowercase);
    if hyphenated {
        para.pop();
    } else {
        para.push(' ');
    }
    para.push_str(line);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f32, y: f32, width: f32) -> TextRun {
        TextRun {
            text: text.into(),
            x,
            y,
            width,
            height: 10.0,
        }
    }

    fn page(runs: Vec<TextRun>, images: Vec<ImageBox>) -> PageLayout {
        PageLayout {
            number: 1,
            runs,
            images,
        }
    }

    fn table_rows(y0: f32) -> Vec<TextRun> {
        let mut runs = Vec::new();
        for (r, label) in ["Name", "Alice", "Bob"].iter().enumerate() {
            let y = y0 + r as f32 * 15.0;
            runs.push(run(label, 50.0, y, 40.0));
            runs.push(run(&format!("{r}0"), 150.0, y, 20.0));
            runs.push(run(&format!("c{r}"), 250.0, y, 20.0));
        }
        runs
    }

    #[test]
    fn words_on_a_line_form_one_paragraph() {
        let items = analyze(
            &page(
                vec![run("Intro", 50.0, 50.0, 30.0), run("text", 85.0, 50.0, 20.0)],
                vec![],
            ),
            &LayoutConfig::default(),
        );
        assert_eq!(items, vec![PageItem::Paragraph("Intro text".into())]);
    }

    #[test]
    fn glyph_runs_join_without_spaces() {
        let runs = vec![
            run("A", 50.0, 50.0, 6.0),
            run("B", 56.0, 50.0, 6.0),
            run("C", 62.0, 50.0, 6.0),
        ];
        let items = analyze(&page(runs, vec![]), &LayoutConfig::default());
        assert_eq!(items, vec![PageItem::Paragraph("ABC".into())]);
    }

    #[test]
    fn vertical_gap_starts_new_paragraph() {
        let runs = vec![
            run("line one", 50.0, 50.0, 60.0),
            run("line two", 50.0, 62.0, 60.0),
            run("next para", 50.0, 90.0, 60.0),
        ];
        let items = analyze(&page(runs, vec![]), &LayoutConfig::default());
        assert_eq!(
            items,
            vec![
                PageItem::Paragraph("line one line two".into()),
                PageItem::Paragraph("next para".into()),
            ]
        );
    }

    #[test]
    fn hyphenated_line_end_is_joined() {
        let runs = vec![run("recon-", 50.0, 50.0, 40.0), run("struction", 50.0, 62.0, 50.0)];
        let items = analyze(&page(runs, vec![]), &LayoutConfig::default());
        assert_eq!(items, vec![PageItem::Paragraph("reconstruction".into())]);
    }

    #[test]
    fn grid_becomes_table_in_reading_order() {
        let mut runs = vec![run("Intro", 50.0, 50.0, 30.0)];
        runs.extend(table_rows(100.0));
        runs.push(run("Outro", 50.0, 300.0, 30.0));
        let images = vec![ImageBox { id: 7, y: 200.0 }];

        let items = analyze(&page(runs, images), &LayoutConfig::default());
        assert_eq!(items.len(), 4);
        assert_eq!(items[0], PageItem::Paragraph("Intro".into()));
        match &items[1] {
            PageItem::Table(t) => {
                assert_eq!(t.row_count(), 3);
                assert_eq!(t.column_count(), 3);
                assert_eq!(t.rows()[1], vec!["Alice", "10", "c1"]);
            }
            other => panic!("expected table, got {other:?}"),
        }
        assert_eq!(items[2], PageItem::Image(7));
        assert_eq!(items[3], PageItem::Paragraph("Outro".into()));
    }

    #[test]
    fn single_multi_cell_row_is_not_a_table() {
        let runs = vec![run("Left", 50.0, 50.0, 30.0), run("Right", 300.0, 50.0, 30.0)];
        let items = analyze(&page(runs, vec![]), &LayoutConfig::default());
        assert_eq!(items, vec![PageItem::Paragraph("Left Right".into())]);
    }

    #[test]
    fn missing_cell_keeps_grid_shape() {
        let mut runs = table_rows(100.0);
        // Drop "Bob", leaving an empty first cell in the last row.
        runs.retain(|r| r.text != "Bob");
        let items = analyze(&page(runs, vec![]), &LayoutConfig::default());
        match &items[0] {
            PageItem::Table(t) => assert_eq!(t.rows()[2], vec!["", "20", "c2"]),
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn empty_page_yields_only_images() {
        let items = analyze(
            &page(vec![run("   ", 0.0, 0.0, 5.0)], vec![ImageBox { id: 0, y: 10.0 }]),
            &LayoutConfig::default(),
        );
        assert_eq!(items, vec![PageItem::Image(0)]);
    }
}
