//! Reassembly: transformed content stream → blocks → Word document.
//!
//! [`build_blocks`] is pure. It resolves every table and figure reference
//! against the run's collections and records what it could not resolve.
//! [`render_docx`] then appends the blocks to a template (or blank) document.
//!
//! An unresolved placeholder is never an error: it is written as literal
//! `[TABLE_n]` text so the reader sees where something went missing.

use crate::content::{ContentStream, FigureRef, Placeholder, Segment, Table, TableRef};
use crate::error::Pdf2DocxError;
use crate::pipeline::figures::FigureStore;
use docx_rs::{AlignmentType, Docx, Paragraph, Pic, Run, TableCell, TableRow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::PathBuf;
use tracing::{debug, warn};

/// EMU (English Metric Units) per inch, the unit of DOCX drawing sizes.
const EMU_PER_INCH: f32 = 914_400.0;

/// One output element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph { text: String },
    Table { index: usize, table: Table },
    Figure {
        index: usize,
        path: PathBuf,
        width_px: u32,
        height_px: u32,
    },
    Caption { text: String },
    /// An unresolved placeholder, kept as text.
    Literal { text: String },
}

/// What the reassembler placed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub paragraphs: usize,
    pub tables: usize,
    pub figures: usize,
    /// Placeholders with no matching table or figure, as written.
    pub unresolved: Vec<String>,
    /// Tables and figures the transformed stream never referenced; they are
    /// appended at the end of the document.
    pub appended: Vec<String>,
}

/// Resolve the content stream into blocks, in stream order.
pub fn build_blocks(
    content: &ContentStream,
    tables: &[Table],
    figures: &FigureStore,
    captions: bool,
) -> (Vec<Block>, AssemblyReport) {
    let mut blocks = Vec::new();
    let mut report = AssemblyReport::default();
    let mut placed: HashSet<Placeholder> = HashSet::new();

    for segment in content.segments() {
        match segment {
            Segment::Text(text) => {
                for line in text.lines() {
                    let line = line.trim();
                    if !line.is_empty() {
                        blocks.push(Block::Paragraph {
                            text: line.to_string(),
                        });
                        report.paragraphs += 1;
                    }
                }
            }
            Segment::Table(r) => {
                if place_table(*r, tables, captions, &mut blocks, &mut report) {
                    placed.insert(Placeholder::Table(*r));
                }
            }
            Segment::Figure(r) => {
                if place_figure(*r, figures, captions, &mut blocks, &mut report) {
                    placed.insert(Placeholder::Figure(*r));
                }
            }
        }
    }

    for n in 1..=tables.len() {
        let p = Placeholder::Table(TableRef(n));
        if !placed.contains(&p) {
            warn!("{} was not referenced; appending it", p);
            report.appended.push(p.to_string());
            place_table(TableRef(n), tables, captions, &mut blocks, &mut report);
        }
    }
    for n in 1..=figures.len() {
        let p = Placeholder::Figure(FigureRef(n));
        if !placed.contains(&p) {
            warn!("{} was not referenced; appending it", p);
            report.appended.push(p.to_string());
            place_figure(FigureRef(n), figures, captions, &mut blocks, &mut report);
        }
    }

    debug!(
        "Assembled {} paragraphs, {} tables, {} figures, {} unresolved",
        report.paragraphs,
        report.tables,
        report.figures,
        report.unresolved.len()
    );
    (blocks, report)
}

fn place_table(
    r: TableRef,
    tables: &[Table],
    captions: bool,
    blocks: &mut Vec<Block>,
    report: &mut AssemblyReport,
) -> bool {
    match r.0.checked_sub(1).and_then(|i| tables.get(i)) {
        Some(table) => {
            blocks.push(Block::Table {
                index: r.0,
                table: table.clone(),
            });
            if captions {
                blocks.push(Block::Caption {
                    text: format!("Table {}", r.0),
                });
            }
            report.tables += 1;
            true
        }
        None => {
            unresolved(Placeholder::Table(r), blocks, report);
            false
        }
    }
}

fn place_figure(
    r: FigureRef,
    figures: &FigureStore,
    captions: bool,
    blocks: &mut Vec<Block>,
    report: &mut AssemblyReport,
) -> bool {
    match figures.get(r) {
        Some(fig) => {
            blocks.push(Block::Figure {
                index: r.0,
                path: fig.path.clone(),
                width_px: fig.width_px,
                height_px: fig.height_px,
            });
            if captions {
                blocks.push(Block::Caption {
                    text: format!("Figure {}", r.0),
                });
            }
            report.figures += 1;
            true
        }
        None => {
            unresolved(Placeholder::Figure(r), blocks, report);
            false
        }
    }
}

fn unresolved(p: Placeholder, blocks: &mut Vec<Block>, report: &mut AssemblyReport) {
    warn!("Unresolved placeholder {}", p);
    blocks.push(Block::Literal { text: p.to_string() });
    report.unresolved.push(p.to_string());
}

/// Append `blocks` to `docx`.
///
/// Figures are scaled to `figure_width_inches`, keeping their aspect ratio.
/// A figure whose file cannot be read degrades to its literal placeholder.
pub fn render_docx(blocks: &[Block], mut docx: Docx, figure_width_inches: f32) -> Docx {
    for block in blocks {
        docx = match block {
            Block::Paragraph { text } | Block::Literal { text } => {
                docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
            }
            Block::Caption { text } => docx.add_paragraph(
                Paragraph::new()
                    .align(AlignmentType::Center)
                    .add_run(Run::new().add_text(text).italic()),
            ),
            Block::Table { table, .. } => docx.add_table(word_table(table)),
            Block::Figure {
                index,
                path,
                width_px,
                height_px,
            } => match std::fs::read(path) {
                Ok(bytes) => {
                    let (w, h) = figure_size_emu(*width_px, *height_px, figure_width_inches);
                    let pic = Pic::new(&bytes).size(w, h);
                    docx.add_paragraph(
                        Paragraph::new()
                            .align(AlignmentType::Center)
                            .add_run(Run::new().add_image(pic)),
                    )
                }
                Err(e) => {
                    warn!("Figure {} unreadable ({}); writing placeholder", index, e);
                    let literal = Placeholder::Figure(FigureRef(*index)).to_string();
                    docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(literal)))
                }
            },
        };
    }
    docx
}

fn word_table(table: &Table) -> docx_rs::Table {
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            TableRow::new(
                row.iter()
                    .map(|cell| {
                        TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(cell)))
                    })
                    .collect(),
            )
        })
        .collect();
    docx_rs::Table::new(rows)
}

/// Display size in EMU for a figure `width_inches` wide.
fn figure_size_emu(width_px: u32, height_px: u32, width_inches: f32) -> (u32, u32) {
    let ratio = if width_px == 0 {
        1.0
    } else {
        height_px as f32 / width_px as f32
    };
    let w = width_inches * EMU_PER_INCH;
    (w.round() as u32, (w * ratio).round() as u32)
}

/// Serialise a document to `.docx` bytes.
pub fn pack_docx(docx: Docx) -> Result<Vec<u8>, Pdf2DocxError> {
    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| Pdf2DocxError::DocxBuildFailed(e.to_string()))?;
    Ok(buf.into_inner())
}
