//! Word input: read a `.docx` into the same content stream a PDF produces.
//!
//! Body paragraphs become text, tables become [`Table`]s and inline pictures
//! become figures, all in document order. Word has no fixed pages, so every
//! figure and warning is reported against page 1 and `page_count` is 0.

use crate::content::{ContentBuilder, Table};
use crate::error::{ExtractWarning, Pdf2DocxError};
use crate::output::DocumentMetadata;
use crate::pipeline::extract::ExtractedDocument;
use crate::pipeline::figures::FigureStore;
use docx_rs::{
    DocumentChild, Docx, DrawingData, ParagraphChild, RunChild, TableCellContent, TableChild,
    TableRowChild,
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Read a `.docx` file. Runs in a blocking task.
pub async fn read_word(path: &Path) -> Result<ExtractedDocument, Pdf2DocxError> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let unreadable = |detail: String| Pdf2DocxError::CorruptWord {
            path: path.clone(),
            detail,
        };
        let bytes = std::fs::read(&path).map_err(|e| unreadable(e.to_string()))?;
        let docx = docx_rs::read_docx(&bytes).map_err(|e| unreadable(e.to_string()))?;
        let document = build_from_docx(&docx)?;
        info!(
            "Word document loaded: {} tables, {} figures",
            document.tables.len(),
            document.figures.len()
        );
        Ok(document)
    })
    .await
    .map_err(|e| Pdf2DocxError::Internal(format!("Word task panicked: {}", e)))?
}

/// Build the content stream, tables and figures from a parsed document.
///
/// A table whose top-left cell is empty is numbered in place but moved to
/// the end, as for PDFs.
pub fn build_from_docx(docx: &Docx) -> Result<ExtractedDocument, Pdf2DocxError> {
    let mut builder = ContentBuilder::new();
    let mut figures = FigureStore::new()?;
    let mut warnings = Vec::new();
    let mut pictures = 0usize;

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => {
                let mut text = String::new();
                let mut pic_ids = Vec::new();
                paragraph_text(&p.children, &mut text, &mut pic_ids);
                if !text.trim().is_empty() {
                    builder.push_text(text.trim_end());
                    builder.push_text("\n");
                }
                for id in pic_ids {
                    pictures += 1;
                    match decode_picture(docx, &id) {
                        Ok(img) => match figures.insert(1, &img) {
                            Ok(r) => builder.push_figure(r),
                            Err(e) => warnings.push(ExtractWarning::FigureWriteFailed {
                                page: 1,
                                image: pictures,
                                detail: e.to_string(),
                            }),
                        },
                        Err(detail) => warnings.push(ExtractWarning::ImageDecodeFailed {
                            page: 1,
                            image: pictures,
                            detail,
                        }),
                    }
                }
            }
            DocumentChild::Table(t) => {
                let table = Table::new(table_rows(&t.rows));
                if table.row_count() == 0 {
                    continue;
                }
                let anchored = table.first_cell().is_some_and(|c| !c.trim().is_empty());
                let r = builder.push_table(table, anchored);
                if !anchored {
                    debug!("Word table {} deferred to end of document", r.0);
                }
            }
            _ => {}
        }
    }
    for w in &warnings {
        warn!("{}", w);
    }

    let (content, tables) = builder.finish();
    Ok(ExtractedDocument {
        content,
        tables,
        figures,
        warnings,
        metadata: DocumentMetadata::default(),
    })
}

/// Append the visible text of `children` to `out` and collect picture ids.
fn paragraph_text(children: &[ParagraphChild], out: &mut String, pics: &mut Vec<String>) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for rc in &run.children {
                    match rc {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) => out.push('\t'),
                        RunChild::Break(_) => out.push('\n'),
                        RunChild::Drawing(d) => {
                            if let Some(DrawingData::Pic(pic)) = &d.data {
                                pics.push(pic.id.clone());
                            }
                        }
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => paragraph_text(&link.children, out, pics),
            _ => {}
        }
    }
}

fn table_rows(rows: &[TableChild]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|TableChild::TableRow(row)| {
            row.cells
                .iter()
                .map(|TableRowChild::TableCell(cell)| {
                    let mut lines = Vec::new();
                    for content in &cell.children {
                        if let TableCellContent::Paragraph(p) = content {
                            let mut text = String::new();
                            paragraph_text(&p.children, &mut text, &mut Vec::new());
                            let text = text.trim();
                            if !text.is_empty() {
                                lines.push(text.to_string());
                            }
                        }
                    }
                    lines.join(" ")
                })
                .collect()
        })
        .filter(|cells: &Vec<String>| !cells.is_empty())
        .collect()
}

fn decode_picture(docx: &Docx, id: &str) -> Result<image::DynamicImage, String> {
    let (_, _, original, _) = docx
        .images
        .iter()
        .find(|(rid, ..)| rid == id)
        .ok_or_else(|| format!("no media for {id}"))?;
    image::load_from_memory(&original.0).map_err(|e| e.to_string())
}
