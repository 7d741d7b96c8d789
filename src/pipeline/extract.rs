//! PDF extraction: text runs, tables and images via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and every call blocks.
//! The whole document walk runs inside `tokio::task::spawn_blocking` so the
//! async runtime never stalls on it.
//!
//! The walk itself is split in two. The pdfium half turns every page into a
//! [`RawPage`] (positioned text runs plus decoded images). [`build_document`]
//! is pure: it runs the layout pass, numbers tables and figures and produces
//! the content stream. Tests drive it with hand-built pages.

use crate::config::{ConversionConfig, LayoutConfig};
use crate::content::{ContentBuilder, ContentStream, Table};
use crate::error::{ExtractWarning, Pdf2DocxError};
use crate::output::DocumentMetadata;
use crate::pipeline::figures::FigureStore;
use crate::pipeline::layout::{self, ImageBox, PageItem, PageLayout, TextRun};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The result of walking one PDF.
#[derive(Debug)]
pub struct ExtractedDocument {
    /// Text and references in reading order.
    pub content: ContentStream,
    /// Tables, indexed by `TableRef - 1`.
    pub tables: Vec<Table>,
    pub figures: FigureStore,
    pub warnings: Vec<ExtractWarning>,
    pub metadata: DocumentMetadata,
}

/// One page as read from pdfium, before layout analysis.
#[derive(Debug, Default)]
pub struct RawPage {
    pub layout: PageLayout,
    /// Decoded images, indexed by [`ImageBox::id`]. `Err` holds the decode error.
    pub images: Vec<Result<DynamicImage, String>>,
    /// Set when the page's text layer could not be read.
    pub text_error: Option<String>,
}

/// Build the content stream, tables and figures from raw pages.
///
/// Pages are processed in order; each contributes its paragraphs, tables and
/// images in top-to-bottom order. A table whose top-left cell is empty is
/// numbered where it was found but placed at the end of the document.
pub fn build_document(
    pages: Vec<RawPage>,
    layout_config: &LayoutConfig,
    metadata: DocumentMetadata,
) -> Result<ExtractedDocument, Pdf2DocxError> {
    let mut builder = ContentBuilder::new();
    let mut figures = FigureStore::new()?;
    let mut warnings = Vec::new();

    for page in pages {
        let number = page.layout.number;
        if let Some(detail) = page.text_error {
            let w = ExtractWarning::PageTextUnavailable {
                page: number,
                detail,
            };
            warn!("{}", w);
            warnings.push(w);
        }

        for item in layout::analyze(&page.layout, layout_config) {
            match item {
                PageItem::Paragraph(text) => {
                    builder.push_text(&text);
                    builder.push_text("\n");
                }
                PageItem::Table(table) => {
                    let anchored = table.first_cell().is_some_and(|c| !c.trim().is_empty());
                    let r = builder.push_table(table, anchored);
                    if !anchored {
                        debug!("Page {}: table {} deferred to end of document", number, r.0);
                    }
                }
                PageItem::Image(id) => match page.images.get(id) {
                    Some(Ok(img)) => match figures.insert(number, img) {
                        Ok(r) => builder.push_figure(r),
                        Err(e) => {
                            let w = ExtractWarning::FigureWriteFailed {
                                page: number,
                                image: id + 1,
                                detail: e.to_string(),
                            };
                            warn!("{}", w);
                            warnings.push(w);
                        }
                    },
                    Some(Err(detail)) => {
                        let w = ExtractWarning::ImageDecodeFailed {
                            page: number,
                            image: id + 1,
                            detail: detail.clone(),
                        };
                        warn!("{}", w);
                        warnings.push(w);
                    }
                    None => {}
                },
            }
        }
    }

    let (content, tables) = builder.finish();
    Ok(ExtractedDocument {
        content,
        tables,
        figures,
        warnings,
        metadata,
    })
}

/// Extract a PDF's content. Runs in a blocking task.
pub async fn extract(pdf_path: &Path, config: &ConversionConfig) -> Result<ExtractedDocument, Pdf2DocxError> {
    let path = pdf_path.to_path_buf();
    let password = config.password.clone();
    let lib_dir = config.pdfium_lib_path.clone();
    let layout_config = config.layout.clone();

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(lib_dir.as_deref())?;
        let document = open_document(&pdfium, &path, password.as_deref())?;
        let metadata = read_metadata(&document);
        info!("PDF loaded: {} pages", metadata.page_count);

        let pages = read_pages(&document);
        build_document(pages, &layout_config, metadata)
    })
    .await
    .map_err(|e| Pdf2DocxError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Read document metadata without walking page content.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
    lib_dir: Option<&Path>,
) -> Result<DocumentMetadata, Pdf2DocxError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    let lib_dir = lib_dir.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(lib_dir.as_deref())?;
        let document = open_document(&pdfium, &path, pwd.as_deref())?;
        Ok(read_metadata(&document))
    })
    .await
    .map_err(|e| Pdf2DocxError::Internal(format!("Metadata task panicked: {}", e)))?
}

/// Bind libpdfium from `lib_dir`, `PDFIUM_LIB_PATH`, the working directory,
/// or the system library path, in that order.
pub fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, Pdf2DocxError> {
    let dir: Option<PathBuf> = lib_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2DocxError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2DocxError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2DocxError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Pdf2DocxError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Pdf2DocxError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn read_metadata(document: &PdfDocument<'_>) -> DocumentMetadata {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}

/// Walk every page, converting PDF's bottom-left origin to top-left.
fn read_pages(document: &PdfDocument<'_>) -> Vec<RawPage> {
    let mut pages = Vec::new();

    for (idx, page) in document.pages().iter().enumerate() {
        let number = idx + 1;
        let page_height = page.height().value;
        let mut raw = RawPage {
            layout: PageLayout {
                number,
                ..Default::default()
            },
            ..Default::default()
        };

        match page.text() {
            Ok(text) => {
                for segment in text.segments().iter() {
                    let content = segment.text();
                    if content.trim().is_empty() {
                        continue;
                    }
                    let bounds = segment.bounds();
                    raw.layout.runs.push(TextRun {
                        text: content,
                        x: bounds.left().value,
                        y: page_height - bounds.top().value,
                        width: bounds.right().value - bounds.left().value,
                        height: bounds.top().value - bounds.bottom().value,
                    });
                }
            }
            Err(e) => raw.text_error = Some(format!("{:?}", e)),
        }

        for object in page.objects().iter() {
            if let Some(image) = object.as_image_object() {
                let id = raw.images.len();
                let y = object
                    .bounds()
                    .map(|b| page_height - b.top().value)
                    .unwrap_or(0.0);
                raw.layout.images.push(ImageBox { id, y });
                raw.images.push(image.get_raw_image().map_err(|e| format!("{:?}", e)));
            }
        }

        debug!(
            "Page {}: {} text runs, {} images",
            number,
            raw.layout.runs.len(),
            raw.images.len()
        );
        pages.push(raw);
    }

    pages
}
