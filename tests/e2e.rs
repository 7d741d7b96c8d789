//! End-to-end tests through pdfium.
//!
//! The PDFs are written by the tests themselves. Tests that need pdfium skip
//! themselves when the library cannot be loaded; set `PDFIUM_LIB_PATH` to the
//! directory holding `libpdfium` to run them.
//!
//! Run with:
//!   PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test e2e -- --nocapture
//!
//! No model server is needed: conversions use the passthrough backend.

use edgequake_pdf2docx::pipeline::extract::bind_pdfium;
use edgequake_pdf2docx::{
    convert, convert_dir, convert_to_file, inspect, Backend, ConversionConfig, OutputFormat,
    Pdf2DocxError,
};
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test when pdfium cannot be bound.
macro_rules! skip_unless_pdfium {
    () => {{
        if let Err(e) = bind_pdfium(None) {
            println!("SKIP — pdfium unavailable: {e}");
            return;
        }
    }};
}

/// What goes on one page of a test PDF. Coordinates are PDF points with
/// the origin at the bottom left of a 612x792 page.
#[derive(Default)]
struct TestPage<'a> {
    /// Lines of Helvetica 12 flowing down from (72, 720).
    lines: Vec<&'a str>,
    /// Text placed at an exact position, one text object each.
    cells: Vec<(f32, f32, &'a str)>,
    /// Draw the 2x2 test image into `(x, y, width, height)`.
    image: Option<(f32, f32, f32, f32)>,
}

impl TestPage<'_> {
    fn content(&self) -> String {
        let mut stream = String::new();
        if !self.lines.is_empty() {
            stream.push_str("BT /F1 12 Tf 72 720 Td 14 TL\n");
            for line in &self.lines {
                stream.push_str(&format!("({line}) Tj T*\n"));
            }
            stream.push_str("ET\n");
        }
        for (x, y, text) in &self.cells {
            stream.push_str(&format!("BT /F1 12 Tf {x} {y} Td ({text}) Tj ET\n"));
        }
        if let Some((x, y, w, h)) = self.image {
            stream.push_str(&format!("q {w} 0 0 {h} {x} {y} cm /Im1 Do Q\n"));
        }
        stream
    }
}

/// A one-page PDF with one line of Helvetica text per entry in `lines`.
fn write_pdf(path: &Path, lines: &[&str]) {
    write_pages(
        path,
        &[TestPage {
            lines: lines.to_vec(),
            ..Default::default()
        }],
    );
}

/// A PDF with one page per entry. Every page shares one font and one
/// 2x2 RGB image.
///
/// Cross-reference offsets are computed, so the file needs no repair.
fn write_pages(path: &Path, pages: &[TestPage<'_>]) {
    // 1 catalog, 2 page tree, 3 font, 4 image, 5 info, then page + content pairs.
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 6 + 2 * i))
        .collect();
    let pixels = "FF0000 00FF00 0000FF FFFFFF>";
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceRGB \
             /BitsPerComponent 8 /Filter /ASCIIHexDecode /Length {} >>\nstream\n{}\nendstream",
            pixels.len(),
            pixels
        ),
        "<< /Title (Quarterly Report) /Author (Finance) >>".to_string(),
    ];
    for (i, page) in pages.iter().enumerate() {
        let stream = page.content();
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> /XObject << /Im1 4 0 R >> >> \
             /Contents {} 0 R >>",
            7 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }
    let xref = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for off in offsets {
        pdf.push_str(&format!("{off:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref
    ));
    std::fs::write(path, pdf).unwrap();
}

fn passthrough(format: OutputFormat) -> ConversionConfig {
    ConversionConfig::builder()
        .backend(Backend::Passthrough)
        .output_format(format)
        .build()
        .unwrap()
}

fn json_blocks(path: &Path, category: &str) -> Vec<String> {
    let v: serde_json::Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    v[category]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap().to_string())
        .collect()
}

// ── Input validation (no pdfium needed) ──────────────────────────────────────

#[tokio::test]
async fn test_not_a_pdf_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.pdf");
    std::fs::write(&input, b"plain text, not a PDF").unwrap();
    let out = dir.path().join("out/notes.docx");

    let err = convert_to_file(&input, &out, &passthrough(OutputFormat::Docx))
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2DocxError::NotAPdf { .. }));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    let err = inspect("/nonexistent/file.pdf", &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2DocxError::FileNotFound { .. }));
}

#[tokio::test]
async fn test_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let err = convert_dir(dir.path(), "*.pdf", dir.path(), &passthrough(OutputFormat::Json))
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2DocxError::EmptyDirectory { .. }));
}

// ── Through pdfium ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_metadata() {
    skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    write_pdf(&pdf, &["Hello world."]);

    let meta = inspect(&pdf, &ConversionConfig::default()).await.unwrap();
    assert_eq!(meta.page_count, 1);
    assert_eq!(meta.title.as_deref(), Some("Quarterly Report"));
    assert_eq!(meta.author.as_deref(), Some("Finance"));
}

#[tokio::test]
async fn test_convert_json_passthrough() {
    skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    write_pdf(&pdf, &["Hello world.", "Second line here."]);
    let out = dir.path().join("report.json");

    let output = convert_to_file(&pdf, &out, &passthrough(OutputFormat::Json))
        .await
        .unwrap();

    assert_eq!(output.output_path.as_deref(), Some(out.as_path()));
    assert_eq!(output.stats.total_pages, 1);
    let text = json_blocks(&out, "report").join(" ");
    assert!(text.contains("Hello world."), "got: {text}");
    assert!(text.contains("Second line here."), "got: {text}");
    assert!(!dir.path().join("report.json.tmp").exists());
}

#[tokio::test]
async fn test_convert_docx_passthrough() {
    skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("memo.pdf");
    write_pdf(&pdf, &["A short memo."]);

    let output = convert(&pdf, &passthrough(OutputFormat::Docx)).await.unwrap();
    assert!(output.document.starts_with(b"PK"));
    assert!(output.output_path.is_none());
    assert_eq!(output.report.tables, 0);
}

#[tokio::test]
async fn test_table_and_figure_keep_reading_order() {
    skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("summary.pdf");
    write_pages(
        &pdf,
        &[
            TestPage {
                lines: vec!["Quarterly summary."],
                cells: vec![
                    (72.0, 640.0, "Region"),
                    (220.0, 640.0, "Units"),
                    (360.0, 640.0, "Share"),
                    (72.0, 620.0, "North"),
                    (220.0, 620.0, "10"),
                    (360.0, 620.0, "12"),
                ],
                image: Some((72.0, 400.0, 120.0, 120.0)),
            },
            TestPage {
                lines: vec!["Closing remarks."],
                ..Default::default()
            },
        ],
    );
    let out = dir.path().join("summary.json");

    let output = convert_to_file(&pdf, &out, &passthrough(OutputFormat::Json))
        .await
        .unwrap();

    assert_eq!(output.stats.total_pages, 2);
    assert_eq!(output.report.tables, 1);
    assert_eq!(output.report.figures, 1);
    assert!(output.report.unresolved.is_empty());
    assert!(output.report.appended.is_empty());

    let blocks = json_blocks(&out, "summary");
    let position = |needle: &str| {
        blocks
            .iter()
            .position(|b| b.contains(needle))
            .unwrap_or_else(|| panic!("{needle:?} missing from {blocks:?}"))
    };
    let intro = position("Quarterly summary.");
    let table = position("| Region | Units | Share |");
    let figure = position("Figure 1");
    let closing = position("Closing remarks.");
    assert!(intro < table && table < figure && figure < closing, "got: {blocks:?}");
    assert!(blocks[table].contains("| North | 10 | 12 |"), "got: {}", blocks[table]);
}

#[tokio::test]
async fn test_convert_dir_writes_one_file_per_pdf() {
    skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("a.pdf"), &["First."]);
    write_pdf(&dir.path().join("b.pdf"), &["Second."]);
    std::fs::write(dir.path().join("c.txt"), b"ignored").unwrap();
    let out_dir: PathBuf = dir.path().join("out");

    let items = convert_dir(dir.path(), "*.pdf", &out_dir, &passthrough(OutputFormat::Json))
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.is_ok()));
    assert_eq!(json_blocks(&out_dir.join("a.json"), "a"), vec!["First."]);
    assert_eq!(json_blocks(&out_dir.join("b.json"), "b"), vec!["Second."]);
}

#[tokio::test]
async fn test_corrupt_pdf_fails_in_batch_but_others_succeed() {
    skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("good.pdf"), &["Fine."]);
    std::fs::write(dir.path().join("bad.pdf"), b"%PDF-1.4\ngarbage without objects").unwrap();
    let out_dir = dir.path().join("out");

    let items = convert_dir(dir.path(), "*.pdf", &out_dir, &passthrough(OutputFormat::Json))
        .await
        .unwrap();

    let bad = items.iter().find(|i| i.input.ends_with("bad.pdf")).unwrap();
    assert!(matches!(bad.result, Err(Pdf2DocxError::CorruptPdf { .. })));
    assert!(!out_dir.join("bad.json").exists());
    assert!(out_dir.join("good.json").exists());
}
