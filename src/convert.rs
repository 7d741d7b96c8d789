//! Conversion entry points.
//!
//! [`convert`] runs the whole pipeline for one PDF (or `.docx`) and returns the rendered
//! document in memory; [`convert_to_file`] and [`convert_dir`] also write it.
//! Nothing is written unless every step succeeded.

use crate::config::{ConversionConfig, OutputFormat};
use crate::error::Pdf2DocxError;
use crate::output::{BatchItem, ConversionOutput, ConversionStats, DocumentMetadata};
use crate::pipeline::extract::{self, ExtractedDocument};
use crate::pipeline::transform::{self, Transformer};
use crate::pipeline::input::InputKind;
use crate::pipeline::{assemble, export, input, template, word};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert one PDF into a revised `.docx` (or `.json`) document.
///
/// A `.docx` input is read with docx-rs instead of pdfium and goes through
/// the same transform and reassembly.
///
/// # Errors
/// Input, PDF and template errors are returned before any request reaches
/// the model. A chunk that cannot be transformed aborts the run with
/// [`Pdf2DocxError::TransformFailed`].
pub async fn convert(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let transformer = transform::build_transformer(config)?;
    convert_with(input_path, config, transformer.as_ref()).await
}

/// [`convert`] with a caller-supplied backend.
pub async fn convert_with(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
    transformer: &dyn Transformer,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let total_start = Instant::now();
    let (path, kind) = input::resolve_input(input_path.as_ref())?;
    info!("Starting conversion: {}", path.display());

    let extract_start = Instant::now();
    let document = match kind {
        InputKind::Pdf => extract::extract(&path, config).await?,
        InputKind::Word => word::read_word(&path).await?,
    };
    let extract_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} tables, {} figures from {} pages in {}ms",
        document.tables.len(),
        document.figures.len(),
        document.metadata.page_count,
        extract_ms
    );

    let mut output = revise_document(document, &stem_of(&path), transformer, config).await?;
    output.stats.extract_duration_ms = extract_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Conversion complete: {} chunks, {}ms total",
        output.stats.chunks_sent, output.stats.total_duration_ms
    );
    Ok(output)
}

/// Transform and reassemble an already extracted document.
///
/// `stem` names the document: it is the default JSON category and the
/// default `{TITLE}` / `{SOURCE}` template value.
pub async fn revise_document(
    document: ExtractedDocument,
    stem: &str,
    transformer: &dyn Transformer,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    // Fail on a bad template before the first model request.
    let base = match config.output_format {
        OutputFormat::Docx => Some(template::load(config.template.as_deref())?),
        OutputFormat::Json => None,
    };

    let ExtractedDocument {
        content,
        tables,
        figures,
        warnings,
        metadata,
    } = document;

    let (revised, tstats) = transform::transform_content(&content, transformer, config).await?;
    let (blocks, report) = assemble::build_blocks(&revised, &tables, &figures, config.captions);

    let rendered = match base {
        Some(mut docx) => {
            let fields = template_fields(config, &metadata, stem);
            template::fill_fields(&mut docx, &fields);
            let docx = assemble::render_docx(&blocks, docx, config.figure_width_inches);
            assemble::pack_docx(docx)?
        }
        None => {
            let category = config.json_category.as_deref().unwrap_or(stem);
            export::to_json(&blocks, category)?.into_bytes()
        }
    };
    // `figures` (and its temporary directory) is dropped after rendering.
    drop(figures);

    let stats = ConversionStats {
        total_pages: metadata.page_count,
        paragraphs: report.paragraphs,
        tables: report.tables,
        figures: report.figures,
        text_chars: content.text_chars(),
        chunks_sent: tstats.chunks_sent,
        chunks_skipped: tstats.chunks_skipped,
        retries: tstats.retries,
        transform_duration_ms: tstats.duration_ms,
        ..Default::default()
    };

    Ok(ConversionOutput {
        content: revised,
        report,
        warnings,
        metadata,
        stats,
        document: rendered,
        output_path: None,
    })
}

/// Convert a PDF and write the result to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let path = output_path.as_ref();
    ensure_distinct(input_path.as_ref(), path)?;
    let mut output = convert(input_path, config).await?;
    write_atomic(path, &output.document).await?;
    info!("Wrote {}", path.display());
    output.output_path = Some(path.to_path_buf());
    Ok(output)
}

/// Convert every PDF (or `.docx`) in `dir` matching `pattern` into `output_dir`.
///
/// Documents run one after another. A failed document is reported in its
/// [`BatchItem`] and does not stop the batch.
pub async fn convert_dir(
    dir: impl AsRef<Path>,
    pattern: &str,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Vec<BatchItem>, Pdf2DocxError> {
    let files = input::list_pdfs(dir.as_ref(), pattern)?;
    let transformer = transform::build_transformer(config)?;
    info!("Batch: {} file(s)", files.len());

    let mut items = Vec::with_capacity(files.len());
    for file in files {
        let out_path = output_path_for(&file, output_dir.as_ref(), config.output_format);
        let result = async {
            ensure_distinct(&file, &out_path)?;
            let mut output = convert_with(&file, config, transformer.as_ref()).await?;
            write_atomic(&out_path, &output.document).await?;
            output.output_path = Some(out_path.clone());
            Ok::<_, Pdf2DocxError>(output)
        }
        .await;
        if let Err(ref e) = result {
            warn!("{}: {}", file.display(), e);
        }
        items.push(BatchItem {
            input: file,
            result,
        });
    }
    Ok(items)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2DocxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_path, config))
}

/// Extract PDF metadata without converting content.
///
/// Does not contact any model backend.
pub async fn inspect(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentMetadata, Pdf2DocxError> {
    let pdf_path = input::resolve_local(input_path.as_ref())?;
    extract::extract_metadata(
        &pdf_path,
        config.password.as_deref(),
        config.pdfium_lib_path.as_deref(),
    )
    .await
}

/// `<output_dir>/<stem>.<ext>` for an input file.
pub fn output_path_for(input_path: &Path, output_dir: &Path, format: OutputFormat) -> PathBuf {
    output_dir.join(format!("{}.{}", stem_of(input_path), format.extension()))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// User fields plus `TITLE` and `SOURCE` defaults.
fn template_fields(
    config: &ConversionConfig,
    metadata: &DocumentMetadata,
    stem: &str,
) -> BTreeMap<String, String> {
    let mut fields = config.template_fields.clone();
    fields
        .entry("TITLE".to_string())
        .or_insert_with(|| metadata.title.clone().unwrap_or_else(|| stem.to_string()));
    fields
        .entry("SOURCE".to_string())
        .or_insert_with(|| stem.to_string());
    fields
}

/// A `.docx` input must not be overwritten by its own output.
fn ensure_distinct(input: &Path, output: &Path) -> Result<(), Pdf2DocxError> {
    let same = input == output
        || matches!(
            (std::fs::canonicalize(input), std::fs::canonicalize(output)),
            (Ok(a), Ok(b)) if a == b
        );
    if same {
        return Err(Pdf2DocxError::InvalidConfig(format!(
            "Output '{}' would overwrite the input",
            output.display()
        )));
    }
    Ok(())
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2DocxError> {
    let write_err = |e| Pdf2DocxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("{} bytes → {}", bytes.len(), path.display());
    Ok(())
}
