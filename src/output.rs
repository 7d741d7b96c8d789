//! Result types returned by the conversion entry points.

use crate::content::ContentStream;
use crate::error::ExtractWarning;
use crate::pipeline::assemble::AssemblyReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Document information read from the PDF's info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    /// e.g. `"Pdf1_7"`.
    pub pdf_version: String,
}

/// Counters and timings for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub paragraphs: usize,
    pub tables: usize,
    pub figures: usize,
    /// Characters of text sent through the transform step.
    pub text_chars: usize,
    pub chunks_sent: usize,
    pub chunks_skipped: usize,
    pub retries: u32,
    pub extract_duration_ms: u64,
    pub transform_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a conversion produced, before or after it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The transformed content stream.
    pub content: ContentStream,
    /// What the reassembler placed and what it could not resolve.
    pub report: AssemblyReport,
    /// Non-fatal extraction problems.
    pub warnings: Vec<ExtractWarning>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
    /// The rendered `.docx` or `.json` bytes.
    #[serde(skip)]
    pub document: Vec<u8>,
    /// Where the file was written, when it was.
    pub output_path: Option<PathBuf>,
}

/// Outcome of one file in a batch run.
#[derive(Debug)]
pub struct BatchItem {
    pub input: PathBuf,
    pub result: Result<ConversionOutput, crate::error::Pdf2DocxError>,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
