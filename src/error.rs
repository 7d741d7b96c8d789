//! Error types for the edgequake-pdf2docx library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Pdf2DocxError`] (fatal): the run cannot produce an output file
//!   (bad input, unreadable PDF, transform service down). Returned as
//!   `Err(Pdf2DocxError)` from the top-level `convert*` functions; nothing is
//!   written to the output directory.
//!
//! * [`ExtractWarning`] (non-fatal): one image or one page could not be
//!   extracted. The run continues without it and the warning is reported in
//!   [`crate::output::ConversionOutput::warnings`].
//!
//! * [`TransformError`] (per attempt): a single request to the transform
//!   backend failed. The invoker retries transient ones and turns the final
//!   failure into [`Pdf2DocxError::TransformFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2docx library.
#[derive(Debug, Error)]
pub enum Pdf2DocxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is neither a PDF nor a `.docx`.
    #[error("File is not a valid PDF or Word document: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// An input directory contained no file matching the pattern.
    #[error("No files matching '{pattern}' in '{dir}'")]
    EmptyDirectory { dir: PathBuf, pattern: String },

    /// The template directory holds no `.docx` file.
    #[error("No .docx templates found in '{dir}'")]
    NoTemplates { dir: PathBuf },

    /// A template was requested by name but does not exist.
    #[error("Template '{name}' not found in '{dir}'")]
    TemplateNotFound { dir: PathBuf, name: String },

    /// The template exists but docx-rs could not read it.
    #[error("Failed to read template '{path}': {detail}")]
    TemplateUnreadable { path: PathBuf, detail: String },

    /// The file-selection glob is not a valid pattern.
    #[error("Invalid file pattern '{pattern}': {detail}")]
    InvalidGlob { pattern: String, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, then either:\n\
  • place it in the working directory, or\n\
  • set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Word errors ───────────────────────────────────────────────────────
    /// A `.docx` input could not be opened or parsed.
    #[error("Word document '{path}' could not be read: {detail}")]
    CorruptWord { path: PathBuf, detail: String },

    // ── Transform errors ──────────────────────────────────────────────────
    /// The configured cloud provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A chunk could not be transformed; the remaining chunks were not sent.
    #[error("Transform failed on chunk {chunk} after {attempts} attempt(s): {detail}")]
    TransformFailed {
        chunk: usize,
        attempts: u32,
        detail: String,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// docx-rs failed to build or pack the document.
    #[error("Failed to build Word document: {0}")]
    DocxBuildFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal extraction problem.
///
/// The offending image or page is skipped; no placeholder is emitted for it,
/// so every placeholder in the content stream still resolves.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractWarning {
    /// An embedded image could not be decoded.
    #[error("Page {page}: image {image} could not be decoded: {detail}")]
    ImageDecodeFailed {
        page: usize,
        image: usize,
        detail: String,
    },

    /// A decoded image could not be saved to the temporary figure directory.
    #[error("Page {page}: image {image} could not be saved: {detail}")]
    FigureWriteFailed {
        page: usize,
        image: usize,
        detail: String,
    },

    /// pdfium returned no text layer for the page.
    #[error("Page {page}: text layer unavailable: {detail}")]
    PageTextUnavailable { page: usize, detail: String },
}

/// A single failed request to the transform backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// The connection could not be established or was reset.
    #[error("connection to '{url}' failed: {detail}")]
    Connection { url: String, detail: String },

    /// The request exceeded the configured wall-clock timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The stream ended before a frame with `done: true` arrived.
    #[error("stream ended after {frames} frame(s) without a terminal frame")]
    Incomplete { frames: usize },

    /// The service reported an error inside the response.
    #[error("service error: {0}")]
    Service(String),

    /// A cloud provider call failed.
    #[error("provider error: {0}")]
    Provider(String),
}

impl TransformError {
    /// Whether retrying the same request may succeed.
    ///
    /// Connection resets, timeouts, truncated streams, `429` and `5xx` are
    /// transient. Any other status (bad model name, malformed payload, auth)
    /// will fail identically on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            TransformError::Connection { .. }
            | TransformError::Timeout { .. }
            | TransformError::Incomplete { .. }
            | TransformError::Provider(_) => true,
            TransformError::Status { status, .. } => *status == 429 || *status >= 500,
            TransformError::InvalidResponse(_) | TransformError::Service(_) => false,
        }
    }
}
