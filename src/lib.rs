//! # edgequake-pdf2docx
//!
//! Proofread or translate PDF documents with a language model and rebuild
//! them as Word documents. Existing `.docx` files can be revised the same way.
//!
//! Only the running text goes to the model. Tables and images are lifted out
//! of the PDF first and replaced by `[TABLE_n]` / `[FIGURE_n]` placeholders,
//! so the model never has to reproduce them and cannot garble them. After
//! the text comes back, each placeholder is swapped for the real table or
//! image, in its original position.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate the file (magic bytes) or list a directory
//!  ├─ 2. Extract    pdfium text runs + images (CPU-bound, spawn_blocking);
//!  │                a .docx input is read with docx-rs instead
//!  ├─ 3. Layout     rows/columns → paragraphs, tables, figure anchors
//!  ├─ 4. Chunk      sentence/line-bounded slices under a character budget
//!  ├─ 5. Transform  one model call per chunk, retry with backoff
//!  ├─ 6. Assemble   placeholders → tables / images, captions
//!  └─ 7. Output     template .docx (fields filled) or JSON
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2docx::{convert_to_file, ConversionConfig, TransformMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Local Ollama-compatible /api/generate endpoint by default.
//!     let config = ConversionConfig::builder()
//!         .mode(TransformMode::CorrectAndTranslate { language: "German".into() })
//!         .template("templates/Temp_1.docx")
//!         .build()?;
//!     let output = convert_to_file("report.pdf", "out/report.docx", &config).await?;
//!     eprintln!("{} chunks, {} tables, {} figures",
//!         output.stats.chunks_sent, output.stats.tables, output.stats.figures);
//!     Ok(())
//! }
//! ```
//!
//! ## Backends
//!
//! | Backend | Talks to |
//! |---------|----------|
//! | `Generate` (default) | `POST {model, prompt, stream}` to a generate endpoint, streamed NDJSON or one JSON object |
//! | `Provider` | any `edgequake-llm` chat provider (OpenAI, Anthropic, Gemini, Ollama, …) |
//! | `Passthrough` | nothing; text is reassembled unchanged |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! edgequake-pdf2docx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod content;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    Backend, ConversionConfig, ConversionConfigBuilder, LayoutConfig, OutputFormat,
    PlaceholderPolicy, ServiceConfig, TransformMode,
};
pub use content::{ContentStream, FigureRef, Placeholder, Segment, Table, TableRef};
pub use convert::{
    convert, convert_dir, convert_sync, convert_to_file, convert_with, inspect, output_path_for,
    revise_document,
};
pub use error::{ExtractWarning, Pdf2DocxError, TransformError};
pub use output::{BatchItem, ConversionOutput, ConversionStats, DocumentMetadata};
pub use pipeline::assemble::{AssemblyReport, Block};
pub use pipeline::transform::Transformer;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
