//! Configuration types for PDF revision and reassembly.
//!
//! All run behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. The transform service (endpoint URL,
//! model name, backend kind) lives in an explicit [`ServiceConfig`] value that
//! is handed to each component; nothing reads a process-wide constant.

use crate::error::Pdf2DocxError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default generate endpoint of a local Ollama server.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Default model for the local generate endpoint.
pub const DEFAULT_MODEL: &str = "llama3.1";

/// Configuration for one revision run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2docx::{ConversionConfig, TransformMode};
///
/// let config = ConversionConfig::builder()
///     .mode(TransformMode::CorrectAndTranslate { language: "English".into() })
///     .max_chunk_chars(3000)
///     .model("mistral")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// What the model is asked to do with each chunk. Default: grammar correction.
    pub mode: TransformMode,

    /// Transform backend, endpoint and model.
    pub service: ServiceConfig,

    /// Maximum characters per chunk sent to the model. Default: 4000.
    ///
    /// Counted in Unicode scalar values, not bytes. 4 000 characters stay
    /// comfortably inside an 8k-token context once the instruction and the
    /// model's answer are accounted for.
    pub max_chunk_chars: usize,

    /// How tables and figures are presented to the model. Default: segmented.
    pub placeholders: PlaceholderPolicy,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the provider backend may generate per chunk. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient transform failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-request timeout in seconds; `0` disables it. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom instruction replacing the built-in correction prompt.
    pub system_prompt: Option<String>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory containing libpdfium. Falls back to the working directory
    /// and then the system library search path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Heuristics used to group text runs into paragraphs and tables.
    pub layout: LayoutConfig,

    /// Output format. Default: DOCX.
    pub output_format: OutputFormat,

    /// `.docx` template to build on. When `None` a blank document is used.
    pub template: Option<PathBuf>,

    /// Values substituted for `{KEY}` fields in the template.
    pub template_fields: BTreeMap<String, String>,

    /// Rendered width of inserted figures, in inches. Default: 5.0.
    pub figure_width_inches: f32,

    /// Emit a `Table n` / `Figure n` caption after each inserted item. Default: true.
    pub captions: bool,

    /// Category key of the JSON output. Defaults to the input file stem.
    pub json_category: Option<String>,

    /// Receives per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: TransformMode::default(),
            service: ServiceConfig::default(),
            max_chunk_chars: 4000,
            placeholders: PlaceholderPolicy::default(),
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            system_prompt: None,
            password: None,
            pdfium_lib_path: None,
            layout: LayoutConfig::default(),
            output_format: OutputFormat::default(),
            template: None,
            template_fields: BTreeMap::new(),
            figure_width_inches: 5.0,
            captions: true,
            json_category: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("mode", &self.mode)
            .field("service", &self.service)
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("placeholders", &self.placeholders)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("output_format", &self.output_format)
            .field("template", &self.template)
            .field("captions", &self.captions)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn mode(mut self, mode: TransformMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn service(mut self, service: ServiceConfig) -> Self {
        self.config.service = service;
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.service.backend = backend;
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.service.endpoint = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.service.model = model.into();
        self
    }

    pub fn stream(mut self, v: bool) -> Self {
        self.config.service.stream = v;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.service.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.service.provider = Some(provider);
        self
    }

    pub fn max_chunk_chars(mut self, n: usize) -> Self {
        self.config.max_chunk_chars = n;
        self
    }

    pub fn placeholders(mut self, policy: PlaceholderPolicy) -> Self {
        self.config.placeholders = policy;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(dir.into());
        self
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn template(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template = Some(path.into());
        self
    }

    pub fn template_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.template_fields.insert(key.into(), value.into());
        self
    }

    pub fn figure_width_inches(mut self, inches: f32) -> Self {
        self.config.figure_width_inches = inches.clamp(0.5, 20.0);
        self
    }

    pub fn captions(mut self, v: bool) -> Self {
        self.config.captions = v;
        self
    }

    pub fn json_category(mut self, name: impl Into<String>) -> Self {
        self.config.json_category = Some(name.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2DocxError> {
        let c = &self.config;
        if c.max_chunk_chars < 100 {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "Chunk budget must be at least 100 characters, got {}",
                c.max_chunk_chars
            )));
        }
        if let TransformMode::CorrectAndTranslate { ref language } = c.mode {
            if language.trim().is_empty() {
                return Err(Pdf2DocxError::InvalidConfig(
                    "Translation requires a target language".into(),
                ));
            }
        }
        if c.service.backend == Backend::Generate {
            if !(c.service.endpoint.starts_with("http://")
                || c.service.endpoint.starts_with("https://"))
            {
                return Err(Pdf2DocxError::InvalidConfig(format!(
                    "Endpoint must be an HTTP/HTTPS URL, got '{}'",
                    c.service.endpoint
                )));
            }
            if c.service.model.trim().is_empty() {
                return Err(Pdf2DocxError::InvalidConfig("Model name is empty".into()));
            }
        }
        if c.layout.row_tolerance <= 0.0 || c.layout.col_tolerance <= 0.0 {
            return Err(Pdf2DocxError::InvalidConfig(
                "Layout tolerances must be positive".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Service ──────────────────────────────────────────────────────────────

/// Where chunks are sent.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Backend kind. Default: [`Backend::Generate`].
    pub backend: Backend,

    /// Generate endpoint URL. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Model name sent in every request. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Ask the generate endpoint for NDJSON frames instead of one object. Default: true.
    pub stream: bool,

    /// Cloud provider name for [`Backend::Provider`] (e.g. "openai").
    pub provider_name: Option<String>,

    /// Pre-constructed cloud provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            stream: true,
            provider_name: None,
            provider: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("stream", &self.stream)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .finish()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Transform backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// Local inference server speaking `{model, prompt, stream}` (default).
    #[default]
    Generate,
    /// Cloud chat provider via edgequake-llm.
    Provider,
    /// No model: text is rebuilt unchanged.
    Passthrough,
}

/// What the model is asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransformMode {
    /// Fix grammar and typos only (default).
    #[default]
    CorrectOnly,
    /// Fix grammar and typos, then translate into `language`.
    CorrectAndTranslate { language: String },
}

/// How tables and figures are presented to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaceholderPolicy {
    /// Only text segments are sent; references bypass the model (default).
    #[default]
    Segmented,
    /// The whole stream is flattened to marked text and the model is asked
    /// to keep `[TABLE_n]` / `[FIGURE_n]` lines verbatim.
    Inline,
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Docx,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Json => "json",
        }
    }
}

/// Heuristics for grouping positioned text into rows, paragraphs and tables.
///
/// All distances are PDF points (1/72 inch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Runs whose vertical centres are within this distance share a row. Default: 3.0.
    pub row_tolerance: f32,
    /// Left edges within this distance share a column. Default: 10.0.
    pub col_tolerance: f32,
    /// Minimum rows for a table region. Default: 2.
    pub min_rows: usize,
    /// Minimum cells per row for a table region. Default: 2.
    pub min_cols: usize,
    /// Horizontal gap, as a multiple of the run height, separating two cells
    /// on the same row. Smaller gaps are ordinary word spacing. Default: 1.5.
    pub cell_gap: f32,
    /// Vertical gap, as a multiple of the line height, that starts a new
    /// paragraph. Default: 0.8.
    pub paragraph_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 3.0,
            col_tolerance: 10.0,
            min_rows: 2,
            min_cols: 2,
            cell_gap: 1.5,
            paragraph_gap: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = ConversionConfig::builder().build().unwrap();
        assert_eq!(config.max_chunk_chars, 4000);
        assert_eq!(config.service.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.service.backend, Backend::Generate);
        assert!(config.captions);
    }

    #[test]
    fn tiny_chunk_budget_rejected() {
        let err = ConversionConfig::builder().max_chunk_chars(10).build();
        assert!(matches!(err, Err(Pdf2DocxError::InvalidConfig(_))));
    }

    #[test]
    fn translation_needs_language() {
        let err = ConversionConfig::builder()
            .mode(TransformMode::CorrectAndTranslate {
                language: "  ".into(),
            })
            .build();
        assert!(matches!(err, Err(Pdf2DocxError::InvalidConfig(_))));
    }

    #[test]
    fn endpoint_must_be_http() {
        let err = ConversionConfig::builder().endpoint("localhost:11434").build();
        assert!(matches!(err, Err(Pdf2DocxError::InvalidConfig(_))));

        // Irrelevant for the passthrough backend.
        let ok = ConversionConfig::builder()
            .endpoint("localhost:11434")
            .backend(Backend::Passthrough)
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn setters_clamp() {
        let config = ConversionConfig::builder()
            .temperature(9.0)
            .figure_width_inches(0.0)
            .build()
            .unwrap();
        assert_eq!(config.temperature, 2.0);
        assert_eq!(config.figure_width_inches, 0.5);
    }

    #[test]
    fn template_fields_accumulate() {
        let config = ConversionConfig::builder()
            .template_field("TITLE", "Report")
            .template_field("AUTHOR", "QA")
            .build()
            .unwrap();
        assert_eq!(config.template_fields.len(), 2);
        assert_eq!(config.template_fields["TITLE"], "Report");
    }

    #[test]
    fn debug_includes_service() {
        let dbg = format!("{:?}", ConversionConfig::default());
        assert!(dbg.contains("ServiceConfig"));
        assert!(dbg.contains(DEFAULT_MODEL));
    }

    #[test]
    fn output_extension() {
        assert_eq!(OutputFormat::Docx.extension(), "docx");
        assert_eq!(OutputFormat::Json.extension(), "json");
    }
}
