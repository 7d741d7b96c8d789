//! CLI binary for edgequake-pdf2docx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig`, picks a template and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2docx::pipeline::input;
use edgequake_pdf2docx::{
    convert_dir, convert_to_file, inspect, output_path_for, Backend, ConversionConfig,
    ConversionOutput, ConversionProgressCallback, OutputFormat, PlaceholderPolicy,
    ProgressCallback, TransformMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per document, one log line per chunk.
///
/// A batch run reuses the callback, so each `on_conversion_start` builds a
/// fresh bar.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
    chunk_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            chunk_started: Mutex::new(None),
        })
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }

    fn chunk_elapsed(&self) -> f64 {
        self.chunk_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_chunks: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(total_chunks as u64);
        bar.set_style(style);
        bar.set_prefix("Revising");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Sending {total_chunks} chunk(s)…"))
        ));
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_chunk_start(&self, chunk: usize, _total: usize) {
        if let Ok(mut t) = self.chunk_started.lock() {
            *t = Some(Instant::now());
        }
        self.with_bar(|bar| bar.set_message(format!("chunk {chunk}")));
    }

    fn on_chunk_complete(&self, chunk: usize, total: usize, output_len: usize) {
        let secs = self.chunk_elapsed();
        self.with_bar(|bar| {
            bar.println(format!(
                "  {} Chunk {:>3}/{:<3}  {:<8}  {}",
                green("✓"),
                chunk,
                total,
                dim(&format!("{output_len:>5} chars")),
                dim(&format!("{secs:.1}s")),
            ));
            bar.inc(1);
        });
    }

    fn on_chunk_error(&self, chunk: usize, total: usize, error: &str) {
        let secs = self.chunk_elapsed();

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.with_bar(|bar| {
            bar.println(format!(
                "  {} Chunk {:>3}/{:<3}  {}  {}",
                red("✗"),
                chunk,
                total,
                red(&msg),
                dim(&format!("{secs:.1}s")),
            ));
        });
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.abandon();
            }
        }
    }

    fn on_conversion_complete(&self, total_chunks: usize) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
        eprintln!(
            "{} {} chunk(s) revised",
            green("✔"),
            bold(&total_chunks.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fix grammar, blank Word document in ./out
  pdf2docx report.pdf -o out

  # Correct and translate into German using a template
  pdf2docx report.pdf --translate German --template templates/Temp_1.docx

  # Every PDF in a folder; choose the template from a menu
  pdf2docx ./pdfs --templates-dir templates -o out

  # JSON output, one category per file
  pdf2docx report.pdf --format json

  # Rebuild without any model (layout check)
  pdf2docx report.pdf --backend passthrough

  # Cloud provider instead of the local generate endpoint
  pdf2docx report.pdf --backend provider --provider openai --model gpt-4.1-mini

  # Revise an existing Word document, or a folder of them
  pdf2docx letter.docx -o out
  pdf2docx ./letters --pattern '*.docx' -o out

  # Inspect PDF metadata (no model needed)
  pdf2docx --inspect-only report.pdf

TEMPLATES:
  A template is any .docx file. Its paragraphs are kept; the revised
  document is appended after them. {KEY} fields in the template are
  replaced by --field KEY=VALUE. {TITLE} and {SOURCE} default to the PDF
  title (or file name) and the file name.

ENVIRONMENT VARIABLES:
  PDF2DOCX_ENDPOINT       Generate endpoint (default http://localhost:11434/api/generate)
  PDF2DOCX_MODEL          Model name (default llama3.1)
  EDGEQUAKE_LLM_PROVIDER  Provider for --backend provider (openai, anthropic, gemini, ollama)
  OPENAI_API_KEY …        Provider API keys
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Override log filter
"#;

/// Revise PDF documents with an LLM and rebuild them as Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2docx",
    version,
    about = "Revise PDF documents with an LLM (grammar / translation) and rebuild them as .docx",
    long_about = "Extract the text of a PDF, send it chunk by chunk to a language model for \
grammar correction and optional translation, then rebuild the document as a Word file (or JSON) \
with the original tables and images back in place.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or .docx file, or a directory of them (see --pattern).
    input: PathBuf,

    /// Directory for the converted files.
    #[arg(short, long, env = "PDF2DOCX_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// File pattern used when INPUT is a directory.
    #[arg(long, env = "PDF2DOCX_PATTERN", default_value = input::DEFAULT_PATTERN)]
    pattern: String,

    /// Template: a .docx path, or a name inside --templates-dir.
    #[arg(short, long, env = "PDF2DOCX_TEMPLATE")]
    template: Option<String>,

    /// Directory of .docx templates; a menu is shown when several exist.
    #[arg(long, env = "PDF2DOCX_TEMPLATES_DIR")]
    templates_dir: Option<PathBuf>,

    /// Template field, KEY=VALUE (repeatable).
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Translate into this language after correcting.
    #[arg(long, env = "PDF2DOCX_TRANSLATE", value_name = "LANGUAGE")]
    translate: Option<String>,

    /// Transform backend.
    #[arg(long, env = "PDF2DOCX_BACKEND", value_enum, default_value = "generate")]
    backend: BackendArg,

    /// Generate endpoint URL.
    #[arg(long, env = "PDF2DOCX_ENDPOINT")]
    endpoint: Option<String>,

    /// Model name.
    #[arg(long, env = "PDF2DOCX_MODEL")]
    model: Option<String>,

    /// Provider for --backend provider: openai, anthropic, gemini, ollama, …
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Ask the generate endpoint for a single JSON answer instead of a stream.
    #[arg(long, env = "PDF2DOCX_NO_STREAM")]
    no_stream: bool,

    /// Maximum characters per chunk.
    #[arg(long, env = "PDF2DOCX_CHUNK_CHARS", default_value_t = 4000)]
    chunk_chars: usize,

    /// How tables and figures are shown to the model.
    #[arg(long, env = "PDF2DOCX_PLACEHOLDERS", value_enum, default_value = "segmented")]
    placeholders: PlaceholderArg,

    /// Output format.
    #[arg(long, env = "PDF2DOCX_FORMAT", value_enum, default_value = "docx")]
    format: FormatArg,

    /// JSON category name (default: file stem).
    #[arg(long, env = "PDF2DOCX_CATEGORY")]
    category: Option<String>,

    /// Figure width in inches.
    #[arg(long, env = "PDF2DOCX_FIGURE_WIDTH", default_value_t = 6.0)]
    figure_width: f32,

    /// Do not add "Table n" / "Figure n" captions.
    #[arg(long, env = "PDF2DOCX_NO_CAPTIONS")]
    no_captions: bool,

    /// Path to a text file containing a custom instruction.
    #[arg(long, env = "PDF2DOCX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2DOCX_PASSWORD")]
    password: Option<String>,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2DOCX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per chunk on transient failures.
    #[arg(long, env = "PDF2DOCX_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-request timeout in seconds (0 disables).
    #[arg(long, env = "PDF2DOCX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "PDF2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Print machine-readable JSON (metadata or conversion summary) on stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2DOCX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Generate,
    Provider,
    Passthrough,
}

impl From<BackendArg> for Backend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Generate => Backend::Generate,
            BackendArg::Provider => Backend::Provider,
            BackendArg::Passthrough => Backend::Passthrough,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PlaceholderArg {
    Segmented,
    Inline,
}

impl From<PlaceholderArg> for PlaceholderPolicy {
    fn from(v: PlaceholderArg) -> Self {
        match v {
            PlaceholderArg::Segmented => PlaceholderPolicy::Segmented,
            PlaceholderArg::Inline => PlaceholderPolicy::Inline,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Docx,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Docx => OutputFormat::Docx,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let mut builder = ConversionConfig::builder().backend(Backend::Passthrough);
        if let Some(ref p) = cli.password {
            builder = builder.password(p.clone());
        }
        if let Some(ref dir) = cli.pdfium_lib_path {
            builder = builder.pdfium_lib_path(dir.clone());
        }
        let config = builder.build().context("Invalid configuration")?;
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let template = choose_template(&cli)?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, template, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    if cli.input.is_dir() {
        let items = convert_dir(&cli.input, &cli.pattern, &cli.output_dir, &config)
            .await
            .context("Batch conversion failed")?;

        let failed = items.iter().filter(|i| !i.is_ok()).count();
        for item in &items {
            match &item.result {
                Ok(output) => report(&cli, output),
                Err(e) if !cli.quiet => {
                    eprintln!("{}  {}  {}", red("✘"), item.input.display(), red(&e.to_string()))
                }
                Err(_) => {}
            }
        }
        if !cli.quiet {
            eprintln!(
                "{} {}/{} file(s) converted",
                if failed == 0 { green("✔") } else { cyan("⚠") },
                bold(&(items.len() - failed).to_string()),
                items.len()
            );
        }
        if failed > 0 {
            anyhow::bail!("{failed} file(s) failed");
        }
    } else {
        let out_path = output_path_for(&cli.input, &cli.output_dir, config.output_format);
        let output = convert_to_file(&cli.input, &out_path, &config)
            .await
            .context("Conversion failed")?;
        report(&cli, &output);
    }

    Ok(())
}

/// Print the outcome of one document.
fn report(cli: &Cli, output: &ConversionOutput) {
    if cli.json {
        #[derive(serde::Serialize)]
        struct Summary<'a> {
            output_path: Option<&'a Path>,
            stats: &'a edgequake_pdf2docx::ConversionStats,
            report: &'a edgequake_pdf2docx::AssemblyReport,
            warnings: Vec<String>,
        }
        let summary = Summary {
            output_path: output.output_path.as_deref(),
            stats: &output.stats,
            report: &output.report,
            warnings: output.warnings.iter().map(|w| w.to_string()).collect(),
        };
        if let Ok(json) = serde_json::to_string_pretty(&summary) {
            println!("{json}");
        }
        return;
    }
    if cli.quiet {
        return;
    }

    let s = &output.stats;
    let path = output
        .output_path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    eprintln!(
        "{}  {} pages  {} tables  {} figures  {}ms  →  {}",
        if output.report.unresolved.is_empty() && output.warnings.is_empty() {
            green("✔")
        } else {
            cyan("⚠")
        },
        s.total_pages,
        s.tables,
        s.figures,
        s.total_duration_ms,
        bold(&path),
    );
    for w in &output.warnings {
        eprintln!("   {} {}", cyan("⚠"), dim(&w.to_string()));
    }
    for p in &output.report.unresolved {
        eprintln!("   {} unresolved {}", cyan("⚠"), dim(p));
    }
}

/// Resolve `--template` / `--templates-dir` to one template file, if any.
fn choose_template(cli: &Cli) -> Result<Option<PathBuf>> {
    if let Some(ref name) = cli.template {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return Ok(Some(direct));
        }
        let dir = cli
            .templates_dir
            .as_deref()
            .with_context(|| format!("Template '{name}' is not a file and no --templates-dir was given"))?;
        return Ok(Some(input::find_template(dir, name)?));
    }

    let Some(ref dir) = cli.templates_dir else {
        return Ok(None);
    };
    let templates = input::list_templates(dir)?;
    if templates.len() == 1 {
        return Ok(Some(templates[0].clone()));
    }
    if !io::stdin().is_terminal() {
        anyhow::bail!(
            "{} templates in {}; pick one with --template",
            templates.len(),
            dir.display()
        );
    }
    let chosen = input::prompt_template(&templates, io::stdin().lock(), io::stderr())?;
    Ok(Some(chosen))
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(
    cli: &Cli,
    template: Option<PathBuf>,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mode = match cli.translate {
        Some(ref language) => TransformMode::CorrectAndTranslate {
            language: language.clone(),
        },
        None => TransformMode::CorrectOnly,
    };

    let mut builder = ConversionConfig::builder()
        .mode(mode)
        .backend(cli.backend.into())
        .stream(!cli.no_stream)
        .max_chunk_chars(cli.chunk_chars)
        .placeholders(cli.placeholders.into())
        .output_format(cli.format.into())
        .figure_width_inches(cli.figure_width)
        .captions(!cli.no_captions)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref url) = cli.endpoint {
        builder = builder.endpoint(url.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref category) = cli.category {
        builder = builder.json_category(category.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref dir) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(dir.clone());
    }
    if let Some(path) = template {
        builder = builder.template(path);
    }
    for (key, value) in &cli.fields {
        builder = builder.template_field(key.clone(), value.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--field KEY=VALUE`.
fn parse_field(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
