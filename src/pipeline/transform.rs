//! Transform invoker: send chunks to a model backend and rebuild the stream.
//!
//! Backends implement [`Transformer`]. The invoker owns everything around a
//! single call: chunking, retries, progress events, output cleanup and
//! whitespace restoration.
//!
//! ## Retry Strategy
//!
//! Only transient failures are retried (see [`TransformError::is_transient`]).
//! The wait before attempt `n` is `retry_backoff_ms * 2^(n-1)`: with the
//! defaults that is 500 ms → 1 s → 2 s. A permanent failure, or a transient
//! one that outlives the retries, aborts the run; later chunks are never sent.

use crate::config::{Backend, ConversionConfig, PlaceholderPolicy, ServiceConfig};
use crate::content::{ContentStream, Segment};
use crate::error::{Pdf2DocxError, TransformError};
use crate::pipeline::chunk::{chunk_text, is_blank};
use crate::pipeline::frames::{self, FrameDecoder};
use crate::pipeline::postprocess::clean_output;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A text-to-text model backend.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Apply `instruction` to `text` and return the model's answer.
    async fn transform(&self, instruction: &str, text: &str) -> Result<String, TransformError>;

    /// `true` when answers are not model output and must skip cleanup.
    fn raw_output(&self) -> bool {
        false
    }
}

// ── Generate endpoint ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Client for a local `{model, prompt, stream}` generate endpoint.
pub struct GenerateClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    stream: bool,
    timeout_secs: u64,
}

impl GenerateClient {
    pub fn new(service: &ServiceConfig, timeout_secs: u64) -> Result<Self, Pdf2DocxError> {
        let mut builder = reqwest::Client::builder();
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        let http = builder
            .build()
            .map_err(|e| Pdf2DocxError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: service.endpoint.clone(),
            model: service.model.clone(),
            stream: service.stream,
            timeout_secs,
        })
    }

    fn map_http_err(&self, e: reqwest::Error) -> TransformError {
        if e.is_timeout() {
            TransformError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            TransformError::Connection {
                url: self.endpoint.clone(),
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Transformer for GenerateClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn transform(&self, instruction: &str, text: &str) -> Result<String, TransformError> {
        let prompt = prompts::completion_prompt(instruction, text);
        let request = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: self.stream,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_http_err(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransformError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        if !self.stream {
            let body = resp.bytes().await.map_err(|e| self.map_http_err(e))?;
            return frames::decode_single(&body);
        }

        let mut decoder = FrameDecoder::new();
        let mut body = resp.bytes_stream();
        while let Some(part) = body.next().await {
            let part = part.map_err(|e| self.map_http_err(e))?;
            decoder.feed(&part);
            if decoder.is_done() {
                break;
            }
        }
        debug!(
            "{} frame(s), {} malformed",
            decoder.frames(),
            decoder.malformed()
        );
        decoder.finish()
    }
}

// ── Cloud provider ───────────────────────────────────────────────────────

/// Chat backend backed by an edgequake-llm provider.
pub struct ProviderTransformer {
    label: String,
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderTransformer {
    pub fn new(label: impl Into<String>, provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            label: label.into(),
            provider,
            options: CompletionOptions {
                temperature: Some(config.temperature),
                max_tokens: Some(config.max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl Transformer for ProviderTransformer {
    fn name(&self) -> &str {
        &self.label
    }

    async fn transform(&self, instruction: &str, text: &str) -> Result<String, TransformError> {
        let messages = vec![ChatMessage::system(instruction), ChatMessage::user(text)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| TransformError::Provider(e.to_string()))?;
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Returns every chunk unchanged.
#[derive(Debug, Default)]
pub struct Passthrough;

#[async_trait]
impl Transformer for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn transform(&self, _instruction: &str, text: &str) -> Result<String, TransformError> {
        Ok(text.to_string())
    }

    fn raw_output(&self) -> bool {
        true
    }
}

/// Construct the backend named by `config.service`.
pub fn build_transformer(config: &ConversionConfig) -> Result<Box<dyn Transformer>, Pdf2DocxError> {
    match config.service.backend {
        Backend::Generate => Ok(Box::new(GenerateClient::new(
            &config.service,
            config.api_timeout_secs,
        )?)),
        Backend::Provider => {
            let (label, provider) = resolve_provider(&config.service)?;
            Ok(Box::new(ProviderTransformer::new(label, provider, config)))
        }
        Backend::Passthrough => Ok(Box::new(Passthrough)),
    }
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2DocxError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        Pdf2DocxError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the cloud provider, from most-specific to least-specific:
///
/// 1. a pre-built provider in the service config;
/// 2. a provider name, with the configured model;
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set;
/// 4. full auto-detection from API-key variables.
fn resolve_provider(
    service: &ServiceConfig,
) -> Result<(String, Arc<dyn LLMProvider>), Pdf2DocxError> {
    if let Some(ref provider) = service.provider {
        let label = service.provider_name.clone().unwrap_or_else(|| "custom".into());
        return Ok((label, Arc::clone(provider)));
    }

    if let Some(ref name) = service.provider_name {
        let provider = create_provider(name, &service.model)?;
        return Ok((format!("{name}/{}", service.model), provider));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let provider = create_provider(&prov, &model)?;
            return Ok((format!("{prov}/{model}"), provider));
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2DocxError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or use the generate backend.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(("auto".to_string(), provider))
}

// ── Invoker ──────────────────────────────────────────────────────────────

/// Counters for one transform pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Chunks sent to the backend.
    pub chunks_sent: usize,
    /// Whitespace-only chunks carried through without a request.
    pub chunks_skipped: usize,
    /// Extra attempts spent on transient failures.
    pub retries: u32,
    pub duration_ms: u64,
}

/// Transform the text of `content` chunk by chunk.
///
/// Under [`PlaceholderPolicy::Segmented`] only text segments are chunked;
/// table and figure references are copied to the output stream untouched.
/// Under [`PlaceholderPolicy::Inline`] the whole stream is flattened to
/// marked text, transformed, and parsed back.
pub async fn transform_content(
    content: &ContentStream,
    transformer: &dyn Transformer,
    config: &ConversionConfig,
) -> Result<(ContentStream, TransformStats), Pdf2DocxError> {
    let start = Instant::now();
    let instruction = prompts::instruction(
        &config.mode,
        config.placeholders,
        config.system_prompt.as_deref(),
    );
    let max = config.max_chunk_chars;

    let (stream, mut stats) = match config.placeholders {
        PlaceholderPolicy::Segmented => {
            let total = content
                .segments()
                .iter()
                .map(|s| match s {
                    Segment::Text(t) => count_sendable(t, max),
                    _ => 0,
                })
                .sum();
            let mut invoker = Invoker::new(transformer, config, &instruction, total);
            invoker.start();

            let mut out = ContentStream::new();
            for segment in content.segments() {
                match segment {
                    Segment::Text(t) => {
                        let mut revised = String::with_capacity(t.len());
                        for chunk in chunk_text(t, max) {
                            revised.push_str(&invoker.run_chunk(chunk).await?);
                        }
                        out.push(Segment::Text(revised));
                    }
                    other => out.push(other.clone()),
                }
            }
            invoker.finish(out)
        }
        PlaceholderPolicy::Inline => {
            let marked = content.to_marked_text();
            let total = count_sendable(&marked, max);
            let mut invoker = Invoker::new(transformer, config, &instruction, total);
            invoker.start();

            let mut revised = String::with_capacity(marked.len());
            for chunk in chunk_text(&marked, max) {
                revised.push_str(&invoker.run_chunk(chunk).await?);
            }
            invoker.finish(ContentStream::parse_marked(&revised))
        }
    };

    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Transformed {} chunk(s) via {} in {}ms ({} retries)",
        stats.chunks_sent,
        transformer.name(),
        stats.duration_ms,
        stats.retries
    );
    Ok((stream, stats))
}

fn count_sendable(text: &str, max: usize) -> usize {
    chunk_text(text, max).into_iter().filter(|c| !is_blank(c)).count()
}

struct Invoker<'a> {
    transformer: &'a dyn Transformer,
    config: &'a ConversionConfig,
    instruction: &'a str,
    total: usize,
    current: usize,
    stats: TransformStats,
}

impl<'a> Invoker<'a> {
    fn new(
        transformer: &'a dyn Transformer,
        config: &'a ConversionConfig,
        instruction: &'a str,
        total: usize,
    ) -> Self {
        Self {
            transformer,
            config,
            instruction,
            total,
            current: 0,
            stats: TransformStats::default(),
        }
    }

    fn start(&self) {
        debug!("{} chunk(s) to transform", self.total);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_start(self.total);
        }
    }

    fn finish(self, stream: ContentStream) -> (ContentStream, TransformStats) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_complete(self.total);
        }
        (stream, self.stats)
    }

    /// Transform one chunk, keeping its outer whitespace.
    async fn run_chunk(&mut self, chunk: &str) -> Result<String, Pdf2DocxError> {
        if is_blank(chunk) {
            self.stats.chunks_skipped += 1;
            return Ok(chunk.to_string());
        }

        self.current += 1;
        let n = self.current;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_chunk_start(n, self.total);
        }

        let source = chunk.trim();
        match self.call_with_retry(source).await {
            Ok(answer) => {
                self.stats.chunks_sent += 1;
                let cleaned = if self.transformer.raw_output() {
                    answer
                } else {
                    clean_output(&answer, source)
                };
                let body = cleaned.trim();
                let lead = &chunk[..chunk.len() - chunk.trim_start().len()];
                let trail = &chunk[chunk.trim_end().len()..];
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_chunk_complete(n, self.total, body.chars().count());
                }
                Ok(format!("{lead}{body}{trail}"))
            }
            Err((attempts, e)) => {
                warn!("Chunk {}/{} failed: {}", n, self.total, e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_chunk_error(n, self.total, &e.to_string());
                }
                Err(Pdf2DocxError::TransformFailed {
                    chunk: n,
                    attempts,
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Returns the answer, or the attempt count and the last error.
    async fn call_with_retry(&mut self, text: &str) -> Result<String, (u32, TransformError)> {
        let max_retries = self.config.max_retries;
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                let backoff = self
                    .config
                    .retry_backoff_ms
                    .saturating_mul(2u64.saturating_pow(attempt - 1));
                warn!(
                    "Chunk {}: retry {}/{} after {}ms",
                    self.current, attempt, max_retries, backoff
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                self.stats.retries += 1;
            }

            match self.transformer.transform(self.instruction, text).await {
                Ok(answer) => return Ok(answer),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    warn!("Chunk {}: attempt {} failed: {}", self.current, attempt + 1, e);
                    attempt += 1;
                }
                Err(e) => return Err((attempt + 1, e)),
            }
        }
    }
}
