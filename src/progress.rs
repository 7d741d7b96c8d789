//! Progress-callback trait for per-chunk transform events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while chunks are sent to the transform backend. The CLI uses it to
//! drive its progress bar; library users can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2docx::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, output_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Chunk {}/{} done ({} chars)", chunk, total_chunks, output_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it transforms each chunk.
///
/// Chunks are processed one at a time, so calls never overlap within a run.
/// The trait is still `Send + Sync` because the config that carries it is
/// shared with blocking tasks. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once extraction is done and the chunk count is known.
    ///
    /// # Arguments
    /// * `total_chunks`: chunks that will be sent to the backend
    fn on_conversion_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called just before a chunk is sent.
    ///
    /// # Arguments
    /// * `chunk`       : 1-indexed chunk number
    /// * `total_chunks`: total chunks in the run
    fn on_chunk_start(&self, chunk: usize, total_chunks: usize) {
        let _ = (chunk, total_chunks);
    }

    /// Called when a chunk comes back from the backend.
    ///
    /// # Arguments
    /// * `output_len`: character count of the processed text
    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, output_len: usize) {
        let _ = (chunk, total_chunks, output_len);
    }

    /// Called when a chunk fails after all retries. No further chunk follows.
    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, error: &str) {
        let _ = (chunk, total_chunks, error);
    }

    /// Called once after every chunk was transformed.
    fn on_conversion_complete(&self, total_chunks: usize) {
        let _ = total_chunks;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
