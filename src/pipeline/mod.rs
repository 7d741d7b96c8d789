//! Pipeline stages for PDF revision and reassembly.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ transform ──▶ assemble ──▶ docx / json
//! (path)    (pdfium,    (bounded   (model,        (blocks,     (template,
//!            layout)     slices)    frames)        report)      export)
//! ```
//!
//! 1. [`input`]: validate the PDF or `.docx` path, list batch inputs and
//!    templates
//! 2. [`extract`]: walk pages in `spawn_blocking`; [`layout`] groups the
//!    positioned text into paragraphs and tables, [`figures`] stores images.
//!    [`word`] builds the same content stream from a `.docx`
//! 3. [`chunk`]: split text into model-sized slices on sentence or line
//!    boundaries
//! 4. [`transform`]: send chunks one at a time with retry/backoff; the only
//!    stage with network I/O. [`frames`] decodes streamed answers and
//!    [`postprocess`] strips model chatter
//! 5. [`assemble`]: resolve table and figure references into blocks and
//!    render them into the [`template`]; [`export`] writes the JSON variant

pub mod assemble;
pub mod chunk;
pub mod export;
pub mod extract;
pub mod figures;
pub mod frames;
pub mod input;
pub mod layout;
pub mod postprocess;
pub mod template;
pub mod transform;
pub mod word;
