//! Word templates: load a `.docx` and fill its `{KEY}` fields.
//!
//! Word freely splits a paragraph's text across runs (spell-check marks,
//! formatting changes), so `{TITLE}` may be spread over several runs. A
//! paragraph that contains a field has its text joined, replaced, and
//! written back into its first text run; the other runs are emptied.

use crate::error::Pdf2DocxError;
use docx_rs::{DocumentChild, Docx, Paragraph, ParagraphChild, RunChild};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Load a template, or start a blank document when there is none.
pub fn load(path: Option<&Path>) -> Result<Docx, Pdf2DocxError> {
    let Some(path) = path else {
        return Ok(Docx::new());
    };
    let bytes = std::fs::read(path).map_err(|e| Pdf2DocxError::TemplateUnreadable {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let docx = docx_rs::read_docx(&bytes).map_err(|e| Pdf2DocxError::TemplateUnreadable {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    debug!("Loaded template {}", path.display());
    Ok(docx)
}

/// Replace `{KEY}` with its value in every body paragraph.
///
/// Keys may be given with or without braces. Returns the number of
/// replacements made.
pub fn fill_fields(docx: &mut Docx, fields: &BTreeMap<String, String>) -> usize {
    if fields.is_empty() {
        return 0;
    }
    let fields: Vec<(String, &str)> = fields
        .iter()
        .map(|(k, v)| {
            let key = k.trim_start_matches('{').trim_end_matches('}');
            (format!("{{{key}}}"), v.as_str())
        })
        .collect();

    let mut replaced = 0;
    for child in docx.document.children.iter_mut() {
        if let DocumentChild::Paragraph(p) = child {
            replaced += fill_paragraph(p, &fields);
        }
    }
    debug!("Filled {} template field(s)", replaced);
    replaced
}

fn fill_paragraph(p: &mut Paragraph, fields: &[(String, &str)]) -> usize {
    let mut full = String::new();
    for child in &p.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                if let RunChild::Text(t) = rc {
                    full.push_str(&t.text);
                }
            }
        }
    }
    if !full.contains('{') {
        return 0;
    }

    let mut count = 0;
    for (field, value) in fields {
        let hits = full.matches(field.as_str()).count();
        if hits > 0 {
            full = full.replace(field.as_str(), value);
            count += hits;
        }
    }
    if count == 0 {
        return 0;
    }

    let mut first = true;
    for child in p.children.iter_mut() {
        if let ParagraphChild::Run(run) = child {
            for rc in run.children.iter_mut() {
                if let RunChild::Text(t) = rc {
                    t.text = if first { std::mem::take(&mut full) } else { String::new() };
                    first = false;
                }
            }
        }
    }
    count
}
