//! Input resolution: PDF and Word paths, batch directories and templates.
//!
//! We validate the magic bytes (`%PDF`, or a zip header on a `.docx`) before
//! pdfium or docx-rs ever sees a file so callers get a meaningful error
//! rather than a parser crash, and the run aborts before any model request
//! is made.

use crate::error::Pdf2DocxError;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default file pattern for directory input.
pub const DEFAULT_PATTERN: &str = "*.pdf";

/// `.docx` files are zip archives.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Kind of document an input file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    /// A Word `.docx` file.
    Word,
}

/// Resolve a local file path, validating existence and PDF magic bytes.
pub fn resolve_local(path: &Path) -> Result<PathBuf, Pdf2DocxError> {
    match resolve_input(path)? {
        (path, InputKind::Pdf) => Ok(path),
        (path, InputKind::Word) => Err(Pdf2DocxError::NotAPdf {
            path,
            magic: *ZIP_MAGIC,
        }),
    }
}

/// Resolve a PDF (`%PDF` magic) or a Word document (zip magic and a
/// `.docx` extension).
pub fn resolve_input(path: &Path) -> Result<(PathBuf, InputKind), Pdf2DocxError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(Pdf2DocxError::FileNotFound { path });
    }

    let magic = match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            let n = f.read(&mut magic).unwrap_or(0);
            if n < 4 {
                return Err(Pdf2DocxError::NotAPdf { path, magic });
            }
            magic
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2DocxError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2DocxError::FileNotFound { path });
        }
    };

    let is_docx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));
    let kind = if &magic == b"%PDF" {
        InputKind::Pdf
    } else if &magic == ZIP_MAGIC && is_docx {
        InputKind::Word
    } else {
        return Err(Pdf2DocxError::NotAPdf { path, magic });
    };

    debug!("Resolved local {:?}: {}", kind, path.display());
    Ok((path, kind))
}

/// List the files in `dir` matching `pattern`, sorted by name.
pub fn list_pdfs(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, Pdf2DocxError> {
    if !dir.is_dir() {
        return Err(Pdf2DocxError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }

    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full = format!("{}/{}", escaped.trim_end_matches('/'), pattern);
    let entries = glob::glob(&full).map_err(|e| Pdf2DocxError::InvalidGlob {
        pattern: pattern.to_string(),
        detail: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(Pdf2DocxError::EmptyDirectory {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }
    debug!("{} file(s) match '{}' in {}", files.len(), pattern, dir.display());
    Ok(files)
}

/// List the `.docx` templates in `dir`, sorted by name.
pub fn list_templates(dir: &Path) -> Result<Vec<PathBuf>, Pdf2DocxError> {
    let entries = std::fs::read_dir(dir).map_err(|_| Pdf2DocxError::NoTemplates {
        dir: dir.to_path_buf(),
    })?;

    let mut templates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("docx"))
                // Word lock files (`~$report.docx`) are not templates.
                && !p
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with("~$"))
        })
        .collect();
    templates.sort();

    if templates.is_empty() {
        return Err(Pdf2DocxError::NoTemplates {
            dir: dir.to_path_buf(),
        });
    }
    Ok(templates)
}

/// Find a template by file name, with or without the `.docx` extension.
pub fn find_template(dir: &Path, name: &str) -> Result<PathBuf, Pdf2DocxError> {
    let wanted = name.trim_end_matches(".docx");
    list_templates(dir)?
        .into_iter()
        .find(|p| p.file_stem().is_some_and(|s| s.to_string_lossy() == wanted))
        .ok_or_else(|| Pdf2DocxError::TemplateNotFound {
            dir: dir.to_path_buf(),
            name: name.to_string(),
        })
}

/// Ask the user to pick one of `templates` from a numbered menu.
///
/// Re-prompts on anything that is not a listed number. End of input is an
/// error rather than a silent default.
pub fn prompt_template<R: BufRead, W: Write>(
    templates: &[PathBuf],
    mut input: R,
    mut output: W,
) -> Result<PathBuf, Pdf2DocxError> {
    let io_err = |e: std::io::Error| Pdf2DocxError::Internal(format!("template menu: {e}"));

    writeln!(output, "Available templates:").map_err(io_err)?;
    for (i, t) in templates.iter().enumerate() {
        let name = t.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        writeln!(output, "{}. {}", i + 1, name).map_err(io_err)?;
    }

    let mut line = String::new();
    loop {
        write!(output, "Select a template [1-{}]: ", templates.len()).map_err(io_err)?;
        output.flush().map_err(io_err)?;

        line.clear();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            return Err(Pdf2DocxError::InvalidConfig(
                "No template selected".into(),
            ));
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=templates.len()).contains(&n) => return Ok(templates[n - 1].clone()),
            _ => writeln!(output, "Invalid choice '{}'", line.trim()).map_err(io_err)?,
        }
    }
}
