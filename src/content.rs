//! The typed content stream that flows from extraction to reassembly.
//!
//! Tables and figures never live inside the text as bare marker strings.
//! Extraction emits [`Segment::Table`] / [`Segment::Figure`] references next
//! to [`Segment::Text`] runs, and the stream keeps that shape through the
//! transform step so a model can never swallow a placeholder.
//!
//! The `[TABLE_n]` / `[FIGURE_n]` spelling still exists: it is how a reference
//! is shown to humans (captions, JSON output) and how the stream is flattened
//! when [`crate::config::PlaceholderPolicy::Inline`] asks the model to see the
//! whole document. [`ContentStream::parse_marked`] turns such text back into
//! segments.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 1-based reference to a table in the run's table collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef(pub usize);

/// A 1-based reference to a figure in the run's [`crate::pipeline::figures::FigureStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FigureRef(pub usize);

/// A placeholder token: `[TABLE_n]` or `[FIGURE_n]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placeholder {
    Table(TableRef),
    Figure(FigureRef),
}

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(TABLE|FIGURE)_(\d+)\]$").unwrap());

impl Placeholder {
    /// Parse a line that consists of exactly one placeholder token.
    ///
    /// Surrounding whitespace is tolerated; anything else on the line is not,
    /// so running text that merely mentions `[TABLE_1]` stays text.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = RE_PLACEHOLDER.captures(line.trim())?;
        let n: usize = caps[2].parse().ok()?;
        match &caps[1] {
            "TABLE" => Some(Placeholder::Table(TableRef(n))),
            _ => Some(Placeholder::Figure(FigureRef(n))),
        }
    }

    /// The 1-based index carried by the token.
    pub fn index(&self) -> usize {
        match self {
            Placeholder::Table(TableRef(n)) | Placeholder::Figure(FigureRef(n)) => *n,
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Table(TableRef(n)) => write!(f, "[TABLE_{n}]"),
            Placeholder::Figure(FigureRef(n)) => write!(f, "[FIGURE_{n}]"),
        }
    }
}

/// One element of the content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// Running text. Paragraphs are separated by `\n`.
    Text(String),
    /// The position of a table.
    Table(TableRef),
    /// The position of a figure.
    Figure(FigureRef),
}

impl Segment {
    pub fn placeholder(&self) -> Option<Placeholder> {
        match self {
            Segment::Text(_) => None,
            Segment::Table(r) => Some(Placeholder::Table(*r)),
            Segment::Figure(r) => Some(Placeholder::Figure(*r)),
        }
    }
}

/// An ordered, reading-order sequence of [`Segment`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStream {
    segments: Vec<Segment>,
}

impl ContentStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment, merging adjacent text runs.
    pub fn push(&mut self, segment: Segment) {
        if let Segment::Text(ref text) = segment {
            if text.is_empty() {
                return;
            }
            if let Some(Segment::Text(prev)) = self.segments.last_mut() {
                prev.push_str(text);
                return;
            }
        }
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All placeholders in stream order.
    pub fn placeholders(&self) -> Vec<Placeholder> {
        self.segments.iter().filter_map(Segment::placeholder).collect()
    }

    /// Total characters of text (placeholders excluded).
    pub fn text_chars(&self) -> usize {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => t.chars().count(),
                _ => 0,
            })
            .sum()
    }

    /// Flatten into a single string with each placeholder on its own line.
    pub fn to_marked_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                other => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    if let Some(p) = other.placeholder() {
                        out.push_str(&p.to_string());
                    }
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Rebuild a stream from marked text.
    ///
    /// Every line that is exactly one placeholder token becomes a reference
    /// segment; every other line stays text. Whether the reference resolves
    /// is the reassembler's concern, not this parser's.
    pub fn parse_marked(text: &str) -> Self {
        let mut stream = ContentStream::new();
        for line in text.split_inclusive('\n') {
            match Placeholder::parse(line) {
                Some(Placeholder::Table(r)) => stream.push(Segment::Table(r)),
                Some(Placeholder::Figure(r)) => stream.push(Segment::Figure(r)),
                None => stream.push(Segment::Text(line.to_string())),
            }
        }
        stream
    }
}

impl FromIterator<Segment> for ContentStream {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        let mut stream = ContentStream::new();
        for segment in iter {
            stream.push(segment);
        }
        stream
    }
}

/// An immutable grid of cell strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, padding short rows so the grid is rectangular.
    pub fn new(mut rows: Vec<Vec<String>>) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(cols, String::new());
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// The top-left cell, used to anchor the table in reading order.
    pub fn first_cell(&self) -> Option<&str> {
        self.rows.first().and_then(|r| r.first()).map(String::as_str)
    }

    /// Render as a GFM pipe table (used for JSON output).
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            md.push('|');
            for cell in row {
                md.push(' ');
                md.push_str(&cell.replace('|', "\\|"));
                md.push_str(" |");
            }
            md.push('\n');
            if i == 0 {
                md.push('|');
                for _ in row {
                    md.push_str(" --- |");
                }
                md.push('\n');
            }
        }
        md
    }
}

/// Accumulates segments and tables while pages are walked in order.
///
/// Numbers tables as they are discovered. Tables that cannot be anchored in
/// reading order are held back and emitted at the very end of the stream.
#[derive(Debug, Default)]
pub struct ContentBuilder {
    stream: ContentStream,
    tables: Vec<Table>,
    trailing: Vec<TableRef>,
}

impl ContentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, text: &str) {
        self.stream.push(Segment::Text(text.to_string()));
    }

    /// Make sure the stream currently ends on a line boundary.
    pub fn end_line(&mut self) {
        if let Some(Segment::Text(t)) = self.stream.segments.last() {
            if !t.ends_with('\n') {
                self.push_text("\n");
            }
        }
    }

    /// Register a table. When `anchored` is false its placeholder is deferred
    /// to the end of the document.
    pub fn push_table(&mut self, table: Table, anchored: bool) -> TableRef {
        self.tables.push(table);
        let r = TableRef(self.tables.len());
        if anchored {
            self.end_line();
            self.stream.push(Segment::Table(r));
        } else {
            self.trailing.push(r);
        }
        r
    }

    pub fn push_figure(&mut self, figure: FigureRef) {
        self.end_line();
        self.stream.push(Segment::Figure(figure));
    }

    pub fn finish(mut self) -> (ContentStream, Vec<Table>) {
        if !self.trailing.is_empty() {
            self.end_line();
            for r in std::mem::take(&mut self.trailing) {
                self.stream.push(Segment::Table(r));
            }
        }
        (self.stream, self.tables)
    }
}
