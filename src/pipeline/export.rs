//! JSON output: `{ "<category>": ["block", ...] }`.
//!
//! Each block becomes one string. Tables are written as pipe tables and
//! figures as their `Figure n` label; caption blocks are dropped because the
//! label already carries the number.

use crate::error::Pdf2DocxError;
use crate::pipeline::assemble::Block;
use serde_json::{Map, Value};

/// Text of each block, in order.
pub fn block_texts(blocks: &[Block]) -> Vec<String> {
    blocks
        .iter()
        .filter_map(|b| match b {
            Block::Paragraph { text } | Block::Literal { text } => Some(text.clone()),
            Block::Table { table, .. } => Some(table.to_markdown().trim_end().to_string()),
            Block::Figure { index, .. } => Some(format!("Figure {index}")),
            Block::Caption { .. } => None,
        })
        .collect()
}

/// Pretty-printed JSON document for `blocks` under `category`.
pub fn to_json(blocks: &[Block], category: &str) -> Result<String, Pdf2DocxError> {
    let mut root = Map::new();
    root.insert(
        category.to_string(),
        Value::Array(block_texts(blocks).into_iter().map(Value::String).collect()),
    );
    serde_json::to_string_pretty(&Value::Object(root))
        .map_err(|e| Pdf2DocxError::Internal(format!("JSON serialisation: {e}")))
}
