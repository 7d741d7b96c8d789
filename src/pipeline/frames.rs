//! Decoding of generate-endpoint responses.
//!
//! A streaming response is newline-delimited JSON: one frame per line, each
//! carrying a `response` delta, the last one with `done: true`.
//!
//! ```text
//! {"model":"llama3.1","response":"The ","done":false}
//! {"model":"llama3.1","response":"cat.","done":false}
//! {"model":"llama3.1","response":"","done":true,"total_duration":81234}
//! ```
//!
//! [`FrameDecoder`] is fed raw body bytes as they arrive. Bytes are buffered
//! until a full line is available, so frames and multi-byte characters split
//! across network reads decode correctly.

use crate::error::TransformError;
use serde::Deserialize;
use tracing::{debug, warn};

/// One NDJSON frame. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct GenerateFrame {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Incremental NDJSON decoder with an explicit terminal condition.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    text: String,
    frames: usize,
    malformed: usize,
    done: bool,
    error: Option<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next slice of the response body.
    ///
    /// Everything after the terminal frame is ignored.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.done {
            return;
        }
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.decode_line(&line[..pos]);
            if self.done {
                self.pending.clear();
                return;
            }
        }
    }

    /// Whether the terminal frame (or an error frame) has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Well-formed frames decoded so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Lines skipped because they were not valid frames.
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// End of body: return the concatenated text.
    ///
    /// A final line without a trailing newline is still decoded. A body that
    /// never produced a `done: true` frame is [`TransformError::Incomplete`].
    pub fn finish(mut self) -> Result<String, TransformError> {
        if !self.done && !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.decode_line(&line);
        }
        if self.malformed > 0 {
            warn!("Skipped {} malformed frame(s)", self.malformed);
        }
        if let Some(e) = self.error {
            return Err(TransformError::Service(e));
        }
        if !self.done {
            return Err(TransformError::Incomplete {
                frames: self.frames,
            });
        }
        Ok(self.text)
    }

    fn decode_line(&mut self, line: &[u8]) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }
        match serde_json::from_slice::<GenerateFrame>(line) {
            Ok(frame) => {
                self.frames += 1;
                if let Some(e) = frame.error {
                    self.error = Some(e);
                    self.done = true;
                    return;
                }
                if let Some(delta) = frame.response {
                    self.text.push_str(&delta);
                }
                if frame.done {
                    debug!("Terminal frame after {} frame(s)", self.frames);
                    self.done = true;
                }
            }
            Err(e) => {
                self.malformed += 1;
                debug!("Malformed frame skipped: {}", e);
            }
        }
    }
}

/// Non-streaming body: a single `{"response": "..."}` object.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode a complete non-streaming response body.
pub fn decode_single(body: &[u8]) -> Result<String, TransformError> {
    let parsed: GenerateResponse = serde_json::from_slice(body)
        .map_err(|e| TransformError::InvalidResponse(format!("not a JSON object: {e}")))?;
    if let Some(e) = parsed.error {
        return Err(TransformError::Service(e));
    }
    parsed
        .response
        .ok_or_else(|| TransformError::InvalidResponse("missing 'response' field".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(parts: &[&str]) -> (Result<String, TransformError>, usize) {
        let mut d = FrameDecoder::new();
        for p in parts {
            d.feed(p.as_bytes());
        }
        let malformed = d.malformed();
        (d.finish(), malformed)
    }

    #[test]
    fn concatenates_deltas() {
        let (out, _) = decode(&[
            "{\"response\":\"The \",\"done\":false}\n",
            "{\"response\":\"cat.\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
        ]);
        assert_eq!(out.unwrap(), "The cat.");
    }

    #[test]
    fn frame_split_across_reads() {
        let (out, _) = decode(&[
            "{\"respo",
            "nse\":\"Gr\u{00FC}",
            "\u{00DF}e\",\"done\":false}\n{\"done\":true}",
        ]);
        assert_eq!(out.unwrap(), "Grüße");
    }

    #[test]
    fn multibyte_char_split_across_reads() {
        let bytes = "{\"response\":\"é\",\"done\":true}\n".as_bytes();
        // Split inside the two-byte 'é'.
        let cut = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut d = FrameDecoder::new();
        d.feed(&bytes[..cut]);
        d.feed(&bytes[cut..]);
        assert_eq!(d.finish().unwrap(), "é");
    }

    #[test]
    fn malformed_frames_are_skipped() {
        let (out, malformed) = decode(&[
            "{\"response\":\"a\",\"done\":false}\n",
            "not json at all\n",
            "{\"response\":\"b\"\n",
            "{\"response\":\"c\",\"done\":true}\n",
        ]);
        assert_eq!(out.unwrap(), "ac");
        assert_eq!(malformed, 2);
    }

    #[test]
    fn data_after_done_is_ignored() {
        let (out, _) = decode(&[
            "{\"response\":\"kept\",\"done\":true}\n{\"response\":\" dropped\",\"done\":false}\n",
            "{\"response\":\" also dropped\"}\n",
        ]);
        assert_eq!(out.unwrap(), "kept");
    }

    #[test]
    fn missing_terminal_frame_is_incomplete() {
        let (out, _) = decode(&[
            "{\"response\":\"a\",\"done\":false}\n",
            "{\"response\":\"b\",\"done\":false}\n",
        ]);
        assert_eq!(out, Err(TransformError::Incomplete { frames: 2 }));
    }

    #[test]
    fn empty_body_is_incomplete() {
        assert_eq!(decode(&[]).0, Err(TransformError::Incomplete { frames: 0 }));
    }

    #[test]
    fn error_frame_is_service_error() {
        let (out, _) = decode(&["{\"error\":\"model 'x' not found\"}\n"]);
        assert_eq!(
            out,
            Err(TransformError::Service("model 'x' not found".into()))
        );
    }

    #[test]
    fn blank_lines_are_not_malformed() {
        let (out, malformed) = decode(&["\n\r\n{\"response\":\"x\",\"done\":true}\r\n"]);
        assert_eq!(out.unwrap(), "x");
        assert_eq!(malformed, 0);
    }

    #[test]
    fn single_object_body() {
        assert_eq!(
            decode_single(br#"{"model":"m","response":"Hello.","done":true}"#).unwrap(),
            "Hello."
        );
        assert!(matches!(
            decode_single(br#"{"model":"m"}"#),
            Err(TransformError::InvalidResponse(_))
        ));
        assert!(matches!(
            decode_single(b"<html>"),
            Err(TransformError::InvalidResponse(_))
        ));
    }
}
