//! Split text into bounded chunks on natural boundaries.
//!
//! ## Policy
//!
//! From the current offset the splitter takes a window of at most
//! `max_chars` characters. If the rest of the text fits, it is the last
//! chunk. Otherwise the window is searched backwards for the last line break
//! or sentence-ending period (a `.` followed by whitespace) and the chunk ends
//! just after it. A window without either is cut at the hard limit.
//!
//! Chunks are borrowed slices of the input, so concatenating them gives the
//! input back byte for byte, and no chunk is ever longer than `max_chars`.

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// `max_chars` is counted in Unicode scalar values. A budget of zero is
/// treated as one.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let hard_end = match rest.char_indices().nth(max_chars) {
            Some((byte, _)) => byte,
            None => {
                chunks.push(rest);
                break;
            }
        };

        let cut = natural_cut(rest, hard_end).unwrap_or(hard_end);
        let (chunk, tail) = rest.split_at(cut);
        chunks.push(chunk);
        rest = tail;
    }

    chunks
}

/// Byte offset just past the last boundary inside `text[..window_end]`.
fn natural_cut(text: &str, window_end: usize) -> Option<usize> {
    let window = &text[..window_end];
    window
        .char_indices()
        .rev()
        .find(|&(i, c)| match c {
            '\n' => true,
            '.' => text[i + 1..]
                .chars()
                .next()
                .is_some_and(char::is_whitespace),
            _ => false,
        })
        // Both boundary characters are one byte wide.
        .map(|(i, _)| i + 1)
}

/// Whether a chunk carries nothing worth sending to a model.
pub fn is_blank(chunk: &str) -> bool {
    chunk.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_roundtrip(text: &str, max: usize) {
        let chunks = chunk_text(text, max);
        assert_eq!(chunks.concat(), text, "budget {max}");
        for c in &chunks {
            assert!(c.chars().count() <= max.max(1), "chunk {c:?} over {max}");
            assert!(!c.is_empty());
        }
    }

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(chunk_text("Hello world.", 100), vec!["Hello world."]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("", 10).is_empty());
    }

    #[test]
    fn splits_after_sentence_end() {
        let text = "First sentence. Second sentence here.";
        let chunks = chunk_text(text, 20);
        assert_eq!(chunks[0], "First sentence.");
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn prefers_latest_boundary_in_window() {
        let text = "Line one\nLine two. More words follow";
        let chunks = chunk_text(text, 22);
        assert_eq!(chunks[0], "Line one\nLine two.");
    }

    #[test]
    fn decimal_point_is_not_a_boundary() {
        let text = "Pi is 3.14159 roughly and more";
        let chunks = chunk_text(text, 12);
        assert_eq!(chunks[0], "Pi is 3.1415");
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn hard_cut_without_boundary() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunk_text(text, 10);
        assert_eq!(chunks, vec!["abcdefghij", "klmnopqrst", "uvwxyz"]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "ééééé. ääääää";
        let chunks = chunk_text(text, 7);
        assert_eq!(chunks[0], "ééééé.");
        assert_roundtrip(text, 7);
    }

    #[test]
    fn roundtrip_over_many_budgets() {
        let text = "Der Bericht beschreibt die Anlage.\nTabelle 1 zeigt Werte: 1.5, 2.25 und 3.\n\n\
                    Naechster Absatz ohne Punkt am Ende\nEnde. Wirklich";
        for max in 1..=text.chars().count() + 3 {
            assert_roundtrip(text, max);
        }
    }

    #[test]
    fn zero_budget_behaves_like_one() {
        assert_eq!(chunk_text("ab", 0), vec!["a", "b"]);
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(" \n\t"));
        assert!(!is_blank(" x "));
    }
}
