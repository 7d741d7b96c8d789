//! Post-processing: deterministic cleanup of model output.
//!
//! Even with a strict prompt, completion models tend to wrap their answer in
//! code fences, open with "Here is the corrected text:", or leak Windows line
//! endings and stray zero-width spaces. These rules strip such artefacts
//! without touching the content itself. Each rule is a pure `&str → String`
//! pass and is tested on its own.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule only sees `\n`.
//! The preamble rule runs on both sides of fence stripping: models put it
//! inside the fence as often as in front of it. A preamble is only stripped
//! when the source text did not open with one itself.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one model response for the chunk `source`.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip a leading "Here is the corrected text:" style preamble
/// 3. Strip outer code fences (and a preamble inside them)
/// 4. Trim trailing whitespace per line
/// 5. Remove invisible Unicode (zero-width spaces, BOM, soft hyphens, word joiners)
///
/// ZWNJ and ZWJ are kept: Persian, Indic scripts and emoji sequences need them.
pub fn clean_output(input: &str, source: &str) -> String {
    let keep_preamble = has_preamble(source);
    let s = normalise_line_endings(input);
    let s = if keep_preamble { s } else { strip_preamble(&s) };
    let s = strip_code_fences(&s);
    let s = if keep_preamble { s } else { strip_preamble(&s) };
    let s = trim_trailing_whitespace(&s);
    remove_invisible_chars(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip a chatty preamble ─────────────────────────────────────────

static RE_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:sure[,!.]?\s*)?(?:here\s+is|here's|below\s+is)\s+(?:the\s+|your\s+)?(?:corrected|revised|translated|edited)[^\n]*:[ \t]*\n+",
    )
    .unwrap()
});

fn has_preamble(input: &str) -> bool {
    RE_PREAMBLE.is_match(&normalise_line_endings(input))
}

fn strip_preamble(input: &str) -> String {
    RE_PREAMBLE.replace(input, "").to_string()
}

// ── Rule 3: Strip outer code fences ─────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```$").unwrap());

fn strip_code_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{2060}'], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```text\nHello.\nWorld.\n```"), "Hello.\nWorld.");
        assert_eq!(strip_code_fences("```\nHello.\n```\n"), "Hello.");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_code_fences("Use ``` rarely."), "Use ``` rarely.");
    }

    #[test]
    fn test_strip_preamble() {
        assert_eq!(
            strip_preamble("Here is the corrected text:\n\nThe cat sat."),
            "The cat sat."
        );
        assert_eq!(
            strip_preamble("Sure! Here's the translated version:\nDie Katze."),
            "Die Katze."
        );
    }

    #[test]
    fn test_preamble_only_at_start() {
        let input = "The report says:\nHere is the corrected text:\nkept";
        assert_eq!(strip_preamble(input), input);
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("  a   \nb\t"), "  a\nb");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c\u{00AD}d"), "abcd");
    }

    #[test]
    fn test_clean_output_full_pipeline() {
        let input = "```\r\nHere is the corrected text:\r\nThe value is 3.\u{200B}  \r\n```";
        assert_eq!(clean_output(input, "The valu is 3."), "The value is 3.");
    }

    #[test]
    fn test_preamble_before_fence() {
        let input = "Here is the corrected text:\n\n```\nTeh cat.\n```\n";
        assert_eq!(clean_output(input, "Teh cat."), "Teh cat.");
    }

    #[test]
    fn test_keeps_joiners() {
        let input = "می\u{200C}خواهم \u{1F468}\u{200D}\u{1F469}";
        assert_eq!(remove_invisible_chars(input), input);
    }

    #[test]
    fn test_preamble_kept_when_source_has_it() {
        let source = "Here is the revised budget:\nRevenue rose.";
        assert_eq!(clean_output(source, source), source);
        assert_eq!(
            clean_output("Here is the corrected text:\nRevenue rose.", "Revenue rose."),
            "Revenue rose."
        );
    }
}
