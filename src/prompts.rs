//! Instructions sent to the transform backend.
//!
//! Every prompt lives here so the invoker in [`crate::pipeline::transform`]
//! only deals with retries and decoding. Callers can replace the correction
//! instruction via [`crate::config::ConversionConfig::system_prompt`].

use crate::config::{PlaceholderPolicy, TransformMode};

/// Grammar and typo correction, nothing else.
pub const CORRECT_PROMPT: &str = r#"You are a careful copy editor. Correct the grammar, spelling and typos in the text below.

Rules:
- Keep the meaning, tone and terminology unchanged
- Keep exactly one output line per input line; do not merge or split paragraphs
- Do not add titles, notes, explanations or quotation marks
- Output ONLY the corrected text"#;

/// Appended when the chunk must also be translated.
///
/// `{language}` is replaced with the target language.
pub const TRANSLATE_SUFFIX: &str = r#"
- After correcting, translate the text into {language}
- Output ONLY the translated text"#;

/// Appended under [`PlaceholderPolicy::Inline`].
pub const PLACEHOLDER_SUFFIX: &str = r#"
- Lines of the form [TABLE_n] or [FIGURE_n] are placeholders: copy them verbatim, each on its own line, in the same position"#;

/// Build the instruction for one chunk.
pub fn instruction(
    mode: &TransformMode,
    policy: PlaceholderPolicy,
    custom: Option<&str>,
) -> String {
    let mut prompt = custom.unwrap_or(CORRECT_PROMPT).to_string();
    if let TransformMode::CorrectAndTranslate { language } = mode {
        prompt.push_str(&TRANSLATE_SUFFIX.replace("{language}", language.trim()));
    }
    if policy == PlaceholderPolicy::Inline {
        prompt.push_str(PLACEHOLDER_SUFFIX);
    }
    prompt
}

/// Join instruction and text into the single `prompt` string sent to a
/// generate endpoint.
pub fn completion_prompt(instruction: &str, text: &str) -> String {
    format!("{instruction}\n\nText:\n\n{text}")
}
