//! Tokens emitted by the external layout model.

use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, HasBBox};

/// Word-boundary markers used by sub-word tokenizers: SentencePiece `▁`
/// and byte-level BPE `Ġ`. A token starting with one of them begins a new
/// word.
pub const WORD_BOUNDARY_MARKERS: [char; 2] = ['\u{2581}', '\u{0120}'];

/// Sequence-control tokens that carry no page content.
pub const SPECIAL_TOKENS: [&str; 7] = ["[CLS]", "[SEP]", "[PAD]", "<s>", "</s>", "<pad>", "<unk>"];

/// A sub-word text fragment with its box in normalized 0-1000 space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "token", alias = "word", alias = "text")]
    pub text: String,
    #[serde(rename = "box", alias = "bbox")]
    pub bbox: BBox,
}

impl Token {
    pub fn new(text: impl Into<String>, bbox: impl Into<BBox>) -> Self {
        Self {
            text: text.into(),
            bbox: bbox.into(),
        }
    }

    /// True if the token opens a new word.
    pub fn starts_word(&self) -> bool {
        self.text.starts_with(WORD_BOUNDARY_MARKERS)
    }

    pub fn is_special(&self) -> bool {
        SPECIAL_TOKENS.contains(&self.text.as_str())
    }
}

impl HasBBox for Token {
    fn bbox(&self) -> &BBox {
        &self.bbox
    }
}

/// Drop sequence-control tokens (`[CLS]`, `</s>`, ...) from a model stream.
pub fn strip_special_tokens(tokens: Vec<Token>) -> Vec<Token> {
    tokens.into_iter().filter(|t| !t.is_special()).collect()
}

/// Remove every word-boundary marker from `text`.
pub fn strip_markers(text: &str) -> String {
    text.chars()
        .filter(|c| !WORD_BOUNDARY_MARKERS.contains(c))
        .collect()
}
