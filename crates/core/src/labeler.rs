//! Draft labels for pre-annotation.
//!
//! The labels produced here seed the annotation tool and are expected to be
//! corrected by a human reviewer. They are not ground truth.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Coarse provisional label of a clustered word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DraftLabel {
    Key,
    Value,
    Other,
}

impl DraftLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftLabel::Key => "KEY",
            DraftLabel::Value => "VALUE",
            DraftLabel::Other => "OTHER",
        }
    }
}

impl fmt::Display for DraftLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy assigning a draft label to a finished word.
pub trait DraftLabeler: Send + Sync {
    fn label(&self, text: &str) -> DraftLabel;
}

impl<F> DraftLabeler for F
where
    F: Fn(&str) -> DraftLabel + Send + Sync,
{
    fn label(&self, text: &str) -> DraftLabel {
        self(text)
    }
}

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d,.-]+$").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\d{1,2}\s+\w+\s+\d{4}").unwrap());

/// Colon means key; numbers and `12 Januari 2024`-style dates mean value.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicLabeler;

impl DraftLabeler for HeuristicLabeler {
    fn label(&self, text: &str) -> DraftLabel {
        if text.contains(':') {
            DraftLabel::Key
        } else if NUMERIC_RE.is_match(text) || DATE_RE.is_match(text) {
            DraftLabel::Value
        } else {
            DraftLabel::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_labels() {
        let l = HeuristicLabeler;
        assert_eq!(l.label("Nama:"), DraftLabel::Key);
        assert_eq!(l.label("1.250.000,-"), DraftLabel::Value);
        assert_eq!(l.label("2024-01-31"), DraftLabel::Value);
        assert_eq!(l.label("12 Januari 2024"), DraftLabel::Value);
        assert_eq!(l.label("Budi"), DraftLabel::Other);
        assert_eq!(l.label("Rp1.000"), DraftLabel::Other);
    }

    #[test]
    fn test_colon_wins_over_numeric() {
        assert_eq!(HeuristicLabeler.label("12:30"), DraftLabel::Key);
    }

    #[test]
    fn test_closure_labeler() {
        let upper = |text: &str| {
            if text.chars().all(|c| c.is_uppercase()) {
                DraftLabel::Key
            } else {
                DraftLabel::Other
            }
        };
        assert_eq!(upper.label("NIK"), DraftLabel::Key);
        assert_eq!(upper.label("nik"), DraftLabel::Other);
    }

    #[test]
    fn test_label_serde() {
        assert_eq!(serde_json::to_string(&DraftLabel::Value).unwrap(), "\"VALUE\"");
        let l: DraftLabel = serde_json::from_str("\"KEY\"").unwrap();
        assert_eq!(l, DraftLabel::Key);
    }
}
