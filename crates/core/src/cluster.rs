//! Token-to-word clustering.
//!
//! Sub-word tokens from the layout model are sorted into pseudo-rows and
//! merged left to right while they stay on the same row and close together
//! horizontally. Each finished word gets a draft label from a
//! [`DraftLabeler`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::geometry::{BBox, HasBBox};
use crate::labeler::{DraftLabel, DraftLabeler, HeuristicLabeler};
use crate::token::{Token, strip_markers};

pub(crate) const DEFAULT_Y_TOLERANCE: f64 = 5.0;
pub(crate) const DEFAULT_X_TOLERANCE_RATIO: f64 = 0.5;
pub(crate) const DEFAULT_MIN_X_TOLERANCE: f64 = 5.0;
pub(crate) const DEFAULT_ROW_BUCKET: f64 = 10.0;

/// Parameters for token clustering, in normalized 0-1000 units.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterParams {
    /// Two tokens are row-mates if their `y0` values differ by less than this.
    pub y_tolerance: f64,

    /// Horizontal gap allowed inside a word, relative to the height of the
    /// previous token.
    pub x_tolerance_ratio: f64,

    /// Lower bound on the horizontal gap tolerance.
    pub min_x_tolerance: f64,

    /// Height of the pseudo-rows used for the reading-order sort. Tokens whose
    /// `y0 / row_bucket` rounds to the same integer share a row, so a token
    /// just across a bucket boundary can land in the neighbouring row.
    pub row_bucket: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            y_tolerance: DEFAULT_Y_TOLERANCE,
            x_tolerance_ratio: DEFAULT_X_TOLERANCE_RATIO,
            min_x_tolerance: DEFAULT_MIN_X_TOLERANCE,
            row_bucket: DEFAULT_ROW_BUCKET,
        }
    }
}

impl ClusterParams {
    /// Gap tolerance after `last`: scales with text height so larger fonts
    /// allow wider inter-glyph gaps.
    pub fn x_tolerance(&self, last: &Token) -> f64 {
        (last.height() * self.x_tolerance_ratio).max(self.min_x_tolerance)
    }

    fn row_of(&self, token: &Token) -> f64 {
        (token.y0() / self.row_bucket).round_ties_even()
    }
}

/// A reconstructed word, ready for the annotation tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    #[serde(rename = "word")]
    pub text: String,
    #[serde(rename = "box")]
    pub bbox: BBox,
    pub label: DraftLabel,
}

impl HasBBox for Word {
    fn bbox(&self) -> &BBox {
        &self.bbox
    }
}

/// Sort tokens into reading order: pseudo-row first, then `x0`.
///
/// The sort is stable, so tokens with equal keys keep their stream order.
pub fn reading_order<'a>(tokens: &'a [Token], params: &ClusterParams) -> Vec<&'a Token> {
    let mut ordered: Vec<&Token> = tokens.iter().collect();
    ordered.sort_by(|a, b| {
        params
            .row_of(a)
            .total_cmp(&params.row_of(b))
            .then_with(|| a.x0().partial_cmp(&b.x0()).unwrap_or(Ordering::Equal))
    });
    ordered
}

/// Check if `curr` begins a new word after `prev`.
fn token_begins_new_word(prev: &Token, curr: &Token, params: &ClusterParams) -> bool {
    if curr.starts_word() {
        return true;
    }
    let same_row = (curr.y0() - prev.y0()).abs() < params.y_tolerance;
    let adjacent = curr.x0() - prev.x1() < params.x_tolerance(prev);
    !(same_row && adjacent)
}

/// Group reading-ordered tokens into runs that form one word each.
pub(crate) fn group_tokens<'a>(
    ordered: &[&'a Token],
    params: &ClusterParams,
) -> Vec<Vec<&'a Token>> {
    let mut groups: Vec<Vec<&Token>> = Vec::new();
    let mut current: Vec<&Token> = Vec::new();

    for &token in ordered {
        if let Some(prev) = current.last()
            && token_begins_new_word(prev, token, params)
        {
            groups.push(std::mem::take(&mut current));
        }
        current.push(token);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Merge a run of tokens into a word. Returns `None` if nothing but markers
/// and whitespace remains.
fn merge_tokens(run: &[&Token], labeler: &dyn DraftLabeler) -> Option<Word> {
    let joined: String = run.iter().map(|t| t.text.as_str()).collect();
    let text = strip_markers(&joined).trim().to_string();
    if text.is_empty() {
        return None;
    }
    let bbox = BBox::envelope(run.iter().map(|t| &t.bbox))?;
    let label = labeler.label(&text);
    Some(Word { text, bbox, label })
}

/// Cluster tokens into words using the default heuristic labeler.
///
/// # Example
/// ```
/// use layoutrecon_core::cluster::{ClusterParams, cluster};
/// use layoutrecon_core::labeler::DraftLabel;
/// use layoutrecon_core::token::Token;
///
/// let tokens = vec![
///     Token::new("\u{2581}Nama", [100.0, 200.0, 160.0, 220.0]),
///     Token::new(":", [162.0, 200.0, 170.0, 220.0]),
///     Token::new("\u{2581}Budi", [300.0, 200.0, 360.0, 220.0]),
/// ];
/// let words = cluster(&tokens, &ClusterParams::default());
/// assert_eq!(words.len(), 2);
/// assert_eq!(words[0].text, "Nama:");
/// assert_eq!(words[0].label, DraftLabel::Key);
/// ```
pub fn cluster(tokens: &[Token], params: &ClusterParams) -> Vec<Word> {
    cluster_with(tokens, params, &HeuristicLabeler)
}

/// Cluster tokens into words, labelling each word with `labeler`.
pub fn cluster_with(
    tokens: &[Token],
    params: &ClusterParams,
    labeler: &dyn DraftLabeler,
) -> Vec<Word> {
    if tokens.is_empty() {
        warn!("cluster called with an empty token list");
        return Vec::new();
    }

    let ordered = reading_order(tokens, params);
    let words: Vec<Word> = group_tokens(&ordered, params)
        .iter()
        .filter_map(|run| merge_tokens(run, labeler))
        .collect();

    debug!(tokens = tokens.len(), words = words.len(), "clustered tokens");
    words
}
