//! Training-set preparation from reconciled record files.
//!
//! The label vocabulary is a pure reduction over record pages; nothing in
//! the pipeline keeps it as shared state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geometry::BBox;
use crate::reconcile::ReconciledRecord;
use crate::token::strip_markers;

/// Share of pages used for training by [`split_train_eval`].
pub const TRAIN_FRACTION: f64 = 0.8;

/// Sorted set of labels seen in a corpus, with stable integer ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelVocabulary {
    labels: Vec<String>,
    ids: BTreeMap<String, usize>,
}

impl LabelVocabulary {
    /// Collect every label of every page. Ids follow lexicographic order.
    pub fn from_pages<'a, I>(pages: I) -> Self
    where
        I: IntoIterator<Item = &'a [ReconciledRecord]>,
    {
        let unique: BTreeSet<&str> = pages
            .into_iter()
            .flat_map(|page| page.iter().map(|r| r.label.as_str()))
            .collect();
        let labels: Vec<String> = unique.into_iter().map(str::to_string).collect();
        let ids = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self { labels, ids }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn id(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }
}

/// One page in the shape a token-classification trainer consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPage {
    pub words: Vec<String>,
    pub boxes: Vec<BBox>,
    pub label_ids: Vec<usize>,
}

impl TrainingPage {
    /// Strip tokenizer markers, drop records left empty, map labels to ids.
    ///
    /// Returns `Ok(None)` when no word survives.
    ///
    /// # Errors
    /// `Annotation` if a record carries a label unknown to `vocab`.
    pub fn from_records(
        records: &[ReconciledRecord],
        vocab: &LabelVocabulary,
    ) -> Result<Option<Self>> {
        let mut page = TrainingPage {
            words: Vec::new(),
            boxes: Vec::new(),
            label_ids: Vec::new(),
        };
        for record in records {
            let word = strip_markers(&record.text);
            if word.is_empty() {
                continue;
            }
            let id = vocab.id(&record.label).ok_or_else(|| {
                Error::Annotation(format!("label {} missing from vocabulary", record.label))
            })?;
            page.words.push(word);
            page.boxes.push(record.bbox);
            page.label_ids.push(id);
        }
        Ok((!page.words.is_empty()).then_some(page))
    }
}

/// Convert record pages, skipping pages that end up empty.
pub fn training_pages(
    pages: &[Vec<ReconciledRecord>],
    vocab: &LabelVocabulary,
) -> Result<Vec<TrainingPage>> {
    let mut out = Vec::with_capacity(pages.len());
    for page in pages {
        if let Some(tp) = TrainingPage::from_records(page, vocab)? {
            out.push(tp);
        }
    }
    Ok(out)
}

/// Split pages into `(train, eval)`: the first 80% train, the rest eval.
/// With fewer than two pages both sets are the full input.
pub fn split_train_eval<T: Clone>(pages: &[T]) -> (Vec<T>, Vec<T>) {
    if pages.len() < 2 {
        return (pages.to_vec(), pages.to_vec());
    }
    let split = (pages.len() as f64 * TRAIN_FRACTION) as usize;
    (pages[..split].to_vec(), pages[split..].to_vec())
}

/// Record files of a directory: every `*.json`, sorted by file name.
pub fn record_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Load every record file of a directory.
pub fn load_record_pages(dir: &Path) -> Result<Vec<(PathBuf, Vec<ReconciledRecord>)>> {
    let files = record_files(dir)?;
    if files.is_empty() {
        warn!(dir = %dir.display(), "no record files found");
    }
    let mut pages = Vec::with_capacity(files.len());
    for path in files {
        let json = std::fs::read_to_string(&path)?;
        let records: Vec<ReconciledRecord> = serde_json::from_str(&json)?;
        debug!(file = %path.display(), records = records.len(), "loaded record page");
        pages.push((path, records));
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(text: &str, label: &str) -> ReconciledRecord {
        ReconciledRecord {
            text: text.into(),
            bbox: BBox::new(1.0, 1.0, 2.0, 2.0),
            label: label.into(),
        }
    }

    #[test]
    fn test_vocabulary_is_sorted_and_unique() {
        let p1 = vec![rec("a", "VALUE"), rec("b", "KEY")];
        let p2 = vec![rec("c", "OTHER"), rec("d", "KEY")];
        let vocab = LabelVocabulary::from_pages([p1.as_slice(), p2.as_slice()]);
        assert_eq!(vocab.labels(), ["KEY", "OTHER", "VALUE"]);
        assert_eq!(vocab.id("OTHER"), Some(1));
        assert_eq!(vocab.label(2), Some("VALUE"));
        assert_eq!(vocab.id("HEADER"), None);
    }

    #[test]
    fn test_training_page_strips_markers_and_empty_words() {
        let records = vec![
            rec("\u{0120}Total", "KEY"),
            rec("\u{0120}", "OTHER"),
            rec("500", "VALUE"),
        ];
        let vocab = LabelVocabulary::from_pages([records.as_slice()]);
        let page = TrainingPage::from_records(&records, &vocab).unwrap().unwrap();
        assert_eq!(page.words, vec!["Total", "500"]);
        assert_eq!(page.label_ids, vec![0, 2]);
        assert_eq!(page.boxes.len(), 2);
    }

    #[test]
    fn test_empty_page_dropped() {
        let pages = vec![vec![rec("\u{2581}", "OTHER")], vec![rec("x", "OTHER")]];
        let vocab = LabelVocabulary::from_pages(pages.iter().map(Vec::as_slice));
        assert_eq!(training_pages(&pages, &vocab).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_label_is_an_error() {
        let vocab = LabelVocabulary::from_pages([[rec("a", "KEY")].as_slice()]);
        let err = TrainingPage::from_records(&[rec("b", "VALUE")], &vocab);
        assert!(matches!(err, Err(Error::Annotation(_))));
    }

    #[test]
    fn test_split() {
        let pages: Vec<u32> = (0..10).collect();
        let (train, eval) = split_train_eval(&pages);
        assert_eq!(train.len(), 8);
        assert_eq!(eval, vec![8, 9]);

        let single = vec![1];
        assert_eq!(split_train_eval(&single), (vec![1], vec![1]));

        let (train, eval) = split_train_eval(&[1, 2]);
        assert_eq!((train, eval), (vec![1], vec![2]));
    }
}
