//! Page-level orchestration of the dataset pipeline.
//!
//! Two paths share the same building blocks:
//! - pre-annotation: tokens -> [`cluster`] -> draft words for review;
//! - reconciliation: cleaned image -> tokens -> [`reconcile`] with the
//!   reviewed human regions -> training records.
//!
//! Batches fan pages out over a rayon pool. A failing page is recorded in
//! the [`BatchReport`] and never stops the others.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::annotation::AnnotationTask;
use crate::cluster::{ClusterParams, Word, cluster_with};
use crate::error::{Error, Result};
use crate::gridlines::{GridlineParams, clean_page, load_page_image};
use crate::labeler::{DraftLabeler, HeuristicLabeler};
use crate::model::{PageImage, TokenSource};
use crate::reconcile::{HumanRegion, ReconciledRecord, reconcile};
use crate::token::{Token, strip_special_tokens};

pub(crate) fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Options shared by the batch entry points.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Worker threads. 0 uses the available parallelism.
    pub threads: usize,

    /// Remove ruling lines before asking the model for tokens.
    pub clean_images: bool,

    pub gridlines: GridlineParams,

    pub cluster: ClusterParams,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            clean_images: true,
            gridlines: GridlineParams::default(),
            cluster: ClusterParams::default(),
        }
    }
}

impl BatchOptions {
    fn thread_count(&self) -> usize {
        if self.threads == 0 {
            default_thread_count()
        } else {
            self.threads
        }
    }
}

/// Failure of a single page inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageError {
    pub page: String,
    pub message: String,
}

/// Output of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutput<T> {
    /// Source image file name.
    pub page: String,
    pub items: Vec<T>,
}

impl<T> PageOutput<T> {
    /// `<image stem>.json`
    pub fn output_file_name(&self) -> String {
        let stem = Path::new(&self.page)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.page);
        format!("{stem}.json")
    }
}

/// Partial results of a batch plus the pages that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport<T> {
    pub pages: Vec<PageOutput<T>>,
    pub errors: Vec<PageError>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    fn push_error(&mut self, page: impl Into<String>, err: &Error) {
        let page = page.into();
        warn!(page = %page, "page failed: {err}");
        self.errors.push(PageError {
            page,
            message: err.to_string(),
        });
    }
}

/// Tokens of a page with sequence-control tokens removed.
pub fn page_tokens(source: &dyn TokenSource, page: &PageImage) -> Result<Vec<Token>> {
    Ok(strip_special_tokens(source.extract_tokens(page)?))
}

/// Draft words of one page for the annotation tool.
pub fn preannotate_page(
    source: &dyn TokenSource,
    page: &PageImage,
    params: &ClusterParams,
    labeler: &dyn DraftLabeler,
) -> Result<Vec<Word>> {
    let tokens = page_tokens(source, page)?;
    Ok(cluster_with(&tokens, params, labeler))
}

/// Training records of one page.
///
/// When `gridlines` is given, ruling lines are removed before the model
/// sees the page; that step never fails the page.
pub fn reconcile_page(
    source: &dyn TokenSource,
    page: &PageImage,
    regions: &[HumanRegion],
    gridlines: Option<&GridlineParams>,
) -> Result<Vec<ReconciledRecord>> {
    let tokens = match gridlines {
        Some(params) => {
            let cleaned = PageImage::new(page.name.clone(), clean_page(&page.image, params));
            page_tokens(source, &cleaned)?
        }
        None => page_tokens(source, page)?,
    };
    Ok(reconcile(&tokens, regions))
}

/// Run `f` over `items` on a pool of `threads` workers, keeping input order.
fn run_pages<I, R, F>(items: Vec<I>, threads: usize, f: F) -> Result<Vec<R>>
where
    I: Send,
    R: Send,
    F: Fn(I) -> R + Sync + Send,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::InvalidParameter(e.to_string()))?;

    let mut results: Vec<(usize, R)> = pool.install(|| {
        items
            .into_par_iter()
            .enumerate()
            .map(|(idx, item)| (idx, f(item)))
            .collect()
    });
    results.sort_by_key(|(idx, _)| *idx);
    Ok(results.into_iter().map(|(_, r)| r).collect())
}

/// Pre-annotate a set of pages in parallel.
pub fn preannotate_batch(
    source: &dyn TokenSource,
    pages: Vec<PageImage>,
    options: &BatchOptions,
) -> Result<BatchReport<Word>> {
    let labeler = HeuristicLabeler;
    let results = run_pages(pages, options.thread_count(), |page| {
        let words = preannotate_page(source, &page, &options.cluster, &labeler);
        (page.name, words)
    })?;

    let mut report = BatchReport::default();
    for (page, words) in results {
        match words {
            Ok(items) => report.pages.push(PageOutput { page, items }),
            Err(err) => report.push_error(page, &err),
        }
    }
    info!(
        pages = report.pages.len(),
        failed = report.errors.len(),
        "pre-annotation finished"
    );
    Ok(report)
}

/// Reconcile every task of an annotation export against the model's tokens.
///
/// Images are looked up in `image_dir` by [`AnnotationTask::image_file_name`].
/// Missing images, unreadable images, bad rectangles and model failures are
/// reported per page.
pub fn reconcile_export(
    source: &dyn TokenSource,
    tasks: &[AnnotationTask],
    image_dir: &Path,
    options: &BatchOptions,
) -> Result<BatchReport<ReconciledRecord>> {
    let mut report = BatchReport::default();
    if tasks.is_empty() {
        warn!("annotation export contains no tasks");
        return Ok(report);
    }

    let mut jobs: Vec<(String, PathBuf, &AnnotationTask)> = Vec::with_capacity(tasks.len());
    for task in tasks {
        let name = task.image_file_name();
        let path = image_dir.join(&name);
        if !path.exists() {
            report.push_error(
                name,
                &Error::MissingImage {
                    path,
                    reason: format!("referenced as {}", task.data.image),
                },
            );
            continue;
        }
        jobs.push((name, path, task));
    }

    let gridlines = options.clean_images.then_some(&options.gridlines);
    let results = run_pages(jobs, options.thread_count(), |(name, path, task)| {
        let records = load_page_image(&path)
            .map(|image| PageImage::new(name.clone(), image))
            .and_then(|page| {
                let regions = task.regions()?;
                debug!(page = %name, regions = regions.len(), "reconciling page");
                reconcile_page(source, &page, &regions, gridlines)
            });
        (name, records)
    })?;

    for (page, records) in results {
        match records {
            Ok(items) => report.pages.push(PageOutput { page, items }),
            Err(err) => report.push_error(page, &err),
        }
    }
    info!(
        pages = report.pages.len(),
        failed = report.errors.len(),
        "reconciliation finished"
    );
    Ok(report)
}

/// Write `value` as pretty-printed UTF-8 JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Write one page's output to `<dir>/<image stem>.json` and return the path.
pub fn write_page_output<T: Serialize>(dir: &Path, page: &PageOutput<T>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(page.output_file_name());
    write_json(&path, &page.items)?;
    Ok(path)
}
