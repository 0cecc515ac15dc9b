//! layoutrecon - build token-classification datasets from scanned pages
//!
//! Subcommands cover the two halves of the annotation loop: draft words for
//! the annotation tool, and labeled records from its export.

use clap::{ArgAction, Args, Parser, Subcommand};
use layoutrecon_core::annotation::load_export;
use layoutrecon_core::cluster::{ClusterParams, cluster};
use layoutrecon_core::dataset::{
    LabelVocabulary, load_record_pages, split_train_eval, training_pages,
};
use layoutrecon_core::gridlines::{GridlineParams, load_page_image, remove_gridlines};
use layoutrecon_core::model::{TokenDumpSource, load_token_dump};
use layoutrecon_core::pipeline::{BatchOptions, reconcile_export, write_json, write_page_output};
use layoutrecon_core::token::strip_special_tokens;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "layoutrecon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Use debug logging level
    #[arg(short = 'd', long, global = true, action = ArgAction::SetTrue)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cluster a page's model tokens into draft words for annotation
    Preannotate {
        /// Token dump of one page (list of {token, box})
        #[arg(long)]
        tokens: PathBuf,

        /// Where to write the draft words
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Label model tokens with the regions of an annotation export
    Reconcile {
        /// Annotation tool export (JSON)
        #[arg(long)]
        export: PathBuf,

        /// Directory holding the page images
        #[arg(long)]
        image_dir: PathBuf,

        /// Directory holding one token dump per page (<image stem>.json)
        #[arg(long)]
        tokens_dir: PathBuf,

        /// Directory receiving one record file per page
        #[arg(long)]
        output_dir: PathBuf,

        /// Worker threads (0 = available parallelism)
        #[arg(short = 't', long, default_value_t = 0)]
        threads: usize,

        /// Skip ruling-line removal
        #[arg(long, action = ArgAction::SetTrue)]
        no_clean: bool,
    },

    /// Remove ruling lines from a page image
    Clean {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        gridlines: GridlineArgs,
    },

    /// List the label vocabulary of a record directory
    Labels {
        /// Directory of record files written by `reconcile`
        #[arg(long)]
        dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ClusterArgs {
    /// Vertical tolerance for tokens on the same row
    #[arg(long = "y-tolerance", default_value_t = 5.0)]
    y_tolerance: f64,

    /// Horizontal gap tolerance as a fraction of token height
    #[arg(long = "x-tolerance-ratio", default_value_t = 0.5)]
    x_tolerance_ratio: f64,
}

impl From<&ClusterArgs> for ClusterParams {
    fn from(args: &ClusterArgs) -> Self {
        ClusterParams {
            y_tolerance: args.y_tolerance,
            x_tolerance_ratio: args.x_tolerance_ratio,
            ..ClusterParams::default()
        }
    }
}

#[derive(Args, Debug)]
struct GridlineArgs {
    /// Neighbourhood size of the adaptive threshold (odd, >= 3)
    #[arg(long = "block-size", default_value_t = 11)]
    block_size: u32,

    /// Minimum line length before the opening repeats
    #[arg(long = "kernel-length", default_value_t = 40)]
    kernel_length: u32,
}

impl From<&GridlineArgs> for GridlineParams {
    fn from(args: &GridlineArgs) -> Self {
        GridlineParams {
            block_size: args.block_size,
            kernel_length: args.kernel_length,
            ..GridlineParams::default()
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

type CliResult = std::result::Result<(), Box<dyn std::error::Error>>;

fn preannotate(tokens: &Path, output: &Path, params: &ClusterParams) -> CliResult {
    let tokens = strip_special_tokens(load_token_dump(tokens)?);
    let words = cluster(&tokens, params);
    write_json(output, &words)?;
    info!(words = words.len(), output = %output.display(), "wrote draft words");
    Ok(())
}

fn reconcile(
    export: &Path,
    image_dir: &Path,
    tokens_dir: &Path,
    output_dir: &Path,
    options: &BatchOptions,
) -> CliResult {
    let tasks = load_export(export)?;
    debug!(tasks = tasks.len(), "loaded annotation export");

    let source = TokenDumpSource::new(tokens_dir);
    let report = reconcile_export(&source, &tasks, image_dir, options)?;

    for page in &report.pages {
        let path = write_page_output(output_dir, page)?;
        debug!(page = %page.page, records = page.items.len(), file = %path.display(), "wrote records");
    }
    for err in &report.errors {
        eprintln!("Error: {}: {}", err.page, err.message);
    }
    eprintln!(
        "{} pages written, {} failed",
        report.pages.len(),
        report.errors.len()
    );
    Ok(())
}

fn clean(input: &Path, output: &Path, params: &GridlineParams) -> CliResult {
    let image = load_page_image(input)?;
    let cleaned = remove_gridlines(&image, params)?;
    cleaned.save(output)?;
    info!(output = %output.display(), "wrote cleaned image");
    Ok(())
}

fn labels(dir: &Path) -> CliResult {
    let pages: Vec<_> = load_record_pages(dir)?
        .into_iter()
        .map(|(_, records)| records)
        .collect();
    let vocab = LabelVocabulary::from_pages(pages.iter().map(Vec::as_slice));
    for (id, label) in vocab.labels().iter().enumerate() {
        println!("{id}\t{label}");
    }

    let training = training_pages(&pages, &vocab)?;
    let (train, eval) = split_train_eval(&training);
    eprintln!(
        "{} labels, {} pages ({} train, {} eval)",
        vocab.len(),
        training.len(),
        train.len(),
        eval.len()
    );
    Ok(())
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = match &cli.command {
        Command::Preannotate {
            tokens,
            output,
            cluster: cluster_args,
        } => preannotate(tokens, output, &cluster_args.into()),
        Command::Reconcile {
            export,
            image_dir,
            tokens_dir,
            output_dir,
            threads,
            no_clean,
        } => {
            let options = BatchOptions {
                threads: *threads,
                clean_images: !no_clean,
                ..BatchOptions::default()
            };
            reconcile(export, image_dir, tokens_dir, output_dir, &options)
        }
        Command::Clean {
            input,
            output,
            gridlines: gridline_args,
        } => clean(input, output, &gridline_args.into()),
        Command::Labels { dir } => labels(dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
