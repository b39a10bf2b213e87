//! simlearn CLI
//!
//! # Commands
//!
//! - `wikiqa`: train and evaluate the baseline scorer on WikiQA TSV files, then
//!   write TREC relevance / prediction files and the session metadata.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use simlearn::{
    data::reader::read_wikiqa_file, trec, EmbeddingSource, KeyedVectors, MeanEmbeddingScorer, PipelineConfig,
    Session, TrainingData,
};

#[derive(Parser)]
#[command(name = "simlearn")]
#[command(version)]
#[command(about = "Similarity learning data pipeline and ranking evaluation")]
struct Cli {
    /// Verbosity level (-v, -vv), overrides RUST_LOG
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train and evaluate on WikiQA
    Wikiqa {
        /// WikiQA training TSV
        #[arg(long)]
        train: PathBuf,
        /// WikiQA test TSV
        #[arg(long)]
        test: PathBuf,
        /// GloVe-format text vectors
        #[arg(long)]
        embeddings: PathBuf,
        /// TOML pipeline configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Where to write the TREC relevance file
        #[arg(long)]
        qrels: Option<PathBuf>,
        /// Where to write the TREC prediction file
        #[arg(long)]
        pred: Option<PathBuf>,
        /// Where to write the session metadata
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

/// Read whitespace-separated `word v1 .. vn` lines.
/// A leading `count dim` header line is skipped.
fn load_glove(path: &Path) -> anyhow::Result<KeyedVectors> {
    let reader = BufReader::new(File::open(path).with_context(|| format!("opening {}", path.display()))?);
    let mut vectors: Option<KeyedVectors> = None;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let mut fields = line.split_whitespace();
        let Some(word) = fields.next() else { continue };
        let values = fields
            .map(str::parse::<f32>)
            .collect::<Result<Vec<f32>, _>>()
            .with_context(|| format!("{}:{}: invalid vector component", path.display(), line_no + 1))?;
        if line_no == 0 && values.len() == 1 && word.parse::<usize>().is_ok() {
            continue;
        }
        let kv = vectors.get_or_insert_with(|| KeyedVectors::new(values.len()));
        kv.insert(word, values)
            .with_context(|| format!("{}:{}", path.display(), line_no + 1))?;
    }

    let Some(vectors) = vectors else {
        bail!("{} holds no vectors", path.display());
    };
    info!("Loaded {} vectors of {} dimensions from {}", vectors.len(), vectors.dim(), path.display());
    Ok(vectors)
}

#[allow(clippy::too_many_arguments)]
fn run_wikiqa(
    train: &Path,
    test: &Path,
    embeddings: &Path,
    config: Option<&Path>,
    qrels: Option<&Path>,
    pred: Option<&Path>,
    model: Option<&Path>,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    let train = read_wikiqa_file(train).with_context(|| format!("reading {}", train.display()))?;
    let test = read_wikiqa_file(test).with_context(|| format!("reading {}", test.display()))?;
    let vectors = load_glove(embeddings)?;

    let outputs = config.num_outputs();
    let mut session = Session::new(config)?;
    let data = TrainingData::Ranking(train);
    let lexicon = session.build_lexicon(&data, Some(&vectors))?;
    let mut scorer = MeanEmbeddingScorer::with_outputs(lexicon, outputs);
    drop(vectors);

    let epochs = session.train(Some(data), None, &mut scorer, Some(test.clone()))?;
    info!("Trained {} epochs", epochs.len());

    let report = session.evaluate(&test, &scorer)?;
    println!("{}", report);

    if let Some(path) = qrels {
        trec::save_qrels(&test, path)?;
    }
    if let Some(path) = pred {
        trec::save_predictions(&test, path, |q, d| session.similarity(q, d, &scorer))?;
    }
    if let Some(path) = model {
        session.save(path)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match cli.command {
        Commands::Wikiqa {
            train,
            test,
            embeddings,
            config,
            qrels,
            pred,
            model,
        } => run_wikiqa(
            &train,
            &test,
            &embeddings,
            config.as_deref(),
            qrels.as_deref(),
            pred.as_deref(),
            model.as_deref(),
        ),
    }
}
