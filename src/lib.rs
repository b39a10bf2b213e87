/// This crate is the data-to-tensor pipeline of a similarity learning model:
/// vocabulary and embedding matrix assembly, pairwise ranking triples, padded
/// index batches and MAP / nDCG evaluation.
pub mod batch;
pub mod config;
pub mod data;
pub mod embedding;
pub mod error;
pub mod lexicon;
pub mod metrics;
pub mod pairs;
pub mod scorer;
pub mod session;
pub mod trec;
pub mod utils;

/// Pipeline configuration
/// Every tunable of the pipeline, with defaults, loaded from TOML.
/// Unknown keys and unknown mode strings are rejected.
pub use config::{PipelineConfig, TargetMode, UnkHandling};

/// Pipeline error type
/// - `Configuration`: a setting or an embedding source cannot be used
/// - `Data`: input that does not have the shape a component needs
/// - `Io` / `Persist`: file and CBOR failures
/// - `Scorer`: whatever the model reported, unchanged
pub use error::{PipelineError, Result};

/// Corpus structures
/// - `RankingSet`: queries with labeled candidate groups
/// - `PairSet`: labeled sentence pairs for classification and inference
pub use data::{PairSet, QueryGroup, RankingSet, TrainingData};

/// Pretrained embedding lookup
/// `EmbeddingSource` is the read-only interface the lexicon builder consumes.
/// `KeyedVectors` keeps vectors in memory, in insertion order.
pub use embedding::{EmbeddingSource, KeyedVectors};

/// Lexicon
/// Frozen vocabulary + embedding matrix + padding length.
///
/// Row layout of the matrix:
/// - corpus tokens in first-seen order
/// - pretrained tokens the corpus never used
/// - the padding row
/// - the unknown-word row
///
/// # Serialization
/// Supported, as part of a saved `Session`.
pub use lexicon::{Lexicon, LexiconBuilder};

/// Pair generation and batching
/// `PairGenerator` loops over every (relevant, irrelevant) candidate pair of every
/// query forever. `BatchEncoder` turns its triples into padded index batches and
/// `export_full` materializes exactly one pass.
pub use batch::{export_full, BatchEncoder, RankingBatch, TrainBatch};
pub use pairs::{PairGenerator, Triple};

/// Scorer seam
/// The model being trained lives behind `Scorer`. `MeanEmbeddingScorer` is an
/// untrained cosine baseline.
pub use scorer::{FitReport, MeanEmbeddingScorer, Scorer};

/// Session
/// Drives training epochs, prediction and evaluation over a `Scorer`, and saves
/// its configuration and lexicon as CBOR.
pub use session::{EpochReport, Session};

/// Evaluation results
/// MAP and nDCG at cutoffs 1, 3, 5, 10 and 20.
pub use metrics::EvaluationReport;
