pub mod serde;

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use tracing::{debug, info, warn};

use crate::{
    batch::{BatchEncoder, ClassificationBatches, TrainBatch},
    config::{PipelineConfig, TargetMode},
    data::{PairSet, RankingSet, TrainingData},
    embedding::EmbeddingSource,
    error::{PipelineError, Result},
    lexicon::{Lexicon, LexiconBuilder},
    metrics::{self, EvaluationReport},
    pairs::PairGenerator,
    scorer::{FitReport, Scorer},
};

pub use self::serde::SessionData;

/// Outcome of one training epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// 1-based
    pub epoch: usize,
    pub fit: FitReport,
    pub validation: Option<EvaluationReport>,
}

/// Training and evaluation driver around a [`Scorer`].
///
/// Holds the configuration, the lexicon once built, and the last training and
/// validation data it was given so later calls can reuse them.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) config: PipelineConfig,
    pub(crate) lexicon: Option<Lexicon>,
    train_data: Option<TrainingData>,
    validation: Option<RankingSet>,
}

impl Session {
    /// # Errors
    /// * `Configuration` - the configuration does not validate
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            lexicon: None,
            train_data: None,
            validation: None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn lexicon(&self) -> Option<&Lexicon> {
        self.lexicon.as_ref()
    }

    /// Build (or rebuild) the lexicon over `data`.
    pub fn build_lexicon(&mut self, data: &TrainingData, source: Option<&dyn EmbeddingSource>) -> Result<&Lexicon> {
        let lexicon = LexiconBuilder::from_config(&self.config).build(data.sentences(), source)?;
        Ok(self.lexicon.insert(lexicon))
    }

    /// Train `scorer` for the configured number of epochs.
    ///
    /// # Arguments
    /// * `data` - training data, `None` reuses the data of the previous call
    /// * `source` - pretrained vectors, only needed while no lexicon exists
    /// * `scorer` - receives `steps_per_epoch` batches per epoch
    /// * `validation` - ranking set evaluated after each epoch, `None` reuses the stored one
    ///
    /// # Errors
    /// * `Configuration` - no training data at all, or data that does not match `target_mode`
    /// * `Scorer` - whatever `fit` or `predict` reports
    pub fn train<S>(
        &mut self,
        data: Option<TrainingData>,
        source: Option<&dyn EmbeddingSource>,
        scorer: &mut S,
        validation: Option<RankingSet>,
    ) -> Result<Vec<EpochReport>>
    where
        S: Scorer + ?Sized,
    {
        if let Some(data) = data {
            self.train_data = Some(data);
        }
        if let Some(validation) = validation {
            self.validation = Some(validation);
        }
        let data = self.train_data.as_ref().ok_or_else(|| {
            PipelineError::config("no training data given and none stored from an earlier call")
        })?;

        let config = &self.config;
        if self.lexicon.is_none() {
            self.lexicon = Some(LexiconBuilder::from_config(config).build(data.sentences(), source)?);
        }
        let lexicon = self.require_lexicon()?;

        let mut batches: Box<dyn Iterator<Item = TrainBatch> + '_> = match (config.target_mode, data) {
            (TargetMode::Ranking, TrainingData::Ranking(set)) => {
                let generator = PairGenerator::new(set)?;
                if generator.pairs_per_pass() == 0 {
                    warn!("No query has both a relevant and an irrelevant document, no ranking batches");
                }
                Box::new(BatchEncoder::new(lexicon, generator, config.batch_size)?.map(TrainBatch::Ranking))
            }
            (TargetMode::Classification | TargetMode::Inference, TrainingData::Pairs(set)) => Box::new(
                ClassificationBatches::new(lexicon, set, config.batch_size, config.num_outputs())?
                    .map(TrainBatch::Classes),
            ),
            (mode, _) => {
                return Err(PipelineError::config(format!(
                    "target mode {} does not match the kind of training data given",
                    mode
                )))
            }
        };

        let mut reports = Vec::with_capacity(config.epochs);
        for epoch in 1..=config.epochs {
            info!("Epoch {}/{}", epoch, config.epochs);
            let fit = scorer.fit(&mut batches, config.steps_per_epoch)?;
            let validation = match &self.validation {
                Some(set) => {
                    let report = evaluate_with(config, lexicon, set, &*scorer)?;
                    info!("Epoch {} validation {}", epoch, report);
                    Some(report)
                }
                None => None,
            };
            reports.push(EpochReport { epoch, fit, validation });
        }
        Ok(reports)
    }

    fn require_lexicon(&self) -> Result<&Lexicon> {
        self.lexicon
            .as_ref()
            .ok_or_else(|| PipelineError::config("the session has no lexicon, train or load one first"))
    }

    /// Score aligned (query, document) pairs.
    ///
    /// # Returns
    /// One row per pair as produced by the scorer.
    pub fn predict<Q, D, S>(&self, queries: &[Q], docs: &[D], scorer: &S, silent: bool) -> Result<Vec<Vec<f32>>>
    where
        Q: AsRef<[String]> + Sync,
        D: AsRef<[String]> + Sync,
        S: Scorer + ?Sized,
    {
        predict_with(self.require_lexicon()?, queries, docs, scorer, silent)
    }

    /// MAP and nDCG of `scorer` over `set`.
    pub fn evaluate<S: Scorer + ?Sized>(&self, set: &RankingSet, scorer: &S) -> Result<EvaluationReport> {
        let report = evaluate_with(&self.config, self.require_lexicon()?, set, scorer)?;
        info!("{}", report);
        Ok(report)
    }

    /// Score of a single (query, document) pair.
    pub fn similarity<S: Scorer + ?Sized>(&self, query: &[String], doc: &[String], scorer: &S) -> Result<f32> {
        let rows = self.predict(&[query], &[doc], scorer, true)?;
        rows.first()
            .map(|row| relevance_score(self.config.target_mode, row))
            .transpose()?
            .ok_or_else(|| PipelineError::data("the scorer returned no prediction"))
    }

    /// Argmax accuracy over every pair of `set`, scored in `batch_size` chunks.
    ///
    /// # Returns
    /// `(correct, total, accuracy)`
    ///
    /// # Errors
    /// * `Data` - the set is empty, or a label does not fit the configured classes
    pub fn evaluate_classification<S: Scorer + ?Sized>(
        &self,
        set: &PairSet,
        scorer: &S,
    ) -> Result<(usize, usize, f64)> {
        let lexicon = self.require_lexicon()?;
        set.check_labels(self.config.num_outputs())?;
        let mut correct = 0usize;
        let mut total = 0usize;
        for chunk in set.pairs.chunks(self.config.batch_size) {
            let lefts: Vec<&[String]> = chunk.iter().map(|p| p.left.as_slice()).collect();
            let rights: Vec<&[String]> = chunk.iter().map(|p| p.right.as_slice()).collect();
            let rows = predict_with(lexicon, &lefts, &rights, scorer, true)?;
            for (row, pair) in rows.iter().zip(chunk) {
                total += 1;
                if argmax(row) == Some(pair.label) {
                    correct += 1;
                }
            }
        }
        let acc = metrics::accuracy(correct, total)?;
        info!("Accuracy: {}/{} = {:.4}", correct, total, acc);
        Ok((correct, total, acc))
    }

    /// Write the configuration and lexicon as CBOR.
    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_cbor::to_writer(writer, self)?;
        info!("Saved session metadata to {}", path.display());
        Ok(())
    }

    /// Restore a session written by [`Session::save`]. Training data is not part of it.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let data: SessionData = serde_cbor::from_reader(reader)?;
        info!("Loaded session metadata from {}", path.display());
        data.into_session()
    }
}

fn predict_with<Q, D, S>(lexicon: &Lexicon, queries: &[Q], docs: &[D], scorer: &S, silent: bool) -> Result<Vec<Vec<f32>>>
where
    Q: AsRef<[String]> + Sync,
    D: AsRef<[String]> + Sync,
    S: Scorer + ?Sized,
{
    if queries.len() != docs.len() {
        return Err(PipelineError::data(format!(
            "{} queries but {} documents to predict",
            queries.len(),
            docs.len()
        )));
    }
    let q = lexicon.translate(queries);
    let d = lexicon.translate(docs);
    let rows = scorer.predict(&q, &d)?;
    if rows.len() != queries.len() {
        return Err(PipelineError::data(format!(
            "the scorer returned {} predictions for {} pairs",
            rows.len(),
            queries.len()
        )));
    }
    if !silent {
        for ((query, doc), row) in queries.iter().zip(docs).zip(&rows) {
            debug!("{}\t{}\t{:?}", query.as_ref().join(" "), doc.as_ref().join(" "), row);
        }
        info!("Predicted {} pairs", rows.len());
    }
    Ok(rows)
}

/// Ranking score of one prediction row: the only column in ranking mode, the
/// highest class otherwise.
fn relevance_score(mode: TargetMode, row: &[f32]) -> Result<f32> {
    let score = match mode {
        TargetMode::Ranking => row.first(),
        TargetMode::Classification | TargetMode::Inference => row.last(),
    };
    score
        .copied()
        .ok_or_else(|| PipelineError::data("the scorer returned an empty prediction row"))
}

/// First position of the largest value; NaN never wins.
fn argmax(row: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in row.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

fn evaluate_with<S>(config: &PipelineConfig, lexicon: &Lexicon, set: &RankingSet, scorer: &S) -> Result<EvaluationReport>
where
    S: Scorer + ?Sized,
{
    let flat = set.flatten()?;
    let rows = predict_with(lexicon, &flat.queries, &flat.docs, scorer, true)?;
    let scores = rows
        .iter()
        .map(|row| relevance_score(config.target_mode, row))
        .collect::<Result<Vec<f32>>>()?;
    let y_pred = metrics::segment(&scores, &flat.doc_lens)?;
    let y_true = metrics::segment(&flat.labels, &flat.doc_lens)?;
    EvaluationReport::compute(&y_true, &y_pred)
}
