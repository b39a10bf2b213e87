use anyhow::{bail, ensure};
use rayon::prelude::*;
use tracing::debug;

use crate::{batch::TrainBatch, lexicon::{EmbeddingMatrix, Lexicon}, utils::math::dense};

/// Diagnostics returned by [`Scorer::fit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitReport {
    /// batches consumed
    pub steps: usize,
    /// rows seen across those batches
    pub examples: usize,
    pub loss: Option<f64>,
}

/// Trainable model consuming indexed, padded batches.
///
/// This crate only produces the batches. Architecture, loss and optimizer live behind
/// this trait. Errors are passed through the pipeline without being rewrapped.
pub trait Scorer {
    /// Consume up to `steps` batches from `batches`.
    fn fit(&mut self, batches: &mut dyn Iterator<Item = TrainBatch>, steps: usize) -> anyhow::Result<FitReport>;

    /// Score aligned `queries[i]` / `docs[i]` pairs.
    ///
    /// # Returns
    /// One row per pair: a single score for ranking, one column per class otherwise.
    fn predict(&self, queries: &[Vec<usize>], docs: &[Vec<usize>]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Untrained baseline: cosine between the mean embeddings of both sides.
///
/// Padding and the unknown-word row are skipped when averaging. A side with no known
/// token scores 0.
///
/// With `outputs > 1` the cosine is spread over class columns: it is rescaled to
/// `p` in `[0, 1]` and column `c` gets `1 - |p - c / (outputs - 1)|`, so the argmax is
/// the class nearest to the similarity.
#[derive(Debug, Clone)]
pub struct MeanEmbeddingScorer {
    matrix: EmbeddingMatrix,
    pad: usize,
    unk: usize,
    outputs: usize,
    seen_batches: usize,
}

impl MeanEmbeddingScorer {
    pub fn new(lexicon: &Lexicon) -> Self {
        Self::with_outputs(lexicon, 1)
    }

    pub fn with_outputs(lexicon: &Lexicon, outputs: usize) -> Self {
        Self {
            matrix: lexicon.matrix.clone(),
            pad: lexicon.pad_index(),
            unk: lexicon.unk_index(),
            outputs: outputs.max(1),
            seen_batches: 0,
        }
    }

    /// Batches consumed by every `fit` call so far
    pub fn seen_batches(&self) -> usize {
        self.seen_batches
    }

    /// Mean of the known rows of `indexed`, `None` when there are none.
    fn side_vector(&self, indexed: &[usize]) -> anyhow::Result<Option<Vec<f32>>> {
        let mut acc = vec![0.0f32; self.matrix.dim()];
        let mut n = 0usize;
        for &i in indexed {
            if i == self.pad || i == self.unk {
                continue;
            }
            let Some(row) = self.matrix.row(i) else {
                bail!("index {} is outside the embedding table of {} rows", i, self.matrix.rows());
            };
            dense::add_assign(&mut acc, row);
            n += 1;
        }
        if n == 0 {
            return Ok(None);
        }
        let inv = 1.0 / n as f32;
        acc.iter_mut().for_each(|x| *x *= inv);
        Ok(Some(acc))
    }

    fn score(&self, query: &[usize], doc: &[usize]) -> anyhow::Result<Vec<f32>> {
        let sim = match (self.side_vector(query)?, self.side_vector(doc)?) {
            (Some(q), Some(d)) => dense::cosine(&q, &d),
            _ => 0.0,
        };
        if self.outputs == 1 {
            return Ok(vec![sim]);
        }
        let p = ((sim + 1.0) / 2.0).clamp(0.0, 1.0);
        let last = (self.outputs - 1) as f32;
        Ok((0..self.outputs).map(|c| 1.0 - (p - c as f32 / last).abs()).collect())
    }
}

impl Scorer for MeanEmbeddingScorer {
    fn fit(&mut self, batches: &mut dyn Iterator<Item = TrainBatch>, steps: usize) -> anyhow::Result<FitReport> {
        let mut report = FitReport::default();
        for batch in batches.take(steps) {
            report.steps += 1;
            report.examples += batch.len();
        }
        self.seen_batches += report.steps;
        debug!("Baseline consumed {} batches ({} rows)", report.steps, report.examples);
        Ok(report)
    }

    fn predict(&self, queries: &[Vec<usize>], docs: &[Vec<usize>]) -> anyhow::Result<Vec<Vec<f32>>> {
        ensure!(
            queries.len() == docs.len(),
            "{} queries but {} documents to score",
            queries.len(),
            docs.len()
        );
        queries
            .par_iter()
            .zip(docs.par_iter())
            .map(|(q, d)| self.score(q, d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batch::RankingBatch,
        lexicon::Vocabulary,
    };

    /// a=(1,0) b=(0,1) c=(1,1), pad 3, unk 4
    fn lexicon() -> Lexicon {
        let mut vocab = Vocabulary::new();
        for w in ["a", "b", "c"] {
            vocab.insert(w);
        }
        vocab.seal_corpus();
        let mut matrix = EmbeddingMatrix::with_capacity(5, 2);
        matrix.push_row(&[1.0, 0.0]);
        matrix.push_row(&[0.0, 1.0]);
        matrix.push_row(&[1.0, 1.0]);
        matrix.push_zero_row();
        matrix.push_row(&[5.0, -5.0]);
        Lexicon { vocab, matrix, text_maxlen: 3 }
    }

    #[test]
    fn cosine_of_mean_vectors() {
        let lex = lexicon();
        let scorer = MeanEmbeddingScorer::new(&lex);
        let out = scorer
            .predict(&[vec![0, 3, 3], vec![0, 1, 3], vec![0, 4, 3]], &[vec![0, 3, 3], vec![1, 3, 3], vec![2, 3, 3]])
            .unwrap();
        assert!((out[0][0] - 1.0).abs() < 1e-6);
        assert!(out[1][0] > 0.7 && out[1][0] < 0.71);
        // unk skipped, so (1,0) vs (1,1)
        assert!((out[2][0] - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn unknown_only_side_scores_zero() {
        let lex = lexicon();
        let scorer = MeanEmbeddingScorer::new(&lex);
        let out = scorer.predict(&[vec![4, 4, 3]], &[vec![0, 3, 3]]).unwrap();
        assert_eq!(out, vec![vec![0.0]]);
    }

    #[test]
    fn class_columns_peak_at_nearest_class() {
        let lex = lexicon();
        let scorer = MeanEmbeddingScorer::with_outputs(&lex, 3);
        let same = scorer.predict(&[vec![0, 3, 3]], &[vec![0, 3, 3]]).unwrap();
        assert_eq!(same[0].len(), 3);
        assert!(same[0][2] > same[0][1] && same[0][1] > same[0][0]);
        let orth = scorer.predict(&[vec![0, 3, 3]], &[vec![1, 3, 3]]).unwrap();
        assert!(orth[0][1] > orth[0][0] && orth[0][1] > orth[0][2]);
    }

    #[test]
    fn mismatched_or_bad_input_fails() {
        let lex = lexicon();
        let scorer = MeanEmbeddingScorer::new(&lex);
        assert!(scorer.predict(&[vec![0]], &[]).is_err());
        assert!(scorer.predict(&[vec![9]], &[vec![0]]).is_err());
    }

    #[test]
    fn fit_counts_at_most_steps_batches() {
        let lex = lexicon();
        let mut scorer = MeanEmbeddingScorer::new(&lex);
        let batch = RankingBatch {
            queries: vec![vec![0, 3, 3]; 2],
            docs: vec![vec![1, 3, 3]; 2],
            labels: vec![1, 0],
        };
        let mut batches = std::iter::repeat(TrainBatch::Ranking(batch));
        let report = scorer.fit(&mut batches, 4).unwrap();
        assert_eq!(report.steps, 4);
        assert_eq!(report.examples, 8);
        scorer.fit(&mut std::iter::empty::<TrainBatch>(), 4).unwrap();
        assert_eq!(scorer.seen_batches(), 4);
    }
}
