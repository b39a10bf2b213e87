use std::{cmp::Ordering, fmt};

use rayon::prelude::*;

use crate::error::{PipelineError, Result};

/// Cutoffs reported by the evaluator
pub const NDCG_CUTOFFS: [usize; 5] = [1, 3, 5, 10, 20];

/// Candidate positions sorted by predicted score, best first.
///
/// Stable: equal scores keep candidate order, `-0.0` and `0.0` included.
/// NaN sorts after every number.
pub fn rank_order(scores: &[f32]) -> Vec<usize> {
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        let (sa, sb) = (scores[a], scores[b]);
        // keys are never NaN
        key(sb)
            .partial_cmp(&key(sa))
            .unwrap_or(Ordering::Equal)
            .then_with(|| sa.is_nan().cmp(&sb.is_nan()))
    });
    order
}

fn check_lengths(y_true: &[u8], y_pred: &[f32]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::data(format!(
            "{} labels but {} predictions for one query",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Average precision of one query.
///
/// Mean of precision@k over every rank k holding a relevant document; 0 when the
/// query has no relevant document.
pub fn average_precision(y_true: &[u8], y_pred: &[f32]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mut hits = 0usize;
    let mut sum = 0.0;
    for (rank, idx) in rank_order(y_pred).into_iter().enumerate() {
        if y_true[idx] > 0 {
            hits += 1;
            sum += hits as f64 / (rank + 1) as f64;
        }
    }
    Ok(if hits == 0 { 0.0 } else { sum / hits as f64 })
}

/// DCG of `labels` taken in the given order, first `k` only.
/// gain `2^rel - 1`, discount `log2(rank + 1)` with rank from 1
fn dcg<I: Iterator<Item = u8>>(labels: I, k: usize) -> f64 {
    labels
        .take(k)
        .enumerate()
        .map(|(i, rel)| (2f64.powi(rel as i32) - 1.0) / ((i + 2) as f64).log2())
        .sum()
}

/// nDCG@k of one query. 0 when the ideal DCG is 0.
pub fn ndcg_at_k(y_true: &[u8], y_pred: &[f32], k: usize) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mut ideal: Vec<u8> = y_true.to_vec();
    ideal.sort_unstable_by(|a, b| b.cmp(a));
    let idcg = dcg(ideal.into_iter(), k);
    if idcg == 0.0 {
        return Ok(0.0);
    }
    let actual = dcg(rank_order(y_pred).into_iter().map(|i| y_true[i]), k);
    Ok(actual / idcg)
}

fn mean_over_queries<F>(y_true: &[Vec<u8>], y_pred: &[Vec<f32>], per_query: F) -> Result<f64>
where
    F: Fn(&[u8], &[f32]) -> Result<f64> + Sync,
{
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::data(format!(
            "{} label groups but {} prediction groups",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(PipelineError::data("cannot average a metric over zero queries"));
    }
    let values: Vec<f64> = y_true
        .par_iter()
        .zip(y_pred.par_iter())
        .map(|(t, p)| per_query(t, p))
        .collect::<Result<_>>()?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean average precision. Queries without a relevant document count as 0.
pub fn mean_average_precision(y_true: &[Vec<u8>], y_pred: &[Vec<f32>]) -> Result<f64> {
    mean_over_queries(y_true, y_pred, average_precision)
}

/// Mean nDCG@k. Queries without a relevant document count as 0.
pub fn mean_ndcg(y_true: &[Vec<u8>], y_pred: &[Vec<f32>], k: usize) -> Result<f64> {
    mean_over_queries(y_true, y_pred, |t, p| ndcg_at_k(t, p, k))
}

/// `correct / total`, guarded against an empty evaluation.
pub fn accuracy(correct: usize, total: usize) -> Result<f64> {
    if total == 0 {
        return Err(PipelineError::data("accuracy over zero evaluated examples"));
    }
    Ok(correct as f64 / total as f64)
}

/// Cut a flat list back into per-query groups of the given sizes.
pub fn segment<T: Clone>(flat: &[T], doc_lens: &[usize]) -> Result<Vec<Vec<T>>> {
    let total: usize = doc_lens.iter().sum();
    if total != flat.len() {
        return Err(PipelineError::data(format!(
            "group sizes add up to {} but {} values were given",
            total,
            flat.len()
        )));
    }
    let mut offset = 0;
    Ok(doc_lens
        .iter()
        .map(|&n| {
            let group = flat[offset..offset + n].to_vec();
            offset += n;
            group
        })
        .collect())
}

/// MAP and nDCG at each cutoff of [`NDCG_CUTOFFS`].
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub map: f64,
    /// (k, nDCG@k)
    pub ndcg: Vec<(usize, f64)>,
    pub num_queries: usize,
}

impl EvaluationReport {
    pub fn compute(y_true: &[Vec<u8>], y_pred: &[Vec<f32>]) -> Result<Self> {
        let map = mean_average_precision(y_true, y_pred)?;
        let ndcg = NDCG_CUTOFFS
            .iter()
            .map(|&k| Ok((k, mean_ndcg(y_true, y_pred, k)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            map,
            ndcg,
            num_queries: y_true.len(),
        })
    }

    pub fn ndcg_at(&self, k: usize) -> Option<f64> {
        self.ndcg.iter().find(|(c, _)| *c == k).map(|(_, v)| *v)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MAP: {:.4}", self.map)?;
        for (k, v) in &self.ndcg {
            write!(f, " nDCG@{}: {:.4}", k, v)?;
        }
        write!(f, " (queries: {})", self.num_queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rank_order_is_stable_and_sinks_nan() {
        assert_eq!(rank_order(&[0.1, 0.9, 0.1, f32::NAN, 0.5]), vec![1, 4, 0, 2, 3]);
        assert_eq!(rank_order(&[f32::NAN, f32::NEG_INFINITY]), vec![1, 0]);
        assert!(rank_order(&[]).is_empty());
    }

    #[test]
    fn signed_zeros_are_a_tie() {
        assert_eq!(rank_order(&[-0.0, 0.0]), vec![0, 1]);
        assert_eq!(rank_order(&[0.0, -0.0, f32::NAN, 0.0]), vec![0, 1, 3, 2]);
        assert_eq!(average_precision(&[1, 0], &[-0.0, 0.0]).unwrap(), 1.0);
        assert_eq!(ndcg_at_k(&[1, 0], &[-0.0, 0.0], 1).unwrap(), 1.0);
    }

    #[test]
    fn average_precision_by_hand() {
        let ap = average_precision(&[1, 0, 1], &[0.9, 0.8, 0.7]).unwrap();
        assert!(close(ap, (1.0 + 2.0 / 3.0) / 2.0));
        assert_eq!(average_precision(&[0, 0], &[0.1, 0.2]).unwrap(), 0.0);
        assert!(average_precision(&[1], &[0.1, 0.2]).is_err());
    }

    #[test]
    fn ndcg_by_hand() {
        let v = ndcg_at_k(&[0, 1], &[0.9, 0.1], 2).unwrap();
        assert!(close(v, 1.0 / 3f64.log2()));
        assert_eq!(ndcg_at_k(&[0, 1], &[0.9, 0.1], 1).unwrap(), 0.0);
        assert_eq!(ndcg_at_k(&[0, 0], &[0.9, 0.1], 5).unwrap(), 0.0);
    }

    #[test]
    fn queries_without_relevant_docs_count_as_zero() {
        let y_true = vec![vec![1, 0], vec![0, 0]];
        let y_pred = vec![vec![0.9, 0.1], vec![0.3, 0.2]];
        assert!(close(mean_average_precision(&y_true, &y_pred).unwrap(), 0.5));
        assert!(close(mean_ndcg(&y_true, &y_pred, 3).unwrap(), 0.5));
    }

    #[test]
    fn empty_inputs_are_data_errors() {
        assert!(matches!(mean_average_precision(&[], &[]), Err(PipelineError::Data(_))));
        assert!(matches!(accuracy(0, 0), Err(PipelineError::Data(_))));
        assert!(close(accuracy(3, 4).unwrap(), 0.75));
        assert!(mean_ndcg(&[vec![1]], &[], 1).is_err());
    }

    #[test]
    fn segment_restores_variable_groups() {
        let flat = [1, 2, 3, 4, 5, 6];
        assert_eq!(
            segment(&flat, &[2, 0, 3, 1]).unwrap(),
            vec![vec![1, 2], vec![], vec![3, 4, 5], vec![6]]
        );
        assert!(segment(&flat, &[2, 2]).is_err());
    }

    #[test]
    fn report_lists_every_cutoff() {
        let report = EvaluationReport::compute(&[vec![0, 1, 0]], &[vec![0.1, 0.8, 0.3]]).unwrap();
        assert_eq!(report.map, 1.0);
        assert_eq!(report.ndcg.iter().map(|(k, _)| *k).collect::<Vec<_>>(), NDCG_CUTOFFS.to_vec());
        assert_eq!(report.ndcg_at(5), Some(1.0));
        assert!(report.to_string().starts_with("MAP: 1.0000"));
    }

    proptest! {
        #[test]
        fn perfect_ranking_has_unit_ndcg(labels in proptest::collection::vec(0u8..2, 1..20), k in 1usize..25) {
            prop_assume!(labels.iter().any(|&l| l > 0));
            // score == label reproduces the ideal order
            let scores: Vec<f32> = labels.iter().map(|&l| l as f32).collect();
            let v = ndcg_at_k(&labels, &scores, k).unwrap();
            prop_assert!((v - 1.0).abs() < 1e-9);
            prop_assert!((average_precision(&labels, &scores).unwrap() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn metrics_stay_in_unit_interval(
            pairs in proptest::collection::vec((0u8..3, -5.0f32..5.0), 1..30),
            k in 1usize..10,
        ) {
            let (labels, scores): (Vec<u8>, Vec<f32>) = pairs.into_iter().unzip();
            let ap = average_precision(&labels, &scores).unwrap();
            let nd = ndcg_at_k(&labels, &scores, k).unwrap();
            prop_assert!((0.0..=1.0 + 1e-9).contains(&ap));
            prop_assert!((0.0..=1.0 + 1e-9).contains(&nd));
        }
    }
}
