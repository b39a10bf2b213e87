use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use tracing::info;

use crate::{data::RankingSet, error::Result};

/// Rank column of the prediction file; evaluation tools re-rank by score.
pub const RANK_PLACEHOLDER: u32 = 99;
pub const RUN_TAG: &str = "STANDARD";

/// Write relevance judgments, one `qid\t0\tdocid\tlabel` line per candidate.
pub fn write_qrels<W: Write>(set: &RankingSet, mut writer: W) -> Result<usize> {
    let mut lines = 0;
    for group in &set.groups {
        for (doc_id, label) in group.doc_ids.iter().zip(&group.labels) {
            writeln!(writer, "{}\t0\t{}\t{}", group.query_id, doc_id, label)?;
            lines += 1;
        }
    }
    writer.flush()?;
    Ok(lines)
}

/// Write one `qid\tQ0\tdocid\t99\tscore\tSTANDARD` line per candidate.
///
/// # Arguments
/// * `score_fn` - called with (query tokens, document tokens)
pub fn write_predictions<W, F>(set: &RankingSet, mut writer: W, mut score_fn: F) -> Result<usize>
where
    W: Write,
    F: FnMut(&[String], &[String]) -> Result<f32>,
{
    let mut lines = 0;
    for group in &set.groups {
        for (doc_id, doc) in group.doc_ids.iter().zip(&group.docs) {
            let score = score_fn(&group.query, doc)?;
            writeln!(
                writer,
                "{}\tQ0\t{}\t{}\t{}\t{}",
                group.query_id, doc_id, RANK_PLACEHOLDER, score, RUN_TAG
            )?;
            lines += 1;
        }
    }
    writer.flush()?;
    Ok(lines)
}

pub fn save_qrels(set: &RankingSet, path: &Path) -> Result<()> {
    let lines = write_qrels(set, BufWriter::new(File::create(path)?))?;
    info!("Wrote {} qrels lines to {}", lines, path.display());
    Ok(())
}

pub fn save_predictions<F>(set: &RankingSet, path: &Path, score_fn: F) -> Result<()>
where
    F: FnMut(&[String], &[String]) -> Result<f32>,
{
    let lines = write_predictions(set, BufWriter::new(File::create(path)?), score_fn)?;
    info!("Wrote {} prediction lines to {}", lines, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::tests::toks, error::PipelineError};

    fn set() -> RankingSet {
        RankingSet::from_parallel(
            vec![toks("q"), toks("r")],
            vec![vec![toks("a"), toks("b c")], vec![toks("d")]],
            vec![vec![0, 1], vec![1]],
        )
        .unwrap()
    }

    #[test]
    fn qrels_lines() {
        let mut out = Vec::new();
        assert_eq!(write_qrels(&set(), &mut out).unwrap(), 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Q0\t0\tD0-0\t0\nQ0\t0\tD0-1\t1\nQ1\t0\tD1-0\t1\n"
        );
    }

    #[test]
    fn prediction_lines_have_six_fields() {
        let mut out = Vec::new();
        write_predictions(&set(), &mut out, |_, d| Ok(d.len() as f32 * 0.5)).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "Q0\tQ0\tD0-1\t99\t1\tSTANDARD");
        assert!(lines.iter().all(|l| l.split('\t').count() == 6));
    }

    #[test]
    fn score_errors_stop_the_writer() {
        let mut out = Vec::new();
        let err = write_predictions(&set(), &mut out, |_, _| Err(PipelineError::data("boom"))).unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn saves_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let qrels = dir.path().join("qrels");
        let pred = dir.path().join("pred");
        save_qrels(&set(), &qrels).unwrap();
        save_predictions(&set(), &pred, |_, _| Ok(0.25)).unwrap();
        assert_eq!(std::fs::read_to_string(&qrels).unwrap().lines().count(), 3);
        assert!(std::fs::read_to_string(&pred).unwrap().contains("Q1\tQ0\tD1-0\t99\t0.25\tSTANDARD"));
    }
}
