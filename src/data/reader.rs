use std::{fs::File, io::{BufRead, BufReader}, path::Path};

use tracing::info;

use crate::{data::{tokenize, QueryGroup, RankingSet}, error::{PipelineError, Result}};

const WIKIQA_COLUMNS: usize = 7;

/// Read a WikiQA TSV file.
///
/// Columns: `QuestionID Question DocumentID DocumentTitle SentenceID Sentence Label`.
/// The first line is a header. Consecutive rows sharing a `QuestionID` form one
/// query group and `SentenceID` becomes the document id.
pub fn read_wikiqa<R: BufRead>(reader: R) -> Result<RankingSet> {
    let mut groups: Vec<QueryGroup> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line_no == 0 || line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() != WIKIQA_COLUMNS {
            return Err(PipelineError::data(format!(
                "line {}: expected {} tab-separated columns, found {}",
                line_no + 1,
                WIKIQA_COLUMNS,
                cols.len()
            )));
        }
        let label: u8 = cols[6].trim().parse().map_err(|_| {
            PipelineError::data(format!("line {}: invalid label {:?}", line_no + 1, cols[6]))
        })?;

        let question_id = cols[0];
        let same_query = groups.last().is_some_and(|g| g.query_id == question_id);
        if !same_query {
            groups.push(QueryGroup {
                query_id: question_id.to_string(),
                query: tokenize(cols[1]),
                doc_ids: Vec::new(),
                docs: Vec::new(),
                labels: Vec::new(),
            });
        }
        // the group was pushed above when missing
        if let Some(group) = groups.last_mut() {
            group.doc_ids.push(cols[4].to_string());
            group.docs.push(tokenize(cols[5]));
            group.labels.push(label);
        }
    }

    let set = RankingSet::new(groups)?;
    info!("Read {} queries with {} candidate documents", set.len(), set.num_pairs());
    Ok(set)
}

pub fn read_wikiqa_file(path: &Path) -> Result<RankingSet> {
    let file = File::open(path)?;
    read_wikiqa(BufReader::new(file))
}
