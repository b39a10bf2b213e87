pub mod reader;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Tokenized sentence
pub type Tokens = Vec<String>;

/// Lowercase whitespace tokenizer used by the readers.
pub fn tokenize(text: &str) -> Tokens {
    text.split_whitespace().map(|t| t.to_lowercase()).collect()
}

/// One query with its candidate documents.
///
/// `labels[j]` is the relevance of `docs[j]`: `0` is irrelevant, anything above is relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryGroup {
    pub query_id: String,
    pub query: Tokens,
    pub doc_ids: Vec<String>,
    pub docs: Vec<Tokens>,
    pub labels: Vec<u8>,
}

impl QueryGroup {
    /// Build a group with generated ids `Q{n}` and `D{n}-{j}`.
    pub fn new(n: usize, query: Tokens, docs: Vec<Tokens>, labels: Vec<u8>) -> Self {
        let doc_ids = (0..docs.len()).map(|j| format!("D{n}-{j}")).collect();
        Self {
            query_id: format!("Q{n}"),
            query,
            doc_ids,
            docs,
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn num_relevant(&self) -> usize {
        self.labels.iter().filter(|&&l| l > 0).count()
    }

    fn validate(&self) -> Result<()> {
        if self.docs.len() != self.labels.len() || self.docs.len() != self.doc_ids.len() {
            return Err(PipelineError::data(format!(
                "query {} has {} docs, {} labels and {} doc ids",
                self.query_id,
                self.docs.len(),
                self.labels.len(),
                self.doc_ids.len()
            )));
        }
        Ok(())
    }
}

/// Flattened view of a ranking set, one entry per (query, document) pair.
#[derive(Debug, Clone, Default)]
pub struct FlatPairs<'a> {
    pub queries: Vec<&'a [String]>,
    pub docs: Vec<&'a [String]>,
    pub labels: Vec<u8>,
    /// candidate count of each query, in query order
    pub doc_lens: Vec<usize>,
}

/// Queries with candidate groups for ranking.
///
/// Deserializing runs the same checks as [`RankingSet::new`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedRankingSet")]
pub struct RankingSet {
    pub groups: Vec<QueryGroup>,
}

#[derive(Deserialize)]
struct UncheckedRankingSet {
    groups: Vec<QueryGroup>,
}

impl TryFrom<UncheckedRankingSet> for RankingSet {
    type Error = PipelineError;

    fn try_from(raw: UncheckedRankingSet) -> Result<Self> {
        Self::new(raw.groups)
    }
}

impl RankingSet {
    /// Checked constructor. Every group must have as many labels and ids as documents.
    pub fn new(groups: Vec<QueryGroup>) -> Result<Self> {
        let set = Self { groups };
        set.validate()?;
        Ok(set)
    }

    /// Fails on the first group whose docs, labels and ids differ in length.
    ///
    /// Hand-built sets skip `new`; indexing code calls this first.
    pub fn validate(&self) -> Result<()> {
        self.groups.iter().try_for_each(QueryGroup::validate)
    }

    /// Build from parallel lists, generating ids.
    ///
    /// # Arguments
    /// * `queries` - one token list per query
    /// * `docs` - candidate documents per query
    /// * `labels` - relevance per candidate
    pub fn from_parallel(queries: Vec<Tokens>, docs: Vec<Vec<Tokens>>, labels: Vec<Vec<u8>>) -> Result<Self> {
        if queries.len() != docs.len() || queries.len() != labels.len() {
            return Err(PipelineError::data(format!(
                "{} queries, {} doc groups and {} label groups",
                queries.len(),
                docs.len(),
                labels.len()
            )));
        }
        let groups = queries
            .into_iter()
            .zip(docs)
            .zip(labels)
            .enumerate()
            .map(|(n, ((q, d), l))| QueryGroup::new(n, q, d, l))
            .collect();
        Self::new(groups)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of (query, document) pairs
    pub fn num_pairs(&self) -> usize {
        self.groups.iter().map(QueryGroup::len).sum()
    }

    /// Every sentence in scan order: each query followed by its candidates.
    pub fn sentences(&self) -> impl Iterator<Item = &[String]> {
        self.groups.iter().flat_map(|g| {
            std::iter::once(g.query.as_slice()).chain(g.docs.iter().map(Vec::as_slice))
        })
    }

    /// Repeat each query once per candidate so the pairs can be scored in one batch.
    pub fn flatten(&self) -> Result<FlatPairs<'_>> {
        self.validate()?;
        let n = self.num_pairs();
        let mut flat = FlatPairs {
            queries: Vec::with_capacity(n),
            docs: Vec::with_capacity(n),
            labels: Vec::with_capacity(n),
            doc_lens: Vec::with_capacity(self.groups.len()),
        };
        for group in &self.groups {
            for (doc, &label) in group.docs.iter().zip(&group.labels) {
                flat.queries.push(&group.query);
                flat.docs.push(doc);
                flat.labels.push(label);
            }
            flat.doc_lens.push(group.len());
        }
        Ok(flat)
    }
}

/// Sentence pair with a class label, used by classification and inference modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPair {
    pub left: Tokens,
    pub right: Tokens,
    pub label: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairSet {
    pub pairs: Vec<LabeledPair>,
}

impl PairSet {
    pub fn new(pairs: Vec<LabeledPair>) -> Self {
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn sentences(&self) -> impl Iterator<Item = &[String]> {
        self.pairs
            .iter()
            .flat_map(|p| [p.left.as_slice(), p.right.as_slice()])
    }

    /// Fails when a label does not fit in `num_classes` one-hot columns.
    pub fn check_labels(&self, num_classes: usize) -> Result<()> {
        if let Some((i, p)) = self.pairs.iter().enumerate().find(|(_, p)| p.label >= num_classes) {
            return Err(PipelineError::data(format!(
                "pair {i} has label {} but only {num_classes} classes are configured",
                p.label
            )));
        }
        Ok(())
    }
}

/// Training input for any target mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainingData {
    Ranking(RankingSet),
    Pairs(PairSet),
}

impl TrainingData {
    pub fn is_empty(&self) -> bool {
        match self {
            TrainingData::Ranking(set) => set.is_empty(),
            TrainingData::Pairs(set) => set.is_empty(),
        }
    }

    pub fn sentences(&self) -> Box<dyn Iterator<Item = &[String]> + '_> {
        match self {
            TrainingData::Ranking(set) => Box::new(set.sentences()),
            TrainingData::Pairs(set) => Box::new(set.sentences()),
        }
    }
}
