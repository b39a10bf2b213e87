use crate::{data::{QueryGroup, RankingSet}, error::Result};

/// One pairwise training example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triple<'a> {
    pub query_index: usize,
    pub query: &'a [String],
    pub positive: &'a [String],
    pub negative: &'a [String],
}

/// Candidate positions of one query split by label, relevant first.
#[derive(Debug, Clone, Default)]
struct Grouping {
    positives: Vec<usize>,
    negatives: Vec<usize>,
}

impl Grouping {
    /// Stable sort by label descending, then split at the first irrelevant label.
    fn of(group: &QueryGroup) -> Self {
        let mut order: Vec<usize> = (0..group.labels.len()).collect();
        order.sort_by(|&a, &b| group.labels[b].cmp(&group.labels[a]));
        let split = order.partition_point(|&j| group.labels[j] > 0);
        let negatives = order.split_off(split);
        Self {
            positives: order,
            negatives,
        }
    }

    fn count(&self) -> usize {
        self.positives.len() * self.negatives.len()
    }
}

/// Infinite, restartable sequence of (query, relevant doc, irrelevant doc) triples.
///
/// Every relevant candidate of a query is paired with every irrelevant candidate of
/// the same query, in grouped order. After the last query the sequence starts over
/// from the first. Queries with no relevant or no irrelevant candidate contribute
/// nothing. A corpus contributing nothing at all ends the iterator at once.
///
/// # Examples
/// ```
/// use simlearn::{data::RankingSet, pairs::PairGenerator};
/// let t = |s: &str| s.split(' ').map(String::from).collect::<Vec<_>>();
/// let set = RankingSet::from_parallel(
///     vec![t("q")],
///     vec![vec![t("d1"), t("d2"), t("d3")]],
///     vec![vec![1, 0, 0]],
/// ).unwrap();
/// let gen = PairGenerator::new(&set).unwrap();
/// assert_eq!(gen.pairs_per_pass(), 2);
/// let firsts: Vec<_> = gen.take(2).map(|t| t.negative[0].clone()).collect();
/// assert_eq!(firsts, vec!["d2", "d3"]);
/// ```
#[derive(Debug, Clone)]
pub struct PairGenerator<'a> {
    set: &'a RankingSet,
    groupings: Vec<Grouping>,
    pairs_per_pass: usize,
    query: usize,
    pos: usize,
    neg: usize,
    passes: usize,
}

impl<'a> PairGenerator<'a> {
    /// # Errors
    /// * `Data` - a group whose docs, labels and ids differ in length
    pub fn new(set: &'a RankingSet) -> Result<Self> {
        set.validate()?;
        let groupings: Vec<Grouping> = set.groups.iter().map(Grouping::of).collect();
        let pairs_per_pass = groupings.iter().map(Grouping::count).sum();
        Ok(Self {
            set,
            groupings,
            pairs_per_pass,
            query: 0,
            pos: 0,
            neg: 0,
            passes: 0,
        })
    }

    /// Triples produced by one full pass over the corpus (sum of R x I).
    pub fn pairs_per_pass(&self) -> usize {
        self.pairs_per_pass
    }

    /// Number of times the sequence has wrapped around.
    pub fn passes_completed(&self) -> usize {
        self.passes
    }

    /// Go back to the first triple of the first query.
    pub fn restart(&mut self) {
        self.query = 0;
        self.pos = 0;
        self.neg = 0;
        self.passes = 0;
    }

    /// Move the cursor to the next query, wrapping to the start.
    fn advance_query(&mut self) {
        self.pos = 0;
        self.neg = 0;
        self.query += 1;
        if self.query == self.groupings.len() {
            self.query = 0;
            self.passes += 1;
        }
    }
}

impl<'a> Iterator for PairGenerator<'a> {
    type Item = Triple<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pairs_per_pass == 0 {
            return None;
        }
        // terminates: at least one query has a non-empty cross product
        loop {
            let grouping = &self.groupings[self.query];
            if self.pos >= grouping.positives.len() || grouping.negatives.is_empty() {
                self.advance_query();
                continue;
            }
            let set: &'a RankingSet = self.set;
            let group = &set.groups[self.query];
            let triple = Triple {
                query_index: self.query,
                query: &group.query,
                positive: &group.docs[grouping.positives[self.pos]],
                negative: &group.docs[grouping.negatives[self.neg]],
            };
            self.neg += 1;
            if self.neg == grouping.negatives.len() {
                self.neg = 0;
                self.pos += 1;
            }
            return Some(triple);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.pairs_per_pass == 0 {
            (0, Some(0))
        } else {
            (usize::MAX, None)
        }
    }
}
