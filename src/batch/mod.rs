pub mod classification;
pub mod export;

use crate::{error::{PipelineError, Result}, lexicon::Lexicon, pairs::Triple};

pub use classification::{ClassBatch, ClassificationBatches};
pub use export::export_full;

/// Indexed ranking examples.
///
/// Row `2i` is (query, relevant doc, label 1) and row `2i + 1` is
/// (query, irrelevant doc, label 0) of the i-th triple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingBatch {
    pub queries: Vec<Vec<usize>>,
    pub docs: Vec<Vec<usize>>,
    pub labels: Vec<u8>,
}

impl RankingBatch {
    pub fn with_capacity(triples: usize) -> Self {
        Self {
            queries: Vec::with_capacity(triples * 2),
            docs: Vec::with_capacity(triples * 2),
            labels: Vec::with_capacity(triples * 2),
        }
    }

    /// Append one triple as a positive row followed by a negative row.
    pub fn push_triple(&mut self, lexicon: &Lexicon, triple: &Triple<'_>) {
        let query = lexicon.make_indexed(triple.query);
        self.queries.push(query.clone());
        self.docs.push(lexicon.make_indexed(triple.positive));
        self.labels.push(1);
        self.queries.push(query);
        self.docs.push(lexicon.make_indexed(triple.negative));
        self.labels.push(0);
    }

    /// Number of rows (twice the triple count)
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_triples(&self) -> usize {
        self.labels.len() / 2
    }
}

/// A batch handed to the scorer's `fit`.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainBatch {
    Ranking(RankingBatch),
    Classes(ClassBatch),
}

impl TrainBatch {
    pub fn len(&self) -> usize {
        match self {
            TrainBatch::Ranking(b) => b.len(),
            TrainBatch::Classes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Groups triples into indexed batches.
///
/// A batch closes after exactly `batch_size` triples have been appended since the
/// previous one. On an infinite source no partial batch is ever produced. With
/// [`BatchEncoder::with_flush_remainder`] a finite source's leftover triples are
/// emitted as a last, shorter batch.
pub struct BatchEncoder<'l, I> {
    lexicon: &'l Lexicon,
    triples: I,
    batch_size: usize,
    flush_remainder: bool,
    exhausted: bool,
}

impl<'l, 'a, I> BatchEncoder<'l, I>
where
    I: Iterator<Item = Triple<'a>>,
{
    pub fn new(lexicon: &'l Lexicon, triples: I, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(PipelineError::config("batch_size must be greater than 0"));
        }
        Ok(Self {
            lexicon,
            triples,
            batch_size,
            flush_remainder: false,
            exhausted: false,
        })
    }

    pub fn with_flush_remainder(mut self) -> Self {
        self.flush_remainder = true;
        self
    }
}

impl<'l, 'a, I> Iterator for BatchEncoder<'l, I>
where
    I: Iterator<Item = Triple<'a>>,
{
    type Item = RankingBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let mut batch = RankingBatch::with_capacity(self.batch_size);
        let mut appended = 0;
        while appended < self.batch_size {
            match self.triples.next() {
                Some(triple) => {
                    batch.push_triple(self.lexicon, &triple);
                    appended += 1;
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        if appended == self.batch_size || (self.flush_remainder && appended > 0) {
            Some(batch)
        } else {
            None
        }
    }
}
