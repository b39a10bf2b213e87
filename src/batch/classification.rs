use crate::{data::PairSet, error::{PipelineError, Result}, lexicon::Lexicon};

/// Indexed sentence pairs with one-hot class targets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassBatch {
    pub queries: Vec<Vec<usize>>,
    pub docs: Vec<Vec<usize>>,
    /// `targets[i][c] == 1.0` iff pair `i` has class `c`
    pub targets: Vec<Vec<f32>>,
}

impl ClassBatch {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// One-hot encoding of `label` over `num_classes` columns.
pub fn one_hot(label: usize, num_classes: usize) -> Vec<f32> {
    let mut row = vec![0.0; num_classes];
    if let Some(slot) = row.get_mut(label) {
        *slot = 1.0;
    }
    row
}

/// Infinite batches over a pair set for classification and inference training.
///
/// Every batch holds exactly `batch_size` pairs; the cursor wraps to the first pair
/// after the last one, so a batch may straddle two passes.
pub struct ClassificationBatches<'a> {
    lexicon: &'a Lexicon,
    set: &'a PairSet,
    batch_size: usize,
    num_classes: usize,
    cursor: usize,
}

impl<'a> ClassificationBatches<'a> {
    /// # Errors
    /// * `Configuration` - `batch_size` is 0
    /// * `Data` - a label does not fit in `num_classes`
    pub fn new(lexicon: &'a Lexicon, set: &'a PairSet, batch_size: usize, num_classes: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(PipelineError::config("batch_size must be greater than 0"));
        }
        set.check_labels(num_classes)?;
        Ok(Self {
            lexicon,
            set,
            batch_size,
            num_classes,
            cursor: 0,
        })
    }
}

impl<'a> Iterator for ClassificationBatches<'a> {
    type Item = ClassBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.set.is_empty() {
            return None;
        }
        let mut batch = ClassBatch {
            queries: Vec::with_capacity(self.batch_size),
            docs: Vec::with_capacity(self.batch_size),
            targets: Vec::with_capacity(self.batch_size),
        };
        for _ in 0..self.batch_size {
            let pair = &self.set.pairs[self.cursor];
            batch.queries.push(self.lexicon.make_indexed(&pair.left));
            batch.docs.push(self.lexicon.make_indexed(&pair.right));
            batch.targets.push(one_hot(pair.label, self.num_classes));
            self.cursor = (self.cursor + 1) % self.set.len();
        }
        Some(batch)
    }
}
