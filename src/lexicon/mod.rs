pub mod builder;

use indexmap::IndexSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{PipelineError, Result},
    utils::math::dense,
};

pub use builder::LexiconBuilder;

/// Placeholder returned by `decode` for the unknown-word index
pub const UNK_TOKEN: &str = "<unk>";

/// Token to index mapping.
///
/// Index of a token == its insertion position, so indices follow first-seen order.
/// The two reserved indices sit after all stored tokens: `pad_index == len()` and
/// `unk_index == len() + 1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    words: IndexSet<String>,
    /// tokens that came from the training corpus; the rest came from the embedding source
    corpus_size: usize,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token if unseen. Returns its index.
    pub fn insert(&mut self, token: &str) -> usize {
        if let Some(idx) = self.words.get_index_of(token) {
            return idx;
        }
        self.words.insert_full(token.to_string()).0
    }

    /// Mark every token inserted so far as a corpus token.
    pub(crate) fn seal_corpus(&mut self) {
        self.corpus_size = self.words.len();
    }

    pub fn get(&self, token: &str) -> Option<usize> {
        self.words.get_index_of(token)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    pub fn word_of(&self, index: usize) -> Option<&str> {
        self.words.get_index(index).map(String::as_str)
    }

    /// Stored tokens, reserved indices excluded
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn corpus_size(&self) -> usize {
        self.corpus_size
    }

    /// Tokens appended from the embedding source
    pub fn extra_size(&self) -> usize {
        self.words.len().saturating_sub(self.corpus_size)
    }

    #[inline]
    pub fn pad_index(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn unk_index(&self) -> usize {
        self.words.len() + 1
    }

    /// Rows the embedding matrix must hold, reserved rows included
    pub fn table_size(&self) -> usize {
        self.words.len() + 2
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.words.iter().enumerate().map(|(i, w)| (i, w.as_str()))
    }
}

/// Dense row-major matrix aligned row-for-row with a vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn with_capacity(rows: usize, dim: usize) -> Self {
        Self {
            dim,
            data: Vec::with_capacity(rows * dim),
        }
    }

    pub fn push_row(&mut self, row: &[f32]) {
        debug_assert_eq!(row.len(), self.dim, "row length must equal the matrix dimension");
        self.data.extend_from_slice(row);
    }

    pub fn push_zero_row(&mut self) {
        self.data.resize(self.data.len() + self.dim, 0.0);
    }

    pub fn rows(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// (rows, dim)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.dim)
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// Raw row-major buffer, e.g. to initialize an embedding layer
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// L2-normalize every row in place. All-zero rows stay zero.
    pub fn normalize_rows(&mut self) {
        if self.dim == 0 {
            return;
        }
        self.data
            .par_chunks_mut(self.dim)
            .for_each(|row| dense::l2_normalize(row));
    }
}

/// Frozen vocabulary and embedding matrix, plus the padding length.
///
/// Built once per session by [`LexiconBuilder`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    pub vocab: Vocabulary,
    pub matrix: EmbeddingMatrix,
    pub text_maxlen: usize,
}

impl Lexicon {
    /// Check that the matrix holds one full row per vocabulary index and that the
    /// corpus count fits the vocabulary.
    ///
    /// # Errors
    /// * Data - a lexicon assembled or deserialized out of shape
    pub fn check_shape(&self) -> Result<()> {
        if self.vocab.corpus_size() > self.vocab.len() {
            return Err(PipelineError::data(format!(
                "vocabulary claims {} corpus tokens but stores {}",
                self.vocab.corpus_size(),
                self.vocab.len()
            )));
        }
        let rows = self.vocab.table_size();
        if self.matrix.dim() == 0 || self.matrix.as_slice().len() != rows * self.matrix.dim() {
            return Err(PipelineError::data(format!(
                "embedding matrix holds {} values of dimension {}, vocabulary needs {} rows",
                self.matrix.as_slice().len(),
                self.matrix.dim(),
                rows
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn pad_index(&self) -> usize {
        self.vocab.pad_index()
    }

    #[inline]
    pub fn unk_index(&self) -> usize {
        self.vocab.unk_index()
    }

    /// Index of `token`, `unk_index` when unknown
    #[inline]
    pub fn index_of(&self, token: &str) -> usize {
        self.vocab.get(token).unwrap_or_else(|| self.vocab.unk_index())
    }

    /// Map a sentence to exactly `text_maxlen` indices.
    ///
    /// Unknown tokens map to `unk_index`. Longer sentences are cut from the right,
    /// with a warning. Shorter ones are right-padded with `pad_index`.
    pub fn make_indexed<S: AsRef<str>>(&self, sentence: &[S]) -> Vec<usize> {
        if sentence.len() > self.text_maxlen {
            warn!(
                "text_maxlen {} is too small for a sentence of length {}, truncating",
                self.text_maxlen,
                sentence.len()
            );
        }
        let mut indexed: Vec<usize> = sentence
            .iter()
            .take(self.text_maxlen)
            .map(|w| self.index_of(w.as_ref()))
            .collect();
        indexed.resize(self.text_maxlen, self.pad_index());
        indexed
    }

    /// Index many sentences at once.
    pub fn translate<S>(&self, sentences: &[S]) -> Vec<Vec<usize>>
    where
        S: AsRef<[String]> + Sync,
    {
        let translated: Vec<Vec<usize>> = sentences
            .par_iter()
            .map(|s| self.make_indexed(s.as_ref()))
            .collect();
        let unk = self.unk_index();
        let n_unknown: usize = translated
            .iter()
            .map(|s| s.iter().filter(|&&i| i == unk).count())
            .sum();
        debug!("Found {} unknown words, set to unknown word index {}", n_unknown, unk);
        translated
    }

    /// Tokens for an indexed sentence, padding dropped.
    pub fn decode(&self, indexed: &[usize]) -> Vec<&str> {
        let pad = self.pad_index();
        indexed
            .iter()
            .filter(|&&i| i != pad)
            .map(|&i| self.vocab.word_of(i).unwrap_or(UNK_TOKEN))
            .collect()
    }

    /// Embedding row of `index`
    pub fn vector(&self, index: usize) -> Option<&[f32]> {
        self.matrix.row(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::toks;
    use proptest::prelude::*;

    /// vocabulary {"a":0, "b":1}, pad 2, unk 3
    fn small(text_maxlen: usize) -> Lexicon {
        let mut vocab = Vocabulary::new();
        vocab.insert("a");
        vocab.insert("b");
        vocab.seal_corpus();
        let mut matrix = EmbeddingMatrix::with_capacity(4, 2);
        for _ in 0..vocab.table_size() {
            matrix.push_zero_row();
        }
        Lexicon { vocab, matrix, text_maxlen }
    }

    #[test]
    fn indexes_pads_and_falls_back_to_unk() {
        let lex = small(4);
        assert_eq!(lex.pad_index(), 2);
        assert_eq!(lex.unk_index(), 3);
        assert_eq!(lex.make_indexed(&toks("a c b")), vec![0, 3, 1, 2]);
    }

    #[test]
    fn truncates_from_the_right() {
        let lex = small(2);
        assert_eq!(lex.make_indexed(&toks("b a a b")), vec![1, 0]);
        assert_eq!(lex.make_indexed::<&str>(&[]), vec![2, 2]);
    }

    #[test]
    fn insert_is_first_seen() {
        let mut vocab = Vocabulary::new();
        assert_eq!(vocab.insert("x"), 0);
        assert_eq!(vocab.insert("y"), 1);
        assert_eq!(vocab.insert("x"), 0);
        assert_eq!(vocab.word_of(1), Some("y"));
        assert_eq!(vocab.word_of(2), None);
    }

    #[test]
    fn translate_matches_make_indexed() {
        let lex = small(3);
        let sentences = vec![toks("a"), toks("b b b b"), toks("z")];
        let out = lex.translate(&sentences);
        assert_eq!(out, vec![vec![0, 2, 2], vec![1, 1, 1], vec![3, 2, 2]]);
    }

    #[test]
    fn decode_drops_padding() {
        let lex = small(5);
        let indexed = lex.make_indexed(&toks("b a q"));
        assert_eq!(lex.decode(&indexed), vec!["b", "a", UNK_TOKEN]);
    }

    #[test]
    fn out_of_shape_lexicons_fail_the_check() {
        assert!(small(3).check_shape().is_ok());

        let mut short = small(3);
        short.matrix = EmbeddingMatrix::with_capacity(3, 2);
        for _ in 0..3 {
            short.matrix.push_zero_row();
        }
        assert!(matches!(short.check_shape(), Err(PipelineError::Data(_))));

        let overcounted = Lexicon {
            vocab: Vocabulary {
                words: IndexSet::new(),
                corpus_size: 3,
            },
            matrix: EmbeddingMatrix::with_capacity(2, 2),
            text_maxlen: 3,
        };
        assert_eq!(overcounted.vocab.extra_size(), 0);
        assert!(matches!(overcounted.check_shape(), Err(PipelineError::Data(_))));
    }

    #[test]
    fn matrix_rows_and_normalization() {
        let mut m = EmbeddingMatrix::with_capacity(2, 2);
        m.push_row(&[3.0, 4.0]);
        m.push_zero_row();
        m.normalize_rows();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m.row(0), Some(&[0.6f32, 0.8][..]));
        assert_eq!(m.row(1), Some(&[0.0f32, 0.0][..]));
        assert_eq!(m.row(2), None);
    }

    proptest! {
        #[test]
        fn output_length_is_always_maxlen(
            words in proptest::collection::vec(prop_oneof![Just("a"), Just("b"), Just("zz")], 0..20),
            maxlen in 1usize..12,
        ) {
            let lex = small(maxlen);
            let out = lex.make_indexed(&words);
            prop_assert_eq!(out.len(), maxlen);
            let kept = words.len().min(maxlen);
            for (i, w) in words.iter().take(kept).enumerate() {
                prop_assert_eq!(out[i], lex.index_of(w));
            }
            prop_assert!(out[kept..].iter().all(|&i| i == lex.pad_index()));
        }

        #[test]
        fn decode_round_trips_known_words(
            words in proptest::collection::vec(prop_oneof![Just("a"), Just("b")], 0..8),
        ) {
            let lex = small(8);
            let out = lex.make_indexed(&words);
            prop_assert_eq!(lex.decode(&out), words);
        }
    }
}
