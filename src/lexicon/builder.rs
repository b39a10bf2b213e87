use tracing::info;

use crate::{
    config::{PipelineConfig, UnkHandling},
    embedding::{oov::{seeded_vector, ReservedRows}, EmbeddingSource},
    error::{PipelineError, Result},
    lexicon::{EmbeddingMatrix, Lexicon, Vocabulary},
};

/// Builds a [`Lexicon`] from a training corpus and a pretrained embedding source.
///
/// Row layout of the resulting matrix:
/// 1. corpus tokens in first-seen order (pretrained vector, or the OOV policy)
/// 2. source tokens absent from the corpus, in source order
/// 3. the pad row
/// 4. the unk row
#[derive(Debug, Clone)]
pub struct LexiconBuilder {
    pub text_maxlen: usize,
    pub unk_handling: UnkHandling,
    pub normalize: bool,
    pub seed: u64,
}

impl LexiconBuilder {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            text_maxlen: config.text_maxlen,
            unk_handling: config.unk_handle_method,
            normalize: config.normalize_embeddings,
            seed: config.seed,
        }
    }

    /// Scan `sentences` and assemble the vocabulary and embedding matrix.
    ///
    /// # Arguments
    /// * `sentences` - every query and document of the training corpus
    /// * `source` - pretrained vectors; required
    ///
    /// # Errors
    /// * `Configuration` - no source, a source of dimensionality 0, or a vector of the wrong length
    /// * `Data` - the corpus holds no tokens
    pub fn build<'a, I>(&self, sentences: I, source: Option<&dyn EmbeddingSource>) -> Result<Lexicon>
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let source = source.ok_or_else(|| {
            PipelineError::config("no word embedding source given, a pretrained embedding source is required")
        })?;
        let dim = source.dim();
        if dim == 0 {
            return Err(PipelineError::config(
                "unrecognized word embedding source: it reports 0 dimensions",
            ));
        }

        info!("Starting vocab build");
        let mut vocab = Vocabulary::new();
        for sentence in sentences {
            for word in sentence {
                vocab.insert(word);
            }
        }
        if vocab.is_empty() {
            return Err(PipelineError::data("the training corpus contains no tokens"));
        }
        vocab.seal_corpus();
        let vocab_size = vocab.len();
        info!("Vocab build complete, vocab size is {}", vocab_size);
        info!(
            "The embedding source has {} words of {} dimensions",
            source.len(),
            dim
        );

        let mut matrix = EmbeddingMatrix::with_capacity(vocab_size + source.len() + 2, dim);
        let mut n_missing = 0usize;
        for (_, word) in vocab.iter() {
            match source.vector(word) {
                Some(vector) => {
                    check_dim(word, vector, dim)?;
                    matrix.push_row(vector);
                }
                None => {
                    n_missing += 1;
                    match self.unk_handling {
                        UnkHandling::Random => matrix.push_row(&seeded_vector(word, dim)),
                        UnkHandling::Zero => matrix.push_zero_row(),
                    }
                }
            }
        }
        info!(
            "There are {} words out of {} ({:.2}%) not in the embeddings, setting them to {}",
            n_missing,
            vocab_size,
            n_missing as f64 * 100.0 / vocab_size as f64,
            self.unk_handling
        );

        info!("Adding additional words from the embedding source to the embedding matrix");
        for word in source.tokens() {
            if vocab.contains(word) {
                continue;
            }
            let vector = source.vector(word).ok_or_else(|| {
                PipelineError::config(format!("embedding source lists {word:?} but has no vector for it"))
            })?;
            check_dim(word, vector, dim)?;
            vocab.insert(word);
            matrix.push_row(vector);
        }

        let mut reserved = ReservedRows::new(self.seed);
        matrix.push_row(&reserved.uniform_row(dim));
        match self.unk_handling {
            UnkHandling::Random => matrix.push_row(&reserved.uniform_row(dim)),
            UnkHandling::Zero => matrix.push_zero_row(),
        }
        debug_assert_eq!(matrix.rows(), vocab.table_size());

        if self.normalize {
            info!("Normalizing the word embeddings");
            matrix.normalize_rows();
        }

        info!("Embedding matrix build complete, shape {:?}", matrix.shape());
        info!("Pad word has been set to index {}", vocab.pad_index());
        info!("Unknown word has been set to index {}", vocab.unk_index());

        Ok(Lexicon {
            vocab,
            matrix,
            text_maxlen: self.text_maxlen,
        })
    }
}

fn check_dim(word: &str, vector: &[f32], dim: usize) -> Result<()> {
    if vector.len() != dim {
        return Err(PipelineError::config(format!(
            "embedding for {word:?} has {} components, the source declares {dim}",
            vector.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::tests::toks, embedding::KeyedVectors, utils::math::dense};

    struct BrokenSource;

    impl EmbeddingSource for BrokenSource {
        fn dim(&self) -> usize {
            0
        }

        fn len(&self) -> usize {
            0
        }

        fn contains(&self, _token: &str) -> bool {
            false
        }

        fn vector(&self, _token: &str) -> Option<&[f32]> {
            None
        }

        fn tokens(&self) -> Box<dyn Iterator<Item = &str> + '_> {
            Box::new(std::iter::empty())
        }
    }

    /// declares 3 dimensions, stores `token`'s vector with 2
    struct ShortVectorSource {
        token: &'static str,
        vector: Vec<f32>,
    }

    impl ShortVectorSource {
        fn new(token: &'static str) -> Self {
            Self {
                token,
                vector: vec![1.0, 0.0],
            }
        }
    }

    impl EmbeddingSource for ShortVectorSource {
        fn dim(&self) -> usize {
            3
        }

        fn len(&self) -> usize {
            1
        }

        fn contains(&self, token: &str) -> bool {
            token == self.token
        }

        fn vector(&self, token: &str) -> Option<&[f32]> {
            (token == self.token).then_some(self.vector.as_slice())
        }

        fn tokens(&self) -> Box<dyn Iterator<Item = &str> + '_> {
            Box::new(std::iter::once(self.token))
        }
    }

    fn builder(unk: UnkHandling, normalize: bool) -> LexiconBuilder {
        LexiconBuilder {
            text_maxlen: 6,
            unk_handling: unk,
            normalize,
            seed: 42,
        }
    }

    fn source() -> KeyedVectors {
        KeyedVectors::from_pairs(
            3,
            [
                ("war", vec![1.0, 0.0, 0.0]),
                ("peace", vec![0.0, 2.0, 0.0]),
                ("was", vec![0.0, 0.0, 3.0]),
                ("gandhi", vec![1.0, 1.0, 0.0]),
            ],
        )
        .unwrap()
    }

    fn corpus() -> Vec<Vec<String>> {
        vec![toks("when was war"), toks("war was bad"), toks("xyzzy")]
    }

    #[test]
    fn layout_and_reserved_indices() {
        let corpus = corpus();
        let kv = source();
        let lex = builder(UnkHandling::Zero, false)
            .build(corpus.iter().map(Vec::as_slice), Some(&kv))
            .unwrap();

        // corpus tokens first-seen: when was war bad xyzzy
        assert_eq!(lex.vocab.corpus_size(), 5);
        assert_eq!(lex.vocab.get("when"), Some(0));
        assert_eq!(lex.vocab.get("xyzzy"), Some(4));
        // then source-only tokens in source order
        assert_eq!(lex.vocab.get("peace"), Some(5));
        assert_eq!(lex.vocab.get("gandhi"), Some(6));
        assert_eq!(lex.vocab.extra_size(), 2);
        assert_eq!(lex.pad_index(), 7);
        assert_eq!(lex.unk_index(), 8);
        assert_eq!(lex.matrix.shape(), (5 + 2 + 2, 3));

        assert_eq!(lex.vector(2), Some(&[1.0f32, 0.0, 0.0][..]));
        assert_eq!(lex.vector(0), Some(&[0.0f32, 0.0, 0.0][..]));
        assert_eq!(lex.vector(5), Some(&[0.0f32, 2.0, 0.0][..]));
        assert_eq!(lex.vector(8), Some(&[0.0f32, 0.0, 0.0][..]));
        assert!(lex.vector(7).unwrap().iter().any(|&x| x != 0.0));
    }

    #[test]
    fn random_policy_is_deterministic_per_token() {
        let corpus = corpus();
        let kv = source();
        let a = builder(UnkHandling::Random, false)
            .build(corpus.iter().map(Vec::as_slice), Some(&kv))
            .unwrap();
        let other_corpus = vec![toks("xyzzy gandhi")];
        let b = builder(UnkHandling::Random, false)
            .build(other_corpus.iter().map(Vec::as_slice), Some(&kv))
            .unwrap();

        let ia = a.vocab.get("xyzzy").unwrap();
        let ib = b.vocab.get("xyzzy").unwrap();
        assert_ne!(ia, ib);
        assert_eq!(a.vector(ia), b.vector(ib));
        assert_eq!(a.vector(ia).unwrap(), seeded_vector("xyzzy", 3).as_slice());
        assert!(a.vector(a.unk_index()).unwrap().iter().any(|&x| x != 0.0));
    }

    #[test]
    fn normalization_gives_unit_rows() {
        let corpus = corpus();
        let kv = source();
        let lex = builder(UnkHandling::Random, true)
            .build(corpus.iter().map(Vec::as_slice), Some(&kv))
            .unwrap();
        for i in 0..lex.matrix.rows() {
            let n = dense::norm_sq(lex.vector(i).unwrap()).sqrt();
            assert!((n - 1.0).abs() < 1e-5, "row {i} has norm {n}");
        }
    }

    #[test]
    fn zero_rows_survive_normalization() {
        let corpus = corpus();
        let kv = source();
        let lex = builder(UnkHandling::Zero, true)
            .build(corpus.iter().map(Vec::as_slice), Some(&kv))
            .unwrap();
        assert_eq!(lex.vector(lex.unk_index()), Some(&[0.0f32; 3][..]));
    }

    #[test]
    fn configuration_failures() {
        let corpus = corpus();
        let err = builder(UnkHandling::Zero, false)
            .build(corpus.iter().map(Vec::as_slice), None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));

        let err = builder(UnkHandling::Zero, false)
            .build(corpus.iter().map(Vec::as_slice), Some(&BrokenSource))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn wrong_length_vector_is_a_configuration_error() {
        let corpus = corpus();
        let sentences = || corpus.iter().map(Vec::as_slice);

        // corpus token looked up in the source
        let in_corpus = ShortVectorSource::new("war");
        let err = builder(UnkHandling::Zero, false)
            .build(sentences(), Some(&in_corpus))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));

        // extra token appended from the source
        let extra = ShortVectorSource::new("peace");
        let err = builder(UnkHandling::Zero, false)
            .build(sentences(), Some(&extra))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn empty_corpus_is_a_data_error() {
        let kv = source();
        let empty: Vec<Vec<String>> = vec![vec![]];
        let err = builder(UnkHandling::Zero, false)
            .build(empty.iter().map(Vec::as_slice), Some(&kv))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }
}
