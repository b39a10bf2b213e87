pub mod oov;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Pretrained word vectors keyed by token.
///
/// The pipeline never loads embedding files itself; an implementation is handed
/// in already populated.
pub trait EmbeddingSource {
    /// Vector dimensionality. A source reporting 0 is not usable.
    fn dim(&self) -> usize;
    /// Number of tokens in the source
    fn len(&self) -> usize;
    fn contains(&self, token: &str) -> bool;
    fn vector(&self, token: &str) -> Option<&[f32]>;
    /// All tokens in the source's own order
    fn tokens(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory embedding source.
/// Tokens keep their insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyedVectors {
    dim: usize,
    #[serde(with = "indexmap::map::serde_seq")]
    vectors: IndexMap<String, Vec<f32>>,
}

impl KeyedVectors {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: IndexMap::new(),
        }
    }

    /// Insert or replace the vector of `token`.
    ///
    /// # Arguments
    /// * `token` - word
    /// * `vector` - must have exactly `dim` components
    pub fn insert(&mut self, token: impl Into<String>, vector: Vec<f32>) -> Result<&mut Self> {
        if vector.len() != self.dim {
            return Err(PipelineError::config(format!(
                "embedding vector has {} components, source dimensionality is {}",
                vector.len(),
                self.dim
            )));
        }
        self.vectors.insert(token.into(), vector);
        Ok(self)
    }

    pub fn from_pairs<I, S>(dim: usize, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        let mut kv = Self::new(dim);
        for (token, vector) in pairs {
            kv.insert(token, vector)?;
        }
        Ok(kv)
    }
}

impl EmbeddingSource for KeyedVectors {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn contains(&self, token: &str) -> bool {
        self.vectors.contains_key(token)
    }

    fn vector(&self, token: &str) -> Option<&[f32]> {
        self.vectors.get(token).map(Vec::as_slice)
    }

    fn tokens(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.vectors.keys().map(String::as_str))
    }
}
