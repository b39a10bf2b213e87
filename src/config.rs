use std::{fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// How the model is trained and what each prediction row holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    /// Pairwise ranking over query candidate groups. One score per pair.
    #[default]
    Ranking,
    /// Binary classification of sentence pairs (paraphrase detection).
    Classification,
    /// Multi-class relation between two sentences (`num_inferences` classes).
    Inference,
}

impl FromStr for TargetMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ranking" => Ok(TargetMode::Ranking),
            "classification" => Ok(TargetMode::Classification),
            "inference" => Ok(TargetMode::Inference),
            other => Err(PipelineError::config(format!(
                "unknown target_mode {other:?}, expected one of 'ranking', 'classification', 'inference'"
            ))),
        }
    }
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetMode::Ranking => "ranking",
            TargetMode::Classification => "classification",
            TargetMode::Inference => "inference",
        };
        f.write_str(s)
    }
}

/// Vector assigned to words that the embedding source does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnkHandling {
    /// All-zero vector
    Zero,
    /// Pseudo-random vector seeded by a hash of the word
    #[default]
    Random,
}

impl FromStr for UnkHandling {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zero" => Ok(UnkHandling::Zero),
            "random" => Ok(UnkHandling::Random),
            other => Err(PipelineError::config(format!(
                "unknown token handling method {other:?}, expected 'zero' or 'random'"
            ))),
        }
    }
}

impl fmt::Display for UnkHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnkHandling::Zero => f.write_str("zero"),
            UnkHandling::Random => f.write_str("random"),
        }
    }
}

/// Pipeline settings.
///
/// Passed explicitly at construction. The `seed` replaces any process-wide
/// random state: every generator in the pipeline derives from it.
///
/// # Examples
/// ```
/// use simlearn::PipelineConfig;
/// let config = PipelineConfig::from_toml_str("text_maxlen = 50\nunk_handle_method = \"zero\"").unwrap();
/// assert_eq!(config.text_maxlen, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Fixed length of every indexed query or document
    pub text_maxlen: usize,
    /// L2-normalize embedding rows after assembly
    pub normalize_embeddings: bool,
    pub unk_handle_method: UnkHandling,
    pub target_mode: TargetMode,
    /// Number of classes in inference mode
    pub num_inferences: usize,
    /// Top-k pooling width, forwarded to the scorer
    pub topk: usize,
    pub epochs: usize,
    /// Triples per ranking batch, pairs per classification batch
    pub batch_size: usize,
    pub steps_per_epoch: usize,
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text_maxlen: 200,
            normalize_embeddings: true,
            unk_handle_method: UnkHandling::Random,
            target_mode: TargetMode::Ranking,
            num_inferences: 3,
            topk: 50,
            epochs: 10,
            batch_size: 20,
            steps_per_epoch: 20,
            seed: 1234,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)
            .map_err(|e| PipelineError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| PipelineError::config(format!("failed to encode config: {e}")))
    }

    /// Validate numeric settings.
    pub fn validate(&self) -> Result<()> {
        if self.text_maxlen == 0 {
            return Err(PipelineError::config("text_maxlen must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch_size must be greater than 0"));
        }
        if self.target_mode == TargetMode::Inference && self.num_inferences < 2 {
            return Err(PipelineError::config("num_inferences must be at least 2 in inference mode"));
        }
        Ok(())
    }

    /// Width of a prediction row for the configured target mode.
    pub fn num_outputs(&self) -> usize {
        match self.target_mode {
            TargetMode::Ranking => 1,
            TargetMode::Classification => 2,
            TargetMode::Inference => self.num_inferences,
        }
    }
}
