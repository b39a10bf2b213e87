use rand::{Rng, SeedableRng};
use rand_chacha::{ChaCha8Rng, ChaCha20Rng};
use sha2::{Digest, Sha256};

/// Half-width of the uniform range used for pad and unk rows.
pub const RESERVED_ROW_SCALE: f32 = 0.2;

/// Numeric seed of a string: first four bytes of its SHA-256 digest, big endian.
///
/// Independent of process, platform and run, unlike the std hasher.
pub fn string_seed(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as u64
}

/// Deterministic pseudo-random vector for `token`.
///
/// Components lie in `[-0.5 / dim, 0.5 / dim)`. The same token always yields the
/// same vector.
pub fn seeded_vector(token: &str, dim: usize) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(string_seed(token));
    let scale = dim.max(1) as f32;
    (0..dim).map(|_| (rng.gen::<f32>() - 0.5) / scale).collect()
}

/// Generator for the pad and unk rows, seeded from the pipeline config.
pub struct ReservedRows {
    rng: ChaCha20Rng,
}

impl ReservedRows {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Uniform row in `[-RESERVED_ROW_SCALE, RESERVED_ROW_SCALE)`.
    pub fn uniform_row(&mut self, dim: usize) -> Vec<f32> {
        (0..dim)
            .map(|_| self.rng.gen_range(-RESERVED_ROW_SCALE..RESERVED_ROW_SCALE))
            .collect()
    }
}
