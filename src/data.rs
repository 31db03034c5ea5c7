//! Minibatch data, denoising corruption and an in-memory provider.

use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{Result, TrainError};

/// A batch of training examples: row-major `f64` features.
///
/// Each freshly sampled batch carries a distinct `generation` id, so the
/// scheduler's reuse of a batch between refreshes is observable.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    rows: Vec<Vec<f64>>,
    generation: u64,
}

impl Batch {
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        Self { rows, generation: 0 }
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Denoising corruption variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseKind {
    /// Zero out each cell with probability `factor`.
    Mask,
    /// Add gaussian noise with standard deviation `factor`.
    Gauss,
    /// Set each cell to 0 or 1 with probability `factor`.
    SaltPepper,
}

impl NoiseKind {
    pub fn name(self) -> &'static str {
        match self {
            NoiseKind::Mask => "mask",
            NoiseKind::Gauss => "gauss",
            NoiseKind::SaltPepper => "salt&pepper",
        }
    }
}

/// A corruption applied to freshly sampled minibatches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corruption {
    pub kind: NoiseKind,
    pub factor: f64,
}

impl Corruption {
    pub fn new(kind: NoiseKind, factor: f64) -> Self {
        Self { kind, factor }
    }
}

/// Corrupt a batch in place.
pub fn corrupt<R: Rng>(batch: &mut Batch, corruption: Corruption, rng: &mut R) {
    let factor = corruption.factor;

    match corruption.kind {
        NoiseKind::Mask => {
            for row in &mut batch.rows {
                for cell in row {
                    if rng.gen_bool(factor.clamp(0.0, 1.0)) {
                        *cell = 0.0;
                    }
                }
            }
        }
        NoiseKind::Gauss => {
            let Ok(noise) = Normal::new(0.0, factor.max(0.0)) else {
                return;
            };
            for row in &mut batch.rows {
                for cell in row {
                    *cell += noise.sample(rng);
                }
            }
        }
        NoiseKind::SaltPepper => {
            for row in &mut batch.rows {
                for cell in row {
                    if rng.gen_bool(factor.clamp(0.0, 1.0)) {
                        *cell = if rng.gen_bool(0.5) { 1.0 } else { 0.0 };
                    }
                }
            }
        }
    }
}

/// Source of minibatches. The scheduler calls this only when the refresh
/// interval has elapsed and otherwise reuses the previous batch.
pub trait MinibatchProvider {
    /// Sample a batch of `size` rows (`0` means all rows), optionally
    /// corrupted by noise.
    fn sample(&mut self, size: usize, corruption: Option<Corruption>) -> Result<Batch>;
}

/// In-memory dataset sampling rows without replacement.
pub struct MemoryDataset {
    rows: Vec<Vec<f64>>,
    rng: StdRng,
    generation: u64,
}

impl MemoryDataset {
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        Self { rows, rng: StdRng::from_entropy(), generation: 0 }
    }

    /// Deterministic sampling, for reproducible runs.
    pub fn seeded(rows: Vec<Vec<f64>>, seed: u64) -> Self {
        Self { rows, rng: StdRng::seed_from_u64(seed), generation: 0 }
    }
}

impl MinibatchProvider for MemoryDataset {
    fn sample(&mut self, size: usize, corruption: Option<Corruption>) -> Result<Batch> {
        if self.rows.is_empty() {
            return Err(TrainError::Configuration("dataset contains no rows".into()));
        }

        let amount = if size == 0 || size > self.rows.len() { self.rows.len() } else { size };
        let picked = index::sample(&mut self.rng, self.rows.len(), amount);
        let rows = picked.iter().map(|i| self.rows[i].clone()).collect();

        self.generation += 1;
        let mut batch = Batch { rows, generation: self.generation };

        if let Some(corruption) = corruption {
            corrupt(&mut batch, corruption, &mut self.rng);
        }

        Ok(batch)
    }
}
