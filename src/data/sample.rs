//! Synthetic dataset generation from a known ground truth.

use nalgebra::{DMatrix, DVector};
use rand::distributions::{Bernoulli, Distribution, Uniform};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Dataset, FeatureDistribution, GroundTruth, feature_name};
use crate::error::SimError;

/// Draws labeled samples `y = truth(x) + ε`, `ε ~ N(0, noise_sd²)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataGenerator {
    truth: GroundTruth,
    features: Vec<FeatureDistribution>,
}

enum Sampler {
    Uniform(Uniform<f64>),
    Bernoulli(Bernoulli),
}

impl Sampler {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::Uniform(u) => u.sample(rng),
            Sampler::Bernoulli(b) => {
                if b.sample(rng) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl DataGenerator {
    pub fn new(truth: GroundTruth, features: Vec<FeatureDistribution>) -> Result<Self, SimError> {
        if features.is_empty() {
            return Err(SimError::invalid("Generator needs at least one feature."));
        }
        for (j, dist) in features.iter().enumerate() {
            match *dist {
                FeatureDistribution::Uniform { low, high } => {
                    if !(low.is_finite() && high.is_finite() && high > low) {
                        return Err(SimError::invalid(format!(
                            "Feature {}: uniform range must be finite with high > low (got {low}..{high}).",
                            feature_name(j)
                        )));
                    }
                }
                FeatureDistribution::Bernoulli { p } => {
                    if !(0.0..=1.0).contains(&p) {
                        return Err(SimError::invalid(format!(
                            "Feature {}: bernoulli p must be in [0, 1] (got {p}).",
                            feature_name(j)
                        )));
                    }
                }
            }
        }
        let needed = truth.required_features();
        if needed > features.len() {
            return Err(SimError::invalid(format!(
                "Ground truth '{truth}' uses {needed} feature(s) but only {} are generated.",
                features.len()
            )));
        }
        if truth.terms.iter().any(|t| !t.coef.is_finite()) {
            return Err(SimError::invalid("Ground truth coefficients must be finite."));
        }
        Ok(Self { truth, features })
    }

    /// `k` features, each uniform on `[0, 1)`.
    pub fn uniform(truth: GroundTruth, k: usize) -> Result<Self, SimError> {
        Self::new(truth, vec![FeatureDistribution::default(); k])
    }

    pub fn truth(&self) -> &GroundTruth {
        &self.truth
    }

    pub fn features(&self) -> &[FeatureDistribution] {
        &self.features
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Generate `n` rows. A seed makes the draw reproducible bit for bit;
    /// without one the generator seeds itself from OS entropy.
    pub fn generate(&self, n: usize, noise_sd: f64, seed: Option<u64>) -> Result<Dataset, SimError> {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        self.generate_with_rng(n, noise_sd, &mut rng)
    }

    /// Generate `n` rows from an explicit RNG.
    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        n: usize,
        noise_sd: f64,
        rng: &mut R,
    ) -> Result<Dataset, SimError> {
        if n == 0 {
            return Err(SimError::invalid("Sample size n must be > 0."));
        }
        if !(noise_sd.is_finite() && noise_sd >= 0.0) {
            return Err(SimError::invalid(format!(
                "noise_sd must be finite and >= 0 (got {noise_sd})."
            )));
        }

        let samplers = self.samplers()?;
        let noise = if noise_sd > 0.0 {
            Some(
                Normal::new(0.0, noise_sd)
                    .map_err(|e| SimError::invalid(format!("Noise distribution error: {e}")))?,
            )
        } else {
            None
        };

        let k = self.features.len();
        let mut x = DMatrix::<f64>::zeros(n, k);
        let mut y = DVector::<f64>::zeros(n);
        let mut row = vec![0.0; k];

        for i in 0..n {
            for (j, sampler) in samplers.iter().enumerate() {
                row[j] = sampler.draw(rng);
                x[(i, j)] = row[j];
            }
            let mean = self.truth.eval(&row);
            y[i] = match &noise {
                Some(dist) => mean + dist.sample(rng),
                None => mean,
            };
        }

        Ok(Dataset {
            feature_names: (0..k).map(feature_name).collect(),
            x,
            y,
        })
    }

    fn samplers(&self) -> Result<Vec<Sampler>, SimError> {
        self.features
            .iter()
            .map(|dist| match *dist {
                FeatureDistribution::Uniform { low, high } => Ok(Sampler::Uniform(Uniform::new(low, high))),
                FeatureDistribution::Bernoulli { p } => Bernoulli::new(p)
                    .map(Sampler::Bernoulli)
                    .map_err(|e| SimError::invalid(format!("Bernoulli feature error: {e}"))),
            })
            .collect()
    }
}

/// Seed of run `run` in a study seeded with `master`.
///
/// SplitMix64 finalizer over the pair, so neighbouring runs get unrelated
/// streams and no two runs of one study share a seed.
pub fn run_seed(master: u64, run: usize) -> u64 {
    let mut z = master
        .wrapping_add((run as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
