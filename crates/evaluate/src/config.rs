//! Confidence interval configuration.

use crate::error::EvaluateError;

/// Configuration for normal and bootstrap confidence intervals.
#[derive(Debug, Clone)]
pub struct CiConfig {
    alphas: Vec<f64>,
    large_sample_threshold: usize,
    n_replicates: usize,
    replicate_proportion: f64,
    seed: u64,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            alphas: vec![0.05],
            large_sample_threshold: 100,
            n_replicates: 1000,
            replicate_proportion: 1.0,
            seed: 0,
        }
    }
}

impl CiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the alpha values; one interval is computed per alpha.
    pub fn with_alphas(mut self, alphas: Vec<f64>) -> Self {
        self.alphas = alphas;
        self
    }

    /// Set the sample size at which normal critical values replace Student-t.
    pub fn with_large_sample_threshold(mut self, n: usize) -> Self {
        self.large_sample_threshold = n;
        self
    }

    /// Set the number of bootstrap replicates. Zero disables bootstrapping.
    pub fn with_n_replicates(mut self, n: usize) -> Self {
        self.n_replicates = n;
        self
    }

    /// Set the replicate size as a proportion of the sample size.
    pub fn with_replicate_proportion(mut self, p: f64) -> Self {
        self.replicate_proportion = p;
        self
    }

    /// Set the bootstrap RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    pub fn large_sample_threshold(&self) -> usize {
        self.large_sample_threshold
    }

    pub fn n_replicates(&self) -> usize {
        self.n_replicates
    }

    pub fn replicate_proportion(&self) -> f64 {
        self.replicate_proportion
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Checks that every alpha lies in `(0, 1)` and the replicate
    /// proportion in `(0, 1]`.
    pub fn validate(&self) -> Result<(), EvaluateError> {
        if let Some(&alpha) = self
            .alphas
            .iter()
            .find(|a| !(a.is_finite() && **a > 0.0 && **a < 1.0))
        {
            return Err(EvaluateError::InvalidAlpha { alpha });
        }
        let p = self.replicate_proportion;
        if !(p.is_finite() && p > 0.0 && p <= 1.0) {
            return Err(EvaluateError::InvalidReplicateProportion { value: p });
        }
        Ok(())
    }
}
