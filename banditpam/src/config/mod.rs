/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! Configuration state for a fit.
//!
//! A [`FitConfig`] is produced by validating a [`Builder`]; once built it is
//! immutable, so every invariant checked in [`Builder::build`] holds for the
//! whole fit. The one check that must wait for the data (`n_medoids <= N`)
//! happens at the start of [`crate::KMedoids::fit`].

pub mod defaults;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use banditpam_vector::Metric;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{FitError, FitResult};

///////////////
// Algorithm //
///////////////

/// Which medoid-selection algorithm drives the fit.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Algorithm {
    /// Bandit-sampled BUILD and SWAP with adaptive exact fallback.
    BanditPam,
    /// Exact O(N^2) FastPAM1, the testing oracle.
    Naive,
}

impl Algorithm {
    /// Returns the string representation of the algorithm.
    pub const fn as_str(self) -> &'static str {
        match self {
            Algorithm::BanditPam => "banditpam",
            Algorithm::Naive => "naive",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ParseAlgorithmError {
    #[error("Invalid format for Algorithm: {0}")]
    InvalidFormat(String),
}

impl FromStr for Algorithm {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "banditpam" => Ok(Algorithm::BanditPam),
            // FastPAM1 is the implementation behind the "naive" selector.
            "naive" | "fastpam1" => Ok(Algorithm::Naive),
            _ => Err(ParseAlgorithmError::InvalidFormat(String::from(s))),
        }
    }
}

////////////
// Config //
////////////

/// Validated configuration for [`crate::KMedoids`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    n_medoids: usize,
    algorithm: Algorithm,
    metric: Metric,
    max_iter: usize,
    verbosity: u32,
    log_path: Option<PathBuf>,
    build_confidence: f64,
    swap_confidence: f64,
    batch_size: usize,
    use_cache: bool,
    use_perm: bool,
    cache_multiplier: f64,
    precision: usize,
    seed: Option<u64>,
}

impl FitConfig {
    /// Start building a configuration for `n_medoids` clusters.
    pub fn builder(n_medoids: usize) -> Builder {
        Builder::new(n_medoids)
    }

    /// The number of medoids to select.
    pub fn n_medoids(&self) -> usize {
        self.n_medoids
    }

    /// The selected algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The selected dissimilarity metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// The bound on the number of swap iterations.
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Log verbosity; zero suppresses per-iteration output.
    pub fn verbosity(&self) -> u32 {
        self.verbosity
    }

    /// The profile log path, if profiling was requested.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// The build-phase confidence factor.
    pub fn build_confidence(&self) -> f64 {
        self.build_confidence
    }

    /// The swap-phase confidence factor.
    pub fn swap_confidence(&self) -> f64 {
        self.swap_confidence
    }

    /// The number of reference points drawn per sampling batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Whether the pairwise dissimilarity cache is enabled.
    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    /// Whether reference batches walk a fixed permutation.
    pub fn use_perm(&self) -> bool {
        self.use_perm
    }

    /// The multiplier governing cache width.
    pub fn cache_multiplier(&self) -> f64 {
        self.cache_multiplier
    }

    /// The candidate-count threshold that stops UCB elimination.
    pub fn precision(&self) -> usize {
        self.precision
    }

    /// The RNG seed; `None` seeds from the operating system.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

/////////////
// Builder //
/////////////

/// Builder for [`FitConfig`]. Invalid combinations are rejected by
/// [`Builder::build`].
#[derive(Debug, Clone)]
pub struct Builder {
    n_medoids: usize,
    algorithm: Algorithm,
    metric: Metric,
    max_iter: usize,
    verbosity: u32,
    log_path: Option<PathBuf>,
    build_confidence: f64,
    swap_confidence: f64,
    batch_size: usize,
    use_cache: bool,
    use_perm: bool,
    cache_multiplier: f64,
    precision: usize,
    seed: Option<u64>,
}

impl Builder {
    /// Create a builder for `n_medoids` clusters with default parameters.
    pub fn new(n_medoids: usize) -> Self {
        Self {
            n_medoids,
            algorithm: defaults::ALGORITHM,
            metric: defaults::METRIC,
            max_iter: defaults::MAX_ITER,
            verbosity: defaults::VERBOSITY,
            log_path: None,
            build_confidence: defaults::BUILD_CONFIDENCE,
            swap_confidence: defaults::SWAP_CONFIDENCE,
            batch_size: defaults::BATCH_SIZE,
            use_cache: defaults::USE_CACHE,
            use_perm: defaults::USE_PERM,
            cache_multiplier: defaults::CACHE_MULTIPLIER,
            precision: defaults::PRECISION,
            seed: None,
        }
    }

    /// Select the fitting algorithm.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Select the dissimilarity metric.
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Bound the number of swap iterations.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the log verbosity.
    pub fn verbosity(mut self, verbosity: u32) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Append per-fit profile records to `path`.
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Set the build-phase confidence factor.
    pub fn build_confidence(mut self, build_confidence: f64) -> Self {
        self.build_confidence = build_confidence;
        self
    }

    /// Set the swap-phase confidence factor.
    pub fn swap_confidence(mut self, swap_confidence: f64) -> Self {
        self.swap_confidence = swap_confidence;
        self
    }

    /// Set the number of reference points drawn per batch.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable the pairwise dissimilarity cache.
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Enable or disable permuted reference sampling.
    pub fn use_perm(mut self, use_perm: bool) -> Self {
        self.use_perm = use_perm;
        self
    }

    /// Set the multiplier governing cache width.
    pub fn cache_multiplier(mut self, cache_multiplier: f64) -> Self {
        self.cache_multiplier = cache_multiplier;
        self
    }

    /// Set the candidate-count threshold that stops UCB elimination.
    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Pin the RNG seed for reproducible fits.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the builder and produce a [`FitConfig`].
    pub fn build(self) -> FitResult<FitConfig> {
        fn positive(parameter: &'static str, value: usize) -> FitResult<usize> {
            if value == 0 {
                return Err(FitError::Config {
                    parameter,
                    reason: String::from("must be positive"),
                });
            }
            Ok(value)
        }

        fn positive_finite(parameter: &'static str, value: f64) -> FitResult<f64> {
            if !value.is_finite() || value <= 0.0 {
                return Err(FitError::Config {
                    parameter,
                    reason: format!("must be positive and finite, got {value}"),
                });
            }
            Ok(value)
        }

        Ok(FitConfig {
            n_medoids: positive("n_medoids", self.n_medoids)?,
            algorithm: self.algorithm,
            metric: self.metric,
            max_iter: positive("max_iter", self.max_iter)?,
            verbosity: self.verbosity,
            log_path: self.log_path,
            build_confidence: positive_finite("build_confidence", self.build_confidence)?,
            swap_confidence: positive_finite("swap_confidence", self.swap_confidence)?,
            batch_size: positive("batch_size", self.batch_size)?,
            use_cache: self.use_cache,
            use_perm: self.use_perm,
            cache_multiplier: positive_finite("cache_multiplier", self.cache_multiplier)?,
            precision: self.precision,
            seed: self.seed,
        })
    }
}
