/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! Default values used by [`super::Builder`].

use banditpam_vector::Metric;

use super::Algorithm;

/// Default fitting algorithm.
pub const ALGORITHM: Algorithm = Algorithm::BanditPam;

/// Default dissimilarity metric.
pub const METRIC: Metric = Metric::L2;

/// Default bound on the number of swap iterations.
pub const MAX_ITER: usize = 100;

/// Default number of reference points per sampling batch.
pub const BATCH_SIZE: usize = 100;

/// Default build-phase confidence factor (`p = build_confidence * N`).
pub const BUILD_CONFIDENCE: f64 = 1_000.0;

/// Default swap-phase confidence factor (`p = swap_confidence * N * K`).
pub const SWAP_CONFIDENCE: f64 = 10_000.0;

/// Default multiplier governing the cache width `m = ceil(log10(N) * multiplier)`.
pub const CACHE_MULTIPLIER: f64 = 1_000.0;

/// Default threshold of surviving candidates below which elimination stops.
pub const PRECISION: usize = 0;

/// Whether the pairwise dissimilarity cache is enabled by default.
pub const USE_CACHE: bool = true;

/// Whether permuted reference sampling is enabled by default.
pub const USE_PERM: bool = true;

/// Default log verbosity. Zero suppresses per-iteration output.
pub const VERBOSITY: u32 = 0;
