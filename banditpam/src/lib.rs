/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! # banditpam
//!
//! A k-medoids clustering engine that uses multi-armed-bandit sampling
//! (BanditPAM) to cut the number of pairwise dissimilarity evaluations needed
//! to select `k` medoids from `N` points, with an exact FastPAM1
//! implementation serving as the "naive" algorithm and testing oracle.
//!
//! ```rust
//! use banditpam::{FitConfig, KMedoids};
//!
//! // Two clusters on a line.
//! let points = [0.0f32, 1.0, 2.0, 10.0, 11.0, 12.0];
//! let config = FitConfig::builder(2).seed(42).build().unwrap();
//! let output = KMedoids::new(config).fit(&points, 6, 1).unwrap();
//!
//! assert_eq!(output.medoids.len(), 2);
//! assert_eq!(output.labels.len(), 6);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod profile;
pub mod trace;

// Internals
pub(crate) mod algorithm;

// Top level exports.
pub use banditpam_vector::{Metric, ParseMetricError};
pub use config::{Algorithm, Builder, FitConfig, ParseAlgorithmError};
pub use engine::{FitOutput, KMedoids};
pub use error::{FitError, FitResult};
