/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! # banditpam-vector
//!
//! Pairwise dissimilarity kernels over dense `f32` vectors, plus the [`Metric`]
//! selector the clustering engine is configured with.
//!
//! The kernels here are pure reference implementations: they take two equal
//! length slices and return a scalar. Note that [`Metric::CosineSimilarity`]
//! returns the raw cosine similarity and is used by callers directly as a loss
//! to minimize; see its documentation for the implications.
#![cfg_attr(
    not(test),
    warn(clippy::panic, clippy::unwrap_used, clippy::expect_used)
)]

mod metric;
pub use metric::{Metric, ParseMetricError};

pub mod distance;
