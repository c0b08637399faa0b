/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! Engine-owned state: the point matrix, the dissimilarity cache, and the
//! reference sampler.

mod arm;
mod cache;
mod dataset;
mod sampler;

pub use arm::SwapArm;
pub use cache::{CachedLoss, DistanceCache};
pub use dataset::Dataset;
pub use sampler::ReferenceSampler;
