/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! Medoid-selection strategies.
//!
//! The engine owns the shared fit state ([`FitContext`]) and dispatches to one
//! of two strategies: the bandit-sampled [`bandit::BanditPam`] or the exact
//! [`fastpam::FastPam1`]. Both produce the same [`Fitted`] output shape.

pub(crate) mod assignment;
pub(crate) mod bandit;
pub(crate) mod fastpam;

use crate::config::FitConfig;
use crate::error::FitResult;
use crate::model::{CachedLoss, ReferenceSampler};
use crate::profile::ProfileWriter;

/// Shared per-fit state handed to a strategy.
pub(crate) struct FitContext<'a> {
    pub config: &'a FitConfig,
    pub loss: CachedLoss<'a>,
    pub sampler: ReferenceSampler,
    pub profile: Option<ProfileWriter>,
}

impl FitContext<'_> {
    /// The number of points `N`.
    pub fn num_points(&self) -> usize {
        self.loss.data().num_points()
    }

    /// The effective batch size, clamped so a batch never exceeds `N`.
    pub fn batch(&self) -> usize {
        self.config.batch_size().min(self.num_points())
    }
}

/// The result of running a strategy to convergence.
pub(crate) struct Fitted {
    /// Medoid indices after the build phase.
    pub medoids_build: Vec<usize>,
    /// Medoid indices after the swap phase.
    pub medoids: Vec<usize>,
    /// For each point, the position in `medoids` of its closest medoid.
    pub labels: Vec<usize>,
    /// The number of swaps performed.
    pub steps: usize,
    /// Sum of best distances after convergence.
    pub total_loss: f64,
    /// Sum of best distances after each swap iteration.
    pub loss_trace: Vec<f64>,
}

/// A medoid-selection algorithm.
pub(crate) trait Strategy {
    fn fit(&self, ctx: &mut FitContext<'_>) -> FitResult<Fitted>;
}
