/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! The bandit-sampled BUILD and SWAP phases.
//!
//! Both phases run the same UCB elimination scheme over a set of arms: batches
//! of reference points produce mean-reward estimates, a concentration term
//! `sigma * sqrt(ln(p) / T)` widens them into confidence intervals, and any
//! arm whose lower bound clears the smallest upper bound is eliminated. An arm
//! whose next batch would reach `N` samples is promoted to an exact
//! computation over all reference points instead.

use rayon::prelude::*;
use tracing::{debug, info};

use super::assignment::Assignment;
use super::{FitContext, Fitted, Strategy};
use crate::error::FitResult;
use crate::model::{CachedLoss, SwapArm};

/// Bandit-sampled medoid selection.
pub(crate) struct BanditPam;

impl Strategy for BanditPam {
    fn fit(&self, ctx: &mut FitContext<'_>) -> FitResult<Fitted> {
        let medoids_build = build(ctx)?;
        let mut medoids = medoids_build.clone();
        let outcome = swap(ctx, &mut medoids)?;
        Ok(Fitted {
            medoids_build,
            medoids,
            labels: outcome.labels,
            steps: outcome.steps,
            total_loss: outcome.total_loss,
            loss_trace: outcome.loss_trace,
        })
    }
}

///////////
// Build //
///////////

/// Greedily select `n_medoids` medoids, one UCB elimination round per slot.
fn build(ctx: &mut FitContext<'_>) -> FitResult<Vec<usize>> {
    let num_points = ctx.num_points();
    let num_medoids = ctx.config.n_medoids();
    let batch = ctx.batch();
    let precision = ctx.config.precision();
    let p = ((ctx.config.build_confidence() * num_points as f64) as usize).max(1);
    let log_p = (p as f64).ln();

    let mut best = vec![f32::INFINITY; num_points];
    let mut medoids: Vec<usize> = Vec::with_capacity(num_medoids);
    let mut state = BanditState::new(num_points);
    // The first slot has no incumbent distances to improve on, so its reward
    // is the absolute cost; later slots use the improvement over `best`.
    let mut use_absolute = true;

    for slot in 0..num_medoids {
        ctx.sampler.reset_cursor();
        state.reset();
        for &medoid in &medoids {
            state.exclude(medoid);
        }

        let sigma = build_sigma(ctx, &best, use_absolute);
        let mut exact_arms = 0usize;

        while state.live() > precision {
            let promote = state.promotable(batch, num_points);
            if !promote.is_empty() {
                let refs = ctx.sampler.draw(num_points);
                let values = build_estimates(&ctx.loss, &promote, &refs, &best, use_absolute);
                state.promote(&promote, &values, num_points);
                state.drop_candidates(&promote);
                exact_arms += promote.len();
            }
            if state.live() < precision {
                break;
            }
            let targets = state.live_arms();
            if targets.is_empty() {
                break;
            }
            let refs = ctx.sampler.draw(batch);
            let values = build_estimates(&ctx.loss, &targets, &refs, &best, use_absolute);
            state.absorb_batch(&targets, &values, batch);
            state.update_bounds(&targets, &sigma, log_p);
            state.refilter();
        }

        let chosen = state.argmin_lcb();
        if let Some(profile) = ctx.profile.as_mut() {
            profile.record_build_slot(slot, p, state.estimates[chosen], exact_arms, &sigma)?;
        }
        if ctx.config.verbosity() > 0 {
            info!(slot, medoid = chosen, exact_arms, "build: selected medoid");
        } else {
            debug!(slot, medoid = chosen, exact_arms, "build: selected medoid");
        }
        medoids.push(chosen);

        let loss = &ctx.loss;
        best.par_iter_mut().enumerate().for_each(|(i, b)| {
            let cost = loss.eval(i, chosen);
            if cost < *b {
                *b = cost;
            }
        });
        use_absolute = false;
    }

    Ok(medoids)
}

/// Per-arm standard deviation of the build reward over one reference batch.
fn build_sigma(ctx: &mut FitContext<'_>, best: &[f32], use_absolute: bool) -> Vec<f64> {
    let num_points = ctx.num_points();
    let refs = ctx.sampler.draw(ctx.batch());
    let loss = &ctx.loss;

    let mut sigma = vec![0.0f64; num_points];
    sigma.par_iter_mut().enumerate().for_each(|(i, out)| {
        let samples: Vec<f64> = refs
            .iter()
            .map(|&r| build_sample(loss, i, r, best, use_absolute))
            .collect();
        *out = sample_std(&samples);
    });
    sigma
}

/// Mean build reward of each target arm over `refs`.
fn build_estimates(
    loss: &CachedLoss<'_>,
    targets: &[usize],
    refs: &[usize],
    best: &[f32],
    use_absolute: bool,
) -> Vec<f64> {
    let mut estimates = vec![0.0f64; targets.len()];
    estimates
        .par_iter_mut()
        .zip(targets.par_iter())
        .for_each(|(out, &i)| {
            let total: f64 = refs
                .iter()
                .map(|&r| build_sample(loss, i, r, best, use_absolute))
                .sum();
            *out = total / refs.len() as f64;
        });
    estimates
}

/// One build reward sample: the cost itself for the first slot, afterwards
/// `min(d(i, r), best[r]) - best[r]`, the (non-positive) change in `best[r]`
/// if `i` became a medoid.
#[inline]
fn build_sample(loss: &CachedLoss<'_>, i: usize, r: usize, best: &[f32], use_absolute: bool) -> f64 {
    let cost = loss.eval(i, r) as f64;
    if use_absolute {
        cost
    } else {
        let b = best[r] as f64;
        cost.min(b) - b
    }
}

//////////
// Swap //
//////////

struct SwapOutcome {
    steps: usize,
    labels: Vec<usize>,
    total_loss: f64,
    loss_trace: Vec<f64>,
}

/// Iteratively replace medoids until an iteration performs no swap or the
/// iteration limit is reached.
fn swap(ctx: &mut FitContext<'_>, medoids: &mut [usize]) -> FitResult<SwapOutcome> {
    let num_points = ctx.num_points();
    let num_medoids = medoids.len();
    let batch = ctx.batch();
    let precision = ctx.config.precision();
    let p = ((ctx.config.swap_confidence() * (num_points * num_medoids) as f64) as usize).max(1);
    let log_p = (p as f64).ln();

    let mut assignment = Assignment::new(num_points);
    let mut state = BanditState::new(num_points * num_medoids);
    let mut loss_trace = Vec::new();
    let mut steps = 0usize;
    let mut iteration = 0usize;
    let mut swapped = true;

    while swapped && iteration < ctx.config.max_iter() {
        iteration += 1;
        ctx.sampler.reset_cursor();
        assignment.refresh(&ctx.loss, medoids);

        let sigma = swap_sigma(ctx, &assignment, num_medoids);

        state.reset();
        // Arms that would duplicate an existing medoid in another slot can
        // never reduce the loss and would break medoid distinctness; take
        // them out of the running up front.
        for slot in 0..num_medoids {
            for (other_slot, &other) in medoids.iter().enumerate() {
                if other_slot != slot {
                    state.exclude(
                        SwapArm {
                            slot,
                            point: other,
                        }
                        .to_linear(num_medoids),
                    );
                }
            }
        }

        let mut exact_arms = 0usize;
        while state.live() > precision {
            let promote = state.promotable(batch, num_points);
            if !promote.is_empty() {
                let refs = ctx.sampler.draw(num_points);
                let values = swap_estimates(&ctx.loss, num_medoids, &promote, &refs, &assignment);
                state.promote(&promote, &values, num_points);
                state.refilter();
                exact_arms += promote.len();
            }
            if state.live() < precision {
                break;
            }
            let targets = state.live_arms();
            if targets.is_empty() {
                break;
            }
            let refs = ctx.sampler.draw(batch);
            let values = swap_estimates(&ctx.loss, num_medoids, &targets, &refs, &assignment);
            state.absorb_batch(&targets, &values, batch);
            state.update_bounds(&targets, &sigma, log_p);
            state.refilter();
        }

        let arm = SwapArm::from_linear(state.argmin_lcb(), num_medoids);
        swapped = medoids[arm.slot] != arm.point;
        if swapped {
            steps += 1;
            if ctx.config.verbosity() > 0 {
                info!(
                    iteration,
                    slot = arm.slot,
                    old = medoids[arm.slot],
                    new = arm.point,
                    "swap performed"
                );
            }
            medoids[arm.slot] = arm.point;
        } else if ctx.config.verbosity() > 0 {
            info!(iteration, "no swap performed");
        }

        assignment.refresh(&ctx.loss, medoids);
        let total_loss = assignment.total_loss();
        loss_trace.push(total_loss);
        debug!(iteration, total_loss, exact_arms, "swap iteration complete");
        if let Some(profile) = ctx.profile.as_mut() {
            profile.record_swap_iteration(iteration, p, exact_arms, total_loss, &sigma)?;
        }
    }

    Ok(SwapOutcome {
        steps,
        labels: assignment.labels,
        total_loss: loss_trace.last().copied().unwrap_or(0.0),
        loss_trace,
    })
}

/// Per-arm standard deviation of the swap reward over one reference batch.
fn swap_sigma(ctx: &mut FitContext<'_>, assignment: &Assignment, num_medoids: usize) -> Vec<f64> {
    let num_points = ctx.num_points();
    let refs = ctx.sampler.draw(ctx.batch());
    let loss = &ctx.loss;

    let mut sigma = vec![0.0f64; num_points * num_medoids];
    sigma.par_iter_mut().enumerate().for_each(|(linear, out)| {
        let arm = SwapArm::from_linear(linear, num_medoids);
        let samples: Vec<f64> = refs
            .iter()
            .map(|&r| swap_sample(loss, arm, r, assignment))
            .collect();
        *out = sample_std(&samples);
    });
    sigma
}

/// Mean swap reward of each target arm over `refs`.
fn swap_estimates(
    loss: &CachedLoss<'_>,
    num_medoids: usize,
    targets: &[usize],
    refs: &[usize],
    assignment: &Assignment,
) -> Vec<f64> {
    let mut estimates = vec![0.0f64; targets.len()];
    estimates
        .par_iter_mut()
        .zip(targets.par_iter())
        .for_each(|(out, &linear)| {
            let arm = SwapArm::from_linear(linear, num_medoids);
            let total: f64 = refs
                .iter()
                .map(|&r| swap_sample(loss, arm, r, assignment))
                .sum();
            *out = total / refs.len() as f64;
        });
    estimates
}

/// One swap reward sample for arm `(slot, point)` and reference `r`.
///
/// If `r` is currently assigned to the slot being replaced, its new closest
/// distance is capped by the second-best distance; otherwise by the best.
/// Subtracting `best[r]` yields the per-reference change in loss.
#[inline]
fn swap_sample(loss: &CachedLoss<'_>, arm: SwapArm, r: usize, assignment: &Assignment) -> f64 {
    let cost = loss.eval(arm.point, r) as f64;
    let cap = if assignment.labels[r] == arm.slot {
        assignment.second[r]
    } else {
        assignment.best[r]
    } as f64;
    cost.min(cap) - assignment.best[r] as f64
}

//////////////////
// Shared state //
//////////////////

/// Per-arm elimination state, shared by both phases.
///
/// Invariants: an exact arm is never a candidate; excluded arms are exact with
/// infinite bounds so they can neither re-enter candidacy nor win the argmin.
struct BanditState {
    estimates: Vec<f64>,
    lcbs: Vec<f64>,
    ucbs: Vec<f64>,
    num_samples: Vec<usize>,
    exact: Vec<bool>,
    candidate: Vec<bool>,
}

impl BanditState {
    fn new(len: usize) -> Self {
        Self {
            estimates: vec![0.0; len],
            lcbs: vec![f64::INFINITY; len],
            ucbs: vec![f64::INFINITY; len],
            num_samples: vec![0; len],
            exact: vec![false; len],
            candidate: vec![true; len],
        }
    }

    fn reset(&mut self) {
        self.estimates.fill(0.0);
        self.lcbs.fill(f64::INFINITY);
        self.ucbs.fill(f64::INFINITY);
        self.num_samples.fill(0);
        self.exact.fill(false);
        self.candidate.fill(true);
    }

    /// Permanently remove an arm from this round.
    fn exclude(&mut self, arm: usize) {
        self.estimates[arm] = f64::INFINITY;
        self.lcbs[arm] = f64::INFINITY;
        self.ucbs[arm] = f64::INFINITY;
        self.exact[arm] = true;
        self.candidate[arm] = false;
    }

    /// The number of surviving candidates.
    fn live(&self) -> usize {
        self.candidate.iter().filter(|&&c| c).count()
    }

    /// Indices of surviving candidates, in arm order.
    fn live_arms(&self) -> Vec<usize> {
        self.candidate
            .iter()
            .enumerate()
            .filter_map(|(arm, &c)| c.then_some(arm))
            .collect()
    }

    /// Arms whose next batch would reach a full pass and that are not yet
    /// exact.
    fn promotable(&self, batch: usize, full: usize) -> Vec<usize> {
        (0..self.num_samples.len())
            .filter(|&arm| !self.exact[arm] && self.num_samples[arm] + batch >= full)
            .collect()
    }

    /// Record exact values: the estimate and both bounds collapse onto the
    /// value.
    fn promote(&mut self, arms: &[usize], values: &[f64], full: usize) {
        for (&arm, &value) in arms.iter().zip(values.iter()) {
            self.estimates[arm] = value;
            self.lcbs[arm] = value;
            self.ucbs[arm] = value;
            self.exact[arm] = true;
            self.num_samples[arm] += full;
        }
    }

    fn drop_candidates(&mut self, arms: &[usize]) {
        for &arm in arms {
            self.candidate[arm] = false;
        }
    }

    /// Fold a batch mean into the running estimate by sample-count weighting.
    fn absorb_batch(&mut self, arms: &[usize], values: &[f64], batch: usize) {
        for (&arm, &value) in arms.iter().zip(values.iter()) {
            let samples = self.num_samples[arm] as f64;
            self.estimates[arm] = (samples * self.estimates[arm] + value * batch as f64)
                / (samples + batch as f64);
            self.num_samples[arm] += batch;
        }
    }

    /// Recompute the confidence interval of each arm from its sample count.
    fn update_bounds(&mut self, arms: &[usize], sigma: &[f64], log_p: f64) {
        for &arm in arms {
            let delta = sigma[arm] * (log_p / self.num_samples[arm] as f64).sqrt();
            self.lcbs[arm] = self.estimates[arm] - delta;
            self.ucbs[arm] = self.estimates[arm] + delta;
        }
    }

    /// Keep the arms that could still beat the current smallest upper bound.
    fn refilter(&mut self) {
        let min_ucb = self.ucbs.iter().copied().fold(f64::INFINITY, f64::min);
        for arm in 0..self.candidate.len() {
            self.candidate[arm] = self.lcbs[arm] < min_ucb && !self.exact[arm];
        }
    }

    /// The arm with the smallest lower bound; ties resolve to the lowest
    /// index.
    ///
    /// When no arm has been evaluated yet (possible only under a threshold
    /// larger than the arm count), fall back to the first non-excluded arm so
    /// the selection is still valid.
    fn argmin_lcb(&self) -> usize {
        let mut best = self.exact.iter().position(|&e| !e).unwrap_or(0);
        let mut best_value = self.lcbs[best];
        for (arm, &value) in self.lcbs.iter().enumerate() {
            if value < best_value {
                best_value = value;
                best = arm;
            }
        }
        best
    }
}

/// Sample standard deviation (n - 1 normalization); zero for fewer than two
/// samples.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1.0);
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_sample_std() {
        assert_eq!(sample_std(&[]), 0.0);
        assert_eq!(sample_std(&[3.0]), 0.0);
        assert_eq!(sample_std(&[2.0, 2.0, 2.0]), 0.0);
        // Sample (n - 1) normalization: var([1, 2, 3]) = 1.
        assert_relative_eq!(sample_std(&[1.0, 2.0, 3.0]), 1.0);
    }

    #[test]
    fn test_state_absorb_batch_is_a_weighted_average() {
        let mut state = BanditState::new(2);
        state.absorb_batch(&[0], &[4.0], 10);
        assert_relative_eq!(state.estimates[0], 4.0);
        state.absorb_batch(&[0], &[1.0], 30);
        // (10 * 4 + 30 * 1) / 40
        assert_relative_eq!(state.estimates[0], 1.75);
        assert_eq!(state.num_samples[0], 40);
        // Arm 1 untouched.
        assert_eq!(state.estimates[1], 0.0);
    }

    #[test]
    fn test_refilter_eliminates_dominated_arms() {
        let mut state = BanditState::new(3);
        state.absorb_batch(&[0, 1, 2], &[1.0, 1.5, 5.0], 10);
        let sigma = vec![1.0, 1.0, 1.0];
        state.update_bounds(&[0, 1, 2], &sigma, 1.0);
        state.refilter();

        // delta = sqrt(1/10) ~ 0.316, so min ucb is arm 0's ~1.316. Arm 1's
        // lcb of ~1.184 stays under it; arm 2's ~4.684 is dominated.
        assert_eq!(state.live_arms(), vec![0, 1]);
    }

    #[test]
    fn test_promote_collapses_bounds_and_blocks_resampling() {
        let mut state = BanditState::new(2);
        state.promote(&[1], &[3.5], 100);
        assert_eq!(state.lcbs[1], 3.5);
        assert_eq!(state.ucbs[1], 3.5);
        assert!(state.exact[1]);
        assert_eq!(state.num_samples[1], 100);
        assert!(state.promotable(100, 100).contains(&0));
        assert!(!state.promotable(100, 100).contains(&1));

        state.refilter();
        // Arm 0 still has an infinite lcb and cannot beat 3.5.
        assert_eq!(state.live(), 0);
        assert_eq!(state.argmin_lcb(), 1);
    }

    #[test]
    fn test_excluded_arms_never_win() {
        let mut state = BanditState::new(3);
        state.exclude(0);
        state.absorb_batch(&[1, 2], &[2.0, 1.0], 10);
        state.update_bounds(&[1, 2], &[0.0, 0.0, 0.0], 1.0);
        assert_eq!(state.argmin_lcb(), 2);
        // Excluded arms are exact, so they are not promotable either.
        assert_eq!(state.promotable(100, 100), vec![1, 2]);
    }

    #[test]
    fn test_argmin_ties_resolve_to_the_lowest_arm() {
        let mut state = BanditState::new(4);
        state.promote(&[0, 1, 2, 3], &[2.0, 1.0, 1.0, 1.0], 10);
        assert_eq!(state.argmin_lcb(), 1);
    }
}
