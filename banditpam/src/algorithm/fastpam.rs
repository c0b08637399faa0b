/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! Exact FastPAM1, following Schubert and Rousseeuw, "Faster k-Medoids
//! Clustering: Improving the PAM, CLARA, and CLARANS Algorithms"
//! (<https://arxiv.org/pdf/1810.05691.pdf>).
//!
//! This is the ground-truth oracle for the bandit path and the algorithm
//! behind the "naive" selector. BUILD is the greedy O(N^2) initialization;
//! SWAP evaluates every (candidate, slot) pair per pass using the FastPAM1
//! delta accumulation, which shares the O(N) scan of each candidate across
//! all K slots.

use rayon::prelude::*;
use tracing::{debug, info};

use super::assignment::Assignment;
use super::{FitContext, Fitted, Strategy};
use crate::error::FitResult;
use crate::model::CachedLoss;

/// Exact O(N^2) medoid selection.
pub(crate) struct FastPam1;

impl Strategy for FastPam1 {
    fn fit(&self, ctx: &mut FitContext<'_>) -> FitResult<Fitted> {
        let num_points = ctx.num_points();
        let medoids_build = build(&ctx.loss, ctx.config.n_medoids());
        let mut medoids = medoids_build.clone();

        let mut assignment = Assignment::new(num_points);
        let mut loss_trace = Vec::new();
        let mut steps = 0usize;
        let mut iteration = 0usize;
        let mut changed = true;

        while changed && iteration < ctx.config.max_iter() {
            iteration += 1;
            assignment.refresh(&ctx.loss, &medoids);
            changed = swap_once(&ctx.loss, &mut medoids, &assignment);
            if changed {
                steps += 1;
            }
            assignment.refresh(&ctx.loss, &medoids);
            let total_loss = assignment.total_loss();
            loss_trace.push(total_loss);
            debug!(iteration, total_loss, changed, "fastpam1 swap pass complete");
        }

        if ctx.config.verbosity() > 0 {
            info!(steps, "fastpam1 converged");
        }

        Ok(Fitted {
            medoids_build,
            medoids,
            labels: assignment.labels,
            steps,
            total_loss: loss_trace.last().copied().unwrap_or(0.0),
            loss_trace,
        })
    }
}

/// Greedy BUILD: each slot takes the point minimizing the summed best
/// distance, given the slots already chosen.
fn build(loss: &CachedLoss<'_>, num_medoids: usize) -> Vec<usize> {
    let num_points = loss.data().num_points();
    let mut best = vec![f32::INFINITY; num_points];
    let mut medoids: Vec<usize> = Vec::with_capacity(num_medoids);

    for _ in 0..num_medoids {
        let totals: Vec<f64> = (0..num_points)
            .into_par_iter()
            .map(|i| {
                // A point already serving as a medoid cannot be chosen twice.
                if medoids.contains(&i) {
                    return f64::INFINITY;
                }
                (0..num_points)
                    .map(|j| loss.eval(i, j).min(best[j]) as f64)
                    .sum()
            })
            .collect();

        let mut chosen = 0;
        let mut min_total = f64::INFINITY;
        for (i, &total) in totals.iter().enumerate() {
            if total < min_total {
                min_total = total;
                chosen = i;
            }
        }
        medoids.push(chosen);

        best.par_iter_mut().enumerate().for_each(|(j, b)| {
            let cost = loss.eval(j, chosen);
            if cost < *b {
                *b = cost;
            }
        });
    }

    medoids
}

/// One exact swap pass: apply the single most-improving (candidate, slot)
/// replacement, if any improves.
///
/// For each candidate `i`, `delta[s]` accumulates the change in total loss if
/// `medoids[s]` were replaced by `i`. The reassignment term (points whose new
/// closest medoid becomes `i` regardless of which slot is vacated) is added
/// to every slot and backed out of the vacated one.
fn swap_once(loss: &CachedLoss<'_>, medoids: &mut [usize], assignment: &Assignment) -> bool {
    let num_points = loss.data().num_points();
    let num_medoids = medoids.len();

    let per_candidate: Vec<(f64, usize)> = (0..num_points)
        .into_par_iter()
        .map(|i| {
            if medoids.contains(&i) {
                return (f64::INFINITY, 0);
            }

            let mut delta = vec![-(assignment.best[i] as f64); num_medoids];
            for j in 0..num_points {
                if j == i {
                    continue;
                }
                let d_ij = loss.eval(i, j) as f64;
                let best_j = assignment.best[j] as f64;
                let second_j = assignment.second[j] as f64;
                let slot_j = assignment.labels[j];

                if d_ij < second_j {
                    delta[slot_j] += d_ij - best_j;
                } else {
                    delta[slot_j] += second_j - best_j;
                }
                if d_ij < best_j {
                    let gain = d_ij - best_j;
                    for d in delta.iter_mut() {
                        *d += gain;
                    }
                    delta[slot_j] -= gain;
                }
            }

            let mut slot = 0;
            let mut min_delta = delta[0];
            for (s, &d) in delta.iter().enumerate().skip(1) {
                if d < min_delta {
                    min_delta = d;
                    slot = s;
                }
            }
            (min_delta, slot)
        })
        .collect();

    // Sequential scan with strict comparison: the lowest candidate index wins
    // ties regardless of thread count.
    let mut best_change = 0.0f64;
    let mut best_point = 0usize;
    let mut best_slot = 0usize;
    let mut improving = false;
    for (i, &(change, slot)) in per_candidate.iter().enumerate() {
        if change < best_change {
            best_change = change;
            best_point = i;
            best_slot = slot;
            improving = true;
        }
    }

    if improving {
        medoids[best_slot] = best_point;
    }
    improving
}
