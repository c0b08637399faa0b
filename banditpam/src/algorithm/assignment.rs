/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use rayon::prelude::*;

use crate::model::CachedLoss;

/// Per-point assignment state: the best and second-best distances to the
/// current medoid set and the position of the closest medoid.
///
/// Rewritten between parallel regions by [`Assignment::refresh`]; never
/// mutated while a parallel region reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// `best[i] = min over m in medoids of d(i, m)`.
    pub best: Vec<f32>,
    /// Second minimum of `d(i, m)`; infinite while fewer than two medoids.
    pub second: Vec<f32>,
    /// Position within the medoid vector of the medoid achieving `best[i]`.
    pub labels: Vec<usize>,
}

impl Assignment {
    pub fn new(num_points: usize) -> Self {
        Self {
            best: vec![f32::INFINITY; num_points],
            second: vec![f32::INFINITY; num_points],
            labels: vec![0; num_points],
        }
    }

    /// Recompute the full assignment against `medoids`, in parallel over
    /// points.
    ///
    /// Equal distances leave the assignment unchanged, so the lowest-index
    /// medoid wins ties.
    pub fn refresh(&mut self, loss: &CachedLoss<'_>, medoids: &[usize]) {
        self.best
            .par_iter_mut()
            .zip(self.second.par_iter_mut())
            .zip(self.labels.par_iter_mut())
            .enumerate()
            .for_each(|(i, ((best, second), label))| {
                let mut b = f32::INFINITY;
                let mut s = f32::INFINITY;
                let mut l = 0;
                for (position, &medoid) in medoids.iter().enumerate() {
                    let cost = loss.eval(medoid, i);
                    if cost < b {
                        l = position;
                        s = b;
                        b = cost;
                    } else if cost < s {
                        s = cost;
                    }
                }
                *best = b;
                *second = s;
                *label = l;
            });
    }

    /// Sum of best distances.
    pub fn total_loss(&self) -> f64 {
        self.best.iter().map(|&b| b as f64).sum()
    }
}
