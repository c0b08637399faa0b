/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

/// How reference batches are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleMode {
    /// Walk a fixed random permutation with a cursor.
    Permuted,
    /// Draw uniformly without replacement on every call.
    Uniform,
}

/// Produces batches of reference point indices for the sigma and mean-reward
/// estimators.
///
/// In permuted mode, consecutive draws walk a single permutation generated at
/// construction, which keeps reference sets stable across elimination rounds
/// and lets the cache reuse its columns. When a draw would run off the end of
/// the permutation the cursor resets to 0 first, dropping up to `size - 1`
/// tail elements; the drop is logged and the fit continues.
#[derive(Debug)]
pub struct ReferenceSampler {
    mode: SampleMode,
    permutation: Vec<usize>,
    cursor: usize,
    num_points: usize,
    rng: StdRng,
}

impl ReferenceSampler {
    /// Create a sampler over `num_points` indices.
    ///
    /// The permutation is generated when permuted sampling is requested or
    /// when `need_permutation` is set (the cache reindexes through it even
    /// when batches are drawn uniformly).
    pub fn new(num_points: usize, use_perm: bool, need_permutation: bool, mut rng: StdRng) -> Self {
        let permutation = if use_perm || need_permutation {
            let mut permutation: Vec<usize> = (0..num_points).collect();
            permutation.shuffle(&mut rng);
            permutation
        } else {
            Vec::new()
        };

        Self {
            mode: if use_perm {
                SampleMode::Permuted
            } else {
                SampleMode::Uniform
            },
            permutation,
            cursor: 0,
            num_points,
            rng,
        }
    }

    /// The fit permutation; empty when neither permuted sampling nor the
    /// cache requested one.
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Rewind the permutation cursor to the start.
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Draw an ordered batch of reference indices.
    ///
    /// `size` is clamped to the number of points, so callers may request the
    /// configured batch size (or a full pass of `N` for exact computation)
    /// without bounds checking.
    pub fn draw(&mut self, size: usize) -> Vec<usize> {
        let size = size.min(self.num_points);
        if size == 0 {
            return Vec::new();
        }

        match self.mode {
            SampleMode::Permuted => {
                if self.cursor + size > self.num_points {
                    debug!(
                        cursor = self.cursor,
                        size,
                        dropped = self.num_points - self.cursor,
                        "permuted sampler wrapped around"
                    );
                    self.cursor = 0;
                }
                let refs = self.permutation[self.cursor..self.cursor + size].to_vec();
                self.cursor += size;
                refs
            }
            SampleMode::Uniform => {
                rand::seq::index::sample(&mut self.rng, self.num_points, size).into_vec()
            }
        }
    }
}
