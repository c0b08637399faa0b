/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

/// One candidate swap: replace the medoid in `slot` with `point`.
///
/// The swap phase addresses its `K x N` arm space through a linear index
/// `point * K + slot`. Every place that touches that space (sigma estimation,
/// mean estimation, argmin extraction) converts through this type so the
/// decomposition cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapArm {
    /// The medoid position being replaced, in `[0, K)`.
    pub slot: usize,
    /// The candidate point, in `[0, N)`.
    pub point: usize,
}

impl SwapArm {
    /// Decompose a linear arm index for a fit with `num_medoids` slots.
    #[inline]
    pub fn from_linear(index: usize, num_medoids: usize) -> Self {
        Self {
            slot: index % num_medoids,
            point: index / num_medoids,
        }
    }

    /// The linear index of this arm for a fit with `num_medoids` slots.
    #[inline]
    pub fn to_linear(self, num_medoids: usize) -> usize {
        self.point * num_medoids + self.slot
    }
}
