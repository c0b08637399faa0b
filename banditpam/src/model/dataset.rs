/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use crate::error::{FitError, FitResult};

/// The point matrix: `N` points of dimension `d`, each point stored
/// contiguously.
///
/// Callers hand the engine a row-major `N x d` buffer; reinterpreted
/// column-major as `d x N`, each column is one point and is already
/// contiguous, so construction validates and copies without reshuffling.
/// Immutable once a fit begins.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    data: Box<[f32]>,
    num_points: usize,
    dim: usize,
}

impl Dataset {
    /// Build a dataset from a row-major `num_points x dim` buffer.
    pub fn from_rows(points: &[f32], num_points: usize, dim: usize) -> FitResult<Self> {
        if num_points == 0 || dim == 0 {
            return Err(FitError::EmptyInput);
        }
        if points.len() != num_points * dim {
            return Err(FitError::ShapeMismatch {
                len: points.len(),
                num_points,
                dim,
            });
        }
        Ok(Self {
            data: points.into(),
            num_points,
            dim,
        })
    }

    /// The number of points `N`.
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// The dimension `d` of each point.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Return point `i` as a slice of length `dim`.
    ///
    /// # Panic
    ///
    /// Panics if `i >= self.num_points()`.
    pub fn point(&self, i: usize) -> &[f32] {
        assert!(
            i < self.num_points,
            "tried to access point {i} of a dataset with {} points",
            self.num_points
        );
        &self.data[i * self.dim..(i + 1) * self.dim]
    }
}
