/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::sync::atomic::{AtomicU32, Ordering};

use banditpam_vector::Metric;

use super::Dataset;

/// Sentinel marking a cache cell as not yet computed.
const SENTINEL: f32 = -1.0;

/// Reindex entry for points outside the cached permutation prefix.
const UNCACHED: u32 = u32::MAX;

/// Memoized dissimilarities `d(i, p_c)` for every point `i` and the first
/// `width` entries `p_0..p_{width-1}` of the fit permutation.
///
/// Each cell is one `AtomicU32` holding the `f32` bit pattern, initialized to
/// the bits of `-1.0`. Loads and stores are `Relaxed`: concurrent writers can
/// only store the same deterministic value, so the race is benign. Once
/// written, a cell is never overwritten with a different value.
///
/// A dissimilarity that legitimately equals `-1.0` (possible for the raw
/// cosine metric) is indistinguishable from the sentinel and is recomputed on
/// every lookup.
#[derive(Debug)]
pub struct DistanceCache {
    cells: Box<[AtomicU32]>,
    width: usize,
    reindex: Box<[u32]>,
}

impl DistanceCache {
    /// Build a cache over `num_points` points, memoizing the first `width`
    /// entries of `permutation`.
    pub fn new(num_points: usize, width: usize, permutation: &[usize]) -> Self {
        let width = width.min(num_points);
        let cells: Box<[AtomicU32]> = (0..num_points * width)
            .map(|_| AtomicU32::new(SENTINEL.to_bits()))
            .collect();

        let mut reindex = vec![UNCACHED; num_points].into_boxed_slice();
        for (column, &point) in permutation.iter().take(width).enumerate() {
            reindex[point] = column as u32;
        }

        Self {
            cells,
            width,
            reindex,
        }
    }

    /// The number of cached reference columns `m`.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Return the memoized value of `compute()` for the pair `(i, j)`, or
    /// `compute()` directly when `j` is not among the cached columns.
    #[inline]
    pub fn get_or_insert_with<F>(&self, i: usize, j: usize, compute: F) -> f32
    where
        F: FnOnce() -> f32,
    {
        let column = self.reindex[j];
        if column == UNCACHED {
            return compute();
        }

        let cell = &self.cells[i * self.width + column as usize];
        let bits = cell.load(Ordering::Relaxed);
        if bits != SENTINEL.to_bits() {
            return f32::from_bits(bits);
        }

        let value = compute();
        cell.store(value.to_bits(), Ordering::Relaxed);
        value
    }
}

////////////////
// CachedLoss //
////////////////

/// The pairwise loss function used throughout a fit, optionally backed by a
/// [`DistanceCache`].
#[derive(Debug)]
pub struct CachedLoss<'a> {
    data: &'a Dataset,
    metric: Metric,
    cache: Option<DistanceCache>,
}

impl<'a> CachedLoss<'a> {
    /// Wrap `data` and `metric`, memoizing lookups in `cache` when provided.
    pub fn new(data: &'a Dataset, metric: Metric, cache: Option<DistanceCache>) -> Self {
        Self {
            data,
            metric,
            cache,
        }
    }

    /// A pass-through loss with no memoization.
    pub fn uncached(data: &'a Dataset, metric: Metric) -> Self {
        Self::new(data, metric, None)
    }

    /// The underlying dataset.
    pub fn data(&self) -> &Dataset {
        self.data
    }

    /// The configured metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Evaluate `d(i, j)`, consulting the cache when `j` is a cached column.
    #[inline]
    pub fn eval(&self, i: usize, j: usize) -> f32 {
        match &self.cache {
            Some(cache) => cache.get_or_insert_with(i, j, || self.direct(i, j)),
            None => self.direct(i, j),
        }
    }

    #[inline]
    fn direct(&self, i: usize, j: usize) -> f32 {
        self.metric.evaluate(self.data.point(i), self.data.point(j))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn four_points() -> Dataset {
        Dataset::from_rows(&[0.0, 0.0, 3.0, 4.0, 1.0, 0.0, 0.0, 2.0], 4, 2).unwrap()
    }

    #[test]
    fn test_cache_hits_skip_recomputation() {
        let cache = DistanceCache::new(4, 2, &[2, 0, 1, 3]);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::Relaxed);
            5.0
        };

        // Point 2 is a cached column.
        assert_eq!(cache.get_or_insert_with(1, 2, compute), 5.0);
        assert_eq!(cache.get_or_insert_with(1, 2, compute), 5.0);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_uncached_columns_always_recompute() {
        let cache = DistanceCache::new(4, 2, &[2, 0, 1, 3]);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::Relaxed);
            5.0
        };

        // Points 1 and 3 fall outside the width-2 prefix.
        assert_eq!(cache.get_or_insert_with(0, 1, compute), 5.0);
        assert_eq!(cache.get_or_insert_with(0, 1, compute), 5.0);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_sentinel_valued_losses_never_cache() {
        let cache = DistanceCache::new(2, 2, &[0, 1]);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::Relaxed);
            -1.0
        };

        assert_eq!(cache.get_or_insert_with(0, 1, compute), -1.0);
        assert_eq!(cache.get_or_insert_with(0, 1, compute), -1.0);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_zero_width_cache_is_a_pass_through() {
        let cache = DistanceCache::new(3, 0, &[1, 2, 0]);
        assert_eq!(cache.width(), 0);
        assert_eq!(cache.get_or_insert_with(0, 1, || 7.0), 7.0);
    }

    #[test]
    fn test_cached_loss_matches_direct_evaluation() {
        let data = four_points();
        let permutation = [3, 1, 0, 2];
        let cached = CachedLoss::new(
            &data,
            Metric::L2,
            Some(DistanceCache::new(4, 2, &permutation)),
        );
        let direct = CachedLoss::uncached(&data, Metric::L2);

        for i in 0..4 {
            for j in 0..4 {
                // Repeated lookups return identical values.
                assert_eq!(cached.eval(i, j), cached.eval(i, j));
                assert_eq!(cached.eval(i, j), direct.eval(i, j));
            }
        }
    }
}
