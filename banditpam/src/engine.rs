/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! The fitting façade.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::algorithm::{bandit::BanditPam, fastpam::FastPam1, FitContext, Strategy};
use crate::config::{Algorithm, FitConfig};
use crate::error::{FitError, FitResult};
use crate::model::{CachedLoss, Dataset, DistanceCache, ReferenceSampler};
use crate::profile::ProfileWriter;

/// The results of one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOutput {
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

/// The k-medoids engine.
///
/// Owns a validated [`FitConfig`] and runs the configured algorithm against
/// caller-provided data. The engine holds no data between fits; everything a
/// fit allocates (cache, permutation, per-arm state) lives for that call
/// only.
#[derive(Debug, Clone)]
pub struct KMedoids {
    config: FitConfig,
}

impl KMedoids {
    /// Create an engine from a validated configuration.
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Cluster a row-major `num_points x dim` matrix.
    pub fn fit(&self, points: &[f32], num_points: usize, dim: usize) -> FitResult<FitOutput> {
        let started = Instant::now();
        let data = Dataset::from_rows(points, num_points, dim)?;
        let num_points = data.num_points();
        let num_medoids = self.config.n_medoids();
        if num_medoids > num_points {
            return Err(FitError::Config {
                parameter: "n_medoids",
                reason: format!("requested {num_medoids} medoids from {num_points} points"),
            });
        }

        let rng = match self.config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        // The cache belongs to the bandit path; the exact algorithm touches
        // every pair once per pass and gains nothing from memoization.
        let use_cache =
            self.config.use_cache() && self.config.algorithm() == Algorithm::BanditPam;
        let sampler = ReferenceSampler::new(num_points, self.config.use_perm(), use_cache, rng);
        let cache = use_cache.then(|| {
            let width = cache_width(num_points, self.config.cache_multiplier());
            DistanceCache::new(num_points, width, sampler.permutation())
        });

        let loss = CachedLoss::new(&data, self.config.metric(), cache);
        let profile = match self.config.log_path() {
            Some(path) => Some(ProfileWriter::append(path)?),
            None => None,
        };

        let mut ctx = FitContext {
            config: &self.config,
            loss,
            sampler,
            profile,
        };
        if let Some(writer) = ctx.profile.as_mut() {
            writer.record_fit_start(
                self.config.algorithm().as_str(),
                self.config.metric().as_str(),
                num_points,
                num_medoids,
            )?;
        }

        let fitted = match self.config.algorithm() {
            Algorithm::BanditPam => BanditPam.fit(&mut ctx)?,
            Algorithm::Naive => FastPam1.fit(&mut ctx)?,
        };

        if let Some(writer) = ctx.profile.as_mut() {
            writer.flush()?;
        }

        info!(
            algorithm = %self.config.algorithm(),
            metric = %self.config.metric(),
            n = num_points,
            k = num_medoids,
            steps = fitted.steps,
            total_loss = fitted.total_loss,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fit complete"
        );

        Ok(FitOutput {
            medoids_build: fitted.medoids_build,
            medoids: fitted.medoids,
            labels: fitted.labels,
            steps: fitted.steps,
            total_loss: fitted.total_loss,
            loss_trace: fitted.loss_trace,
        })
    }
}

/// The cache holds `d(i, p_c)` for the first `m` permutation entries, with
/// `m = min(N, ceil(log10(N) * multiplier))`.
fn cache_width(num_points: usize, multiplier: f64) -> usize {
    num_points.min(((num_points as f64).log10() * multiplier).ceil() as usize)
}

#[cfg(test)]
mod tests {
    use banditpam_vector::Metric;
    use rstest::rstest;

    use super::*;
    use crate::config::FitConfig;

    fn point(points: &[f32], dim: usize, i: usize) -> &[f32] {
        &points[i * dim..(i + 1) * dim]
    }

    /// The post-fit invariants every fixture must satisfy.
    fn assert_fit_invariants(
        output: &FitOutput,
        points: &[f32],
        num_points: usize,
        dim: usize,
        num_medoids: usize,
        metric: Metric,
    ) {
        for medoids in [&output.medoids_build, &output.medoids] {
            assert_eq!(medoids.len(), num_medoids);
            assert!(medoids.iter().all(|&m| m < num_points));
            let mut sorted = medoids.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), num_medoids, "medoids must be distinct");
        }

        assert_eq!(output.labels.len(), num_points);
        assert!(output.labels.iter().all(|&l| l < num_medoids));

        let mut total = 0.0f64;
        for i in 0..num_points {
            let best = output
                .medoids
                .iter()
                .map(|&m| metric.evaluate(point(points, dim, m), point(points, dim, i)))
                .fold(f32::INFINITY, f32::min);
            let assigned = metric.evaluate(
                point(points, dim, output.medoids[output.labels[i]]),
                point(points, dim, i),
            );
            assert!(
                (assigned - best).abs() <= 1e-5,
                "label of point {i} does not achieve its best distance"
            );
            total += best as f64;
        }
        assert!(
            (total - output.total_loss).abs() <= 1e-3 * total.abs().max(1.0),
            "reported loss {} disagrees with recomputed loss {total}",
            output.total_loss
        );
    }

    fn gaussian_blobs(seed: u64, per_center: usize, centers: &[(f32, f32)], std_dev: f32) -> Vec<f32> {
        use rand_distr::{Distribution, Normal};
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0f32, std_dev).unwrap();
        let mut points = Vec::with_capacity(per_center * centers.len() * 2);
        for &(cx, cy) in centers {
            for _ in 0..per_center {
                points.push(cx + normal.sample(&mut rng));
                points.push(cy + normal.sample(&mut rng));
            }
        }
        points
    }

    /// Exact optimum for k = 2 by enumerating every medoid pair.
    fn brute_force_two_medoid_loss(points: &[f32], num_points: usize, dim: usize) -> f64 {
        let mut best = f64::INFINITY;
        for a in 0..num_points {
            for b in (a + 1)..num_points {
                let loss: f64 = (0..num_points)
                    .map(|i| {
                        let da = Metric::L2.evaluate(point(points, dim, a), point(points, dim, i));
                        let db = Metric::L2.evaluate(point(points, dim, b), point(points, dim, i));
                        da.min(db) as f64
                    })
                    .sum();
                best = best.min(loss);
            }
        }
        best
    }

    // Two tight unit squares far apart, plus two stragglers between them.
    fn two_squares_and_stragglers() -> Vec<f32> {
        vec![
            0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, // square A
            10.0, 10.0, 10.0, 11.0, 11.0, 10.0, 11.0, 11.0, // square B
            5.0, 5.0, 5.0, 6.0, // stragglers
        ]
    }

    #[rstest]
    #[case(Algorithm::BanditPam)]
    #[case(Algorithm::Naive)]
    fn test_two_squares_yield_one_medoid_per_square(#[case] algorithm: Algorithm) {
        let points = two_squares_and_stragglers();
        let config = FitConfig::builder(2)
            .algorithm(algorithm)
            .metric(Metric::L2)
            .seed(42)
            .build()
            .unwrap();
        let output = KMedoids::new(config).fit(&points, 10, 2).unwrap();
        assert_fit_invariants(&output, &points, 10, 2, 2, Metric::L2);

        let in_square_a = output.medoids.iter().filter(|&&m| m < 4).count();
        let in_square_b = output.medoids.iter().filter(|&&m| (4..8).contains(&m)).count();
        assert_eq!((in_square_a, in_square_b), (1, 1));

        let optimum = brute_force_two_medoid_loss(&points, 10, 2);
        approx::assert_relative_eq!(output.total_loss, optimum, max_relative = 1e-5);
    }

    #[rstest]
    #[case(Algorithm::BanditPam)]
    #[case(Algorithm::Naive)]
    fn test_single_point(#[case] algorithm: Algorithm) {
        let config = FitConfig::builder(1)
            .algorithm(algorithm)
            .seed(0)
            .build()
            .unwrap();
        let output = KMedoids::new(config).fit(&[3.5, -1.0], 1, 2).unwrap();
        assert_eq!(output.medoids, vec![0]);
        assert_eq!(output.medoids_build, vec![0]);
        assert_eq!(output.labels, vec![0]);
        assert_eq!(output.steps, 0);
        assert_eq!(output.total_loss, 0.0);
    }

    #[rstest]
    #[case(Algorithm::BanditPam)]
    #[case(Algorithm::Naive)]
    fn test_identical_points_have_zero_loss_and_distinct_medoids(#[case] algorithm: Algorithm) {
        let points = vec![7.25f32; 50 * 3];
        let config = FitConfig::builder(3)
            .algorithm(algorithm)
            .seed(9)
            .build()
            .unwrap();
        let output = KMedoids::new(config).fit(&points, 50, 3).unwrap();
        assert_fit_invariants(&output, &points, 50, 3, 3, Metric::L2);
        assert_eq!(output.total_loss, 0.0);
    }

    #[rstest]
    #[case(Algorithm::BanditPam)]
    #[case(Algorithm::Naive)]
    fn test_k_equals_n_makes_every_point_a_medoid(#[case] algorithm: Algorithm) {
        let points = gaussian_blobs(11, 6, &[(0.0, 0.0)], 5.0);
        let config = FitConfig::builder(6)
            .algorithm(algorithm)
            .seed(11)
            .build()
            .unwrap();
        let output = KMedoids::new(config).fit(&points, 6, 2).unwrap();
        assert_fit_invariants(&output, &points, 6, 2, 6, Metric::L2);
        assert_eq!(output.total_loss, 0.0);

        let mut medoids = output.medoids.clone();
        medoids.sort_unstable();
        assert_eq!(medoids, (0..6).collect::<Vec<_>>());
        let mut labels = output.labels.clone();
        labels.sort_unstable();
        assert_eq!(labels, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_raw_cosine_axes_reach_the_optimum() {
        // Unit vectors at 0, 90, 180, and 270 degrees. Under the raw cosine
        // similarity every pair of distinct medoids is co-optimal at -2; the
        // fit must land on one of those optima with distinct medoids.
        let points = vec![1.0, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0, -1.0];
        let config = FitConfig::builder(2)
            .metric(Metric::CosineSimilarity)
            .seed(3)
            .build()
            .unwrap();
        let output = KMedoids::new(config).fit(&points, 4, 2).unwrap();
        assert_fit_invariants(&output, &points, 4, 2, 2, Metric::CosineSimilarity);
        approx::assert_relative_eq!(output.total_loss, -2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_raw_cosine_places_medoids_opposite_dense_directions() {
        // Two antipodal direction clusters. Minimizing the raw similarity
        // forces one medoid into each cluster: each point then scores about
        // -1 against the opposite cluster's medoid. This is the
        // cosine-as-loss caveat made visible; `cosinedistance` is the
        // conventional alternative.
        let points = vec![
            1.0, 0.0, 0.995, 0.1, 0.995, -0.1, // near 0 degrees
            -1.0, 0.0, -0.995, 0.1, -0.995, -0.1, // near 180 degrees
        ];
        let config = FitConfig::builder(2)
            .metric(Metric::CosineSimilarity)
            .seed(5)
            .build()
            .unwrap();
        let output = KMedoids::new(config).fit(&points, 6, 2).unwrap();
        assert_fit_invariants(&output, &points, 6, 2, 2, Metric::CosineSimilarity);

        let east = output.medoids.iter().filter(|&&m| m < 3).count();
        let west = output.medoids.iter().filter(|&&m| m >= 3).count();
        assert_eq!((east, west), (1, 1));
    }

    #[test]
    fn test_bandit_matches_naive_on_separated_blobs() {
        // N equals the default batch size, so every arm is computed exactly
        // and the bandit must agree with FastPAM1 arm for arm.
        let points = gaussian_blobs(7, 33, &[(0.0, 0.0), (25.0, 0.0), (0.0, 25.0)], 1.0);
        let num_points = 99;

        let bandit = KMedoids::new(
            FitConfig::builder(3).seed(123).build().unwrap(),
        )
        .fit(&points, num_points, 2)
        .unwrap();
        let naive = KMedoids::new(
            FitConfig::builder(3)
                .algorithm(Algorithm::Naive)
                .seed(123)
                .build()
                .unwrap(),
        )
        .fit(&points, num_points, 2)
        .unwrap();

        assert_fit_invariants(&bandit, &points, num_points, 2, 3, Metric::L2);
        assert_fit_invariants(&naive, &points, num_points, 2, 3, Metric::L2);

        let mut bandit_medoids = bandit.medoids.clone();
        let mut naive_medoids = naive.medoids.clone();
        bandit_medoids.sort_unstable();
        naive_medoids.sort_unstable();
        assert_eq!(bandit_medoids, naive_medoids);
        approx::assert_relative_eq!(bandit.total_loss, naive.total_loss, max_relative = 1e-6);
    }

    #[test]
    fn test_exact_fallback_when_batch_covers_the_data() {
        // batch_size >= N forces exact computation regardless of N.
        let points = gaussian_blobs(17, 20, &[(0.0, 0.0), (12.0, 12.0)], 1.5);
        let num_points = 40;

        let bandit = KMedoids::new(
            FitConfig::builder(2)
                .batch_size(500)
                .seed(1)
                .build()
                .unwrap(),
        )
        .fit(&points, num_points, 2)
        .unwrap();
        let naive = KMedoids::new(
            FitConfig::builder(2)
                .algorithm(Algorithm::Naive)
                .batch_size(500)
                .seed(1)
                .build()
                .unwrap(),
        )
        .fit(&points, num_points, 2)
        .unwrap();

        let mut bandit_medoids = bandit.medoids.clone();
        let mut naive_medoids = naive.medoids.clone();
        bandit_medoids.sort_unstable();
        naive_medoids.sort_unstable();
        assert_eq!(bandit_medoids, naive_medoids);
    }

    #[test]
    fn test_oracle_agreement_under_sampling() {
        // batch_size < N: the bandit actually samples. With well separated
        // blobs the loss must land within 1% of the exact optimum.
        let points = gaussian_blobs(29, 50, &[(0.0, 0.0), (20.0, 0.0), (0.0, 20.0)], 0.5);
        let num_points = 150;

        let bandit = KMedoids::new(
            FitConfig::builder(3).seed(77).build().unwrap(),
        )
        .fit(&points, num_points, 2)
        .unwrap();
        let naive = KMedoids::new(
            FitConfig::builder(3)
                .algorithm(Algorithm::Naive)
                .seed(77)
                .build()
                .unwrap(),
        )
        .fit(&points, num_points, 2)
        .unwrap();

        assert_fit_invariants(&bandit, &points, num_points, 2, 3, Metric::L2);
        assert!(
            bandit.total_loss <= naive.total_loss * 1.01,
            "bandit loss {} exceeds oracle loss {} by more than 1%",
            bandit.total_loss,
            naive.total_loss
        );
    }

    #[test]
    fn test_fit_is_idempotent_under_a_pinned_seed() {
        let points = gaussian_blobs(3, 40, &[(0.0, 0.0), (15.0, 5.0)], 1.0);
        let config = FitConfig::builder(2).seed(99).build().unwrap();
        let engine = KMedoids::new(config);
        let first = engine.fit(&points, 80, 2).unwrap();
        let second = engine.fit(&points, 80, 2).unwrap();
        assert_eq!(first, second);
    }

    #[rstest]
    #[case(Algorithm::BanditPam)]
    #[case(Algorithm::Naive)]
    fn test_loss_is_non_increasing_across_swap_iterations(#[case] algorithm: Algorithm) {
        let points = gaussian_blobs(13, 25, &[(0.0, 0.0), (9.0, 0.0), (0.0, 9.0)], 2.0);
        let config = FitConfig::builder(3)
            .algorithm(algorithm)
            .batch_size(200) // exact regime: every arm estimate is exact
            .seed(5)
            .build()
            .unwrap();
        let output = KMedoids::new(config).fit(&points, 75, 2).unwrap();
        assert!(!output.loss_trace.is_empty());
        for pair in output.loss_trace.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-6 * pair[0].abs().max(1.0));
        }
        approx::assert_relative_eq!(
            output.total_loss,
            *output.loss_trace.last().unwrap(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_uncached_and_unpermuted_fit_agrees_in_the_exact_regime() {
        let points = gaussian_blobs(19, 30, &[(0.0, 0.0), (14.0, 14.0)], 1.0);
        let base = KMedoids::new(FitConfig::builder(2).seed(31).build().unwrap())
            .fit(&points, 60, 2)
            .unwrap();
        let plain = KMedoids::new(
            FitConfig::builder(2)
                .use_cache(false)
                .use_perm(false)
                .seed(31)
                .build()
                .unwrap(),
        )
        .fit(&points, 60, 2)
        .unwrap();

        // N <= batch size, so sampling never happens and the sampler mode
        // cannot influence the result.
        let mut a = base.medoids.clone();
        let mut b = plain.medoids.clone();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_larger_than_n_is_rejected() {
        let config = FitConfig::builder(5).build().unwrap();
        let err = KMedoids::new(config).fit(&[0.0, 1.0, 2.0], 3, 1).unwrap_err();
        assert!(matches!(
            err,
            FitError::Config {
                parameter: "n_medoids",
                ..
            }
        ));
    }

    #[test]
    fn test_bad_shapes_are_rejected() {
        let config = FitConfig::builder(1).build().unwrap();
        let engine = KMedoids::new(config);
        assert!(matches!(engine.fit(&[], 0, 3), Err(FitError::EmptyInput)));
        assert!(matches!(engine.fit(&[], 3, 0), Err(FitError::EmptyInput)));
        assert!(matches!(
            engine.fit(&[1.0, 2.0, 3.0], 2, 2),
            Err(FitError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_profile_log_records_the_fit() {
        let path = std::env::temp_dir().join(format!(
            "banditpam-engine-profile-{}.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let points = two_squares_and_stragglers();
        let config = FitConfig::builder(2)
            .seed(42)
            .log_path(&path)
            .build()
            .unwrap();
        KMedoids::new(config).fit(&points, 10, 2).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("fit algorithm=banditpam"));
        assert!(contents.contains("build slot=0"));
        assert!(contents.contains("build slot=1"));
        assert!(contents.contains("swap iter=1"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_cache_width() {
        assert_eq!(cache_width(1, 1_000.0), 0);
        assert_eq!(cache_width(10, 1_000.0), 10);
        assert_eq!(cache_width(100_000, 1_000.0), 5_000);
        assert_eq!(cache_width(100, 1.5), 3);
    }
}
