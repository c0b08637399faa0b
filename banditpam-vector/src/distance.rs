/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! Reference implementations of the pairwise kernels.
//!
//! All functions require `x.len() == y.len()` and panic otherwise.

/// Sum of absolute coordinate differences.
pub fn l1(x: &[f32], y: &[f32]) -> f32 {
    assert_eq!(x.len(), y.len());
    std::iter::zip(x.iter(), y.iter()).fold(0.0f32, |acc, (&a, &b)| acc + (a - b).abs())
}

/// Squared Euclidean norm of the coordinate difference.
pub fn squared_l2(x: &[f32], y: &[f32]) -> f32 {
    assert_eq!(x.len(), y.len());
    std::iter::zip(x.iter(), y.iter()).fold(0.0f32, |acc, (&a, &b)| {
        let diff = a - b;
        diff.mul_add(diff, acc)
    })
}

/// Euclidean norm of the coordinate difference.
pub fn l2(x: &[f32], y: &[f32]) -> f32 {
    squared_l2(x, y).sqrt()
}

#[derive(Default)]
struct XY {
    xnorm: f32,
    ynorm: f32,
    xy: f32,
}

/// Raw cosine similarity in `[-1, 1]`.
///
/// Returns 0 when either vector has a norm below `f32::MIN_POSITIVE`.
pub fn cosine_similarity(x: &[f32], y: &[f32]) -> f32 {
    assert_eq!(x.len(), y.len());
    let r: XY = std::iter::zip(x.iter(), y.iter()).fold(XY::default(), |acc, (&vx, &vy)| XY {
        xnorm: vx.mul_add(vx, acc.xnorm),
        ynorm: vy.mul_add(vy, acc.ynorm),
        xy: vx.mul_add(vy, acc.xy),
    });

    if r.xnorm < f32::MIN_POSITIVE || r.ynorm < f32::MIN_POSITIVE {
        return 0.0;
    }

    (r.xy / (r.xnorm.sqrt() * r.ynorm.sqrt())).clamp(-1.0, 1.0)
}

/// `1 - cos(x, y)`, a dissimilarity in `[0, 2]`.
pub fn cosine_distance(x: &[f32], y: &[f32]) -> f32 {
    1.0 - cosine_similarity(x, y)
}
