// SPDX-License-Identifier: AGPL-3.0-or-later
// Quiver - Arrow-Native Embedded Vector Database
// Copyright (C) 2026 Quiver Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Lloyd's k-means, shared by the IVF coarse quantizer and the product
//! quantizer's per-subspace codebook training.
//!
//! Initialisation is a seeded shuffle of the input indices with modulo
//! wrap when there are fewer points than centroids. The assignment step
//! is a parallel map (deterministic: assignment is pure, the reduction is
//! sequential); empty cells keep their previous centroid.

use quiver_core::distance::DistanceKernel;
use rand::prelude::*;
use rayon::prelude::*;

/// Run `n_iter` Lloyd iterations over `points`, producing `k` centroids.
///
/// The caller owns the RNG so that multi-codebook trainers (PQ) advance a
/// single seeded stream across calls.
pub fn lloyd<R: Rng>(
    points: &[Vec<f32>],
    k: usize,
    n_iter: usize,
    rng: &mut R,
    kernel: DistanceKernel,
) -> Vec<Vec<f32>> {
    debug_assert!(!points.is_empty() && k > 0);
    let n = points.len();
    let dim = points[0].len();

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let mut centroids: Vec<Vec<f32>> = (0..k).map(|c| points[indices[c % n]].clone()).collect();

    for _ in 0..n_iter {
        let assignments: Vec<usize> = points
            .par_iter()
            .map(|p| nearest(p, &centroids, kernel).0)
            .collect();

        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for (point, &cell) in points.iter().zip(&assignments) {
            counts[cell] += 1;
            for (acc, &x) in sums[cell].iter_mut().zip(point.iter()) {
                *acc += x;
            }
        }
        for (cell, count) in counts.iter().enumerate() {
            if *count > 0 {
                for (c, s) in centroids[cell].iter_mut().zip(&sums[cell]) {
                    *c = s / *count as f32;
                }
            }
        }
    }

    centroids
}

/// Index and squared distance of the centroid nearest to `point`.
#[inline]
pub fn nearest(point: &[f32], centroids: &[Vec<f32>], kernel: DistanceKernel) -> (usize, f32) {
    let mut best = f32::MAX;
    let mut best_cell = 0;
    for (cell, centroid) in centroids.iter().enumerate() {
        let d = kernel.l2_squared(point, centroid);
        if d < best {
            best = d;
            best_cell = cell;
        }
    }
    (best_cell, best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn two_clusters() -> Vec<Vec<f32>> {
        let mut points = Vec::new();
        for i in 0..20 {
            let jitter = (i as f32) * 0.001;
            points.push(vec![0.0 + jitter, 0.0]);
            points.push(vec![10.0 + jitter, 10.0]);
        }
        points
    }

    #[test]
    fn test_lloyd_separates_clusters() {
        let points = two_clusters();
        let mut rng = StdRng::seed_from_u64(42);
        let centroids = lloyd(&points, 2, 10, &mut rng, DistanceKernel::scalar());

        let mut origins = 0;
        for c in &centroids {
            if c[0] < 5.0 {
                origins += 1;
            }
        }
        assert_eq!(origins, 1, "one centroid per cluster, got {centroids:?}");
    }

    #[test]
    fn test_lloyd_wraps_when_fewer_points_than_centroids() {
        let points = vec![vec![1.0, 1.0], vec![2.0, 2.0]];
        let mut rng = StdRng::seed_from_u64(42);
        let centroids = lloyd(&points, 5, 3, &mut rng, DistanceKernel::scalar());
        assert_eq!(centroids.len(), 5);
    }

    #[test]
    fn test_lloyd_is_deterministic_for_a_seed() {
        let points = two_clusters();
        let run = || {
            let mut rng = StdRng::seed_from_u64(42);
            lloyd(&points, 4, 5, &mut rng, DistanceKernel::scalar())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_nearest_picks_closest() {
        let centroids = vec![vec![0.0, 0.0], vec![5.0, 5.0]];
        let (cell, dist) = nearest(&[4.5, 5.5], &centroids, DistanceKernel::scalar());
        assert_eq!(cell, 1);
        assert!((dist - 0.5).abs() < 1e-6);
    }
}
