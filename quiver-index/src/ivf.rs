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

//! Inverted-file (IVF) index.
//!
//! Partitions the vector space into `nlist` Voronoi cells learned with
//! k-means, then scans only the `nprobe` nearest cells at query time:
//! O(nprobe · n/nlist · d) per query against O(n · d) brute force, traded
//! against recall.

use quiver_core::distance::DistanceKernel;
use quiver_core::{QuiverError, Result};
use rand::prelude::*;

use crate::kmeans;

/// Centroid-training RNG seed; fixed for reproducible cell layouts.
const TRAIN_RNG_SEED: u64 = 42;

/// Default Lloyd iterations for [`IvfIndex::train_default`].
pub const DEFAULT_TRAIN_ITERS: usize = 20;

/// IVF index over owned f32 vectors.
pub struct IvfIndex {
    dim: usize,
    nlist: usize,
    nprobe: usize,
    trained: bool,
    kernel: DistanceKernel,
    centroids: Vec<Vec<f32>>,
    inverted_lists: Vec<Vec<u32>>,
    vectors: Vec<Vec<f32>>,
}

impl IvfIndex {
    pub fn new(dim: usize, nlist: usize, nprobe: usize) -> Self {
        Self {
            dim,
            nlist,
            nprobe,
            trained: false,
            kernel: DistanceKernel::detect(),
            centroids: Vec::new(),
            inverted_lists: vec![Vec::new(); nlist],
            vectors: Vec::new(),
        }
    }

    /// Learn the `nlist` cell centroids with Lloyd's k-means.
    pub fn train(&mut self, data: &[Vec<f32>], n_iter: usize) -> Result<()> {
        if data.is_empty() {
            return Err(QuiverError::InvalidConfig(
                "IVF training requires at least one vector".into(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(TRAIN_RNG_SEED);
        self.centroids = kmeans::lloyd(data, self.nlist, n_iter, &mut rng, self.kernel);
        self.trained = true;
        Ok(())
    }

    pub fn train_default(&mut self, data: &[Vec<f32>]) -> Result<()> {
        self.train(data, DEFAULT_TRAIN_ITERS)
    }

    /// Store `data` and assign each vector to its nearest cell. Replaces
    /// any previously added vectors.
    pub fn add(&mut self, data: &[Vec<f32>]) -> Result<()> {
        if !self.trained {
            return Err(QuiverError::NotTrained);
        }

        self.vectors = data.to_vec();
        for list in &mut self.inverted_lists {
            list.clear();
        }
        for (i, v) in data.iter().enumerate() {
            let (cell, _) = kmeans::nearest(v, &self.centroids, self.kernel);
            self.inverted_lists[cell].push(i as u32);
        }
        Ok(())
    }

    /// k approximate nearest neighbors as `(id, euclidean_distance)`,
    /// ascending: rank cells by centroid distance, scan the `nprobe`
    /// nearest, re-rank their members exactly.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        if !self.trained {
            return Err(QuiverError::NotTrained);
        }

        let mut cell_dists: Vec<(f32, usize)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(c, centroid)| (self.kernel.l2_squared(query, centroid), c))
            .collect();

        let probes = self.nprobe.min(self.nlist);
        if probes == 0 {
            return Ok(Vec::new());
        }
        if probes < cell_dists.len() {
            cell_dists.select_nth_unstable_by(probes - 1, |a, b| a.0.total_cmp(&b.0));
        }

        let mut candidates: Vec<(u32, f32)> = Vec::new();
        for &(_, cell) in cell_dists.iter().take(probes) {
            for &idx in &self.inverted_lists[cell] {
                let d = self
                    .kernel
                    .l2_squared(query, &self.vectors[idx as usize])
                    .sqrt();
                candidates.push((idx, d));
            }
        }

        let k = k.min(candidates.len());
        if k > 0 && k < candidates.len() {
            candidates.select_nth_unstable_by(k - 1, |a, b| a.1.total_cmp(&b.1));
        }
        candidates.truncate(k);
        candidates.sort_unstable_by(|a, b| a.1.total_cmp(&b.1));
        Ok(candidates)
    }

    pub fn set_nprobe(&mut self, nprobe: usize) {
        self.nprobe = nprobe;
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_data() -> Vec<Vec<f32>> {
        // 4 well-separated clusters of 10 points each
        let mut data = Vec::new();
        for (cx, cy) in [(0.0f32, 0.0f32), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)] {
            for i in 0..10 {
                data.push(vec![cx + (i as f32) * 0.01, cy + (i as f32) * 0.01]);
            }
        }
        data
    }

    #[test]
    fn test_add_before_train_fails() {
        let mut index = IvfIndex::new(2, 4, 2);
        assert!(matches!(
            index.add(&[vec![0.0, 0.0]]),
            Err(QuiverError::NotTrained)
        ));
    }

    #[test]
    fn test_search_before_train_fails() {
        let index = IvfIndex::new(2, 4, 2);
        assert!(matches!(
            index.search(&[0.0, 0.0], 1),
            Err(QuiverError::NotTrained)
        ));
    }

    #[test]
    fn test_self_query_returns_self() {
        let data = grid_data();
        let mut index = IvfIndex::new(2, 4, 4);
        index.train(&data, 10).unwrap();
        index.add(&data).unwrap();

        for i in [0usize, 15, 39] {
            let hits = index.search(&data[i], 1).unwrap();
            assert_eq!(hits[0].0, i as u32);
            assert!(hits[0].1 < 1e-5);
        }
    }

    #[test]
    fn test_results_ascend_and_respect_k() {
        let data = grid_data();
        let mut index = IvfIndex::new(2, 4, 4);
        index.train(&data, 10).unwrap();
        index.add(&data).unwrap();

        let hits = index.search(&[0.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 5);
        for pair in hits.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn test_nprobe_limits_scanned_cells() {
        // Train on one anchor per cluster so each cell is pinned to it.
        let mut index = IvfIndex::new(2, 2, 1);
        index
            .train(&[vec![0.0, 0.0], vec![100.0, 100.0]], 5)
            .unwrap();

        let mut data = Vec::new();
        for i in 0..20 {
            data.push(vec![i as f32 * 0.01, 0.0]);
        }
        for i in 0..20 {
            data.push(vec![100.0 + i as f32 * 0.01, 100.0]);
        }
        index.add(&data).unwrap();

        // A single probe reaches only the near cell.
        let hits = index.search(&[0.0, 0.0], 40).unwrap();
        assert_eq!(hits.len(), 20);
        assert!(hits.iter().all(|&(id, _)| id < 20));

        // Probing every cell makes the scan exhaustive.
        let mut index_all = IvfIndex::new(2, 2, 2);
        index_all
            .train(&[vec![0.0, 0.0], vec![100.0, 100.0]], 5)
            .unwrap();
        index_all.add(&data).unwrap();
        assert_eq!(index_all.search(&[0.0, 0.0], 40).unwrap().len(), 40);
    }

    #[test]
    fn test_train_on_fewer_points_than_cells() {
        let mut index = IvfIndex::new(2, 8, 8);
        index
            .train(&[vec![0.0, 0.0], vec![1.0, 1.0]], 5)
            .unwrap();
        index.add(&[vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
        let hits = index.search(&[0.1, 0.1], 2).unwrap();
        assert_eq!(hits[0].0, 0);
    }
}
