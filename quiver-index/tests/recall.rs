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

//! Recall bounds for the approximate indices against the brute-force
//! baseline, on unit-Gaussian data.

use quiver_core::distance::brute_force_knn;
use quiver_index::hnsw::{HnswConfig, HnswIndex};
use quiver_index::ivf::IvfIndex;
use rand::prelude::*;
use rand_distr::StandardNormal;

const N: usize = 1_000;
const DIM: usize = 32;
const K: usize = 10;
const NUM_QUERIES: usize = 10;

fn gaussian_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.sample(StandardNormal)).collect())
        .collect()
}

fn flatten(data: &[Vec<f32>]) -> Vec<f32> {
    data.iter().flatten().copied().collect()
}

fn recall_at_k(approx: &[u32], exact: &[(f32, usize)]) -> f32 {
    let truth: Vec<u32> = exact.iter().map(|&(_, i)| i as u32).collect();
    let hits = approx.iter().filter(|id| truth.contains(id)).count();
    hits as f32 / truth.len() as f32
}

#[test]
fn hnsw_recall_at_10_beats_bound() {
    let data = gaussian_vectors(N, DIM, 1);
    let queries = gaussian_vectors(NUM_QUERIES, DIM, 2);
    let flat = flatten(&data);

    let mut index = HnswIndex::new(
        DIM,
        HnswConfig {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
        },
    );
    index.build(data.clone());

    let mut total = 0.0f32;
    for q in &queries {
        let approx: Vec<u32> = index.search(q, K).iter().map(|&(id, _)| id).collect();
        let exact = brute_force_knn(q, &flat, DIM, K);
        total += recall_at_k(&approx, &exact);
    }

    let mean = total / NUM_QUERIES as f32;
    assert!(mean >= 0.7, "HNSW mean recall@10 = {mean}");
}

#[test]
fn ivf_recall_at_10_beats_bound() {
    let data = gaussian_vectors(N, DIM, 1);
    let queries = gaussian_vectors(NUM_QUERIES, DIM, 2);
    let flat = flatten(&data);

    let mut index = IvfIndex::new(DIM, 50, 10);
    index.train(&data, 15).unwrap();
    index.add(&data).unwrap();

    let mut total = 0.0f32;
    for q in &queries {
        let approx: Vec<u32> = index
            .search(q, K)
            .unwrap()
            .iter()
            .map(|&(id, _)| id)
            .collect();
        let exact = brute_force_knn(q, &flat, DIM, K);
        total += recall_at_k(&approx, &exact);
    }

    let mean = total / NUM_QUERIES as f32;
    assert!(mean >= 0.5, "IVF mean recall@10 = {mean}");
}

#[test]
fn hnsw_approximate_distances_match_exact_for_top_hit() {
    let data = gaussian_vectors(200, DIM, 3);
    let flat = flatten(&data);

    let mut index = HnswIndex::new(DIM, HnswConfig::default());
    index.build(data.clone());

    let exact = brute_force_knn(&data[11], &flat, DIM, 1);
    let hits = index.search(&data[11], 1);
    assert_eq!(hits[0].0 as usize, exact[0].1);
    assert!((hits[0].1 - exact[0].0.sqrt()).abs() < 1e-5);
}
