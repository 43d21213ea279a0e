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

//! Locality-sensitive hashing.
//!
//! Two schemes sharing one table layout (`L` tables, each mapping a
//! `k`-component signature to a bucket of vector ids):
//!
//! - [`RandomHyperplaneLsh`] for cosine similarity: each signature bit is
//!   the sign of a dot product with a random Gaussian hyperplane, so
//!   `Pr[h(x) = h(y)] = 1 − θ(x, y)/π`.
//! - [`EuclideanLsh`] (p-stable): each signature component is
//!   `⌊(a·x + b) / w⌋` with `a ~ N(0, I)` and `b ~ U[0, w)`.
//!
//! Queries take the union of matching buckets across tables and re-rank
//! the candidates exactly (cosine descending, respectively L2 ascending).

use std::collections::{HashMap, HashSet};

use quiver_core::distance::{cosine_similarity, inner_product_scalar, l2_squared_scalar};
use rand::prelude::*;
use rand_distr::StandardNormal;

/// Default number of hash tables (more tables, higher recall).
pub const DEFAULT_TABLES: usize = 10;
/// Default signature components per table (more bits, higher precision).
pub const DEFAULT_HASHES: usize = 8;
/// Default p-stable bucket width.
pub const DEFAULT_BUCKET_WIDTH: f32 = 4.0;

type Signature = Vec<i32>;

// ============================================================================
// Random-hyperplane LSH (cosine)
// ============================================================================

/// Hyperplane RNG seed; fixed for reproducible signatures.
const HYPERPLANE_RNG_SEED: u64 = 42;

pub struct RandomHyperplaneLsh {
    dim: usize,
    num_tables: usize,
    num_hashes: usize,
    /// hyperplanes[table][hash * dim + d]
    hyperplanes: Vec<Vec<f32>>,
    tables: Vec<HashMap<Signature, Vec<u32>>>,
    vectors: Vec<Vec<f32>>,
}

impl RandomHyperplaneLsh {
    pub fn new(dim: usize, num_tables: usize, num_hashes: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(HYPERPLANE_RNG_SEED);
        let hyperplanes = (0..num_tables)
            .map(|_| {
                (0..num_hashes * dim)
                    .map(|_| rng.sample(StandardNormal))
                    .collect()
            })
            .collect();

        Self {
            dim,
            num_tables,
            num_hashes,
            hyperplanes,
            tables: vec![HashMap::new(); num_tables],
            vectors: Vec::new(),
        }
    }

    pub fn with_defaults(dim: usize) -> Self {
        Self::new(dim, DEFAULT_TABLES, DEFAULT_HASHES)
    }

    /// Clear the tables and hash every vector into each of them.
    pub fn build(&mut self, vectors: &[Vec<f32>]) {
        self.vectors = vectors.to_vec();
        for table in &mut self.tables {
            table.clear();
        }

        for (i, v) in vectors.iter().enumerate() {
            for t in 0..self.num_tables {
                let sig = self.signature(v, t);
                self.tables[t].entry(sig).or_default().push(i as u32);
            }
        }
    }

    /// Top-k candidate ids by exact cosine similarity, descending.
    pub fn query(&self, q: &[f32], k: usize) -> Vec<u32> {
        let mut candidates: HashSet<u32> = HashSet::new();
        for t in 0..self.num_tables {
            let sig = self.signature(q, t);
            if let Some(bucket) = self.tables[t].get(&sig) {
                candidates.extend(bucket.iter().copied());
            }
        }

        let mut scored: Vec<(f32, u32)> = candidates
            .into_iter()
            .map(|idx| (cosine_similarity(q, &self.vectors[idx as usize]), idx))
            .collect();
        scored.sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.truncate(k);
        scored.into_iter().map(|(_, idx)| idx).collect()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    fn signature(&self, v: &[f32], table: usize) -> Signature {
        let planes = &self.hyperplanes[table];
        (0..self.num_hashes)
            .map(|h| {
                let plane = &planes[h * self.dim..(h + 1) * self.dim];
                if inner_product_scalar(plane, v) > 0.0 {
                    1
                } else {
                    0
                }
            })
            .collect()
    }
}

// ============================================================================
// p-stable LSH (Euclidean)
// ============================================================================

/// Projection RNG seed; distinct from the hyperplane seed so the two
/// schemes draw independent projections.
const PROJECTION_RNG_SEED: u64 = 123;

pub struct EuclideanLsh {
    dim: usize,
    num_tables: usize,
    num_hashes: usize,
    bucket_width: f32,
    /// projections[table][hash * dim + d]
    projections: Vec<Vec<f32>>,
    /// offsets[table][hash], drawn uniformly from [0, w)
    offsets: Vec<Vec<f32>>,
    tables: Vec<HashMap<Signature, Vec<u32>>>,
    vectors: Vec<Vec<f32>>,
}

impl EuclideanLsh {
    pub fn new(dim: usize, num_tables: usize, num_hashes: usize, bucket_width: f32) -> Self {
        let mut rng = StdRng::seed_from_u64(PROJECTION_RNG_SEED);
        let mut projections = Vec::with_capacity(num_tables);
        let mut offsets = Vec::with_capacity(num_tables);
        for _ in 0..num_tables {
            projections.push(
                (0..num_hashes * dim)
                    .map(|_| rng.sample(StandardNormal))
                    .collect(),
            );
            offsets.push((0..num_hashes).map(|_| rng.gen_range(0.0..bucket_width)).collect());
        }

        Self {
            dim,
            num_tables,
            num_hashes,
            bucket_width,
            projections,
            offsets,
            tables: vec![HashMap::new(); num_tables],
            vectors: Vec::new(),
        }
    }

    pub fn with_defaults(dim: usize) -> Self {
        Self::new(dim, DEFAULT_TABLES, DEFAULT_HASHES, DEFAULT_BUCKET_WIDTH)
    }

    /// Clear the tables and hash every vector into each of them.
    pub fn build(&mut self, vectors: &[Vec<f32>]) {
        self.vectors = vectors.to_vec();
        for table in &mut self.tables {
            table.clear();
        }

        for (i, v) in vectors.iter().enumerate() {
            for t in 0..self.num_tables {
                let sig = self.signature(v, t);
                self.tables[t].entry(sig).or_default().push(i as u32);
            }
        }
    }

    /// Top-k candidate ids by exact squared L2 distance, ascending.
    pub fn query(&self, q: &[f32], k: usize) -> Vec<u32> {
        let mut candidates: HashSet<u32> = HashSet::new();
        for t in 0..self.num_tables {
            let sig = self.signature(q, t);
            if let Some(bucket) = self.tables[t].get(&sig) {
                candidates.extend(bucket.iter().copied());
            }
        }

        let mut scored: Vec<(f32, u32)> = candidates
            .into_iter()
            .map(|idx| (l2_squared_scalar(q, &self.vectors[idx as usize]), idx))
            .collect();
        scored.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        scored.truncate(k);
        scored.into_iter().map(|(_, idx)| idx).collect()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    fn signature(&self, v: &[f32], table: usize) -> Signature {
        let projections = &self.projections[table];
        let offsets = &self.offsets[table];
        (0..self.num_hashes)
            .map(|h| {
                let a = &projections[h * self.dim..(h + 1) * self.dim];
                let proj = offsets[h] + inner_product_scalar(a, v);
                (proj / self.bucket_width).floor() as i32
            })
            .collect()
    }
}
