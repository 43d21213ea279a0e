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

//! HNSW (Hierarchical Navigable Small World) index.
//!
//! Multilayer proximity graph for approximate nearest-neighbor search,
//! after Malkov & Yashunin (2016). Layer 0 holds every node; higher
//! layers are exponentially sparser. A query greedily descends from the
//! top layer with beam width 1, then runs one beam search at layer 0 with
//! `ef = max(ef_search, k)`.
//!
//! Internal node ids are assigned sequentially from 0 at insert; the
//! caller keeps its own mapping to external record ids. Distances
//! returned to callers are Euclidean (square root of the internal
//! squared-L2 working values). The level draw uses a fixed-seed RNG so
//! builds are reproducible.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use quiver_core::distance::DistanceKernel;
use rand::distributions::Open01;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Inline adjacency capacity; matches the layer-0 edge cap at default M.
const INLINE_NEIGHBORS: usize = 32;

type NeighborList = SmallVec<[u32; INLINE_NEIGHBORS]>;

/// HNSW construction and query parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Target edges per node per layer (M). Layer 0 is capped at 2·M.
    pub m: usize,
    /// Beam width during construction.
    pub ef_construction: usize,
    /// Beam width during queries (raised to k when k is larger).
    pub ef_search: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
        }
    }
}

/// Seed for the level-draw RNG; fixed so graph construction is
/// reproducible run to run.
const LEVEL_RNG_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    dist: f32,
    id: u32,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// HNSW index over owned f32 vectors.
pub struct HnswIndex {
    dim: usize,
    m: usize,
    m_max0: usize,
    ef_construction: usize,
    ef_search: usize,
    /// Level generation factor, 1/ln(M).
    ml: f64,
    entry_point: Option<u32>,
    max_layer: usize,
    rng: StdRng,
    kernel: DistanceKernel,
    vectors: Vec<Vec<f32>>,
    /// graph[layer][node] = neighbor ids. A node only occupies slots in
    /// layers up to its drawn level, so per-layer lengths differ.
    graph: Vec<Vec<NeighborList>>,
}

impl HnswIndex {
    pub fn new(dim: usize, config: HnswConfig) -> Self {
        debug_assert!(config.m >= 2);
        Self {
            dim,
            m: config.m,
            m_max0: 2 * config.m,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
            ml: 1.0 / (config.m as f64).ln(),
            entry_point: None,
            max_layer: 0,
            rng: StdRng::seed_from_u64(LEVEL_RNG_SEED),
            kernel: DistanceKernel::detect(),
            vectors: Vec::new(),
            graph: Vec::new(),
        }
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Number of graph layers currently allocated.
    pub fn num_layers(&self) -> usize {
        self.graph.len()
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn set_ef_search(&mut self, ef: usize) {
        self.ef_search = ef;
    }

    /// Insert one vector, returning its internal id.
    ///
    /// Dimension agreement with the index is the caller's responsibility;
    /// the kernels are unchecked.
    pub fn insert(&mut self, vector: Vec<f32>) -> u32 {
        debug_assert_eq!(vector.len(), self.dim);
        let id = self.vectors.len() as u32;
        self.vectors.push(vector);

        let level = self.random_level();

        while self.graph.len() <= level {
            self.graph.push(Vec::new());
        }
        for layer in self.graph.iter_mut().take(level + 1) {
            if layer.len() <= id as usize {
                layer.resize(id as usize + 1, NeighborList::new());
            }
        }

        let Some(mut current) = self.entry_point else {
            self.entry_point = Some(id);
            self.max_layer = level;
            return id;
        };

        let query = self.vectors[id as usize].clone();

        // Phase 1: greedy descent from the top to one above the insertion level
        for layer in ((level + 1)..=self.max_layer).rev() {
            if let Some(best) = self.search_layer(&query, current, 1, layer).first() {
                current = best.id;
            }
        }

        // Phase 2: connect at layers [min(level, max_layer)..0]
        for layer in (0..=level.min(self.max_layer)).rev() {
            let candidates = self.search_layer(&query, current, self.ef_construction, layer);
            let m_max = if layer == 0 { self.m_max0 } else { self.m };

            let neighbors: Vec<Candidate> = candidates.iter().take(m_max).copied().collect();
            for nb in &neighbors {
                self.graph[layer][id as usize].push(nb.id);
                self.graph[layer][nb.id as usize].push(id);

                if self.graph[layer][nb.id as usize].len() > m_max {
                    self.prune(nb.id, layer, m_max);
                }
            }

            if let Some(best) = candidates.first() {
                current = best.id;
            }
        }

        if level > self.max_layer {
            self.entry_point = Some(id);
            self.max_layer = level;
        }

        id
    }

    /// Insert every vector in order.
    pub fn build<I>(&mut self, vectors: I)
    where
        I: IntoIterator<Item = Vec<f32>>,
    {
        for v in vectors {
            self.insert(v);
        }
    }

    /// k nearest neighbors of `query` as `(internal_id, euclidean_distance)`,
    /// ascending. Empty before the first insert.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        self.search_with_ef(query, k, self.ef_search)
    }

    /// Like [`search`](Self::search) with an explicit beam width, so
    /// callers can over-fetch without mutating the index.
    pub fn search_with_ef(&self, query: &[f32], k: usize, ef: usize) -> Vec<(u32, f32)> {
        let Some(mut current) = self.entry_point else {
            return Vec::new();
        };

        for layer in (1..=self.max_layer).rev() {
            if let Some(best) = self.search_layer(query, current, 1, layer).first() {
                current = best.id;
            }
        }

        let ef = ef.max(k);
        let mut results = self.search_layer(query, current, ef, 0);
        results.truncate(k);
        results
            .into_iter()
            .map(|c| (c.id, c.dist.sqrt()))
            .collect()
    }

    fn random_level(&mut self) -> usize {
        let u: f64 = self.rng.sample(Open01);
        (-u.ln() * self.ml) as usize
    }

    /// Beam search within one layer. Returns up to `ef` candidates sorted
    /// by ascending squared distance.
    fn search_layer(&self, query: &[f32], entry: u32, ef: usize, layer: usize) -> Vec<Candidate> {
        let Some(adjacency) = self.graph.get(layer) else {
            return Vec::new();
        };
        if adjacency.get(entry as usize).is_none() {
            return Vec::new();
        }

        let mut visited: HashSet<u32> = HashSet::new();
        visited.insert(entry);

        let entry_dist = self.kernel.l2_squared(query, &self.vectors[entry as usize]);

        // candidates: closest-first; results: farthest-first for bounding
        let mut candidates = BinaryHeap::new();
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();
        candidates.push(Reverse(Candidate {
            dist: entry_dist,
            id: entry,
        }));
        results.push(Candidate {
            dist: entry_dist,
            id: entry,
        });

        while let Some(Reverse(closest)) = candidates.pop() {
            let farthest = results.peek().map(|r| r.dist).unwrap_or(f32::MAX);
            if closest.dist > farthest {
                break;
            }

            if let Some(neighbors) = adjacency.get(closest.id as usize) {
                for &nb in neighbors {
                    if !visited.insert(nb) {
                        continue;
                    }
                    let nb_dist = self.kernel.l2_squared(query, &self.vectors[nb as usize]);
                    let farthest = results.peek().map(|r| r.dist).unwrap_or(f32::MAX);

                    if results.len() < ef || nb_dist < farthest {
                        candidates.push(Reverse(Candidate {
                            dist: nb_dist,
                            id: nb,
                        }));
                        results.push(Candidate {
                            dist: nb_dist,
                            id: nb,
                        });
                        if results.len() > ef {
                            results.pop();
                        }
                    }
                }
            }
        }

        let mut out = results.into_vec();
        out.sort_unstable();
        out
    }

    /// Trim a node's adjacency at `layer` back to its `m_max` closest
    /// neighbors by current distance.
    fn prune(&mut self, node: u32, layer: usize, m_max: usize) {
        let node_vec = &self.vectors[node as usize];
        let mut scored: Vec<Candidate> = self.graph[layer][node as usize]
            .iter()
            .map(|&nb| Candidate {
                dist: self.kernel.l2_squared(node_vec, &self.vectors[nb as usize]),
                id: nb,
            })
            .collect();
        scored.sort_unstable();
        scored.truncate(m_max);
        self.graph[layer][node as usize] = scored.into_iter().map(|c| c.id).collect();
    }
}
