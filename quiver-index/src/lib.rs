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

//! Quiver Index Layer
//!
//! Four interchangeable approximate nearest-neighbor structures, each
//! trading recall against memory and latency differently:
//!
//! - **HNSW** (`hnsw`): multilayer navigable small-world graph. Best
//!   general-purpose recall/latency; the engine facade composes this one.
//! - **IVF** (`ivf`): k-means Voronoi partition with inverted lists;
//!   recall steered by the number of probed cells.
//! - **LSH** (`lsh`): random-hyperplane (cosine) and p-stable (Euclidean)
//!   hash tables; constant-time candidate generation.
//! - **PQ** (`pq`): product quantization with asymmetric distance
//!   computation; large compression at bounded distance error.
//!
//! All four keep their own copy of the vector payloads, use internal
//! sequential ids, and are built with fixed RNG seeds so identical inputs
//! produce identical structures. None of them is internally synchronised;
//! callers serialise mutation.

pub mod hnsw;
pub mod ivf;
pub mod kmeans;
pub mod lsh;
pub mod pq;

pub use hnsw::{HnswConfig, HnswIndex};
pub use ivf::IvfIndex;
pub use lsh::{EuclideanLsh, RandomHyperplaneLsh};
pub use pq::ProductQuantizer;
