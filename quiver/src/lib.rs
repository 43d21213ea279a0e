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

//! Quiver — an embedded vector database.
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │  Client API (Arrow RecordBatch ingest)    │  ← quiver-core::batch
//! ├───────────────────────────────────────────┤
//! │  Storage (columnar segments + snapshots)  │  ← quiver-store
//! ├───────────────────────────────────────────┤
//! │  Search index (HNSW graph)                │  ← quiver-index
//! └───────────────────────────────────────────┘
//! ```
//!
//! The [`VectorDb`] facade composes one [`SegmentStore`] with one HNSW
//! graph: batches ingest into columnar segments and feed the graph,
//! queries run graph search and hydrate live rows from storage, deletes
//! tombstone rows until [`VectorDb::compact_and_rebuild`] rewrites the
//! segments and the graph together.
//!
//! ```no_run
//! use quiver::{EngineConfig, VectorDb};
//!
//! # fn main() -> quiver::Result<()> {
//! let db = VectorDb::open(EngineConfig::new(4))?;
//! db.insert(1, &[0.1, 0.2, 0.3, 0.4], "first document")?;
//! let hits = db.search(&[0.1, 0.2, 0.3, 0.4], 1)?;
//! assert_eq!(hits[0].id, 1);
//! # Ok(())
//! # }
//! ```
//!
//! The IVF, LSH, and PQ index families in [`quiver_index`] are standalone
//! components with the same internal-id contract as HNSW.

pub mod config;
pub mod engine;

pub use config::{EngineConfig, DEFAULT_TOMBSTONE_THRESHOLD};
pub use engine::{SearchResult, VectorDb};

pub use quiver_core::batch::RecordBatchBuilder;
pub use quiver_core::{QuiverError, Result, VectorRecord};
pub use quiver_store::SegmentStore;
