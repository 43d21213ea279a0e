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

//! The engine facade: one segment store composed with one HNSW index.
//!
//! - **Ingest**: rows land in the store (sealing segments as needed),
//!   then each vector feeds the graph.
//! - **Search**: the graph proposes candidates by internal id; the engine
//!   maps them to record ids recorded at insertion time, hydrates
//!   metadata from the store's live view, and drops tombstoned rows.
//! - **Delete**: a store tombstone only. The graph still holds the
//!   vector until the next [`VectorDb::compact_and_rebuild`], which
//!   rewrites heavily-tombstoned segments and rebuilds the graph from
//!   the surviving rows.
//!
//! The graph and its id map swap together behind one `RwLock`; the store
//! carries its own mutex. No lock is ever taken while the other crate's
//! lock is held in write mode, so the pair cannot deadlock.

use std::collections::HashMap;

use arrow::array::{Array, RecordBatch};
use parking_lot::RwLock;
use tracing::{debug, info};

use quiver_core::batch::{embedding_column, id_column, metadata_column};
use quiver_core::{QuiverError, Result};
use quiver_index::hnsw::{HnswConfig, HnswIndex};
use quiver_store::SegmentStore;

use crate::config::EngineConfig;

/// A search hit enriched with the stored metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: u64,
    /// Euclidean distance to the query.
    pub distance: f32,
    pub metadata: String,
}

/// The ANN graph plus the internal-id → record-id map. Swapped as a unit
/// on rebuild so the map can never describe a different graph.
struct IndexState {
    hnsw: HnswIndex,
    record_ids: Vec<u64>,
}

/// Embedded vector database engine.
pub struct VectorDb {
    config: EngineConfig,
    store: SegmentStore,
    index: RwLock<IndexState>,
}

impl VectorDb {
    /// Open (or create) a database under `config.data_dir`.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = SegmentStore::open(config.dim, config.segment_capacity, &config.data_dir)?;
        let hnsw = HnswIndex::new(config.dim, hnsw_config(&config));
        Ok(Self {
            config,
            store,
            index: RwLock::new(IndexState {
                hnsw,
                record_ids: Vec::new(),
            }),
        })
    }

    /// Ingest a record batch (`id` + `embedding` required, `metadata`
    /// optional). Ids and vectors pass to the store as raw column
    /// buffers. Returns the row count.
    pub fn ingest_batch(&self, batch: &RecordBatch) -> Result<usize> {
        let dim = self.config.dim;
        let ids = id_column(batch)?;
        let floats = embedding_column(batch, dim)?;
        let metas = metadata_column(batch)?;
        let n = batch.num_rows();

        let id_slice: &[u64] = ids.values();
        let float_slice: &[f32] = floats.values();

        let metadata: Option<Vec<String>> = metas.map(|col| {
            (0..n)
                .map(|i| {
                    if col.is_null(i) {
                        String::new()
                    } else {
                        col.value(i).to_string()
                    }
                })
                .collect()
        });

        self.store
            .bulk_insert(id_slice, float_slice, metadata.as_deref())?;

        let mut state = self.index.write();
        for i in 0..n {
            state
                .hnsw
                .insert(float_slice[i * dim..(i + 1) * dim].to_vec());
            state.record_ids.push(id_slice[i]);
        }

        info!(rows = n, "ingested batch");
        Ok(n)
    }

    /// Insert a single record.
    pub fn insert(&self, id: u64, embedding: &[f32], metadata: &str) -> Result<()> {
        self.store.insert(id, embedding, metadata)?;

        let mut state = self.index.write();
        state.hnsw.insert(embedding.to_vec());
        state.record_ids.push(id);
        Ok(())
    }

    /// k nearest live records, ascending by Euclidean distance.
    ///
    /// The graph is queried with beam width `max(2k, 50)` to ride out
    /// candidates that turn out to be tombstoned during hydration.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.config.dim {
            return Err(QuiverError::DimensionMismatch {
                expected: self.config.dim,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let ef = (2 * k).max(50);
        let state = self.index.read();
        let hits = state.hnsw.search_with_ef(query, ef, ef);

        // scan_all already filters tombstones: a candidate id missing
        // from this view is deleted (or compacted away).
        let live: HashMap<u64, String> = self
            .store
            .scan_all()?
            .into_iter()
            .map(|r| (r.id, r.metadata))
            .collect();

        let mut results = Vec::with_capacity(k);
        for (internal, distance) in hits {
            let Some(&record_id) = state.record_ids.get(internal as usize) else {
                continue;
            };
            if let Some(metadata) = live.get(&record_id) {
                results.push(SearchResult {
                    id: record_id,
                    distance,
                    metadata: metadata.clone(),
                });
                if results.len() >= k {
                    break;
                }
            }
        }
        Ok(results)
    }

    /// Soft-delete: tombstone in the store only. The graph is untouched
    /// until the next compact-and-rebuild.
    pub fn delete(&self, id: u64) {
        self.store.delete(id);
    }

    /// Compact the store at `tombstone_threshold`, then rebuild the graph
    /// from the surviving rows in scan order. Returns the number of rows
    /// reclaimed.
    pub fn compact_and_rebuild(&self, tombstone_threshold: f32) -> Result<usize> {
        let reclaimed = self.store.compact(tombstone_threshold)?;
        let live = self.store.scan_all()?;

        let mut hnsw = HnswIndex::new(self.config.dim, hnsw_config(&self.config));
        let mut record_ids = Vec::with_capacity(live.len());
        for record in live {
            hnsw.insert(record.embedding);
            record_ids.push(record.id);
        }

        let mut state = self.index.write();
        debug!(
            reclaimed,
            live = record_ids.len(),
            "compacted store, rebuilt index"
        );
        *state = IndexState { hnsw, record_ids };
        Ok(reclaimed)
    }

    /// Seal the active segment if non-empty.
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    // ─── Stats ──────────────────────────────────────────────────────────

    pub fn dimension(&self) -> usize {
        self.config.dim
    }

    pub fn total_records(&self) -> usize {
        self.store.total_records()
    }

    pub fn live_records(&self) -> usize {
        self.store.total_live_records()
    }

    /// Nodes currently in the ANN graph (deleted rows linger here until
    /// rebuild).
    pub fn index_size(&self) -> usize {
        self.index.read().hnsw.len()
    }

    pub fn segment_count(&self) -> usize {
        self.store.sealed_segment_count()
    }

    pub fn snapshot_count(&self) -> usize {
        self.store.snapshot_count()
    }
}

fn hnsw_config(config: &EngineConfig) -> HnswConfig {
    HnswConfig {
        m: config.m,
        ef_construction: config.ef_construction,
        ef_search: config.ef_search,
    }
}
