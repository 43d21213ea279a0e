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

//! The segment store.
//!
//! Write path: rows append to the active segment under one coarse mutex;
//! reaching `segment_capacity` seals the segment to an Arrow IPC file
//! while the lock is still held, swaps in a fresh active segment, and
//! commits a snapshot. Deletes tombstone the active segment when the id
//! is resident there, otherwise the sealed segments whose id set contains
//! it. Compaction rewrites segments whose tombstone ratio reaches the
//! threshold and drops their files.
//!
//! Every public operation, reads included, holds the mutex for its whole
//! duration; seal, scan, and compaction perform disk I/O inside the
//! critical section, so callers must treat them as potentially long.
//! Snapshots and tombstone sets are in-memory only: a cold start recovers
//! only the sealed files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use quiver_core::{QuiverError, Result, VectorRecord};

use crate::columnar::{self, SEGMENT_EXT};
use crate::segment::{SealedSegment, Segment, Snapshot};

/// Segmented columnar store with tombstones, snapshots, and compaction.
pub struct SegmentStore {
    dim: usize,
    segment_capacity: usize,
    data_dir: PathBuf,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    active: Segment,
    sealed: Vec<SealedSegment>,
    snapshots: Vec<Snapshot>,
    next_segment_id: u64,
}

impl StoreInner {
    fn commit_snapshot(&mut self) {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let snapshot = Snapshot {
            snapshot_id: self.snapshots.len() as u64,
            timestamp_ms,
            segment_ids: self.sealed.iter().map(|s| s.segment_id).collect(),
        };
        self.snapshots.push(snapshot);
    }
}

impl SegmentStore {
    /// Open a store rooted at `data_dir`, creating the directory if
    /// absent and committing the initial empty snapshot.
    pub fn open(dim: usize, segment_capacity: usize, data_dir: impl Into<PathBuf>) -> Result<Self> {
        if dim == 0 {
            return Err(QuiverError::InvalidConfig("dim must be positive".into()));
        }
        if segment_capacity == 0 {
            return Err(QuiverError::InvalidConfig(
                "segment_capacity must be positive".into(),
            ));
        }

        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;

        let mut inner = StoreInner {
            active: Segment::new(0),
            sealed: Vec::new(),
            snapshots: Vec::new(),
            next_segment_id: 1,
        };
        inner.commit_snapshot();

        info!(dim, segment_capacity, data_dir = %data_dir.display(), "opened segment store");
        Ok(Self {
            dim,
            segment_capacity,
            data_dir,
            inner: Mutex::new(inner),
        })
    }

    /// Append one row. Seals the active segment if it reaches capacity.
    pub fn insert(&self, id: u64, embedding: &[f32], metadata: &str) -> Result<()> {
        if embedding.len() != self.dim {
            return Err(QuiverError::DimensionMismatch {
                expected: self.dim,
                actual: embedding.len(),
            });
        }

        let mut inner = self.inner.lock();
        inner
            .active
            .records
            .push(VectorRecord::new(id, embedding.to_vec(), metadata));

        if inner.active.records.len() >= self.segment_capacity {
            self.seal_active(&mut inner)?;
        }
        Ok(())
    }

    /// Append a batch of rows from parallel id/flat-vector buffers,
    /// sealing as often as capacity demands. Atomic with respect to
    /// readers: the lock is held across the whole batch.
    ///
    /// `metadata`, when provided, must carry one entry per id; `None`
    /// stores empty strings.
    pub fn bulk_insert(
        &self,
        ids: &[u64],
        vectors: &[f32],
        metadata: Option<&[String]>,
    ) -> Result<()> {
        if vectors.len() != ids.len() * self.dim {
            return Err(QuiverError::Misaligned {
                len: vectors.len(),
                dim: self.dim,
            });
        }
        if let Some(metas) = metadata {
            if metas.len() != ids.len() {
                return Err(QuiverError::Schema(format!(
                    "metadata length {} does not match row count {}",
                    metas.len(),
                    ids.len()
                )));
            }
        }

        let mut inner = self.inner.lock();
        for (i, &id) in ids.iter().enumerate() {
            let embedding = vectors[i * self.dim..(i + 1) * self.dim].to_vec();
            let meta = metadata.map(|m| m[i].clone()).unwrap_or_default();
            inner.active.records.push(VectorRecord {
                id,
                embedding,
                metadata: meta,
            });

            if inner.active.records.len() >= self.segment_capacity {
                self.seal_active(&mut inner)?;
            }
        }
        Ok(())
    }

    /// Tombstone an id. If it is resident in the active segment the
    /// tombstone lands there; otherwise it lands in every sealed segment
    /// whose id set contains it. Unknown ids are a no-op.
    pub fn delete(&self, id: u64) {
        let mut inner = self.inner.lock();
        if inner.active.contains(id) {
            inner.active.tombstones.insert(id);
            return;
        }
        for seg in &mut inner.sealed {
            if seg.ids.contains(&id) {
                seg.tombstones.insert(id);
            }
        }
    }

    /// Seal the active segment if it holds any rows; no-op otherwise.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.seal_active(&mut inner)
    }

    /// All live rows: sealed segments in seal order (each filtered
    /// through its tombstones), then active rows in insertion order.
    pub fn scan_all(&self) -> Result<Vec<VectorRecord>> {
        let inner = self.inner.lock();

        let mut out = Vec::new();
        for seg in &inner.sealed {
            out.extend(columnar::read_segment(&seg.path, self.dim, &seg.tombstones)?);
        }
        for r in &inner.active.records {
            if !inner.active.tombstones.contains(&r.id) {
                out.push(r.clone());
            }
        }
        Ok(out)
    }

    /// Rewrite every sealed segment whose tombstone ratio is at or above
    /// `tombstone_threshold` (clamped to [0, 1]): survivors of all dirty
    /// segments merge into one fresh sealed segment, the old files are
    /// removed, and a snapshot commits. Returns the number of rows
    /// reclaimed.
    pub fn compact(&self, tombstone_threshold: f32) -> Result<usize> {
        let threshold = tombstone_threshold.clamp(0.0, 1.0);
        let mut inner = self.inner.lock();

        let dirty: Vec<usize> = inner
            .sealed
            .iter()
            .enumerate()
            .filter(|(_, seg)| seg.tombstone_ratio() >= threshold)
            .map(|(i, _)| i)
            .collect();

        // Read survivors before touching any file, so an I/O error leaves
        // the store exactly as it was.
        let mut to_merge: Vec<VectorRecord> = Vec::new();
        let mut reclaimed = 0usize;
        for &i in &dirty {
            let seg = &inner.sealed[i];
            let live = columnar::read_segment(&seg.path, self.dim, &seg.tombstones)?;
            reclaimed += seg.num_records - live.len();
            to_merge.extend(live);
        }

        let merged = if to_merge.is_empty() {
            None
        } else {
            let segment_id = inner.next_segment_id;
            inner.next_segment_id += 1;
            let path = self.segment_path(segment_id);
            columnar::write_segment(&path, &to_merge, self.dim)?;
            Some(SealedSegment {
                segment_id,
                path,
                num_records: to_merge.len(),
                ids: to_merge.iter().map(|r| r.id).collect(),
                tombstones: HashSet::new(),
            })
        };

        let sealed = std::mem::take(&mut inner.sealed);
        let mut clean = Vec::with_capacity(sealed.len());
        for (i, seg) in sealed.into_iter().enumerate() {
            if dirty.contains(&i) {
                if let Err(e) = std::fs::remove_file(&seg.path) {
                    warn!(segment_id = seg.segment_id, error = %e, "failed to remove compacted segment file");
                }
            } else {
                clean.push(seg);
            }
        }
        inner.sealed = clean;
        if let Some(seg) = merged {
            inner.sealed.push(seg);
        }

        inner.commit_snapshot();
        info!(
            reclaimed,
            rewritten = dirty.len(),
            sealed_segments = inner.sealed.len(),
            "compaction finished"
        );
        Ok(reclaimed)
    }

    // ─── Stats ──────────────────────────────────────────────────────────

    /// Rows ever stored and not yet physically removed (tombstoned rows
    /// included).
    pub fn total_records(&self) -> usize {
        let inner = self.inner.lock();
        inner.active.records.len() + inner.sealed.iter().map(|s| s.num_records).sum::<usize>()
    }

    /// Rows visible to `scan_all`.
    pub fn total_live_records(&self) -> usize {
        let inner = self.inner.lock();
        inner.active.live_count() + inner.sealed.iter().map(|s| s.live_count()).sum::<usize>()
    }

    pub fn sealed_segment_count(&self) -> usize {
        self.inner.lock().sealed.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.inner.lock().snapshots.len()
    }

    pub fn snapshot(&self, index: usize) -> Option<Snapshot> {
        self.inner.lock().snapshots.get(index).cloned()
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ─── Internals ──────────────────────────────────────────────────────

    fn segment_path(&self, segment_id: u64) -> PathBuf {
        self.data_dir
            .join(format!("segment_{segment_id}.{SEGMENT_EXT}"))
    }

    /// Write the active segment to disk, swap in a fresh one, commit a
    /// snapshot. Caller holds the lock.
    fn seal_active(&self, inner: &mut StoreInner) -> Result<()> {
        if inner.active.records.is_empty() {
            return Ok(());
        }

        let segment_id = inner.active.segment_id;
        let path = self.segment_path(segment_id);
        columnar::write_segment(&path, &inner.active.records, self.dim)?;

        let next_id = inner.next_segment_id;
        inner.next_segment_id += 1;
        let active = std::mem::replace(&mut inner.active, Segment::new(next_id));

        debug!(
            segment_id,
            records = active.records.len(),
            tombstones = active.tombstones.len(),
            path = %path.display(),
            "sealed active segment"
        );

        inner.sealed.push(SealedSegment {
            segment_id,
            path,
            num_records: active.records.len(),
            ids: active.records.iter().map(|r| r.id).collect(),
            tombstones: active.tombstones,
        });
        inner.commit_snapshot();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dim: usize, capacity: usize) -> (TempDir, SegmentStore) {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::open(dim, capacity, dir.path().join("segments")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_commits_initial_snapshot() {
        let (_dir, store) = open_store(2, 10);
        assert_eq!(store.snapshot_count(), 1);
        let snap = store.snapshot(0).unwrap();
        assert_eq!(snap.snapshot_id, 0);
        assert!(snap.segment_ids.is_empty());
    }

    #[test]
    fn test_open_rejects_zero_dim_and_capacity() {
        let dir = TempDir::new().unwrap();
        assert!(SegmentStore::open(0, 10, dir.path()).is_err());
        assert!(SegmentStore::open(2, 0, dir.path()).is_err());
    }

    #[test]
    fn test_insert_rejects_wrong_dimension() {
        let (_dir, store) = open_store(4, 10);
        let err = store.insert(1, &[1.0, 2.0], "").unwrap_err();
        assert!(matches!(
            err,
            QuiverError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_insert_and_scan_roundtrip() {
        let (_dir, store) = open_store(4, 5);
        store.insert(1, &[0.1, 0.2, 0.3, 0.4], "first").unwrap();
        store.insert(2, &[0.5, 0.6, 0.7, 0.8], "second").unwrap();

        assert_eq!(store.total_records(), 2);

        let all = store.scan_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, 1);
        assert_eq!(all[0].embedding, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(all[1].metadata, "second");
    }

    #[test]
    fn test_auto_seal_at_capacity() {
        let (_dir, store) = open_store(2, 3);
        store.insert(1, &[1.0, 2.0], "").unwrap();
        store.insert(2, &[3.0, 4.0], "").unwrap();
        store.insert(3, &[5.0, 6.0], "").unwrap(); // triggers seal
        store.insert(4, &[7.0, 8.0], "").unwrap(); // lands in fresh active

        assert_eq!(store.sealed_segment_count(), 1);
        assert_eq!(store.total_records(), 4);

        // Sealed rows come first, then the active ones, in insert order.
        let ids: Vec<u64> = store.scan_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_metadata_survives_seal_byte_for_byte() {
        let (_dir, store) = open_store(2, 1);
        store.insert(7, &[0.25, -1.5], "payload £µ").unwrap(); // seals immediately

        let all = store.scan_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].embedding, vec![0.25, -1.5]);
        assert_eq!(all[0].metadata, "payload £µ");
    }

    #[test]
    fn test_tombstone_delete_in_active_segment() {
        let (_dir, store) = open_store(2, 100);
        store.insert(1, &[1.0, 2.0], "").unwrap();
        store.insert(2, &[3.0, 4.0], "").unwrap();
        store.insert(3, &[5.0, 6.0], "").unwrap();

        store.delete(2);

        assert_eq!(store.total_records(), 3);
        assert_eq!(store.total_live_records(), 2);

        let ids: Vec<u64> = store.scan_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_delete_targets_only_the_containing_sealed_segment() {
        let (_dir, store) = open_store(2, 3);
        for id in 1..=6 {
            store.insert(id, &[id as f32, 0.0], "").unwrap();
        }
        assert_eq!(store.sealed_segment_count(), 2);

        store.delete(1);

        // A single delete of an id present once costs exactly one live row.
        assert_eq!(store.total_live_records(), 5);
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let (_dir, store) = open_store(2, 2);
        store.insert(1, &[1.0, 2.0], "").unwrap();
        store.insert(2, &[3.0, 4.0], "").unwrap();
        store.delete(99);

        assert_eq!(store.total_live_records(), 2);
    }

    #[test]
    fn test_flush_empty_active_is_noop() {
        let (_dir, store) = open_store(2, 10);
        let snaps = store.snapshot_count();
        store.flush().unwrap();
        assert_eq!(store.sealed_segment_count(), 0);
        assert_eq!(store.snapshot_count(), snaps);
    }

    #[test]
    fn test_flush_seals_and_snapshots() {
        let (_dir, store) = open_store(2, 10);
        store.insert(1, &[1.0, 2.0], "").unwrap();
        let snaps = store.snapshot_count();

        store.flush().unwrap();

        assert_eq!(store.sealed_segment_count(), 1);
        assert_eq!(store.snapshot_count(), snaps + 1);
        let latest = store.snapshot(store.snapshot_count() - 1).unwrap();
        assert_eq!(latest.segment_ids, vec![0]);
    }

    #[test]
    fn test_bulk_insert_seals_repeatedly() {
        let (_dir, store) = open_store(2, 2);
        let ids = [1u64, 2, 3, 4, 5];
        let flat = [1.0f32, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0];
        store.bulk_insert(&ids, &flat, None).unwrap();

        assert_eq!(store.sealed_segment_count(), 2);
        assert_eq!(store.total_records(), 5);
        let scanned: Vec<u64> = store.scan_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(scanned, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_bulk_insert_rejects_misaligned_buffer() {
        let (_dir, store) = open_store(2, 10);
        let err = store.bulk_insert(&[1, 2], &[1.0, 2.0, 3.0], None).unwrap_err();
        assert!(matches!(err, QuiverError::Misaligned { len: 3, dim: 2 }));
    }

    #[test]
    fn test_bulk_insert_stores_metadata() {
        let (_dir, store) = open_store(2, 10);
        let metas = vec!["a".to_string(), "b".to_string()];
        store
            .bulk_insert(&[1, 2], &[1.0, 1.0, 2.0, 2.0], Some(&metas))
            .unwrap();

        let all = store.scan_all().unwrap();
        assert_eq!(all[1].metadata, "b");
    }

    #[test]
    fn test_compaction_reclaims_tombstoned_rows() {
        let (_dir, store) = open_store(2, 3);
        for id in 1..=6 {
            store.insert(id, &[id as f32, id as f32], "").unwrap();
        }
        assert_eq!(store.sealed_segment_count(), 2);

        // 2 of 3 rows of the first segment, ratio 2/3 >= 0.5
        store.delete(1);
        store.delete(2);

        let reclaimed = store.compact(0.5).unwrap();
        assert_eq!(reclaimed, 2);
        assert_eq!(store.total_live_records(), 4);
        // untouched segment + merged rewrite
        assert_eq!(store.sealed_segment_count(), 2);

        let ids: Vec<u64> = store.scan_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 5, 6, 3]);
    }

    #[test]
    fn test_compaction_deletes_rewritten_files() {
        let (_dir, store) = open_store(2, 2);
        store.insert(1, &[1.0, 1.0], "").unwrap();
        store.insert(2, &[2.0, 2.0], "").unwrap();
        let sealed_id = store.snapshot(1).unwrap().segment_ids[0];
        let old_file = store.data_dir().join(format!("segment_{sealed_id}.{SEGMENT_EXT}"));
        assert!(old_file.exists());

        store.delete(1);
        store.compact(0.5).unwrap();

        assert!(!old_file.exists());
    }

    #[test]
    fn test_compaction_with_no_qualifying_segments() {
        let (_dir, store) = open_store(2, 2);
        store.insert(1, &[1.0, 1.0], "").unwrap();
        store.insert(2, &[2.0, 2.0], "").unwrap();

        let sealed = store.sealed_segment_count();
        let live = store.total_live_records();

        let reclaimed = store.compact(0.5).unwrap();
        assert_eq!(reclaimed, 0);
        assert_eq!(store.sealed_segment_count(), sealed);
        assert_eq!(store.total_live_records(), live);
    }

    #[test]
    fn test_compacting_fully_tombstoned_segment_leaves_no_merge() {
        let (_dir, store) = open_store(2, 2);
        store.insert(1, &[1.0, 1.0], "").unwrap();
        store.insert(2, &[2.0, 2.0], "").unwrap();
        store.delete(1);
        store.delete(2);

        let reclaimed = store.compact(0.5).unwrap();
        assert_eq!(reclaimed, 2);
        assert_eq!(store.sealed_segment_count(), 0);
        assert_eq!(store.total_live_records(), 0);
    }

    #[test]
    fn test_snapshots_grow_with_each_seal_and_compaction() {
        let (_dir, store) = open_store(2, 2);
        assert_eq!(store.snapshot_count(), 1);

        store.insert(1, &[1.0, 1.0], "").unwrap();
        store.insert(2, &[2.0, 2.0], "").unwrap(); // seal -> snapshot 1
        assert_eq!(store.snapshot_count(), 2);

        store.compact(0.0).unwrap(); // snapshot 2
        assert_eq!(store.snapshot_count(), 3);

        // Snapshot ids are their indices.
        for i in 0..store.snapshot_count() {
            assert_eq!(store.snapshot(i).unwrap().snapshot_id, i as u64);
        }
    }
}
