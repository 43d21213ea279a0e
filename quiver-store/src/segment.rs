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

//! Segment lifecycle types.
//!
//! Rows live in the single mutable [`Segment`] until it fills up and is
//! sealed into an immutable columnar file described by a
//! [`SealedSegment`]. Deletes never touch files; they grow a per-segment
//! tombstone set that filters reads until compaction rewrites the
//! survivors. Every seal and compaction commits a [`Snapshot`] recording
//! which sealed segments are live.

use std::collections::HashSet;
use std::path::PathBuf;

use quiver_core::VectorRecord;
use serde::{Deserialize, Serialize};

/// The single mutable segment receiving inserts.
#[derive(Debug, Default)]
pub struct Segment {
    pub segment_id: u64,
    pub records: Vec<VectorRecord>,
    /// Ids logically deleted while still resident here.
    pub tombstones: HashSet<u64>,
}

impl Segment {
    pub fn new(segment_id: u64) -> Self {
        Self {
            segment_id,
            records: Vec::new(),
            tombstones: HashSet::new(),
        }
    }

    pub fn live_count(&self) -> usize {
        self.records.len().saturating_sub(self.tombstones.len())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.records.iter().any(|r| r.id == id)
    }
}

/// Immutable descriptor of a previously-active segment persisted as a
/// columnar file.
#[derive(Debug)]
pub struct SealedSegment {
    pub segment_id: u64,
    pub path: PathBuf,
    /// Row count of the file; fixed at seal time.
    pub num_records: usize,
    /// Ids present in the file, captured at seal time so deletes can be
    /// targeted at the segments that actually hold the id.
    pub ids: HashSet<u64>,
    /// Grows monotonically after sealing. Invariant: subset of `ids`.
    pub tombstones: HashSet<u64>,
}

impl SealedSegment {
    pub fn live_count(&self) -> usize {
        self.num_records.saturating_sub(self.tombstones.len())
    }

    /// Fraction of rows tombstoned; 0 for an empty file.
    pub fn tombstone_ratio(&self) -> f32 {
        if self.num_records == 0 {
            0.0
        } else {
            self.tombstones.len() as f32 / self.num_records as f32
        }
    }
}

/// Append-only record of which sealed segments were live at a point in
/// time. The snapshot id is its index in the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: u64,
    pub timestamp_ms: u64,
    /// Sealed segment ids in seal order.
    pub segment_ids: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_count_subtracts_tombstones() {
        let mut seg = Segment::new(0);
        seg.records.push(VectorRecord::new(1, vec![0.0], ""));
        seg.records.push(VectorRecord::new(2, vec![0.0], ""));
        seg.tombstones.insert(2);
        assert_eq!(seg.live_count(), 1);
    }

    #[test]
    fn test_tombstone_ratio_handles_empty_segment() {
        let seg = SealedSegment {
            segment_id: 0,
            path: PathBuf::from("segment_0.arrow"),
            num_records: 0,
            ids: HashSet::new(),
            tombstones: HashSet::new(),
        };
        assert_eq!(seg.tombstone_ratio(), 0.0);
    }

    #[test]
    fn test_tombstone_ratio() {
        let seg = SealedSegment {
            segment_id: 0,
            path: PathBuf::from("segment_0.arrow"),
            num_records: 4,
            ids: [1, 2, 3, 4].into_iter().collect(),
            tombstones: [1, 2, 3].into_iter().collect(),
        };
        assert!((seg.tombstone_ratio() - 0.75).abs() < 1e-6);
        assert_eq!(seg.live_count(), 1);
    }
}
