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

//! Quiver Storage Layer
//!
//! Segmented columnar storage for vector records:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       SegmentStore                         │
//! ├────────────────────────────────────────────────────────────┤
//! │  active Segment ──seal──▶ SealedSegment (Arrow IPC file)   │
//! │        │                        │                          │
//! │     tombstones              tombstones (grow after seal)   │
//! │                                 │                          │
//! │                            compaction ──▶ merged segment   │
//! │                                                            │
//! │  Snapshot history: one entry per seal / compaction         │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store is the truth-store backing the ANN indices: deletes are
//! logical until compaction, reads filter tombstones, and the whole store
//! is serialised behind one coarse mutex.

pub mod columnar;
pub mod segment;
pub mod store;

pub use segment::{SealedSegment, Segment, Snapshot};
pub use store::SegmentStore;
