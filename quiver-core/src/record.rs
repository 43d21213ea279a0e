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

//! The row type stored by the segment store.

use serde::{Deserialize, Serialize};

/// A single vector row: caller-supplied id, fixed-dimension embedding, and
/// an opaque metadata string (possibly empty).
///
/// Ids are treated as opaque; duplicates are not detected at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: u64,
    pub embedding: Vec<f32>,
    pub metadata: String,
}

impl VectorRecord {
    pub fn new(id: u64, embedding: Vec<f32>, metadata: impl Into<String>) -> Self {
        Self {
            id,
            embedding,
            metadata: metadata.into(),
        }
    }
}
