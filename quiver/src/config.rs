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

//! Engine configuration.

use std::path::PathBuf;

use quiver_core::{QuiverError, Result};
use serde::{Deserialize, Serialize};

/// Default compaction threshold when the caller passes none explicitly.
pub const DEFAULT_TOMBSTONE_THRESHOLD: f32 = 0.3;

/// Configuration for [`VectorDb`](crate::VectorDb).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Embedding dimension. Required, positive.
    pub dim: usize,
    /// HNSW edges per node per layer (typical: 16).
    pub m: usize,
    /// HNSW beam width during graph construction (typical: 200).
    pub ef_construction: usize,
    /// HNSW beam width during queries (typical: 50).
    pub ef_search: usize,
    /// Rows per segment before the store seals it (typical: 1000).
    pub segment_capacity: usize,
    /// Directory holding the sealed segment files.
    pub data_dir: PathBuf,
}

impl EngineConfig {
    /// Defaults for everything but the dimension.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            segment_capacity: 1000,
            data_dir: std::env::temp_dir().join("quiver"),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_segment_capacity(mut self, segment_capacity: usize) -> Self {
        self.segment_capacity = segment_capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(QuiverError::InvalidConfig("dim must be positive".into()));
        }
        if self.m < 2 {
            return Err(QuiverError::InvalidConfig("m must be at least 2".into()));
        }
        if self.segment_capacity == 0 {
            return Err(QuiverError::InvalidConfig(
                "segment_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new(128);
        assert_eq!(config.m, 16);
        assert_eq!(config.ef_construction, 200);
        assert_eq!(config.ef_search, 50);
        assert_eq!(config.segment_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dim_rejected() {
        assert!(EngineConfig::new(0).validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EngineConfig::new(8).with_segment_capacity(0);
        assert!(config.validate().is_err());
    }
}
