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

//! Columnar codec for sealed segment files.
//!
//! A sealed segment is one Arrow IPC file holding a single record batch
//! with the three-column schema from `quiver_core::batch`. Reads filter
//! rows through the caller's tombstone set; the file itself is never
//! rewritten in place.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use arrow::array::Array;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;

use quiver_core::batch::{
    embedding_column, id_column, metadata_column, RecordBatchBuilder, EMBEDDING_COLUMN, ID_COLUMN,
    METADATA_COLUMN,
};
use quiver_core::{Result, VectorRecord};

/// Extension of sealed segment files.
pub const SEGMENT_EXT: &str = "arrow";

/// Write `records` to a fresh segment file at `path`.
pub fn write_segment(path: &Path, records: &[VectorRecord], dim: usize) -> Result<()> {
    let mut ids = Vec::with_capacity(records.len());
    let mut flat = Vec::with_capacity(records.len() * dim);
    let mut metas = Vec::with_capacity(records.len());
    for r in records {
        ids.push(r.id);
        flat.extend_from_slice(&r.embedding);
        metas.push(r.metadata.clone());
    }

    let mut builder = RecordBatchBuilder::new();
    builder.add_id_column(ID_COLUMN, &ids);
    builder.add_embedding_column(EMBEDDING_COLUMN, &flat, dim)?;
    builder.add_metadata_column(METADATA_COLUMN, &metas);
    let batch = builder.build()?;

    let file = File::create(path)?;
    let schema = batch.schema();
    let mut writer = FileWriter::try_new(file, &schema)?;
    writer.write(&batch)?;
    writer.finish()?;
    Ok(())
}

/// Read the rows of a segment file, skipping tombstoned ids.
pub fn read_segment(path: &Path, dim: usize, tombstones: &HashSet<u64>) -> Result<Vec<VectorRecord>> {
    let file = File::open(path)?;
    let reader = FileReader::try_new(file, None)?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch?;
        let ids = id_column(&batch)?;
        let floats = embedding_column(&batch, dim)?;
        let metas = metadata_column(&batch)?;

        for row in 0..batch.num_rows() {
            let id = ids.value(row);
            if tombstones.contains(&id) {
                continue;
            }
            let embedding = floats.values()[row * dim..(row + 1) * dim].to_vec();
            let metadata = match metas {
                Some(col) if !col.is_null(row) => col.value(row).to_string(),
                _ => String::new(),
            };
            out.push(VectorRecord {
                id,
                embedding,
                metadata,
            });
        }
    }
    Ok(out)
}
