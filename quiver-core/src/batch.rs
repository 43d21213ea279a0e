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

//! Columnar batch assembly and schema validation.
//!
//! Quiver exchanges rows as Arrow `RecordBatch`es with three columns:
//!
//! - `id`: UInt64, non-null
//! - `embedding`: FixedSizeList<Float32> with list size = dim, non-null
//! - `metadata`: Utf8, optional (absent column reads as empty strings)
//!
//! [`RecordBatchBuilder`] assembles such a batch from flat buffers; the
//! free functions validate and extract typed columns from a batch handed
//! to the engine. No I/O happens here.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, StringArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};

use crate::error::{QuiverError, Result};

/// Required primary-key column.
pub const ID_COLUMN: &str = "id";
/// Required embedding column.
pub const EMBEDDING_COLUMN: &str = "embedding";
/// Optional metadata column.
pub const METADATA_COLUMN: &str = "metadata";

/// Arrow type of the embedding column for a given dimension.
pub fn embedding_data_type(dim: usize) -> DataType {
    DataType::FixedSizeList(
        Arc::new(Field::new("item", DataType::Float32, false)),
        dim as i32,
    )
}

/// The full three-column schema used for sealed segment files.
pub fn segment_schema(dim: usize) -> Schema {
    Schema::new(vec![
        Field::new(ID_COLUMN, DataType::UInt64, false),
        Field::new(EMBEDDING_COLUMN, embedding_data_type(dim), false),
        Field::new(METADATA_COLUMN, DataType::Utf8, false),
    ])
}

/// Builder for the three-column record batch.
///
/// Columns are appended individually so callers can omit metadata; `build`
/// produces the final `RecordBatch`.
#[derive(Default)]
pub struct RecordBatchBuilder {
    fields: Vec<Field>,
    arrays: Vec<ArrayRef>,
}

impl RecordBatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a UInt64 id column.
    pub fn add_id_column(&mut self, name: &str, ids: &[u64]) {
        self.fields.push(Field::new(name, DataType::UInt64, false));
        self.arrays.push(Arc::new(UInt64Array::from(ids.to_vec())));
    }

    /// Append a FixedSizeList<Float32> embedding column from a flat
    /// row-major buffer of `n * dim` floats.
    ///
    /// Fails with [`QuiverError::Misaligned`] if the buffer length is not
    /// a multiple of `dim`.
    pub fn add_embedding_column(&mut self, name: &str, flat: &[f32], dim: usize) -> Result<()> {
        if dim == 0 || flat.len() % dim != 0 {
            return Err(QuiverError::Misaligned {
                len: flat.len(),
                dim,
            });
        }

        let values = Float32Array::from(flat.to_vec());
        let item = Arc::new(Field::new("item", DataType::Float32, false));
        let list = FixedSizeListArray::try_new(item, dim as i32, Arc::new(values), None)?;

        self.fields.push(Field::new(name, embedding_data_type(dim), false));
        self.arrays.push(Arc::new(list));
        Ok(())
    }

    /// Append a Utf8 metadata column.
    pub fn add_metadata_column(&mut self, name: &str, values: &[String]) {
        self.fields.push(Field::new(name, DataType::Utf8, false));
        self.arrays
            .push(Arc::new(StringArray::from(values.to_vec())));
    }

    /// Finish the batch. Column lengths must agree.
    pub fn build(self) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(self.fields));
        Ok(RecordBatch::try_new(schema, self.arrays)?)
    }
}

// ============================================================================
// Typed column extraction
// ============================================================================

/// Extract the required `id` column.
pub fn id_column(batch: &RecordBatch) -> Result<&UInt64Array> {
    let array = batch
        .column_by_name(ID_COLUMN)
        .ok_or_else(|| QuiverError::Schema(format!("missing required column '{ID_COLUMN}'")))?;
    array
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| {
            QuiverError::Schema(format!(
                "column '{ID_COLUMN}' must be UInt64, got {:?}",
                array.data_type()
            ))
        })
}

/// Extract the required `embedding` column and validate its fixed list
/// size against `dim`. Returns the flat inner Float32 values.
pub fn embedding_column(batch: &RecordBatch, dim: usize) -> Result<&Float32Array> {
    let array = batch.column_by_name(EMBEDDING_COLUMN).ok_or_else(|| {
        QuiverError::Schema(format!("missing required column '{EMBEDDING_COLUMN}'"))
    })?;
    let list = array
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| {
            QuiverError::Schema(format!(
                "column '{EMBEDDING_COLUMN}' must be FixedSizeList<Float32>, got {:?}",
                array.data_type()
            ))
        })?;

    let list_size = list.value_length() as usize;
    if list_size != dim {
        return Err(QuiverError::DimensionMismatch {
            expected: dim,
            actual: list_size,
        });
    }

    list.values()
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| {
            QuiverError::Schema(format!(
                "'{EMBEDDING_COLUMN}' values must be Float32, got {:?}",
                list.values().data_type()
            ))
        })
}

/// Extract the optional `metadata` column. `Ok(None)` when absent.
pub fn metadata_column(batch: &RecordBatch) -> Result<Option<&StringArray>> {
    let Some(array) = batch.column_by_name(METADATA_COLUMN) else {
        return Ok(None);
    };
    array
        .as_any()
        .downcast_ref::<StringArray>()
        .map(Some)
        .ok_or_else(|| {
            QuiverError::Schema(format!(
                "column '{METADATA_COLUMN}' must be Utf8, got {:?}",
                array.data_type()
            ))
        })
}
