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

//! Quiver Core Layer
//!
//! Shared foundations for the Quiver vector database:
//!
//! - **Errors** (`error`): the workspace-wide [`QuiverError`] and `Result`.
//! - **Distance kernels** (`distance`): scalar reference kernels for
//!   squared L2 and inner product, an AVX2 dispatch path, cosine with a
//!   zero-norm guard, and the brute-force k-NN baseline.
//! - **Records** (`record`): the `{id, embedding, metadata}` row type.
//! - **Batches** (`batch`): assembly and validation of the three-column
//!   Arrow `RecordBatch` exchanged with the engine and persisted into
//!   segment files.

pub mod batch;
pub mod distance;
pub mod error;
pub mod record;

pub use error::{QuiverError, Result};
pub use record::VectorRecord;
