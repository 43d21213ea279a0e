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

//! Product quantization with asymmetric distance computation.
//!
//! Splits `dim`-dimensional vectors into `M` subspaces of `dim / M`
//! components and quantizes each subspace independently against a
//! k-means codebook of `K` centroids (K = 256 encodes one byte per
//! subspace: dim × 4 bytes shrink to M bytes per vector).
//!
//! Search never decodes candidates. A query precomputes an `M × K` table
//! of subspace distances once ([`DistanceTable`]), after which each
//! candidate costs `M` lookups instead of `dim` multiplications.

use quiver_core::distance::DistanceKernel;
use quiver_core::{QuiverError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::kmeans;

/// Codebook-training RNG seed; one stream shared across subspaces.
const TRAIN_RNG_SEED: u64 = 42;

/// Centroids per subspace; 256 keeps codes at one byte per subspace.
pub const DEFAULT_CENTROIDS: usize = 256;

/// Default Lloyd iterations for [`ProductQuantizer::train_default`].
pub const DEFAULT_TRAIN_ITERS: usize = 25;

/// Product quantizer: `M` codebooks of `K` centroids over `dim / M`-wide
/// subspaces.
#[derive(Serialize, Deserialize)]
pub struct ProductQuantizer {
    dim: usize,
    m: usize,
    k: usize,
    /// Subspace width, dim / M.
    ds: usize,
    trained: bool,
    #[serde(skip, default = "DistanceKernel::detect")]
    kernel: DistanceKernel,
    /// codebooks[m][k] is a `ds`-wide centroid.
    codebooks: Vec<Vec<Vec<f32>>>,
}

impl ProductQuantizer {
    /// `m` must divide `dim`; `k` must fit in a byte.
    pub fn new(dim: usize, m: usize, k: usize) -> Result<Self> {
        if m == 0 || dim % m != 0 {
            return Err(QuiverError::InvalidConfig(format!(
                "subspace count {m} must divide dimension {dim}"
            )));
        }
        if k == 0 || k > 256 {
            return Err(QuiverError::InvalidConfig(format!(
                "centroid count {k} must be in 1..=256 to encode one byte"
            )));
        }
        Ok(Self {
            dim,
            m,
            k,
            ds: dim / m,
            trained: false,
            kernel: DistanceKernel::detect(),
            codebooks: Vec::new(),
        })
    }

    /// Train each subspace codebook with Lloyd's k-means.
    pub fn train(&mut self, data: &[Vec<f32>], n_iter: usize) -> Result<()> {
        if data.is_empty() {
            return Err(QuiverError::InvalidConfig(
                "PQ training requires at least one vector".into(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(TRAIN_RNG_SEED);
        let mut codebooks = Vec::with_capacity(self.m);
        for m_idx in 0..self.m {
            let start = m_idx * self.ds;
            let end = start + self.ds;
            let sub: Vec<Vec<f32>> = data.iter().map(|v| v[start..end].to_vec()).collect();
            codebooks.push(kmeans::lloyd(&sub, self.k, n_iter, &mut rng, self.kernel));
        }

        self.codebooks = codebooks;
        self.trained = true;
        Ok(())
    }

    pub fn train_default(&mut self, data: &[Vec<f32>]) -> Result<()> {
        self.train(data, DEFAULT_TRAIN_ITERS)
    }

    /// Encode vectors to PQ codes, `M` bytes per vector.
    pub fn encode(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<u8>>> {
        if !self.trained {
            return Err(QuiverError::NotTrained);
        }

        let mut codes = Vec::with_capacity(data.len());
        for v in data {
            let mut code = Vec::with_capacity(self.m);
            for m_idx in 0..self.m {
                let start = m_idx * self.ds;
                let slice = &v[start..start + self.ds];
                let (best, _) = kmeans::nearest(slice, &self.codebooks[m_idx], self.kernel);
                code.push(best as u8);
            }
            codes.push(code);
        }
        Ok(codes)
    }

    /// Reconstruct the approximate vector a code stands for.
    pub fn decode(&self, code: &[u8]) -> Result<Vec<f32>> {
        if !self.trained {
            return Err(QuiverError::NotTrained);
        }

        let mut vec = Vec::with_capacity(self.dim);
        for (m_idx, &c) in code.iter().enumerate() {
            vec.extend_from_slice(&self.codebooks[m_idx][c as usize]);
        }
        Ok(vec)
    }

    /// Precompute the `M × K` subspace distance table for one query.
    pub fn build_distance_table(&self, query: &[f32]) -> Result<DistanceTable> {
        if !self.trained {
            return Err(QuiverError::NotTrained);
        }

        let mut tables = Vec::with_capacity(self.m);
        for m_idx in 0..self.m {
            let start = m_idx * self.ds;
            let query_sub = &query[start..start + self.ds];
            let row: Vec<f32> = self.codebooks[m_idx]
                .iter()
                .map(|centroid| self.kernel.l2_squared(query_sub, centroid))
                .collect();
            tables.push(row);
        }
        Ok(DistanceTable { tables })
    }

    /// Asymmetric-distance search over encoded candidates: `M` table
    /// lookups per code, square root, partial top-k. Returns
    /// `(row_index, approximate_euclidean_distance)` ascending.
    pub fn search_adc(&self, query: &[f32], codes: &[Vec<u8>], k: usize) -> Result<Vec<(u32, f32)>> {
        let table = self.build_distance_table(query)?;

        let mut results: Vec<(u32, f32)> = codes
            .iter()
            .enumerate()
            .map(|(i, code)| (i as u32, table.distance_l2(code)))
            .collect();

        let k = k.min(results.len());
        if k > 0 && k < results.len() {
            results.select_nth_unstable_by(k - 1, |a, b| a.1.total_cmp(&b.1));
        }
        results.truncate(k);
        results.sort_unstable_by(|a, b| a.1.total_cmp(&b.1));
        Ok(results)
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Bytes per encoded vector.
    pub fn code_len(&self) -> usize {
        self.m
    }

    /// Compression ratio against raw f32 storage.
    pub fn compression_ratio(&self) -> f32 {
        (self.dim * 4) as f32 / self.m as f32
    }
}

/// Per-query lookup table of squared subspace distances.
pub struct DistanceTable {
    /// tables[m][k] = ‖q⁽ᵐ⁾ − c_k⁽ᵐ⁾‖²
    tables: Vec<Vec<f32>>,
}

impl DistanceTable {
    /// Approximate squared distance of a code: Σ_m tables[m][code[m]].
    #[inline]
    pub fn distance(&self, code: &[u8]) -> f32 {
        let mut total = 0.0f32;
        for (row, &c) in self.tables.iter().zip(code) {
            total += row[c as usize];
        }
        total
    }

    /// Approximate Euclidean distance of a code.
    #[inline]
    pub fn distance_l2(&self, code: &[u8]) -> f32 {
        self.distance(code).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave_data(n: usize, dim: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| {
                (0..dim)
                    .map(|d| ((i * 7 + d) as f32 * 0.13).sin())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_rejects_indivisible_subspace_count() {
        assert!(matches!(
            ProductQuantizer::new(10, 3, 256),
            Err(QuiverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_codebook() {
        assert!(matches!(
            ProductQuantizer::new(8, 4, 257),
            Err(QuiverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_encode_before_train_fails() {
        let pq = ProductQuantizer::new(8, 4, 16).unwrap();
        assert!(matches!(
            pq.encode(&[vec![0.0; 8]]),
            Err(QuiverError::NotTrained)
        ));
    }

    #[test]
    fn test_code_shape() {
        let data = wave_data(100, 16);
        let mut pq = ProductQuantizer::new(16, 4, 32).unwrap();
        pq.train(&data, 10).unwrap();

        let codes = pq.encode(&data).unwrap();
        assert_eq!(codes.len(), 100);
        assert!(codes.iter().all(|c| c.len() == 4));
    }

    #[test]
    fn test_roundtrip_is_exact_when_codebook_covers_data() {
        // With k >= n every training point ends up sitting on a centroid,
        // so encode-then-decode reproduces it.
        let data = wave_data(50, 16);
        let mut pq = ProductQuantizer::new(16, 4, 64).unwrap();
        pq.train(&data, 10).unwrap();

        let codes = pq.encode(&data).unwrap();
        for (v, code) in data.iter().zip(&codes) {
            let decoded = pq.decode(code).unwrap();
            let err: f32 = v
                .iter()
                .zip(&decoded)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            assert!(err < 1e-8, "reconstruction error {err}");
        }
    }

    #[test]
    fn test_reconstruction_error_is_bounded() {
        let data = wave_data(300, 32);
        let mut pq = ProductQuantizer::new(32, 8, 64).unwrap();
        pq.train(&data, 15).unwrap();

        let codes = pq.encode(&data).unwrap();
        let mut total = 0.0f32;
        for (v, code) in data.iter().zip(&codes) {
            let decoded = pq.decode(code).unwrap();
            total += v
                .iter()
                .zip(&decoded)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt();
        }
        let mean = total / data.len() as f32;
        assert!(mean < 1.0, "mean reconstruction L2 {mean}");
    }

    #[test]
    fn test_adc_self_query_ranks_self_first() {
        let data = wave_data(50, 16);
        let mut pq = ProductQuantizer::new(16, 4, 64).unwrap();
        pq.train(&data, 10).unwrap();
        let codes = pq.encode(&data).unwrap();

        for i in [0usize, 25, 49] {
            let hits = pq.search_adc(&data[i], &codes, 1).unwrap();
            assert_eq!(hits[0].0, i as u32);
            assert!(hits[0].1 < 1e-3);
        }
    }

    #[test]
    fn test_adc_matches_decoded_distances() {
        let data = wave_data(80, 16);
        let mut pq = ProductQuantizer::new(16, 4, 32).unwrap();
        pq.train(&data, 10).unwrap();
        let codes = pq.encode(&data).unwrap();

        let query = &data[7];
        let table = pq.build_distance_table(query).unwrap();
        for code in codes.iter().take(10) {
            let decoded = pq.decode(code).unwrap();
            let exact: f32 = query
                .iter()
                .zip(&decoded)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            assert!((table.distance(code) - exact).abs() < 1e-4);
        }
    }

    #[test]
    fn test_compression_ratio() {
        let pq = ProductQuantizer::new(128, 8, 256).unwrap();
        assert_eq!(pq.compression_ratio(), 64.0);
        assert_eq!(pq.code_len(), 8);
    }
}
