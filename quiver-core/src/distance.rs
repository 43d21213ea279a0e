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

//! Distance kernels for vector search.
//!
//! Two binary reductions over equal-length `f32` slices:
//!
//! - `l2_squared`: Σ (x_i − y_i)²
//! - `inner_product`: Σ x_i · y_i
//!
//! The scalar kernels are the reference implementation and are
//! deterministic for identical inputs. The AVX2 variants use 8-wide FMA
//! with a lane-wise reduction, so they may differ from the scalar result
//! by a few ULPs; callers that need bit-exact equality across kernel
//! backends must pin [`SimdCapability::Scalar`].
//!
//! Also provides the brute-force exact k-NN scan that the ANN indices are
//! measured against in recall tests.

use std::sync::OnceLock;

/// Detected SIMD capability of the running CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdCapability {
    /// Scalar fallback, always available.
    Scalar,
    /// AVX2 + FMA (x86_64).
    Avx2,
}

impl SimdCapability {
    /// Detect CPU capability at runtime.
    #[allow(unreachable_code)]
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
                return SimdCapability::Avx2;
            }
        }
        SimdCapability::Scalar
    }

    /// Width in f32 lanes.
    pub fn width(&self) -> usize {
        match self {
            SimdCapability::Scalar => 1,
            SimdCapability::Avx2 => 8,
        }
    }
}

static SIMD_CAPABILITY: OnceLock<SimdCapability> = OnceLock::new();

fn simd_capability() -> SimdCapability {
    *SIMD_CAPABILITY.get_or_init(SimdCapability::detect)
}

// ============================================================================
// Scalar reference kernels
// ============================================================================

/// Squared L2 distance, scalar reference.
#[inline]
pub fn l2_squared_scalar(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

/// Inner product, scalar reference.
#[inline]
pub fn inner_product_scalar(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

/// Cosine similarity with a zero-norm guard: returns 0.0 if either norm
/// falls below 1e-10.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = inner_product_scalar(a, b);
    let denom = inner_product_scalar(a, a).sqrt() * inner_product_scalar(b, b).sqrt();
    if denom > 1e-10 {
        dot / denom
    } else {
        0.0
    }
}

// ============================================================================
// AVX2 kernels
// ============================================================================

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn l2_squared_avx2(a: &[f32], b: &[f32]) -> f32 {
    use std::arch::x86_64::*;

    let n = a.len();
    let mut sum = _mm256_setzero_ps();
    let mut i = 0;

    while i + 8 <= n {
        let va = _mm256_loadu_ps(a.as_ptr().add(i));
        let vb = _mm256_loadu_ps(b.as_ptr().add(i));
        let diff = _mm256_sub_ps(va, vb);
        sum = _mm256_fmadd_ps(diff, diff, sum);
        i += 8;
    }

    // Horizontal reduction of the 8 accumulator lanes
    let hi = _mm256_extractf128_ps(sum, 1);
    let lo = _mm256_castps256_ps128(sum);
    let mut sum128 = _mm_add_ps(lo, hi);
    sum128 = _mm_hadd_ps(sum128, sum128);
    sum128 = _mm_hadd_ps(sum128, sum128);
    let mut result = _mm_cvtss_f32(sum128);

    while i < n {
        let d = a[i] - b[i];
        result += d * d;
        i += 1;
    }
    result
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn inner_product_avx2(a: &[f32], b: &[f32]) -> f32 {
    use std::arch::x86_64::*;

    let n = a.len();
    let mut sum = _mm256_setzero_ps();
    let mut i = 0;

    while i + 8 <= n {
        let va = _mm256_loadu_ps(a.as_ptr().add(i));
        let vb = _mm256_loadu_ps(b.as_ptr().add(i));
        sum = _mm256_fmadd_ps(va, vb, sum);
        i += 8;
    }

    let hi = _mm256_extractf128_ps(sum, 1);
    let lo = _mm256_castps256_ps128(sum);
    let mut sum128 = _mm_add_ps(lo, hi);
    sum128 = _mm_hadd_ps(sum128, sum128);
    sum128 = _mm_hadd_ps(sum128, sum128);
    let mut result = _mm_cvtss_f32(sum128);

    while i < n {
        result += a[i] * b[i];
        i += 1;
    }
    result
}

// ============================================================================
// Kernel dispatcher
// ============================================================================

/// Distance kernel with runtime backend dispatch.
///
/// `Copy` so callers can embed it per index instance; backend selection
/// happens once at construction, not per call.
#[derive(Debug, Clone, Copy)]
pub struct DistanceKernel {
    capability: SimdCapability,
}

impl DistanceKernel {
    /// Kernel with the best backend the CPU supports.
    pub fn detect() -> Self {
        Self {
            capability: simd_capability(),
        }
    }

    /// Kernel pinned to the scalar reference backend.
    pub fn scalar() -> Self {
        Self {
            capability: SimdCapability::Scalar,
        }
    }

    /// Kernel with an explicit backend (used by equivalence tests).
    pub fn with_capability(capability: SimdCapability) -> Self {
        Self { capability }
    }

    pub fn capability(&self) -> SimdCapability {
        self.capability
    }

    /// Squared L2 distance. Lengths are the caller's responsibility.
    #[inline]
    pub fn l2_squared(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self.capability {
            #[cfg(target_arch = "x86_64")]
            SimdCapability::Avx2 => unsafe { l2_squared_avx2(a, b) },
            _ => l2_squared_scalar(a, b),
        }
    }

    /// Inner product. Lengths are the caller's responsibility.
    #[inline]
    pub fn inner_product(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self.capability {
            #[cfg(target_arch = "x86_64")]
            SimdCapability::Avx2 => unsafe { inner_product_avx2(a, b) },
            _ => inner_product_scalar(a, b),
        }
    }
}

impl Default for DistanceKernel {
    fn default() -> Self {
        Self::detect()
    }
}

// ============================================================================
// Brute-force baseline
// ============================================================================

/// Exact k-NN over a flat row-major buffer of `database.len() / dim`
/// vectors. Returns `(l2_squared, row_index)` pairs sorted ascending.
///
/// This is the ground truth the approximate indices are compared against.
pub fn brute_force_knn(query: &[f32], database: &[f32], dim: usize, k: usize) -> Vec<(f32, usize)> {
    debug_assert!(dim > 0 && database.len() % dim == 0);
    let n = database.len() / dim;
    let mut results: Vec<(f32, usize)> = (0..n)
        .map(|i| (l2_squared_scalar(query, &database[i * dim..(i + 1) * dim]), i))
        .collect();

    let k = k.min(n);
    if k > 0 && k < n {
        results.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0));
    }
    results.truncate(k);
    results.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
    results
}
