// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! HIP (Historical Inverse Probability) estimator for HLL sketches
//!
//! The HIP estimator maintains a running accumulator that is updated incrementally
//! as registers change. The state lives in the HLL preamble of the sketch image, so
//! an estimator is loaded from the image, updated, and stored back.
//!
//! # Estimation Modes
//!
//! - **In-order mode**: the HIP accumulator is the estimate
//! - **Out-of-order mode**: raw HLL estimate with a linear counting correction
//!   for small cardinalities

use crate::common::NumStdDev;
use crate::hll::preamble::{
    extract_hip_accum, extract_kxq0, extract_kxq1, extract_ooo_flag, insert_hip_accum,
    insert_kxq0, insert_kxq1,
};

/// Relative standard error of the HIP estimate, as a multiple of 1/sqrt(K)
const HIP_RSE_FACTOR: f64 = 0.8326;
/// Relative standard error of the raw HLL estimate, as a multiple of 1/sqrt(K)
const HLL_RSE_FACTOR: f64 = 1.04;

/// Register values below this accumulate into kxq0, the rest into kxq1
const KXQ_SPLIT: u8 = 32;

/// HIP estimator state with KxQ registers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HipEstimator {
    /// HIP estimator accumulator
    hip_accum: f64,
    /// KxQ register for values < 32 (larger inverse powers)
    kxq0: f64,
    /// KxQ register for values >= 32 (tiny inverse powers)
    kxq1: f64,
    /// Out-of-order flag: when true, HIP updates are skipped
    out_of_order: bool,
}

impl HipEstimator {
    /// Fresh state for a sketch with 2^lg_config_k registers all at zero
    pub fn new(lg_config_k: u8) -> Self {
        Self {
            hip_accum: 0.0,
            kxq0: (1u32 << lg_config_k) as f64,
            kxq1: 0.0,
            out_of_order: false,
        }
    }

    /// Load the estimator from an HLL image.
    pub fn from_image(bytes: &[u8]) -> Self {
        Self {
            hip_accum: extract_hip_accum(bytes),
            kxq0: extract_kxq0(bytes),
            kxq1: extract_kxq1(bytes),
            out_of_order: extract_ooo_flag(bytes),
        }
    }

    /// Store the numeric state back into an HLL image.
    ///
    /// The out-of-order flag is owned by the preamble flags byte and is not
    /// written here.
    pub fn write_to(&self, bytes: &mut [u8]) {
        insert_hip_accum(bytes, self.hip_accum);
        insert_kxq0(bytes, self.kxq0);
        insert_kxq1(bytes, self.kxq1);
    }

    /// Update the estimator when a register changes from old_value to new_value
    ///
    /// This must be called BEFORE the register itself is written, since the HIP
    /// increment uses the KxQ sum of the state prior to the change.
    pub fn update(&mut self, lg_config_k: u8, old_value: u8, new_value: u8) {
        let k = (1u32 << lg_config_k) as f64;

        if !self.out_of_order {
            self.hip_accum += k / (self.kxq0 + self.kxq1);
        }

        if old_value < KXQ_SPLIT {
            self.kxq0 -= inv_pow2(old_value);
        } else {
            self.kxq1 -= inv_pow2(old_value);
        }

        if new_value < KXQ_SPLIT {
            self.kxq0 += inv_pow2(new_value);
        } else {
            self.kxq1 += inv_pow2(new_value);
        }
    }

    /// Get the current cardinality estimate
    ///
    /// # Arguments
    /// * `lg_config_k` - Log2 of number of registers (k)
    /// * `cur_min` - Current minimum register value (for Array4, 0 for Array6/8)
    /// * `num_at_cur_min` - Number of registers at cur_min value
    pub fn estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        if self.out_of_order {
            self.composite_estimate(lg_config_k, cur_min, num_at_cur_min)
        } else {
            self.hip_accum
        }
    }

    pub fn upper_bound(
        &self,
        lg_config_k: u8,
        cur_min: u8,
        num_at_cur_min: u32,
        num_std_dev: NumStdDev,
    ) -> f64 {
        let estimate = self.estimate(lg_config_k, cur_min, num_at_cur_min);
        let rse = self.rse(lg_config_k) * num_std_dev.as_f64();
        estimate / (1.0 - rse)
    }

    pub fn lower_bound(
        &self,
        lg_config_k: u8,
        cur_min: u8,
        num_at_cur_min: u32,
        num_std_dev: NumStdDev,
    ) -> f64 {
        let estimate = self.estimate(lg_config_k, cur_min, num_at_cur_min);
        let rse = self.rse(lg_config_k) * num_std_dev.as_f64();
        let k = 1u32 << lg_config_k;
        let num_non_zeros = (k - num_zeros(cur_min, num_at_cur_min)) as f64;
        (estimate / (1.0 + rse)).max(num_non_zeros)
    }

    fn rse(&self, lg_config_k: u8) -> f64 {
        let factor = if self.out_of_order {
            HLL_RSE_FACTOR
        } else {
            HIP_RSE_FACTOR
        };
        factor / ((1u32 << lg_config_k) as f64).sqrt()
    }

    /// Raw HLL estimate using the standard HyperLogLog formula
    ///
    /// Formula: correctionFactor * k^2 / (kxq0 + kxq1)
    fn raw_estimate(&self, lg_config_k: u8) -> f64 {
        let k = (1u32 << lg_config_k) as f64;

        let correction_factor = match lg_config_k {
            4 => 0.673,
            5 => 0.697,
            6 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / k),
        };

        (correction_factor * k * k) / (self.kxq0 + self.kxq1)
    }

    /// Raw estimate, switching to linear counting while it is small and
    /// empty registers remain.
    fn composite_estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        let k = (1u32 << lg_config_k) as f64;
        let raw = self.raw_estimate(lg_config_k);
        let zeros = num_zeros(cur_min, num_at_cur_min);

        if raw <= 2.5 * k && zeros > 0 {
            k * (k / zeros as f64).ln()
        } else {
            raw
        }
    }

    #[cfg(test)]
    pub fn hip_accum(&self) -> f64 {
        self.hip_accum
    }

    #[cfg(test)]
    pub fn kxq0(&self) -> f64 {
        self.kxq0
    }

    #[cfg(test)]
    pub fn kxq1(&self) -> f64 {
        self.kxq1
    }

    #[cfg(test)]
    pub fn is_out_of_order(&self) -> bool {
        self.out_of_order
    }
}

/// Registers still at zero; only known while cur_min is zero.
#[inline]
fn num_zeros(cur_min: u8, num_at_cur_min: u32) -> u32 {
    if cur_min == 0 { num_at_cur_min } else { 0 }
}

/// Compute 1 / 2^value (inverse power of 2)
#[inline]
pub(crate) fn inv_pow2(value: u8) -> f64 {
    if value == 0 {
        1.0
    } else if value <= 63 {
        1.0 / (1u64 << value) as f64
    } else {
        f64::exp2(-(value as f64))
    }
}
