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

//! HIP (Historical Inverse Probability) Estimator for HyperLogLog
//!
//! The HIP estimator provides improved cardinality estimation by maintaining
//! an accumulator that tracks the historical sequence of register updates.
//! This is more accurate than the standard HLL estimator, especially for
//! moderate cardinalities.

use crate::common::NumStdDev;
use crate::hll::composite_interpolation;
use crate::hll::cubic_interpolation;
use crate::hll::harmonic_numbers;

const HLL_HIP_RSE_FACTOR: f64 = 0.832_554_6; // sqrt(ln 2)
const HLL_NON_HIP_RSE_FACTOR: f64 = 1.038_96; // sqrt(3 ln 2 - 1)

/// HIP estimator with KxQ registers for improved cardinality estimation
///
/// This struct encapsulates all estimation-related state and logic,
/// allowing it to be composed into Array4, Array6, and Array8.
///
/// The estimator supports two modes:
/// - **In-order mode**: Uses HIP (Historical Inverse Probability) accumulator
///   for accurate sequential updates
/// - **Out-of-order mode**: Uses composite estimator (raw HLL + linear counting)
///   after deserialization or merging
#[derive(Debug, Clone, PartialEq)]
pub(super) struct HipEstimator {
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
    /// Create a new HIP estimator for a sketch with 2^lg_config_k registers
    pub fn new(lg_config_k: u8) -> Self {
        let k = 1 << lg_config_k;
        Self {
            hip_accum: 0.0,
            kxq0: k as f64, // All registers start at 0, so kxq0 = k * (1/2^0) = k
            kxq1: 0.0,
            out_of_order: false,
        }
    }

    /// Estimator for an existing set of register values.
    ///
    /// The KxQ registers are rebuilt from `values`; only the accumulator and the
    /// out-of-order flag are taken as given.
    pub fn from_values(
        hip_accum: f64,
        out_of_order: bool,
        values: impl IntoIterator<Item = u8>,
    ) -> Self {
        let mut kxq0 = 0.0;
        let mut kxq1 = 0.0;
        for value in values {
            if value < 32 {
                kxq0 += inv_pow2(value);
            } else {
                kxq1 += inv_pow2(value);
            }
        }
        Self {
            hip_accum,
            kxq0,
            kxq1,
            out_of_order,
        }
    }

    /// Update the estimator when a register changes from old_value to new_value
    ///
    /// This should be called BEFORE actually updating the register in the array.
    ///
    /// The KxQ registers are split for numerical precision:
    /// - kxq0: sum of 1/2^v for v < 32
    /// - kxq1: sum of 1/2^v for v >= 32
    pub fn update(&mut self, lg_config_k: u8, old_value: u8, new_value: u8) {
        let k = (1 << lg_config_k) as f64;

        // When out-of-order (from deserialization or merge), HIP is invalid
        if !self.out_of_order {
            self.hip_accum += k / (self.kxq0 + self.kxq1);
        }

        self.update_kxq(old_value, new_value);
    }

    fn update_kxq(&mut self, old_value: u8, new_value: u8) {
        if old_value < 32 {
            self.kxq0 -= inv_pow2(old_value);
        } else {
            self.kxq1 -= inv_pow2(old_value);
        }

        if new_value < 32 {
            self.kxq0 += inv_pow2(new_value);
        } else {
            self.kxq1 += inv_pow2(new_value);
        }
    }

    /// Get the current cardinality estimate
    ///
    /// Dispatches to either HIP or composite estimator based on out-of-order flag.
    ///
    /// # Arguments
    /// * `lg_config_k` - Log2 of number of registers (k)
    /// * `cur_min` - Current minimum register value (for Array4, 0 for Array6/8)
    /// * `num_at_cur_min` - Number of registers at cur_min value
    pub fn estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        if self.out_of_order {
            self.get_composite_estimate(lg_config_k, cur_min, num_at_cur_min)
        } else {
            self.hip_accum
        }
    }

    /// Upper confidence bound, never below the estimate
    pub fn upper_bound(
        &self,
        lg_config_k: u8,
        cur_min: u8,
        num_at_cur_min: u32,
        num_std_dev: NumStdDev,
    ) -> f64 {
        let estimate = self.estimate(lg_config_k, cur_min, num_at_cur_min);
        let rel_err = get_rel_err(lg_config_k, true, self.out_of_order, num_std_dev);
        estimate / (1.0 + rel_err)
    }

    /// Lower confidence bound, never below the number of non-empty registers
    pub fn lower_bound(
        &self,
        lg_config_k: u8,
        cur_min: u8,
        num_at_cur_min: u32,
        num_std_dev: NumStdDev,
    ) -> f64 {
        let k = 1u32 << lg_config_k;
        let num_non_zeros = if cur_min == 0 {
            k - num_at_cur_min
        } else {
            k
        };
        let estimate = self.estimate(lg_config_k, cur_min, num_at_cur_min);
        let rel_err = get_rel_err(lg_config_k, false, self.out_of_order, num_std_dev);
        (estimate / (1.0 + rel_err)).max(num_non_zeros as f64)
    }

    /// Get raw HLL estimate using standard HyperLogLog formula
    ///
    /// Formula: correctionFactor * k^2 / (kxq0 + kxq1)
    fn get_raw_estimate(&self, lg_config_k: u8) -> f64 {
        let k = (1 << lg_config_k) as f64;

        let correction_factor = match lg_config_k {
            4 => 0.673,
            5 => 0.697,
            6 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / k),
        };

        (correction_factor * k * k) / (self.kxq0 + self.kxq1)
    }

    /// Linear counting (bitmap) estimate from the number of empty registers
    fn get_bitmap_estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        let k = 1 << lg_config_k;

        let num_unhit = if cur_min == 0 { num_at_cur_min } else { 0 };

        // all buckets hit
        if num_unhit == 0 {
            return (k as f64) * (k as f64 / 0.5).ln();
        }

        let num_hit = k - num_unhit;
        harmonic_numbers::bitmap_estimate(k, num_hit)
    }

    /// Composite estimate: bias-corrected raw HLL, or linear counting below the crossover
    fn get_composite_estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        let raw_est = self.get_raw_estimate(lg_config_k);

        let x_arr = composite_interpolation::get_x_arr(lg_config_k);
        let x_arr_len = composite_interpolation::get_x_arr_length();
        let y_stride = composite_interpolation::get_y_stride(lg_config_k) as f64;

        if raw_est < x_arr[0] {
            return 0.0;
        }

        let x_arr_len_m1 = x_arr_len - 1;

        // Above interpolation range: extrapolate linearly
        if raw_est > x_arr[x_arr_len_m1] {
            let final_y = y_stride * (x_arr_len_m1 as f64);
            let factor = final_y / x_arr[x_arr_len_m1];
            return raw_est * factor;
        }

        let adj_est = cubic_interpolation::using_x_arr_and_y_stride(x_arr, y_stride, raw_est);

        // Linear counting is only trusted well below 3k
        let k = 1 << lg_config_k;
        if adj_est > (3 * k) as f64 {
            return adj_est;
        }

        let lin_est = self.get_bitmap_estimate(lg_config_k, cur_min, num_at_cur_min);

        // The average of the two is compared against the crossover to reduce bias
        let avg_est = (adj_est + lin_est) / 2.0;

        let crossover = match lg_config_k {
            4 => 0.718,
            5 => 0.672,
            _ => 0.64,
        };

        if avg_est > crossover * (k as f64) {
            adj_est
        } else {
            lin_est
        }
    }

    pub fn hip_accum(&self) -> f64 {
        self.hip_accum
    }

    pub fn kxq0(&self) -> f64 {
        self.kxq0
    }

    pub fn kxq1(&self) -> f64 {
        self.kxq1
    }

    pub fn is_out_of_order(&self) -> bool {
        self.out_of_order
    }

    /// Set the out-of-order flag
    ///
    /// Going out of order discards the HIP accumulator.
    pub fn set_out_of_order(&mut self, ooo: bool) {
        self.out_of_order = ooo;
        if ooo {
            self.hip_accum = 0.0;
        }
    }

    pub fn set_hip_accum(&mut self, value: f64) {
        self.hip_accum = value;
    }
}

/// Compute 1 / 2^value (inverse power of 2)
#[inline]
fn inv_pow2(value: u8) -> f64 {
    if value == 0 {
        1.0
    } else if value <= 63 {
        1.0 / (1u64 << value) as f64
    } else {
        f64::exp2(-(value as f64))
    }
}

/// Relative error of the HLL bounds.
///
/// Lower bound errors are positive and upper bound errors negative, so that
/// `estimate / (1 + rel_err)` lands on the right side of the estimate.
fn get_rel_err(lg_config_k: u8, upper_bound: bool, ooo: bool, num_std_dev: NumStdDev) -> f64 {
    if lg_config_k > 12 {
        let rse_factor = if ooo {
            HLL_NON_HIP_RSE_FACTOR
        } else {
            HLL_HIP_RSE_FACTOR
        };
        let k = (1 << lg_config_k) as f64;
        let sign = if upper_bound { -1.0 } else { 1.0 };
        return sign * num_std_dev.as_f64() * rse_factor / k.sqrt();
    }

    let idx = ((lg_config_k as usize) - 4) * 3 + ((num_std_dev as usize) - 1);
    match (ooo, upper_bound) {
        (false, false) => HIP_LB[idx],
        (false, true) => HIP_UB[idx],
        (true, false) => NON_HIP_LB[idx],
        (true, true) => NON_HIP_UB[idx],
    }
}

// Empirical quantiles Q(.84134), Q(.97725), Q(.99865) for lower bounds and
// Q(.15866), Q(.02275), Q(.00135) for upper bounds, three per lg_config_k in 4..=12.

#[rustfmt::skip]
const HIP_LB: [f64; 27] = [
    0.207316195, 0.502865572, 0.882303765, // 4
    0.146981579, 0.335426881, 0.557052,    // 5
    0.104026721, 0.227683872, 0.365888317, // 6
    0.073614601, 0.156781585, 0.245740374, // 7
    0.05205248,  0.108783763, 0.168030442, // 8
    0.036770852, 0.075727545, 0.11593785,  // 9
    0.025990219, 0.053145536, 0.080772263, // 10
    0.018373987, 0.037266176, 0.056271814, // 11
    0.012936253, 0.02613829,  0.039387631, // 12
];

#[rustfmt::skip]
const HIP_UB: [f64; 27] = [
    -0.207805347, -0.355574279, -0.475535095, // 4
    -0.146988328, -0.262390832, -0.360864026, // 5
    -0.103877775, -0.191503663, -0.269311582, // 6
    -0.073452978, -0.138513438, -0.198487447, // 7
    -0.051982806, -0.099703123, -0.144128618, // 8
    -0.036768609, -0.07138158,  -0.104430324, // 9
    -0.025991325, -0.050854296, -0.0748143,   // 10
    -0.01834533,  -0.036121138, -0.05327616,  // 11
    -0.012920332, -0.025572893, -0.037896952, // 12
];

#[rustfmt::skip]
const NON_HIP_LB: [f64; 27] = [
    0.254409839, 0.682266712, 1.304022158, // 4
    0.181817353, 0.443389054, 0.778776219, // 5
    0.129432281, 0.295782195, 0.49252279,  // 6
    0.091640655, 0.201175925, 0.323664385, // 7
    0.064858051, 0.138523393, 0.218805328, // 8
    0.045851855, 0.095925072, 0.148635751, // 9
    0.032454144, 0.067009668, 0.102660669, // 10
    0.022921382, 0.046868565, 0.071307398, // 11
    0.016155679, 0.032825719, 0.049677541, // 12
];

#[rustfmt::skip]
const NON_HIP_UB: [f64; 27] = [
    -0.256980172, -0.411905944, -0.52651057,  // 4
    -0.182332109, -0.310275547, -0.412660505, // 5
    -0.129314228, -0.230142294, -0.315636197, // 6
    -0.091584836, -0.16834013,  -0.236346847, // 7
    -0.06487411,  -0.122045231, -0.174112107, // 8
    -0.04591465,  -0.08784505,  -0.126917615, // 9
    -0.032433119, -0.062897613, -0.091862929, // 10
    -0.022960633, -0.044875401, -0.065736049, // 11
    -0.016186662, -0.031827816, -0.046973459, // 12
];
