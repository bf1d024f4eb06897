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

//! HyperLogLog Union for combining multiple HLL sketches
//!
//! The union maintains an internal "gadget" sketch that accumulates the union of all
//! input sketches. The gadget is always [`HllType::Hll8`]. Inputs may differ in mode,
//! target type and `lg_config_k`; the gadget's `lg_config_k` is the smallest one seen so
//! far, capped at `lg_max_k`.
//!
//! # Example
//!
//! ```
//! use hllsketch::hll::{HllSketch, HllType, HllUnion};
//!
//! let mut union = HllUnion::new(12);
//!
//! let mut sketch1 = HllSketch::new(12, HllType::Hll8);
//! sketch1.update("foo");
//! sketch1.update("bar");
//!
//! let mut sketch2 = HllSketch::new(12, HllType::Hll4);
//! sketch2.update("bar");
//! sketch2.update("baz");
//!
//! union.update(&sketch1);
//! union.update(&sketch2);
//!
//! let result = union.get_result(HllType::Hll8);
//! assert_eq!(result.estimate().round(), 3.0);
//! ```

use std::fmt;

use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::HllSketch;
use crate::hll::HllType;
use crate::hll::MAX_LG_K;
use crate::hll::MIN_LG_K;
use crate::hll::Region;
use crate::hll::Storage;
use crate::hll::check_lg_k;
use crate::hll::mode::Mode;

/// An HLL Union for combining multiple HLL sketches.
pub struct HllUnion<S = Vec<u8>> {
    /// Maximum lg_k that this union can handle
    lg_max_k: u8,
    /// Internal sketch that accumulates the union
    gadget: HllSketch<S>,
}

impl HllUnion {
    /// Create a new HLL Union
    ///
    /// # Arguments
    ///
    /// * `lg_max_k` - Maximum log2 of the number of buckets. Must be in [4, 21]. Input
    ///   sketches with larger lg_k will be down-sampled.
    ///
    /// # Panics
    ///
    /// Panics if `lg_max_k` is not in the range [4, 21].
    pub fn new(lg_max_k: u8) -> Self {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_max_k),
            "lg_max_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_max_k}"
        );
        Self {
            lg_max_k,
            gadget: HllSketch::new(lg_max_k, HllType::Hll8),
        }
    }

    /// Create a new HLL Union, failing with [`ErrorKind::ConfigInvalid`] if `lg_max_k`
    /// is out of range.
    ///
    /// [`ErrorKind::ConfigInvalid`]: crate::error::ErrorKind::ConfigInvalid
    pub fn try_new(lg_max_k: u8) -> Result<Self, Error> {
        check_lg_k(lg_max_k)?;
        Ok(Self::new(lg_max_k))
    }
}

impl<'a> HllUnion<Region<'a>> {
    /// Create a union whose gadget lives in `region`.
    ///
    /// The region must hold at least
    /// [`HllSketch::max_updatable_serialization_bytes`]`(lg_max_k, HllType::Hll8)` bytes.
    pub fn new_in(lg_max_k: u8, region: &'a mut [u8]) -> Result<Self, Error> {
        let gadget = HllSketch::new_in(lg_max_k, HllType::Hll8, region)?;
        Ok(Self { lg_max_k, gadget })
    }
}

impl<S: Storage> HllUnion<S> {
    /// Update the union with another sketch
    ///
    /// # Algorithm
    ///
    /// 1. An empty sketch is ignored.
    /// 2. If the sketch's lg_k is below the gadget's, the gadget is down-sampled first.
    /// 3. Coupons of a LIST or SET sketch are replayed into the gadget.
    /// 4. An HLL sketch is copied (or down-sampled) into a fresh 8-bit array when the
    ///    gadget still holds coupons, and those coupons are replayed on top of it.
    ///    Otherwise buckets are merged by taking the maximum of each pair.
    pub fn update<T: Storage>(&mut self, sketch: &HllSketch<T>) {
        self.union_impl(sketch.lg_config_k(), sketch.mode());
        self.gadget.sync();
    }

    /// Deserialize an image and merge it into the union.
    ///
    /// The update order of serialized sketches is unknown, so a gadget in HLL mode is
    /// flagged out of order afterwards.
    pub fn update_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let sketch = HllSketch::deserialize(bytes)?;
        self.union_impl(sketch.lg_config_k(), sketch.mode());
        if let Some(estimator) = self.gadget.mode_mut().estimator_mut() {
            estimator.set_out_of_order(true);
        }
        self.gadget.sync();
        Ok(())
    }

    fn union_impl<T: Storage>(&mut self, src_lg_k: u8, src: &Mode<T>) {
        if src.is_empty() {
            return;
        }

        let gadget_lg_k = self.gadget.lg_config_k();
        if src_lg_k < gadget_lg_k {
            self.downsample_gadget(src_lg_k);
        }
        let lg_k = self.gadget.lg_config_k();

        match (src.cur_mode(), self.gadget.current_mode()) {
            (CurMode::List | CurMode::Set, _) => {
                // replay leaves the out-of-order flag alone for every source type
                for coupon in src.coupons() {
                    self.gadget.mode_mut().update(lg_k, coupon);
                }
            }
            (CurMode::Hll, CurMode::List | CurMode::Set) => {
                let gadget_coupons = self.gadget.mode().coupons();
                let (hip_accum, src_out_of_order) = src
                    .estimator()
                    .map_or((0.0, true), |e| (e.hip_accum(), e.is_out_of_order()));
                let out_of_order = !gadget_coupons.is_empty()
                    || src_out_of_order
                    || src.hll_type() != HllType::Hll8
                    || src_lg_k != gadget_lg_k;

                let values = downsample(&src.hll_values().unwrap_or_default(), lg_k);
                let storage = self.gadget.mode_mut().take_storage();
                let mut mode =
                    Mode::from_values(storage, lg_k, HllType::Hll8, &values, hip_accum, out_of_order);
                for coupon in gadget_coupons {
                    mode.update(lg_k, coupon);
                }
                self.gadget = HllSketch::from_parts(lg_k, mode);
            }
            (CurMode::Hll, CurMode::Hll) => {
                let mode = self.gadget.mode_mut();
                if let Some(estimator) = mode.estimator_mut() {
                    estimator.set_out_of_order(true);
                }
                for coupon in src.coupons() {
                    mode.update(lg_k, coupon);
                }
            }
        }
    }

    /// Rebuilds the gadget at a smaller lg_k.
    fn downsample_gadget(&mut self, lg_k: u8) {
        tracing::debug!(
            from = self.gadget.lg_config_k(),
            to = lg_k,
            mode = ?self.gadget.current_mode(),
            "downsampling union gadget"
        );

        let mode = self.gadget.mode_mut();
        match mode.hll_values() {
            None => {
                let coupons = mode.coupons();
                mode.reset();
                for coupon in coupons {
                    mode.update(lg_k, coupon);
                }
            }
            Some(values) => {
                let values = downsample(&values, lg_k);
                let storage = mode.take_storage();
                *mode = Mode::from_values(storage, lg_k, HllType::Hll8, &values, 0.0, true);
            }
        }
        self.gadget.set_lg_config_k(lg_k);
    }

    /// Get the union result as a new sketch of the given target type
    pub fn get_result(&self, hll_type: HllType) -> HllSketch {
        self.gadget.copy_as(hll_type)
    }

    /// Reset the union to its initial empty state
    pub fn reset(&mut self) {
        self.gadget.set_lg_config_k(self.lg_max_k);
        self.gadget.reset();
    }

    /// Check if the union is empty (no non-empty sketches have been added)
    pub fn is_empty(&self) -> bool {
        self.gadget.is_empty()
    }

    /// Get the current cardinality estimate of the union
    pub fn estimate(&self) -> f64 {
        self.gadget.estimate()
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.gadget.lower_bound(num_std_dev)
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.gadget.upper_bound(num_std_dev)
    }

    /// Get the current lg_config_k of the internal gadget
    pub fn lg_config_k(&self) -> u8 {
        self.gadget.lg_config_k()
    }

    /// Get the maximum lg_k this union can handle
    pub fn lg_max_k(&self) -> u8 {
        self.lg_max_k
    }

    /// Whether the gadget still writes into the caller's region
    pub fn is_direct(&self) -> bool {
        self.gadget.is_direct()
    }
}

/// Folds bucket values onto `1 << lg_k` buckets, keeping the maximum per bucket.
fn downsample(values: &[u8], lg_k: u8) -> Vec<u8> {
    let mask = (1usize << lg_k) - 1;
    let mut folded = vec![0u8; 1 << lg_k];
    for (slot, &value) in values.iter().enumerate() {
        let bucket = &mut folded[slot & mask];
        *bucket = (*bucket).max(value);
    }
    folded
}

impl Clone for HllUnion {
    fn clone(&self) -> Self {
        Self {
            lg_max_k: self.lg_max_k,
            gadget: self.gadget.copy(),
        }
    }
}

impl<S: Storage> fmt::Debug for HllUnion<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HllUnion")
            .field("lg_max_k", &self.lg_max_k)
            .field("gadget", &self.gadget)
            .finish()
    }
}
