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

//! The HyperLogLog sketch.

use std::fmt;
use std::hash::Hash;

use crate::common::NumStdDev;
use crate::common::canonical_double;
use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::HllType;
use crate::hll::MAX_LG_K;
use crate::hll::MIN_LG_K;
use crate::hll::Region;
use crate::hll::Storage;
use crate::hll::check_lg_k;
use crate::hll::coupon;
use crate::hll::coupon_from_bytes;
use crate::hll::coupon_from_hash;
use crate::hll::mode::Mode;
use crate::hll::preamble::max_updatable_bytes;
use crate::hll::serialization::Image;
use crate::hll::serialization::heapify;
use crate::hll::serialization::wrap;

/// A HyperLogLog sketch for estimating the number of distinct items in a stream.
///
/// `S` is the buffer holding the sketch's updatable image: a `Vec<u8>` for ordinary heap
/// sketches, or a [`Region`] for a [`DirectHllSketch`] living in caller memory.
///
/// # Example
///
/// ```
/// use hllsketch::hll::{HllSketch, HllType};
///
/// let mut sketch = HllSketch::new(12, HllType::Hll8);
/// for i in 0..1000u64 {
///     sketch.update(i);
/// }
/// let estimate = sketch.estimate();
/// assert!((estimate - 1000.0).abs() < 50.0);
/// ```
pub struct HllSketch<S = Vec<u8>> {
    lg_config_k: u8,
    mode: Mode<S>,
}

/// A sketch whose image lives in a caller-provided byte region.
///
/// The region always holds a valid updatable image between calls, so it can be handed to
/// [`HllSketch::writable_wrap`] or [`HllSketch::deserialize`] at any time.
pub type DirectHllSketch<'a> = HllSketch<Region<'a>>;

impl HllSketch {
    /// Create a new empty sketch.
    ///
    /// # Panics
    ///
    /// Panics if `lg_config_k` is not in the range [4, 21].
    pub fn new(lg_config_k: u8, hll_type: HllType) -> Self {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k),
            "lg_config_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_config_k}"
        );
        Self {
            lg_config_k,
            mode: Mode::new(Vec::new(), hll_type),
        }
    }

    /// Create a new empty sketch, failing with [`ErrorKind::ConfigInvalid`] if
    /// `lg_config_k` is out of range.
    ///
    /// [`ErrorKind::ConfigInvalid`]: crate::error::ErrorKind::ConfigInvalid
    pub fn try_new(lg_config_k: u8, hll_type: HllType) -> Result<Self, Error> {
        check_lg_k(lg_config_k)?;
        Ok(Self::new(lg_config_k, hll_type))
    }

    /// Deserialize a sketch from either a compact or an updatable image.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let image = Image::parse(bytes)?;
        let mode = heapify(&image)?;
        Ok(Self {
            lg_config_k: image.preamble().lg_config_k,
            mode,
        })
    }

    /// The number of bytes a sketch of this configuration may ever need, and so the
    /// smallest region [`HllSketch::new_in`] accepts.
    ///
    /// # Panics
    ///
    /// Panics if `lg_config_k` is not in the range [4, 21].
    pub fn max_updatable_serialization_bytes(lg_config_k: u8, hll_type: HllType) -> usize {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k),
            "lg_config_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_config_k}"
        );
        max_updatable_bytes(lg_config_k, hll_type)
    }
}

impl<'a> HllSketch<Region<'a>> {
    /// Format an empty sketch inside `region`.
    ///
    /// Fails with [`ErrorKind::InvalidArgument`] if the region is smaller than
    /// [`HllSketch::max_updatable_serialization_bytes`].
    ///
    /// [`ErrorKind::InvalidArgument`]: crate::error::ErrorKind::InvalidArgument
    pub fn new_in(
        lg_config_k: u8,
        hll_type: HllType,
        region: &'a mut [u8],
    ) -> Result<Self, Error> {
        check_lg_k(lg_config_k)?;
        let required = max_updatable_bytes(lg_config_k, hll_type);
        if region.len() < required {
            return Err(Error::invalid_argument(format!(
                "region of {} bytes is smaller than the {required} bytes this sketch may need",
                region.len()
            ))
            .with_context("lg_config_k", lg_config_k)
            .with_context("hll_type", format!("{hll_type:?}")));
        }

        let mut sketch = Self {
            lg_config_k,
            mode: Mode::new(Region::from(region), hll_type),
        };
        sketch.sync();
        Ok(sketch)
    }

    /// Adopt the updatable image in `region` and keep updating it in place.
    pub fn writable_wrap(region: &'a mut [u8]) -> Result<Self, Error> {
        let (lg_config_k, mode) = wrap(Region::from(region))?;
        let mut sketch = Self { lg_config_k, mode };
        sketch.sync();
        Ok(sketch)
    }
}

impl<S: Storage> HllSketch<S> {
    pub(super) fn from_parts(lg_config_k: u8, mode: Mode<S>) -> Self {
        Self { lg_config_k, mode }
    }

    pub(super) fn mode(&self) -> &Mode<S> {
        &self.mode
    }

    pub(super) fn mode_mut(&mut self) -> &mut Mode<S> {
        &mut self.mode
    }

    pub(super) fn set_lg_config_k(&mut self, lg_config_k: u8) {
        self.lg_config_k = lg_config_k;
    }

    /// Restamps the image header if the image lives in caller memory.
    pub(super) fn sync(&mut self) {
        if S::WRITE_THROUGH {
            self.mode.sync(self.lg_config_k);
        }
    }

    pub(super) fn update_coupon(&mut self, coupon: u32) {
        self.mode.update(self.lg_config_k, coupon);
        self.sync();
    }

    /// Update the sketch with a hashable value
    ///
    /// For `f32`/`f64`, use [`update_f32`](Self::update_f32) and
    /// [`update_f64`](Self::update_f64), which hash equal numbers alike.
    pub fn update<T: Hash>(&mut self, value: T) {
        self.update_coupon(coupon(value));
    }

    /// Update the sketch with raw bytes. Empty input is ignored.
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.update_coupon(coupon_from_bytes(bytes));
    }

    /// Update the sketch with the UTF-8 bytes of a string. Empty strings are ignored.
    pub fn update_str(&mut self, value: &str) {
        self.update_bytes(value.as_bytes());
    }

    /// Update the sketch with a double; `-0.0` counts as `0.0` and all NaNs as one item.
    pub fn update_f64(&mut self, value: f64) {
        self.update_bytes(&canonical_double(value).to_le_bytes());
    }

    /// Update the sketch with a float, widened to a double first.
    pub fn update_f32(&mut self, value: f32) {
        self.update_f64(value as f64);
    }

    /// Update the sketch with the two halves of an externally computed 128-bit hash.
    pub fn update_hash(&mut self, h0: u64, h1: u64) {
        self.update_coupon(coupon_from_hash(h0, h1));
    }

    /// Return to an empty LIST sketch with the same configuration.
    pub fn reset(&mut self) {
        self.mode.reset();
        self.sync();
    }

    /// Copy this sketch to an independent heap sketch.
    pub fn copy(&self) -> HllSketch {
        HllSketch {
            lg_config_k: self.lg_config_k,
            mode: self.mode.transplant(Vec::new()),
        }
    }

    /// Copy this sketch to a heap sketch of another target type.
    ///
    /// The accumulator and the out-of-order flag carry over, so converting back to the
    /// original type gives back the same estimate.
    pub fn copy_as(&self, hll_type: HllType) -> HllSketch {
        HllSketch {
            lg_config_k: self.lg_config_k,
            mode: self.mode.copy_as(Vec::new(), self.lg_config_k, hll_type),
        }
    }

    /// Whether updates still land in the caller's region
    pub fn is_direct(&self) -> bool {
        self.mode.storage().is_borrowed()
    }

    pub fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    pub fn target_type(&self) -> HllType {
        self.mode.hll_type()
    }

    pub fn current_mode(&self) -> CurMode {
        self.mode.cur_mode()
    }

    pub fn is_empty(&self) -> bool {
        self.mode.is_empty()
    }

    /// Whether the sketch has moved on to its dense bucket array
    pub fn is_estimation_mode(&self) -> bool {
        self.mode.cur_mode() == CurMode::Hll
    }

    /// Whether the accumulator no longer reflects the update history, in which case the
    /// estimate comes from the bucket values alone.
    pub fn is_out_of_order(&self) -> bool {
        self.mode.is_out_of_order()
    }

    /// Get the current cardinality estimate
    pub fn estimate(&self) -> f64 {
        self.mode.estimate()
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.mode.lower_bound(num_std_dev)
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.mode.upper_bound(num_std_dev)
    }

    /// Serialize to the compact, read-only image.
    pub fn serialize(&self) -> Vec<u8> {
        self.mode.write_compact(self.lg_config_k)
    }

    /// Serialize to the updatable image, which [`HllSketch::writable_wrap`] accepts
    /// once copied into a region of
    /// [`max_updatable_serialization_bytes`](HllSketch::max_updatable_serialization_bytes).
    pub fn serialize_updatable(&self) -> Vec<u8> {
        self.mode.write_updatable(self.lg_config_k)
    }

    pub fn compact_serialization_bytes(&self) -> usize {
        self.mode.compact_bytes(self.lg_config_k)
    }

    pub fn updatable_serialization_bytes(&self) -> usize {
        self.mode.updatable_bytes(self.lg_config_k)
    }
}

impl Clone for HllSketch {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl<S: Storage> fmt::Debug for HllSketch<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HllSketch")
            .field("lg_config_k", &self.lg_config_k)
            .field("target_type", &self.target_type())
            .field("current_mode", &self.current_mode())
            .field("out_of_order", &self.is_out_of_order())
            .field("direct", &self.is_direct())
            .field("estimate", &self.estimate())
            .finish()
    }
}
