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

//! HyperLogLog Array8 mode - 8-bit (1 byte per slot) representation
//!
//! Array8 is the simplest HLL array implementation, storing one byte per slot.
//! This provides the maximum value range (0-255) with no bit-packing complexity.

use crate::common::NumStdDev;
use crate::hll::Storage;
use crate::hll::estimator::HipEstimator;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::preamble::HIP_ACCUM_DOUBLE;
use crate::hll::preamble::HLL_BYTE_ARR_START;
use crate::hll::preamble::write_hll_fields;

/// Core Array8 data structure - one byte per slot, no packing
#[derive(Debug)]
pub(super) struct Array8<S> {
    lg_config_k: u8,
    /// HLL image; `bytes[40 + slot] = value`
    storage: S,
    /// Count of slots with value 0
    num_zeros: u32,
    /// HIP estimator for cardinality estimation
    estimator: HipEstimator,
}

impl<S: Storage> Array8<S> {
    pub fn new(mut storage: S, lg_config_k: u8) -> Self {
        let k = 1 << lg_config_k;
        let end = HLL_BYTE_ARR_START + k as usize;
        storage.reserve_len(end);
        storage.as_mut()[HIP_ACCUM_DOUBLE..end].fill(0);

        Self {
            lg_config_k,
            storage,
            num_zeros: k,
            estimator: HipEstimator::new(lg_config_k),
        }
    }

    /// Adopts the buckets already present in `storage`.
    pub fn from_storage(storage: S, lg_config_k: u8, hip_accum: f64, out_of_order: bool) -> Self {
        let k = 1usize << lg_config_k;
        let buckets = &storage.as_ref()[HLL_BYTE_ARR_START..HLL_BYTE_ARR_START + k];
        let num_zeros = buckets.iter().filter(|&&v| v == 0).count() as u32;
        let estimator = HipEstimator::from_values(hip_accum, out_of_order, buckets.iter().copied());
        Self {
            lg_config_k,
            storage,
            num_zeros,
            estimator,
        }
    }

    /// Builds an array holding exactly `values`, one per slot.
    pub fn from_values(
        storage: S,
        lg_config_k: u8,
        values: &[u8],
        hip_accum: f64,
        out_of_order: bool,
    ) -> Self {
        debug_assert_eq!(values.len(), 1 << lg_config_k);
        let mut arr = Self::new(storage, lg_config_k);
        arr.buckets_mut().copy_from_slice(values);
        Self::from_storage(arr.storage, lg_config_k, hip_accum, out_of_order)
    }

    fn buckets_mut(&mut self) -> &mut [u8] {
        let k = 1usize << self.lg_config_k;
        &mut self.storage.as_mut()[HLL_BYTE_ARR_START..HLL_BYTE_ARR_START + k]
    }

    /// Set value in a slot
    #[inline]
    fn put(&mut self, slot: u32, value: u8) {
        self.buckets_mut()[slot as usize] = value;
    }

    /// Update with a coupon
    pub fn update(&mut self, coupon: u32) {
        let mask = (1 << self.lg_config_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        let old_value = self.get(slot);

        if new_value > old_value {
            self.estimator
                .update(self.lg_config_k, old_value, new_value);
            self.put(slot, new_value);
            if old_value == 0 {
                self.num_zeros -= 1;
            }
        }
    }

    pub fn estimator_mut(&mut self) -> &mut HipEstimator {
        &mut self.estimator
    }

    /// Writes the derived header fields back into the image.
    pub fn sync_header(&mut self) {
        write_hll_fields(self.storage.as_mut(), &self.estimator, self.num_zeros, 0);
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}

impl<S: AsRef<[u8]>> Array8<S> {
    /// Get value from a slot
    #[inline]
    pub fn get(&self, slot: u32) -> u8 {
        self.storage.as_ref()[HLL_BYTE_ARR_START + slot as usize]
    }

    /// Bucket values in slot order
    pub fn values(&self) -> impl Iterator<Item = u8> + '_ {
        let k = 1usize << self.lg_config_k;
        self.storage.as_ref()[HLL_BYTE_ARR_START..HLL_BYTE_ARR_START + k]
            .iter()
            .copied()
    }

    /// Get the current cardinality estimate using HIP estimator
    pub fn estimate(&self) -> f64 {
        // Array8 doesn't use cur_min (always 0), so num_at_cur_min = num_zeros
        self.estimator.estimate(self.lg_config_k, 0, self.num_zeros)
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator
            .upper_bound(self.lg_config_k, 0, self.num_zeros, num_std_dev)
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator
            .lower_bound(self.lg_config_k, 0, self.num_zeros, num_std_dev)
    }

    /// Get the number of zero-valued slots
    pub fn num_zeros(&self) -> u32 {
        self.num_zeros
    }

    pub fn estimator(&self) -> &HipEstimator {
        &self.estimator
    }

    /// Writes the derived header fields into `bytes`, an image of this array.
    pub fn write_fields(&self, bytes: &mut [u8]) {
        write_hll_fields(bytes, &self.estimator, self.num_zeros, 0);
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Copies the buckets into `storage` and carries the derived state over.
    pub fn transplant<T: Storage>(&self, mut storage: T) -> Array8<T> {
        let end = HLL_BYTE_ARR_START + (1usize << self.lg_config_k);
        storage.reserve_len(end);
        storage.as_mut()[HLL_BYTE_ARR_START..end]
            .copy_from_slice(&self.storage.as_ref()[HLL_BYTE_ARR_START..end]);
        Array8 {
            lg_config_k: self.lg_config_k,
            storage,
            num_zeros: self.num_zeros,
            estimator: self.estimator.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::coupon;
    use crate::hll::pack_coupon;

    #[test]
    fn test_array8_basic() {
        let arr = Array8::new(Vec::new(), 10);

        assert_eq!(arr.get(0), 0);
        assert_eq!(arr.get(1023), 0);
        assert_eq!(arr.num_zeros(), 1024);
        assert_eq!(arr.storage().len(), HLL_BYTE_ARR_START + 1024);
    }

    #[test]
    fn test_update_basic() {
        let mut arr = Array8::new(Vec::new(), 4);

        arr.update(pack_coupon(0, 5));
        assert_eq!(arr.get(0), 5);

        // smaller value is ignored
        arr.update(pack_coupon(0, 3));
        assert_eq!(arr.get(0), 5);

        arr.update(pack_coupon(0, 42));
        assert_eq!(arr.get(0), 42);

        arr.update(pack_coupon(1, 63));
        assert_eq!(arr.get(1), 63);

        // slot bits above lg_config_k are masked off
        arr.update(pack_coupon(16 + 2, 9));
        assert_eq!(arr.get(2), 9);
    }

    #[test]
    fn test_num_zeros_tracking() {
        let mut arr = Array8::new(Vec::new(), 4);
        assert_eq!(arr.num_zeros(), 16);

        arr.update(pack_coupon(0, 5));
        assert_eq!(arr.num_zeros(), 15);

        arr.update(pack_coupon(0, 10));
        assert_eq!(arr.num_zeros(), 15);

        for i in 1..16 {
            arr.update(pack_coupon(i, 1));
        }
        assert_eq!(arr.num_zeros(), 0);
    }

    #[test]
    fn test_hip_estimator() {
        let mut arr = Array8::new(Vec::new(), 10);
        assert_eq!(arr.estimate(), 0.0);

        for i in 0..10_000u32 {
            arr.update(coupon(i));
        }

        let estimate = arr.estimate();
        assert!(
            (estimate - 10_000.0).abs() < 10_000.0 * 0.1,
            "estimate {estimate} too far off"
        );
        assert!(arr.lower_bound(NumStdDev::Two) <= estimate);
        assert!(arr.upper_bound(NumStdDev::Two) >= estimate);
    }

    #[test]
    fn test_from_storage_recomputes_state() {
        let mut arr = Array8::new(Vec::new(), 8);
        for i in 0..500u32 {
            arr.update(coupon(i));
        }
        arr.sync_header();
        let hip = arr.estimator().hip_accum();
        let expected = arr.estimator().clone();
        let num_zeros = arr.num_zeros();

        let adopted = Array8::from_storage(arr.into_storage(), 8, hip, false);
        assert_eq!(adopted.estimator(), &expected);
        assert_eq!(adopted.num_zeros(), num_zeros);
    }

    #[test]
    fn test_from_values() {
        let values = (0..16u8).collect::<Vec<_>>();
        let arr = Array8::from_values(Vec::new(), 4, &values, 3.5, true);
        assert_eq!(arr.values().collect::<Vec<_>>(), values);
        assert_eq!(arr.num_zeros(), 1);
        assert_eq!(arr.estimator().hip_accum(), 3.5);
        assert!(arr.estimator().is_out_of_order());
    }

    #[test]
    fn test_header_is_written_on_sync() {
        let mut arr = Array8::new(vec![0xFF; 4], 4);
        arr.update(pack_coupon(3, 2));
        arr.sync_header();
        let bytes = arr.storage();
        assert_eq!(&bytes[32..36], &15u32.to_le_bytes());
        assert_eq!(bytes[HLL_BYTE_ARR_START + 3], 2);
    }
}
