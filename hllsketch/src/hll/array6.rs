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

//! HyperLogLog Array6 mode - 6-bit packed representation
//!
//! Array6 stores HLL register values using 6 bits per slot, providing a range of 0-63.
//! This is sufficient for most HLL use cases without needing exception handling or
//! cur_min optimization like Array4.

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::common::NumStdDev;
use crate::hll::HllType;
use crate::hll::Storage;
use crate::hll::estimator::HipEstimator;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::preamble::HIP_ACCUM_DOUBLE;
use crate::hll::preamble::HLL_BYTE_ARR_START;
use crate::hll::preamble::hll_array_bytes;
use crate::hll::preamble::write_hll_fields;

const VAL_MASK_6: u16 = 0x3F;

/// Read a 6-bit value from packed buckets.
///
/// Values may straddle a byte boundary, so a 16-bit little-endian window is read.
#[inline]
pub(super) fn get_raw(buckets: &[u8], slot: u32) -> u8 {
    let start_bit = slot * 6;
    let byte_idx = (start_bit >> 3) as usize;
    let shift = start_bit & 7;
    let two_bytes = LittleEndian::read_u16(&buckets[byte_idx..byte_idx + 2]);
    ((two_bytes >> shift) & VAL_MASK_6) as u8
}

#[inline]
fn put_raw(buckets: &mut [u8], slot: u32, value: u8) {
    debug_assert!(value <= 63, "6-bit value must be 0-63");

    let start_bit = slot * 6;
    let byte_idx = (start_bit >> 3) as usize;
    let shift = start_bit & 7;
    let window = &mut buckets[byte_idx..byte_idx + 2];
    let mut two_bytes = LittleEndian::read_u16(window);
    two_bytes &= !(VAL_MASK_6 << shift);
    two_bytes |= ((value as u16) & VAL_MASK_6) << shift;
    LittleEndian::write_u16(window, two_bytes);
}

/// Core Array6 data structure - stores 6-bit values with cross-byte packing
#[derive(Debug)]
pub(super) struct Array6<S> {
    lg_config_k: u8,
    storage: S,
    /// Count of slots with value 0
    num_zeros: u32,
    /// HIP estimator for cardinality estimation
    estimator: HipEstimator,
}

impl<S: Storage> Array6<S> {
    pub fn new(mut storage: S, lg_config_k: u8) -> Self {
        let k = 1 << lg_config_k;
        let end = HLL_BYTE_ARR_START + hll_array_bytes(lg_config_k, HllType::Hll6);
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
    ///
    /// Values above 63 cannot be represented, so the packed bytes are taken as they are.
    pub fn from_storage(storage: S, lg_config_k: u8, hip_accum: f64, out_of_order: bool) -> Self {
        let mut arr = Self {
            lg_config_k,
            storage,
            num_zeros: 0,
            estimator: HipEstimator::new(lg_config_k),
        };
        arr.num_zeros = arr.values().filter(|&v| v == 0).count() as u32;
        arr.estimator = HipEstimator::from_values(hip_accum, out_of_order, arr.values());
        arr
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
        for (slot, &value) in values.iter().enumerate() {
            arr.put(slot as u32, value);
        }
        Self::from_storage(arr.storage, lg_config_k, hip_accum, out_of_order)
    }

    fn put(&mut self, slot: u32, value: u8) {
        put_raw(
            &mut self.storage.as_mut()[HLL_BYTE_ARR_START..],
            slot,
            value,
        );
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

impl<S: AsRef<[u8]>> Array6<S> {
    /// Get value for a slot
    pub fn get(&self, slot: u32) -> u8 {
        get_raw(&self.storage.as_ref()[HLL_BYTE_ARR_START..], slot)
    }

    /// Bucket values in slot order
    pub fn values(&self) -> impl Iterator<Item = u8> + '_ {
        (0..1u32 << self.lg_config_k).map(|slot| self.get(slot))
    }

    /// Get the current cardinality estimate using HIP estimator
    pub fn estimate(&self) -> f64 {
        // cur_min is always 0, so num_at_cur_min = num_zeros
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
    pub fn transplant<T: Storage>(&self, mut storage: T) -> Array6<T> {
        let end = HLL_BYTE_ARR_START + hll_array_bytes(self.lg_config_k, HllType::Hll6);
        storage.reserve_len(end);
        storage.as_mut()[HLL_BYTE_ARR_START..end]
            .copy_from_slice(&self.storage.as_ref()[HLL_BYTE_ARR_START..end]);
        Array6 {
            lg_config_k: self.lg_config_k,
            storage,
            num_zeros: self.num_zeros,
            estimator: self.estimator.clone(),
        }
    }
}
