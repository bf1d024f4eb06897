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

//! HyperLogLog Array4 mode - 4-bit packed representation with exception handling
//!
//! Array4 stores HLL register values using 4 bits per slot (2 slots per byte), relative
//! to `cur_min`, the smallest value across all slots. When a value exceeds the nibble
//! range after the offset, the nibble holds [`AUX_TOKEN`] and the real value lives in an
//! exception table placed right after the nibbles in the same image.

use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::HllType;
use crate::hll::LG_AUX_ARR_INTS;
use crate::hll::Storage;
use crate::hll::aux_map::AuxMap;
use crate::hll::aux_map::aux_table_bytes;
use crate::hll::estimator::HipEstimator;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::pack_coupon;
use crate::hll::preamble::HIP_ACCUM_DOUBLE;
use crate::hll::preamble::HLL_BYTE_ARR_START;
use crate::hll::preamble::hll_array_bytes;
use crate::hll::preamble::write_hll_fields;

pub(super) const AUX_TOKEN: u8 = 15;

/// Raw nibble of `slot`: low nibble for even slots, high nibble for odd ones
#[inline]
pub(super) fn get_nibble(buckets: &[u8], slot: u32) -> u8 {
    let byte = buckets[(slot >> 1) as usize];
    if slot & 1 == 0 { byte & 15 } else { byte >> 4 }
}

#[inline]
fn put_nibble(buckets: &mut [u8], slot: u32, value: u8) {
    debug_assert!(value <= AUX_TOKEN);
    let byte = &mut buckets[(slot >> 1) as usize];
    *byte = if slot & 1 == 0 {
        (*byte & 0xF0) | (value & 0x0F)
    } else {
        (*byte & 0x0F) | (value << 4)
    };
}

/// Core Array4 data structure - stores 4-bit values efficiently
#[derive(Debug)]
pub(super) struct Array4<S> {
    lg_config_k: u8,
    storage: S,
    /// Current minimum value offset
    cur_min: u8,
    /// Count of slots at exactly cur_min (when 0, increment cur_min)
    num_at_cur_min: u32,
    /// Log2 of the exception table slots
    lg_aux_arr_ints: u8,
    /// Number of exceptions
    aux_count: u32,
    /// HIP estimator for cardinality estimation
    estimator: HipEstimator,
}

impl<S: Storage> Array4<S> {
    pub fn new(mut storage: S, lg_config_k: u8) -> Self {
        let lg_aux_arr_ints = LG_AUX_ARR_INTS[lg_config_k as usize];
        let end = aux_start(lg_config_k) + aux_table_bytes(lg_aux_arr_ints);
        storage.reserve_len(end);
        storage.as_mut()[HIP_ACCUM_DOUBLE..end].fill(0);

        Self {
            lg_config_k,
            storage,
            cur_min: 0,
            num_at_cur_min: 1 << lg_config_k,
            lg_aux_arr_ints,
            aux_count: 0,
            estimator: HipEstimator::new(lg_config_k),
        }
    }

    /// Adopts an updatable image already present in `storage`.
    ///
    /// Everything except the floor, the table size, the accumulator and the
    /// out-of-order flag is rebuilt from the nibbles and the exception table.
    pub fn from_storage(
        storage: S,
        lg_config_k: u8,
        cur_min: u8,
        lg_aux_arr_ints: u8,
        hip_accum: f64,
        out_of_order: bool,
    ) -> Result<Self, Error> {
        let required = aux_start(lg_config_k) + aux_table_bytes(lg_aux_arr_ints);
        if storage.as_ref().len() < required || lg_aux_arr_ints > lg_config_k {
            return Err(Error::deserial(format!(
                "HLL4 image needs {required} bytes with a table of 2^{lg_aux_arr_ints} entries, got {}",
                storage.as_ref().len()
            )));
        }

        let mut arr = Self {
            lg_config_k,
            storage,
            cur_min,
            num_at_cur_min: 0,
            lg_aux_arr_ints,
            aux_count: 0,
            estimator: HipEstimator::new(lg_config_k),
        };
        arr.aux_count = arr.aux().iter().count() as u32;

        let mut values = Vec::with_capacity(1 << lg_config_k);
        for slot in 0..1u32 << lg_config_k {
            let value = arr
                .value_at(slot)
                .map_err(|err| Error::deserial(err.message()))?;
            values.push(value);
        }
        arr.num_at_cur_min = values.iter().filter(|&&v| v == cur_min).count() as u32;
        if arr.num_at_cur_min == 0 {
            return Err(Error::deserial(format!(
                "HLL4 image has no bucket at its floor {cur_min}"
            )));
        }
        arr.estimator = HipEstimator::from_values(hip_accum, out_of_order, values);
        Ok(arr)
    }

    /// Builds an array holding exactly `values`, one per slot.
    ///
    /// The floor and its population are computed first, so that every value lands
    /// directly in its final nibble or exception.
    pub fn from_values(
        storage: S,
        lg_config_k: u8,
        values: &[u8],
        hip_accum: f64,
        out_of_order: bool,
    ) -> Self {
        debug_assert_eq!(values.len(), 1 << lg_config_k);
        let mut arr = Self::new(storage, lg_config_k);
        let cur_min = values.iter().copied().min().unwrap_or(0);
        arr.cur_min = cur_min;
        arr.num_at_cur_min = values.iter().filter(|&&v| v == cur_min).count() as u32;

        for (slot, &value) in values.iter().enumerate() {
            let slot = slot as u32;
            let shifted = value - cur_min;
            if shifted >= AUX_TOKEN {
                arr.put_raw(slot, AUX_TOKEN);
                arr.aux_add(slot, value);
            } else {
                arr.put_raw(slot, shifted);
            }
        }
        arr.estimator = HipEstimator::from_values(hip_accum, out_of_order, values.iter().copied());
        arr
    }

    fn put_raw(&mut self, slot: u32, value: u8) {
        put_nibble(
            &mut self.storage.as_mut()[HLL_BYTE_ARR_START..],
            slot,
            value,
        );
    }

    fn aux_add(&mut self, slot: u32, value: u8) {
        let start = aux_start(self.lg_config_k);
        if self.aux().grows_on_next_add() {
            self.storage
                .reserve_len(start + aux_table_bytes(self.lg_aux_arr_ints + 1));
        }
        let mut aux = AuxMap::new(
            &mut self.storage.as_mut()[start..],
            self.lg_aux_arr_ints,
            self.aux_count,
        );
        if let Err(err) = aux.must_add(slot, value) {
            panic!("HLL4 exception table out of sync: {err}");
        }
        self.lg_aux_arr_ints = aux.lg_aux_arr_ints();
        self.aux_count = aux.count();
    }

    fn aux_replace(&mut self, slot: u32, value: u8) {
        let start = aux_start(self.lg_config_k);
        let mut aux = AuxMap::new(
            &mut self.storage.as_mut()[start..],
            self.lg_aux_arr_ints,
            self.aux_count,
        );
        if let Err(err) = aux.must_replace(slot, value) {
            panic!("HLL4 exception table out of sync: {err}");
        }
    }

    pub fn update(&mut self, coupon: u32) {
        let mask = (1 << self.lg_config_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        // Quick rejection: if new value <= cur_min, no update needed
        if new_value <= self.cur_min {
            return;
        }

        let raw_stored = self.get_raw(slot);
        let lower_bound = raw_stored + self.cur_min;
        if new_value <= lower_bound {
            return;
        }

        let old_value = if raw_stored < AUX_TOKEN {
            lower_bound
        } else {
            self.get(slot)
        };
        if new_value <= old_value {
            return;
        }

        self.estimator
            .update(self.lg_config_k, old_value, new_value);

        let shifted_new = new_value - self.cur_min;

        // Four cases based on old/new exception status
        match (raw_stored, shifted_new) {
            // Both old and new are exceptions
            (AUX_TOKEN, shifted) if shifted >= AUX_TOKEN => {
                self.aux_replace(slot, new_value);
            }
            // Old is an exception, new is not: the new value would be smaller
            (AUX_TOKEN, _) => {
                unreachable!("AUX_TOKEN present with non-exception new value");
            }
            // Old not exception, new is exception
            (_, shifted) if shifted >= AUX_TOKEN => {
                self.put_raw(slot, AUX_TOKEN);
                self.aux_add(slot, new_value);
            }
            // Neither is exception
            _ => {
                self.put_raw(slot, shifted_new);
            }
        }

        if old_value == self.cur_min {
            self.num_at_cur_min -= 1;
            while self.num_at_cur_min == 0 {
                self.shift_to_bigger_cur_min();
            }
        }
    }

    /// Increment cur_min and adjust all values
    ///
    /// All stored nibbles are decremented by 1, and exceptions that fall back into
    /// the nibble range move out of the exception table. The table keeps its size.
    fn shift_to_bigger_cur_min(&mut self) {
        let new_cur_min = self.cur_min + 1;
        let k = 1u32 << self.lg_config_k;
        let mut num_at_new = 0;

        for slot in 0..k {
            let raw = self.get_raw(slot);
            debug_assert_ne!(raw, 0, "value cannot be 0 when shifting cur_min");
            if raw < AUX_TOKEN {
                let decremented = raw - 1;
                self.put_raw(slot, decremented);
                if decremented == 0 {
                    num_at_new += 1;
                }
            }
        }

        if self.aux_count > 0 {
            let exceptions = self.aux().iter().collect::<Vec<_>>();
            let start = aux_start(self.lg_config_k);
            let end = start + aux_table_bytes(self.lg_aux_arr_ints);
            self.storage.as_mut()[start..end].fill(0);
            self.aux_count = 0;

            for (slot, value) in exceptions {
                debug_assert_eq!(self.get_raw(slot), AUX_TOKEN);
                let new_shifted = value - new_cur_min;
                if new_shifted < AUX_TOKEN {
                    self.put_raw(slot, new_shifted);
                } else {
                    self.aux_add(slot, value);
                }
            }
        }

        tracing::trace!(
            cur_min = new_cur_min,
            num_at_cur_min = num_at_new,
            aux_count = self.aux_count,
            "shifted HLL4 floor"
        );
        self.cur_min = new_cur_min;
        self.num_at_cur_min = num_at_new;
    }

    pub fn estimator_mut(&mut self) -> &mut HipEstimator {
        &mut self.estimator
    }

    /// Writes the derived header fields back into the image.
    pub fn sync_header(&mut self) {
        write_hll_fields(
            self.storage.as_mut(),
            &self.estimator,
            self.num_at_cur_min,
            self.aux_count,
        );
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}

/// Byte offset of the exception table
fn aux_start(lg_config_k: u8) -> usize {
    HLL_BYTE_ARR_START + hll_array_bytes(lg_config_k, HllType::Hll4)
}

impl<S: AsRef<[u8]>> Array4<S> {
    #[inline]
    fn get_raw(&self, slot: u32) -> u8 {
        get_nibble(&self.storage.as_ref()[HLL_BYTE_ARR_START..], slot)
    }

    fn aux(&self) -> AuxMap<&[u8]> {
        let start = aux_start(self.lg_config_k);
        AuxMap::new(
            &self.storage.as_ref()[start..],
            self.lg_aux_arr_ints,
            self.aux_count,
        )
    }

    fn value_at(&self, slot: u32) -> Result<u8, Error> {
        let raw = self.get_raw(slot);
        if raw < AUX_TOKEN {
            Ok(raw + self.cur_min)
        } else {
            self.aux().must_find_value_for(slot)
        }
    }

    /// Get actual value for slot (adjusted for cur_min and the exception table)
    pub fn get(&self, slot: u32) -> u8 {
        match self.value_at(slot) {
            Ok(value) => value,
            Err(err) => panic!("HLL4 exception table out of sync: {err}"),
        }
    }

    /// Bucket values in slot order
    pub fn values(&self) -> impl Iterator<Item = u8> + '_ {
        (0..1u32 << self.lg_config_k).map(|slot| self.get(slot))
    }

    /// Exceptions as coupons, sorted by slot
    pub fn aux_coupons(&self) -> Vec<u32> {
        let mut coupons = self
            .aux()
            .iter()
            .map(|(slot, value)| pack_coupon(slot, value))
            .collect::<Vec<_>>();
        coupons.sort_unstable_by_key(|&coupon| get_slot(coupon));
        coupons
    }

    /// Get the current cardinality estimate using HIP estimator
    pub fn estimate(&self) -> f64 {
        self.estimator
            .estimate(self.lg_config_k, self.cur_min, self.num_at_cur_min)
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator.upper_bound(
            self.lg_config_k,
            self.cur_min,
            self.num_at_cur_min,
            num_std_dev,
        )
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator.lower_bound(
            self.lg_config_k,
            self.cur_min,
            self.num_at_cur_min,
            num_std_dev,
        )
    }

    pub fn cur_min(&self) -> u8 {
        self.cur_min
    }

    pub fn num_at_cur_min(&self) -> u32 {
        self.num_at_cur_min
    }

    pub fn lg_aux_arr_ints(&self) -> u8 {
        self.lg_aux_arr_ints
    }

    pub fn aux_count(&self) -> u32 {
        self.aux_count
    }

    pub fn estimator(&self) -> &HipEstimator {
        &self.estimator
    }

    /// Writes the derived header fields into `bytes`, an image of this array.
    pub fn write_fields(&self, bytes: &mut [u8]) {
        write_hll_fields(bytes, &self.estimator, self.num_at_cur_min, self.aux_count);
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Copies the nibbles and the exception table into `storage` and carries the
    /// derived state over.
    pub fn transplant<T: Storage>(&self, mut storage: T) -> Array4<T> {
        let end = aux_start(self.lg_config_k) + aux_table_bytes(self.lg_aux_arr_ints);
        storage.reserve_len(end);
        storage.as_mut()[HLL_BYTE_ARR_START..end]
            .copy_from_slice(&self.storage.as_ref()[HLL_BYTE_ARR_START..end]);
        Array4 {
            lg_config_k: self.lg_config_k,
            storage,
            cur_min: self.cur_min,
            num_at_cur_min: self.num_at_cur_min,
            lg_aux_arr_ints: self.lg_aux_arr_ints,
            aux_count: self.aux_count,
            estimator: self.estimator.clone(),
        }
    }
}
