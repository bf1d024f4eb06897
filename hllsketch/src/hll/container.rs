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

//! Base container for coupon storage with cardinality estimation
//!
//! Coupons live as little-endian `u32` slots inside the sketch image, starting at a
//! mode-specific offset. Empty slots hold [`COUPON_EMPTY`].

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::hll::COUPON_EMPTY;
use crate::hll::COUPON_RSE;
use crate::hll::Storage;
use crate::hll::coupon_mapping::X_ARR;
use crate::hll::coupon_mapping::Y_ARR;
use crate::hll::cubic_interpolation::using_x_and_y_tables;

/// Coupon slots laid out inside a sketch image
#[derive(Debug)]
pub(super) struct Container<S> {
    storage: S,
    /// Byte offset of the first slot
    start: usize,
    /// Log2 of the number of slots
    lg_size: u8,
    /// Number of non-empty slots
    len: usize,
}

impl<S: Storage> Container<S> {
    /// Claims `1 << lg_size` empty slots at `start`.
    pub fn new(mut storage: S, start: usize, lg_size: u8) -> Self {
        let end = start + (4 << lg_size);
        storage.reserve_len(end);
        storage.as_mut()[start..end].fill(0);
        Self {
            storage,
            start,
            lg_size,
            len: 0,
        }
    }

    /// Adopts slots already populated in `storage`.
    pub fn from_storage(storage: S, start: usize, lg_size: u8, len: usize) -> Self {
        debug_assert!(storage.as_ref().len() >= start + (4 << lg_size));
        Self {
            storage,
            start,
            lg_size,
            len,
        }
    }

    pub fn set(&mut self, index: usize, coupon: u32) {
        let offset = self.start + index * 4;
        LittleEndian::write_u32(&mut self.storage.as_mut()[offset..offset + 4], coupon);
    }

    pub fn inc_len(&mut self) {
        self.len += 1;
    }

    /// Empties every slot, optionally resizing the slot array first.
    pub fn clear(&mut self, lg_size: u8) {
        let end = self.start + (4 << lg_size);
        self.storage.reserve_len(end);
        self.storage.as_mut()[self.start..end].fill(0);
        self.lg_size = lg_size;
        self.len = 0;
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}

impl<S: AsRef<[u8]>> Container<S> {
    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        let offset = self.start + index * 4;
        LittleEndian::read_u32(&self.storage.as_ref()[offset..offset + 4])
    }

    pub fn lg_size(&self) -> u8 {
        self.lg_size
    }

    pub fn capacity(&self) -> usize {
        1 << self.lg_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Non-empty coupons in slot order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.capacity())
            .map(|index| self.get(index))
            .filter(|&coupon| coupon != COUPON_EMPTY)
    }

    /// Get cardinality estimate using cubic interpolation
    pub fn estimate(&self) -> f64 {
        coupon_estimate(self.len)
    }

    pub fn upper_bound(&self, n_std_dev: f64) -> f64 {
        coupon_upper_bound(self.len, n_std_dev)
    }

    pub fn lower_bound(&self, n_std_dev: f64) -> f64 {
        coupon_lower_bound(self.len, n_std_dev)
    }

    /// Copies the slots into `storage`, at the same offset.
    pub fn transplant<T: Storage>(&self, mut storage: T) -> Container<T> {
        let end = self.start + (4 << self.lg_size);
        storage.reserve_len(end);
        storage.as_mut()[self.start..end].copy_from_slice(&self.storage.as_ref()[self.start..end]);
        Container {
            storage,
            start: self.start,
            lg_size: self.lg_size,
            len: self.len,
        }
    }
}

/// Cardinality estimate for `len` distinct coupons
pub(super) fn coupon_estimate(len: usize) -> f64 {
    let len = len as f64;
    let est = using_x_and_y_tables(&X_ARR, &Y_ARR, len);
    len.max(est)
}

/// Get upper confidence bound for cardinality estimate
pub(super) fn coupon_upper_bound(len: usize, n_std_dev: f64) -> f64 {
    let est = using_x_and_y_tables(&X_ARR, &Y_ARR, len as f64);
    let bound = est / (1.0 - n_std_dev * COUPON_RSE);
    (len as f64).max(bound)
}

/// Get lower confidence bound for cardinality estimate
pub(super) fn coupon_lower_bound(len: usize, n_std_dev: f64) -> f64 {
    let est = using_x_and_y_tables(&X_ARR, &Y_ARR, len as f64);
    let bound = est / (1.0 + n_std_dev * COUPON_RSE);
    (len as f64).max(bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_sit_after_offset() {
        let mut container = Container::new(vec![0xAAu8; 8], 8, 2);
        assert_eq!(container.storage().len(), 8 + 16);
        assert_eq!(&container.storage()[..8], &[0xAA; 8]);

        container.set(1, 0x0102_0304);
        container.inc_len();
        assert_eq!(&container.storage()[12..16], &[4, 3, 2, 1]);
        assert_eq!(container.iter().collect::<Vec<_>>(), vec![0x0102_0304]);
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_estimate_bounds_order() {
        let mut container = Container::new(Vec::new(), 8, 3);
        for i in 0..5 {
            container.set(i, (i as u32 + 1) | (1 << 26));
            container.inc_len();
        }
        let est = container.estimate();
        assert!(est >= 5.0);
        assert!(container.lower_bound(2.0) <= est);
        assert!(container.upper_bound(2.0) >= est);
        assert!(container.lower_bound(3.0) >= 5.0);
    }

    #[test]
    fn test_transplant_copies_slots() {
        let mut container = Container::new(Vec::new(), 12, 5);
        container.set(7, 99);
        container.inc_len();

        let copy = container.transplant(vec![0xEEu8; 12 + 4 * 32 + 4]);
        assert_eq!(copy.get(7), 99);
        assert_eq!(copy.len(), 1);
        assert_eq!(copy.iter().collect::<Vec<_>>(), vec![99]);
        // bytes outside the slots are left alone
        assert_eq!(copy.storage()[0], 0xEE);
        assert_eq!(copy.storage()[12 + 4 * 32], 0xEE);
    }

    #[test]
    fn test_clear_resizes() {
        let mut container = Container::new(Vec::new(), 12, 2);
        container.set(0, 42);
        container.inc_len();
        container.clear(3);
        assert_eq!(container.capacity(), 8);
        assert!(container.is_empty());
        assert_eq!(container.storage().len(), 12 + 32);
        assert_eq!(container.iter().count(), 0);
    }
}
