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

//! Hash set for storing unique coupons with linear probing
//!
//! Uses open addressing with a custom stride function to handle collisions.
//! Provides better performance than List when many coupons are stored.

use crate::hll::COUPON_EMPTY;
use crate::hll::KEY_MASK_26;
use crate::hll::Storage;
use crate::hll::container::Container;
use crate::hll::preamble::HASH_SET_INT_ARR_START;

/// Hash set for efficient coupon storage with collision handling
#[derive(Debug)]
pub(super) struct HashSet<S> {
    container: Container<S>,
}

impl<S: Storage> HashSet<S> {
    pub fn new(storage: S, lg_size: u8) -> Self {
        Self {
            container: Container::new(storage, HASH_SET_INT_ARR_START, lg_size),
        }
    }

    /// Adopt an updatable hash table image holding `len` coupons.
    pub fn from_storage(storage: S, lg_size: u8, len: usize) -> Self {
        Self {
            container: Container::from_storage(storage, HASH_SET_INT_ARR_START, lg_size, len),
        }
    }

    /// Insert coupon into hash set, ignoring duplicates
    pub fn update(&mut self, coupon: u32) {
        let index = self.find(coupon);
        if self.container.get(index) == COUPON_EMPTY {
            self.container.set(index, coupon);
            self.container.inc_len();
        }
    }

    /// Slot holding `coupon`, or the empty slot where it belongs
    fn find(&self, coupon: u32) -> usize {
        let lg_size = self.container.lg_size();
        let mask = (1 << lg_size) - 1;

        // Initial probe position from low bits of coupon
        let mut probe = coupon & mask;
        let starting_position = probe;

        loop {
            let value = self.container.get(probe as usize);
            if value == COUPON_EMPTY || value == coupon {
                return probe as usize;
            }

            // Stride is always odd to ensure all slots are visited
            let stride = ((coupon & KEY_MASK_26) >> lg_size) | 1;
            probe = (probe + stride) & mask;
            assert_ne!(probe, starting_position, "HashSet full; no empty slots");
        }
    }

    /// Internally grow the set by a power of two, reinserting all the
    /// existing values into the same image.
    pub fn grow(&mut self, lg_size: u8) {
        debug_assert!(lg_size > self.container.lg_size());

        let coupons = self.container.iter().collect::<Vec<_>>();
        self.container.clear(lg_size);
        for coupon in coupons {
            self.update(coupon);
        }
    }

    pub fn storage_mut(&mut self) -> &mut S {
        self.container.storage_mut()
    }

    pub fn into_storage(self) -> S {
        self.container.into_storage()
    }
}

impl<S> HashSet<S> {
    pub fn container(&self) -> &Container<S> {
        &self.container
    }
}

impl<S: AsRef<[u8]>> HashSet<S> {
    pub fn transplant<T: Storage>(&self, storage: T) -> HashSet<T> {
        HashSet {
            container: self.container.transplant(storage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::pack_coupon;

    #[test]
    fn test_colliding_coupons_are_kept_apart() {
        let mut set = HashSet::new(Vec::new(), 5);
        // same low bits, different values: they share the first probe
        set.update(pack_coupon(3, 1));
        set.update(pack_coupon(3, 2));
        set.update(pack_coupon(35, 1));
        set.update(pack_coupon(3, 2));
        assert_eq!(set.container().len(), 3);

        let mut coupons = set.container().iter().collect::<Vec<_>>();
        coupons.sort_unstable();
        let mut expected = vec![pack_coupon(3, 1), pack_coupon(3, 2), pack_coupon(35, 1)];
        expected.sort_unstable();
        assert_eq!(coupons, expected);
    }

    #[test]
    fn test_grow_keeps_contents() {
        let mut set = HashSet::new(Vec::new(), 5);
        for slot in 0..24 {
            set.update(pack_coupon(slot * 7, 2));
        }
        set.grow(6);
        assert_eq!(set.container().lg_size(), 6);
        assert_eq!(set.container().len(), 24);
        for slot in 0..24 {
            let coupon = pack_coupon(slot * 7, 2);
            assert_eq!(set.container().get(set.find(coupon)), coupon);
        }
        assert_eq!(
            set.container().storage().len(),
            HASH_SET_INT_ARR_START + (4 << 6)
        );
    }
}
