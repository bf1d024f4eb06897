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

//! Exception table for HLL4 buckets whose value no longer fits in a nibble.
//!
//! The table is open addressed over `1 << lg_aux_arr_ints` little-endian coupon slots,
//! keyed by bucket index. It operates on bytes owned by the enclosing image, so growing
//! requires the caller to have made room for the doubled table first.

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::error::Error;
use crate::hll::COUPON_EMPTY;
use crate::hll::RESIZE_DENOM;
use crate::hll::RESIZE_NUMER;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::pack_coupon;

/// Where a key lives, or where it would be inserted
enum Probe {
    Found(usize),
    Vacant(usize),
}

#[derive(Debug)]
pub(super) struct AuxMap<T> {
    table: T,
    lg_aux_arr_ints: u8,
    count: u32,
}

/// Bytes held by a table of `1 << lg_aux_arr_ints` entries
pub(super) fn aux_table_bytes(lg_aux_arr_ints: u8) -> usize {
    4 << lg_aux_arr_ints
}

impl<T: AsRef<[u8]>> AuxMap<T> {
    pub fn new(table: T, lg_aux_arr_ints: u8, count: u32) -> Self {
        debug_assert!(table.as_ref().len() >= aux_table_bytes(lg_aux_arr_ints));
        Self {
            table,
            lg_aux_arr_ints,
            count,
        }
    }

    pub fn lg_aux_arr_ints(&self) -> u8 {
        self.lg_aux_arr_ints
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether one more entry would double the table.
    pub fn grows_on_next_add(&self) -> bool {
        RESIZE_DENOM * (self.count + 1) > RESIZE_NUMER * (1 << self.lg_aux_arr_ints)
    }

    #[inline]
    fn entry(&self, index: usize) -> u32 {
        let offset = index * 4;
        LittleEndian::read_u32(&self.table.as_ref()[offset..offset + 4])
    }

    fn find(&self, slot: u32) -> Result<Probe, Error> {
        let mask = (1u32 << self.lg_aux_arr_ints) - 1;
        let stride = (slot >> self.lg_aux_arr_ints) | 1;
        let mut probe = slot & mask;
        let start = probe;
        loop {
            let entry = self.entry(probe as usize);
            if entry == COUPON_EMPTY {
                return Ok(Probe::Vacant(probe as usize));
            }
            if get_slot(entry) == slot {
                return Ok(Probe::Found(probe as usize));
            }
            probe = (probe + stride) & mask;
            if probe == start {
                return Err(Error::invalid_state(format!(
                    "aux table full and slot {slot} not found"
                )));
            }
        }
    }

    /// Value stored for `slot`, if it is an exception.
    pub fn get(&self, slot: u32) -> Option<u8> {
        match self.find(slot) {
            Ok(Probe::Found(index)) => Some(get_value(self.entry(index))),
            _ => None,
        }
    }

    /// Value stored for `slot`, which must be present.
    pub fn must_find_value_for(&self, slot: u32) -> Result<u8, Error> {
        match self.find(slot)? {
            Probe::Found(index) => Ok(get_value(self.entry(index))),
            Probe::Vacant(_) => Err(Error::invalid_state(format!(
                "slot {slot} not found in aux table"
            ))),
        }
    }

    /// Stored `(slot, value)` pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        (0..1usize << self.lg_aux_arr_ints)
            .map(|index| self.entry(index))
            .filter(|&entry| entry != COUPON_EMPTY)
            .map(|entry| (get_slot(entry), get_value(entry)))
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> AuxMap<T> {
    fn set_entry(&mut self, index: usize, coupon: u32) {
        let offset = index * 4;
        LittleEndian::write_u32(&mut self.table.as_mut()[offset..offset + 4], coupon);
    }

    /// Adds an exception for `slot`, which must not be present yet.
    ///
    /// Doubles the table first when the new entry would leave it more than three quarters full.
    pub fn must_add(&mut self, slot: u32, value: u8) -> Result<(), Error> {
        match self.find(slot)? {
            Probe::Found(_) => Err(Error::invalid_state(format!(
                "slot {slot} already present in aux table"
            ))),
            Probe::Vacant(mut index) => {
                if self.grows_on_next_add() {
                    self.grow()?;
                    index = match self.find(slot)? {
                        Probe::Vacant(index) => index,
                        Probe::Found(_) => unreachable!("slot {slot} appeared while growing"),
                    };
                }
                self.set_entry(index, pack_coupon(slot, value));
                self.count += 1;
                Ok(())
            }
        }
    }

    /// Overwrites the exception for `slot`, which must be present.
    pub fn must_replace(&mut self, slot: u32, value: u8) -> Result<(), Error> {
        match self.find(slot)? {
            Probe::Found(index) => {
                self.set_entry(index, pack_coupon(slot, value));
                Ok(())
            }
            Probe::Vacant(_) => Err(Error::invalid_state(format!(
                "slot {slot} not found in aux table"
            ))),
        }
    }

    fn grow(&mut self) -> Result<(), Error> {
        let new_lg = self.lg_aux_arr_ints + 1;
        if self.table.as_ref().len() < aux_table_bytes(new_lg) {
            return Err(Error::invalid_state(format!(
                "no room to grow aux table to {} entries",
                1 << new_lg
            )));
        }

        let entries = self.iter().collect::<Vec<_>>();
        self.table.as_mut()[..aux_table_bytes(new_lg)].fill(0);
        self.lg_aux_arr_ints = new_lg;
        self.count = 0;
        for (slot, value) in entries {
            match self.find(slot)? {
                Probe::Vacant(index) => self.set_entry(index, pack_coupon(slot, value)),
                Probe::Found(_) => unreachable!("duplicate slot {slot} in aux table"),
            }
            self.count += 1;
        }
        tracing::debug!(lg_aux_arr_ints = new_lg, count = self.count, "grew aux table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_fail_fast_contract() {
        let mut table = vec![0u8; aux_table_bytes(2)];
        let mut aux = AuxMap::new(&mut table[..], 2, 0);

        aux.must_add(9, 17).unwrap();
        assert_eq!(aux.must_find_value_for(9).unwrap(), 17);
        assert_eq!(aux.get(10), None);

        let err = aux.must_add(9, 18).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(
            aux.must_replace(10, 18).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            aux.must_find_value_for(10).unwrap_err().kind(),
            ErrorKind::InvalidState
        );

        aux.must_replace(9, 20).unwrap();
        assert_eq!(aux.get(9), Some(20));
        assert_eq!(aux.count(), 1);
    }

    #[test]
    fn test_grows_into_reserved_room() {
        let mut table = vec![0u8; aux_table_bytes(3)];
        let mut aux = AuxMap::new(&mut table[..], 2, 0);
        for slot in 0..3 {
            assert!(!aux.grows_on_next_add());
            aux.must_add(slot * 4, 16).unwrap();
        }
        assert!(aux.grows_on_next_add());
        aux.must_add(12, 19).unwrap();
        assert_eq!(aux.lg_aux_arr_ints(), 3);
        assert_eq!(aux.count(), 4);

        let mut pairs = aux.iter().collect::<Vec<_>>();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(0, 16), (4, 16), (8, 16), (12, 19)]);
    }

    #[test]
    fn test_growth_without_room_is_reported() {
        let mut table = vec![0u8; aux_table_bytes(2)];
        let mut aux = AuxMap::new(&mut table[..], 2, 0);
        for slot in 0..3 {
            aux.must_add(slot, 16).unwrap();
        }
        let err = aux.must_add(3, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        // the failed add leaves the table as it was
        assert_eq!(aux.count(), 3);
        assert_eq!(aux.lg_aux_arr_ints(), 2);
        assert_eq!(aux.get(3), None);
        let mut pairs = aux.iter().collect::<Vec<_>>();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(0, 16), (1, 16), (2, 16)]);
    }

    #[test]
    fn test_read_only_lookup() {
        let mut table = vec![0u8; aux_table_bytes(2)];
        AuxMap::new(&mut table[..], 2, 0).must_add(5, 33).unwrap();

        let aux = AuxMap::new(&table[..], 2, 1);
        assert_eq!(aux.get(5), Some(33));
        assert_eq!(aux.iter().collect::<Vec<_>>(), vec![(5, 33)]);
    }
}
