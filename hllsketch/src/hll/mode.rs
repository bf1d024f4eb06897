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

//! The representation state machine shared by sketches and unions.
//!
//! A sketch starts in [`Mode::List`], moves to [`Mode::Set`] once the list fills up (for
//! `lg_config_k >= 8`), and ends in one of the dense arrays. Every variant operates on the
//! same updatable image, so a promotion hands the storage from one variant to the next.

use crate::codec::SketchBytes;
use crate::common::NumStdDev;
use crate::hll::CurMode;
use crate::hll::HllType;
use crate::hll::RESIZE_DENOM;
use crate::hll::RESIZE_NUMER;
use crate::hll::Storage;
use crate::hll::array4::Array4;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::aux_map::aux_table_bytes;
use crate::hll::estimator::HipEstimator;
use crate::hll::hash_set::HashSet;
use crate::hll::list::List;
use crate::hll::pack_coupon;
use crate::hll::preamble::HASH_SET_COUNT_INT;
use crate::hll::preamble::HASH_SET_INT_ARR_START;
use crate::hll::preamble::HLL_BYTE_ARR_START;
use crate::hll::preamble::LG_INIT_LIST_SIZE;
use crate::hll::preamble::LG_INIT_SET_SIZE;
use crate::hll::preamble::LIST_INT_ARR_START;
use crate::hll::preamble::Preamble;
use crate::hll::preamble::hll_array_bytes;

/// Current sketch mode, together with the target type coupon modes will promote to
#[derive(Debug)]
pub(super) enum Mode<S> {
    List { list: List<S>, hll_type: HllType },
    Set { set: HashSet<S>, hll_type: HllType },
    Array4(Array4<S>),
    Array6(Array6<S>),
    Array8(Array8<S>),
}

impl<S: Storage> Mode<S> {
    /// An empty sketch image in LIST mode
    pub fn new(storage: S, hll_type: HllType) -> Self {
        Mode::List {
            list: List::new(storage),
            hll_type,
        }
    }

    /// An HLL array of the given type holding exactly `values`
    pub fn from_values(
        storage: S,
        lg_config_k: u8,
        hll_type: HllType,
        values: &[u8],
        hip_accum: f64,
        out_of_order: bool,
    ) -> Self {
        match hll_type {
            HllType::Hll4 => Mode::Array4(Array4::from_values(
                storage,
                lg_config_k,
                values,
                hip_accum,
                out_of_order,
            )),
            HllType::Hll6 => Mode::Array6(Array6::from_values(
                storage,
                lg_config_k,
                values,
                hip_accum,
                out_of_order,
            )),
            HllType::Hll8 => Mode::Array8(Array8::from_values(
                storage,
                lg_config_k,
                values,
                hip_accum,
                out_of_order,
            )),
        }
    }

    /// A fresh HLL array with every bucket at zero
    fn new_array(storage: S, lg_config_k: u8, hll_type: HllType) -> Self {
        match hll_type {
            HllType::Hll4 => Mode::Array4(Array4::new(storage, lg_config_k)),
            HllType::Hll6 => Mode::Array6(Array6::new(storage, lg_config_k)),
            HllType::Hll8 => Mode::Array8(Array8::new(storage, lg_config_k)),
        }
    }

    pub fn update(&mut self, lg_config_k: u8, coupon: u32) {
        match self {
            Mode::List { list, hll_type } => {
                list.update(coupon);
                if list.container().is_full() {
                    let hll_type = *hll_type;
                    let list = match self.take(hll_type) {
                        Mode::List { list, .. } => list,
                        _ => unreachable!("mode changed during promotion"),
                    };
                    *self = if lg_config_k < 8 {
                        Self::promote_list_to_hll(list, lg_config_k, hll_type)
                    } else {
                        Self::promote_list_to_set(list, hll_type)
                    };
                }
            }
            Mode::Set { set, hll_type } => {
                set.update(coupon);
                let container = set.container();
                let len = container.len() as u32;
                let capacity = container.capacity() as u32;
                if RESIZE_DENOM * len > RESIZE_NUMER * capacity {
                    let lg_size = container.lg_size();
                    if lg_size + 3 >= lg_config_k {
                        let hll_type = *hll_type;
                        let set = match self.take(hll_type) {
                            Mode::Set { set, .. } => set,
                            _ => unreachable!("mode changed during promotion"),
                        };
                        *self = Self::promote_set_to_hll(set, lg_config_k, hll_type);
                    } else {
                        tracing::debug!(lg_size = lg_size + 1, "growing coupon hash set");
                        set.grow(lg_size + 1);
                    }
                }
            }
            Mode::Array4(arr) => arr.update(coupon),
            Mode::Array6(arr) => arr.update(coupon),
            Mode::Array8(arr) => arr.update(coupon),
        }
    }

    /// Moves the current variant out, leaving an empty list over default storage.
    fn take(&mut self, hll_type: HllType) -> Self {
        std::mem::replace(
            self,
            Mode::List {
                list: List::new(S::default()),
                hll_type,
            },
        )
    }

    fn promote_list_to_set(list: List<S>, hll_type: HllType) -> Self {
        let coupons = list.container().iter().collect::<Vec<_>>();
        tracing::debug!(coupons = coupons.len(), "promoting LIST to SET");

        let mut set = HashSet::new(list.into_storage(), LG_INIT_SET_SIZE);
        for coupon in coupons {
            set.update(coupon);
        }
        Mode::Set { set, hll_type }
    }

    fn promote_list_to_hll(list: List<S>, lg_config_k: u8, hll_type: HllType) -> Self {
        let coupons = list.container().iter().collect::<Vec<_>>();
        let estimate = list.container().estimate();
        tracing::debug!(coupons = coupons.len(), ?hll_type, "promoting LIST to HLL");
        Self::promote_coupons_to_hll(list.into_storage(), &coupons, estimate, lg_config_k, hll_type)
    }

    fn promote_set_to_hll(set: HashSet<S>, lg_config_k: u8, hll_type: HllType) -> Self {
        let coupons = set.container().iter().collect::<Vec<_>>();
        let estimate = set.container().estimate();
        tracing::debug!(coupons = coupons.len(), ?hll_type, "promoting SET to HLL");
        Self::promote_coupons_to_hll(set.into_storage(), &coupons, estimate, lg_config_k, hll_type)
    }

    /// Replays coupons into a fresh array and seeds the accumulator with the coupon
    /// estimate.
    fn promote_coupons_to_hll(
        storage: S,
        coupons: &[u32],
        estimate: f64,
        lg_config_k: u8,
        hll_type: HllType,
    ) -> Self {
        let mut mode = Self::new_array(storage, lg_config_k, hll_type);
        for &coupon in coupons {
            mode.update(lg_config_k, coupon);
        }
        if let Some(estimator) = mode.estimator_mut() {
            estimator.set_out_of_order(false);
            estimator.set_hip_accum(estimate);
        }
        mode
    }

    /// Back to an empty LIST over the same storage
    pub fn reset(&mut self) {
        let hll_type = self.hll_type();
        let storage = self.take(hll_type).into_storage();
        *self = Self::new(storage, hll_type);
    }

    /// Takes the storage out, leaving an empty list over default storage behind.
    pub fn take_storage(&mut self) -> S {
        let hll_type = self.hll_type();
        self.take(hll_type).into_storage()
    }

    pub fn estimator_mut(&mut self) -> Option<&mut HipEstimator> {
        match self {
            Mode::List { .. } | Mode::Set { .. } => None,
            Mode::Array4(arr) => Some(arr.estimator_mut()),
            Mode::Array6(arr) => Some(arr.estimator_mut()),
            Mode::Array8(arr) => Some(arr.estimator_mut()),
        }
    }

    /// Stamps the preamble and every derived header field into the image.
    pub fn sync(&mut self, lg_config_k: u8) {
        let preamble = self.preamble(lg_config_k, false);
        match self {
            Mode::List { list, .. } => preamble.write(list.storage_mut().as_mut()),
            Mode::Set { set, .. } => {
                let len = set.container().len() as u32;
                let bytes = set.storage_mut().as_mut();
                preamble.write(bytes);
                write_set_count(bytes, len);
            }
            Mode::Array4(arr) => {
                preamble.write(arr.storage_mut().as_mut());
                arr.sync_header();
            }
            Mode::Array6(arr) => {
                preamble.write(arr.storage_mut().as_mut());
                arr.sync_header();
            }
            Mode::Array8(arr) => {
                preamble.write(arr.storage_mut().as_mut());
                arr.sync_header();
            }
        }
    }

    pub fn storage_mut(&mut self) -> &mut S {
        match self {
            Mode::List { list, .. } => list.storage_mut(),
            Mode::Set { set, .. } => set.storage_mut(),
            Mode::Array4(arr) => arr.storage_mut(),
            Mode::Array6(arr) => arr.storage_mut(),
            Mode::Array8(arr) => arr.storage_mut(),
        }
    }

    pub fn into_storage(self) -> S {
        match self {
            Mode::List { list, .. } => list.into_storage(),
            Mode::Set { set, .. } => set.into_storage(),
            Mode::Array4(arr) => arr.into_storage(),
            Mode::Array6(arr) => arr.into_storage(),
            Mode::Array8(arr) => arr.into_storage(),
        }
    }
}

fn write_set_count(bytes: &mut [u8], len: u32) {
    bytes[HASH_SET_COUNT_INT..HASH_SET_COUNT_INT + 4].copy_from_slice(&len.to_le_bytes());
}

impl<S: AsRef<[u8]>> Mode<S> {
    pub fn cur_mode(&self) -> CurMode {
        match self {
            Mode::List { .. } => CurMode::List,
            Mode::Set { .. } => CurMode::Set,
            Mode::Array4(_) | Mode::Array6(_) | Mode::Array8(_) => CurMode::Hll,
        }
    }

    pub fn hll_type(&self) -> HllType {
        match self {
            Mode::List { hll_type, .. } | Mode::Set { hll_type, .. } => *hll_type,
            Mode::Array4(_) => HllType::Hll4,
            Mode::Array6(_) => HllType::Hll6,
            Mode::Array8(_) => HllType::Hll8,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Mode::List { list, .. } => list.container().is_empty(),
            Mode::Set { set, .. } => set.container().is_empty(),
            Mode::Array4(_) | Mode::Array6(_) | Mode::Array8(_) => false,
        }
    }

    pub fn estimator(&self) -> Option<&HipEstimator> {
        match self {
            Mode::List { .. } | Mode::Set { .. } => None,
            Mode::Array4(arr) => Some(arr.estimator()),
            Mode::Array6(arr) => Some(arr.estimator()),
            Mode::Array8(arr) => Some(arr.estimator()),
        }
    }

    pub fn is_out_of_order(&self) -> bool {
        self.estimator().is_some_and(HipEstimator::is_out_of_order)
    }

    pub fn estimate(&self) -> f64 {
        match self {
            Mode::List { list, .. } => list.container().estimate(),
            Mode::Set { set, .. } => set.container().estimate(),
            Mode::Array4(arr) => arr.estimate(),
            Mode::Array6(arr) => arr.estimate(),
            Mode::Array8(arr) => arr.estimate(),
        }
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        match self {
            Mode::List { list, .. } => list.container().upper_bound(num_std_dev.as_f64()),
            Mode::Set { set, .. } => set.container().upper_bound(num_std_dev.as_f64()),
            Mode::Array4(arr) => arr.upper_bound(num_std_dev),
            Mode::Array6(arr) => arr.upper_bound(num_std_dev),
            Mode::Array8(arr) => arr.upper_bound(num_std_dev),
        }
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        match self {
            Mode::List { list, .. } => list.container().lower_bound(num_std_dev.as_f64()),
            Mode::Set { set, .. } => set.container().lower_bound(num_std_dev.as_f64()),
            Mode::Array4(arr) => arr.lower_bound(num_std_dev),
            Mode::Array6(arr) => arr.lower_bound(num_std_dev),
            Mode::Array8(arr) => arr.lower_bound(num_std_dev),
        }
    }

    /// Stored coupons in LIST and SET mode; one coupon per non-zero bucket in HLL mode.
    pub fn coupons(&self) -> Vec<u32> {
        match self {
            Mode::List { list, .. } => list.container().iter().collect(),
            Mode::Set { set, .. } => set.container().iter().collect(),
            Mode::Array4(_) | Mode::Array6(_) | Mode::Array8(_) => self
                .hll_values()
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .filter(|&(_, value)| value != 0)
                .map(|(slot, value)| pack_coupon(slot as u32, value))
                .collect(),
        }
    }

    /// Bucket values in slot order, in HLL mode only
    pub fn hll_values(&self) -> Option<Vec<u8>> {
        match self {
            Mode::List { .. } | Mode::Set { .. } => None,
            Mode::Array4(arr) => Some(arr.values().collect()),
            Mode::Array6(arr) => Some(arr.values().collect()),
            Mode::Array8(arr) => Some(arr.values().collect()),
        }
    }

    pub fn storage(&self) -> &S {
        match self {
            Mode::List { list, .. } => list.container().storage(),
            Mode::Set { set, .. } => set.container().storage(),
            Mode::Array4(arr) => arr.storage(),
            Mode::Array6(arr) => arr.storage(),
            Mode::Array8(arr) => arr.storage(),
        }
    }

    pub fn preamble(&self, lg_config_k: u8, compact: bool) -> Preamble {
        let (lg_arr, count_or_cur_min) = match self {
            Mode::List { list, .. } => (LG_INIT_LIST_SIZE, list.container().len() as u8),
            Mode::Set { set, .. } => (set.container().lg_size(), 0),
            Mode::Array4(arr) => (arr.lg_aux_arr_ints(), arr.cur_min()),
            Mode::Array6(_) | Mode::Array8(_) => (0, 0),
        };
        Preamble {
            lg_config_k,
            lg_arr,
            empty: self.is_empty(),
            compact,
            out_of_order: self.is_out_of_order(),
            count_or_cur_min,
            cur_mode: self.cur_mode(),
            hll_type: self.hll_type(),
        }
    }

    pub fn updatable_bytes(&self, lg_config_k: u8) -> usize {
        match self {
            Mode::List { .. } => LIST_INT_ARR_START + (4 << LG_INIT_LIST_SIZE),
            Mode::Set { set, .. } => HASH_SET_INT_ARR_START + (4 << set.container().lg_size()),
            Mode::Array4(arr) => {
                HLL_BYTE_ARR_START
                    + hll_array_bytes(lg_config_k, HllType::Hll4)
                    + aux_table_bytes(arr.lg_aux_arr_ints())
            }
            Mode::Array6(_) | Mode::Array8(_) => {
                HLL_BYTE_ARR_START + hll_array_bytes(lg_config_k, self.hll_type())
            }
        }
    }

    pub fn compact_bytes(&self, lg_config_k: u8) -> usize {
        match self {
            Mode::List { list, .. } => LIST_INT_ARR_START + 4 * list.container().len(),
            Mode::Set { set, .. } => HASH_SET_INT_ARR_START + 4 * set.container().len(),
            Mode::Array4(arr) => {
                HLL_BYTE_ARR_START
                    + hll_array_bytes(lg_config_k, HllType::Hll4)
                    + 4 * arr.aux_count() as usize
            }
            Mode::Array6(_) | Mode::Array8(_) => self.updatable_bytes(lg_config_k),
        }
    }

    /// A copy of the updatable image with every header field stamped in
    pub fn write_updatable(&self, lg_config_k: u8) -> Vec<u8> {
        let len = self.updatable_bytes(lg_config_k);
        let mut bytes = self.storage().as_ref()[..len].to_vec();
        self.preamble(lg_config_k, false).write(&mut bytes);
        match self {
            Mode::List { .. } => {}
            Mode::Set { set, .. } => write_set_count(&mut bytes, set.container().len() as u32),
            Mode::Array4(arr) => arr.write_fields(&mut bytes),
            Mode::Array6(arr) => arr.write_fields(&mut bytes),
            Mode::Array8(arr) => arr.write_fields(&mut bytes),
        }
        bytes
    }

    /// The compact image: coupons without empty slots, exceptions as a sorted list
    pub fn write_compact(&self, lg_config_k: u8) -> Vec<u8> {
        let len = self.compact_bytes(lg_config_k);
        let mut bytes = SketchBytes::with_capacity(len);
        let preamble = self.preamble(lg_config_k, true);

        match self {
            Mode::List { list, .. } => {
                let mut header = [0u8; LIST_INT_ARR_START];
                preamble.write(&mut header);
                bytes.write(&header);
                for coupon in list.container().iter() {
                    bytes.write_u32_le(coupon);
                }
            }
            Mode::Set { set, .. } => {
                let mut header = [0u8; HASH_SET_INT_ARR_START];
                preamble.write(&mut header);
                write_set_count(&mut header, set.container().len() as u32);
                bytes.write(&header);
                for coupon in set.container().iter() {
                    bytes.write_u32_le(coupon);
                }
            }
            Mode::Array4(arr) => {
                let end = HLL_BYTE_ARR_START + hll_array_bytes(lg_config_k, HllType::Hll4);
                let mut header = [0u8; HLL_BYTE_ARR_START];
                preamble.write(&mut header);
                arr.write_fields(&mut header);
                bytes.write(&header);
                bytes.write(&arr.storage().as_ref()[HLL_BYTE_ARR_START..end]);
                for coupon in arr.aux_coupons() {
                    bytes.write_u32_le(coupon);
                }
            }
            Mode::Array6(arr) => {
                let mut header = [0u8; HLL_BYTE_ARR_START];
                preamble.write(&mut header);
                arr.write_fields(&mut header);
                bytes.write(&header);
                bytes.write(&arr.storage().as_ref()[HLL_BYTE_ARR_START..len]);
            }
            Mode::Array8(arr) => {
                let mut header = [0u8; HLL_BYTE_ARR_START];
                preamble.write(&mut header);
                arr.write_fields(&mut header);
                bytes.write(&header);
                bytes.write(&arr.storage().as_ref()[HLL_BYTE_ARR_START..len]);
            }
        }

        debug_assert_eq!(bytes.len(), len);
        bytes.into_bytes()
    }

    /// The same content over different storage, as another target type
    pub fn copy_as<T: Storage>(&self, storage: T, lg_config_k: u8, hll_type: HllType) -> Mode<T> {
        let (values, estimator) = match self {
            Mode::List { list, .. } => {
                return Mode::List {
                    list: list.transplant(storage),
                    hll_type,
                };
            }
            Mode::Set { set, .. } => {
                return Mode::Set {
                    set: set.transplant(storage),
                    hll_type,
                };
            }
            _ if self.hll_type() == hll_type => return self.transplant(storage),
            Mode::Array4(arr) => (arr.values().collect::<Vec<_>>(), arr.estimator()),
            Mode::Array6(arr) => (arr.values().collect(), arr.estimator()),
            Mode::Array8(arr) => (arr.values().collect(), arr.estimator()),
        };
        Mode::from_values(
            storage,
            lg_config_k,
            hll_type,
            &values,
            estimator.hip_accum(),
            estimator.is_out_of_order(),
        )
    }

    /// The same state over different storage
    pub fn transplant<T: Storage>(&self, storage: T) -> Mode<T> {
        match self {
            Mode::List { list, hll_type } => Mode::List {
                list: list.transplant(storage),
                hll_type: *hll_type,
            },
            Mode::Set { set, hll_type } => Mode::Set {
                set: set.transplant(storage),
                hll_type: *hll_type,
            },
            Mode::Array4(arr) => Mode::Array4(arr.transplant(storage)),
            Mode::Array6(arr) => Mode::Array6(arr.transplant(storage)),
            Mode::Array8(arr) => Mode::Array8(arr.transplant(storage)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::coupon;

    fn fill(mode: &mut Mode<Vec<u8>>, lg_config_k: u8, n: u32) {
        for i in 0..n {
            mode.update(lg_config_k, coupon(i));
        }
    }

    #[test]
    fn test_promotion_sequence_at_lg_k_8() {
        let mut mode = Mode::new(Vec::new(), HllType::Hll8);
        fill(&mut mode, 8, 7);
        assert_eq!(mode.cur_mode(), CurMode::List);
        assert_eq!(mode.compact_bytes(8), 36);

        fill(&mut mode, 8, 24);
        assert_eq!(mode.cur_mode(), CurMode::Set);
        assert_eq!(mode.compact_bytes(8), 108);

        fill(&mut mode, 8, 25);
        assert_eq!(mode.cur_mode(), CurMode::Hll);
        assert_eq!(mode.compact_bytes(8), 296);
    }

    #[test]
    fn test_small_lg_k_skips_set() {
        let mut mode = Mode::new(Vec::new(), HllType::Hll6);
        fill(&mut mode, 7, 8);
        assert_eq!(mode.cur_mode(), CurMode::Hll);
        assert_eq!(mode.hll_type(), HllType::Hll6);
        assert!(!mode.is_out_of_order());
    }

    #[test]
    fn test_promotion_seeds_accumulator() {
        let mut mode = Mode::new(Vec::new(), HllType::Hll4);
        fill(&mut mode, 8, 24);
        let coupon_estimate = mode.estimate();

        fill(&mut mode, 8, 25);
        let estimator = mode.estimator().expect("HLL mode has an estimator");
        assert!(estimator.hip_accum() > coupon_estimate);
        assert!(!estimator.is_out_of_order());
    }

    #[test]
    fn test_reset_keeps_type() {
        let mut mode = Mode::new(Vec::new(), HllType::Hll4);
        fill(&mut mode, 10, 1000);
        assert_eq!(mode.cur_mode(), CurMode::Hll);

        mode.reset();
        assert_eq!(mode.cur_mode(), CurMode::List);
        assert_eq!(mode.hll_type(), HllType::Hll4);
        assert!(mode.is_empty());
        assert_eq!(mode.estimate(), 0.0);
    }

    #[test]
    fn test_updatable_image_preamble() {
        let mut mode = Mode::new(Vec::new(), HllType::Hll8);
        fill(&mut mode, 10, 5000);
        let bytes = mode.write_updatable(10);
        assert_eq!(bytes.len(), 40 + 1024);

        let preamble = Preamble::read(&bytes).unwrap();
        assert_eq!(preamble.cur_mode, CurMode::Hll);
        assert_eq!(preamble.hll_type, HllType::Hll8);
        assert!(!preamble.compact);
        assert!(!preamble.empty);
    }

    #[test]
    fn test_transplant_keeps_estimate() {
        let mut mode = Mode::new(Vec::new(), HllType::Hll4);
        fill(&mut mode, 12, 20_000);
        let copy = mode.transplant(Vec::new());
        assert_eq!(copy.estimate(), mode.estimate());
        assert_eq!(copy.hll_values(), mode.hll_values());
    }

    #[test]
    fn test_copy_as_round_trip() {
        let mut mode = Mode::new(Vec::new(), HllType::Hll4);
        fill(&mut mode, 11, 10_000);
        let hll8: Mode<Vec<u8>> = mode.copy_as(Vec::new(), 11, HllType::Hll8);
        assert_eq!(hll8.hll_type(), HllType::Hll8);
        assert_eq!(hll8.hll_values(), mode.hll_values());

        let back: Mode<Vec<u8>> = hll8.copy_as(Vec::new(), 11, HllType::Hll4);
        assert_eq!(back.estimate(), mode.estimate());
        assert_eq!(back.write_compact(11), mode.write_compact(11));
    }

    #[test]
    fn test_coupons_of_hll_mode() {
        let mut mode = Mode::new(Vec::new(), HllType::Hll8);
        fill(&mut mode, 4, 100);
        let values = mode.hll_values().unwrap();
        let non_zero = values.iter().filter(|&&v| v != 0).count();
        assert_eq!(mode.coupons().len(), non_zero);
    }
}
