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

//! Preamble layout shared by every HLL image.
//!
//! The first eight bytes are common to all modes; the rest of the header depends on the
//! current mode.

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::codec::Family;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::HllType;
use crate::hll::LG_AUX_ARR_INTS;
use crate::hll::check_lg_k;
use crate::hll::estimator::HipEstimator;

pub(super) const PREAMBLE_INTS_BYTE: usize = 0;
pub(super) const SER_VER_BYTE: usize = 1;
pub(super) const FAMILY_BYTE: usize = 2;
pub(super) const LG_K_BYTE: usize = 3;
pub(super) const LG_ARR_BYTE: usize = 4;
pub(super) const FLAGS_BYTE: usize = 5;
pub(super) const LIST_COUNT_BYTE: usize = 6;
pub(super) const HLL_CUR_MIN_BYTE: usize = 6;
pub(super) const MODE_BYTE: usize = 7;

pub(super) const LIST_INT_ARR_START: usize = 8;
pub(super) const HASH_SET_COUNT_INT: usize = 8;
pub(super) const HASH_SET_INT_ARR_START: usize = 12;

pub(super) const HIP_ACCUM_DOUBLE: usize = 8;
pub(super) const KXQ0_DOUBLE: usize = 16;
pub(super) const KXQ1_DOUBLE: usize = 24;
pub(super) const CUR_MIN_COUNT_INT: usize = 32;
pub(super) const AUX_COUNT_INT: usize = 36;
pub(super) const HLL_BYTE_ARR_START: usize = 40;

pub(super) const EMPTY_FLAG_MASK: u8 = 4;
pub(super) const COMPACT_FLAG_MASK: u8 = 8;
pub(super) const OUT_OF_ORDER_FLAG_MASK: u8 = 16;

pub(super) const SER_VER: u8 = 1;
pub(super) const LIST_PREINTS: u8 = 2;
pub(super) const HASH_SET_PREINTS: u8 = 3;
pub(super) const HLL_PREINTS: u8 = 10;

pub(super) const LG_INIT_LIST_SIZE: u8 = 3;
pub(super) const LG_INIT_SET_SIZE: u8 = 5;

/// The common eight-byte header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Preamble {
    pub lg_config_k: u8,
    /// LIST/SET: log2 of the coupon slots. HLL4: log2 of the exception table.
    pub lg_arr: u8,
    pub empty: bool,
    pub compact: bool,
    pub out_of_order: bool,
    /// LIST: coupon count. HLL: current floor. SET: unused.
    pub count_or_cur_min: u8,
    pub cur_mode: CurMode,
    pub hll_type: HllType,
}

impl Preamble {
    pub fn read(bytes: &[u8]) -> Result<Self, Error> {
        fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
            move |_| Error::insufficient_data(tag)
        }

        let mut cursor = SketchSlice::new(bytes);
        let preamble_ints = cursor.read_u8().map_err(make_error("preamble_ints"))?;
        let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
        let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
        let lg_config_k = cursor.read_u8().map_err(make_error("lg_config_k"))?;
        let lg_arr = cursor.read_u8().map_err(make_error("lg_arr"))?;
        let flags = cursor.read_u8().map_err(make_error("flags"))?;
        let count_or_cur_min = cursor.read_u8().map_err(make_error("count_or_cur_min"))?;
        let mode_byte = cursor.read_u8().map_err(make_error("mode"))?;

        Family::HLL.validate_id(family_id)?;
        if serial_version != SER_VER {
            return Err(Error::unsupported_serial_version(SER_VER, serial_version));
        }
        check_lg_k(lg_config_k).map_err(|err| Error::deserial(err.message()))?;

        let cur_mode = CurMode::from_bits(mode_byte & 3)?;
        let hll_type = HllType::from_bits((mode_byte >> 2) & 3)?;

        let expected_ints = preamble_ints_for(cur_mode);
        if preamble_ints != expected_ints {
            return Err(Error::deserial(format!(
                "invalid preamble ints for {cur_mode:?} mode: expected {expected_ints}, got {preamble_ints}"
            )));
        }

        Ok(Preamble {
            lg_config_k,
            lg_arr,
            empty: flags & EMPTY_FLAG_MASK != 0,
            compact: flags & COMPACT_FLAG_MASK != 0,
            out_of_order: flags & OUT_OF_ORDER_FLAG_MASK != 0,
            count_or_cur_min,
            cur_mode,
            hll_type,
        })
    }

    pub fn write(&self, bytes: &mut [u8]) {
        bytes[PREAMBLE_INTS_BYTE] = preamble_ints_for(self.cur_mode);
        bytes[SER_VER_BYTE] = SER_VER;
        bytes[FAMILY_BYTE] = Family::HLL.id;
        bytes[LG_K_BYTE] = self.lg_config_k;
        bytes[LG_ARR_BYTE] = self.lg_arr;
        bytes[FLAGS_BYTE] = self.flags();
        bytes[LIST_COUNT_BYTE] = self.count_or_cur_min;
        bytes[MODE_BYTE] = encode_mode_byte(self.cur_mode, self.hll_type);
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.empty {
            flags |= EMPTY_FLAG_MASK;
        }
        if self.compact {
            flags |= COMPACT_FLAG_MASK;
        }
        if self.out_of_order {
            flags |= OUT_OF_ORDER_FLAG_MASK;
        }
        flags
    }
}

pub(super) fn preamble_ints_for(cur_mode: CurMode) -> u8 {
    match cur_mode {
        CurMode::List => LIST_PREINTS,
        CurMode::Set => HASH_SET_PREINTS,
        CurMode::Hll => HLL_PREINTS,
    }
}

pub(super) fn encode_mode_byte(cur_mode: CurMode, hll_type: HllType) -> u8 {
    (cur_mode as u8) | ((hll_type as u8) << 2)
}

/// Bytes of the bucket array alone
pub(super) fn hll_array_bytes(lg_config_k: u8, hll_type: HllType) -> usize {
    let k = 1usize << lg_config_k;
    match hll_type {
        HllType::Hll4 => k / 2,
        HllType::Hll6 => ((k * 3) >> 2) + 1,
        HllType::Hll8 => k,
    }
}

/// Largest updatable image a sketch of this configuration needs before any HLL4
/// exception table growth.
pub(super) fn max_updatable_bytes(lg_config_k: u8, hll_type: HllType) -> usize {
    let list = LIST_INT_ARR_START + (4 << LG_INIT_LIST_SIZE);
    let set = if lg_config_k >= 8 {
        HASH_SET_INT_ARR_START + (4 << (lg_config_k - 3))
    } else {
        0
    };
    let aux = match hll_type {
        HllType::Hll4 => 4 << LG_AUX_ARR_INTS[lg_config_k as usize],
        HllType::Hll6 | HllType::Hll8 => 0,
    };
    let hll = HLL_BYTE_ARR_START + hll_array_bytes(lg_config_k, hll_type) + aux;
    list.max(set).max(hll)
}

/// Writes the HLL header fields that follow the common preamble.
pub(super) fn write_hll_fields(
    bytes: &mut [u8],
    estimator: &HipEstimator,
    num_at_cur_min: u32,
    aux_count: u32,
) {
    LittleEndian::write_f64(&mut bytes[HIP_ACCUM_DOUBLE..], estimator.hip_accum());
    LittleEndian::write_f64(&mut bytes[KXQ0_DOUBLE..], estimator.kxq0());
    LittleEndian::write_f64(&mut bytes[KXQ1_DOUBLE..], estimator.kxq1());
    LittleEndian::write_u32(&mut bytes[CUR_MIN_COUNT_INT..], num_at_cur_min);
    LittleEndian::write_u32(&mut bytes[AUX_COUNT_INT..], aux_count);
}
