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

//! Reading sketch images.
//!
//! [`Image`] validates a byte slice once and decodes coupons or bucket values from it
//! without copying. Heap sketches replay or rebuild from an image; direct sketches
//! adopt an updatable image in place.

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::codec::SketchSlice;
use crate::error::Error;
use crate::hll::COUPON_EMPTY;
use crate::hll::CurMode;
use crate::hll::HllType;
use crate::hll::RESIZE_DENOM;
use crate::hll::RESIZE_NUMER;
use crate::hll::Storage;
use crate::hll::array4::AUX_TOKEN;
use crate::hll::array4::Array4;
use crate::hll::array4::get_nibble;
use crate::hll::array6;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::aux_map::AuxMap;
use crate::hll::aux_map::aux_table_bytes;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::hash_set::HashSet;
use crate::hll::list::List;
use crate::hll::mode::Mode;
use crate::hll::preamble::HASH_SET_INT_ARR_START;
use crate::hll::preamble::HLL_BYTE_ARR_START;
use crate::hll::preamble::LG_INIT_LIST_SIZE;
use crate::hll::preamble::LG_INIT_SET_SIZE;
use crate::hll::preamble::LIST_INT_ARR_START;
use crate::hll::preamble::Preamble;
use crate::hll::preamble::hll_array_bytes;
use crate::hll::preamble::max_updatable_bytes;

/// Largest bucket value a coupon can carry
const MAX_VALUE: u8 = 63;

/// HLL header fields that follow the common preamble
#[derive(Debug, Clone, Copy, PartialEq)]
struct HllHeader {
    hip_accum: f64,
    aux_count: u32,
}

/// A validated, borrowed sketch image
#[derive(Debug)]
pub(super) struct Image<'a> {
    preamble: Preamble,
    /// SET mode only
    set_count: u32,
    /// HLL mode only
    hll_header: Option<HllHeader>,
    bytes: &'a [u8],
}

fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |_| Error::insufficient_data(tag)
}

impl<'a> Image<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let preamble = Preamble::read(bytes)?;

        let mut cursor = SketchSlice::new(bytes);
        let mut skipped = [0u8; LIST_INT_ARR_START];
        cursor
            .read_exact(&mut skipped)
            .map_err(make_error("preamble"))?;

        let mut set_count = 0;
        let mut hll_header = None;
        match preamble.cur_mode {
            CurMode::List => {}
            CurMode::Set => {
                set_count = cursor.read_u32_le().map_err(make_error("set_count"))?;
            }
            CurMode::Hll => {
                let hip_accum = cursor.read_f64_le().map_err(make_error("hip_accum"))?;
                // kxq registers and the floor population are rebuilt from the buckets
                let mut derived = [0u8; 20];
                cursor
                    .read_exact(&mut derived)
                    .map_err(make_error("kxq"))?;
                let aux_count = cursor.read_u32_le().map_err(make_error("aux_count"))?;
                hll_header = Some(HllHeader {
                    hip_accum,
                    aux_count,
                });
            }
        }

        let image = Image {
            preamble,
            set_count,
            hll_header,
            bytes,
        };
        image.check_layout()?;
        Ok(image)
    }

    fn check_layout(&self) -> Result<(), Error> {
        let preamble = &self.preamble;
        let lg_config_k = preamble.lg_config_k;
        let compact = preamble.compact;

        let required = match preamble.cur_mode {
            CurMode::List => {
                if compact {
                    LIST_INT_ARR_START + 4 * preamble.count_or_cur_min as usize
                } else {
                    if preamble.lg_arr != LG_INIT_LIST_SIZE {
                        return Err(Error::deserial(format!(
                            "LIST image must have 2^{LG_INIT_LIST_SIZE} slots, got 2^{}",
                            preamble.lg_arr
                        )));
                    }
                    LIST_INT_ARR_START + (4 << LG_INIT_LIST_SIZE)
                }
            }
            CurMode::Set => {
                if compact {
                    HASH_SET_INT_ARR_START + 4 * self.set_count as usize
                } else {
                    if preamble.lg_arr < LG_INIT_SET_SIZE || preamble.lg_arr > lg_config_k {
                        return Err(Error::deserial(format!(
                            "SET image has invalid table size 2^{}",
                            preamble.lg_arr
                        )));
                    }
                    HASH_SET_INT_ARR_START + (4 << preamble.lg_arr)
                }
            }
            CurMode::Hll => {
                let base = HLL_BYTE_ARR_START + hll_array_bytes(lg_config_k, preamble.hll_type);
                match preamble.hll_type {
                    HllType::Hll4 => {
                        if preamble.count_or_cur_min > MAX_VALUE {
                            return Err(Error::deserial(format!(
                                "HLL4 floor {} out of range",
                                preamble.count_or_cur_min
                            )));
                        }
                        if compact {
                            base + 4 * self.hll_header().aux_count as usize
                        } else {
                            if preamble.lg_arr > lg_config_k {
                                return Err(Error::deserial(format!(
                                    "HLL4 image has invalid exception table size 2^{}",
                                    preamble.lg_arr
                                )));
                            }
                            base + aux_table_bytes(preamble.lg_arr)
                        }
                    }
                    HllType::Hll6 | HllType::Hll8 => base,
                }
            }
        };

        if self.bytes.len() < required {
            return Err(Error::deserial(format!(
                "{:?} image needs {required} bytes, got {}",
                preamble.cur_mode,
                self.bytes.len()
            )));
        }
        Ok(())
    }

    pub fn preamble(&self) -> &Preamble {
        &self.preamble
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn hll_header(&self) -> HllHeader {
        match self.hll_header {
            Some(header) => header,
            None => panic!("HLL header requested for {:?} image", self.preamble.cur_mode),
        }
    }

    pub fn hip_accum(&self) -> f64 {
        self.hll_header.map_or(0.0, |header| header.hip_accum)
    }

    fn coupon_at(&self, offset: usize) -> u32 {
        LittleEndian::read_u32(&self.bytes[offset..offset + 4])
    }

    /// Stored coupons of a LIST or SET image; empty for HLL images.
    pub fn coupons(&self) -> Vec<u32> {
        let preamble = &self.preamble;
        let (start, slots) = match (preamble.cur_mode, preamble.compact) {
            (CurMode::List, true) => (LIST_INT_ARR_START, preamble.count_or_cur_min as usize),
            (CurMode::List, false) => (LIST_INT_ARR_START, 1 << LG_INIT_LIST_SIZE),
            (CurMode::Set, true) => (HASH_SET_INT_ARR_START, self.set_count as usize),
            (CurMode::Set, false) => (HASH_SET_INT_ARR_START, 1 << preamble.lg_arr),
            (CurMode::Hll, _) => return vec![],
        };
        (0..slots)
            .map(|index| self.coupon_at(start + 4 * index))
            .filter(|&coupon| coupon != COUPON_EMPTY)
            .collect()
    }

    /// Bucket values of an HLL image in slot order.
    pub fn hll_values(&self) -> Result<Vec<u8>, Error> {
        let preamble = &self.preamble;
        let k = 1usize << preamble.lg_config_k;
        let buckets = &self.bytes[HLL_BYTE_ARR_START..];
        let values = match preamble.hll_type {
            HllType::Hll8 => buckets[..k].to_vec(),
            HllType::Hll6 => (0..k as u32)
                .map(|slot| array6::get_raw(buckets, slot))
                .collect(),
            HllType::Hll4 => self.hll4_values(buckets, k)?,
        };
        match values.iter().position(|&value| value > MAX_VALUE) {
            Some(slot) => Err(Error::deserial(format!(
                "bucket {slot} holds {} which exceeds {MAX_VALUE}",
                values[slot]
            ))),
            None => Ok(values),
        }
    }

    fn hll4_values(&self, buckets: &[u8], k: usize) -> Result<Vec<u8>, Error> {
        let preamble = &self.preamble;
        let cur_min = preamble.count_or_cur_min;

        let mut values = Vec::with_capacity(k);
        let mut pending = vec![false; k];
        let mut num_pending = 0usize;
        for slot in 0..k {
            let raw = get_nibble(buckets, slot as u32);
            if raw == AUX_TOKEN {
                pending[slot] = true;
                num_pending += 1;
                values.push(0);
            } else {
                values.push(raw + cur_min);
            }
        }

        let aux_start = HLL_BYTE_ARR_START + hll_array_bytes(preamble.lg_config_k, HllType::Hll4);
        let exceptions = if preamble.compact {
            let aux_count = self.hll_header().aux_count as usize;
            (0..aux_count)
                .map(|index| self.coupon_at(aux_start + 4 * index))
                .map(|coupon| (get_slot(coupon), get_value(coupon)))
                .collect::<Vec<_>>()
        } else {
            AuxMap::new(
                &self.bytes[aux_start..],
                preamble.lg_arr,
                self.hll_header().aux_count,
            )
            .iter()
            .collect::<Vec<_>>()
        };

        for (slot, value) in exceptions {
            let index = slot as usize;
            if index >= k || !pending[index] {
                return Err(Error::deserial(format!(
                    "HLL4 exception for slot {slot} has no matching bucket"
                )));
            }
            pending[index] = false;
            num_pending -= 1;
            values[index] = value;
        }

        if num_pending > 0 {
            return Err(Error::deserial(format!(
                "HLL4 image is missing {num_pending} exceptions"
            )));
        }
        Ok(values)
    }
}

/// Rebuilds a heap representation from any image.
///
/// Coupon images are replayed; HLL images are rebuilt from their bucket values, keeping
/// the accumulator and the out-of-order flag they were written with.
pub(super) fn heapify(image: &Image<'_>) -> Result<Mode<Vec<u8>>, Error> {
    let preamble = image.preamble();
    match preamble.cur_mode {
        CurMode::List | CurMode::Set => {
            let mut mode = Mode::new(Vec::new(), preamble.hll_type);
            for coupon in image.coupons() {
                mode.update(preamble.lg_config_k, coupon);
            }
            Ok(mode)
        }
        CurMode::Hll => {
            let values = image.hll_values()?;
            Ok(Mode::from_values(
                Vec::new(),
                preamble.lg_config_k,
                preamble.hll_type,
                &values,
                image.hip_accum(),
                preamble.out_of_order,
            ))
        }
    }
}

/// Adopts the updatable image held by `storage` without copying it.
///
/// Returns the image's `lg_config_k` along with the representation.
pub(super) fn wrap<S: Storage>(storage: S) -> Result<(u8, Mode<S>), Error> {
    let (preamble, hip_accum, len, set_count) = {
        let image = Image::parse(storage.as_ref())?;
        let preamble = *image.preamble();
        if preamble.compact {
            return Err(Error::invalid_argument(
                "a compact image cannot be wrapped for updates",
            ));
        }
        if preamble.cur_mode == CurMode::Hll {
            image.hll_values()?;
        }
        (preamble, image.hip_accum(), image.coupons().len(), image.set_count as usize)
    };

    let lg_config_k = preamble.lg_config_k;
    let hll_type = preamble.hll_type;
    let required = max_updatable_bytes(lg_config_k, hll_type);
    let capacity = storage.as_ref().len();
    if capacity < required {
        return Err(Error::invalid_argument(format!(
            "region of {capacity} bytes is smaller than the {required} bytes this sketch may need"
        )));
    }

    let mode = match preamble.cur_mode {
        CurMode::List => Mode::List {
            list: List::from_storage(storage, len),
            hll_type,
        },
        CurMode::Set => {
            if lg_config_k < 8 || preamble.lg_arr + 3 > lg_config_k {
                return Err(Error::deserial(format!(
                    "SET image with table size 2^{} is invalid for lg_config_k {lg_config_k}",
                    preamble.lg_arr
                )));
            }
            let slots = 1usize << preamble.lg_arr;
            if set_count != len || RESIZE_DENOM as usize * len > RESIZE_NUMER as usize * slots {
                return Err(Error::deserial(format!(
                    "SET image holds {len} coupons in {slots} slots with a stored count of {set_count}"
                )));
            }
            Mode::Set {
                set: HashSet::from_storage(storage, preamble.lg_arr, len),
                hll_type,
            }
        }
        CurMode::Hll => match hll_type {
            HllType::Hll4 => Mode::Array4(Array4::from_storage(
                storage,
                lg_config_k,
                preamble.count_or_cur_min,
                preamble.lg_arr,
                hip_accum,
                preamble.out_of_order,
            )?),
            HllType::Hll6 => Mode::Array6(Array6::from_storage(
                storage,
                lg_config_k,
                hip_accum,
                preamble.out_of_order,
            )),
            HllType::Hll8 => Mode::Array8(Array8::from_storage(
                storage,
                lg_config_k,
                hip_accum,
                preamble.out_of_order,
            )),
        },
    };
    Ok((lg_config_k, mode))
}
