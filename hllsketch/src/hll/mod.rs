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

//! HyperLogLog sketch implementation for cardinality estimation.
//!
//! A sketch starts out holding raw coupons in a small list, moves to an open-addressed
//! hash set as more distinct items arrive, and finally settles into a dense array of
//! `K = 2^lg_config_k` buckets.
//!
//! Three target HLL types are supported, trading precision for memory:
//!
//! - [`HllType::Hll4`]: 4 bits per bucket (most compact)
//! - [`HllType::Hll6`]: 6 bits per bucket (balanced)
//! - [`HllType::Hll8`]: 8 bits per bucket (fastest updates)
//!
//! All three types give the same estimate for the same input; they differ in size only.
//!
//! # Coupons
//!
//! A coupon is a 32-bit value encoding both a slot number (26 bits) and a value (6 bits).
//! The slot identifies which bucket to update, and the value represents the number of
//! leading zeros in the hash plus one.
//!
//! # Storage
//!
//! A sketch works directly on its serialized updatable image. [`HllSketch`] keeps that image
//! in a `Vec<u8>`; [`DirectHllSketch`] keeps it in a [`Region`] borrowed from the caller and
//! falls back to an owned copy only if the image must outgrow the region.

use std::hash::Hash;

use crate::error::Error;

mod array4;
mod array6;
mod array8;
mod aux_map;
mod composite_interpolation;
mod container;
mod coupon_mapping;
mod cubic_interpolation;
mod estimator;
mod harmonic_numbers;
mod hash_set;
mod list;
mod mode;
mod preamble;
mod region;
mod serialization;
mod sketch;
mod union;
mod view;

pub use self::region::Region;
pub use self::region::Storage;
pub use self::sketch::DirectHllSketch;
pub use self::sketch::HllSketch;
pub use self::union::HllUnion;
pub use self::view::HllSketchView;

/// Smallest supported `lg_config_k`.
pub const MIN_LG_K: u8 = 4;
/// Largest supported `lg_config_k`.
pub const MAX_LG_K: u8 = 21;
/// A reasonable default `lg_config_k`.
pub const DEFAULT_LG_K: u8 = 12;

/// Target HLL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HllType {
    /// 4 bits per bucket, with an exception table for rare large values.
    #[default]
    Hll4 = 0,
    /// 6 bits per bucket.
    Hll6 = 1,
    /// 8 bits per bucket.
    Hll8 = 2,
}

impl HllType {
    pub(crate) fn from_bits(bits: u8) -> Result<Self, Error> {
        match bits {
            0 => Ok(HllType::Hll4),
            1 => Ok(HllType::Hll6),
            2 => Ok(HllType::Hll8),
            _ => Err(Error::deserial(format!("invalid target HLL type: {bits}"))),
        }
    }
}

/// The representation a sketch is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CurMode {
    /// Small unsorted coupon list.
    List = 0,
    /// Open-addressed coupon hash set.
    Set = 1,
    /// Dense bucket array.
    Hll = 2,
}

impl CurMode {
    pub(crate) fn from_bits(bits: u8) -> Result<Self, Error> {
        match bits {
            0 => Ok(CurMode::List),
            1 => Ok(CurMode::Set),
            2 => Ok(CurMode::Hll),
            _ => Err(Error::deserial(format!("invalid current mode: {bits}"))),
        }
    }
}

const DEFAULT_UPDATE_SEED: u32 = 9001;

const KEY_BITS_26: u32 = 26;
const KEY_MASK_26: u32 = (1 << KEY_BITS_26) - 1;

const COUPON_EMPTY: u32 = 0;

const COUPON_RSE_FACTOR: f64 = 0.409; // at transition point not the asymptote
const COUPON_RSE: f64 = COUPON_RSE_FACTOR / (1 << 13) as f64;

// Resize at 3/4 = 75% load factor
const RESIZE_NUMER: u32 = 3;
const RESIZE_DENOM: u32 = 4;

/// Initial log2 size of the HLL4 exception table, indexed by `lg_config_k`.
const LG_AUX_ARR_INTS: [u8; 22] = [
    0, 2, 2, 2, 2, 2, 2, 3, 3, 3, 4, 4, 5, 5, 6, 7, 8, 9, 10, 11, 12, 13,
];

fn check_lg_k(lg_config_k: u8) -> Result<(), Error> {
    if (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k) {
        Ok(())
    } else {
        Err(Error::config_invalid(format!(
            "lg_config_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_config_k}"
        )))
    }
}

/// Extract slot number (low 26 bits) from coupon
#[inline]
fn get_slot(coupon: u32) -> u32 {
    coupon & KEY_MASK_26
}

/// Extract value (upper 6 bits) from coupon
#[inline]
fn get_value(coupon: u32) -> u8 {
    (coupon >> KEY_BITS_26) as u8
}

/// Pack slot number and value into a coupon
///
/// Format: [value (6 bits) << 26] | [slot (26 bits)]
#[inline]
fn pack_coupon(slot: u32, value: u8) -> u32 {
    ((value as u32) << KEY_BITS_26) | (slot & KEY_MASK_26)
}

/// Build a coupon from the two halves of a 128-bit hash.
fn coupon_from_hash(lo: u64, hi: u64) -> u32 {
    let addr26 = lo as u32 & KEY_MASK_26;
    let lz = hi.leading_zeros();
    let capped = lz.min(62);
    let value = capped + 1;

    value << KEY_BITS_26 | addr26
}

fn coupon<H: Hash>(v: H) -> u32 {
    let mut hasher = mur3::Hasher128::with_seed(DEFAULT_UPDATE_SEED);
    v.hash(&mut hasher);
    let (lo, hi) = hasher.finish128();
    coupon_from_hash(lo, hi)
}

fn coupon_from_bytes(bytes: &[u8]) -> u32 {
    let (lo, hi) = mur3::murmurhash3_x64_128(bytes, DEFAULT_UPDATE_SEED);
    coupon_from_hash(lo, hi)
}
