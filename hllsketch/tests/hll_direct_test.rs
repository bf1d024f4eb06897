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

use googletest::assert_that;
use googletest::prelude::near;
use hllsketch::error::ErrorKind;
use hllsketch::hll::CurMode;
use hllsketch::hll::DirectHllSketch;
use hllsketch::hll::HllSketch;
use hllsketch::hll::HllSketchView;
use hllsketch::hll::HllType;

const ALL_TYPES: [HllType; 3] = [HllType::Hll4, HllType::Hll6, HllType::Hll8];

fn region_for(lg_config_k: u8, hll_type: HllType) -> Vec<u8> {
    vec![0u8; HllSketch::max_updatable_serialization_bytes(lg_config_k, hll_type)]
}

#[test]
fn test_region_too_small() {
    for hll_type in ALL_TYPES {
        let mut region = region_for(12, hll_type);
        region.pop();
        let err = DirectHllSketch::new_in(12, hll_type, &mut region).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    let mut region = vec![0u8; 1 << 16];
    let err = DirectHllSketch::new_in(22, HllType::Hll8, &mut region).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
fn test_direct_matches_heap() {
    for hll_type in ALL_TYPES {
        let mut region = region_for(12, hll_type);
        let mut heap = HllSketch::new(12, hll_type);
        {
            let mut direct = DirectHllSketch::new_in(12, hll_type, &mut region).unwrap();
            assert!(direct.is_empty());
            for i in 0..20_000u64 {
                direct.update(i);
                heap.update(i);
            }
            assert!(direct.is_direct());
            assert_eq!(direct.current_mode(), CurMode::Hll);
            assert_eq!(direct.estimate(), heap.estimate());
            assert_eq!(direct.serialize(), heap.serialize());
        }

        let restored = HllSketch::deserialize(&region).unwrap();
        assert_eq!(restored.estimate(), heap.estimate());
        let view = HllSketchView::wrap(&region).unwrap();
        assert!(!view.is_compact());
        assert_eq!(view.estimate(), heap.estimate());
    }
}

#[test]
fn test_region_is_valid_in_every_mode() {
    let mut region = region_for(10, HllType::Hll8);
    let mut direct = DirectHllSketch::new_in(10, HllType::Hll8, &mut region).unwrap();
    for (n, mode) in [(5u64, CurMode::List), (60, CurMode::Set), (5000, CurMode::Hll)] {
        for i in 0..n {
            direct.update(i);
        }
        assert_eq!(direct.current_mode(), mode);
        let image = direct.serialize_updatable();
        let restored = HllSketch::deserialize(&image).unwrap();
        assert_eq!(restored.current_mode(), mode);
        assert_eq!(restored.estimate(), direct.estimate());
    }
    drop(direct);

    let view = HllSketchView::wrap(&region).unwrap();
    assert_eq!(view.current_mode(), CurMode::Hll);
    assert_that!(view.estimate(), near(5000.0, 0.1 * 5000.0));
}

#[test]
fn test_writable_wrap_continues_updates() {
    for hll_type in ALL_TYPES {
        let mut heap = HllSketch::new(12, hll_type);
        for i in 0..300u64 {
            heap.update(i);
        }
        assert_eq!(heap.current_mode(), CurMode::Set);

        let image = heap.serialize_updatable();
        let mut region = region_for(12, hll_type);
        region[..image.len()].copy_from_slice(&image);

        let mut direct = DirectHllSketch::writable_wrap(&mut region).unwrap();
        assert_eq!(direct.lg_config_k(), 12);
        assert_eq!(direct.target_type(), hll_type);
        assert_eq!(direct.estimate(), heap.estimate());

        for i in 300..20_000u64 {
            direct.update(i);
            heap.update(i);
        }
        assert_eq!(direct.estimate(), heap.estimate());
        assert_eq!(direct.copy().serialize(), heap.serialize());
    }
}

#[test]
fn test_writable_wrap_rejects_compact_and_small_regions() {
    let mut heap = HllSketch::new(12, HllType::Hll8);
    for i in 0..10_000u64 {
        heap.update(i);
    }

    let mut compact = heap.serialize();
    let err = DirectHllSketch::writable_wrap(&mut compact).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let mut updatable = heap.serialize_updatable();
    updatable.truncate(updatable.len() - 1);
    let err = DirectHllSketch::writable_wrap(&mut updatable).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_writable_wrap_rejects_overfull_set() {
    let mut heap = HllSketch::new(12, HllType::Hll8);
    for i in 0..300u64 {
        heap.update(i);
    }
    assert_eq!(heap.current_mode(), CurMode::Set);
    let image = heap.serialize_updatable();
    let slots = (image.len() - 12) / 4;
    assert_eq!(slots, 512);

    // every empty slot gets a coupon of its own
    let mut full = image.clone();
    for index in 0..slots {
        let at = 12 + 4 * index;
        if full[at..at + 4] == [0; 4] {
            let coupon = (1u32 << 26) | index as u32;
            full[at..at + 4].copy_from_slice(&coupon.to_le_bytes());
        }
    }
    for count in [300u32, slots as u32] {
        full[8..12].copy_from_slice(&count.to_le_bytes());
        let mut region = region_for(12, HllType::Hll8);
        region[..full.len()].copy_from_slice(&full);
        let err = DirectHllSketch::writable_wrap(&mut region).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }

    let mut miscounted = image.clone();
    miscounted[8..12].copy_from_slice(&301u32.to_le_bytes());
    let mut region = region_for(12, HllType::Hll8);
    region[..miscounted.len()].copy_from_slice(&miscounted);
    let err = DirectHllSketch::writable_wrap(&mut region).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);

    let mut region = region_for(12, HllType::Hll8);
    region[..image.len()].copy_from_slice(&image);
    assert!(DirectHllSketch::writable_wrap(&mut region).is_ok());
}

#[test]
fn test_reset_rewrites_region() {
    let mut region = region_for(11, HllType::Hll4);
    let mut direct = DirectHllSketch::new_in(11, HllType::Hll4, &mut region).unwrap();
    for i in 0..10_000u64 {
        direct.update(i);
    }
    direct.reset();
    assert!(direct.is_empty());
    drop(direct);

    let restored = HllSketch::deserialize(&region).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.current_mode(), CurMode::List);
    assert_eq!(restored.target_type(), HllType::Hll4);
}

#[test]
fn test_sketch_moves_to_heap_when_exceptions_outgrow_region() {
    let mut region = region_for(4, HllType::Hll4);
    let mut heap = HllSketch::new(4, HllType::Hll4);
    let mut direct = DirectHllSketch::new_in(4, HllType::Hll4, &mut region).unwrap();

    // every coupon lands in its own slot with the largest value, so each one is an exception
    for slot in 0..12u64 {
        direct.update_hash(slot, 1);
        heap.update_hash(slot, 1);
    }

    assert_eq!(direct.current_mode(), CurMode::Hll);
    assert!(!direct.is_direct());
    assert_eq!(direct.estimate(), heap.estimate());
    assert_eq!(direct.serialize(), heap.serialize());

    direct.update(u64::MAX);
    heap.update(u64::MAX);
    assert_eq!(direct.estimate(), heap.estimate());
}
