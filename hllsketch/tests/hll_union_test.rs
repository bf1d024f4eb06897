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
use googletest::prelude::ge;
use googletest::prelude::le;
use googletest::prelude::near;
use hllsketch::common::NumStdDev;
use hllsketch::error::ErrorKind;
use hllsketch::hll::CurMode;
use hllsketch::hll::HllSketch;
use hllsketch::hll::HllType;
use hllsketch::hll::HllUnion;

fn build(lg_config_k: u8, hll_type: HllType, range: std::ops::Range<u64>) -> HllSketch {
    let mut sketch = HllSketch::new(lg_config_k, hll_type);
    for i in range {
        sketch.update(i);
    }
    sketch
}

#[test]
fn test_empty_union() {
    let mut union = HllUnion::new(12);
    assert!(union.is_empty());
    assert_eq!(union.estimate(), 0.0);

    union.update(&HllSketch::new(8, HllType::Hll4));
    assert!(union.is_empty());
    assert_eq!(union.lg_config_k(), 12);

    let result = union.get_result(HllType::Hll6);
    assert!(result.is_empty());
    assert_eq!(result.target_type(), HllType::Hll6);
}

#[test]
fn test_union_of_small_sketches_stays_exact() {
    let a = build(12, HllType::Hll4, 0..6);
    let b = build(12, HllType::Hll8, 3..9);

    let mut union = HllUnion::new(12);
    union.update(&a);
    union.update(&b);
    assert_eq!(union.lg_config_k(), 12);
    assert_that!(union.estimate(), near(9.0, 0.01));

    let result = union.get_result(HllType::Hll4);
    assert_eq!(result.current_mode(), CurMode::Set);
    assert!(!result.is_out_of_order());
}

#[test]
fn test_single_sketch_keeps_hip_estimate() {
    let sketch = build(12, HllType::Hll8, 0..20_000);
    let mut union = HllUnion::new(12);
    union.update(&sketch);

    assert_eq!(union.estimate(), sketch.estimate());
    let result = union.get_result(HllType::Hll8);
    assert!(!result.is_out_of_order());
    assert_eq!(result.estimate(), sketch.estimate());
}

#[test]
fn test_union_accuracy() {
    let a = build(12, HllType::Hll4, 0..20_000);
    let b = build(12, HllType::Hll6, 10_000..30_000);
    let c = build(12, HllType::Hll8, 25_000..40_000);

    let mut union = HllUnion::new(12);
    union.update(&a);
    union.update(&b);
    union.update(&c);

    let estimate = union.estimate();
    assert_that!(estimate, near(40_000.0, 0.05 * 40_000.0));
    assert_that!(union.lower_bound(NumStdDev::Two), le(estimate));
    assert_that!(union.upper_bound(NumStdDev::Two), ge(estimate));

    let result = union.get_result(HllType::Hll4);
    assert!(result.is_out_of_order());
    assert_eq!(result.lg_config_k(), 12);
    assert_eq!(result.current_mode(), CurMode::Hll);
}

#[test]
fn test_order_of_updates_does_not_matter() {
    let sketches = [
        build(12, HllType::Hll4, 0..20_000),
        build(12, HllType::Hll6, 10_000..30_000),
        build(12, HllType::Hll8, 25_000..40_000),
    ];

    let mut forward = HllUnion::new(12);
    for sketch in &sketches {
        forward.update(sketch);
    }
    let mut backward = HllUnion::new(12);
    for sketch in sketches.iter().rev() {
        backward.update(sketch);
    }

    let expected = forward.estimate();
    assert_that!(backward.estimate(), near(expected, 1e-9 * expected));
}

#[test]
fn test_smaller_lg_k_wins_in_both_orders() {
    let large = build(12, HllType::Hll4, 0..5000);
    let small = build(10, HllType::Hll6, 5000..10_000);

    let mut first = HllUnion::new(12);
    first.update(&large);
    first.update(&small);

    let mut second = HllUnion::new(12);
    second.update(&small);
    second.update(&large);

    assert_eq!(first.lg_config_k(), 10);
    assert_eq!(second.lg_config_k(), 10);
    assert_eq!(first.lg_max_k(), 12);

    let expected = first.estimate();
    assert_that!(second.estimate(), near(expected, 1e-9 * expected));
    assert_that!(expected, near(10_000.0, 0.1 * 10_000.0));

    let result = second.get_result(HllType::Hll8);
    assert_eq!(result.lg_config_k(), 10);
    assert!(result.is_out_of_order());
}

#[test]
fn test_lg_max_k_caps_gadget() {
    let sketch = build(14, HllType::Hll8, 0..10_000);
    let mut union = HllUnion::new(10);
    union.update(&sketch);

    assert_eq!(union.lg_config_k(), 10);
    assert_that!(union.estimate(), near(10_000.0, 0.1 * 10_000.0));
    assert!(union.get_result(HllType::Hll8).is_out_of_order());
}

#[test]
fn test_coupons_land_on_hll_gadget() {
    let mut union = HllUnion::new(11);
    union.update(&build(11, HllType::Hll8, 0..10_000));
    let before = union.estimate();

    union.update(&build(11, HllType::Hll8, 0..5));
    assert_eq!(union.estimate(), before);
    assert!(!union.get_result(HllType::Hll8).is_out_of_order());
}

#[test]
fn test_update_bytes_marks_out_of_order() {
    let sketch = build(12, HllType::Hll8, 0..10_000);

    let mut union = HllUnion::new(12);
    union.update_bytes(&sketch.serialize()).unwrap();
    let result = union.get_result(HllType::Hll8);
    assert!(result.is_out_of_order());
    assert_that!(result.estimate(), near(10_000.0, 0.05 * 10_000.0));

    let err = union.update_bytes(&[1, 2, 3]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_result_types_agree() {
    let mut union = HllUnion::new(11);
    union.update(&build(11, HllType::Hll4, 0..8000));
    union.update(&build(11, HllType::Hll4, 4000..12_000));

    let expected = union.estimate();
    for hll_type in [HllType::Hll4, HllType::Hll6, HllType::Hll8] {
        let result = union.get_result(hll_type);
        assert_eq!(result.target_type(), hll_type);
        assert_that!(result.estimate(), near(expected, 1e-9 * expected));
    }
}

#[test]
fn test_reset_restores_lg_max_k() {
    let mut union = HllUnion::new(12);
    union.update(&build(9, HllType::Hll8, 0..1000));
    assert_eq!(union.lg_config_k(), 9);

    union.reset();
    assert!(union.is_empty());
    assert_eq!(union.lg_config_k(), 12);
    assert_eq!(union.estimate(), 0.0);
}

#[test]
fn test_union_in_region_matches_heap_union() {
    let a = build(12, HllType::Hll4, 0..3000);
    let b = build(12, HllType::Hll6, 2000..9000);

    let mut heap = HllUnion::new(12);
    heap.update(&a);
    heap.update(&b);

    let mut region = vec![0u8; HllSketch::max_updatable_serialization_bytes(12, HllType::Hll8)];
    let mut direct = HllUnion::new_in(12, &mut region).unwrap();
    direct.update(&a);
    direct.update(&b);

    assert!(direct.is_direct());
    assert!(!heap.is_direct());
    assert_eq!(direct.estimate(), heap.estimate());
    drop(direct);

    let restored = HllSketch::deserialize(&region).unwrap();
    assert_eq!(restored.estimate(), heap.estimate());
}

#[test]
fn test_union_region_too_small() {
    let mut region = vec![0u8; 64];
    let err = HllUnion::new_in(12, &mut region).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_invalid_lg_max_k() {
    let err = HllUnion::try_new(22).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
#[should_panic(expected = "lg_max_k must be in [4, 21]")]
fn test_new_panics_on_invalid_lg_max_k() {
    let _ = HllUnion::new(3);
}

fn next_hash(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[test]
fn test_out_of_order_estimate_is_unbiased_across_lg_k() {
    for lg_config_k in [4u8, 6, 8, 10, 12, 14] {
        let k = (1u64 << lg_config_k) as f64;
        for multiple in [3u64, 10, 40] {
            let n = multiple << lg_config_k;
            let mut state = lg_config_k as u64;
            let mut sketch = HllSketch::new(lg_config_k, HllType::Hll6);
            for _ in 0..n {
                let h0 = next_hash(&mut state);
                let h1 = next_hash(&mut state);
                sketch.update_hash(h0, h1);
            }

            let mut union = HllUnion::new(lg_config_k);
            union.update(&sketch);
            let result = union.get_result(HllType::Hll8);
            assert!(result.is_out_of_order());

            let n = n as f64;
            let three_sigma = 3.0 * 1.04 / k.sqrt();
            assert_that!(result.estimate(), near(n, three_sigma * n));
        }
    }
}

#[test]
fn test_nested_unions_associate() {
    for c_lg_k in [12u8, 10] {
        let a = build(12, HllType::Hll4, 0..20_000);
        let b = build(12, HllType::Hll6, 15_000..35_000);
        let c = build(c_lg_k, HllType::Hll8, 30_000..60_000);

        let mut ab = HllUnion::new(12);
        ab.update(&a);
        ab.update(&b);
        let mut left = HllUnion::new(12);
        left.update(&ab.get_result(HllType::Hll8));
        left.update(&c);

        let mut bc = HllUnion::new(12);
        bc.update(&b);
        bc.update(&c);
        let mut right = HllUnion::new(12);
        right.update(&a);
        right.update(&bc.get_result(HllType::Hll4));

        let mut flat = HllUnion::new(12);
        for sketch in [&a, &b, &c] {
            flat.update(sketch);
        }

        assert_eq!(left.lg_config_k(), c_lg_k);
        assert_eq!(right.lg_config_k(), c_lg_k);
        let expected = flat.estimate();
        assert_that!(left.estimate(), near(expected, 1e-9 * expected));
        assert_that!(right.estimate(), near(expected, 1e-9 * expected));
        assert_that!(expected, near(60_000.0, 0.1 * 60_000.0));
    }
}
