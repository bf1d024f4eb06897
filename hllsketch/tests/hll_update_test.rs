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

const ALL_TYPES: [HllType; 3] = [HllType::Hll4, HllType::Hll6, HllType::Hll8];

#[test]
fn test_empty() {
    for hll_type in ALL_TYPES {
        let sketch = HllSketch::new(12, hll_type);
        assert!(sketch.is_empty());
        assert!(!sketch.is_estimation_mode());
        assert_eq!(sketch.current_mode(), CurMode::List);
        assert_eq!(sketch.estimate(), 0.0);
        assert_eq!(sketch.lower_bound(NumStdDev::One), 0.0);
        assert_eq!(sketch.upper_bound(NumStdDev::One), 0.0);
        assert_eq!(sketch.compact_serialization_bytes(), 8);
        assert_eq!(sketch.updatable_serialization_bytes(), 40);
    }
}

#[test]
fn test_mode_sizes_at_lg_k_8() {
    let mut sketch = HllSketch::new(8, HllType::Hll8);
    for i in 0..7 {
        sketch.update(i);
    }
    assert_eq!(sketch.current_mode(), CurMode::List);
    assert_eq!(sketch.compact_serialization_bytes(), 36);

    for i in 7..24 {
        sketch.update(i);
    }
    assert_eq!(sketch.current_mode(), CurMode::Set);
    assert_eq!(sketch.compact_serialization_bytes(), 108);

    sketch.update(24);
    assert_eq!(sketch.current_mode(), CurMode::Hll);
    assert_eq!(sketch.compact_serialization_bytes(), 40 + 256);
    assert!(sketch.is_estimation_mode());
    assert!(!sketch.is_out_of_order());
}

#[test]
fn test_small_lg_k_goes_from_list_to_hll() {
    let mut sketch = HllSketch::new(6, HllType::Hll4);
    for i in 0..7 {
        sketch.update(i);
    }
    assert_eq!(sketch.current_mode(), CurMode::List);
    sketch.update(7);
    assert_eq!(sketch.current_mode(), CurMode::Hll);
}

#[test]
fn test_mode_is_monotonic_until_reset() {
    let mut sketch = HllSketch::new(10, HllType::Hll6);
    let mut last = sketch.current_mode();
    for i in 0..5000 {
        sketch.update(i);
        let mode = sketch.current_mode();
        assert_that!(mode, ge(last));
        last = mode;
    }
    assert_eq!(last, CurMode::Hll);

    sketch.reset();
    assert!(sketch.is_empty());
    assert_eq!(sketch.current_mode(), CurMode::List);
    assert_eq!(sketch.target_type(), HllType::Hll6);
    assert_eq!(sketch.lg_config_k(), 10);
    assert_eq!(sketch.estimate(), 0.0);

    sketch.update("again");
    assert_that!(sketch.estimate(), near(1.0, 1e-6));
}

#[test]
fn test_duplicates_do_not_count() {
    let mut sketch = HllSketch::new(12, HllType::Hll8);
    for _ in 0..10 {
        for i in 0..100 {
            sketch.update(&i);
        }
    }
    assert_that!(sketch.estimate(), near(100.0, 2.0));
}

#[test]
fn test_types_agree_exactly() {
    const N: u64 = 10_000;

    let mut sketches = ALL_TYPES.map(|hll_type| HllSketch::new(14, hll_type));
    for i in 0..N {
        for sketch in sketches.iter_mut() {
            sketch.update(i);
        }
    }

    let estimate = sketches[0].estimate();
    assert_that!(estimate, near(N as f64, 0.03 * N as f64));
    for sketch in &sketches[1..] {
        assert_eq!(sketch.estimate(), estimate);
        assert_eq!(
            sketch.lower_bound(NumStdDev::Two),
            sketches[0].lower_bound(NumStdDev::Two)
        );
        assert_eq!(
            sketch.upper_bound(NumStdDev::Two),
            sketches[0].upper_bound(NumStdDev::Two)
        );
    }
}

#[test]
fn test_large_cardinality() {
    const N: u64 = 200_000;
    for hll_type in ALL_TYPES {
        let mut sketch = HllSketch::new(14, hll_type);
        for i in 0..N {
            sketch.update(i);
        }
        assert_that!(sketch.estimate(), near(N as f64, 0.03 * N as f64));
    }
}

#[test]
fn test_bounds_bracket_estimate() {
    for n in [1u64, 5, 100, 1000, 50_000] {
        let mut sketch = HllSketch::new(11, HllType::Hll4);
        for i in 0..n {
            sketch.update(i);
        }
        let estimate = sketch.estimate();
        let mut last_lower = estimate;
        let mut last_upper = estimate;
        for num_std_dev in [NumStdDev::One, NumStdDev::Two, NumStdDev::Three] {
            let lower = sketch.lower_bound(num_std_dev);
            let upper = sketch.upper_bound(num_std_dev);
            assert_that!(lower, le(last_lower));
            assert_that!(upper, ge(last_upper));
            last_lower = lower;
            last_upper = upper;
        }
    }
}

fn next_hash(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[test]
fn test_bounds_cover_true_count_at_expected_rates() {
    const TRIALS: u64 = 100;
    const N: u64 = 20_000;
    let levels = [NumStdDev::One, NumStdDev::Two, NumStdDev::Three];
    // minimum hit rates, a few binomial deviations under 68%, 95%, 99.7%
    let min_rates = [0.6, 0.9, 0.97];

    let mut hip_hits = [0u32; 3];
    let mut composite_hits = [0u32; 3];
    for trial in 0..TRIALS {
        let mut state = trial * 0x1_0000_0001;
        let mut sketch = HllSketch::new(13, HllType::Hll6);
        for _ in 0..N {
            let h0 = next_hash(&mut state);
            let h1 = next_hash(&mut state);
            sketch.update_hash(h0, h1);
        }
        assert!(!sketch.is_out_of_order());

        let mut union = HllUnion::new(13);
        union.update(&sketch);
        let merged = union.get_result(HllType::Hll8);
        assert!(merged.is_out_of_order());

        let n = N as f64;
        for (i, &num_std_dev) in levels.iter().enumerate() {
            if sketch.lower_bound(num_std_dev) <= n && n <= sketch.upper_bound(num_std_dev) {
                hip_hits[i] += 1;
            }
            if merged.lower_bound(num_std_dev) <= n && n <= merged.upper_bound(num_std_dev) {
                composite_hits[i] += 1;
            }
        }
    }

    for i in 0..levels.len() {
        let hip_rate = hip_hits[i] as f64 / TRIALS as f64;
        let composite_rate = composite_hits[i] as f64 / TRIALS as f64;
        assert_that!(hip_rate, ge(min_rates[i]));
        assert_that!(composite_rate, ge(min_rates[i]));
    }
}

#[test]
fn test_lower_bound_floor_while_small() {
    let mut sketch = HllSketch::new(4, HllType::Hll8);
    for i in 0..20 {
        sketch.update(i);
    }
    assert_eq!(sketch.current_mode(), CurMode::Hll);
    assert_that!(sketch.lower_bound(NumStdDev::Three), ge(1.0));
}

#[test]
fn test_invalid_num_std_dev() {
    for value in [0u8, 4] {
        let err = NumStdDev::try_from(value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    assert_eq!(NumStdDev::try_from(3).unwrap(), NumStdDev::Three);
}

#[test]
fn test_numeric_canonicalization() {
    let mut sketch = HllSketch::new(12, HllType::Hll4);
    sketch.update_f64(0.0);
    sketch.update_f64(-0.0);
    sketch.update_f32(0.0);
    assert_that!(sketch.estimate(), near(1.0, 1e-6));

    sketch.update_f64(f64::NAN);
    sketch.update_f32(f32::NAN);
    assert_that!(sketch.estimate(), near(2.0, 1e-6));
}

#[test]
fn test_update_hash_is_deterministic() {
    let mut a = HllSketch::new(12, HllType::Hll8);
    let mut b = HllSketch::new(12, HllType::Hll8);
    for i in 0..1000u64 {
        let h0 = i.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let h1 = h0.rotate_left(17) ^ 0xD6E8_FEB8_6659_FD93;
        a.update_hash(h0, h1);
        b.update_hash(h0, h1);
    }
    assert_eq!(a.serialize(), b.serialize());
}

#[test]
fn test_copy_as_round_trips_estimate() {
    for n in [5u64, 300, 20_000] {
        for from in ALL_TYPES {
            let mut sketch = HllSketch::new(12, from);
            for i in 0..n {
                sketch.update(i);
            }
            for to in ALL_TYPES {
                let converted = sketch.copy_as(to);
                assert_eq!(converted.target_type(), to);
                assert_eq!(converted.current_mode(), sketch.current_mode());
                assert_eq!(converted.estimate(), sketch.estimate());

                let back = converted.copy_as(from);
                assert_eq!(back.estimate(), sketch.estimate());
                assert_eq!(back.is_out_of_order(), sketch.is_out_of_order());
            }
        }
    }
}

#[test]
fn test_copy_is_independent() {
    let mut sketch = HllSketch::new(10, HllType::Hll4);
    for i in 0..2000 {
        sketch.update(i);
    }
    let copy = sketch.copy();
    let clone = sketch.clone();
    for i in 2000..4000 {
        sketch.update(i);
    }
    assert_eq!(copy.estimate(), clone.estimate());
    assert_that!(sketch.estimate(), ge(copy.estimate()));
}

#[test]
fn test_invalid_lg_k() {
    let err = HllSketch::try_new(22, HllType::Hll8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    let err = HllSketch::try_new(3, HllType::Hll8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
#[should_panic(expected = "lg_config_k must be in [4, 21]")]
fn test_new_panics_on_invalid_lg_k() {
    let _ = HllSketch::new(22, HllType::Hll4);
}
